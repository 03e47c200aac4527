//! Writes a fixed list of words to standard output, one per line, through a
//! bounded concurrent batch. Lines may appear in any order.
//!
//! Logs go to stderr; set `RUST_LOG=debug` to see the batch summary.

use fanout_writer::{BatchWriter, WriterSink};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const WORDS: [&str; 8] = ["one", "two", "three", "four", "five", "six", "seven", "eight"];

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let writer = BatchWriter::builder()
        .max_concurrent_writes(4)
        .name("words")
        .build();

    match writer.run(WORDS, Arc::new(WriterSink::stdout())).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(%error, "failed to write words");
            ExitCode::FAILURE
        }
    }
}
