use super::test_utils::FailingSink;
use fanout_writer::{BatchError, BatchWriter, FanOutStrategy};
use std::error::Error;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const WORDS: [&str; 8] = ["one", "two", "three", "four", "five", "six", "seven", "eight"];

#[tokio::test]
async fn single_item_failure_surfaces_that_error() {
    let sink = FailingSink::on_lines(["one"], io::ErrorKind::BrokenPipe);

    let err = BatchWriter::default()
        .run(["one"], Arc::clone(&sink))
        .await
        .unwrap_err();

    assert!(err.is_write());
    assert_eq!(err.index(), Some(0));
    let io_err = err.io_error().expect("write error carries the io error");
    assert_eq!(io_err.kind(), io::ErrorKind::BrokenPipe);
    assert_eq!(io_err.to_string(), "rejected one");
    assert!(sink.accepted().is_empty());
}

#[tokio::test]
async fn one_failure_does_not_stop_other_items() {
    let sink = FailingSink::on_lines(["three"], io::ErrorKind::Other);

    let err = BatchWriter::default()
        .run(WORDS, Arc::clone(&sink))
        .await
        .unwrap_err();

    assert_eq!(err.index(), Some(2));
    assert_eq!(sink.calls(), 8);
    assert_eq!(
        sink.accepted(),
        vec!["eight", "five", "four", "one", "seven", "six", "two"]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn multiple_failures_surface_exactly_one_of_them() {
    let failing = ["two", "five", "eight"];
    let sink = FailingSink::on_lines(failing, io::ErrorKind::Other);

    let failures = Arc::new(AtomicUsize::new(0));
    let dropped = Arc::new(AtomicUsize::new(0));
    let f = Arc::clone(&failures);
    let d = Arc::clone(&dropped);

    let writer = BatchWriter::builder()
        .on_write_failed(move |_, _| {
            f.fetch_add(1, Ordering::SeqCst);
        })
        .on_error_dropped(move |_| {
            d.fetch_add(1, Ordering::SeqCst);
        })
        .build();

    let err = writer.run(WORDS, Arc::clone(&sink)).await.unwrap_err();

    let index = err.index().expect("a write failure was surfaced");
    assert!(failing.contains(&WORDS[index]), "surfaced error for {}", WORDS[index]);
    assert!(err.to_string().contains(WORDS[index]));

    assert_eq!(failures.load(Ordering::SeqCst), 3);
    assert_eq!(dropped.load(Ordering::SeqCst), 2);
    assert_eq!(sink.accepted().len(), 5);
}

#[tokio::test]
async fn every_item_failing_still_joins_all_tasks() {
    let sink = FailingSink::on_lines(WORDS, io::ErrorKind::WriteZero);

    let summaries = Arc::new(Mutex::new(Vec::new()));
    let s = Arc::clone(&summaries);
    let writer = BatchWriter::builder()
        .strategy(FanOutStrategy::WorkerPool)
        .on_batch_finished(move |summary| s.lock().unwrap().push(summary))
        .build();

    let err = writer.run(WORDS, Arc::clone(&sink)).await.unwrap_err();

    assert_eq!(err.io_error().map(io::Error::kind), Some(io::ErrorKind::WriteZero));
    assert_eq!(sink.calls(), 8);

    let summary = summaries.lock().unwrap()[0];
    assert_eq!(summary.written, 0);
    assert_eq!(summary.failed, 8);
    assert_eq!(summary.dropped_errors, 7);
}

#[tokio::test]
async fn write_error_exposes_source_chain() {
    let sink = FailingSink::on_lines(["one"], io::ErrorKind::PermissionDenied);

    let err = BatchWriter::default()
        .run(["one"], sink)
        .await
        .unwrap_err();

    let source = err.source().expect("write error has a source");
    let io_err = source
        .downcast_ref::<io::Error>()
        .expect("source is an io error");
    assert_eq!(io_err.kind(), io::ErrorKind::PermissionDenied);
}

#[tokio::test]
async fn failure_callback_receives_index_and_message() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = Arc::clone(&seen);

    let writer = BatchWriter::builder()
        .on_write_failed(move |index, message| {
            s.lock().unwrap().push((index, message.to_string()));
        })
        .build();

    let sink = FailingSink::on_lines(["b"], io::ErrorKind::Other);
    let err = writer.run(["a", "b", "c"], sink).await.unwrap_err();
    assert!(matches!(err, BatchError::Write { index: 1, .. }));

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, Some(1));
    assert!(seen[0].1.contains("rejected b"));
}
