use super::test_utils::{memory_sink, sorted_lines};
use fanout_writer::{BatchWriter, FanOutStrategy, LineSink, WriterSink};
use std::fmt;
use std::sync::{Arc, Mutex};

const WORDS: [&str; 8] = ["one", "two", "three", "four", "five", "six", "seven", "eight"];

fn sorted_words() -> Vec<String> {
    let mut words: Vec<String> = WORDS.iter().map(|w| w.to_string()).collect();
    words.sort();
    words
}

#[tokio::test]
async fn empty_batch_succeeds_without_output() {
    let sink = memory_sink();
    let result = BatchWriter::default()
        .run(Vec::<&str>::new(), Arc::clone(&sink))
        .await;

    assert!(result.is_ok());
    assert!(sorted_lines(sink).is_empty());
}

#[tokio::test]
async fn two_items_land_in_buffer() {
    let sink = memory_sink();
    BatchWriter::default()
        .run(["one", "two"], Arc::clone(&sink))
        .await
        .unwrap();

    assert_eq!(sorted_lines(sink), vec!["one", "two"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn eight_words_each_written_once() {
    let sink = memory_sink();
    BatchWriter::default()
        .run(WORDS, Arc::clone(&sink))
        .await
        .unwrap();

    assert_eq!(sorted_lines(sink), sorted_words());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn repeated_runs_produce_same_lines() {
    let writer = BatchWriter::default();

    for _ in 0..5 {
        let sink = memory_sink();
        writer.run(WORDS, Arc::clone(&sink)).await.unwrap();
        assert_eq!(sorted_lines(sink), sorted_words());
    }
}

#[tokio::test]
async fn worker_pool_writes_every_word() {
    let writer = BatchWriter::builder()
        .strategy(FanOutStrategy::WorkerPool)
        .build();

    let sink = memory_sink();
    writer.run(WORDS, Arc::clone(&sink)).await.unwrap();

    assert_eq!(sorted_lines(sink), sorted_words());
}

#[tokio::test]
async fn items_are_rendered_with_display() {
    struct Point(i32, i32);

    impl fmt::Display for Point {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "({}, {})", self.0, self.1)
        }
    }

    let sink = memory_sink();
    BatchWriter::default()
        .run([Point(1, 2), Point(-3, 4)], Arc::clone(&sink))
        .await
        .unwrap();

    assert_eq!(sorted_lines(sink), vec!["(-3, 4)", "(1, 2)"]);
}

#[tokio::test]
async fn borrowed_items_are_accepted() {
    let owned: Vec<String> = vec!["alpha".to_string(), "beta".to_string()];

    let sink = memory_sink();
    BatchWriter::default()
        .run(&owned, Arc::clone(&sink))
        .await
        .unwrap();

    assert_eq!(sorted_lines(sink), owned);
}

#[tokio::test]
async fn trait_object_sink() {
    let buffer = memory_sink();
    let sink: Arc<dyn LineSink> = buffer.clone();

    BatchWriter::default().run(["dyn"], sink).await.unwrap();

    assert_eq!(sorted_lines(buffer), vec!["dyn"]);
}

#[tokio::test]
async fn summary_reports_totals() {
    let summaries = Arc::new(Mutex::new(Vec::new()));
    let s = Arc::clone(&summaries);

    let writer = BatchWriter::builder()
        .on_batch_finished(move |summary| s.lock().unwrap().push(summary))
        .build();

    let sink = Arc::new(WriterSink::new(Vec::new()));
    writer.run(WORDS, sink).await.unwrap();

    let summaries = summaries.lock().unwrap();
    assert_eq!(summaries.len(), 1);
    let summary = summaries[0];
    assert_eq!(summary.total, 8);
    assert_eq!(summary.tasks, 8);
    assert_eq!(summary.written, 8);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.dropped_errors, 0);
}

#[tokio::test]
async fn line_written_fires_for_every_index() {
    let indices = Arc::new(Mutex::new(Vec::new()));
    let i = Arc::clone(&indices);

    let writer = BatchWriter::builder()
        .on_line_written(move |index, _| i.lock().unwrap().push(index))
        .build();

    writer.run(WORDS, memory_sink()).await.unwrap();

    let mut indices = indices.lock().unwrap().clone();
    indices.sort_unstable();
    assert_eq!(indices, (0..8).collect::<Vec<_>>());
}

#[tokio::test]
async fn on_event_sees_every_kind_in_order() {
    let kinds = Arc::new(Mutex::new(Vec::new()));
    let k = Arc::clone(&kinds);

    let writer = BatchWriter::builder()
        .name("observed")
        .on_event(move |event| {
            assert_eq!(event.writer_name(), "observed");
            k.lock().unwrap().push(event.event_type());
        })
        .build();

    writer.run(["only"], memory_sink()).await.unwrap();

    assert_eq!(
        *kinds.lock().unwrap(),
        vec!["write_started", "line_written", "batch_finished"]
    );
}
