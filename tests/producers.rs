use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::SeedableRng;
use stockflow::clock::FixedClock;
use stockflow::config::{DEST_BUCKET_PATH, DEST_BUCKET_PATH_OVERWRITE, STREAM_NAME};
use stockflow::events::{ObjectEvent, QueueEvent};
use stockflow::handlers::{RunStatus, StreamProcessor, TickPublisher};
use stockflow::model::Tick;
use stockflow::store::{LocalObjectStore, ObjectUri};
use stockflow::transport::{
    FileStreamTransport, PutRecordsOutput, StreamRecord, StreamTransport,
};
use stockflow::warehouse::{
    ParquetWarehouse, TableCatalog, Warehouse, LATEST_PRICES, STREAM_PRICES_HISTORY,
};
use stockflow::{Error, Phase, Result};
use tempfile::tempdir;
use time::macros::datetime;

/// Accepts everything, failing the first `fail_first` records.
struct RecordingTransport {
    fail_first: usize,
    published: Mutex<Vec<(String, StreamRecord)>>,
}

impl StreamTransport for RecordingTransport {
    fn put_records(&self, stream: &str, records: &[StreamRecord]) -> Result<PutRecordsOutput> {
        let mut published = self.published.lock().expect("lock");
        for record in records {
            published.push((stream.to_string(), record.clone()));
        }
        Ok(PutRecordsOutput {
            failed_record_count: self.fail_first.min(records.len()),
        })
    }
}

fn publisher_config() -> HashMap<String, String> {
    HashMap::from([(STREAM_NAME.to_string(), "stock-stream-raw".to_string())])
}

#[test]
fn publisher_reports_success_as_published_minus_failed() {
    let transport = Arc::new(RecordingTransport {
        fail_first: 2,
        published: Mutex::new(Vec::new()),
    });
    let clock = Arc::new(FixedClock::at(datetime!(2025-01-25 08:30:05)));
    let publisher = TickPublisher::new(transport.clone(), clock);

    let summary = publisher
        .run(&publisher_config(), &mut StdRng::seed_from_u64(5))
        .expect("publish");

    let published = transport.published.lock().expect("lock");
    assert!(published.len() >= 5 && published.len() < 16);
    assert_eq!(summary.failed_record_count, 2);
    assert_eq!(summary.success_record_count, published.len() - 2);

    for (stream, record) in published.iter() {
        assert_eq!(stream, "stock-stream-raw");
        assert_eq!(record.data.last(), Some(&b'\n'));
        let tick: Tick = serde_json::from_slice(&record.data).expect("tick json");
        assert_eq!(tick.symbol, record.partition_key);
        assert_eq!(tick.produced_at, "2025-01-25 08:30:05");
    }
}

#[test]
fn publisher_needs_stream_name() {
    let transport = Arc::new(RecordingTransport {
        fail_first: 0,
        published: Mutex::new(Vec::new()),
    });
    let clock = Arc::new(FixedClock::at(datetime!(2025-01-25 08:30:05)));
    let publisher = TickPublisher::new(transport.clone(), clock);

    let err = publisher
        .run(&HashMap::new(), &mut StdRng::seed_from_u64(5))
        .expect_err("missing stream name");
    assert_eq!(err.phase(), Some(Phase::Config));
    assert!(transport.published.lock().expect("lock").is_empty());
}

#[test]
fn publishing_to_unknown_stream_fails() {
    let dir = tempdir().expect("tempdir");
    let transport = Arc::new(FileStreamTransport::new(dir.path()));
    let clock = Arc::new(FixedClock::at(datetime!(2025-01-25 08:30:05)));
    let publisher = TickPublisher::new(transport, clock);

    let err = publisher
        .run(&publisher_config(), &mut StdRng::seed_from_u64(5))
        .expect_err("unknown stream");
    assert_eq!(err.phase(), Some(Phase::Publish));
    assert!(matches!(
        err,
        Error::Phase { ref source, .. } if matches!(**source, Error::UnknownStream(_))
    ));
}

#[test]
fn published_ticks_flow_through_delivery_into_latest_view() {
    let dir = tempdir().expect("tempdir");
    let store = Arc::new(LocalObjectStore::new(dir.path().join("objects")));
    store.create_bucket("staging").expect("staging bucket");
    store.create_bucket("lake").expect("lake bucket");
    let transport = Arc::new(FileStreamTransport::new(dir.path().join("streams")));
    transport
        .create_stream("stock-stream-raw", 2)
        .expect("create stream");

    let clock = Arc::new(FixedClock::at(datetime!(2025-01-25 08:30:05)));
    let publisher = TickPublisher::new(transport.clone(), clock.clone());
    let mut rng = StdRng::seed_from_u64(9);
    let first = publisher
        .run(&publisher_config(), &mut rng)
        .expect("first publish");
    assert_eq!(first.failed_record_count, 0);

    let staging = ObjectUri::parse_prefix("s3://staging/stream/").expect("staging prefix");
    let delivered = transport
        .deliver(
            "stock-stream-raw",
            store.as_ref(),
            &staging,
            datetime!(2025-01-25 08:31:00),
        )
        .expect("deliver")
        .expect("delivered object");

    let history_path = "s3://lake/stream_prices_history/";
    let latest_path = "s3://lake/latest_prices/";
    let catalog = TableCatalog::new()
        .with_table(
            STREAM_PRICES_HISTORY,
            &ObjectUri::parse_prefix(history_path).expect("history uri"),
        )
        .with_table(
            LATEST_PRICES,
            &ObjectUri::parse_prefix(latest_path).expect("latest uri"),
        );
    let warehouse = Arc::new(ParquetWarehouse::new(store.clone(), catalog));
    let processor = StreamProcessor::new(store.clone(), warehouse.clone(), clock);
    let config = HashMap::from([
        (DEST_BUCKET_PATH.to_string(), history_path.to_string()),
        (DEST_BUCKET_PATH_OVERWRITE.to_string(), latest_path.to_string()),
    ]);

    let event = QueueEvent::wrap(&[ObjectEvent::for_object(&delivered)]).expect("queue event");
    let summary = processor.run_queue(&config, &event).expect("process");
    assert_eq!(summary.status, RunStatus::Success);
    assert_eq!(summary.records_appended, Some(first.success_record_count));

    let view = warehouse.latest_prices().expect("latest view");
    assert_eq!(view.len(), first.success_record_count);
    assert!(view.windows(2).all(|pair| pair[0].symbol < pair[1].symbol));
}
