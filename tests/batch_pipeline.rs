use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

use flate2::write::GzEncoder;
use flate2::Compression;
use rand::rngs::StdRng;
use rand::SeedableRng;
use stockflow::clock::FixedClock;
use stockflow::config::{DEST_BUCKET_PATH, PRUNE_SNAPSHOT_YEARS};
use stockflow::events::ObjectEvent;
use stockflow::handlers::{BatchGenerator, BatchProcessor, RunStatus};
use stockflow::model::PersistedClose;
use stockflow::store::{LocalObjectStore, ObjectStore, ObjectUri};
use stockflow::table::YearFilter;
use stockflow::warehouse::{ParquetWarehouse, TableCatalog, Warehouse, PRICE_BY_DATE};
use tempfile::{tempdir, TempDir};
use time::macros::{date, datetime};

const LAKE_PATH: &str = "s3://lake/price_by_date/";

struct Fixture {
    _dir: TempDir,
    store: Arc<LocalObjectStore>,
    warehouse: Arc<ParquetWarehouse>,
    processor: BatchProcessor,
}

fn fixture() -> Fixture {
    let dir = tempdir().expect("tempdir");
    let store = Arc::new(LocalObjectStore::new(dir.path()));
    store.create_bucket("staging").expect("staging bucket");
    store.create_bucket("lake").expect("lake bucket");
    let catalog = TableCatalog::new().with_table(
        PRICE_BY_DATE,
        &ObjectUri::parse_prefix(LAKE_PATH).expect("lake uri"),
    );
    let warehouse = Arc::new(ParquetWarehouse::new(store.clone(), catalog));
    let clock = Arc::new(FixedClock::at(datetime!(2025-01-25 08:00:00)));
    let processor = BatchProcessor::new(store.clone(), warehouse.clone(), clock);
    Fixture {
        _dir: dir,
        store,
        warehouse,
        processor,
    }
}

fn config() -> HashMap<String, String> {
    HashMap::from([(DEST_BUCKET_PATH.to_string(), LAKE_PATH.to_string())])
}

fn stage(store: &LocalObjectStore, key: &str, body: &[u8]) -> ObjectEvent {
    let uri = ObjectUri::new("staging", key).expect("staging uri");
    store.put(&uri, body).expect("stage object");
    ObjectEvent::for_object(&uri)
}

fn persisted(warehouse: &ParquetWarehouse) -> Vec<PersistedClose> {
    warehouse.daily_closes(&YearFilter::All).expect("scan")
}

#[test]
fn new_row_is_appended_under_its_year() {
    let fx = fixture();
    let event = stage(
        &fx.store,
        "batch/20250125080000.csv",
        b"company,date,close_price\nAAPL,2024-01-01,200\n",
    );

    let summary = fx.processor.run(&config(), &event).expect("run");
    assert_eq!(summary.status, RunStatus::Success);
    assert_eq!(summary.records_appended, Some(1));

    let rows = persisted(&fx.warehouse);
    assert_eq!(
        rows,
        vec![PersistedClose {
            company: "AAPL".to_string(),
            close_date: date!(2024 - 01 - 01),
            close_price: Some(200),
            partition_year: 2024,
        }]
    );
    let objects = fx
        .store
        .list(&ObjectUri::parse_prefix(LAKE_PATH).expect("prefix"))
        .expect("list");
    assert_eq!(objects.len(), 1);
    assert!(objects[0]
        .key()
        .starts_with("price_by_date/p_year=2024/part-"));
}

#[test]
fn rerun_appends_nothing() {
    let fx = fixture();
    let event = stage(
        &fx.store,
        "batch/a.csv",
        b"company,date,close_price\nAAPL,2024-01-01,200\nMSFT,2024-01-01,440\n",
    );

    let first = fx.processor.run(&config(), &event).expect("first run");
    assert_eq!(first.records_appended, Some(2));

    let second = fx.processor.run(&config(), &event).expect("second run");
    assert_eq!(second.status, RunStatus::SuccessWithWarning);
    assert_eq!(second.records_appended, Some(0));
    assert_eq!(persisted(&fx.warehouse).len(), 2);
}

#[test]
fn only_unseen_keys_are_appended() {
    let fx = fixture();
    let first = stage(
        &fx.store,
        "batch/a.csv",
        b"company,date,close_price\nAAPL,2024-01-01,200\n",
    );
    fx.processor.run(&config(), &first).expect("seed run");

    let second = stage(
        &fx.store,
        "batch/b.csv",
        b"company,date,close_price\nAAPL,2024-01-01,205\nAAPL,2023-06-30,180\n",
    );
    let summary = fx.processor.run(&config(), &second).expect("run");
    assert_eq!(summary.status, RunStatus::SuccessWithWarning);
    assert_eq!(summary.records_appended, Some(1));

    let mut rows = persisted(&fx.warehouse);
    rows.sort_by_key(|row| row.close_date);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].close_date, date!(2023 - 06 - 30));
    assert_eq!(rows[0].partition_year, 2023);
    assert_eq!(rows[1].close_price, Some(200));
}

#[test]
fn pruned_snapshot_gives_same_delta() {
    let fx = fixture();
    let seed = stage(
        &fx.store,
        "batch/a.csv",
        b"company,date,close_price\nAAPL,2022-03-01,150\nAAPL,2024-01-01,200\n",
    );
    fx.processor.run(&config(), &seed).expect("seed run");

    let mut pruned = config();
    pruned.insert(PRUNE_SNAPSHOT_YEARS.to_string(), "true".to_string());
    let event = stage(
        &fx.store,
        "batch/b.csv",
        b"company,date,close_price\nAAPL,2024-01-01,200\nNVDA,2024-01-01,140\n",
    );
    let summary = fx.processor.run(&pruned, &event).expect("pruned run");
    assert_eq!(summary.records_appended, Some(1));
    assert_eq!(persisted(&fx.warehouse).len(), 3);
}

#[test]
fn header_only_file_short_circuits() {
    let fx = fixture();
    let event = stage(&fx.store, "batch/empty.csv", b"company,date,close_price\n");
    let summary = fx.processor.run(&config(), &event).expect("run");
    assert_eq!(summary.status, RunStatus::SuccessWithWarning);
    assert_eq!(summary.records_appended, Some(0));
    assert!(persisted(&fx.warehouse).is_empty());
}

#[test]
fn bad_rows_are_dropped_and_downgrade_status() {
    let fx = fixture();
    let event = stage(
        &fx.store,
        "batch/mixed.csv",
        b"company,date,close_price\nAAPL,2024-01-01,200\nMSFT,not-a-date,abc\nNVDA,2024-01-01,\n",
    );
    let summary = fx.processor.run(&config(), &event).expect("run");
    assert_eq!(summary.status, RunStatus::SuccessWithWarning);
    assert_eq!(summary.records_appended, Some(1));
}

#[test]
fn delimiter_only_row_counts_as_bad() {
    let fx = fixture();
    let event = stage(
        &fx.store,
        "batch/blank.csv",
        b"company,date,close_price\nAAPL,2024-01-01,200\n,,\n",
    );
    let summary = fx.processor.run(&config(), &event).expect("run");
    assert_eq!(summary.status, RunStatus::SuccessWithWarning);
    assert_eq!(summary.records_appended, Some(1));
    assert_eq!(persisted(&fx.warehouse).len(), 1);
}

#[test]
fn offset_date_keeps_its_local_day_and_year() {
    let fx = fixture();
    let event = stage(
        &fx.store,
        "batch/offset.csv",
        b"company,date,close_price\nAAPL,2024-12-31T23:30:00-01:00,200\n",
    );
    let summary = fx.processor.run(&config(), &event).expect("run");
    assert_eq!(summary.status, RunStatus::Success);

    let rows = persisted(&fx.warehouse);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].close_date, date!(2024 - 12 - 31));
    assert_eq!(rows[0].partition_year, 2024);
}

#[test]
fn gzipped_objects_are_decoded() {
    let fx = fixture();
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(b"company,date,close_price\nAAPL,2024-01-01,200\n")
        .expect("gzip");
    let event = stage(&fx.store, "batch/a.csv.gz", &encoder.finish().expect("gzip"));
    let summary = fx.processor.run(&config(), &event).expect("run");
    assert_eq!(summary.status, RunStatus::Success);
}

#[test]
fn missing_destination_fails_in_config_phase() {
    let fx = fixture();
    let event = stage(
        &fx.store,
        "batch/a.csv",
        b"company,date,close_price\nAAPL,2024-01-01,200\n",
    );
    let err = fx
        .processor
        .run(&HashMap::new(), &event)
        .expect_err("missing config");
    assert_eq!(err.phase(), Some(stockflow::Phase::Config));
    assert_eq!(err.kind(), "MissingConfig");
}

#[test]
fn missing_column_fails_the_batch() {
    let fx = fixture();
    let event = stage(&fx.store, "batch/a.csv", b"company,date\nAAPL,2024-01-01\n");
    let err = fx.processor.run(&config(), &event).expect_err("missing column");
    assert_eq!(err.phase(), Some(stockflow::Phase::Read));
    assert_eq!(err.kind(), "MissingColumn");
}

#[test]
fn missing_object_fails_in_read_phase() {
    let fx = fixture();
    let uri = ObjectUri::new("staging", "batch/nope.csv").expect("uri");
    let err = fx
        .processor
        .run(&config(), &ObjectEvent::for_object(&uri))
        .expect_err("missing object");
    assert_eq!(err.phase(), Some(stockflow::Phase::Read));
}

#[test]
fn generated_batch_processes_end_to_end() {
    let fx = fixture();
    let clock = Arc::new(FixedClock::at(datetime!(2025-01-25 08:03:09)));
    let generator = BatchGenerator::new(fx.store.clone(), clock);
    let staging = HashMap::from([(
        DEST_BUCKET_PATH.to_string(),
        "s3://staging/batch/".to_string(),
    )]);

    let batch = generator
        .run(&staging, &mut StdRng::seed_from_u64(3))
        .expect("generate");
    assert_eq!(batch.object, "s3://staging/batch/20250125080309.csv");
    assert_eq!(batch.rows, 16);

    let uri = ObjectUri::parse(&batch.object).expect("object uri");
    let summary = fx
        .processor
        .run(&config(), &ObjectEvent::for_object(&uri))
        .expect("process");
    assert_eq!(summary.status, RunStatus::Success);
    assert_eq!(summary.records_appended, Some(16));
}
