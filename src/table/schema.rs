//! Arrow schemas of the persisted datasets and row conversions.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Date32Array, Int64Array, StringArray, TimestampMicrosecondArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::record_batch::RecordBatch;
use time::{Date, OffsetDateTime, PrimitiveDateTime};

use crate::error::{Error, Result};
use crate::model::{BatchRecord, LatestPrice, PersistedClose, PriceRecord};

const UNIX_EPOCH_JULIAN_DAY: i32 = 2_440_588;
const TIMESTAMP: DataType = DataType::Timestamp(TimeUnit::Microsecond, None);

/// Rows that can be written to a dataset.
pub trait Encode: Sized {
    fn schema() -> SchemaRef;

    /// Year partition the row belongs to; `None` for unpartitioned datasets.
    fn partition_year(&self) -> Option<i32>;

    fn encode(rows: &[&Self]) -> Result<RecordBatch>;
}

/// Rows that can be read back from a dataset.
pub trait Decode: Sized {
    fn decode(batch: &RecordBatch, partition_year: Option<i32>) -> Result<Vec<Self>>;
}

/// `price_by_date`: company, close_date, close_price.
pub fn daily_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("company", DataType::Utf8, true),
        Field::new("close_date", DataType::Date32, true),
        Field::new("close_price", DataType::Int64, true),
    ]))
}

/// `stream_prices_history` and `latest_prices`.
pub fn tick_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("symbol", DataType::Utf8, true),
        Field::new("price", DataType::Int64, true),
        Field::new("produced_at", TIMESTAMP, true),
        Field::new("etl_loading_ts", TIMESTAMP, true),
    ]))
}

pub fn date_to_days(date: Date) -> i32 {
    date.to_julian_day() - UNIX_EPOCH_JULIAN_DAY
}

pub fn days_to_date(days: i32) -> Option<Date> {
    Date::from_julian_day(days.checked_add(UNIX_EPOCH_JULIAN_DAY)?).ok()
}

pub fn to_micros(ts: PrimitiveDateTime) -> i64 {
    (ts.assume_utc().unix_timestamp_nanos() / 1_000) as i64
}

pub fn from_micros(micros: i64) -> Option<PrimitiveDateTime> {
    let dt = OffsetDateTime::from_unix_timestamp_nanos(i128::from(micros) * 1_000).ok()?;
    Some(PrimitiveDateTime::new(dt.date(), dt.time()))
}

impl Encode for BatchRecord {
    fn schema() -> SchemaRef {
        daily_schema()
    }

    fn partition_year(&self) -> Option<i32> {
        Some(self.partition_year)
    }

    fn encode(rows: &[&Self]) -> Result<RecordBatch> {
        let columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|row| row.company.as_str()),
            )),
            Arc::new(Date32Array::from(
                rows.iter()
                    .map(|row| date_to_days(row.close_date))
                    .collect::<Vec<_>>(),
            )),
            Arc::new(Int64Array::from(
                rows.iter().map(|row| row.close_price).collect::<Vec<_>>(),
            )),
        ];
        Ok(RecordBatch::try_new(Self::schema(), columns)?)
    }
}

impl Encode for PriceRecord {
    fn schema() -> SchemaRef {
        tick_schema()
    }

    fn partition_year(&self) -> Option<i32> {
        Some(self.partition_year)
    }

    fn encode(rows: &[&Self]) -> Result<RecordBatch> {
        encode_ticks(rows.iter().map(|row| {
            (
                row.symbol.as_str(),
                row.price,
                row.observed_at,
                row.loaded_at,
            )
        }))
    }
}

impl Encode for LatestPrice {
    fn schema() -> SchemaRef {
        tick_schema()
    }

    fn partition_year(&self) -> Option<i32> {
        None
    }

    fn encode(rows: &[&Self]) -> Result<RecordBatch> {
        encode_ticks(rows.iter().map(|row| {
            (
                row.symbol.as_str(),
                row.price,
                row.observed_at,
                row.loaded_at,
            )
        }))
    }
}

fn encode_ticks<'a>(
    rows: impl Iterator<Item = (&'a str, i64, PrimitiveDateTime, PrimitiveDateTime)>,
) -> Result<RecordBatch> {
    let mut symbols = Vec::new();
    let mut prices = Vec::new();
    let mut produced = Vec::new();
    let mut loaded = Vec::new();
    for (symbol, price, observed_at, loaded_at) in rows {
        symbols.push(symbol);
        prices.push(price);
        produced.push(to_micros(observed_at));
        loaded.push(to_micros(loaded_at));
    }
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(symbols)),
        Arc::new(Int64Array::from(prices)),
        Arc::new(TimestampMicrosecondArray::from(produced)),
        Arc::new(TimestampMicrosecondArray::from(loaded)),
    ];
    Ok(RecordBatch::try_new(tick_schema(), columns)?)
}

impl Decode for PersistedClose {
    fn decode(batch: &RecordBatch, partition_year: Option<i32>) -> Result<Vec<Self>> {
        let partition_year = require_partition(partition_year)?;
        let company = column(batch, "company", &DataType::Utf8)?;
        let close_date = column(batch, "close_date", &DataType::Date32)?;
        let close_price = column(batch, "close_price", &DataType::Int64)?;
        let company = downcast::<StringArray>(&company, "company")?;
        let close_date = downcast::<Date32Array>(&close_date, "close_date")?;
        let close_price = downcast::<Int64Array>(&close_price, "close_price")?;

        let mut rows = Vec::with_capacity(batch.num_rows());
        for i in 0..batch.num_rows() {
            // A row without a key can never match an incoming one.
            if company.is_null(i) || close_date.is_null(i) {
                continue;
            }
            rows.push(PersistedClose {
                company: company.value(i).to_string(),
                close_date: days_to_date(close_date.value(i))
                    .ok_or_else(|| out_of_range("close_date"))?,
                close_price: (!close_price.is_null(i)).then(|| close_price.value(i)),
                partition_year,
            });
        }
        Ok(rows)
    }
}

impl Decode for PriceRecord {
    fn decode(batch: &RecordBatch, partition_year: Option<i32>) -> Result<Vec<Self>> {
        let partition_year = require_partition(partition_year)?;
        Ok(decode_ticks(batch)?
            .into_iter()
            .map(|(symbol, price, observed_at, loaded_at)| PriceRecord {
                symbol,
                price,
                observed_at,
                loaded_at,
                partition_year,
            })
            .collect())
    }
}

impl Decode for LatestPrice {
    fn decode(batch: &RecordBatch, _partition_year: Option<i32>) -> Result<Vec<Self>> {
        Ok(decode_ticks(batch)?
            .into_iter()
            .map(|(symbol, price, observed_at, loaded_at)| LatestPrice {
                symbol,
                price,
                observed_at,
                loaded_at,
            })
            .collect())
    }
}

fn decode_ticks(
    batch: &RecordBatch,
) -> Result<Vec<(String, i64, PrimitiveDateTime, PrimitiveDateTime)>> {
    let symbol = column(batch, "symbol", &DataType::Utf8)?;
    let price = column(batch, "price", &DataType::Int64)?;
    let produced_at = column(batch, "produced_at", &TIMESTAMP)?;
    let loaded_at = column(batch, "etl_loading_ts", &TIMESTAMP)?;
    let symbol = downcast::<StringArray>(&symbol, "symbol")?;
    let price = downcast::<Int64Array>(&price, "price")?;
    let produced_at = downcast::<TimestampMicrosecondArray>(&produced_at, "produced_at")?;
    let loaded_at = downcast::<TimestampMicrosecondArray>(&loaded_at, "etl_loading_ts")?;

    let mut rows = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        if symbol.is_null(i) || price.is_null(i) || produced_at.is_null(i) || loaded_at.is_null(i)
        {
            continue;
        }
        rows.push((
            symbol.value(i).to_string(),
            price.value(i),
            from_micros(produced_at.value(i)).ok_or_else(|| out_of_range("produced_at"))?,
            from_micros(loaded_at.value(i)).ok_or_else(|| out_of_range("etl_loading_ts"))?,
        ));
    }
    Ok(rows)
}

fn require_partition(partition_year: Option<i32>) -> Result<i32> {
    partition_year.ok_or_else(|| {
        Error::InvalidPartition("file is not stored under a p_year partition".to_string())
    })
}

fn column(batch: &RecordBatch, name: &str, data_type: &DataType) -> Result<ArrayRef> {
    let array = batch
        .column_by_name(name)
        .ok_or_else(|| Error::MissingColumn {
            column: name.to_string(),
            object: "parquet file".to_string(),
        })?;
    if array.data_type() == data_type {
        Ok(Arc::clone(array))
    } else {
        Ok(cast(array, data_type)?)
    }
}

fn downcast<'a, T: Array + 'static>(array: &'a ArrayRef, name: &str) -> Result<&'a T> {
    array
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| Error::MalformedRecord {
            object: "parquet file".to_string(),
            reason: format!("column {name} has unexpected type"),
        })
}

fn out_of_range(column: &str) -> Error {
    Error::MalformedRecord {
        object: "parquet file".to_string(),
        reason: format!("{column} value out of range"),
    }
}
