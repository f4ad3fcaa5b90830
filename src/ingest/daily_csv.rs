use csv::{ReaderBuilder, StringRecord, Trim};

use crate::error::{Error, Result};
use crate::model::RawDailyRow;
use crate::store::ObjectUri;

#[derive(Debug, Clone)]
struct ColumnIndices {
    company: usize,
    date: usize,
    close_price: usize,
}

impl ColumnIndices {
    fn from_headers(headers: &StringRecord, object: &ObjectUri) -> Result<Self> {
        let lookup = |name: &str| -> Result<usize> {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| Error::MissingColumn {
                    column: name.to_string(),
                    object: object.to_string(),
                })
        };

        Ok(Self {
            company: lookup("company")?,
            date: lookup("date")?,
            close_price: lookup("close_price")?,
        })
    }
}

/// Decode a daily-close CSV with a `company,date,close_price` header.
///
/// Short rows are tolerated; their missing fields read as absent and are
/// dealt with by the cleaner. A header lacking one of the columns fails the
/// whole object.
pub fn read_daily_csv(bytes: &[u8], object: &ObjectUri) -> Result<Vec<RawDailyRow>> {
    let mut csv = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(bytes);
    let headers = csv.headers()?.clone();
    let indices = ColumnIndices::from_headers(&headers, object)?;

    let mut rows = Vec::new();
    for record in csv.records() {
        let record = record?;
        // A whitespace-only line reads as one empty field; `,,` is a row.
        if record.len() == 1 && record.iter().all(str::is_empty) {
            continue;
        }
        rows.push(RawDailyRow {
            company: field(&record, indices.company),
            date: field(&record, indices.date),
            close_price: field(&record, indices.close_price),
        });
    }
    Ok(rows)
}

fn field(record: &StringRecord, index: usize) -> Option<String> {
    record
        .get(index)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
