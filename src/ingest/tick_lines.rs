use serde_json::Value;

use crate::error::{Error, Result};
use crate::model::RawTick;
use crate::store::ObjectUri;

/// Decode newline-delimited JSON ticks. Blank lines are skipped; a line that
/// is not a JSON object fails the whole object.
pub fn read_tick_lines(bytes: &[u8], object: &ObjectUri) -> Result<Vec<RawTick>> {
    let text = std::str::from_utf8(bytes).map_err(|err| Error::MalformedRecord {
        object: object.to_string(),
        reason: err.to_string(),
    })?;

    let mut rows = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(line).map_err(|err| Error::MalformedRecord {
            object: object.to_string(),
            reason: format!("line {}: {err}", line_no + 1),
        })?;
        let Value::Object(mut fields) = value else {
            return Err(Error::MalformedRecord {
                object: object.to_string(),
                reason: format!("line {}: expected a JSON object", line_no + 1),
            });
        };
        rows.push(RawTick {
            symbol: fields.remove("symbol"),
            price: fields.remove("price"),
            produced_at: fields.remove("produced_at"),
        });
    }
    Ok(rows)
}

/// Fail when a required field appears on none of the rows of a non-empty
/// batch, mirroring a column missing from the combined frame.
pub fn require_tick_columns(rows: &[RawTick], source: &str) -> Result<()> {
    if rows.is_empty() {
        return Ok(());
    }
    let checks: [(&str, fn(&RawTick) -> bool); 3] = [
        ("symbol", |row| row.symbol.is_some()),
        ("price", |row| row.price.is_some()),
        ("produced_at", |row| row.produced_at.is_some()),
    ];
    for (column, present) in checks {
        if !rows.iter().any(present) {
            return Err(Error::MissingColumn {
                column: column.to_string(),
                object: source.to_string(),
            });
        }
    }
    Ok(())
}
