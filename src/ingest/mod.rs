//! Decoding of staged objects into raw, untyped rows.

mod daily_csv;
mod tick_lines;

pub use daily_csv::read_daily_csv;
pub use tick_lines::{read_tick_lines, require_tick_columns};
