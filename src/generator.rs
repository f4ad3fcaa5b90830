//! Synthetic daily closes and ticks.

use rand::Rng;
use time::macros::{date, format_description};
use time::{Date, Duration, PrimitiveDateTime};

use crate::error::{Error, Result};
use crate::model::{GeneratedClose, Tick};

/// Reference price per symbol; generated prices stay within 10% of it.
pub const REFERENCE_PRICES: [(&str, i64); 16] = [
    ("NVDA", 143),
    ("AAPL", 223),
    ("MSFT", 444),
    ("AMZN", 234),
    ("GOOGL", 200),
    ("META", 647),
    ("TSLA", 407),
    ("WMT", 95),
    ("JPM", 265),
    ("V", 330),
    ("ORCL", 184),
    ("MA", 490),
    ("XOM", 109),
    ("NFLX", 978),
    ("PG", 164),
    ("SAP", 276),
];

/// Close dates are drawn from `[FIRST_CLOSE_DATE, LAST_CLOSE_DATE)`.
pub const FIRST_CLOSE_DATE: Date = date!(2022 - 01 - 01);
pub const LAST_CLOSE_DATE: Date = date!(2024 - 12 - 31);

/// Ticks per publish are drawn from `[MIN_TICKS, MAX_TICKS)`.
pub const MIN_TICKS: usize = 5;
pub const MAX_TICKS: usize = 16;

/// Half-open `[min, max)` range a price is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceBand {
    pub min: i64,
    pub max: i64,
}

impl PriceBand {
    /// `floor(0.9 * reference)` to `floor(1.1 * reference)`.
    pub fn around(reference: i64) -> Self {
        Self {
            min: reference * 9 / 10,
            max: reference * 11 / 10,
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> i64 {
        if self.max > self.min {
            rng.random_range(self.min..self.max)
        } else {
            self.min
        }
    }
}

pub fn random_close_date<R: Rng + ?Sized>(rng: &mut R) -> Date {
    let span = (LAST_CLOSE_DATE - FIRST_CLOSE_DATE).whole_days();
    FIRST_CLOSE_DATE + Duration::days(rng.random_range(0..span))
}

/// One close per reference symbol, all sharing a single random date.
pub fn generate_daily_closes<R: Rng + ?Sized>(rng: &mut R) -> (Date, Vec<GeneratedClose>) {
    let close_date = random_close_date(rng);
    let date = format_date(close_date);
    let rows = REFERENCE_PRICES
        .iter()
        .map(|(symbol, reference)| GeneratedClose {
            company: symbol.to_string(),
            date: date.clone(),
            close_price: PriceBand::around(*reference).sample(rng),
        })
        .collect();
    (close_date, rows)
}

/// CSV with a `company,date,close_price` header.
pub fn encode_daily_csv(rows: &[GeneratedClose]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    writer
        .into_inner()
        .map_err(|err| Error::Io(err.into_error()))
}

/// Prices every symbol, then keeps a random subset of `[MIN_TICKS,
/// MAX_TICKS)` of them. All ticks share `produced_at`.
pub fn generate_ticks<R: Rng + ?Sized>(rng: &mut R, produced_at: PrimitiveDateTime) -> Vec<Tick> {
    let produced_at = format_timestamp(produced_at);
    let priced: Vec<Tick> = REFERENCE_PRICES
        .iter()
        .map(|(symbol, reference)| Tick {
            symbol: symbol.to_string(),
            price: PriceBand::around(*reference).sample(rng),
            produced_at: produced_at.clone(),
        })
        .collect();
    let amount = rng.random_range(MIN_TICKS..MAX_TICKS).min(priced.len());
    rand::seq::index::sample(rng, priced.len(), amount)
        .into_iter()
        .map(|index| priced[index].clone())
        .collect()
}

/// One JSON object followed by a newline.
pub fn encode_tick(tick: &Tick) -> Result<Vec<u8>> {
    let mut line = serde_json::to_vec(tick)?;
    line.push(b'\n');
    Ok(line)
}

/// `YYYYmmddHHMMSS.csv`
pub fn batch_file_name(now: PrimitiveDateTime) -> String {
    format!("{}.csv", compact_timestamp(now))
}

pub fn compact_timestamp(ts: PrimitiveDateTime) -> String {
    format!(
        "{:04}{:02}{:02}{:02}{:02}{:02}",
        ts.year(),
        u8::from(ts.month()),
        ts.day(),
        ts.hour(),
        ts.minute(),
        ts.second()
    )
}

fn format_date(date: Date) -> String {
    date.format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| date.to_string())
}

fn format_timestamp(ts: PrimitiveDateTime) -> String {
    ts.format(format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second]"
    ))
    .unwrap_or_else(|_| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;
    use time::macros::datetime;

    #[test]
    fn bands_floor_both_ends() {
        assert_eq!(PriceBand::around(143), PriceBand { min: 128, max: 157 });
        assert_eq!(PriceBand::around(95), PriceBand { min: 85, max: 104 });
    }

    #[test]
    fn daily_closes_stay_in_band_and_share_a_date() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let (close_date, rows) = generate_daily_closes(&mut rng);
            assert!(close_date >= FIRST_CLOSE_DATE && close_date < LAST_CLOSE_DATE);
            assert_eq!(rows.len(), REFERENCE_PRICES.len());
            for (row, (symbol, reference)) in rows.iter().zip(REFERENCE_PRICES.iter()) {
                let band = PriceBand::around(*reference);
                assert_eq!(row.company, *symbol);
                assert_eq!(row.date, format_date(close_date));
                assert!(row.close_price >= band.min && row.close_price < band.max);
            }
        }
    }

    #[test]
    fn csv_has_expected_header() {
        let rows = vec![GeneratedClose {
            company: "AAPL".to_string(),
            date: "2024-01-01".to_string(),
            close_price: 200,
        }];
        let csv = String::from_utf8(encode_daily_csv(&rows).unwrap()).unwrap();
        assert_eq!(csv, "company,date,close_price\nAAPL,2024-01-01,200\n");
    }

    #[test]
    fn ticks_are_distinct_symbols_with_shared_timestamp() {
        let mut rng = StdRng::seed_from_u64(11);
        let now = datetime!(2025-01-25 08:30:05.250);
        for _ in 0..50 {
            let ticks = generate_ticks(&mut rng, now);
            assert!(ticks.len() >= MIN_TICKS && ticks.len() < MAX_TICKS);
            let symbols: HashSet<_> = ticks.iter().map(|tick| tick.symbol.as_str()).collect();
            assert_eq!(symbols.len(), ticks.len());
            assert!(ticks
                .iter()
                .all(|tick| tick.produced_at == "2025-01-25 08:30:05"));
        }
    }

    #[test]
    fn tick_line_ends_with_newline() {
        let tick = Tick {
            symbol: "NVDA".to_string(),
            price: 150,
            produced_at: "2025-01-25 08:30:05".to_string(),
        };
        let line = encode_tick(&tick).unwrap();
        assert_eq!(
            line,
            b"{\"symbol\":\"NVDA\",\"price\":150,\"produced_at\":\"2025-01-25 08:30:05\"}\n"
        );
    }

    #[test]
    fn batch_file_name_is_compact_timestamp() {
        assert_eq!(
            batch_file_name(datetime!(2025-01-25 08:03:09)),
            "20250125080309.csv"
        );
    }
}
