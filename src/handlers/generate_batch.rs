use std::sync::Arc;

use log::{debug, info};
use rand::Rng;
use serde::Serialize;

use crate::clock::Clock;
use crate::config::{ConfigSource, GeneratorConfig};
use crate::error::{Phase, Result};
use crate::generator::{batch_file_name, encode_daily_csv, generate_daily_closes};
use crate::store::{ObjectStore, ObjectUri};

use super::fail;

/// Describes the staged CSV.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedBatch {
    pub object: String,
    pub rows: usize,
    pub close_date: String,
}

/// Writes one CSV of random daily closes to the staging area.
pub struct BatchGenerator {
    store: Arc<dyn ObjectStore>,
    clock: Arc<dyn Clock>,
}

impl BatchGenerator {
    pub fn new(store: Arc<dyn ObjectStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn run<R: Rng + ?Sized>(
        &self,
        config: &dyn ConfigSource,
        rng: &mut R,
    ) -> Result<GeneratedBatch> {
        let (close_date, rows) = generate_daily_closes(rng);
        let csv = encode_daily_csv(&rows).map_err(fail(Phase::Write))?;
        debug!("generated {} closes for {}", rows.len(), close_date);

        let config = GeneratorConfig::resolve(config).map_err(fail(Phase::Config))?;
        let object: ObjectUri = config
            .staging_path
            .join(&batch_file_name(self.clock.now_naive()))
            .map_err(fail(Phase::Config))?;
        self.store.put(&object, &csv).map_err(fail(Phase::Write))?;

        let close_date = rows
            .first()
            .map(|row| row.date.clone())
            .unwrap_or_else(|| close_date.to_string());
        info!(
            "file exported to {} with {} records and stock close_date {}",
            object,
            rows.len(),
            close_date
        );
        Ok(GeneratedBatch {
            object: object.to_string(),
            rows: rows.len(),
            close_date,
        })
    }
}
