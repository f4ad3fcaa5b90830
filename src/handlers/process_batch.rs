use std::sync::Arc;

use log::{debug, info, warn};

use crate::clean::clean_daily;
use crate::clock::Clock;
use crate::config::{BatchProcessorConfig, ConfigSource};
use crate::delta::{batch_years, daily_delta};
use crate::error::{Phase, Result};
use crate::events::ObjectEvent;
use crate::ingest::read_daily_csv;
use crate::store::{read_decoded, ObjectStore};
use crate::table::{Dataset, YearFilter};
use crate::warehouse::{Warehouse, PRICE_BY_DATE};

use super::{fail, RunStatus, RunSummary, Stopwatch};

/// Appends the daily closes of a staged CSV that `price_by_date` does not
/// hold yet.
pub struct BatchProcessor {
    store: Arc<dyn ObjectStore>,
    warehouse: Arc<dyn Warehouse>,
    clock: Arc<dyn Clock>,
}

impl BatchProcessor {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        warehouse: Arc<dyn Warehouse>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            warehouse,
            clock,
        }
    }

    /// Process the object named by the first record of `event`.
    ///
    /// The status is `success` only when every ingested row was appended.
    pub fn run(&self, config: &dyn ConfigSource, event: &ObjectEvent) -> Result<RunSummary> {
        let timer = Stopwatch::start();
        let source = event.first_object().map_err(fail(Phase::Read))?;
        let config = BatchProcessorConfig::resolve(config).map_err(fail(Phase::Config))?;

        debug!("reading {}", source);
        let bytes = read_decoded(self.store.as_ref(), &source).map_err(fail(Phase::Read))?;
        let raw = read_daily_csv(&bytes, &source).map_err(fail(Phase::Read))?;
        let ingested = raw.len();
        if ingested == 0 {
            warn!("Ingested file is empty. Exiting job early.");
            return Ok(RunSummary::completed(
                RunStatus::SuccessWithWarning,
                0,
                timer.elapsed(),
            ));
        }
        info!("reading from {source} successful. {ingested} records ingested");

        let cleaned = clean_daily(raw);
        let years = if config.prune_snapshot_years {
            YearFilter::Years(batch_years(&cleaned.rows))
        } else {
            YearFilter::All
        };
        let snapshot = self
            .warehouse
            .daily_closes(&years)
            .map_err(fail(Phase::Query))?;
        debug!("{} rows read from {PRICE_BY_DATE}", snapshot.len());

        let delta = daily_delta(&cleaned.rows, &snapshot);
        if delta.is_empty() {
            warn!(
                "No new records found after comparing the ingested data with {PRICE_BY_DATE}. Total time taken: {} seconds",
                timer.elapsed().as_secs()
            );
            return Ok(RunSummary::completed(
                RunStatus::SuccessWithWarning,
                0,
                timer.elapsed(),
            ));
        }
        info!("{} records will be appended", delta.len());

        let dataset = Dataset::new(Arc::clone(&self.store), config.dest_path);
        let outcome = dataset
            .append(&delta, self.clock.now())
            .map_err(fail(Phase::Write))?;

        let difference = ingested.saturating_sub(outcome.rows);
        let status = if difference == 0 {
            info!(
                "all records ({}) got appended successfully to {PRICE_BY_DATE}",
                outcome.rows
            );
            RunStatus::Success
        } else {
            warn!("destination records are less than the source records by {difference}");
            info!(
                "{}/{ingested} records got appended successfully to {PRICE_BY_DATE}",
                outcome.rows
            );
            RunStatus::SuccessWithWarning
        };
        Ok(RunSummary::completed(status, outcome.rows, timer.elapsed()))
    }
}
