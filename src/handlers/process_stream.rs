use std::sync::Arc;

use log::{debug, info, warn};

use crate::clean::clean_ticks;
use crate::clock::Clock;
use crate::config::{ConfigSource, StreamProcessorConfig};
use crate::delta::latest_per_symbol;
use crate::error::{Phase, Result};
use crate::events::{ObjectEvent, QueueEvent};
use crate::ingest::{read_tick_lines, require_tick_columns};
use crate::store::{read_decoded, ObjectStore, ObjectUri};
use crate::table::Dataset;
use crate::warehouse::{Warehouse, LATEST_PRICES, STREAM_PRICES_HISTORY};

use super::{fail, RunStatus, RunSummary, Stopwatch};

/// Appends delivered ticks to the history dataset and rebuilds the
/// latest-price view.
pub struct StreamProcessor {
    store: Arc<dyn ObjectStore>,
    warehouse: Arc<dyn Warehouse>,
    clock: Arc<dyn Clock>,
}

impl StreamProcessor {
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

    /// Process every object referenced by a queue event.
    pub fn run_queue(&self, config: &dyn ConfigSource, event: &QueueEvent) -> Result<RunSummary> {
        let timer = Stopwatch::start();
        let config = self.prepare(config)?;

        info!("The input event has {} messages", event.records.len());
        if event.is_empty() {
            warn!("No queue messages received, exiting.");
            return Ok(RunSummary::no_messages());
        }
        let objects = event.objects().map_err(fail(Phase::Read))?;
        if objects.is_empty() {
            warn!("Queue messages reference no objects, exiting.");
            return Ok(RunSummary::no_messages());
        }
        self.process(&config, &objects, &timer)
    }

    /// Process the object named by the first record of a direct
    /// notification.
    pub fn run_object(&self, config: &dyn ConfigSource, event: &ObjectEvent) -> Result<RunSummary> {
        let timer = Stopwatch::start();
        let source = event.first_object().map_err(fail(Phase::Read))?;
        let config = self.prepare(config)?;
        self.process(&config, &[source], &timer)
    }

    fn prepare(&self, config: &dyn ConfigSource) -> Result<StreamProcessorConfig> {
        let config = StreamProcessorConfig::resolve(config).map_err(fail(Phase::Config))?;
        self.warehouse
            .probe(&[STREAM_PRICES_HISTORY, LATEST_PRICES])
            .map_err(fail(Phase::Connectivity))?;
        Ok(config)
    }

    fn process(
        &self,
        config: &StreamProcessorConfig,
        objects: &[ObjectUri],
        timer: &Stopwatch,
    ) -> Result<RunSummary> {
        let mut raw = Vec::new();
        for object in objects {
            debug!("reading {}", object);
            let bytes = read_decoded(self.store.as_ref(), object).map_err(fail(Phase::Read))?;
            raw.extend(read_tick_lines(&bytes, object).map_err(fail(Phase::Read))?);
        }
        let sources = objects
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        require_tick_columns(&raw, &sources).map_err(fail(Phase::Read))?;

        if raw.is_empty() {
            warn!("Ingested file is empty. Exiting job early.");
            return Ok(RunSummary::completed(
                RunStatus::SuccessWithWarning,
                0,
                timer.elapsed(),
            ));
        }

        let ingested = raw.len();
        let now = self.clock.now();
        let loaded_at = self.clock.now_naive();
        let cleaned = clean_ticks(raw, loaded_at);
        if cleaned.rows.is_empty() {
            warn!("all {ingested} ingested records are invalid, nothing to append");
            return Ok(RunSummary::completed(
                RunStatus::SuccessWithWarning,
                0,
                timer.elapsed(),
            ));
        }

        let history = Dataset::new(Arc::clone(&self.store), config.history_path.clone());
        let appended = history
            .append(&cleaned.rows, now)
            .map_err(fail(Phase::Write))?;

        let scanned = self
            .warehouse
            .stream_history()
            .map_err(fail(Phase::Query))?;
        let latest = latest_per_symbol(&scanned, loaded_at);
        let view = Dataset::new(Arc::clone(&self.store), config.latest_path.clone());
        view.overwrite(&latest, now).map_err(fail(Phase::Write))?;
        debug!("{} symbols in {LATEST_PRICES}", latest.len());

        let status = if cleaned.is_clean() {
            info!(
                "all records ({}) got appended successfully to {STREAM_PRICES_HISTORY} and overwritten in {LATEST_PRICES}",
                appended.rows
            );
            RunStatus::Success
        } else {
            warn!(
                "destination records are less than the source records by {}",
                ingested - appended.rows
            );
            info!(
                "{}/{ingested} records got appended successfully to {STREAM_PRICES_HISTORY} and overwritten in {LATEST_PRICES}",
                appended.rows
            );
            RunStatus::SuccessWithWarning
        };
        Ok(RunSummary::completed(status, appended.rows, timer.elapsed()))
    }
}
