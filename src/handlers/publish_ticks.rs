use std::sync::Arc;

use log::info;
use rand::Rng;
use serde::Serialize;

use crate::clock::Clock;
use crate::config::{ConfigSource, PublisherConfig};
use crate::error::{Phase, Result};
use crate::generator::{encode_tick, generate_ticks};
use crate::transport::{StreamRecord, StreamTransport};

use super::{fail, Stopwatch};

/// Result of one publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PublishSummary {
    pub failed_record_count: usize,
    pub success_record_count: usize,
}

/// Pushes a random batch of ticks onto the configured stream.
pub struct TickPublisher {
    transport: Arc<dyn StreamTransport>,
    clock: Arc<dyn Clock>,
}

impl TickPublisher {
    pub fn new(transport: Arc<dyn StreamTransport>, clock: Arc<dyn Clock>) -> Self {
        Self { transport, clock }
    }

    pub fn run<R: Rng + ?Sized>(
        &self,
        config: &dyn ConfigSource,
        rng: &mut R,
    ) -> Result<PublishSummary> {
        let timer = Stopwatch::start();
        let config = PublisherConfig::resolve(config).map_err(fail(Phase::Config))?;

        let ticks = generate_ticks(rng, self.clock.now_naive());
        let records = ticks
            .iter()
            .map(|tick| {
                Ok(StreamRecord {
                    data: encode_tick(tick)?,
                    partition_key: tick.symbol.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()
            .map_err(fail(Phase::Publish))?;

        let output = self
            .transport
            .put_records(&config.stream_name, &records)
            .map_err(fail(Phase::Publish))?;

        let produced_at = ticks
            .first()
            .map(|tick| tick.produced_at.as_str())
            .unwrap_or_default();
        info!(
            "number of records that should enter the stream {} at {} are: {}. Total time taken: {} seconds",
            config.stream_name,
            produced_at,
            records.len(),
            timer.elapsed().as_secs_f64().round()
        );
        Ok(PublishSummary {
            failed_record_count: output.failed_record_count,
            success_record_count: records.len().saturating_sub(output.failed_record_count),
        })
    }
}
