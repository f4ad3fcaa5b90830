//! One handler per pipeline step.
//!
//! Each handler is built once from shared clients and run once per
//! invocation. Configuration is resolved at the start of every run. Fatal
//! failures are tagged with the [`Phase`] they happened in, logged at error
//! level, and returned.

mod generate_batch;
mod process_batch;
mod process_stream;
mod publish_ticks;

pub use generate_batch::{BatchGenerator, GeneratedBatch};
pub use process_batch::BatchProcessor;
pub use process_stream::StreamProcessor;
pub use publish_ticks::{PublishSummary, TickPublisher};

use std::time::{Duration, Instant};

use log::error;
use serde::Serialize;

use crate::error::{Error, Phase};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    #[serde(rename = "success")]
    Success,
    #[serde(rename = "success with warning")]
    SuccessWithWarning,
    #[serde(rename = "no_messages")]
    NoMessages,
}

/// Result returned by the processing handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records_appended: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u64>,
}

impl RunSummary {
    pub fn completed(status: RunStatus, records_appended: usize, elapsed: Duration) -> Self {
        Self {
            status,
            records_appended: Some(records_appended),
            duration_seconds: Some(whole_seconds(elapsed)),
        }
    }

    pub fn no_messages() -> Self {
        Self {
            status: RunStatus::NoMessages,
            records_appended: None,
            duration_seconds: None,
        }
    }
}

fn whole_seconds(elapsed: Duration) -> u64 {
    elapsed.as_secs_f64().round() as u64
}

/// Log a fatal error and tag it with the phase it surfaced in.
fn fail(phase: Phase) -> impl FnOnce(Error) -> Error {
    move |err| {
        error!("{phase}: {} - {err}", err.kind());
        err.in_phase(phase)
    }
}

/// Wall-clock timer for the reported duration.
struct Stopwatch(Instant);

impl Stopwatch {
    fn start() -> Self {
        Self(Instant::now())
    }

    fn elapsed(&self) -> Duration {
        self.0.elapsed()
    }
}
