use time::{OffsetDateTime, PrimitiveDateTime};

/// A source of wall-clock time for handlers.
///
/// Handlers never call `OffsetDateTime::now_utc` directly so that generation
/// timestamps, object names and load timestamps can be pinned in tests.
pub trait Clock: Send + Sync + 'static {
    /// Current time in UTC.
    fn now(&self) -> OffsetDateTime;

    /// Current UTC time without an offset, the form persisted in datasets.
    fn now_naive(&self) -> PrimitiveDateTime {
        let now = self.now();
        PrimitiveDateTime::new(now.date(), now.time())
    }
}

/// A clock that uses `OffsetDateTime::now_utc`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// A clock frozen at a single instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub OffsetDateTime);

impl FixedClock {
    pub fn at(datetime: PrimitiveDateTime) -> Self {
        Self(datetime.assume_utc())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.0
    }
}
