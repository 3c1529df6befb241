use chrono::{DateTime, FixedOffset, Local};

/// Represents an entity responsible for providing the user's wall-clock time across application.
/// This allows "today" and the current hour to be pinned during testing.
pub trait Clock: Sync + Send + 'static {
    /// Current instant carrying the local offset the user sees.
    fn now(&self) -> DateTime<FixedOffset>;
}

pub struct DefaultClock;

impl Clock for DefaultClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}
