use std::fmt::Debug;

use chrono::DateTime;
use chrono::Utc;

/// Source of the current time
///
/// Used for key set expiry and token lifetime checks, so tests can move time forward
/// without sleeping.
pub trait Clock: Debug + Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
