use time::OffsetDateTime;

/// Milliseconds since the Unix epoch, UTC. The unit `db/txInstant` values
/// and `Value::Instant` are stored in (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Instant(pub i64);

impl Instant {
    pub fn from_offset_date_time(t: OffsetDateTime) -> Self {
        Instant(offset_date_time_to_millis(t))
    }

    pub fn to_offset_date_time(self) -> OffsetDateTime {
        millis_to_offset_date_time(self.0)
    }
}

pub fn offset_date_time_to_millis(t: OffsetDateTime) -> i64 {
    (t.unix_timestamp_nanos() / 1_000_000) as i64
}

pub fn millis_to_offset_date_time(millis: i64) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp_nanos(millis as i128 * 1_000_000)
        .expect("millisecond timestamp is in range")
}

pub trait Clock {
    fn now(&self) -> Instant;
}

/// Reads the wall clock. Used by `Connection` to stamp `db/txInstant`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::from_offset_date_time(OffsetDateTime::now_utc())
    }
}

/// A clock pinned to a fixed instant, for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Instant);

impl FixedClock {
    pub fn new(millis: i64) -> Self {
        FixedClock(Instant(millis))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Instant {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_millis_through_offset_date_time() {
        let millis = 1_700_000_000_123;
        let t = millis_to_offset_date_time(millis);
        assert_eq!(offset_date_time_to_millis(t), millis);
    }

    #[test]
    fn fixed_clock_always_returns_the_same_instant() {
        let clock = FixedClock::new(42);
        assert_eq!(clock.now(), Instant(42));
        assert_eq!(clock.now(), Instant(42));
    }
}
