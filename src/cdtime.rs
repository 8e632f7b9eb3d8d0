use chrono::prelude::*;
use chrono::Duration;
use std::fmt;

/// Metric timestamps and intervals.
///
/// The time is stored at a 2^-30 second resolution, i.e. the most significant 34 bit are used to
/// store the time in seconds, the least significant bits store the sub-second part in something
/// very close to nanoseconds. Comparing times and calculating differences is a plain integer
/// comparison / subtraction.
#[derive(Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
pub struct CdTime(pub u64);

impl CdTime {
    pub const ZERO: CdTime = CdTime(0);

    pub fn from_nanos(nanos: u64) -> Self {
        CdTime(nanos_to_cdtime(nanos))
    }

    pub fn as_nanos(self) -> u64 {
        cdtime_to_nanos(self.0)
    }

    pub fn from_millis(ms: u64) -> Self {
        CdTime::from_nanos(ms.saturating_mul(1_000_000))
    }

    pub fn as_millis(self) -> u64 {
        self.as_nanos() / 1_000_000
    }

    /// Negative and NaN inputs clamp to zero.
    pub fn from_secs_f64(secs: f64) -> Self {
        if !(secs > 0.0) {
            return CdTime::ZERO;
        }
        let raw = secs * (1u64 << 30) as f64;
        if raw >= u64::MAX as f64 {
            CdTime(u64::MAX)
        } else {
            CdTime(raw.round() as u64)
        }
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / (1u64 << 30) as f64
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for CdTime {
    fn from(dt: DateTime<Tz>) -> Self {
        let secs = dt.timestamp().max(0) as u64;
        let nanos = secs
            .saturating_mul(1_000_000_000)
            .saturating_add(u64::from(dt.timestamp_subsec_nanos()));
        CdTime::from_nanos(nanos)
    }
}

impl From<CdTime> for DateTime<Utc> {
    fn from(v: CdTime) -> DateTime<Utc> {
        let nanos = v.as_nanos().min(i64::MAX as u64);
        Utc.timestamp_nanos(nanos as i64)
    }
}

impl From<Duration> for CdTime {
    fn from(d: Duration) -> Self {
        match d.num_nanoseconds() {
            Some(ns) if ns > 0 => CdTime::from_nanos(ns as u64),
            Some(_) => CdTime::ZERO,
            None if d > Duration::zero() => CdTime(u64::MAX),
            None => CdTime::ZERO,
        }
    }
}

impl From<CdTime> for Duration {
    fn from(v: CdTime) -> Self {
        Duration::nanoseconds(v.as_nanos().min(i64::MAX as u64) as i64)
    }
}

impl fmt::Display for CdTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:.3}", self.as_secs_f64())
    }
}

fn nanos_to_cdtime(nanos: u64) -> u64 {
    ((nanos / 1_000_000_000) << 30)
        | ((((nanos % 1_000_000_000) << 30) + 500_000_000) / 1_000_000_000)
}

fn cdtime_to_nanos(cd: u64) -> u64 {
    ((cd >> 30) * 1_000_000_000) + (((cd & 0x3fff_ffff) * 1_000_000_000 + (1 << 29)) >> 30)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nanos_to_cdtime() {
        assert_eq!(nanos_to_cdtime(1439981652801860766), 1546168526406004689);
        assert_eq!(nanos_to_cdtime(1439981836985281914), 1546168724171447263);
        assert_eq!(nanos_to_cdtime(1439981880053705608), 1546168770415815077);
    }

    #[test]
    fn test_cdtime_to_nanos() {
        assert_eq!(cdtime_to_nanos(1546168526406004689), 1439981652801860766);
        assert_eq!(cdtime_to_nanos(1546168724171447263), 1439981836985281914);
        assert_eq!(cdtime_to_nanos(1546168770415815077), 1439981880053705608);
    }

    #[test]
    fn test_cdtime_to_duration() {
        let dur = Duration::from(CdTime::from_nanos(1_000_000_000));
        assert_eq!(dur.num_seconds(), 1);
        assert_eq!(CdTime::from(Duration::seconds(10)), CdTime(10 << 30));
        assert_eq!(CdTime::from(Duration::seconds(-10)), CdTime::ZERO);
    }

    #[test]
    fn test_datetime_round_trip() {
        let dt = Utc.with_ymd_and_hms(2015, 8, 19, 10, 54, 12).unwrap();
        let cd = CdTime::from(dt);
        assert_eq!(cd.0 >> 30, 1439981652);
        let back: DateTime<Utc> = cd.into();
        assert_eq!(back, dt);
    }

    #[test]
    fn test_secs_f64() {
        assert_eq!(CdTime::from_secs_f64(1.5), CdTime(3 << 29));
        assert_eq!(CdTime(3 << 29).as_secs_f64(), 1.5);
        assert_eq!(CdTime::from_secs_f64(-1.0), CdTime::ZERO);
        assert_eq!(CdTime::from_secs_f64(f64::NAN), CdTime::ZERO);
        assert_eq!(CdTime::from_millis(10_000).as_millis(), 10_000);
    }
}
