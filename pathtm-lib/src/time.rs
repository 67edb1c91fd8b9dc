//! GPS 5-byte timestamp handling.
//!
//! On-board and transport times are carried as 4 bytes of coarse seconds plus
//! one byte of fine time in 1/256 s units, counted from the GPS epoch
//! (1980-01-06). The on-board clock runs on the GPS timescale, which is ahead
//! of UTC by the leap seconds accumulated since that epoch.

use hifitime::{Duration, Epoch};

/// Seconds between the hifitime UTC reference epoch (1900-01-01) and the GPS
/// epoch (1980-01-06).
const GPS_HIFIEPOCH_DELTA_SECS: u64 = 2_524_953_600;

/// GPS is ahead of UTC by the leap seconds introduced since the GPS epoch.
const GPS_UTC_OFFSET_SECS: f64 = 18.0;

/// Nanoseconds per unit of fine time (1/256 s).
const FINE_UNIT_NANOS: u64 = 3_906_250;

/// Join 5-byte coarse/fine GPS time into an instant, without leap-second
/// correction.
#[must_use]
pub fn join5(coarse: u32, fine: u8) -> Epoch {
    let dur = Duration::compose(
        0,
        0,
        0,
        0,
        GPS_HIFIEPOCH_DELTA_SECS + u64::from(coarse),
        0,
        0,
        u64::from(fine) * FINE_UNIT_NANOS,
    );
    Epoch::from_utc_duration(dur)
}

/// Join 5-byte coarse/fine GPS time and correct it to UTC.
#[must_use]
pub fn join5_utc(coarse: u32, fine: u8) -> Epoch {
    join5(coarse, fine) - Duration::from_seconds(GPS_UTC_OFFSET_SECS)
}

/// Truncate `epoch` down to a multiple of `interval` since the UTC reference
/// epoch.
#[must_use]
pub fn truncate(epoch: Epoch, interval: Duration) -> Epoch {
    let step = interval.total_nanoseconds();
    if step <= 0 {
        return epoch;
    }
    let total = epoch.to_utc_duration().total_nanoseconds();
    Epoch::from_utc_duration(Duration::from_total_nanoseconds(
        total - total.rem_euclid(step),
    ))
}

/// Ordinal day of the year, 1-based.
#[must_use]
pub fn day_of_year(year: i32, month: u8, day: u8) -> u16 {
    const CUMULATIVE: [u16; 12] = [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334];
    let leap = (year % 4 == 0 && year % 100 != 0) || year % 400 == 0;
    let mut doy = CUMULATIVE[usize::from(month - 1)] + u16::from(day);
    if leap && month > 2 {
        doy += 1;
    }
    doy
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gps_epoch() {
        let expected = Epoch::from_gregorian_utc(1980, 1, 6, 0, 0, 0, 0);
        assert_eq!(join5(0, 0), expected);
    }

    #[test]
    fn leap_correction() {
        // GPS runs 18 s ahead of UTC
        let expected = Epoch::from_gregorian_utc(1980, 1, 5, 23, 59, 42, 0);
        assert_eq!(join5_utc(0, 0), expected);
    }

    #[test]
    fn fine_resolution() {
        let half = join5(0, 128) - join5(0, 0);
        assert_eq!(half, Duration::from_seconds(0.5));
    }

    #[test]
    fn truncate_to_interval() {
        let interval = Duration::from_seconds(5.0);
        let base = Epoch::from_gregorian_utc(2020, 7, 4, 12, 30, 15, 0);
        assert_eq!(truncate(base, interval), base);
        assert_eq!(truncate(base + Duration::from_seconds(3.0), interval), base);
        assert_eq!(
            truncate(base + Duration::from_seconds(7.0), interval),
            base + Duration::from_seconds(5.0),
        );
    }

    #[test]
    fn ordinal_day() {
        assert_eq!(day_of_year(2021, 1, 1), 1);
        assert_eq!(day_of_year(2021, 12, 31), 365);
        assert_eq!(day_of_year(2020, 3, 1), 61);
    }
}
