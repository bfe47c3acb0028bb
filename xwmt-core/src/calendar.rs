//! Time-step lengths used to weight time means
//!
//! Model output on a no-leap calendar is averaged with the standard month
//! lengths (or 365 days for annual data). Other calendars need explicit time
//! bounds, whose durations are used directly.

use crate::dataset::{Dataset, TimeBounds};
use crate::field::FloatValue;
use chrono::{Datelike, NaiveDateTime};

/// Time attributes that may name the calendar
pub const CALENDAR_ATTRIBUTES: [&str; 2] = ["calendar_type", "calendar"];

/// Names under which time bounds are looked up, in order of preference
pub const TIME_BOUNDS_NAMES: [&str; 2] = ["time_bounds", "time_bnds"];

/// Days in each month of a year without leap days
pub const NOLEAP_MONTH_DAYS: [FloatValue; 12] = [
    31.0, 28.0, 31.0, 30.0, 31.0, 30.0, 31.0, 31.0, 30.0, 31.0, 30.0, 31.0,
];

/// Days in a year without leap days
pub const NOLEAP_YEAR_DAYS: FloatValue = 365.0;

/// Regular sampling frequency of a time axis
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TimeFrequency {
    Monthly,
    Annual,
}

/// Whether the time attributes declare a calendar without leap days
pub fn is_noleap(dataset: &Dataset) -> bool {
    CALENDAR_ATTRIBUTES.iter().any(|key| {
        dataset
            .time_attrs()
            .get(*key)
            .map(|v| matches!(v.to_lowercase().as_str(), "noleap" | "365_day"))
            .unwrap_or(false)
    })
}

/// Infer a monthly or annual frequency from consecutive time stamps
///
/// Needs at least two time steps. Monthly data steps forward one month at a
/// time (December to January included); annual data one year at a time.
pub fn infer_frequency(time: &[NaiveDateTime]) -> Option<TimeFrequency> {
    if time.len() < 2 {
        return None;
    }
    let monthly = time.windows(2).all(|w| {
        let step = w[1].month() as i32 - w[0].month() as i32;
        step == 1 || step == -11
    });
    let annual = time.windows(2).all(|w| w[1].year() - w[0].year() == 1);
    // Annual takes precedence when both apply
    if annual {
        Some(TimeFrequency::Annual)
    } else if monthly {
        Some(TimeFrequency::Monthly)
    } else {
        None
    }
}

/// Length in days of each time interval
pub fn days_from_bounds(bounds: &[TimeBounds]) -> Vec<FloatValue> {
    bounds
        .iter()
        .map(|(start, end)| (*end - *start).num_seconds() as FloatValue / 86_400.0)
        .collect()
}

/// Weight (in days) of every time step of a dataset
///
/// Returns `None`, after logging a warning, when the calendar and time bounds
/// do not determine the interval lengths.
pub fn time_weights(dataset: &Dataset) -> Option<Vec<FloatValue>> {
    if is_noleap(dataset) {
        match infer_frequency(dataset.time()) {
            Some(TimeFrequency::Monthly) => {
                return Some(
                    dataset
                        .time()
                        .iter()
                        .map(|t| NOLEAP_MONTH_DAYS[t.month0() as usize])
                        .collect(),
                )
            }
            Some(TimeFrequency::Annual) => {
                return Some(vec![NOLEAP_YEAR_DAYS; dataset.nt()]);
            }
            None => log::debug!(
                "Cannot infer the sampling frequency of a no-leap time axis, trying time bounds"
            ),
        }
    }

    for name in TIME_BOUNDS_NAMES {
        if let Some(bounds) = dataset.time_bounds(name) {
            log::debug!("Weighting time steps by the durations in {}", name);
            return Some(days_from_bounds(bounds));
        }
    }

    log::warn!(
        "Unsupported calendar {:?}: time steps cannot be weighted",
        dataset.time_attrs()
    );
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ndarray::array;

    fn date(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn dataset(time: Vec<NaiveDateTime>) -> crate::dataset::DatasetBuilder {
        Dataset::builder(time, array![5.0], array![0.0, 10.0])
    }

    #[test]
    fn frequency_inference() {
        let monthly = vec![date(2000, 11, 16), date(2000, 12, 16), date(2001, 1, 16)];
        assert_eq!(infer_frequency(&monthly), Some(TimeFrequency::Monthly));

        let annual = vec![date(2000, 7, 1), date(2001, 7, 1), date(2002, 7, 1)];
        assert_eq!(infer_frequency(&annual), Some(TimeFrequency::Annual));

        let daily = vec![date(2000, 1, 1), date(2000, 1, 2)];
        assert_eq!(infer_frequency(&daily), None);
        assert_eq!(infer_frequency(&daily[..1]), None);
    }

    #[test]
    fn noleap_monthly_weights() {
        let ds = dataset(vec![date(2001, 1, 16), date(2001, 2, 15), date(2001, 3, 16)])
            .with_time_attr("calendar_type", "NOLEAP")
            .build()
            .unwrap();
        assert_eq!(time_weights(&ds), Some(vec![31.0, 28.0, 31.0]));
    }

    #[test]
    fn noleap_annual_weights() {
        let ds = dataset(vec![date(2001, 7, 2), date(2002, 7, 2)])
            .with_time_attr("calendar", "365_day")
            .build()
            .unwrap();
        assert_eq!(time_weights(&ds), Some(vec![365.0, 365.0]));
    }

    #[test]
    fn bounds_give_interval_lengths() {
        let time = vec![date(2004, 2, 15), date(2004, 3, 16)];
        let bounds = vec![
            (date(2004, 2, 1), date(2004, 3, 1)),
            (date(2004, 3, 1), date(2004, 4, 1)),
        ];
        let ds = dataset(time)
            .with_time_attr("calendar", "gregorian")
            .with_time_bounds("time_bnds", bounds)
            .build()
            .unwrap();
        assert_eq!(time_weights(&ds), Some(vec![29.0, 31.0]));
    }

    #[test]
    fn single_step_noleap_falls_back_to_bounds() {
        let bounds = vec![(date(2001, 2, 1), date(2001, 3, 1))];
        let ds = dataset(vec![date(2001, 2, 15)])
            .with_time_attr("calendar_type", "noleap")
            .with_time_bounds("time_bounds", bounds)
            .build()
            .unwrap();
        assert_eq!(time_weights(&ds), Some(vec![28.0]));
    }

    #[test]
    fn unknown_calendar_without_bounds() {
        let ds = dataset(vec![date(2001, 1, 1), date(2001, 2, 1)])
            .build()
            .unwrap();
        assert_eq!(time_weights(&ds), None);
    }
}
