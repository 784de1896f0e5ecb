use chrono::{DateTime, Datelike, Days, FixedOffset, NaiveDate, Utc};

use crate::model::timeframe::{PartitionScheme, Timeframe};

pub const MIN_DAYS: u64 = 2;
pub const MAX_DAYS: u64 = 10;

/// Days of history to request for `count` candles of a day-partitioned
/// timeframe: one extra day of margin, clamped to `[2, 10]`.
pub fn days_needed(timeframe: Timeframe, count: usize) -> u64 {
    let per_day = timeframe.candles_per_day();
    let days = (count as u64).div_ceil(per_day) + 1;
    days.clamp(MIN_DAYS, MAX_DAYS)
}

/// Partition keys to request, oldest first.
///
/// Day keys are `YYYYMMDD` ending at today; year keys are the previous and
/// the current year. Dates are taken in the exchange's time zone.
pub fn plan(timeframe: Timeframe, count: usize, now_ms: u64, offset: FixedOffset) -> Vec<String> {
    let local = local_date(now_ms, offset);
    match timeframe.partition_scheme() {
        PartitionScheme::Yearly => {
            let year = local.year();
            vec![format!("{:04}", year - 1), format!("{:04}", year)]
        }
        PartitionScheme::Daily => {
            let days = days_needed(timeframe, count);
            (0..days)
                .rev()
                .filter_map(|back| local.checked_sub_days(Days::new(back)))
                .map(|date| date.format("%Y%m%d").to_string())
                .collect()
        }
    }
}

fn local_date(now_ms: u64, offset: FixedOffset) -> NaiveDate {
    let utc = DateTime::<Utc>::from_timestamp_millis(now_ms as i64).unwrap_or_else(Utc::now);
    utc.with_timezone(&offset).date_naive()
}
