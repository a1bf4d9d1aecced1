//! Run listing filters and the business-day window.
//!
//! Deliveries run past midnight, so a "day" of runs starts at local midnight
//! and ends at the rollover hour of the next calendar day. Before the
//! rollover hour, "today" still means the previous date.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use super::error::DispatchError;
use super::model::DriverId;
use super::store::RunWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunFilter {
    pub driver_id: Option<DriverId>,
    /// First local date to include.
    pub start_date: Option<NaiveDate>,
    /// Last local date to include, through the end of that day.
    pub end_date: Option<NaiveDate>,
}

impl RunFilter {
    pub fn for_driver(driver_id: DriverId) -> Self {
        Self {
            driver_id: Some(driver_id),
            ..Self::default()
        }
    }

    /// Resolves the filter into a UTC window. With neither date set this is
    /// the business day containing `now`.
    pub fn window(
        &self,
        now: DateTime<Utc>,
        rollover_hour: u32,
        offset: FixedOffset,
    ) -> Result<RunWindow, DispatchError> {
        match (self.start_date, self.end_date) {
            (None, None) => business_day_window(now, rollover_hour, offset),
            (Some(start), Some(end)) if start > end => Err(DispatchError::Validation(format!(
                "start date {start} is after end date {end}"
            ))),
            (start, end) => Ok(RunWindow {
                start: start.map(|date| local_midnight(date, offset)),
                end: end
                    .and_then(|date| date.succ_opt())
                    .map(|date| local_midnight(date, offset)),
            }),
        }
    }
}

/// The business day containing `now`; `rollover_hour` must be 0..=23.
pub fn business_day_window(
    now: DateTime<Utc>,
    rollover_hour: u32,
    offset: FixedOffset,
) -> Result<RunWindow, DispatchError> {
    if rollover_hour > 23 {
        return Err(DispatchError::Validation(format!(
            "day rollover hour {rollover_hour} is out of range"
        )));
    }

    let local = now.with_timezone(&offset);
    let mut date = local.date_naive();
    if local.hour() < rollover_hour {
        date = date.pred_opt().unwrap_or(date);
    }

    let end = date
        .succ_opt()
        .and_then(|next| next.and_hms_opt(rollover_hour, 0, 0))
        .map(|naive| local_to_utc(naive, offset));

    Ok(RunWindow {
        start: Some(local_midnight(date, offset)),
        end,
    })
}

fn local_midnight(date: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    local_to_utc(date.and_time(chrono::NaiveTime::MIN), offset)
}

fn local_to_utc(naive: NaiveDateTime, offset: FixedOffset) -> DateTime<Utc> {
    naive.and_utc() - Duration::seconds(i64::from(offset.local_minus_utc()))
}
