//! Rolling duty-time totals.
//!
//! Each window is evaluated independently over `[reference - days, reference]`
//! inclusive, so an event on the reference date counts in every window and an
//! event exactly `days` before the reference still counts.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::warn;

use crate::config::{DutyLimitConfig, DutyWindows};
use crate::records::{parse_record_date, window_start, DutyEvent};

/// A duty event whose date has been parsed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DatedDuty {
    /// Date of the event.
    pub date: NaiveDate,
    /// Duration in hours.
    pub hours: f64,
}

/// Parse raw duty events, dropping those with malformed dates.
///
/// Returns the parsed events and the number skipped.
#[must_use]
pub fn parse_duty_events(person_id: &str, events: &[DutyEvent]) -> (Vec<DatedDuty>, usize) {
    let mut parsed = Vec::with_capacity(events.len());
    let mut skipped = 0;
    for event in events {
        match parse_record_date(&event.date) {
            Ok(date) => parsed.push(DatedDuty {
                date,
                hours: event.duration_hours,
            }),
            Err(e) => {
                warn!(person = person_id, error = %e, "Skipping duty event");
                skipped += 1;
            }
        }
    }
    (parsed, skipped)
}

/// Sum hours for events within `window_days` of `reference`.
#[must_use]
pub fn aggregate_window(events: &[DatedDuty], window_days: u32, reference: NaiveDate) -> f64 {
    let start = window_start(reference, window_days);
    events
        .iter()
        .filter(|e| e.date >= start && e.date <= reference)
        .map(|e| e.hours)
        .sum()
}

/// One of the three rolling windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DutyWindow {
    /// The short window.
    Daily,
    /// The medium window.
    Weekly,
    /// The long window.
    Monthly,
}

impl DutyWindow {
    /// All windows, shortest first.
    pub const ALL: [Self; 3] = [Self::Daily, Self::Weekly, Self::Monthly];

    /// Length of this window under `windows`.
    #[must_use]
    pub fn days(self, windows: &DutyWindows) -> u32 {
        match self {
            Self::Daily => windows.daily_days,
            Self::Weekly => windows.weekly_days,
            Self::Monthly => windows.monthly_days,
        }
    }

    /// The tenant's limit for this window.
    #[must_use]
    pub fn limit(self, limits: &DutyLimitConfig) -> f64 {
        match self {
            Self::Daily => limits.daily_hours(),
            Self::Weekly => limits.weekly_hours(),
            Self::Monthly => limits.monthly_hours(),
        }
    }
}

impl std::fmt::Display for DutyWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Daily => write!(f, "Daily"),
            Self::Weekly => write!(f, "Weekly"),
            Self::Monthly => write!(f, "Monthly"),
        }
    }
}

/// Hours accumulated in each window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DutyTotals {
    /// Hours in the daily window.
    pub daily: f64,
    /// Hours in the weekly window.
    pub weekly: f64,
    /// Hours in the monthly window.
    pub monthly: f64,
}

/// A window whose total is over its limit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DutyExceedance {
    /// The window.
    pub window: DutyWindow,
    /// Window length in days.
    pub window_days: u32,
    /// Hours accumulated.
    pub total_hours: f64,
    /// The tenant's limit.
    pub limit_hours: f64,
}

/// Totals for all three windows.
#[must_use]
pub fn aggregate_windows(
    events: &[DatedDuty],
    windows: &DutyWindows,
    reference: NaiveDate,
) -> DutyTotals {
    DutyTotals {
        daily: aggregate_window(events, windows.daily_days, reference),
        weekly: aggregate_window(events, windows.weekly_days, reference),
        monthly: aggregate_window(events, windows.monthly_days, reference),
    }
}

impl DutyTotals {
    /// Total for one window.
    #[must_use]
    pub fn get(&self, window: DutyWindow) -> f64 {
        match window {
            DutyWindow::Daily => self.daily,
            DutyWindow::Weekly => self.weekly,
            DutyWindow::Monthly => self.monthly,
        }
    }

    /// Windows strictly over their limit.
    #[must_use]
    pub fn exceedances(
        &self,
        windows: &DutyWindows,
        limits: &DutyLimitConfig,
    ) -> Vec<DutyExceedance> {
        DutyWindow::ALL
            .into_iter()
            .filter_map(|window| {
                let total_hours = self.get(window);
                let limit_hours = window.limit(limits);
                (total_hours > limit_hours).then_some(DutyExceedance {
                    window,
                    window_days: window.days(windows),
                    total_hours,
                    limit_hours,
                })
            })
            .collect()
    }
}
