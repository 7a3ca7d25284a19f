//! Schedule evaluation: is a snapshot due today?
//!
//! | Type    | Due when |
//! |---------|----------|
//! | always  | every run |
//! | daily   | every run (description dedups to once per day) |
//! | weekly  | today's weekday abbreviation is in `when` |
//! | monthly | today's day of month is in `when` |
//! | unset   | never; a missing `type` is a configuration gap |

use std::fmt;

use crate::engine::tag_codec::VolumePolicy;
use crate::run_context::RunContext;
use crate::types::ScheduleType;

/// Result of evaluating a policy's schedule against today
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleDecision {
    Due,
    /// The schedule is valid but does not select today
    NotToday,
    /// No usable `type` in the tag
    Unset,
}

impl ScheduleDecision {
    pub fn is_due(self) -> bool {
        self == Self::Due
    }
}

impl fmt::Display for ScheduleDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Due => write!(f, "due"),
            Self::NotToday => write!(f, "not scheduled today"),
            Self::Unset => write!(f, "no schedule type"),
        }
    }
}

/// Evaluate `policy`'s schedule for the run's date.
pub fn evaluate(policy: &VolumePolicy, ctx: &RunContext) -> ScheduleDecision {
    let selected = match policy.schedule_type {
        ScheduleType::Always | ScheduleType::Daily => true,
        ScheduleType::Weekly => weekday_selected(&policy.when, ctx.weekday_abbrev()),
        ScheduleType::Monthly => day_selected(&policy.when, ctx.day_of_month()),
        ScheduleType::Unset => return ScheduleDecision::Unset,
    };

    if selected {
        ScheduleDecision::Due
    } else {
        ScheduleDecision::NotToday
    }
}

/// Shorthand for `evaluate(..).is_due()`.
pub fn is_due(policy: &VolumePolicy, ctx: &RunContext) -> bool {
    evaluate(policy, ctx).is_due()
}

/// Label embedded in the snapshot description.
///
/// Second precision for `always` so that every run produces a distinct
/// description; date precision otherwise so reruns on the same day find the
/// existing snapshot.
pub fn description_label(schedule: ScheduleType, ctx: &RunContext) -> String {
    if schedule.uses_timestamp_label() {
        ctx.timestamp_label()
    } else {
        ctx.date_label()
    }
}

fn weekday_selected(selectors: &[String], today: &str) -> bool {
    selectors.iter().any(|selector| {
        let abbrev: String = selector.trim().to_lowercase().chars().take(3).collect();
        abbrev == today
    })
}

fn day_selected(selectors: &[String], today: u32) -> bool {
    selectors
        .iter()
        .filter_map(|selector| {
            let selector = selector.trim();
            if selector.is_empty() || !selector.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            selector.parse::<u32>().ok()
        })
        .filter(|day| (1..=31).contains(day))
        .any(|day| day == today)
}
