//! Ritual streaks.
//!
//! A ritual is judged per period: a local calendar day, a Sunday-start week or a
//! calendar month in the owner's timezone. A period qualifies when it holds at
//! least `times_per_period` completions. The current streak is the trailing run of
//! qualifying periods; the still-open current period extends the run once it
//! qualifies and never breaks it.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::model::{Frequency, Ritual};

/// How a weekly ritual with listed days qualifies.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeeklyRule {
    /// Every listed weekday must individually reach `times_per_period`.
    #[default]
    EveryListedDay,
    /// The week's total across all days must reach `times_per_period`.
    Aggregate,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreakPolicy {
    pub timezone: Tz,
    pub weekly_rule: WeeklyRule,
}

impl StreakPolicy {
    pub fn new(timezone: Tz, weekly_rule: WeeklyRule) -> Self {
        Self {
            timezone,
            weekly_rule,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreakSummary {
    pub current: u32,
    pub longest: u32,
}

impl StreakSummary {
    /// Fold in the cached longest streak, which never decreases.
    pub fn with_cached_longest(self, cached_longest: u32) -> Self {
        Self {
            current: self.current,
            longest: self.longest.max(cached_longest).max(self.current),
        }
    }
}

/// Half-open range of local calendar days `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }

    /// Instant the period starts, in UTC.
    pub fn start_utc(&self, tz: Tz) -> DateTime<Utc> {
        local_midnight(tz, self.start)
    }

    /// Instant the period closes, in UTC.
    pub fn end_utc(&self, tz: Tz) -> DateTime<Utc> {
        local_midnight(tz, self.end)
    }
}

/// First instant of `date` in `tz`.
fn local_midnight(tz: Tz, date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    if let Some(dt) = tz.from_local_datetime(&naive).earliest() {
        return dt.with_timezone(&Utc);
    }
    // Midnight skipped by a DST jump.
    tz.from_local_datetime(&(naive + Duration::hours(1)))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}

/// Calendar date of `instant` in `tz`.
pub fn local_date(instant: DateTime<Utc>, tz: Tz) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

/// The period of `frequency` that contains `date`.
pub fn period_containing(frequency: Frequency, date: NaiveDate) -> Period {
    match frequency {
        Frequency::Daily => Period {
            start: date,
            end: date + Duration::days(1),
        },
        Frequency::Weekly => {
            let start = date - Duration::days(i64::from(date.weekday().num_days_from_sunday()));
            Period {
                start,
                end: start + Duration::days(7),
            }
        }
        Frequency::Monthly => {
            let start = date.with_day(1).unwrap_or(date);
            let end = start
                .checked_add_months(Months::new(1))
                .unwrap_or(NaiveDate::MAX);
            Period { start, end }
        }
    }
}

/// Whether the ritual is due at all in `period`.
fn is_scheduled(ritual: &Ritual, period: &Period) -> bool {
    match (ritual.frequency, ritual.scheduled_days()) {
        (Frequency::Daily, Some(days)) => {
            let weekday = period.start.weekday().num_days_from_sunday() as u8;
            days.contains(&weekday)
        }
        _ => true,
    }
}

/// Completion counts per local day, ignoring completions after `until`.
pub fn completion_counts(
    completions: &[DateTime<Utc>],
    tz: Tz,
    until: DateTime<Utc>,
) -> BTreeMap<NaiveDate, u32> {
    let mut counts = BTreeMap::new();
    for completed_at in completions.iter().filter(|c| **c <= until) {
        *counts.entry(local_date(*completed_at, tz)).or_insert(0) += 1;
    }
    counts
}

/// Whether `period` holds enough completions.
pub fn period_qualifies(
    ritual: &Ritual,
    counts: &BTreeMap<NaiveDate, u32>,
    period: &Period,
    weekly_rule: WeeklyRule,
) -> bool {
    let required = ritual.times_per_period.max(1);
    match (ritual.frequency, ritual.scheduled_days(), weekly_rule) {
        (Frequency::Weekly, Some(days), WeeklyRule::EveryListedDay) => days.iter().all(|day| {
            let date = period.start + Duration::days(i64::from(*day));
            counts.get(&date).copied().unwrap_or(0) >= required
        }),
        _ => {
            let total: u32 = counts.range(period.start..period.end).map(|(_, n)| *n).sum();
            total >= required
        }
    }
}

/// Scheduled periods from the one containing `from` through the one containing `to`.
fn scheduled_periods(ritual: &Ritual, from: NaiveDate, to: NaiveDate) -> Vec<Period> {
    let mut periods = Vec::new();
    let mut period = period_containing(ritual.frequency, from);
    while period.start <= to {
        if is_scheduled(ritual, &period) {
            periods.push(period);
        }
        period = period_containing(ritual.frequency, period.end);
    }
    periods
}

/// The most recent scheduled period that ended before `now`'s local day began
/// (or before its week/month began).
pub fn last_closed_period(ritual: &Ritual, now: DateTime<Utc>, tz: Tz) -> Option<Period> {
    let today = local_date(now, tz);
    let mut period = period_containing(ritual.frequency, today);
    // A daily ritual listed on a single weekday needs at most a week of look-back.
    for _ in 0..8 {
        period = period_containing(ritual.frequency, period.start.pred_opt()?);
        if is_scheduled(ritual, &period) {
            return Some(period);
        }
    }
    None
}

/// Whether a run that was alive at `since` has ended by `now`.
///
/// The run survives only if every scheduled period from the one containing
/// `since` through the last period closed at `now` qualifies. Later
/// completions that start a new run do not revive it.
pub fn run_ended_since(
    ritual: &Ritual,
    completions: &[DateTime<Utc>],
    since: DateTime<Utc>,
    now: DateTime<Utc>,
    policy: &StreakPolicy,
) -> bool {
    let Some(last_closed) = last_closed_period(ritual, now, policy.timezone) else {
        return false;
    };
    let from = local_date(since, policy.timezone);
    if last_closed.end <= period_containing(ritual.frequency, from).start {
        return false;
    }
    let counts = completion_counts(completions, policy.timezone, now);
    scheduled_periods(ritual, from, last_closed.start)
        .iter()
        .any(|p| !period_qualifies(ritual, &counts, p, policy.weekly_rule))
}

/// Replay a ritual's completions into its streaks as of `now`.
pub fn compute_streak(
    ritual: &Ritual,
    completions: &[DateTime<Utc>],
    now: DateTime<Utc>,
    policy: &StreakPolicy,
) -> StreakSummary {
    let counts = completion_counts(completions, policy.timezone, now);
    let Some(first) = counts.keys().next().copied() else {
        return StreakSummary::default();
    };
    let today = local_date(now, policy.timezone);
    let periods = scheduled_periods(ritual, first, today);
    let qualified: Vec<bool> = periods
        .iter()
        .map(|p| period_qualifies(ritual, &counts, p, policy.weekly_rule))
        .collect();

    let mut longest = 0u32;
    let mut run = 0u32;
    for ok in &qualified {
        if *ok {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }

    let open_len = match periods.last() {
        Some(last) if last.contains(today) && !qualified.last().copied().unwrap_or(false) => 1,
        _ => 0,
    };
    let current = qualified[..qualified.len() - open_len]
        .iter()
        .rev()
        .take_while(|ok| **ok)
        .count() as u32;

    StreakSummary { current, longest }
}
