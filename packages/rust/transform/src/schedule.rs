//! Schedule translation: source schedule descriptors to target delivery fields.
//!
//! Translation is pure and infallible. Source instants are rendered as
//! wall-clock values in the configured zone; a wall-clock source value is
//! re-emitted with the same hour and minute.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, NaiveDateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use migrator_shared::{
    Frequency, MigrationConfig, RecurringSchedule, ScheduleDescriptor, SourceInstant,
    TriggeredSchedule,
};

const DATE_FORMAT: &str = "%m/%d/%Y";
const TIME_FORMAT: &str = "%-I:%M %p";
const DT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Days added when an end/expiry time is not given.
const DEFAULT_EXPIRY_DAYS: i64 = 365;

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Target delivery mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Delivery {
    /// Fired by a user action.
    Trigger,
    /// Recurring send.
    Periodic,
    /// One-time send at a fixed time.
    Later,
    /// As soon as possible.
    #[default]
    Soon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerDelayType {
    Delay,
    Asap,
}

/// Recurrence block of a periodic schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleInfo {
    pub daily_freq_duration: u32,
    pub weekly_freq_duration: u32,
    pub monthly_freq_duration: u32,
    /// 0-indexed weekdays, Monday = 0, ascending.
    pub selected_weekdays: Vec<u8>,
    pub month_view_type: String,
    pub days_of_month: Vec<u32>,
    pub weeks_of_month: BTreeMap<String, Vec<u32>>,
    pub should_sent_on_last_day: bool,
    pub expiry_type: String,
    pub max_instance_count: u32,
    pub recur_type: String,
}

impl ScheduleInfo {
    fn new(recur_type: &str) -> Self {
        Self {
            daily_freq_duration: 0,
            weekly_freq_duration: 0,
            monthly_freq_duration: 0,
            selected_weekdays: Vec::new(),
            month_view_type: "MONTH_VIEW".into(),
            days_of_month: Vec::new(),
            weeks_of_month: BTreeMap::new(),
            should_sent_on_last_day: false,
            expiry_type: "ON_DATE".into(),
            max_instance_count: 0,
            recur_type: recur_type.into(),
        }
    }
}

/// The target's delivery/timing fields. Absent fields are not serialized.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TargetScheduleFields {
    pub delivery: Delivery,
    #[serde(rename = "triggerDelayType", skip_serializing_if = "Option::is_none")]
    pub trigger_delay_type: Option<TriggerDelayType>,
    /// Delay in whole minutes, as a string.
    #[serde(rename = "minDelaySmartTrig", skip_serializing_if = "Option::is_none")]
    pub min_delay_minutes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dt: Option<String>,
    #[serde(rename = "laterDate", skip_serializing_if = "Option::is_none")]
    pub later_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(rename = "stExpiryDate", skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<String>,
    #[serde(rename = "stExpiryTime", skip_serializing_if = "Option::is_none")]
    pub expiry_time: Option<String>,
    #[serde(rename = "periodicStartDate", skip_serializing_if = "Option::is_none")]
    pub periodic_start_date: Option<String>,
    #[serde(rename = "periodicTime", skip_serializing_if = "Option::is_none")]
    pub periodic_time: Option<String>,
    /// `[zone name, offset label]`.
    #[serde(rename = "periodicTimezone", skip_serializing_if = "Option::is_none")]
    pub periodic_timezone: Option<(String, String)>,
    #[serde(rename = "periodicExpireDate", skip_serializing_if = "Option::is_none")]
    pub periodic_expire_date: Option<String>,
    #[serde(rename = "periodicExpireTime", skip_serializing_if = "Option::is_none")]
    pub periodic_expire_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_info: Option<ScheduleInfo>,
}

// ---------------------------------------------------------------------------
// ScheduleClock
// ---------------------------------------------------------------------------

/// Zone and reference "now" a translation runs against.
#[derive(Debug, Clone)]
pub struct ScheduleClock {
    pub timezone: Tz,
    pub offset_label: String,
    /// Wall-clock "now" in `timezone`.
    pub now: NaiveDateTime,
}

impl ScheduleClock {
    /// A clock for the configured zone at the current time.
    pub fn from_config(config: &MigrationConfig) -> Self {
        Self {
            timezone: config.timezone,
            offset_label: config.timezone_offset.clone(),
            now: Utc::now().with_timezone(&config.timezone).naive_local(),
        }
    }

    /// A clock pinned to a fixed wall-clock `now`.
    pub fn fixed(timezone: Tz, offset_label: impl Into<String>, now: NaiveDateTime) -> Self {
        Self {
            timezone,
            offset_label: offset_label.into(),
            now,
        }
    }

    /// Resolve a source instant to wall-clock time in the configured zone.
    fn wall_clock(&self, instant: SourceInstant) -> NaiveDateTime {
        match instant {
            SourceInstant::WallClock(naive) => naive,
            SourceInstant::Epoch(secs) => match DateTime::from_timestamp(secs, 0) {
                Some(utc) => utc.with_timezone(&self.timezone).naive_local(),
                None => {
                    tracing::warn!(secs, "epoch out of range, using current time");
                    self.now
                }
            },
        }
    }

    fn wall_clock_or_now(&self, instant: Option<SourceInstant>) -> NaiveDateTime {
        instant.map(|i| self.wall_clock(i)).unwrap_or(self.now)
    }

    fn zone_label(&self) -> (String, String) {
        (self.timezone.name().to_string(), self.offset_label.clone())
    }
}

// ---------------------------------------------------------------------------
// Translation
// ---------------------------------------------------------------------------

/// Translate a source schedule into target delivery fields.
pub fn translate(schedule: &ScheduleDescriptor, clock: &ScheduleClock) -> TargetScheduleFields {
    match schedule {
        ScheduleDescriptor::Immediate => TargetScheduleFields::default(),
        ScheduleDescriptor::OneTime { start_at } => translate_one_time(*start_at, clock),
        ScheduleDescriptor::Recurring(recurring) => translate_recurring(recurring, clock),
        ScheduleDescriptor::Triggered(triggered) => translate_triggered(triggered, clock),
    }
}

fn translate_triggered(trigger: &TriggeredSchedule, clock: &ScheduleClock) -> TargetScheduleFields {
    let mut fields = TargetScheduleFields {
        delivery: Delivery::Trigger,
        ..Default::default()
    };

    if trigger.delay_seconds > 0 {
        let minutes = (trigger.delay_seconds as f64 / 60.0).round_ties_even() as u64;
        fields.trigger_delay_type = Some(TriggerDelayType::Delay);
        fields.min_delay_minutes = Some(minutes.to_string());
    } else {
        fields.trigger_delay_type = Some(TriggerDelayType::Asap);
    }

    let start = trigger.window_start.map(|s| clock.wall_clock(s));
    if let Some(start) = start {
        fields.later_date = Some(format_date(&start));
        fields.time = Some(format_time(&start));
    }

    let end = match trigger.window_end {
        Some(end) => clock.wall_clock(end),
        None => start.unwrap_or(clock.now) + TimeDelta::days(DEFAULT_EXPIRY_DAYS),
    };
    fields.expiry_date = Some(format_date(&end));
    fields.expiry_time = Some(format_time(&end));

    fields
}

fn translate_one_time(start_at: Option<SourceInstant>, clock: &ScheduleClock) -> TargetScheduleFields {
    let start = clock.wall_clock_or_now(start_at);
    TargetScheduleFields {
        delivery: Delivery::Later,
        dt: Some(format_dt(&start)),
        later_date: Some(format_date(&start)),
        time: Some(format_time(&start)),
        ..Default::default()
    }
}

fn translate_recurring(recurring: &RecurringSchedule, clock: &ScheduleClock) -> TargetScheduleFields {
    let start = clock.wall_clock_or_now(recurring.start_at);
    let expiry = recurring
        .end_at
        .map(|e| clock.wall_clock(e))
        .unwrap_or_else(|| start + TimeDelta::days(DEFAULT_EXPIRY_DAYS));

    let mut info = ScheduleInfo::new(recurring.frequency.as_str());
    match &recurring.frequency {
        Frequency::Daily => info.daily_freq_duration = recurring.interval,
        Frequency::Weekly => {
            info.weekly_freq_duration = recurring.interval;
            info.selected_weekdays = weekday_indices(&recurring.weekdays);
        }
        Frequency::Monthly => {
            info.monthly_freq_duration = recurring.interval;
            if let Some(day) = recurring.day_of_month.filter(|d| *d != start.day()) {
                tracing::debug!(day, start_day = start.day(), "monthly day follows start date");
            }
            info.days_of_month = vec![start.day()];
        }
        Frequency::Other(other) => {
            tracing::debug!(frequency = %other, "unrecognized recurrence, no interval set");
        }
    }

    TargetScheduleFields {
        delivery: Delivery::Periodic,
        dt: Some(format_dt(&start)),
        periodic_start_date: Some(format_date(&start)),
        periodic_time: Some(format_time(&start)),
        periodic_timezone: Some(clock.zone_label()),
        periodic_expire_date: Some(format_date(&expiry)),
        periodic_expire_time: Some(format_time(&expiry)),
        schedule_info: Some(info),
        ..Default::default()
    }
}

/// Map active weekday names to sorted, distinct 0-indexed days (Monday = 0).
pub fn weekday_indices(weekdays: &BTreeMap<String, bool>) -> Vec<u8> {
    let mut days: Vec<u8> = weekdays
        .iter()
        .filter(|(_, active)| **active)
        .filter_map(|(name, _)| weekday_index(name))
        .collect();
    days.sort_unstable();
    days.dedup();
    days
}

fn weekday_index(name: &str) -> Option<u8> {
    match name.trim().to_ascii_lowercase().as_str() {
        "monday" | "mon" => Some(0),
        "tuesday" | "tue" => Some(1),
        "wednesday" | "wed" => Some(2),
        "thursday" | "thu" => Some(3),
        "friday" | "fri" => Some(4),
        "saturday" | "sat" => Some(5),
        "sunday" | "sun" => Some(6),
        _ => None,
    }
}

fn format_date(dt: &NaiveDateTime) -> String {
    dt.format(DATE_FORMAT).to_string()
}

fn format_time(dt: &NaiveDateTime) -> String {
    dt.format(TIME_FORMAT).to_string().to_lowercase()
}

fn format_dt(dt: &NaiveDateTime) -> String {
    dt.format(DT_FORMAT).to_string()
}
