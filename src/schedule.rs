/// Meeting schedule gate
///
/// A pure function of the current time: the weekly meeting window is laid
/// over the calendar date of `now` in the meeting's fixed UTC offset.
/// Callers poll it; nothing here keeps a clock.
use chrono::{DateTime, Datelike, FixedOffset, NaiveDateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Weekly meeting definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingSchedule {
    /// Fixed offset of the meeting timezone (SAST = +120, no DST)
    pub utc_offset_minutes: i32,

    /// Label shown next to times
    pub timezone_label: String,

    pub days: Vec<Weekday>,

    /// The meeting panel opens at this time
    pub ready: NaiveTime,

    pub start: NaiveTime,

    /// Music playback is paused from this time until `end`
    pub music_pause: NaiveTime,

    pub end: NaiveTime,
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

impl Default for MeetingSchedule {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 120,
            timezone_label: "SAST".to_string(),
            days: vec![Weekday::Tue, Weekday::Wed],
            ready: hm(20, 10),
            start: hm(20, 15),
            music_pause: hm(20, 13),
            end: hm(22, 0),
        }
    }
}

impl MeetingSchedule {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.offset().is_none() {
            return Err(ConfigError::Invalid(format!(
                "utc_offset_minutes out of range: {}",
                self.utc_offset_minutes
            )));
        }
        if self.days.is_empty() {
            return Err(ConfigError::Invalid(
                "schedule needs at least one meeting day".to_string(),
            ));
        }
        if self.ready > self.start || self.start > self.end {
            return Err(ConfigError::Invalid(
                "schedule times must satisfy ready <= start <= end".to_string(),
            ));
        }
        if self.music_pause > self.end {
            return Err(ConfigError::Invalid(
                "music pause must not be after the meeting end".to_string(),
            ));
        }
        Ok(())
    }

    fn offset(&self) -> Option<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes.checked_mul(60)?)
    }
}

/// Meeting availability derived from one timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingWindow {
    /// `now` in the meeting timezone
    pub now: NaiveDateTime,
    pub is_meeting_day: bool,
    pub ready_at: NaiveDateTime,
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
    pub music_pause_at: NaiveDateTime,
    pub is_meeting_window: bool,
    pub show_countdown: bool,
    pub is_music_paused: bool,
    pub seconds_until_start: i64,
    days: Vec<Weekday>,
    timezone_label: String,
}

impl MeetingWindow {
    /// One-line status for the meeting screen
    pub fn status_text(&self) -> String {
        let start = self.start_at.format("%H:%M");
        if self.is_meeting_window {
            "Meeting ready…".to_string()
        } else if self.is_meeting_day {
            format!("Meeting today at {} {}.", start, self.timezone_label)
        } else {
            format!(
                "Next meeting is {} at {} {}.",
                join_days(&self.days),
                start,
                self.timezone_label
            )
        }
    }
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

fn join_days(days: &[Weekday]) -> String {
    let names: Vec<&str> = days.iter().map(|d| weekday_name(*d)).collect();
    match names.split_last() {
        None => String::new(),
        Some((last, [])) => last.to_string(),
        Some((last, rest)) => format!("{} and {}", rest.join(", "), last),
    }
}

/// Evaluates a [`MeetingSchedule`] against a point in time
#[derive(Debug, Clone)]
pub struct ScheduleGate {
    schedule: MeetingSchedule,
    offset: FixedOffset,
}

impl ScheduleGate {
    pub fn new(schedule: MeetingSchedule) -> Result<Self, ConfigError> {
        schedule.validate()?;
        let offset = schedule.offset().ok_or_else(|| {
            ConfigError::Invalid(format!(
                "utc_offset_minutes out of range: {}",
                schedule.utc_offset_minutes
            ))
        })?;
        Ok(Self { schedule, offset })
    }

    pub fn schedule(&self) -> &MeetingSchedule {
        &self.schedule
    }

    /// Evaluate at the current wall-clock time
    pub fn now(&self) -> MeetingWindow {
        self.evaluate(Utc::now())
    }

    pub fn evaluate(&self, now: DateTime<Utc>) -> MeetingWindow {
        self.evaluate_local(now.with_timezone(&self.offset).naive_local())
    }

    /// Evaluate a time already expressed in the meeting timezone
    pub fn evaluate_local(&self, now: NaiveDateTime) -> MeetingWindow {
        let date = now.date();
        let s = &self.schedule;
        let is_meeting_day = s.days.contains(&date.weekday());

        let ready_at = date.and_time(s.ready);
        let start_at = date.and_time(s.start);
        let end_at = date.and_time(s.end);
        let music_pause_at = date.and_time(s.music_pause);

        MeetingWindow {
            now,
            is_meeting_day,
            ready_at,
            start_at,
            end_at,
            music_pause_at,
            is_meeting_window: is_meeting_day && ready_at <= now && now <= end_at,
            show_countdown: is_meeting_day && now < ready_at,
            is_music_paused: is_meeting_day && music_pause_at <= now && now <= end_at,
            seconds_until_start: (start_at - now).num_seconds().max(0),
            days: s.days.clone(),
            timezone_label: s.timezone_label.clone(),
        }
    }
}
