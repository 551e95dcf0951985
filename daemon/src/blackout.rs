//! Day/time windows during which shutdown is never triggered
//!
//! Periods are written as comma-separated entries of `<days> <HH:MM>-<HH:MM>`,
//! e.g. `mon-fri 09:00-17:00,sat,sun 10:00-12:00`. Days are `all`, a three
//! letter weekday, an inclusive range (`fri-mon` wraps over the weekend), or
//! a comma list of those.

use crate::error::MonitorError;
use chrono::{Datelike, Timelike, Weekday};

const MINUTES_PER_DAY: u16 = 24 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DaySet(u8);

impl DaySet {
    pub const ALL: DaySet = DaySet(0b111_1111);

    pub fn insert(&mut self, day: Weekday) {
        self.0 |= 1 << day.num_days_from_monday();
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_monday()) != 0
    }

    pub fn union(self, other: DaySet) -> DaySet {
        DaySet(self.0 | other.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlackoutWindow {
    pub days: DaySet,
    pub start_minute: u16,
    pub end_minute: u16,
}

impl BlackoutWindow {
    pub fn matches(&self, day: Weekday, minute: u16) -> bool {
        self.days.contains(day) && self.start_minute <= minute && minute <= self.end_minute
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlackoutSchedule {
    windows: Vec<BlackoutWindow>,
}

impl BlackoutSchedule {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn parse(periods: &str) -> Result<Self, MonitorError> {
        let mut windows = Vec::new();
        let mut pending_days = DaySet::default();
        let mut pending_text = String::new();

        for piece in periods.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let mut tokens = piece.split_whitespace();
            let days_token = tokens.next().unwrap_or_default();
            let range_token = tokens.next();
            if tokens.next().is_some() {
                return Err(parse_error(piece, "expected `<days> <HH:MM>-<HH:MM>`"));
            }

            let days = parse_days(days_token).ok_or_else(|| parse_error(piece, "unknown day"))?;

            let Some(range) = range_token else {
                // A bare day list continues into the next entry, as in `sat,sun 10:00-12:00`.
                pending_days = pending_days.union(days);
                pending_text.push_str(piece);
                pending_text.push(',');
                continue;
            };

            let (start_minute, end_minute) = parse_range(range).ok_or_else(|| parse_error(piece, "bad time range"))?;
            if start_minute > end_minute {
                return Err(parse_error(piece, "start time is after end time"));
            }

            windows.push(BlackoutWindow {
                days: pending_days.union(days),
                start_minute,
                end_minute,
            });
            pending_days = DaySet::default();
            pending_text.clear();
        }

        if !pending_days.is_empty() {
            return Err(parse_error(pending_text.trim_end_matches(','), "days without a time range"));
        }

        Ok(Self { windows })
    }

    /// Parses `periods`, falling back to an empty schedule when it is malformed.
    pub fn parse_or_empty(periods: &str) -> (Self, Option<MonitorError>) {
        match Self::parse(periods) {
            Ok(schedule) => (schedule, None),
            Err(e) => (Self::empty(), Some(e)),
        }
    }

    pub fn is_blacked_out<T: Datelike + Timelike>(&self, now: &T) -> bool {
        let minute = (now.hour() * 60 + now.minute()) as u16;
        let day = now.weekday();
        self.windows.iter().any(|w| w.matches(day, minute))
    }

    pub fn windows(&self) -> &[BlackoutWindow] {
        &self.windows
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

fn parse_error(entry: &str, reason: &str) -> MonitorError {
    MonitorError::ConfigParse { entry: entry.to_string(), reason: reason.to_string() }
}

fn parse_weekday(token: &str) -> Option<Weekday> {
    match token {
        "mon" => Some(Weekday::Mon),
        "tue" => Some(Weekday::Tue),
        "wed" => Some(Weekday::Wed),
        "thu" => Some(Weekday::Thu),
        "fri" => Some(Weekday::Fri),
        "sat" => Some(Weekday::Sat),
        "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

fn parse_days(token: &str) -> Option<DaySet> {
    let token = token.to_ascii_lowercase();
    if token == "all" {
        return Some(DaySet::ALL);
    }

    let mut set = DaySet::default();
    match token.split_once('-') {
        Some((from, to)) => {
            let mut day = parse_weekday(from)?;
            let last = parse_weekday(to)?;
            set.insert(day);
            while day != last {
                day = day.succ();
                set.insert(day);
            }
        }
        None => set.insert(parse_weekday(&token)?),
    }
    Some(set)
}

fn parse_clock(token: &str) -> Option<u16> {
    let (hours, minutes) = token.split_once(':')?;
    let hours: u16 = hours.parse().ok()?;
    let minutes: u16 = minutes.parse().ok()?;
    if hours >= 24 || minutes >= 60 {
        return None;
    }
    let total = hours * 60 + minutes;
    (total < MINUTES_PER_DAY).then_some(total)
}

fn parse_range(token: &str) -> Option<(u16, u16)> {
    let (start, end) = token.split_once('-')?;
    Some((parse_clock(start)?, parse_clock(end)?))
}
