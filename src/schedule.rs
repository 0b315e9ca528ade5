//! Decides when the scheduled broadcast fires.
//!
//! Each `(weekday, time)` pair in the configuration is a slot. A slot fires
//! when its instant falls inside the window between the previous tick and the
//! current one, so every slot fires exactly once per allowed day no matter
//! how late a tick arrives and how often ticks happen.

use chrono::{Datelike, Days, NaiveDateTime};

use crate::config::ScheduleConfig;

pub struct Scheduler {
    schedule: ScheduleConfig,
    last_tick: NaiveDateTime,
}

impl Scheduler {
    /// Starts tracking from `now`. Slots at or before `now` are considered
    /// already handled.
    pub fn new(schedule: ScheduleConfig, now: NaiveDateTime) -> Self {
        Self {
            schedule,
            last_tick: now,
        }
    }

    /// Returns the slots that came due in `(previous tick, now]`, oldest
    /// first, and advances the window. A clock that went backwards yields
    /// nothing and leaves the window where it was.
    pub fn tick(&mut self, now: NaiveDateTime) -> Vec<NaiveDateTime> {
        if now <= self.last_tick {
            return Vec::new();
        }

        let mut due = Vec::new();
        let mut day = self.last_tick.date();
        while day <= now.date() {
            if self.schedule.days.contains(&day.weekday()) {
                let mut slots: Vec<NaiveDateTime> = self
                    .schedule
                    .times
                    .iter()
                    .map(|time| day.and_time(*time))
                    .filter(|slot| *slot > self.last_tick && *slot <= now)
                    .collect();
                slots.sort();
                slots.dedup();
                due.extend(slots);
            }
            match day.checked_add_days(Days::new(1)) {
                Some(next) => day = next,
                None => break,
            }
        }

        self.last_tick = now;
        due
    }
}
