//! Simulation clock: owns the day counter and the run horizon.

use crate::types::{Day, RunId, DAYS_PER_YEAR};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimClock {
    pub run_id:   RunId,
    /// The next day to simulate. Equals the number of days completed.
    pub next_day: Day,
    pub horizon:  Day,
}

impl SimClock {
    pub fn new(run_id: RunId, horizon: Day) -> Self {
        Self { run_id, next_day: 0, horizon }
    }

    /// Claim the next day to simulate, or `None` once the horizon is reached.
    pub fn advance(&mut self) -> Option<Day> {
        if self.is_finished() {
            return None;
        }
        let day = self.next_day;
        self.next_day += 1;
        Some(day)
    }

    pub fn is_finished(&self) -> bool {
        self.next_day >= self.horizon
    }

    pub fn days_completed(&self) -> Day {
        self.next_day
    }

    /// Zero-based simulated year of `day`.
    pub fn year_of(day: Day) -> Day {
        day / DAYS_PER_YEAR
    }
}
