use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::components::Season;

fn default_frames_per_day() -> u32 {
    2_048
}

/// In-game calendar owned by the host climate simulation. Read-only to the
/// seasonal systems, which only ever see the derived `Season`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Climate {
    pub date: NaiveDate,
    #[serde(default = "default_frames_per_day")]
    pub frames_per_day: u32,
    #[serde(default)]
    frame_in_day: u32,
    /// Season reported by the host by id, overriding the calendar.
    #[serde(default)]
    season_override: Option<Season>,
}

impl Climate {
    pub fn new(date: NaiveDate, frames_per_day: u32) -> Self {
        Self {
            date,
            frames_per_day: frames_per_day.max(1),
            frame_in_day: 0,
            season_override: None,
        }
    }

    pub fn season(&self) -> Season {
        self.season_override
            .unwrap_or_else(|| season_for_month(self.date.month()))
    }

    /// Pins the season to a host identifier such as `Climate.SEASON[Winter]`.
    /// `None` goes back to deriving it from the date.
    pub fn set_season_id(&mut self, id: Option<&str>) {
        self.season_override = id.map(Season::from_season_id);
    }

    pub fn set_date(&mut self, date: NaiveDate) {
        self.date = date;
        self.frame_in_day = 0;
    }

    /// Advances the calendar by one simulation frame.
    pub fn advance_frame(&mut self) {
        self.frame_in_day += 1;
        if self.frame_in_day >= self.frames_per_day {
            self.frame_in_day = 0;
            if let Some(next) = self.date.checked_add_days(Days::new(1)) {
                self.date = next;
            }
        }
    }
}

impl Default for Climate {
    fn default() -> Self {
        let date = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap_or_default();
        Self::new(date, default_frames_per_day())
    }
}

pub fn season_for_month(month: u32) -> Season {
    match month {
        3..=5 => Season::Spring,
        6..=8 => Season::Summer,
        9..=11 => Season::Autumn,
        _ => Season::Winter,
    }
}
