use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::datetime::event_date_serde;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventRecord {
    pub id: u64,

    pub title: String,

    #[serde(with = "event_date_serde")]
    pub date_start: NaiveDateTime,

    #[serde(with = "event_date_serde")]
    pub date_end: NaiveDateTime,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl EventRecord {
    pub fn new(id: u64, title: String, date_start: NaiveDateTime, date_end: NaiveDateTime) -> Self {
        Self {
            id,
            title,
            date_start,
            date_end,
            location: None,
            description: None,
        }
    }

    pub fn start_day(&self) -> NaiveDate {
        self.date_start.date()
    }

    pub fn end_day(&self) -> NaiveDate {
        self.date_end.date()
    }

    /// Whether the event's day span covers `day`.
    pub fn covers(&self, day: NaiveDate) -> bool {
        self.start_day() <= day && day <= self.end_day()
    }
}
