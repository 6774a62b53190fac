use std::str::FromStr;

use anyhow::{Context, anyhow};
use chrono::{Datelike, NaiveDate};
use serde::{Serialize, Serializer};
use tracing::{debug, instrument};

use crate::datetime::parse_month_expr;
use crate::event::EventRecord;
use crate::grid::{CalendarGrid, CalendarSettings, LabelLength, MonthRef, StandardEvent, Week};
use crate::predicate::ConditionName;
use crate::store::{EventSource, overlaps_month};

const WEEKDAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Display names for the month view. `weekdays` is Sunday first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarLabels {
    pub weekdays: [String; 7],
    pub months: [String; 12],
    pub length: LabelLength,
}

impl Default for CalendarLabels {
    fn default() -> Self {
        Self {
            weekdays: WEEKDAY_NAMES.map(String::from),
            months: MONTH_NAMES.map(String::from),
            length: LabelLength::Chars(3),
        }
    }
}

impl CalendarLabels {
    pub fn month_name(&self, month: u32) -> &str {
        self.months
            .get(month.saturating_sub(1) as usize)
            .map(String::as_str)
            .unwrap_or_default()
    }
}

/// Which records the event list shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonthFilter {
    All,
    Month(MonthRef),
    Day(NaiveDate),
}

impl MonthFilter {
    pub fn matches(&self, record: &EventRecord) -> bool {
        match self {
            Self::All => true,
            Self::Month(month) => overlaps_month(record, *month),
            Self::Day(day) => record.covers(*day),
        }
    }
}

impl FromStr for MonthFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        if trimmed.matches('-').count() == 2 {
            return NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .map(Self::Day)
                .map_err(|_| anyhow!("invalid day filter: {trimmed}"));
        }
        parse_month_expr(trimmed)
            .map(Self::Month)
            .with_context(|| {
                format!("invalid filter: {trimmed} (expected all, YYYY-MM or YYYY-MM-DD)")
            })
    }
}

/// Everything a template needs to draw one month. Adjacent months
/// serialize as `YYYY-MM` link keys and the current month as `MM`.
#[derive(Debug, Clone, Serialize)]
pub struct MonthView {
    #[serde(serialize_with = "month_key")]
    pub prev_month: MonthRef,
    #[serde(serialize_with = "month_key")]
    pub next_month: MonthRef,
    #[serde(serialize_with = "month_number")]
    pub current_month: MonthRef,
    pub current_month_label: String,
    pub year: i32,
    pub weekday_labels: Vec<String>,
    pub weeks: Vec<Week>,
}

fn month_key<S: Serializer>(month: &MonthRef, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(month)
}

fn month_number<S: Serializer>(month: &MonthRef, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&format_args!("{:02}", month.month))
}

/// Builds the month view: standard predicates first, then one
/// predicate per day each record spans inside the month.
#[instrument(skip(source, settings, standard, labels))]
pub fn build_month_view(
    source: &dyn EventSource,
    month: Option<MonthRef>,
    settings: CalendarSettings,
    standard: &[StandardEvent],
    labels: &CalendarLabels,
    today: NaiveDate,
) -> anyhow::Result<MonthView> {
    let month = month.unwrap_or_else(|| MonthRef::of(today));
    let mut grid = CalendarGrid::for_month(month, settings).with_today(today);

    for kind in standard {
        grid.standard(*kind)
            .with_context(|| format!("failed to attach {} predicates", kind.as_str()))?;
    }

    let records = source
        .events_in_month(month)
        .with_context(|| format!("failed to load events for {month}"))?;
    let first = month.first_day()?;
    let last = month.last_day()?;

    let mut attached = 0usize;
    for record in &records {
        let mut day = record.start_day().max(first);
        let end = record.end_day().min(last);
        while day <= end {
            let mut predicate = grid.event();
            predicate
                .set_condition(ConditionName::Timestamp, day)?
                .set_title(record.title.as_str())
                .set_output(record.title.as_str());
            grid.attach(predicate)?;
            attached += 1;
            let Some(next) = day.succ_opt() else {
                break;
            };
            day = next;
        }
    }
    debug!(records = records.len(), attached, "attached event predicates");

    let weeks = grid.build_weeks().context("failed to build month grid")?;

    Ok(MonthView {
        prev_month: grid.previous_month(),
        next_month: grid.next_month(),
        current_month: month,
        current_month_label: labels.month_name(month.month).to_string(),
        year: month.year,
        weekday_labels: grid.weekday_labels(labels.length, &labels.weekdays),
        weeks,
    })
}

/// Records matching `filter`, earliest start first.
#[instrument(skip(source))]
pub fn list_events(
    source: &dyn EventSource,
    filter: MonthFilter,
) -> anyhow::Result<Vec<EventRecord>> {
    let mut events = match filter {
        MonthFilter::Month(month) => source.events_in_month(month)?,
        _ => source
            .all_events()?
            .into_iter()
            .filter(|record| filter.matches(record))
            .collect(),
    };
    events.sort_by_key(|e| (e.date_start, e.id));
    debug!(count = events.len(), "listed events");
    Ok(events)
}

/// Day numbers of the month's current cells with their outputs, in
/// grid order. Used for legends.
pub fn outputs_by_day(view: &MonthView) -> Vec<(NaiveDate, Vec<String>)> {
    view.weeks
        .iter()
        .flatten()
        .filter(|cell| cell.is_current_month && !cell.data.outputs.is_empty())
        .map(|cell| (cell.date, cell.data.outputs.clone()))
        .collect()
}

pub fn month_heading(view: &MonthView) -> String {
    format!("{} {}", view.current_month_label, view.year)
}

pub fn is_weekend(date: NaiveDate) -> bool {
    date.weekday().num_days_from_sunday() % 6 == 0
}
