use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tracing::{debug, instrument, trace};

use crate::datemath::{
    add_days, days_in_month, first_day_of_month, normalize_month, weekday_number,
};
use crate::error::{CalendarError, Result};
use crate::predicate::{ConditionName, Contribution, DayDescriptor, EventPredicate, PredicateId};

static NEXT_GRID_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridId(u64);

/// Week layout: first weekday of a row and which weekdays are shown.
/// Both use 0 = Sunday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarSettings {
    week_start: u32,
    show_days: [bool; 7],
}

impl Default for CalendarSettings {
    fn default() -> Self {
        Self {
            week_start: 1,
            show_days: [true; 7],
        }
    }
}

impl CalendarSettings {
    pub fn new(week_start: u32, show_days: &[bool]) -> Result<Self> {
        if week_start > 6 {
            return Err(CalendarError::InvalidWeekStart(week_start));
        }
        let show_days: [bool; 7] = show_days
            .try_into()
            .map_err(|_| CalendarError::InvalidShowDays(show_days.len()))?;
        if !show_days.iter().any(|visible| *visible) {
            return Err(CalendarError::NoVisibleDays);
        }
        Ok(Self {
            week_start,
            show_days,
        })
    }

    pub fn week_start(&self) -> u32 {
        self.week_start
    }

    pub fn show_days(&self) -> &[bool; 7] {
        &self.show_days
    }

    pub fn is_visible(&self, weekday: u32) -> bool {
        self.show_days
            .get(weekday as usize)
            .copied()
            .unwrap_or(false)
    }

    /// Weekday numbers in column order, starting at `week_start`.
    pub fn column_weekdays(&self) -> impl Iterator<Item = u32> + '_ {
        (0..7).map(move |column| (column + self.week_start) % 7)
    }
}

/// A calendar month. Constructing one normalizes month overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct MonthRef {
    pub year: i32,
    pub month: u32,
}

impl MonthRef {
    pub fn new(year: i32, month: i32) -> Self {
        let (year, month) = normalize_month(year, month);
        Self { year, month }
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn previous(self) -> Self {
        Self::new(self.year, self.month as i32 - 1)
    }

    pub fn next(self) -> Self {
        Self::new(self.year, self.month as i32 + 1)
    }

    pub fn first_day(self) -> Result<NaiveDate> {
        first_day_of_month(self.year, self.month)
    }

    pub fn last_day(self) -> Result<NaiveDate> {
        Ok(add_days(
            self.first_day()?,
            i64::from(self.days()) - 1,
        ))
    }

    pub fn days(self) -> u32 {
        days_in_month(self.year, self.month)
    }

    pub fn contains(self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl fmt::Display for MonthRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Classes, titles and outputs gathered from every predicate that
/// matched one cell, in attachment order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ObservedData {
    pub classes: Vec<String>,
    pub titles: Vec<String>,
    pub outputs: Vec<String>,
}

impl ObservedData {
    fn absorb(&mut self, contribution: Contribution) {
        for class in contribution.classes {
            if !self.classes.contains(&class) {
                self.classes.push(class);
            }
        }
        // Untitled predicates such as prev-next only style the cell; an
        // empty title would show up as a blank tooltip entry.
        if !contribution.title.is_empty() {
            self.titles.push(contribution.title);
        }
        if !contribution.output.is_empty() {
            self.outputs.push(contribution.output);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.titles.is_empty() && self.outputs.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cell {
    pub day: u32,
    pub is_current_month: bool,
    pub date: NaiveDate,
    pub data: ObservedData,
}

pub type Week = Vec<Cell>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardEvent {
    Today,
    PrevNext,
    Holidays,
    Weekends,
}

impl StandardEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Today => "today",
            Self::PrevNext => "prev-next",
            Self::Holidays => "holidays",
            Self::Weekends => "weekends",
        }
    }
}

impl FromStr for StandardEvent {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "today" => Ok(Self::Today),
            "prev-next" | "prev_next" => Ok(Self::PrevNext),
            "holidays" => Ok(Self::Holidays),
            "weekends" => Ok(Self::Weekends),
            other => Err(anyhow::anyhow!("unknown standard event: {other}")),
        }
    }
}

/// How weekday labels are shortened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelLength {
    Full,
    Chars(usize),
}

impl FromStr for LabelLength {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        if matches!(trimmed.to_ascii_lowercase().as_str(), "full" | "true") {
            return Ok(Self::Full);
        }
        trimmed
            .parse::<usize>()
            .map(Self::Chars)
            .map_err(|_| anyhow::anyhow!("invalid label length: {trimmed}"))
    }
}

/// Month grid builder. Owns its predicates and evaluates every one of
/// them, in attachment order, against each cell it produces.
#[derive(Debug)]
pub struct CalendarGrid {
    id: GridId,
    month: MonthRef,
    settings: CalendarSettings,
    today: NaiveDate,
    predicates: Vec<EventPredicate>,
}

impl CalendarGrid {
    pub fn new(month: i32, year: i32, settings: CalendarSettings) -> Self {
        Self::for_month(MonthRef::new(year, month), settings)
    }

    pub fn for_month(month: MonthRef, settings: CalendarSettings) -> Self {
        Self {
            id: GridId(NEXT_GRID_ID.fetch_add(1, Ordering::Relaxed)),
            month,
            settings,
            today: crate::datetime::project_today(),
            predicates: Vec::new(),
        }
    }

    /// Overrides the day the `today` standard predicate marks.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn id(&self) -> GridId {
        self.id
    }

    pub fn month(&self) -> u32 {
        self.month.month
    }

    pub fn year(&self) -> i32 {
        self.month.year
    }

    pub fn month_ref(&self) -> MonthRef {
        self.month
    }

    pub fn settings(&self) -> &CalendarSettings {
        &self.settings
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn predicates(&self) -> &[EventPredicate] {
        &self.predicates
    }

    pub fn predicate(&self, id: PredicateId) -> Option<&EventPredicate> {
        self.predicates.iter().find(|p| p.id() == id)
    }

    pub fn predicate_mut(&mut self, id: PredicateId) -> Option<&mut EventPredicate> {
        self.predicates.iter_mut().find(|p| p.id() == id)
    }

    /// New unattached predicate owned by this grid.
    pub fn event(&self) -> EventPredicate {
        EventPredicate::new(self.id)
    }

    /// Attaches a predicate at the end of the evaluation order. A value
    /// can only be attached once; `detach` hands it back by id.
    pub fn attach(&mut self, predicate: EventPredicate) -> Result<PredicateId> {
        if predicate.owner() != self.id {
            return Err(CalendarError::ForeignPredicate {
                predicate: predicate.id().get(),
            });
        }

        let id = predicate.id();
        trace!(predicate = %id, "attached predicate");
        self.predicates.push(predicate);
        Ok(id)
    }

    pub fn detach(&mut self, id: PredicateId) -> Option<EventPredicate> {
        let index = self.predicates.iter().position(|p| p.id() == id)?;
        trace!(predicate = %id, "detached predicate");
        Some(self.predicates.remove(index))
    }

    /// Attaches one of the built-in predicate sets.
    #[instrument(skip(self))]
    pub fn standard(&mut self, kind: StandardEvent) -> Result<Vec<PredicateId>> {
        let mut attached = Vec::new();
        match kind {
            StandardEvent::Today => {
                let mut today = self.event();
                today
                    .set_condition(ConditionName::Timestamp, self.today)?
                    .add_class("today")
                    .set_title("Today");
                attached.push(self.attach(today)?);
            }
            StandardEvent::PrevNext => {
                let mut padding = self.event();
                padding
                    .set_condition(ConditionName::Current, false)?
                    .add_class("prev-next");
                attached.push(self.attach(padding)?);
            }
            StandardEvent::Holidays => {
                let mut base = self.event();
                base.set_condition(ConditionName::Current, true)?
                    .add_class("holiday");

                let mut new_year = base.clone();
                new_year
                    .set_condition(ConditionName::Month, 1)?
                    .set_condition(ConditionName::Day, 1)?
                    .set_title("New Years")
                    .set_output("New Years");
                attached.push(self.attach(new_year)?);

                let mut easter = base.clone();
                easter
                    .set_condition(ConditionName::Easter, true)?
                    .set_title("Easter")
                    .set_output("Easter");
                attached.push(self.attach(easter)?);

                let mut christmas = base;
                christmas
                    .set_condition(ConditionName::Month, 12)?
                    .set_condition(ConditionName::Day, 25)?
                    .set_title("Christmas")
                    .set_output("Christmas");
                attached.push(self.attach(christmas)?);
            }
            StandardEvent::Weekends => {
                let mut weekend = self.event();
                weekend
                    .set_condition(ConditionName::Weekend, true)?
                    .add_class("weekend");
                attached.push(self.attach(weekend)?);
            }
        }
        debug!(count = attached.len(), "attached standard predicates");
        Ok(attached)
    }

    pub fn previous_month(&self) -> MonthRef {
        self.month.previous()
    }

    pub fn next_month(&self) -> MonthRef {
        self.month.next()
    }

    /// Labels for the visible columns, rotated to `week_start`. `names`
    /// is indexed by weekday, Sunday first.
    pub fn weekday_labels<S: AsRef<str>>(
        &self,
        length: LabelLength,
        names: &[S; 7],
    ) -> Vec<String> {
        self.settings
            .column_weekdays()
            .filter(|weekday| self.settings.is_visible(*weekday))
            .map(|weekday| {
                let name = names[weekday as usize].as_ref();
                match length {
                    LabelLength::Full => name.to_string(),
                    LabelLength::Chars(max) => name.chars().take(max).collect(),
                }
            })
            .collect()
    }

    /// Builds the month as rows of cells, padded with neighbouring-month
    /// days to whole weeks. Hidden weekday columns are removed and rows
    /// left without any day of this month are dropped.
    #[instrument(skip(self), fields(month = %self.month, predicates = self.predicates.len()))]
    pub fn build_weeks(&self) -> Result<Vec<Week>> {
        let first = self.month.first_day()?;
        let total = self.month.days();
        let last = add_days(first, i64::from(total) - 1);
        let week_start = self.settings.week_start;

        let leading = (weekday_number(first) + 7 - week_start) % 7;
        let trailing = 6 - (weekday_number(last) + 7 - week_start) % 7;
        let grid_start = add_days(first, -i64::from(leading));
        let cell_count = leading + total + trailing;

        debug!(leading, total, trailing, "building month grid");

        let mut weeks = Vec::with_capacity((cell_count / 7) as usize);
        let mut week = Vec::with_capacity(7);
        for index in 0..cell_count {
            let date = add_days(grid_start, i64::from(index));
            let descriptor = DayDescriptor::new(date, index / 7 + 1, self.month.contains(date));
            let data = self.observe(&descriptor)?;
            week.push(Cell {
                day: date.day(),
                is_current_month: descriptor.is_current_month,
                date,
                data,
            });
            if week.len() == 7 {
                weeks.push(std::mem::replace(&mut week, Vec::with_capacity(7)));
            }
        }

        Ok(self.apply_visibility(weeks))
    }

    fn observe(&self, descriptor: &DayDescriptor) -> Result<ObservedData> {
        let mut data = ObservedData::default();
        for predicate in &self.predicates {
            if let Some(contribution) = predicate.evaluate(descriptor)? {
                data.absorb(contribution);
            }
        }
        if !data.is_empty() {
            trace!(date = %descriptor.date, classes = ?data.classes, "cell matched");
        }
        Ok(data)
    }

    fn apply_visibility(&self, weeks: Vec<Week>) -> Vec<Week> {
        weeks
            .into_iter()
            .map(|week| {
                week.into_iter()
                    .filter(|cell| self.settings.is_visible(weekday_number(cell.date)))
                    .collect::<Week>()
            })
            .filter(|week| week.iter().any(|cell| cell.is_current_month))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use super::*;
    use crate::predicate::ConditionValue;

    const NAMES: [&str; 7] = [
        "Sunday",
        "Monday",
        "Tuesday",
        "Wednesday",
        "Thursday",
        "Friday",
        "Saturday",
    ];

    fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    fn cells(weeks: &[Week]) -> impl Iterator<Item = &Cell> {
        weeks.iter().flatten()
    }

    #[test]
    fn every_day_appears_once_for_all_week_starts() {
        for week_start in 0..7 {
            for month in 1..=12 {
                let settings = CalendarSettings::new(week_start, &[true; 7]).expect("settings");
                let grid = CalendarGrid::new(month, 2024, settings);
                let weeks = grid.build_weeks().expect("build");

                let days: Vec<u32> = cells(&weeks)
                    .filter(|cell| cell.is_current_month)
                    .map(|cell| cell.day)
                    .collect();
                let expected: Vec<u32> = (1..=days_in_month(2024, month as u32)).collect();
                assert_eq!(days, expected, "month {month} week_start {week_start}");

                assert!(weeks.iter().all(|week| week.len() == 7));
                let first = &weeks[0];
                let last = &weeks[weeks.len() - 1];
                assert!(first.iter().filter(|c| !c.is_current_month).count() <= 6);
                assert!(last.iter().filter(|c| !c.is_current_month).count() <= 6);
                assert_eq!(weekday_number(first[0].date), week_start);
            }
        }
    }

    #[test]
    fn padding_comes_from_adjacent_months() {
        // March 2024 starts on a Friday; Monday-first rows need four
        // days of February.
        let grid = CalendarGrid::new(3, 2024, CalendarSettings::default());
        let weeks = grid.build_weeks().expect("build");
        let leading: Vec<u32> = weeks[0]
            .iter()
            .filter(|c| !c.is_current_month)
            .map(|c| c.day)
            .collect();
        assert_eq!(leading, vec![26, 27, 28, 29]);
        assert_eq!(weeks.len(), 5);
        assert!(weeks[4].iter().all(|c| c.is_current_month));
    }

    #[test]
    fn christmas_matches_once_in_december_only() {
        for month in 1..=12 {
            let mut grid = CalendarGrid::new(month, 2024, CalendarSettings::default());
            let mut christmas = grid.event();
            christmas
                .set_condition(ConditionName::Month, 12)
                .expect("month")
                .set_condition(ConditionName::Day, 25)
                .expect("day")
                .set_condition(ConditionName::Current, true)
                .expect("current")
                .set_title("Christmas");
            grid.attach(christmas).expect("attach");

            let weeks = grid.build_weeks().expect("build");
            let hits = cells(&weeks).filter(|c| !c.data.titles.is_empty()).count();
            assert_eq!(hits, usize::from(month == 12), "month {month}");
        }
    }

    #[test]
    fn predicate_without_conditions_matches_every_cell() {
        let mut grid = CalendarGrid::new(2, 2025, CalendarSettings::default());
        let mut everything = grid.event();
        everything
            .set_condition(ConditionName::Weekend, true)
            .expect("weekend")
            .set_condition(ConditionName::Month, 2)
            .expect("month")
            .add_class("all");
        everything
            .set_condition(ConditionName::Weekend, None::<bool>)
            .expect("unset")
            .set_condition(ConditionName::Month, None::<i64>)
            .expect("unset");
        grid.attach(everything).expect("attach");

        let weeks = grid.build_weeks().expect("build");
        assert!(cells(&weeks).all(|c| c.data.classes == ["all".to_string()]));
    }

    #[test]
    fn prev_next_marks_only_padding() {
        let mut grid = CalendarGrid::new(5, 2024, CalendarSettings::default());
        grid.standard(StandardEvent::PrevNext).expect("standard");
        let weeks = grid.build_weeks().expect("build");

        for cell in cells(&weeks) {
            if cell.is_current_month {
                assert!(cell.data.is_empty(), "{}", cell.date);
            } else {
                assert_eq!(cell.data.classes, vec!["prev-next".to_string()]);
                assert!(cell.data.titles.is_empty(), "{}", cell.date);
            }
        }
        assert!(cells(&weeks).any(|c| !c.is_current_month));
    }

    #[test]
    fn holidays_mark_easter_and_skip_padding() {
        let mut grid = CalendarGrid::new(3, 2024, CalendarSettings::default());
        grid.standard(StandardEvent::Holidays).expect("standard");
        let weeks = grid.build_weeks().expect("build");

        let marked: Vec<&Cell> = cells(&weeks)
            .filter(|c| c.data.classes.contains(&"holiday".to_string()))
            .collect();
        assert_eq!(marked.len(), 1);
        assert_eq!(marked[0].date, ymd(2024, 3, 31));
        assert_eq!(marked[0].data.outputs, vec!["Easter".to_string()]);

        let mut january = CalendarGrid::new(1, 2025, CalendarSettings::default());
        january.standard(StandardEvent::Holidays).expect("standard");
        let weeks = january.build_weeks().expect("build");
        let new_year: Vec<NaiveDate> = cells(&weeks)
            .filter(|c| !c.data.outputs.is_empty())
            .map(|c| c.date)
            .collect();
        assert_eq!(new_year, vec![ymd(2025, 1, 1)]);
    }

    #[test]
    fn today_and_weekends_accumulate_in_attachment_order() {
        let mut grid = CalendarGrid::new(6, 2024, CalendarSettings::default())
            .with_today(ymd(2024, 6, 15));
        grid.standard(StandardEvent::Today).expect("today");
        grid.standard(StandardEvent::Weekends).expect("weekends");
        let mut party = grid.event();
        party
            .set_condition(ConditionName::Timestamp, ymd(2024, 6, 15))
            .expect("timestamp")
            .add_class("today")
            .set_title("Party")
            .set_output("Party");
        grid.attach(party).expect("attach");

        let weeks = grid.build_weeks().expect("build");
        let saturday = cells(&weeks)
            .find(|c| c.date == ymd(2024, 6, 15))
            .expect("cell present");
        assert_eq!(
            saturday.data.classes,
            vec!["today".to_string(), "weekend".to_string()]
        );
        assert_eq!(
            saturday.data.titles,
            vec!["Today".to_string(), "Party".to_string()]
        );
        assert_eq!(saturday.data.outputs, vec!["Party".to_string()]);
    }

    #[test]
    fn attach_and_detach_by_identity() {
        let mut grid = CalendarGrid::new(6, 2024, CalendarSettings::default());
        let base = grid.event();
        let variant = base.clone();
        assert_ne!(base.id(), variant.id());

        let base_id = grid.attach(base).expect("attach");
        let variant_id = grid.attach(variant).expect("attach");
        assert_eq!(grid.predicates().len(), 2);

        let mut detached = grid.detach(base_id).expect("attached");
        assert!(grid.detach(base_id).is_none());
        assert_eq!(grid.predicates()[0].id(), variant_id);

        detached.set_title("again");
        assert_eq!(grid.attach(detached).expect("attach"), base_id);
        assert_eq!(grid.predicates().len(), 2);
        assert_eq!(
            grid.predicate(base_id).map(EventPredicate::title),
            Some("again")
        );
    }

    #[test]
    fn attached_predicates_can_be_edited() {
        let mut grid = CalendarGrid::new(6, 2024, CalendarSettings::default());
        let id = grid.attach(grid.event()).expect("attach");
        grid.predicate_mut(id)
            .expect("attached")
            .add_class("edited");

        let weeks = grid.build_weeks().expect("build");
        assert!(cells(&weeks).all(|c| c.data.classes == ["edited".to_string()]));
    }

    #[test]
    fn foreign_predicates_are_rejected() {
        let grid = CalendarGrid::new(6, 2024, CalendarSettings::default());
        let mut other = CalendarGrid::new(6, 2024, CalendarSettings::default());
        assert!(matches!(
            other.attach(grid.event()),
            Err(CalendarError::ForeignPredicate { .. })
        ));
    }

    #[test]
    fn weekday_labels_rotate_and_mask() {
        let monday_first = CalendarGrid::new(1, 2025, CalendarSettings::default());
        assert_eq!(
            monday_first.weekday_labels(LabelLength::Full, &NAMES),
            vec![
                "Monday",
                "Tuesday",
                "Wednesday",
                "Thursday",
                "Friday",
                "Saturday",
                "Sunday"
            ]
        );

        let weekdays_only = CalendarSettings::new(1, &[false, true, true, true, true, true, false])
            .expect("settings");
        let grid = CalendarGrid::new(1, 2025, weekdays_only);
        assert_eq!(
            grid.weekday_labels(LabelLength::Chars(3), &NAMES),
            vec!["Mon", "Tue", "Wed", "Thu", "Fri"]
        );
    }

    #[test]
    fn hidden_columns_drop_padding_only_rows() {
        // September 2024 starts on a Sunday: with Monday-first rows the
        // first row is six August days plus September 1st.
        let no_sunday = CalendarSettings::new(1, &[false, true, true, true, true, true, true])
            .expect("settings");
        let grid = CalendarGrid::new(9, 2024, no_sunday);
        let weeks = grid.build_weeks().expect("build");

        assert!(weeks.iter().all(|week| week.len() == 6));
        assert_eq!(weeks[0][0].date, ymd(2024, 9, 2));
        assert!(cells(&weeks).all(|c| weekday_number(c.date) != 0));
        assert!(cells(&weeks).any(|c| !c.is_current_month));
    }

    #[test]
    fn adjacent_months_roll_over_years() {
        let january = CalendarGrid::new(1, 2024, CalendarSettings::default());
        assert_eq!(january.previous_month(), MonthRef { year: 2023, month: 12 });
        assert_eq!(january.next_month(), MonthRef { year: 2024, month: 2 });

        let december = CalendarGrid::new(12, 2024, CalendarSettings::default());
        assert_eq!(december.next_month().to_string(), "2025-01");
        assert_eq!(december.month(), 12);

        let overflow = CalendarGrid::new(13, 2024, CalendarSettings::default());
        assert_eq!((overflow.month(), overflow.year()), (1, 2025));
    }

    #[test]
    fn invalid_settings_are_rejected() {
        assert!(matches!(
            CalendarSettings::new(7, &[true; 7]),
            Err(CalendarError::InvalidWeekStart(7))
        ));
        assert!(matches!(
            CalendarSettings::new(0, &[true; 6]),
            Err(CalendarError::InvalidShowDays(6))
        ));
        assert!(matches!(
            CalendarSettings::new(0, &[false; 7]),
            Err(CalendarError::NoVisibleDays)
        ));
    }

    #[test]
    fn failing_callback_aborts_the_render() {
        let mut grid = CalendarGrid::new(6, 2024, CalendarSettings::default());
        let mut broken = grid.event();
        broken
            .set_condition(
                ConditionName::Callback,
                ConditionValue::callback(|conditions, _| {
                    if conditions.day == 20 {
                        Err(anyhow!("no rule for the 20th"))
                    } else {
                        Ok(false)
                    }
                }),
            )
            .expect("callback");
        grid.attach(broken).expect("attach");

        assert!(matches!(
            grid.build_weeks(),
            Err(CalendarError::Callback { .. })
        ));
    }

    #[test]
    fn week_numbers_follow_rows() {
        let mut grid = CalendarGrid::new(6, 2024, CalendarSettings::default());
        let mut second_week = grid.event();
        second_week
            .set_condition(ConditionName::Week, 2)
            .expect("week")
            .add_class("w2");
        grid.attach(second_week).expect("attach");

        let weeks = grid.build_weeks().expect("build");
        for (index, week) in weeks.iter().enumerate() {
            for cell in week {
                assert_eq!(cell.data.classes.contains(&"w2".to_string()), index == 1);
            }
        }
    }

    #[test]
    fn occurrence_on_padding_uses_the_cells_own_month() {
        // June 2024 rows start on Monday 27 May, the last Monday of May.
        let mut grid = CalendarGrid::new(6, 2024, CalendarSettings::default());
        let mut last_monday = grid.event();
        last_monday
            .set_condition(ConditionName::DayOfWeek, 1)
            .expect("day of week")
            .set_condition(ConditionName::LastOccurrence, true)
            .expect("last occurrence")
            .set_title("Last Monday");
        grid.attach(last_monday).expect("attach");

        let mut fourth_monday = grid.event();
        fourth_monday
            .set_condition(ConditionName::DayOfWeek, 1)
            .expect("day of week")
            .set_condition(ConditionName::Occurrence, 4)
            .expect("occurrence")
            .add_class("fourth-monday");
        grid.attach(fourth_monday).expect("attach");

        let weeks = grid.build_weeks().expect("build");
        let matched: Vec<NaiveDate> = cells(&weeks)
            .filter(|cell| cell.data.titles.contains(&"Last Monday".to_string()))
            .map(|cell| cell.date)
            .collect();
        assert_eq!(matched, vec![ymd(2024, 5, 27), ymd(2024, 6, 24)]);

        let padding = cells(&weeks)
            .find(|cell| cell.date == ymd(2024, 5, 27))
            .expect("padding monday");
        assert!(!padding.is_current_month);

        for day in [3, 10, 17] {
            let cell = cells(&weeks)
                .find(|cell| cell.date == ymd(2024, 6, day))
                .expect("june monday");
            assert!(cell.data.titles.is_empty(), "{}", cell.date);
        }

        let fourth: Vec<NaiveDate> = cells(&weeks)
            .filter(|cell| cell.data.classes.contains(&"fourth-monday".to_string()))
            .map(|cell| cell.date)
            .collect();
        assert_eq!(fourth, vec![ymd(2024, 5, 27), ymd(2024, 6, 24)]);
    }
}
