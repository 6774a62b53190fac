use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{
  AtomicU64,
  Ordering
};

use chrono::{
  DateTime,
  Datelike,
  Duration,
  NaiveDate,
  NaiveDateTime
};
use serde::Serialize;
use tracing::trace;

use crate::datemath::{
  days_in_month,
  is_easter,
  is_last_occurrence_of_weekday_in_month,
  occurrence_of_weekday_in_month,
  weekday_number
};
use crate::error::{
  CalendarError,
  Result
};
use crate::grid::GridId;

static NEXT_PREDICATE_ID: AtomicU64 =
  AtomicU64::new(1);

/// Identity of one predicate instance. Clones get a fresh id, so a
/// cloned predicate attaches as a separate entry.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize
)]
pub struct PredicateId(u64);

impl PredicateId {
  fn next() -> Self {
    Self(
      NEXT_PREDICATE_ID
        .fetch_add(1, Ordering::Relaxed)
    )
  }

  #[must_use]
  pub fn get(self) -> u64 {
    self.0
  }
}

impl fmt::Display for PredicateId {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord
)]
pub enum ConditionName {
  Timestamp,
  Day,
  Week,
  Month,
  Year,
  DayOfWeek,
  Current,
  Weekend,
  FirstDay,
  LastDay,
  Occurrence,
  LastOccurrence,
  Easter,
  Callback
}

impl ConditionName {
  /// Conditions read straight off the day descriptor, in test order.
  pub const BASE: [ConditionName; 7] = [
    ConditionName::Timestamp,
    ConditionName::Day,
    ConditionName::Week,
    ConditionName::Month,
    ConditionName::Year,
    ConditionName::DayOfWeek,
    ConditionName::Current
  ];

  #[must_use]
  pub fn as_str(self) -> &'static str {
    match self {
      | Self::Timestamp => "timestamp",
      | Self::Day => "day",
      | Self::Week => "week",
      | Self::Month => "month",
      | Self::Year => "year",
      | Self::DayOfWeek => "day_of_week",
      | Self::Current => "current",
      | Self::Weekend => "weekend",
      | Self::FirstDay => "first_day",
      | Self::LastDay => "last_day",
      | Self::Occurrence => "occurrence",
      | Self::LastOccurrence => {
        "last_occurrence"
      }
      | Self::Easter => "easter",
      | Self::Callback => "callback"
    }
  }

  #[must_use]
  pub fn is_base(self) -> bool {
    Self::BASE.contains(&self)
  }

  #[must_use]
  pub fn is_boolean(self) -> bool {
    matches!(
      self,
      Self::Current
        | Self::Weekend
        | Self::FirstDay
        | Self::LastDay
        | Self::LastOccurrence
        | Self::Easter
    )
  }
}

impl FromStr for ConditionName {
  type Err = CalendarError;

  fn from_str(
    s: &str
  ) -> std::result::Result<Self, Self::Err>
  {
    let name = match s.trim() {
      | "timestamp" => Self::Timestamp,
      | "day" => Self::Day,
      | "week" => Self::Week,
      | "month" => Self::Month,
      | "year" => Self::Year,
      | "day_of_week" => Self::DayOfWeek,
      | "current" => Self::Current,
      | "weekend" => Self::Weekend,
      | "first_day" => Self::FirstDay,
      | "last_day" => Self::LastDay,
      | "occurrence" => Self::Occurrence,
      | "last_occurrence" => {
        Self::LastOccurrence
      }
      | "easter" => Self::Easter,
      | "callback" => Self::Callback,
      | other => {
        return Err(
          CalendarError::UnknownCondition(
            other.to_string()
          )
        );
      }
    };
    Ok(name)
  }
}

impl fmt::Display for ConditionName {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Externally supplied test: receives the day's derived conditions and
/// the predicate being evaluated.
pub type ConditionCallback = Arc<
  dyn Fn(
      &DayConditions,
      &EventPredicate
    ) -> anyhow::Result<bool>
    + Send
    + Sync
>;

#[derive(Clone)]
pub enum ConditionValue {
  Int(i64),
  Bool(bool),
  Timestamp(NaiveDateTime),
  Callback(ConditionCallback)
}

impl ConditionValue {
  pub fn callback<F>(f: F) -> Self
  where
    F: Fn(
        &DayConditions,
        &EventPredicate
      ) -> anyhow::Result<bool>
      + Send
      + Sync
      + 'static
  {
    Self::Callback(Arc::new(f))
  }

  fn truthy(
    &self,
    name: ConditionName
  ) -> Result<bool> {
    match self {
      | Self::Int(n) => Ok(*n != 0),
      | Self::Bool(b) => Ok(*b),
      | Self::Timestamp(_) => Ok(true),
      | Self::Callback(_) => {
        Err(CalendarError::ConditionType {
          name:     name.as_str(),
          expected: "a boolean"
        })
      }
    }
  }

  fn integer(
    &self,
    name: ConditionName
  ) -> Result<i64> {
    match self {
      | Self::Int(n) => Ok(*n),
      | Self::Bool(b) => Ok(i64::from(*b)),
      | Self::Timestamp(ts) => {
        Ok(ts.and_utc().timestamp())
      }
      | Self::Callback(_) => {
        Err(CalendarError::ConditionType {
          name:     name.as_str(),
          expected: "an integer"
        })
      }
    }
  }

  /// Strict equality: values of different kinds never match.
  fn same_as(
    &self,
    other: &ConditionValue
  ) -> bool {
    match (self, other) {
      | (Self::Int(a), Self::Int(b)) => {
        a == b
      }
      | (Self::Bool(a), Self::Bool(b)) => {
        a == b
      }
      | (
        Self::Timestamp(a),
        Self::Timestamp(b)
      ) => a == b,
      | _ => false
    }
  }
}

impl fmt::Debug for ConditionValue {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    match self {
      | Self::Int(n) => {
        write!(f, "Int({n})")
      }
      | Self::Bool(b) => {
        write!(f, "Bool({b})")
      }
      | Self::Timestamp(ts) => {
        write!(f, "Timestamp({ts})")
      }
      | Self::Callback(_) => {
        f.write_str("Callback(..)")
      }
    }
  }
}

impl From<i64> for ConditionValue {
  fn from(value: i64) -> Self {
    Self::Int(value)
  }
}

impl From<i32> for ConditionValue {
  fn from(value: i32) -> Self {
    Self::Int(i64::from(value))
  }
}

impl From<u32> for ConditionValue {
  fn from(value: u32) -> Self {
    Self::Int(i64::from(value))
  }
}

impl From<bool> for ConditionValue {
  fn from(value: bool) -> Self {
    Self::Bool(value)
  }
}

impl From<NaiveDateTime>
  for ConditionValue
{
  fn from(value: NaiveDateTime) -> Self {
    Self::Timestamp(value)
  }
}

impl From<NaiveDate> for ConditionValue {
  fn from(value: NaiveDate) -> Self {
    Self::Timestamp(
      value.and_time(
        chrono::NaiveTime::MIN
      )
    )
  }
}

/// Anything `set_condition` accepts. `None` removes the condition.
pub trait IntoConditionValue {
  fn into_condition_value(
    self
  ) -> Option<ConditionValue>;
}

macro_rules! into_condition_value {
  ($($ty:ty),*) => {
    $(
      impl IntoConditionValue for $ty {
        fn into_condition_value(
          self
        ) -> Option<ConditionValue> {
          Some(self.into())
        }
      }
    )*
  };
}

into_condition_value!(
  ConditionValue,
  i64,
  i32,
  u32,
  bool,
  NaiveDate,
  NaiveDateTime
);

impl<T: IntoConditionValue>
  IntoConditionValue for Option<T>
{
  fn into_condition_value(
    self
  ) -> Option<ConditionValue> {
    self.and_then(
      IntoConditionValue::into_condition_value
    )
  }
}

/// One grid cell as seen by the predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayDescriptor {
  pub date:             NaiveDate,
  pub week_number:      u32,
  pub is_current_month: bool
}

impl DayDescriptor {
  #[must_use]
  pub fn new(
    date: NaiveDate,
    week_number: u32,
    is_current_month: bool
  ) -> Self {
    Self {
      date,
      week_number,
      is_current_month
    }
  }

  #[must_use]
  pub fn timestamp(
    &self
  ) -> NaiveDateTime {
    self
      .date
      .and_time(chrono::NaiveTime::MIN)
  }

  #[must_use]
  pub fn day_of_week(&self) -> u32 {
    weekday_number(self.date)
  }
}

/// Condition values derived for one day. The advanced fields are only
/// computed when the evaluating predicate registered them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayConditions {
  pub timestamp:       NaiveDateTime,
  pub day:             u32,
  pub week:            u32,
  pub month:           u32,
  pub year:            i32,
  pub day_of_week:     u32,
  pub current:         bool,
  pub weekend:         Option<bool>,
  pub first_day:       Option<bool>,
  pub last_day:        Option<bool>,
  pub occurrence:      Option<u32>,
  pub last_occurrence: Option<bool>,
  pub easter:          Option<bool>,
  pub callback:        Option<bool>
}

impl DayConditions {
  fn base(
    descriptor: &DayDescriptor
  ) -> Self {
    let date = descriptor.date;
    Self {
      timestamp:       descriptor
        .timestamp(),
      day:             date.day(),
      week:            descriptor
        .week_number,
      month:           date.month(),
      year:            date.year(),
      day_of_week:     descriptor
        .day_of_week(),
      current:         descriptor
        .is_current_month,
      weekend:         None,
      first_day:       None,
      last_day:        None,
      occurrence:      None,
      last_occurrence: None,
      easter:          None,
      callback:        None
    }
  }

  #[must_use]
  pub fn date(&self) -> NaiveDate {
    self.timestamp.date()
  }

  #[must_use]
  pub fn value(
    &self,
    name: ConditionName
  ) -> Option<ConditionValue> {
    let value = match name {
      | ConditionName::Timestamp => {
        ConditionValue::Timestamp(
          self.timestamp
        )
      }
      | ConditionName::Day => {
        self.day.into()
      }
      | ConditionName::Week => {
        self.week.into()
      }
      | ConditionName::Month => {
        self.month.into()
      }
      | ConditionName::Year => {
        self.year.into()
      }
      | ConditionName::DayOfWeek => {
        self.day_of_week.into()
      }
      | ConditionName::Current => {
        self.current.into()
      }
      | ConditionName::Weekend => {
        self.weekend?.into()
      }
      | ConditionName::FirstDay => {
        self.first_day?.into()
      }
      | ConditionName::LastDay => {
        self.last_day?.into()
      }
      | ConditionName::Occurrence => {
        self.occurrence?.into()
      }
      | ConditionName::LastOccurrence => {
        self.last_occurrence?.into()
      }
      | ConditionName::Easter => {
        self.easter?.into()
      }
      | ConditionName::Callback => {
        self.callback?.into()
      }
    };
    Some(value)
  }
}

/// Registered conditions, keyed and
/// iterated in evaluation order.
pub type ConditionSet =
  BTreeMap<ConditionName, ConditionValue>;

/// Display data a matching predicate contributes to a cell.
#[derive(
  Debug, Clone, PartialEq, Eq, Serialize,
)]
pub struct Contribution {
  pub classes: Vec<String>,
  pub title:   String,
  pub output:  String
}

/// A day-matching rule: every registered condition must hold for the
/// predicate to contribute its classes, title and output.
pub struct EventPredicate {
  id:         PredicateId,
  owner:      GridId,
  conditions: ConditionSet,
  classes:    Vec<String>,
  title:      String,
  output:     String
}

impl Clone for EventPredicate {
  fn clone(&self) -> Self {
    Self {
      id:         PredicateId::next(),
      owner:      self.owner,
      conditions: self.conditions.clone(),
      classes:    self.classes.clone(),
      title:      self.title.clone(),
      output:     self.output.clone()
    }
  }
}

impl fmt::Debug for EventPredicate {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.debug_struct("EventPredicate")
      .field("id", &self.id)
      .field("owner", &self.owner)
      .field(
        "conditions",
        &self.conditions
      )
      .field("classes", &self.classes)
      .field("title", &self.title)
      .field("output", &self.output)
      .finish()
  }
}

impl EventPredicate {
  pub(crate) fn new(
    owner: GridId
  ) -> Self {
    Self {
      id: PredicateId::next(),
      owner,
      conditions: BTreeMap::new(),
      classes: Vec::new(),
      title: String::new(),
      output: String::new()
    }
  }

  #[must_use]
  pub fn id(&self) -> PredicateId {
    self.id
  }

  #[must_use]
  pub fn owner(&self) -> GridId {
    self.owner
  }

  /// Sets or, with `None`, removes a condition. Boolean conditions are
  /// coerced to `bool`, `callback` must be a callback and everything
  /// else is coerced to an integer.
  pub fn set_condition(
    &mut self,
    name: ConditionName,
    value: impl IntoConditionValue
  ) -> Result<&mut Self> {
    let Some(value) =
      value.into_condition_value()
    else {
      self.conditions.remove(&name);
      return Ok(self);
    };

    let value = match name {
      | ConditionName::Callback => {
        match value {
          | ConditionValue::Callback(_) => {
            value
          }
          | _ => {
            return Err(
              CalendarError::ConditionType {
                name:     name.as_str(),
                expected: "a callback"
              }
            );
          }
        }
      }
      | ConditionName::Timestamp => {
        match value {
          | ConditionValue::Timestamp(
            _
          ) => value,
          | other => {
            let secs =
              other.integer(name)?;
            let ts =
              DateTime::from_timestamp(
                secs, 0
              )
              .ok_or(
                CalendarError::ConditionType {
                  name:     name.as_str(),
                  expected: "a representable timestamp"
                }
              )?;
            ConditionValue::Timestamp(
              ts.naive_utc()
            )
          }
        }
      }
      | _ if name.is_boolean() => {
        ConditionValue::Bool(
          value.truthy(name)?
        )
      }
      | _ => {
        ConditionValue::Int(
          value.integer(name)?
        )
      }
    };

    trace!(predicate = %self.id, condition = %name, value = ?value, "set condition");
    self.conditions.insert(name, value);
    Ok(self)
  }

  /// Same as [`set_condition`](Self::set_condition) for a condition
  /// named at runtime; unknown names are rejected.
  pub fn set_condition_by_name(
    &mut self,
    name: &str,
    value: impl IntoConditionValue
  ) -> Result<&mut Self> {
    let name = name.parse()?;
    self.set_condition(name, value)
  }

  pub fn unset_condition(
    &mut self,
    name: ConditionName
  ) -> &mut Self {
    self.conditions.remove(&name);
    self
  }

  #[must_use]
  pub fn condition(
    &self,
    name: ConditionName
  ) -> Option<&ConditionValue> {
    self.conditions.get(&name)
  }

  #[must_use]
  pub fn has_conditions(&self) -> bool {
    !self.conditions.is_empty()
  }

  pub fn add_class(
    &mut self,
    class: impl Into<String>
  ) -> &mut Self {
    let class = class.into();
    if !self.classes.contains(&class) {
      self.classes.push(class);
    }
    self
  }

  pub fn remove_class(
    &mut self,
    class: &str
  ) -> &mut Self {
    self.classes.retain(|c| c != class);
    self
  }

  pub fn set_title(
    &mut self,
    title: impl Into<String>
  ) -> &mut Self {
    self.title = title.into();
    self
  }

  pub fn set_output(
    &mut self,
    output: impl Into<String>
  ) -> &mut Self {
    self.output = output.into();
    self
  }

  #[must_use]
  pub fn classes(&self) -> &[String] {
    &self.classes
  }

  #[must_use]
  pub fn title(&self) -> &str {
    &self.title
  }

  #[must_use]
  pub fn output(&self) -> &str {
    &self.output
  }

  /// Tests every registered condition against the day. Returns the
  /// contribution on a match and `None` otherwise.
  pub fn evaluate(
    &self,
    descriptor: &DayDescriptor
  ) -> Result<Option<Contribution>> {
    let mut actual =
      DayConditions::base(descriptor);

    for name in ConditionName::BASE {
      let Some(expected) =
        self.conditions.get(&name)
      else {
        continue;
      };

      if name == ConditionName::Timestamp
      {
        // The registered instant must fall on this cell's day.
        let ConditionValue::Timestamp(
          registered
        ) = expected
        else {
          return Ok(None);
        };
        let day_start = actual.timestamp;
        let day_end = day_start
          + Duration::seconds(86_399);
        if *registered < day_start
          || *registered > day_end
        {
          return Ok(None);
        }
        continue;
      }

      let matches = actual
        .value(name)
        .is_some_and(|value| {
          expected.same_as(&value)
        });
      if !matches {
        return Ok(None);
      }
    }

    self.derive_advanced(&mut actual)?;

    for (name, expected) in
      &self.conditions
    {
      if name.is_base() {
        continue;
      }

      let matches = if *name
        == ConditionName::Callback
      {
        actual.callback == Some(true)
      } else {
        actual
          .value(*name)
          .is_some_and(|value| {
            expected.same_as(&value)
          })
      };
      if !matches {
        return Ok(None);
      }
    }

    trace!(
      predicate = %self.id,
      date = %descriptor.date,
      "predicate matched"
    );
    Ok(Some(self.contribution()))
  }

  fn derive_advanced(
    &self,
    actual: &mut DayConditions
  ) -> Result<()> {
    let date = actual.date();
    let has = |name: ConditionName| {
      self.conditions.contains_key(&name)
    };

    if has(ConditionName::Weekend) {
      actual.weekend = Some(
        actual.day_of_week == 0
          || actual.day_of_week == 6
      );
    }
    if has(ConditionName::FirstDay) {
      actual.first_day =
        Some(actual.day == 1);
    }
    if has(ConditionName::LastDay) {
      actual.last_day = Some(
        actual.day
          == days_in_month(
            actual.year,
            actual.month
          )
      );
    }
    if has(ConditionName::Occurrence) {
      actual.occurrence = Some(
        occurrence_of_weekday_in_month(
          date
        )
      );
    }
    if has(ConditionName::LastOccurrence)
    {
      actual.last_occurrence = Some(
        is_last_occurrence_of_weekday_in_month(
          date
        )
      );
    }
    if has(ConditionName::Easter) {
      actual.easter =
        Some(is_easter(date));
    }
    if let Some(
      ConditionValue::Callback(callback)
    ) = self
      .conditions
      .get(&ConditionName::Callback)
    {
      let result = callback(&*actual, self)
        .map_err(|source| {
          CalendarError::Callback {
            predicate: self.id.get(),
            day: date,
            source
          }
        })?;
      actual.callback = Some(result);
    }

    Ok(())
  }

  fn contribution(&self) -> Contribution {
    Contribution {
      classes: self.classes.clone(),
      title:   self.title.clone(),
      output:  self.output.clone()
    }
  }
}
