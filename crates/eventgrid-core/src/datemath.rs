//! Pure Gregorian calendar arithmetic used by the grid and by predicate
//! evaluation. Weekdays are numbered 0 (Sunday) through 6 (Saturday).

use chrono::{
  Datelike,
  Duration,
  NaiveDate
};

use crate::error::{
  CalendarError,
  Result
};

/// Rolls an out-of-range month into the neighbouring years, the way
/// calendar overflow works: month 13 of 2024 is January 2025 and month 0
/// is December of the previous year.
#[must_use]
pub fn normalize_month(
  year: i32,
  month: i32
) -> (i32, u32) {
  let zero_based = month - 1;
  let year = year.saturating_add(
    zero_based.div_euclid(12)
  );
  let month =
    zero_based.rem_euclid(12) as u32 + 1;
  (year, month)
}

/// Builds a date from possibly overflowing parts. Days past the end of
/// the month roll forward and day 0 is the last day of the previous
/// month.
pub fn date_from_parts(
  year: i32,
  month: i32,
  day: i32
) -> Result<NaiveDate> {
  let (year, month) =
    normalize_month(year, month);
  let first = first_day_of_month(
    year, month
  )?;
  first
    .checked_add_signed(Duration::days(
      i64::from(day) - 1
    ))
    .ok_or(CalendarError::InvalidDate {
      year,
      month,
      day: day.max(0) as u32
    })
}

pub fn first_day_of_month(
  year: i32,
  month: u32
) -> Result<NaiveDate> {
  NaiveDate::from_ymd_opt(
    year, month, 1
  )
  .ok_or(CalendarError::InvalidDate {
    year,
    month,
    day: 1
  })
}

pub fn last_day_of_month(
  year: i32,
  month: u32
) -> Result<NaiveDate> {
  let (next_year, next_month) =
    normalize_month(
      year,
      month as i32 + 1
    );
  let next = first_day_of_month(
    next_year, next_month
  )?;
  next.pred_opt().ok_or(
    CalendarError::InvalidDate {
      year,
      month,
      day: 0
    }
  )
}

/// Number of days in the month, leap-year aware. Out-of-range months
/// are normalized first.
#[must_use]
pub fn days_in_month(
  year: i32,
  month: u32
) -> u32 {
  let (year, month) =
    normalize_month(year, month as i32);
  let leap = (year % 4 == 0
    && year % 100 != 0)
    || year % 400 == 0;
  match month {
    | 2 if leap => 29,
    | 2 => 28,
    | 4 | 6 | 9 | 11 => 30,
    | _ => 31
  }
}

#[must_use]
pub fn weekday_number(
  date: NaiveDate
) -> u32 {
  date.weekday().num_days_from_sunday()
}

pub fn weekday_of(
  year: i32,
  month: u32,
  day: u32
) -> Result<u32> {
  NaiveDate::from_ymd_opt(
    year, month, day
  )
  .map(weekday_number)
  .ok_or(CalendarError::InvalidDate {
    year,
    month,
    day
  })
}

/// Easter Sunday as `(month, day)` using the anonymous Gregorian
/// (Meeus/Jones/Butcher) algorithm. Every division truncates.
#[must_use]
pub fn easter_sunday(
  year: i32
) -> (u32, u32) {
  let a = year % 19;
  let b = year / 100;
  let c = year % 100;
  let d = b / 4;
  let e = b % 4;
  let f = (b + 8) / 25;
  let g = (b - f + 1) / 3;
  let h =
    (19 * a + b - d - g + 15) % 30;
  let i = c / 4;
  let k = c % 4;
  let l =
    (32 + 2 * e + 2 * i - h - k) % 7;
  let m = (a + 11 * h + 22 * l) / 451;
  let month = (h + l - 7 * m + 114) / 31;
  let day =
    (h + l - 7 * m + 114) % 31 + 1;
  (month as u32, day as u32)
}

#[must_use]
pub fn is_easter(
  date: NaiveDate
) -> bool {
  // Easter never leaves March or April.
  if !matches!(date.month(), 3 | 4) {
    return false;
  }
  easter_sunday(date.year())
    == (date.month(), date.day())
}

/// How many times this date's weekday has occurred in its month up to
/// and including the date: the second Saturday of a month is 2.
#[must_use]
pub fn occurrence_of_weekday_in_month(
  date: NaiveDate
) -> u32 {
  let month = date.month();
  let mut occurrence = 1;
  let mut cursor = date;
  while let Some(previous) =
    cursor.checked_sub_signed(
      Duration::days(7)
    )
  {
    if previous.month() != month {
      break;
    }
    occurrence += 1;
    cursor = previous;
  }
  occurrence
}

/// True iff the same weekday one week later falls in another month.
#[must_use]
pub fn is_last_occurrence_of_weekday_in_month(
  date: NaiveDate
) -> bool {
  match date.checked_add_signed(
    Duration::days(7)
  ) {
    | Some(next) => {
      next.month() != date.month()
    }
    | None => true
  }
}

#[must_use]
pub fn add_days(
  date: NaiveDate,
  days: i64
) -> NaiveDate {
  date
    .checked_add_signed(Duration::days(
      days
    ))
    .unwrap_or(date)
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;

  fn ymd(
    year: i32,
    month: u32,
    day: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(
      year, month, day
    )
    .expect("valid date")
  }

  #[test]
  fn easter_golden_values() {
    assert_eq!(
      easter_sunday(2024),
      (3, 31)
    );
    assert_eq!(
      easter_sunday(2023),
      (4, 9)
    );
    assert_eq!(
      easter_sunday(2025),
      (4, 20)
    );
    assert_eq!(
      easter_sunday(2000),
      (4, 23)
    );
    assert_eq!(
      easter_sunday(1818),
      (3, 22)
    );
  }

  #[test]
  fn easter_check_only_matches_the_sunday()
  {
    assert!(is_easter(ymd(2025, 4, 20)));
    assert!(!is_easter(ymd(
      2025, 4, 21
    )));
    assert!(!is_easter(ymd(
      2025, 12, 25
    )));
  }

  #[test]
  fn days_in_month_handles_leap_years() {
    assert_eq!(days_in_month(2024, 2), 29);
    assert_eq!(days_in_month(2023, 2), 28);
    assert_eq!(days_in_month(1900, 2), 28);
    assert_eq!(days_in_month(2000, 2), 29);
    assert_eq!(days_in_month(2024, 4), 30);
    assert_eq!(days_in_month(2024, 12), 31);
  }

  #[test]
  fn months_overflow_into_adjacent_years()
  {
    assert_eq!(
      normalize_month(2024, 13),
      (2025, 1)
    );
    assert_eq!(
      normalize_month(2024, 0),
      (2023, 12)
    );
    assert_eq!(
      normalize_month(2024, -12),
      (2022, 12)
    );
    assert_eq!(
      date_from_parts(2024, 13, 1)
        .expect("rolls over"),
      ymd(2025, 1, 1)
    );
    assert_eq!(
      date_from_parts(2024, 3, 0)
        .expect("day zero"),
      ymd(2024, 2, 29)
    );
  }

  #[test]
  fn weekday_numbering_starts_on_sunday()
  {
    assert_eq!(
      weekday_of(2024, 9, 1)
        .expect("valid"),
      0
    );
    assert_eq!(
      weekday_of(2024, 9, 7)
        .expect("valid"),
      6
    );
    assert!(
      weekday_of(2024, 2, 30).is_err()
    );
  }

  #[test]
  fn second_saturday_is_occurrence_two() {
    // June 2024 starts on a Saturday.
    assert_eq!(
      occurrence_of_weekday_in_month(
        ymd(2024, 6, 1)
      ),
      1
    );
    assert_eq!(
      occurrence_of_weekday_in_month(
        ymd(2024, 6, 8)
      ),
      2
    );
    assert_eq!(
      occurrence_of_weekday_in_month(
        ymd(2024, 6, 29)
      ),
      5
    );
  }

  #[test]
  fn last_occurrence_only_for_final_weekday()
  {
    let saturdays = [1, 8, 15, 22, 29];
    for day in saturdays {
      assert_eq!(
        is_last_occurrence_of_weekday_in_month(
          ymd(2024, 6, day)
        ),
        day == 29,
        "june {day}"
      );
    }
  }

  #[test]
  fn month_bounds() {
    assert_eq!(
      last_day_of_month(2024, 12)
        .expect("valid"),
      ymd(2024, 12, 31)
    );
    assert_eq!(
      first_day_of_month(2024, 2)
        .expect("valid"),
      ymd(2024, 2, 1)
    );
  }
}
