use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Datelike,
  Duration,
  NaiveDate,
  NaiveDateTime,
  NaiveTime,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;
use serde::Deserialize;

use crate::grid::MonthRef;

const TIMEZONE_CONFIG_FILE: &str =
  "eventgrid-time.toml";
const TIMEZONE_ENV_VAR: &str =
  "EVENTGRID_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str =
  "EVENTGRID_TIME_CONFIG";

/// Storage and display format of event date-times.
pub const EVENT_DATETIME_FORMAT: &str =
  "%Y-%m-%d %H:%M";

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
  timezone: Option<String>,
  time:     Option<TimezoneSection>
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
  timezone: Option<String>
}

pub fn project_timezone() -> &'static Tz
{
  static PROJECT_TZ: OnceLock<Tz> =
    OnceLock::new();
  PROJECT_TZ.get_or_init(
    resolve_project_timezone
  )
}

/// Today's date in the project timezone.
#[must_use]
pub fn project_today() -> NaiveDate {
  to_project_date(Utc::now())
}

#[must_use]
pub fn to_project_date(
  dt: DateTime<Utc>
) -> NaiveDate {
  dt.with_timezone(project_timezone())
    .date_naive()
}

#[must_use]
pub fn to_project_local(
  dt: DateTime<Utc>
) -> NaiveDateTime {
  dt.with_timezone(project_timezone())
    .naive_local()
}

fn resolve_project_timezone() -> Tz {
  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) = parse_timezone(
      &raw,
      TIMEZONE_ENV_VAR
    )
  {
    return tz;
  }

  if let Some(path) =
    timezone_config_path()
    && let Some(tz) =
      load_timezone_from_file(&path)
  {
    return tz;
  }

  tracing::debug!(
    "no project timezone configured; \
     using UTC"
  );
  chrono_tz::UTC
}

fn timezone_config_path()
-> Option<PathBuf> {
  if let Ok(raw) = std::env::var(
    TIMEZONE_CONFIG_ENV_VAR
  ) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(PathBuf::from(
        trimmed
      ));
    }
  }

  std::env::current_dir().ok().map(
    |dir| {
      dir.join(TIMEZONE_CONFIG_FILE)
    }
  )
}

fn load_timezone_from_file(
  path: &PathBuf
) -> Option<Tz> {
  if !path.exists() {
    tracing::debug!(
      file = %path.display(),
      "timezone config file not found"
    );
    return None;
  }

  let raw = match fs::read_to_string(
    path
  ) {
    | Ok(raw) => raw,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed reading timezone config file"
      );
      return None;
    }
  };

  let parsed = match toml::from_str::<
    TimezoneConfig
  >(&raw)
  {
    | Ok(parsed) => parsed,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed parsing timezone config file"
      );
      return None;
    }
  };

  let timezone =
    parsed.timezone.or_else(|| {
      parsed.time.and_then(|section| {
        section.timezone
      })
    });
  let Some(timezone) = timezone else {
    tracing::warn!(
      file = %path.display(),
      "timezone config had no timezone field"
    );
    return None;
  };

  parse_timezone(
    timezone.as_str(),
    &format!("file:{}", path.display())
  )
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::info!(
        source,
        timezone = %trimmed,
        "configured project timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

/// Parses an event date expression into a project-local date-time.
#[tracing::instrument(skip(now), fields(input = input))]
pub fn parse_date_expr(
  input: &str,
  now: DateTime<Utc>
) -> anyhow::Result<NaiveDateTime> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();
  let local_now = to_project_local(now);
  let today = local_now.date();

  match lower.as_str() {
    | "now" => return Ok(local_now),
    | "today" => {
      return Ok(today.and_time(
        NaiveTime::MIN
      ));
    }
    | "tomorrow" => {
      return Ok(
        (today + Duration::days(1))
          .and_time(NaiveTime::MIN)
      );
    }
    | "yesterday" => {
      return Ok(
        (today - Duration::days(1))
          .and_time(NaiveTime::MIN)
      );
    }
    | _ => {}
  }

  if let Some(target_weekday) =
    parse_weekday_name(&lower)
  {
    return Ok(
      next_weekday_date(
        today,
        target_weekday
      )
      .and_time(NaiveTime::MIN)
    );
  }

  let rel_re = Regex::new(r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[dh])$")
        .map_err(|e| anyhow!("internal regex compile failure: {e}"))?;

  if let Some(caps) =
    rel_re.captures(token)
  {
    let sign = caps
      .name("sign")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!("missing relative sign")
      })?;
    let num: i64 = caps
      .name("num")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!(
          "missing relative amount"
        )
      })?
      .parse()
      .context(
        "invalid relative number"
      )?;
    let duration = match caps
      .name("unit")
      .map(|m| m.as_str())
    {
      | Some("d") => Duration::days(num),
      | Some("h") => {
        Duration::hours(num)
      }
      | other => {
        return Err(anyhow!(
          "unknown relative unit: \
           {other:?}"
        ));
      }
    };

    return Ok(
      if sign == "-" {
        local_now - duration
      } else {
        local_now + duration
      }
    );
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      token, "%Y-%m-%d"
    )
  {
    return Ok(
      date.and_time(NaiveTime::MIN)
    );
  }

  for fmt in [
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S"
  ] {
    if let Ok(ndt) =
      NaiveDateTime::parse_from_str(
        token, fmt
      )
    {
      return Ok(ndt);
    }
  }

  Err(anyhow!(
    "unrecognized date expression: \
     {input}"
  ))
  .with_context(|| {
    "supported formats: \
     now/today/tomorrow/yesterday, \
     weekday names (e.g. monday), \
     +Nd/+Nh, YYYY-MM-DD, \
     YYYY-MM-DDTHH:MM, YYYY-MM-DD \
     HH:MM"
  })
}

/// Parses `YYYY-MM` or `YYYY-M`.
pub fn parse_month_expr(
  input: &str
) -> anyhow::Result<MonthRef> {
  let month_re = Regex::new(
    r"^(?P<year>\d{4})-(?P<month>\d{1,2})$"
  )
  .map_err(|e| {
    anyhow!(
      "internal regex compile \
       failure: {e}"
    )
  })?;

  let caps = month_re
    .captures(input.trim())
    .ok_or_else(|| {
      anyhow!(
        "expected YYYY-MM, got: \
         {input}"
      )
    })?;
  let year: i32 = caps["year"]
    .parse()
    .context("invalid year")?;
  let month: u32 = caps["month"]
    .parse()
    .context("invalid month")?;
  if !(1..=12).contains(&month) {
    return Err(anyhow!(
      "month out of range: {month}"
    ));
  }

  Ok(MonthRef { year, month })
}

fn parse_weekday_name(
  token: &str
) -> Option<Weekday> {
  match token.trim() {
    | "monday" | "mon" => {
      Some(Weekday::Mon)
    }
    | "tuesday" | "tue" | "tues" => {
      Some(Weekday::Tue)
    }
    | "wednesday" | "wed" => {
      Some(Weekday::Wed)
    }
    | "thursday" | "thu" | "thur"
    | "thurs" => Some(Weekday::Thu),
    | "friday" | "fri" => {
      Some(Weekday::Fri)
    }
    | "saturday" | "sat" => {
      Some(Weekday::Sat)
    }
    | "sunday" | "sun" => {
      Some(Weekday::Sun)
    }
    | _ => None
  }
}

fn next_weekday_date(
  from: NaiveDate,
  target: Weekday
) -> NaiveDate {
  let from_idx = from
    .weekday()
    .num_days_from_monday()
    as i64;
  let target_idx = target
    .num_days_from_monday()
    as i64;
  let mut delta =
    (7 + target_idx - from_idx) % 7;
  if delta == 0 {
    delta = 7;
  }
  from
    .checked_add_signed(Duration::days(
      delta
    ))
    .unwrap_or(from)
}

#[cfg(test)]
mod tests {
  use chrono::{
    TimeZone,
    Utc
  };

  use super::{
    parse_date_expr,
    parse_month_expr
  };
  use crate::grid::MonthRef;

  #[test]
  fn parses_plain_date_as_midnight() {
    let now = Utc
      .with_ymd_and_hms(
        2026, 2, 17, 12, 0, 0
      )
      .single()
      .expect("valid now");
    let parsed =
      parse_date_expr("2024-12-25", now)
        .expect("parse date");
    assert_eq!(
      parsed
        .format("%Y-%m-%d %H:%M")
        .to_string(),
      "2024-12-25 00:00"
    );
  }

  #[test]
  fn parses_date_with_time() {
    let now = Utc
      .with_ymd_and_hms(
        2026, 2, 17, 12, 0, 0
      )
      .single()
      .expect("valid now");
    for input in [
      "2024-06-12 09:30",
      "2024-06-12T09:30"
    ] {
      let parsed =
        parse_date_expr(input, now)
          .expect("parse datetime");
      assert_eq!(
        parsed
          .format("%Y-%m-%d %H:%M")
          .to_string(),
        "2024-06-12 09:30"
      );
    }
  }

  #[test]
  fn rejects_garbage() {
    let now = Utc
      .with_ymd_and_hms(
        2026, 2, 17, 12, 0, 0
      )
      .single()
      .expect("valid now");
    assert!(
      parse_date_expr("someday", now)
        .is_err()
    );
  }

  #[test]
  fn parses_months() {
    assert_eq!(
      parse_month_expr("2012-10")
        .expect("month"),
      MonthRef {
        year:  2012,
        month: 10
      }
    );
    assert_eq!(
      parse_month_expr("2012-9")
        .expect("month"),
      MonthRef {
        year:  2012,
        month: 9
      }
    );
    assert!(
      parse_month_expr("2012-13")
        .is_err()
    );
    assert!(
      parse_month_expr("all").is_err()
    );
  }
}

pub mod event_date_serde {
  use chrono::NaiveDateTime;
  use serde::{
    Deserialize,
    Deserializer,
    Serializer
  };

  use super::EVENT_DATETIME_FORMAT;

  pub fn serialize<S>(
    dt: &NaiveDateTime,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    serializer.serialize_str(
      &dt
        .format(EVENT_DATETIME_FORMAT)
        .to_string()
    )
  }

  pub fn deserialize<'de, D>(
    deserializer: D
  ) -> Result<NaiveDateTime, D::Error>
  where
    D: Deserializer<'de>
  {
    let raw = String::deserialize(
      deserializer
    )?;
    NaiveDateTime::parse_from_str(
      &raw,
      EVENT_DATETIME_FORMAT
    )
    .or_else(|_| {
      NaiveDateTime::parse_from_str(
        &raw,
        "%Y-%m-%d %H:%M:%S"
      )
    })
    .map_err(serde::de::Error::custom)
  }
}
