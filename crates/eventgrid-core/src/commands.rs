use anyhow::{Context, anyhow};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::{debug, info, instrument};

use crate::cli::Invocation;
use crate::config::Config;
use crate::datetime::{EVENT_DATETIME_FORMAT, parse_date_expr, parse_month_expr, project_today};
use crate::event::EventRecord;
use crate::events::{MonthFilter, MonthView, build_month_view, list_events};
use crate::grid::MonthRef;
use crate::render::Renderer;
use crate::store::EventStore;

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "calendar", "export", "list", "add", "modify", "show", "delete", "help", "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(store, cfg, renderer, inv))]
pub fn dispatch(
    store: &EventStore,
    cfg: &Config,
    renderer: &mut Renderer,
    inv: Invocation,
) -> anyhow::Result<()> {
    let now = Utc::now();
    let today = project_today();
    let command = inv.command.as_str();

    debug!(command, args = ?inv.args, "dispatching command");

    match command {
        "calendar" => cmd_calendar(store, cfg, renderer, &inv.args, today),
        "export" => cmd_export(store, cfg, renderer, &inv.args, today),
        "list" => cmd_list(store, renderer, &inv.args, today),
        "add" => cmd_add(store, &inv.args, now),
        "modify" => cmd_modify(store, &inv.args, now),
        "show" => cmd_show(store, renderer, &inv.args),
        "delete" => cmd_delete(store, &inv.args),
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

/// Month view as configured: settings, standard predicates and labels
/// all come from `cfg`.
#[instrument(skip(store, cfg))]
pub fn month_view(
    store: &EventStore,
    cfg: &Config,
    month: Option<MonthRef>,
    today: NaiveDate,
) -> anyhow::Result<MonthView> {
    let settings = cfg.calendar_settings()?;
    let standard = cfg.standard_events()?;
    let labels = cfg.calendar_labels()?;
    build_month_view(store, month, settings, &standard, &labels, today)
}

fn month_arg(args: &[String]) -> anyhow::Result<Option<MonthRef>> {
    match args {
        [] => Ok(None),
        [month] => parse_month_expr(month).map(Some),
        _ => Err(anyhow!("expected at most one month argument (YYYY-MM)")),
    }
}

#[instrument(skip(store, cfg, renderer, args))]
fn cmd_calendar(
    store: &EventStore,
    cfg: &Config,
    renderer: &mut Renderer,
    args: &[String],
    today: NaiveDate,
) -> anyhow::Result<()> {
    info!("command calendar");
    let view = month_view(store, cfg, month_arg(args)?, today)?;
    renderer.print_month(&view)
}

#[instrument(skip(store, cfg, renderer, args))]
fn cmd_export(
    store: &EventStore,
    cfg: &Config,
    renderer: &mut Renderer,
    args: &[String],
    today: NaiveDate,
) -> anyhow::Result<()> {
    info!("command export");
    let view = month_view(store, cfg, month_arg(args)?, today)?;
    renderer.print_json(&view)
}

#[instrument(skip(store, renderer, args))]
fn cmd_list(
    store: &EventStore,
    renderer: &mut Renderer,
    args: &[String],
    today: NaiveDate,
) -> anyhow::Result<()> {
    info!("command list");
    let filter = match args {
        [] => MonthFilter::Month(MonthRef::of(today)),
        [raw] => raw.parse()?,
        _ => return Err(anyhow!("expected at most one filter (all, YYYY-MM or YYYY-MM-DD)")),
    };
    let events = list_events(store, filter)?;
    renderer.print_event_table(&events)
}

#[instrument(skip(store, args, now))]
fn cmd_add(store: &EventStore, args: &[String], now: DateTime<Utc>) -> anyhow::Result<()> {
    info!("command add");
    let event = parse_add_args(args, now)?;
    let event = store.add(event)?;
    println!("Created event {}.", event.id);
    Ok(())
}

#[instrument(skip(store, args, now))]
fn cmd_modify(store: &EventStore, args: &[String], now: DateTime<Utc>) -> anyhow::Result<()> {
    info!("command modify");
    let (id, fields) = parse_modify_args(args, now)?;
    let event = store.update(id, |event| fields.apply(event))?;
    println!("Modified event {} '{}'.", event.id, event.title);
    Ok(())
}

#[instrument(skip(store, renderer, args))]
fn cmd_show(store: &EventStore, renderer: &mut Renderer, args: &[String]) -> anyhow::Result<()> {
    info!("command show");
    let [raw] = args else {
        return Err(anyhow!("show requires exactly one event id"));
    };
    let event = store.get(parse_id(raw)?)?;
    renderer.print_event_info(&event)
}

#[instrument(skip(store, args))]
fn cmd_delete(store: &EventStore, args: &[String]) -> anyhow::Result<()> {
    info!("command delete");
    let [raw] = args else {
        return Err(anyhow!("delete requires exactly one event id"));
    };
    let id = parse_id(raw)?;
    let removed = store.delete(id)?;
    println!("Deleted event {} '{}'.", removed.id, removed.title);
    Ok(())
}

fn cmd_help() -> anyhow::Result<()> {
    println!(
        "Commands:\n  \
         calendar [YYYY-MM]       month grid (default)\n  \
         export [YYYY-MM]         month view as JSON\n  \
         list [all|YYYY-MM|YYYY-MM-DD]\n  \
         add <title> start:<date> [end:<date>] [location:<text>] [description:<text>]\n  \
         modify <id> [title] [start:<date>] [end:<date>] [location:<text>] [description:<text>]\n  \
         show <id>\n  \
         delete <id>\n  \
         version"
    );
    Ok(())
}

fn parse_id(raw: &str) -> anyhow::Result<u64> {
    raw.parse::<u64>()
        .with_context(|| format!("invalid event id: {raw}"))
}

/// Field words shared by `add` and `modify`. Prefixed words set one field;
/// everything else is joined into the title.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventFields {
    pub title: Option<String>,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    /// An empty value clears the field.
    pub location: Option<String>,
    pub description: Option<String>,
}

impl EventFields {
    pub fn parse(args: &[String], now: DateTime<Utc>) -> anyhow::Result<Self> {
        let mut fields = Self::default();
        let mut title_words = Vec::new();

        for arg in args {
            if let Some(value) = arg.strip_prefix("start:") {
                fields.start = Some(parse_date_expr(value, now).context("invalid start")?);
            } else if let Some(value) = arg.strip_prefix("end:") {
                fields.end = Some(parse_date_expr(value, now).context("invalid end")?);
            } else if let Some(value) = arg.strip_prefix("location:") {
                fields.location = Some(value.to_string());
            } else if let Some(value) = arg.strip_prefix("description:") {
                fields.description = Some(value.to_string());
            } else {
                title_words.push(arg.as_str());
            }
        }

        if !title_words.is_empty() {
            fields.title = Some(title_words.join(" "));
        }
        Ok(fields)
    }

    /// Overwrites the fields that were given and leaves the rest alone.
    pub fn apply(&self, event: &mut EventRecord) {
        if let Some(title) = &self.title {
            event.title = title.clone();
        }
        if let Some(start) = self.start {
            event.date_start = start;
        }
        if let Some(end) = self.end {
            event.date_end = end;
        }
        if let Some(location) = &self.location {
            event.location = non_empty(location);
        }
        if let Some(description) = &self.description {
            event.description = non_empty(description);
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    Some(value.to_string()).filter(|v| !v.is_empty())
}

/// `<title words..> start:<date> [end:<date>] [location:..] [description:..]`.
/// The end defaults to the start.
pub fn parse_add_args(args: &[String], now: DateTime<Utc>) -> anyhow::Result<EventRecord> {
    let fields = EventFields::parse(args, now)?;
    let start = fields.start.ok_or_else(|| anyhow!("add requires start:<date>"))?;
    let end = fields.end.unwrap_or(start);
    debug!(
        start = %start.format(EVENT_DATETIME_FORMAT),
        end = %end.format(EVENT_DATETIME_FORMAT),
        "parsed event span"
    );

    let mut event = EventRecord::new(0, String::new(), start, end);
    fields.apply(&mut event);
    Ok(event)
}

/// `<id> [title words..] [start:..] [end:..] [location:..] [description:..]`.
pub fn parse_modify_args(
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<(u64, EventFields)> {
    let Some((raw, rest)) = args.split_first() else {
        return Err(anyhow!("modify requires an event id"));
    };
    let id = parse_id(raw)?;
    let fields = EventFields::parse(rest, now)?;
    if fields == EventFields::default() {
        return Err(anyhow!("modify {id}: nothing to change"));
    }
    Ok((id, fields))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn abbreviations_resolve_uniquely() {
        let known = known_command_names();
        assert_eq!(expand_command_abbrev("cal", &known), Some("calendar"));
        assert_eq!(expand_command_abbrev("l", &known), Some("list"));
        assert_eq!(expand_command_abbrev("de", &known), Some("delete"));
        assert_eq!(expand_command_abbrev("m", &known), Some("modify"));
        assert_eq!(expand_command_abbrev("s", &known), Some("show"));
        assert_eq!(expand_command_abbrev("zzz", &known), None);
    }

    #[test]
    fn add_args_build_record() {
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 8, 0, 0).single().expect("now");
        let event = parse_add_args(
            &strings(&[
                "Team",
                "offsite",
                "start:2024-06-12T09:00",
                "end:2024-06-13",
                "location:Lisbon",
            ]),
            now,
        )
        .expect("parse");

        assert_eq!(event.title, "Team offsite");
        assert_eq!(event.date_start.format(EVENT_DATETIME_FORMAT).to_string(), "2024-06-12 09:00");
        assert_eq!(event.date_end.format(EVENT_DATETIME_FORMAT).to_string(), "2024-06-13 00:00");
        assert_eq!(event.location.as_deref(), Some("Lisbon"));
        assert_eq!(event.description, None);
    }

    #[test]
    fn add_end_defaults_to_start() {
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 8, 0, 0).single().expect("now");
        let event = parse_add_args(&strings(&["Dentist", "start:2024-06-20"]), now).expect("parse");
        assert_eq!(event.date_start, event.date_end);
    }

    #[test]
    fn add_requires_start() {
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 8, 0, 0).single().expect("now");
        assert!(parse_add_args(&strings(&["No", "date"]), now).is_err());
        assert!(parse_add_args(&strings(&["Bad", "start:someday"]), now).is_err());
    }

    #[test]
    fn month_argument_is_optional() {
        assert_eq!(month_arg(&[]).expect("none"), None);
        assert_eq!(
            month_arg(&strings(&["2024-02"])).expect("month"),
            Some(MonthRef { year: 2024, month: 2 })
        );
        assert!(month_arg(&strings(&["2024-02", "2024-03"])).is_err());
    }

    #[test]
    fn modify_args_change_only_given_fields() {
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 8, 0, 0).single().expect("now");
        let mut event = parse_add_args(
            &strings(&["Standup", "start:2024-06-12T09:00", "location:Room 4"]),
            now,
        )
        .expect("add");

        let (id, fields) = parse_modify_args(
            &strings(&["7", "end:2024-06-12T09:30", "location:", "description:Bring notes"]),
            now,
        )
        .expect("modify");
        assert_eq!(id, 7);
        assert_eq!(fields.title, None);

        fields.apply(&mut event);
        assert_eq!(event.title, "Standup");
        assert_eq!(event.date_start.format(EVENT_DATETIME_FORMAT).to_string(), "2024-06-12 09:00");
        assert_eq!(event.date_end.format(EVENT_DATETIME_FORMAT).to_string(), "2024-06-12 09:30");
        assert_eq!(event.location, None);
        assert_eq!(event.description.as_deref(), Some("Bring notes"));

        let (_, fields) =
            parse_modify_args(&strings(&["7", "Daily", "sync"]), now).expect("retitle");
        fields.apply(&mut event);
        assert_eq!(event.title, "Daily sync");
    }

    #[test]
    fn modify_requires_id_and_a_change() {
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 8, 0, 0).single().expect("now");
        assert!(parse_modify_args(&[], now).is_err());
        assert!(parse_modify_args(&strings(&["seven", "New"]), now).is_err());
        assert!(parse_modify_args(&strings(&["7"]), now).is_err());
        assert!(parse_modify_args(&strings(&["7", "start:someday"]), now).is_err());
    }
}
