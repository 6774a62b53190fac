use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use serde::Serialize;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::datetime::EVENT_DATETIME_FORMAT;
use crate::event::EventRecord;
use crate::events::{MonthView, month_heading, outputs_by_day};
use crate::grid::Cell;

const OUTPUT_MARKER: &str = "*";

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    #[tracing::instrument(skip(self, view), fields(month = %view.current_month))]
    pub fn print_month(&mut self, view: &MonthView) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        self.write_month(out, view)
    }

    /// Month grid with a legend of the outputs shown on each day.
    pub fn write_month<W: Write>(&self, mut writer: W, view: &MonthView) -> anyhow::Result<()> {
        writeln!(writer, "{}", month_heading(view))?;
        writeln!(writer)?;

        let rows = view
            .weeks
            .iter()
            .map(|week| week.iter().map(|cell| self.format_cell(cell)).collect())
            .collect();
        write_table(&mut writer, view.weekday_labels.clone(), rows)?;

        let legend = outputs_by_day(view);
        if !legend.is_empty() {
            writeln!(writer)?;
            for (date, outputs) in legend {
                writeln!(writer, "{}  {}", date.format("%Y-%m-%d"), outputs.join(", "))?;
            }
        }

        Ok(())
    }

    #[tracing::instrument(skip(self, events))]
    pub fn print_event_table(&mut self, events: &[EventRecord]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        if events.is_empty() {
            writeln!(out, "No events.")?;
            return Ok(());
        }

        let headers = vec![
            "ID".to_string(),
            "Start".to_string(),
            "End".to_string(),
            "Title".to_string(),
            "Location".to_string(),
        ];

        let rows = events
            .iter()
            .map(|event| {
                vec![
                    self.paint(&event.id.to_string(), "33"),
                    event.date_start.format(EVENT_DATETIME_FORMAT).to_string(),
                    event.date_end.format(EVENT_DATETIME_FORMAT).to_string(),
                    event.title.clone(),
                    event.location.clone().unwrap_or_default(),
                ]
            })
            .collect();

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    pub fn print_event_info(&mut self, event: &EventRecord) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        self.write_event_info(out, event)
    }

    /// Name/value listing of every stored field of one event.
    pub fn write_event_info<W: Write>(&self, writer: W, event: &EventRecord) -> anyhow::Result<()> {
        let optional = |value: &Option<String>| value.clone().unwrap_or_default();
        let rows = vec![
            vec!["ID".to_string(), self.paint(&event.id.to_string(), "33")],
            vec!["Title".to_string(), event.title.clone()],
            vec![
                "Start".to_string(),
                event.date_start.format(EVENT_DATETIME_FORMAT).to_string(),
            ],
            vec![
                "End".to_string(),
                event.date_end.format(EVENT_DATETIME_FORMAT).to_string(),
            ],
            vec!["Location".to_string(), optional(&event.location)],
            vec!["Description".to_string(), optional(&event.description)],
        ];

        write_table(writer, vec!["Name".to_string(), "Value".to_string()], rows)
    }

    pub fn print_json<T: Serialize>(&mut self, value: &T) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        serde_json::to_writer_pretty(&mut out, value)?;
        writeln!(out)?;
        Ok(())
    }

    fn format_cell(&self, cell: &Cell) -> String {
        let marker = if cell.is_current_month && !cell.data.outputs.is_empty() {
            OUTPUT_MARKER
        } else {
            ""
        };
        let text = format!("{:>2}{marker}", cell.day);

        let has_class = |class: &str| cell.data.classes.iter().any(|c| c == class);
        if !cell.is_current_month {
            self.paint(&text, "2")
        } else if has_class("today") {
            self.paint(&text, "7")
        } else if has_class("holiday") {
            self.paint(&text, "31")
        } else if !cell.data.classes.is_empty() {
            self.paint(&text, "36")
        } else {
            text
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::events::{CalendarLabels, build_month_view};
    use crate::grid::{CalendarSettings, MonthRef, StandardEvent};

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    fn plain_renderer() -> Renderer {
        let mut cfg = Config::default();
        cfg.set("color", "off");
        Renderer::new(&cfg).expect("renderer")
    }

    #[test]
    fn rejects_unknown_color_setting() {
        let mut cfg = Config::default();
        cfg.set("color", "sometimes");
        assert!(Renderer::new(&cfg).is_err());
    }

    #[test]
    fn strips_escape_sequences() {
        assert_eq!(strip_ansi("\x1b[31m25*\x1b[0m"), "25*");
    }

    #[test]
    fn month_grid_with_markers_and_legend() {
        let events = vec![EventRecord::new(
            1,
            "Launch".into(),
            date(2024, 6, 12).and_hms_opt(9, 0, 0).expect("time"),
            date(2024, 6, 12).and_hms_opt(17, 0, 0).expect("time"),
        )];
        let view = build_month_view(
            &events,
            Some(MonthRef { year: 2024, month: 6 }),
            CalendarSettings::default(),
            &[StandardEvent::Today, StandardEvent::PrevNext],
            &CalendarLabels::default(),
            date(2024, 6, 3),
        )
        .expect("view");

        let mut buf = Vec::new();
        plain_renderer().write_month(&mut buf, &view).expect("render");
        let text = String::from_utf8(buf).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "June 2024");
        assert!(lines[2].starts_with("Mon Tue Wed Thu Fri Sat Sun"));
        assert!(lines[4].starts_with("27  28  29  30  31   1   2"));
        assert!(text.contains("12*"));
        assert_eq!(lines.last().copied(), Some("2024-06-12  Launch"));
    }

    #[test]
    fn event_info_lists_description() {
        let mut event = EventRecord::new(
            4,
            "Board meeting".into(),
            date(2024, 6, 20).and_hms_opt(14, 0, 0).expect("time"),
            date(2024, 6, 20).and_hms_opt(16, 30, 0).expect("time"),
        );
        event.description = Some("Q2 numbers".into());

        let mut buf = Vec::new();
        plain_renderer().write_event_info(&mut buf, &event).expect("render");
        let text = String::from_utf8(buf).expect("utf8");
        let lines: Vec<&str> = text.lines().map(str::trim_end).collect();

        assert!(lines[0].starts_with("Name"));
        assert!(lines.contains(&"ID          4"));
        assert!(lines.contains(&"End         2024-06-20 16:30"));
        assert!(lines.contains(&"Location"));
        assert!(lines.contains(&"Description Q2 numbers"));
    }
}
