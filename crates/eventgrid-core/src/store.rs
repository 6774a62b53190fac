use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::event::EventRecord;
use crate::grid::MonthRef;

/// Where the admin module reads event records from.
pub trait EventSource {
    /// Records overlapping `month`, ordered by start.
    fn events_in_month(&self, month: MonthRef) -> anyhow::Result<Vec<EventRecord>>;

    fn all_events(&self) -> anyhow::Result<Vec<EventRecord>>;
}

/// The month overlap rule of the event list: the event spans the 1st, or
/// starts or ends inside the month.
pub fn overlaps_month(record: &EventRecord, month: MonthRef) -> bool {
    let Ok(first) = month.first_day() else {
        return false;
    };
    record.covers(first) || month.contains(record.start_day()) || month.contains(record.end_day())
}

#[derive(Debug)]
pub struct EventStore {
    pub data_dir: PathBuf,
    pub events_path: PathBuf,
}

impl EventStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let events_path = data_dir.join("events.data");
        if !events_path.exists() {
            fs::write(&events_path, "")?;
        }

        info!(
            data_dir = %data_dir.display(),
            events = %events_path.display(),
            "opened event store"
        );

        Ok(Self {
            data_dir,
            events_path,
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn load(&self) -> anyhow::Result<Vec<EventRecord>> {
        load_jsonl(&self.events_path).context("failed to load events.data")
    }

    #[tracing::instrument(skip(self, events))]
    pub fn save(&self, events: &[EventRecord]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.events_path, events).context("failed to save events.data")
    }

    pub fn next_id(&self, events: &[EventRecord]) -> u64 {
        events.iter().map(|e| e.id).max().unwrap_or(0) + 1
    }

    /// Validates and stores a new event, assigning the next free id.
    #[tracing::instrument(skip(self, event), fields(title = %event.title))]
    pub fn add(&self, mut event: EventRecord) -> anyhow::Result<EventRecord> {
        validate(&event)?;

        let mut events = self.load()?;
        event.id = self.next_id(&events);
        events.push(event.clone());
        events.sort_by_key(|e| e.id);
        self.save(&events)?;
        info!(id = event.id, "added event");
        Ok(event)
    }

    #[tracing::instrument(skip(self))]
    pub fn get(&self, id: u64) -> anyhow::Result<EventRecord> {
        self.load()?
            .into_iter()
            .find(|e| e.id == id)
            .ok_or_else(|| anyhow!("event not found: {id}"))
    }

    /// Applies `edit` to the stored event and writes it back. The edited
    /// record goes through the same checks as `add`; the id is kept.
    #[tracing::instrument(skip(self, edit))]
    pub fn update<F>(&self, id: u64, edit: F) -> anyhow::Result<EventRecord>
    where
        F: FnOnce(&mut EventRecord),
    {
        let mut events = self.load()?;
        let slot = events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| anyhow!("event not found: {id}"))?;

        let mut edited = slot.clone();
        edit(&mut edited);
        edited.id = id;
        validate(&edited)?;
        *slot = edited.clone();

        self.save(&events)?;
        info!(id, title = %edited.title, "modified event");
        Ok(edited)
    }

    #[tracing::instrument(skip(self))]
    pub fn delete(&self, id: u64) -> anyhow::Result<EventRecord> {
        let mut events = self.load()?;
        let idx = events
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| anyhow!("event not found: {id}"))?;
        let removed = events.remove(idx);
        self.save(&events)?;
        info!(id, "deleted event");
        Ok(removed)
    }
}

fn validate(event: &EventRecord) -> anyhow::Result<()> {
    if event.title.trim().is_empty() {
        return Err(anyhow!("event title cannot be empty"));
    }
    if event.date_end < event.date_start {
        return Err(anyhow!(
            "event ends ({}) before it starts ({})",
            event.date_end,
            event.date_start
        ));
    }
    Ok(())
}

impl EventSource for EventStore {
    #[tracing::instrument(skip(self, month), fields(month = %month))]
    fn events_in_month(&self, month: MonthRef) -> anyhow::Result<Vec<EventRecord>> {
        let mut events: Vec<EventRecord> = self
            .load()?
            .into_iter()
            .filter(|e| overlaps_month(e, month))
            .collect();
        events.sort_by_key(|e| (e.date_start, e.id));
        debug!(count = events.len(), "events overlapping month");
        Ok(events)
    }

    fn all_events(&self) -> anyhow::Result<Vec<EventRecord>> {
        let mut events = self.load()?;
        events.sort_by_key(|e| (e.date_start, e.id));
        Ok(events)
    }
}

impl EventSource for Vec<EventRecord> {
    fn events_in_month(&self, month: MonthRef) -> anyhow::Result<Vec<EventRecord>> {
        let mut events: Vec<EventRecord> = self
            .iter()
            .filter(|e| overlaps_month(e, month))
            .cloned()
            .collect();
        events.sort_by_key(|e| (e.date_start, e.id));
        Ok(events)
    }

    fn all_events(&self) -> anyhow::Result<Vec<EventRecord>> {
        let mut events = self.clone();
        events.sort_by_key(|e| (e.date_start, e.id));
        Ok(events)
    }
}

#[tracing::instrument(skip(path))]
fn load_jsonl(path: &Path) -> anyhow::Result<Vec<EventRecord>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let event: EventRecord = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(event);
    }

    debug!(count = out.len(), "loaded events from jsonl");
    Ok(out)
}

#[tracing::instrument(skip(path, events))]
fn save_jsonl_atomic(path: &Path, events: &[EventRecord]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = events.len(), "saving jsonl atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    for event in events {
        let serialized = serde_json::to_string(event)?;
        writeln!(temp, "{serialized}")?;
    }
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
