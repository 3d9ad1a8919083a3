//! KKN activity logbook stored in a Supabase table

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{error, info, warn};

use super::supabase::{SupabaseClient, SupabaseError};
use super::{contains_ci, finish_csv, StoreError};
use crate::validation::{
    parse_log_date, parse_log_hours, Field, FormInput, ValidationError, Validator,
    LOG_HOURS_RANGE,
};

const ENTITY: &str = "Log entry";

/// Default Supabase table name
pub const DEFAULT_TABLE: &str = "logbook_kkn";

pub const CSV_HEADER: [&str; 5] = ["Judul Kegiatan", "JKEM (Jam)", "Tanggal", "Status", "Catatan"];

/// Progress of a logged activity
///
/// Rows written by other clients may carry decorated labels such as
/// `"✅ Selesai"`; those are read by the status word they contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LogStatus {
    Rencana,
    Berlangsung,
    Selesai,
    Dibatalkan,
}

impl LogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogStatus::Rencana => "Rencana",
            LogStatus::Berlangsung => "Berlangsung",
            LogStatus::Selesai => "Selesai",
            LogStatus::Dibatalkan => "Dibatalkan",
        }
    }

    /// Classify a stored label; anything unrecognised counts as planned
    pub fn from_label(label: &str) -> Self {
        if label.contains("Selesai") {
            LogStatus::Selesai
        } else if label.contains("Berlangsung") {
            LogStatus::Berlangsung
        } else if label.contains("Dibatalkan") {
            LogStatus::Dibatalkan
        } else {
            LogStatus::Rencana
        }
    }
}

impl<'de> Deserialize<'de> for LogStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        Ok(Self::from_label(&label))
    }
}

impl fmt::Display for LogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Rencana" => Ok(LogStatus::Rencana),
            "Berlangsung" => Ok(LogStatus::Berlangsung),
            "Selesai" => Ok(LogStatus::Selesai),
            "Dibatalkan" => Ok(LogStatus::Dibatalkan),
            _ => Err(ValidationError::new(Field::LogStatus)),
        }
    }
}

/// Activity date as stored remotely; text that is not `YYYY-MM-DD` is kept
/// verbatim instead of failing the whole fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum EntryDate {
    Day(NaiveDate),
    Unparsed(String),
}

impl EntryDate {
    pub fn parse(raw: &str) -> Self {
        match parse_log_date(raw) {
            Some(day) => EntryDate::Day(day),
            None => EntryDate::Unparsed(raw.to_string()),
        }
    }

    pub fn day(&self) -> Option<NaiveDate> {
        match self {
            EntryDate::Day(day) => Some(*day),
            EntryDate::Unparsed(_) => None,
        }
    }

    /// `dd/mm/yyyy`, or the raw text when it never parsed
    pub fn display(&self) -> String {
        match self {
            EntryDate::Day(day) => day.format("%d/%m/%Y").to_string(),
            EntryDate::Unparsed(raw) => raw.clone(),
        }
    }
}

impl From<NaiveDate> for EntryDate {
    fn from(day: NaiveDate) -> Self {
        EntryDate::Day(day)
    }
}

impl<'de> Deserialize<'de> for EntryDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        Ok(Self::parse(&raw))
    }
}

fn null_as_zero<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    Ok(Option::<u32>::deserialize(deserializer)?.unwrap_or(0))
}

/// Stored logbook row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: i64,
    #[serde(rename = "judul")]
    pub title: String,
    #[serde(rename = "jkem", default, deserialize_with = "null_as_zero")]
    pub hours: u32,
    #[serde(rename = "tanggal")]
    pub date: EntryDate,
    pub status: LogStatus,
    #[serde(rename = "catatan", default)]
    pub notes: Option<String>,
}

/// Logbook fields supplied by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLogEntry {
    #[serde(rename = "judul")]
    pub title: String,
    #[serde(rename = "jkem")]
    pub hours: u32,
    #[serde(rename = "tanggal")]
    pub date: NaiveDate,
    pub status: LogStatus,
    #[serde(rename = "catatan", default)]
    pub notes: String,
}

impl NewLogEntry {
    /// Build an entry from raw form fields (`title`, `hours`, `date`,
    /// `status`, `notes`)
    pub fn from_form(form: &FormInput, validator: &Validator) -> Result<Self, ValidationError> {
        validator.check_log_form(form)?;
        let hours = parse_log_hours(form.get("hours"))
            .ok_or_else(|| ValidationError::new(Field::LogHours))?;
        let date = parse_log_date(form.get("date"))
            .ok_or_else(|| ValidationError::new(Field::LogDate))?;

        Ok(Self {
            title: form.trimmed("title"),
            hours,
            date,
            status: form.get("status").parse()?,
            notes: form.trimmed("notes"),
        })
    }

    pub fn validate(&self, validator: &Validator) -> Result<(), ValidationError> {
        validator.validate(Field::LogTitle, &self.title)?;
        if !LOG_HOURS_RANGE.contains(&self.hours) {
            return Err(ValidationError::new(Field::LogHours));
        }
        Ok(())
    }
}

/// Counters shown above the logbook table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LogStats {
    pub total: usize,
    pub completed: usize,
    pub ongoing: usize,
    pub planned: usize,
    pub total_hours: u64,
}

impl LogStats {
    pub fn from_entries(entries: &[LogEntry]) -> Self {
        entries.iter().fold(Self::default(), |mut stats, entry| {
            stats.total += 1;
            stats.total_hours += u64::from(entry.hours);
            match entry.status {
                LogStatus::Selesai => stats.completed += 1,
                LogStatus::Berlangsung => stats.ongoing += 1,
                LogStatus::Rencana => stats.planned += 1,
                LogStatus::Dibatalkan => {}
            }
            stats
        })
    }
}

/// Keep entries whose title or hours contain `term`, ignoring case
pub fn filter_entries(entries: Vec<LogEntry>, term: &str) -> Vec<LogEntry> {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return entries;
    }
    entries
        .into_iter()
        .filter(|e| contains_ci(&e.title, &needle) || e.hours.to_string().contains(&needle))
        .collect()
}

/// Entries as CSV with dates written day first
pub fn entries_to_csv(entries: &[LogEntry]) -> Result<String, StoreError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;
    for entry in entries {
        writer.write_record([
            entry.title.clone(),
            entry.hours.to_string(),
            entry.date.display(),
            entry.status.to_string(),
            entry.notes.clone().unwrap_or_default(),
        ])?;
    }
    finish_csv(writer)
}

/// Logbook store operations
#[derive(Clone)]
pub struct LogbookStore {
    client: SupabaseClient,
    table: String,
    validator: Validator,
}

impl LogbookStore {
    pub fn new(client: SupabaseClient, table: impl Into<String>, validator: Validator) -> Self {
        Self {
            client,
            table: table.into(),
            validator,
        }
    }

    /// All entries, newest activity date first
    pub async fn fetch_all(&self) -> Result<Vec<LogEntry>, StoreError> {
        self.client
            .select(&self.table, "select=*&order=tanggal.desc,id.desc")
            .await
            .map_err(|e| self.storage_error("fetch", e))
    }

    pub async fn get(&self, id: i64) -> Result<Option<LogEntry>, StoreError> {
        self.client
            .select_one(&self.table, &format!("select=*&id=eq.{id}"))
            .await
            .map_err(|e| self.storage_error("get", e))
    }

    pub async fn insert(&self, entry: NewLogEntry) -> Result<LogEntry, StoreError> {
        entry.validate(&self.validator)?;
        let saved: LogEntry = self
            .client
            .insert(&self.table, &entry)
            .await
            .map_err(|e| self.write_error("insert", &entry.title, e))?;
        info!(log_id = saved.id, title = %saved.title, "Log entry inserted");
        Ok(saved)
    }

    pub async fn update(&self, id: i64, entry: NewLogEntry) -> Result<LogEntry, StoreError> {
        entry.validate(&self.validator)?;
        let rows: Vec<LogEntry> = self
            .client
            .update(&self.table, &format!("id=eq.{id}"), &entry)
            .await
            .map_err(|e| self.write_error("update", &entry.title, e))?;

        match rows.into_iter().next() {
            Some(saved) => {
                info!(log_id = id, "Log entry updated");
                Ok(saved)
            }
            None => {
                warn!(log_id = id, "Log entry to update not found");
                Err(StoreError::not_found(ENTITY, id.to_string()))
            }
        }
    }

    pub async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let removed: Vec<LogEntry> = self
            .client
            .delete(&self.table, &format!("id=eq.{id}"))
            .await
            .map_err(|e| self.storage_error("delete", e))?;

        if removed.is_empty() {
            warn!(log_id = id, "Log entry to delete not found");
            return Err(StoreError::not_found(ENTITY, id.to_string()));
        }
        info!(log_id = id, "Log entry deleted");
        Ok(())
    }

    pub async fn search(&self, term: &str) -> Result<Vec<LogEntry>, StoreError> {
        Ok(filter_entries(self.fetch_all().await?, term))
    }

    pub async fn stats(&self) -> Result<LogStats, StoreError> {
        Ok(LogStats::from_entries(&self.fetch_all().await?))
    }

    pub async fn export_csv(&self) -> Result<String, StoreError> {
        entries_to_csv(&self.fetch_all().await?)
    }

    fn write_error(&self, op: &str, title: &str, err: SupabaseError) -> StoreError {
        if err.is_conflict() {
            warn!(op, title = %title, "Log entry conflicts with an existing row");
            return StoreError::duplicate(ENTITY, title);
        }
        self.storage_error(op, err)
    }

    fn storage_error(&self, op: &str, err: SupabaseError) -> StoreError {
        error!(op, table = %self.table, error = %err, "Logbook request failed");
        err.into()
    }
}
