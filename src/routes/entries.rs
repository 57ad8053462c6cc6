use axum::{
    extract::{Path, Query, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::{Value, json};
use std::collections::HashMap;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::journal::cooldown::parse_timestamp;
use crate::journal::{self, CreateEntry, EntryFilter, EntryStore, UpdateEntry};
use crate::AppState;

const MAX_TAGS: usize = 10;
const MAX_TAG_LEN: usize = 20;
const MIN_TASK_LEN: usize = 3;

// Distinguishes an absent field (outer None) from an explicit null (Some(None))
fn deserialize_present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
pub struct CreateEntryRequest {
    mood: Option<Value>,
    task: Option<Value>,
    notes: Option<Value>,
    tags: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateEntryRequest {
    mood: Option<Value>,
    task: Option<Value>,
    #[serde(default, deserialize_with = "deserialize_present")]
    notes: Option<Option<Value>>,
    tags: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EntryListQuery {
    mood: Option<String>,
    /// Comma-separated tag names; an entry matches if it has any of them.
    tag: Option<String>,
    date_from: Option<String>,
    date_to: Option<String>,
    search: Option<String>,
}

fn validate_mood(value: &Value) -> Result<i64, &'static str> {
    match value.as_i64() {
        Some(mood) if (1..=5).contains(&mood) => Ok(mood),
        Some(_) => Err("Mood must be between 1 and 5"),
        None if value.is_number() => Err("Mood must be an integer"),
        None => Err("Mood must be a number"),
    }
}

fn validate_task(value: &Value) -> Result<String, &'static str> {
    let task = value.as_str().ok_or("Task must be a string")?.trim();
    if task.chars().count() < MIN_TASK_LEN {
        return Err("Task must be at least 3 characters");
    }
    Ok(task.to_string())
}

fn validate_notes(value: Option<Value>) -> Result<Option<String>, &'static str> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(notes)) => Ok(Some(notes).filter(|n| !n.is_empty())),
        Some(_) => Err("Notes must be a string"),
    }
}

fn is_valid_tag(name: &str) -> bool {
    (1..=MAX_TAG_LEN).contains(&name.len())
        && name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
}

/// Trims and lowercases every tag, then checks the count and the tag alphabet.
fn validate_tags(value: Value) -> Result<Vec<String>, &'static str> {
    const NOT_STRINGS: &str = "Tags must be an array of strings";

    let Value::Array(items) = value else {
        return Err(NOT_STRINGS);
    };
    let tags = items
        .into_iter()
        .map(|item| match item {
            Value::String(tag) => Ok(tag),
            _ => Err(NOT_STRINGS),
        })
        .collect::<Result<Vec<String>, _>>()?;

    if tags.len() > MAX_TAGS {
        return Err("Maximum 10 tags allowed");
    }

    let tags: Vec<String> = tags.iter().map(|t| t.trim().to_lowercase()).collect();
    if !tags.iter().all(|t| is_valid_tag(t)) {
        return Err("Each tag must be lowercase, alphanumeric, and 1-20 characters");
    }
    Ok(tags)
}

fn validate_create(req: CreateEntryRequest) -> Result<CreateEntry, HashMap<String, String>> {
    let mut errors = HashMap::new();

    let mood = match &req.mood {
        None | Some(Value::Null) => {
            errors.insert("mood".to_string(), "Mood is required".to_string());
            None
        }
        Some(value) => validate_mood(value)
            .map_err(|e| errors.insert("mood".to_string(), e.to_string()))
            .ok(),
    };

    let task = match &req.task {
        None | Some(Value::Null) => {
            errors.insert("task".to_string(), "Task is required".to_string());
            None
        }
        Some(task) => validate_task(task)
            .map_err(|e| errors.insert("task".to_string(), e.to_string()))
            .ok(),
    };

    let notes = validate_notes(req.notes)
        .map_err(|e| errors.insert("notes".to_string(), e.to_string()))
        .ok();

    let tags = match req.tags {
        None | Some(Value::Null) => Some(Vec::new()),
        Some(value) => validate_tags(value)
            .map_err(|e| errors.insert("tags".to_string(), e.to_string()))
            .ok(),
    };

    match (mood, task, notes, tags) {
        (Some(mood), Some(task), Some(notes), Some(tags)) if errors.is_empty() => Ok(CreateEntry {
            mood,
            task,
            notes,
            tags,
        }),
        _ => Err(errors),
    }
}

fn validate_update(req: UpdateEntryRequest) -> Result<UpdateEntry, HashMap<String, String>> {
    let mut errors = HashMap::new();
    let mut update = UpdateEntry::default();

    if let Some(value) = &req.mood {
        match validate_mood(value) {
            Ok(mood) => update.mood = Some(mood),
            Err(e) => {
                errors.insert("mood".to_string(), e.to_string());
            }
        }
    }

    if let Some(task) = &req.task {
        match validate_task(task) {
            Ok(task) => update.task = Some(task),
            Err(e) => {
                errors.insert("task".to_string(), e.to_string());
            }
        }
    }

    if let Some(notes) = req.notes {
        match validate_notes(notes) {
            Ok(notes) => update.notes = Some(notes),
            Err(e) => {
                errors.insert("notes".to_string(), e.to_string());
            }
        }
    }

    if let Some(tags) = req.tags {
        match validate_tags(tags) {
            Ok(tags) => update.tags = Some(tags),
            Err(e) => {
                errors.insert("tags".to_string(), e.to_string());
            }
        }
    }

    if errors.is_empty() { Ok(update) } else { Err(errors) }
}

/// Accepts a full RFC 3339 timestamp or a bare `YYYY-MM-DD` day; a bare day
/// expands to its first or last millisecond depending on `end_of_day`.
fn parse_date_bound(raw: &str, end_of_day: bool) -> Option<DateTime<Utc>> {
    if let Ok(at) = parse_timestamp(raw) {
        return Some(at);
    }

    let day = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    let time = if end_of_day {
        NaiveTime::from_hms_milli_opt(23, 59, 59, 999)?
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)?
    };
    Some(day.and_time(time).and_utc())
}

fn build_filter(query: EntryListQuery) -> Result<EntryFilter, HashMap<String, String>> {
    let mut errors = HashMap::new();
    let mut filter = EntryFilter::default();

    if let Some(raw) = query.mood.filter(|m| !m.is_empty()) {
        match raw.parse::<i64>() {
            Ok(mood) if (1..=5).contains(&mood) => filter.mood = Some(mood),
            _ => {
                errors.insert("mood".to_string(), "Mood must be between 1 and 5".to_string());
            }
        }
    }

    if let Some(raw) = query.tag {
        filter.tags = raw
            .split(',')
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
    }

    for (field, raw, end_of_day) in [("date_from", &query.date_from, false), ("date_to", &query.date_to, true)] {
        let Some(raw) = raw.as_deref().filter(|r| !r.is_empty()) else {
            continue;
        };
        match parse_date_bound(raw, end_of_day) {
            Some(at) if end_of_day => filter.created_to = Some(at),
            Some(at) => filter.created_from = Some(at),
            None => {
                errors.insert(field.to_string(), "Date must be YYYY-MM-DD or an ISO 8601 timestamp".to_string());
            }
        }
    }

    filter.search = query.search.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

    if errors.is_empty() { Ok(filter) } else { Err(errors) }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/entries", get(list_entries).post(create_entry))
        .route("/entries/{id}", get(show_entry).patch(update_entry).delete(delete_entry))
}

async fn list_entries(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<EntryListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let filter = build_filter(query).map_err(AppError::Validation)?;
    let entries = state.store.list_entries(&user.id, &filter).await.map_err(journal::JournalError::from)?;
    Ok(Json(json!({ "data": entries })))
}

async fn create_entry(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    payload: Result<Json<CreateEntryRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    let input = validate_create(payload).map_err(AppError::Validation)?;

    let entry = journal::create_entry(&state.store, &user.id, input, Utc::now()).await?;

    let location = format!("/entries/{}", entry.entry.id);
    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(entry)))
}

async fn show_entry(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let entry = journal::get_entry(&state.store, &user.id, &id).await?;
    Ok(Json(entry))
}

async fn update_entry(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    payload: Result<Json<UpdateEntryRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    let input = validate_update(payload).map_err(AppError::Validation)?;

    let entry = journal::update_entry(&state.store, &user.id, &id, input, Utc::now()).await?;
    Ok(Json(entry))
}

async fn delete_entry(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    journal::delete_entry(&state.store, &user.id, &id, Utc::now()).await?;
    Ok(Json(json!({ "message": "Entry deleted successfully", "id": id })))
}
