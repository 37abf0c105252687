// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Journal entry CRUD and the realtime AI-result merge.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{ApiError, ErrorCode};
use crate::http::{ApiRequest, AuthPipeline};

/// Realtime event carrying an AI analysis result for one entry.
pub const JOURNAL_AI_COMPLETE: &str = "journal_ai_complete";

/// A journal entry. Fields the client does not model are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body of `POST /journal/`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NewEntry {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
}

/// Body of `PUT /journal/{id}`. Unset fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EntryUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
}

/// Client for the `/journal/*` endpoints.
#[derive(Clone)]
pub struct JournalService {
    pipeline: AuthPipeline,
}

impl JournalService {
    pub fn new(pipeline: AuthPipeline) -> Self {
        Self { pipeline }
    }

    pub async fn create(&self, entry: &NewEntry) -> Result<JournalEntry, ApiError> {
        let req = ApiRequest::post("/journal/").json(to_body(entry)?);
        self.pipeline.call_json(req, "Failed to create entry").await
    }

    pub async fn list(&self) -> Result<Vec<JournalEntry>, ApiError> {
        self.pipeline.call_json(ApiRequest::get("/journal/"), "Failed to load entries").await
    }

    pub async fn get(&self, id: &str) -> Result<JournalEntry, ApiError> {
        let req = ApiRequest::get(format!("/journal/{id}"));
        self.pipeline.call_json(req, "Failed to load entry").await
    }

    pub async fn update(&self, id: &str, update: &EntryUpdate) -> Result<JournalEntry, ApiError> {
        let req = ApiRequest::put(format!("/journal/{id}")).json(to_body(update)?);
        self.pipeline.call_json(req, "Failed to update entry").await
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        let req = ApiRequest::delete(format!("/journal/{id}"));
        self.pipeline.call_empty(req, "Failed to delete entry").await
    }
}

fn to_body<T: Serialize>(value: &T) -> Result<Value, ApiError> {
    serde_json::to_value(value)
        .map_err(|e| ApiError::new(ErrorCode::Decode, format!("encode: {e}")))
}

/// Accept numeric or string ids; the server has used both.
fn id_string<'de, D: serde::Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    match Value::deserialize(d)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("invalid entry id: {other}"))),
    }
}

impl JournalEntry {
    /// Overlay `fields` onto this entry. Known fields must keep their types;
    /// anything else lands in `extra`.
    fn merge(&mut self, fields: &Map<String, Value>) -> Result<(), serde_json::Error> {
        let mut merged = match serde_json::to_value(&*self)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for (key, value) in fields {
            merged.insert(key.clone(), value.clone());
        }
        *self = serde_json::from_value(Value::Object(merged))?;
        Ok(())
    }
}

/// Merge a `journal_ai_complete` message into the entry whose id matches
/// `entry_id`. Every field except `event` and `entry_id` is copied.
///
/// Returns `false` when no entry matches or the message is unusable.
pub fn merge_ai_result(entries: &mut [JournalEntry], msg: &Value) -> bool {
    let Some(fields) = msg.as_object() else {
        return false;
    };
    let entry_id = match fields.get("entry_id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => return false,
    };
    let Some(entry) = entries.iter_mut().find(|e| e.id == entry_id) else {
        debug!(entry_id = %entry_id, "AI result for unknown entry");
        return false;
    };

    let result: Map<String, Value> = fields
        .iter()
        .filter(|(k, _)| k.as_str() != "event" && k.as_str() != "entry_id")
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    match entry.merge(&result) {
        Ok(()) => true,
        Err(e) => {
            debug!(entry_id = %entry_id, err = %e, "AI result does not fit entry");
            false
        }
    }
}

#[cfg(test)]
#[path = "journal_tests.rs"]
mod tests;
