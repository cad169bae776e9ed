// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Domain record ↔ row translation and the process-wide type registry.
//!
//! On disk: `dsmall` carries the type tag, `dmedium` the JSON tag list
//! (`(name, value)` pairs, sorted by name then value), and `dlarge` the
//! camelCase JSON payload with nulls omitted. Reads are tolerant:
//! snake_case keys are accepted and every JSON string value is trimmed
//! before typed decoding.

use crate::error::StoreError;
use crate::row::Row;
use gantry_core::{
    CancellationEvent, ConfigItem, Entity, Execution, ExecutionServer, Job, Schedule,
    SchedulerState, System, Tag, Task, TriggerEvent, User, WorkerThread,
};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// The closed set of persistable record kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    System,
    ConfigItem,
    User,
    Job,
    Task,
    Schedule,
    TriggerEvent,
    CancellationEvent,
    Execution,
    ExecutionServer,
    WorkerThread,
    SchedulerState,
}

impl RecordKind {
    pub const ALL: [RecordKind; 12] = [
        RecordKind::System,
        RecordKind::ConfigItem,
        RecordKind::User,
        RecordKind::Job,
        RecordKind::Task,
        RecordKind::Schedule,
        RecordKind::TriggerEvent,
        RecordKind::CancellationEvent,
        RecordKind::Execution,
        RecordKind::ExecutionServer,
        RecordKind::WorkerThread,
        RecordKind::SchedulerState,
    ];

    pub fn type_tag(&self) -> &'static str {
        match self {
            RecordKind::System => System::TYPE_TAG,
            RecordKind::ConfigItem => ConfigItem::TYPE_TAG,
            RecordKind::User => User::TYPE_TAG,
            RecordKind::Job => Job::TYPE_TAG,
            RecordKind::Task => Task::TYPE_TAG,
            RecordKind::Schedule => Schedule::TYPE_TAG,
            RecordKind::TriggerEvent => TriggerEvent::TYPE_TAG,
            RecordKind::CancellationEvent => CancellationEvent::TYPE_TAG,
            RecordKind::Execution => Execution::TYPE_TAG,
            RecordKind::ExecutionServer => ExecutionServer::TYPE_TAG,
            RecordKind::WorkerThread => WorkerThread::TYPE_TAG,
            RecordKind::SchedulerState => SchedulerState::TYPE_TAG,
        }
    }
}

/// A decoded record of any registered kind.
#[derive(Debug, Clone)]
pub enum Record {
    System(System),
    ConfigItem(ConfigItem),
    User(User),
    Job(Job),
    Task(Task),
    Schedule(Schedule),
    TriggerEvent(TriggerEvent),
    CancellationEvent(CancellationEvent),
    Execution(Execution),
    ExecutionServer(ExecutionServer),
    WorkerThread(WorkerThread),
    SchedulerState(SchedulerState),
}

/// Process-wide type-tag → kind mapping, initialized once and rescanned
/// under a write lock on a miss.
pub struct TypeRegistry {
    tags: RwLock<BTreeMap<String, RecordKind>>,
}

impl TypeRegistry {
    fn new() -> Self {
        let registry = Self { tags: RwLock::new(BTreeMap::new()) };
        registry.rescan();
        registry
    }

    fn rescan(&self) {
        let mut tags = self.tags.write();
        tags.clear();
        for kind in RecordKind::ALL {
            tags.insert(kind.type_tag().to_string(), kind);
        }
    }

    fn lookup(tags: &BTreeMap<String, RecordKind>, tag: &str) -> Option<RecordKind> {
        // exact
        if let Some(kind) = tags.get(tag) {
            return Some(*kind);
        }
        // case-insensitive
        for (registered, kind) in tags {
            if registered.eq_ignore_ascii_case(tag) {
                return Some(*kind);
            }
        }
        // last dotted segment
        let last = tag.rsplit('.').next().unwrap_or(tag);
        for (registered, kind) in tags {
            let registered_last = registered.rsplit('.').next().unwrap_or(registered);
            if registered_last == last {
                return Some(*kind);
            }
        }
        // case-insensitive last segment
        for (registered, kind) in tags {
            let registered_last = registered.rsplit('.').next().unwrap_or(registered);
            if registered_last.eq_ignore_ascii_case(last) {
                return Some(*kind);
            }
        }
        None
    }

    /// Resolve a type tag, rescanning once before giving up.
    pub fn resolve(&self, tag: &str) -> Result<RecordKind, StoreError> {
        if let Some(kind) = Self::lookup(&self.tags.read(), tag) {
            return Ok(kind);
        }
        self.rescan();
        Self::lookup(&self.tags.read(), tag)
            .ok_or_else(|| StoreError::UnknownType(tag.to_string()))
    }
}

static REGISTRY: OnceLock<TypeRegistry> = OnceLock::new();

/// The process-wide registry; populated lazily on first use.
pub fn registry() -> &'static TypeRegistry {
    REGISTRY.get_or_init(TypeRegistry::new)
}

/// Encode a record into a payload-only row using its own tags.
pub fn encode<T: Entity>(obj: &T) -> Result<Row, StoreError> {
    encode_with_tags(obj, &obj.tags())
}

/// Encode a record into `Row(None, None, type_tag, tags_json, payload_json)`.
pub fn encode_with_tags<T: Entity>(obj: &T, tags: &[Tag]) -> Result<Row, StoreError> {
    Ok(Row {
        id: None,
        ver: None,
        dsmall: Some(T::TYPE_TAG.to_string()),
        dmedium: Some(serde_json::to_string(tags)?),
        dlarge: Some(serde_json::to_string(obj)?),
    })
}

fn payload_value(row: &Row) -> Result<serde_json::Value, StoreError> {
    let payload = row
        .dlarge
        .as_deref()
        .ok_or_else(|| StoreError::Unknown("row payload column not selected".to_string()))?;
    let mut value: serde_json::Value = serde_json::from_str(payload)?;
    trim_strings(&mut value);
    Ok(value)
}

fn decode_value<T: Entity>(row: &Row, value: serde_json::Value) -> Result<T, StoreError> {
    let mut obj: T = serde_json::from_value(value)?;
    if let Some(ver) = row.ver {
        obj.set_ver(ver);
    }
    Ok(obj)
}

/// Decode a row into a known record type, checking its tag against the
/// registry first.
pub fn decode<T: Entity>(row: &Row) -> Result<T, StoreError> {
    let tag = row
        .dsmall
        .as_deref()
        .ok_or_else(|| StoreError::Unknown("row type column not selected".to_string()))?;
    let kind = registry().resolve(tag)?;
    if kind.type_tag() != T::TYPE_TAG {
        return Err(StoreError::UnknownType(format!(
            "tag {:?} resolves to {}, expected {}",
            tag,
            kind.type_tag(),
            T::TYPE_TAG
        )));
    }
    decode_value(row, payload_value(row)?)
}

/// Decode a row into whichever registered variant its tag names.
pub fn decode_any(row: &Row) -> Result<Record, StoreError> {
    let tag = row
        .dsmall
        .as_deref()
        .ok_or_else(|| StoreError::Unknown("row type column not selected".to_string()))?;
    let kind = registry().resolve(tag)?;
    let value = payload_value(row)?;
    Ok(match kind {
        RecordKind::System => Record::System(decode_value(row, value)?),
        RecordKind::ConfigItem => Record::ConfigItem(decode_value(row, value)?),
        RecordKind::User => Record::User(decode_value(row, value)?),
        RecordKind::Job => Record::Job(decode_value(row, value)?),
        RecordKind::Task => Record::Task(decode_value(row, value)?),
        RecordKind::Schedule => Record::Schedule(decode_value(row, value)?),
        RecordKind::TriggerEvent => Record::TriggerEvent(decode_value(row, value)?),
        RecordKind::CancellationEvent => Record::CancellationEvent(decode_value(row, value)?),
        RecordKind::Execution => Record::Execution(decode_value(row, value)?),
        RecordKind::ExecutionServer => Record::ExecutionServer(decode_value(row, value)?),
        RecordKind::WorkerThread => Record::WorkerThread(decode_value(row, value)?),
        RecordKind::SchedulerState => Record::SchedulerState(decode_value(row, value)?),
    })
}

/// Decode the row's tag list from `dmedium`; an empty column is an empty
/// list.
pub fn decode_tags(row: &Row) -> Result<Vec<Tag>, StoreError> {
    match row.dmedium.as_deref() {
        None | Some("") => Ok(Vec::new()),
        Some(json) => Ok(serde_json::from_str(json)?),
    }
}

/// Trim every string value in a JSON tree in place.
fn trim_strings(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.len() != s.len() {
                *s = trimmed.to_string();
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                trim_strings(item);
            }
        }
        serde_json::Value::Object(map) => {
            for (_, item) in map.iter_mut() {
                trim_strings(item);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
