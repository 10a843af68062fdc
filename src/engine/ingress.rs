//! Raw input normalization.
//!
//! Producers hand us loosely-typed JSON objects (`{"type": "gift", "sender": ..}`).
//! `EventIngress` checks the per-kind schema and turns them into `Event`s. Ids
//! and timestamps are filled in when the producer leaves them out.

use serde_json::{Map, Value};

use super::events::{Event, EventKind, Payload};
use crate::clock::SharedClock;
use crate::error::{EngineError, Result};

pub struct EventIngress {
    clock: SharedClock,
}

impl EventIngress {
    pub fn new(clock: SharedClock) -> Self {
        Self { clock }
    }

    /// Normalize a raw object whose `type` field names the kind.
    pub fn normalize(&self, raw: &Value) -> Result<Event> {
        let fields = raw
            .as_object()
            .ok_or_else(|| EngineError::invalid("event", "expected a JSON object"))?;
        let kind_name = fields
            .get("type")
            .or_else(|| fields.get("kind"))
            .and_then(Value::as_str)
            .ok_or_else(|| EngineError::missing_field("event", "type"))?;
        let kind = EventKind::parse(kind_name)
            .ok_or_else(|| EngineError::invalid(kind_name, "unknown event kind"))?;
        self.normalize_kind(kind, fields)
    }

    /// Normalize a payload whose kind is known out of band.
    pub fn normalize_kind(&self, kind: EventKind, fields: &Map<String, Value>) -> Result<Event> {
        let k = kind.as_str();
        let payload = match kind {
            EventKind::Comment => Payload::Comment {
                author: required_str(fields, k, "author")?,
                text: required_str(fields, k, "text")?,
            },
            EventKind::Like => Payload::Like {
                count: optional_count(fields, k, "count")?,
            },
            EventKind::Gift => Payload::Gift {
                sender: required_str(fields, k, "sender")?,
                name: required_str(fields, k, "name")?,
                value: optional_count(fields, k, "value")?,
            },
            EventKind::Motion => Payload::Motion {
                intensity: optional_f64(fields, k, "intensity")?.unwrap_or(0.0),
                has_motion: required_bool(fields, k, "hasMotion")?,
            },
            EventKind::EffectUsed => Payload::EffectUsed {
                effect_name: required_str(fields, k, "effectName")?,
            },
            EventKind::VoiceUsed => Payload::VoiceUsed {
                voice_name: required_str(fields, k, "voiceName")?,
            },
            EventKind::ViewerCount => Payload::ViewerCount {
                count: optional_count(fields, k, "count")?
                    .ok_or_else(|| EngineError::missing_field(k, "count"))?,
            },
            EventKind::Share => Payload::Share {
                user: optional_str(fields, k, "user")?,
            },
            EventKind::Follow => Payload::Follow {
                user: optional_str(fields, k, "user")?,
            },
            EventKind::Join => Payload::Join {
                user: optional_str(fields, k, "user")?,
            },
        };

        let id = match present(fields, "id") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(_) => return Err(EngineError::invalid(k, "`id` must be a string or number")),
            None => uuid::Uuid::new_v4().to_string(),
        };
        let timestamp = match present(fields, "timestamp") {
            Some(v) => as_count(v)
                .ok_or_else(|| EngineError::invalid(k, "`timestamp` must be epoch milliseconds"))?,
            None => self.clock.now_ms(),
        };

        let mut event = Event::new(id, timestamp, payload);
        if let Some(explicit) = optional_str(fields, k, "participantId")? {
            event.participant_id = Some(explicit);
        }
        Ok(event)
    }
}

// =============================================================================
// Field extraction
// =============================================================================

/// Field value, treating JSON `null` as absent.
fn present<'a>(fields: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    fields.get(field).filter(|v| !v.is_null())
}

fn required_str(fields: &Map<String, Value>, kind: &str, field: &str) -> Result<String> {
    optional_str(fields, kind, field)?.ok_or_else(|| EngineError::missing_field(kind, field))
}

fn optional_str(fields: &Map<String, Value>, kind: &str, field: &str) -> Result<Option<String>> {
    match present(fields, field) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(EngineError::invalid(kind, format!("`{}` must be a string", field))),
    }
}

fn required_bool(fields: &Map<String, Value>, kind: &str, field: &str) -> Result<bool> {
    match present(fields, field) {
        None => Err(EngineError::missing_field(kind, field)),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(EngineError::invalid(kind, format!("`{}` must be a boolean", field))),
    }
}

fn optional_f64(fields: &Map<String, Value>, kind: &str, field: &str) -> Result<Option<f64>> {
    match present(fields, field) {
        None => Ok(None),
        Some(v) => v
            .as_f64()
            .filter(|x| x.is_finite())
            .map(Some)
            .ok_or_else(|| EngineError::invalid(kind, format!("`{}` must be a number", field))),
    }
}

fn optional_count(fields: &Map<String, Value>, kind: &str, field: &str) -> Result<Option<u64>> {
    match present(fields, field) {
        None => Ok(None),
        Some(v) => as_count(v).map(Some).ok_or_else(|| {
            EngineError::invalid(kind, format!("`{}` must be a non-negative number", field))
        }),
    }
}

/// Non-negative integer, flooring fractional producers (viewer counts arrive as floats).
fn as_count(v: &Value) -> Option<u64> {
    if let Some(n) = v.as_u64() {
        return Some(n);
    }
    v.as_f64()
        .filter(|x| x.is_finite() && *x >= 0.0)
        .map(|x| x.floor() as u64)
}
