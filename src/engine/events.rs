//! Canonical typed events.

use serde::{Deserialize, Serialize};

use crate::scoring::ActionKind;

/// Timestamp in epoch milliseconds
pub type Timestamp = u64;

pub type EventId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    Comment,
    Like,
    Gift,
    Motion,
    EffectUsed,
    VoiceUsed,
    ViewerCount,
    Share,
    Follow,
    Join,
}

impl EventKind {
    pub const ALL: [EventKind; 10] = [
        EventKind::Comment,
        EventKind::Like,
        EventKind::Gift,
        EventKind::Motion,
        EventKind::EffectUsed,
        EventKind::VoiceUsed,
        EventKind::ViewerCount,
        EventKind::Share,
        EventKind::Follow,
        EventKind::Join,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Comment => "comment",
            EventKind::Like => "like",
            EventKind::Gift => "gift",
            EventKind::Motion => "motion",
            EventKind::EffectUsed => "effectUsed",
            EventKind::VoiceUsed => "voiceUsed",
            EventKind::ViewerCount => "viewerCount",
            EventKind::Share => "share",
            EventKind::Follow => "follow",
            EventKind::Join => "join",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.as_str() == s)
    }

    /// Scored action this kind maps to, if any.
    pub fn action(&self) -> Option<ActionKind> {
        match self {
            EventKind::Comment => Some(ActionKind::Comment),
            EventKind::Like => Some(ActionKind::Like),
            EventKind::Gift => Some(ActionKind::Gift),
            EventKind::Motion => Some(ActionKind::Motion),
            EventKind::EffectUsed => Some(ActionKind::Effect),
            EventKind::VoiceUsed => Some(ActionKind::Voice),
            EventKind::ViewerCount | EventKind::Share | EventKind::Follow | EventKind::Join => None,
        }
    }
}

/// Kind-specific event body. Optional fields keep the producer's omission so
/// consumers can apply their own defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Payload {
    Comment {
        author: String,
        text: String,
    },
    Like {
        #[serde(default)]
        count: Option<u64>,
    },
    Gift {
        sender: String,
        name: String,
        #[serde(default)]
        value: Option<u64>,
    },
    Motion {
        #[serde(default)]
        intensity: f64,
        #[serde(rename = "hasMotion")]
        has_motion: bool,
    },
    EffectUsed {
        #[serde(rename = "effectName")]
        effect_name: String,
    },
    VoiceUsed {
        #[serde(rename = "voiceName")]
        voice_name: String,
    },
    ViewerCount {
        count: u64,
    },
    Share {
        #[serde(default)]
        user: Option<String>,
    },
    Follow {
        #[serde(default)]
        user: Option<String>,
    },
    Join {
        #[serde(default)]
        user: Option<String>,
    },
}

impl Payload {
    pub fn kind(&self) -> EventKind {
        match self {
            Payload::Comment { .. } => EventKind::Comment,
            Payload::Like { .. } => EventKind::Like,
            Payload::Gift { .. } => EventKind::Gift,
            Payload::Motion { .. } => EventKind::Motion,
            Payload::EffectUsed { .. } => EventKind::EffectUsed,
            Payload::VoiceUsed { .. } => EventKind::VoiceUsed,
            Payload::ViewerCount { .. } => EventKind::ViewerCount,
            Payload::Share { .. } => EventKind::Share,
            Payload::Follow { .. } => EventKind::Follow,
            Payload::Join { .. } => EventKind::Join,
        }
    }

    /// The audience member behind the event, when the payload names one.
    pub fn actor(&self) -> Option<&str> {
        match self {
            Payload::Comment { author, .. } => Some(author),
            Payload::Gift { sender, .. } => Some(sender),
            Payload::Share { user } | Payload::Follow { user } | Payload::Join { user } => {
                user.as_deref()
            }
            _ => None,
        }
    }
}

/// A normalized interaction. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    #[serde(rename = "participantId", default, skip_serializing_if = "Option::is_none")]
    pub participant_id: Option<String>,
    pub payload: Payload,
}

impl Event {
    pub fn new(id: impl Into<EventId>, timestamp: Timestamp, payload: Payload) -> Self {
        let participant_id = payload.actor().map(str::to_string);
        Self {
            id: id.into(),
            timestamp,
            participant_id,
            payload,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}
