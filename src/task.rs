//! Recognized intents queued for dispatch

use serde::{Deserialize, Serialize};

/// Identifier of the edge node a task originated from
pub type ClientRef = String;

/// A labeled word extracted from a recognized utterance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// The recognized word
    pub word: String,
    /// Label attached by the recognizer (e.g. `"artist"`, `"room"`)
    pub label: String,
}

impl Entity {
    /// Create a labeled entity
    #[must_use]
    pub fn new(word: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            label: label.into(),
        }
    }
}

/// Kind of recognized intent
///
/// Only a subset of kinds have real handlers; the rest fall through to
/// the dispatcher's logging no-op. `Error` marks a failed recognition and
/// is never dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    ControlLight,
    ControlHeating,
    ControlBlinds,
    ControlOutlet,
    ControlLock,
    PlayMusic,
    PauseMusic,
    ResumeMusic,
    StopMusic,
    NextTrack,
    PreviousTrack,
    SetVolume,
    PlayVideo,
    StopVideo,
    GetWeather,
    GetForecast,
    GetTime,
    GetDate,
    SetTimer,
    CancelTimer,
    SetAlarm,
    CancelAlarm,
    AddReminder,
    ListReminders,
    AddShoppingItem,
    ListShoppingItems,
    GetNews,
    TellJoke,
    AnswerQuestion,
    StartConversation,
    EndConversation,
    Error,
}

/// A recognized user intent
///
/// Created from raw recognition output (inference result or terminal
/// input), consumed exactly once by the dispatcher, never mutated after
/// creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Intent kind, selects the handler
    pub kind: TaskKind,

    /// Human-readable description of the recognized utterance
    pub description: String,

    /// Recognition priority; informational only, dispatch stays FIFO
    pub priority: u8,

    /// Edge node the utterance came from, if known
    pub origin: Option<ClientRef>,

    /// Ordered (word, label) pairs from the recognizer
    pub entities: Vec<Entity>,

    /// Target entity for automation kinds (e.g. `"light.kitchen"`)
    pub entity_id: Option<String>,

    /// Automation service to invoke (e.g. `"turn_on"`)
    pub service: Option<String>,

    /// Desired state for a state-change command (e.g. `"on"`)
    pub new_state: Option<String>,
}

impl Task {
    /// Create a task with no entities or automation fields
    #[must_use]
    pub fn new(kind: TaskKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            priority: 0,
            origin: None,
            entities: Vec::new(),
            entity_id: None,
            service: None,
            new_state: None,
        }
    }

    /// Attach the originating client
    #[must_use]
    pub fn from_client(mut self, origin: impl Into<ClientRef>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Attach recognized entities
    #[must_use]
    pub fn with_entities(mut self, entities: Vec<Entity>) -> Self {
        self.entities = entities;
        self
    }

    /// Attach a state-change automation command
    #[must_use]
    pub fn with_state_change(
        mut self,
        entity_id: impl Into<String>,
        new_state: impl Into<String>,
    ) -> Self {
        self.entity_id = Some(entity_id.into());
        self.new_state = Some(new_state.into());
        self
    }

    /// Attach a service-call automation command
    #[must_use]
    pub fn with_service_call(
        mut self,
        entity_id: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        self.entity_id = Some(entity_id.into());
        self.service = Some(service.into());
        self
    }

    /// Automation domain derived from the entity id prefix
    /// (`"light.kitchen"` -> `"light"`)
    #[must_use]
    pub fn automation_domain(&self) -> Option<&str> {
        let entity_id = self.entity_id.as_deref()?;
        Some(entity_id.split_once('.').map_or(entity_id, |(domain, _)| domain))
    }
}
