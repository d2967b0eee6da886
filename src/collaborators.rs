//! External collaborator interfaces
//!
//! The core consumes these but does not implement them: the inference
//! engine turns raw audio into recognized intents, the automation bridge
//! talks to the home-automation state API, and media output locates and
//! plays tracks on an edge node's outputs.

use async_trait::async_trait;

use crate::clients::ClientInfo;
use crate::task::{Entity, Task};
use crate::Result;

/// Outcome of running inference over a request payload
#[derive(Debug, Clone)]
pub enum InferenceOutcome {
    /// Processed bytes to return to the peer verbatim
    Raw(Vec<u8>),
    /// A recognized intent to enqueue for dispatch
    Intent(Task),
}

/// Turns raw audio bytes into processed bytes or a recognized intent
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    /// Process one request payload
    async fn process(&self, audio: &[u8]) -> Result<InferenceOutcome>;
}

/// Home-automation state API
#[async_trait]
pub trait AutomationBridge: Send + Sync {
    /// Establish the bridge connection; called by the supervisor when the
    /// bridge service starts
    async fn connect(&self) -> Result<()> {
        Ok(())
    }

    /// Invoke a service on an entity (e.g. `("light", "turn_on", "light.kitchen")`)
    async fn call_service(&self, domain: &str, service: &str, entity_id: &str) -> Result<bool>;

    /// Push a state change to an entity
    async fn send_state_change(&self, entity_id: &str, new_state: &str) -> Result<bool>;
}

/// Media playback collaborator
#[async_trait]
pub trait MediaOutput: Send + Sync {
    /// Resolve a track from recognized entities
    async fn find_track(&self, entities: &[Entity]) -> Result<String>;

    /// Play a track on one of the client's music outputs
    async fn play(&self, client: &ClientInfo, track_id: &str) -> Result<bool>;
}
