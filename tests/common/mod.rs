//! Shared test utilities: mock collaborators

#![allow(dead_code)]

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Mutex;

use async_trait::async_trait;

use harken_core::{
    AutomationBridge, ClientInfo, Entity, Error, InferenceEngine, InferenceOutcome, MediaOutput,
    Result, Task, TaskKind,
};

/// Engine that returns every payload unchanged
pub struct EchoEngine;

#[async_trait]
impl InferenceEngine for EchoEngine {
    async fn process(&self, audio: &[u8]) -> Result<InferenceOutcome> {
        Ok(InferenceOutcome::Raw(audio.to_vec()))
    }
}

/// Engine that recognizes every payload as a kitchen-light intent
pub struct IntentEngine;

#[async_trait]
impl InferenceEngine for IntentEngine {
    async fn process(&self, _audio: &[u8]) -> Result<InferenceOutcome> {
        let task = Task::new(TaskKind::ControlLight, "turn on the kitchen light")
            .with_state_change("light.kitchen", "on");
        Ok(InferenceOutcome::Intent(task))
    }
}

/// Engine that always fails
pub struct FailingEngine;

#[async_trait]
impl InferenceEngine for FailingEngine {
    async fn process(&self, _audio: &[u8]) -> Result<InferenceOutcome> {
        Err(Error::Inference("model unavailable".to_string()))
    }
}

/// Automation bridge that records every command it receives
#[derive(Default)]
pub struct RecordingBridge {
    pub state_changes: Mutex<Vec<(String, String)>>,
    pub service_calls: Mutex<Vec<(String, String, String)>>,
}

impl RecordingBridge {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AutomationBridge for RecordingBridge {
    async fn call_service(&self, domain: &str, service: &str, entity_id: &str) -> Result<bool> {
        self.service_calls.lock().unwrap().push((
            domain.to_string(),
            service.to_string(),
            entity_id.to_string(),
        ));
        Ok(true)
    }

    async fn send_state_change(&self, entity_id: &str, new_state: &str) -> Result<bool> {
        self.state_changes
            .lock()
            .unwrap()
            .push((entity_id.to_string(), new_state.to_string()));
        Ok(true)
    }
}

/// Media collaborator that records playback requests
#[derive(Default)]
pub struct RecordingMedia {
    pub plays: Mutex<Vec<(String, String)>>,
}

impl RecordingMedia {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MediaOutput for RecordingMedia {
    async fn find_track(&self, entities: &[Entity]) -> Result<String> {
        let words: Vec<&str> = entities.iter().map(|e| e.word.as_str()).collect();
        Ok(format!("track:{}", words.join("-")))
    }

    async fn play(&self, client: &ClientInfo, track_id: &str) -> Result<bool> {
        self.plays
            .lock()
            .unwrap()
            .push((client.identifier.clone(), track_id.to_string()));
        Ok(true)
    }
}

/// A registered edge node for routing tests
pub fn sample_client(identifier: &str) -> ClientInfo {
    let mut info = ClientInfo::new(identifier, IpAddr::V4(Ipv4Addr::LOCALHOST), 7583);
    info.music_outputs.insert("Living Room Speakers".to_string());
    info
}
