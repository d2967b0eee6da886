//! Client registry types

use std::collections::HashSet;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Which output set of a client to update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// Music playback outputs (e.g. AirPlay speakers)
    Music,
    /// Video playback outputs
    Video,
}

/// A known edge node and its declared outputs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    /// Stable identifier the node reports itself under
    pub identifier: String,
    /// Address the node is reachable at
    pub address: IpAddr,
    /// Port the node listens on
    pub port: u16,
    /// Names of music outputs attached to the node
    pub music_outputs: HashSet<String>,
    /// Names of video outputs attached to the node
    pub video_outputs: HashSet<String>,
    /// When the node first reported itself
    pub registered_at: chrono::DateTime<chrono::Utc>,
}

impl ClientInfo {
    /// Create a client entry with no outputs
    #[must_use]
    pub fn new(identifier: impl Into<String>, address: IpAddr, port: u16) -> Self {
        Self {
            identifier: identifier.into(),
            address,
            port,
            music_outputs: HashSet::new(),
            video_outputs: HashSet::new(),
            registered_at: chrono::Utc::now(),
        }
    }

    /// The output set for the given kind
    #[must_use]
    pub const fn outputs(&self, kind: OutputKind) -> &HashSet<String> {
        match kind {
            OutputKind::Music => &self.music_outputs,
            OutputKind::Video => &self.video_outputs,
        }
    }
}
