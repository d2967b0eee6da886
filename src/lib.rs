//! Harken Core - control plane for the Harken voice assistant
//!
//! Edge nodes capture audio and stream it to a server that runs inference
//! and dispatches recognized intents to handlers. This crate provides the
//! pieces in between:
//! - Frame codec for the length-prefixed request/response wire protocol
//! - Session transport (TCP request/response sessions, unframed UDP)
//! - Task queue and kind-based dispatch
//! - Service supervisor that keeps the long-running loops alive
//! - Client registry of known edge nodes and their outputs
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                    Edge nodes                         │
//! │   audio capture  │  wireless comm  │  outbound link   │
//! └────────────────────┬─────────────────────────────────┘
//!                      │ frames (TCP) / datagrams (UDP)
//! ┌────────────────────▼─────────────────────────────────┐
//! │                  Harken Core                          │
//! │  Transport │ Task Queue │ Dispatcher │ Supervisor     │
//! └────────────────────┬─────────────────────────────────┘
//!                      │
//! ┌────────────────────▼─────────────────────────────────┐
//! │              External collaborators                   │
//! │  Inference Engine │ Automation Bridge │ Media Output  │
//! └──────────────────────────────────────────────────────┘
//! ```

pub mod clients;
pub mod collaborators;
pub mod config;
pub mod daemon;
pub mod dispatch;
pub mod error;
pub mod proto;
pub mod queue;
pub mod supervisor;
pub mod task;
pub mod transport;

pub use clients::{ClientInfo, ClientRegistry, OutputKind};
pub use collaborators::{AutomationBridge, InferenceEngine, InferenceOutcome, MediaOutput};
pub use config::Config;
pub use daemon::Daemon;
pub use dispatch::{AutomationHandler, Dispatcher, MusicHandler, TaskHandler};
pub use error::{Error, Result};
pub use proto::{Frame, ProtocolError, Status};
pub use queue::TaskQueue;
pub use supervisor::{FnService, Role, Service, ServiceStatus, Supervisor};
pub use task::{Entity, Task, TaskKind};
