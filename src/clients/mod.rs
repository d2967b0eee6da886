//! Directory of known edge nodes
//!
//! The dispatcher uses the registry to resolve where media and automation
//! output should be routed.

mod registry;
mod types;

pub use registry::ClientRegistry;
pub use types::{ClientInfo, OutputKind};
