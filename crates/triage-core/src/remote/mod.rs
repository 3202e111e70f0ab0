//! The remote agents service seam.
//!
//! # Architecture
//!
//! ```text
//! RunDriver / MultiAgentHarness / HTTP front
//!     |
//!     v
//! Arc<dyn RemoteJobService> --------------------+
//!     |                                         |
//!     |  create_thread / append_message         |  (tests)
//!     |  create_run / get_run / list_messages   |
//!     v                                         v
//! FoundryClient (reqwest, JSON adapters)   ScriptedService
//! ```

pub mod config;
pub mod http;
pub mod trait_def;
pub mod types;

pub use config::ServiceConfig;
pub use http::FoundryClient;
pub use trait_def::{AgentProvisioner, RemoteJobService, create_thread_and_run, open_thread};
pub use types::{
    AgentHandle, AgentSpec, ContentPart, MessageRole, RemoteError, RunHandle, RunSnapshot,
    ThreadHandle, ThreadMessage, ToolDefinition,
};
