//! Agent orchestration core.
//!
//! `run_agent_loop` drives the model-turn / tool-execution state machine
//! over one conversation until the model stops requesting tools (or the
//! turn cap forces termination); `AgentSession` scopes the tool-provider
//! connection around a single run.

pub mod config;
pub mod runner;
pub mod session;

pub use config::AgentLoopConfig;
pub use runner::{route_after_model_turn, run_agent_loop, Route};
pub use session::AgentSession;
