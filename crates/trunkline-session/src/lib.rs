//! Call session engine.
//!
//! One [`CallSession`] conducts one phone call: it classifies inbound audio
//! frames, detects turn boundaries, drives the external speech pipeline, and
//! paces synthesized audio back out, including barge-in handling when the
//! caller talks over the engine.
//!
//! The state machine itself is a pure transition core
//! ([`CallSession::handle`]) that maps an inbound [`CallEvent`] to a list of
//! [`Action`]s; the per-call driver task executes those actions against the
//! pipeline and the transport. The [`SessionManager`] owns the registry of
//! live sessions and is injected into the transport layer.

mod config;
mod driver;
mod manager;
mod state;

pub use config::SessionConfig;
pub use driver::OutboundFrame;
pub use manager::SessionManager;
pub use state::{Action, CallEvent, CallSession, CallState, TurnOutput};
