//! Hanging protocol engine.
//!
//! [`ProtocolEngine`] ties the pieces together for one viewer session:
//!
//! 1. `set_study` / `set_protocol_library` select a protocol
//!    ([`ProtocolSelector`](crate::selection::ProtocolSelector)), falling
//!    back to [`EngineConfig::default_protocol`].
//! 2. The stage resets to 0 and the stage's viewport assignment is
//!    computed ([`ViewportAssigner`](crate::assign::ViewportAssigner)).
//! 3. `next_stage` / `previous_stage` move through the stages and recompute
//!    only when the stage actually changed.
//!
//! Matching never fails. The only errors are configuration errors: an
//! invalid protocol library, an invalid config, or a customization the
//! current protocol refuses.

mod config;
mod orchestrator;

pub use config::EngineConfig;
pub use orchestrator::ProtocolEngine;
