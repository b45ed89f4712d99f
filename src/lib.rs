//! logagent-config - configuration core of an event-log forwarding agent
//!
//! This library exposes the channel selection tree, the ordered validation
//! pipeline with its network collaborators, and the persisted configuration.

pub mod constants;
pub mod logging;
pub mod models;
pub mod net;
pub mod output;
pub mod session;
pub mod store;
pub mod tree;
pub mod validation;
