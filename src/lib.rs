//! Controller mirroring engine
//!
//! Pairs the two kernel nodes of each physical game controller, probes
//! their capabilities, and maintains a uinput mirror per controller:
//! axis/button state flows physical → mirror, force feedback flows
//! mirror → physical.

pub mod access;
pub mod engine;
pub mod error;
pub mod evnode;
pub mod ffbridge;
pub mod hotplug;
pub mod joydev;
pub mod mirror;
pub mod mux;
pub mod probe;
pub mod registry;
pub mod virtdev;

pub use engine::Engine;
pub use error::MirrorError;
pub use probe::Capabilities;
pub use registry::{NodeKind, Observation, Registry, MAX_MIRRORS};
