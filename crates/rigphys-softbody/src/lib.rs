//! Soft-body vehicle core: a declarative rig definition is compiled
//! into a node/beam lattice with shocks, wheels, rotators, hydros and
//! command beams, plus the per-tick spring/damper force pass that
//! deforms and breaks beams under load.

pub mod arena;
pub mod builder;
pub mod constants;
pub mod defs;
pub mod error;
pub mod messages;
pub mod tick;
pub mod types;
mod wheels;

pub use arena::{Arena, MemoryEstimate};
pub use builder::{Rig, RigBuilder};
pub use defs::*;
pub use error::SoftbodyError;
pub use messages::{Message, MessageKind, MessageLog};
pub use types::*;
