//! Access resolution and permission gating
//!
//! The resolver turns a principal into an [`AccessSnapshot`]; gates make
//! pure expose/suppress decisions over that snapshot.

mod gate;
pub mod permissions;
mod resolver;

pub use gate::{GateMode, PermissionGate, RoleGate};
pub use resolver::{AccessResolver, AccessSnapshot, ResolveOutcome};
