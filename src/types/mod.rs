// Shared domain types, used by the engine, the relay and the CLI.
// None of those layers depends on another; all import from this module.

pub mod common;
pub mod notification;
pub mod pr;
pub mod timeline;

pub use common::*;
pub use notification::*;
pub use pr::*;
pub use timeline::*;
