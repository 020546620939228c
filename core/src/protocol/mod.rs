//! Wire protocol: control tags, framing primitives and shared constants

pub mod constants;
pub mod wire;

pub use constants::{tag, PROTOCOL_VERSION};
