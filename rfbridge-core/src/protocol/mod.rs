//! Outward drawing-command definitions.
//!
//! Every command the bridge emits towards the thin client is an
//! [`Instruction`]. Instructions are serialized with `serde` + `bincode`
//! by [`Instruction::to_bytes`]; the gateway's own wire encoding is
//! applied downstream of the [`Outward`] sink.
//!
//! [`Outward`]: crate::network::Outward

pub mod instruction;

pub use instruction::{AbortStatus, CompositeMode, Instruction, Layer};
