//! The outward side of a session: where drawing instructions go.

pub mod outward;

pub use outward::{ChannelOutward, InstructionReceiver, Outward};
