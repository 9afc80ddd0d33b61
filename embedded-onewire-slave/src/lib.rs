#![no_std]
#![deny(missing_docs)]
#![doc = include_str!("../README.md")]

pub mod consts;
mod control;
mod error;
mod isr;
mod pin;
mod rom;
mod slave;
mod traits;
pub use control::OneWireControl;
pub use error::OneWireSlaveError;
pub use isr::SlaveCell;
pub use pin::OpenDrainLine;
pub use slave::{OneWireSlave, SlaveState};
pub use traits::{OneWireHandler, OneWireLine, OneWireTimer};

/// Result type for the fallible slave entry points.
pub type OneWireSlaveResult<T> = Result<T, OneWireSlaveError>;
