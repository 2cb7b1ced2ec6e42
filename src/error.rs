//! Error taxonomy shared by all components
//!
//! Collaborator failures (SPI, GPIO) keep their own error types in the
//! modules that talk to those collaborators. This module holds the errors
//! that are about sequencing: a call made at the wrong time, a chip that
//! didn't come up, or a configuration that can't change anymore.
//!
//! Nothing in this crate retries on its own. Every one of these is returned
//! to the caller, who decides whether to reset again or give up.

use crate::clocks::{Oscillator, SysclkSource};


/// An operation was called while its precondition didn't hold
///
/// The call had no effect. The caller can retry once the precondition holds.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Violation {
    /// The reset pin is driven low, or a reset didn't complete
    ResetPinDriven,

    /// An edge was recorded and hasn't been serviced yet
    ///
    /// Re-arming would drop the recorded edge.
    EdgeNotServiced,
}


/// The hardware didn't reach an expected state in time
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NotReady {
    /// The transceiver didn't release its RSTn line after reset
    ResetLineLow,

    /// The transceiver answered, but not with a DW1000 device id
    DeviceId {
        /// The value read from `DEV_ID`
        found: u32,
    },

    /// An oscillator didn't report ready
    Oscillator(Oscillator),

    /// The system clock didn't switch to the requested source
    SysclkSwitch(SysclkSource),
}


/// The instance role was already selected and can't be changed
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ConfigurationFixed;


/// Returned by bounded polling when the operation didn't complete
#[derive(Debug, Eq, PartialEq)]
pub enum TimeoutError<T> {
    /// The timer ran out
    Timeout,

    /// The operation failed
    Other(T),
}
