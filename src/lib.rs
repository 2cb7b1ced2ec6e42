//! Host-side bring-up for the DW1000 UWB transceiver
//!
//! This crate owns the parts of a DW1000 platform layer that have ordering
//! requirements: driving the chip through reset, keeping the host interrupt
//! line masked while that happens, waiting for the chip to come up, and
//! switching the SPI bus from its slow bring-up rate to the fast operational
//! rate once the chip is ready.
//!
//! Everything that actually touches a register goes through a small trait
//! ([`bus::SpiRate`], [`reset::ResetPin`], [`irq::EdgeInput`],
//! [`irq::InterruptController`], [`clocks::ClockControl`]) plus the usual
//! [`embedded-hal`] traits, so the crate itself is hardware independent. The
//! `dwm1001` board crate implements those traits for the nRF52832.
//!
//! The entry point to the API is the [`Port`] struct.
//!
//! [`embedded-hal`]: https://crates.io/crates/embedded-hal

#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]
#![deny(warnings)]

pub use embedded_hal;
pub use nb;

#[macro_use]
mod macros;

pub mod bus;
pub mod clocks;
pub mod error;
pub mod irq;
pub mod port;
pub mod reset;
pub mod role;

pub use crate::{
    bus::{Bus, BusRate, Prescaler, RateProfile},
    error::{ConfigurationFixed, NotReady, TimeoutError, Violation},
    irq::{EdgeLatch, IrqLine, LineState},
    port::{Config, Port},
    reset::{ResetPinState, ResetSequencer},
    role::{Role, RoleSelector},
};
