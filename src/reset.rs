//! Transceiver reset
//!
//! The DW1000's RSTn pin is pulled low by the host to reset the chip, and
//! must never be driven high: once released, the chip drives it high on its
//! own as soon as its oscillator is running. So a reset is a pulse followed
//! by switching the pin back to a floating input, and the pin level can then
//! be used to tell when the chip is ready.

use embedded_hal::{
    blocking::delay::DelayMs,
    digital::v2::{InputPin, OutputPin},
    timer::CountDown,
};

use crate::{
    error::{NotReady, TimeoutError, Violation},
    irq::{EdgeInput, InterruptController, IrqLine},
};


/// Shortest reset pulse the transceiver is guaranteed to see
///
/// The data sheet asks for only tens of nanoseconds on RSTn, but the power-on
/// timing table asks for the digital supply to be up for 1.5-2 ms, which
/// matches what vendor code does.
pub const MIN_RESET_PULSE_MS: u32 = 2;

/// Default time to wait after releasing RSTn
pub const DEFAULT_SETTLE_MS: u32 = 2;


/// The reset pin, as provided by the board
pub trait ResetPin {
    /// Error reported by the GPIO driver
    type Error;

    /// Configure the pin as an output and drive it low
    fn drive_low(&mut self) -> Result<(), Self::Error>;

    /// Configure the pin as a floating input
    fn release(&mut self) -> Result<(), Self::Error>;

    /// Whether the pin reads high
    fn is_high(&mut self) -> Result<bool, Self::Error>;
}

/// A [`ResetPin`] on top of an open-drain output
///
/// For a pin in open-drain mode, writing high disconnects the driver, which
/// is electrically the same as a floating input.
pub struct OpenDrain<P>(pub P);

impl<P, E> ResetPin for OpenDrain<P>
where
    P: OutputPin<Error = E> + InputPin<Error = E>,
{
    type Error = E;

    fn drive_low(&mut self) -> Result<(), E> {
        self.0.set_low()
    }

    fn release(&mut self) -> Result<(), E> {
        self.0.set_high()
    }

    fn is_high(&mut self) -> Result<bool, E> {
        self.0.is_high()
    }
}


/// The state of the reset pin
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ResetPinState {
    /// Floating input; the transceiver controls the line
    TriStatedInput,

    /// Driven low by the host, or in the middle of a reset
    DrivenLow,
}


/// An error that can occur while resetting the transceiver
#[derive(Debug, Eq, PartialEq)]
pub enum Error<E> {
    /// The GPIO driver failed
    Pin(E),

    /// The operation isn't valid right now
    PreconditionViolation(Violation),

    /// The transceiver didn't come up
    HardwareNotReady(NotReady),
}


/// Drives the transceiver through reset
pub struct ResetSequencer<RST> {
    pin: RST,
    state: ResetPinState,
    pulse_ms: u32,
    settle_ms: u32,
}

impl<RST> ResetSequencer<RST>
where
    RST: ResetPin,
{
    /// Take over the reset pin
    ///
    /// The pin is assumed to be a floating input already, which is the state
    /// it comes out of MCU reset in. `pulse_ms` is raised to
    /// [`MIN_RESET_PULSE_MS`] if it is shorter.
    pub fn new(pin: RST, pulse_ms: u32, settle_ms: u32) -> Self {
        ResetSequencer {
            pin,
            state: ResetPinState::TriStatedInput,
            pulse_ms: pulse_ms.max(MIN_RESET_PULSE_MS),
            settle_ms,
        }
    }

    /// The current state of the reset pin
    pub fn state(&self) -> ResetPinState {
        self.state
    }

    /// The length of the reset pulse
    pub fn pulse_ms(&self) -> u32 {
        self.pulse_ms
    }

    /// Reset the transceiver
    ///
    /// Disarms `irq` before the pin is touched and leaves it disarmed; arm it
    /// again once the chip is known to be ready. Blocks for the pulse and
    /// settle time.
    ///
    /// If the GPIO driver fails, the pin state stays
    /// [`ResetPinState::DrivenLow`] and the interrupt line can't be armed
    /// until a later reset succeeds.
    pub fn reset<C, P, D>(
        &mut self,
        irq: &mut IrqLine<'_, C, P>,
        delay: &mut D,
    ) -> Result<(), Error<RST::Error>>
    where
        C: InterruptController,
        P: EdgeInput,
        D: DelayMs<u32>,
    {
        irq.disarm();

        self.state = ResetPinState::DrivenLow;
        self.pin.drive_low().map_err(Error::Pin)?;

        delay.delay_ms(self.pulse_ms);

        self.pin.release().map_err(Error::Pin)?;
        self.state = ResetPinState::TriStatedInput;

        delay.delay_ms(self.settle_ms);

        log::debug!("transceiver reset, pulse {} ms", self.pulse_ms);

        Ok(())
    }

    /// Whether the transceiver has released RSTn
    ///
    /// Returns `WouldBlock` while the line is still low.
    pub fn poll_ready(&mut self) -> nb::Result<(), Error<RST::Error>> {
        if self.state != ResetPinState::TriStatedInput {
            return Err(nb::Error::Other(Error::PreconditionViolation(
                Violation::ResetPinDriven,
            )));
        }

        match self.pin.is_high() {
            Ok(true) => Ok(()),
            Ok(false) => Err(nb::Error::WouldBlock),
            Err(error) => Err(nb::Error::Other(Error::Pin(error))),
        }
    }

    /// Wait until the transceiver has released RSTn
    ///
    /// `timer` is started with `timeout`. Returns
    /// [`NotReady::ResetLineLow`] if the line is still low when it runs out.
    pub fn wait_until_ready<T>(
        &mut self,
        timer: &mut T,
        timeout: T::Time,
    ) -> Result<(), Error<RST::Error>>
    where
        T: CountDown,
    {
        timer.start(timeout);

        match block_timeout!(timer, self.poll_ready()) {
            Ok(()) => Ok(()),
            Err(TimeoutError::Other(error)) => Err(error),
            Err(TimeoutError::Timeout) => {
                log::warn!("transceiver still holds RSTn low");
                Err(Error::HardwareNotReady(NotReady::ResetLineLow))
            }
        }
    }

    /// Release the reset pin
    pub fn free(self) -> RST {
        self.pin
    }
}
