//! The transceiver port
//!
//! [`Port`] puts the bus, the reset sequencer and the interrupt line together
//! and is the only thing the rest of the firmware should use to reset the
//! transceiver, arm its interrupt or change the bus rate.

use core::fmt;

use embedded_hal::{
    blocking::{delay::DelayMs, spi},
    digital::v2::OutputPin,
    timer::CountDown,
};

use crate::{
    bus::{self, Bus, BusRate, SpiRate},
    error::{NotReady, Violation},
    irq::{EdgeInput, EdgeLatch, InterruptController, IrqLine, LineState, LOWEST_PRIORITY},
    reset::{self, ResetPin, ResetPinState, ResetSequencer, DEFAULT_SETTLE_MS, MIN_RESET_PULSE_MS},
    role::Role,
};


/// Port configuration
///
/// Fixed for the lifetime of a [`Port`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Config {
    /// The role of this board
    pub role: Role,

    /// How long RSTn is held low, at least [`MIN_RESET_PULSE_MS`]
    pub reset_pulse_ms: u32,

    /// How long to wait after releasing RSTn
    pub reset_settle_ms: u32,

    /// Priority of the transceiver interrupt line
    pub irq_priority: u8,
}

impl Config {
    /// The default configuration for a role
    pub fn new(role: Role) -> Self {
        Config {
            role,
            reset_pulse_ms: MIN_RESET_PULSE_MS,
            reset_settle_ms: DEFAULT_SETTLE_MS,
            irq_priority: LOWEST_PRIORITY,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new(Role::default())
    }
}


/// Host side of the transceiver connection
pub struct Port<'l, SPI, CS, RST, C, P>
where
    C: InterruptController,
{
    config: Config,
    bus: Bus<SPI, CS>,
    reset: ResetSequencer<RST>,
    irq: IrqLine<'l, C, P>,
}

impl<'l, SPI, CS, RST, C, P> Port<'l, SPI, CS, RST, C, P>
where
    SPI: SpiRate,
    RST: ResetPin,
    C: InterruptController,
    P: EdgeInput,
{
    /// Create the port
    ///
    /// Takes over the bus (at the role's bring-up rate), the reset pin and
    /// the interrupt line, which is disarmed. The transceiver itself is not
    /// touched; call [`Port::bring_up`] or [`Port::reset_transceiver`] next.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        spi: SPI,
        chip_select: CS,
        reset_pin: RST,
        controller: C,
        line: C::Line,
        edge_input: P,
        latch: &'l EdgeLatch,
    ) -> Self {
        let profile = config.role.clock_tree().spi;

        Port {
            config,
            bus: Bus::new(spi, chip_select, profile),
            reset: ResetSequencer::new(reset_pin, config.reset_pulse_ms, config.reset_settle_ms),
            irq: IrqLine::new(controller, line, edge_input, latch, config.irq_priority),
        }
    }

    /// The role of this board
    pub fn role(&self) -> Role {
        self.config.role
    }

    /// The configuration of this port
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Reset the transceiver
    ///
    /// The interrupt line is disarmed for the whole sequence and stays
    /// disarmed afterwards.
    pub fn reset_transceiver<D>(&mut self, delay: &mut D) -> Result<(), reset::Error<RST::Error>>
    where
        D: DelayMs<u32>,
    {
        self.reset.reset(&mut self.irq, delay)
    }

    /// Wait until the transceiver has come out of reset
    pub fn wait_until_ready<T>(
        &mut self,
        timer: &mut T,
        timeout: T::Time,
    ) -> Result<(), reset::Error<RST::Error>>
    where
        T: CountDown,
    {
        self.reset.wait_until_ready(timer, timeout)
    }

    /// The state of the reset pin
    pub fn reset_pin_state(&self) -> ResetPinState {
        self.reset.state()
    }

    /// Arm the interrupt line
    pub fn arm(&mut self) -> Result<(), Violation> {
        self.irq.arm(self.reset.state())
    }

    /// Disarm the interrupt line
    pub fn disarm(&mut self) {
        self.irq.disarm()
    }

    /// Whether the interrupt line is unmasked
    pub fn is_armed(&self) -> bool {
        self.irq.is_armed()
    }

    /// The state of the interrupt line
    pub fn irq_state(&self) -> LineState {
        self.irq.state()
    }

    /// Mark a pending interrupt as serviced
    pub fn service_irq(&mut self) -> bool {
        self.irq.service()
    }

    /// Handle an edge from foreground code
    ///
    /// See [`IrqLine::on_edge`].
    pub fn on_edge(&mut self) -> bool {
        self.irq.on_edge()
    }

    /// Switch the bus to the bring-up rate
    pub fn set_bring_up_rate(&mut self) {
        self.bus.set_bring_up_rate()
    }

    /// Switch the bus to the operational rate
    pub fn set_operational_rate(&mut self) {
        self.bus.set_operational_rate()
    }

    /// The current bus rate
    pub fn bus_rate(&self) -> BusRate {
        self.bus.rate()
    }

    /// The bus, for transactions with the transceiver
    pub fn bus(&mut self) -> &mut Bus<SPI, CS> {
        &mut self.bus
    }

    /// Release all peripherals
    ///
    /// The interrupt line is disarmed first.
    pub fn free(self) -> (SPI, CS, RST, C, P) {
        let (spi, chip_select) = self.bus.free();
        let reset_pin = self.reset.free();
        let (controller, edge_input) = self.irq.free();

        (spi, chip_select, reset_pin, controller, edge_input)
    }
}

impl<'l, SPI, CS, RST, C, P> Port<'l, SPI, CS, RST, C, P>
where
    SPI: SpiRate + spi::Transfer<u8> + spi::Write<u8>,
    CS: OutputPin,
    RST: ResetPin,
    C: InterruptController,
    P: EdgeInput,
{
    /// Bring the transceiver up from any state
    ///
    /// 1. Switch the bus to the bring-up rate
    /// 2. Reset the transceiver
    /// 3. Wait for it to release RSTn
    /// 4. Check that it answers with a DW1000 device id
    /// 5. Switch the bus to the operational rate
    /// 6. Arm the interrupt line
    ///
    /// Stops at the first failure. Nothing is retried; the bus stays at the
    /// bring-up rate and the interrupt line stays disarmed unless every step
    /// before succeeded.
    pub fn bring_up<D, T>(
        &mut self,
        delay: &mut D,
        timer: &mut T,
        timeout: T::Time,
    ) -> Result<u32, Error<SPI, CS, RST>>
    where
        D: DelayMs<u32>,
        T: CountDown,
    {
        self.set_bring_up_rate();
        self.reset_transceiver(delay)?;
        self.wait_until_ready(timer, timeout)?;

        let dev_id = self.bus.read_device_id()?;
        if !bus::is_dw1000(dev_id) {
            log::warn!("unexpected device id {:#010x}", dev_id);
            return Err(Error::HardwareNotReady(NotReady::DeviceId { found: dev_id }));
        }

        self.set_operational_rate();
        self.arm()?;

        log::info!("transceiver up, device id {:#010x}", dev_id);

        Ok(dev_id)
    }
}


/// An error that can occur while bringing up the transceiver
pub enum Error<SPI, CS, RST>
where
    SPI: spi::Transfer<u8> + spi::Write<u8>,
    CS: OutputPin,
    RST: ResetPin,
{
    /// Error occured while using the SPI bus
    Spi(bus::Error<SPI, CS>),

    /// Error occured while using the reset pin
    ResetPin(RST::Error),

    /// An operation was called while its precondition didn't hold
    PreconditionViolation(Violation),

    /// The transceiver didn't come up
    HardwareNotReady(NotReady),
}

impl<SPI, CS, RST> From<bus::Error<SPI, CS>> for Error<SPI, CS, RST>
where
    SPI: spi::Transfer<u8> + spi::Write<u8>,
    CS: OutputPin,
    RST: ResetPin,
{
    fn from(error: bus::Error<SPI, CS>) -> Self {
        Error::Spi(error)
    }
}

impl<SPI, CS, RST> From<reset::Error<RST::Error>> for Error<SPI, CS, RST>
where
    SPI: spi::Transfer<u8> + spi::Write<u8>,
    CS: OutputPin,
    RST: ResetPin,
{
    fn from(error: reset::Error<RST::Error>) -> Self {
        match error {
            reset::Error::Pin(error) => Error::ResetPin(error),
            reset::Error::PreconditionViolation(violation) => {
                Error::PreconditionViolation(violation)
            }
            reset::Error::HardwareNotReady(not_ready) => Error::HardwareNotReady(not_ready),
        }
    }
}

impl<SPI, CS, RST> From<Violation> for Error<SPI, CS, RST>
where
    SPI: spi::Transfer<u8> + spi::Write<u8>,
    CS: OutputPin,
    RST: ResetPin,
{
    fn from(violation: Violation) -> Self {
        Error::PreconditionViolation(violation)
    }
}

// We can't derive this implementation, as `Debug` is only implemented
// conditionally for `bus::Error`.
impl<SPI, CS, RST> fmt::Debug for Error<SPI, CS, RST>
where
    SPI: spi::Transfer<u8> + spi::Write<u8>,
    <SPI as spi::Transfer<u8>>::Error: fmt::Debug,
    <SPI as spi::Write<u8>>::Error: fmt::Debug,
    CS: OutputPin,
    <CS as OutputPin>::Error: fmt::Debug,
    RST: ResetPin,
    RST::Error: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Spi(error) => write!(f, "Spi({:?})", error),
            Error::ResetPin(error) => write!(f, "ResetPin({:?})", error),
            Error::PreconditionViolation(violation) => {
                write!(f, "PreconditionViolation({:?})", violation)
            }
            Error::HardwareNotReady(not_ready) => write!(f, "HardwareNotReady({:?})", not_ready),
        }
    }
}
