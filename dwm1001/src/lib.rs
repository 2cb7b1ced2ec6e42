//! DWM1001 binding for `dw1000-port`
//!
//! Implements the hardware traits of [`dw1000_port`] for the [DWM1001
//! Module], which wires a Decawave [DW1000 Radio IC] to a Nordic [nRF52832]:
//!
//! - SPI: SPIM2 on P0.16 (SCK), P0.20 (MOSI), P0.18 (MISO), P0.17 (CS)
//! - RSTn: P0.24, see [`DW_RST`]
//! - IRQ: P0.19 through GPIOTE channel 0, see [`DW_IRQ`]
//!
//! The entry point to the API is the [DWM1001] struct. The interrupt handler
//! for `GPIOTE` must call [`handle_dw_irq`].
//!
//! [DWM1001 Module]: https://www.decawave.com/product/dwm1001-module/
//! [DW1000 Radio IC]: https://www.decawave.com/product/dw1000-radio-ic/
//! [nRF52832]: https://www.nordicsemi.com/Products/Low-power-short-range-wireless/nRF52832

#![no_std]
#![deny(missing_docs)]

pub use cortex_m;
#[cfg(feature = "rt")]
pub use cortex_m_rt;
pub use dw1000_port;
pub use embedded_hal;

pub use nrf52832_hal;

/// Exports traits that are usually needed when using this crate
pub mod prelude {
    pub use nrf52832_hal::prelude::*;
}

use dw1000_port::{
    bus::{Prescaler, SpiRate},
    irq::{Edge, EdgeInput, InterruptController, Pull},
    reset::ResetPin,
    Config, EdgeLatch, Port,
};
use embedded_hal::{blocking::spi, digital::v2::InputPin};
use nrf52832_hal::{
    gpio::{
        p0::{self, P0_16, P0_17, P0_18, P0_19, P0_20, P0_24},
        Disconnected, Floating, Input, Level, OpenDrain, OpenDrainConfig, Output, PullDown,
        PullUp, PushPull,
    },
    pac::{self as nrf52, CorePeripherals, Interrupt, Peripherals, GPIOTE, NVIC, SPIM2},
    spim, Spim,
};


/// The port to the DW1000, as wired on the DWM1001
pub type DwPort<'l> = Port<'l, DwSpim, P0_17<Output<PushPull>>, DW_RST, Nvic, DW_IRQ>;


/// Handle a `GPIOTE` interrupt
///
/// Call this from the `GPIOTE` interrupt handler, with the latch that was
/// passed to [`Dw1000Parts::into_port`]. Returns whether the edge was
/// recorded.
pub fn handle_dw_irq(latch: &EdgeLatch) -> bool {
    let recorded = latch.on_edge(&mut Nvic::masking_only(), Interrupt::GPIOTE);

    // Safe, as EVENTS_IN[0] is a register of its own and writing zero to it
    // only clears the event.
    unsafe { (*GPIOTE::ptr()).events_in[0].write(|w| w.bits(0)) };

    recorded
}


/// Configuration of SPIM2, not including pins and frequency
pub struct SpimConfig {
    /// SPIM Mode
    pub mode: spim::Mode,

    /// SPIM Overread Character
    pub orc: u8,
}

impl Default for SpimConfig {
    fn default() -> Self {
        SpimConfig {
            mode: spim::MODE_0,
            orc: 0,
        }
    }
}


/// SPIM2, with a clock derived from a role's SPI prescalers
///
/// The nRF52 SPIM has no prescaler. Each [`Prescaler`] is applied to the
/// peripheral clock of the role's clock tree, and the SPIM is set to the
/// fastest frequency that doesn't exceed the result. Below 125 kHz, the SPIM
/// runs at 125 kHz.
///
/// For [`Role::Initiator`] both rates come out below 125 kHz, so bring-up and
/// operational rate are the same 125 kHz.
///
/// [`Role::Initiator`]: dw1000_port::Role::Initiator
pub struct DwSpim {
    spim: Spim<SPIM2>,
    pclk_hz: u32,
}

impl DwSpim {
    /// Set up SPIM2 on the DW1000 pins
    pub fn new<SCK, MOSI, MISO>(
        spim: SPIM2,
        sck: P0_16<SCK>,
        mosi: P0_20<MOSI>,
        miso: P0_18<MISO>,
        config: SpimConfig,
        pclk_hz: u32,
    ) -> Self {
        let spim = Spim::new(
            spim,
            spim::Pins {
                sck: sck.into_push_pull_output(Level::Low).degrade(),
                mosi: Some(mosi.into_push_pull_output(Level::Low).degrade()),
                miso: Some(miso.into_floating_input().degrade()),
            },
            spim::Frequency::K125,
            config.mode,
            config.orc,
        );

        DwSpim { spim, pclk_hz }
    }

    /// Release SPIM2
    pub fn free(self) -> Spim<SPIM2> {
        self.spim
    }
}

impl SpiRate for DwSpim {
    fn set_prescaler(&mut self, prescaler: Prescaler) {
        let frequency = frequency_below(self.pclk_hz / prescaler.divisor());

        // Safe, as we own SPIM2 and no transaction is in progress while we
        // hold `&mut self`.
        unsafe { (*SPIM2::ptr()).frequency.write(|w| w.frequency().variant(frequency)) };

        log::debug!("SPIM2 frequency {:?}", frequency);
    }
}

impl spi::Transfer<u8> for DwSpim {
    type Error = spim::Error;

    fn transfer<'w>(&mut self, words: &'w mut [u8]) -> Result<&'w [u8], Self::Error> {
        spi::Transfer::transfer(&mut self.spim, words)
    }
}

impl spi::Write<u8> for DwSpim {
    type Error = spim::Error;

    fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
        spi::Write::write(&mut self.spim, words)
    }
}

fn frequency_below(hz: u32) -> spim::Frequency {
    const FREQUENCIES: [(u32, spim::Frequency); 6] = [
        (8_000_000, spim::Frequency::M8),
        (4_000_000, spim::Frequency::M4),
        (2_000_000, spim::Frequency::M2),
        (1_000_000, spim::Frequency::M1),
        (500_000, spim::Frequency::K500),
        (250_000, spim::Frequency::K250),
    ];

    FREQUENCIES
        .iter()
        .find(|(max, _)| *max <= hz)
        .map(|(_, frequency)| *frequency)
        .unwrap_or(spim::Frequency::K125)
}


/// The NVIC, as seen by the transceiver interrupt line
///
/// Priorities are given with 16 levels and mapped to the 8 levels the nRF52
/// implements.
pub struct Nvic(Option<NVIC>);

impl Nvic {
    /// Take over the NVIC
    pub fn new(nvic: NVIC) -> Self {
        Nvic(Some(nvic))
    }

    // Masking, unmasking and pending don't need the NVIC instance. Setting a
    // priority does and does nothing without it.
    fn masking_only() -> Self {
        Nvic(None)
    }
}

impl InterruptController for Nvic {
    type Line = Interrupt;

    fn mask(&mut self, line: Interrupt) {
        NVIC::mask(line);
    }

    fn unmask(&mut self, line: Interrupt) {
        // Safe, as `IrqLine` only unmasks the line once its handler can run.
        unsafe { NVIC::unmask(line) };
    }

    fn unpend(&mut self, line: Interrupt) {
        NVIC::unpend(line);
    }

    fn is_enabled(&self, line: Interrupt) -> bool {
        NVIC::is_enabled(line)
    }

    fn set_priority(&mut self, line: Interrupt, priority: u8) {
        if let Some(nvic) = &mut self.0 {
            // The nRF52 implements the upper 3 priority bits.
            let hw_priority = (priority.min(15) >> 1) << 5;

            // Safe, as the line is masked while its priority changes.
            unsafe { nvic.set_priority(line, hw_priority) };
        }
    }
}


/// An error that can occur when using DW_RST
#[derive(Debug, Eq, PartialEq)]
pub enum RstError {
    /// The pin was lost in a conversion that didn't complete
    Unavailable,
}

enum RstMode {
    Released(P0_24<Input<Floating>>),
    Driven(P0_24<Output<OpenDrain>>),
}

/// The DW_RST pin (P0.24 on the nRF52)
///
/// Switches between a floating input and an open-drain output driving low.
/// It is never driven high.
#[allow(non_camel_case_types)]
pub struct DW_RST(Option<RstMode>);

impl DW_RST {
    /// Create a new instance of the DW_RST pin
    pub fn new<Mode>(p0_24: p0::P0_24<Mode>) -> Self {
        DW_RST(Some(RstMode::Released(p0_24.into_floating_input())))
    }
}

impl ResetPin for DW_RST {
    type Error = RstError;

    fn drive_low(&mut self) -> Result<(), RstError> {
        // The HAL encodes the pin mode in the type, so the pin has to be
        // taken out to convert it.
        let pin = match self.0.take() {
            // According the the DW1000 datasheet (section 5.6.3.1), the reset
            // pin should be pulled low using open-drain, and must never be
            // pulled high.
            Some(RstMode::Released(pin)) => {
                pin.into_open_drain_output(OpenDrainConfig::Standard0Disconnect1, Level::Low)
            }
            Some(RstMode::Driven(pin)) => pin,
            None => return Err(RstError::Unavailable),
        };

        self.0 = Some(RstMode::Driven(pin));
        Ok(())
    }

    fn release(&mut self) -> Result<(), RstError> {
        let pin = match self.0.take() {
            Some(RstMode::Released(pin)) => pin,
            Some(RstMode::Driven(pin)) => pin.into_floating_input(),
            None => return Err(RstError::Unavailable),
        };

        self.0 = Some(RstMode::Released(pin));
        Ok(())
    }

    fn is_high(&mut self) -> Result<bool, RstError> {
        match &self.0 {
            Some(RstMode::Released(pin)) => pin.is_high().map_err(|error| match error {}),
            Some(RstMode::Driven(_)) => Ok(false),
            None => Err(RstError::Unavailable),
        }
    }
}


enum IrqPin {
    Floating(P0_19<Input<Floating>>),
    PullDown(P0_19<Input<PullDown>>),
    PullUp(P0_19<Input<PullUp>>),
}

impl IrqPin {
    fn with_pull(self, pull: Pull) -> Self {
        let pin = match self {
            IrqPin::Floating(pin) => pin,
            IrqPin::PullDown(pin) => pin.into_floating_input(),
            IrqPin::PullUp(pin) => pin.into_floating_input(),
        };

        match pull {
            Pull::None => IrqPin::Floating(pin),
            Pull::Down => IrqPin::PullDown(pin.into_pulldown_input()),
            Pull::Up => IrqPin::PullUp(pin.into_pullup_input()),
        }
    }
}

/// The DW_IRQ pin (P0.19 on the nRF52), with GPIOTE channel 0
#[allow(non_camel_case_types)]
pub struct DW_IRQ {
    pin: Option<IrqPin>,
    gpiote: GPIOTE,
}

impl DW_IRQ {
    /// Create a new instance of the DW1000 interrupt pin
    ///
    /// Takes GPIOTE, as channel 0 and its interrupt belong to the pin.
    pub fn new<Mode>(p0_19: p0::P0_19<Mode>, gpiote: GPIOTE) -> Self {
        DW_IRQ {
            pin: Some(IrqPin::Floating(p0_19.into_floating_input())),
            gpiote,
        }
    }
}

impl EdgeInput for DW_IRQ {
    fn listen(&mut self, edge: Edge, pull: Pull) {
        self.pin = self.pin.take().map(|pin| pin.with_pull(pull));

        self.gpiote.config[0].write(|w| {
            let w = w.mode().event();
            let w = match edge {
                Edge::Rising => w.polarity().lo_to_hi(),
                Edge::Falling => w.polarity().hi_to_lo(),
            };

            unsafe { w.psel().bits(19) }
        });
        self.gpiote.intenset.modify(|_, w| w.in0().set());
    }

    fn unlisten(&mut self) {
        self.gpiote.intenclr.modify(|_, w| w.in0().clear());
        self.gpiote.config[0].write(|w| w.mode().disabled());
    }

    fn clear_event(&mut self) {
        self.gpiote.events_in[0].write(|w| unsafe { w.bits(0) });
    }
}


/// Everything the DW1000 is connected to
#[allow(non_snake_case)]
pub struct Dw1000Parts {
    /// SPIM2
    pub SPIM2: SPIM2,

    /// SPI clock, P0.16
    pub sck: P0_16<Disconnected>,

    /// SPI MOSI, P0.20
    pub mosi: P0_20<Disconnected>,

    /// SPI MISO, P0.18
    pub miso: P0_18<Disconnected>,

    /// SPI chip select, P0.17
    pub cs: P0_17<Disconnected>,

    /// The DW_RST pin
    pub DW_RST: DW_RST,

    /// The DW_IRQ pin
    pub DW_IRQ: DW_IRQ,
}

impl Dw1000Parts {
    /// Assemble the transceiver port
    ///
    /// The SPI rates come from the clock tree of the configured role.
    pub fn into_port<'l>(self, nvic: Nvic, config: Config, latch: &'l EdgeLatch) -> DwPort<'l> {
        let pclk_hz = config.role.clock_tree().pclk2_hz();

        let spim = DwSpim::new(
            self.SPIM2,
            self.sck,
            self.mosi,
            self.miso,
            SpimConfig::default(),
            pclk_hz,
        );

        Port::new(
            config,
            spim,
            self.cs.into_push_pull_output(Level::High),
            self.DW_RST,
            nvic,
            Interrupt::GPIOTE,
            self.DW_IRQ,
            latch,
        )
    }
}


/// Provides access to the DW1000 side of the DWM1001
///
/// You can get an instance of this struct by using [`DWM1001::take`] or
/// [`DWM1001::steal`].
#[allow(non_snake_case)]
pub struct DWM1001 {
    /// The DW1000 and the pins it's connected to
    pub DW1000: Dw1000Parts,

    /// nRF52 core peripheral: Nested Vector Interrupt Controller
    pub NVIC: Nvic,

    /// nRF52 core peripheral: SysTick Timer
    pub SYST: nrf52::SYST,

    /// nRF52 peripheral: TIMER0
    pub TIMER0: nrf52::TIMER0,
}

impl DWM1001 {
    /// Take ownership of a `DWM1001` instance safely
    ///
    /// This method will return an instance of `DWM1001` the first time it is
    /// called. It will return only `None` on subsequent calls.
    pub fn take() -> Option<Self> {
        Some(Self::new(CorePeripherals::take()?, Peripherals::take()?))
    }

    /// Take ownership of a `DWM1001` instance, circumventing safety guarantees
    ///
    /// # Safety
    ///
    /// This method can be used to create multiple instances of `DWM1001`. Those
    /// instances can interfere with each other, causing all kinds of unexpected
    /// behavior and circumventing safety guarantees in many ways.
    ///
    /// Always use `DWM1001::take`, unless you really know what you're doing.
    pub unsafe fn steal() -> Self {
        Self::new(CorePeripherals::steal(), Peripherals::steal())
    }

    fn new(cp: CorePeripherals, p: Peripherals) -> Self {
        let pins = p0::Parts::new(p.P0);

        DWM1001 {
            DW1000: Dw1000Parts {
                SPIM2: p.SPIM2,
                sck: pins.p0_16,
                mosi: pins.p0_20,
                miso: pins.p0_18,
                cs: pins.p0_17,
                DW_RST: DW_RST::new(pins.p0_24),
                DW_IRQ: DW_IRQ::new(pins.p0_19, p.GPIOTE),
            },

            NVIC: Nvic::new(cp.NVIC),
            SYST: cp.SYST,

            TIMER0: p.TIMER0,
        }
    }
}
