//! Static clock tree tables and clock bring-up
//!
//! Each [`Role`] has one [`ClockTree`]: which oscillators run, how the PLL is
//! set up, which source feeds the system clock, the bus dividers, and the SPI
//! [`RateProfile`] used by the bus. The actual register writes belong to the
//! board through [`ClockControl`]; [`configure`] only orders the steps and
//! bounds every wait for a ready flag.
//!
//! [`Role`]: crate::Role

use core::convert::Infallible;

use embedded_hal::timer::CountDown;

use crate::{
    bus::{Prescaler, RateProfile},
    error::NotReady,
};


/// Frequency of the internal high-speed oscillator
pub const HSI_HZ: u32 = 16_000_000;


/// A clock source that has to be enabled and reports when it's stable
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Oscillator {
    /// Internal low-speed oscillator
    Lsi,
    /// Internal high-speed oscillator
    Hsi,
    /// Multi-speed internal oscillator
    Msi,
    /// Phase-locked loop, fed from HSI
    Pll,
}

/// The source of the system clock
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SysclkSource {
    /// Multi-speed internal oscillator
    Msi,
    /// Internal high-speed oscillator
    Hsi,
    /// Phase-locked loop
    Pll,
}

/// MSI frequency range
///
/// Range `n` runs at 65.536 kHz × 2ⁿ.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MsiRange {
    /// 65.536 kHz
    Range0 = 0,
    /// 131.072 kHz
    Range1 = 1,
    /// 262.144 kHz
    Range2 = 2,
    /// 524.288 kHz
    Range3 = 3,
    /// 1.048 MHz
    Range4 = 4,
    /// 2.097 MHz, the range the MSI comes out of reset with
    Range5 = 5,
    /// 4.194 MHz
    Range6 = 6,
}

impl MsiRange {
    /// The oscillator frequency in this range
    pub fn hz(self) -> u32 {
        65_536 << self as u32
    }
}

impl Default for MsiRange {
    fn default() -> Self {
        MsiRange::Range5
    }
}

/// PLL setup, HSI as input
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Pll {
    /// Input multiplier
    pub multiplier: u8,
    /// Output divider, must not be zero
    pub divider: u8,
}

impl Pll {
    /// The PLL output frequency
    pub fn hz(&self) -> u32 {
        HSI_HZ / self.divider as u32 * self.multiplier as u32
    }
}


/// The clock setup for one role
///
/// All dividers must be non-zero; the frequency accessors and [`configure`]
/// divide by them.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ClockTree {
    /// Whether the low-speed oscillator runs
    pub lsi: bool,
    /// MSI range, if the MSI is reconfigured
    pub msi: Option<MsiRange>,
    /// PLL setup
    pub pll: Pll,
    /// System clock source
    pub sysclk: SysclkSource,
    /// AHB prescaler (HCLK = SYSCLK / ahb_divider)
    pub ahb_divider: u16,
    /// APB1 prescaler (PCLK1 = HCLK / apb1_divider)
    pub apb1_divider: u8,
    /// APB2 prescaler (PCLK2 = HCLK / apb2_divider); the transceiver SPI
    /// hangs off APB2
    pub apb2_divider: u8,
    /// Flash wait states
    pub flash_latency: u8,
    /// SPI prescalers for bring-up and operation
    pub spi: RateProfile,
}

impl ClockTree {
    /// System clock frequency
    pub fn sysclk_hz(&self) -> u32 {
        match self.sysclk {
            SysclkSource::Msi => self.msi.unwrap_or_default().hz(),
            SysclkSource::Hsi => HSI_HZ,
            SysclkSource::Pll => self.pll.hz(),
        }
    }

    /// AHB clock frequency
    pub fn hclk_hz(&self) -> u32 {
        self.sysclk_hz() / self.ahb_divider as u32
    }

    /// APB1 clock frequency
    pub fn pclk1_hz(&self) -> u32 {
        self.hclk_hz() / self.apb1_divider as u32
    }

    /// APB2 clock frequency
    pub fn pclk2_hz(&self) -> u32 {
        self.hclk_hz() / self.apb2_divider as u32
    }

    /// SPI clock frequency for a given prescaler
    pub fn spi_hz(&self, prescaler: Prescaler) -> u32 {
        self.pclk2_hz() / prescaler.divisor()
    }

    /// The frequencies this tree produces
    pub fn clocks(&self) -> Clocks {
        Clocks {
            sysclk_hz: self.sysclk_hz(),
            hclk_hz: self.hclk_hz(),
            pclk1_hz: self.pclk1_hz(),
            pclk2_hz: self.pclk2_hz(),
        }
    }

    fn oscillators(&self) -> impl Iterator<Item = Oscillator> {
        let wanted = [
            (self.lsi, Oscillator::Lsi),
            (true, Oscillator::Hsi),
            (self.msi.is_some(), Oscillator::Msi),
        ];

        IntoIterator::into_iter(wanted)
            .filter(|(enabled, _)| *enabled)
            .map(|(_, oscillator)| oscillator)
    }
}


/// Clock tree of an initiator
///
/// Runs the core from the MSI at 262 kHz to save power, keeping HSI and the
/// PLL running. With PCLK2 at 262 kHz both SPI rates are far below the
/// transceiver limits (65 kHz and 131 kHz). A board whose SPI can't go that
/// slow may end up running both rates at the same frequency.
pub static INITIATOR_CLOCKS: ClockTree = ClockTree {
    lsi: true,
    msi: Some(MsiRange::Range2),
    pll: Pll {
        multiplier: 8,
        divider: 4,
    },
    sysclk: SysclkSource::Msi,
    ahb_divider: 1,
    apb1_divider: 1,
    apb2_divider: 1,
    flash_latency: 1,
    spi: RateProfile {
        bring_up: Prescaler::Div4,
        operational: Prescaler::Div2,
    },
};

/// Clock tree of a responder
///
/// Runs the core from the PLL at 32 MHz.
pub static RESPONDER_CLOCKS: ClockTree = ClockTree {
    lsi: false,
    msi: None,
    pll: Pll {
        multiplier: 8,
        divider: 4,
    },
    sysclk: SysclkSource::Pll,
    ahb_divider: 1,
    apb1_divider: 2,
    apb2_divider: 1,
    flash_latency: 1,
    spi: RateProfile {
        bring_up: Prescaler::Div32,
        operational: Prescaler::Div4,
    },
};


/// Bus frequencies after [`configure`]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Clocks {
    /// System clock
    pub sysclk_hz: u32,
    /// AHB clock
    pub hclk_hz: u32,
    /// APB1 clock
    pub pclk1_hz: u32,
    /// APB2 clock
    pub pclk2_hz: u32,
}


/// Reset and clock control, as provided by the board
pub trait ClockControl {
    /// Turn on an oscillator
    fn enable(&mut self, oscillator: Oscillator);

    /// Whether an oscillator reports stable
    fn is_ready(&mut self, oscillator: Oscillator) -> bool;

    /// Set the MSI frequency range
    fn set_msi_range(&mut self, range: MsiRange);

    /// Set the flash wait states and enable prefetch
    fn set_flash_latency(&mut self, wait_states: u8);

    /// Set the AHB, APB1 and APB2 prescalers
    fn set_dividers(&mut self, ahb: u16, apb1: u8, apb2: u8);

    /// Program the PLL; it must be off
    fn configure_pll(&mut self, pll: Pll);

    /// Request a new system clock source
    fn select_sysclk(&mut self, source: SysclkSource);

    /// The system clock source currently in use
    fn sysclk(&mut self) -> SysclkSource;

    /// Enable the clocks of the SPI, GPIO and SYSCFG peripherals
    fn enable_peripheral_clocks(&mut self);
}


/// Bring up the clock tree
///
/// Every ready flag is polled until `timer` runs out, restarting it with
/// `timeout` for each wait. A flag that never comes up is reported as
/// [`NotReady`] rather than hanging the board; whether that is fatal is up to
/// the caller.
pub fn configure<C, T>(
    tree: &ClockTree,
    rcc: &mut C,
    timer: &mut T,
    timeout: T::Time,
) -> Result<Clocks, NotReady>
where
    C: ClockControl,
    T: CountDown,
    T::Time: Clone,
{
    for oscillator in tree.oscillators() {
        rcc.enable(oscillator);
        wait_ready(rcc, oscillator, timer, timeout.clone())?;
    }
    if let Some(range) = tree.msi {
        rcc.set_msi_range(range);
    }

    rcc.set_flash_latency(tree.flash_latency);
    rcc.set_dividers(tree.ahb_divider, tree.apb1_divider, tree.apb2_divider);

    rcc.configure_pll(tree.pll);
    rcc.enable(Oscillator::Pll);
    wait_ready(rcc, Oscillator::Pll, timer, timeout.clone())?;

    rcc.select_sysclk(tree.sysclk);
    timer.start(timeout);
    let switched: Result<(), _> = block_timeout!(timer, {
        if rcc.sysclk() == tree.sysclk {
            Ok(())
        } else {
            Err(nb::Error::<Infallible>::WouldBlock)
        }
    });
    if switched.is_err() {
        log::warn!("system clock didn't switch to {:?}", tree.sysclk);
        return Err(NotReady::SysclkSwitch(tree.sysclk));
    }

    rcc.enable_peripheral_clocks();

    let clocks = tree.clocks();
    log::info!(
        "clocks up: sysclk {} Hz, pclk1 {} Hz, pclk2 {} Hz",
        clocks.sysclk_hz,
        clocks.pclk1_hz,
        clocks.pclk2_hz,
    );

    Ok(clocks)
}

fn wait_ready<C, T>(
    rcc: &mut C,
    oscillator: Oscillator,
    timer: &mut T,
    timeout: T::Time,
) -> Result<(), NotReady>
where
    C: ClockControl,
    T: CountDown,
{
    timer.start(timeout);
    let ready: Result<(), _> = block_timeout!(timer, {
        if rcc.is_ready(oscillator) {
            Ok(())
        } else {
            Err(nb::Error::<Infallible>::WouldBlock)
        }
    });

    ready.map_err(|_| {
        log::warn!("{:?} not ready", oscillator);
        NotReady::Oscillator(oscillator)
    })
}
