//! SPI bus to the transceiver and its rate control
//!
//! The DW1000 only accepts a slow SPI clock (up to 3 MHz) until its own PLL
//! has locked after reset. After that it runs up to 20 MHz. [`Bus`] keeps
//! track of which of the two rates is in effect and performs register
//! transactions at that rate.
//!
//! Both transactions and rate changes take `&mut Bus`, so the borrow checker
//! already guarantees that a rate change never happens in the middle of a
//! transaction.

use core::fmt;

use embedded_hal::{blocking::spi, digital::v2::OutputPin};


/// Highest SPI clock the transceiver accepts before its PLL has locked
pub const MAX_BRING_UP_HZ: u32 = 3_000_000;

/// Highest SPI clock the transceiver accepts in operation
pub const MAX_OPERATIONAL_HZ: u32 = 20_000_000;

/// Register id of `DEV_ID`
pub const DEV_ID: u8 = 0x00;

/// Upper half of `DEV_ID` on every Decawave part
pub const RIDTAG: u16 = 0xDECA;

/// Model number of the DW1000 in `DEV_ID`
pub const MODEL_DW1000: u8 = 0x01;


/// SPI clock prescaler, dividing the peripheral bus clock
///
/// The discriminant is the value of the three BR bits.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum Prescaler {
    /// fPCLK / 2
    Div2 = 0b000,
    /// fPCLK / 4
    Div4 = 0b001,
    /// fPCLK / 8
    Div8 = 0b010,
    /// fPCLK / 16
    Div16 = 0b011,
    /// fPCLK / 32
    Div32 = 0b100,
    /// fPCLK / 64
    Div64 = 0b101,
    /// fPCLK / 128
    Div128 = 0b110,
    /// fPCLK / 256
    Div256 = 0b111,
}

impl Prescaler {
    /// Mask of the BR field in the SPI control register
    pub const BR_MASK: u16 = 0b111 << 3;

    /// The divisor this prescaler applies
    pub fn divisor(self) -> u32 {
        2 << self as u32
    }

    /// The BR field, positioned in the control register
    pub fn br_bits(self) -> u16 {
        (self as u16) << 3
    }

    /// Replace the BR field of a control register value
    pub fn apply(self, cr1: u16) -> u16 {
        (cr1 & !Self::BR_MASK) | self.br_bits()
    }
}


/// Which of the two SPI rates is in effect
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BusRate {
    /// Slow rate, safe before the transceiver's PLL has locked
    BringUp,

    /// Fast rate for normal operation
    Operational,
}

/// The prescalers used for the two rates
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RateProfile {
    /// Prescaler at [`BusRate::BringUp`]
    pub bring_up: Prescaler,

    /// Prescaler at [`BusRate::Operational`]
    pub operational: Prescaler,
}

impl RateProfile {
    /// The prescaler for a rate
    pub fn prescaler(&self, rate: BusRate) -> Prescaler {
        match rate {
            BusRate::BringUp => self.bring_up,
            BusRate::Operational => self.operational,
        }
    }
}


/// Reprograms the clock prescaler of an SPI peripheral
///
/// Implemented by the board for its SPI peripheral. The write is expected to
/// succeed for every [`Prescaler`]; a peripheral that doesn't support a
/// divisor should pick the nearest slower one.
pub trait SpiRate {
    /// Apply a new prescaler
    fn set_prescaler(&mut self, prescaler: Prescaler);
}


/// The SPI bus to the transceiver
pub struct Bus<SPI, CS> {
    spi: SPI,
    chip_select: CS,
    profile: RateProfile,
    rate: BusRate,
}

impl<SPI, CS> Bus<SPI, CS>
where
    SPI: SpiRate,
{
    /// Take over the SPI peripheral and chip select pin
    ///
    /// The bus starts out at the bring-up rate.
    pub fn new(mut spi: SPI, chip_select: CS, profile: RateProfile) -> Self {
        spi.set_prescaler(profile.bring_up);

        Bus {
            spi,
            chip_select,
            profile,
            rate: BusRate::BringUp,
        }
    }

    /// Switch to the slow bring-up rate
    pub fn set_bring_up_rate(&mut self) {
        self.set_rate(BusRate::BringUp);
    }

    /// Switch to the fast operational rate
    ///
    /// Only call this once the transceiver has come out of reset and its
    /// clocks are up.
    pub fn set_operational_rate(&mut self) {
        self.set_rate(BusRate::Operational);
    }

    fn set_rate(&mut self, rate: BusRate) {
        let prescaler = self.profile.prescaler(rate);
        self.spi.set_prescaler(prescaler);
        self.rate = rate;

        log::debug!("spi rate {:?} ({:?})", rate, prescaler);
    }
}

impl<SPI, CS> Bus<SPI, CS> {
    /// The rate currently in effect
    pub fn rate(&self) -> BusRate {
        self.rate
    }

    /// The prescalers of this bus
    pub fn profile(&self) -> RateProfile {
        self.profile
    }

    /// Release the SPI peripheral and chip select pin
    pub fn free(self) -> (SPI, CS) {
        (self.spi, self.chip_select)
    }
}

impl<SPI, CS> Bus<SPI, CS>
where
    SPI: spi::Transfer<u8> + spi::Write<u8>,
    CS: OutputPin,
{
    /// Read from a register
    ///
    /// Reads `buffer.len()` bytes from register `id`, starting at `sub_id`.
    /// Sub-addresses are 15 bits wide; bit 15 of `sub_id` is ignored.
    pub fn read(&mut self, id: u8, sub_id: u16, buffer: &mut [u8]) -> Result<(), Error<SPI, CS>> {
        let mut header = [0; 3];
        let len = init_header(false, id, sub_id, &mut header);

        self.chip_select
            .set_low()
            .map_err(|err| Error::ChipSelect(err))?;
        let result = self
            .spi
            .write(&header[..len])
            .map_err(|err| Error::Write(err))
            .and_then(|()| {
                self.spi
                    .transfer(buffer)
                    .map(|_| ())
                    .map_err(|err| Error::Transfer(err))
            });
        self.chip_select
            .set_high()
            .map_err(|err| Error::ChipSelect(err))?;

        result
    }

    /// Write to a register
    ///
    /// Writes `data` to register `id`, starting at `sub_id`. Sub-addresses
    /// are 15 bits wide; bit 15 of `sub_id` is ignored.
    pub fn write(&mut self, id: u8, sub_id: u16, data: &[u8]) -> Result<(), Error<SPI, CS>> {
        let mut header = [0; 3];
        let len = init_header(true, id, sub_id, &mut header);

        self.chip_select
            .set_low()
            .map_err(|err| Error::ChipSelect(err))?;
        let result = self
            .spi
            .write(&header[..len])
            .and_then(|()| self.spi.write(data))
            .map_err(|err| Error::Write(err));
        self.chip_select
            .set_high()
            .map_err(|err| Error::ChipSelect(err))?;

        result
    }

    /// Read the `DEV_ID` register
    pub fn read_device_id(&mut self) -> Result<u32, Error<SPI, CS>> {
        let mut buffer = [0; 4];
        self.read(DEV_ID, 0, &mut buffer)?;

        Ok(u32::from_le_bytes(buffer))
    }
}


/// Whether a `DEV_ID` value belongs to a DW1000
///
/// Only the RIDTAG and model are checked; version and revision differ
/// between silicon batches.
pub fn is_dw1000(dev_id: u32) -> bool {
    let ridtag = (dev_id >> 16) as u16;
    let model = (dev_id >> 8) as u8;

    ridtag == RIDTAG && model == MODEL_DW1000
}


/// Writes the transaction header for a register access
///
/// Returns the length of the header: one byte without sub-index, two for a
/// sub-index up to 127 and three for the 15-bit extended sub-address. Bit 15
/// of `sub_id` is dropped.
fn init_header(write: bool, id: u8, sub_id: u16, buffer: &mut [u8; 3]) -> usize {
    let sub = sub_id > 0;

    buffer[0] = ((write as u8) << 7) | ((sub as u8) << 6) | (id & 0x3f);

    if !sub {
        return 1;
    }

    let ext_addr = sub_id > 127;

    buffer[1] = ((ext_addr as u8) << 7) | (sub_id as u8 & 0x7f);

    if !ext_addr {
        return 2;
    }

    buffer[2] = ((sub_id & 0x7f80) >> 7) as u8;

    3
}


/// An SPI error that can occur when talking to the transceiver
pub enum Error<SPI, CS>
where
    SPI: spi::Transfer<u8> + spi::Write<u8>,
    CS: OutputPin,
{
    /// SPI error occured during a transfer transaction
    Transfer(<SPI as spi::Transfer<u8>>::Error),

    /// SPI error occured during a write transaction
    Write(<SPI as spi::Write<u8>>::Error),

    /// Error occured while changing chip select signal
    ChipSelect(<CS as OutputPin>::Error),
}

// We can't derive this implementation, as the compiler will complain that the
// associated error type doesn't implement `Debug`.
impl<SPI, CS> fmt::Debug for Error<SPI, CS>
where
    SPI: spi::Transfer<u8> + spi::Write<u8>,
    <SPI as spi::Transfer<u8>>::Error: fmt::Debug,
    <SPI as spi::Write<u8>>::Error: fmt::Debug,
    CS: OutputPin,
    <CS as OutputPin>::Error: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Transfer(error) => write!(f, "Transfer({:?})", error),
            Error::Write(error) => write!(f, "Write({:?})", error),
            Error::ChipSelect(error) => write!(f, "ChipSelect({:?})", error),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prescaler_divisors() {
        assert_eq!(Prescaler::Div2.divisor(), 2);
        assert_eq!(Prescaler::Div32.divisor(), 32);
        assert_eq!(Prescaler::Div256.divisor(), 256);
    }

    #[test]
    fn prescaler_only_touches_br_bits() {
        // SPE, MSTR and SSM set, BR = /256
        let cr1 = 0b0000_0011_0111_1100;

        assert_eq!(Prescaler::Div4.apply(cr1), 0b0000_0011_0100_1100);
        assert_eq!(Prescaler::Div2.apply(0xffff), 0xffc7);
    }

    #[test]
    fn header_without_sub_index() {
        let mut header = [0; 3];

        assert_eq!(init_header(false, DEV_ID, 0, &mut header), 1);
        assert_eq!(header[0], 0x00);

        assert_eq!(init_header(true, 0x0f, 0, &mut header), 1);
        assert_eq!(header[0], 0x8f);
    }

    #[test]
    fn header_with_short_sub_index() {
        let mut header = [0; 3];

        assert_eq!(init_header(false, 0x2d, 0x04, &mut header), 2);
        assert_eq!(header[..2], [0x6d, 0x04]);
    }

    #[test]
    fn header_with_extended_sub_address() {
        let mut header = [0; 3];

        assert_eq!(init_header(true, 0x36, 0x0804, &mut header), 3);
        assert_eq!(header, [0xf6, 0x84, 0x10]);
    }

    #[test]
    fn header_ignores_bit_15_of_sub_address() {
        let mut header = [0; 3];

        assert_eq!(init_header(false, 0x36, 0x8804, &mut header), 3);
        assert_eq!(header, [0x76, 0x84, 0x10]);
    }

    #[test]
    fn recognizes_dw1000() {
        assert!(is_dw1000(0xDECA0130));
        assert!(is_dw1000(0xDECA0131));
        assert!(!is_dw1000(0xDECA0302));
        assert!(!is_dw1000(0xFFFFFFFF));
        assert!(!is_dw1000(0x00000000));
    }

    #[test]
    fn profile_maps_rates() {
        let profile = RateProfile {
            bring_up: Prescaler::Div32,
            operational: Prescaler::Div4,
        };

        assert_eq!(profile.prescaler(BusRate::BringUp), Prescaler::Div32);
        assert_eq!(profile.prescaler(BusRate::Operational), Prescaler::Div4);
    }
}
