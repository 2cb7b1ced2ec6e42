//! Recording mocks of the board peripherals
//!
//! Every mock appends to one shared log, so tests can check the order in
//! which the port touches the hardware.

#![allow(dead_code)]

use std::{cell::RefCell, rc::Rc};

use dw1000_port::{
    bus::{Prescaler, SpiRate},
    embedded_hal::{
        blocking::{delay::DelayMs, spi},
        digital::v2::OutputPin,
        timer::CountDown,
    },
    irq::{Edge, EdgeInput, InterruptController, Pull},
    nb,
    reset::ResetPin,
    Config, EdgeLatch, Port, Role,
};


pub const LINE: u8 = 6;

pub const DW1000_DEV_ID: u32 = 0xDECA0130;


#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Event {
    Prescaler(Prescaler),
    CsLow,
    CsHigh,
    SpiWrite(u8),
    SpiTransfer(usize),
    RstLow,
    RstRelease,
    Mask,
    Unmask,
    Unpend,
    Priority(u8),
    Listen(Edge, Pull),
    Unlisten,
    ClearEvent,
    Delay(u32),
}

impl Event {
    pub fn is_spi_transaction(&self) -> bool {
        match self {
            Event::CsLow | Event::CsHigh | Event::SpiWrite(_) | Event::SpiTransfer(_) => true,
            _ => false,
        }
    }

    pub fn touches_reset_pin(&self) -> bool {
        match self {
            Event::RstLow | Event::RstRelease => true,
            _ => false,
        }
    }
}


/// Simulated hardware state
pub struct Hw {
    pub enabled: bool,
    pub dev_id: u32,

    /// Polls of RSTn that read low before it goes high, `None` to stay low
    pub polls_until_ready: Option<u32>,

    pub fail_release: bool,
}

#[derive(Clone)]
pub struct Board {
    pub log: Rc<RefCell<Vec<Event>>>,
    pub hw: Rc<RefCell<Hw>>,
}

impl Board {
    pub fn new() -> Self {
        Board {
            log: Rc::new(RefCell::new(Vec::new())),
            hw: Rc::new(RefCell::new(Hw {
                enabled: false,
                dev_id: DW1000_DEV_ID,
                polls_until_ready: Some(0),
                fail_release: false,
            })),
        }
    }

    fn record(&self, event: Event) {
        self.log.borrow_mut().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.log.borrow().clone()
    }

    pub fn clear(&self) {
        self.log.borrow_mut().clear();
    }

    pub fn port<'l>(&self, role: Role, latch: &'l EdgeLatch) -> TestPort<'l> {
        self.port_with(Config::new(role), latch)
    }

    pub fn port_with<'l>(&self, config: Config, latch: &'l EdgeLatch) -> TestPort<'l> {
        Port::new(
            config,
            Spi(self.clone()),
            Cs(self.clone()),
            Rst(self.clone()),
            Nvic(self.clone()),
            LINE,
            Gpio(self.clone()),
            latch,
        )
    }

    /// What the interrupt handler would do
    pub fn interrupt(&self, latch: &EdgeLatch) -> bool {
        if !self.hw.borrow().enabled {
            return false;
        }

        let mut nvic = Nvic(self.clone());
        let recorded = latch.on_edge(&mut nvic, LINE);
        Gpio(self.clone()).clear_event();

        recorded
    }
}

pub type TestPort<'l> = Port<'l, Spi, Cs, Rst, Nvic, Gpio>;


pub struct Spi(pub Board);

impl SpiRate for Spi {
    fn set_prescaler(&mut self, prescaler: Prescaler) {
        self.0.record(Event::Prescaler(prescaler));
    }
}

impl spi::Write<u8> for Spi {
    type Error = ();

    fn write(&mut self, words: &[u8]) -> Result<(), ()> {
        for &word in words {
            self.0.record(Event::SpiWrite(word));
        }
        Ok(())
    }
}

impl spi::Transfer<u8> for Spi {
    type Error = ();

    fn transfer<'w>(&mut self, words: &'w mut [u8]) -> Result<&'w [u8], ()> {
        self.0.record(Event::SpiTransfer(words.len()));

        let dev_id = self.0.hw.borrow().dev_id.to_le_bytes();
        for (word, byte) in words.iter_mut().zip(dev_id.iter().cycle()) {
            *word = *byte;
        }

        Ok(words)
    }
}


pub struct Cs(pub Board);

impl OutputPin for Cs {
    type Error = ();

    fn set_low(&mut self) -> Result<(), ()> {
        self.0.record(Event::CsLow);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), ()> {
        self.0.record(Event::CsHigh);
        Ok(())
    }
}


#[derive(Debug, Eq, PartialEq)]
pub struct PinError;

pub struct Rst(pub Board);

impl ResetPin for Rst {
    type Error = PinError;

    fn drive_low(&mut self) -> Result<(), PinError> {
        self.0.record(Event::RstLow);
        Ok(())
    }

    fn release(&mut self) -> Result<(), PinError> {
        if self.0.hw.borrow().fail_release {
            return Err(PinError);
        }

        self.0.record(Event::RstRelease);
        Ok(())
    }

    fn is_high(&mut self) -> Result<bool, PinError> {
        let mut hw = self.0.hw.borrow_mut();

        let polls = hw.polls_until_ready;
        match polls {
            Some(0) => Ok(true),
            Some(n) => {
                hw.polls_until_ready = Some(n - 1);
                Ok(false)
            }
            None => Ok(false),
        }
    }
}


pub struct Nvic(pub Board);

impl InterruptController for Nvic {
    type Line = u8;

    fn mask(&mut self, line: u8) {
        assert_eq!(line, LINE);
        self.0.hw.borrow_mut().enabled = false;
        self.0.record(Event::Mask);
    }

    fn unmask(&mut self, line: u8) {
        assert_eq!(line, LINE);
        self.0.hw.borrow_mut().enabled = true;
        self.0.record(Event::Unmask);
    }

    fn unpend(&mut self, _: u8) {
        self.0.record(Event::Unpend);
    }

    fn is_enabled(&self, _: u8) -> bool {
        self.0.hw.borrow().enabled
    }

    fn set_priority(&mut self, _: u8, priority: u8) {
        self.0.record(Event::Priority(priority));
    }
}


pub struct Gpio(pub Board);

impl EdgeInput for Gpio {
    fn listen(&mut self, edge: Edge, pull: Pull) {
        self.0.record(Event::Listen(edge, pull));
    }

    fn unlisten(&mut self) {
        self.0.record(Event::Unlisten);
    }

    fn clear_event(&mut self) {
        self.0.record(Event::ClearEvent);
    }
}


pub struct Delay(pub Board);

impl DelayMs<u32> for Delay {
    fn delay_ms(&mut self, ms: u32) {
        self.0.record(Event::Delay(ms));
    }
}


/// Counts down by one on every `wait`
pub struct Ticks(u32);

impl Ticks {
    pub fn new() -> Self {
        Ticks(0)
    }
}

impl CountDown for Ticks {
    type Time = u32;

    fn start<T>(&mut self, count: T)
    where
        T: Into<u32>,
    {
        self.0 = count.into();
    }

    fn wait(&mut self) -> nb::Result<(), void::Void> {
        if self.0 == 0 {
            return Ok(());
        }

        self.0 -= 1;
        Err(nb::Error::WouldBlock)
    }
}
