//! Resets the DW1000 and verifies its identity
//!
//! This example resets the DW1000, waits for it to release RSTn, and reads
//! its DEV_ID register at the bring-up rate.

#![no_main]
#![no_std]

use defmt_rtt as _;
use panic_probe as _;

use dwm1001::{
    dw1000_port::{bus, Config, Role},
    nrf52832_hal::{Delay, Timer},
    DWM1001,
};

#[cortex_m_rt::entry]
fn main() -> ! {
    let dwm1001 = DWM1001::take().unwrap();

    let mut delay = Delay::new(dwm1001.SYST);
    let mut timer = Timer::new(dwm1001.TIMER0);

    let latch = dwm1001::dw1000_port::EdgeLatch::new();
    let mut port = dwm1001
        .DW1000
        .into_port(dwm1001.NVIC, Config::new(Role::Initiator), &latch);

    port.reset_transceiver(&mut delay)
        .expect("Failed to reset DW1000");
    port.wait_until_ready(&mut timer, 100_000u32)
        .expect("DW1000 didn't come out of reset");

    let dev_id = port
        .bus()
        .read_device_id()
        .expect("Failed to read DEV_ID register");

    assert_eq!(dev_id >> 16, bus::RIDTAG as u32);
    assert_eq!((dev_id >> 8) as u8, bus::MODEL_DW1000);
    assert!(bus::is_dw1000(dev_id));

    defmt::info!("Success!");

    loop {}
}
