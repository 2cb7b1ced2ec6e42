//! Brings up the DW1000 and services its interrupts
//!
//! Resets the DW1000, waits until it's ready, switches the SPI bus to the
//! operational rate and arms the interrupt line. Every interrupt cause is
//! then read from SYS_STATUS and cleared before the line is armed again.

#![no_main]
#![no_std]

use defmt_rtt as _;
use panic_probe as _;

use dwm1001::{
    cortex_m::{asm, interrupt},
    dw1000_port::{Config, EdgeLatch, Role, RoleSelector},
    nrf52832_hal::{pac, Delay, Timer},
    DWM1001,
};

const SYS_STATUS: u8 = 0x0f;

static LATCH: EdgeLatch = EdgeLatch::new();
static ROLE: RoleSelector = RoleSelector::new();

#[cortex_m_rt::entry]
fn main() -> ! {
    let dwm1001 = DWM1001::take().unwrap();

    let role = ROLE.select(Role::Responder).unwrap();

    let mut delay = Delay::new(dwm1001.SYST);
    let mut timer = Timer::new(dwm1001.TIMER0);

    let mut port = dwm1001
        .DW1000
        .into_port(dwm1001.NVIC, Config::new(role), &LATCH);

    // 100 ms at the timer's 1 MHz
    let dev_id = port
        .bring_up(&mut delay, &mut timer, 100_000u32)
        .expect("Failed to bring up DW1000");

    defmt::info!("DW1000 up, DEV_ID {=u32:x}", dev_id);

    loop {
        interrupt::free(|_| {
            if !LATCH.is_pending() {
                asm::wfi();
            }
        });

        if !port.service_irq() {
            continue;
        }

        let mut status = [0; 5];
        port.bus()
            .read(SYS_STATUS, 0, &mut status)
            .expect("Failed to read SYS_STATUS");
        port.bus()
            .write(SYS_STATUS, 0, &status)
            .expect("Failed to clear SYS_STATUS");

        defmt::info!("SYS_STATUS {=[u8]:x}", status);

        port.arm().expect("Failed to re-arm DW_IRQ");
    }
}

#[pac::interrupt]
fn GPIOTE() {
    dwm1001::handle_dw_irq(&LATCH);
}
