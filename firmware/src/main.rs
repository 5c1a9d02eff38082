//! Jogpad firmware for ATmega32U4 at 16 MHz.
//!
//! - Timer0 compare interrupt at 10 kHz drives the encoder decoder and the
//!   key matrix scanner
//! - The main loop polls the USB controller and hands out reports built by
//!   the coordinator
//!
//! All tick-driven state lives in [`SHARED`] and is read from the main loop
//! under critical sections.

#![no_std]
#![no_main]
#![feature(abi_avr_interrupt)]
#![feature(asm_experimental_arch)]

#[cfg(feature = "serial-log")]
mod logger;
mod pins;
mod usb;

use avr_device::atmega32u4::Peripherals;
use jogpad_core::{Coordinator, MatrixConfig, Shared};

use pins::Pins;
use usb::UsbHid;

const FIRMWARE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Timer0 in CTC mode, clk/8: 16 MHz / 8 / (199 + 1) = 10 kHz.
const TIMER0_TOP: u8 = 199;
const TCCR0A_WGM01: u8 = 1 << 1;
const TCCR0B_CS01: u8 = 1 << 1;
const TIMSK0_OCIE0A: u8 = 1 << 1;

const MCUSR_WDRF: u8 = 1 << 3;
const WDTCSR_WDCE: u8 = 1 << 4;
const WDTCSR_WDE: u8 = 1 << 3;

/// Tick-driven state, written only by the timer interrupt.
static SHARED: Shared = Shared::new(MatrixConfig::JOGPAD);

/// Panic handler: on AVR we just loop forever.
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    loop {}
}

#[avr_device::interrupt(atmega32u4)]
fn TIMER0_COMPA() {
    let dp = unsafe { Peripherals::steal() };
    SHARED.tick(&mut Pins::new(&dp));
}

/// Main entry point.
#[no_mangle]
pub extern "C" fn main() -> ! {
    let dp = unsafe { Peripherals::steal() };

    // The bootloader may have left the watchdog running
    disable_watchdog(&dp);

    // Disable clock prescaler (CLKPR)
    dp.CPU.clkpr.write(|w| w.clkpce().set_bit());
    dp.CPU.clkpr.write(|w| unsafe { w.bits(0) }); // Prescaler = 1

    #[cfg(feature = "serial-log")]
    logger::init(&dp);
    log::info!("jogpad firmware {}", FIRMWARE_VERSION);
    log::debug!(
        "matrix {}x{}, full sweep every {} ticks",
        MatrixConfig::JOGPAD.rows(),
        MatrixConfig::JOGPAD.columns(),
        MatrixConfig::JOGPAD.sweep_ticks()
    );

    // Initialize USB
    let mut usb = UsbHid::new();
    usb.init(&dp);

    // Initialize matrix and encoder pins, then strobe the first column and
    // latch the resting encoder phase
    pins::init_gpio(&dp);
    SHARED.start(&mut Pins::new(&dp));

    init_tick_timer(&dp);

    // Start the tick
    unsafe { avr_device::interrupt::enable() };

    let mut coordinator = Coordinator::new();

    loop {
        usb.poll(&dp, &SHARED, &mut coordinator);
    }
}

/// WDTCSR has to be written again within four cycles of setting WDCE, so
/// the two stores are emitted back to back with interrupts off.
fn disable_watchdog(dp: &Peripherals) {
    avr_device::interrupt::free(|_| {
        unsafe { core::arch::asm!("wdr") };
        dp.CPU.mcusr.modify(|r, w| unsafe { w.bits(r.bits() & !MCUSR_WDRF) });
        // WDTCSR is at data address 0x60
        unsafe {
            core::arch::asm!(
                "sts 0x60, {enable}",
                "sts 0x60, {off}",
                enable = in(reg) WDTCSR_WDCE | WDTCSR_WDE,
                off = in(reg) 0u8,
            );
        }
    });
}

/// Timer0 compare match A every 100us.
fn init_tick_timer(dp: &Peripherals) {
    let tc0 = &dp.TC0;
    tc0.tccr0a.write(|w| unsafe { w.bits(TCCR0A_WGM01) });
    tc0.ocr0a.write(|w| unsafe { w.bits(TIMER0_TOP) });
    tc0.tccr0b.write(|w| unsafe { w.bits(TCCR0B_CS01) });
    tc0.timsk0.write(|w| unsafe { w.bits(TIMSK0_OCIE0A) });
}
