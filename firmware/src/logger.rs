//! Serial debug logger on USART1.
//!
//! Transmit only, 8N1 at 115200 baud. TXD1 is PD3, which is also matrix
//! row 3, so the logger is only installed with the `serial-log` feature.
//! Without it the `log` macros stay in place and go nowhere.

use core::fmt::Write;

use avr_device::atmega32u4::Peripherals;
use log::{Level, Log, Metadata, Record};

/// UBRR for 115200 baud at 16 MHz with double speed: 16e6 / (8 * 115200) - 1.
const UBRR_115200_U2X: u16 = 16;

const UCSRA_UDRE: u8 = 1 << 5;
const UCSRA_U2X: u8 = 1 << 1;
const UCSRB_TXEN: u8 = 1 << 3;
/// Asynchronous, no parity, 1 stop bit, 8 data bits.
const UCSRC_8N1: u8 = 0b0000_0110;

/// Logger for the jogpad board.
struct SerialLogger;

static APP_LOGGER: SerialLogger = SerialLogger;

#[cfg(debug_assertions)]
const MAX_LEVEL: Level = Level::Trace;
#[cfg(not(debug_assertions))]
const MAX_LEVEL: Level = Level::Info;

/// Blocking writer for the USART1 data register.
struct Usart1<'a> {
    dp: &'a Peripherals,
}

impl Write for Usart1<'_> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        let usart = &self.dp.USART1;
        for byte in s.bytes() {
            while usart.ucsr1a.read().bits() & UCSRA_UDRE == 0 {}
            usart.udr1.write(|w| unsafe { w.bits(byte) });
        }
        Ok(())
    }
}

impl Log for SerialLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= MAX_LEVEL
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let dp = unsafe { Peripherals::steal() };
        let mut out = Usart1 { dp: &dp };
        // Nothing sensible to do if the UART write fails.
        let _ = write!(
            out,
            "{{{}}}, [{}], {}\r\n",
            record.target(),
            record.level(),
            record.args()
        );
    }

    fn flush(&self) {}
}

/// Set up USART1 and install the logger.
///
/// # Debug
///
/// Debug builds log at `Trace`, release builds at `Info`.
pub fn init(dp: &Peripherals) {
    let usart = &dp.USART1;
    usart.ubrr1.write(|w| unsafe { w.bits(UBRR_115200_U2X) });
    usart.ucsr1a.write(|w| unsafe { w.bits(UCSRA_U2X) });
    usart.ucsr1c.write(|w| unsafe { w.bits(UCSRC_8N1) });
    usart.ucsr1b.write(|w| unsafe { w.bits(UCSRB_TXEN) });

    // Interrupts are still disabled here, and nothing else sets a logger.
    unsafe {
        if log::set_logger_racy(&APP_LOGGER).is_ok() {
            log::set_max_level_racy(MAX_LEVEL.to_level_filter());
        }
    }
}
