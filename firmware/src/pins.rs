//! Pin assignment for the jogpad board and raw port access.
//!
//! | signal        | pin     | direction                      |
//! |---------------|---------|--------------------------------|
//! | encoder A     | PC4     | input                          |
//! | encoder B     | PC5     | input                          |
//! | rows 0-3      | PD0-PD3 | input, pull-up, active low     |
//! | columns 0-2   | PD4-PD6 | output, active low             |
//! | aux key 0     | PC6     | input, pull-up, active low     |
//! | aux key 1     | PC7     | input, pull-up, active low     |
//!
//! Everything else on PORTB and PC2 is unused and gets a pull-up so it
//! does not float.

use avr_device::atmega32u4::Peripherals;
use jogpad_core::{EncoderPins, MatrixConfig, MatrixPins};

const ENC_A: u8 = 1 << 4;
const ENC_B: u8 = 1 << 5;

const ROW_MASK: u8 = 0x0F;
const COL_FIRST_PIN: u8 = 4;
const COL_MASK: u8 = 0x70;

const AUX: [u8; 2] = [1 << 6, 1 << 7];

const UNUSED_PORTB: u8 = 0xFF;
const UNUSED_PORTC: u8 = 1 << 2;

// The wiring above is for the reference layout only.
const _: () = assert!(MatrixConfig::JOGPAD.rows() == 4 && MatrixConfig::JOGPAD.columns() == 3);

/// Configure directions and pull-ups. Columns start inactive (high).
pub fn init_gpio(dp: &Peripherals) {
    let portc = &dp.PORTC;
    let portd = &dp.PORTD;

    // Columns: output, driven high
    portd.ddrd.modify(|r, w| unsafe { w.bits(r.bits() | COL_MASK) });
    portd.portd.modify(|r, w| unsafe { w.bits(r.bits() | COL_MASK) });

    // Rows: input with pull-up
    portd.ddrd.modify(|r, w| unsafe { w.bits(r.bits() & !ROW_MASK) });
    portd.portd.modify(|r, w| unsafe { w.bits(r.bits() | ROW_MASK) });

    // Encoder channels: plain inputs, the encoder has its own pull-ups
    portc.ddrc.modify(|r, w| unsafe { w.bits(r.bits() & !(ENC_A | ENC_B)) });

    // Aux keys: input with pull-up
    portc.ddrc.modify(|r, w| unsafe { w.bits(r.bits() & !(AUX[0] | AUX[1])) });
    portc.portc.modify(|r, w| unsafe { w.bits(r.bits() | AUX[0] | AUX[1]) });

    // Unused pins
    dp.PORTB.ddrb.write(|w| unsafe { w.bits(0) });
    dp.PORTB.portb.write(|w| unsafe { w.bits(UNUSED_PORTB) });
    portc.ddrc.modify(|r, w| unsafe { w.bits(r.bits() & !UNUSED_PORTC) });
    portc.portc.modify(|r, w| unsafe { w.bits(r.bits() | UNUSED_PORTC) });
}

/// Borrowed view of the ports used by the tick handler.
pub struct Pins<'a> {
    dp: &'a Peripherals,
}

impl<'a> Pins<'a> {
    pub fn new(dp: &'a Peripherals) -> Self {
        Self { dp }
    }
}

impl EncoderPins for Pins<'_> {
    fn channel_a(&self) -> bool {
        self.dp.PORTC.pinc.read().bits() & ENC_A != 0
    }

    fn channel_b(&self) -> bool {
        self.dp.PORTC.pinc.read().bits() & ENC_B != 0
    }
}

impl MatrixPins for Pins<'_> {
    fn drive_column(&mut self, column: u8) {
        let low = (column << COL_FIRST_PIN) & COL_MASK;
        self.dp
            .PORTD
            .portd
            .modify(|r, w| unsafe { w.bits((r.bits() | COL_MASK) & !low) });
    }

    fn read_rows(&self) -> u8 {
        self.dp.PORTD.pind.read().bits() & ROW_MASK
    }

    fn read_aux(&self, index: usize) -> bool {
        self.dp.PORTC.pinc.read().bits() & AUX[index] != 0
    }
}
