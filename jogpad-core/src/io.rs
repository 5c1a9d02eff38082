//! Pin access seen by the tick handler.
//!
//! The core never touches registers. The firmware implements these traits
//! over the ATmega32U4 ports; tests implement them over plain fields.

/// The two quadrature channels of the rotary encoder.
pub trait EncoderPins {
    /// Raw level of channel A (high = `true`).
    fn channel_a(&self) -> bool;
    /// Raw level of channel B (high = `true`).
    fn channel_b(&self) -> bool;
}

/// Column outputs, row inputs and auxiliary keys of the key matrix.
///
/// All lines are active-low: a pressed key pulls its row (or its aux pin)
/// low while its column is driven low.
pub trait MatrixPins {
    /// Drive the column selected by the one-hot `column` mask low and all
    /// other columns high.
    fn drive_column(&mut self, column: u8);

    /// Raw levels of the row inputs, row 0 in bit 0. A set bit means the
    /// line is high (released).
    fn read_rows(&self) -> u8;

    /// Raw level of auxiliary key `index` (0 or 1). `true` means high
    /// (released).
    fn read_aux(&self, index: usize) -> bool;
}
