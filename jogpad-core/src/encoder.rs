//! Table-driven quadrature decoder.
//!
//! Every tick the two channel levels form a 2-bit phase (A in bit 0, B in
//! bit 1). The previous and the current phase together index a 16-entry
//! step table. Only four windows count, two per direction and electrical
//! cycle; every other window, including the ones where both channels
//! changed at once, is treated as noise and yields no step.

use crate::io::EncoderPins;

/// Step for each `(previous << 2) | current` phase window.
pub const STEP_TABLE: [i8; 16] = [0, 0, -1, 0, 0, 0, 0, 1, 1, 0, 0, 0, 0, -1, 0, 0];

/// Encoder state visible to the host.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EncoderData {
    /// Tick at which the last step was decoded.
    pub time: u16,
    /// Cumulative position, wrapping at 16 bits.
    pub position: i16,
}

/// Decoder state, owned by the tick handler.
#[derive(Debug)]
pub struct QuadratureDecoder {
    /// Last two phases, previous in bits 2..3 and current in bits 0..1.
    window: u8,
    data: EncoderData,
    changed: bool,
}

impl QuadratureDecoder {
    pub const fn new() -> Self {
        Self {
            window: 0,
            data: EncoderData {
                time: 0,
                position: 0,
            },
            changed: false,
        }
    }

    /// Load the current phase without counting anything.
    ///
    /// Called once before the first tick so that the resting position of
    /// the knob does not decode as a step.
    pub fn prime<P: EncoderPins>(&mut self, pins: &P) {
        self.window = phase(pins.channel_a(), pins.channel_b());
    }

    /// Sample the channels and advance the decoder. Returns the step taken.
    pub fn tick<P: EncoderPins>(&mut self, now: u16, pins: &P) -> i8 {
        self.advance(now, pins.channel_a(), pins.channel_b())
    }

    /// Advance the decoder with explicit channel levels.
    pub fn advance(&mut self, now: u16, a: bool, b: bool) -> i8 {
        self.window = ((self.window << 2) | phase(a, b)) & 0x0F;

        let step = STEP_TABLE[self.window as usize];
        self.data.position = self.data.position.wrapping_add(step as i16);
        if step != 0 {
            self.data.time = now;
            self.changed = true;
        }
        step
    }

    /// Return the visible state and clear the changed flag.
    pub fn take(&mut self) -> (EncoderData, bool) {
        let changed = self.changed;
        self.changed = false;
        (self.data, changed)
    }

    #[cfg(test)]
    fn data(&self) -> EncoderData {
        self.data
    }
}

impl Default for QuadratureDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[inline(always)]
fn phase(a: bool, b: bool) -> u8 {
    (a as u8) | ((b as u8) << 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Phases in forward rotation order.
    const FORWARD: [(bool, bool); 4] = [(false, false), (true, false), (true, true), (false, true)];

    fn turn(dec: &mut QuadratureDecoder, now: &mut u16, phases: &[(bool, bool)]) -> i32 {
        let mut total = 0i32;
        for &(a, b) in phases {
            total += dec.advance(*now, a, b) as i32;
            *now = now.wrapping_add(1);
        }
        total
    }

    #[test]
    fn test_table_counts_four_windows() {
        let nonzero: [usize; 4] = [2, 7, 8, 13];
        for (idx, &step) in STEP_TABLE.iter().enumerate() {
            if nonzero.contains(&idx) {
                assert_ne!(step, 0, "window {:04b}", idx);
            } else {
                assert_eq!(step, 0, "window {:04b}", idx);
            }
        }
    }

    #[test]
    fn test_counted_windows_are_single_bit_transitions() {
        for idx in [2usize, 7, 8, 13] {
            let prev = idx >> 2;
            let cur = idx & 0b11;
            assert_eq!((prev ^ cur).count_ones(), 1, "window {:04b}", idx);
        }
        // Forward windows count up, their reverses count down.
        assert_eq!(STEP_TABLE[0b0111], 1);
        assert_eq!(STEP_TABLE[0b1000], 1);
        assert_eq!(STEP_TABLE[0b1101], -1);
        assert_eq!(STEP_TABLE[0b0010], -1);
    }

    #[test]
    fn test_double_transition_is_ignored() {
        for idx in [0b0011usize, 0b1100, 0b0110, 0b1001] {
            assert_eq!(STEP_TABLE[idx], 0, "window {:04b}", idx);
        }
    }

    #[test]
    fn test_a_then_b_counts_one() {
        let mut dec = QuadratureDecoder::new();
        assert_eq!(dec.advance(1, true, false), 0);
        assert_eq!(dec.window, 0b0001);
        assert_eq!(dec.advance(2, true, true), 1);
        assert_eq!(dec.window, 0b0111);

        let (data, changed) = dec.take();
        assert!(changed);
        assert_eq!(data.position, 1);
        assert_eq!(data.time, 2);
    }

    #[test]
    fn test_full_cycles_both_directions() {
        let mut dec = QuadratureDecoder::new();
        let mut now = 0;
        // Two forward cycles: 2 counts each.
        let mut fwd = [(false, false); 9];
        for (i, p) in fwd.iter_mut().enumerate() {
            *p = FORWARD[(i + 1) % 4];
        }
        assert_eq!(turn(&mut dec, &mut now, &fwd), 4);

        // One backward cycle, starting where the forward run stopped.
        let back = [(false, false), (false, true), (true, true), (true, false)];
        assert_eq!(turn(&mut dec, &mut now, &back), -2);
        assert_eq!(dec.data().position, 2);
    }

    #[test]
    fn test_position_wraps() {
        let mut dec = QuadratureDecoder::new();
        dec.data.position = i16::MAX;
        dec.advance(0, true, false);
        dec.advance(1, true, true);
        assert_eq!(dec.data().position, i16::MIN);

        let mut dec = QuadratureDecoder::new();
        dec.data.position = i16::MIN;
        assert_eq!(dec.advance(0, false, true), -1);
        assert_eq!(dec.data().position, i16::MAX);
    }

    #[test]
    fn test_take_clears_changed() {
        let mut dec = QuadratureDecoder::new();
        dec.advance(5, true, false);
        dec.advance(6, true, true);

        let first = dec.take();
        let second = dec.take();
        assert!(first.1);
        assert!(!second.1);
        assert_eq!(first.0, second.0);
    }

    #[test]
    fn test_idle_keeps_timestamp() {
        let mut dec = QuadratureDecoder::new();
        dec.advance(10, true, false);
        dec.advance(11, true, true);
        for t in 12..100 {
            assert_eq!(dec.advance(t, true, true), 0);
        }
        assert_eq!(dec.data().time, 11);
    }

    #[test]
    fn test_prime_suppresses_startup_step() {
        struct Resting;
        impl EncoderPins for Resting {
            fn channel_a(&self) -> bool {
                false
            }
            fn channel_b(&self) -> bool {
                true
            }
        }

        let mut dec = QuadratureDecoder::new();
        dec.prime(&Resting);
        assert_eq!(dec.tick(0, &Resting), 0);
        assert_eq!(dec.take(), (EncoderData::default(), false));

        // Without priming the first sample reads as 0 -> 2.
        let mut dec = QuadratureDecoder::new();
        assert_eq!(dec.tick(0, &Resting), -1);
    }
}
