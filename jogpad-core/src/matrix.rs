//! Key matrix scanning.
//!
//! One column is strobed at a time. The tick handler calls
//! [`MatrixScanner::tick`] at the full tick rate, and the scanner divides
//! that down so each column stays driven for `divider` ticks before its rows
//! are sampled. The settle time between strobe and sample is the only
//! debouncing the matrix gets.
//!
//! Rows of successive columns are shifted into an accumulator, so the first
//! column of a sweep ends up in the highest matrix bits:
//!
//! ```text
//!  bit  15 14 | 13   12  | 11..8  | 7..4   | 3..0
//!       free  | aux1 aux0 | col 0  | col 1  | col 2     (reference layout)
//! ```
//!
//! The finished bitset is only published once the last column has been read,
//! so readers never see half a sweep.

use crate::config::MatrixConfig;
use crate::io::MatrixPins;

/// Matrix scanner state, owned by the tick handler.
#[derive(Debug)]
pub struct MatrixScanner {
    config: MatrixConfig,
    /// One-hot mask of the column currently driven.
    column: u8,
    /// Ticks since the last column sample.
    timer: u8,
    /// Rows collected so far in the current sweep.
    accumulator: u16,
    /// Last complete sweep.
    result: u16,
}

impl MatrixScanner {
    pub const fn new(config: MatrixConfig) -> Self {
        Self {
            config,
            column: 1,
            timer: 0,
            accumulator: 0,
            result: 0,
        }
    }

    /// Drive the first column so it has a full divider period to settle
    /// before the first sample.
    pub fn start<P: MatrixPins>(&mut self, pins: &mut P) {
        self.column = 1;
        self.timer = 0;
        self.accumulator = 0;
        pins.drive_column(self.column);
    }

    /// Advance the scanner by one tick. Returns `true` when a sweep was
    /// published during this tick.
    pub fn tick<P: MatrixPins>(&mut self, pins: &mut P) -> bool {
        self.timer += 1;
        if self.timer < self.config.divider() {
            return false;
        }
        self.timer = 0;

        let pressed = !pins.read_rows() & self.config.row_mask();
        self.accumulator = (self.accumulator << self.config.rows()) | pressed as u16;

        let published = self.column == self.config.last_column();
        if published {
            for (index, &bit) in self.config.aux_bits().iter().enumerate() {
                if !pins.read_aux(index) {
                    self.accumulator |= 1 << bit;
                }
            }

            self.result = self.accumulator;
            self.accumulator = 0;
            self.column = 1;
        } else {
            self.column <<= 1;
        }

        pins.drive_column(self.column);
        published
    }

    /// Last published sweep.
    pub fn result(&self) -> u16 {
        self.result
    }
}

/// A key position within the button bitset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    /// Matrix key. `column` counts in strobe order, starting at 0.
    Matrix { row: u8, column: u8 },
    /// Direct-wired auxiliary key 0 or 1.
    Aux(u8),
}

/// Decoded view of a published button bitset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ButtonSet {
    bits: u16,
    config: MatrixConfig,
}

impl ButtonSet {
    pub fn new(bits: u16, config: MatrixConfig) -> Self {
        Self { bits, config }
    }

    /// Bit index of a key in the bitset, or `None` if the key does not
    /// exist in this layout.
    pub fn bit_of(&self, key: Key) -> Option<u8> {
        match key {
            Key::Matrix { row, column } => {
                let (rows, columns) = (self.config.rows(), self.config.columns());
                if row >= rows || column >= columns {
                    return None;
                }
                Some((columns - 1 - column) * rows + row)
            }
            Key::Aux(index) => self.config.aux_bits().get(index as usize).copied(),
        }
    }

    pub fn is_pressed(&self, key: Key) -> bool {
        self.bit_of(key)
            .map(|bit| self.bits & (1 << bit) != 0)
            .unwrap_or(false)
    }

    /// All pressed keys: matrix keys column by column, then aux keys.
    pub fn pressed(&self) -> impl Iterator<Item = Key> + '_ {
        let (rows, columns) = (self.config.rows(), self.config.columns());
        let matrix = (0..columns)
            .flat_map(move |column| (0..rows).map(move |row| Key::Matrix { row, column }));
        let aux = (0..self.config.aux_bits().len() as u8).map(Key::Aux);

        matrix.chain(aux).filter(move |&key| self.is_pressed(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fake matrix wiring. `pressed[c]` holds the pressed rows of column `c`.
    struct FakeMatrix {
        driven: u8,
        drives: usize,
        pressed: [u8; 3],
        aux_pressed: [bool; 2],
        samples: usize,
    }

    impl FakeMatrix {
        fn new() -> Self {
            Self {
                driven: 0,
                drives: 0,
                pressed: [0; 3],
                aux_pressed: [false; 2],
                samples: 0,
            }
        }
    }

    impl MatrixPins for FakeMatrix {
        fn drive_column(&mut self, column: u8) {
            assert_eq!(column.count_ones(), 1, "column strobe must be one-hot");
            self.driven = column;
            self.drives += 1;
        }

        fn read_rows(&self) -> u8 {
            let index = self.driven.trailing_zeros() as usize;
            // Upper bits float high like unconnected port pins.
            !self.pressed[index]
        }

        fn read_aux(&self, index: usize) -> bool {
            !self.aux_pressed[index]
        }
    }

    fn run(scanner: &mut MatrixScanner, pins: &mut FakeMatrix, ticks: u16) -> usize {
        let mut sweeps = 0;
        for _ in 0..ticks {
            if scanner.tick(pins) {
                sweeps += 1;
            }
        }
        sweeps
    }

    #[test]
    fn test_start_drives_first_column() {
        let mut scanner = MatrixScanner::new(MatrixConfig::JOGPAD);
        let mut pins = FakeMatrix::new();
        scanner.start(&mut pins);
        assert_eq!(pins.driven, 0b001);
    }

    #[test]
    fn test_divider_holds_column() {
        let mut scanner = MatrixScanner::new(MatrixConfig::JOGPAD);
        let mut pins = FakeMatrix::new();
        scanner.start(&mut pins);

        run(&mut scanner, &mut pins, 49);
        assert_eq!(pins.driven, 0b001);
        assert_eq!(pins.drives, 1);

        run(&mut scanner, &mut pins, 1);
        assert_eq!(pins.driven, 0b010);

        run(&mut scanner, &mut pins, 50);
        assert_eq!(pins.driven, 0b100);

        run(&mut scanner, &mut pins, 50);
        assert_eq!(pins.driven, 0b001);
    }

    #[test]
    fn test_one_sweep_per_period() {
        let cfg = MatrixConfig::JOGPAD;
        let mut scanner = MatrixScanner::new(cfg);
        let mut pins = FakeMatrix::new();
        pins.pressed = [0b0001, 0b0010, 0b1000];
        pins.aux_pressed = [true, false];
        scanner.start(&mut pins);

        assert_eq!(run(&mut scanner, &mut pins, cfg.sweep_ticks() - 1), 0);
        assert_eq!(scanner.result(), 0);

        assert_eq!(run(&mut scanner, &mut pins, 1), 1);
        // col 0 row 0 -> bit 8, col 1 row 1 -> bit 5, col 2 row 3 -> bit 3,
        // aux 0 -> bit 12
        assert_eq!(scanner.result(), (1 << 12) | (1 << 8) | (1 << 5) | (1 << 3));
    }

    #[test]
    fn test_result_stable_between_sweeps() {
        let mut scanner = MatrixScanner::new(MatrixConfig::JOGPAD);
        let mut pins = FakeMatrix::new();
        pins.pressed = [0b1111, 0, 0];
        scanner.start(&mut pins);
        run(&mut scanner, &mut pins, 150);
        assert_eq!(scanner.result(), 0x0F00);

        // Release mid-sweep: nothing changes until the sweep completes.
        pins.pressed = [0, 0, 0];
        run(&mut scanner, &mut pins, 149);
        assert_eq!(scanner.result(), 0x0F00);
        run(&mut scanner, &mut pins, 1);
        assert_eq!(scanner.result(), 0);
    }

    #[test]
    fn test_aux_keys_only() {
        let mut scanner = MatrixScanner::new(MatrixConfig::JOGPAD);
        let mut pins = FakeMatrix::new();
        pins.aux_pressed = [true, true];
        scanner.start(&mut pins);
        run(&mut scanner, &mut pins, 150);
        assert_eq!(scanner.result(), 0x3000);
    }

    #[test]
    fn test_row_bits_outside_mask_ignored() {
        let mut scanner = MatrixScanner::new(MatrixConfig::JOGPAD);
        let mut pins = FakeMatrix::new();
        // Pulled-low bits above the row mask must not leak into the result.
        pins.pressed = [0xF0, 0xF0, 0xF0];
        scanner.start(&mut pins);
        run(&mut scanner, &mut pins, 150);
        assert_eq!(scanner.result(), 0);
    }

    #[test]
    fn test_button_set_layout() {
        let set = ButtonSet::new((1 << 12) | (1 << 8) | (1 << 5) | (1 << 3), MatrixConfig::JOGPAD);
        assert!(set.is_pressed(Key::Matrix { row: 0, column: 0 }));
        assert!(set.is_pressed(Key::Matrix { row: 1, column: 1 }));
        assert!(set.is_pressed(Key::Matrix { row: 3, column: 2 }));
        assert!(set.is_pressed(Key::Aux(0)));
        assert!(!set.is_pressed(Key::Aux(1)));
        assert!(!set.is_pressed(Key::Matrix { row: 4, column: 0 }));

        let mut keys = set.pressed();
        assert_eq!(keys.next(), Some(Key::Matrix { row: 0, column: 0 }));
        assert_eq!(keys.next(), Some(Key::Matrix { row: 1, column: 1 }));
        assert_eq!(keys.next(), Some(Key::Matrix { row: 3, column: 2 }));
        assert_eq!(keys.next(), Some(Key::Aux(0)));
        assert_eq!(keys.next(), None);
    }
}
