//! Compile-time configuration shared by the firmware and the host tool.

/// Frequency of the timer tick that drives the decoder and the scanner.
///
/// Encoder timestamps and report tick times count in units of this tick.
pub const TICK_HZ: u32 = 10_000;

/// Number of ticks after which a report is flagged for sending even if
/// nothing changed. 5000 ticks = 500ms at [`TICK_HZ`].
pub const FORCE_SEND_WINDOW: u16 = 5000;

/// Size of one report on the wire.
pub const REPORT_LEN: usize = 8;

/// USB vendor ID (shared V-USB generic HID pair).
pub const USB_VID: u16 = 0x16C0;
/// USB product ID.
pub const USB_PID: u16 = 0x05DF;

/// Width of the published button bitset.
const BUTTON_BITS: u8 = 16;

/// Physical layout of the key matrix and its auxiliary keys.
///
/// All values are fixed when the firmware is built. [`MatrixConfig::new`]
/// is the only constructor. It is a `const fn` that refuses layouts which
/// would not fit the 16-bit button field, so a bad layout fails to compile
/// when used in a `const`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatrixConfig {
    rows: u8,
    columns: u8,
    divider: u8,
    aux_bits: [u8; 2],
}

impl MatrixConfig {
    /// Reference layout: 4 rows x 3 columns, one column every 50 ticks,
    /// auxiliary keys at bits 12 and 13.
    pub const JOGPAD: Self = Self::new(4, 3, 50, [12, 13]);

    pub const fn new(rows: u8, columns: u8, divider: u8, aux_bits: [u8; 2]) -> Self {
        assert!(rows > 0 && rows <= 8, "rows must be 1..=8");
        assert!(columns > 0 && columns <= 8, "columns must be 1..=8");
        assert!(divider > 0, "scan divider must be non-zero");

        let matrix_bits = rows as u16 * columns as u16;
        assert!(matrix_bits <= BUTTON_BITS as u16, "matrix does not fit the button field");

        let mut i = 0;
        while i < aux_bits.len() {
            assert!(aux_bits[i] < BUTTON_BITS, "aux key outside the button field");
            assert!(aux_bits[i] as u16 >= matrix_bits, "aux key overlaps matrix bits");
            i += 1;
        }
        assert!(aux_bits[0] != aux_bits[1], "aux keys share a bit");

        Self {
            rows,
            columns,
            divider,
            aux_bits,
        }
    }

    /// Row inputs sampled per column.
    pub const fn rows(&self) -> u8 {
        self.rows
    }

    /// Column outputs strobed one at a time.
    pub const fn columns(&self) -> u8 {
        self.columns
    }

    /// Ticks between two column samples.
    pub const fn divider(&self) -> u8 {
        self.divider
    }

    /// Bit positions of the two direct-wired auxiliary keys.
    pub const fn aux_bits(&self) -> [u8; 2] {
        self.aux_bits
    }

    /// Mask selecting the row bits of one raw row read.
    pub const fn row_mask(&self) -> u8 {
        ((1u16 << self.rows) - 1) as u8
    }

    /// One-hot mask of the column strobed last in a sweep.
    pub const fn last_column(&self) -> u8 {
        1 << (self.columns - 1)
    }

    /// Ticks needed for one full sweep over all columns.
    pub const fn sweep_ticks(&self) -> u16 {
        self.divider as u16 * self.columns as u16
    }
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self::JOGPAD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_layout() {
        let cfg = MatrixConfig::JOGPAD;
        assert_eq!(cfg.row_mask(), 0x0F);
        assert_eq!(cfg.last_column(), 0b100);
        assert_eq!(cfg.sweep_ticks(), 150);
    }

    #[test]
    fn test_getters_return_constructor_arguments() {
        let cfg = MatrixConfig::new(2, 5, 7, [14, 10]);
        assert_eq!(cfg.rows(), 2);
        assert_eq!(cfg.columns(), 5);
        assert_eq!(cfg.divider(), 7);
        assert_eq!(cfg.aux_bits(), [14, 10]);
        assert_eq!(cfg.last_column(), 0b1_0000);
    }

    #[test]
    #[should_panic]
    fn test_rejects_too_many_columns() {
        let _ = MatrixConfig::new(4, 9, 1, [14, 15]);
    }

    #[test]
    fn test_full_width_rows() {
        let cfg = MatrixConfig::new(8, 1, 1, [8, 9]);
        assert_eq!(cfg.row_mask(), 0xFF);
    }

    #[test]
    #[should_panic]
    fn test_rejects_aux_overlap() {
        let _ = MatrixConfig::new(4, 3, 50, [11, 13]);
    }

    #[test]
    #[should_panic]
    fn test_rejects_oversized_matrix() {
        let _ = MatrixConfig::new(6, 3, 50, [14, 15]);
    }
}
