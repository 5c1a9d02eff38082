//! Report assembly and the send decision.
//!
//! Wire layout (8 bytes, little-endian):
//!
//! | offset | field              | type |
//! |--------|--------------------|------|
//! | 0      | tick time          | u16  |
//! | 2      | encoder timestamp  | u16  |
//! | 4      | encoder position   | i16  |
//! | 6      | button bitset      | u16  |

use crate::config::{MatrixConfig, REPORT_LEN};
use crate::encoder::EncoderData;
use crate::matrix::ButtonSet;
use crate::shared::Shared;

/// Errors from decoding a report received over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ReportError {
    #[error("report truncated: got {got} bytes, need {need}")]
    Truncated { got: usize, need: usize },
}

/// One input report.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Report {
    /// Tick counter when the report was built.
    pub tick_time: u16,
    pub encoder: EncoderData,
    /// Published button bitset.
    pub buttons: u16,
}

impl Report {
    pub const LEN: usize = REPORT_LEN;

    pub fn to_bytes(&self) -> [u8; REPORT_LEN] {
        let mut buf = [0u8; REPORT_LEN];
        buf[0..2].copy_from_slice(&self.tick_time.to_le_bytes());
        buf[2..4].copy_from_slice(&self.encoder.time.to_le_bytes());
        buf[4..6].copy_from_slice(&self.encoder.position.to_le_bytes());
        buf[6..8].copy_from_slice(&self.buttons.to_le_bytes());
        buf
    }

    /// Decode a report. Bytes past the report length are ignored.
    pub fn from_bytes(buf: &[u8]) -> Result<Self, ReportError> {
        if buf.len() < REPORT_LEN {
            return Err(ReportError::Truncated {
                got: buf.len(),
                need: REPORT_LEN,
            });
        }

        let word = |at: usize| [buf[at], buf[at + 1]];
        Ok(Self {
            tick_time: u16::from_le_bytes(word(0)),
            encoder: EncoderData {
                time: u16::from_le_bytes(word(2)),
                position: i16::from_le_bytes(word(4)),
            },
            buttons: u16::from_le_bytes(word(6)),
        })
    }

    /// Encoder movement since `prev`, accounting for 16-bit wraparound.
    pub fn position_delta(&self, prev: &Report) -> i16 {
        self.encoder.position.wrapping_sub(prev.encoder.position)
    }

    /// Ticks elapsed between the last encoder step and this report.
    pub fn encoder_age(&self) -> u16 {
        self.tick_time.wrapping_sub(self.encoder.time)
    }

    pub fn button_set(&self, config: MatrixConfig) -> ButtonSet {
        ButtonSet::new(self.buttons, config)
    }
}

/// Builds reports on behalf of the USB stack and decides which ones must be
/// transmitted.
///
/// Lives in the main loop. Data changes are edge-triggered: an encoder step
/// or a new button bitset flags exactly one report. The force-send countdown
/// guarantees a report at least every
/// [`FORCE_SEND_WINDOW`](crate::config::FORCE_SEND_WINDOW) ticks even if
/// nothing moves, since the transport may drop reports it considers
/// duplicates.
#[derive(Debug, Default)]
pub struct Coordinator {
    last_buttons: u16,
}

impl Coordinator {
    pub const fn new() -> Self {
        Self { last_buttons: 0 }
    }

    /// Assemble the next report. The flag tells whether it must be sent.
    pub fn build_report(&mut self, shared: &Shared) -> (Report, bool) {
        let (encoder, mut send) = shared.encoder_snapshot();

        let buttons = shared.buttons();
        if buttons != self.last_buttons {
            log::debug!("buttons {:#06x} -> {:#06x}", self.last_buttons, buttons);
            self.last_buttons = buttons;
            send = true;
        }

        let (tick_time, forced) = shared.stamp(send);
        if forced && !send {
            log::trace!("force-send window elapsed at tick {}", tick_time);
        }

        (
            Report {
                tick_time,
                encoder,
                buttons,
            },
            forced,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FORCE_SEND_WINDOW;
    use crate::shared::tests::FakePins;

    fn setup() -> (Shared, FakePins, Coordinator) {
        let shared = Shared::new(MatrixConfig::JOGPAD);
        let mut pins = FakePins::new();
        shared.start(&mut pins);
        (shared, pins, Coordinator::new())
    }

    #[test]
    fn test_wire_layout() {
        let report = Report {
            tick_time: 0x1234,
            encoder: EncoderData {
                time: 0xABCD,
                position: -2,
            },
            buttons: 0x3001,
        };
        assert_eq!(
            report.to_bytes(),
            [0x34, 0x12, 0xCD, 0xAB, 0xFE, 0xFF, 0x01, 0x30]
        );
        assert_eq!(Report::from_bytes(&report.to_bytes()), Ok(report));
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let buf = [1, 0, 2, 0, 3, 0, 4, 0, 0xEE, 0xEE];
        let report = Report::from_bytes(&buf).unwrap();
        assert_eq!(report.tick_time, 1);
        assert_eq!(report.encoder.time, 2);
        assert_eq!(report.encoder.position, 3);
        assert_eq!(report.buttons, 4);
    }

    #[test]
    fn test_decode_truncated() {
        assert_eq!(
            Report::from_bytes(&[0; 5]),
            Err(ReportError::Truncated { got: 5, need: 8 })
        );
    }

    #[test]
    fn test_delta_wraps() {
        let mut prev = Report::default();
        prev.encoder.position = i16::MAX;
        let mut next = Report::default();
        next.encoder.position = i16::MIN;
        assert_eq!(next.position_delta(&prev), 1);
        assert_eq!(prev.position_delta(&next), -1);
    }

    #[test]
    fn test_encoder_age_wraps() {
        let mut report = Report::default();
        report.tick_time = 5;
        report.encoder.time = u16::MAX - 4;
        assert_eq!(report.encoder_age(), 10);
    }

    #[test]
    fn test_first_report_is_forced() {
        let (shared, _pins, mut coord) = setup();
        let (report, send) = coord.build_report(&shared);
        assert!(send);
        assert_eq!(report, Report::default());
    }

    #[test]
    fn test_force_send_window() {
        let (shared, mut pins, mut coord) = setup();
        assert!(coord.build_report(&shared).1);

        for call in 1..FORCE_SEND_WINDOW {
            shared.tick(&mut pins);
            let (_, send) = coord.build_report(&shared);
            assert!(!send, "call {} should not send", call);
        }

        shared.tick(&mut pins);
        let (report, send) = coord.build_report(&shared);
        assert!(send);
        assert_eq!(report.tick_time, FORCE_SEND_WINDOW);
        assert_eq!(shared.force_send_remaining(), FORCE_SEND_WINDOW);

        shared.tick(&mut pins);
        assert!(!coord.build_report(&shared).1);
    }

    #[test]
    fn test_encoder_step_forces_send() {
        let (shared, mut pins, mut coord) = setup();
        coord.build_report(&shared);

        for _ in 0..1000 {
            shared.tick(&mut pins);
            coord.build_report(&shared);
        }
        pins.a = true;
        shared.tick(&mut pins);
        assert!(!coord.build_report(&shared).1);
        pins.b = true;
        shared.tick(&mut pins);

        let (report, send) = coord.build_report(&shared);
        assert!(send);
        assert_eq!(report.encoder.position, 1);
        assert_eq!(report.encoder.time, 1001);
        assert_eq!(shared.force_send_remaining(), FORCE_SEND_WINDOW);

        // Edge-triggered: the same position does not send again.
        shared.tick(&mut pins);
        let (report, send) = coord.build_report(&shared);
        assert!(!send);
        assert_eq!(report.encoder.position, 1);
    }

    #[test]
    fn test_button_change_forces_send() {
        let (shared, mut pins, mut coord) = setup();
        coord.build_report(&shared);

        pins.pressed = [0b0001, 0, 0];
        for _ in 0..149 {
            shared.tick(&mut pins);
            assert!(!coord.build_report(&shared).1);
        }
        shared.tick(&mut pins);
        let (report, send) = coord.build_report(&shared);
        assert!(send);
        assert_eq!(report.buttons, 1 << 8);

        // Held key: no further sends until it is released.
        for _ in 0..150 {
            shared.tick(&mut pins);
            assert!(!coord.build_report(&shared).1);
        }

        pins.pressed = [0; 3];
        for _ in 0..150 {
            shared.tick(&mut pins);
        }
        let (report, send) = coord.build_report(&shared);
        assert!(send);
        assert_eq!(report.buttons, 0);
    }

    #[test]
    fn test_change_resets_countdown() {
        let (shared, mut pins, mut coord) = setup();
        coord.build_report(&shared);

        for _ in 0..4000 {
            shared.tick(&mut pins);
            coord.build_report(&shared);
        }
        assert_eq!(shared.force_send_remaining(), FORCE_SEND_WINDOW - 4000);

        pins.a = true;
        shared.tick(&mut pins);
        pins.b = true;
        shared.tick(&mut pins);
        assert!(coord.build_report(&shared).1);
        assert_eq!(shared.force_send_remaining(), FORCE_SEND_WINDOW);

        // The full window must elapse again before the next forced report.
        for _ in 1..FORCE_SEND_WINDOW {
            shared.tick(&mut pins);
            assert!(!coord.build_report(&shared).1);
        }
        shared.tick(&mut pins);
        assert!(coord.build_report(&shared).1);
    }
}
