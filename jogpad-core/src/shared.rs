//! State shared between the tick interrupt and the main loop.
//!
//! The tick handler is the only writer. Every reader copies what it needs
//! out of a short critical section, which on the AVR target means interrupts
//! are disabled for a handful of loads.

use core::cell::RefCell;

use critical_section::Mutex;

use crate::config::{MatrixConfig, FORCE_SEND_WINDOW};
use crate::encoder::{EncoderData, QuadratureDecoder};
use crate::io::{EncoderPins, MatrixPins};
use crate::matrix::MatrixScanner;

/// Everything the tick handler mutates.
#[derive(Debug)]
struct TickState {
    encoder: QuadratureDecoder,
    matrix: MatrixScanner,
    /// Free-running tick counter.
    now: u16,
    /// Ticks left until a report is forced out.
    force_send: u16,
}

impl TickState {
    fn tick<P: EncoderPins + MatrixPins>(&mut self, pins: &mut P) {
        self.encoder.tick(self.now, pins);
        self.matrix.tick(pins);

        self.now = self.now.wrapping_add(1);
        self.force_send = self.force_send.saturating_sub(1);
    }
}

/// Root object for all tick-driven state.
///
/// Meant to live in a `static`:
///
/// ```ignore
/// static SHARED: Shared = Shared::new(MatrixConfig::JOGPAD);
/// ```
pub struct Shared {
    state: Mutex<RefCell<TickState>>,
}

impl Shared {
    pub const fn new(config: MatrixConfig) -> Self {
        Self {
            state: Mutex::new(RefCell::new(TickState {
                encoder: QuadratureDecoder::new(),
                matrix: MatrixScanner::new(config),
                now: 0,
                // Zero so that the first report after power-up goes out.
                force_send: 0,
            })),
        }
    }

    /// Prepare the pins and decoder before the tick interrupt is enabled.
    pub fn start<P: EncoderPins + MatrixPins>(&self, pins: &mut P) {
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            state.encoder.prime(pins);
            state.matrix.start(pins);
        });
    }

    /// Tick handler body. Runs once per tick from the timer interrupt.
    pub fn tick<P: EncoderPins + MatrixPins>(&self, pins: &mut P) {
        critical_section::with(|cs| self.state.borrow_ref_mut(cs).tick(pins));
    }

    /// Encoder data and whether it changed since the previous call.
    pub fn encoder_snapshot(&self) -> (EncoderData, bool) {
        critical_section::with(|cs| self.state.borrow_ref_mut(cs).encoder.take())
    }

    /// Last published button bitset.
    pub fn buttons(&self) -> u16 {
        critical_section::with(|cs| self.state.borrow_ref(cs).matrix.result())
    }

    #[cfg(test)]
    fn now(&self) -> u16 {
        critical_section::with(|cs| self.state.borrow_ref(cs).now)
    }

    /// Read the tick counter and settle the force-send countdown in one
    /// critical section.
    ///
    /// Returns the tick time and the final send decision: `changed` is
    /// upgraded to `true` if the countdown has run out, and a `true`
    /// decision reloads the countdown.
    pub(crate) fn stamp(&self, changed: bool) -> (u16, bool) {
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            let send = changed || state.force_send == 0;
            if send {
                state.force_send = FORCE_SEND_WINDOW;
            }
            (state.now, send)
        })
    }

    #[cfg(test)]
    pub(crate) fn force_send_remaining(&self) -> u16 {
        critical_section::with(|cs| self.state.borrow_ref(cs).force_send)
    }
}
