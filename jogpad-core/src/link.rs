//! USB link state and HID idle timing as seen by the application.

/// Coarse state of the USB link.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i8)]
pub enum LinkState {
    /// No VBUS, or not yet attached.
    Disconnected = 0,
    /// Attached and being enumerated by the host.
    Enumerating = 1,
    /// Configured; reports can flow.
    Ready = 2,
    /// Endpoint configuration failed.
    Error = -1,
}

impl LinkState {
    /// Stable numeric code of this state.
    pub fn code(self) -> i8 {
        self as i8
    }

    pub fn is_ready(self) -> bool {
        self == Self::Ready
    }
}

/// Tracks the link state and logs transitions.
#[derive(Debug)]
pub struct LinkMonitor {
    state: LinkState,
}

impl LinkMonitor {
    pub const fn new() -> Self {
        Self {
            state: LinkState::Disconnected,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Record a new state. Returns `true` if it differs from the old one.
    pub fn set(&mut self, state: LinkState) -> bool {
        if state == self.state {
            return false;
        }

        match state {
            LinkState::Error => {
                log::error!("usb link: {:?} -> {:?} ({})", self.state, state, state.code())
            }
            _ => log::info!("usb link: {:?} -> {:?} ({})", self.state, state, state.code()),
        }
        self.state = state;
        true
    }
}

impl Default for LinkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// HID idle period selected by the host through SET_IDLE.
///
/// The rate is kept in the 4 ms units of the request. While it is non-zero,
/// a report goes out once the period has elapsed since the last one even if
/// nothing changed. A rate of 0 means reports are only sent on demand.
#[derive(Debug)]
pub struct IdleTimer {
    rate: u8,
    remaining_ms: u16,
}

impl IdleTimer {
    /// Milliseconds per unit of the SET_IDLE rate.
    pub const MS_PER_UNIT: u16 = 4;

    /// Rate loaded when the interface is configured (500 ms).
    pub const DEFAULT_RATE: u8 = 125;

    pub const fn new() -> Self {
        Self {
            rate: 0,
            remaining_ms: 0,
        }
    }

    /// Current rate in 4 ms units, as returned by GET_IDLE.
    pub fn rate(&self) -> u8 {
        self.rate
    }

    /// Select a new rate and restart the period.
    pub fn set_rate(&mut self, rate: u8) {
        self.rate = rate;
        self.remaining_ms = self.period_ms();
    }

    /// Account for `ms` milliseconds of bus time.
    pub fn frame_elapsed(&mut self, ms: u16) {
        self.remaining_ms = self.remaining_ms.saturating_sub(ms);
    }

    /// Final send decision for a report the coordinator flagged with
    /// `must_send`.
    pub fn should_send(&self, must_send: bool) -> bool {
        must_send || (self.rate != 0 && self.remaining_ms == 0)
    }

    /// A report went out; restart the period.
    pub fn sent(&mut self) {
        self.remaining_ms = self.period_ms();
    }

    /// Bus reset: back to sending on demand only.
    pub fn reset(&mut self) {
        self.rate = 0;
        self.remaining_ms = 0;
    }

    fn period_ms(&self) -> u16 {
        self.rate as u16 * Self::MS_PER_UNIT
    }
}

impl Default for IdleTimer {
    fn default() -> Self {
        Self::new()
    }
}
