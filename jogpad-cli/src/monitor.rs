//! Human-readable rendering of a report stream.

use jogpad_core::config::TICK_HZ;
use jogpad_core::{Key, MatrixConfig, Report};

/// Formats consecutive reports, tracking the previous one for deltas.
pub struct Monitor {
    config: MatrixConfig,
    prev: Option<Report>,
}

impl Monitor {
    pub fn new(config: MatrixConfig) -> Self {
        Self { config, prev: None }
    }

    /// Render one report as a single line.
    pub fn line(&mut self, report: &Report) -> String {
        let delta = self
            .prev
            .as_ref()
            .map(|prev| report.position_delta(prev))
            .unwrap_or(0);
        self.prev = Some(*report);

        let age_ms = report.encoder_age() as f64 * 1000.0 / TICK_HZ as f64;
        let keys: Vec<String> = report.button_set(self.config).pressed().map(key_name).collect();

        format!(
            "t={:5} pos={:6} delta={:+4} age={:7.1}ms keys=[{}]",
            report.tick_time,
            report.encoder.position,
            delta,
            age_ms,
            keys.join(" ")
        )
    }
}

fn key_name(key: Key) -> String {
    match key {
        Key::Matrix { row, column } => format!("r{}c{}", row, column),
        Key::Aux(index) => format!("aux{}", index),
    }
}
