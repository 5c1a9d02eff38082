//! Core of the jogpad: a rotary encoder plus a small key matrix reported
//! over a polled USB HID interface.
//!
//! This crate is `no_std` and knows nothing about registers or USB. The
//! firmware feeds it pin levels from a 10 kHz timer interrupt and asks it
//! for reports whenever the HID endpoint is free; the host tool uses the
//! same [`Report`] type to decode what arrives.
//!
//! - [`encoder`]: table-driven quadrature decoder
//! - [`matrix`]: column-strobed key matrix scanner
//! - [`report`]: report wire format and the send decision
//! - [`Shared`]: the interrupt-owned state, read under critical sections

#![no_std]

pub mod config;
pub mod encoder;
pub mod io;
pub mod link;
pub mod matrix;
pub mod report;
mod shared;

pub use config::MatrixConfig;
pub use encoder::{EncoderData, QuadratureDecoder};
pub use io::{EncoderPins, MatrixPins};
pub use link::{IdleTimer, LinkMonitor, LinkState};
pub use matrix::{ButtonSet, Key, MatrixScanner};
pub use report::{Coordinator, Report, ReportError};
pub use shared::Shared;
