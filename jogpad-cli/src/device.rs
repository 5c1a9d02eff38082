use anyhow::{Context, Result};
use jogpad_core::Report;
use rusb::{Device, DeviceHandle, GlobalContext};
use std::time::Duration;

/// HID interface number of the jogpad.
const INTERFACE: u8 = 0;

/// Interrupt IN endpoint carrying reports.
const REPORT_ENDPOINT: u8 = 0x81;

/// USB identifiers to look for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceId {
    pub vid: u16,
    pub pid: u16,
}

/// Enumerate attached devices matching `id`.
pub fn find(id: DeviceId) -> Result<Vec<Device<GlobalContext>>> {
    let devices = rusb::devices().context("failed to enumerate USB devices")?;
    let mut found = Vec::new();
    for device in devices.iter() {
        let desc = device
            .device_descriptor()
            .context("failed to read device descriptor")?;
        if desc.vendor_id() == id.vid && desc.product_id() == id.pid {
            found.push(device);
        }
    }
    Ok(found)
}

/// An opened jogpad with its HID interface claimed.
pub struct Jogpad {
    handle: DeviceHandle<GlobalContext>,
    /// Kernel driver to give the interface back to on drop.
    reattach: bool,
}

impl Jogpad {
    /// Open the first device matching `id` and claim its HID interface.
    pub fn open(id: DeviceId) -> Result<Self> {
        let device = find(id)?.into_iter().next().with_context(|| {
            format!(
                "no device with ID {:04x}:{:04x} found. Is the jogpad plugged in?",
                id.vid, id.pid
            )
        })?;

        log::info!(
            "opening jogpad on bus {} address {}",
            device.bus_number(),
            device.address()
        );
        let handle = device
            .open()
            .context("failed to open jogpad (may need root/sudo or udev rules)")?;

        // Not every platform can tell; treat that as "no driver attached".
        let reattach = handle.kernel_driver_active(INTERFACE).unwrap_or(false);
        if reattach {
            log::debug!("detaching kernel HID driver from interface {}", INTERFACE);
            handle
                .detach_kernel_driver(INTERFACE)
                .context("failed to detach kernel HID driver")?;
        }

        handle
            .claim_interface(INTERFACE)
            .context("failed to claim HID interface")?;

        Ok(Self { handle, reattach })
    }

    /// Wait for the next report. Returns `None` if nothing arrived before
    /// `timeout`.
    pub fn read_report(&self, timeout: Duration) -> Result<Option<Report>> {
        let mut buf = [0u8; 64];
        match self.handle.read_interrupt(REPORT_ENDPOINT, &mut buf, timeout) {
            Ok(len) => {
                let report = Report::from_bytes(&buf[..len]).context("malformed report")?;
                Ok(Some(report))
            }
            Err(rusb::Error::Timeout) => Ok(None),
            Err(err) => Err(err).context("interrupt transfer failed"),
        }
    }
}

impl Drop for Jogpad {
    fn drop(&mut self) {
        let _ = self.handle.release_interface(INTERFACE);
        if self.reattach {
            if let Err(err) = self.handle.attach_kernel_driver(INTERFACE) {
                log::warn!("could not reattach kernel HID driver: {}", err);
            }
        }
    }
}
