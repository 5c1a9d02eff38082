//! USB HID device for ATmega32U4.
//!
//! A single vendor-defined HID interface with one 8-byte interrupt IN
//! endpoint carrying [`Report`]s. Everything is polled from the main loop
//! using direct register access via avr-device.
//!
//! Once configured, the device asks the [`Coordinator`] for a report each
//! time the IN bank is free (at most once per USB frame) and transmits it
//! when the coordinator flags it, or when the host-selected idle period has
//! run out.

use avr_device::atmega32u4::Peripherals;
use jogpad_core::config::{REPORT_LEN, USB_PID, USB_VID};
use jogpad_core::{Coordinator, IdleTimer, LinkMonitor, LinkState, Report, Shared};

const EP0_SIZE: u8 = 64;
const EP1_SIZE: u8 = 8;
const POLL_INTERVAL_MS: u8 = 5;

// UECFG0X.EPTYPE / UECFG1X.EPSIZE encodings
const EPTYPE_CONTROL: u8 = 0b00;
const EPTYPE_INTERRUPT: u8 = 0b11;
const EPSIZE_8: u8 = 0b000;
const EPSIZE_64: u8 = 0b011;

const _: () = assert!(REPORT_LEN == EP1_SIZE as usize);

const USBSTA_VBUS: u8 = 1 << 0;
const UESTA0X_CFGOK: u8 = 1 << 7;
/// Frame numbers are 11 bits wide.
const FRAME_MASK: u16 = 0x07FF;

const MANUFACTURER: &str = "jogpad";
const PRODUCT: &str = "Jogpad Encoder";

/// Vendor-defined report: four 16-bit fields in wire order.
static HID_REPORT_DESCRIPTOR: [u8; 29] = [
    0x06, 0x00, 0xFF, // Usage Page (Vendor Defined 0xFF00)
    0x09, 0x01, // Usage (0x01)
    0xA1, 0x01, // Collection (Application)
    0x15, 0x00, //   Logical Minimum (0)
    0x27, 0xFF, 0xFF, 0x00, 0x00, //   Logical Maximum (65535)
    0x75, 0x10, //   Report Size (16)
    0x95, 0x04, //   Report Count (4)
    0x09, 0x02, //   Usage (tick time)
    0x09, 0x03, //   Usage (encoder timestamp)
    0x09, 0x04, //   Usage (encoder position)
    0x09, 0x05, //   Usage (buttons)
    0x81, 0x02, //   Input (Data, Variable, Absolute)
    0xC0, // End Collection
];

static DEVICE_DESCRIPTOR: [u8; 18] = [
    18,   // bLength
    1,    // bDescriptorType (Device)
    0x10, 0x01, // bcdUSB (1.1)
    0,    // bDeviceClass (defined at interface level)
    0,    // bDeviceSubClass
    0,    // bDeviceProtocol
    EP0_SIZE, // bMaxPacketSize0
    USB_VID as u8, (USB_VID >> 8) as u8, // idVendor
    USB_PID as u8, (USB_PID >> 8) as u8, // idProduct
    0x01, 0x00, // bcdDevice (0.01)
    1,    // iManufacturer
    2,    // iProduct
    0,    // iSerialNumber
    1,    // bNumConfigurations
];

/// Offset of the HID class descriptor inside [`CONFIG_DESCRIPTOR`].
const HID_DESCRIPTOR_OFFSET: usize = 18;

static CONFIG_DESCRIPTOR: [u8; 34] = [
    // Configuration descriptor
    9,    // bLength
    2,    // bDescriptorType (Configuration)
    34, 0, // wTotalLength
    1,    // bNumInterfaces
    1,    // bConfigurationValue
    0,    // iConfiguration
    0xC0, // bmAttributes (self powered)
    50,   // bMaxPower (100mA)
    // Interface descriptor
    9,    // bLength
    4,    // bDescriptorType (Interface)
    0,    // bInterfaceNumber
    0,    // bAlternateSetting
    1,    // bNumEndpoints
    3,    // bInterfaceClass (HID)
    0,    // bInterfaceSubClass (none)
    0,    // bInterfaceProtocol (none)
    0,    // iInterface
    // HID descriptor
    9,    // bLength
    0x21, // bDescriptorType (HID)
    0x11, 0x01, // bcdHID (1.11)
    0,    // bCountryCode
    1,    // bNumDescriptors
    0x22, // bDescriptorType (Report)
    HID_REPORT_DESCRIPTOR.len() as u8, 0, // wDescriptorLength
    // Endpoint descriptor (EP1 IN - interrupt)
    7,    // bLength
    5,    // bDescriptorType (Endpoint)
    0x81, // bEndpointAddress (EP1 IN)
    0x03, // bmAttributes (Interrupt)
    EP1_SIZE, 0, // wMaxPacketSize
    POLL_INTERVAL_MS, // bInterval
];

/// String descriptor 0 (language ID)
static STRING_DESC_0: [u8; 4] = [4, 3, 0x09, 0x04]; // English (US)
static STRING_DESC_1: [u8; 2 + 2 * MANUFACTURER.len()] = string_descriptor(MANUFACTURER);
static STRING_DESC_2: [u8; 2 + 2 * PRODUCT.len()] = string_descriptor(PRODUCT);

/// Build a UTF-16LE string descriptor from an ASCII string at compile time.
const fn string_descriptor<const N: usize>(s: &str) -> [u8; N] {
    let bytes = s.as_bytes();
    assert!(N == 2 + 2 * bytes.len());

    let mut desc = [0u8; N];
    desc[0] = N as u8;
    desc[1] = 3;
    let mut i = 0;
    while i < bytes.len() {
        assert!(bytes[i].is_ascii());
        desc[2 + 2 * i] = bytes[i];
        i += 1;
    }
    desc
}

/// The eight bytes of a SETUP packet, in wire order.
struct SetupPacket {
    request_type: u8,
    request: u8,
    value: u16,
    length: u16,
}

impl SetupPacket {
    fn value_low(&self) -> u8 {
        self.value as u8
    }

    fn value_high(&self) -> u8 {
        (self.value >> 8) as u8
    }
}

/// Device side of the USB link.
pub struct UsbHid {
    link: LinkMonitor,
    idle: IdleTimer,
    last_frame: u16,
}

impl UsbHid {
    pub const fn new() -> Self {
        Self {
            link: LinkMonitor::new(),
            idle: IdleTimer::new(),
            last_frame: 0,
        }
    }

    /// Bring up the pad regulator, the PLL and the controller, then attach.
    pub fn init(&mut self, dp: &Peripherals) {
        let usb = &dp.USB_DEVICE;

        usb.uhwcon.write(|w| w.uvrege().set_bit());
        usb.usbcon.write(|w| w.usbe().set_bit().otgpade().set_bit());

        // 16 MHz crystal: divide by 2 into the PLL for the 48 MHz USB clock
        dp.PLL.pllcsr.write(|w| w.pindiv().set_bit().plle().set_bit());
        while dp.PLL.pllcsr.read().plock().bit_is_clear() {}

        usb.usbcon.modify(|_, w| w.frzclk().clear_bit());
        usb.udcon.modify(|_, w| w.detach().clear_bit());
        usb.udien.write(|w| w.eorste().set_bit());

        self.link.set(LinkState::Disconnected);
    }

    /// Handle bus events and control requests, then offer a report if the
    /// link is up. Called from the main loop.
    pub fn poll(&mut self, dp: &Peripherals, shared: &Shared, coordinator: &mut Coordinator) {
        let usb = &dp.USB_DEVICE;

        if usb.usbsta.read().bits() & USBSTA_VBUS == 0 {
            self.link.set(LinkState::Disconnected);
            return;
        }

        if usb.udint.read().eorsti().bit_is_set() {
            usb.udint.modify(|_, w| w.eorsti().clear_bit());
            self.configure_endpoint(dp, 0, EPTYPE_CONTROL, false, EPSIZE_64);
            self.idle.reset();
            self.link.set(LinkState::Enumerating);
        }

        self.select_endpoint(dp, 0);
        if usb.ueintx.read().rxstpi().bit_is_set() {
            let setup = self.read_setup(dp);
            self.handle_setup(dp, &setup, shared, coordinator);
        }

        if self.link.state().is_ready() {
            self.service_report(dp, shared, coordinator);
        }
    }

    /// Offer the next report to the host if the IN bank is free.
    fn service_report(&mut self, dp: &Peripherals, shared: &Shared, coordinator: &mut Coordinator) {
        let usb = &dp.USB_DEVICE;

        // One report per frame at most.
        let frame = usb.udfnum.read().bits() & FRAME_MASK;
        if frame == self.last_frame {
            return;
        }
        self.idle.frame_elapsed(frame.wrapping_sub(self.last_frame) & FRAME_MASK);
        self.last_frame = frame;

        self.select_endpoint(dp, 1);
        if usb.ueintx.read().rwal().bit_is_clear() {
            return;
        }

        let (report, must_send) = coordinator.build_report(shared);
        if !self.idle.should_send(must_send) {
            return;
        }

        for byte in report.to_bytes() {
            usb.uedatx.write(|w| w.bits(byte));
        }
        usb.ueintx.modify(|_, w| w.fifocon().clear_bit().txini().clear_bit());
        self.idle.sent();
    }

    /// Enable and allocate endpoint `ep`. Returns whether the controller
    /// accepted the configuration. EP0 is left selected.
    fn configure_endpoint(&self, dp: &Peripherals, ep: u8, kind: u8, dir_in: bool, size: u8) -> bool {
        let usb = &dp.USB_DEVICE;

        self.select_endpoint(dp, ep);
        usb.ueconx.write(|w| w.epen().set_bit());
        usb.uecfg0x.write(|w| w.eptype().bits(kind).epdir().bit(dir_in));
        usb.uecfg1x.write(|w| w.epsize().bits(size).alloc().set_bit());

        let ok = usb.uesta0x.read().bits() & UESTA0X_CFGOK != 0;
        self.select_endpoint(dp, 0);
        ok
    }

    fn select_endpoint(&self, dp: &Peripherals, ep: u8) {
        dp.USB_DEVICE.uenum.write(|w| w.bits(ep & 0x07));
    }

    fn read_setup(&self, dp: &Peripherals) -> SetupPacket {
        let usb = &dp.USB_DEVICE;
        let mut raw = [0u8; 8];
        for byte in raw.iter_mut() {
            *byte = usb.uedatx.read().bits();
        }
        usb.ueintx.modify(|_, w| w.rxstpi().clear_bit());

        SetupPacket {
            request_type: raw[0],
            request: raw[1],
            value: u16::from_le_bytes([raw[2], raw[3]]),
            length: u16::from_le_bytes([raw[6], raw[7]]),
        }
    }

    fn handle_setup(
        &mut self,
        dp: &Peripherals,
        setup: &SetupPacket,
        shared: &Shared,
        coordinator: &mut Coordinator,
    ) {
        let usb = &dp.USB_DEVICE;
        let len = setup.length;

        match (setup.request_type, setup.request) {
            // GET_STATUS: self powered, no remote wakeup
            (0x80, 0x00) => self.control_in(dp, &[0x01, 0x00], len),

            (0x80, 0x06) => match (setup.value_high(), setup.value_low()) {
                (1, _) => self.control_in(dp, &DEVICE_DESCRIPTOR, len),
                (2, _) => self.control_in(dp, &CONFIG_DESCRIPTOR, len),
                (3, 0) => self.control_in(dp, &STRING_DESC_0, len),
                (3, 1) => self.control_in(dp, &STRING_DESC_1, len),
                (3, 2) => self.control_in(dp, &STRING_DESC_2, len),
                _ => self.stall(dp),
            },

            // SET_ADDRESS takes effect after the status stage
            (0x00, 0x05) => {
                self.ack_status(dp);
                while usb.ueintx.read().txini().bit_is_clear() {}
                let address = setup.value_low() & 0x7F;
                usb.udaddr.write(|w| w.uadd().bits(address).adden().set_bit());
            }

            // SET_CONFIGURATION
            (0x00, 0x09) => {
                self.ack_status(dp);
                if setup.value_low() == 0 {
                    self.link.set(LinkState::Enumerating);
                } else if self.configure_endpoint(dp, 1, EPTYPE_INTERRUPT, true, EPSIZE_8) {
                    self.idle.set_rate(IdleTimer::DEFAULT_RATE);
                    self.link.set(LinkState::Ready);
                } else {
                    self.link.set(LinkState::Error);
                }
            }

            // GET_CONFIGURATION
            (0x80, 0x08) => {
                let value = u8::from(self.link.state().is_ready());
                self.control_in(dp, &[value], len);
            }

            // Class descriptors addressed to the interface
            (0x81, 0x06) => match setup.value_high() {
                0x21 => self.control_in(
                    dp,
                    &CONFIG_DESCRIPTOR[HID_DESCRIPTOR_OFFSET..HID_DESCRIPTOR_OFFSET + 9],
                    len,
                ),
                0x22 => self.control_in(dp, &HID_REPORT_DESCRIPTOR, len),
                _ => self.stall(dp),
            },

            // GET_REPORT
            (0xA1, 0x01) => {
                let (report, _) = coordinator.build_report(shared);
                self.control_in(dp, &report.to_bytes(), len);
            }

            // GET_IDLE
            (0xA1, 0x02) => self.control_in(dp, &[self.idle.rate()], len),

            // GET_PROTOCOL: report protocol only
            (0xA1, 0x03) => self.control_in(dp, &[1], len),

            // SET_IDLE
            (0x21, 0x0A) => {
                self.idle.set_rate(setup.value_high());
                log::debug!(
                    "host idle rate: {} ms",
                    self.idle.rate() as u16 * IdleTimer::MS_PER_UNIT
                );
                self.ack_status(dp);
            }

            // SET_PROTOCOL
            (0x21, 0x0B) => self.ack_status(dp),

            _ => {
                log::trace!(
                    "stall request {:#04x}/{:#04x}",
                    setup.request_type,
                    setup.request
                );
                self.stall(dp);
            }
        }
    }

    /// Data stage of an IN control transfer, split into EP0-sized packets
    /// and cut to what the host asked for.
    fn control_in(&self, dp: &Peripherals, data: &[u8], requested: u16) {
        let usb = &dp.USB_DEVICE;
        let data = &data[..data.len().min(requested as usize)];

        for packet in data.chunks(EP0_SIZE as usize) {
            while usb.ueintx.read().txini().bit_is_clear() {}
            for &byte in packet {
                usb.uedatx.write(|w| w.bits(byte));
            }
            usb.ueintx.modify(|_, w| w.txini().clear_bit());
        }

        // Host acknowledges with an empty OUT packet
        while usb.ueintx.read().rxouti().bit_is_clear() {}
        usb.ueintx.modify(|_, w| w.rxouti().clear_bit());
    }

    /// Zero-length IN packet closing a no-data control request.
    fn ack_status(&self, dp: &Peripherals) {
        dp.USB_DEVICE.ueintx.modify(|_, w| w.txini().clear_bit());
    }

    fn stall(&self, dp: &Peripherals) {
        dp.USB_DEVICE.ueconx.modify(|_, w| w.stallrq().set_bit());
    }
}

impl Default for UsbHid {
    fn default() -> Self {
        Self::new()
    }
}

// GET_REPORT answers in a single control packet.
const _: () = assert!(Report::LEN <= EP0_SIZE as usize);
