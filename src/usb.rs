//! USB backend built on `rusb`.
//!
//! Discovery filters the bus by the vendor and product IDs below;
//! [`UsbTransport`] maps the [`Transport`] primitive onto vendor control
//! transfers with a fixed timeout.

use std::time::Duration;

use rusb::{Context, DeviceHandle, UsbContext};
use tracing::debug;

use crate::device::Device;
use crate::error::{Error, Result};
use crate::settings::Product;
use crate::transport::{Direction, Transport, TransportError};

/// Vendor ID of the supported controllers.
pub const VENDOR_ID: u16 = 0x1FFB;

const CONTROL_TIMEOUT: Duration = Duration::from_millis(300);

const REQUEST_TYPE_OUT: u8 = 0x40; // vendor, device, host-to-device
const REQUEST_TYPE_IN: u8 = 0xC0; // vendor, device, device-to-host

fn product_from_id(product_id: u16) -> Option<Product> {
    match product_id {
        0x00B3 => Some(Product::Drv8825),
        0x00B5 => Some(Product::Drv8834),
        0x00BD => Some(Product::Mp6500),
        _ => None,
    }
}

/// One controller found on the bus.
pub struct DeviceInfo {
    device: rusb::Device<Context>,
    /// Which product this is.
    pub product: Product,
    /// The device's unique serial number.
    pub serial_number: String,
}

impl DeviceInfo {
    /// A short human-readable name, such as `drv8825 #123456`.
    pub fn name(&self) -> String {
        format!("{} #{}", self.product, self.serial_number)
    }

    /// Open the device for use.
    pub fn open(&self) -> Result<Device<UsbTransport>> {
        debug!(name = %self.name(), "opening device");
        let handle = self.device.open().map_err(open_error)?;
        Ok(Device::new(
            UsbTransport {
                handle,
                timeout: CONTROL_TIMEOUT,
            },
            self.product,
        ))
    }
}

fn open_error(e: rusb::Error) -> Error {
    Error::Transport {
        context: "There was an error opening the device.".to_string(),
        message: e.to_string(),
    }
}

fn list_error(e: rusb::Error) -> Error {
    Error::Transport {
        context: "There was an error listing devices.".to_string(),
        message: e.to_string(),
    }
}

/// Every supported controller currently on the bus.
///
/// Devices that cannot be opened to read a serial number are skipped;
/// that usually means a permissions problem, not a protocol one.
pub fn list_devices() -> Result<Vec<DeviceInfo>> {
    let context = Context::new().map_err(list_error)?;
    let mut found = Vec::new();
    for device in context.devices().map_err(list_error)?.iter() {
        let descriptor = match device.device_descriptor() {
            Ok(descriptor) => descriptor,
            Err(_) => continue,
        };
        if descriptor.vendor_id() != VENDOR_ID {
            continue;
        }
        let Some(product) = product_from_id(descriptor.product_id()) else {
            continue;
        };
        let serial_number = match device
            .open()
            .and_then(|handle| handle.read_serial_number_string_ascii(&descriptor))
        {
            Ok(serial_number) => serial_number,
            Err(e) => {
                debug!(error = %e, "skipping unreadable device");
                continue;
            }
        };
        found.push(DeviceInfo {
            device,
            product,
            serial_number,
        });
    }
    Ok(found)
}

/// Find a device by serial number, or the sole device when `serial_number`
/// is `None`.
pub fn find_device(serial_number: Option<&str>) -> Result<DeviceInfo> {
    let mut devices = list_devices()?;
    match serial_number {
        Some(wanted) => devices
            .into_iter()
            .find(|info| info.serial_number == wanted)
            .ok_or(Error::NoDeviceFound),
        None => {
            if devices.len() > 1 {
                return Err(Error::Transport {
                    context: "Multiple devices are connected.".to_string(),
                    message: "Specify one with -d SERIALNUMBER.".to_string(),
                });
            }
            devices.pop().ok_or(Error::NoDeviceFound)
        }
    }
}

/// [`Transport`] over rusb vendor control transfers.
pub struct UsbTransport {
    handle: DeviceHandle<Context>,
    timeout: Duration,
}

impl Transport for UsbTransport {
    fn control(
        &mut self,
        direction: Direction,
        request: u8,
        value: u16,
        index: u16,
        data: &mut [u8],
    ) -> std::result::Result<usize, TransportError> {
        let result = match direction {
            Direction::In => {
                self.handle
                    .read_control(REQUEST_TYPE_IN, request, value, index, data, self.timeout)
            }
            Direction::Out => {
                self.handle
                    .write_control(REQUEST_TYPE_OUT, request, value, index, data, self.timeout)
            }
        };
        result.map_err(|e| {
            debug!(request, error = %e, "control transfer failed");
            TransportError(e.to_string())
        })
    }
}
