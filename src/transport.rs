//! The transport seam between the command layer and the wire.
//!
//! Everything the library asks of a device is expressible as one
//! control-transfer-shaped primitive, so this is all a backend has to
//! provide.  The USB backend lives in [`crate::usb`]; tests drive the
//! command layer with in-memory implementations.

use thiserror::Error;

/// Direction of a control transfer's data stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Host to device; `data` is sent.
    Out,
    /// Device to host; `data` is filled in.
    In,
}

/// A transport-level failure, with a backend-specific message.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// A channel to one device.
///
/// Implementations perform a single control transfer: `request` selects the
/// operation, `value` and `index` carry its 16-bit arguments, and `data` is
/// the data stage (sent for [`Direction::Out`], filled for
/// [`Direction::In`]).  Returns the number of data bytes transferred.
pub trait Transport {
    /// Perform one control transfer.
    fn control(
        &mut self,
        direction: Direction,
        request: u8,
        value: u16,
        index: u16,
        data: &mut [u8],
    ) -> Result<usize, TransportError>;
}
