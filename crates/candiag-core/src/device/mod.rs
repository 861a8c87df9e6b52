//! CAN device contract and built-in devices

mod loopback;

pub use loopback::LoopbackDevice;

use async_trait::async_trait;

use crate::error::DeviceError;
use crate::frame::Frame;

/// Hardware-agnostic interface to a CAN controller
///
/// Implementations wrap a concrete bus (SocketCAN, serial adapters, a
/// loopback queue, ...). Methods take `&self` so one device can be shared
/// between the dispatcher's receive and transmit tasks.
#[async_trait]
pub trait Device: Send + Sync {
    /// Bring the device onto the bus
    async fn start(&self) -> Result<(), DeviceError>;

    /// Take the device off the bus
    async fn stop(&self) -> Result<(), DeviceError>;

    /// Transmit one frame
    async fn send(&self, frame: Frame) -> Result<(), DeviceError>;

    /// Wait a short, bounded time for one frame
    ///
    /// Returns `Ok(None)` when nothing arrived, which lets callers poll a
    /// shutdown signal between reads.
    async fn recv(&self) -> Result<Option<Frame>, DeviceError>;

    /// Accept only frames with exactly this arbitration ID
    ///
    /// Returns false when the hardware cannot filter.
    fn set_filter_id(&self, _id: u32) -> bool {
        false
    }

    /// Accept only frames where `frame.id & mask == id & mask`
    ///
    /// Returns false when the hardware cannot filter.
    fn set_filter_mask(&self, _id: u32, _mask: u32) -> bool {
        false
    }

    /// Human readable device name, used in logs and frame metadata
    fn name(&self) -> &str;
}
