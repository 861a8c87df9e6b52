//! Loopback device for testing
//!
//! Every frame sent is queued and handed back by `recv` in FIFO order.
//! Clones share the same queue, so a test can keep a handle to inject or
//! inspect traffic while the dispatcher owns another.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use super::Device;
use crate::error::DeviceError;
use crate::frame::Frame;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

struct Inner {
    queue: Mutex<VecDeque<Frame>>,
    notify: Notify,
    started: AtomicBool,
    connected: AtomicBool,
    poll_interval: Duration,
}

/// In-memory device that echoes transmitted frames back to the receiver
#[derive(Clone)]
pub struct LoopbackDevice {
    inner: Arc<Inner>,
}

impl Default for LoopbackDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackDevice {
    pub fn new() -> Self {
        Self::with_poll_interval(DEFAULT_POLL_INTERVAL)
    }

    /// Create a loopback device whose idle `recv` waits `poll_interval`
    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                queue: Mutex::new(VecDeque::new()),
                notify: Notify::new(),
                started: AtomicBool::new(false),
                connected: AtomicBool::new(true),
                poll_interval,
            }),
        }
    }

    /// Simulate the bus dropping out; all I/O fails while disconnected
    pub fn set_connected(&self, connected: bool) {
        self.inner.connected.store(connected, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Queue a frame as if it had arrived from the bus
    pub fn inject(&self, frame: Frame) {
        self.inner.queue.lock().push_back(frame);
        self.inner.notify.notify_one();
    }

    /// Number of frames waiting to be received
    pub fn pending(&self) -> usize {
        self.inner.queue.lock().len()
    }

    fn check_ready(&self) -> Result<(), DeviceError> {
        if !self.inner.connected.load(Ordering::SeqCst) {
            return Err(DeviceError::Disconnected);
        }
        if !self.inner.started.load(Ordering::SeqCst) {
            return Err(DeviceError::NotStarted);
        }
        Ok(())
    }

    fn pop(&self) -> Option<Frame> {
        let mut frame = self.inner.queue.lock().pop_front()?;
        frame.timestamp = Some(now_secs());
        frame.interface = Some(self.name().to_string());
        Some(frame)
    }
}

fn now_secs() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

#[async_trait]
impl Device for LoopbackDevice {
    async fn start(&self) -> Result<(), DeviceError> {
        if !self.inner.connected.load(Ordering::SeqCst) {
            return Err(DeviceError::Disconnected);
        }
        self.inner.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<(), DeviceError> {
        self.inner.started.store(false, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
        Ok(())
    }

    async fn send(&self, frame: Frame) -> Result<(), DeviceError> {
        self.check_ready()?;
        tracing::trace!(%frame, "Loopback: sent frame");
        self.inject(frame);
        Ok(())
    }

    async fn recv(&self) -> Result<Option<Frame>, DeviceError> {
        self.check_ready()?;
        if let Some(frame) = self.pop() {
            return Ok(Some(frame));
        }

        let _ = tokio::time::timeout(self.inner.poll_interval, self.inner.notify.notified()).await;

        self.check_ready()?;
        Ok(self.pop())
    }

    fn name(&self) -> &str {
        "loopback"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_fifo_order() {
        let dev = LoopbackDevice::new();
        dev.start().await.unwrap();

        let frames: Vec<Frame> = (0..8u8)
            .map(|i| Frame::new(0x100 + i as u32, &[i]).unwrap())
            .collect();
        for frame in &frames {
            dev.send(frame.clone()).await.unwrap();
        }

        for expected in &frames {
            let got = dev.recv().await.unwrap().unwrap();
            assert_eq!(&got, expected);
            assert_eq!(got.interface.as_deref(), Some("loopback"));
            assert!(got.timestamp.is_some());
        }
        assert_eq!(dev.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_io_before_start_fails() {
        let dev = LoopbackDevice::new();
        let frame = Frame::new(0x7E0, &[0x3E, 0x00]).unwrap();
        assert_eq!(dev.send(frame).await, Err(DeviceError::NotStarted));
        assert_eq!(dev.recv().await, Err(DeviceError::NotStarted));
    }

    #[tokio::test]
    async fn test_disconnect() {
        let dev = LoopbackDevice::new();
        dev.start().await.unwrap();
        dev.set_connected(false);

        let frame = Frame::new(0x7E0, &[]).unwrap();
        assert_eq!(dev.send(frame).await, Err(DeviceError::Disconnected));
        assert_eq!(dev.recv().await, Err(DeviceError::Disconnected));

        dev.set_connected(true);
        assert_eq!(dev.recv().await, Ok(None));
    }

    #[tokio::test]
    async fn test_clones_share_queue() {
        let dev = LoopbackDevice::new();
        let handle = dev.clone();
        dev.start().await.unwrap();

        handle.inject(Frame::new(0x7E8, &[0x02, 0x50, 0x01]).unwrap());
        assert_eq!(dev.pending(), 1);

        let got = dev.recv().await.unwrap().unwrap();
        assert_eq!(got.id(), 0x7E8);
    }
}
