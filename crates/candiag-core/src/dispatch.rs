//! Frame dispatcher
//!
//! Multiplexes one [`Device`] between many consumers. Outbound frames go
//! through a single bounded FIFO; every inbound frame is copied into each
//! registered receive queue.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace};

use crate::device::Device;
use crate::error::{DeviceError, DispatcherError};
use crate::frame::Frame;

/// Sending half of a receive queue handed to [`Dispatcher::add_receiver`]
pub type FrameSender = mpsc::UnboundedSender<Frame>;
/// Receiving half of a dispatcher receive queue
pub type FrameReceiver = mpsc::UnboundedReceiver<Frame>;

const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Lifecycle state published by a dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatcherStatus {
    Stopped,
    Running,
    /// A loop hit a device error; the instance must be stopped
    Failed(DeviceError),
}

#[derive(Default)]
struct State {
    receivers: Vec<FrameSender>,
    outbound: Option<mpsc::Sender<Frame>>,
    shutdown: Option<Arc<watch::Sender<bool>>>,
    tasks: Vec<JoinHandle<()>>,
}

/// Owns a device and runs its send and receive loops
pub struct Dispatcher {
    device: Arc<dyn Device>,
    state: Mutex<State>,
    lifecycle: tokio::sync::Mutex<()>,
    status: Arc<watch::Sender<DispatcherStatus>>,
    queue_capacity: usize,
}

impl Dispatcher {
    pub fn new(device: impl Device + 'static) -> Self {
        Self::with_queue_capacity(device, DEFAULT_QUEUE_CAPACITY)
    }

    /// Create a dispatcher with a custom outbound queue depth
    pub fn with_queue_capacity(device: impl Device + 'static, queue_capacity: usize) -> Self {
        let (status, _) = watch::channel(DispatcherStatus::Stopped);
        Self {
            device: Arc::new(device),
            state: Mutex::new(State::default()),
            lifecycle: tokio::sync::Mutex::new(()),
            status: Arc::new(status),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Register a receive queue; only allowed while stopped
    pub fn add_receiver(&self, sender: FrameSender) -> Result<(), DispatcherError> {
        let mut state = self.state.lock();
        if state.outbound.is_some() {
            return Err(DispatcherError::AlreadyRunning);
        }
        if state.receivers.iter().any(|r| r.same_channel(&sender)) {
            return Err(DispatcherError::DuplicateReceiver);
        }
        state.receivers.push(sender);
        Ok(())
    }

    /// Unregister a receive queue; only allowed while stopped
    pub fn remove_receiver(&self, sender: &FrameSender) -> Result<(), DispatcherError> {
        let mut state = self.state.lock();
        if state.outbound.is_some() {
            return Err(DispatcherError::AlreadyRunning);
        }
        let pos = state
            .receivers
            .iter()
            .position(|r| r.same_channel(sender))
            .ok_or(DispatcherError::UnknownReceiver)?;
        state.receivers.remove(pos);
        Ok(())
    }

    /// Number of registered receive queues
    pub fn receiver_count(&self) -> usize {
        self.state.lock().receivers.len()
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().outbound.is_some()
    }

    /// Subscribe to lifecycle changes
    pub fn status(&self) -> watch::Receiver<DispatcherStatus> {
        self.status.subscribe()
    }

    /// Start the device and spawn the send and receive loops
    pub async fn start(&self) -> Result<(), DispatcherError> {
        let _guard = self.lifecycle.lock().await;
        if self.is_running() {
            return Err(DispatcherError::AlreadyRunning);
        }

        self.device.start().await?;

        let (outbound_tx, outbound_rx) = mpsc::channel(self.queue_capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let shutdown_tx = Arc::new(shutdown_tx);

        let mut state = self.state.lock();
        let receivers = state.receivers.clone();

        let rx_task = tokio::spawn(receive_loop(
            Arc::clone(&self.device),
            receivers,
            shutdown_rx.clone(),
            Arc::clone(&shutdown_tx),
            Arc::clone(&self.status),
        ));
        let tx_task = tokio::spawn(send_loop(
            Arc::clone(&self.device),
            outbound_rx,
            shutdown_rx,
            Arc::clone(&shutdown_tx),
            Arc::clone(&self.status),
        ));

        info!(
            device = self.device.name(),
            receivers = state.receivers.len(),
            "Dispatcher started"
        );

        state.outbound = Some(outbound_tx);
        state.shutdown = Some(shutdown_tx);
        state.tasks = vec![rx_task, tx_task];
        self.status.send_replace(DispatcherStatus::Running);
        Ok(())
    }

    /// Stop both loops, wait for them to exit, then stop the device
    pub async fn stop(&self) -> Result<(), DispatcherError> {
        let _guard = self.lifecycle.lock().await;

        let (shutdown, tasks) = {
            let mut state = self.state.lock();
            if state.outbound.take().is_none() {
                return Err(DispatcherError::NotRunning);
            }
            (state.shutdown.take(), std::mem::take(&mut state.tasks))
        };

        if let Some(shutdown) = shutdown {
            shutdown.send_replace(true);
        }
        for task in tasks {
            if let Err(e) = task.await {
                error!(error = %e, "Dispatcher loop panicked");
            }
        }

        let result = self.device.stop().await;
        self.status.send_replace(DispatcherStatus::Stopped);
        info!(device = self.device.name(), "Dispatcher stopped");
        result.map_err(DispatcherError::from)
    }

    /// Queue a frame for transmission
    ///
    /// Waits only for space in the outbound queue.
    pub async fn send(&self, frame: Frame) -> Result<(), DispatcherError> {
        if let DispatcherStatus::Failed(e) = &*self.status.borrow() {
            return Err(DispatcherError::Device(e.clone()));
        }
        let outbound = self
            .state
            .lock()
            .outbound
            .clone()
            .ok_or(DispatcherError::NotRunning)?;
        outbound
            .send(frame)
            .await
            .map_err(|_| DispatcherError::QueueClosed)
    }

    /// Ask the device to filter in hardware
    ///
    /// With `mask` the device accepts `frame.id & mask == id & mask`,
    /// otherwise exactly `id`. Returns whether the device honoured it.
    pub fn set_hardware_filter(&self, id: u32, mask: Option<u32>) -> bool {
        let applied = match mask {
            Some(mask) => self.device.set_filter_mask(id, mask),
            None => self.device.set_filter_id(id),
        };
        debug!(
            id = format!("0x{:X}", id),
            ?mask,
            applied,
            "Hardware filter requested"
        );
        applied
    }
}

fn fail(
    status: &watch::Sender<DispatcherStatus>,
    shutdown: &watch::Sender<bool>,
    loop_name: &str,
    err: DeviceError,
) {
    error!(error = %err, loop_name, "Dispatcher device error, stopping loops");
    status.send_replace(DispatcherStatus::Failed(err));
    shutdown.send_replace(true);
}

async fn receive_loop(
    device: Arc<dyn Device>,
    receivers: Vec<FrameSender>,
    mut shutdown: watch::Receiver<bool>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    status: Arc<watch::Sender<DispatcherStatus>>,
) {
    while !*shutdown.borrow() {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            result = device.recv() => match result {
                Ok(Some(frame)) => {
                    trace!(%frame, "Dispatcher: received frame");
                    for receiver in &receivers {
                        // A dropped consumer must not starve the others
                        let _ = receiver.send(frame.clone());
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    fail(&status, &shutdown_tx, "receive", e);
                    break;
                }
            },
        }
    }
    debug!("Dispatcher receive loop exited");
}

async fn send_loop(
    device: Arc<dyn Device>,
    mut outbound: mpsc::Receiver<Frame>,
    mut shutdown: watch::Receiver<bool>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    status: Arc<watch::Sender<DispatcherStatus>>,
) {
    while !*shutdown.borrow() {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            next = outbound.recv() => match next {
                Some(frame) => {
                    trace!(%frame, "Dispatcher: sending frame");
                    if let Err(e) = device.send(frame).await {
                        fail(&status, &shutdown_tx, "send", e);
                        break;
                    }
                }
                None => break,
            },
        }
    }
    debug!("Dispatcher send loop exited");
}
