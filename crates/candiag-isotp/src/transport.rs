//! ISO-TP transport over a dispatcher
//!
//! One [`IsoTpTransport`] owns one receive queue registered with the
//! dispatcher. Sending segments the payload and runs the flow control
//! handshake; receiving reassembles per sender and answers first frames with
//! flow control. Frames other than flow control that arrive while a send
//! waits for flow control are queued for the next receive.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use candiag_core::{Dispatcher, Frame, FrameReceiver};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::addressing::Addressing;
use crate::codec::{
    decode_st_min, flow_control_body, generate_frames, FlowControl, FlowStatus, PciType,
};
use crate::config::IsoTpConfig;
use crate::error::IsoTpError;
use crate::filter::RxFilter;
use crate::session::{RxEvent, RxSession};

/// A reassembled message and the arbitration ID it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsoTpMessage {
    pub source_id: u32,
    pub payload: Vec<u8>,
}

pub struct IsoTpTransport {
    dispatcher: Arc<Dispatcher>,
    addressing: Addressing,
    config: IsoTpConfig,
    filter: RxFilter,
    inbound: tokio::sync::Mutex<FrameReceiver>,
    /// Frames seen by a send while waiting for flow control
    deferred: Mutex<VecDeque<Frame>>,
    sessions: Mutex<HashMap<u32, RxSession>>,
}

impl IsoTpTransport {
    /// Create a transport and register its receive queue
    ///
    /// The dispatcher must not be running yet.
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        addressing: Addressing,
        config: IsoTpConfig,
    ) -> Result<Self, IsoTpError> {
        let filter = addressing.default_filter();
        Self::with_filter(dispatcher, addressing, config, filter)
    }

    /// Create a transport with an explicit receive filter
    pub fn with_filter(
        dispatcher: Arc<Dispatcher>,
        addressing: Addressing,
        config: IsoTpConfig,
        filter: RxFilter,
    ) -> Result<Self, IsoTpError> {
        config.validate()?;

        let (tx, rx) = mpsc::unbounded_channel();
        dispatcher.add_receiver(tx)?;

        if config.hardware_filter {
            if let Some((id, mask)) = filter.hardware() {
                if !dispatcher.set_hardware_filter(id, mask) {
                    debug!("Device has no hardware filter, filtering in software");
                }
            }
        }

        info!(
            tx_id = format!("0x{:X}", addressing.tx_id()),
            rx_id = format!("0x{:X}", addressing.rx_id()),
            ?filter,
            "ISO-TP transport created"
        );

        Ok(Self {
            dispatcher,
            addressing,
            config,
            filter,
            inbound: tokio::sync::Mutex::new(rx),
            deferred: Mutex::new(VecDeque::new()),
            sessions: Mutex::new(HashMap::new()),
        })
    }

    pub fn addressing(&self) -> &Addressing {
        &self.addressing
    }

    pub fn config(&self) -> &IsoTpConfig {
        &self.config
    }

    pub fn filter(&self) -> &RxFilter {
        &self.filter
    }

    /// Drop all partial reassembly state
    pub fn reset(&self) {
        self.sessions.lock().clear();
    }

    /// Segment `payload` into frames without sending them
    pub fn generate_frames(&self, payload: &[u8]) -> Result<Vec<Frame>, IsoTpError> {
        generate_frames(&self.addressing, &self.config, payload)
    }

    /// Send one message
    ///
    /// Segmented messages wait for flow control after the first frame and
    /// after every block of consecutive frames.
    pub async fn send(&self, payload: &[u8]) -> Result<(), IsoTpError> {
        let frames = self.generate_frames(payload)?;
        let mut frames = frames.into_iter();
        let Some(first) = frames.next() else {
            return Err(IsoTpError::EmptyPayload);
        };

        self.dispatcher.send(first).await?;
        if frames.len() == 0 {
            debug!(len = payload.len(), "ISO-TP single frame sent");
            return Ok(());
        }

        let mut inbound = self.inbound.lock().await;
        let mut fc = self.wait_flow_control(&mut inbound).await?;
        let mut separation = fc.separation_time()?;
        let mut sent_in_block: u8 = 0;
        let mut first_in_block = true;

        for frame in frames {
            if fc.block_size > 0 && sent_in_block == fc.block_size {
                fc = self.wait_flow_control(&mut inbound).await?;
                separation = fc.separation_time()?;
                sent_in_block = 0;
                first_in_block = true;
            }
            if !first_in_block && !separation.is_zero() {
                sleep(separation).await;
            }
            self.dispatcher.send(frame).await?;
            sent_in_block = sent_in_block.wrapping_add(1);
            first_in_block = false;
        }

        debug!(len = payload.len(), "ISO-TP segmented message sent");
        Ok(())
    }

    async fn wait_flow_control(&self, inbound: &mut FrameReceiver) -> Result<FlowControl, IsoTpError> {
        let mut deadline = Instant::now() + self.config.fc_timeout();
        loop {
            let frame = match timeout_at(deadline, inbound.recv()).await {
                Err(_) => return Err(IsoTpError::FlowControlTimeout),
                Ok(None) => return Err(IsoTpError::Disconnected),
                Ok(Some(frame)) => frame,
            };
            if !self.filter.matches(&frame) {
                continue;
            }
            let Some(body) = self.addressing.strip(frame.data()) else {
                continue;
            };
            if !matches!(PciType::of(body[0]), Ok(PciType::FlowControl)) {
                debug!(%frame, "Deferring non flow control frame while sending");
                self.deferred.lock().push_back(frame);
                continue;
            }

            let fc = FlowControl::parse(body)?;
            match fc.status {
                FlowStatus::ContinueToSend => {
                    debug!(
                        block_size = fc.block_size,
                        st_min = fc.st_min,
                        "ISO-TP flow control received"
                    );
                    return Ok(fc);
                }
                FlowStatus::Wait => {
                    debug!("ISO-TP receiver asked to wait");
                    deadline = Instant::now() + self.config.fc_timeout();
                }
                FlowStatus::Overflow => return Err(IsoTpError::FlowControlOverflow),
            }
        }
    }

    /// Receive one message using the configured flow control parameters
    ///
    /// Returns `Ok(None)` when no complete message arrives in time.
    pub async fn recv(&self, timeout: Duration) -> Result<Option<Vec<u8>>, IsoTpError> {
        self.recv_with_flow_control(timeout, self.config.block_size, self.config.st_min)
            .await
    }

    /// Receive one message advertising `block_size` and `st_min` to the sender
    pub async fn recv_with_flow_control(
        &self,
        timeout: Duration,
        block_size: u8,
        st_min: u8,
    ) -> Result<Option<Vec<u8>>, IsoTpError> {
        Ok(self
            .recv_inner(timeout, block_size, st_min)
            .await?
            .map(|message| message.payload))
    }

    /// Receive one message together with its source arbitration ID
    pub async fn recv_message(&self, timeout: Duration) -> Result<Option<IsoTpMessage>, IsoTpError> {
        self.recv_inner(timeout, self.config.block_size, self.config.st_min)
            .await
    }

    async fn recv_inner(
        &self,
        timeout: Duration,
        block_size: u8,
        st_min: u8,
    ) -> Result<Option<IsoTpMessage>, IsoTpError> {
        decode_st_min(st_min)?;
        let deadline = Instant::now() + timeout;
        let mut inbound = self.inbound.lock().await;

        loop {
            let deferred = self.deferred.lock().pop_front();
            let frame = match deferred {
                Some(frame) => frame,
                None => match timeout_at(deadline, inbound.recv()).await {
                    Err(_) => {
                        self.reset();
                        return Ok(None);
                    }
                    Ok(None) => return Err(IsoTpError::Disconnected),
                    Ok(Some(frame)) => frame,
                },
            };
            if !self.filter.matches(&frame) {
                continue;
            }

            let source_id = frame.id();
            let event = {
                let mut sessions = self.sessions.lock();
                let session = sessions
                    .entry(source_id)
                    .or_insert_with(|| RxSession::new(&self.addressing));
                session.set_block_size(block_size);
                session.on_frame(&frame)
            };

            match event {
                Ok(RxEvent::Complete(payload)) => {
                    debug!(
                        source = format!("0x{:X}", source_id),
                        len = payload.len(),
                        "ISO-TP message received"
                    );
                    return Ok(Some(IsoTpMessage { source_id, payload }));
                }
                Ok(RxEvent::FirstFrame { .. }) | Ok(RxEvent::BlockComplete) => {
                    self.send_flow_control(source_id, block_size, st_min).await?;
                }
                Ok(RxEvent::FlowControl(fc)) => {
                    debug!(?fc, "Ignoring flow control with no send in progress");
                }
                Ok(RxEvent::InProgress) | Ok(RxEvent::Ignored) => {}
                Err(e) => {
                    warn!(
                        source = format!("0x{:X}", source_id),
                        error = %e,
                        "ISO-TP reassembly failed"
                    );
                    return Err(e);
                }
            }
        }
    }

    async fn send_flow_control(
        &self,
        source_id: u32,
        block_size: u8,
        st_min: u8,
    ) -> Result<(), IsoTpError> {
        let body = flow_control_body(
            &self.addressing,
            &self.config,
            FlowControl::continue_to_send(block_size, st_min),
        );
        let frame = self
            .addressing
            .frame_to(self.addressing.flow_control_id(source_id), &body)?;
        self.dispatcher.send(frame).await?;
        Ok(())
    }
}
