//! candiag-core - CAN frame model, device contract and frame dispatcher
//!
//! The dispatcher owns one [`Device`] and shuttles frames between it and any
//! number of registered receive queues.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                     Dispatcher                        │
//! │                                                       │
//! │  send() ──► outbound queue ──► [tx task] ──┐          │
//! │                                            ▼          │
//! │                                      ┌──────────┐     │
//! │                                      │  Device  │     │
//! │                                      └────┬─────┘     │
//! │                                           │           │
//! │  receiver queues ◄── fan-out ◄── [rx task]┘           │
//! └──────────────────────────────────────────────────────┘
//! ```

pub mod device;
pub mod dispatch;
pub mod error;
pub mod frame;

pub use device::{Device, LoopbackDevice};
pub use dispatch::{Dispatcher, DispatcherStatus, FrameReceiver, FrameSender};
pub use error::{DeviceError, DispatcherError, FrameError};
pub use frame::{Frame, FrameType};
