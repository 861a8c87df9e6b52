//! Receive filters

use std::fmt;
use std::sync::Arc;

use candiag_core::Frame;

/// Predicate deciding whether an inbound frame belongs to a transport
#[derive(Clone)]
pub enum RxFilter {
    /// Accept exactly this arbitration ID
    Exact(u32),
    /// Accept IDs where `frame_id & mask == id & mask`
    Mask { id: u32, mask: u32 },
    /// Accept frames the predicate returns true for
    Custom(Arc<dyn Fn(&Frame) -> bool + Send + Sync>),
}

impl RxFilter {
    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(&Frame) -> bool + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(predicate))
    }

    pub fn matches(&self, frame: &Frame) -> bool {
        match self {
            Self::Custom(predicate) => predicate(frame),
            _ => self.matches_id(frame.id()),
        }
    }

    /// ID-only check; custom predicates need the whole frame and never match here
    pub fn matches_id(&self, frame_id: u32) -> bool {
        match *self {
            Self::Exact(id) => frame_id == id,
            Self::Mask { id, mask } => frame_id & mask == id & mask,
            Self::Custom(_) => false,
        }
    }

    /// `(id, mask)` pair for a hardware filter, if one can express this filter
    pub fn hardware(&self) -> Option<(u32, Option<u32>)> {
        match *self {
            Self::Exact(id) => Some((id, None)),
            Self::Mask { id, mask } => Some((id, Some(mask))),
            Self::Custom(_) => None,
        }
    }
}

impl fmt::Debug for RxFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(id) => write!(f, "Exact(0x{:X})", id),
            Self::Mask { id, mask } => write!(f, "Mask {{ id: 0x{:X}, mask: 0x{:X} }}", id, mask),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl PartialEq for RxFilter {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Exact(a), Self::Exact(b)) => a == b,
            (Self::Mask { id: a, mask: m }, Self::Mask { id: b, mask: n }) => a == b && m == n,
            (Self::Custom(a), Self::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}
