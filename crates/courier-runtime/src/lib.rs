//! Courier Delivery Runtime
//!
//! The outbound-message delivery pipeline of the Courier messaging client:
//! transform a composed chain into wire-ready form, pick the packet
//! encoding for the destination kind, send it, correlate the asynchronous
//! server acknowledgment back to the local send, and escalate through
//! fallback strategies when the server rejects the message for size.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod correlator;
pub mod sender;
pub mod strategy;
pub mod transform;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use correlator::ReceiptCorrelator;
pub use sender::MessageSender;
pub use strategy::DestinationStrategy;
pub use transform::{SendStep, TransformPipeline, Transformed};
