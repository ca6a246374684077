//! Courier Core Model
//!
//! This crate provides the message model, destination model, packet
//! descriptions, and collaborator interfaces for the Courier messaging
//! client's outbound delivery pipeline. The pipeline itself lives in
//! `courier-runtime`; everything here is the vocabulary it speaks.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod chain;
pub mod config;
pub mod destination;
pub mod errors;
pub mod estimate;
pub mod events;
pub mod highway;
pub mod outgoing;
pub mod packet;
pub mod transport;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use chain::{
    Element, ForwardBundle, ForwardNode, ForwardRef, ImageOrigin, ImageRef, LongRef, Marker,
    MessageChain, MusicShare, QuoteRef, SendFlags,
};
pub use config::SendConfig;
pub use destination::{
    Destination, DestinationKind, Friend, Group, GroupInfo, GroupTemp, SendTarget, Stranger,
};
pub use errors::{CourierError, NetworkError, Result, UploadError};
pub use estimate::{InlineBudgetEstimator, SizeEstimator, SizeVerdict};
pub use events::{EventBus, EventPredicate, PushedEvent};
pub use highway::HighwayUploader;
pub use outgoing::{OutgoingSource, Receipt, SeqCell, SeqHandle, SeqResolution};
pub use packet::{FragmentInfo, MessageAck, OutgoingPacket, PacketCommand, PacketResponse};
pub use transport::PacketLayer;
pub use types::{Account, GroupId, ResourceId, Timestamp, UserId};
