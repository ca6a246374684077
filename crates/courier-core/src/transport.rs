//! Packet layer abstraction
//!
//! The packet layer owns wire framing, encryption, and the request/response
//! exchange with the server. The pipeline consumes it as a borrowed
//! capability and never implements it; tests substitute an in-memory fake.

use async_trait::async_trait;

use crate::errors::Result;
use crate::packet::{OutgoingPacket, PacketResponse};

// ----------------------------------------------------------------------------
// Packet Layer Trait
// ----------------------------------------------------------------------------

/// Executes one packet exchange against the shared protocol session
#[async_trait]
pub trait PacketLayer: Send + Sync {
    /// Send a packet and await its direct typed response
    ///
    /// Transport-level failures surface as [`crate::errors::NetworkError`];
    /// server-side refusals come back as a typed [`PacketResponse`] instead.
    async fn send_and_await(&self, packet: OutgoingPacket) -> Result<PacketResponse>;
}
