//! Outgoing packet descriptions and typed responses
//!
//! The pipeline does not speak the wire format itself; it hands the packet
//! layer a structured description of what to send and receives a typed
//! response back. Body encoding uses the compact binary codec so the packet
//! layer can frame it without re-walking the chain.

use core::fmt;
use serde::{Deserialize, Serialize};

use crate::chain::MessageChain;
use crate::destination::{GroupInfo, SendTarget};
use crate::errors::Result;
use crate::types::Timestamp;

// ----------------------------------------------------------------------------
// Packet Commands
// ----------------------------------------------------------------------------

/// The protocol operation a packet performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PacketCommand {
    SendFriendMessage,
    SendStrangerMessage,
    SendTempMessage,
    SendGroupMessage,
    ShareMusic,
    /// Announce an image to a group's image cache so the server holds a
    /// group-scoped copy before a message references it
    RegisterGroupImage,
}

impl fmt::Display for PacketCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PacketCommand::SendFriendMessage => "message.friend.send",
            PacketCommand::SendStrangerMessage => "message.stranger.send",
            PacketCommand::SendTempMessage => "message.temp.send",
            PacketCommand::SendGroupMessage => "message.group.send",
            PacketCommand::ShareMusic => "message.music.share",
            PacketCommand::RegisterGroupImage => "image.group.register",
        };
        write!(f, "{name}")
    }
}

// ----------------------------------------------------------------------------
// Outgoing Packet
// ----------------------------------------------------------------------------

/// Position of a packet within a fragmented send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentInfo {
    /// Fragment sequence number (0-based)
    pub index: u8,
    /// Total number of fragments in this send
    pub count: u8,
}

/// A structured description of one wire packet to send
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingPacket {
    /// Protocol operation
    pub command: PacketCommand,
    /// Destination identifiers
    pub target: SendTarget,
    /// Group projection, present only for group-bound packets
    pub group_info: Option<GroupInfo>,
    /// Set when this packet is one inline fragment of a larger send
    pub fragment: Option<FragmentInfo>,
    /// The chain carried by this packet
    pub chain: MessageChain,
}

impl OutgoingPacket {
    /// Encode the packet's chain into its binary body
    pub fn body(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(&self.chain)?)
    }

    /// Decode a binary body back into a chain
    pub fn chain_from_body(body: &[u8]) -> Result<MessageChain> {
        Ok(bincode::deserialize(body)?)
    }
}

// ----------------------------------------------------------------------------
// Typed Responses
// ----------------------------------------------------------------------------

/// Direct acknowledgment of an accepted message packet
///
/// Direct (one-to-one) sends carry their authoritative sequence here; group
/// sends do not, because the sequence for a group message arrives through a
/// pushed event instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageAck {
    /// Server-assigned message sequence, when the destination kind carries
    /// it in the direct response
    pub sequence: Option<u32>,
    /// Server-assigned internal identifier
    pub internal_id: i64,
    /// Server receive time
    pub time: Timestamp,
}

/// Typed direct response to an outgoing packet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PacketResponse {
    /// The packet was accepted
    Ack(MessageAck),
    /// A music share was accepted
    MusicAck,
    /// The message was rejected for being too large
    TooLarge,
    /// The message was refused for a non-size reason
    Rejected { code: i32, reason: String },
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
