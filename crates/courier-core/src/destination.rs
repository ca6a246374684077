//! Send destinations
//!
//! A destination is the chat target of a send: a one-to-one contact (friend,
//! stranger, group-temporary contact) or a group. The kind is derived from
//! the variant itself, so the mapping is total and exclusive by
//! construction and every match over it is checked at compile time.

use core::fmt;
use serde::{Deserialize, Serialize};

use crate::types::{Account, GroupId, UserId};

// ----------------------------------------------------------------------------
// Destination Kinds
// ----------------------------------------------------------------------------

/// The four destination kinds of the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DestinationKind {
    Friend,
    Stranger,
    GroupTemp,
    Group,
}

impl fmt::Display for DestinationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DestinationKind::Friend => "friend",
            DestinationKind::Stranger => "stranger",
            DestinationKind::GroupTemp => "group-temp",
            DestinationKind::Group => "group",
        };
        write!(f, "{name}")
    }
}

// ----------------------------------------------------------------------------
// Destination Variants
// ----------------------------------------------------------------------------

/// A contact on the account's friend list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Friend {
    pub id: UserId,
    pub nickname: String,
}

/// A contact outside the friend list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stranger {
    pub id: UserId,
    pub nickname: String,
}

/// A group member reachable only through the group's temporary channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupTemp {
    pub group: GroupId,
    pub member: UserId,
    pub member_name: String,
}

/// A group chat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    /// The sending account's display card inside this group; empty when the
    /// account has not set one
    pub self_card: String,
}

/// The chat target of a send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Destination {
    Friend(Friend),
    Stranger(Stranger),
    GroupTemp(GroupTemp),
    Group(Group),
}

impl Destination {
    /// The destination's kind; total and exclusive over the variants
    pub fn kind(&self) -> DestinationKind {
        match self {
            Destination::Friend(_) => DestinationKind::Friend,
            Destination::Stranger(_) => DestinationKind::Stranger,
            Destination::GroupTemp(_) => DestinationKind::GroupTemp,
            Destination::Group(_) => DestinationKind::Group,
        }
    }

    /// The wire identifiers of this destination
    pub fn target(&self) -> SendTarget {
        match self {
            Destination::Friend(friend) => SendTarget::Friend { user: friend.id },
            Destination::Stranger(stranger) => SendTarget::Stranger { user: stranger.id },
            Destination::GroupTemp(temp) => SendTarget::GroupTemp {
                group: temp.group,
                member: temp.member,
            },
            Destination::Group(group) => SendTarget::Group { group: group.id },
        }
    }

    /// Display name of the destination
    pub fn display_name(&self) -> &str {
        match self {
            Destination::Friend(friend) => &friend.nickname,
            Destination::Stranger(stranger) => &stranger.nickname,
            Destination::GroupTemp(temp) => &temp.member_name,
            Destination::Group(group) => &group.name,
        }
    }

    /// Derived group projection, attached to packets only when the
    /// destination is a group
    pub fn group_info(&self, account: &Account) -> Option<GroupInfo> {
        match self {
            Destination::Group(group) => {
                let sender_card = if group.self_card.is_empty() {
                    account.nickname.clone()
                } else {
                    group.self_card.clone()
                };
                Some(GroupInfo {
                    group_id: group.id,
                    sender_card,
                })
            }
            _ => None,
        }
    }
}

// ----------------------------------------------------------------------------
// Send Target
// ----------------------------------------------------------------------------

/// Wire identifiers of a destination, carried by packets and receipts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SendTarget {
    Friend { user: UserId },
    Stranger { user: UserId },
    GroupTemp { group: GroupId, member: UserId },
    Group { group: GroupId },
}

impl SendTarget {
    /// The kind of destination these identifiers address
    pub fn kind(&self) -> DestinationKind {
        match self {
            SendTarget::Friend { .. } => DestinationKind::Friend,
            SendTarget::Stranger { .. } => DestinationKind::Stranger,
            SendTarget::GroupTemp { .. } => DestinationKind::GroupTemp,
            SendTarget::Group { .. } => DestinationKind::Group,
        }
    }
}

// ----------------------------------------------------------------------------
// Group Info
// ----------------------------------------------------------------------------

/// Read-only group projection attached to group-bound packets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    /// Numeric group identifier
    pub group_id: GroupId,
    /// The sender's display name inside the group
    pub sender_card: String,
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
