//! Per-destination send behavior
//!
//! Each destination kind needs different packet construction and different
//! side effects around a send. The strategy is selected once at send entry
//! from the destination's variant; every decision inside is an exhaustive
//! match, so adding a kind is a compile error until each seam handles it.

use smallvec::SmallVec;

use courier_core::chain::{Element, ImageOrigin, MessageChain};
use courier_core::config::SendConfig;
use courier_core::destination::{Destination, DestinationKind, SendTarget};
use courier_core::errors::{CourierError, Result};
use courier_core::packet::{FragmentInfo, OutgoingPacket, PacketCommand, PacketResponse};
use courier_core::transport::PacketLayer;
use courier_core::types::Account;

// ----------------------------------------------------------------------------
// Destination Strategy
// ----------------------------------------------------------------------------

/// Destination-specific behavior for one logical send
pub struct DestinationStrategy<'a> {
    destination: &'a Destination,
    account: &'a Account,
    config: &'a SendConfig,
}

impl<'a> DestinationStrategy<'a> {
    pub fn new(destination: &'a Destination, account: &'a Account, config: &'a SendConfig) -> Self {
        Self {
            destination,
            account,
            config,
        }
    }

    pub fn kind(&self) -> DestinationKind {
        self.destination.kind()
    }

    /// The display name this send is attributed to: the account nickname for
    /// one-to-one kinds, the in-group card for the group kind
    pub fn sender_name(&self) -> &str {
        match self.destination {
            Destination::Group(group) if !group.self_card.is_empty() => &group.self_card,
            _ => &self.account.nickname,
        }
    }

    /// The message-send command for this destination kind
    fn command(&self) -> PacketCommand {
        match self.destination.kind() {
            DestinationKind::Friend => PacketCommand::SendFriendMessage,
            DestinationKind::Stranger => PacketCommand::SendStrangerMessage,
            DestinationKind::GroupTemp => PacketCommand::SendTempMessage,
            DestinationKind::Group => PacketCommand::SendGroupMessage,
        }
    }

    /// Build the ordered wire packets for the final chain
    ///
    /// A non-fragmented send is a single packet. A fragmented send splits
    /// the chain across the configured inline budget and numbers the parts.
    pub fn build_packets(
        &self,
        chain: &MessageChain,
        fragmented: bool,
    ) -> SmallVec<[OutgoingPacket; 2]> {
        let command = self.command();
        let target = self.destination.target();
        let group_info = self.destination.group_info(self.account);

        if !fragmented {
            let mut packets = SmallVec::new();
            packets.push(OutgoingPacket {
                command,
                target,
                group_info,
                fragment: None,
                chain: chain.clone(),
            });
            return packets;
        }

        let parts = chain.split_inline(self.config.inline_budget);
        let count = parts.len() as u8;
        parts
            .into_iter()
            .enumerate()
            .map(|(index, part)| OutgoingPacket {
                command,
                target,
                group_info: group_info.clone(),
                fragment: Some(FragmentInfo {
                    index: index as u8,
                    count,
                }),
                chain: part,
            })
            .collect()
    }

    /// Side effects that must run after transformation but before sending
    ///
    /// For group sends, every image that was originally uploaded in a direct
    /// context must be announced to the group's image cache first, so the
    /// server holds a group-scoped copy before the message references it.
    /// One-to-one kinds have nothing to do here.
    pub async fn post_transform(
        &self,
        layer: &dyn PacketLayer,
        chain: &MessageChain,
    ) -> Result<()> {
        let group = match self.destination {
            Destination::Group(group) => group,
            Destination::Friend(_) | Destination::Stranger(_) | Destination::GroupTemp(_) => {
                return Ok(())
            }
        };

        for element in chain {
            let Element::Image(image) = element else {
                continue;
            };
            if image.origin != ImageOrigin::Direct {
                continue;
            }

            let packet = OutgoingPacket {
                command: PacketCommand::RegisterGroupImage,
                target: SendTarget::Group { group: group.id },
                group_info: self.destination.group_info(self.account),
                fragment: None,
                chain: MessageChain::from_element(Element::Image(image.clone())),
            };
            match layer.send_and_await(packet).await? {
                PacketResponse::Ack(_) => {}
                PacketResponse::Rejected { code, reason } => {
                    return Err(CourierError::rejected(code, reason));
                }
                PacketResponse::TooLarge => {
                    return Err(CourierError::too_large(format!(
                        "group image registration refused for {}",
                        image.resource
                    )));
                }
                PacketResponse::MusicAck => {
                    return Err(CourierError::internal(
                        "unexpected music ack for an image registration",
                    ));
                }
            }
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
