//! Send orchestrator
//!
//! [`MessageSender`] composes the transform pipeline, the destination
//! strategy, the packet layer, and the receipt correlator into the one
//! public operation of this subsystem: send a chain to a destination and
//! return a receipt.
//!
//! A logical send walks a bounded escalation ladder. The first attempt
//! sends the chain inline; a size rejection re-enters the pipeline with the
//! original message as a long-message upload, and a second rejection falls
//! back to fragmentation. Each attempt discards the previous attempt's
//! in-flight state, and the ladder never backtracks.

use std::sync::Arc;
use tracing::{debug, warn};

use courier_core::chain::{Element, MessageChain, SendFlags};
use courier_core::config::SendConfig;
use courier_core::destination::{Destination, DestinationKind};
use courier_core::errors::{CourierError, Result};
use courier_core::estimate::SizeEstimator;
use courier_core::events::EventBus;
use courier_core::highway::HighwayUploader;
use courier_core::outgoing::{OutgoingSource, Receipt, SeqResolution};
use courier_core::packet::{OutgoingPacket, PacketCommand, PacketResponse};
use courier_core::transport::PacketLayer;
use courier_core::types::Account;

use crate::correlator::ReceiptCorrelator;
use crate::strategy::DestinationStrategy;
use crate::transform::{SendStep, Transformed, TransformPipeline};

// ----------------------------------------------------------------------------
// Attempt Outcome
// ----------------------------------------------------------------------------

/// Result of one attempt of the escalation ladder
enum AttemptOutcome {
    /// The attempt succeeded and produced a receipt
    Delivered(Receipt),
    /// The content was rejected for size; the caller decides whether a
    /// further step remains
    Oversize,
}

// ----------------------------------------------------------------------------
// Message Sender
// ----------------------------------------------------------------------------

/// The outbound delivery pipeline
pub struct MessageSender {
    packets: Arc<dyn PacketLayer>,
    uploader: Arc<dyn HighwayUploader>,
    bus: Arc<dyn EventBus>,
    estimator: Arc<dyn SizeEstimator>,
    account: Account,
    config: SendConfig,
}

impl MessageSender {
    /// Create a sender over the given collaborators
    pub fn new(
        packets: Arc<dyn PacketLayer>,
        uploader: Arc<dyn HighwayUploader>,
        bus: Arc<dyn EventBus>,
        estimator: Arc<dyn SizeEstimator>,
        account: Account,
    ) -> Self {
        Self::with_config(
            packets,
            uploader,
            bus,
            estimator,
            account,
            SendConfig::default(),
        )
    }

    /// Create a sender with a custom configuration
    pub fn with_config(
        packets: Arc<dyn PacketLayer>,
        uploader: Arc<dyn HighwayUploader>,
        bus: Arc<dyn EventBus>,
        estimator: Arc<dyn SizeEstimator>,
        account: Account,
        config: SendConfig,
    ) -> Self {
        Self {
            packets,
            uploader,
            bus,
            estimator,
            account,
            config,
        }
    }

    /// Current configuration
    pub fn config(&self) -> &SendConfig {
        &self.config
    }

    /// Send a chain to a destination and return its receipt
    ///
    /// Fails with [`CourierError::MessageTooLarge`] when every strategy is
    /// exhausted, [`CourierError::SendRejected`] on a non-size refusal, or
    /// propagates collaborator failures unchanged. A returned receipt always
    /// describes a message the server accepted.
    pub async fn send_message(
        &self,
        destination: &Destination,
        message: MessageChain,
    ) -> Result<Receipt> {
        let flags = SendFlags::from_chain(&message);
        let mut step = SendStep::First;

        // Bounded escalation: at most three attempts, strictly in ladder
        // order, each re-entering the transform with the original message.
        loop {
            match self.attempt(destination, &message, flags, step).await? {
                AttemptOutcome::Delivered(receipt) => return Ok(receipt),
                AttemptOutcome::Oversize => match step.escalate() {
                    Some(next) => {
                        debug!(
                            kind = %destination.kind(),
                            from = ?step,
                            to = ?next,
                            "send rejected for size, escalating"
                        );
                        step = next;
                    }
                    None => {
                        return Err(CourierError::too_large(
                            "message still rejected after fragmentation",
                        ));
                    }
                },
            }
        }
    }

    /// Run one attempt at the given step
    async fn attempt(
        &self,
        destination: &Destination,
        original: &MessageChain,
        flags: SendFlags,
        step: SendStep,
    ) -> Result<AttemptOutcome> {
        let pipeline = TransformPipeline::new(
            self.uploader.as_ref(),
            self.estimator.as_ref(),
            &self.account,
            &self.config,
        );
        let chain = match pipeline.transform(destination, original, step, flags).await? {
            Transformed::Oversize => return Ok(AttemptOutcome::Oversize),
            Transformed::Chain(chain) => chain,
        };

        // A quote is only valid once the quoted send's sequence is known;
        // this can suspend on a prior send's correlator.
        let chain = resolve_quotes(chain).await;

        let strategy = DestinationStrategy::new(destination, &self.account, &self.config);
        strategy.post_transform(self.packets.as_ref(), &chain).await?;

        // Music shares bypass the per-kind message packets entirely.
        if chain.contains_music() {
            return self
                .dispatch_music(destination, chain)
                .await
                .map(AttemptOutcome::Delivered);
        }

        let packets = strategy.build_packets(&chain, step == SendStep::Fragmented);
        let mut source: Option<OutgoingSource> = None;

        for packet in packets {
            match self.packets.send_and_await(packet).await? {
                PacketResponse::TooLarge => return Ok(AttemptOutcome::Oversize),
                PacketResponse::Rejected { code, reason } => {
                    return Err(CourierError::rejected(code, reason));
                }
                PacketResponse::MusicAck => {
                    return Err(CourierError::internal(
                        "unexpected music ack on the message send path",
                    ));
                }
                PacketResponse::Ack(ack) => {
                    if source.is_none() {
                        let created = OutgoingSource::new(
                            self.account.id,
                            destination.target(),
                            chain.clone(),
                        );
                        if destination.kind() != DestinationKind::Group {
                            created.finalize(match ack.sequence {
                                Some(sequence) => SeqResolution::Resolved {
                                    sequence,
                                    internal_id: ack.internal_id,
                                },
                                None => SeqResolution::Unresolved,
                            });
                        }
                        source = Some(created);
                    }
                }
            }
        }

        // Every packet was acknowledged, so a source must exist by now.
        let source = source.ok_or_else(|| {
            CourierError::internal("all packets acknowledged but no outgoing source constructed")
        })?;

        if let Destination::Group(group) = destination {
            let correlator = ReceiptCorrelator::new(self.bus.as_ref(), &self.config);
            source.finalize(correlator.await_receipt(group.id).await);
        }

        self.settle_sequence(&source).await;
        Ok(AttemptOutcome::Delivered(Receipt::new(
            source,
            destination.target(),
        )))
    }

    /// Send a music share and build its receipt
    ///
    /// The share is routed through the dedicated packet/response pair for
    /// every destination kind, but only group sends can correlate a receipt
    /// for it; one-to-one kinds have no receipt channel for shares.
    async fn dispatch_music(
        &self,
        destination: &Destination,
        chain: MessageChain,
    ) -> Result<Receipt> {
        let packet = OutgoingPacket {
            command: PacketCommand::ShareMusic,
            target: destination.target(),
            group_info: destination.group_info(&self.account),
            fragment: None,
            chain: chain.clone(),
        };

        match self.packets.send_and_await(packet).await? {
            PacketResponse::MusicAck => {}
            PacketResponse::Rejected { code, reason } => {
                return Err(CourierError::rejected(code, reason));
            }
            PacketResponse::TooLarge => {
                return Err(CourierError::too_large("music share rejected for size"));
            }
            PacketResponse::Ack(_) => {
                return Err(CourierError::internal(
                    "unexpected message ack for a music share",
                ));
            }
        }

        match destination {
            Destination::Group(group) => {
                let source =
                    OutgoingSource::new(self.account.id, destination.target(), chain);
                let correlator = ReceiptCorrelator::new(self.bus.as_ref(), &self.config);
                source.finalize(correlator.await_receipt(group.id).await);
                self.settle_sequence(&source).await;
                Ok(Receipt::new(source, destination.target()))
            }
            Destination::Friend(_) | Destination::Stranger(_) | Destination::GroupTemp(_) => {
                Err(CourierError::unsupported(
                    "music share receipts are only available for group destinations",
                ))
            }
        }
    }

    /// Bounded wait for the source's sequence before handing it to the
    /// caller; an unresolved sequence degrades quoting, not the send itself
    async fn settle_sequence(&self, source: &OutgoingSource) {
        let mut handle = source.handle();
        if handle.wait_timeout(self.config.sequence_timeout).await == SeqResolution::Unresolved {
            warn!(
                message_id = %source.message_id(),
                "message delivered but its sequence is unresolved; quoting it later may be degraded"
            );
        }
    }
}

// ----------------------------------------------------------------------------
// Quote Resolution
// ----------------------------------------------------------------------------

/// Settle every pending quote in the chain, producing a fresh chain
async fn resolve_quotes(chain: MessageChain) -> MessageChain {
    let pending = chain
        .iter()
        .any(|element| matches!(element, Element::Quote(quote) if quote.is_pending()));
    if !pending {
        return chain;
    }

    let mut elements = Vec::with_capacity(chain.len());
    for element in chain.into_elements() {
        match element {
            Element::Quote(quote) => elements.push(Element::Quote(quote.resolve().await)),
            other => elements.push(other),
        }
    }
    MessageChain::new(elements)
}
