//! Message transform pipeline
//!
//! Converts a user-composed chain into its final wire-ready form for the
//! current escalation step: forward bundles are substituted by uploaded
//! references first, then long-message conversion runs depending on the
//! step and the chain's marker flags. Each transform produces a fresh
//! chain; the input is never mutated.

use courier_core::chain::{Element, ForwardNode, ForwardRef, LongRef, MessageChain, SendFlags};
use courier_core::config::SendConfig;
use courier_core::destination::Destination;
use courier_core::errors::{CourierError, Result};
use courier_core::estimate::{SizeEstimator, SizeVerdict};
use courier_core::highway::HighwayUploader;
use courier_core::types::{Account, Timestamp};

// ----------------------------------------------------------------------------
// Send Steps
// ----------------------------------------------------------------------------

/// Escalation step of a logical send
///
/// `First` is the only valid entry point; the later steps are reachable only
/// through escalation, and `Fragmented` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStep {
    First,
    LongMessage,
    Fragmented,
}

impl SendStep {
    /// The next step of the escalation ladder, if one remains
    pub fn escalate(self) -> Option<SendStep> {
        match self {
            SendStep::First => Some(SendStep::LongMessage),
            SendStep::LongMessage => Some(SendStep::Fragmented),
            SendStep::Fragmented => None,
        }
    }
}

// ----------------------------------------------------------------------------
// Transform Outcome
// ----------------------------------------------------------------------------

/// Result of one transform pass
///
/// `Oversize` reports that estimation refused the chain at the first step;
/// whether to escalate is the orchestrator's decision, so it is an explicit
/// outcome rather than an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Transformed {
    Chain(MessageChain),
    Oversize,
}

// ----------------------------------------------------------------------------
// Transform Pipeline
// ----------------------------------------------------------------------------

/// The two-stage chain transform applied before packet construction
pub struct TransformPipeline<'a> {
    uploader: &'a dyn HighwayUploader,
    estimator: &'a dyn SizeEstimator,
    account: &'a Account,
    config: &'a SendConfig,
}

impl<'a> TransformPipeline<'a> {
    pub fn new(
        uploader: &'a dyn HighwayUploader,
        estimator: &'a dyn SizeEstimator,
        account: &'a Account,
        config: &'a SendConfig,
    ) -> Self {
        Self {
            uploader,
            estimator,
            account,
            config,
        }
    }

    /// Transform `chain` for the given step
    pub async fn transform(
        &self,
        destination: &Destination,
        chain: &MessageChain,
        step: SendStep,
        flags: SendFlags,
    ) -> Result<Transformed> {
        let chain = match self.substitute_forward(chain, flags).await? {
            Some(substituted) => substituted,
            None => chain.clone(),
        };

        match step {
            SendStep::First => {
                if flags.force_long {
                    return Ok(Transformed::Chain(self.convert_long(chain).await?));
                }
                if !flags.ignore_length {
                    if let SizeVerdict::TooLarge = self.estimator.check(&chain, destination) {
                        return Ok(Transformed::Oversize);
                    }
                }
                Ok(Transformed::Chain(chain))
            }
            SendStep::LongMessage => {
                if flags.never_long {
                    Ok(Transformed::Chain(chain))
                } else {
                    Ok(Transformed::Chain(self.convert_long(chain).await?))
                }
            }
            SendStep::Fragmented => Ok(Transformed::Chain(chain)),
        }
    }

    /// Replace a sole forward bundle with a reference to its uploaded form
    ///
    /// The node-count limit is enforced before any upload happens, so an
    /// oversized bundle never reaches the network.
    async fn substitute_forward(
        &self,
        chain: &MessageChain,
        flags: SendFlags,
    ) -> Result<Option<MessageChain>> {
        let Some(bundle) = chain.sole_forward_bundle() else {
            return Ok(None);
        };

        if !flags.ignore_length && bundle.nodes.len() > self.config.max_forward_nodes {
            return Err(CourierError::too_large(format!(
                "forward bundle has {} nodes (limit {})",
                bundle.nodes.len(),
                self.config.max_forward_nodes
            )));
        }

        let resource = self.uploader.upload_forward(&bundle.nodes, false).await?;
        let reference = Element::ForwardRef(ForwardRef {
            resource,
            time: Timestamp::now(),
        });

        let elements = chain
            .iter()
            .map(|element| match element {
                Element::Forward(_) => reference.clone(),
                other => other.clone(),
            })
            .collect();
        Ok(Some(MessageChain::new(elements)))
    }

    /// Upload the whole chain as one forward node attributed to the sending
    /// account and replace it with a brief-preview reference
    async fn convert_long(&self, chain: MessageChain) -> Result<MessageChain> {
        // A chain that is already a reference is a prior conversion's
        // output; converting again would upload a pointer to a pointer.
        if chain.is_long_reference() {
            return Ok(chain);
        }

        let node = ForwardNode {
            sender: self.account.id,
            sender_name: self.account.nickname.clone(),
            time: Timestamp::now(),
            chain: chain.clone(),
        };
        let resource = self
            .uploader
            .upload_forward(core::slice::from_ref(&node), true)
            .await?;

        let reference = Element::LongRef(LongRef {
            resource,
            preview: chain.render_preview(self.config.long_preview_len),
            time: Timestamp::now(),
        });

        let mut elements: Vec<Element> = chain
            .iter()
            .filter(|element| element.is_marker())
            .cloned()
            .collect();
        elements.push(reference);
        Ok(MessageChain::new(elements))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
