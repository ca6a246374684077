//! Outgoing source records and sequence resolution
//!
//! An [`OutgoingSource`] is the local record of "this chain was sent to this
//! destination at this time". For direct destinations the authoritative
//! sequence arrives in the packet's own acknowledgment; for group
//! destinations it arrives later through the receipt correlator. The
//! [`SeqCell`] bridges that gap: it is written exactly once, and any number
//! of [`SeqHandle`] waiters (the send itself, later replies quoting this
//! message) can suspend until it resolves.

use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::timeout;
use uuid::Uuid;

use crate::chain::{MessageChain, QuoteRef};
use crate::destination::SendTarget;
use crate::types::{Timestamp, UserId};

// ----------------------------------------------------------------------------
// Sequence Resolution
// ----------------------------------------------------------------------------

/// Outcome of correlating a send with its server-assigned identifiers
///
/// An explicit `Unresolved` state keeps an expired correlation from being
/// mistaken for a real server-assigned sequence of zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqResolution {
    /// The server-assigned identifiers for this send
    Resolved { sequence: u32, internal_id: i64 },
    /// No confirmation arrived before the bounded wait expired
    Unresolved,
}

impl SeqResolution {
    /// The resolved sequence, if any
    pub fn sequence(&self) -> Option<u32> {
        match self {
            SeqResolution::Resolved { sequence, .. } => Some(*sequence),
            SeqResolution::Unresolved => None,
        }
    }

    /// Whether the identifiers were confirmed by the server
    pub fn is_resolved(&self) -> bool {
        matches!(self, SeqResolution::Resolved { .. })
    }
}

// ----------------------------------------------------------------------------
// Sequence Cell
// ----------------------------------------------------------------------------

/// Write-once cell carrying a send's sequence resolution
#[derive(Debug, Clone)]
pub struct SeqCell {
    tx: Arc<watch::Sender<Option<SeqResolution>>>,
}

impl SeqCell {
    /// Create an empty, unresolved cell
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Create a waiter handle over this cell
    pub fn handle(&self) -> SeqHandle {
        SeqHandle {
            rx: self.tx.subscribe(),
        }
    }

    /// Resolve the cell. The first call wins; later calls are ignored and
    /// return false.
    pub fn finalize(&self, resolution: SeqResolution) -> bool {
        self.tx.send_if_modified(|slot| {
            if slot.is_none() {
                *slot = Some(resolution);
                true
            } else {
                false
            }
        })
    }

    /// Non-blocking peek at the current state
    pub fn get(&self) -> Option<SeqResolution> {
        *self.tx.subscribe().borrow()
    }
}

impl Default for SeqCell {
    fn default() -> Self {
        Self::new()
    }
}

// ----------------------------------------------------------------------------
// Sequence Handle
// ----------------------------------------------------------------------------

/// Cloneable waiter over a [`SeqCell`]
#[derive(Debug, Clone)]
pub struct SeqHandle {
    rx: watch::Receiver<Option<SeqResolution>>,
}

impl SeqHandle {
    /// Suspend until the cell is finalized
    ///
    /// If every cell writer is dropped before finalizing, the resolution is
    /// reported as `Unresolved` rather than hanging forever.
    pub async fn wait(&mut self) -> SeqResolution {
        loop {
            {
                let current = self.rx.borrow();
                if let Some(resolution) = *current {
                    return resolution;
                }
            }
            if self.rx.changed().await.is_err() {
                return SeqResolution::Unresolved;
            }
        }
    }

    /// Bounded wait; an expired timeout yields `Unresolved`
    pub async fn wait_timeout(&mut self, limit: core::time::Duration) -> SeqResolution {
        match timeout(limit, self.wait()).await {
            Ok(resolution) => resolution,
            Err(_) => SeqResolution::Unresolved,
        }
    }

    /// Non-blocking peek at the current state
    pub fn get(&self) -> Option<SeqResolution> {
        *self.rx.borrow()
    }
}

// ----------------------------------------------------------------------------
// Outgoing Source
// ----------------------------------------------------------------------------

/// Local record of a sent chain, later enriched with the server-confirmed
/// sequence identifiers
///
/// A source is owned by the send that created it. It stays mutable (through
/// its cell) until the correlator resolves or the bounded wait expires;
/// after that single finalization it is frozen.
#[derive(Debug, Clone)]
pub struct OutgoingSource {
    message_id: Uuid,
    sender: UserId,
    target: SendTarget,
    chain: MessageChain,
    created_at: Timestamp,
    cell: SeqCell,
}

impl OutgoingSource {
    /// Create a new unresolved source for a send attempt
    pub fn new(sender: UserId, target: SendTarget, chain: MessageChain) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            sender,
            target,
            chain,
            created_at: Timestamp::now(),
            cell: SeqCell::new(),
        }
    }

    /// Locally generated message identifier
    pub fn message_id(&self) -> Uuid {
        self.message_id
    }

    /// The account that performed the send
    pub fn sender(&self) -> UserId {
        self.sender
    }

    /// Identifiers of the destination this chain was sent to
    pub fn target(&self) -> SendTarget {
        self.target
    }

    /// The final wire chain that was sent
    pub fn chain(&self) -> &MessageChain {
        &self.chain
    }

    /// When the source was constructed
    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Create a waiter over this source's sequence resolution
    pub fn handle(&self) -> SeqHandle {
        self.cell.handle()
    }

    /// Populate the server-confirmed identifiers. First call wins.
    pub fn finalize(&self, resolution: SeqResolution) -> bool {
        self.cell.finalize(resolution)
    }

    /// Non-blocking peek at the resolution state
    pub fn resolution(&self) -> Option<SeqResolution> {
        self.cell.get()
    }

    /// The resolved sequence, if confirmation has arrived
    pub fn sequence(&self) -> Option<u32> {
        self.resolution().and_then(|r| r.sequence())
    }

    /// Build a quote element referencing this source
    ///
    /// If the sequence is still pending, the quote carries a handle and a
    /// later send will suspend on it before constructing packets.
    pub fn as_quote(&self) -> QuoteRef {
        match self.resolution() {
            Some(SeqResolution::Resolved { sequence, .. }) => {
                QuoteRef::resolved(self.sender, sequence)
            }
            _ => QuoteRef::pending(self.sender, self.handle()),
        }
    }
}

// ----------------------------------------------------------------------------
// Receipt
// ----------------------------------------------------------------------------

/// Caller-visible result of a successful send
#[derive(Debug, Clone)]
pub struct Receipt {
    source: OutgoingSource,
    target: SendTarget,
}

impl Receipt {
    /// Pair a finalized source with its destination
    pub fn new(source: OutgoingSource, target: SendTarget) -> Self {
        Self { source, target }
    }

    /// The finalized source record
    pub fn source(&self) -> &OutgoingSource {
        &self.source
    }

    /// Identifiers of the destination
    pub fn target(&self) -> SendTarget {
        self.target
    }

    /// The source's resolution state
    pub fn resolution(&self) -> SeqResolution {
        self.source.resolution().unwrap_or(SeqResolution::Unresolved)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
