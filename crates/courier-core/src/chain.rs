//! Message chain data model
//!
//! A [`MessageChain`] is an ordered, immutable sequence of message elements.
//! Chains are created fresh by every transform step and never mutated in
//! place. Marker elements are zero-weight flags embedded in a chain purely
//! to steer the delivery pipeline; they render to nothing and are preserved
//! through every transform.

use serde::{Deserialize, Serialize};

use crate::outgoing::{SeqHandle, SeqResolution};
use crate::types::{ResourceId, Timestamp, UserId};

// ----------------------------------------------------------------------------
// Markers
// ----------------------------------------------------------------------------

/// Zero-content flag elements steering the delivery strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Marker {
    /// Convert to a long message immediately, regardless of size
    ForceLongMessage,
    /// Never convert to a long message; fall back to fragmentation instead
    NeverLongMessage,
    /// Skip every size estimation and node-count check
    IgnoreLengthCheck,
}

/// Per-send flags computed once from the input chain
///
/// The pipeline consults these instead of re-scanning the chain by element
/// type at every step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendFlags {
    pub force_long: bool,
    pub never_long: bool,
    pub ignore_length: bool,
}

impl SendFlags {
    /// Scan a chain once and capture its marker flags
    pub fn from_chain(chain: &MessageChain) -> Self {
        Self {
            force_long: chain.has_marker(Marker::ForceLongMessage),
            never_long: chain.has_marker(Marker::NeverLongMessage),
            ignore_length: chain.has_marker(Marker::IgnoreLengthCheck),
        }
    }
}

// ----------------------------------------------------------------------------
// Content Elements
// ----------------------------------------------------------------------------

/// Where an image resource was originally uploaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageOrigin {
    /// Uploaded in a direct (friend/stranger) context
    Direct,
    /// Uploaded in a group context
    Group,
}

/// Reference to an already-uploaded image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    /// Resource identifier of the image data
    pub resource: ResourceId,
    /// The context the image was originally uploaded in
    pub origin: ImageOrigin,
}

/// Quoted reply to an earlier outgoing message
///
/// A quote's validity depends on the quoted send's sequence. When the quoted
/// send has not been correlated yet, the quote carries a handle and the
/// pipeline suspends on it before constructing packets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteRef {
    /// Sender of the quoted message
    pub sender: UserId,
    /// Server-assigned sequence of the quoted message, once known
    pub sequence: Option<u32>,
    #[serde(skip)]
    handle: Option<SeqHandle>,
}

impl QuoteRef {
    /// Quote a message whose sequence is already known
    pub fn resolved(sender: UserId, sequence: u32) -> Self {
        Self {
            sender,
            sequence: Some(sequence),
            handle: None,
        }
    }

    /// Quote a message whose sequence is still being correlated
    pub fn pending(sender: UserId, handle: SeqHandle) -> Self {
        Self {
            sender,
            sequence: None,
            handle: Some(handle),
        }
    }

    /// Whether this quote still needs its sequence resolved
    pub fn is_pending(&self) -> bool {
        self.sequence.is_none() && self.handle.is_some()
    }

    /// Wait for the quoted send's sequence and return the settled quote
    ///
    /// A quoted send that finished unresolved leaves the sequence empty; the
    /// quote is still usable, merely degraded.
    pub async fn resolve(mut self) -> Self {
        if self.sequence.is_some() {
            self.handle = None;
            return self;
        }
        if let Some(mut handle) = self.handle.take() {
            if let SeqResolution::Resolved { sequence, .. } = handle.wait().await {
                self.sequence = Some(sequence);
            }
        }
        self
    }
}

impl PartialEq for QuoteRef {
    fn eq(&self, other: &Self) -> bool {
        self.sender == other.sender && self.sequence == other.sequence
    }
}

impl Eq for QuoteRef {}

/// One pre-composed message inside a forward bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardNode {
    /// Original sender of the node
    pub sender: UserId,
    /// Display name shown for the node
    pub sender_name: String,
    /// Original send time of the node
    pub time: Timestamp,
    /// The node's content
    pub chain: MessageChain,
}

/// A structured collection of pre-composed messages sent as one unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardBundle {
    pub nodes: Vec<ForwardNode>,
}

impl ForwardBundle {
    pub fn new(nodes: Vec<ForwardNode>) -> Self {
        Self { nodes }
    }
}

/// Lightweight reference to an uploaded forward bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardRef {
    /// Resource identifier of the uploaded bundle
    pub resource: ResourceId,
    /// When the substitution happened
    pub time: Timestamp,
}

/// Reference to an uploaded long message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LongRef {
    /// Resource identifier of the uploaded content
    pub resource: ResourceId,
    /// Brief preview of the rendered content
    pub preview: String,
    /// When the conversion happened
    pub time: Timestamp,
}

/// Music share card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MusicShare {
    pub title: String,
    pub summary: String,
    pub jump_url: String,
    pub music_url: String,
}

// ----------------------------------------------------------------------------
// Element
// ----------------------------------------------------------------------------

/// A single element of a message chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Element {
    Text(String),
    Image(ImageRef),
    Quote(QuoteRef),
    Forward(ForwardBundle),
    ForwardRef(ForwardRef),
    LongRef(LongRef),
    Music(MusicShare),
    Marker(Marker),
}

impl Element {
    /// Length of this element's rendered content, in characters
    pub fn rendered_len(&self) -> usize {
        match self {
            Element::Text(text) => text.chars().count(),
            Element::Image(_) => "[image]".len(),
            Element::Quote(_) => 0,
            Element::Forward(_) | Element::ForwardRef(_) => "[forward]".len(),
            Element::LongRef(long) => long.preview.chars().count(),
            Element::Music(music) => music.title.chars().count(),
            Element::Marker(_) => 0,
        }
    }

    /// Append this element's rendered content to a buffer
    fn render_into(&self, out: &mut String) {
        match self {
            Element::Text(text) => out.push_str(text),
            Element::Image(_) => out.push_str("[image]"),
            Element::Quote(_) => {}
            Element::Forward(_) | Element::ForwardRef(_) => out.push_str("[forward]"),
            Element::LongRef(long) => out.push_str(&long.preview),
            Element::Music(music) => out.push_str(&music.title),
            Element::Marker(_) => {}
        }
    }

    /// Whether this element is a zero-weight marker
    pub fn is_marker(&self) -> bool {
        matches!(self, Element::Marker(_))
    }
}

// ----------------------------------------------------------------------------
// Message Chain
// ----------------------------------------------------------------------------

/// Ordered, immutable sequence of message elements
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageChain(Vec<Element>);

impl MessageChain {
    /// Create a chain from its elements
    pub fn new(elements: Vec<Element>) -> Self {
        Self(elements)
    }

    /// Create a single-text chain
    pub fn text(content: impl Into<String>) -> Self {
        Self(vec![Element::Text(content.into())])
    }

    /// Create a single-element chain
    pub fn from_element(element: Element) -> Self {
        Self(vec![element])
    }

    /// Borrow the elements
    pub fn elements(&self) -> &[Element] {
        &self.0
    }

    /// Consume the chain into its elements
    pub fn into_elements(self) -> Vec<Element> {
        self.0
    }

    /// Iterate over the elements
    pub fn iter(&self) -> core::slice::Iter<'_, Element> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the chain carries the given marker
    pub fn has_marker(&self, marker: Marker) -> bool {
        self.0
            .iter()
            .any(|e| matches!(e, Element::Marker(m) if *m == marker))
    }

    /// Whether any element is a music share
    pub fn contains_music(&self) -> bool {
        self.0.iter().any(|e| matches!(e, Element::Music(_)))
    }

    /// The chain's sole content element, ignoring markers, if it has
    /// exactly one
    fn sole_content(&self) -> Option<&Element> {
        let mut content = self.0.iter().filter(|e| !e.is_marker());
        match (content.next(), content.next()) {
            (Some(element), None) => Some(element),
            _ => None,
        }
    }

    /// The forward bundle, if it is the chain's only content
    pub fn sole_forward_bundle(&self) -> Option<&ForwardBundle> {
        match self.sole_content() {
            Some(Element::Forward(bundle)) => Some(bundle),
            _ => None,
        }
    }

    /// Whether the chain's only content is already an uploaded-content
    /// reference (a prior transform's output)
    pub fn is_long_reference(&self) -> bool {
        matches!(
            self.sole_content(),
            Some(Element::LongRef(_)) | Some(Element::ForwardRef(_))
        )
    }

    /// Full rendered content of the chain
    pub fn rendered(&self) -> String {
        let mut out = String::new();
        for element in &self.0 {
            element.render_into(&mut out);
        }
        out
    }

    /// Total rendered length, in characters
    pub fn rendered_len(&self) -> usize {
        self.0.iter().map(Element::rendered_len).sum()
    }

    /// First `limit` characters of the rendered content
    pub fn render_preview(&self, limit: usize) -> String {
        self.rendered().chars().take(limit).collect()
    }

    /// Split the chain into per-packet chains whose rendered length fits
    /// within `budget`
    ///
    /// Zero-weight elements travel with the chunk being built when they are
    /// encountered. A single text element longer than the budget is split at
    /// character boundaries.
    pub fn split_inline(&self, budget: usize) -> Vec<MessageChain> {
        let budget = budget.max(1);
        let mut chunks: Vec<Vec<Element>> = Vec::new();
        let mut current: Vec<Element> = Vec::new();
        let mut used = 0usize;

        fn flush(current: &mut Vec<Element>, used: &mut usize, chunks: &mut Vec<Vec<Element>>) {
            if !current.is_empty() {
                chunks.push(core::mem::take(current));
                *used = 0;
            }
        }

        for element in &self.0 {
            let weight = element.rendered_len();
            if weight == 0 {
                current.push(element.clone());
                continue;
            }

            if let Element::Text(text) = element {
                if weight > budget {
                    let glyphs: Vec<char> = text.chars().collect();
                    for piece in glyphs.chunks(budget) {
                        if used + piece.len() > budget {
                            flush(&mut current, &mut used, &mut chunks);
                        }
                        used += piece.len();
                        current.push(Element::Text(piece.iter().collect()));
                    }
                    continue;
                }
            }

            if used + weight > budget {
                flush(&mut current, &mut used, &mut chunks);
            }
            used += weight;
            current.push(element.clone());
        }

        if !current.is_empty() || chunks.is_empty() {
            chunks.push(current);
        }

        chunks.into_iter().map(MessageChain::new).collect()
    }
}

impl From<Vec<Element>> for MessageChain {
    fn from(elements: Vec<Element>) -> Self {
        Self::new(elements)
    }
}

impl<'a> IntoIterator for &'a MessageChain {
    type Item = &'a Element;
    type IntoIter = core::slice::Iter<'a, Element>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
