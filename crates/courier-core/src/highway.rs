//! Highway uploader abstraction
//!
//! The highway is the binary-object upload channel used for content too
//! large or too structured to travel inline: forward bundles and
//! long-message conversions. The pipeline only needs the resource id the
//! upload produces; protocol internals stay behind this seam.

use async_trait::async_trait;

use crate::chain::ForwardNode;
use crate::errors::Result;
use crate::types::ResourceId;

// ----------------------------------------------------------------------------
// Highway Uploader Trait
// ----------------------------------------------------------------------------

/// Uploads bundled content to the binary object store
#[async_trait]
pub trait HighwayUploader: Send + Sync {
    /// Upload a set of forward nodes as one unit and return the resource id
    /// that references them
    ///
    /// `long_message` distinguishes a long-message conversion (the whole
    /// chain wrapped as a single node) from a user-composed forward bundle;
    /// the store indexes the two differently.
    async fn upload_forward(&self, nodes: &[ForwardNode], long_message: bool)
        -> Result<ResourceId>;
}
