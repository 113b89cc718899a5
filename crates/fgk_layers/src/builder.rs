use fgk_mappings::{Members, Packages, Srg};

use crate::bundle::MappingBundle;

/// The accumulating table set threaded through the layer pipeline.
///
/// Starts zero-valued, is mutated by each layer in turn, and is consumed by
/// [`finish`](MappingBuilder::finish). Layers run strictly in sequence; the
/// builder is never shared.
#[derive(Debug, Default, Clone)]
pub struct MappingBuilder {
    /// Single-platform (merged client+server) table.
    pub joined: Srg,
    pub client: Srg,
    pub server: Srg,
    pub fields: Members,
    pub methods: Members,
    pub packages: Packages,
}

impl MappingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seal the builder into an immutable bundle.
    ///
    /// Repackaging applies to the *joined* table only, and only when a
    /// package table accumulated. The client/server split tables predate
    /// package-level renaming in the source ecosystem and are deliberately
    /// left alone.
    pub fn finish(self) -> MappingBundle {
        let joined = if self.packages.is_empty() {
            self.joined
        } else {
            tracing::debug!(moves = self.packages.len(), "repackaging joined table");
            self.joined.repackaged(&self.packages)
        };

        MappingBundle {
            joined,
            client: self.client,
            server: self.server,
            fields: self.fields,
            methods: self.methods,
        }
    }
}
