//! Layered construction of mapping tables.
//!
//! A [`LayeredMappingSet`] owns an ordered list of [`MappingLayer`]s, each of
//! which mutates an accumulating [`MappingBuilder`] and feeds its identity
//! into a running digest. Order matters twice over: later layers override
//! earlier ones for the same key, and the digest — the pipeline's cache key —
//! folds contributions in list order with a separator byte between layers.
//!
//! Composition is memoized at whole-pipeline granularity: if a cache
//! directory already holds artifacts under the pipeline's key, building is
//! skipped entirely and the artifacts are loaded back instead.

mod builder;
mod bundle;
mod error;
mod layer;
mod set;

pub use builder::MappingBuilder;
pub use bundle::MappingBundle;
pub use error::{Error, Result};
pub use layer::{
    ArchiveImportLayer, MappingLayer, MemberCsvLayer, MutateLayer, RemoveClassLayer, TableLayer,
};
pub use set::LayeredMappingSet;
