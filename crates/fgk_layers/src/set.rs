use camino::Utf8Path;
use sha2::{Digest, Sha256};

use crate::builder::MappingBuilder;
use crate::bundle::MappingBundle;
use crate::error::Result;
use crate::layer::MappingLayer;

/// An ordered pipeline of mapping layers.
pub struct LayeredMappingSet {
    layers: Vec<Box<dyn MappingLayer>>,
}

impl LayeredMappingSet {
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    pub fn with_layer(mut self, layer: impl MappingLayer + 'static) -> Self {
        self.layers.push(Box::new(layer));
        self
    }

    pub fn push_layer(&mut self, layer: impl MappingLayer + 'static) {
        self.layers.push(Box::new(layer));
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Hex digest naming this pipeline's output.
    ///
    /// Layer contributions are folded in order with a separator byte between
    /// layers, so `["AB"]["C"]` and `["A"]["BC"]` produce different keys.
    pub fn cache_key(&self) -> String {
        let mut digest = Sha256::new();
        for (index, layer) in self.layers.iter().enumerate() {
            if index > 0 {
                digest.update([0u8]);
            }
            layer.contribute_hash(&mut digest);
        }
        hex::encode(digest.finalize())
    }

    /// Run every layer over a zero-valued builder, in order, and seal the
    /// result.
    pub fn build(&self) -> Result<MappingBundle> {
        tracing::info!(layers = self.layers.len(), "composing mapping tables");
        let mut builder = MappingBuilder::new();
        for layer in &self.layers {
            layer.visit(&mut builder)?;
        }
        Ok(builder.finish())
    }

    /// Build, memoized at whole-pipeline granularity.
    ///
    /// If `cache_dir/<key>` exists the artifacts are loaded back and no
    /// layer runs at all; otherwise the pipeline is built and its artifacts
    /// written for next time.
    pub fn build_cached(&self, cache_dir: &Utf8Path) -> Result<MappingBundle> {
        let key = self.cache_key();
        let artifact_dir = cache_dir.join(&key);

        if artifact_dir.as_std_path().is_dir() {
            tracing::info!(key = %key, "reusing cached mapping bundle");
            return MappingBundle::load(&artifact_dir);
        }

        let bundle = self.build()?;
        std::fs::create_dir_all(artifact_dir.as_std_path())?;
        bundle.save(&artifact_dir)?;
        tracing::info!(key = %key, "wrote mapping bundle cache artifacts");
        Ok(bundle)
    }
}

impl Default for LayeredMappingSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::{ArchiveImportLayer, MemberCsvLayer, MutateLayer};
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn noop(id: &str) -> MutateLayer {
        MutateLayer::new(id, |_| {})
    }

    fn mapping_archive() -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        let mut writer = ZipWriter::new(&mut cursor);
        let options = SimpleFileOptions::default();

        writer.start_file("mappings/joined.srg", options).unwrap();
        writer
            .write_all(
                b"CL: a net/minecraft/src/Foo\n\
                  FD: a/c net/minecraft/src/Foo/field_1_c\n\
                  MD: a/d (La;)V net/minecraft/src/Foo/func_2_d (Lnet/minecraft/src/Foo;)V\n",
            )
            .unwrap();

        writer.start_file("mappings/client.srg", options).unwrap();
        writer
            .write_all(b"CL: ca net/minecraft/src/ClientFoo\n")
            .unwrap();

        writer.start_file("mappings/packages.csv", options).unwrap();
        writer
            .write_all(b"class,package\nFoo,net/minecraft/util\n")
            .unwrap();

        writer.finish().unwrap();
        cursor.into_inner()
    }

    #[test]
    fn cache_key_is_deterministic_and_order_sensitive() {
        let first = LayeredMappingSet::new()
            .with_layer(noop("alpha"))
            .with_layer(noop("beta"));
        let second = LayeredMappingSet::new()
            .with_layer(noop("alpha"))
            .with_layer(noop("beta"));
        assert_eq!(first.cache_key(), second.cache_key());

        let reordered = LayeredMappingSet::new()
            .with_layer(noop("beta"))
            .with_layer(noop("alpha"));
        assert_ne!(first.cache_key(), reordered.cache_key());
    }

    #[test]
    fn adjacent_layer_contributions_cannot_collide() {
        let ab_c = LayeredMappingSet::new()
            .with_layer(noop("AB"))
            .with_layer(noop("C"));
        let a_bc = LayeredMappingSet::new()
            .with_layer(noop("A"))
            .with_layer(noop("BC"));
        assert_ne!(ab_c.cache_key(), a_bc.cache_key());
    }

    #[test]
    fn builds_and_repackages_only_the_joined_table() {
        let set = LayeredMappingSet::new()
            .with_layer(ArchiveImportLayer::from_bytes("test.zip", mapping_archive()))
            .with_layer(
                MemberCsvLayer::new("members")
                    .with_fields(b"searge,name,side,desc\nfield_1_c,maxHealth,2,\n".to_vec()),
            );

        let bundle = set.build().unwrap();

        // Joined classes moved package; the split table did not.
        assert_eq!(bundle.joined.map_class("a"), "net/minecraft/util/Foo");
        assert_eq!(
            bundle.client.map_class("ca"),
            "net/minecraft/src/ClientFoo"
        );

        // Method target descriptors were repackaged reference by reference.
        let method = bundle.joined.methods.get("a").unwrap().values().next().unwrap();
        assert_eq!(method.desc, "(Lnet/minecraft/util/Foo;)V");

        // Member CSV landed in the bundle.
        assert_eq!(bundle.fields.get("field_1_c").unwrap().name, "maxHealth");
    }

    #[test]
    fn later_layers_override_earlier_ones() {
        let set = LayeredMappingSet::new()
            .with_layer(MutateLayer::new("first", |builder| {
                builder.joined.add_class("a", "One");
            }))
            .with_layer(MutateLayer::new("second", |builder| {
                builder.joined.add_class("a", "Two");
            }));

        let bundle = set.build().unwrap();
        assert_eq!(bundle.joined.map_class("a"), "Two");
    }

    #[test]
    fn cached_build_skips_composition() {
        let dir = tempfile::tempdir().unwrap();
        let cache_dir = camino::Utf8Path::from_path(dir.path()).unwrap();

        let set = LayeredMappingSet::new()
            .with_layer(ArchiveImportLayer::from_bytes("test.zip", mapping_archive()));

        let built = set.build_cached(cache_dir).unwrap();
        assert!(cache_dir.join(set.cache_key()).as_std_path().is_dir());

        let reloaded = set.build_cached(cache_dir).unwrap();
        assert_eq!(built, reloaded);
    }
}
