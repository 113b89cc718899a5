use std::io::{Cursor, Read};

use camino::Utf8Path;
use fgk_mappings::{
    denylist, parse_csrg, parse_member_csv, parse_package_csv, parse_srg, Srg,
};
use sha2::{Digest, Sha256};
use zip::ZipArchive;

use crate::builder::MappingBuilder;
use crate::error::Result;

/// One unit of mapping construction.
///
/// Layers are owned by a [`LayeredMappingSet`](crate::LayeredMappingSet) and
/// applied strictly in list order; [`visit`](MappingLayer::visit) mutates the
/// accumulating builder and [`contribute_hash`](MappingLayer::contribute_hash)
/// feeds the layer's identity into the pipeline digest. Anything that changes
/// what `visit` does must change what `contribute_hash` writes.
pub trait MappingLayer {
    fn visit(&self, builder: &mut MappingBuilder) -> Result<()>;
    fn contribute_hash(&self, digest: &mut Sha256);
}

fn digest_chunk(digest: &mut Sha256, bytes: &[u8]) {
    // Length-prefixed so adjacent chunks cannot be reassociated.
    digest.update((bytes.len() as u64).to_be_bytes());
    digest.update(bytes);
}

/// Imports a ZIP of mapping files: `joined`/`client`/`server` tables in
/// either class-rename dialect, plus `fields.csv`, `methods.csv` and
/// `packages.csv`. Unrecognized entries are ignored.
pub struct ArchiveImportLayer {
    label: String,
    data: Vec<u8>,
}

impl ArchiveImportLayer {
    pub fn from_path(path: &Utf8Path) -> Result<Self> {
        Ok(Self {
            label: path.file_name().unwrap_or(path.as_str()).to_owned(),
            data: std::fs::read(path.as_std_path())?,
        })
    }

    pub fn from_bytes(label: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            label: label.into(),
            data,
        }
    }
}

impl MappingLayer for ArchiveImportLayer {
    fn visit(&self, builder: &mut MappingBuilder) -> Result<()> {
        let mut archive = ZipArchive::new(Cursor::new(self.data.as_slice()))?;
        for index in 0..archive.len() {
            let mut file = archive.by_index(index)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().rsplit('/').next().unwrap_or("").to_owned();
            let mut content = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut content)?;

            match name.as_str() {
                "fields.csv" => builder
                    .fields
                    .merge_with(&parse_member_csv(Cursor::new(content))?),
                "methods.csv" => builder
                    .methods
                    .merge_with(&parse_member_csv(Cursor::new(content))?),
                "packages.csv" => builder
                    .packages
                    .merge_with(&parse_package_csv(Cursor::new(content))?),
                _ => {
                    let (stem, table) = match name.rsplit_once('.') {
                        Some((stem, "srg")) => (stem, parse_srg(Cursor::new(content))?),
                        Some((stem, "csrg")) => (stem, parse_csrg(Cursor::new(content))?),
                        _ => {
                            tracing::debug!(archive = %self.label, entry = %name, "ignoring entry");
                            continue;
                        }
                    };
                    let mut table = table;
                    let removed = denylist::scrub(&mut table);
                    if removed > 0 {
                        tracing::debug!(archive = %self.label, entry = %name, removed, "scrubbed denylisted rows");
                    }
                    match stem {
                        "client" => builder.client.merge_with(&table),
                        "server" => builder.server.merge_with(&table),
                        _ => builder.joined.merge_with(&table),
                    }
                }
            }
        }
        Ok(())
    }

    fn contribute_hash(&self, digest: &mut Sha256) {
        digest_chunk(digest, self.label.as_bytes());
        digest_chunk(digest, &self.data);
    }
}

/// Imports field/method rename CSVs without touching the class tables.
#[derive(Default)]
pub struct MemberCsvLayer {
    label: String,
    fields: Option<Vec<u8>>,
    methods: Option<Vec<u8>>,
}

impl MemberCsvLayer {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    pub fn with_fields(mut self, csv: Vec<u8>) -> Self {
        self.fields = Some(csv);
        self
    }

    pub fn with_methods(mut self, csv: Vec<u8>) -> Self {
        self.methods = Some(csv);
        self
    }
}

impl MappingLayer for MemberCsvLayer {
    fn visit(&self, builder: &mut MappingBuilder) -> Result<()> {
        if let Some(csv) = &self.fields {
            builder
                .fields
                .merge_with(&parse_member_csv(Cursor::new(csv.as_slice()))?);
        }
        if let Some(csv) = &self.methods {
            builder
                .methods
                .merge_with(&parse_member_csv(Cursor::new(csv.as_slice()))?);
        }
        Ok(())
    }

    fn contribute_hash(&self, digest: &mut Sha256) {
        digest_chunk(digest, self.label.as_bytes());
        digest_chunk(digest, self.fields.as_deref().unwrap_or_default());
        digest_chunk(digest, self.methods.as_deref().unwrap_or_default());
    }
}

/// Drops one class — and every member mapping under it — from all three
/// class tables.
pub struct RemoveClassLayer {
    class: String,
}

impl RemoveClassLayer {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
        }
    }
}

impl MappingLayer for RemoveClassLayer {
    fn visit(&self, builder: &mut MappingBuilder) -> Result<()> {
        for table in [
            &mut builder.joined,
            &mut builder.client,
            &mut builder.server,
        ] {
            table.classes.remove(&self.class);
            table.fields.remove(&self.class);
            table.methods.remove(&self.class);
        }
        Ok(())
    }

    fn contribute_hash(&self, digest: &mut Sha256) {
        digest_chunk(digest, b"remove-class");
        digest_chunk(digest, self.class.as_bytes());
    }
}

/// An arbitrary mutation with an explicit identity string.
///
/// The identity is all that reaches the cache key, so it must change
/// whenever the closure's behavior does.
pub struct MutateLayer {
    id: String,
    mutate: Box<dyn Fn(&mut MappingBuilder) + Send + Sync>,
}

impl MutateLayer {
    pub fn new(
        id: impl Into<String>,
        mutate: impl Fn(&mut MappingBuilder) + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            mutate: Box::new(mutate),
        }
    }
}

impl MappingLayer for MutateLayer {
    fn visit(&self, builder: &mut MappingBuilder) -> Result<()> {
        (self.mutate)(builder);
        Ok(())
    }

    fn contribute_hash(&self, digest: &mut Sha256) {
        digest_chunk(digest, self.id.as_bytes());
    }
}

/// Convenience for building a plain `Srg` layer in tests and callers that
/// already hold a parsed table.
pub struct TableLayer {
    id: String,
    table: Srg,
}

impl TableLayer {
    pub fn new(id: impl Into<String>, table: Srg) -> Self {
        Self {
            id: id.into(),
            table,
        }
    }
}

impl MappingLayer for TableLayer {
    fn visit(&self, builder: &mut MappingBuilder) -> Result<()> {
        builder.joined.merge_with(&self.table);
        Ok(())
    }

    fn contribute_hash(&self, digest: &mut Sha256) {
        digest_chunk(digest, self.id.as_bytes());
        let mut text = Vec::new();
        // Infallible: writing to a Vec cannot fail.
        let _ = self.table.write_srg(&mut text);
        digest_chunk(digest, &text);
    }
}
