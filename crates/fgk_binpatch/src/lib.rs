//! Binary patch archives for distributing class-file changes.
//!
//! Patched classes ship as GDIFF programs wrapped in small records, packed
//! into a ZIP under one directory per platform. A [`PatchSet`] is the loaded
//! view of one platform's directory: patches against classes that already
//! exist in the input stay in a per-class index, patches that materialize
//! brand-new classes go in a separate addition list.

use std::collections::HashMap;
use std::io::{Read, Seek};

use adler2::Adler32;
use byteorder::{ReadBytesExt, BE};
use tracing::{debug, info};

pub mod error;
pub mod gdiff;

pub use error::{Error, Result};

/// Which platform directory of a patch archive to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchSide {
    Client,
    Server,
}

impl PatchSide {
    fn dir_name(self) -> &'static str {
        match self {
            PatchSide::Client => "client",
            PatchSide::Server => "server",
        }
    }
}

/// One patch record: a GDIFF program plus the metadata needed to apply it.
#[derive(Debug, Clone)]
pub struct Binpatch {
    /// Name of the record inside the archive, kept for diagnostics.
    pub name: String,
    /// Internal name of the class this patch rewrites.
    pub source_class: String,
    /// Internal name the class has after remapping.
    pub target_class: String,
    /// Whether the class is expected to exist in the input being patched.
    /// When false the diff runs against an empty original and the patch
    /// materializes a new class.
    pub exists_in_input: bool,
    /// Adler-32 of the expected original bytes, present iff `exists_in_input`.
    pub checksum: Option<u32>,
    /// The GDIFF program.
    pub payload: Vec<u8>,
}

impl Binpatch {
    /// Decodes a single patch record: a label string (discarded, the archive
    /// entry name is the better diagnostic), source and target class names,
    /// the exists flag with its optional checksum, and the diff payload.
    pub fn read(name: &str, reader: &mut impl Read) -> Result<Self> {
        let _label = read_utf(name, reader)?;
        let source_class = read_utf(name, reader)?;
        let target_class = read_utf(name, reader)?;
        let exists_in_input = reader.read_u8()? != 0;
        let checksum = if exists_in_input {
            Some(reader.read_u32::<BE>()?)
        } else {
            None
        };
        let len = reader.read_u32::<BE>()?;
        if len > i32::MAX as u32 {
            return Err(Error::MalformedRecord {
                name: name.to_owned(),
                detail: format!("payload length {len} exceeds the signed 32-bit range"),
            });
        }
        let mut payload = vec![0u8; len as usize];
        reader.read_exact(&mut payload)?;
        Ok(Self {
            name: name.to_owned(),
            source_class,
            target_class,
            exists_in_input,
            checksum,
            payload,
        })
    }

    /// Applies this patch to `original`, validating the recorded checksum
    /// first. Pass an empty slice for patches that create new classes.
    pub fn apply(&self, original: &[u8]) -> Result<Vec<u8>> {
        if let Some(expected) = self.checksum {
            let mut hasher = Adler32::new();
            hasher.write_slice(original);
            let actual = hasher.checksum();
            if actual != expected {
                return Err(Error::ChecksumMismatch {
                    class: self.source_class.clone(),
                    expected,
                    actual,
                });
            }
        }
        gdiff::apply(&self.payload, original)
    }
}

/// The patches for one platform, partitioned by whether their class exists
/// in the input. The modification index is keyed by target class name, the
/// name the class carries after remapping.
#[derive(Debug, Default)]
pub struct PatchSet {
    modifications: HashMap<String, Vec<Binpatch>>,
    additions: Vec<Binpatch>,
}

impl PatchSet {
    /// Loads every `.binpatch` record under `binpatch/<side>/` from a patch
    /// archive.
    pub fn load(reader: impl Read + Seek, side: PatchSide) -> Result<Self> {
        let mut archive = zip::ZipArchive::new(reader)?;
        let prefix = format!("binpatch/{}/", side.dir_name());

        let mut set = PatchSet::default();
        let mut count = 0usize;
        for index in 0..archive.len() {
            let mut entry = archive.by_index(index)?;
            let name = entry.name().to_owned();
            if !name.starts_with(&prefix) || !name.ends_with(".binpatch") {
                continue;
            }
            let patch = Binpatch::read(&name, &mut entry)?;
            debug!(
                record = %name,
                class = %patch.source_class,
                exists = patch.exists_in_input,
                "loaded patch"
            );
            count += 1;
            if patch.exists_in_input {
                set.modifications
                    .entry(patch.target_class.clone())
                    .or_default()
                    .push(patch);
            } else {
                set.additions.push(patch);
            }
        }
        info!(
            side = side.dir_name(),
            patches = count,
            classes = set.modifications.len(),
            additions = set.additions.len(),
            "patch archive loaded"
        );
        Ok(set)
    }

    /// The patches recorded against the target class `class`, in archive
    /// order.
    pub fn patches_for(&self, class: &str) -> &[Binpatch] {
        self.modifications
            .get(class)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_patch(&self, class: &str) -> bool {
        self.modifications.contains_key(class)
    }

    /// Runs every patch recorded against the target class `class` over
    /// `bytes`, chaining outputs. Classes with no patch pass through
    /// unchanged.
    pub fn process_class(&self, class: &str, bytes: &[u8]) -> Result<Vec<u8>> {
        let Some(patches) = self.modifications.get(class) else {
            return Ok(bytes.to_vec());
        };
        let mut current = bytes.to_vec();
        for patch in patches {
            current = patch.apply(&current)?;
        }
        Ok(current)
    }

    /// Patches that materialize classes absent from the input.
    pub fn additions(&self) -> &[Binpatch] {
        &self.additions
    }

    /// Materializes every addition as `(target class, bytes)`.
    pub fn materialize_additions(&self) -> Result<Vec<(String, Vec<u8>)>> {
        self.additions
            .iter()
            .map(|patch| Ok((patch.target_class.clone(), patch.apply(&[])?)))
            .collect()
    }
}

fn read_utf(record: &str, reader: &mut impl Read) -> Result<String> {
    let len = reader.read_u16::<BE>()? as usize;
    let mut bytes = vec![0u8; len];
    reader.read_exact(&mut bytes)?;
    String::from_utf8(bytes).map_err(|_| Error::MalformedRecord {
        name: record.to_owned(),
        detail: "string field is not valid utf-8".to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use zip::write::SimpleFileOptions;

    use super::*;

    fn encode_record(
        source: &str,
        target: &str,
        original: Option<&[u8]>,
        payload: &[u8],
    ) -> Vec<u8> {
        let label = format!("{source}.binpatch");
        let mut out = Vec::new();
        for field in [label.as_str(), source, target] {
            out.extend_from_slice(&(field.len() as u16).to_be_bytes());
            out.extend_from_slice(field.as_bytes());
        }
        match original {
            Some(bytes) => {
                out.push(1);
                let mut hasher = Adler32::new();
                hasher.write_slice(bytes);
                out.extend_from_slice(&hasher.checksum().to_be_bytes());
            }
            None => out.push(0),
        }
        out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        out.extend_from_slice(payload);
        out
    }

    fn literal_diff(data: &[u8]) -> Vec<u8> {
        assert!(data.len() <= 246);
        let mut diff = gdiff::MAGIC.to_be_bytes().to_vec();
        diff.push(gdiff::VERSION);
        if !data.is_empty() {
            diff.push(data.len() as u8);
            diff.extend_from_slice(data);
        }
        diff.push(0);
        diff
    }

    fn archive(records: &[(&str, Vec<u8>)]) -> Cursor<Vec<u8>> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (path, bytes) in records {
            writer.start_file(*path, SimpleFileOptions::default()).unwrap();
            writer.write_all(bytes).unwrap();
        }
        writer.finish().unwrap()
    }

    #[test]
    fn record_round_trips() {
        let original = b"class bytes";
        let encoded = encode_record("ab", "net/minecraft/Thing", Some(original), &literal_diff(b"x"));
        let patch = Binpatch::read("ab.binpatch", &mut Cursor::new(encoded)).unwrap();

        assert_eq!(patch.source_class, "ab");
        assert_eq!(patch.target_class, "net/minecraft/Thing");
        assert!(patch.exists_in_input);
        assert_eq!(patch.apply(original).unwrap(), b"x");
    }

    #[test]
    fn oversized_payload_length_is_rejected() {
        let mut encoded = Vec::new();
        for field in ["ab.binpatch", "ab", "ab"] {
            encoded.extend_from_slice(&(field.len() as u16).to_be_bytes());
            encoded.extend_from_slice(field.as_bytes());
        }
        encoded.push(0); // does not exist in the input, no checksum
        encoded.extend_from_slice(&0x8000_0000u32.to_be_bytes());

        assert!(matches!(
            Binpatch::read("ab.binpatch", &mut Cursor::new(encoded)),
            Err(Error::MalformedRecord { .. })
        ));
    }

    #[test]
    fn checksum_mismatch_is_fatal() {
        let encoded = encode_record("ab", "ab", Some(b"expected"), &literal_diff(b"x"));
        let patch = Binpatch::read("ab.binpatch", &mut Cursor::new(encoded)).unwrap();

        assert!(matches!(
            patch.apply(b"tampered"),
            Err(Error::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn loads_only_the_requested_side() {
        let cursor = archive(&[
            (
                "binpatch/client/ab.binpatch",
                encode_record("ab", "ab", Some(b"orig"), &literal_diff(b"client")),
            ),
            (
                "binpatch/server/ab.binpatch",
                encode_record("ab", "ab", Some(b"orig"), &literal_diff(b"server")),
            ),
            (
                "binpatch/client/cd.binpatch",
                encode_record("cd", "net/minecraft/Added", None, &literal_diff(b"new")),
            ),
            ("binpatch/client/notes.txt", b"ignored".to_vec()),
        ]);

        let set = PatchSet::load(cursor, PatchSide::Client).unwrap();
        assert!(set.has_patch("ab"));
        assert!(!set.has_patch("cd"));
        assert_eq!(set.process_class("ab", b"orig").unwrap(), b"client");

        let added = set.materialize_additions().unwrap();
        assert_eq!(added, vec![("net/minecraft/Added".to_owned(), b"new".to_vec())]);
    }

    #[test]
    fn modifications_are_keyed_by_the_target_name() {
        let cursor = archive(&[(
            "binpatch/client/ab.binpatch",
            encode_record(
                "ab",
                "net/minecraft/Thing",
                Some(b"orig"),
                &literal_diff(b"patched"),
            ),
        )]);

        let set = PatchSet::load(cursor, PatchSide::Client).unwrap();
        assert!(set.has_patch("net/minecraft/Thing"));
        assert!(!set.has_patch("ab"));
        assert_eq!(
            set.process_class("net/minecraft/Thing", b"orig").unwrap(),
            b"patched"
        );
        assert_eq!(set.patches_for("net/minecraft/Thing")[0].source_class, "ab");
    }

    #[test]
    fn unpatched_classes_pass_through() {
        let set = PatchSet::default();
        assert_eq!(set.process_class("zz", b"bytes").unwrap(), b"bytes");
    }

    #[test]
    fn stacked_patches_chain_in_archive_order() {
        let first = encode_record("ab", "ab", Some(b""), &literal_diff(b"one"));
        let second = encode_record("ab", "ab", Some(b"one"), &literal_diff(b"two"));
        let cursor = archive(&[
            ("binpatch/server/ab.0.binpatch", first),
            ("binpatch/server/ab.1.binpatch", second),
        ]);

        let set = PatchSet::load(cursor, PatchSide::Server).unwrap();
        assert_eq!(set.patches_for("ab").len(), 2);
        assert_eq!(set.process_class("ab", b"").unwrap(), b"two");
    }
}
