//! Merging the client and server archives of a split distribution into one.
//!
//! Both archives are read concurrently, their class sets are walked as a
//! union, and every class is routed through one of four paths: identical
//! bytes are copied once, classes present on both sides with differing bytes
//! are structurally merged, and one-sided classes are carried over with a
//! class-level marker annotation. Server-only classes that look like a
//! bundled third-party library are dropped instead of carried.
//!
//! The marker annotation (`@SideOnly(Side.CLIENT)` style) is referenced by
//! descriptor only; injecting the annotation classes themselves into the
//! output is the caller's concern.

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use itertools::Itertools;
use tracing::{info, warn};

mod align;
mod class_merge;
pub mod error;
mod jar;

pub use error::{Error, Result};
pub use jar::JarContents;

/// Descriptor of the marker annotation stamped on platform-exclusive
/// classes and members.
pub const SIDE_ONLY_DESC: &str = "Lforgekit/runtime/SideOnly;";
/// Descriptor of the marker's enum value type.
pub const SIDE_ENUM_DESC: &str = "Lforgekit/runtime/Side;";

/// Which platform an exclusive class or member belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExclusiveSide {
    Client,
    Server,
}

impl ExclusiveSide {
    pub fn constant(self) -> &'static str {
        match self {
            ExclusiveSide::Client => "CLIENT",
            ExclusiveSide::Server => "SERVER",
        }
    }
}

/// What happened during a merge, for logging and for surfacing the cases
/// that need a human to look at them.
#[derive(Debug, Default)]
pub struct MergeReport {
    /// Classes byte-identical on both sides, copied once.
    pub identical: usize,
    /// Classes structurally merged.
    pub merged: usize,
    /// Classes carried from one side only.
    pub client_only: usize,
    pub server_only: usize,
    /// Server-only classes judged to be bundled libraries and dropped.
    pub dropped: Vec<String>,
    /// Structural mismatches the merge papered over; review these by hand.
    pub review: Vec<String>,
}

/// Merges a client archive and a server archive.
#[derive(Debug)]
pub struct JarMerger {
    client: Utf8PathBuf,
    server: Utf8PathBuf,
    timeout: Duration,
}

impl JarMerger {
    /// Readers get a very generous budget before the merge gives up on them;
    /// archives can sit on slow network mounts.
    pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60 * 60);

    pub fn new(client: impl Into<Utf8PathBuf>, server: impl Into<Utf8PathBuf>) -> Self {
        Self {
            client: client.into(),
            server: server.into(),
            timeout: Self::DEFAULT_READ_TIMEOUT,
        }
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reads both archives on worker threads and merges them.
    pub fn merge(&self) -> Result<(JarContents, MergeReport)> {
        let client_rx = jar::spawn_reader(self.client.clone());
        let server_rx = jar::spawn_reader(self.server.clone());
        let client = jar::await_reader(&client_rx, &self.client, self.timeout)?;
        let server = jar::await_reader(&server_rx, &self.server, self.timeout)?;
        merge_contents(&client, &server)
    }

    /// Merges and writes the result to `output`.
    pub fn merge_to_path(&self, output: &Utf8Path) -> Result<MergeReport> {
        let (contents, report) = self.merge()?;
        let file = std::fs::File::create(output)?;
        jar::write_jar(file, &contents)?;
        info!(
            output = %output,
            identical = report.identical,
            merged = report.merged,
            client_only = report.client_only,
            server_only = report.server_only,
            "archives merged"
        );
        Ok(report)
    }
}

/// The merge itself, over already-loaded archives.
pub fn merge_contents(client: &JarContents, server: &JarContents) -> Result<(JarContents, MergeReport)> {
    let mut out = JarContents::default();
    let mut report = MergeReport::default();

    // BTreeMap keys are sorted, so merging the two key streams walks the
    // union in order.
    let names: Vec<&String> = client
        .classes
        .keys()
        .merge(server.classes.keys())
        .dedup()
        .collect();

    for name in names {
        match (client.classes.get(name), server.classes.get(name)) {
            (Some(client_bytes), Some(server_bytes)) if client_bytes == server_bytes => {
                report.identical += 1;
                out.classes.insert(name.clone(), client_bytes.clone());
            }
            (Some(client_bytes), Some(server_bytes)) => {
                report.merged += 1;
                let merged =
                    class_merge::merge_class(client_bytes, server_bytes, &mut report.review)?;
                out.classes.insert(name.clone(), merged);
            }
            (Some(client_bytes), None) => {
                report.client_only += 1;
                let marked =
                    class_merge::annotate_exclusive(client_bytes, ExclusiveSide::Client)?;
                out.classes.insert(name.clone(), marked);
            }
            (None, Some(server_bytes)) => {
                if is_bundled_library(name) {
                    report.dropped.push(name.clone());
                    continue;
                }
                report.server_only += 1;
                let marked =
                    class_merge::annotate_exclusive(server_bytes, ExclusiveSide::Server)?;
                out.classes.insert(name.clone(), marked);
            }
            (None, None) => continue,
        }
    }

    out.resources = client.resources.clone();
    for (name, bytes) in &server.resources {
        match out.resources.get(name) {
            None => {
                out.resources.insert(name.clone(), bytes.clone());
            }
            Some(existing) if existing != bytes => {
                let note = format!("resource `{name}` differs between platforms, keeping client");
                warn!("{note}");
                report.review.push(note);
            }
            Some(_) => {}
        }
    }

    if !report.dropped.is_empty() {
        warn!(
            classes = %report.dropped.iter().join(", "),
            "dropped server-bundled library classes"
        );
    }
    Ok((out, report))
}

/// Server-only classes outside the game's namespace that live in a package
/// are library code the server bundles; the obfuscated game classes have no
/// package at all.
fn is_bundled_library(name: &str) -> bool {
    !name.starts_with("net/minecraft/") && name.contains('/')
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use fgk_classfile::{annotations, AccessFlags, ClassFile, ConstantPool};
    use zip::write::SimpleFileOptions;

    use super::*;

    fn class_bytes(name: &str, extra_field: Option<&str>) -> Vec<u8> {
        let mut pool = ConstantPool::new();
        let this_class = pool.intern_class(name).unwrap();
        let super_class = pool.intern_class("java/lang/Object").unwrap();
        let fields = extra_field
            .into_iter()
            .map(|field| fgk_classfile::Member {
                access: AccessFlags::PUBLIC,
                name: pool.intern_utf8(field).unwrap(),
                desc: pool.intern_utf8("I").unwrap(),
                attributes: Vec::new(),
            })
            .collect();
        ClassFile {
            minor: 0,
            major: 52,
            pool,
            access: AccessFlags::PUBLIC | AccessFlags::SUPER,
            this_class,
            super_class,
            interfaces: Vec::new(),
            fields,
            methods: Vec::new(),
            attributes: Vec::new(),
        }
        .to_bytes()
        .unwrap()
    }

    fn jar(entries: &[(&str, Vec<u8>)]) -> JarContents {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (path, bytes) in entries {
            writer
                .start_file(*path, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(bytes).unwrap();
        }
        JarContents::read(writer.finish().unwrap()).unwrap()
    }

    fn side_of(bytes: &[u8]) -> Option<String> {
        let class = ClassFile::parse(bytes).unwrap();
        annotations::enum_annotation_value(&class.pool, &class.attributes, SIDE_ONLY_DESC).unwrap()
    }

    #[test]
    fn routes_each_class_down_the_right_path() {
        let shared = class_bytes("a", None);
        let client = jar(&[
            ("a.class", shared.clone()),
            ("b.class", class_bytes("b", Some("clientish"))),
            ("c.class", class_bytes("c", None)),
            ("assets/logo.png", b"png".to_vec()),
        ]);
        let server = jar(&[
            ("a.class", shared),
            ("b.class", class_bytes("b", Some("serverish"))),
            ("d.class", class_bytes("d", None)),
            ("org/bundled/Lib.class", class_bytes("org/bundled/Lib", None)),
            ("server.properties", b"cfg".to_vec()),
        ]);

        let (out, report) = merge_contents(&client, &server).unwrap();

        assert_eq!(report.identical, 1);
        assert_eq!(report.merged, 1);
        assert_eq!(report.client_only, 1);
        assert_eq!(report.server_only, 1);
        assert_eq!(report.dropped, vec!["org/bundled/Lib".to_owned()]);

        assert_eq!(side_of(&out.classes["a"]), None);
        assert_eq!(side_of(&out.classes["c"]).as_deref(), Some("CLIENT"));
        assert_eq!(side_of(&out.classes["d"]).as_deref(), Some("SERVER"));
        assert!(!out.classes.contains_key("org/bundled/Lib"));

        let merged = ClassFile::parse(&out.classes["b"]).unwrap();
        assert_eq!(merged.fields.len(), 2);
        assert!(out.resources.contains_key("assets/logo.png"));
        assert!(out.resources.contains_key("server.properties"));
    }

    #[test]
    fn game_namespace_classes_survive_even_with_a_package() {
        let client = jar(&[]);
        let server = jar(&[(
            "net/minecraft/server/MinecraftServer.class",
            class_bytes("net/minecraft/server/MinecraftServer", None),
        )]);

        let (out, report) = merge_contents(&client, &server).unwrap();
        assert!(report.dropped.is_empty());
        assert!(out
            .classes
            .contains_key("net/minecraft/server/MinecraftServer"));
    }

    #[test]
    fn differing_resources_are_flagged_for_review() {
        let client = jar(&[("data.txt", b"one".to_vec())]);
        let server = jar(&[("data.txt", b"two".to_vec())]);

        let (out, report) = merge_contents(&client, &server).unwrap();
        assert_eq!(out.resources["data.txt"], b"one");
        assert_eq!(report.review.len(), 1);
    }

    #[test]
    fn merges_end_to_end_through_the_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();

        for (file, class) in [("client.jar", "a"), ("server.jar", "b")] {
            let mut writer =
                zip::ZipWriter::new(std::fs::File::create(root.join(file)).unwrap());
            writer
                .start_file(format!("{class}.class"), SimpleFileOptions::default())
                .unwrap();
            writer.write_all(&class_bytes(class, None)).unwrap();
            writer.finish().unwrap();
        }

        let output = root.join("merged.jar");
        let report = JarMerger::new(root.join("client.jar"), root.join("server.jar"))
            .merge_to_path(&output)
            .unwrap();
        assert_eq!(report.client_only, 1);
        assert_eq!(report.server_only, 1);

        let merged = JarContents::read_path(&output).unwrap();
        assert_eq!(side_of(&merged.classes["a"]).as_deref(), Some("CLIENT"));
        assert_eq!(side_of(&merged.classes["b"]).as_deref(), Some("SERVER"));
    }
}
