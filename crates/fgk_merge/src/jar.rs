//! Archive reading and writing.
//!
//! The two input archives are read on worker threads so both sides stream
//! from disk concurrently; the merge itself waits on a channel with a
//! generous timeout rather than blocking forever on a wedged reader.

use std::collections::BTreeMap;
use std::io::{Read, Seek, Write};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;
use zip::write::SimpleFileOptions;

use crate::error::{Error, Result};

/// An archive split into class entries (keyed by internal class name) and
/// everything else. Signature material under `META-INF/` is discarded, since
/// it cannot survive a merge.
#[derive(Debug, Default)]
pub struct JarContents {
    pub classes: BTreeMap<String, Vec<u8>>,
    pub resources: BTreeMap<String, Vec<u8>>,
}

impl JarContents {
    pub fn read_path(path: &Utf8Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::read(file)
    }

    pub fn read(reader: impl Read + Seek) -> Result<Self> {
        let mut archive = zip::ZipArchive::new(reader)?;
        let mut contents = JarContents::default();
        for index in 0..archive.len() {
            let mut entry = archive.by_index(index)?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_owned();
            if name.starts_with("META-INF/") {
                debug!(entry = %name, "dropping archive signature material");
                continue;
            }
            let mut bytes = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut bytes)?;
            match name.strip_suffix(".class") {
                Some(class) => contents.classes.insert(class.to_owned(), bytes),
                None => contents.resources.insert(name, bytes),
            };
        }
        Ok(contents)
    }
}

/// Reads an archive on a worker thread, handing the result back over a
/// channel.
pub(crate) fn spawn_reader(path: Utf8PathBuf) -> mpsc::Receiver<Result<JarContents>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let result = JarContents::read_path(&path);
        // The receiver disappearing just means the other side failed first.
        let _ = tx.send(result);
    });
    rx
}

pub(crate) fn await_reader(
    rx: &mpsc::Receiver<Result<JarContents>>,
    path: &Utf8Path,
    timeout: Duration,
) -> Result<JarContents> {
    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => Err(Error::ReaderStalled {
            path: path.to_string(),
        }),
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(Error::ReaderDied {
            path: path.to_string(),
        }),
    }
}

/// Writes merged contents back out, classes first, then resources.
pub(crate) fn write_jar(writer: impl Write + Seek, contents: &JarContents) -> Result<()> {
    let mut zip = zip::ZipWriter::new(writer);
    let options = SimpleFileOptions::default();
    for (class, bytes) in &contents.classes {
        zip.start_file(format!("{class}.class"), options)?;
        zip.write_all(bytes)?;
    }
    for (name, bytes) in &contents.resources {
        zip.start_file(name, options)?;
        zip.write_all(bytes)?;
    }
    zip.finish()?;
    Ok(())
}
