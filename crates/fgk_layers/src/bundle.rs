use std::fs::File;
use std::io::{BufReader, BufWriter};

use camino::Utf8Path;
use fgk_mappings::{parse_member_csv, parse_srg, Members, Srg};

use crate::error::Result;

const JOINED_FILE: &str = "joined.srg";
const CLIENT_FILE: &str = "client.srg";
const SERVER_FILE: &str = "server.srg";
const FIELDS_FILE: &str = "fields.csv";
const METHODS_FILE: &str = "methods.csv";

/// The immutable result of composing a layer pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingBundle {
    pub joined: Srg,
    pub client: Srg,
    pub server: Srg,
    pub fields: Members,
    pub methods: Members,
}

impl MappingBundle {
    /// Write the bundle as cache artifacts under `dir` (which must exist),
    /// using the verbose dialect and the member CSV.
    pub fn save(&self, dir: &Utf8Path) -> Result<()> {
        write_srg(&self.joined, &dir.join(JOINED_FILE))?;
        write_srg(&self.client, &dir.join(CLIENT_FILE))?;
        write_srg(&self.server, &dir.join(SERVER_FILE))?;
        write_members(&self.fields, &dir.join(FIELDS_FILE))?;
        write_members(&self.methods, &dir.join(METHODS_FILE))?;
        Ok(())
    }

    /// Load a bundle previously written by [`save`](MappingBundle::save).
    pub fn load(dir: &Utf8Path) -> Result<Self> {
        Ok(Self {
            joined: read_srg(&dir.join(JOINED_FILE))?,
            client: read_srg(&dir.join(CLIENT_FILE))?,
            server: read_srg(&dir.join(SERVER_FILE))?,
            fields: read_members(&dir.join(FIELDS_FILE))?,
            methods: read_members(&dir.join(METHODS_FILE))?,
        })
    }
}

fn write_srg(srg: &Srg, path: &Utf8Path) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path.as_std_path())?);
    srg.write_srg(&mut writer)?;
    Ok(())
}

fn read_srg(path: &Utf8Path) -> Result<Srg> {
    let reader = BufReader::new(File::open(path.as_std_path())?);
    Ok(parse_srg(reader)?)
}

fn write_members(members: &Members, path: &Utf8Path) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path.as_std_path())?);
    members.write_csv(&mut writer)?;
    Ok(())
}

fn read_members(path: &Utf8Path) -> Result<Members> {
    let reader = BufReader::new(File::open(path.as_std_path())?);
    Ok(parse_member_csv(reader)?)
}
