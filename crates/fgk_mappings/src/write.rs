//! Writers for the two class-rename dialects and the member CSV.
//!
//! Re-serialization exists for caching: a composed table written to the
//! verbose dialect and parsed again is equal to the original.

use std::io::Write;

use crate::error::Result;
use crate::members::Members;
use crate::srg::Srg;

impl Srg {
    /// Write the verbose tagged dialect.
    pub fn write_srg<W: Write>(&self, writer: &mut W) -> Result<()> {
        for (old, new) in &self.packages {
            writeln!(writer, "PK: {old} {new}")?;
        }
        for (old, new) in &self.classes {
            writeln!(writer, "CL: {old} {new}")?;
        }
        for (owner, table) in &self.fields {
            let new_owner = self.map_class(owner);
            for (old, new) in table {
                writeln!(writer, "FD: {owner}/{old} {new_owner}/{new}")?;
            }
        }
        for (owner, table) in &self.methods {
            let new_owner = self.map_class(owner);
            for (old, new) in table {
                writeln!(
                    writer,
                    "MD: {owner}/{} {} {new_owner}/{} {}",
                    old.name, old.desc, new.name, new.desc
                )?;
            }
        }
        Ok(())
    }

    /// Write the terse dialect. The remapped method descriptor is derived on
    /// re-parse, so only the original descriptor is emitted.
    pub fn write_csrg<W: Write>(&self, writer: &mut W) -> Result<()> {
        for (old, new) in &self.packages {
            let old = if old == "." { "" } else { old };
            writeln!(writer, "{old}/ {new}/")?;
        }
        for (old, new) in &self.classes {
            writeln!(writer, "{old} {new}")?;
        }
        for (owner, table) in &self.fields {
            for (old, new) in table {
                writeln!(writer, "{owner} {old} {new}")?;
            }
        }
        for (owner, table) in &self.methods {
            for (old, new) in table {
                writeln!(writer, "{owner} {} {} {}", old.name, old.desc, new.name)?;
            }
        }
        Ok(())
    }
}

impl Members {
    /// Write the member CSV dialect, quoting comments that need it.
    pub fn write_csv<W: Write>(&self, writer: &mut W) -> Result<()> {
        writeln!(writer, "searge,name,side,desc")?;
        for (symbolic, entry) in self.iter() {
            let comment = entry.comment.as_deref().unwrap_or("");
            writeln!(
                writer,
                "{symbolic},{},{},{}",
                entry.name,
                entry.side as u8,
                quote_csv(comment)
            )?;
        }
        Ok(())
    }
}

fn quote_csv(value: &str) -> String {
    if value.contains(',') || value.contains('"') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_owned()
    }
}
