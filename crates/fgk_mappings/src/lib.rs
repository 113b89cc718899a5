//! Symbol renaming tables and the legacy text formats that feed them.
//!
//! The central type is [`Srg`], a three-table class/field/method rename map.
//! It can be read from two class-rename dialects (the verbose tagged `CL:`/
//! `FD:`/`MD:` form and the terse token-counted form) and two CSV dialects
//! (member renames with side markers, and simple-name package moves), merged,
//! inverted, repackaged, and written back out for caching.
//!
//! Parsing is deliberately forgiving: decades-old mapping files carry
//! comments, headers and the occasional mangled line, so a malformed line is
//! logged and skipped rather than failing the file.

pub mod denylist;
mod error;
mod members;
mod packages;
mod read;
mod srg;
mod write;

pub use error::{Error, Result};
pub use members::{MemberEntry, Members, Side};
pub use packages::Packages;
pub use read::{parse_csrg, parse_member_csv, parse_package_csv, parse_srg};
pub use srg::{remap_descriptor, MethodKey, Srg};
