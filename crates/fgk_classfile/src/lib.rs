//! Structural reader/writer for compiled Java class files.
//!
//! The model is deliberately index-faithful: structures hold constant pool
//! indices exactly as parsed, and the pool only ever grows (append-only
//! interning). An edit that touches nothing but access flags therefore
//! re-serializes with every original index — attribute payloads included —
//! still valid. Carrying a field or method *across* class files is the one
//! operation that has to rewrite payloads; see [`Transplanter`].

use error::Result;

pub mod annotations;
mod code;
pub mod error;
mod flags;
pub mod inner_classes;
mod pool;
mod read;
mod transplant;
mod write;

pub use error::Error;
pub use flags::AccessFlags;
pub use pool::{ConstEntry, ConstantPool};
pub use transplant::Transplanter;

/// A parsed class file.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassFile {
    pub minor: u16,
    pub major: u16,
    pub pool: ConstantPool,
    pub access: AccessFlags,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<Member>,
    pub methods: Vec<Member>,
    pub attributes: Vec<Attribute>,
}

/// A field or method.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub access: AccessFlags,
    pub name: u16,
    pub desc: u16,
    pub attributes: Vec<Attribute>,
}

/// An attribute with its payload kept as raw bytes.
///
/// Payload indices refer to the owning class's pool; they stay valid for any
/// in-place edit because the pool is append-only.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: u16,
    pub data: Vec<u8>,
}

impl ClassFile {
    /// Internal (slash-separated) name of this class.
    pub fn name(&self) -> Result<&str> {
        self.pool.class_name(self.this_class)
    }

    /// Internal name of the superclass, or `None` for `java/lang/Object`'s
    /// zero index.
    pub fn super_name(&self) -> Result<Option<&str>> {
        if self.super_class == 0 {
            return Ok(None);
        }
        self.pool.class_name(self.super_class).map(Some)
    }

    /// Resolved names of the directly implemented interfaces, in order.
    pub fn interface_names(&self) -> Result<Vec<&str>> {
        self.interfaces
            .iter()
            .map(|&index| self.pool.class_name(index))
            .collect()
    }

    /// Find a class-level attribute by name.
    pub fn attribute(&self, name: &str) -> Option<usize> {
        self.attributes
            .iter()
            .position(|attr| self.pool.utf8(attr.name).is_ok_and(|n| n == name))
    }
}

impl Member {
    pub fn name<'a>(&self, pool: &'a ConstantPool) -> Result<&'a str> {
        pool.utf8(self.name)
    }

    pub fn desc<'a>(&self, pool: &'a ConstantPool) -> Result<&'a str> {
        pool.utf8(self.desc)
    }

    /// `name + descriptor`, the identity a member is matched by.
    pub fn key(&self, pool: &ConstantPool) -> Result<String> {
        Ok(format!("{}{}", self.name(pool)?, self.desc(pool)?))
    }
}
