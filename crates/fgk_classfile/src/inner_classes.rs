//! Structured view of the `InnerClasses` class attribute.
//!
//! The merge engine compares and merges inner-class tables by name, so the
//! attribute is lifted out of index form here and re-encoded (interning any
//! new names) afterwards.

use std::io::Cursor;

use byteorder::{ReadBytesExt, WriteBytesExt, BE};

use crate::error::Result;
use crate::flags::AccessFlags;
use crate::pool::ConstantPool;
use crate::Attribute;

pub const ATTRIBUTE_NAME: &str = "InnerClasses";

/// One row of the inner-class table, with names resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnerClassEntry {
    /// Internal name of the inner class itself.
    pub inner: String,
    /// Internal name of the enclosing class, when the compiler recorded one.
    pub outer: Option<String>,
    /// Simple name; anonymous classes have none.
    pub simple_name: Option<String>,
    pub access: AccessFlags,
}

/// Decode an `InnerClasses` attribute against its owning pool.
pub fn parse(pool: &ConstantPool, attr: &Attribute) -> Result<Vec<InnerClassEntry>> {
    let mut reader = Cursor::new(attr.data.as_slice());
    let count = reader.read_u16::<BE>()?;
    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let inner = reader.read_u16::<BE>()?;
        let outer = reader.read_u16::<BE>()?;
        let simple_name = reader.read_u16::<BE>()?;
        let access = AccessFlags::from_bits_retain(reader.read_u16::<BE>()?);

        entries.push(InnerClassEntry {
            inner: pool.class_name(inner)?.to_owned(),
            outer: if outer == 0 {
                None
            } else {
                Some(pool.class_name(outer)?.to_owned())
            },
            simple_name: if simple_name == 0 {
                None
            } else {
                Some(pool.utf8(simple_name)?.to_owned())
            },
            access,
        });
    }
    Ok(entries)
}

/// Encode an inner-class table, interning names into `pool`.
pub fn encode(pool: &mut ConstantPool, entries: &[InnerClassEntry]) -> Result<Attribute> {
    let name = pool.intern_utf8(ATTRIBUTE_NAME)?;
    let mut data = Vec::with_capacity(2 + entries.len() * 8);
    data.write_u16::<BE>(entries.len() as u16)?;
    for entry in entries {
        let inner = pool.intern_class(&entry.inner)?;
        let outer = match &entry.outer {
            Some(outer) => pool.intern_class(outer)?,
            None => 0,
        };
        let simple_name = match &entry.simple_name {
            Some(simple) => pool.intern_utf8(simple)?,
            None => 0,
        };
        data.write_u16::<BE>(inner)?;
        data.write_u16::<BE>(outer)?;
        data.write_u16::<BE>(simple_name)?;
        data.write_u16::<BE>(entry.access.bits())?;
    }
    Ok(Attribute { name, data })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_parse_round_trip() {
        let mut pool = ConstantPool::new();
        let entries = vec![
            InnerClassEntry {
                inner: "net/minecraft/util/Foo$Bar".to_owned(),
                outer: Some("net/minecraft/util/Foo".to_owned()),
                simple_name: Some("Bar".to_owned()),
                access: AccessFlags::PUBLIC | AccessFlags::STATIC,
            },
            InnerClassEntry {
                inner: "net/minecraft/util/Foo$1".to_owned(),
                outer: None,
                simple_name: None,
                access: AccessFlags::empty(),
            },
        ];

        let attr = encode(&mut pool, &entries).unwrap();
        assert_eq!(parse(&pool, &attr).unwrap(), entries);
    }
}
