//! Runtime-visible annotation helpers.
//!
//! The merge engine marks platform-exclusive classes and members with an
//! enum-valued marker annotation. These helpers append such an annotation to
//! an attribute list (extending an existing `RuntimeVisibleAnnotations`
//! attribute when present) and read one back.

use std::io::Cursor;

use byteorder::{ReadBytesExt, WriteBytesExt, BE};

use crate::error::{Error, Result};
use crate::pool::ConstantPool;
use crate::Attribute;

const RUNTIME_VISIBLE: &str = "RuntimeVisibleAnnotations";

/// Append `@Anno(value = Enum.CONSTANT)` to an attribute list.
///
/// `annotation_desc` and `enum_desc` are field descriptors
/// (`Lpkg/SideOnly;` style); `constant` is the enum constant's simple name.
pub fn add_enum_annotation(
    pool: &mut ConstantPool,
    attributes: &mut Vec<Attribute>,
    annotation_desc: &str,
    enum_desc: &str,
    constant: &str,
) -> Result<()> {
    let attr_name = pool.intern_utf8(RUNTIME_VISIBLE)?;
    let type_index = pool.intern_utf8(annotation_desc)?;
    let value_name = pool.intern_utf8("value")?;
    let enum_type = pool.intern_utf8(enum_desc)?;
    let const_name = pool.intern_utf8(constant)?;

    let mut encoded = Vec::with_capacity(11);
    encoded.write_u16::<BE>(type_index)?;
    encoded.write_u16::<BE>(1)?; // one element-value pair
    encoded.write_u16::<BE>(value_name)?;
    encoded.push(b'e');
    encoded.write_u16::<BE>(enum_type)?;
    encoded.write_u16::<BE>(const_name)?;

    // Interning means an existing attribute necessarily carries the same
    // name index, so an index comparison is enough.
    match attributes.iter_mut().find(|attr| attr.name == attr_name) {
        Some(attr) => {
            let count = u16::from_be_bytes([attr.data[0], attr.data[1]]);
            attr.data[..2].copy_from_slice(&(count + 1).to_be_bytes());
            attr.data.extend_from_slice(&encoded);
        }
        None => {
            let mut data = Vec::with_capacity(2 + encoded.len());
            data.write_u16::<BE>(1)?;
            data.extend_from_slice(&encoded);
            attributes.push(Attribute {
                name: attr_name,
                data,
            });
        }
    }
    Ok(())
}

/// Read back the enum constant of an `@Anno(value = ...)` annotation, if the
/// attribute list carries one with the given descriptor.
pub fn enum_annotation_value(
    pool: &ConstantPool,
    attributes: &[Attribute],
    annotation_desc: &str,
) -> Result<Option<String>> {
    let Some(attr) = attributes
        .iter()
        .find(|attr| pool.utf8(attr.name).is_ok_and(|n| n == RUNTIME_VISIBLE))
    else {
        return Ok(None);
    };

    let mut reader = Cursor::new(attr.data.as_slice());
    let count = reader.read_u16::<BE>()?;
    for _ in 0..count {
        let type_index = reader.read_u16::<BE>()?;
        let pairs = reader.read_u16::<BE>()?;
        let matches = pool.utf8(type_index)? == annotation_desc;
        for _ in 0..pairs {
            let _name = reader.read_u16::<BE>()?;
            let tag = reader.read_u8()?;
            if matches && tag == b'e' {
                let _enum_type = reader.read_u16::<BE>()?;
                let const_name = reader.read_u16::<BE>()?;
                return Ok(Some(pool.utf8(const_name)?.to_owned()));
            }
            skip_element_value(&mut reader, tag)?;
        }
    }
    Ok(None)
}

fn skip_element_value(reader: &mut Cursor<&[u8]>, tag: u8) -> Result<()> {
    match tag {
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's' | b'c' => {
            reader.read_u16::<BE>()?;
        }
        b'e' => {
            reader.read_u16::<BE>()?;
            reader.read_u16::<BE>()?;
        }
        b'@' => {
            reader.read_u16::<BE>()?;
            let pairs = reader.read_u16::<BE>()?;
            for _ in 0..pairs {
                reader.read_u16::<BE>()?;
                let inner = reader.read_u8()?;
                skip_element_value(reader, inner)?;
            }
        }
        b'[' => {
            let count = reader.read_u16::<BE>()?;
            for _ in 0..count {
                let inner = reader.read_u8()?;
                skip_element_value(reader, inner)?;
            }
        }
        _ => {
            return Err(Error::MalformedAttribute {
                name: "RuntimeVisibleAnnotations",
                detail: format!("unknown element value tag {tag:#04x}"),
            })
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adds_and_reads_back_a_marker() {
        let mut pool = ConstantPool::new();
        let mut attributes = Vec::new();

        add_enum_annotation(
            &mut pool,
            &mut attributes,
            "Lforgekit/runtime/SideOnly;",
            "Lforgekit/runtime/Side;",
            "SERVER",
        )
        .unwrap();

        let value =
            enum_annotation_value(&pool, &attributes, "Lforgekit/runtime/SideOnly;").unwrap();
        assert_eq!(value.as_deref(), Some("SERVER"));
    }

    #[test]
    fn appends_to_an_existing_attribute() {
        let mut pool = ConstantPool::new();
        let mut attributes = Vec::new();

        add_enum_annotation(&mut pool, &mut attributes, "La;", "Lb;", "X").unwrap();
        add_enum_annotation(
            &mut pool,
            &mut attributes,
            "Lforgekit/runtime/SideOnly;",
            "Lforgekit/runtime/Side;",
            "CLIENT",
        )
        .unwrap();

        assert_eq!(attributes.len(), 1);
        assert_eq!(u16::from_be_bytes([attributes[0].data[0], attributes[0].data[1]]), 2);
        let value =
            enum_annotation_value(&pool, &attributes, "Lforgekit/runtime/SideOnly;").unwrap();
        assert_eq!(value.as_deref(), Some("CLIENT"));
    }
}
