use std::io::Write;

use byteorder::{WriteBytesExt, BE};

use crate::error::Result;
use crate::{Attribute, ClassFile, Member};

impl ClassFile {
    /// Serialize the class back to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write(&mut out)?;
        Ok(out)
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<BE>(0xCAFE_BABE)?;
        writer.write_u16::<BE>(self.minor)?;
        writer.write_u16::<BE>(self.major)?;
        self.pool.write(writer)?;

        writer.write_u16::<BE>(self.access.bits())?;
        writer.write_u16::<BE>(self.this_class)?;
        writer.write_u16::<BE>(self.super_class)?;

        writer.write_u16::<BE>(self.interfaces.len() as u16)?;
        for &interface in &self.interfaces {
            writer.write_u16::<BE>(interface)?;
        }

        write_members(writer, &self.fields)?;
        write_members(writer, &self.methods)?;
        write_attributes(writer, &self.attributes)?;

        Ok(())
    }
}

fn write_members<W: Write>(writer: &mut W, members: &[Member]) -> Result<()> {
    writer.write_u16::<BE>(members.len() as u16)?;
    for member in members {
        writer.write_u16::<BE>(member.access.bits())?;
        writer.write_u16::<BE>(member.name)?;
        writer.write_u16::<BE>(member.desc)?;
        write_attributes(writer, &member.attributes)?;
    }
    Ok(())
}

fn write_attributes<W: Write>(writer: &mut W, attributes: &[Attribute]) -> Result<()> {
    writer.write_u16::<BE>(attributes.len() as u16)?;
    for attribute in attributes {
        writer.write_u16::<BE>(attribute.name)?;
        writer.write_u32::<BE>(attribute.data.len() as u32)?;
        writer.write_all(&attribute.data)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::ClassFile;

    // Hand-assembled minimal class: `public class a extends java/lang/Object`
    // with one field `int b` and no methods.
    pub(crate) fn tiny_class() -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&0xCAFE_BABEu32.to_be_bytes());
        out.extend_from_slice(&[0, 0]); // minor
        out.extend_from_slice(&[0, 49]); // major (Java 5)

        // constant pool: 1 Utf8 "a", 2 Class #1, 3 Utf8 "java/lang/Object",
        // 4 Class #3, 5 Utf8 "b", 6 Utf8 "I"
        out.extend_from_slice(&[0, 7]);
        out.push(1);
        out.extend_from_slice(&[0, 1]);
        out.push(b'a');
        out.push(7);
        out.extend_from_slice(&[0, 1]);
        out.push(1);
        out.extend_from_slice(&[0, 16]);
        out.extend_from_slice(b"java/lang/Object");
        out.push(7);
        out.extend_from_slice(&[0, 3]);
        out.push(1);
        out.extend_from_slice(&[0, 1]);
        out.push(b'b');
        out.push(1);
        out.extend_from_slice(&[0, 1]);
        out.push(b'I');

        out.extend_from_slice(&[0x00, 0x21]); // ACC_PUBLIC | ACC_SUPER
        out.extend_from_slice(&[0, 2]); // this
        out.extend_from_slice(&[0, 4]); // super
        out.extend_from_slice(&[0, 0]); // interfaces
        out.extend_from_slice(&[0, 1]); // field count
        out.extend_from_slice(&[0, 2]); // ACC_PRIVATE
        out.extend_from_slice(&[0, 5]); // name "b"
        out.extend_from_slice(&[0, 6]); // desc "I"
        out.extend_from_slice(&[0, 0]); // field attributes
        out.extend_from_slice(&[0, 0]); // method count
        out.extend_from_slice(&[0, 0]); // class attributes
        out
    }

    #[test]
    fn parse_and_reserialize_is_byte_exact() {
        let bytes = tiny_class();
        let class = ClassFile::parse(&bytes).unwrap();

        assert_eq!(class.name().unwrap(), "a");
        assert_eq!(class.super_name().unwrap(), Some("java/lang/Object"));
        assert_eq!(class.fields.len(), 1);
        assert_eq!(class.fields[0].name(&class.pool).unwrap(), "b");

        assert_eq!(class.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn rejects_wrong_magic() {
        let mut bytes = tiny_class();
        bytes[0] = 0;
        assert!(ClassFile::parse(&bytes).is_err());
    }
}
