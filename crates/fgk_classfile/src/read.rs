use std::io::{Cursor, Read};

use byteorder::{ReadBytesExt, BE};

use crate::error::{Error, Result};
use crate::flags::AccessFlags;
use crate::pool::ConstantPool;
use crate::{Attribute, ClassFile, Member};

const MAGIC: u32 = 0xCAFE_BABE;

impl ClassFile {
    /// Parse a class file from a byte buffer.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = Cursor::new(bytes);

        let magic = reader.read_u32::<BE>()?;
        if magic != MAGIC {
            return Err(Error::InvalidMagic(magic));
        }

        let minor = reader.read_u16::<BE>()?;
        let major = reader.read_u16::<BE>()?;
        let pool = ConstantPool::read(&mut reader)?;

        let access = AccessFlags::from_bits_retain(reader.read_u16::<BE>()?);
        let this_class = reader.read_u16::<BE>()?;
        let super_class = reader.read_u16::<BE>()?;

        let interface_count = reader.read_u16::<BE>()?;
        let mut interfaces = Vec::with_capacity(interface_count as usize);
        for _ in 0..interface_count {
            interfaces.push(reader.read_u16::<BE>()?);
        }

        let fields = read_members(&mut reader)?;
        let methods = read_members(&mut reader)?;
        let attributes = read_attributes(&mut reader)?;

        Ok(Self {
            minor,
            major,
            pool,
            access,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }
}

fn read_members<R: Read>(reader: &mut R) -> Result<Vec<Member>> {
    let count = reader.read_u16::<BE>()?;
    let mut members = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let access = AccessFlags::from_bits_retain(reader.read_u16::<BE>()?);
        let name = reader.read_u16::<BE>()?;
        let desc = reader.read_u16::<BE>()?;
        let attributes = read_attributes(reader)?;
        members.push(Member {
            access,
            name,
            desc,
            attributes,
        });
    }
    Ok(members)
}

fn read_attributes<R: Read>(reader: &mut R) -> Result<Vec<Attribute>> {
    let count = reader.read_u16::<BE>()?;
    let mut attributes = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name = reader.read_u16::<BE>()?;
        let len = reader.read_u32::<BE>()?;
        let mut data = vec![0u8; len as usize];
        reader.read_exact(&mut data)?;
        attributes.push(Attribute { name, data });
    }
    Ok(attributes)
}
