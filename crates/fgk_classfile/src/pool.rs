//! Constant pool model.
//!
//! The pool is kept index-faithful to the parsed class: entry 1 of the file is
//! entry 1 of the model, and long/double entries occupy two slots exactly as
//! the format demands. New entries are only ever appended (interning), so any
//! index held by an unmodified structure stays valid across a rewrite.

use std::io::{Read, Write};

use byteorder::{ReadBytesExt, WriteBytesExt, BE};

use crate::error::{Error, Result};

/// One constant pool entry. Numeric entries keep the raw bit patterns read
/// from the file so re-serialization is byte-exact (NaN payloads included).
#[derive(Debug, Clone, PartialEq)]
pub enum ConstEntry {
    Utf8(Box<[u8]>),
    Integer(i32),
    Float(u32),
    Long(i64),
    Double(u64),
    Class { name: u16 },
    Str { utf8: u16 },
    FieldRef { class: u16, name_and_type: u16 },
    MethodRef { class: u16, name_and_type: u16 },
    InterfaceMethodRef { class: u16, name_and_type: u16 },
    NameAndType { name: u16, desc: u16 },
    MethodHandle { kind: u8, reference: u16 },
    MethodType { desc: u16 },
    InvokeDynamic { bootstrap: u16, name_and_type: u16 },
}

impl ConstEntry {
    /// Number of pool slots the entry occupies.
    fn width(&self) -> usize {
        match self {
            ConstEntry::Long(_) | ConstEntry::Double(_) => 2,
            _ => 1,
        }
    }
}

/// The constant pool of one class file.
///
/// Slot 0 and the trailing slot of every long/double entry hold `None`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConstantPool {
    entries: Vec<Option<ConstEntry>>,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self {
            entries: vec![None],
        }
    }

    /// Number of slots, including slot 0 (the value written to the file).
    pub fn slot_count(&self) -> usize {
        self.entries.len()
    }

    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let count = reader.read_u16::<BE>()?;
        let mut entries: Vec<Option<ConstEntry>> = Vec::with_capacity(count as usize);
        entries.push(None);

        let mut index = 1u16;
        while index < count {
            let tag = reader.read_u8()?;
            let entry = match tag {
                1 => {
                    let len = reader.read_u16::<BE>()?;
                    let mut bytes = vec![0u8; len as usize];
                    reader.read_exact(&mut bytes)?;
                    ConstEntry::Utf8(bytes.into_boxed_slice())
                }
                3 => ConstEntry::Integer(reader.read_i32::<BE>()?),
                4 => ConstEntry::Float(reader.read_u32::<BE>()?),
                5 => ConstEntry::Long(reader.read_i64::<BE>()?),
                6 => ConstEntry::Double(reader.read_u64::<BE>()?),
                7 => ConstEntry::Class {
                    name: reader.read_u16::<BE>()?,
                },
                8 => ConstEntry::Str {
                    utf8: reader.read_u16::<BE>()?,
                },
                9 => ConstEntry::FieldRef {
                    class: reader.read_u16::<BE>()?,
                    name_and_type: reader.read_u16::<BE>()?,
                },
                10 => ConstEntry::MethodRef {
                    class: reader.read_u16::<BE>()?,
                    name_and_type: reader.read_u16::<BE>()?,
                },
                11 => ConstEntry::InterfaceMethodRef {
                    class: reader.read_u16::<BE>()?,
                    name_and_type: reader.read_u16::<BE>()?,
                },
                12 => ConstEntry::NameAndType {
                    name: reader.read_u16::<BE>()?,
                    desc: reader.read_u16::<BE>()?,
                },
                15 => ConstEntry::MethodHandle {
                    kind: reader.read_u8()?,
                    reference: reader.read_u16::<BE>()?,
                },
                16 => ConstEntry::MethodType {
                    desc: reader.read_u16::<BE>()?,
                },
                18 => ConstEntry::InvokeDynamic {
                    bootstrap: reader.read_u16::<BE>()?,
                    name_and_type: reader.read_u16::<BE>()?,
                },
                tag => return Err(Error::BadPoolTag { tag, index }),
            };

            let width = entry.width();
            entries.push(Some(entry));
            if width == 2 {
                entries.push(None);
            }
            index += width as u16;
        }

        Ok(Self { entries })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u16::<BE>(self.entries.len() as u16)?;
        for entry in self.entries.iter().flatten() {
            match entry {
                ConstEntry::Utf8(bytes) => {
                    writer.write_u8(1)?;
                    writer.write_u16::<BE>(bytes.len() as u16)?;
                    writer.write_all(bytes)?;
                }
                ConstEntry::Integer(v) => {
                    writer.write_u8(3)?;
                    writer.write_i32::<BE>(*v)?;
                }
                ConstEntry::Float(bits) => {
                    writer.write_u8(4)?;
                    writer.write_u32::<BE>(*bits)?;
                }
                ConstEntry::Long(v) => {
                    writer.write_u8(5)?;
                    writer.write_i64::<BE>(*v)?;
                }
                ConstEntry::Double(bits) => {
                    writer.write_u8(6)?;
                    writer.write_u64::<BE>(*bits)?;
                }
                ConstEntry::Class { name } => {
                    writer.write_u8(7)?;
                    writer.write_u16::<BE>(*name)?;
                }
                ConstEntry::Str { utf8 } => {
                    writer.write_u8(8)?;
                    writer.write_u16::<BE>(*utf8)?;
                }
                ConstEntry::FieldRef {
                    class,
                    name_and_type,
                } => {
                    writer.write_u8(9)?;
                    writer.write_u16::<BE>(*class)?;
                    writer.write_u16::<BE>(*name_and_type)?;
                }
                ConstEntry::MethodRef {
                    class,
                    name_and_type,
                } => {
                    writer.write_u8(10)?;
                    writer.write_u16::<BE>(*class)?;
                    writer.write_u16::<BE>(*name_and_type)?;
                }
                ConstEntry::InterfaceMethodRef {
                    class,
                    name_and_type,
                } => {
                    writer.write_u8(11)?;
                    writer.write_u16::<BE>(*class)?;
                    writer.write_u16::<BE>(*name_and_type)?;
                }
                ConstEntry::NameAndType { name, desc } => {
                    writer.write_u8(12)?;
                    writer.write_u16::<BE>(*name)?;
                    writer.write_u16::<BE>(*desc)?;
                }
                ConstEntry::MethodHandle { kind, reference } => {
                    writer.write_u8(15)?;
                    writer.write_u8(*kind)?;
                    writer.write_u16::<BE>(*reference)?;
                }
                ConstEntry::MethodType { desc } => {
                    writer.write_u8(16)?;
                    writer.write_u16::<BE>(*desc)?;
                }
                ConstEntry::InvokeDynamic {
                    bootstrap,
                    name_and_type,
                } => {
                    writer.write_u8(18)?;
                    writer.write_u16::<BE>(*bootstrap)?;
                    writer.write_u16::<BE>(*name_and_type)?;
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, index: u16) -> Result<&ConstEntry> {
        self.entries
            .get(index as usize)
            .and_then(|slot| slot.as_ref())
            .ok_or(Error::BadPoolIndex(index))
    }

    /// Resolve a `Utf8` entry as a string slice.
    pub fn utf8(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            ConstEntry::Utf8(bytes) => {
                std::str::from_utf8(bytes).map_err(|_| Error::MalformedUtf8(index))
            }
            _ => Err(Error::WrongPoolEntry {
                index,
                expected: "Utf8",
            }),
        }
    }

    /// Resolve a `Class` entry to its internal (slash-separated) name.
    pub fn class_name(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            ConstEntry::Class { name } => self.utf8(*name),
            _ => Err(Error::WrongPoolEntry {
                index,
                expected: "Class",
            }),
        }
    }

    fn push(&mut self, entry: ConstEntry) -> Result<u16> {
        let index = self.entries.len();
        if index + entry.width() > u16::MAX as usize {
            return Err(Error::PoolOverflow);
        }
        let width = entry.width();
        self.entries.push(Some(entry));
        if width == 2 {
            self.entries.push(None);
        }
        Ok(index as u16)
    }

    fn find(&self, wanted: &ConstEntry) -> Option<u16> {
        self.entries
            .iter()
            .position(|slot| slot.as_ref() == Some(wanted))
            .map(|index| index as u16)
    }

    /// Return the index of an existing equal entry, or append a new one.
    pub fn intern(&mut self, entry: ConstEntry) -> Result<u16> {
        match self.find(&entry) {
            Some(index) => Ok(index),
            None => self.push(entry),
        }
    }

    pub fn intern_utf8(&mut self, value: &str) -> Result<u16> {
        self.intern(ConstEntry::Utf8(value.as_bytes().into()))
    }

    pub fn intern_class(&mut self, name: &str) -> Result<u16> {
        let utf8 = self.intern_utf8(name)?;
        self.intern(ConstEntry::Class { name: utf8 })
    }

    pub fn intern_name_and_type(&mut self, name: &str, desc: &str) -> Result<u16> {
        let name = self.intern_utf8(name)?;
        let desc = self.intern_utf8(desc)?;
        self.intern(ConstEntry::NameAndType { name, desc })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn intern_is_idempotent() {
        let mut pool = ConstantPool::new();
        let a = pool.intern_utf8("net/minecraft/util/Foo").unwrap();
        let b = pool.intern_utf8("net/minecraft/util/Foo").unwrap();
        assert_eq!(a, b);

        let class = pool.intern_class("net/minecraft/util/Foo").unwrap();
        assert_eq!(class, pool.intern_class("net/minecraft/util/Foo").unwrap());
        assert_eq!(pool.class_name(class).unwrap(), "net/minecraft/util/Foo");
    }

    #[test]
    fn long_entries_take_two_slots() {
        let mut pool = ConstantPool::new();
        let long = pool.intern(ConstEntry::Long(42)).unwrap();
        let after = pool.intern_utf8("x").unwrap();
        assert_eq!(after, long + 2);

        // The dead slot is unaddressable.
        assert!(pool.get(long + 1).is_err());
    }

    #[test]
    fn round_trips_through_bytes() {
        let mut pool = ConstantPool::new();
        pool.intern_class("a").unwrap();
        pool.intern(ConstEntry::Double(std::f64::consts::PI.to_bits()))
            .unwrap();
        pool.intern_name_and_type("run", "()V").unwrap();

        let mut bytes = Vec::new();
        pool.write(&mut bytes).unwrap();
        let reread = ConstantPool::read(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(pool, reread);
    }
}
