//! Carrying structures from one class file into another.
//!
//! A member copied between classes keeps its attribute payloads, but every
//! constant pool index inside them refers to the donor's pool. The
//! [`Transplanter`] imports referenced entries into the destination pool
//! (interning, so shared constants collapse) and rewrites each payload it
//! understands. An attribute whose layout is unknown cannot be carried
//! safely and is a hard error.

use std::collections::HashMap;
use std::io::{Cursor, Read};

use byteorder::{ReadBytesExt, WriteBytesExt, BE};

use crate::code::RewrittenCode;
use crate::error::{Error, Result};
use crate::pool::{ConstEntry, ConstantPool};
use crate::{Attribute, Member};

/// Imports constant pool entries and members from a donor class into a
/// destination class.
pub struct Transplanter<'a> {
    src: &'a ConstantPool,
    dst: &'a mut ConstantPool,
    map: HashMap<u16, u16>,
}

impl<'a> Transplanter<'a> {
    pub fn new(src: &'a ConstantPool, dst: &'a mut ConstantPool) -> Self {
        Self {
            src,
            dst,
            map: HashMap::new(),
        }
    }

    /// Import the donor pool entry at `index` and return its index in the
    /// destination pool. Index 0 (the "absent" sentinel used by catch types,
    /// outer classes and the like) maps to itself.
    pub fn map_index(&mut self, index: u16) -> Result<u16> {
        if index == 0 {
            return Ok(0);
        }
        if let Some(&mapped) = self.map.get(&index) {
            return Ok(mapped);
        }

        let entry = self.src.get(index)?.clone();
        let imported = match entry {
            ConstEntry::Utf8(_)
            | ConstEntry::Integer(_)
            | ConstEntry::Float(_)
            | ConstEntry::Long(_)
            | ConstEntry::Double(_) => self.dst.intern(entry)?,
            ConstEntry::Class { name } => {
                let name = self.map_index(name)?;
                self.dst.intern(ConstEntry::Class { name })?
            }
            ConstEntry::Str { utf8 } => {
                let utf8 = self.map_index(utf8)?;
                self.dst.intern(ConstEntry::Str { utf8 })?
            }
            ConstEntry::FieldRef {
                class,
                name_and_type,
            } => {
                let class = self.map_index(class)?;
                let name_and_type = self.map_index(name_and_type)?;
                self.dst.intern(ConstEntry::FieldRef {
                    class,
                    name_and_type,
                })?
            }
            ConstEntry::MethodRef {
                class,
                name_and_type,
            } => {
                let class = self.map_index(class)?;
                let name_and_type = self.map_index(name_and_type)?;
                self.dst.intern(ConstEntry::MethodRef {
                    class,
                    name_and_type,
                })?
            }
            ConstEntry::InterfaceMethodRef {
                class,
                name_and_type,
            } => {
                let class = self.map_index(class)?;
                let name_and_type = self.map_index(name_and_type)?;
                self.dst.intern(ConstEntry::InterfaceMethodRef {
                    class,
                    name_and_type,
                })?
            }
            ConstEntry::NameAndType { name, desc } => {
                let name = self.map_index(name)?;
                let desc = self.map_index(desc)?;
                self.dst.intern(ConstEntry::NameAndType { name, desc })?
            }
            ConstEntry::MethodHandle { kind, reference } => {
                let reference = self.map_index(reference)?;
                self.dst.intern(ConstEntry::MethodHandle { kind, reference })?
            }
            ConstEntry::MethodType { desc } => {
                let desc = self.map_index(desc)?;
                self.dst.intern(ConstEntry::MethodType { desc })?
            }
            // The bootstrap index points into the donor's BootstrapMethods
            // attribute, which is not carried over.
            ConstEntry::InvokeDynamic { .. } => return Err(Error::UnsupportedConstant(index)),
        };

        self.map.insert(index, imported);
        Ok(imported)
    }

    /// Copy a field or method into the destination class.
    pub fn transplant_member(&mut self, member: &Member) -> Result<Member> {
        let owner = member.key(self.src)?;
        let name = self.map_index(member.name)?;
        let desc = self.map_index(member.desc)?;
        let attributes = member
            .attributes
            .iter()
            .map(|attr| self.transplant_attribute(attr, &owner))
            .collect::<Result<Vec<_>>>()?;
        Ok(Member {
            access: member.access,
            name,
            desc,
            attributes,
        })
    }

    /// Rewrite one attribute's payload for the destination pool.
    pub fn transplant_attribute(&mut self, attr: &Attribute, owner: &str) -> Result<Attribute> {
        let name = self.src.utf8(attr.name)?.to_owned();
        let new_name = self.dst.intern_utf8(&name)?;

        let data = match name.as_str() {
            "Code" => self.rewrite_code_attribute(&attr.data, owner)?,
            "Exceptions" => self.rewrite_class_list(&attr.data)?,
            "ConstantValue" | "Signature" | "SourceFile" => {
                self.rewrite_single_index(&attr.data)?
            }
            "Deprecated" | "Synthetic" => attr.data.clone(),
            "EnclosingMethod" => {
                let mut reader = Cursor::new(attr.data.as_slice());
                let class = self.map_index(reader.read_u16::<BE>()?)?;
                let method = self.map_index(reader.read_u16::<BE>()?)?;
                let mut out = Vec::with_capacity(4);
                out.write_u16::<BE>(class)?;
                out.write_u16::<BE>(method)?;
                out
            }
            "RuntimeVisibleAnnotations" | "RuntimeInvisibleAnnotations" => {
                self.rewrite_annotations(&attr.data)?
            }
            "RuntimeVisibleParameterAnnotations" | "RuntimeInvisibleParameterAnnotations" => {
                self.rewrite_parameter_annotations(&attr.data)?
            }
            "AnnotationDefault" => {
                let mut reader = Cursor::new(attr.data.as_slice());
                let mut out = Vec::new();
                self.rewrite_element_value(&mut reader, &mut out)?;
                out
            }
            _ => {
                return Err(Error::UnknownAttribute {
                    name,
                    owner: owner.to_owned(),
                })
            }
        };

        Ok(Attribute {
            name: new_name,
            data,
        })
    }

    fn rewrite_code_attribute(&mut self, data: &[u8], owner: &str) -> Result<Vec<u8>> {
        let mut reader = Cursor::new(data);
        let max_stack = reader.read_u16::<BE>()?;
        let max_locals = reader.read_u16::<BE>()?;
        let code_len = reader.read_u32::<BE>()?;
        let mut code = vec![0u8; code_len as usize];
        reader.read_exact(&mut code)?;

        let rewritten = self.rewrite_code(&code)?;

        let mut out = Vec::with_capacity(data.len());
        out.write_u16::<BE>(max_stack)?;
        out.write_u16::<BE>(max_locals)?;
        out.write_u32::<BE>(rewritten.bytes.len() as u32)?;
        out.extend_from_slice(&rewritten.bytes);

        let handler_count = reader.read_u16::<BE>()?;
        out.write_u16::<BE>(handler_count)?;
        for _ in 0..handler_count {
            let start = reader.read_u16::<BE>()? as u32;
            let end = reader.read_u16::<BE>()? as u32;
            let handler = reader.read_u16::<BE>()? as u32;
            let catch_type = reader.read_u16::<BE>()?;
            out.write_u16::<BE>(rewritten.translate(start)? as u16)?;
            out.write_u16::<BE>(rewritten.translate(end)? as u16)?;
            out.write_u16::<BE>(rewritten.translate(handler)? as u16)?;
            out.write_u16::<BE>(self.map_index(catch_type)?)?;
        }

        let attr_count = reader.read_u16::<BE>()?;
        out.write_u16::<BE>(attr_count)?;
        for _ in 0..attr_count {
            let name_index = reader.read_u16::<BE>()?;
            let len = reader.read_u32::<BE>()?;
            let mut body = vec![0u8; len as usize];
            reader.read_exact(&mut body)?;

            let name = self.src.utf8(name_index)?.to_owned();
            let new_name = self.dst.intern_utf8(&name)?;
            let body = match name.as_str() {
                "LineNumberTable" => rewrite_line_numbers(&body, &rewritten)?,
                "LocalVariableTable" | "LocalVariableTypeTable" => {
                    self.rewrite_local_variables(&body, &rewritten)?
                }
                "StackMapTable" => self.rewrite_stack_map(&body, &rewritten)?,
                _ => {
                    return Err(Error::UnknownAttribute {
                        name,
                        owner: owner.to_owned(),
                    })
                }
            };
            out.write_u16::<BE>(new_name)?;
            out.write_u32::<BE>(body.len() as u32)?;
            out.extend_from_slice(&body);
        }

        Ok(out)
    }

    fn rewrite_class_list(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        let mut reader = Cursor::new(data);
        let count = reader.read_u16::<BE>()?;
        let mut out = Vec::with_capacity(data.len());
        out.write_u16::<BE>(count)?;
        for _ in 0..count {
            let mapped = self.map_index(reader.read_u16::<BE>()?)?;
            out.write_u16::<BE>(mapped)?;
        }
        Ok(out)
    }

    fn rewrite_single_index(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        let mut reader = Cursor::new(data);
        let mapped = self.map_index(reader.read_u16::<BE>()?)?;
        let mut out = Vec::with_capacity(2);
        out.write_u16::<BE>(mapped)?;
        Ok(out)
    }

    fn rewrite_local_variables(&mut self, data: &[u8], code: &RewrittenCode) -> Result<Vec<u8>> {
        let mut reader = Cursor::new(data);
        let count = reader.read_u16::<BE>()?;
        let mut out = Vec::with_capacity(data.len());
        out.write_u16::<BE>(count)?;
        for _ in 0..count {
            let start = reader.read_u16::<BE>()? as u32;
            let length = reader.read_u16::<BE>()? as u32;
            let name = self.map_index(reader.read_u16::<BE>()?)?;
            let desc = self.map_index(reader.read_u16::<BE>()?)?;
            let slot = reader.read_u16::<BE>()?;

            let (new_start, new_length) = code.translate_range(start, length)?;
            out.write_u16::<BE>(new_start as u16)?;
            out.write_u16::<BE>(new_length as u16)?;
            out.write_u16::<BE>(name)?;
            out.write_u16::<BE>(desc)?;
            out.write_u16::<BE>(slot)?;
        }
        Ok(out)
    }

    fn rewrite_annotations(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        let mut reader = Cursor::new(data);
        let mut out = Vec::with_capacity(data.len());
        let count = reader.read_u16::<BE>()?;
        out.write_u16::<BE>(count)?;
        for _ in 0..count {
            self.rewrite_annotation(&mut reader, &mut out)?;
        }
        Ok(out)
    }

    fn rewrite_parameter_annotations(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        let mut reader = Cursor::new(data);
        let mut out = Vec::with_capacity(data.len());
        let params = reader.read_u8()?;
        out.push(params);
        for _ in 0..params {
            let count = reader.read_u16::<BE>()?;
            out.write_u16::<BE>(count)?;
            for _ in 0..count {
                self.rewrite_annotation(&mut reader, &mut out)?;
            }
        }
        Ok(out)
    }

    fn rewrite_annotation(
        &mut self,
        reader: &mut Cursor<&[u8]>,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        let type_index = self.map_index(reader.read_u16::<BE>()?)?;
        out.write_u16::<BE>(type_index)?;
        let pairs = reader.read_u16::<BE>()?;
        out.write_u16::<BE>(pairs)?;
        for _ in 0..pairs {
            let name = self.map_index(reader.read_u16::<BE>()?)?;
            out.write_u16::<BE>(name)?;
            self.rewrite_element_value(reader, out)?;
        }
        Ok(())
    }

    fn rewrite_element_value(
        &mut self,
        reader: &mut Cursor<&[u8]>,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        let tag = reader.read_u8()?;
        out.push(tag);
        match tag {
            b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's' | b'c' => {
                let mapped = self.map_index(reader.read_u16::<BE>()?)?;
                out.write_u16::<BE>(mapped)?;
            }
            b'e' => {
                let type_name = self.map_index(reader.read_u16::<BE>()?)?;
                let const_name = self.map_index(reader.read_u16::<BE>()?)?;
                out.write_u16::<BE>(type_name)?;
                out.write_u16::<BE>(const_name)?;
            }
            b'@' => self.rewrite_annotation(reader, out)?,
            b'[' => {
                let count = reader.read_u16::<BE>()?;
                out.write_u16::<BE>(count)?;
                for _ in 0..count {
                    self.rewrite_element_value(reader, out)?;
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

    fn rewrite_stack_map(&mut self, data: &[u8], code: &RewrittenCode) -> Result<Vec<u8>> {
        let mut reader = Cursor::new(data);
        let count = reader.read_u16::<BE>()?;

        // Decode to absolute offsets first; deltas are only meaningful in
        // sequence and have to be recomputed against the new layout.
        let mut frames = Vec::with_capacity(count as usize);
        let mut prev_pc: Option<u32> = None;
        for _ in 0..count {
            let frame_type = reader.read_u8()?;
            let (delta, body) = match frame_type {
                0..=63 => (frame_type as u32, Frame::Same),
                64..=127 => (
                    (frame_type - 64) as u32,
                    Frame::SameLocals1(self.read_vtype(&mut reader, code)?),
                ),
                247 => {
                    let delta = reader.read_u16::<BE>()? as u32;
                    (delta, Frame::SameLocals1(self.read_vtype(&mut reader, code)?))
                }
                248..=250 => (reader.read_u16::<BE>()? as u32, Frame::Chop(251 - frame_type)),
                251 => (reader.read_u16::<BE>()? as u32, Frame::Same),
                252..=254 => {
                    let delta = reader.read_u16::<BE>()? as u32;
                    let mut locals = Vec::with_capacity((frame_type - 251) as usize);
                    for _ in 0..(frame_type - 251) {
                        locals.push(self.read_vtype(&mut reader, code)?);
                    }
                    (delta, Frame::Append(locals))
                }
                255 => {
                    let delta = reader.read_u16::<BE>()? as u32;
                    let local_count = reader.read_u16::<BE>()?;
                    let mut locals = Vec::with_capacity(local_count as usize);
                    for _ in 0..local_count {
                        locals.push(self.read_vtype(&mut reader, code)?);
                    }
                    let stack_count = reader.read_u16::<BE>()?;
                    let mut stack = Vec::with_capacity(stack_count as usize);
                    for _ in 0..stack_count {
                        stack.push(self.read_vtype(&mut reader, code)?);
                    }
                    (delta, Frame::Full { locals, stack })
                }
                128..=246 => {
                    return Err(Error::MalformedAttribute {
                        name: "StackMapTable",
                        detail: format!("reserved frame type {frame_type}"),
                    })
                }
            };
            let old_pc = match prev_pc {
                None => delta,
                Some(prev) => prev + delta + 1,
            };
            prev_pc = Some(old_pc);
            frames.push((code.translate(old_pc)?, body));
        }

        let mut out = Vec::with_capacity(data.len());
        out.write_u16::<BE>(count)?;
        let mut prev_pc: Option<u32> = None;
        for (new_pc, body) in frames {
            let delta = match prev_pc {
                None => new_pc,
                Some(prev) => new_pc - prev - 1,
            };
            prev_pc = Some(new_pc);
            encode_frame(&mut out, delta, &body)?;
        }
        Ok(out)
    }

    fn read_vtype(&mut self, reader: &mut Cursor<&[u8]>, code: &RewrittenCode) -> Result<VType> {
        let tag = reader.read_u8()?;
        Ok(match tag {
            0..=6 => VType::Primitive(tag),
            7 => VType::Object(self.map_index(reader.read_u16::<BE>()?)?),
            8 => VType::Uninitialized(code.translate(reader.read_u16::<BE>()? as u32)?),
            _ => {
                return Err(Error::MalformedAttribute {
                    name: "StackMapTable",
                    detail: format!("unknown verification type tag {tag}"),
                })
            }
        })
    }
}

#[derive(Debug)]
enum Frame {
    Same,
    SameLocals1(VType),
    Chop(u8),
    Append(Vec<VType>),
    Full { locals: Vec<VType>, stack: Vec<VType> },
}

#[derive(Debug)]
enum VType {
    Primitive(u8),
    /// Object type, constant pool index already remapped.
    Object(u16),
    /// Uninitialized-this offset, already translated to the new layout.
    Uninitialized(u32),
}

fn encode_frame(out: &mut Vec<u8>, delta: u32, body: &Frame) -> Result<()> {
    match body {
        Frame::Same => {
            if delta <= 63 {
                out.push(delta as u8);
            } else {
                out.push(251);
                out.write_u16::<BE>(delta as u16)?;
            }
        }
        Frame::SameLocals1(vtype) => {
            if delta <= 63 {
                out.push(64 + delta as u8);
            } else {
                out.push(247);
                out.write_u16::<BE>(delta as u16)?;
            }
            encode_vtype(out, vtype)?;
        }
        Frame::Chop(k) => {
            out.push(251 - k);
            out.write_u16::<BE>(delta as u16)?;
        }
        Frame::Append(locals) => {
            out.push(251 + locals.len() as u8);
            out.write_u16::<BE>(delta as u16)?;
            for vtype in locals {
                encode_vtype(out, vtype)?;
            }
        }
        Frame::Full { locals, stack } => {
            out.push(255);
            out.write_u16::<BE>(delta as u16)?;
            out.write_u16::<BE>(locals.len() as u16)?;
            for vtype in locals {
                encode_vtype(out, vtype)?;
            }
            out.write_u16::<BE>(stack.len() as u16)?;
            for vtype in stack {
                encode_vtype(out, vtype)?;
            }
        }
    }
    Ok(())
}

fn encode_vtype(out: &mut Vec<u8>, vtype: &VType) -> Result<()> {
    match vtype {
        VType::Primitive(tag) => out.push(*tag),
        VType::Object(index) => {
            out.push(7);
            out.write_u16::<BE>(*index)?;
        }
        VType::Uninitialized(pc) => {
            out.push(8);
            out.write_u16::<BE>(*pc as u16)?;
        }
    }
    Ok(())
}

fn rewrite_line_numbers(data: &[u8], code: &RewrittenCode) -> Result<Vec<u8>> {
    let mut reader = Cursor::new(data);
    let count = reader.read_u16::<BE>()?;
    let mut out = Vec::with_capacity(data.len());
    out.write_u16::<BE>(count)?;
    for _ in 0..count {
        let start = reader.read_u16::<BE>()? as u32;
        let line = reader.read_u16::<BE>()?;
        out.write_u16::<BE>(code.translate(start)? as u16)?;
        out.write_u16::<BE>(line)?;
    }
    Ok(out)
}
