//! Bytecode rewriting for cross-pool transplants.
//!
//! Rewriting constant pool operands can change instruction widths: an `ldc`
//! whose remapped constant no longer fits a single byte must become `ldc_w`.
//! The whole method body is therefore decoded into an instruction list,
//! operands remapped, offsets recomputed in one forward pass, and branches,
//! switch tables and the caller-visible pc translation re-derived from the
//! new layout.

use std::collections::HashMap;
use std::io::{Cursor, Read};

use byteorder::{ReadBytesExt, WriteBytesExt, BE};

use crate::error::{Error, Result};
use crate::transplant::Transplanter;

const OP_LDC: u8 = 18;
const OP_LDC_W: u8 = 19;
const OP_TABLESWITCH: u8 = 170;
const OP_LOOKUPSWITCH: u8 = 171;
const OP_INVOKEINTERFACE: u8 = 185;
const OP_INVOKEDYNAMIC: u8 = 186;
const OP_WIDE: u8 = 196;
const OP_MULTIANEWARRAY: u8 = 197;
const OP_GOTO_W: u8 = 200;
const OP_JSR_W: u8 = 201;

#[derive(Debug)]
enum Operands {
    /// Operand bytes carried verbatim (locals, immediates, `wide` bodies).
    Raw(Vec<u8>),
    /// A `u16` constant pool operand, already remapped.
    Cp(u16),
    /// A remapped `u16` pool operand followed by verbatim trailing bytes
    /// (`invokeinterface`, `invokedynamic`, `multianewarray`).
    CpTail(u16, Vec<u8>),
    /// `ldc`/`ldc_w` payload, already remapped; width chosen at encode time.
    Load(u16),
    /// A 16-bit branch, target stored as an absolute old offset.
    Branch16(u32),
    /// `goto_w`/`jsr_w`, target stored as an absolute old offset.
    Branch32(u32),
    Tableswitch {
        default: u32,
        low: i32,
        targets: Vec<u32>,
    },
    Lookupswitch {
        default: u32,
        pairs: Vec<(i32, u32)>,
    },
}

#[derive(Debug)]
struct Insn {
    op: u8,
    operands: Operands,
}

impl Insn {
    /// Encoded size when the instruction starts at `offset`.
    fn size(&self, offset: u32) -> u32 {
        match &self.operands {
            Operands::Raw(bytes) => 1 + bytes.len() as u32,
            Operands::Cp(_) => 3,
            Operands::CpTail(_, tail) => 3 + tail.len() as u32,
            Operands::Load(index) => {
                if *index <= u8::MAX as u16 && self.op == OP_LDC {
                    2
                } else {
                    3
                }
            }
            Operands::Branch16(_) => 3,
            Operands::Branch32(_) => 5,
            Operands::Tableswitch { targets, .. } => {
                1 + pad_after(offset) + 12 + 4 * targets.len() as u32
            }
            Operands::Lookupswitch { pairs, .. } => {
                1 + pad_after(offset) + 8 + 8 * pairs.len() as u32
            }
        }
    }
}

/// Zero bytes between a switch opcode at `offset` and its 4-aligned body.
fn pad_after(offset: u32) -> u32 {
    (4 - ((offset + 1) % 4)) % 4
}

/// Result of rewriting one method body.
pub(crate) struct RewrittenCode {
    pub bytes: Vec<u8>,
    old_len: u32,
    pc_map: HashMap<u32, u32>,
}

impl RewrittenCode {
    /// Translate an old bytecode offset into the rewritten layout.
    ///
    /// The end-of-code offset is a valid target (exception ranges and local
    /// variable scopes are exclusive at the top).
    pub fn translate(&self, old_pc: u32) -> Result<u32> {
        if old_pc == self.old_len {
            return Ok(self.bytes.len() as u32);
        }
        self.pc_map.copied_or(old_pc)
    }

    /// Translate an `(start, length)` range.
    pub fn translate_range(&self, start: u32, length: u32) -> Result<(u32, u32)> {
        let new_start = self.translate(start)?;
        let new_end = self.translate(start + length)?;
        Ok((new_start, new_end - new_start))
    }
}

trait PcLookup {
    fn copied_or(&self, old_pc: u32) -> Result<u32>;
}

impl PcLookup for HashMap<u32, u32> {
    fn copied_or(&self, old_pc: u32) -> Result<u32> {
        self.get(&old_pc).copied().ok_or(Error::MalformedAttribute {
            name: "Code",
            detail: format!("offset {old_pc} does not start an instruction"),
        })
    }
}

impl Transplanter<'_> {
    /// Rewrite a method body, remapping every constant pool operand.
    pub(crate) fn rewrite_code(&mut self, code: &[u8]) -> Result<RewrittenCode> {
        let insns = self.decode(code)?;

        // Offsets depend only on the sizes of earlier instructions, so one
        // forward pass settles the new layout.
        let mut new_offsets = Vec::with_capacity(insns.len());
        let mut offset = 0u32;
        for (_, insn) in &insns {
            new_offsets.push(offset);
            offset += insn.size(offset);
        }
        let new_len = offset;

        let pc_map: HashMap<u32, u32> = insns
            .iter()
            .map(|(old, _)| *old)
            .zip(new_offsets.iter().copied())
            .collect();

        let mut out = Vec::with_capacity(new_len as usize);
        for ((_, insn), &at) in insns.iter().zip(&new_offsets) {
            encode(insn, at, &pc_map, &mut out)?;
        }
        debug_assert_eq!(out.len() as u32, new_len);

        Ok(RewrittenCode {
            bytes: out,
            old_len: code.len() as u32,
            pc_map,
        })
    }

    fn decode(&mut self, code: &[u8]) -> Result<Vec<(u32, Insn)>> {
        let mut insns = Vec::new();
        let mut i = 0usize;
        while i < code.len() {
            let offset = i as u32;
            let op = code[i];
            let mut reader = Cursor::new(&code[i + 1..]);

            let operands = match op {
                OP_LDC => Operands::Load(self.map_index(reader.read_u8()? as u16)?),
                OP_LDC_W => Operands::Load(self.map_index(reader.read_u16::<BE>()?)?),
                // ldc2_w and the field/method/type reference group.
                20 | 178..=184 | 187 | 189 | 192 | 193 => {
                    Operands::Cp(self.map_index(reader.read_u16::<BE>()?)?)
                }
                OP_INVOKEINTERFACE | OP_INVOKEDYNAMIC => {
                    let index = self.map_index(reader.read_u16::<BE>()?)?;
                    let tail = vec![reader.read_u8()?, reader.read_u8()?];
                    Operands::CpTail(index, tail)
                }
                OP_MULTIANEWARRAY => {
                    let index = self.map_index(reader.read_u16::<BE>()?)?;
                    Operands::CpTail(index, vec![reader.read_u8()?])
                }
                153..=168 | 198 | 199 => {
                    let delta = reader.read_i16::<BE>()? as i32;
                    Operands::Branch16((offset as i32 + delta) as u32)
                }
                OP_GOTO_W | OP_JSR_W => {
                    let delta = reader.read_i32::<BE>()?;
                    Operands::Branch32((offset as i32 + delta) as u32)
                }
                OP_TABLESWITCH => {
                    skip_pad(&mut reader, offset)?;
                    let default = (offset as i32 + reader.read_i32::<BE>()?) as u32;
                    let low = reader.read_i32::<BE>()?;
                    let high = reader.read_i32::<BE>()?;
                    if high < low {
                        return Err(Error::MalformedAttribute {
                            name: "Code",
                            detail: format!("tableswitch range {low}..{high} is inverted"),
                        });
                    }
                    let count = (high - low + 1) as usize;
                    let mut targets = Vec::with_capacity(count);
                    for _ in 0..count {
                        targets.push((offset as i32 + reader.read_i32::<BE>()?) as u32);
                    }
                    Operands::Tableswitch {
                        default,
                        low,
                        targets,
                    }
                }
                OP_LOOKUPSWITCH => {
                    skip_pad(&mut reader, offset)?;
                    let default = (offset as i32 + reader.read_i32::<BE>()?) as u32;
                    let npairs = reader.read_i32::<BE>()? as usize;
                    let mut pairs = Vec::with_capacity(npairs);
                    for _ in 0..npairs {
                        let key = reader.read_i32::<BE>()?;
                        pairs.push((key, (offset as i32 + reader.read_i32::<BE>()?) as u32));
                    }
                    Operands::Lookupswitch { default, pairs }
                }
                OP_WIDE => {
                    let sub = reader.read_u8()?;
                    let width = if sub == 132 { 4 } else { 2 };
                    let mut body = vec![sub];
                    for _ in 0..width {
                        body.push(reader.read_u8()?);
                    }
                    Operands::Raw(body)
                }
                _ => {
                    let width = plain_operand_width(op).ok_or(Error::BadOpcode {
                        opcode: op,
                        offset: i,
                    })?;
                    let mut body = vec![0u8; width];
                    reader.read_exact(&mut body)?;
                    Operands::Raw(body)
                }
            };

            i += 1 + reader.position() as usize;
            insns.push((offset, Insn { op, operands }));
        }
        Ok(insns)
    }
}

fn skip_pad(reader: &mut Cursor<&[u8]>, offset: u32) -> Result<()> {
    for _ in 0..pad_after(offset) {
        reader.read_u8()?;
    }
    Ok(())
}

fn encode(insn: &Insn, at: u32, pc_map: &HashMap<u32, u32>, out: &mut Vec<u8>) -> Result<()> {
    let branch16 = |target: u32, out_len: u32| -> Result<i16> {
        let new_target = pc_map.copied_or(target)?;
        let delta = new_target as i64 - out_len as i64;
        i16::try_from(delta).map_err(|_| Error::MalformedAttribute {
            name: "Code",
            detail: format!("branch displacement {delta} overflows 16 bits"),
        })
    };

    match &insn.operands {
        Operands::Raw(bytes) => {
            out.push(insn.op);
            out.extend_from_slice(bytes);
        }
        Operands::Cp(index) => {
            out.push(insn.op);
            out.write_u16::<BE>(*index)?;
        }
        Operands::CpTail(index, tail) => {
            out.push(insn.op);
            out.write_u16::<BE>(*index)?;
            out.extend_from_slice(tail);
        }
        Operands::Load(index) => {
            if *index <= u8::MAX as u16 && insn.op == OP_LDC {
                out.push(OP_LDC);
                out.push(*index as u8);
            } else {
                out.push(OP_LDC_W);
                out.write_u16::<BE>(*index)?;
            }
        }
        Operands::Branch16(target) => {
            let delta = branch16(*target, at)?;
            out.push(insn.op);
            out.write_i16::<BE>(delta)?;
        }
        Operands::Branch32(target) => {
            let new_target = pc_map.copied_or(*target)?;
            out.push(insn.op);
            out.write_i32::<BE>(new_target as i32 - at as i32)?;
        }
        Operands::Tableswitch {
            default,
            low,
            targets,
        } => {
            out.push(insn.op);
            out.extend(std::iter::repeat_n(0u8, pad_after(at) as usize));
            out.write_i32::<BE>(pc_map.copied_or(*default)? as i32 - at as i32)?;
            out.write_i32::<BE>(*low)?;
            out.write_i32::<BE>(*low + targets.len() as i32 - 1)?;
            for target in targets {
                out.write_i32::<BE>(pc_map.copied_or(*target)? as i32 - at as i32)?;
            }
        }
        Operands::Lookupswitch { default, pairs } => {
            out.push(insn.op);
            out.extend(std::iter::repeat_n(0u8, pad_after(at) as usize));
            out.write_i32::<BE>(pc_map.copied_or(*default)? as i32 - at as i32)?;
            out.write_i32::<BE>(pairs.len() as i32)?;
            for (key, target) in pairs {
                out.write_i32::<BE>(*key)?;
                out.write_i32::<BE>(pc_map.copied_or(*target)? as i32 - at as i32)?;
            }
        }
    }
    Ok(())
}

/// Operand byte count for instructions with no constant pool or branch
/// operands. `None` marks opcodes outside the instruction set.
fn plain_operand_width(op: u8) -> Option<usize> {
    match op {
        0..=15 | 26..=53 | 59..=131 | 133..=152 | 172..=177 | 190 | 191 | 194 | 195 => Some(0),
        16 | 21..=25 | 54..=58 | 169 | 188 => Some(1),
        17 | 132 => Some(2),
        _ => None,
    }
}
