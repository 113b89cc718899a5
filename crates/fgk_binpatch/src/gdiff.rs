//! GDIFF (draft W3C generic diff format) application.
//!
//! A diff is a header followed by a sequence of instructions that either copy
//! byte ranges out of the original input or append literal data carried in the
//! diff itself. Instructions execute strictly in order and append to the
//! output; a stop opcode terminates the program.

use std::io::{Cursor, Read};

use byteorder::{ReadBytesExt, BE};

use crate::error::{Error, Result};

pub const MAGIC: u32 = 0xD1FF_D1FF;
pub const VERSION: u8 = 4;

const OP_STOP: u8 = 0;
const OP_DATA_U16: u8 = 247;
const OP_DATA_U32: u8 = 248;

/// Runs a diff program against `original` and returns the patched bytes.
///
/// Every operand is validated before use: literal runs must be fully present
/// in the diff stream, copy ranges must lie inside `original`, and signed
/// operands must be non-negative. Any violation aborts with an error naming
/// the diff offset of the offending instruction.
pub fn apply(diff: &[u8], original: &[u8]) -> Result<Vec<u8>> {
    let mut cur = Cursor::new(diff);

    let magic = cur.read_u32::<BE>().map_err(|_| Error::TruncatedDiff { at: 0 })?;
    if magic != MAGIC {
        return Err(Error::InvalidMagic { found: magic });
    }
    let version = cur.read_u8().map_err(|_| Error::TruncatedDiff { at: 4 })?;
    if version != VERSION {
        return Err(Error::UnsupportedVersion(version));
    }

    let mut out = Vec::with_capacity(original.len());
    loop {
        let at = cur.position();
        let op = cur.read_u8().map_err(|_| Error::TruncatedDiff { at })?;
        match op {
            OP_STOP => break,
            1..=246 => append_data(&mut cur, &mut out, op as u64, at)?,
            OP_DATA_U16 => {
                let len = cur.read_u16::<BE>().map_err(|_| Error::TruncatedDiff { at })?;
                append_data(&mut cur, &mut out, len as u64, at)?;
            }
            OP_DATA_U32 => {
                let len = read_i32(&mut cur, at)?;
                append_data(&mut cur, &mut out, len, at)?;
            }
            249 => {
                let offset = read_u16(&mut cur, at)?;
                let len = read_u8(&mut cur, at)?;
                copy_original(original, &mut out, offset, len, at)?;
            }
            250 => {
                let offset = read_u16(&mut cur, at)?;
                let len = read_u16(&mut cur, at)?;
                copy_original(original, &mut out, offset, len, at)?;
            }
            251 => {
                let offset = read_u16(&mut cur, at)?;
                let len = read_i32(&mut cur, at)?;
                copy_original(original, &mut out, offset, len, at)?;
            }
            252 => {
                let offset = read_i32(&mut cur, at)?;
                let len = read_u8(&mut cur, at)?;
                copy_original(original, &mut out, offset, len, at)?;
            }
            253 => {
                let offset = read_i32(&mut cur, at)?;
                let len = read_u16(&mut cur, at)?;
                copy_original(original, &mut out, offset, len, at)?;
            }
            254 => {
                let offset = read_i32(&mut cur, at)?;
                let len = read_i32(&mut cur, at)?;
                copy_original(original, &mut out, offset, len, at)?;
            }
            255 => {
                let offset = read_i64(&mut cur, at)?;
                let len = read_i32(&mut cur, at)?;
                copy_original(original, &mut out, offset, len, at)?;
            }
        }
    }
    Ok(out)
}

fn append_data(cur: &mut Cursor<&[u8]>, out: &mut Vec<u8>, len: u64, at: u64) -> Result<()> {
    let mut run = vec![0u8; len as usize];
    cur.read_exact(&mut run)
        .map_err(|_| Error::TruncatedDiff { at })?;
    out.extend_from_slice(&run);
    Ok(())
}

fn copy_original(original: &[u8], out: &mut Vec<u8>, offset: u64, len: u64, at: u64) -> Result<()> {
    let end = offset.checked_add(len).filter(|&e| e <= original.len() as u64);
    let Some(end) = end else {
        return Err(Error::SourceOverrun {
            offset,
            len,
            size: original.len(),
            at,
        });
    };
    out.extend_from_slice(&original[offset as usize..end as usize]);
    Ok(())
}

fn read_u8(cur: &mut Cursor<&[u8]>, at: u64) -> Result<u64> {
    Ok(cur.read_u8().map_err(|_| Error::TruncatedDiff { at })? as u64)
}

fn read_u16(cur: &mut Cursor<&[u8]>, at: u64) -> Result<u64> {
    Ok(cur.read_u16::<BE>().map_err(|_| Error::TruncatedDiff { at })? as u64)
}

fn read_i32(cur: &mut Cursor<&[u8]>, at: u64) -> Result<u64> {
    let value = cur.read_i32::<BE>().map_err(|_| Error::TruncatedDiff { at })?;
    if value < 0 {
        return Err(Error::NegativeOperand {
            value: value as i64,
            at,
        });
    }
    Ok(value as u64)
}

fn read_i64(cur: &mut Cursor<&[u8]>, at: u64) -> Result<u64> {
    let value = cur.read_i64::<BE>().map_err(|_| Error::TruncatedDiff { at })?;
    if value < 0 {
        return Err(Error::NegativeOperand { value, at });
    }
    Ok(value as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> Vec<u8> {
        let mut out = MAGIC.to_be_bytes().to_vec();
        out.push(VERSION);
        out
    }

    #[test]
    fn empty_program_yields_empty_output() {
        let mut diff = header();
        diff.push(OP_STOP);

        let out = apply(&diff, b"anything at all").unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn literals_and_copies_interleave() {
        let original = b"hello, world";
        let mut diff = header();
        diff.push(2);
        diff.extend_from_slice(b"Oh");
        // copy "world" (offset 7, len 5) with the u16/u8 form
        diff.push(249);
        diff.extend_from_slice(&7u16.to_be_bytes());
        diff.push(5);
        diff.push(1);
        diff.push(b'!');
        diff.push(OP_STOP);

        assert_eq!(apply(&diff, original).unwrap(), b"Ohworld!");
    }

    #[test]
    fn wide_copy_forms_agree() {
        let original: Vec<u8> = (0..=255u8).collect();
        let mut diff = header();
        diff.push(253);
        diff.extend_from_slice(&16i32.to_be_bytes());
        diff.extend_from_slice(&4u16.to_be_bytes());
        diff.push(255);
        diff.extend_from_slice(&16i64.to_be_bytes());
        diff.extend_from_slice(&4i32.to_be_bytes());
        diff.push(OP_STOP);

        assert_eq!(apply(&diff, &original).unwrap(), &[16, 17, 18, 19, 16, 17, 18, 19]);
    }

    #[test]
    fn rejects_bad_magic() {
        let diff = [0u8, 1, 2, 3, 4, 0];
        assert!(matches!(
            apply(&diff, &[]),
            Err(Error::InvalidMagic { found: 0x00010203 })
        ));
    }

    #[test]
    fn rejects_copy_past_end_of_original() {
        let mut diff = header();
        diff.push(249);
        diff.extend_from_slice(&3u16.to_be_bytes());
        diff.push(10);
        diff.push(OP_STOP);

        let err = apply(&diff, b"short").unwrap_err();
        assert!(matches!(err, Error::SourceOverrun { offset: 3, len: 10, size: 5, .. }));
    }

    #[test]
    fn rejects_negative_length() {
        let mut diff = header();
        diff.push(OP_DATA_U32);
        diff.extend_from_slice(&(-1i32).to_be_bytes());
        diff.push(OP_STOP);

        assert!(matches!(apply(&diff, &[]), Err(Error::NegativeOperand { value: -1, .. })));
    }

    #[test]
    fn rejects_truncated_instruction() {
        let mut diff = header();
        diff.push(250);
        diff.push(0); // u16 offset cut short

        assert!(matches!(apply(&diff, &[]), Err(Error::TruncatedDiff { .. })));
    }
}
