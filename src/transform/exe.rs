//! Executable code transform: rewrites relative branch targets as absolute
//! addresses so identical call sites produce identical byte patterns.
//!
//! Detection parses PE, ELF (32/64, both endiannesses) and Mach-O (32/64)
//! headers to find the architecture and the code section's file range; when
//! no header matches, a jump-density heuristic over the whole block decides.
//! Only X86 and ARM64 are handled, everything else is a skip.
//!
//! X86: `CALL`/`JMP` (`E8`/`E9`) and two-byte conditional jumps (`0F 8x`)
//! whose 32-bit little-endian displacement has a `00`/`FF` sign byte are
//! rewritten to the absolute target, stored big-endian and XORed with
//! `0xF0F0F0F0`. Any literal byte that would misparse as a trigger (`E8`,
//! `E9`, a `0F 8x` pair, or the escape itself) is prefixed with `0x9B`.
//!
//! ARM64: `B`/`BL` words get their 26-bit displacement replaced by
//! `addr >> 2`; an address field of 0 is the escape sentinel and is followed
//! by the original word.
//!
//! Block layout: mode byte, 32-bit code start, 32-bit code end (big-endian),
//! verbatim head, transformed code range, verbatim tail.

use crate::error::{Error, Result};
use crate::types::{Context, DataType};

use super::ByteTransform;

const MODE_X86: u8 = 1;
const MODE_ARM64: u8 = 2;
const X86_ESCAPE: u8 = 0x9B;
const ADDR_MASK: u32 = 0xF0F0_F0F0;
const MIN_BLOCK_LEN: usize = 4096;
/// Fewer rewrites than this and the pass is not worth a header.
const MIN_REWRITES: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Arch {
    X86,
    Arm64,
}

struct CodeRange {
    arch: Arch,
    start: usize,
    end: usize,
}

fn read_u16(src: &[u8], off: usize, le: bool) -> Option<u32> {
    let b = src.get(off..off + 2)?;
    Some(if le {
        u32::from(u16::from_le_bytes([b[0], b[1]]))
    } else {
        u32::from(u16::from_be_bytes([b[0], b[1]]))
    })
}

fn read_u32(src: &[u8], off: usize, le: bool) -> Option<u32> {
    let b = src.get(off..off + 4)?;
    Some(if le {
        u32::from_le_bytes([b[0], b[1], b[2], b[3]])
    } else {
        u32::from_be_bytes([b[0], b[1], b[2], b[3]])
    })
}

fn read_u64(src: &[u8], off: usize, le: bool) -> Option<u64> {
    let b = src.get(off..off + 8)?;
    let mut a = [0u8; 8];
    a.copy_from_slice(b);
    Some(if le {
        u64::from_le_bytes(a)
    } else {
        u64::from_be_bytes(a)
    })
}

fn parse_elf(src: &[u8]) -> Option<CodeRange> {
    if src.len() < 64 || &src[..4] != b"\x7FELF" {
        return None;
    }
    let is64 = match src[4] {
        1 => false,
        2 => true,
        _ => return None,
    };
    let le = match src[5] {
        1 => true,
        2 => false,
        _ => return None,
    };
    let machine = read_u16(src, 18, le)?;
    let arch = match machine {
        0x03 | 0x3E => Arch::X86,  // EM_386 / EM_X86_64
        0xB7 => Arch::Arm64,       // EM_AARCH64
        _ => return None,
    };
    let (shoff, shentsize, shnum) = if is64 {
        (
            usize::try_from(read_u64(src, 0x28, le)?).ok()?,
            read_u16(src, 0x3A, le)? as usize,
            read_u16(src, 0x3C, le)? as usize,
        )
    } else {
        (
            read_u32(src, 0x20, le)? as usize,
            read_u16(src, 0x2E, le)? as usize,
            read_u16(src, 0x30, le)? as usize,
        )
    };
    // Executable sections (SHF_EXECINSTR) bound the code range.
    const SHF_EXECINSTR: u64 = 0x4;
    let mut start = usize::MAX;
    let mut end = 0usize;
    for s in 0..shnum.min(256) {
        let base = shoff.checked_add(s.checked_mul(shentsize)?)?;
        let (flags, off, size) = if is64 {
            (
                read_u64(src, base + 0x08, le)?,
                usize::try_from(read_u64(src, base + 0x18, le)?).ok()?,
                usize::try_from(read_u64(src, base + 0x20, le)?).ok()?,
            )
        } else {
            (
                u64::from(read_u32(src, base + 0x08, le)?),
                read_u32(src, base + 0x10, le)? as usize,
                read_u32(src, base + 0x14, le)? as usize,
            )
        };
        if flags & SHF_EXECINSTR != 0 && size > 0 && off < src.len() {
            start = start.min(off);
            end = end.max((off + size).min(src.len()));
        }
    }
    if start >= end {
        return None;
    }
    Some(CodeRange { arch, start, end })
}

fn parse_pe(src: &[u8]) -> Option<CodeRange> {
    if src.len() < 0x100 || &src[..2] != b"MZ" {
        return None;
    }
    let pe_off = read_u32(src, 0x3C, true)? as usize;
    if src.get(pe_off..pe_off + 4)? != b"PE\0\0" {
        return None;
    }
    let machine = read_u16(src, pe_off + 4, true)?;
    let arch = match machine {
        0x014C | 0x8664 => Arch::X86,
        0xAA64 => Arch::Arm64,
        _ => return None,
    };
    let nb_sections = read_u16(src, pe_off + 6, true)? as usize;
    let opt_size = read_u16(src, pe_off + 20, true)? as usize;
    let sections = pe_off + 24 + opt_size;
    const IMAGE_SCN_CNT_CODE: u32 = 0x20;
    let mut start = usize::MAX;
    let mut end = 0usize;
    for s in 0..nb_sections.min(96) {
        let base = sections + s * 40;
        let raw_size = read_u32(src, base + 16, true)? as usize;
        let raw_off = read_u32(src, base + 20, true)? as usize;
        let flags = read_u32(src, base + 36, true)?;
        if flags & IMAGE_SCN_CNT_CODE != 0 && raw_size > 0 && raw_off < src.len() {
            start = start.min(raw_off);
            end = end.max((raw_off + raw_size).min(src.len()));
        }
    }
    if start >= end {
        return None;
    }
    Some(CodeRange { arch, start, end })
}

fn parse_macho(src: &[u8]) -> Option<CodeRange> {
    let magic = read_u32(src, 0, true)?;
    let (is64, le) = match magic {
        0xFEED_FACE => (false, true),
        0xFEED_FACF => (true, true),
        0xCEFA_EDFE => (false, false),
        0xCFFA_EDFE => (true, false),
        _ => return None,
    };
    let cputype = read_u32(src, 4, le)?;
    let arch = match cputype & 0x00FF_FFFF {
        7 => Arch::X86,        // CPU_TYPE_X86(_64)
        12 => Arch::Arm64,     // CPU_TYPE_ARM(64)
        _ => return None,
    };
    let ncmds = read_u32(src, 16, le)? as usize;
    let mut off = if is64 { 32 } else { 28 };
    const LC_SEGMENT: u32 = 0x1;
    const LC_SEGMENT_64: u32 = 0x19;
    for _ in 0..ncmds.min(64) {
        let cmd = read_u32(src, off, le)?;
        let cmdsize = read_u32(src, off + 4, le)? as usize;
        if cmdsize < 8 {
            return None;
        }
        let is_seg = (cmd == LC_SEGMENT && !is64) || (cmd == LC_SEGMENT_64 && is64);
        if is_seg && src.get(off + 8..off + 14)? == b"__TEXT" {
            let (fileoff, filesize) = if is64 {
                (
                    usize::try_from(read_u64(src, off + 40, le)?).ok()?,
                    usize::try_from(read_u64(src, off + 48, le)?).ok()?,
                )
            } else {
                (
                    read_u32(src, off + 32, le)? as usize,
                    read_u32(src, off + 36, le)? as usize,
                )
            };
            if filesize == 0 || fileoff >= src.len() {
                return None;
            }
            return Some(CodeRange {
                arch,
                start: fileoff,
                end: (fileoff + filesize).min(src.len()),
            });
        }
        off = off.checked_add(cmdsize)?;
    }
    None
}

/// Header-less fallback: branch-opcode density over the whole block.
fn detect_heuristic(src: &[u8]) -> Option<CodeRange> {
    let n = src.len();
    let jumps = src.iter().filter(|&&b| b & 0xFE == 0xE8).count();
    if jumps * 64 >= n && jumps >= MIN_REWRITES * 4 {
        return Some(CodeRange {
            arch: Arch::X86,
            start: 0,
            end: n,
        });
    }
    let mut branches = 0usize;
    for w in src.chunks_exact(4) {
        let v = u32::from_le_bytes([w[0], w[1], w[2], w[3]]);
        if v & 0x7C00_0000 == 0x1400_0000 {
            branches += 1;
        }
    }
    // Random words match the two opcode patterns 1/32 of the time; demand
    // double that density before calling it code.
    if branches * 16 >= n / 4 && branches >= MIN_REWRITES * 4 {
        return Some(CodeRange {
            arch: Arch::Arm64,
            start: 0,
            end: n & !3,
        });
    }
    None
}

fn detect(src: &[u8]) -> Option<CodeRange> {
    parse_elf(src)
        .or_else(|| parse_pe(src))
        .or_else(|| parse_macho(src))
        .or_else(|| detect_heuristic(src))
}

pub struct ExeCodec;

impl ExeCodec {
    pub fn new() -> ExeCodec {
        ExeCodec
    }
}

impl Default for ExeCodec {
    fn default() -> Self {
        ExeCodec::new()
    }
}

#[inline]
fn is_x86_trigger(src: &[u8], i: usize) -> bool {
    let b = src[i];
    b & 0xFE == 0xE8
        || (b == 0x0F && matches!(src.get(i + 1), Some(&n) if n & 0xF0 == 0x80))
}

impl ByteTransform for ExeCodec {
    fn forward(&mut self, ctx: &mut Context, src: &[u8], dst: &mut [u8]) -> Result<(usize, usize)> {
        let n = src.len();
        if n < MIN_BLOCK_LEN {
            return Err(Error::Skip("block too small"));
        }
        if !matches!(
            ctx.data_type,
            DataType::Undefined | DataType::Exe | DataType::Bin
        ) {
            return Err(Error::Skip("data type not executable"));
        }
        let range = detect(src).ok_or(Error::Skip("no executable signature"))?;
        // Expansion is capped at +2%; anything more forfeits the pass.
        let budget = (n + n / 50).min(dst.len());

        dst[0] = match range.arch {
            Arch::X86 => MODE_X86,
            Arch::Arm64 => MODE_ARM64,
        };
        dst[1..5].copy_from_slice(&(range.start as u32).to_be_bytes());
        dst[5..9].copy_from_slice(&(range.end as u32).to_be_bytes());
        if 9 + range.start > budget {
            return Err(Error::Skip("header expanded output"));
        }
        dst[9..9 + range.start].copy_from_slice(&src[..range.start]);
        let mut j = 9 + range.start;

        let rewrites = match range.arch {
            Arch::X86 => forward_x86(src, dst, &mut j, range.start, range.end, budget)?,
            Arch::Arm64 => forward_arm64(src, dst, &mut j, range.start, range.end, budget)?,
        };
        if rewrites < MIN_REWRITES {
            return Err(Error::Skip("too few branch rewrites"));
        }
        if j + (n - range.end) > budget {
            return Err(Error::Skip("tail expanded output"));
        }
        dst[j..j + (n - range.end)].copy_from_slice(&src[range.end..]);
        j += n - range.end;
        ctx.data_type = DataType::Exe;
        Ok((n, j))
    }

    fn inverse(&mut self, _ctx: &mut Context, src: &[u8], dst: &mut [u8]) -> Result<(usize, usize)> {
        if src.len() < 9 {
            return Err(Error::corruption("truncated exe header"));
        }
        let mode = src[0];
        let start = u32::from_be_bytes([src[1], src[2], src[3], src[4]]) as usize;
        let end = u32::from_be_bytes([src[5], src[6], src[7], src[8]]) as usize;
        if start > end || end > dst.len() || 9 + start > src.len() {
            return Err(Error::corruption("invalid exe code range"));
        }
        dst[..start].copy_from_slice(&src[9..9 + start]);
        let mut i = 9 + start;
        let mut j = start;
        match mode {
            MODE_X86 => inverse_x86(src, dst, &mut i, &mut j, end)?,
            MODE_ARM64 => inverse_arm64(src, dst, &mut i, &mut j, end)?,
            _ => return Err(Error::corruption("invalid exe mode")),
        }
        let tail = src.len() - i;
        if j + tail > dst.len() {
            return Err(Error::corruption("output exceeds block size"));
        }
        dst[j..j + tail].copy_from_slice(&src[i..]);
        Ok((src.len(), j + tail))
    }

    fn max_encoded_len(&self, src_len: usize) -> usize {
        src_len + src_len / 50 + 16
    }
}

fn forward_x86(
    src: &[u8],
    dst: &mut [u8],
    j: &mut usize,
    start: usize,
    end: usize,
    budget: usize,
) -> Result<usize> {
    let mut i = start;
    let mut rewrites = 0usize;
    let expanded = || Error::Skip("code rewrite expanded output");
    while i < end {
        let b = src[i];
        let (op_len, is_jump) = if b & 0xFE == 0xE8 {
            (1usize, true)
        } else if b == 0x0F && i + 1 < end && src[i + 1] & 0xF0 == 0x80 {
            (2usize, true)
        } else {
            (0, false)
        };
        if is_jump && i + op_len + 4 <= end {
            let off = i32::from_le_bytes([
                src[i + op_len],
                src[i + op_len + 1],
                src[i + op_len + 2],
                src[i + op_len + 3],
            ]);
            let sign = (off >> 24) & 0xFF;
            let next = (i + op_len + 4) as i64;
            let target = next + i64::from(off);
            if (sign == 0x00 || sign == 0xFF) && target >= 0 && target <= src.len() as i64
            {
                if *j + op_len + 4 > budget {
                    return Err(expanded());
                }
                dst[*j..*j + op_len].copy_from_slice(&src[i..i + op_len]);
                *j += op_len;
                let enc = (target as u32) ^ ADDR_MASK;
                dst[*j..*j + 4].copy_from_slice(&enc.to_be_bytes());
                *j += 4;
                i += op_len + 4;
                rewrites += 1;
                continue;
            }
        }
        // Literal byte; escape anything that would misparse on decode.
        if b == X86_ESCAPE || is_x86_trigger(src, i) {
            if *j + 2 > budget {
                return Err(expanded());
            }
            dst[*j] = X86_ESCAPE;
            dst[*j + 1] = b;
            *j += 2;
        } else {
            if *j >= budget {
                return Err(expanded());
            }
            dst[*j] = b;
            *j += 1;
        }
        i += 1;
    }
    Ok(rewrites)
}

fn inverse_x86(src: &[u8], dst: &mut [u8], i: &mut usize, j: &mut usize, end: usize) -> Result<()> {
    let trunc = || Error::corruption("truncated x86 code stream");
    while *j < end {
        let b = *src.get(*i).ok_or_else(trunc)?;
        if b == X86_ESCAPE {
            let lit = *src.get(*i + 1).ok_or_else(trunc)?;
            dst[*j] = lit;
            *i += 2;
            *j += 1;
            continue;
        }
        let op_len = if b & 0xFE == 0xE8 {
            1usize
        } else if b == 0x0F
            && matches!(src.get(*i + 1), Some(&x) if x & 0xF0 == 0x80)
            && *j + 2 + 4 <= end
        {
            2usize
        } else {
            dst[*j] = b;
            *i += 1;
            *j += 1;
            continue;
        };
        if *i + op_len + 4 > src.len() || *j + op_len + 4 > dst.len() {
            return Err(trunc());
        }
        dst[*j..*j + op_len].copy_from_slice(&src[*i..*i + op_len]);
        let enc = u32::from_be_bytes([
            src[*i + op_len],
            src[*i + op_len + 1],
            src[*i + op_len + 2],
            src[*i + op_len + 3],
        ]) ^ ADDR_MASK;
        let next = (*j + op_len + 4) as i64;
        let off = i64::from(enc) - next;
        let off = i32::try_from(off).map_err(|_| Error::corruption("x86 target out of range"))?;
        dst[*j + op_len..*j + op_len + 4].copy_from_slice(&off.to_le_bytes());
        *i += op_len + 4;
        *j += op_len + 4;
    }
    Ok(())
}

fn forward_arm64(
    src: &[u8],
    dst: &mut [u8],
    j: &mut usize,
    start: usize,
    end: usize,
    budget: usize,
) -> Result<usize> {
    let mut i = start;
    let mut rewrites = 0usize;
    let expanded = || Error::Skip("code rewrite expanded output");
    while i + 4 <= end {
        let w = u32::from_le_bytes([src[i], src[i + 1], src[i + 2], src[i + 3]]);
        let opcode = w & 0xFC00_0000;
        if opcode == 0x1400_0000 || opcode == 0x9400_0000 {
            // Sign-extend the 26-bit displacement, scale by 4.
            let imm = ((w & 0x03FF_FFFF) as i32) << 6 >> 6;
            let target = i as i64 + i64::from(imm) * 4;
            let addr_field = (target >> 2) as u32 & 0x03FF_FFFF;
            let encodable = target > 0
                && target < src.len() as i64
                && i64::from(addr_field) == target >> 2
                && target & 3 == 0;
            if *j + 4 > budget {
                return Err(expanded());
            }
            if encodable {
                let enc = opcode | addr_field;
                dst[*j..*j + 4].copy_from_slice(&enc.to_le_bytes());
                *j += 4;
                rewrites += 1;
            } else {
                // Address field 0 is the sentinel: original word follows.
                if *j + 8 > budget {
                    return Err(expanded());
                }
                dst[*j..*j + 4].copy_from_slice(&opcode.to_le_bytes());
                dst[*j + 4..*j + 8].copy_from_slice(&src[i..i + 4]);
                *j += 8;
            }
            i += 4;
            continue;
        }
        if *j + 4 > budget {
            return Err(expanded());
        }
        dst[*j..*j + 4].copy_from_slice(&src[i..i + 4]);
        *j += 4;
        i += 4;
    }
    // The code range is word-aligned by construction; copy any ragged tail.
    while i < end {
        if *j >= budget {
            return Err(expanded());
        }
        dst[*j] = src[i];
        *j += 1;
        i += 1;
    }
    Ok(rewrites)
}

fn inverse_arm64(src: &[u8], dst: &mut [u8], i: &mut usize, j: &mut usize, end: usize) -> Result<()> {
    let trunc = || Error::corruption("truncated arm64 code stream");
    while *j + 4 <= end {
        if *i + 4 > src.len() {
            return Err(trunc());
        }
        let w = u32::from_le_bytes([src[*i], src[*i + 1], src[*i + 2], src[*i + 3]]);
        let opcode = w & 0xFC00_0000;
        if opcode == 0x1400_0000 || opcode == 0x9400_0000 {
            let addr_field = w & 0x03FF_FFFF;
            if addr_field == 0 {
                if *i + 8 > src.len() {
                    return Err(trunc());
                }
                dst[*j..*j + 4].copy_from_slice(&src[*i + 4..*i + 8]);
                *i += 8;
                *j += 4;
                continue;
            }
            let target = i64::from(addr_field) << 2;
            let imm = (target - *j as i64) / 4;
            let imm26 = (imm as u32) & 0x03FF_FFFF;
            let out = opcode | imm26;
            dst[*j..*j + 4].copy_from_slice(&out.to_le_bytes());
            *i += 4;
            *j += 4;
            continue;
        }
        dst[*j..*j + 4].copy_from_slice(&src[*i..*i + 4]);
        *i += 4;
        *j += 4;
    }
    while *j < end {
        dst[*j] = *src.get(*i).ok_or_else(trunc)?;
        *i += 1;
        *j += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal ELF64 little-endian x86-64 image: header, one executable
    /// section, and a section header table.
    fn synthetic_elf_x86(code: &[u8]) -> Vec<u8> {
        let code_off = 0x80usize;
        let shoff = code_off + code.len();
        let mut img = vec![0u8; shoff + 2 * 64];
        img[..4].copy_from_slice(b"\x7FELF");
        img[4] = 2; // 64-bit
        img[5] = 1; // little-endian
        img[18..20].copy_from_slice(&0x3Eu16.to_le_bytes()); // EM_X86_64
        img[0x28..0x30].copy_from_slice(&(shoff as u64).to_le_bytes());
        img[0x3A..0x3C].copy_from_slice(&64u16.to_le_bytes()); // shentsize
        img[0x3C..0x3E].copy_from_slice(&2u16.to_le_bytes()); // shnum
        img[code_off..code_off + code.len()].copy_from_slice(code);
        // Section 1: executable, covering the code bytes.
        let s1 = shoff + 64;
        img[s1 + 0x08..s1 + 0x10].copy_from_slice(&0x4u64.to_le_bytes()); // SHF_EXECINSTR
        img[s1 + 0x18..s1 + 0x20].copy_from_slice(&(code_off as u64).to_le_bytes());
        img[s1 + 0x20..s1 + 0x28].copy_from_slice(&(code.len() as u64).to_le_bytes());
        img
    }

    fn x86_code(calls: usize) -> Vec<u8> {
        let mut code = Vec::new();
        for k in 0..calls {
            // mov-ish filler then CALL rel32 with a small displacement.
            code.extend_from_slice(&[0x48, 0x89, 0xC3, 0x90]);
            code.push(0xE8);
            code.extend_from_slice(&((k as i32 * 16 - 64).to_le_bytes()));
        }
        code.resize(8192 - 0x80 - 128, 0x90);
        code
    }

    fn roundtrip(data: &[u8]) -> Vec<u8> {
        let codec = ExeCodec::new();
        let mut ctx = Context::default();
        let mut enc = vec![0u8; codec.max_encoded_len(data.len())];
        let (_, written) = ExeCodec::new().forward(&mut ctx, data, &mut enc).unwrap();
        enc.truncate(written);
        assert_eq!(ctx.data_type, DataType::Exe);
        let mut out = vec![0u8; data.len()];
        let (_, m) = ExeCodec::new().inverse(&mut ctx, &enc, &mut out).unwrap();
        assert_eq!(m, data.len());
        assert_eq!(out, data);
        enc
    }

    #[test]
    fn elf_x86_calls_roundtrip() {
        let img = synthetic_elf_x86(&x86_code(40));
        roundtrip(&img);
    }

    #[test]
    fn arm64_branches_roundtrip() {
        // Header-less ARM64: dense B/BL words trigger the heuristic.
        let mut data = Vec::new();
        for k in 0..1500u32 {
            let imm = (k % 64).wrapping_sub(32) & 0x03FF_FFFF;
            let op = if k % 2 == 0 { 0x1400_0000 } else { 0x9400_0000 };
            data.extend_from_slice(&(op | imm).to_le_bytes());
            data.extend_from_slice(&0xD503_201Fu32.to_le_bytes()); // nop
        }
        roundtrip(&data);
    }

    #[test]
    fn too_few_calls_is_skipped() {
        let img = synthetic_elf_x86(&x86_code(4));
        let codec = ExeCodec::new();
        let mut ctx = Context::default();
        let mut enc = vec![0u8; codec.max_encoded_len(img.len())];
        let err = ExeCodec::new().forward(&mut ctx, &img, &mut enc).unwrap_err();
        assert!(err.is_skip());
    }

    #[test]
    fn plain_data_is_skipped() {
        let data = vec![0x41u8; 8192];
        let codec = ExeCodec::new();
        let mut ctx = Context::default();
        let mut enc = vec![0u8; codec.max_encoded_len(data.len())];
        let err = ExeCodec::new().forward(&mut ctx, &data, &mut enc).unwrap_err();
        assert!(err.is_skip());
    }
}
