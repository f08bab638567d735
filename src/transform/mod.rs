//! Stage-1 byte transforms: reversible byte-to-byte functions composed into
//! a chain of up to eight stages.
//!
//! Every transform implements [`ByteTransform`]; the factory returns a
//! tagged [`Transform`] variant, and [`Sequence`] composes them with
//! per-stage skip tracking. A forward call either produces output or
//! reports a skip; the inverse honors the recorded skip bits and runs the
//! surviving stages in reverse order.

use crate::error::{Error, Result};
use crate::types::Context;

pub mod bwt;
pub mod bwts;
pub mod exe;
pub mod fsd;
pub mod lz;
pub mod pack;
pub mod rlt;
pub mod rolz;
pub mod sais;
pub mod sbrt;
pub mod srt;
pub mod text;
pub mod utf;
pub mod words;
pub mod zrlt;

pub use bwt::Bwt;
pub use bwts::Bwts;
pub use exe::ExeCodec;
pub use fsd::Fsd;
pub use lz::{LzCodec, LzpCodec};
pub use pack::Pack;
pub use rlt::Rlt;
pub use rolz::{RolzCodec, RolzxCodec};
pub use sbrt::{Sbrt, SbrtMode};
pub use srt::Srt;
pub use text::TextCodec;
pub use utf::UtfCodec;
pub use zrlt::Zrlt;

/// Common capability set of every stage-1 transform.
///
/// `forward`/`inverse` return `(bytes read, bytes written)`. A forward call
/// may decline with [`Error::Skip`]; an inverse call must either restore the
/// exact original bytes or fail with a corruption error.
pub trait ByteTransform {
    fn forward(&mut self, ctx: &mut Context, src: &[u8], dst: &mut [u8]) -> Result<(usize, usize)>;
    fn inverse(&mut self, ctx: &mut Context, src: &[u8], dst: &mut [u8]) -> Result<(usize, usize)>;
    /// Worst-case forward output size; never below `src_len`.
    fn max_encoded_len(&self, src_len: usize) -> usize;
}

// ── Transform ids (6-bit slots in the 48-bit chain field) ────────────────────
pub const NONE_ID: u8 = 0;
pub const PACK_ID: u8 = 1;
pub const BWT_ID: u8 = 2;
pub const BWTS_ID: u8 = 3;
pub const LZ_ID: u8 = 4;
pub const LZX_ID: u8 = 5;
pub const LZP_ID: u8 = 6;
pub const ROLZ_ID: u8 = 7;
pub const ROLZX_ID: u8 = 8;
pub const RLT_ID: u8 = 9;
pub const ZRLT_ID: u8 = 10;
pub const MTFT_ID: u8 = 11;
pub const RANK_ID: u8 = 12;
pub const SRT_ID: u8 = 13;
pub const TEXT_ID: u8 = 14;
pub const MM_ID: u8 = 15;
pub const EXE_ID: u8 = 16;
pub const UTF_ID: u8 = 17;
pub const TS_ID: u8 = 18;

/// Maximum stages in a chain.
pub const MAX_STAGES: usize = 8;

pub fn transform_name(id: u8) -> &'static str {
    match id {
        NONE_ID => "NONE",
        PACK_ID => "PACK",
        BWT_ID => "BWT",
        BWTS_ID => "BWTS",
        LZ_ID => "LZ",
        LZX_ID => "LZX",
        LZP_ID => "LZP",
        ROLZ_ID => "ROLZ",
        ROLZX_ID => "ROLZX",
        RLT_ID => "RLT",
        ZRLT_ID => "ZRLT",
        MTFT_ID => "MTFT",
        RANK_ID => "RANK",
        SRT_ID => "SRT",
        TEXT_ID => "TEXT",
        MM_ID => "MM",
        EXE_ID => "EXE",
        UTF_ID => "UTF",
        TS_ID => "TS",
        _ => "UNKNOWN",
    }
}

pub fn transform_id(name: &str) -> Result<u8> {
    match name.to_uppercase().as_str() {
        "NONE" => Ok(NONE_ID),
        "PACK" => Ok(PACK_ID),
        "BWT" => Ok(BWT_ID),
        "BWTS" => Ok(BWTS_ID),
        "LZ" => Ok(LZ_ID),
        "LZX" => Ok(LZX_ID),
        "LZP" => Ok(LZP_ID),
        "ROLZ" => Ok(ROLZ_ID),
        "ROLZX" => Ok(ROLZX_ID),
        "RLT" => Ok(RLT_ID),
        "ZRLT" => Ok(ZRLT_ID),
        "MTFT" => Ok(MTFT_ID),
        "RANK" => Ok(RANK_ID),
        "SRT" => Ok(SRT_ID),
        "TEXT" => Ok(TEXT_ID),
        "MM" => Ok(MM_ID),
        "EXE" => Ok(EXE_ID),
        "UTF" => Ok(UTF_ID),
        "TS" => Ok(TS_ID),
        _ => Err(Error::invalid_param(format!("unknown transform '{name}'"))),
    }
}

/// Pack up to 8 stage ids into the 48-bit chain field (first stage in the
/// top slot). Surplus slots stay NONE.
pub fn pack_chain(ids: &[u8]) -> Result<u64> {
    if ids.len() > MAX_STAGES {
        return Err(Error::invalid_param(format!(
            "transform chain has {} stages, maximum is {MAX_STAGES}",
            ids.len()
        )));
    }
    let mut packed = 0u64;
    for (slot, &id) in ids.iter().enumerate() {
        packed |= u64::from(id & 0x3F) << (42 - 6 * slot);
    }
    Ok(packed)
}

/// Unpack the chain field into the non-NONE stage ids, in forward order.
pub fn unpack_chain(packed: u64) -> Vec<u8> {
    (0..MAX_STAGES)
        .map(|slot| ((packed >> (42 - 6 * slot)) & 0x3F) as u8)
        .filter(|&id| id != NONE_ID)
        .collect()
}

/// Parse a `+`-separated chain description ("TEXT+UTF+BWT").
pub fn parse_chain(desc: &str) -> Result<Vec<u8>> {
    let ids: Vec<u8> = desc
        .split('+')
        .filter(|s| !s.is_empty())
        .map(transform_id)
        .collect::<Result<_>>()?;
    if ids.len() > MAX_STAGES {
        return Err(Error::invalid_param(format!(
            "transform chain has {} stages, maximum is {MAX_STAGES}",
            ids.len()
        )));
    }
    Ok(ids)
}

/// Render a chain as its canonical description.
pub fn chain_name(ids: &[u8]) -> String {
    if ids.is_empty() {
        return "NONE".to_string();
    }
    ids.iter()
        .map(|&id| transform_name(id))
        .collect::<Vec<_>>()
        .join("+")
}

// ── Null transform ───────────────────────────────────────────────────────────

/// Identity transform (chain slot NONE when executed explicitly).
pub struct NullTransform;

impl ByteTransform for NullTransform {
    fn forward(&mut self, _ctx: &mut Context, src: &[u8], dst: &mut [u8]) -> Result<(usize, usize)> {
        if dst.len() < src.len() {
            return Err(Error::capacity("copy output buffer too small"));
        }
        dst[..src.len()].copy_from_slice(src);
        Ok((src.len(), src.len()))
    }

    fn inverse(&mut self, ctx: &mut Context, src: &[u8], dst: &mut [u8]) -> Result<(usize, usize)> {
        self.forward(ctx, src, dst)
    }

    fn max_encoded_len(&self, src_len: usize) -> usize {
        src_len
    }
}

// ── Factory ──────────────────────────────────────────────────────────────────

/// Tagged transform variant produced by [`new_transform`].
pub enum Transform {
    None(NullTransform),
    Pack(Pack),
    Bwt(Bwt),
    Bwts(Bwts),
    Lz(LzCodec),
    Lzp(LzpCodec),
    Rolz(RolzCodec),
    Rolzx(RolzxCodec),
    Rlt(Rlt),
    Zrlt(Zrlt),
    Sbrt(Sbrt),
    Srt(Srt),
    Text(TextCodec),
    Fsd(Fsd),
    Exe(ExeCodec),
    Utf(UtfCodec),
}

/// Build the transform for a 6-bit stage id.
pub fn new_transform(id: u8, ctx: &Context) -> Result<Transform> {
    let _ = ctx;
    match id {
        NONE_ID => Ok(Transform::None(NullTransform)),
        PACK_ID => Ok(Transform::Pack(Pack::new())),
        BWT_ID => Ok(Transform::Bwt(Bwt::new())),
        BWTS_ID => Ok(Transform::Bwts(Bwts::new())),
        LZ_ID => Ok(Transform::Lz(LzCodec::new(false))),
        LZX_ID => Ok(Transform::Lz(LzCodec::new(true))),
        LZP_ID => Ok(Transform::Lzp(LzpCodec::new())),
        ROLZ_ID => Ok(Transform::Rolz(RolzCodec::new())),
        ROLZX_ID => Ok(Transform::Rolzx(RolzxCodec::new())),
        RLT_ID => Ok(Transform::Rlt(Rlt::new())),
        ZRLT_ID => Ok(Transform::Zrlt(Zrlt::new())),
        MTFT_ID => Ok(Transform::Sbrt(Sbrt::new(SbrtMode::Mtf))),
        RANK_ID => Ok(Transform::Sbrt(Sbrt::new(SbrtMode::Rank))),
        TS_ID => Ok(Transform::Sbrt(Sbrt::new(SbrtMode::TimeStamp))),
        SRT_ID => Ok(Transform::Srt(Srt::new())),
        TEXT_ID => Ok(Transform::Text(TextCodec::new())),
        MM_ID => Ok(Transform::Fsd(Fsd::new())),
        EXE_ID => Ok(Transform::Exe(ExeCodec::new())),
        UTF_ID => Ok(Transform::Utf(UtfCodec::new())),
        _ => Err(Error::invalid_param(format!("unknown transform id {id}"))),
    }
}

impl ByteTransform for Transform {
    fn forward(&mut self, ctx: &mut Context, src: &[u8], dst: &mut [u8]) -> Result<(usize, usize)> {
        match self {
            Transform::None(t) => t.forward(ctx, src, dst),
            Transform::Pack(t) => t.forward(ctx, src, dst),
            Transform::Bwt(t) => t.forward(ctx, src, dst),
            Transform::Bwts(t) => t.forward(ctx, src, dst),
            Transform::Lz(t) => t.forward(ctx, src, dst),
            Transform::Lzp(t) => t.forward(ctx, src, dst),
            Transform::Rolz(t) => t.forward(ctx, src, dst),
            Transform::Rolzx(t) => t.forward(ctx, src, dst),
            Transform::Rlt(t) => t.forward(ctx, src, dst),
            Transform::Zrlt(t) => t.forward(ctx, src, dst),
            Transform::Sbrt(t) => t.forward(ctx, src, dst),
            Transform::Srt(t) => t.forward(ctx, src, dst),
            Transform::Text(t) => t.forward(ctx, src, dst),
            Transform::Fsd(t) => t.forward(ctx, src, dst),
            Transform::Exe(t) => t.forward(ctx, src, dst),
            Transform::Utf(t) => t.forward(ctx, src, dst),
        }
    }

    fn inverse(&mut self, ctx: &mut Context, src: &[u8], dst: &mut [u8]) -> Result<(usize, usize)> {
        match self {
            Transform::None(t) => t.inverse(ctx, src, dst),
            Transform::Pack(t) => t.inverse(ctx, src, dst),
            Transform::Bwt(t) => t.inverse(ctx, src, dst),
            Transform::Bwts(t) => t.inverse(ctx, src, dst),
            Transform::Lz(t) => t.inverse(ctx, src, dst),
            Transform::Lzp(t) => t.inverse(ctx, src, dst),
            Transform::Rolz(t) => t.inverse(ctx, src, dst),
            Transform::Rolzx(t) => t.inverse(ctx, src, dst),
            Transform::Rlt(t) => t.inverse(ctx, src, dst),
            Transform::Zrlt(t) => t.inverse(ctx, src, dst),
            Transform::Sbrt(t) => t.inverse(ctx, src, dst),
            Transform::Srt(t) => t.inverse(ctx, src, dst),
            Transform::Text(t) => t.inverse(ctx, src, dst),
            Transform::Fsd(t) => t.inverse(ctx, src, dst),
            Transform::Exe(t) => t.inverse(ctx, src, dst),
            Transform::Utf(t) => t.inverse(ctx, src, dst),
        }
    }

    fn max_encoded_len(&self, src_len: usize) -> usize {
        match self {
            Transform::None(t) => t.max_encoded_len(src_len),
            Transform::Pack(t) => t.max_encoded_len(src_len),
            Transform::Bwt(t) => t.max_encoded_len(src_len),
            Transform::Bwts(t) => t.max_encoded_len(src_len),
            Transform::Lz(t) => t.max_encoded_len(src_len),
            Transform::Lzp(t) => t.max_encoded_len(src_len),
            Transform::Rolz(t) => t.max_encoded_len(src_len),
            Transform::Rolzx(t) => t.max_encoded_len(src_len),
            Transform::Rlt(t) => t.max_encoded_len(src_len),
            Transform::Zrlt(t) => t.max_encoded_len(src_len),
            Transform::Sbrt(t) => t.max_encoded_len(src_len),
            Transform::Srt(t) => t.max_encoded_len(src_len),
            Transform::Text(t) => t.max_encoded_len(src_len),
            Transform::Fsd(t) => t.max_encoded_len(src_len),
            Transform::Exe(t) => t.max_encoded_len(src_len),
            Transform::Utf(t) => t.max_encoded_len(src_len),
        }
    }
}

// ── Sequence ─────────────────────────────────────────────────────────────────

/// Linear composition of 1..=8 transforms with per-stage skip flags.
///
/// A stage is skipped when its forward call declines, consumes only part of
/// the input, or writes past its own declared bound. Stages that merely
/// permute or carry a mini-header (BWT, SBRT) stay within their bound by
/// construction; the compression codecs decline themselves when they cannot
/// beat their input.
pub struct Sequence {
    stages: Vec<(u8, Transform)>,
}

impl Sequence {
    /// Build from non-NONE stage ids, in forward order.
    pub fn new(ids: &[u8], ctx: &Context) -> Result<Sequence> {
        if ids.len() > MAX_STAGES {
            return Err(Error::invalid_param("too many transform stages"));
        }
        let stages = ids
            .iter()
            .map(|&id| new_transform(id, ctx).map(|t| (id, t)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Sequence { stages })
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Worst-case output length: the maximum over the member transforms.
    pub fn max_encoded_len(&self, src_len: usize) -> usize {
        self.stages
            .iter()
            .map(|(_, t)| t.max_encoded_len(src_len))
            .max()
            .unwrap_or(src_len)
    }

    /// Run the forward chain. Returns the transformed bytes and the skip
    /// flags (bit i set = stage i skipped, data passed through).
    pub fn forward(&mut self, ctx: &mut Context, src: &[u8]) -> Result<(Vec<u8>, u8)> {
        let cap = self.max_encoded_len(src.len()).max(src.len());
        let mut cur = Vec::with_capacity(cap);
        cur.extend_from_slice(src);
        let mut other = vec![0u8; cap];
        let mut skip_flags = 0u8;

        for (i, (_, t)) in self.stages.iter_mut().enumerate() {
            if other.len() < t.max_encoded_len(cur.len()) {
                other.resize(t.max_encoded_len(cur.len()), 0);
            }
            match t.forward(ctx, &cur, &mut other) {
                Ok((read, written))
                    if read == cur.len() && written <= t.max_encoded_len(cur.len()) =>
                {
                    other.truncate(written);
                    std::mem::swap(&mut cur, &mut other);
                    other.resize(cap.max(written), 0);
                }
                Ok(_) => {
                    // Partial consumption or expansion both mean pass-through.
                    skip_flags |= 1 << i;
                    other.resize(cap, 0);
                }
                Err(e) if e.is_skip() => {
                    skip_flags |= 1 << i;
                }
                Err(e) => return Err(e),
            }
        }
        Ok((cur, skip_flags))
    }

    /// Run the inverse chain (right to left) honoring `skip_flags`.
    /// `block_size` bounds every intermediate output.
    pub fn inverse(
        &mut self,
        ctx: &mut Context,
        src: &[u8],
        skip_flags: u8,
        block_size: usize,
    ) -> Result<Vec<u8>> {
        let cap = self.max_encoded_len(block_size).max(src.len());
        let mut cur = Vec::with_capacity(cap);
        cur.extend_from_slice(src);
        let mut other = vec![0u8; cap];

        for (i, (_, t)) in self.stages.iter_mut().enumerate().rev() {
            if skip_flags & (1 << i) != 0 {
                continue;
            }
            let (read, written) = t.inverse(ctx, &cur, &mut other)?;
            if read != cur.len() {
                return Err(Error::corruption("inverse transform left trailing bytes"));
            }
            other.truncate(written);
            std::mem::swap(&mut cur, &mut other);
            other.resize(cap, 0);
        }
        Ok(cur)
    }
}
