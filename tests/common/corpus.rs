//! Shared fixed corpus for the end-to-end tests: deterministic inputs
//! covering the data shapes the engine special-cases.

#![allow(dead_code)]

/// Deterministic pseudo-random bytes (64-bit LCG, fixed seed).
pub fn random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut state = seed;
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (state >> 56) as u8
        })
        .collect()
}

/// English-like text sample (cycled prose, word-heavy).
pub fn text_bytes(len: usize) -> Vec<u8> {
    b"The block engine slices the input into independent blocks and runs \
each one through a chain of reversible transforms before the entropy \
stage. Text like this compresses well because the dictionary and the \
Burrows Wheeler transform both thrive on repeated words. "
        .iter()
        .cycle()
        .take(len)
        .copied()
        .collect()
}

/// UTF-8 stress text mixing 1..4 byte sequences.
pub fn utf8_bytes(len: usize) -> Vec<u8> {
    "ASCII, Grüße aus München, καλημέρα κόσμε, 你好世界, 🚀🧭 — done. "
        .bytes()
        .cycle()
        .take(len)
        .collect()
}

/// Small synthetic ELF64 x86-64 object with relative calls.
pub fn x86_object() -> Vec<u8> {
    let mut code = Vec::new();
    for k in 0..120u32 {
        code.extend_from_slice(&[0x55, 0x48, 0x89, 0xE5, 0x90]);
        code.push(0xE8);
        code.extend_from_slice(&((k as i32 * 24) - 96).to_le_bytes());
        code.extend_from_slice(&[0x5D, 0xC3]);
    }
    code.resize(6 * 1024, 0x90);

    let code_off = 0x80usize;
    let shoff = code_off + code.len();
    let mut img = vec![0u8; shoff + 2 * 64];
    img[..4].copy_from_slice(b"\x7FELF");
    img[4] = 2;
    img[5] = 1;
    img[18..20].copy_from_slice(&0x3Eu16.to_le_bytes());
    img[0x28..0x30].copy_from_slice(&(shoff as u64).to_le_bytes());
    img[0x3A..0x3C].copy_from_slice(&64u16.to_le_bytes());
    img[0x3C..0x3E].copy_from_slice(&2u16.to_le_bytes());
    img[code_off..code_off + code.len()].copy_from_slice(&code);
    let s1 = shoff + 64;
    img[s1 + 0x08..s1 + 0x10].copy_from_slice(&4u64.to_le_bytes());
    img[s1 + 0x18..s1 + 0x20].copy_from_slice(&(code_off as u64).to_le_bytes());
    img[s1 + 0x20..s1 + 0x28].copy_from_slice(&(code.len() as u64).to_le_bytes());
    img
}

/// Header-less ARM64 code: alternating branches and nops.
pub fn arm64_object() -> Vec<u8> {
    let mut data = Vec::new();
    for k in 0..1200u32 {
        let imm = (k % 48).wrapping_sub(16) & 0x03FF_FFFF;
        let op = if k % 2 == 0 { 0x1400_0000u32 } else { 0x9400_0000 };
        data.extend_from_slice(&(op | imm).to_le_bytes());
        data.extend_from_slice(&0xD503_201Fu32.to_le_bytes());
    }
    data
}

/// WAV header followed by a smooth PCM ramp (multimedia shape).
pub fn wav_bytes(samples: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(44 + samples * 2);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&((36 + samples * 2) as u32).to_le_bytes());
    out.extend_from_slice(b"WAVEfmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&1u16.to_le_bytes()); // mono
    out.extend_from_slice(&44100u32.to_le_bytes());
    out.extend_from_slice(&88200u32.to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&((samples * 2) as u32).to_le_bytes());
    for i in 0..samples {
        let v = ((i as f64 / 37.0).sin() * 12000.0) as i16;
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}
