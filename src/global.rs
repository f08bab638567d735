//! Histogram and classification helpers shared by the transforms and the
//! block engine: byte frequency counting, integer log2, a scaled first-order
//! entropy estimate, and the cheap content-type heuristics that feed
//! [`DataType`] into the per-block context.

use crate::types::DataType;

/// Integer log2 for `n >= 1` (floor).
#[inline]
pub fn log2(n: u64) -> u32 {
    debug_assert!(n > 0);
    63 - n.leading_zeros().min(63)
}

/// Fill `freqs` with the byte histogram of `data`.
pub fn compute_histogram(data: &[u8], freqs: &mut [u32; 256]) {
    freqs.fill(0);
    // Four independent lanes keep the counter updates off the same cache line
    // dependency chain; merged at the end.
    let mut f1 = [0u32; 256];
    let mut f2 = [0u32; 256];
    let mut f3 = [0u32; 256];
    let mut chunks = data.chunks_exact(4);
    for c in &mut chunks {
        freqs[c[0] as usize] += 1;
        f1[c[1] as usize] += 1;
        f2[c[2] as usize] += 1;
        f3[c[3] as usize] += 1;
    }
    for &b in chunks.remainder() {
        freqs[b as usize] += 1;
    }
    for i in 0..256 {
        freqs[i] += f1[i] + f2[i] + f3[i];
    }
}

/// First-order entropy of the histogram, scaled by 1024 (bits per byte in
/// [0, 8192]). Used by the multimedia transform to pick the best delta
/// distance and by skip heuristics.
pub fn first_order_entropy_1024(total: usize, freqs: &[u32; 256]) -> u32 {
    if total == 0 {
        return 0;
    }
    let n = total as f64;
    let mut sum = 0.0f64;
    for &f in freqs.iter() {
        if f == 0 {
            continue;
        }
        let p = f as f64 / n;
        sum -= p * p.log2();
    }
    (sum * 1024.0).round() as u32
}

// Symbols counted as "text-like" by the heuristics below: printable ASCII
// plus tab, LF and CR.
#[inline]
fn is_text_byte(b: u8) -> bool {
    (32..127).contains(&b) || b == b'\t' || b == b'\n' || b == b'\r'
}

/// Classify a block from its histogram. Returns `Undefined` when no cheap
/// signal fires; finer detection (UTF-8 validation, executable header
/// sniffing, delta sampling) belongs to the individual transforms.
pub fn detect_simple_type(total: usize, freqs: &[u32; 256]) -> DataType {
    if total == 0 {
        return DataType::Undefined;
    }

    let distinct = freqs.iter().filter(|&&f| f > 0).count();
    if distinct <= 4 {
        return DataType::SmallAlphabet;
    }

    // DNA: upper/lower nucleotide codes plus line breaks cover almost all
    // of the block and the alphabet stays tiny.
    let mut dna = 0u64;
    for &b in b"ACGTUNacgtun\r\n" {
        dna += freqs[b as usize] as u64;
    }
    if distinct <= 16 && dna * 100 >= total as u64 * 95 {
        return DataType::Dna;
    }

    // BASE64: the 64-symbol alphabet, padding and line breaks account for
    // (nearly) every byte.
    let mut b64 = freqs[b'=' as usize] as u64
        + freqs[b'+' as usize] as u64
        + freqs[b'/' as usize] as u64
        + freqs[b'\r' as usize] as u64
        + freqs[b'\n' as usize] as u64;
    for b in b'A'..=b'Z' {
        b64 += freqs[b as usize] as u64;
    }
    for b in b'a'..=b'z' {
        b64 += freqs[b as usize] as u64;
    }
    for b in b'0'..=b'9' {
        b64 += freqs[b as usize] as u64;
    }
    if b64 * 1000 >= total as u64 * 995 && freqs[b' ' as usize] == 0 {
        return DataType::Base64;
    }

    let mut text = 0u64;
    for (b, &f) in freqs.iter().enumerate() {
        if is_text_byte(b as u8) {
            text += f as u64;
        }
    }
    // Mostly printable with a credible space frequency reads as text; the
    // text codec still runs its own stricter validation.
    if text * 100 >= total as u64 * 85 && freqs[b' ' as usize] as u64 * 170 >= total as u64 {
        return DataType::Text;
    }
    if text * 100 < total as u64 * 20 {
        return DataType::Bin;
    }

    DataType::Undefined
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log2_powers() {
        assert_eq!(log2(1), 0);
        assert_eq!(log2(2), 1);
        assert_eq!(log2(4096), 12);
        assert_eq!(log2(u64::MAX), 63);
    }

    #[test]
    fn histogram_counts_every_byte() {
        let data = b"abracadabra";
        let mut freqs = [0u32; 256];
        compute_histogram(data, &mut freqs);
        assert_eq!(freqs[b'a' as usize], 5);
        assert_eq!(freqs[b'b' as usize], 2);
        assert_eq!(freqs[b'r' as usize], 2);
        assert_eq!(freqs.iter().map(|&f| f as usize).sum::<usize>(), data.len());
    }

    #[test]
    fn entropy_of_uniform_block() {
        let mut freqs = [0u32; 256];
        freqs.iter_mut().for_each(|f| *f = 16);
        // 256 equiprobable symbols: exactly 8 bits/byte.
        assert_eq!(first_order_entropy_1024(4096, &freqs), 8 * 1024);
    }

    #[test]
    fn detects_small_alphabet_and_dna() {
        let mut freqs = [0u32; 256];
        freqs[0] = 100;
        freqs[1] = 100;
        assert_eq!(detect_simple_type(200, &freqs), DataType::SmallAlphabet);

        let mut freqs = [0u32; 256];
        for &b in b"ACGT\n" {
            freqs[b as usize] = 1000;
        }
        freqs[b'R' as usize] = 2;
        assert_eq!(detect_simple_type(5002, &freqs), DataType::Dna);
    }
}
