//! Suffix array construction (SA-IS, linear time).
//!
//! The induced-sorting algorithm runs over the text plus a virtual sentinel
//! smaller than every symbol; the sentinel is never materialized: symbol
//! accessors shift the alphabet up by one and position `n` reads as 0.
//! Recursion levels operate on the reduced `u32` name strings through the
//! same accessor trait.

/// Text access for the two levels of the recursion.
pub trait SaisText {
    fn len(&self) -> usize;
    fn at(&self, i: usize) -> usize;
}

impl SaisText for &[u8] {
    #[inline]
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }
    #[inline]
    fn at(&self, i: usize) -> usize {
        self[i] as usize
    }
}

impl SaisText for &[u32] {
    #[inline]
    fn len(&self) -> usize {
        <[u32]>::len(self)
    }
    #[inline]
    fn at(&self, i: usize) -> usize {
        self[i] as usize
    }
}

const EMPTY: u32 = u32::MAX;

/// Suffix array of `text` (positions of sorted suffixes, no sentinel entry).
pub fn suffix_array(text: &[u8]) -> Vec<u32> {
    if text.is_empty() {
        return Vec::new();
    }
    let sa1 = sais(&text, 256);
    // Entry 0 is the virtual sentinel suffix.
    sa1[1..].to_vec()
}

fn sais<T: SaisText + Copy>(text: &T, sigma: usize) -> Vec<u32> {
    let n = text.len();
    let n1 = n + 1; // includes the sentinel position
    let sig1 = sigma + 1;
    let ch = |i: usize| if i == n { 0 } else { text.at(i) + 1 };

    // Suffix types: S-type iff smaller suffix follows.
    let mut is_s = vec![false; n1];
    is_s[n] = true;
    for i in (0..n).rev() {
        is_s[i] = ch(i) < ch(i + 1) || (ch(i) == ch(i + 1) && is_s[i + 1]);
    }
    let is_lms = |i: usize| i > 0 && is_s[i] && !is_s[i - 1];

    let mut bkt = vec![0usize; sig1];
    for i in 0..n1 {
        bkt[ch(i)] += 1;
    }
    let bucket_tails = |bkt: &[usize]| {
        let mut tails = vec![0usize; sig1];
        let mut sum = 0usize;
        for c in 0..sig1 {
            sum += bkt[c];
            tails[c] = sum;
        }
        tails
    };
    let bucket_heads = |bkt: &[usize]| {
        let mut heads = vec![0usize; sig1];
        let mut sum = 0usize;
        for c in 0..sig1 {
            heads[c] = sum;
            sum += bkt[c];
        }
        heads
    };

    let induce = |sa: &mut [u32]| {
        // L-type, left to right.
        let mut heads = bucket_heads(&bkt);
        for k in 0..n1 {
            let v = sa[k];
            if v != EMPTY && v > 0 {
                let j = v as usize - 1;
                if !is_s[j] {
                    sa[heads[ch(j)]] = j as u32;
                    heads[ch(j)] += 1;
                }
            }
        }
        // S-type, right to left.
        let mut tails = bucket_tails(&bkt);
        for k in (0..n1).rev() {
            let v = sa[k];
            if v != EMPTY && v > 0 {
                let j = v as usize - 1;
                if is_s[j] {
                    tails[ch(j)] -= 1;
                    sa[tails[ch(j)]] = j as u32;
                }
            }
        }
    };

    // First round: seed with LMS positions in arbitrary order, induce.
    let mut sa = vec![EMPTY; n1];
    {
        let mut tails = bucket_tails(&bkt);
        for i in 1..n1 {
            if is_lms(i) {
                tails[ch(i)] -= 1;
                sa[tails[ch(i)]] = i as u32;
            }
        }
        induce(&mut sa);
    }

    // Name the LMS substrings in their induced order.
    let lms_count = (1..n1).filter(|&i| is_lms(i)).count();
    let mut name_of = vec![EMPTY; n1];
    let mut names = 0u32;
    {
        let lms_end = |i: usize| {
            // Exclusive end of the LMS substring starting at i.
            let mut j = i + 1;
            while j < n1 && !is_lms(j) {
                j += 1;
            }
            j.min(n1 - 1)
        };
        let mut prev: Option<usize> = None;
        for k in 0..n1 {
            let v = sa[k] as usize;
            if v == 0 || sa[k] == EMPTY || !is_lms(v) {
                continue;
            }
            let same = match prev {
                None => false,
                Some(p) => {
                    let (pe, ve) = (lms_end(p), lms_end(v));
                    ve - v == pe - p && {
                        let mut eq = true;
                        for d in 0..=(ve - v) {
                            if ch(p + d) != ch(v + d) || is_s[p + d] != is_s[v + d] {
                                eq = false;
                                break;
                            }
                        }
                        eq
                    }
                }
            };
            if !same {
                names += 1;
            }
            name_of[v] = names - 1;
            prev = Some(v);
        }
    }

    // Reduced string: names of LMS substrings in text order (sentinel LMS
    // excluded; it always sorts first on its own).
    let lms_positions: Vec<usize> = (1..n1).filter(|&i| is_lms(i)).collect();
    let reduced: Vec<u32> = lms_positions.iter().map(|&i| name_of[i]).collect();

    // Order of LMS suffixes, as indexes into lms_positions.
    let lms_order: Vec<u32> = if names as usize == lms_count {
        // Names unique: order falls directly out of the names.
        let mut order = vec![0u32; lms_count];
        for (pos_idx, &name) in reduced.iter().enumerate() {
            order[name as usize] = pos_idx as u32;
        }
        order
    } else {
        let red = sais(&reduced.as_slice(), names as usize);
        red[1..].to_vec()
    };

    // Final round: seed with LMS suffixes in sorted order, induce.
    sa.fill(EMPTY);
    let mut tails = bucket_tails(&bkt);
    for &oi in lms_order.iter().rev() {
        let i = lms_positions[oi as usize];
        tails[ch(i)] -= 1;
        sa[tails[ch(i)]] = i as u32;
    }
    induce(&mut sa);
    sa
}
