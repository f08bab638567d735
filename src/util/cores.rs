//! Logical core counting and the default worker count.

/// Number of logical CPU cores, at least 1.
pub fn count_cores() -> usize {
    num_cpus::get().max(1)
}

/// Default job count: half the logical cores, clamped to [1, 64].
pub fn default_jobs() -> usize {
    (count_cores() / 2).clamp(1, 64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_least_one_core() {
        assert!(count_cores() >= 1);
        assert!((1..=64).contains(&default_jobs()));
    }
}
