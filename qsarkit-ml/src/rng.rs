//! Seeded pseudo-random numbers for splitting, bagging and initialisation.

/// Linear congruential generator (Knuth MMIX constants).
#[derive(Debug, Clone)]
pub(crate) struct LcgRng {
    state: u64,
}

impl LcgRng {
    pub(crate) fn new(seed: u64) -> Self {
        Self {
            state: seed.wrapping_add(1), // avoid zero state
        }
    }

    pub(crate) fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.state
    }

    /// Uniform integer in `0..bound`. `bound` must be non-zero.
    pub(crate) fn next_bounded(&mut self, bound: u64) -> u64 {
        // high bits of an LCG are far better distributed than the low ones
        (self.next_u64() >> 11) % bound
    }

    /// Uniform float in `[0, 1)`.
    pub(crate) fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform float in `[lo, hi)`.
    pub(crate) fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }

    /// Fisher-Yates shuffle.
    pub(crate) fn shuffle<T>(&mut self, data: &mut [T]) {
        for i in (1..data.len()).rev() {
            let j = self.next_bounded((i + 1) as u64) as usize;
            data.swap(i, j);
        }
    }

    /// `count` distinct values from `0..n`, in draw order.
    pub(crate) fn sample_without_replacement(&mut self, n: usize, count: usize) -> Vec<usize> {
        let count = count.min(n);
        let mut pool: Vec<usize> = (0..n).collect();
        for i in 0..count {
            let j = i + self.next_bounded((n - i) as u64) as usize;
            pool.swap(i, j);
        }
        pool.truncate(count);
        pool
    }

    /// Derive an independent seed, for handing to parallel workers.
    pub(crate) fn fork_seed(&mut self) -> u64 {
        self.next_u64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_seed() {
        let mut a = LcgRng::new(42);
        let mut b = LcgRng::new(42);
        for _ in 0..10 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn floats_in_unit_interval() {
        let mut rng = LcgRng::new(7);
        for _ in 0..1000 {
            let v = rng.next_f64();
            assert!((0.0..1.0).contains(&v));
        }
    }

    #[test]
    fn sample_is_distinct() {
        let mut rng = LcgRng::new(1);
        let mut s = rng.sample_without_replacement(20, 8);
        assert_eq!(s.len(), 8);
        s.sort_unstable();
        s.dedup();
        assert_eq!(s.len(), 8);
        assert!(s.iter().all(|&i| i < 20));
        assert_eq!(rng.sample_without_replacement(3, 10).len(), 3);
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let mut rng = LcgRng::new(3);
        let mut v: Vec<usize> = (0..50).collect();
        rng.shuffle(&mut v);
        let mut sorted = v.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
    }
}
