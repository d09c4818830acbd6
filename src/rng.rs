#[derive(Clone, Debug)]
pub struct Rng {
    seed: u32,
}

impl Rng {
    pub fn new(seed: u32) -> Self {
        Self { seed }
    }

    pub fn next_f64(&mut self) -> f64 {
        self.seed = self.seed.wrapping_add(0x6d2b79f5);
        let mut t = self.seed;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        let out = t ^ (t >> 14);
        out as f64 / 4_294_967_296.0
    }

    /// Bernoulli trial. Probabilities at or above 1.0 always succeed.
    pub fn chance(&mut self, probability: f64) -> bool {
        if probability <= 0.0 {
            return false;
        }
        self.next_f64() < probability
    }

    pub fn pick_index(&mut self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        (self.next_f64() * len as f64).floor().min((len - 1) as f64) as usize
    }

    pub fn range_u64(&mut self, min: u64, max: u64) -> u64 {
        if max <= min {
            return min;
        }
        let span = (max - min + 1) as f64;
        min + (self.next_f64() * span).floor() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_repeats_sequence() {
        let mut a = Rng::new(77);
        let mut b = Rng::new(77);
        for _ in 0..64 {
            assert_eq!(a.next_f64().to_bits(), b.next_f64().to_bits());
        }
    }

    #[test]
    fn pick_index_stays_in_bounds() {
        let mut rng = Rng::new(5);
        for _ in 0..1_000 {
            assert!(rng.pick_index(3) < 3);
        }
        assert_eq!(rng.pick_index(0), 0);
    }

    #[test]
    fn chance_edges_are_deterministic() {
        let mut rng = Rng::new(9);
        for _ in 0..200 {
            assert!(!rng.chance(0.0));
            assert!(rng.chance(1.0));
        }
    }

    #[test]
    fn range_u64_is_inclusive() {
        let mut rng = Rng::new(11);
        let mut saw_min = false;
        let mut saw_max = false;
        for _ in 0..2_000 {
            let value = rng.range_u64(2, 4);
            assert!((2..=4).contains(&value));
            saw_min |= value == 2;
            saw_max |= value == 4;
        }
        assert!(saw_min && saw_max);
    }
}
