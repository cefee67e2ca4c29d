//! Seeded random number streams for `seed()` and `rand()`.

/// Independent linear-congruential streams, one per `seed()` call. Owned by
/// one parse session.
#[derive(Debug, Default, Clone)]
pub struct RandomGeneratorPool {
    streams: Vec<u32>,
}

impl RandomGeneratorPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new stream and return its handle.
    pub fn seed(&mut self, value: i64) -> usize {
        self.streams.push(value as u32);
        self.streams.len() - 1
    }

    /// Next value in `[0, 1]` from stream `handle`, or `None` if no such
    /// stream exists.
    pub fn next(&mut self, handle: usize) -> Option<f64> {
        let state = self.streams.get_mut(handle)?;
        *state = state.wrapping_mul(1_812_433_253).wrapping_add(12345);
        Some(f64::from(*state) / f64::from(u32::MAX))
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streams_are_independent_and_repeatable() {
        let mut pool = RandomGeneratorPool::new();
        let a = pool.seed(42);
        let b = pool.seed(42);
        let first = pool.next(a).expect("stream a");
        pool.next(a).expect("stream a");
        assert_eq!(pool.next(b), Some(first));
    }

    #[test]
    fn values_stay_in_unit_interval() {
        let mut pool = RandomGeneratorPool::new();
        let h = pool.seed(-7);
        for _ in 0..1000 {
            let v = pool.next(h).expect("stream");
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn unknown_stream() {
        let mut pool = RandomGeneratorPool::new();
        assert_eq!(pool.next(0), None);
    }

    #[test]
    fn known_first_value() {
        let mut pool = RandomGeneratorPool::new();
        let h = pool.seed(0);
        let expected = 12345.0 / f64::from(u32::MAX);
        assert_eq!(pool.next(h), Some(expected));
    }
}
