use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Chooses one reply out of an intent's candidates.
pub trait ResponsePicker: Send + Sync {
    fn pick<'a>(&self, responses: &'a [String]) -> Option<&'a str>;
}

/// Uniform choice backed by the thread-local RNG.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadRngPicker;

impl ResponsePicker for ThreadRngPicker {
    fn pick<'a>(&self, responses: &'a [String]) -> Option<&'a str> {
        responses.choose(&mut rand::thread_rng()).map(String::as_str)
    }
}

/// Uniform choice with a reproducible sequence for a given seed.
#[derive(Debug)]
pub struct SeededPicker {
    rng: Mutex<StdRng>,
}

impl SeededPicker {
    pub fn new(seed: u64) -> Self {
        Self { rng: Mutex::new(StdRng::seed_from_u64(seed)) }
    }
}

impl ResponsePicker for SeededPicker {
    fn pick<'a>(&self, responses: &'a [String]) -> Option<&'a str> {
        let mut rng = match self.rng.lock() {
            Ok(rng) => rng,
            Err(poisoned) => poisoned.into_inner(),
        };
        responses.choose(&mut *rng).map(String::as_str)
    }
}
