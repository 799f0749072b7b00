use crate::error::RegistryError;
use crate::types::SessionId;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
pub const SESSION_ID_LEN: usize = 6;

/// Draws before giving up on finding a free code. 36^6 codes make hitting
/// this a sign of a broken rng rather than a full registry.
pub const MAX_ATTEMPTS: usize = 64;

pub struct SessionIdGenerator {
    rng: StdRng,
}

impl SessionIdGenerator {
    /// Seeded once from the OS.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn candidate(&mut self) -> SessionId {
        let code = (0..SESSION_ID_LEN)
            .map(|_| ALPHABET[self.rng.random_range(0..ALPHABET.len())] as char)
            .collect::<String>();
        SessionId::new(code)
    }

    /// Draws candidates until one is not `taken`.
    pub fn allocate<F>(&mut self, taken: F) -> Result<SessionId, RegistryError>
    where
        F: Fn(&SessionId) -> bool,
    {
        for _ in 0..MAX_ATTEMPTS {
            let candidate = self.candidate();
            if !taken(&candidate) {
                return Ok(candidate);
            }
        }
        Err(RegistryError::IdSpaceExhausted)
    }
}

impl Default for SessionIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

pub fn is_well_formed(code: &str) -> bool {
    code.len() == SESSION_ID_LEN && code.bytes().all(|b| ALPHABET.contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::HashSet;

    #[test]
    fn it_draws_six_chars_from_alphabet() {
        let mut generator = SessionIdGenerator::new();
        for _ in 0..1000 {
            let id = generator.candidate();
            assert!(is_well_formed(id.as_str()), "{}", id);
        }
    }

    #[test]
    fn it_covers_the_whole_alphabet() {
        let mut generator = SessionIdGenerator::from_seed(42);
        let seen = (0..2000)
            .flat_map(|_| generator.candidate().as_str().bytes().collect::<Vec<_>>())
            .collect::<HashSet<_>>();
        assert_eq!(seen.len(), ALPHABET.len());
    }

    #[test]
    fn it_is_deterministic_for_a_seed() {
        let mut a = SessionIdGenerator::from_seed(7);
        let mut b = SessionIdGenerator::from_seed(7);
        assert_eq!(a.candidate(), b.candidate());
    }

    #[test]
    fn it_redraws_on_collision() {
        let mut generator = SessionIdGenerator::from_seed(1);
        let draws = Cell::new(0);
        let id = generator
            .allocate(|_| {
                draws.set(draws.get() + 1);
                draws.get() <= 3
            })
            .expect("");
        assert_eq!(draws.get(), 4);
        assert!(is_well_formed(id.as_str()));
    }

    #[test]
    fn it_fails_after_max_attempts() {
        let mut generator = SessionIdGenerator::from_seed(1);
        let draws = Cell::new(0);
        let result = generator.allocate(|_| {
            draws.set(draws.get() + 1);
            true
        });
        assert_eq!(result, Err(RegistryError::IdSpaceExhausted));
        assert_eq!(draws.get(), MAX_ATTEMPTS);
    }

    #[test]
    fn it_rejects_malformed_codes() {
        assert!(is_well_formed("ab12cd"));
        assert!(!is_well_formed("ab12c"));
        assert!(!is_well_formed("AB12CD"));
        assert!(!is_well_formed("ab-2cd"));
    }
}
