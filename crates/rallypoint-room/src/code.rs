//! Room join codes.

use rand::Rng;
use rallypoint_protocol::RoomCode;

use crate::CoordinatorConfig;

/// Produces candidate room codes.
///
/// Generators need not guarantee uniqueness; the registry retries until it
/// draws a code no live room holds.
pub trait CodeGenerator: Send + Sync + 'static {
    fn generate(&self) -> RoomCode;
}

/// Uniform random codes over a fixed alphabet.
#[derive(Debug, Clone)]
pub struct RandomCodeGenerator {
    alphabet: Vec<char>,
    length: usize,
}

impl RandomCodeGenerator {
    /// # Panics
    ///
    /// Panics if `alphabet` is empty.
    pub fn new(alphabet: &str, length: usize) -> Self {
        let alphabet: Vec<char> = alphabet.chars().collect();
        assert!(!alphabet.is_empty(), "code alphabet must not be empty");
        Self { alphabet, length }
    }

    /// Uses the config's alphabet and length. Expects a validated config.
    pub fn from_config(config: &CoordinatorConfig) -> Self {
        Self::new(&config.code_alphabet, config.code_length)
    }
}

impl CodeGenerator for RandomCodeGenerator {
    fn generate(&self) -> RoomCode {
        let mut rng = rand::rng();
        let code: String = (0..self.length)
            .map(|_| self.alphabet[rng.random_range(0..self.alphabet.len())])
            .collect();
        RoomCode::new(code)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::config::DEFAULT_CODE_ALPHABET;

    #[test]
    fn test_codes_use_alphabet_and_length() {
        let generator = RandomCodeGenerator::new(DEFAULT_CODE_ALPHABET, 6);
        for _ in 0..200 {
            let code = generator.generate();
            assert_eq!(code.as_str().len(), 6);
            assert!(code.as_str().chars().all(|c| DEFAULT_CODE_ALPHABET.contains(c)));
        }
    }

    #[test]
    fn test_default_alphabet_excludes_ambiguous_characters() {
        for c in ['I', 'O', '0', '1'] {
            assert!(!DEFAULT_CODE_ALPHABET.contains(c));
        }
    }

    #[test]
    fn test_codes_vary() {
        let generator = RandomCodeGenerator::from_config(&CoordinatorConfig::default());
        let codes: HashSet<RoomCode> = (0..50).map(|_| generator.generate()).collect();
        assert!(codes.len() > 1);
    }

    #[test]
    #[should_panic(expected = "must not be empty")]
    fn test_empty_alphabet_panics() {
        RandomCodeGenerator::new("", 6);
    }
}
