//! Keystroke planning
//!
//! A typing plan is generated up front from the input text and an error
//! probability, then replayed against the page. Keeping the plan pure makes
//! the typo distribution testable without a browser.

use std::time::Duration;

use rand::Rng;

const TYPO_POOL: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

/// Keystroke timing and error parameters.
#[derive(Debug, Clone, Copy)]
pub struct TypingCadence {
    /// Lower bound of the per-character delay
    pub min_delay: Duration,
    /// Upper bound of the per-character delay
    pub max_delay: Duration,
    /// Probability of fumbling a character (never the first one)
    pub error_rate: f64,
}

impl Default for TypingCadence {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(80),
            max_delay: Duration::from_millis(250),
            error_rate: 0.02,
        }
    }
}

/// A single planned keystroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keystroke {
    /// Emit the character directly
    Plain(char),
    /// Emit `wrong`, backspace it, then emit `intended`
    Fumbled { wrong: char, intended: char },
}

impl Keystroke {
    /// The character this keystroke ultimately leaves in the field.
    pub fn intended(&self) -> char {
        match *self {
            Keystroke::Plain(c) => c,
            Keystroke::Fumbled { intended, .. } => intended,
        }
    }
}

/// Ordered per-character action plan for one string, consumed once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypingPlan {
    strokes: Vec<Keystroke>,
}

impl TypingPlan {
    /// Plan keystrokes for `text`. Each character after the first is
    /// fumbled with probability `error_rate`.
    pub fn generate<R: Rng>(text: &str, error_rate: f64, rng: &mut R) -> Self {
        let error_rate = error_rate.clamp(0.0, 1.0);
        let strokes = text
            .chars()
            .enumerate()
            .map(|(i, ch)| {
                if i > 0 && rng.gen_bool(error_rate) {
                    let wrong = TYPO_POOL[rng.gen_range(0..TYPO_POOL.len())] as char;
                    Keystroke::Fumbled {
                        wrong,
                        intended: ch,
                    }
                } else {
                    Keystroke::Plain(ch)
                }
            })
            .collect();
        Self { strokes }
    }

    pub fn strokes(&self) -> &[Keystroke] {
        &self.strokes
    }

    pub fn len(&self) -> usize {
        self.strokes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_zero_error_rate_is_all_plain() {
        let mut rng = StdRng::seed_from_u64(1);
        let plan = TypingPlan::generate("hello world", 0.0, &mut rng);

        assert_eq!(plan.len(), "hello world".chars().count());
        for (stroke, ch) in plan.strokes().iter().zip("hello world".chars()) {
            assert_eq!(*stroke, Keystroke::Plain(ch));
        }
    }

    #[test]
    fn test_full_error_rate_fumbles_everything_but_first() {
        let mut rng = StdRng::seed_from_u64(1);
        let plan = TypingPlan::generate("abcdef", 1.0, &mut rng);

        assert_eq!(plan.strokes()[0], Keystroke::Plain('a'));
        for stroke in &plan.strokes()[1..] {
            assert!(matches!(stroke, Keystroke::Fumbled { .. }));
        }
    }

    #[test]
    fn test_intended_characters_reconstruct_text() {
        let mut rng = StdRng::seed_from_u64(9);
        let plan = TypingPlan::generate("secret phrase", 0.5, &mut rng);
        let typed: String = plan.strokes().iter().map(Keystroke::intended).collect();
        assert_eq!(typed, "secret phrase");
    }

    #[test]
    fn test_wrong_characters_come_from_typo_pool() {
        let mut rng = StdRng::seed_from_u64(3);
        let plan = TypingPlan::generate("0123456789", 1.0, &mut rng);
        for stroke in plan.strokes() {
            if let Keystroke::Fumbled { wrong, .. } = stroke {
                assert!(wrong.is_ascii_lowercase());
            }
        }
    }

    #[test]
    fn test_empty_text() {
        let mut rng = StdRng::seed_from_u64(1);
        let plan = TypingPlan::generate("", 1.0, &mut rng);
        assert!(plan.is_empty());
    }

    #[test]
    fn test_deterministic_under_seed() {
        let a = TypingPlan::generate("same text", 0.3, &mut StdRng::seed_from_u64(4));
        let b = TypingPlan::generate("same text", 0.3, &mut StdRng::seed_from_u64(4));
        assert_eq!(a, b);
    }
}
