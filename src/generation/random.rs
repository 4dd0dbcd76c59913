// Random generation - Bernoulli trial per voice per step

use crate::sequencer::Voice;
use crate::sequencer::pattern::Pattern;
use rand::Rng;

/// Seed followed by random steps up to `total_len`
///
/// Every voice is included at every generated step with probability
/// `probability`, independently.
pub fn random_pattern<R: Rng + ?Sized>(
    seed: &Pattern,
    voices: &[Voice],
    total_len: usize,
    probability: f64,
    rng: &mut R,
) -> Pattern {
    let probability = probability.clamp(0.0, 1.0);
    let mut pattern = seed.extended_to(total_len);
    for step in seed.len()..total_len {
        for &voice in voices {
            if rng.gen_bool(probability) {
                pattern.insert(step, voice);
            }
        }
    }
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_seed_is_kept() {
        let seed = Pattern::from_steps(vec![vec![36], vec![], vec![38]]);
        let mut rng = StdRng::seed_from_u64(7);
        let pattern = random_pattern(&seed, &[36, 38, 42], 16, 0.5, &mut rng);

        assert_eq!(pattern.len(), 16);
        assert_eq!(pattern.slice(0..3), seed);
    }

    #[test]
    fn test_probability_bounds() {
        let seed = Pattern::new(6);
        let mut rng = StdRng::seed_from_u64(1);

        let empty = random_pattern(&seed, &[36, 38], 16, 0.0, &mut rng);
        assert_eq!(empty.note_count(), 0);

        let full = random_pattern(&seed, &[36, 38], 16, 1.0, &mut rng);
        assert_eq!(full.note_count(), 20);
        assert!(full.step(0).is_empty());
    }

    #[test]
    fn test_density_is_roughly_probability() {
        let seed = Pattern::new(6);
        let mut rng = StdRng::seed_from_u64(42);
        let voices: Vec<Voice> = vec![36, 38, 42, 46, 45, 48, 50, 49, 51];

        let total: usize = (0..200)
            .map(|_| random_pattern(&seed, &voices, 16, 0.15, &mut rng).note_count())
            .sum();
        let density = total as f64 / (200.0 * 10.0 * 9.0);
        assert!((density - 0.15).abs() < 0.02, "density {}", density);
    }
}
