//! Built-in prompts for "surprise me" and variation requests

use rand::seq::SliceRandom;
use rand::Rng;

const FALLBACK_PROMPT: &str = "surprise me with something creative";

pub const SURPRISE_PROMPTS: &[&str] = &[
    // Traditional
    "warm blues overdrive with vintage character",
    "clean jazz tone with subtle compression",
    "heavy metal with tight gate and aggressive distortion",
    "classic rock crunch with mid boost",
    "country twang with slapback delay",
    // Abstract
    "ethereal floating soundscape",
    "underwater dreams with heavy modulation",
    "broken radio transmission from space",
    "crystalline sparkles in a cathedral",
    "industrial machinery grinding",
    "cosmic voyage through nebula",
    "glitchy digital decay",
    "haunting whispers in fog",
    "alien communication signals",
    "melting synthesizer textures",
    "frozen time crystals",
    "electric storm in desert",
    "digital ghosts in machine",
    "liquid mercury flowing",
    "neon lights reflecting in rain",
    // Hybrid
    "vintage meets futuristic",
    "organic meets synthetic",
    "chaos meets order",
    "darkness meets light",
    "ancient meets modern",
    "earth meets space",
    "fire meets ice",
    "analog meets digital",
];

const MODIFIERS: &[&str] = &[
    "more aggressive",
    "softer",
    "brighter",
    "darker",
    "warmer",
    "cooler",
    "with more reverb",
    "drier",
    "with delay",
    "compressed",
    "open",
    "tighter",
    "looser",
    "vintage",
    "modern",
    "experimental",
];

const STYLES: &[&str] = &[
    "shoegaze",
    "post-rock",
    "ambient",
    "industrial",
    "dreamy",
    "ethereal",
    "gritty",
    "clean",
    "saturated",
    "crystalline",
];

const SUFFIXES: &[&str] = &[
    " with subtle changes",
    " alternative version",
    " different approach",
    " creative twist",
    " unique interpretation",
];

const MODIFIER_CHANCE: f64 = 1.0 / 3.0;
const STYLE_CHANCE: f64 = 0.25;

pub fn surprise_prompt<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    SURPRISE_PROMPTS.choose(rng).copied().unwrap_or(FALLBACK_PROMPT)
}

/// `count` variations of `base`
///
/// Each may gain a modifier and a style, and always ends with a suffix.
pub fn variation_prompts<R: Rng + ?Sized>(base: &str, count: usize, rng: &mut R) -> Vec<String> {
    (0..count)
        .map(|_| {
            let mut prompt = base.to_string();
            if rng.gen_bool(MODIFIER_CHANCE) {
                if let Some(modifier) = MODIFIERS.choose(rng) {
                    prompt.push_str(", ");
                    prompt.push_str(modifier);
                }
            }
            if rng.gen_bool(STYLE_CHANCE) {
                if let Some(style) = STYLES.choose(rng) {
                    prompt.push_str(", ");
                    prompt.push_str(style);
                }
            }
            if let Some(suffix) = SUFFIXES.choose(rng) {
                prompt.push_str(suffix);
            }
            prompt
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn variations_extend_the_base() {
        let mut rng = StdRng::seed_from_u64(7);
        let prompts = variation_prompts("glassy clean", 20, &mut rng);
        assert_eq!(prompts.len(), 20);
        for prompt in &prompts {
            assert!(prompt.starts_with("glassy clean"));
            assert!(SUFFIXES.iter().any(|suffix| prompt.ends_with(suffix)));
        }
    }

    #[test]
    fn zero_variations() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(variation_prompts("anything", 0, &mut rng).is_empty());
    }

    #[test]
    fn surprise_prompt_is_builtin() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..10 {
            assert!(SURPRISE_PROMPTS.contains(&surprise_prompt(&mut rng)));
        }
    }
}
