//! Output filename stems that read like something a person or a camera made.

use chrono::{DateTime, Local};
use rand::seq::IndexedRandom;
use rand::Rng;

/// Prefixes commonly seen on camera and screen-recorder output.
pub const NAME_PREFIXES: &[&str] = &[
    "VID", "MOV", "clip", "video", "recording", "footage", "shot", "take",
];

const SUFFIX_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// How a stem is composed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameStyle {
    /// `20240131_142501_k3x9qa`
    Timestamp,
    /// `VID_8fk2ma0x1zq4`
    Prefixed,
    /// `q8x0c2mf7bza`
    Random,
}

impl NameStyle {
    pub const ALL: [NameStyle; 3] = [NameStyle::Timestamp, NameStyle::Prefixed, NameStyle::Random];
}

/// Generate a stem using the thread-local RNG and the current local time.
pub fn generate_stem() -> String {
    generate_stem_with(&mut rand::rng(), Local::now())
}

/// Generate a stem from the given RNG and clock reading.
pub fn generate_stem_with<R: Rng + ?Sized>(rng: &mut R, now: DateTime<Local>) -> String {
    let style = NameStyle::ALL
        .choose(rng)
        .copied()
        .unwrap_or(NameStyle::Random);
    stem_for_style(style, rng, now)
}

/// Build a stem in a specific style.
pub fn stem_for_style<R: Rng + ?Sized>(style: NameStyle, rng: &mut R, now: DateTime<Local>) -> String {
    match style {
        NameStyle::Timestamp => format!("{}_{}", now.format("%Y%m%d_%H%M%S"), random_suffix(rng, 6)),
        NameStyle::Prefixed => {
            let prefix = NAME_PREFIXES.choose(rng).copied().unwrap_or("clip");
            format!("{}_{}", prefix, random_suffix(rng, 12))
        }
        NameStyle::Random => random_suffix(rng, 12),
    }
}

/// Lowercase alphanumeric string of `len` characters.
fn random_suffix<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| SUFFIX_ALPHABET[rng.random_range(0..SUFFIX_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn fixed_now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 1, 31, 14, 25, 1).unwrap()
    }

    fn is_suffix_char(c: char) -> bool {
        c.is_ascii_lowercase() || c.is_ascii_digit()
    }

    #[test]
    fn test_timestamp_style() {
        let mut rng = StdRng::seed_from_u64(7);
        let stem = stem_for_style(NameStyle::Timestamp, &mut rng, fixed_now());

        let (stamp, suffix) = stem.rsplit_once('_').unwrap();
        assert_eq!(stamp, "20240131_142501");
        assert_eq!(suffix.len(), 6);
        assert!(suffix.chars().all(is_suffix_char));
    }

    #[test]
    fn test_prefixed_style() {
        let mut rng = StdRng::seed_from_u64(7);
        let stem = stem_for_style(NameStyle::Prefixed, &mut rng, fixed_now());

        let (prefix, suffix) = stem.split_once('_').unwrap();
        assert!(NAME_PREFIXES.contains(&prefix));
        assert_eq!(suffix.len(), 12);
        assert!(suffix.chars().all(is_suffix_char));
    }

    #[test]
    fn test_random_style() {
        let mut rng = StdRng::seed_from_u64(7);
        let stem = stem_for_style(NameStyle::Random, &mut rng, fixed_now());
        assert_eq!(stem.len(), 12);
        assert!(stem.chars().all(is_suffix_char));
    }

    #[test]
    fn test_seeded_generation_is_deterministic() {
        let a = generate_stem_with(&mut StdRng::seed_from_u64(42), fixed_now());
        let b = generate_stem_with(&mut StdRng::seed_from_u64(42), fixed_now());
        assert_eq!(a, b);
    }

    #[test]
    fn test_generated_stems_are_file_safe() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..64 {
            let stem = generate_stem_with(&mut rng, fixed_now());
            assert!(!stem.is_empty());
            assert!(stem.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
            assert_eq!(unmark_models::sanitize_filename(&stem), stem);
        }
    }
}
