use serde::{Deserialize, Serialize};

/// A Letterboxd star rating: 0.5 to 5.0 in half-star steps
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct LetterboxdRating(f64);

impl LetterboxdRating {
    pub const MAX: f64 = 5.0;

    /// Validate a raw export score. Returns None outside 0-5 or off the half-star grid.
    pub fn new(score: f64) -> Option<Self> {
        if !score.is_finite() || !(0.0..=Self::MAX).contains(&score) {
            return None;
        }
        if (score * 2.0).fract() != 0.0 {
            return None;
        }
        Some(Self(score))
    }

    pub fn parse(raw: &str) -> Option<Self> {
        raw.trim().parse::<f64>().ok().and_then(Self::new)
    }

    pub fn stars(&self) -> f64 {
        self.0
    }

    /// Convert to Plex's 0-10 user rating scale
    pub fn to_plex_scale(&self) -> f64 {
        self.0 * 2.0
    }
}
