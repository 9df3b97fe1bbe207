/// Score assigned when the population cannot discriminate between plans.
pub const NEUTRAL_DEVIATION: i32 = 50;
pub const DEVIATION_FLOOR: i32 = 25;
pub const DEVIATION_CEILING: i32 = 75;

const SPREAD: f64 = 10.0;

/// Population mean and standard deviation (divided by N).
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PopulationStats {
    mean: f64,
    std_dev: f64,
}

impl PopulationStats {
    /// `None` when the population has at most one member or zero variance.
    pub(crate) fn from_scores(scores: &[i32]) -> Option<Self> {
        if scores.len() <= 1 {
            return None;
        }

        let count = scores.len() as f64;
        let mean = scores.iter().map(|&score| f64::from(score)).sum::<f64>() / count;
        let variance = scores
            .iter()
            .map(|&score| (f64::from(score) - mean).powi(2))
            .sum::<f64>()
            / count;
        let std_dev = variance.sqrt();

        if std_dev == 0.0 {
            return None;
        }

        Some(Self { mean, std_dev })
    }

    pub(crate) fn deviation(&self, target: i32) -> i32 {
        let raw = 50.0 + (f64::from(target) - self.mean) / self.std_dev * SPREAD;
        let bounded = raw.clamp(f64::from(DEVIATION_FLOOR), f64::from(DEVIATION_CEILING));
        (bounded + 0.5).floor() as i32
    }
}

/// Population-relative score for `target`, clamped to `[25, 75]` and rounded
/// half up. Degenerate populations map to [`NEUTRAL_DEVIATION`].
pub fn normalize(population: &[i32], target: i32) -> i32 {
    match PopulationStats::from_scores(population) {
        Some(stats) => stats.deviation(target),
        None => NEUTRAL_DEVIATION,
    }
}
