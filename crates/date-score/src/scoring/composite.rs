use serde::{Deserialize, Serialize};

/// Criterion weights in hundredths, in [`SubScores`] field order. They sum to 100.
pub const WEIGHTS: [i64; 5] = [20, 20, 25, 20, 15];

/// The five oracle grades for a plan, each nominally in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubScores {
    pub age_appropriateness: i32,
    pub cost_effectiveness: i32,
    pub creativity: i32,
    pub balance: i32,
    pub relationship_progress: i32,
}

impl SubScores {
    /// Neutral grades used whenever the oracle cannot produce real ones.
    pub const NEUTRAL: SubScores = SubScores::uniform(50);

    pub const fn uniform(value: i32) -> Self {
        Self {
            age_appropriateness: value,
            cost_effectiveness: value,
            creativity: value,
            balance: value,
            relationship_progress: value,
        }
    }

    pub fn as_array(&self) -> [i32; 5] {
        [
            self.age_appropriateness,
            self.cost_effectiveness,
            self.creativity,
            self.balance,
            self.relationship_progress,
        ]
    }

    pub fn composite(&self) -> i32 {
        composite(
            self.age_appropriateness,
            self.cost_effectiveness,
            self.creativity,
            self.balance,
            self.relationship_progress,
        )
    }
}

/// Weighted sum of the five grades, rounded half up.
///
/// Inputs are not clamped: out-of-range grades flow through the arithmetic.
/// The sum is computed in hundredths so ties such as `62.5` round exactly.
pub fn composite(age: i32, cost: i32, creativity: i32, balance: i32, relationship: i32) -> i32 {
    let weighted: i64 = [age, cost, creativity, balance, relationship]
        .iter()
        .zip(WEIGHTS)
        .map(|(&score, weight)| i64::from(score) * weight)
        .sum();

    // floor((x + 0.5)) with x = weighted / 100
    let rounded = (weighted + 50).div_euclid(100);
    rounded.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}
