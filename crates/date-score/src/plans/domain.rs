use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

pub use crate::scoring::PlanId;
use crate::scoring::SubScores;

/// Identifier wrapper for user comments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommentId(pub i64);

/// Something a device can like, or a comment can hang off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Plan(PlanId),
    Comment(CommentId),
}

impl Target {
    pub fn label(&self) -> &'static str {
        match self {
            Target::Plan(_) => "date plan",
            Target::Comment(_) => "comment",
        }
    }

    pub fn raw_id(&self) -> i64 {
        match self {
            Target::Plan(id) => id.0,
            Target::Comment(id) => id.0,
        }
    }
}

/// Date plan form as posted by the client. Every field is free text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSubmission {
    pub age: String,
    pub occupation: String,
    pub gender: String,
    pub date: String,
    pub day_of_week: String,
    pub time_of_day: String,
    pub date_number: String,
    pub location: String,
    pub cost: String,
    pub additional_notes: String,
}

impl PlanSubmission {
    fn fields(&self) -> [&str; 10] {
        [
            &self.age,
            &self.occupation,
            &self.gender,
            &self.date,
            &self.day_of_week,
            &self.time_of_day,
            &self.date_number,
            &self.location,
            &self.cost,
            &self.additional_notes,
        ]
    }

    /// Every field joined with single spaces; the text the content filter sees.
    pub fn joined_text(&self) -> String {
        self.fields().join(" ").trim().to_string()
    }

    pub fn cost_display(&self) -> String {
        let cost = self.cost.trim();
        if cost.is_empty() || cost == "0" {
            "0 yen".to_string()
        } else {
            format!("{cost} yen")
        }
    }

    pub fn date_time(&self) -> String {
        format!("{} ({}) {}", self.date, self.day_of_week, self.time_of_day)
    }

    /// Labelled description sent to the oracle and stored as the plan text.
    pub fn render_plan_text(&self) -> String {
        [
            format!("Age: {}", self.age),
            format!("Occupation: {}", self.occupation),
            format!("Gender: {}", self.gender),
            format!("Date and time: {}", self.date_time()),
            format!("Date number: {}", self.date_number),
            format!("Cost: {}", self.cost_display()),
            format!("Location: {}", self.location),
            format!("Notes: {}", self.additional_notes),
        ]
        .join("\n")
    }

    pub fn metadata(&self) -> PlanMetadata {
        PlanMetadata {
            age: self.age.clone(),
            occupation: self.occupation.clone(),
            gender: self.gender.clone(),
            date_time: self.date_time(),
            date_number: self.date_number.clone(),
            location: self.location.clone(),
            cost: self.cost_display(),
            additional_notes: self.additional_notes.clone(),
        }
    }
}

/// Descriptive fields stored alongside a plan. Never read by the scoring core.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanMetadata {
    pub age: String,
    pub occupation: String,
    pub gender: String,
    pub date_time: String,
    pub date_number: String,
    pub location: String,
    pub cost: String,
    pub additional_notes: String,
}

/// Plan ready for insertion. `provisional_score` holds the composite until the
/// next recalculation pass replaces it.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPlan {
    pub plan: String,
    pub comment: String,
    pub sub_scores: SubScores,
    pub provisional_score: i32,
    pub metadata: PlanMetadata,
    pub created_at: DateTime<Utc>,
}

/// Plan row as returned by keyword search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanSummary {
    pub id: PlanId,
    pub plan: String,
    pub score: i32,
    pub comment: String,
    #[serde(flatten)]
    pub metadata: PlanMetadata,
}

/// Leaderboard row: the summary plus grades and like count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedPlan {
    #[serde(flatten)]
    pub summary: PlanSummary,
    pub age_appropriateness_score: i32,
    pub cost_effectiveness_score: i32,
    pub creativity_score: i32,
    pub balance_score: i32,
    pub relationship_progress_score: i32,
    pub like_count: i64,
}

impl RankedPlan {
    pub fn new(summary: PlanSummary, sub_scores: SubScores, like_count: i64) -> Self {
        Self {
            summary,
            age_appropriateness_score: sub_scores.age_appropriateness,
            cost_effectiveness_score: sub_scores.cost_effectiveness,
            creativity_score: sub_scores.creativity,
            balance_score: sub_scores.balance,
            relationship_progress_score: sub_scores.relationship_progress,
            like_count,
        }
    }

    pub fn id(&self) -> PlanId {
        self.summary.id
    }

    pub fn score(&self) -> i32 {
        self.summary.score
    }
}

/// Response to a scored submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredPlan {
    #[serde(skip)]
    pub id: PlanId,
    pub score: i32,
    pub comment: String,
    pub plan: String,
    pub detailed_scores: SubScores,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommentSubmission {
    pub username: String,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    pub plan_id: PlanId,
    pub username: String,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

/// Comment as listed under a plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanComment {
    pub id: CommentId,
    pub username: String,
    pub comment: String,
    #[serde(serialize_with = "serialize_timestamp")]
    pub created_at: DateTime<Utc>,
    pub like_count: i64,
}

fn serialize_timestamp<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(&value.format("%Y-%m-%d %H:%M:%S"))
}

/// Outcome of a like toggle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LikeToggle {
    pub message: String,
    pub liked: bool,
    pub like_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LikeStatus {
    pub liked: bool,
    pub like_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn submission() -> PlanSubmission {
        PlanSubmission {
            age: "27".to_string(),
            occupation: "Engineer".to_string(),
            gender: "female".to_string(),
            date: "2025-11-08".to_string(),
            day_of_week: "Sat".to_string(),
            time_of_day: "evening".to_string(),
            date_number: "3".to_string(),
            location: "Riverside aquarium".to_string(),
            cost: "8000".to_string(),
            additional_notes: "Dinner reserved".to_string(),
        }
    }

    #[test]
    fn submission_accepts_camel_case_fields() {
        let payload = serde_json::json!({
            "age": "27", "occupation": "Engineer", "gender": "female",
            "date": "2025-11-08", "dayOfWeek": "Sat", "timeOfDay": "evening",
            "dateNumber": "3", "location": "Riverside aquarium", "cost": "8000",
            "additionalNotes": "Dinner reserved"
        });
        let parsed: PlanSubmission = serde_json::from_value(payload).expect("parses");
        assert_eq!(parsed, submission());
    }

    #[test]
    fn render_lists_every_field_with_cost_in_yen() {
        let text = submission().render_plan_text();
        assert!(text.contains("Date and time: 2025-11-08 (Sat) evening"));
        assert!(text.contains("Cost: 8000 yen"));
        assert!(text.ends_with("Notes: Dinner reserved"));
    }

    #[test]
    fn missing_cost_is_displayed_as_zero() {
        let mut free = submission();
        free.cost = " ".to_string();
        assert_eq!(free.cost_display(), "0 yen");
        free.cost = "0".to_string();
        assert_eq!(free.metadata().cost, "0 yen");
    }

    #[test]
    fn joined_text_covers_every_field() {
        let joined = submission().joined_text();
        assert!(joined.starts_with("27 Engineer female"));
        assert!(joined.ends_with("8000 Dinner reserved"));
    }

    #[test]
    fn ranked_plan_serializes_flat() {
        let summary = PlanSummary {
            id: PlanId(4),
            plan: "plan".to_string(),
            score: 61,
            comment: "nice".to_string(),
            metadata: submission().metadata(),
        };
        let row = RankedPlan::new(summary, SubScores::uniform(70), 2);
        let value = serde_json::to_value(&row).expect("serializes");
        assert_eq!(value["id"], 4);
        assert_eq!(value["score"], 61);
        assert_eq!(value["location"], "Riverside aquarium");
        assert_eq!(value["creativity_score"], 70);
        assert_eq!(value["like_count"], 2);
    }

    #[test]
    fn comment_timestamp_uses_second_precision() {
        let comment = PlanComment {
            id: CommentId(1),
            username: "mika".to_string(),
            comment: "cute".to_string(),
            created_at: Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap(),
            like_count: 0,
        };
        let value = serde_json::to_value(&comment).expect("serializes");
        assert_eq!(value["created_at"], "2025-03-04 05:06:07");
    }
}
