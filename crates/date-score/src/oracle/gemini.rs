use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use super::{Evaluation, OracleError, PlanSuggester, PlanSuggestion, ScoringOracle};
use crate::config::OracleConfig;
use crate::scoring::SubScores;

const EVALUATION_PROMPT: &str = r#"Grade the date plan below. Give each criterion an integer score from 0 to 100 in steps of 1:

1. age_appropriateness_score: how well the venue and activities suit the ages and occupations involved.
2. cost_effectiveness_score: whether the budget is reasonable for the people involved and worth the experience.
3. creativity_score: originality, thoughtful touches, and an element of surprise.
4. balance_score: sensible time allocation and a good mix of activities.
5. relationship_progress_score: how well the plan fits this stage of the relationship (which date number it is).

Then write a comment of at most 200 characters with concrete praise and suggestions. Be playful and a little cheeky, but kind and accurate. Never include sexual or offensive language.

If the plan itself contains sexual or otherwise inappropriate content, set refused to true and leave the comment empty.

Date plan:
"#;

const SUGGESTION_PROMPT: &str = r#"You are a seasoned date planner. Propose a concrete, practical date plan for the request below.

Return:
1. plan_title: at most 20 characters.
2. plan_description: the plan in detail, at most 300 characters.
3. estimated_cost: for example "5,000 to 8,000 yen per person".
4. duration: for example "3 hours", "half a day", "all day".
5. tips: one piece of advice for making the date a success, at most 100 characters.

If the request is vague, suggest a generally popular plan. Name real places when they exist, never invented ones, and take the season into account. Keep the tone friendly and fun. Only propose safe, wholesome plans.

Request:
"#;

/// Google Gemini `generateContent` client with structured JSON output.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawEvaluation {
    age_appropriateness_score: i32,
    cost_effectiveness_score: i32,
    creativity_score: i32,
    balance_score: i32,
    relationship_progress_score: i32,
    #[serde(default)]
    comment: String,
    #[serde(default)]
    refused: bool,
}

impl TryFrom<RawEvaluation> for Evaluation {
    type Error = OracleError;

    fn try_from(raw: RawEvaluation) -> Result<Self, Self::Error> {
        if raw.refused {
            return Err(OracleError::Refused(
                "plan flagged as inappropriate".to_string(),
            ));
        }

        Evaluation {
            scores: SubScores {
                age_appropriateness: raw.age_appropriateness_score,
                cost_effectiveness: raw.cost_effectiveness_score,
                creativity: raw.creativity_score,
                balance: raw.balance_score,
                relationship_progress: raw.relationship_progress_score,
            },
            comment: raw.comment,
        }
        .validated()
    }
}

fn evaluation_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "age_appropriateness_score": { "type": "INTEGER" },
            "cost_effectiveness_score": { "type": "INTEGER" },
            "creativity_score": { "type": "INTEGER" },
            "balance_score": { "type": "INTEGER" },
            "relationship_progress_score": { "type": "INTEGER" },
            "comment": { "type": "STRING" },
            "refused": { "type": "BOOLEAN" }
        },
        "required": [
            "age_appropriateness_score",
            "cost_effectiveness_score",
            "creativity_score",
            "balance_score",
            "relationship_progress_score",
            "comment"
        ]
    })
}

fn suggestion_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "plan_title": { "type": "STRING" },
            "plan_description": { "type": "STRING" },
            "estimated_cost": { "type": "STRING" },
            "duration": { "type": "STRING" },
            "tips": { "type": "STRING" }
        },
        "required": ["plan_title", "plan_description", "estimated_cost", "duration", "tips"]
    })
}

/// Concatenated text of the first candidate, or why there is none.
fn candidate_text(response: GenerateResponse) -> Result<String, OracleError> {
    if let Some(reason) = response
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason)
    {
        return Err(OracleError::Refused(reason));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| OracleError::Malformed("response has no candidates".to_string()))?;

    if candidate.finish_reason.as_deref() == Some("SAFETY") {
        return Err(OracleError::Refused("candidate blocked for safety".to_string()));
    }

    let text: String = candidate
        .content
        .map(|content| content.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|part| part.text)
        .collect();

    if text.trim().is_empty() {
        return Err(OracleError::Malformed("candidate has no text".to_string()));
    }
    Ok(text)
}

fn parse_structured<T: DeserializeOwned>(response: GenerateResponse) -> Result<T, OracleError> {
    let text = candidate_text(response)?;
    serde_json::from_str(text.trim()).map_err(|err| OracleError::Malformed(err.to_string()))
}

impl GeminiClient {
    pub fn new(config: &OracleConfig) -> Result<Self, OracleError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate<T: DeserializeOwned>(
        &self,
        prompt: &str,
        schema: Value,
    ) -> Result<T, OracleError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(OracleError::NotConfigured("GEMINI_API_KEY is not set"))?;

        let request = GenerateRequest {
            contents: [Content {
                role: "user",
                parts: [Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: schema,
            },
        };

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: GenerateResponse = response.json().await?;
        debug!(model = %self.model, candidates = body.candidates.len(), "gemini responded");
        parse_structured(body)
    }
}

#[async_trait]
impl ScoringOracle for GeminiClient {
    async fn evaluate(&self, plan_text: &str) -> Result<Evaluation, OracleError> {
        let prompt = format!("{EVALUATION_PROMPT}{plan_text}");
        let raw: RawEvaluation = self.generate(&prompt, evaluation_schema()).await?;
        Evaluation::try_from(raw)
    }
}

#[async_trait]
impl PlanSuggester for GeminiClient {
    async fn suggest(&self, request: &str) -> Result<PlanSuggestion, OracleError> {
        let prompt = format!("{SUGGESTION_PROMPT}{request}");
        self.generate(&prompt, suggestion_schema()).await
    }
}
