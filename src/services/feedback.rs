// src/services/feedback.rs
//
// Feedback generation for graded submissions. The primary implementation
// delegates to a Gemini-style generateContent endpoint; any failure falls
// back to local templates so the user never sees blank or error feedback.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::scoring::ScoreBreakdown;
use crate::models::mastery::MasteryLevel;

/// Human-readable feedback plus a recommended next step.
#[derive(Debug, Clone, Serialize)]
pub struct Feedback {
    pub feedback: String,
    pub next_step: String,
}

#[derive(Debug)]
pub enum FeedbackError {
    Http(String),
    /// Response did not match the required two-string-field schema.
    Schema(String),
}

impl fmt::Display for FeedbackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedbackError::Http(msg) => write!(f, "feedback call failed: {}", msg),
            FeedbackError::Schema(msg) => write!(f, "feedback response rejected: {}", msg),
        }
    }
}

impl std::error::Error for FeedbackError {}

/// Seam for the external text-generation collaborator. Exactly one attempt is
/// made per submission; callers recover from any error via [`fallback`].
#[async_trait]
pub trait FeedbackGenerator: Send + Sync {
    async fn generate(
        &self,
        topic_name: &str,
        breakdown: &ScoreBreakdown,
    ) -> Result<Feedback, FeedbackError>;
}

/// The strict output contract: exactly two non-empty string fields.
/// Unknown fields are a schema violation since the collaborator is untrusted.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FeedbackPayload {
    feedback: String,
    #[serde(rename = "nextStep")]
    next_step: String,
}

// --- Gemini-backed implementation -----------------------------------------

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

pub struct GeminiFeedback {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiFeedback {
    pub fn new(api_key: String, model: String, timeout: Duration) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_key,
            model,
        })
    }

    fn prompt(topic_name: &str, b: &ScoreBreakdown) -> String {
        format!(
            "Evaluate the student's mastery in {}. \
             Stats: Accuracy {:.0}%, Time Efficiency {:.0}%, consistency score {:.0}%, overall score {}. \
             Provide a concise analysis and a concrete next learning action.",
            topic_name, b.accuracy, b.time_efficiency, b.consistency, b.final_score
        )
    }
}

#[async_trait]
impl FeedbackGenerator for GeminiFeedback {
    async fn generate(
        &self,
        topic_name: &str,
        breakdown: &ScoreBreakdown,
    ) -> Result<Feedback, FeedbackError> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            self.model
        );

        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: Self::prompt(topic_name, breakdown),
                }],
            }],
            generation_config: serde_json::json!({
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "OBJECT",
                    "properties": {
                        "feedback": { "type": "STRING" },
                        "nextStep": { "type": "STRING" },
                    },
                    "required": ["feedback", "nextStep"],
                },
            }),
        };

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| FeedbackError::Http(e.to_string()))?
            .error_for_status()
            .map_err(|e| FeedbackError::Http(e.to_string()))?
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| FeedbackError::Http(e.to_string()))?;

        let text = response
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())
            .ok_or_else(|| FeedbackError::Schema("no candidate text".to_string()))?;

        validate_payload(text)
    }
}

/// Validates untrusted collaborator output against the two-field contract and
/// strips any markup before the text is stored or returned.
fn validate_payload(text: &str) -> Result<Feedback, FeedbackError> {
    let payload: FeedbackPayload =
        serde_json::from_str(text).map_err(|e| FeedbackError::Schema(e.to_string()))?;

    let feedback = ammonia::clean(&payload.feedback).trim().to_string();
    let next_step = ammonia::clean(&payload.next_step).trim().to_string();

    if feedback.is_empty() || next_step.is_empty() {
        return Err(FeedbackError::Schema("empty field after sanitization".to_string()));
    }

    Ok(Feedback {
        feedback,
        next_step,
    })
}

// --- Local deterministic fallback ------------------------------------------

const LOW_FEEDBACK: [&str; 3] = [
    "This topic has not clicked yet. Slow down and rebuild it from the basics.",
    "The fundamentals need more work before the details will stick.",
    "A tough round. Revisit the core ideas and try a shorter practice set.",
];

const MEDIUM_FEEDBACK: [&str; 3] = [
    "Solid progress. A few gaps remain between you and real fluency.",
    "You are past the basics; accuracy under time pressure is the next hurdle.",
    "Good grasp of the material, with room to tighten up the weaker questions.",
];

const HIGH_FEEDBACK: [&str; 3] = [
    "Excellent command of this topic. Keep the streak going.",
    "Strong, consistent performance across the board.",
    "You have mastered this material. Time to raise the difficulty.",
];

/// Deterministic local feedback, selected by level and keyed off the final
/// score so repeated identical submissions read the same.
pub fn fallback(topic_name: &str, breakdown: &ScoreBreakdown) -> Feedback {
    let pool = match breakdown.level {
        MasteryLevel::Low => &LOW_FEEDBACK,
        MasteryLevel::Medium => &MEDIUM_FEEDBACK,
        MasteryLevel::High => &HIGH_FEEDBACK,
    };
    let feedback = pool[(breakdown.final_score.max(0) as usize) % pool.len()].to_string();

    let next_step = match breakdown.level {
        MasteryLevel::Low => format!("Review the fundamentals of {}", topic_name),
        MasteryLevel::Medium => format!("Take a focused practice round on {}", topic_name),
        MasteryLevel::High => format!("Advance beyond {} to the next topic in your path", topic_name),
    };

    Feedback {
        feedback,
        next_step,
    }
}

/// Used when no API key is configured: always serves the local templates.
pub struct TemplateFeedback;

#[async_trait]
impl FeedbackGenerator for TemplateFeedback {
    async fn generate(
        &self,
        topic_name: &str,
        breakdown: &ScoreBreakdown,
    ) -> Result<Feedback, FeedbackError> {
        Ok(fallback(topic_name, breakdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scoring;

    fn breakdown(final_score: i64) -> ScoreBreakdown {
        ScoreBreakdown {
            accuracy: 50.0,
            time_efficiency: 50.0,
            consistency: 75.0,
            final_score,
            level: scoring::level_for(final_score),
            attempts: 1,
        }
    }

    #[test]
    fn valid_payload_is_accepted() {
        let fb = validate_payload(r#"{"feedback":"Good work","nextStep":"Keep going"}"#).unwrap();
        assert_eq!(fb.feedback, "Good work");
        assert_eq!(fb.next_step, "Keep going");
    }

    #[test]
    fn missing_or_extra_fields_are_schema_violations() {
        assert!(matches!(
            validate_payload(r#"{"feedback":"only one"}"#),
            Err(FeedbackError::Schema(_))
        ));
        assert!(matches!(
            validate_payload(r#"{"feedback":"a","nextStep":"b","extra":"c"}"#),
            Err(FeedbackError::Schema(_))
        ));
        assert!(matches!(
            validate_payload("not json at all"),
            Err(FeedbackError::Schema(_))
        ));
    }

    #[test]
    fn markup_only_fields_are_rejected() {
        let result = validate_payload(r#"{"feedback":"<script>x()</script>","nextStep":"ok"}"#);
        assert!(matches!(result, Err(FeedbackError::Schema(_))));
    }

    #[test]
    fn fallback_is_never_empty_for_any_level() {
        for score in [0, 39, 40, 74, 75, 100] {
            let fb = fallback("Circuit Theory", &breakdown(score));
            assert!(!fb.feedback.is_empty());
            assert!(!fb.next_step.is_empty());
        }
    }

    #[test]
    fn fallback_is_deterministic() {
        let a = fallback("Thermodynamics", &breakdown(73));
        let b = fallback("Thermodynamics", &breakdown(73));
        assert_eq!(a.feedback, b.feedback);
        assert_eq!(a.next_step, b.next_step);
    }
}
