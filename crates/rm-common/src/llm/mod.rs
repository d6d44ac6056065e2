//! Generation-backed match scoring.
//!
//! A single-turn prompt asks the model for `{"match_score": <0-100>,
//! "reason": "<text>"}`. Replies arrive as free text and must be normalized
//! before parsing: reasoning preambles behind a `</think>` marker are
//! discarded and code-fence wrappers are stripped. A reply that still does
//! not parse is re-requested a bounded number of times, then collapses to
//! the `NoScore` sentinel — the batch carries on without that candidate.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::MatcherConfig;

const THINK_MARKER: &str = "</think>";

#[derive(Debug, thiserror::Error)]
pub enum ScoreError {
    #[error("generation request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("generation service returned status {status}: {message}")]
    Service { status: u16, message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchScore {
    /// Compatibility score in [0, 100].
    pub score: f64,
    pub reason: String,
}

/// Outcome of one scoring attempt. `NoScore` is an explicit sentinel, not an
/// error: the candidate is skipped and the job continues.
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreOutcome {
    Scored(MatchScore),
    NoScore,
}

/// Seam for the generation service so tests can script replies.
pub trait ScoreClient: Send + Sync {
    async fn score(&self, job_summary: &str, candidate_text: &str)
    -> Result<ScoreOutcome, ScoreError>;
}

pub fn build_prompt(job_summary: &str, candidate_text: &str) -> String {
    format!(
        "Analyze the provided job description and candidate CV. Provide a match score (0-100) \
         and a brief reason for the score in JSON format.\n\
         Job Description: {job_summary}\n\
         Candidate CV: {candidate_text}\n\
         Only reply in json format don't add```json```:\n\
         Output JSON: {{\"match_score\": <score>, \"reason\": \"<reason>\"}}"
    )
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: DecodeOptions,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct DecodeOptions {
    temperature: f32,
    top_k: u32,
    top_p: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ScoreReply {
    match_score: f64,
    reason: String,
}

/// Drop any reasoning preamble and formatting tokens around the JSON payload.
fn normalize_reply(raw: &str) -> &str {
    let after_think = raw
        .rsplit(THINK_MARKER)
        .next()
        .unwrap_or(raw)
        .trim();

    let text = after_think.trim_start_matches("```").trim_end_matches("```");
    let text = text.trim();
    let text = text.strip_prefix("json").unwrap_or(text);
    text.trim()
}

/// Parse a normalized reply into a score, or `None` when the payload is not
/// JSON or misses a required field.
fn parse_score(raw: &str) -> Option<MatchScore> {
    let reply: ScoreReply = serde_json::from_str(normalize_reply(raw)).ok()?;
    if !reply.match_score.is_finite() {
        return None;
    }

    Some(MatchScore {
        score: reply.match_score.clamp(0.0, 100.0),
        reason: reply.reason,
    })
}

/// Scores pairs through an Ollama-compatible `/api/chat` endpoint with
/// low-temperature, bounded top-k/top-p decoding.
pub struct OllamaClient {
    client: Client,
    endpoint: String,
    model: String,
    options: DecodeOptions,
    max_parse_retries: u32,
}

impl OllamaClient {
    /// No request timeout is set: a hang in the generation service stalls
    /// the batch rather than half-deciding a job. The status guards make
    /// the rerun safe after an operator kills a stalled run.
    pub fn new(config: &MatcherConfig) -> Self {
        Self {
            client: Client::new(),
            endpoint: format!("{}/api/chat", config.endpoint.trim_end_matches('/')),
            model: config.model.clone(),
            options: DecodeOptions {
                temperature: config.temperature,
                top_k: config.top_k,
                top_p: config.top_p,
            },
            max_parse_retries: config.max_parse_retries,
        }
    }

    async fn generate(&self, prompt: &str) -> Result<String, ScoreError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&ChatRequest {
                model: &self.model,
                messages: vec![ChatMessage {
                    role: "user",
                    content: prompt,
                }],
                stream: false,
                options: DecodeOptions {
                    temperature: self.options.temperature,
                    top_k: self.options.top_k,
                    top_p: self.options.top_p,
                },
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ScoreError::Service {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response.json().await?;
        Ok(body.message.content)
    }
}

impl ScoreClient for OllamaClient {
    async fn score(
        &self,
        job_summary: &str,
        candidate_text: &str,
    ) -> Result<ScoreOutcome, ScoreError> {
        let prompt = build_prompt(job_summary, candidate_text);

        // Transport failures propagate; only malformed replies are retried.
        for attempt in 0..=self.max_parse_retries {
            let raw = self.generate(&prompt).await?;

            if let Some(score) = parse_score(&raw) {
                debug!(model = %self.model, score = score.score, "parsed match score");
                return Ok(ScoreOutcome::Scored(score));
            }

            warn!(
                attempt = attempt + 1,
                reply_chars = raw.len(),
                "generation reply was not a usable score"
            );
        }

        Ok(ScoreOutcome::NoScore)
    }
}
