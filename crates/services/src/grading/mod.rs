use std::collections::BTreeSet;
use std::env;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ReasoningError;
use repaso_core::model::{ItemId, Question, SessionResult};

mod parse;

/// Upper bound on concurrent grading requests.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 4;

/// Marker sent in place of an answer the learner never gave.
const NO_ANSWER_MARKER: &str = "(no answer)";

/// Explanation recorded when the reasoning call itself failed.
const SERVICE_FAILURE_EXPLANATION: &str =
    "The grading service could not be reached for this question.";

//
// ─── REASONING SEAM ────────────────────────────────────────────────────────────
//

/// One question's worth of grading input, detached from session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradingRequest {
    pub statement: String,
    pub options: Option<Vec<String>>,
    /// `None` when the learner left the answer blank.
    pub user_answer: Option<String>,
}

impl GradingRequest {
    #[must_use]
    pub fn from_question(question: &Question) -> Self {
        Self {
            statement: question.statement().to_owned(),
            options: question.options().map(<[String]>::to_vec),
            user_answer: if question.has_answer() {
                question.user_answer().map(str::to_owned)
            } else {
                None
            },
        }
    }
}

/// Structured verdict expected back from the reasoning model.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeVerdict {
    pub is_correct: bool,
    #[serde(default = "default_correct_answer")]
    pub correct_answer: String,
    #[serde(default)]
    pub explanation: String,
}

fn default_correct_answer() -> String {
    parse::UNAVAILABLE_ANSWER.to_string()
}

/// Evaluates one grading request and returns the raw model response.
///
/// Implementations do not parse; the orchestrator owns the lenient
/// verdict extraction so every backend degrades the same way.
#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// # Errors
    ///
    /// Returns `ReasoningError` when the backend is unavailable or the
    /// call fails. The orchestrator converts any error into a failure
    /// verdict for that question alone.
    async fn evaluate(&self, request: &GradingRequest) -> Result<String, ReasoningError>;
}

//
// ─── OPENAI-STYLE CLIENT ───────────────────────────────────────────────────────
//

#[derive(Clone, Debug)]
pub struct ReasoningConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

/// Request timeout applied when `REPASO_AI_TIMEOUT_SECS` is unset.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

impl ReasoningConfig {
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let api_key = env::var("REPASO_AI_API_KEY").ok()?;
        if api_key.trim().is_empty() {
            return None;
        }
        let base_url =
            env::var("REPASO_AI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
        let model = env::var("REPASO_AI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
        let timeout = env::var("REPASO_AI_TIMEOUT_SECS")
            .ok()
            .and_then(|value| value.parse().ok())
            .map_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS), Duration::from_secs);
        Some(Self {
            base_url,
            api_key,
            model,
            timeout,
        })
    }
}

/// [`ReasoningService`] backed by an OpenAI-compatible chat endpoint.
#[derive(Clone)]
pub struct OpenAiReasoningService {
    client: Client,
    config: Option<ReasoningConfig>,
}

impl OpenAiReasoningService {
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(ReasoningConfig::from_env())
    }

    #[must_use]
    pub fn new(config: Option<ReasoningConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }
}

#[async_trait]
impl ReasoningService for OpenAiReasoningService {
    async fn evaluate(&self, request: &GradingRequest) -> Result<String, ReasoningError> {
        let config = self.config.as_ref().ok_or(ReasoningError::Disabled)?;

        let url = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));
        let payload = ChatRequest {
            model: config.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: grading_prompt(request),
            }],
            temperature: 0.2,
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(&config.api_key)
            .timeout(config.timeout)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ReasoningError::HttpStatus(response.status()));
        }

        let body: ChatResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(ReasoningError::EmptyResponse)?;

        Ok(content.trim().to_string())
    }
}

fn grading_prompt(request: &GradingRequest) -> String {
    let mut prompt = String::from(
        "You are grading one answer from a weekly review session. \
         Reply with a single JSON object and nothing else, shaped exactly as \
         {\"isCorrect\": boolean, \"correctAnswer\": string, \"explanation\": string}.\n\n",
    );
    prompt.push_str("Question: ");
    prompt.push_str(&request.statement);
    prompt.push('\n');
    if let Some(options) = &request.options {
        prompt.push_str("Options:\n");
        for (position, option) in options.iter().enumerate() {
            prompt.push_str(&format!("{}. {option}\n", position + 1));
        }
    }
    prompt.push_str("Learner answer: ");
    prompt.push_str(request.user_answer.as_deref().unwrap_or(NO_ANSWER_MARKER));
    prompt.push('\n');
    prompt
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

//
// ─── ORCHESTRATOR ──────────────────────────────────────────────────────────────
//

/// Outcome of grading a full question set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradeReport {
    pub result: SessionResult,
    /// Ids of every question not answered correctly, blanks included.
    pub failed_ids: BTreeSet<ItemId>,
}

/// Fans grading requests out to the reasoning service and folds the
/// verdicts back into the questions.
#[derive(Clone)]
pub struct GradingOrchestrator {
    service: Arc<dyn ReasoningService>,
    max_in_flight: usize,
}

impl GradingOrchestrator {
    #[must_use]
    pub fn new(service: Arc<dyn ReasoningService>) -> Self {
        Self {
            service,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }

    /// Caps concurrent requests; values below one are raised to one.
    #[must_use]
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    /// Grades every question in place and returns the aggregate report.
    ///
    /// Each question is evaluated independently; a failed call or an
    /// unparseable response downgrades that question to a failure
    /// verdict and the rest proceed. Verdicts are matched back to
    /// questions by index, so arrival order never matters. Blank
    /// answers are sent out for an explanation but always recorded as
    /// incorrect.
    pub async fn grade_all(&self, questions: &mut [Question]) -> GradeReport {
        let requests: Vec<(usize, GradingRequest)> = questions
            .iter()
            .enumerate()
            .map(|(index, question)| (index, GradingRequest::from_question(question)))
            .collect();

        let verdicts: Vec<(usize, GradeVerdict)> = futures::stream::iter(requests)
            .map(|(index, request)| {
                let service = Arc::clone(&self.service);
                async move {
                    let verdict = match service.evaluate(&request).await {
                        Ok(raw) => parse::parse_verdict(&raw),
                        Err(err) => {
                            warn!(index, error = %err, "grading call failed, recording failure verdict");
                            GradeVerdict {
                                is_correct: false,
                                correct_answer: parse::UNAVAILABLE_ANSWER.to_string(),
                                explanation: SERVICE_FAILURE_EXPLANATION.to_string(),
                            }
                        }
                    };
                    (index, verdict)
                }
            })
            .buffer_unordered(self.max_in_flight)
            .collect()
            .await;

        let mut correct_count = 0;
        let mut failed_ids = BTreeSet::new();
        for (index, verdict) in verdicts {
            let question = &mut questions[index];
            let is_correct = verdict.is_correct && question.has_answer();
            question.record_grade(is_correct, compose_feedback(is_correct, &verdict));
            if is_correct {
                correct_count += 1;
            } else {
                failed_ids.insert(question.id().clone());
            }
        }

        GradeReport {
            result: SessionResult::new(questions.len(), correct_count),
            failed_ids,
        }
    }
}

fn compose_feedback(is_correct: bool, verdict: &GradeVerdict) -> String {
    if is_correct {
        if verdict.explanation.is_empty() {
            "Correct!".to_string()
        } else {
            format!("Correct! {}", verdict.explanation)
        }
    } else {
        let mut feedback = format!("Incorrect. The correct answer is: {}.", verdict.correct_answer);
        if !verdict.explanation.is_empty() {
            feedback.push(' ');
            feedback.push_str(&verdict.explanation);
        }
        feedback
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
