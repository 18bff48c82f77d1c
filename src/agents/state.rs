//! Request context and the shared agent state.
//!
//! One [`AgentState`] exists per request. The orchestrator owns it and lends
//! it mutably to one specialist at a time; everything a request produces
//! (lesson, quiz, grades, feedback, logs) accumulates here and is returned
//! to the caller as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use super::error::{AgentError, AgentResult};
use crate::retrieval::Document;

/// Lowest accepted school grade.
pub const MIN_GRADE: u8 = 1;
/// Highest accepted school grade.
pub const MAX_GRADE: u8 = 12;

/// School subject of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Subject {
    Ukrainian,
    History,
    Algebra,
    Mathematics,
}

impl Subject {
    pub fn as_str(&self) -> &'static str {
        match self {
            Subject::Ukrainian => "ukrainian",
            Subject::History => "history",
            Subject::Algebra => "algebra",
            Subject::Mathematics => "mathematics",
        }
    }

    /// Ukrainian display name used in prompts.
    pub fn display_name(&self) -> &'static str {
        match self {
            Subject::Ukrainian => "українська мова",
            Subject::History => "історія України",
            Subject::Algebra => "алгебра",
            Subject::Mathematics => "математика",
        }
    }

    /// Subjects whose quizzes contain problems worth solving step by step.
    pub fn is_quantitative(&self) -> bool {
        matches!(self, Subject::Algebra | Subject::Mathematics)
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Subject {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ukrainian" | "українська" | "українська мова" => Ok(Subject::Ukrainian),
            "history" | "історія" | "історія україни" => Ok(Subject::History),
            "algebra" | "алгебра" => Ok(Subject::Algebra),
            "mathematics" | "math" | "maths" | "математика" => Ok(Subject::Mathematics),
            other => Err(format!("unknown subject '{}'", other)),
        }
    }
}

impl TryFrom<String> for Subject {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Inbound request as received from the API layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TutorRequest {
    #[serde(default)]
    pub request_id: Option<String>,
    pub class_id: String,
    pub student_id: String,
    pub teacher_id: String,
    pub grade: u8,
    pub subject: Subject,
    pub topic_query: String,
    /// Topic ids the retrieval should be restricted to.
    #[serde(default)]
    pub topic_filter: Option<Vec<String>>,
    #[serde(default)]
    pub student_profile: Option<Value>,
    #[serde(default)]
    pub student_answers: Option<Vec<String>>,
    #[serde(default)]
    pub trace_id: Option<String>,
}

/// Immutable identifiers of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub request_id: String,
    /// Doubles as the tenant id for cost attribution.
    pub class_id: String,
    pub student_id: String,
    pub teacher_id: String,
    pub grade: u8,
    pub subject: Subject,
    pub topic_query: String,
    pub trace_id: String,
}

impl RequestContext {
    /// Validate a request and derive its context.
    ///
    /// A missing request id is generated; a missing trace id reuses the
    /// request id.
    pub fn from_request(request: &TutorRequest) -> AgentResult<Self> {
        fn required(field: &str, value: &str) -> AgentResult<String> {
            let value = value.trim();
            if value.is_empty() {
                return Err(AgentError::InvalidRequest(format!("{} must not be empty", field)));
            }
            Ok(value.to_string())
        }

        if !(MIN_GRADE..=MAX_GRADE).contains(&request.grade) {
            return Err(AgentError::InvalidRequest(format!(
                "grade must be between {} and {}, got {}",
                MIN_GRADE, MAX_GRADE, request.grade
            )));
        }

        let request_id = request
            .request_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let trace_id = request
            .trace_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| request_id.clone());

        Ok(Self {
            class_id: required("class_id", &request.class_id)?,
            student_id: required("student_id", &request.student_id)?,
            teacher_id: required("teacher_id", &request.teacher_id)?,
            topic_query: required("topic_query", &request.topic_query)?,
            grade: request.grade,
            subject: request.subject,
            request_id,
            trace_id,
        })
    }

    pub fn tenant_id(&self) -> &str {
        &self.class_id
    }
}

/// Kind of quiz question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    #[serde(alias = "multiple-choice", alias = "choice", alias = "test")]
    MultipleChoice,
    Problem,
    #[default]
    #[serde(other)]
    Open,
}

/// One generated quiz question.
///
/// Deserialization is lenient because the source is model output: unknown
/// types become `open`, numeric answers become strings and missing fields
/// take defaults.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QuizQuestion {
    #[serde(default, deserialize_with = "lenient_string")]
    pub question: String,
    #[serde(rename = "type", default, deserialize_with = "lenient_question_type")]
    pub question_type: QuestionType,
    #[serde(default, deserialize_with = "lenient_options", skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub correct_answer: String,
    #[serde(default, deserialize_with = "lenient_optional_string", skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub topic_id: String,
    #[serde(default, deserialize_with = "lenient_pages")]
    pub page_reference: Vec<u32>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl QuizQuestion {
    /// Placeholder question holding unparseable model output verbatim.
    pub fn raw_text(text: impl Into<String>) -> Self {
        let mut metadata = Map::new();
        metadata.insert("fallback".to_string(), Value::String("raw_text".to_string()));
        Self {
            question: text.into(),
            question_type: QuestionType::Open,
            metadata,
            ..Self::default()
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.metadata.get("fallback").and_then(Value::as_str) == Some("raw_text")
    }
}

fn value_to_string(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        Value::Array(items) => items
            .into_iter()
            .map(value_to_string)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(value_to_string(Value::deserialize(deserializer)?))
}

fn lenient_optional_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = value_to_string(Value::deserialize(deserializer)?);
    Ok(Some(value).filter(|v| !v.trim().is_empty()))
}

/// Unknown, null or non-string types read as `open`.
fn lenient_question_type<'de, D: Deserializer<'de>>(deserializer: D) -> Result<QuestionType, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => serde_json::from_value::<QuestionType>(Value::String(s.trim().to_lowercase())).unwrap_or_default(),
        _ => QuestionType::Open,
    })
}

fn lenient_options<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<String>>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::Array(items) => Some(items.into_iter().map(value_to_string).collect()),
        Value::Object(map) => Some(map.into_iter().map(|(k, v)| format!("{}) {}", k, value_to_string(v))).collect()),
        other => Some(vec![value_to_string(other)]),
    })
}

fn lenient_pages<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u32>, D::Error> {
    fn page(value: &Value) -> Option<u32> {
        match value {
            Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items.iter().filter_map(page).collect(),
        other => page(&other).into_iter().collect(),
    })
}

/// Verdict of the quality validator.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Feedback {
    pub valid: bool,
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
}

impl Feedback {
    pub fn invalid(issue: impl Into<String>) -> Self {
        Self {
            valid: false,
            issues: vec![issue.into()],
            suggestions: Vec::new(),
        }
    }
}

/// Score given to one answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grade {
    pub score: u8,
    pub max_score: u8,
    pub correct: bool,
    /// Full grader reply.
    pub feedback: String,
    pub auto_graded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingRecord {
    pub question_index: usize,
    pub question: QuizQuestion,
    pub student_answer: String,
    pub grade: Grade,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingResult {
    pub results: Vec<GradingRecord>,
    pub total_questions: usize,
    pub correct_answers: usize,
    pub average_score: f64,
}

/// Step-by-step solution for a quiz problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolvedProblem {
    pub question_index: usize,
    pub problem: String,
    pub solution: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentAnalysis {
    pub analysis: String,
    #[serde(default)]
    pub profile: Option<Value>,
    #[serde(default)]
    pub performance_metrics: Option<GradingResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendations {
    pub recommendations: String,
    pub topic: String,
    pub generated_at: DateTime<Utc>,
}

/// Shared mutable record threaded through every stage of a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    pub context: RequestContext,

    pub student_profile: Option<Value>,
    pub student_answers: Option<Vec<String>>,

    pub matched_topics: Vec<String>,
    pub retrieved_docs: Vec<Document>,

    pub lesson_content: String,
    pub lesson_sources: Vec<String>,
    pub quiz: Vec<QuizQuestion>,
    pub solved_problems: Vec<SolvedProblem>,

    pub feedback: Feedback,
    pub validation_passed: bool,
    pub regeneration_count: u32,

    pub grading_result: Option<GradingResult>,
    pub student_analysis: Option<StudentAnalysis>,
    pub recommendations: Option<Recommendations>,

    pub step_logs: Vec<String>,
    pub errors: Vec<String>,
}

impl AgentState {
    /// Empty state for a context.
    pub fn new(context: RequestContext) -> Self {
        Self {
            context,
            student_profile: None,
            student_answers: None,
            matched_topics: Vec::new(),
            retrieved_docs: Vec::new(),
            lesson_content: String::new(),
            lesson_sources: Vec::new(),
            quiz: Vec::new(),
            solved_problems: Vec::new(),
            feedback: Feedback::default(),
            validation_passed: false,
            regeneration_count: 0,
            grading_result: None,
            student_analysis: None,
            recommendations: None,
            step_logs: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Validate a request and seed the state with its inputs.
    pub fn from_request(request: TutorRequest) -> AgentResult<Self> {
        let context = RequestContext::from_request(&request)?;
        let mut state = Self::new(context);
        state.student_profile = request.student_profile;
        state.student_answers = request.student_answers.filter(|a| !a.is_empty());
        state.matched_topics = request.topic_filter.unwrap_or_default();
        Ok(state)
    }

    pub fn tenant_id(&self) -> &str {
        self.context.tenant_id()
    }

    pub fn has_student_answers(&self) -> bool {
        self.student_answers.as_ref().is_some_and(|a| !a.is_empty())
    }

    pub fn has_content(&self) -> bool {
        !self.lesson_content.trim().is_empty() || !self.quiz.is_empty()
    }

    /// Append a progress entry.
    pub fn log_step(&mut self, step: impl Into<String>) {
        let step = step.into();
        tracing::info!(request_id = %self.context.request_id, step = %step, "Agent step");
        self.step_logs.push(step);
    }

    /// Append an error entry; errors are never removed.
    pub fn record_error(&mut self, error: impl Into<String>) {
        let error = error.into();
        tracing::error!(request_id = %self.context.request_id, error = %error, "Agent error recorded");
        self.errors.push(error);
    }
}
