//! End-to-end orchestrator scenarios with scripted model replies.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use vyvchai::agents::{
    AgentError, AgentResult, AgentState, Feedback, MultiAgentOrchestrator, OrchestratorConfig, QualityValidator,
    Subject, TutorRequest,
};
use vyvchai::llm::{Backend, Completion, CompletionOptions, LlmGateway, Message, TokenUsage};
use vyvchai::retrieval::{CorpusRecord, IndexRetriever, InMemoryIndex};
use vyvchai::LlmError;

/// Replies keyed by task type; queued replies first, then the fixed reply.
#[derive(Default)]
struct FakeGateway {
    queued: Mutex<HashMap<String, VecDeque<Result<String, LlmError>>>>,
    fixed: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<String>>,
}

impl FakeGateway {
    fn reply(self, task_type: &str, reply: &str) -> Self {
        self.fixed
            .lock()
            .expect("lock poisoned")
            .insert(task_type.to_string(), reply.to_string());
        self
    }

    fn fail_once(self, task_type: &str) -> Self {
        self.queued
            .lock()
            .expect("lock poisoned")
            .entry(task_type.to_string())
            .or_default()
            .push_back(Err(LlmError::RequestFailed("connection reset by peer".to_string())));
        self
    }

    fn count(&self, task_type: &str) -> usize {
        self.calls
            .lock()
            .expect("lock poisoned")
            .iter()
            .filter(|t| t.as_str() == task_type)
            .count()
    }

    fn order(&self) -> Vec<String> {
        self.calls.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl LlmGateway for FakeGateway {
    async fn complete(
        &self,
        _messages: Vec<Message>,
        task_type: &str,
        _tenant_id: &str,
        options: CompletionOptions,
    ) -> Result<Completion, LlmError> {
        self.calls.lock().expect("lock poisoned").push(task_type.to_string());
        let queued = self
            .queued
            .lock()
            .expect("lock poisoned")
            .get_mut(task_type)
            .and_then(VecDeque::pop_front);
        let content = match queued {
            Some(reply) => reply?,
            None => self
                .fixed
                .lock()
                .expect("lock poisoned")
                .get(task_type)
                .cloned()
                .ok_or_else(|| LlmError::BackendUnavailable(task_type.to_string()))?,
        };
        Ok(Completion {
            content,
            usage: TokenUsage::default(),
            finish_reason: "stop".to_string(),
            model: "fake".to_string(),
            backend: options.provider.unwrap_or(Backend::Local),
            cached: false,
        })
    }
}

/// Returns scripted verdicts in order, repeating the last one.
struct ScriptedValidator {
    verdicts: Vec<bool>,
    calls: AtomicUsize,
}

impl ScriptedValidator {
    fn new(verdicts: Vec<bool>) -> Self {
        Self {
            verdicts,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QualityValidator for ScriptedValidator {
    async fn validate(&self, _state: &AgentState) -> AgentResult<Feedback> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let valid = self
            .verdicts
            .get(n)
            .or(self.verdicts.last())
            .copied()
            .unwrap_or(false);
        Ok(if valid {
            Feedback {
                valid: true,
                ..Feedback::default()
            }
        } else {
            Feedback::invalid("Quiz quality issues detected")
        })
    }
}

struct FailingValidator;

#[async_trait]
impl QualityValidator for FailingValidator {
    async fn validate(&self, _state: &AgentState) -> AgentResult<Feedback> {
        Err(AgentError::Llm(LlmError::BackendUnavailable("cloud".to_string())))
    }
}

const QUIZ: &str = r#"```json
[
  {"question": "Розв'яжіть рівняння x^2 - 5x + 6 = 0", "type": "problem", "correct_answer": "2; 3"},
  {"question": "Що таке дискримінант?", "type": "open", "correct_answer": "b^2 - 4ac"}
]
```"#;

fn request() -> TutorRequest {
    TutorRequest {
        request_id: Some("req-e2e".to_string()),
        class_id: "class-8b".to_string(),
        student_id: "student-7".to_string(),
        teacher_id: "teacher-2".to_string(),
        grade: 8,
        subject: Subject::Algebra,
        topic_query: "quadratic equations".to_string(),
        topic_filter: None,
        student_profile: None,
        student_answers: None,
        trace_id: None,
    }
}

fn content_gateway() -> FakeGateway {
    FakeGateway::default()
        .reply("supervisor_planning", "Спершу треба подумати над уроком.")
        .reply("content_generation", "Квадратне рівняння має вигляд ax^2 + bx + c = 0.")
        .reply("quiz_generation", QUIZ)
        .reply("solver_algebra", "D = 1, x1 = 2, x2 = 3")
        .reply("supervisor_decision", "ТАК")
}

fn orchestrator(
    gateway: Arc<FakeGateway>,
    validator: Arc<dyn QualityValidator>,
    max_attempts: u32,
) -> MultiAgentOrchestrator {
    MultiAgentOrchestrator::new(
        gateway,
        Arc::new(IndexRetriever::unavailable()),
        OrchestratorConfig::default().with_max_regeneration_attempts(max_attempts),
    )
    .with_validator(validator)
}

#[tokio::test]
async fn test_valid_first_pass_runs_default_plan() {
    let gateway = Arc::new(content_gateway());
    let validator = Arc::new(ScriptedValidator::new(vec![true]));
    let orch = orchestrator(gateway.clone(), validator.clone(), 3);

    let state = orch.process_request(request()).await.expect("valid request");

    assert!(state.validation_passed);
    assert_eq!(state.regeneration_count, 0);
    assert!(state.errors.is_empty(), "errors: {:?}", state.errors);
    assert!(state.lesson_content.starts_with("Квадратне рівняння"));
    assert_eq!(state.quiz.len(), 2);
    assert_eq!(state.solved_problems.len(), 1);
    assert_eq!(state.solved_problems[0].question_index, 0);
    assert_eq!(
        state.step_logs,
        vec![
            "Retrieved 0 documents".to_string(),
            "Completed: content_generation".to_string(),
            "Completed: quiz_generation".to_string(),
            "Completed: solving".to_string(),
        ]
    );

    assert_eq!(validator.calls(), 1);
    assert_eq!(gateway.count("supervisor_decision"), 0);
    assert_eq!(
        gateway.order(),
        vec!["supervisor_planning", "content_generation", "quiz_generation", "solver_algebra"]
    );
}

#[tokio::test]
async fn test_regeneration_stops_at_max_attempts() {
    let gateway = Arc::new(content_gateway());
    let validator = Arc::new(ScriptedValidator::new(vec![false]));
    let orch = orchestrator(gateway.clone(), validator.clone(), 3);

    let state = orch.process_request(request()).await.expect("valid request");

    assert!(!state.validation_passed);
    assert_eq!(state.regeneration_count, 3);
    assert_eq!(validator.calls(), 4);
    assert_eq!(gateway.count("supervisor_decision"), 3);
    assert_eq!(gateway.count("supervisor_planning"), 4);
    assert_eq!(state.feedback.issues, vec!["Quiz quality issues detected".to_string()]);
    assert!(state.errors.is_empty());
}

#[tokio::test]
async fn test_regeneration_count_never_exceeds_cap() {
    for max_attempts in 0..=4 {
        let gateway = Arc::new(content_gateway());
        let validator = Arc::new(ScriptedValidator::new(vec![false]));
        let orch = orchestrator(gateway, validator.clone(), max_attempts);

        let state = orch.process_request(request()).await.expect("valid request");
        assert_eq!(state.regeneration_count, max_attempts);
        assert_eq!(validator.calls(), max_attempts as usize + 1);
    }
}

#[tokio::test]
async fn test_negative_decision_stops_loop() {
    let gateway = Arc::new(content_gateway().reply("supervisor_decision", "НІ"));
    let validator = Arc::new(ScriptedValidator::new(vec![false]));
    let orch = orchestrator(gateway.clone(), validator.clone(), 3);

    let state = orch.process_request(request()).await.expect("valid request");

    assert!(!state.validation_passed);
    assert_eq!(state.regeneration_count, 1);
    assert_eq!(validator.calls(), 1);
    assert_eq!(gateway.count("supervisor_planning"), 1);
}

#[tokio::test]
async fn test_malformed_decision_is_treated_as_no() {
    let gateway = Arc::new(content_gateway().reply("supervisor_decision", ""));
    let validator = Arc::new(ScriptedValidator::new(vec![false]));
    let orch = orchestrator(gateway.clone(), validator.clone(), 3);

    let state = orch.process_request(request()).await.expect("valid request");
    assert_eq!(state.regeneration_count, 1);
    assert_eq!(gateway.count("supervisor_planning"), 1);
}

#[tokio::test]
async fn test_no_work_after_validation_passes() {
    let gateway = Arc::new(content_gateway());
    let validator = Arc::new(ScriptedValidator::new(vec![false, true, false]));
    let orch = orchestrator(gateway.clone(), validator.clone(), 3);

    let state = orch.process_request(request()).await.expect("valid request");

    assert!(state.validation_passed);
    assert_eq!(state.regeneration_count, 1);
    assert_eq!(validator.calls(), 2);
    assert_eq!(gateway.count("supervisor_planning"), 2);
    // content already exists, so the second pass only re-solves
    assert_eq!(gateway.count("content_generation"), 1);
    assert_eq!(gateway.count("solver_algebra"), 2);
    assert_eq!(gateway.order().last().map(String::as_str), Some("solver_algebra"));
}

#[tokio::test]
async fn test_specialist_transport_error_is_recorded_and_plan_continues() {
    let gateway = Arc::new(
        content_gateway()
            .reply("supervisor_planning", "1. content_generation\n2. solving\n3. quiz_generation")
            .fail_once("content_generation"),
    );
    let validator = Arc::new(ScriptedValidator::new(vec![true]));
    let orch = orchestrator(gateway.clone(), validator, 3);

    let state = orch.process_request(request()).await.expect("valid request");

    assert_eq!(state.errors.len(), 1);
    assert!(state.errors[0].starts_with("content_generation failed:"));
    assert!(state.errors[0].contains("connection reset by peer"));
    assert!(state.step_logs.contains(&"Completed: solving".to_string()));
    // the quiz_generation slot found an empty lesson and wrote it
    assert!(!state.lesson_content.is_empty());
    assert!(state.quiz.is_empty());
    assert!(state.validation_passed);
}

#[tokio::test]
async fn test_unbound_quality_check_is_skipped() {
    let gateway = Arc::new(content_gateway().reply("supervisor_planning", "1. quality_check\n2. content_generation"));
    let validator = Arc::new(ScriptedValidator::new(vec![true]));
    let orch = orchestrator(gateway.clone(), validator, 3);

    let state = orch.process_request(request()).await.expect("valid request");

    assert!(state.errors.is_empty());
    assert!(!state.lesson_content.is_empty());
    assert_eq!(gateway.count("quality_check"), 0);
}

#[tokio::test]
async fn test_validator_error_returns_partial_state() {
    let gateway = Arc::new(content_gateway());
    let orch = orchestrator(gateway, Arc::new(FailingValidator), 3);

    let state = orch.process_request(request()).await.expect("valid request");

    assert!(!state.validation_passed);
    assert!(!state.lesson_content.is_empty());
    assert_eq!(state.errors.len(), 1);
    assert!(state.errors[0].starts_with("Processing failed:"));
}

#[tokio::test]
async fn test_invalid_request_is_rejected() {
    let orch = orchestrator(
        Arc::new(content_gateway()),
        Arc::new(ScriptedValidator::new(vec![true])),
        3,
    );

    let mut bad = request();
    bad.grade = 13;
    assert!(matches!(
        orch.process_request(bad).await,
        Err(AgentError::InvalidRequest(_))
    ));

    let mut bad = request();
    bad.topic_query = "   ".to_string();
    assert!(matches!(
        orch.process_request(bad).await,
        Err(AgentError::InvalidRequest(_))
    ));
}

#[tokio::test]
async fn test_grading_and_analytics_with_qa_validator() {
    let gateway = Arc::new(
        content_gateway()
            .reply(
                "supervisor_planning",
                "1. content_generation\n2. quiz_generation\n3. grading\n4. analytics",
            )
            .reply("grading", "Оцінка: 9/10\nПояснення: правильно")
            .reply("analytics", "Учень добре розв'язує рівняння")
            .reply("recommendation", "Перейти до теореми Вієта")
            .reply("quality_check", "Матеріал відповідає програмі."),
    );
    let retriever = IndexRetriever::new(Arc::new(InMemoryIndex::new(vec![CorpusRecord {
        content: "Квадратні рівняння розв'язують через дискримінант".to_string(),
        source: "Алгебра 8, §19".to_string(),
        topic: "quadratic".to_string(),
        subject: Some("algebra".to_string()),
        grade: Some(8),
    }])));
    let orch = MultiAgentOrchestrator::new(gateway.clone(), Arc::new(retriever), OrchestratorConfig::default());

    let mut req = request();
    req.topic_query = "квадратні рівняння дискримінант".to_string();
    req.student_answers = Some(vec!["2; 3".to_string(), "b^2 - 4ac".to_string()]);
    let state = orch.process_request(req).await.expect("valid request");

    assert!(state.validation_passed, "feedback: {:?}", state.feedback);
    assert_eq!(state.retrieved_docs.len(), 1);
    assert_eq!(state.lesson_sources, vec!["Алгебра 8, §19".to_string()]);

    let grading = state.grading_result.as_ref().expect("graded");
    assert_eq!(grading.correct_answers, 2);
    assert!((grading.average_score - 9.0).abs() < f64::EPSILON);
    assert_eq!(
        state.recommendations.as_ref().map(|r| r.recommendations.as_str()),
        Some("Перейти до теореми Вієта")
    );
    assert_eq!(gateway.count("quality_check"), 2);
}
