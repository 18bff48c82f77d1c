//! Scripted gateway shared by the agent unit tests.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::error::LlmError;
use crate::llm::{Backend, Completion, CompletionOptions, LlmGateway, Message, TokenUsage};

/// One recorded gateway call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub task_type: String,
    pub tenant_id: String,
    pub messages: Vec<Message>,
    pub options: CompletionOptions,
}

/// Replies keyed by task type. Queued replies are consumed first, then the
/// fixed reply for that task type repeats. Unscripted task types fail.
#[derive(Default)]
pub struct ScriptedGateway {
    queued: Mutex<HashMap<String, VecDeque<Result<String, LlmError>>>>,
    fixed: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(self, task_type: &str, reply: impl Into<String>) -> Self {
        self.fixed
            .lock()
            .expect("lock poisoned")
            .insert(task_type.to_string(), reply.into());
        self
    }

    pub fn with_queued(self, task_type: &str, reply: Result<String, LlmError>) -> Self {
        self.queued
            .lock()
            .expect("lock poisoned")
            .entry(task_type.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn with_failure(self, task_type: &str) -> Self {
        self.with_queued(
            task_type,
            Err(LlmError::RequestFailed("connection refused".to_string())),
        )
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("lock poisoned").clone()
    }

    pub fn calls_for(&self, task_type: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.task_type == task_type)
            .collect()
    }
}

#[async_trait]
impl LlmGateway for ScriptedGateway {
    async fn complete(
        &self,
        messages: Vec<Message>,
        task_type: &str,
        tenant_id: &str,
        options: CompletionOptions,
    ) -> Result<Completion, LlmError> {
        self.calls.lock().expect("lock poisoned").push(RecordedCall {
            task_type: task_type.to_string(),
            tenant_id: tenant_id.to_string(),
            messages,
            options,
        });

        let queued = self
            .queued
            .lock()
            .expect("lock poisoned")
            .get_mut(task_type)
            .and_then(VecDeque::pop_front);
        let reply = match queued {
            Some(reply) => reply?,
            None => self
                .fixed
                .lock()
                .expect("lock poisoned")
                .get(task_type)
                .cloned()
                .ok_or_else(|| LlmError::BackendUnavailable(format!("unscripted task {}", task_type)))?,
        };

        Ok(Completion {
            content: reply,
            usage: TokenUsage::default(),
            finish_reason: "stop".to_string(),
            model: "scripted".to_string(),
            backend: options.provider.unwrap_or(Backend::Local),
            cached: false,
        })
    }
}

/// Request context for an 8th-grade algebra request.
pub fn algebra_state() -> crate::agents::state::AgentState {
    use crate::agents::state::{AgentState, Subject, TutorRequest};

    AgentState::from_request(TutorRequest {
        request_id: Some("req-1".to_string()),
        class_id: "class-8a".to_string(),
        student_id: "student-1".to_string(),
        teacher_id: "teacher-1".to_string(),
        grade: 8,
        subject: Subject::Algebra,
        topic_query: "Квадратні рівняння".to_string(),
        topic_filter: None,
        student_profile: None,
        student_answers: None,
        trace_id: None,
    })
    .expect("valid request")
}
