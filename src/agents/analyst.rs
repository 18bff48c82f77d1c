//! Analyst specialist: student analysis followed by recommendations.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

use super::error::AgentResult;
use super::specialist::Specialist;
use super::state::{AgentState, Recommendations, StudentAnalysis};
use crate::llm::{CompletionOptions, LlmGateway, Message};
use crate::prompts::assessment::{ANALYSIS_SYSTEM_PROMPT, RECOMMENDATION_SYSTEM_PROMPT};
use crate::prompts::{build_analysis_prompt, build_recommendation_prompt};

pub struct AnalystSpecialist {
    gateway: Arc<dyn LlmGateway>,
    analysis_temperature: f64,
    recommendation_temperature: f64,
    max_tokens: u32,
}

impl std::fmt::Debug for AnalystSpecialist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalystSpecialist")
            .field("analysis_temperature", &self.analysis_temperature)
            .field("recommendation_temperature", &self.recommendation_temperature)
            .finish_non_exhaustive()
    }
}

impl AnalystSpecialist {
    pub const AGENT_NAME: &'static str = "analyst_specialist";

    pub fn new(gateway: Arc<dyn LlmGateway>) -> Self {
        Self {
            gateway,
            analysis_temperature: 0.4,
            recommendation_temperature: 0.6,
            max_tokens: 1024,
        }
    }
}

#[async_trait]
impl Specialist for AnalystSpecialist {
    fn name(&self) -> &'static str {
        Self::AGENT_NAME
    }

    async fn run(&self, state: &mut AgentState) -> AgentResult<()> {
        if state.student_profile.is_none() && state.grading_result.is_none() {
            tracing::debug!("Nothing to analyse");
            return Ok(());
        }

        let ctx = &state.context;
        let subject = ctx.subject.display_name();
        let profile = match &state.student_profile {
            Some(p) => serde_json::to_string(p)?,
            None => "немає".to_string(),
        };
        let grading = match &state.grading_result {
            Some(g) => serde_json::to_string(g)?,
            None => "немає".to_string(),
        };

        tracing::info!(student_id = %ctx.student_id, "Analysing student");
        let analysis = self
            .gateway
            .complete(
                vec![
                    Message::system(ANALYSIS_SYSTEM_PROMPT),
                    Message::user(build_analysis_prompt(
                        &profile,
                        &grading,
                        subject,
                        ctx.grade,
                        &ctx.topic_query,
                    )),
                ],
                "analytics",
                ctx.tenant_id(),
                CompletionOptions::new(self.analysis_temperature, self.max_tokens),
            )
            .await?
            .content;

        let recommendations = self
            .gateway
            .complete(
                vec![
                    Message::system(RECOMMENDATION_SYSTEM_PROMPT),
                    Message::user(build_recommendation_prompt(
                        &analysis,
                        subject,
                        ctx.grade,
                        &ctx.topic_query,
                    )),
                ],
                "recommendation",
                ctx.tenant_id(),
                CompletionOptions::new(self.recommendation_temperature, self.max_tokens),
            )
            .await?
            .content;

        let topic = ctx.topic_query.clone();
        state.student_analysis = Some(StudentAnalysis {
            analysis,
            profile: state.student_profile.clone(),
            performance_metrics: state.grading_result.clone(),
        });
        state.recommendations = Some(Recommendations {
            recommendations,
            topic,
            generated_at: Utc::now(),
        });
        Ok(())
    }
}
