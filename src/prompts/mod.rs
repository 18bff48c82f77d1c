//! LLM prompts for the tutoring agents.
//!
//! Prompts are Ukrainian-language templates with `{placeholder}` slots
//! filled by the `build_*` functions:
//!
//! - [`supervisor`] - planning and regeneration decisions
//! - [`content`] - lessons, quizzes and step-by-step solutions
//! - [`assessment`] - grading, student analytics and quality review

pub mod assessment;
pub mod content;
pub mod supervisor;

pub use assessment::{
    build_analysis_prompt, build_grading_prompt, build_lesson_review_prompt,
    build_quiz_review_prompt, build_recommendation_prompt, GradingInput,
};
pub use content::{build_lesson_context, build_lesson_prompt, build_quiz_prompt, build_solver_prompt};
pub use supervisor::{build_planning_prompt, build_regeneration_prompt, PlanningContext};

/// Prefix of `text` holding at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
