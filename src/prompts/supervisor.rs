//! Prompts used by the supervisor for planning and regeneration decisions.

/// System prompt establishing the supervisor's role and the task vocabulary.
pub const SUPERVISOR_SYSTEM_PROMPT: &str = r#"Ти - супервізор AI-тьютора для українських школярів.
Ти координуєш команду спеціалістів і складаєш план їхньої роботи.

Доступні завдання:
- content_generation: створити навчальний матеріал (урок) з теми
- quiz_generation: створити тестові питання за уроком
- solving: покроково розв'язати задачі з тесту (лише алгебра та математика)
- grading: оцінити відповіді учня
- analytics: проаналізувати успішність учня та дати рекомендації

Правила:
- Урок завжди передує тесту.
- grading має сенс лише тоді, коли є відповіді учня.
- analytics виконується після grading.

Відповідай ЛИШЕ нумерованим списком, по одному завданню в рядку, наприклад:
1. content_generation
2. quiz_generation
3. solving"#;

/// User prompt for building an execution plan.
pub const TASK_ROUTING_TEMPLATE: &str = r#"Запит учня: {query}
Предмет: {subject}
Клас: {grade}
Є відповіді учня: {has_student_answers}
Поточний крок: {current_step}

Склади план виконання."#;

/// System prompt for the regenerate-or-stop decision.
pub const REGENERATION_SYSTEM_PROMPT: &str =
    "Ти - супервізор AI-тьютора. Визнач, чи потрібна регенерація контенту.";

/// User prompt for the regenerate-or-stop decision.
pub const REGENERATION_DECISION_TEMPLATE: &str = r#"Фідбек валідатора:
{feedback}

Кількість спроб: {attempt}/{max_attempts}

Чи потрібно регенерувати? Відповідь ТІЛЬКИ 'ТАК' або 'НІ'."#;

/// Planning context sent to the supervisor model.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanningContext<'a> {
    pub query: &'a str,
    pub subject: &'a str,
    pub grade: u8,
    pub has_student_answers: bool,
    pub current_step: usize,
}

pub fn build_planning_prompt(ctx: &PlanningContext<'_>) -> String {
    TASK_ROUTING_TEMPLATE
        .replace("{query}", ctx.query)
        .replace("{subject}", ctx.subject)
        .replace("{grade}", &ctx.grade.to_string())
        .replace(
            "{has_student_answers}",
            if ctx.has_student_answers { "так" } else { "ні" },
        )
        .replace("{current_step}", &ctx.current_step.to_string())
}

pub fn build_regeneration_prompt(feedback_json: &str, attempt: u32, max_attempts: u32) -> String {
    REGENERATION_DECISION_TEMPLATE
        .replace("{feedback}", feedback_json)
        .replace("{attempt}", &attempt.to_string())
        .replace("{max_attempts}", &max_attempts.to_string())
}
