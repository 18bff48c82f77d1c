//! Prompts for lesson, quiz and solution generation.

use super::truncate_chars;

/// Characters of each grounding document included in the lesson prompt.
pub const DOC_SNIPPET_CHARS: usize = 200;

/// Grounding documents included in the lesson prompt.
pub const MAX_LESSON_DOCS: usize = 3;

/// Characters of the lesson included in the quiz prompt.
pub const LESSON_EXCERPT_CHARS: usize = 1000;

/// Characters of the lesson included in each solver prompt.
pub const SOLVER_LESSON_CHARS: usize = 500;

pub const LESSON_SYSTEM_PROMPT: &str = r#"Ти - досвідчений вчитель української школи.
Пишеш зрозумілі, структуровані уроки відповідно до державної програми.
Використовуй приклади, пояснюй терміни, завершуй короткими висновками."#;

pub const LESSON_USER_TEMPLATE: &str = r#"Створи урок на тему: {topic}
Предмет: {subject}
Клас: {grade}

Матеріали підручника:
{context}

Структура уроку:
1. Вступ і мета уроку
2. Основний матеріал з прикладами
3. Підсумки"#;

pub const QUIZ_SYSTEM_PROMPT: &str = r#"Ти - вчитель, який складає тестові завдання.
Відповідай ЛИШЕ JSON-масивом без пояснень."#;

pub const QUIZ_USER_TEMPLATE: &str = r#"Склади тест з 5-10 питань за уроком.
Предмет: {subject}
Клас: {grade}
Тема: {topic}

Урок:
{lesson}

Формат кожного питання:
{"question": "...", "type": "multiple_choice|open|problem", "options": ["..."], "correct_answer": "...", "difficulty": "easy|medium|hard", "topic_id": "...", "page_reference": [12]}"#;

pub const SOLVER_SYSTEM_PROMPT: &str = r#"Ти - вчитель математики. Розв'язуй задачі покроково,
пояснюючи кожен крок так, щоб учень зрозумів хід думок. Наприкінці дай відповідь."#;

pub const SOLVER_USER_TEMPLATE: &str = r#"Клас: {grade}
Предмет: {subject}

Фрагмент уроку (використовуй той самий метод):
{lesson}

Задача:
{problem}

Розв'яжи покроково."#;

/// Grounding block for the lesson prompt: up to [`MAX_LESSON_DOCS`]
/// snippets of [`DOC_SNIPPET_CHARS`] characters each.
pub fn build_lesson_context<'a, I>(snippets: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let blocks: Vec<String> = snippets
        .into_iter()
        .take(MAX_LESSON_DOCS)
        .map(|(source, content)| {
            format!(
                "[{}] {}",
                if source.trim().is_empty() { "generated" } else { source },
                truncate_chars(content, DOC_SNIPPET_CHARS)
            )
        })
        .collect();

    if blocks.is_empty() {
        "немає (спирайся на програму)".to_string()
    } else {
        blocks.join("\n\n")
    }
}

pub fn build_lesson_prompt(topic: &str, subject: &str, grade: u8, context: &str) -> String {
    LESSON_USER_TEMPLATE
        .replace("{topic}", topic)
        .replace("{subject}", subject)
        .replace("{grade}", &grade.to_string())
        .replace("{context}", context)
}

pub fn build_quiz_prompt(topic: &str, subject: &str, grade: u8, lesson: &str) -> String {
    QUIZ_USER_TEMPLATE
        .replace("{subject}", subject)
        .replace("{grade}", &grade.to_string())
        .replace("{topic}", topic)
        .replace("{lesson}", truncate_chars(lesson, LESSON_EXCERPT_CHARS))
}

pub fn build_solver_prompt(problem: &str, subject: &str, grade: u8, lesson: &str) -> String {
    SOLVER_USER_TEMPLATE
        .replace("{grade}", &grade.to_string())
        .replace("{subject}", subject)
        .replace("{lesson}", truncate_chars(lesson, SOLVER_LESSON_CHARS))
        .replace("{problem}", problem)
}
