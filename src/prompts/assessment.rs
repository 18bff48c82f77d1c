//! Prompts for grading, student analytics and quality review.

use super::truncate_chars;

/// Characters of the lesson sent to the quality reviewer.
pub const QA_LESSON_CHARS: usize = 2000;

/// Characters of the serialized quiz sent to the quality reviewer.
pub const QA_QUIZ_CHARS: usize = 1500;

pub const GRADING_SYSTEM_PROMPT: &str =
    "Ти - вчитель, який оцінює відповіді учнів. Будь справедливим та детальним.";

pub const GRADING_USER_TEMPLATE: &str = r#"Предмет: {subject}
Клас: {grade}
Тип питання: {question_type}

Питання: {question}
Правильна відповідь: {correct_answer}
Відповідь учня: {student_answer}

Оціни відповідь за шкалою від 0 до 10.
Формат відповіді:
Оцінка: X/10
Пояснення: ..."#;

pub const ANALYSIS_SYSTEM_PROMPT: &str =
    "Ти - педагогічний аналітик. Проаналізуй профіль та успішність учня.";

pub const ANALYSIS_USER_TEMPLATE: &str = r#"Профіль учня: {profile}
Результати тестування: {grading}
Предмет: {subject}
Клас: {grade}
Тема: {topic}

Опиши сильні та слабкі сторони, рівень знань і прогрес."#;

pub const RECOMMENDATION_SYSTEM_PROMPT: &str =
    "Ти - педагогічний консультант. Створи персоналізовані рекомендації для учня.";

pub const RECOMMENDATION_USER_TEMPLATE: &str = r#"Аналіз: {analysis}
Предмет: {subject}
Клас: {grade}
Поточна тема: {topic}

Створи:
1. Рекомендації щодо навчання
2. Додаткові матеріали
3. Вправи для закріплення
4. Стратегії покращення"#;

pub const LESSON_REVIEW_SYSTEM_PROMPT: &str =
    "Ти - експерт з перевірки якості навчального контенту.";

pub const LESSON_REVIEW_TEMPLATE: &str = r#"Перевір якість навчального матеріалу:

{lesson}

Критерії:
1. Відповідність програмі {grade} класу
2. Правильність фактів
3. Зрозумілість мови
4. Структура та логіка викладу
5. Наявність прикладів

Назви проблеми та пропозиції щодо покращення."#;

pub const QUIZ_REVIEW_SYSTEM_PROMPT: &str = "Ти - експерт з перевірки якості тестових завдань.";

pub const QUIZ_REVIEW_TEMPLATE: &str = r#"Перевір якість тестових питань:

{quiz}

Критерії:
1. Правильність відповідей
2. Відповідність рівню {grade} класу
3. Різноманітність типів питань
4. Ясність формулювань

Назви проблеми та пропозиції щодо покращення."#;

/// Fields of one answer to grade.
#[derive(Debug, Clone, PartialEq)]
pub struct GradingInput<'a> {
    pub subject: &'a str,
    pub grade: u8,
    pub question_type: &'a str,
    pub question: &'a str,
    pub correct_answer: &'a str,
    pub student_answer: &'a str,
}

pub fn build_grading_prompt(input: &GradingInput<'_>) -> String {
    GRADING_USER_TEMPLATE
        .replace("{subject}", input.subject)
        .replace("{grade}", &input.grade.to_string())
        .replace("{question_type}", input.question_type)
        .replace("{correct_answer}", input.correct_answer)
        .replace("{question}", input.question)
        .replace("{student_answer}", input.student_answer)
}

pub fn build_analysis_prompt(profile: &str, grading: &str, subject: &str, grade: u8, topic: &str) -> String {
    ANALYSIS_USER_TEMPLATE
        .replace("{subject}", subject)
        .replace("{grade}", &grade.to_string())
        .replace("{topic}", topic)
        .replace("{profile}", profile)
        .replace("{grading}", grading)
}

pub fn build_recommendation_prompt(analysis: &str, subject: &str, grade: u8, topic: &str) -> String {
    RECOMMENDATION_USER_TEMPLATE
        .replace("{subject}", subject)
        .replace("{grade}", &grade.to_string())
        .replace("{topic}", topic)
        .replace("{analysis}", analysis)
}

pub fn build_lesson_review_prompt(lesson: &str, grade: u8) -> String {
    LESSON_REVIEW_TEMPLATE
        .replace("{grade}", &grade.to_string())
        .replace("{lesson}", truncate_chars(lesson, QA_LESSON_CHARS))
}

pub fn build_quiz_review_prompt(quiz_json: &str, grade: u8) -> String {
    QUIZ_REVIEW_TEMPLATE
        .replace("{grade}", &grade.to_string())
        .replace("{quiz}", truncate_chars(quiz_json, QA_QUIZ_CHARS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grading_prompt() {
        let prompt = build_grading_prompt(&GradingInput {
            subject: "algebra",
            grade: 8,
            question_type: "open",
            question: "x + 1 = 3",
            correct_answer: "2",
            student_answer: "3",
        });
        assert!(prompt.contains("Питання: x + 1 = 3"));
        assert!(prompt.contains("Правильна відповідь: 2"));
        assert!(prompt.contains("Відповідь учня: 3"));
        assert!(!prompt.contains("{"));
    }

    #[test]
    fn test_review_prompts_truncate() {
        let lesson = "в".repeat(QA_LESSON_CHARS * 2);
        let prompt = build_lesson_review_prompt(&lesson, 7);
        assert!(!prompt.contains(&"в".repeat(QA_LESSON_CHARS + 1)));
        assert!(prompt.contains("програмі 7 класу"));

        let quiz = "г".repeat(QA_QUIZ_CHARS * 2);
        let prompt = build_quiz_review_prompt(&quiz, 7);
        assert!(!prompt.contains(&"г".repeat(QA_QUIZ_CHARS + 1)));
    }
}
