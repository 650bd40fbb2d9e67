use crate::normalize::normalize_question;
use serde_json::Value;
use std::collections::HashSet;
use study_models::{Evaluation, Question, QuestionType, StudyError};

/// Token recall at or above this counts as a correct short answer.
pub const PASS_THRESHOLD: f64 = 0.6;

/// Lowercase, keep letters and digits, collapse everything else to single spaces.
pub fn normalize_answer(text: &str) -> String {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn tokens(normalized: &str) -> HashSet<&str> {
    normalized.split(' ').filter(|t| !t.is_empty()).collect()
}

/// Share of the reference's distinct tokens present in the answer.
fn token_recall(answer: &str, reference: &str) -> f64 {
    let reference = tokens(reference);
    if reference.is_empty() {
        return 0.0;
    }
    let answer = tokens(answer);
    let hits = reference.iter().filter(|t| answer.contains(*t)).count();
    hits as f64 / reference.len() as f64
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn expected_list(question: &Question) -> String {
    question.correct_answers.join(", ")
}

fn evaluate_choice(user_answer: &str, question: &Question) -> Evaluation {
    let correct: Vec<(String, &String)> = question
        .correct_answers
        .iter()
        .map(|a| (normalize_answer(a), a))
        .collect();

    if question.question_type == QuestionType::McqMulti {
        let picked: HashSet<String> = user_answer
            .split([',', ';', '\n'])
            .map(normalize_answer)
            .filter(|s| !s.is_empty())
            .collect();
        let matched: Vec<&String> = correct
            .iter()
            .filter(|(norm, _)| picked.contains(norm))
            .map(|(_, original)| *original)
            .collect();
        let extra = picked
            .iter()
            .filter(|p| !correct.iter().any(|(norm, _)| norm == *p))
            .count();
        let all = !correct.is_empty() && matched.len() == correct.len() && extra == 0;
        let score = if correct.is_empty() {
            0.0
        } else {
            round2(matched.len() as f64 / (correct.len() + extra) as f64)
        };
        return Evaluation {
            correct: all,
            score: if all { 1.0 } else { score },
            matched_answer: matched.first().map(|s| s.to_string()),
            feedback: if all {
                "Correct.".to_string()
            } else {
                format!("Incorrect. Expected: {}", expected_list(question))
            },
        };
    }

    let answer = normalize_answer(user_answer);
    let matched = correct
        .iter()
        .find(|(norm, _)| !answer.is_empty() && *norm == answer)
        .map(|(_, original)| original.to_string());
    let is_correct = matched.is_some();
    Evaluation {
        correct: is_correct,
        score: if is_correct { 1.0 } else { 0.0 },
        matched_answer: matched,
        feedback: if is_correct {
            "Correct.".to_string()
        } else {
            format!("Incorrect. Expected: {}", expected_list(question))
        },
    }
}

fn evaluate_free_text(user_answer: &str, question: &Question) -> Evaluation {
    let answer = normalize_answer(user_answer);
    if question.correct_answers.is_empty() {
        return Evaluation {
            correct: false,
            score: 0.0,
            matched_answer: None,
            feedback: "No reference answer available for this question.".to_string(),
        };
    }
    if answer.is_empty() {
        return Evaluation {
            correct: false,
            score: 0.0,
            matched_answer: None,
            feedback: format!("No answer given. Expected: {}", question.correct_answers[0]),
        };
    }

    let mut best: Option<(f64, &String)> = None;
    for reference in &question.correct_answers {
        let normalized = normalize_answer(reference);
        let score = if normalized == answer {
            1.0
        } else {
            token_recall(&answer, &normalized)
        };
        if best.map_or(true, |(s, _)| score > s) {
            best = Some((score, reference));
        }
    }

    let (score, reference) = match best {
        Some(found) => found,
        None => (0.0, &question.correct_answers[0]),
    };
    let correct = score >= PASS_THRESHOLD;
    let feedback = if score >= 1.0 {
        "Correct.".to_string()
    } else if correct {
        format!("Mostly correct. Reference answer: {}", reference)
    } else if score > 0.0 {
        format!("Partially correct. Reference answer: {}", reference)
    } else {
        format!("Incorrect. Reference answer: {}", reference)
    };

    Evaluation {
        correct,
        score: round2(score),
        matched_answer: if score > 0.0 { Some(reference.clone()) } else { None },
        feedback,
    }
}

/// Grade a user's answer against a normalised question.
pub fn evaluate_answer(user_answer: &str, question: &Question) -> Evaluation {
    if question.question_type.is_choice() {
        evaluate_choice(user_answer, question)
    } else {
        evaluate_free_text(user_answer, question)
    }
}

/// Normalise a loosely shaped question and grade the answer against it.
pub fn evaluate_short_answer(user_answer: &str, question: &Value) -> Result<Evaluation, StudyError> {
    let question = normalize_question(question, 1).ok_or_else(|| StudyError::InvalidRequest {
        reason: "question must be an object with a supported type".to_string(),
    })?;
    Ok(evaluate_answer(user_answer, &question))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalization() {
        assert_eq!(normalize_answer("  The Borrow-Checker!! "), "the borrow checker");
        assert_eq!(normalize_answer("..."), "");
    }

    #[test]
    fn short_answer_exact_and_partial() {
        let q = json!({
            "type": "answer_short_question",
            "correctAnswers": ["the borrow checker enforces ownership rules", "borrowck"]
        });

        let exact = evaluate_short_answer("BorrowCK", &q).unwrap();
        assert!(exact.correct);
        assert_eq!(exact.score, 1.0);
        assert_eq!(exact.matched_answer.as_deref(), Some("borrowck"));
        assert_eq!(exact.feedback, "Correct.");

        let close = evaluate_short_answer("borrow checker enforces rules", &q).unwrap();
        assert!(close.correct);
        assert_eq!(close.score, 0.67);

        let weak = evaluate_short_answer("ownership", &q).unwrap();
        assert!(!weak.correct);
        assert_eq!(weak.score, 0.17);
        assert!(weak.feedback.starts_with("Partially correct."));

        let wrong = evaluate_short_answer("garbage collector", &q).unwrap();
        assert!(!wrong.correct);
        assert_eq!(wrong.score, 0.0);
        assert!(wrong.matched_answer.is_none());
    }

    #[test]
    fn blank_answer_and_missing_reference() {
        let q = json!({"type": "answer_short_question", "correctAnswers": ["traits"]});
        let blank = evaluate_short_answer("   ", &q).unwrap();
        assert!(!blank.correct);
        assert_eq!(blank.feedback, "No answer given. Expected: traits");

        let no_ref = json!({"type": "answer_short_question"});
        let eval = evaluate_short_answer("anything", &no_ref).unwrap();
        assert!(!eval.correct);
        assert_eq!(eval.score, 0.0);
    }

    #[test]
    fn single_choice_compares_normalized_text() {
        let q = json!({
            "type": "mcq_single",
            "options": ["Stack", "Heap", "Register", "Disk"],
            "correctAnswers": ["Heap"]
        });
        let ok = evaluate_short_answer(" heap ", &q).unwrap();
        assert!(ok.correct);
        assert_eq!(ok.matched_answer.as_deref(), Some("Heap"));

        let bad = evaluate_short_answer("Stack", &q).unwrap();
        assert!(!bad.correct);
        assert_eq!(bad.feedback, "Incorrect. Expected: Heap");
    }

    #[test]
    fn true_false_answers() {
        let q = json!({"type": "true_false", "correctAnswers": ["True"]});
        assert!(evaluate_short_answer("true", &q).unwrap().correct);
        assert!(!evaluate_short_answer("False", &q).unwrap().correct);
    }

    #[test]
    fn multi_choice_needs_the_exact_set() {
        let q = json!({
            "type": "mcq_multi",
            "options": ["Vec", "HashMap", "i32", "String"],
            "correctAnswers": ["Vec", "String"]
        });
        let all = evaluate_short_answer("string, vec", &q).unwrap();
        assert!(all.correct);
        assert_eq!(all.score, 1.0);

        let half = evaluate_short_answer("Vec", &q).unwrap();
        assert!(!half.correct);
        assert_eq!(half.score, 0.5);

        let extra = evaluate_short_answer("Vec; String; i32", &q).unwrap();
        assert!(!extra.correct);
        assert_eq!(extra.score, 0.67);
    }

    #[test]
    fn unsupported_question_is_rejected() {
        let err = evaluate_short_answer("x", &json!({"type": "essay"})).unwrap_err();
        assert_eq!(err.http_status(), 422);
        assert!(evaluate_short_answer("x", &json!("not an object")).is_err());
    }
}
