// src/scoring/grader.rs

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::{
    error::ScoreboardError,
    models::question::QuestionKind,
    scoring::response::Response,
};

/// Outcome of grading one response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Grade {
    /// Normalized score in `[0, 1]`.
    pub fraction: f64,
    /// Per-part fractions for multi-part questions, keyed by part index.
    pub parts: BTreeMap<u32, f64>,
}

impl Grade {
    pub fn whole(fraction: f64) -> Self {
        Self {
            fraction,
            parts: BTreeMap::new(),
        }
    }
}

/// Automatic grading capability of a question.
pub trait Grader: Send + Sync + fmt::Debug {
    fn grade(&self, response: &Response) -> Result<Grade, ScoreboardError>;

    /// Number of sub-questions when the question is multi-part.
    fn part_count(&self) -> Option<usize> {
        None
    }
}

/// Represents one row of the 'question_answers' table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct AnswerKey {
    pub answer: String,
    pub fraction: f64,
    /// Accepted error for numerical answers.
    #[sqlx(default)]
    pub tolerance: Option<f64>,
}

impl AnswerKey {
    pub fn new(answer: impl Into<String>, fraction: f64) -> Self {
        Self {
            answer: answer.into(),
            fraction,
            tolerance: None,
        }
    }
}

fn single_answer(response: &Response) -> Result<&str, ScoreboardError> {
    match response {
        Response::Fields(fields) => fields.get("answer").map(|s| s.trim()).ok_or_else(|| {
            ScoreboardError::MalformedResponse("response has no 'answer' field".to_string())
        }),
        Response::Composite(_) => Err(ScoreboardError::MalformedResponse(
            "multi-part response given to a single-answer question".to_string(),
        )),
    }
}

/// Text answers (short answer questions).
///
/// The first answer that matches wins. `*` in an answer matches any run of characters.
#[derive(Debug)]
pub struct ExactMatchGrader {
    patterns: Vec<(Regex, f64)>,
}

impl ExactMatchGrader {
    pub fn new(answers: &[AnswerKey], case_sensitive: bool) -> Result<Self, ScoreboardError> {
        let patterns = answers
            .iter()
            .map(|key| {
                let body = key
                    .answer
                    .trim()
                    .split('*')
                    .map(regex::escape)
                    .collect::<Vec<_>>()
                    .join(".*");
                let flags = if case_sensitive { "" } else { "(?i)" };
                Regex::new(&format!("{}^{}$", flags, body))
                    .map(|re| (re, key.fraction))
                    .map_err(|e| ScoreboardError::MalformedResponse(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { patterns })
    }
}

impl Grader for ExactMatchGrader {
    fn grade(&self, response: &Response) -> Result<Grade, ScoreboardError> {
        let answer = single_answer(response)?;
        let fraction = self
            .patterns
            .iter()
            .find(|(re, _)| re.is_match(answer))
            .map(|(_, fraction)| *fraction)
            .unwrap_or(0.0);

        Ok(Grade::whole(fraction))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum NumericTarget {
    Any,
    Value { value: f64, tolerance: f64 },
}

/// Numerical questions: the first answer within its tolerance wins.
#[derive(Debug)]
pub struct NumericalGrader {
    targets: Vec<(NumericTarget, f64)>,
}

impl NumericalGrader {
    pub fn new(answers: &[AnswerKey]) -> Result<Self, ScoreboardError> {
        let targets = answers
            .iter()
            .map(|key| {
                let text = key.answer.trim();
                let target = if text == "*" {
                    NumericTarget::Any
                } else {
                    let value = text.parse::<f64>().map_err(|_| {
                        ScoreboardError::MalformedResponse(format!("numerical answer '{}' is not a number", text))
                    })?;
                    NumericTarget::Value {
                        value,
                        tolerance: key.tolerance.unwrap_or(0.0).abs(),
                    }
                };
                Ok((target, key.fraction))
            })
            .collect::<Result<Vec<_>, ScoreboardError>>()?;

        Ok(Self { targets })
    }
}

impl Grader for NumericalGrader {
    fn grade(&self, response: &Response) -> Result<Grade, ScoreboardError> {
        let raw = single_answer(response)?;
        let given = raw.parse::<f64>().map_err(|_| {
            ScoreboardError::MalformedResponse(format!("'{}' is not a number", raw))
        })?;

        let fraction = self
            .targets
            .iter()
            .find(|(target, _)| match target {
                NumericTarget::Any => true,
                NumericTarget::Value { value, tolerance } => (given - value).abs() <= *tolerance,
            })
            .map(|(_, fraction)| *fraction)
            .unwrap_or(0.0);

        Ok(Grade::whole(fraction))
    }
}

/// Cloze questions: each part is graded by its own sub-grader.
///
/// The overall fraction weights every part by its default mark; unanswered
/// parts count as 0.
#[derive(Debug)]
pub struct MultiPartGrader {
    parts: Vec<(Arc<dyn Grader>, f64)>,
}

impl MultiPartGrader {
    /// `parts[0]` grades `sub1_answer`, `parts[1]` grades `sub2_answer`, and so on.
    pub fn new(parts: Vec<Arc<dyn Grader>>) -> Self {
        Self::weighted(parts.into_iter().map(|grader| (grader, 1.0)).collect())
    }

    /// Parts paired with their default marks. Negative weights count as 0.
    pub fn weighted(parts: Vec<(Arc<dyn Grader>, f64)>) -> Self {
        let parts = parts
            .into_iter()
            .map(|(grader, weight)| (grader, weight.max(0.0)))
            .collect();
        Self { parts }
    }

    fn weight(&self, index: u32) -> f64 {
        let total: f64 = self.parts.iter().map(|(_, w)| w).sum();
        let position = index as usize - 1;
        if total > 0.0 {
            self.parts[position].1 / total
        } else {
            1.0 / self.parts.len() as f64
        }
    }
}

impl Grader for MultiPartGrader {
    fn grade(&self, response: &Response) -> Result<Grade, ScoreboardError> {
        let answers = match response {
            Response::Composite(parts) => parts,
            Response::Fields(_) => {
                return Err(ScoreboardError::MalformedResponse(
                    "multi-part question expects sub-answers".to_string(),
                ));
            }
        };

        if self.parts.is_empty() {
            return Ok(Grade::default());
        }

        let mut grade = Grade::default();
        for (index, value) in answers {
            let (sub, _) = (*index as usize)
                .checked_sub(1)
                .and_then(|i| self.parts.get(i))
                .ok_or_else(|| {
                    ScoreboardError::MalformedResponse(format!("question has no part {}", index))
                })?;
            if value.trim().is_empty() {
                grade.parts.insert(*index, 0.0);
                continue;
            }
            let part = sub.grade(&Response::single(value.clone()))?;
            grade.parts.insert(*index, part.fraction.clamp(0.0, 1.0));
        }

        grade.fraction = grade
            .parts
            .iter()
            .map(|(index, fraction)| self.weight(*index) * fraction)
            .sum();
        Ok(grade)
    }

    fn part_count(&self) -> Option<usize> {
        Some(self.parts.len())
    }
}

/// Stored definition a question's grader is built from.
#[derive(Debug, Clone, Default)]
pub struct QuestionDefinition {
    pub answers: Vec<AnswerKey>,
    /// `usecase` of short answer questions.
    pub case_sensitive: bool,
    /// Kinds and default marks of a cloze question's sub-questions, in part order.
    pub parts: Vec<(QuestionKind, f64)>,
}

impl QuestionDefinition {
    pub fn answers(answers: Vec<AnswerKey>) -> Self {
        Self {
            answers,
            ..Self::default()
        }
    }
}

/// Picks the marking capability of a question from its stored definition.
///
/// A definition no grader can be built from (say, a numerical answer that is
/// not a number) is logged and treated as externally graded, so only the
/// host's stored fractions count for it.
pub fn question_kind(
    qtype: &str,
    definition: QuestionDefinition,
    external_qtypes: &[String],
) -> QuestionKind {
    if external_qtypes.iter().any(|q| q == qtype) {
        return QuestionKind::UngradableExternal;
    }

    let built: Result<Arc<dyn Grader>, ScoreboardError> = match qtype {
        "essay" => return QuestionKind::UngradableManual,
        "shortanswer" => ExactMatchGrader::new(&definition.answers, definition.case_sensitive)
            .map(|g| Arc::new(g) as Arc<dyn Grader>),
        "numerical" => NumericalGrader::new(&definition.answers).map(|g| Arc::new(g) as Arc<dyn Grader>),
        "multianswer" => {
            let mut graders = Vec::with_capacity(definition.parts.len());
            for (part, weight) in definition.parts {
                match part {
                    QuestionKind::Gradable(grader) => graders.push((grader, weight)),
                    other => return other,
                }
            }
            Ok(Arc::new(MultiPartGrader::weighted(graders)))
        }
        _ => return QuestionKind::UngradableExternal,
    };

    match built {
        Ok(grader) => QuestionKind::Gradable(grader),
        Err(e) => {
            tracing::warn!(qtype, error = %e, "Cannot build grader, using stored fractions only");
            QuestionKind::UngradableExternal
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn composite(answers: &[(u32, &str)]) -> Response {
        Response::Composite(answers.iter().map(|(i, a)| (*i, a.to_string())).collect())
    }

    fn exact(answer: &str) -> Arc<dyn Grader> {
        Arc::new(ExactMatchGrader::new(&[AnswerKey::new(answer, 1.0)], true).unwrap())
    }

    #[test]
    fn exact_match_uses_first_matching_answer() {
        let grader = ExactMatchGrader::new(
            &[AnswerKey::new("Paris", 1.0), AnswerKey::new("Par*", 0.5), AnswerKey::new("*", 0.0)],
            false,
        )
        .unwrap();

        assert_eq!(grader.grade(&Response::single(" paris ")).unwrap().fraction, 1.0);
        assert_eq!(grader.grade(&Response::single("Parma")).unwrap().fraction, 0.5);
        assert_eq!(grader.grade(&Response::single("Rome")).unwrap().fraction, 0.0);
    }

    #[test]
    fn exact_match_escapes_regex_metacharacters() {
        let grader = ExactMatchGrader::new(&[AnswerKey::new("a+b", 1.0)], true).unwrap();
        assert_eq!(grader.grade(&Response::single("a+b")).unwrap().fraction, 1.0);
        assert_eq!(grader.grade(&Response::single("aab")).unwrap().fraction, 0.0);
    }

    #[test]
    fn case_sensitive_short_answer_rejects_wrong_case() {
        let external: Vec<String> = Vec::new();
        let definition = QuestionDefinition {
            case_sensitive: true,
            ..QuestionDefinition::answers(vec![AnswerKey::new("Paris", 1.0)])
        };
        let QuestionKind::Gradable(grader) = question_kind("shortanswer", definition, &external) else {
            panic!("short answer questions are auto-graded");
        };

        assert_eq!(grader.grade(&Response::single("paris")).unwrap().fraction, 0.0);
        assert_eq!(grader.grade(&Response::single("Paris")).unwrap().fraction, 1.0);

        let insensitive = QuestionDefinition::answers(vec![AnswerKey::new("Paris", 1.0)]);
        let QuestionKind::Gradable(grader) = question_kind("shortanswer", insensitive, &external) else {
            panic!("short answer questions are auto-graded");
        };
        assert_eq!(grader.grade(&Response::single("paris")).unwrap().fraction, 1.0);
    }

    #[test]
    fn numerical_respects_tolerance() {
        let key = AnswerKey {
            answer: "3.14".to_string(),
            fraction: 1.0,
            tolerance: Some(0.01),
        };
        let grader = NumericalGrader::new(&[key]).unwrap();

        assert_eq!(grader.grade(&Response::single("3.145")).unwrap().fraction, 1.0);
        assert_eq!(grader.grade(&Response::single("3.2")).unwrap().fraction, 0.0);
        assert!(matches!(
            grader.grade(&Response::single("pi")),
            Err(ScoreboardError::MalformedResponse(_))
        ));
    }

    #[test]
    fn multi_part_reports_each_part() {
        let grader = MultiPartGrader::new(vec![exact("x"), exact("y")]);

        let grade = grader.grade(&composite(&[(1, "x"), (2, "nope")])).unwrap();

        assert_eq!(grade.parts.get(&1), Some(&1.0));
        assert_eq!(grade.parts.get(&2), Some(&0.0));
        assert_eq!(grade.fraction, 0.5);
        assert_eq!(grader.part_count(), Some(2));
    }

    #[test]
    fn multi_part_weights_parts_by_default_mark() {
        let grader = MultiPartGrader::weighted(vec![(exact("x"), 1.0), (exact("y"), 3.0)]);

        let grade = grader.grade(&composite(&[(1, "wrong"), (2, "y")])).unwrap();
        assert_eq!(grade.fraction, 0.75);

        let grade = grader.grade(&composite(&[(1, "x")])).unwrap();
        assert_eq!(grade.fraction, 0.25);
    }

    #[test]
    fn multi_part_with_zero_weights_falls_back_to_the_mean() {
        let grader = MultiPartGrader::weighted(vec![(exact("x"), 0.0), (exact("y"), 0.0)]);

        let grade = grader.grade(&composite(&[(1, "x"), (2, "no")])).unwrap();
        assert_eq!(grade.fraction, 0.5);
    }

    #[test]
    fn question_kinds_follow_qtype() {
        let external = vec!["coderunner".to_string()];
        let answers = || QuestionDefinition::answers(vec![AnswerKey::new("x", 1.0)]);

        assert!(matches!(
            question_kind("essay", QuestionDefinition::default(), &external),
            QuestionKind::UngradableManual
        ));
        assert!(matches!(
            question_kind("coderunner", answers(), &external),
            QuestionKind::UngradableExternal
        ));
        assert!(matches!(
            question_kind("ddwtos", QuestionDefinition::default(), &external),
            QuestionKind::UngradableExternal
        ));
        assert!(matches!(
            question_kind("shortanswer", answers(), &external),
            QuestionKind::Gradable(_)
        ));
    }

    #[test]
    fn broken_answer_key_falls_back_to_stored_fractions() {
        let external: Vec<String> = Vec::new();
        let definition = QuestionDefinition::answers(vec![AnswerKey::new("three and a bit", 1.0)]);

        assert!(matches!(
            question_kind("numerical", definition, &external),
            QuestionKind::UngradableExternal
        ));
    }

    #[test]
    fn cloze_with_manual_part_is_not_auto_graded() {
        let external: Vec<String> = Vec::new();
        let definition = QuestionDefinition {
            parts: vec![
                (QuestionKind::Gradable(exact("x")), 1.0),
                (QuestionKind::UngradableManual, 1.0),
            ],
            ..QuestionDefinition::default()
        };
        assert!(matches!(
            question_kind("multianswer", definition, &external),
            QuestionKind::UngradableManual
        ));
    }

    #[test]
    fn multi_part_rejects_unknown_part() {
        let grader = MultiPartGrader::new(vec![exact("x")]);

        assert!(grader.grade(&composite(&[(3, "x")])).is_err());
    }
}
