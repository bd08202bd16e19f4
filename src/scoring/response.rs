// src/scoring/response.rs

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::{error::ScoreboardError, models::quiz::StepDatum};

/// Sub-answer keys of multi-part (cloze) questions: `sub1_answer`, `sub2_answer`, ...
static SUB_ANSWER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^sub(\d+)_answer$").expect("sub-answer pattern compiles"));

/// A student's response as handed to a grader.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Named response fields of a single-answer question.
    Fields(BTreeMap<String, String>),
    /// Sub-answers of a multi-part question keyed by part index (from 1).
    Composite(BTreeMap<u32, String>),
}

impl Response {
    pub fn single(answer: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert("answer".to_string(), answer.into());
        Response::Fields(fields)
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Response::Fields(fields) => fields.is_empty(),
            Response::Composite(parts) => parts.is_empty(),
        }
    }

    /// Regroups `subN_answer` fields into a composite response.
    ///
    /// Fields that do not start with `sub` are ignored. A field that starts
    /// with `sub` but does not follow the pattern makes the whole response
    /// malformed.
    pub fn reassemble(fields: &BTreeMap<String, String>) -> Result<Self, ScoreboardError> {
        let mut parts = BTreeMap::new();

        for (name, value) in fields {
            if !name.starts_with("sub") {
                continue;
            }
            let index = SUB_ANSWER
                .captures(name)
                .and_then(|caps| caps[1].parse::<u32>().ok())
                .filter(|index| *index > 0)
                .ok_or_else(|| {
                    ScoreboardError::MalformedResponse(format!("unexpected sub-answer key '{}'", name))
                })?;
            parts.insert(index, value.clone());
        }

        Ok(Response::Composite(parts))
    }
}

/// Folds a step's data into the running response fields.
///
/// Later steps overwrite earlier values of the same name. Control data is dropped.
pub fn accumulate(fields: &mut BTreeMap<String, String>, data: &[StepDatum]) {
    for datum in data.iter().filter(|d| !d.is_control()) {
        fields.insert(datum.name.clone(), datum.value.clone());
    }
}
