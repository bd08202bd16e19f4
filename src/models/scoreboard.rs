// src/models/scoreboard.rs

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use validator::Validate;

use crate::models::quiz::Group;

/// Row ordering requested by the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Name,
    Score,
}

/// Which students the report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupFilter {
    #[default]
    All,
    Group(i64),
}

impl FromStr for GroupFilter {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "" | "all" | "0" => Ok(GroupFilter::All),
            other => other
                .parse::<i64>()
                .ok()
                .filter(|id| *id > 0)
                .map(GroupFilter::Group)
                .ok_or_else(|| format!("invalid group '{}': expected a group id or 'all'", other)),
        }
    }
}

impl fmt::Display for GroupFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupFilter::All => f.write_str("all"),
            GroupFilter::Group(id) => write!(f, "{}", id),
        }
    }
}

impl Serialize for GroupFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for GroupFilter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Query options of the scoreboard endpoint: `?order=name|score&group=<id>|all`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportParams {
    #[serde(default)]
    pub order: SortOrder,
    #[serde(default)]
    pub group: GroupFilter,
}

/// Query of the polling endpoint.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct FreshnessParams {
    /// Token the client rendered its table with.
    #[validate(range(min = 0))]
    pub since: Option<i64>,
    /// Consecutive unchanged polls so far.
    #[validate(range(max = 1_000_000))]
    pub polls: Option<u64>,
}

/// Opaque change-detection token: the latest step timestamp of the quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FreshnessToken(pub i64);

#[derive(Debug, Serialize)]
pub struct FreshnessResponse {
    pub token: FreshnessToken,
    pub changed: bool,
    /// The client should stop polling and show its refresh notice.
    pub stale: bool,
}

/// Visual class of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CellClass {
    Correct,
    Partial,
    Wrong,
    /// Attempted and scored exactly zero.
    Zero,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cell {
    pub slot: i32,
    pub fraction: f64,
    pub max_mark: f64,
    /// `fraction × max_mark`.
    pub mark: f64,
    pub class: CellClass,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub parts: BTreeMap<u32, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreboardRow {
    pub user_id: i64,
    pub name: String,
    pub total: f64,
    pub percent: f64,
    /// One entry per slot in quiz order; `None` renders as a blank cell.
    pub cells: Vec<Option<Cell>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotHeader {
    pub slot: i32,
    pub question_id: i64,
    pub name: String,
    pub max_mark: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshInfo {
    pub token: FreshnessToken,
    pub interval_secs: u64,
    pub max_polls: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreboardReport {
    pub quiz_id: i64,
    pub quiz_name: String,
    pub order: SortOrder,
    pub group: GroupFilter,
    pub headers: Vec<SlotHeader>,
    pub rows: Vec<ScoreboardRow>,
    pub total_possible: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<Group>,
    pub refresh: RefreshInfo,
    pub generated_at: chrono::DateTime<chrono::Utc>,
}
