use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use itertools::Itertools;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::dataset::{Dataset, OptionId, Question, QuestionId, QuestionKind, Variant};
use crate::error::SessionError;

/// Schema tag written with every persisted session.
pub const STATE_VERSION: u32 = 1;

/// A recorded answer: an option id for multi-choice, a boolean for yes/no.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Answer {
    Choice(OptionId),
    YesNo(bool),
}

impl Answer {
    pub fn choice(id: &str) -> Self {
        Self::Choice(OptionId::from(id))
    }

    pub fn variant(&self) -> Variant {
        match self {
            Answer::Choice(_) => Variant::MultiChoice,
            Answer::YesNo(_) => Variant::YesNo,
        }
    }

    fn from_stored(value: &Value, question: &Question) -> Option<Self> {
        match (&question.kind, value) {
            (QuestionKind::MultiChoice { .. }, Value::String(id)) => {
                question.option(id).map(|o| Answer::Choice(o.id.clone()))
            }
            (QuestionKind::YesNo { .. }, Value::Bool(b)) => Some(Answer::YesNo(*b)),
            _ => None,
        }
    }
}

/// One attempt at the quiz, exactly as it is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub version: u32,
    pub question_order: Vec<QuestionId>,
    pub answer_order: BTreeMap<QuestionId, Vec<OptionId>>,
    pub answers: BTreeMap<QuestionId, Answer>,
    pub current_index: usize,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub started_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
    pub finished: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_limit: Option<usize>,
}

impl SessionState {
    pub fn len(&self) -> usize {
        self.question_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.question_order.is_empty()
    }

    pub fn current_question_id(&self) -> Option<&QuestionId> {
        self.question_order.get(self.current_index)
    }

    pub fn is_last_question(&self) -> bool {
        self.current_index + 1 >= self.question_order.len()
    }

    pub fn answer(&self, id: &QuestionId) -> Option<&Answer> {
        self.answers.get(id)
    }

    pub fn current_answer(&self) -> Option<&Answer> {
        self.current_question_id().and_then(|id| self.answers.get(id))
    }

    pub fn option_order(&self, id: &QuestionId) -> Option<&[OptionId]> {
        self.answer_order.get(id).map(Vec::as_slice)
    }

    /// Share of questions already passed, rounded to a whole percent.
    pub fn progress_percent(&self) -> u16 {
        if self.question_order.is_empty() {
            return 0;
        }
        ((self.current_index as f64 / self.question_order.len() as f64) * 100.0).round() as u16
    }
}

/// Why a stored session could not be resumed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoadRejection {
    #[error("durable storage is unavailable")]
    Unavailable,

    #[error("no stored session")]
    Absent,

    #[error("session marker is missing or expired")]
    Expired,

    #[error("stored session is malformed: {0}")]
    Corrupt(String),

    #[error("stored session is stale: {0}")]
    Stale(StaleReason),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StaleReason {
    #[error("schema version {found} does not match {expected}")]
    VersionMismatch { found: u32, expected: u32 },

    #[error("none of the stored questions exist in the dataset")]
    NoKnownQuestions,

    #[error("debug limit changed from {stored:?} to {current:?}")]
    DebugLimitChanged {
        stored: Option<usize>,
        current: Option<usize>,
    },
}

/// A positive limit capped at the dataset size; anything else means no limit.
pub fn effective_limit(limit: Option<usize>, available: usize) -> Option<usize> {
    limit.filter(|l| *l > 0).map(|l| l.min(available))
}

/// Start a fresh session with a random question order and, for multi-choice,
/// a random option order per question.
///
/// # Errors
///
/// Returns `SessionError::EmptyDataset` when there is nothing to ask.
pub fn new_session<R: Rng + ?Sized>(
    dataset: &Dataset,
    debug_limit: Option<usize>,
    rng: &mut R,
    now: DateTime<Utc>,
) -> Result<SessionState, SessionError> {
    if dataset.is_empty() {
        return Err(SessionError::EmptyDataset);
    }

    let mut question_order: Vec<QuestionId> = dataset.ids().cloned().collect();
    question_order.shuffle(rng);

    let limit = match dataset.variant() {
        Variant::YesNo => effective_limit(debug_limit, dataset.len()),
        Variant::MultiChoice => None,
    };
    if let Some(limit) = limit {
        question_order.truncate(limit);
    }

    let answer_order = match dataset.variant() {
        Variant::MultiChoice => question_order
            .iter()
            .filter_map(|id| dataset.question(id.as_str()))
            .map(|q| (q.id.clone(), shuffled_order(dataset, q, rng)))
            .collect(),
        Variant::YesNo => BTreeMap::new(),
    };

    Ok(SessionState {
        version: STATE_VERSION,
        question_order,
        answer_order,
        answers: BTreeMap::new(),
        current_index: 0,
        started_at: now,
        updated_at: now,
        finished: false,
        debug_limit: limit,
    })
}

fn shuffled_order<R: Rng + ?Sized>(dataset: &Dataset, question: &Question, rng: &mut R) -> Vec<OptionId> {
    let mut ids = question.option_ids();
    ids.shuffle(rng);
    dataset.display_order(question, ids)
}

/// Loosely typed persisted shape. Fields the normalizer can repair are kept
/// as raw JSON values.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredSession {
    version: u32,
    question_order: Vec<Value>,
    current_index: f64,
    answers: Map<String, Value>,
    #[serde(default)]
    answer_order: Option<Map<String, Value>>,
    #[serde(default)]
    started_at: Value,
    #[serde(default)]
    updated_at: Value,
    #[serde(default)]
    finished: Value,
    #[serde(default)]
    debug_limit: Value,
}

/// Parse a persisted session and normalize it against the current dataset
/// and debug configuration.
///
/// # Errors
///
/// Returns `LoadRejection::Corrupt` for payloads that do not have the
/// session shape and `LoadRejection::Stale` for sessions that no longer fit.
pub fn restore<R: Rng + ?Sized>(
    raw: &str,
    dataset: &Dataset,
    debug_limit: Option<usize>,
    rng: &mut R,
    now: DateTime<Utc>,
) -> Result<SessionState, LoadRejection> {
    let stored: StoredSession =
        serde_json::from_str(raw).map_err(|e| LoadRejection::Corrupt(e.to_string()))?;

    if stored.version != STATE_VERSION {
        return Err(LoadRejection::Stale(StaleReason::VersionMismatch {
            found: stored.version,
            expected: STATE_VERSION,
        }));
    }
    if stored.question_order.is_empty() {
        return Err(LoadRejection::Corrupt("questionOrder is empty".into()));
    }
    let variant = dataset.variant();
    if variant == Variant::MultiChoice && stored.answer_order.is_none() {
        return Err(LoadRejection::Corrupt("answerOrder is missing".into()));
    }

    let limit = match variant {
        Variant::YesNo => {
            let current = effective_limit(debug_limit, dataset.len());
            let stored_limit = stored
                .debug_limit
                .as_f64()
                .filter(|l| *l > 0.0)
                .map(|l| l.min(dataset.len() as f64));
            if stored_limit != current.map(|l| l as f64) {
                return Err(LoadRejection::Stale(StaleReason::DebugLimitChanged {
                    stored: stored_limit.map(|l| l as usize),
                    current,
                }));
            }
            current
        }
        Variant::MultiChoice => None,
    };

    let mut seen = HashSet::new();
    let mut question_order: Vec<QuestionId> = stored
        .question_order
        .iter()
        .filter_map(Value::as_str)
        .filter_map(|id| dataset.question(id))
        .map(|q| q.id.clone())
        .filter(|id| seen.insert(id.clone()))
        .collect();
    if let Some(limit) = limit {
        question_order.truncate(limit);
    }
    if question_order.is_empty() {
        return Err(LoadRejection::Stale(StaleReason::NoKnownQuestions));
    }

    let answer_order = match (variant, stored.answer_order) {
        (Variant::MultiChoice, Some(orders)) => question_order
            .iter()
            .filter_map(|id| dataset.question(id.as_str()))
            .map(|q| {
                let order = restore_option_order(dataset, q, orders.get(q.id.as_str()), rng);
                (q.id.clone(), order)
            })
            .collect(),
        _ => BTreeMap::new(),
    };

    let ranked: HashSet<&QuestionId> = question_order.iter().collect();
    let answers = stored
        .answers
        .iter()
        .filter_map(|(id, value)| {
            let question = dataset.question(id)?;
            if !ranked.contains(&question.id) {
                return None;
            }
            Answer::from_stored(value, question).map(|a| (question.id.clone(), a))
        })
        .collect();

    let current_index = clamp_index(stored.current_index, question_order.len());

    Ok(SessionState {
        version: STATE_VERSION,
        question_order,
        answer_order,
        answers,
        current_index,
        started_at: coerce_timestamp(&stored.started_at, now),
        updated_at: coerce_timestamp(&stored.updated_at, now),
        finished: truthy(&stored.finished),
        debug_limit: limit,
    })
}

fn restore_option_order<R: Rng + ?Sized>(
    dataset: &Dataset,
    question: &Question,
    stored: Option<&Value>,
    rng: &mut R,
) -> Vec<OptionId> {
    let expected = question.option_ids();
    let candidate: Option<Vec<OptionId>> = stored.and_then(Value::as_array).map(|ids| {
        ids.iter()
            .filter_map(Value::as_str)
            .filter(|id| question.option(id).is_some())
            .map(OptionId::from)
            .collect()
    });

    match candidate {
        Some(order) if is_permutation(&order, &expected) => dataset.display_order(question, order),
        _ => shuffled_order(dataset, question, rng),
    }
}

fn is_permutation(order: &[OptionId], expected: &[OptionId]) -> bool {
    order.len() == expected.len()
        && order.iter().all_unique()
        && order.iter().all(|id| expected.contains(id))
}

fn clamp_index(raw: f64, len: usize) -> usize {
    if !raw.is_finite() || raw <= 0.0 || len == 0 {
        return 0;
    }
    (raw.floor() as usize).min(len - 1)
}

fn coerce_timestamp(value: &Value, now: DateTime<Utc>) -> DateTime<Utc> {
    let millis = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    millis
        .filter(|m| m.is_finite() && *m != 0.0)
        .and_then(|m| DateTime::<Utc>::from_timestamp_millis(m as i64))
        .unwrap_or(now)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
