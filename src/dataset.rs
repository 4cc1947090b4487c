use std::borrow::Borrow;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use include_dir::{include_dir, Dir};
use serde::{Deserialize, Serialize};

use crate::catch_all::{catch_all_last, CatchAllRule, NoCatchAll, OptionPredicate};
use crate::error::DatasetError;

static DATA_DIR: Dir = include_dir!("src/data");

/// Unique identifier of a question record
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(String);

/// Identifier of an answer option, unique within its question
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionId(String);

macro_rules! string_id {
    ($name:ident) => {
        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:?})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(QuestionId);
string_id!(OptionId);

/// The two quiz flavours: pick one option, or answer yes/no.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "kebab-case")]
pub enum Variant {
    #[default]
    MultiChoice,
    YesNo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerOption {
    pub id: OptionId,
    pub label: String,
    pub is_correct: bool,
}

impl AnswerOption {
    pub fn new(id: &str, label: &str, is_correct: bool) -> Self {
        Self {
            id: OptionId::from(id),
            label: label.to_owned(),
            is_correct,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionKind {
    MultiChoice { options: Vec<AnswerOption> },
    YesNo { correct_answer: bool },
}

/// Canonical question record. `text` is already resolved from the legacy
/// field name, so consumers never look at the raw shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    pub support: Option<String>,
    pub kind: QuestionKind,
}

impl Question {
    pub fn multi_choice(id: &str, text: &str, options: Vec<AnswerOption>) -> Self {
        Self {
            id: QuestionId::from(id),
            text: text.to_owned(),
            support: None,
            kind: QuestionKind::MultiChoice { options },
        }
    }

    pub fn yes_no(id: &str, text: &str, correct_answer: bool) -> Self {
        Self {
            id: QuestionId::from(id),
            text: text.to_owned(),
            support: None,
            kind: QuestionKind::YesNo { correct_answer },
        }
    }

    pub fn with_support(mut self, support: &str) -> Self {
        self.support = Some(support.to_owned());
        self
    }

    /// Options in dataset order; empty for yes/no questions.
    pub fn options(&self) -> &[AnswerOption] {
        match &self.kind {
            QuestionKind::MultiChoice { options } => options,
            QuestionKind::YesNo { .. } => &[],
        }
    }

    pub fn option(&self, id: &str) -> Option<&AnswerOption> {
        self.options().iter().find(|o| o.id.as_str() == id)
    }

    pub fn option_ids(&self) -> Vec<OptionId> {
        self.options().iter().map(|o| o.id.clone()).collect()
    }

    /// First option flagged correct.
    pub fn correct_option(&self) -> Option<&AnswerOption> {
        self.options().iter().find(|o| o.is_correct)
    }

    fn variant(&self) -> Variant {
        match self.kind {
            QuestionKind::MultiChoice { .. } => Variant::MultiChoice,
            QuestionKind::YesNo { .. } => Variant::YesNo,
        }
    }
}

/// Read-only, ordered question collection with its catch-all predicate.
#[derive(Debug, Clone)]
pub struct Dataset {
    name: String,
    variant: Variant,
    questions: Vec<Question>,
    index: HashMap<QuestionId, usize>,
    catch_all: Arc<dyn OptionPredicate>,
}

impl Dataset {
    /// Build a dataset from canonical records.
    ///
    /// # Errors
    ///
    /// Returns `DatasetError` when ids repeat, a record does not fit the
    /// variant, or a multi-choice record has no usable options.
    pub fn new(
        name: impl Into<String>,
        variant: Variant,
        questions: Vec<Question>,
    ) -> Result<Self, DatasetError> {
        let mut index = HashMap::with_capacity(questions.len());
        for (position, question) in questions.iter().enumerate() {
            validate_question(question, variant)?;
            if index.insert(question.id.clone(), position).is_some() {
                return Err(DatasetError::DuplicateQuestion(question.id.clone()));
            }
        }

        Ok(Self {
            name: name.into(),
            variant,
            questions,
            index,
            catch_all: Arc::new(NoCatchAll),
        })
    }

    /// Replace the predicate that decides which options must be shown last.
    pub fn with_catch_all(mut self, predicate: impl OptionPredicate + 'static) -> Self {
        self.catch_all = Arc::new(predicate);
        self
    }

    /// Parse a dataset file.
    ///
    /// # Errors
    ///
    /// Returns `DatasetError::Parse` for malformed JSON and the validation
    /// errors of [`Dataset::new`].
    pub fn from_json_str(json: &str) -> Result<Self, DatasetError> {
        let raw: RawDataset = serde_json::from_str(json)?;
        let variant = raw.variant;
        let questions = raw
            .questions
            .into_iter()
            .map(|q| q.into_question(variant))
            .collect::<Result<Vec<_>, _>>()?;

        let dataset = Self::new(raw.name, variant, questions)?;
        Ok(match raw.catch_all {
            Some(spec) => dataset.with_catch_all(CatchAllRule::new(&spec.label, spec.contains.as_deref())),
            None => dataset,
        })
    }

    /// # Errors
    ///
    /// Returns `DatasetError::Io` if the file cannot be read.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, DatasetError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// The dataset shipped with the binary for `variant`.
    ///
    /// # Errors
    ///
    /// Returns `DatasetError::NotFound` if the embedded file is missing.
    pub fn builtin(variant: Variant) -> Result<Self, DatasetError> {
        let file_name = match variant {
            Variant::MultiChoice => "questions.json",
            Variant::YesNo => "questions_yesno.json",
        };
        let json = DATA_DIR
            .get_file(file_name)
            .and_then(|f| f.contents_utf8())
            .ok_or_else(|| DatasetError::NotFound(file_name.to_owned()))?;
        Self::from_json_str(json)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn question(&self, id: &str) -> Option<&Question> {
        self.index.get(id).map(|&i| &self.questions[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &QuestionId> {
        self.questions.iter().map(|q| &q.id)
    }

    pub fn catch_all(&self) -> &dyn OptionPredicate {
        self.catch_all.as_ref()
    }

    /// Reorder `order` so catch-all options of `question` come last.
    pub fn display_order(&self, question: &Question, order: Vec<OptionId>) -> Vec<OptionId> {
        catch_all_last(self.catch_all(), question.options(), order)
    }
}

fn validate_question(question: &Question, variant: Variant) -> Result<(), DatasetError> {
    if question.variant() != variant {
        return match variant {
            Variant::MultiChoice => Err(DatasetError::MissingOptions {
                id: question.id.clone(),
            }),
            Variant::YesNo => Err(DatasetError::MissingCorrectAnswer {
                id: question.id.clone(),
            }),
        };
    }

    if let QuestionKind::MultiChoice { options } = &question.kind {
        if options.is_empty() {
            return Err(DatasetError::MissingOptions {
                id: question.id.clone(),
            });
        }
        let mut seen = HashSet::with_capacity(options.len());
        for option in options {
            if !seen.insert(&option.id) {
                return Err(DatasetError::DuplicateOption {
                    id: question.id.clone(),
                    option: option.id.clone(),
                });
            }
        }
        if !options.iter().any(|o| o.is_correct) {
            return Err(DatasetError::NoCorrectOption {
                id: question.id.clone(),
            });
        }
    }

    Ok(())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDataset {
    #[serde(default)]
    name: String,
    variant: Variant,
    #[serde(default)]
    catch_all: Option<CatchAllSpec>,
    questions: Vec<RawQuestion>,
}

#[derive(Deserialize)]
struct CatchAllSpec {
    label: String,
    #[serde(default)]
    contains: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawQuestion {
    id: QuestionId,
    #[serde(default)]
    text: Option<String>,
    #[serde(default, rename = "Question")]
    legacy_text: Option<String>,
    #[serde(default)]
    support: Option<String>,
    #[serde(default)]
    options: Option<Vec<RawOption>>,
    #[serde(default)]
    correct_answer: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOption {
    id: OptionId,
    label: String,
    #[serde(default)]
    is_correct: bool,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
}

impl RawQuestion {
    fn into_question(self, variant: Variant) -> Result<Question, DatasetError> {
        let text = non_blank(self.text)
            .or_else(|| non_blank(self.legacy_text))
            .unwrap_or_default();

        let kind = match variant {
            Variant::MultiChoice => {
                let options = self
                    .options
                    .ok_or_else(|| DatasetError::MissingOptions { id: self.id.clone() })?;
                QuestionKind::MultiChoice {
                    options: options
                        .into_iter()
                        .map(|o| AnswerOption {
                            id: o.id,
                            label: o.label,
                            is_correct: o.is_correct,
                        })
                        .collect(),
                }
            }
            Variant::YesNo => QuestionKind::YesNo {
                correct_answer: self
                    .correct_answer
                    .ok_or_else(|| DatasetError::MissingCorrectAnswer { id: self.id.clone() })?,
            },
        };

        Ok(Question {
            id: self.id,
            text,
            support: non_blank(self.support),
            kind,
        })
    }
}
