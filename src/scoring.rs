use crate::dataset::{Dataset, OptionId, Question, QuestionId, QuestionKind};
use crate::session::{Answer, SessionState};

pub const YES_LABEL: &str = "ΝΑΙ";
pub const NO_LABEL: &str = "ΟΧΙ";

pub fn yes_no_label(value: bool) -> &'static str {
    if value {
        YES_LABEL
    } else {
        NO_LABEL
    }
}

/// How an option is highlighted in the missed-question breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    Correct,
    Chosen,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionMark {
    pub id: OptionId,
    pub label: String,
    pub mark: Option<Mark>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissedQuestion {
    pub question_id: QuestionId,
    /// 1-based position in the session.
    pub position: usize,
    pub text: String,
    pub support: Option<String>,
    pub chosen: Option<String>,
    pub correct: String,
    /// Multi-choice options in display order; empty for yes/no.
    pub options: Vec<OptionMark>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Scorecard {
    pub total: usize,
    pub correct: usize,
    pub incorrect: usize,
    pub missed: Vec<MissedQuestion>,
}

impl Scorecard {
    pub fn percentage(&self) -> u32 {
        percentage(self.correct, self.total)
    }

    pub fn is_perfect(&self) -> bool {
        self.missed.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "Απαντήσατε σωστά σε {} από {} ερωτήσεις ({}).",
            self.correct,
            self.total,
            format_percentage(self.correct, self.total)
        )
    }
}

pub fn percentage(value: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((value as f64 / total as f64) * 100.0).round() as u32
}

pub fn format_percentage(value: usize, total: usize) -> String {
    format!("{}%", percentage(value, total))
}

/// Score every ranked question of `state`. Unanswered questions count as
/// incorrect.
pub fn score(state: &SessionState, dataset: &Dataset) -> Scorecard {
    let total = state.question_order.len();
    let mut correct = 0;
    let mut missed = Vec::new();

    for (position, id) in state.question_order.iter().enumerate() {
        let Some(question) = dataset.question(id.as_str()) else {
            continue;
        };
        let answer = state.answers.get(id);
        if is_correct(question, answer) {
            correct += 1;
        } else {
            missed.push(breakdown(question, answer, state.option_order(id), dataset, position + 1));
        }
    }

    Scorecard {
        total,
        correct,
        incorrect: total - correct,
        missed,
    }
}

fn is_correct(question: &Question, answer: Option<&Answer>) -> bool {
    match (&question.kind, answer) {
        (QuestionKind::MultiChoice { .. }, Some(Answer::Choice(chosen))) => question
            .correct_option()
            .is_some_and(|o| &o.id == chosen),
        (QuestionKind::YesNo { correct_answer }, Some(Answer::YesNo(chosen))) => {
            chosen == correct_answer
        }
        _ => false,
    }
}

fn breakdown(
    question: &Question,
    answer: Option<&Answer>,
    stored_order: Option<&[OptionId]>,
    dataset: &Dataset,
    position: usize,
) -> MissedQuestion {
    let (chosen, correct, options) = match &question.kind {
        QuestionKind::MultiChoice { options } => {
            let chosen_id = match answer {
                Some(Answer::Choice(id)) => Some(id),
                _ => None,
            };
            let order = match stored_order {
                Some(order) if order.len() == options.len() => order.to_vec(),
                _ => question.option_ids(),
            };
            let marks = dataset
                .display_order(question, order)
                .iter()
                .filter_map(|id| question.option(id.as_str()))
                .map(|option| {
                    let is_chosen = chosen_id == Some(&option.id);
                    let mark = match (option.is_correct, is_chosen) {
                        (true, _) => Some(Mark::Correct),
                        (false, true) => Some(Mark::Chosen),
                        (false, false) => None,
                    };
                    OptionMark {
                        id: option.id.clone(),
                        label: option.label.clone(),
                        mark,
                    }
                })
                .collect();
            let chosen = chosen_id
                .and_then(|id| question.option(id.as_str()))
                .map(|o| o.label.clone());
            let correct = question
                .correct_option()
                .map(|o| o.label.clone())
                .unwrap_or_default();
            (chosen, correct, marks)
        }
        QuestionKind::YesNo { correct_answer } => {
            let chosen = match answer {
                Some(Answer::YesNo(value)) => Some(yes_no_label(*value).to_owned()),
                _ => None,
            };
            (chosen, yes_no_label(*correct_answer).to_owned(), Vec::new())
        }
    };

    MissedQuestion {
        question_id: question.id.clone(),
        position,
        text: question.text.clone(),
        support: question.support.clone(),
        chosen,
        correct,
        options,
    }
}
