use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use log::warn;

use crate::config::{Config, ConfigStore};
use crate::dataset::{Question, QuestionKind};
use crate::scoring::{score, yes_no_label, Scorecard};
use crate::session::{Answer, SessionState};
use crate::store::SessionStore;

pub const EMPTY_DATASET_NOTICE: &str = "Προσθέστε ερωτήσεις κουίζ για να ξεκινήσετε.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Intro,
    Quiz,
    Results,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Continue,
    Quit,
}

/// One selectable answer as shown on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub label: String,
    pub answer: Answer,
}

pub struct App {
    store: SessionStore,
    config_store: Box<dyn ConfigStore>,
    pub config: Config,
    pub view: View,
    pub session: Option<SessionState>,
    pub scorecard: Option<Scorecard>,
    pub cursor: usize,
    pub can_resume: bool,
    pub notice: Option<String>,
    pub results_scroll: u16,
}

impl App {
    /// Restore whatever the store holds: a finished session opens on its
    /// results, anything else on the intro screen.
    pub fn new(mut store: SessionStore, config_store: Box<dyn ConfigStore>) -> Self {
        let config = config_store.load();
        let mut notice = store.warning().map(|w| w.message().to_owned());

        let mut view = View::Intro;
        let mut session = None;
        let mut scorecard = None;
        if store.dataset().is_empty() {
            notice = Some(EMPTY_DATASET_NOTICE.to_owned());
        } else {
            session = store.load();
            if let Some(state) = session.as_ref().filter(|s| s.finished) {
                scorecard = Some(score(state, store.dataset()));
                view = View::Results;
            }
        }
        let can_resume = store.can_resume();

        Self {
            store,
            config_store,
            config,
            view,
            session,
            scorecard,
            cursor: 0,
            can_resume,
            notice,
            results_scroll: 0,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn can_start(&self) -> bool {
        !self.store.dataset().is_empty()
    }

    pub fn current_question(&self) -> Option<&Question> {
        let id = self.session.as_ref()?.current_question_id()?;
        self.store.dataset().question(id.as_str())
    }

    /// Answers for the current question in display order.
    pub fn choices(&self) -> Vec<Choice> {
        let (Some(session), Some(question)) = (self.session.as_ref(), self.current_question())
        else {
            return Vec::new();
        };

        match &question.kind {
            QuestionKind::MultiChoice { .. } => {
                let order = session
                    .option_order(&question.id)
                    .map(<[_]>::to_vec)
                    .unwrap_or_else(|| question.option_ids());
                order
                    .iter()
                    .filter_map(|id| question.option(id.as_str()))
                    .map(|o| Choice {
                        label: o.label.clone(),
                        answer: Answer::Choice(o.id.clone()),
                    })
                    .collect()
            }
            QuestionKind::YesNo { .. } => [true, false]
                .into_iter()
                .map(|value| Choice {
                    label: yes_no_label(value).to_owned(),
                    answer: Answer::YesNo(value),
                })
                .collect(),
        }
    }

    pub fn progress_label(&self) -> String {
        self.session
            .as_ref()
            .map(|s| format!("Ερώτηση {} από {}", s.current_index + 1, s.len()))
            .unwrap_or_default()
    }

    pub fn current_is_answered(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.current_answer().is_some())
    }

    pub fn start(&mut self) {
        match self.store.start() {
            Ok(state) => {
                self.session = Some(state);
                self.scorecard = None;
                self.results_scroll = 0;
                self.enter_quiz();
            }
            Err(e) => {
                warn!("unable to start quiz: {e}");
                self.notice = Some(EMPTY_DATASET_NOTICE.to_owned());
            }
        }
    }

    pub fn resume(&mut self) {
        if let Some(stored) = self.store.load() {
            self.session = Some(stored);
        }
        match self.session.as_ref() {
            Some(s) if !s.finished => self.enter_quiz(),
            _ => self.start(),
        }
    }

    pub fn move_cursor(&mut self, delta: isize) {
        let len = self.choices().len();
        if len == 0 {
            return;
        }
        self.cursor = (self.cursor as isize + delta).clamp(0, len as isize - 1) as usize;
    }

    /// Record the choice at `index` for the current question.
    pub fn select(&mut self, index: usize) {
        let Some(choice) = self.choices().into_iter().nth(index) else {
            return;
        };
        if let Some(session) = self.session.as_mut() {
            match self.store.record_answer(session, choice.answer) {
                Ok(()) => self.cursor = index,
                Err(e) => warn!("answer rejected: {e}"),
            }
        }
        self.refresh_notice();
    }

    /// Advance, or finish on the last question. Does nothing until the
    /// current question has an answer.
    pub fn next(&mut self) {
        if !self.current_is_answered() {
            return;
        }
        let moved = match self.session.as_mut() {
            Some(session) if !session.is_last_question() => self.store.advance(session),
            Some(_) => false,
            None => return,
        };
        if moved {
            self.cursor = self.selected_index().unwrap_or(0);
            self.refresh_notice();
        } else {
            self.finish();
        }
    }

    pub fn finish(&mut self) {
        if let Some(session) = self.session.as_mut() {
            self.scorecard = Some(self.store.finish(session));
            self.results_scroll = 0;
            self.view = View::Results;
            self.refresh_resume();
            self.refresh_notice();
        }
    }

    pub fn retake(&mut self) {
        self.start();
    }

    pub fn clear(&mut self) {
        self.store.clear();
        self.session = None;
        self.scorecard = None;
        self.cursor = 0;
        self.view = View::Intro;
        self.refresh_resume();
    }

    pub fn toggle_theme(&mut self) {
        self.config.theme = self.config.theme.toggled();
        if let Err(e) = self.config_store.save(&self.config) {
            warn!("unable to save theme preference: {e}");
        }
    }

    pub fn on_key(&mut self, key: KeyEvent) -> Action {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Action::Quit;
        }
        if key.code == KeyCode::Char('t') {
            self.toggle_theme();
            return Action::Continue;
        }

        match self.view {
            View::Intro => match key.code {
                KeyCode::Esc | KeyCode::Char('q') => return Action::Quit,
                KeyCode::Enter | KeyCode::Char('s') if self.can_start() => self.start(),
                KeyCode::Char('r') if self.can_resume => self.resume(),
                KeyCode::Char('c') => self.clear(),
                _ => {}
            },
            View::Quiz => match key.code {
                KeyCode::Esc => {
                    self.view = View::Intro;
                    self.refresh_resume();
                }
                KeyCode::Up | KeyCode::Char('k') => self.move_cursor(-1),
                KeyCode::Down | KeyCode::Char('j') => self.move_cursor(1),
                KeyCode::Char(' ') => self.select(self.cursor),
                KeyCode::Char('y') => self.select_answer(&Answer::YesNo(true)),
                KeyCode::Char('n') => self.select_answer(&Answer::YesNo(false)),
                KeyCode::Char(c @ '1'..='9') => self.select(c as usize - '1' as usize),
                KeyCode::Enter | KeyCode::Right => self.next(),
                _ => {}
            },
            View::Results => match key.code {
                KeyCode::Esc | KeyCode::Char('q') => return Action::Quit,
                KeyCode::Char('r') => self.retake(),
                KeyCode::Char('c') => self.clear(),
                KeyCode::Up | KeyCode::Char('k') => {
                    self.results_scroll = self.results_scroll.saturating_sub(1);
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    self.results_scroll = self.results_scroll.saturating_add(1);
                }
                _ => {}
            },
        }
        Action::Continue
    }

    fn select_answer(&mut self, answer: &Answer) {
        if let Some(index) = self.choices().iter().position(|c| &c.answer == answer) {
            self.select(index);
        }
    }

    fn selected_index(&self) -> Option<usize> {
        let answer = self.session.as_ref()?.current_answer()?;
        self.choices().iter().position(|c| &c.answer == answer)
    }

    fn enter_quiz(&mut self) {
        self.cursor = self.selected_index().unwrap_or(0);
        self.view = View::Quiz;
        self.refresh_resume();
        self.refresh_notice();
    }

    fn refresh_resume(&mut self) {
        self.can_resume = self.store.can_resume();
    }

    fn refresh_notice(&mut self) {
        if let Some(w) = self.store.warning() {
            self.notice = Some(w.message().to_owned());
        }
    }
}
