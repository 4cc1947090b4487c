use std::sync::Arc;

use chrono::Duration;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::dataset::{Dataset, QuestionKind, Variant};
use crate::error::SessionError;
use crate::scoring::{score, Scorecard};
use crate::session::{new_session, restore, Answer, LoadRejection, SessionState, STATE_VERSION};
use crate::storage::StorageBackend;
use crate::time::Clock;

pub const MARKER_VALUE: &str = "active";

/// Where and for how long one quiz variant keeps its session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub storage_key: String,
    pub marker_name: String,
    pub marker_lifetime: Duration,
}

impl StoreConfig {
    pub fn for_variant(variant: Variant) -> Self {
        let (storage_key, marker_name) = match variant {
            Variant::MultiChoice => ("ai-quiz-state-v1", "aiQuizSession"),
            Variant::YesNo => ("ai-quiz-yesno-state-v1", "aiQuizYesNoSession"),
        };
        Self {
            storage_key: storage_key.to_owned(),
            marker_name: marker_name.to_owned(),
            marker_lifetime: Duration::hours(5),
        }
    }
}

/// Storage degradations the user should be told about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageWarning {
    /// Nothing is written; progress lives only as long as the process.
    Unavailable,
    /// Progress is kept without an expiry until cleared by hand.
    MarkersDisabled,
}

impl StorageWarning {
    pub fn message(self) -> &'static str {
        match self {
            StorageWarning::Unavailable => {
                "Η αποθήκευση δεν είναι διαθέσιμη· η πρόοδος δεν θα αποθηκευτεί."
            }
            StorageWarning::MarkersDisabled => {
                "Οι δείκτες συνεδρίας είναι απενεργοποιημένοι· η πρόοδος θα παραμείνει έως ότου τη διαγράψετε χειροκίνητα."
            }
        }
    }
}

/// Creates, persists and revalidates quiz sessions for one dataset.
pub struct SessionStore {
    backend: Box<dyn StorageBackend>,
    dataset: Arc<Dataset>,
    config: StoreConfig,
    debug_limit: Option<usize>,
    clock: Clock,
    rng: StdRng,
    durable: bool,
    markers: bool,
    warning: Option<StorageWarning>,
}

impl SessionStore {
    /// Probe `backend` once and build a store over it. A backend that fails
    /// the probe leaves the store in ephemeral mode.
    pub fn new(backend: Box<dyn StorageBackend>, dataset: Arc<Dataset>, config: StoreConfig) -> Self {
        let mut store = Self {
            backend,
            dataset,
            config,
            debug_limit: None,
            clock: Clock::default(),
            rng: StdRng::from_entropy(),
            durable: false,
            markers: false,
            warning: None,
        };
        store.probe();
        store
    }

    fn probe(&mut self) {
        self.durable = self.backend.probe();
        self.markers = self.durable && self.backend.probe_markers(self.clock.now());
        self.warning = if !self.durable {
            Some(StorageWarning::Unavailable)
        } else if !self.markers {
            Some(StorageWarning::MarkersDisabled)
        } else {
            None
        };
        if let Some(w) = self.warning {
            warn!("{w:?}: {}", w.message());
        }
    }

    pub fn with_debug_limit(mut self, limit: Option<usize>) -> Self {
        self.debug_limit = limit;
        self
    }

    /// Swap the clock and probe storage again against it.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self.probe();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn debug_limit(&self) -> Option<usize> {
        self.debug_limit
    }

    pub fn warning(&self) -> Option<StorageWarning> {
        self.warning
    }

    /// False once storage proved unusable; the session then lives in memory only.
    pub fn is_persistent(&self) -> bool {
        self.durable
    }

    pub fn markers_enabled(&self) -> bool {
        self.markers
    }

    pub fn clock_mut(&mut self) -> &mut Clock {
        &mut self.clock
    }

    /// A fresh, unsaved session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::EmptyDataset` when the dataset has no questions.
    pub fn create(&mut self) -> Result<SessionState, SessionError> {
        let state = new_session(&self.dataset, self.debug_limit, &mut self.rng, self.clock.now())?;
        info!(
            "new {} session over {} of {} questions",
            self.dataset.variant(),
            state.len(),
            self.dataset.len()
        );
        Ok(state)
    }

    /// Create a session and persist it right away.
    ///
    /// # Errors
    ///
    /// See [`SessionStore::create`].
    pub fn start(&mut self) -> Result<SessionState, SessionError> {
        let mut state = self.create()?;
        self.persist(&mut state);
        Ok(state)
    }

    /// Stamp `state` and write it with a fresh liveness marker. Write failures
    /// switch the store to ephemeral mode instead of failing.
    pub fn persist(&mut self, state: &mut SessionState) {
        let now = self.clock.now();
        state.version = STATE_VERSION;
        state.updated_at = now;

        if !self.durable {
            return;
        }

        let written = serde_json::to_string(state)
            .map_err(|e| e.to_string())
            .and_then(|payload| {
                self.backend
                    .set_item(&self.config.storage_key, &payload)
                    .map_err(|e| e.to_string())
            });
        if let Err(e) = written {
            warn!("unable to persist quiz session: {e}");
            self.durable = false;
            self.warning = Some(StorageWarning::Unavailable);
            return;
        }

        if self.markers {
            let expires_at = now + self.config.marker_lifetime;
            if let Err(e) = self
                .backend
                .set_marker(&self.config.marker_name, MARKER_VALUE, expires_at)
            {
                warn!("unable to set session marker: {e}");
                self.markers = false;
            }
        }
    }

    /// Read and normalize the stored session, reporting why it was rejected.
    /// Storage is left untouched.
    ///
    /// # Errors
    ///
    /// Returns the `LoadRejection` describing why no session is available.
    pub fn try_load(&mut self) -> Result<SessionState, LoadRejection> {
        if !self.durable {
            return Err(LoadRejection::Unavailable);
        }
        let now = self.clock.now();

        if self.markers {
            match self.backend.marker(&self.config.marker_name, now) {
                Ok(Some(_)) => {}
                Ok(None) => return Err(LoadRejection::Expired),
                Err(e) => {
                    warn!("session marker unreadable, ignoring markers: {e}");
                    self.markers = false;
                }
            }
        }

        let raw = match self.backend.get_item(&self.config.storage_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Err(LoadRejection::Absent),
            Err(e) => {
                warn!("unable to read stored session: {e}");
                return Err(LoadRejection::Unavailable);
            }
        };

        restore(&raw, &self.dataset, self.debug_limit, &mut self.rng, now)
    }

    /// The stored session, if it can be resumed. Anything stored that cannot
    /// be resumed is wiped.
    pub fn load(&mut self) -> Option<SessionState> {
        match self.try_load() {
            Ok(state) => Some(state),
            Err(rejection) => {
                debug!("no resumable session: {rejection}");
                if !matches!(rejection, LoadRejection::Unavailable | LoadRejection::Absent) {
                    self.clear();
                }
                None
            }
        }
    }

    /// Whether a fresh load yields an unfinished session.
    pub fn can_resume(&mut self) -> bool {
        self.load().is_some_and(|s| !s.finished)
    }

    /// Remove the stored session and its marker, even after a downgrade to
    /// ephemeral mode.
    pub fn clear(&mut self) {
        if let Err(e) = self.backend.remove_item(&self.config.storage_key) {
            if self.durable {
                warn!("unable to remove stored session: {e}");
            } else {
                debug!("unable to remove stored session: {e}");
            }
        }
        if let Err(e) = self.backend.delete_marker(&self.config.marker_name) {
            debug!("unable to delete session marker: {e}");
        }
    }

    /// Move to the next question. Returns false when already on the last one.
    pub fn advance(&mut self, state: &mut SessionState) -> bool {
        if state.is_last_question() {
            return false;
        }
        state.current_index += 1;
        self.persist(state);
        true
    }

    /// Record `answer` for the current question and persist.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` for a finished session, a session whose current
    /// question is not in the dataset, an answer of the other variant or an
    /// option the current question does not have.
    pub fn record_answer(&mut self, state: &mut SessionState, answer: Answer) -> Result<(), SessionError> {
        if state.finished {
            return Err(SessionError::AlreadyFinished);
        }
        let question_id = state
            .current_question_id()
            .cloned()
            .ok_or(SessionError::NoCurrentQuestion)?;
        let question = self
            .dataset
            .question(question_id.as_str())
            .ok_or(SessionError::NoCurrentQuestion)?;

        match (&question.kind, &answer) {
            (QuestionKind::MultiChoice { .. }, Answer::Choice(option)) => {
                if question.option(option.as_str()).is_none() {
                    return Err(SessionError::UnknownOption {
                        question: question_id,
                        option: option.clone(),
                    });
                }
            }
            (QuestionKind::YesNo { .. }, Answer::YesNo(_)) => {}
            _ => return Err(SessionError::AnswerKindMismatch),
        }

        state.answers.insert(question_id, answer);
        self.persist(state);
        Ok(())
    }

    /// Mark the session finished, persist it and score it.
    pub fn finish(&mut self, state: &mut SessionState) -> Scorecard {
        state.finished = true;
        self.persist(state);
        score(state, &self.dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catch_all::CatchAllRule;
    use crate::dataset::{AnswerOption, Question, QuestionId};
    use crate::storage::{DurableStore, MarkerJar, MemoryStorage};
    use crate::time::{fixed_clock, fixed_now};
    use assert_matches::assert_matches;

    fn dataset() -> Arc<Dataset> {
        Arc::new(
            Dataset::new(
                "store",
                Variant::MultiChoice,
                vec![
                    Question::multi_choice(
                        "q1",
                        "Ερώτηση 1",
                        vec![
                            AnswerOption::new("a", "Ναι", true),
                            AnswerOption::new("b", "Όλα τα παραπάνω", false),
                        ],
                    ),
                    Question::multi_choice(
                        "q2",
                        "Ερώτηση 2",
                        vec![
                            AnswerOption::new("a", "Α", false),
                            AnswerOption::new("b", "Β", true),
                        ],
                    ),
                ],
            )
            .unwrap()
            .with_catch_all(CatchAllRule::greek()),
        )
    }

    fn store(storage: &MemoryStorage) -> SessionStore {
        SessionStore::new(
            Box::new(storage.clone()),
            dataset(),
            StoreConfig::for_variant(Variant::MultiChoice),
        )
        .with_clock(fixed_clock())
        .with_seed(11)
    }

    #[test]
    fn config_per_variant() {
        let multi = StoreConfig::for_variant(Variant::MultiChoice);
        assert_eq!(multi.storage_key, "ai-quiz-state-v1");
        assert_eq!(multi.marker_name, "aiQuizSession");
        let yes_no = StoreConfig::for_variant(Variant::YesNo);
        assert_eq!(yes_no.storage_key, "ai-quiz-yesno-state-v1");
        assert_eq!(yes_no.marker_name, "aiQuizYesNoSession");
        assert_eq!(yes_no.marker_lifetime, Duration::hours(5));
    }

    #[test]
    fn create_does_not_touch_storage() {
        let storage = MemoryStorage::new();
        let mut store = store(&storage);
        store.create().unwrap();
        assert!(storage.is_empty());
    }

    #[test]
    fn persist_writes_entry_and_marker() {
        let storage = MemoryStorage::new();
        let mut store = store(&storage);
        let state = store.start().unwrap();
        assert!(storage.get_item("ai-quiz-state-v1").unwrap().is_some());
        assert_eq!(
            storage.marker("aiQuizSession", fixed_now()).unwrap().as_deref(),
            Some(MARKER_VALUE)
        );
        assert_eq!(store.load(), Some(state));
    }

    #[test]
    fn persist_stamps_updated_at() {
        let storage = MemoryStorage::new();
        let mut store = store(&storage);
        let mut state = store.create().unwrap();
        store.clock_mut().advance(Duration::minutes(3));
        store.persist(&mut state);
        assert_eq!(state.updated_at, fixed_now() + Duration::minutes(3));
        assert_eq!(state.started_at, fixed_now());
    }

    #[test]
    fn expired_marker_discards_session() {
        let storage = MemoryStorage::new();
        let mut store = store(&storage);
        store.start().unwrap();
        store.clock_mut().advance(Duration::hours(5) + Duration::seconds(1));
        assert_eq!(store.try_load(), Err(LoadRejection::Expired));
        assert_eq!(store.load(), None);
        assert!(storage.get_item("ai-quiz-state-v1").unwrap().is_none());
    }

    #[test]
    fn marker_is_refreshed_by_every_persist() {
        let storage = MemoryStorage::new();
        let mut store = store(&storage);
        let mut state = store.start().unwrap();
        store.clock_mut().advance(Duration::hours(4));
        store.advance(&mut state);
        store.clock_mut().advance(Duration::hours(4));
        assert!(store.load().is_some());
    }

    #[test]
    fn absent_entry_is_not_a_reason_to_clear() {
        let storage = MemoryStorage::new();
        let mut store = store(&storage);
        storage
            .set_marker("aiQuizSession", MARKER_VALUE, fixed_now() + Duration::hours(1))
            .unwrap();
        assert_eq!(store.try_load(), Err(LoadRejection::Absent));
        assert_eq!(store.load(), None);
        assert!(storage.marker("aiQuizSession", fixed_now()).unwrap().is_some());
    }

    #[test]
    fn corrupt_entry_is_wiped() {
        let storage = MemoryStorage::new();
        let mut store = store(&storage);
        store.start().unwrap();
        storage.set_item("ai-quiz-state-v1", "{not json").unwrap();
        assert_matches!(store.try_load(), Err(LoadRejection::Corrupt(_)));
        assert_eq!(store.load(), None);
        assert!(storage.get_item("ai-quiz-state-v1").unwrap().is_none());
    }

    #[test]
    fn clear_removes_entry_and_marker() {
        let storage = MemoryStorage::new();
        let mut store = store(&storage);
        store.start().unwrap();
        store.clear();
        assert!(storage.get_item("ai-quiz-state-v1").unwrap().is_none());
        assert!(storage.marker("aiQuizSession", fixed_now()).unwrap().is_none());
        assert_eq!(store.load(), None);
    }

    #[test]
    fn clear_after_downgrade_still_removes_stored_session() {
        let storage = MemoryStorage::new();
        let mut store = store(&storage);
        let mut state = store.start().unwrap();

        storage.set_quota(Some(4));
        assert!(store.advance(&mut state));
        assert!(!store.is_persistent());

        store.clear();
        assert!(storage.get_item("ai-quiz-state-v1").unwrap().is_none());
        assert!(storage.marker("aiQuizSession", fixed_now()).unwrap().is_none());

        storage.set_quota(None);
        let mut relaunched = self::store(&storage);
        assert_eq!(relaunched.load(), None);
    }

    #[test]
    fn system_clock_store_keeps_markers_of_other_stores() {
        let storage = MemoryStorage::new();
        let mut fixed = store(&storage);
        let state = fixed.start().unwrap();

        let live = SessionStore::new(
            Box::new(storage.clone()),
            dataset(),
            StoreConfig::for_variant(Variant::MultiChoice),
        );
        assert_eq!(live.warning(), None);

        assert_eq!(fixed.load(), Some(state));
    }

    #[test]
    fn system_clock_session_resumes_in_a_new_store() {
        let storage = MemoryStorage::new();
        let config = StoreConfig::for_variant(Variant::MultiChoice);
        let mut first = SessionStore::new(Box::new(storage.clone()), dataset(), config.clone());
        let mut state = first.start().unwrap();
        first.record_answer(&mut state, Answer::choice("a")).unwrap();

        let mut second = SessionStore::new(Box::new(storage.clone()), dataset(), config);
        assert!(second.can_resume());
        assert_eq!(second.load(), Some(state));
    }

    #[test]
    fn record_answer_needs_a_known_current_question() {
        let storage = MemoryStorage::new();
        let mut store = store(&storage);
        let mut state = store.create().unwrap();
        state.question_order = vec![QuestionId::from("retired")];
        assert_eq!(
            store.record_answer(&mut state, Answer::choice("a")),
            Err(SessionError::NoCurrentQuestion)
        );
        assert!(state.answers.is_empty());
    }

    #[test]
    fn write_failure_downgrades_to_ephemeral() {
        let storage = MemoryStorage::new();
        let mut store = store(&storage);
        assert_eq!(store.warning(), None);
        let mut state = store.create().unwrap();

        storage.set_quota(Some(4));
        store.persist(&mut state);
        assert!(!store.is_persistent());
        assert_eq!(store.warning(), Some(StorageWarning::Unavailable));

        storage.set_quota(None);
        let id = state.current_question_id().cloned().unwrap();
        let option = store.dataset().question(id.as_str()).unwrap().options()[0].id.clone();
        store.record_answer(&mut state, Answer::Choice(option)).unwrap();
        assert!(storage.get_item("ai-quiz-state-v1").unwrap().is_none());
        assert_eq!(store.try_load(), Err(LoadRejection::Unavailable));
    }

    #[test]
    fn unavailable_storage_warns_on_construction() {
        let storage = MemoryStorage::disabled();
        let mut store = store(&storage);
        assert_eq!(store.warning(), Some(StorageWarning::Unavailable));
        assert!(!store.is_persistent());
        let state = store.start().unwrap();
        assert!(!state.question_order.is_empty());
        assert_eq!(store.load(), None);
    }

    #[test]
    fn session_survives_without_markers() {
        let storage = MemoryStorage::without_markers();
        let mut store = store(&storage);
        assert_eq!(store.warning(), Some(StorageWarning::MarkersDisabled));
        let state = store.start().unwrap();
        store.clock_mut().advance(Duration::days(3));
        assert_eq!(store.load().map(|s| s.question_order), Some(state.question_order));
    }

    #[test]
    fn record_answer_validates_input() {
        let storage = MemoryStorage::new();
        let mut store = store(&storage);
        let mut state = store.start().unwrap();

        assert_eq!(
            store.record_answer(&mut state, Answer::YesNo(true)),
            Err(SessionError::AnswerKindMismatch)
        );
        assert_matches!(
            store.record_answer(&mut state, Answer::choice("zz")),
            Err(SessionError::UnknownOption { .. })
        );
        store.record_answer(&mut state, Answer::choice("a")).unwrap();
        assert_eq!(state.current_answer(), Some(&Answer::choice("a")));

        store.finish(&mut state);
        assert_eq!(
            store.record_answer(&mut state, Answer::choice("b")),
            Err(SessionError::AlreadyFinished)
        );
    }

    #[test]
    fn advance_stops_at_last_question() {
        let storage = MemoryStorage::new();
        let mut store = store(&storage);
        let mut state = store.start().unwrap();
        assert!(store.advance(&mut state));
        assert!(!store.advance(&mut state));
        assert_eq!(state.current_index, 1);
        assert_eq!(store.load().map(|s| s.current_index), Some(1));
    }

    #[test]
    fn can_resume_only_unfinished_sessions() {
        let storage = MemoryStorage::new();
        let mut store = store(&storage);
        assert!(!store.can_resume());
        let mut state = store.start().unwrap();
        assert!(store.can_resume());
        let card = store.finish(&mut state);
        assert_eq!(card.total, 2);
        assert!(!store.can_resume());
        assert_eq!(store.load().map(|s| s.finished), Some(true));
    }
}
