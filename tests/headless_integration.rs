use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use quizr::app::{App, View};
use quizr::config::MemoryConfigStore;
use quizr::runtime::{AppEvent, Exit, FixedTicker, Runner, TestEventSource};
use quizr::storage::MemoryStorage;
use quizr::time::fixed_clock;
use quizr::{Dataset, SessionStore, StoreConfig, Variant};

fn press(tx: &mpsc::Sender<AppEvent>, code: KeyCode) {
    tx.send(AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE)))
        .unwrap();
}

fn app_over(storage: &MemoryStorage, variant: Variant, limit: Option<usize>) -> App {
    let dataset = Arc::new(Dataset::builtin(variant).unwrap());
    let store = SessionStore::new(
        Box::new(storage.clone()),
        dataset,
        StoreConfig::for_variant(variant),
    )
    .with_clock(fixed_clock())
    .with_debug_limit(limit)
    .with_seed(42);
    App::new(store, Box::new(MemoryConfigStore::default()))
}

// Headless integration using the runtime + App without a TTY.
// Answers every question with the first choice and quits from the results.
#[test]
fn headless_quiz_flow_completes() {
    let storage = MemoryStorage::new();
    let mut app = app_over(&storage, Variant::MultiChoice, None);
    let total = app.store().dataset().len();

    let (tx, rx) = mpsc::channel();
    let runner = Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(5)),
    );

    press(&tx, KeyCode::Enter);
    for _ in 0..total {
        press(&tx, KeyCode::Char('1'));
        press(&tx, KeyCode::Enter);
    }
    press(&tx, KeyCode::Esc);

    let mut frames = 0;
    let exit = runner
        .run(&mut app, Some(500), |_| {
            frames += 1;
            Ok::<(), std::io::Error>(())
        })
        .unwrap();

    assert_eq!(exit, Exit::Quit);
    assert!(frames > total);
    assert_eq!(app.view, View::Results);
    let card = app.scorecard.clone().unwrap();
    assert_eq!(card.total, total);
    assert_eq!(card.correct + card.incorrect, total);
}

#[test]
fn headless_resume_after_restart() {
    let storage = MemoryStorage::new();
    let mut app = app_over(&storage, Variant::YesNo, Some(3));

    let (tx, rx) = mpsc::channel();
    let runner = Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(5)),
    );
    press(&tx, KeyCode::Enter);
    press(&tx, KeyCode::Char('y'));
    press(&tx, KeyCode::Enter);
    press(&tx, KeyCode::Char('n'));
    drop(tx);

    let exit = runner
        .run(&mut app, Some(100), |_| Ok::<(), std::io::Error>(()))
        .unwrap();
    assert_eq!(exit, Exit::Disconnected);
    let before = app.session.clone().unwrap();
    assert_eq!(before.len(), 3);
    assert_eq!(before.current_index, 1);
    assert_eq!(before.answers.len(), 2);

    let mut restarted = app_over(&storage, Variant::YesNo, Some(3));
    assert_eq!(restarted.view, View::Intro);
    assert!(restarted.can_resume);
    restarted.resume();
    assert_eq!(restarted.view, View::Quiz);
    let after = restarted.session.clone().unwrap();
    assert_eq!(after.question_order, before.question_order);
    assert_eq!(after.answers, before.answers);
    assert_eq!(after.current_index, 1);

    let resized = app_over(&storage, Variant::YesNo, Some(5));
    assert!(!resized.can_resume);
    assert!(storage.is_empty());
}

#[test]
fn headless_step_limit_stops_idle_loop() {
    let storage = MemoryStorage::new();
    let mut app = app_over(&storage, Variant::MultiChoice, None);
    let (_tx, rx) = mpsc::channel();
    let runner = Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(1)),
    );
    let exit = runner
        .run(&mut app, Some(3), |_| Ok::<(), std::io::Error>(()))
        .unwrap();
    assert_eq!(exit, Exit::StepLimit);
    assert_eq!(app.view, View::Intro);
}
