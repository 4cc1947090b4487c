use ratatui::Frame;

use crate::app::{App, View};
use crate::ui::{render_intro, render_quiz, render_results};

/// A UI Screen boundary: renders one view of the app
pub trait Screen {
    fn render(&self, app: &App, f: &mut Frame);
}

pub struct IntroScreen;

impl Screen for IntroScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        let area = f.area();
        render_intro(app, area, f.buffer_mut());
    }
}

pub struct QuizScreen;

impl Screen for QuizScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        let area = f.area();
        render_quiz(app, area, f.buffer_mut());
    }
}

pub struct ResultsScreen;

impl Screen for ResultsScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        let area = f.area();
        render_results(app, area, f.buffer_mut());
    }
}

/// Helper to construct the appropriate screen for the current view
pub fn current_screen(view: View) -> Box<dyn Screen> {
    match view {
        View::Intro => Box::new(IntroScreen),
        View::Quiz => Box::new(QuizScreen),
        View::Results => Box::new(ResultsScreen),
    }
}
