pub mod charting;
pub mod screen;

use itertools::Itertools;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Gauge, Paragraph, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

use crate::app::{App, View};
use crate::config::Theme;
use crate::scoring::Mark;

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

const CORRECT_LABEL: &str = "Σωστές";
const INCORRECT_LABEL: &str = "Λανθασμένες";

/// Colours for one theme.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub text: Color,
    pub accent: Color,
    pub correct: Color,
    pub incorrect: Color,
    pub muted: Color,
    pub warning: Color,
}

impl Palette {
    pub fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Light => Self {
                text: Color::Black,
                accent: Color::Blue,
                correct: Color::Green,
                incorrect: Color::Red,
                muted: Color::DarkGray,
                warning: Color::Magenta,
            },
            Theme::Dark => Self {
                text: Color::White,
                accent: Color::Cyan,
                correct: Color::LightGreen,
                incorrect: Color::LightRed,
                muted: Color::Gray,
                warning: Color::Yellow,
            },
        }
    }
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match self.view {
            View::Intro => render_intro(self, area, buf),
            View::Quiz => render_quiz(self, area, buf),
            View::Results => render_results(self, area, buf),
        }
    }
}

fn legend(keys: &[&str], palette: &Palette) -> Paragraph<'static> {
    Paragraph::new(Span::styled(
        keys.iter().join(" / "),
        Style::default()
            .fg(palette.muted)
            .add_modifier(Modifier::ITALIC),
    ))
}

fn notice(app: &App, palette: &Palette) -> Option<Paragraph<'static>> {
    app.notice.as_ref().map(|text| {
        Paragraph::new(Span::styled(
            text.clone(),
            Style::default()
                .fg(palette.warning)
                .add_modifier(Modifier::BOLD),
        ))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
    })
}

fn body(area: Rect, constraints: &[Constraint]) -> std::rc::Rc<[Rect]> {
    Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints(constraints)
        .split(area)
}

pub fn render_intro(app: &App, area: Rect, buf: &mut Buffer) {
    let palette = Palette::for_theme(app.config.theme);
    let bold = Style::default().fg(palette.text).add_modifier(Modifier::BOLD);

    let chunks = body(
        area,
        &[
            Constraint::Length(2), // notice
            Constraint::Min(1),
            Constraint::Length(1), // title
            Constraint::Length(1), // question count
            Constraint::Min(1),
            Constraint::Length(1), // legend
        ],
    );

    if let Some(widget) = notice(app, &palette) {
        widget.render(chunks[0], buf);
    }

    let dataset = app.store().dataset();
    Paragraph::new(Span::styled(dataset.name().to_owned(), bold))
        .alignment(Alignment::Center)
        .render(chunks[2], buf);
    Paragraph::new(Span::styled(
        format!("{} ερωτήσεις", dataset.len()),
        Style::default().fg(palette.muted),
    ))
    .alignment(Alignment::Center)
    .render(chunks[3], buf);

    let mut keys = Vec::new();
    if app.can_start() {
        keys.push("(enter) έναρξη");
    }
    if app.can_resume {
        keys.push("(r) συνέχεια");
    }
    keys.extend(["(c) διαγραφή προόδου", "(t) θέμα", "(esc) έξοδος"]);
    legend(&keys, &palette).render(chunks[5], buf);
}

pub fn render_quiz(app: &App, area: Rect, buf: &mut Buffer) {
    let palette = Palette::for_theme(app.config.theme);
    let bold = Style::default().fg(palette.text).add_modifier(Modifier::BOLD);

    let (Some(session), Some(question)) = (app.session.as_ref(), app.current_question()) else {
        return;
    };
    let choices = app.choices();
    let selected = session.current_answer();

    let chunks = body(
        area,
        &[
            Constraint::Length(2), // notice
            Constraint::Length(1), // progress label
            Constraint::Length(1), // gauge
            Constraint::Length(1),
            Constraint::Min(2), // question text
            Constraint::Length(2), // support
            Constraint::Length(choices.len() as u16 + 1),
            Constraint::Length(1), // legend
        ],
    );

    if let Some(widget) = notice(app, &palette) {
        widget.render(chunks[0], buf);
    }

    Paragraph::new(Span::styled(app.progress_label(), bold)).render(chunks[1], buf);
    Gauge::default()
        .gauge_style(Style::default().fg(palette.accent))
        .percent(session.progress_percent().min(100))
        .label(format!("{}%", session.progress_percent()))
        .render(chunks[2], buf);

    Paragraph::new(Span::styled(question.text.clone(), bold))
        .wrap(Wrap { trim: true })
        .render(chunks[4], buf);

    if let Some(support) = &question.support {
        Paragraph::new(Span::styled(
            support.clone(),
            Style::default()
                .fg(palette.muted)
                .add_modifier(Modifier::ITALIC),
        ))
        .wrap(Wrap { trim: true })
        .render(chunks[5], buf);
    }

    let widest = choices.iter().map(|c| c.label.width()).max().unwrap_or(0);
    let lines: Vec<Line> = choices
        .iter()
        .enumerate()
        .map(|(idx, choice)| {
            let is_selected = selected == Some(&choice.answer);
            let is_cursor = idx == app.cursor;
            let marker = if is_selected { "●" } else { "○" };
            let pointer = if is_cursor { "›" } else { " " };
            let padding = " ".repeat(widest.saturating_sub(choice.label.width()));
            let mut style = Style::default().fg(palette.text);
            if is_selected {
                style = style.fg(palette.accent).add_modifier(Modifier::BOLD);
            }
            if is_cursor {
                style = style.add_modifier(Modifier::REVERSED);
            }
            Line::from(vec![
                Span::raw(format!("{pointer} {}. {marker} ", idx + 1)),
                Span::styled(format!("{}{padding}", choice.label), style),
            ])
        })
        .collect();
    Paragraph::new(lines).render(chunks[6], buf);

    let advance = if session.is_last_question() {
        "(enter) ολοκλήρωση"
    } else {
        "(enter) επόμενη"
    };
    let mut keys = vec!["(↑↓) επιλογή", "(space) απάντηση"];
    if app.current_is_answered() {
        keys.push(advance);
    }
    keys.extend(["(t) θέμα", "(esc) μενού"]);
    legend(&keys, &palette).render(chunks[7], buf);
}

pub fn render_results(app: &App, area: Rect, buf: &mut Buffer) {
    let palette = Palette::for_theme(app.config.theme);
    let bold = Style::default().fg(palette.text).add_modifier(Modifier::BOLD);

    let Some(card) = app.scorecard.as_ref() else {
        return;
    };

    let chunks = body(
        area,
        &[
            Constraint::Length(2), // notice
            Constraint::Length(2), // summary
            Constraint::Length(1), // ratio bar
            Constraint::Length(1), // bar legend
            Constraint::Length(1),
            Constraint::Min(1), // missed questions
            Constraint::Length(1), // legend
        ],
    );

    if let Some(widget) = notice(app, &palette) {
        widget.render(chunks[0], buf);
    }

    Paragraph::new(Span::styled(card.summary(), bold))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(chunks[1], buf);

    let bar_area = chunks[2];
    let (left, right) = charting::ratio_widths(card.correct, card.incorrect, bar_area.width);
    Paragraph::new(Line::from(vec![
        Span::styled("█".repeat(left as usize), Style::default().fg(palette.correct)),
        Span::styled("█".repeat(right as usize), Style::default().fg(palette.incorrect)),
    ]))
    .render(bar_area, buf);

    Paragraph::new(Line::from(vec![
        Span::styled(
            charting::legend_label(CORRECT_LABEL, card.correct, card.total),
            Style::default().fg(palette.correct).add_modifier(Modifier::BOLD),
        ),
        Span::raw("   "),
        Span::styled(
            charting::legend_label(INCORRECT_LABEL, card.incorrect, card.total),
            Style::default().fg(palette.incorrect).add_modifier(Modifier::BOLD),
        ),
    ]))
    .alignment(Alignment::Center)
    .render(chunks[3], buf);

    let mut lines: Vec<Line> = Vec::new();
    if card.is_perfect() {
        lines.push(Line::from(Span::styled(
            "Καμία λανθασμένη απάντηση. Μπράβο!",
            Style::default().fg(palette.correct),
        )));
    }
    for missed in &card.missed {
        lines.push(Line::from(Span::styled(
            format!("{}. {}", missed.position, missed.text),
            bold,
        )));
        if missed.options.is_empty() {
            let chosen = missed.chosen.as_deref().unwrap_or("-");
            lines.push(Line::from(vec![
                Span::styled(format!("   {chosen}"), Style::default().fg(palette.incorrect)),
                Span::raw("  →  "),
                Span::styled(missed.correct.clone(), Style::default().fg(palette.correct)),
            ]));
        } else {
            for option in &missed.options {
                let (symbol, style) = match option.mark {
                    Some(Mark::Correct) => ("✓", Style::default().fg(palette.correct)),
                    Some(Mark::Chosen) => ("✗", Style::default().fg(palette.incorrect)),
                    None => (" ", Style::default().fg(palette.muted)),
                };
                lines.push(Line::from(Span::styled(
                    format!("   {symbol} {}", option.label),
                    style,
                )));
            }
        }
        if let Some(support) = &missed.support {
            lines.push(Line::from(Span::styled(
                format!("   {support}"),
                Style::default()
                    .fg(palette.muted)
                    .add_modifier(Modifier::ITALIC),
            )));
        }
        lines.push(Line::default());
    }
    Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .scroll((app.results_scroll, 0))
        .render(chunks[5], buf);

    legend(
        &["(↑↓) κύλιση", "(r) νέα προσπάθεια", "(c) διαγραφή προόδου", "(t) θέμα", "(esc) έξοδος"],
        &palette,
    )
    .render(chunks[6], buf);
}
