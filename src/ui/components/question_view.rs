use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph, Widget, Wrap};

use crate::session::question::{AnswerOption, Question};
use crate::session::quiz::QuizState;
use crate::ui::components::progress_bar::ProgressBar;
use crate::ui::format_duration;
use crate::ui::theme::{Theme, ThemeColors};

/// Below this the countdown is drawn in the warning colour.
const LOW_TIME_SECS: u64 = 60;

/// The running quiz: countdown, current question, options and, once
/// answered, the verdict with its explanation.
pub struct QuestionView<'a> {
    pub quiz: &'a QuizState,
    pub theme: &'a Theme,
}

impl<'a> QuestionView<'a> {
    pub fn new(quiz: &'a QuizState, theme: &'a Theme) -> Self {
        Self { quiz, theme }
    }
}

impl Widget for QuestionView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let colors = &self.theme.colors;
        let quiz = self.quiz;

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(ProgressBar::HEIGHT),
                Constraint::Min(5),
                Constraint::Length(1),
            ])
            .split(area);

        let remaining = quiz.remaining();
        let ratio = if quiz.time_limit.is_zero() {
            0.0
        } else {
            remaining.as_secs_f64() / quiz.time_limit.as_secs_f64()
        };
        let fill = if remaining.as_secs() < LOW_TIME_SECS {
            colors.warning()
        } else {
            colors.bar_filled()
        };
        let label = format!(
            "{}  Question {}/{}",
            quiz.assessment.label(),
            quiz.cursor + 1,
            quiz.questions.len()
        );
        ProgressBar::new(&label, ratio, self.theme)
            .text(format!("{} left", format_duration(remaining.as_secs())))
            .fill(fill)
            .render(layout[0], buf);

        let Some(question) = quiz.current() else {
            return;
        };
        let tier = question.difficulty;
        let title = Line::from(vec![
            Span::styled(
                format!(" {} ", tier.label()),
                Style::default()
                    .fg(ThemeColors::parse_color(tier.color()))
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!("{} ", question.domain_name()),
                Style::default().fg(colors.muted()),
            ),
        ]);
        let block = Block::bordered()
            .title(title)
            .border_style(Style::default().fg(colors.border()));

        let chosen = quiz.current_answer();
        let mut lines = vec![
            Line::from(Span::styled(
                question.stem.as_str(),
                Style::default().fg(colors.fg()),
            )),
            Line::default(),
        ];
        for option in AnswerOption::all() {
            let text = format!("  {}) {}", option.letter(), question.options.text(option));
            let style = match chosen {
                Some(c) if c == option => {
                    let color = if question.is_correct(option) {
                        colors.correct()
                    } else {
                        colors.incorrect()
                    };
                    Style::default().fg(color).add_modifier(Modifier::BOLD)
                }
                _ => Style::default().fg(colors.fg()),
            };
            lines.push(Line::from(Span::styled(text, style)));
        }
        if let Some(chosen) = chosen {
            lines.push(Line::default());
            lines.extend(feedback_lines(question, chosen, colors));
        }
        Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: false })
            .render(layout[1], buf);

        let hint = match (chosen, quiz.is_last()) {
            (None, _) => " [a-d] answer  [n/→] skip  [p/←] back  [q] submit",
            (Some(_), false) => " [n/→/Enter] next  [p/←] back  [q] submit",
            (Some(_), true) => " [n/→/Enter] finish  [p/←] back",
        };
        Paragraph::new(Line::from(Span::styled(
            hint,
            Style::default().fg(colors.muted()),
        )))
        .render(layout[2], buf);
    }
}

fn feedback_lines<'a>(
    question: &'a Question,
    chosen: AnswerOption,
    colors: &ThemeColors,
) -> Vec<Line<'a>> {
    let bold = |color| Style::default().fg(color).add_modifier(Modifier::BOLD);
    let mut lines = Vec::new();
    if question.is_correct(chosen) {
        lines.push(Line::from(Span::styled("Correct!", bold(colors.correct()))));
    } else {
        let answer = match question.correct_option() {
            Some(option) => format!("{}) {}", option.letter(), question.options.text(option)),
            None => question.correct_text.clone(),
        };
        lines.push(Line::from(vec![
            Span::styled("Incorrect. ", bold(colors.incorrect())),
            Span::styled(
                format!("The answer is {answer}"),
                Style::default().fg(colors.fg()),
            ),
        ]));
    }
    if !question.explanation.trim().is_empty() {
        lines.push(Line::from(Span::styled(
            question.explanation.as_str(),
            Style::default().fg(colors.muted()),
        )));
    }
    lines
}
