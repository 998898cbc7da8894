use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph, Widget};

use crate::app::CompletionReport;
use crate::engine::scoring::{self, LevelProgress, MAX_LEVEL};
use crate::session::result::QuizResult;
use crate::ui::components::progress_bar::ProgressBar;
use crate::ui::format_duration;
use crate::ui::theme::Theme;

/// Quiz completion screen: score, XP, level, streak, domains and badges.
pub struct ResultView<'a> {
    pub result: &'a QuizResult,
    pub report: &'a CompletionReport,
    pub theme: &'a Theme,
}

impl<'a> ResultView<'a> {
    pub fn new(result: &'a QuizResult, report: &'a CompletionReport, theme: &'a Theme) -> Self {
        Self {
            result,
            report,
            theme,
        }
    }

    /// Rows needed to draw everything without clipping.
    pub fn height(&self) -> u16 {
        (self.score_lines().len() + self.detail_lines().len()) as u16 + ProgressBar::HEIGHT + 3
    }

    fn score_lines(&self) -> Vec<Line<'a>> {
        let colors = &self.theme.colors;
        let result = self.result;
        let update = &self.report.update;
        let bold = |color| Style::default().fg(color).add_modifier(Modifier::BOLD);

        let mut lines = Vec::new();
        if result.timed_out {
            lines.push(Line::from(Span::styled(
                "Time ran out.",
                Style::default().fg(colors.warning()),
            )));
        }

        let score = result.score_percentage();
        let score_color = if score >= 80.0 {
            colors.success()
        } else if score >= 60.0 {
            colors.warning()
        } else {
            colors.incorrect()
        };
        lines.push(Line::from(vec![
            Span::raw("  Score:   "),
            Span::styled(format!("{score:.1}%"), bold(score_color)),
            Span::raw(format!(
                "  ({}/{} correct)",
                result.correct, result.total_questions
            )),
        ]));
        lines.push(Line::from(format!(
            "  Time:    {}",
            format_duration(result.elapsed_secs)
        )));

        let mut xp = vec![
            Span::raw("  XP:      "),
            Span::styled(format!("+{}", update.xp_earned), bold(colors.accent())),
        ];
        if update.streak_bonus {
            xp.push(Span::styled(
                format!(
                    "  (streak bonus +{} per correct answer)",
                    scoring::STREAK_BONUS_XP
                ),
                Style::default().fg(colors.muted()),
            ));
        }
        lines.push(Line::from(xp));

        let level = update.state.level;
        lines.push(Line::from(vec![
            Span::raw(format!("  Level:   {level} ")),
            Span::styled(scoring::level_name(level), Style::default().fg(colors.accent())),
        ]));
        if update.leveled_up {
            lines.push(Line::from(Span::styled(
                "  Level up!",
                bold(colors.success()),
            )));
        }
        lines
    }

    fn detail_lines(&self) -> Vec<Line<'a>> {
        let colors = &self.theme.colors;
        let result = self.result;
        let heading = |text: &'static str, color| {
            Line::from(Span::styled(
                text,
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            ))
        };

        let streak = self.report.update.state.streak;
        let mut lines = vec![Line::from(format!(
            "  Streak:  {} day{} (best {})",
            streak.current,
            if streak.current == 1 { "" } else { "s" },
            streak.longest
        ))];

        if !result.domains.is_empty() {
            lines.push(Line::default());
            lines.push(heading("Domains", colors.accent()));
            for domain in &result.domains {
                lines.push(Line::from(vec![
                    Span::raw(format!(
                        "  {:<5} {:<36} {:>3}/{:<3} ",
                        domain.code, domain.name, domain.correct, domain.total
                    )),
                    Span::styled(
                        format!("{:.0}%", domain.percentage()),
                        Style::default().fg(colors.muted()),
                    ),
                ]));
            }
        }

        if !self.report.awarded.is_empty() {
            lines.push(Line::default());
            lines.push(heading("New badges", colors.success()));
            for badge in &self.report.awarded {
                lines.push(Line::from(format!(
                    "  {} {}",
                    badge.badge_icon, badge.badge_name
                )));
            }
        }
        lines
    }
}

pub(crate) fn level_bar_text(level: u32, progress: &LevelProgress) -> String {
    if level >= MAX_LEVEL && progress.needed == 0 {
        "Max level".to_string()
    } else {
        format!("{} XP to level {}", progress.needed, progress.next_level)
    }
}

impl Widget for ResultView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let colors = &self.theme.colors;
        let score_lines = self.score_lines();
        let detail_lines = self.detail_lines();

        let block = Block::bordered()
            .title(Span::styled(
                format!(" {} complete ", self.result.assessment.label()),
                Style::default()
                    .fg(colors.accent())
                    .add_modifier(Modifier::BOLD),
            ))
            .border_style(Style::default().fg(colors.border()));
        let inner = block.inner(area);
        block.render(area, buf);

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(score_lines.len() as u16),
                Constraint::Length(ProgressBar::HEIGHT),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(inner);

        Paragraph::new(score_lines).render(layout[0], buf);

        let level = self.report.update.state.level;
        let progress = &self.report.level_progress;
        ProgressBar::new(&format!("Level {level}"), progress.ratio(), self.theme)
            .text(level_bar_text(level, progress))
            .render(layout[1], buf);

        Paragraph::new(detail_lines).render(layout[2], buf);
        Paragraph::new(Line::from(Span::styled(
            " Press any key to exit",
            Style::default().fg(colors.muted()),
        )))
        .render(layout[3], buf);
    }
}
