use std::collections::BTreeMap;

use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph, Widget};

use crate::app::ProgressSummary;
use crate::engine::badges;
use crate::engine::domain::{Domain, MasteryStatus};
use crate::store::schema::{AttemptRecord, BadgeRecord, DomainMasteryRecord};
use crate::ui::components::progress_bar::ProgressBar;
use crate::ui::components::result_view::level_bar_text;
use crate::ui::format_duration;
use crate::ui::theme::Theme;

fn panel<'a>(title: String, theme: &Theme) -> Block<'a> {
    Block::bordered()
        .title(Span::styled(
            format!(" {title} "),
            Style::default()
                .fg(theme.colors.accent())
                .add_modifier(Modifier::BOLD),
        ))
        .border_style(Style::default().fg(theme.colors.border()))
}

// --- Summary ---

pub struct SummaryView<'a> {
    pub summary: &'a ProgressSummary,
    pub theme: &'a Theme,
}

impl<'a> SummaryView<'a> {
    pub fn new(summary: &'a ProgressSummary, theme: &'a Theme) -> Self {
        Self { summary, theme }
    }

    pub fn height(&self) -> u16 {
        self.lines().len() as u16 + ProgressBar::HEIGHT + 2
    }

    fn lines(&self) -> Vec<Line<'a>> {
        let colors = &self.theme.colors;
        let s = self.summary;
        let mut lines = vec![
            Line::from(vec![
                Span::raw(format!("  Level {} ", s.level)),
                Span::styled(s.level_name, Style::default().fg(colors.accent())),
                Span::raw(format!("  ({} XP)", s.xp)),
            ]),
            Line::from(format!(
                "  Quizzes: {}   Accuracy: {:.1}% ({}/{})",
                s.total_attempts, s.overall_percentage, s.total_correct, s.total_questions
            )),
            Line::from(format!(
                "  Streak:  {} (best {})   Badges: {}",
                s.current_streak, s.longest_streak, s.badges_earned
            )),
        ];
        if let Some(last) = s.last_completed_at {
            lines.push(Line::from(vec![
                Span::raw("  Last quiz: "),
                Span::styled(
                    last.format("%Y-%m-%d %H:%M UTC").to_string(),
                    Style::default().fg(colors.muted()),
                ),
            ]));
        }
        lines
    }
}

impl Widget for SummaryView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let s = self.summary;
        let lines = self.lines();
        let block = panel(format!("Progress for {}", s.user_id), self.theme);
        let inner = block.inner(area);
        block.render(area, buf);

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Length(ProgressBar::HEIGHT),
                Constraint::Min(0),
            ])
            .split(inner);

        let mut lines = lines.into_iter();
        if let Some(first) = lines.next() {
            Paragraph::new(first).render(layout[0], buf);
        }
        ProgressBar::new(&format!("Level {}", s.level), s.level_progress.ratio(), self.theme)
            .text(level_bar_text(s.level, &s.level_progress))
            .render(layout[1], buf);
        Paragraph::new(lines.collect::<Vec<_>>()).render(layout[2], buf);
    }
}

// --- History ---

pub struct HistoryView<'a> {
    pub attempts: &'a [AttemptRecord],
    pub theme: &'a Theme,
}

impl<'a> HistoryView<'a> {
    pub fn new(attempts: &'a [AttemptRecord], theme: &'a Theme) -> Self {
        Self { attempts, theme }
    }

    pub fn height(&self) -> u16 {
        self.lines().len() as u16 + 2
    }

    fn lines(&self) -> Vec<Line<'a>> {
        let colors = &self.theme.colors;
        if self.attempts.is_empty() {
            return vec![Line::from(Span::styled(
                "No quizzes taken yet.",
                Style::default().fg(colors.muted()),
            ))];
        }
        let mut lines = vec![Line::from(Span::styled(
            format!(
                "{:<17} {:<14} {:>7} {:>9} {:>8}",
                "Completed", "Assessment", "Score", "Correct", "Time"
            ),
            Style::default()
                .fg(colors.accent())
                .add_modifier(Modifier::BOLD),
        ))];
        for a in self.attempts {
            lines.push(Line::from(format!(
                "{:<17} {:<14} {:>6.1}% {:>9} {:>8}",
                a.completed_at.format("%Y-%m-%d %H:%M"),
                a.assessment_type.id(),
                a.score_percentage,
                format!("{}/{}", a.correct_answers, a.total_questions),
                format_duration(a.time_taken_seconds)
            )));
        }
        lines
    }
}

impl Widget for HistoryView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let title = format!("History ({})", self.attempts.len());
        Paragraph::new(self.lines())
            .block(panel(title, self.theme))
            .render(area, buf);
    }
}

// --- Badges ---

/// Full catalog, earned badges first with their date.
pub struct BadgeView<'a> {
    pub earned: &'a [BadgeRecord],
    pub theme: &'a Theme,
}

impl<'a> BadgeView<'a> {
    pub fn new(earned: &'a [BadgeRecord], theme: &'a Theme) -> Self {
        Self { earned, theme }
    }

    pub fn height(&self) -> u16 {
        self.lines().len() as u16 + 2
    }

    fn lines(&self) -> Vec<Line<'a>> {
        let colors = &self.theme.colors;
        let muted = Style::default().fg(colors.muted());
        let mut lines = Vec::new();
        for record in self.earned {
            lines.push(Line::from(vec![
                Span::raw(format!("  {} ", record.badge_icon)),
                Span::styled(
                    format!("{:<24} ", record.badge_name),
                    Style::default().fg(colors.success()),
                ),
                Span::styled(record.earned_at.format("%Y-%m-%d").to_string(), muted),
            ]));
        }
        for kind in badges::catalog() {
            let name = kind.name();
            if self.earned.iter().any(|r| r.badge_name == name) {
                continue;
            }
            lines.push(Line::from(Span::styled(
                format!("  · {:<24} {}", name, kind.description()),
                muted,
            )));
        }
        lines
    }
}

impl Widget for BadgeView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let title = format!("Badges ({} earned)", self.earned.len());
        Paragraph::new(self.lines())
            .block(panel(title, self.theme))
            .render(area, buf);
    }
}

// --- Domains ---

/// Mastery per domain; domains never attempted are listed as not started.
pub struct DomainView<'a> {
    pub mastery: &'a [DomainMasteryRecord],
    pub theme: &'a Theme,
}

impl<'a> DomainView<'a> {
    pub fn new(mastery: &'a [DomainMasteryRecord], theme: &'a Theme) -> Self {
        Self { mastery, theme }
    }

    pub fn height(&self) -> u16 {
        self.lines().len() as u16 + 2
    }

    fn lines(&self) -> Vec<Line<'a>> {
        let colors = &self.theme.colors;
        let muted = Style::default().fg(colors.muted());
        let by_code: BTreeMap<&str, &DomainMasteryRecord> = self
            .mastery
            .iter()
            .map(|m| (m.domain_code.as_str(), m))
            .collect();

        let mut lines = Vec::new();
        for domain in Domain::all() {
            let label = format!(
                "  {:<4} {:<36} {:>3}%  ",
                domain.code(),
                domain.name(),
                domain.weight()
            );
            let line = match by_code.get(domain.code()) {
                Some(record) => {
                    let status_color = match record.status {
                        MasteryStatus::Mastered => colors.success(),
                        MasteryStatus::InProgress => colors.warning(),
                    };
                    Line::from(vec![
                        Span::raw(format!("{label}{:>5.1}%  ", record.average_percentage)),
                        Span::styled(record.status.as_str(), Style::default().fg(status_color)),
                    ])
                }
                None => Line::from(vec![Span::raw(label), Span::styled("not started", muted)]),
            };
            lines.push(line);
        }
        for record in self
            .mastery
            .iter()
            .filter(|m| Domain::from_code(&m.domain_code) == Domain::Unknown)
        {
            lines.push(Line::from(Span::styled(
                format!(
                    "  {:<4} {:<36}       {:>5.1}%  {}",
                    record.domain_code,
                    record.domain_name,
                    record.average_percentage,
                    record.status.as_str()
                ),
                muted,
            )));
        }
        lines
    }
}

impl Widget for DomainView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        Paragraph::new(self.lines())
            .block(panel("Domain mastery".to_string(), self.theme))
            .render(area, buf);
    }
}
