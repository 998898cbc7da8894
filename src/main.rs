use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Rect;
use ratatui::widgets::Widget;
use ratatui::{Terminal, TerminalOptions, Viewport};
use tracing::info;
use tracing_subscriber::EnvFilter;

use acpquiz::app::App;
use acpquiz::config::Config;
use acpquiz::event::{AppEvent, EventHandler};
use acpquiz::session::assessment::AssessmentType;
use acpquiz::session::input::{self, QuizCommand};
use acpquiz::session::quiz::QuizState;
use acpquiz::session::result::QuizResult;
use acpquiz::ui::components::question_view::QuestionView;
use acpquiz::ui::components::result_view::ResultView;
use acpquiz::ui::components::stats_view::{BadgeView, DomainView, HistoryView, SummaryView};
use acpquiz::ui::render_plain;
use acpquiz::ui::theme::Theme;

const TICK_RATE: Duration = Duration::from_millis(100);
/// Width used when output is not a terminal.
const PLAIN_WIDTH: u16 = 100;

type Tui = Terminal<CrosstermBackend<io::Stdout>>;

#[derive(Parser)]
#[command(
    name = "acpquiz",
    version,
    about = "Terminal PMI-ACP practice quizzes with XP, levels, streaks and badges"
)]
struct Cli {
    #[arg(short, long, global = true, help = "User id (overrides the config file)")]
    user: Option<String>,

    #[arg(short, long, global = true, help = "Path to config.toml")]
    config: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Log debug output to stderr")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Take a quiz: mini-test, checkpoint, cross-domain, mock-exam-1, mock-exam-2
    Quiz { assessment: AssessmentType },
    /// Level, XP, streak and totals
    Progress,
    /// Past attempts, newest first
    History {
        #[arg(long = "type")]
        kind: Option<AssessmentType>,
    },
    /// Earned and locked badges
    Badges,
    /// Mastery per exam domain
    Domains,
    /// Write all of this user's data to a JSON file
    Export { file: PathBuf },
    /// Replace this user's data with a previous export
    Import { file: PathBuf },
    /// Write the current settings to the config file
    Init {
        #[arg(long, help = "Overwrite an existing config file")]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(user) = cli.user {
        config.user_id = user;
        config.validate();
    }

    if let Command::Init { force } = cli.command {
        let path = config.init(cli.config.as_deref(), force)?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    let mut app = App::new(config)?;
    let theme = Theme::load();

    match cli.command {
        Command::Quiz { assessment } => run_quiz(&mut app, assessment, &theme)?,
        Command::Progress => {
            let summary = app.summary()?;
            let view = SummaryView::new(&summary, &theme);
            let height = view.height();
            print_widget(view, height)?;
        }
        Command::History { kind } => {
            let attempts = app.history(kind)?;
            let view = HistoryView::new(&attempts, &theme);
            let height = view.height();
            print_widget(view, height)?;
        }
        Command::Badges => {
            let badges = app.badges()?;
            let view = BadgeView::new(&badges, &theme);
            let height = view.height();
            print_widget(view, height)?;
        }
        Command::Domains => {
            let mastery = app.mastery()?;
            let view = DomainView::new(&mastery, &theme);
            let height = view.height();
            print_widget(view, height)?;
        }
        Command::Export { file } => {
            let data = app.export_to(&file)?;
            println!(
                "Exported {} attempts for '{}' to {}",
                data.history.attempts.len(),
                data.user_id,
                file.display()
            );
        }
        Command::Import { file } => {
            let data = app.import_from(&file)?;
            println!(
                "Imported {} attempts for '{}'",
                data.history.attempts.len(),
                data.user_id
            );
        }
        Command::Init { .. } => {}
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();
}

/// Draw a widget inline below the prompt, or as plain text when piped.
fn print_widget(widget: impl Widget, height: u16) -> Result<()> {
    let stdout = io::stdout();
    if !stdout.is_terminal() {
        println!("{}", render_plain(widget, PLAIN_WIDTH, height));
        return Ok(());
    }

    let mut terminal = Terminal::with_options(
        CrosstermBackend::new(stdout),
        TerminalOptions {
            viewport: Viewport::Inline(height),
        },
    )?;
    let mut drawn = Rect::default();
    terminal.draw(|frame| {
        drawn = frame.area();
        frame.render_widget(widget, drawn);
    })?;
    terminal.set_cursor_position((0, drawn.bottom().saturating_sub(1)))?;
    terminal.show_cursor()?;
    println!();
    Ok(())
}

fn run_quiz(app: &mut App, kind: AssessmentType, theme: &Theme) -> Result<()> {
    let bank = app.load_bank()?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
    let events = EventHandler::new(TICK_RATE);

    let outcome = app
        .start_quiz(&bank, kind)
        .and_then(|quiz| drive_quiz(&mut terminal, app, quiz, theme, &events));

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if !outcome? {
        println!("Quiz abandoned; nothing was recorded.");
    }
    Ok(())
}

/// Run the quiz until it is submitted, runs out of time or is aborted, then
/// record it and show the result. Returns whether anything was recorded.
fn drive_quiz(
    terminal: &mut Tui,
    app: &App,
    mut quiz: QuizState,
    theme: &Theme,
    events: &EventHandler,
) -> Result<bool> {
    while !quiz.is_complete() {
        terminal.draw(|frame| frame.render_widget(QuestionView::new(&quiz, theme), frame.area()))?;

        match events.next()? {
            AppEvent::Key(key) => {
                if !handle_quiz_key(&mut quiz, key) {
                    return Ok(false);
                }
            }
            AppEvent::Tick => {
                if input::process_tick(&mut quiz).is_some() {
                    info!(assessment = quiz.assessment.id(), "time limit reached");
                }
            }
            AppEvent::Resize(_, _) => {}
        }
    }

    let result = QuizResult::from_quiz(&quiz);
    let report = app.finish_quiz(&result)?;
    loop {
        terminal.draw(|frame| {
            frame.render_widget(ResultView::new(&result, &report, theme), frame.area())
        })?;
        if let AppEvent::Key(key) = events.next()?
            && key.kind == KeyEventKind::Press
        {
            return Ok(true);
        }
    }
}

/// Returns `false` when the quiz is aborted with Ctrl-C.
fn handle_quiz_key(quiz: &mut QuizState, key: KeyEvent) -> bool {
    if key.kind != KeyEventKind::Press {
        return true;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return false;
    }

    let command = match key.code {
        KeyCode::Char(ch) => input::command_for_char(ch),
        KeyCode::Right | KeyCode::Enter => Some(QuizCommand::Next),
        KeyCode::Left => Some(QuizCommand::Previous),
        KeyCode::Esc => Some(QuizCommand::Quit),
        _ => None,
    };
    if let Some(command) = command {
        input::process_command(quiz, command);
    }
    true
}
