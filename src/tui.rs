//! TUI layer using ratatui and crossterm
//!
//! Runs the poll/reconcile loop on a timer tick, drains fetch results from the
//! worker channel, and renders the live comment feed with new-comment
//! highlighting, a notification banner, and a help overlay.

use crate::config::{Config, Theme};
use crate::format::{format_count, format_time_ago};
use crate::reconcile::{DisplayEntry, FRESH_HIGHLIGHT};
use crate::session::{FeedSession, ReconcileOutcome, ViewState};
use crate::source::{SnapshotSource, SourceWorker};
use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame, Terminal,
};
use std::io::{self, Stdout};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use unicode_width::UnicodeWidthChar;

const TICK_RATE: Duration = Duration::from_millis(250);
const BANNER_TTL: Duration = Duration::from_secs(5);

struct Banner {
    count: usize,
    expires_at: Instant,
}

/// Application state
pub struct App {
    session: FeedSession,
    worker: SourceWorker,
    config: Config,
    source_label: String,

    // UI state
    scroll_offset: usize,
    next_poll_at: Instant,
    banner: Option<Banner>,
    show_help: bool,
    message: Option<String>,
}

impl App {
    pub fn new(config: Config, source: SnapshotSource) -> Self {
        let source_label = source.describe();
        Self {
            session: FeedSession::new(),
            worker: SourceWorker::spawn(source),
            config,
            source_label,
            scroll_offset: 0,
            // First tick fires the initial load immediately.
            next_poll_at: Instant::now(),
            banner: None,
            show_help: false,
            message: None,
        }
    }

    fn drain_responses(&mut self, now: Instant) {
        while let Some(result) = self.worker.try_response() {
            match result {
                Ok(doc) => {
                    let outcome = self.session.apply_snapshot(doc, now + FRESH_HIGHLIGHT);
                    self.absorb_outcome(outcome, now);
                }
                Err(err) => self.session.fail_poll(&err),
            }
        }
    }

    fn absorb_outcome(&mut self, outcome: ReconcileOutcome, now: Instant) {
        if outcome.full_rebuild {
            self.scroll_offset = 0;
            return;
        }
        if outcome.new_count == 0 {
            return;
        }

        if self.scroll_offset > 0 {
            self.scroll_offset = shifted_scroll(self.scroll_offset, &outcome.inserted_at);
            let last = self.session.display().len().saturating_sub(1);
            self.scroll_offset = self.scroll_offset.min(last);
        }

        self.banner = Some(Banner {
            count: outcome.new_count,
            expires_at: now + BANNER_TTL,
        });
    }

    fn on_tick(&mut self, now: Instant) {
        self.session.expire_fresh(now);

        if self.banner.as_ref().is_some_and(|b| b.expires_at <= now) {
            self.banner = None;
        }

        if now >= self.next_poll_at {
            // Reschedule whether or not the poll runs: a skipped cycle is
            // skipped, not queued.
            self.next_poll_at = now + Duration::from_secs(self.config.refresh_secs);
            if self.session.begin_poll() {
                self.worker.request_fetch();
            }
        }
    }

    fn refresh(&mut self) {
        self.session.reset();
        self.scroll_offset = 0;
        self.banner = None;
        self.next_poll_at = Instant::now();
    }

    fn toggle_theme(&mut self) {
        self.config.theme = self.config.theme.toggled();
        self.message = Some(format!("Theme: {}", self.config.theme.as_str()));
        if let Err(err) = self.config.save() {
            tracing::warn!(error = %err, "failed to persist theme preference");
        }
    }

    fn cycle_interval(&mut self) {
        self.config.refresh_secs = self.config.next_refresh_interval();
        self.message = Some(format!("Refresh interval: {}s", self.config.refresh_secs));
        self.next_poll_at = Instant::now() + Duration::from_secs(self.config.refresh_secs);
        if let Err(err) = self.config.save() {
            tracing::warn!(error = %err, "failed to persist refresh interval");
        }
    }

    fn navigate_up(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(1);
    }

    fn navigate_down(&mut self) {
        let last = self.session.display().len().saturating_sub(1);
        if self.scroll_offset < last {
            self.scroll_offset += 1;
        }
    }

    fn handle_input(&mut self, key: KeyEvent) -> Result<bool> {
        // Clear message on any input
        self.message = None;

        match key.code {
            KeyCode::Char('q') => return Ok(true), // Quit
            KeyCode::Char('?') => self.show_help = !self.show_help,
            KeyCode::Esc => {
                if self.show_help {
                    self.show_help = false;
                } else {
                    self.banner = None;
                }
            }

            // Navigation
            KeyCode::Char('j') | KeyCode::Down => self.navigate_down(),
            KeyCode::Char('k') | KeyCode::Up => self.navigate_up(),
            KeyCode::Char('g') => {
                self.scroll_offset = 0;
                self.banner = None;
            }
            KeyCode::Char('G') => {
                self.scroll_offset = self.session.display().len().saturating_sub(1);
            }

            // Feed controls
            KeyCode::Char('r') => self.refresh(),
            KeyCode::Char('d') => self.toggle_theme(),
            KeyCode::Char('i') => self.cycle_interval(),
            KeyCode::Char('x') => self.banner = None,

            _ => {}
        }

        Ok(false)
    }
}

/// Keep the viewport anchored when entries are inserted at or above it.
fn shifted_scroll(offset: usize, inserted_at: &[usize]) -> usize {
    let mut shifted = offset;
    for &index in inserted_at {
        if index <= shifted {
            shifted += 1;
        }
    }
    shifted
}

/// Runs the TUI application
pub fn run(config: Config, source: SnapshotSource) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(config, source);

    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;

    result
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    loop {
        let now = Instant::now();
        app.drain_responses(now);
        app.on_tick(now);

        terminal.draw(|f| ui(f, app))?;

        if event::poll(TICK_RATE)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && app.handle_input(key)? {
                    return Ok(());
                }
            }
        }
    }
}

struct Palette {
    text: Color,
    accent: Color,
    dim: Color,
    fresh: Color,
    error: Color,
    flair: Color,
}

fn palette(theme: Theme) -> Palette {
    match theme {
        Theme::Dark => Palette {
            text: Color::White,
            accent: Color::Cyan,
            dim: Color::DarkGray,
            fresh: Color::Green,
            error: Color::Red,
            flair: Color::Yellow,
        },
        Theme::Light => Palette {
            text: Color::Black,
            accent: Color::Blue,
            dim: Color::Gray,
            fresh: Color::Green,
            error: Color::Red,
            flair: Color::Magenta,
        },
    }
}

fn ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Comment feed
            Constraint::Length(3), // Status/message
        ])
        .split(f.area());

    render_header(f, app, chunks[0]);
    render_feed(f, app, chunks[1]);
    render_status(f, app, chunks[2]);

    if let Some(banner) = &app.banner {
        render_banner(f, app, banner);
    }

    if app.show_help {
        render_help(f);
    }
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let colors = palette(app.config.theme);

    let title = app.session.title().unwrap_or(&app.source_label);
    let total = app.session.display().len();
    let mut info = format!(" {} — {} comments", title, format_count(total as f64));
    if let Some(link) = app.session.thread_link() {
        info.push_str(&format!("  ({})", link));
    }
    let info = truncate_to_width(&info, area.width.saturating_sub(2) as usize);

    let header = Paragraph::new(info)
        .style(Style::default().fg(colors.accent))
        .block(Block::default().borders(Borders::ALL).title(" threadwatch "));

    f.render_widget(header, area);
}

fn render_feed(f: &mut Frame, app: &App, area: Rect) {
    let colors = palette(app.config.theme);

    match app.session.state() {
        ViewState::Loading => {
            let notice = Paragraph::new("\n Loading comments...")
                .style(Style::default().fg(colors.dim))
                .block(Block::default().borders(Borders::ALL));
            f.render_widget(notice, area);
        }
        ViewState::Error(message) => {
            let notice = Paragraph::new(format!("\n {}", message))
                .style(Style::default().fg(colors.error))
                .block(Block::default().borders(Borders::ALL))
                .wrap(Wrap { trim: false });
            f.render_widget(notice, area);
        }
        ViewState::Empty => {
            let notice = Paragraph::new("\n No comments in this thread yet.")
                .style(Style::default().fg(colors.dim))
                .block(Block::default().borders(Borders::ALL));
            f.render_widget(notice, area);
        }
        ViewState::Live => {
            let now = Instant::now();
            let unix_now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|elapsed| elapsed.as_secs() as i64)
                .unwrap_or(0);

            let visible_height = area.height.saturating_sub(2) as usize;
            // Two rendered lines per comment
            let visible_entries = visible_height / 2 + 1;

            let items: Vec<ListItem> = app
                .session
                .display()
                .entries()
                .iter()
                .skip(app.scroll_offset)
                .take(visible_entries)
                .map(|entry| comment_item(entry, &colors, now, unix_now))
                .collect();

            let feed = List::new(items).block(Block::default().borders(Borders::ALL));
            f.render_widget(feed, area);
        }
    }
}

fn comment_item(
    entry: &DisplayEntry,
    colors: &Palette,
    now: Instant,
    unix_now: i64,
) -> ListItem<'static> {
    let fresh = entry.is_fresh(now);
    let indent = "  ".repeat(entry.depth);

    let author = entry.comment.author.as_deref().unwrap_or("Unknown");
    let mut author_style = Style::default()
        .fg(colors.accent)
        .add_modifier(Modifier::BOLD);
    if fresh {
        author_style = author_style.fg(colors.fresh);
    }

    let mut header = vec![Span::raw(indent.clone())];
    if entry.depth > 0 {
        header.push(Span::styled("↳ ", Style::default().fg(colors.dim)));
    }
    header.push(Span::styled(author.to_string(), author_style));

    if let Some(flair) = entry.comment.flair_label() {
        header.push(Span::styled(
            format!(" [{}]", flair),
            Style::default().fg(colors.flair),
        ));
    }
    for _ in entry.comment.flair_images() {
        header.push(Span::styled(" ⚑", Style::default().fg(colors.flair)));
    }

    let time_ago = entry
        .comment
        .created
        .map(|created| format_time_ago(created, unix_now))
        .unwrap_or_else(|| "Unknown time".to_string());
    header.push(Span::styled(
        format!("  {}", time_ago),
        Style::default().fg(colors.dim),
    ));

    if fresh {
        header.push(Span::styled(
            "  ● new",
            Style::default()
                .fg(colors.fresh)
                .add_modifier(Modifier::BOLD),
        ));
    }

    let body = entry.comment.body.as_deref().unwrap_or("[No content]");
    let body_line = Line::from(vec![
        Span::raw(format!("{}  ", indent)),
        Span::styled(body.to_string(), Style::default().fg(colors.text)),
    ]);

    ListItem::new(Text::from(vec![Line::from(header), body_line]))
}

fn render_status(f: &mut Frame, app: &App, area: Rect) {
    let colors = palette(app.config.theme);

    let content = if let Some(msg) = &app.message {
        format!(" {}", msg)
    } else {
        format!(
            " j/k: scroll | g/G: top/bottom | r: reload | d: theme ({}) | i: interval ({}s) | ?: help | q: quit",
            app.config.theme.as_str(),
            app.config.refresh_secs
        )
    };

    let status = Paragraph::new(content)
        .style(Style::default().fg(colors.flair))
        .block(Block::default().borders(Borders::ALL));

    f.render_widget(status, area);
}

fn render_banner(f: &mut Frame, app: &App, banner: &Banner) {
    let colors = palette(app.config.theme);

    let label = format!(
        " {} new comment{} — g: top, x: dismiss ",
        banner.count,
        if banner.count == 1 { "" } else { "s" }
    );
    let width = (label.chars().count() as u16 + 2).min(f.area().width);
    let area = Rect {
        x: f.area().width.saturating_sub(width + 1),
        y: 1,
        width,
        height: f.area().height.min(3),
    };

    let notice = Paragraph::new(label)
        .style(
            Style::default()
                .fg(colors.fresh)
                .add_modifier(Modifier::BOLD),
        )
        .block(Block::default().borders(Borders::ALL));

    f.render_widget(Clear, area);
    f.render_widget(notice, area);
}

fn render_help(f: &mut Frame) {
    let area = centered_rect(60, 70, f.area());

    let help_text = vec![
        "",
        "  Navigation:",
        "    j / ↓     Scroll down",
        "    k / ↑     Scroll up",
        "    g         Go to top (dismisses the banner)",
        "    G         Go to bottom",
        "",
        "  Feed:",
        "    r         Reload from scratch",
        "    d         Toggle light/dark theme",
        "    i         Cycle refresh interval",
        "    x / Esc   Dismiss new-comment banner",
        "",
        "  Other:",
        "    ?         Toggle this help",
        "    q         Quit",
        "",
    ];

    let help = Paragraph::new(help_text.join("\n"))
        .style(Style::default())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Help ")
                .style(Style::default().bg(Color::DarkGray)),
        )
        .wrap(Wrap { trim: false });

    f.render_widget(Clear, area);
    f.render_widget(help, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

fn truncate_to_width(text: &str, max_width: usize) -> String {
    let mut width = 0;
    let mut out = String::new();
    for ch in text.chars() {
        let ch_width = ch.width().unwrap_or(0);
        if width + ch_width > max_width {
            out.push('…');
            break;
        }
        width += ch_width;
        out.push(ch);
    }
    out
}
