use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph, Wrap},
};
use serde_json::json;
use std::io::stdout;
use std::time::{Duration, Instant};
use tracing::debug;

use jobtrack::config::Config;
use jobtrack::models::{Application, Stage};
use jobtrack::query::{
    format_date, Column, DateRange, QueryEngine, QuickFilter, SalaryFilter, SortDirection, SortSpec, StageFilter,
};
use jobtrack::repository::{ApplicationRepository, ProfileRepository};
use jobtrack::status::{StatusBoard, StatusUpdate};
use jobtrack::store::Store;
use jobtrack::window::{Density, Selection, VirtualWindow};

/// Upper bound on how long the loop sleeps waiting for input.
const IDLE_WAKE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Normal,
    Search,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

struct AppState {
    engine: QueryEngine,
    window: VirtualWindow,
    selection: Selection,
    status: StatusBoard,
    density: Density,
    mode: Mode,
    detail_scroll: u16,
}

impl AppState {
    fn new(apps: Vec<Application>, config: &Config, density: Density) -> Self {
        let engine = QueryEngine::new(apps, config.debounce);
        let window = VirtualWindow::new(engine.len(), density.terminal_rows(), config.window);
        let mut state = Self {
            engine,
            window,
            selection: Selection::default(),
            status: StatusBoard::default(),
            density,
            mode: Mode::Normal,
            detail_scroll: 0,
        };
        state.sync_view();
        state
    }

    fn selected_position(&self) -> Option<usize> {
        self.selection.id().and_then(|id| self.engine.position_of(id))
    }

    fn current(&self) -> Option<&Application> {
        self.selected_position().and_then(|pos| self.engine.get(pos))
    }

    /// Re-fit the window to the view and keep the selection on a visible row.
    fn sync_view(&mut self) {
        self.window.set_item_count(self.engine.len());
        if self.selected_position().is_none() {
            match self.engine.get(0) {
                Some(first) => self.selection.select(&first.id),
                None => self.selection.clear(),
            }
            self.detail_scroll = 0;
        }
        if let Some(pos) = self.selected_position() {
            self.window.scroll_to_index(pos);
        }
    }

    fn reload(&mut self, apps: Vec<Application>) {
        self.engine.set_items(apps);
        self.sync_view();
    }

    fn move_by(&mut self, delta: isize) {
        if self.engine.is_empty() {
            return;
        }
        let last = self.engine.len() - 1;
        let pos = self.selected_position().unwrap_or(0);
        let next = pos.saturating_add_signed(delta).min(last);
        if let Some(app) = self.engine.get(next) {
            self.selection.select(&app.id);
        }
        if next != pos {
            self.detail_scroll = 0;
        }
        self.window.scroll_to_index(next);
    }

    fn page_rows(&self) -> isize {
        let rows = self.window.viewport_height() / self.density.terminal_rows();
        rows.max(1) as isize
    }

    fn set_density(&mut self, density: Density) {
        self.density = density;
        self.window.set_row_height(density.terminal_rows());
        if let Some(pos) = self.selected_position() {
            self.window.scroll_to_index(pos);
        }
    }

    fn next_wake(&self, now: Instant) -> Duration {
        [self.engine.next_deadline(), self.status.next_expiry()]
            .into_iter()
            .flatten()
            .min()
            .map(|at| at.saturating_duration_since(now))
            .unwrap_or(IDLE_WAKE)
            .min(IDLE_WAKE)
    }
}

/// Raw mode and the alternate screen, undone on drop so the terminal is
/// restored on every exit path, including errors.
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> Result<Self> {
        enable_raw_mode()?;
        let guard = Self;
        stdout().execute(EnterAlternateScreen)?;
        Ok(guard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = stdout().execute(LeaveAlternateScreen);
    }
}

pub fn run_browse(store: &Store, config: &Config) -> Result<()> {
    let apps = ApplicationRepository::new(store, config.repository_options());
    let profile = ProfileRepository::new(store);
    let mut state = AppState::new(apps.get_all(), config, profile.get().density);

    let _guard = TerminalGuard::enter()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    run_loop(&mut terminal, &mut state, &apps, &profile)
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    state: &mut AppState,
    apps: &ApplicationRepository<'_>,
    profile: &ProfileRepository<'_>,
) -> Result<()> {
    loop {
        terminal.draw(|frame| draw(frame, state))?;

        if event::poll(state.next_wake(Instant::now()))? {
            // Resize needs no handling here: the next draw measures the new area.
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    let flow = match state.mode {
                        Mode::Normal => handle_normal(state, key, apps, profile),
                        Mode::Search => handle_search(state, key),
                    };
                    if flow == Flow::Quit {
                        break;
                    }
                }
            }
        }

        let now = Instant::now();
        if state.engine.tick(now) {
            state.sync_view();
        }
        state.status.prune(now);
    }
    Ok(())
}

fn handle_search(state: &mut AppState, key: KeyEvent) -> Flow {
    let now = Instant::now();
    match key.code {
        KeyCode::Enter => {
            state.engine.flush();
            state.mode = Mode::Normal;
        }
        KeyCode::Esc => {
            state.engine.set_search("", now);
            state.engine.flush();
            state.mode = Mode::Normal;
        }
        KeyCode::Backspace => {
            let mut text = state.engine.pending_search().to_string();
            text.pop();
            state.engine.set_search(text, now);
        }
        KeyCode::Char(c) => {
            let mut text = state.engine.pending_search().to_string();
            text.push(c);
            state.engine.set_search(text, now);
        }
        _ => {}
    }
    state.sync_view();
    Flow::Continue
}

fn handle_normal(
    state: &mut AppState,
    key: KeyEvent,
    apps: &ApplicationRepository<'_>,
    profile: &ProfileRepository<'_>,
) -> Flow {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => return Flow::Quit,
        KeyCode::Down | KeyCode::Char('j') => state.move_by(1),
        KeyCode::Up | KeyCode::Char('k') => state.move_by(-1),
        KeyCode::PageDown => state.move_by(state.page_rows()),
        KeyCode::PageUp => state.move_by(-state.page_rows()),
        KeyCode::Home | KeyCode::Char('g') => state.move_by(isize::MIN),
        KeyCode::End | KeyCode::Char('G') => state.move_by(isize::MAX),
        KeyCode::Char('J') => state.detail_scroll = state.detail_scroll.saturating_add(3),
        KeyCode::Char('K') => state.detail_scroll = state.detail_scroll.saturating_sub(3),
        KeyCode::Char('/') => state.mode = Mode::Search,
        KeyCode::Char('a') => change_stage(state, apps, Stage::Applied),
        KeyCode::Char('s') => change_stage(state, apps, Stage::Screening),
        KeyCode::Char('i') => change_stage(state, apps, Stage::Interview),
        KeyCode::Char('o') => change_stage(state, apps, Stage::Offer),
        KeyCode::Char('x') => change_stage(state, apps, Stage::Rejected),
        KeyCode::Char('f') => {
            let quick = state.engine.quick_filter();
            state.engine.set_quick_filter(QuickFilter {
                stage: next_stage_filter(quick.stage),
                ..quick
            });
            state.sync_view();
        }
        KeyCode::Char('d') => {
            let quick = state.engine.quick_filter();
            state.engine.set_quick_filter(QuickFilter {
                date_range: next_date_range(quick.date_range),
                ..quick
            });
            state.sync_view();
        }
        KeyCode::Char('$') => {
            let quick = state.engine.quick_filter();
            state.engine.set_quick_filter(QuickFilter {
                salary: next_salary_filter(quick.salary),
                ..quick
            });
            state.sync_view();
        }
        KeyCode::Char('c') => {
            state.engine.set_sort(next_sort(state.engine.sort_spec()));
            state.sync_view();
        }
        KeyCode::Char('r') => {
            state.engine.set_sort(reverse_sort(state.engine.sort_spec()));
            state.sync_view();
        }
        KeyCode::Char('v') => {
            let density = state.density.next();
            state.set_density(density);
            if profile.update(&json!({ "density": density })).is_none() {
                state.status.push("Density not saved", None, Instant::now());
            }
        }
        _ => {}
    }
    Flow::Continue
}

fn change_stage(state: &mut AppState, apps: &ApplicationRepository<'_>, stage: Stage) {
    let Some(current) = state.current() else { return };
    if current.stage == stage {
        return;
    }
    let id = current.id.clone();
    let now = Instant::now();
    match apps.update_stage(&id, stage) {
        Some(updated) => {
            debug!(id = %id, stage = %updated.stage, "stage changed from browser");
            state.status.push(format!("Moved to {}", updated.stage.label()), Some(id.as_str()), now);
            state.reload(apps.get_all());
        }
        None => state.status.push("Stage change not saved", Some(id.as_str()), now),
    }
}

fn next_stage_filter(filter: StageFilter) -> StageFilter {
    match filter {
        StageFilter::All => StageFilter::Only(Stage::ALL[0]),
        StageFilter::Only(stage) => Stage::ALL
            .iter()
            .position(|&s| s == stage)
            .and_then(|i| Stage::ALL.get(i + 1))
            .map_or(StageFilter::All, |&next| StageFilter::Only(next)),
    }
}

fn next_date_range(range: DateRange) -> DateRange {
    match range {
        DateRange::All => DateRange::Last7Days,
        DateRange::Last7Days => DateRange::Last30Days,
        DateRange::Last30Days => DateRange::Last90Days,
        DateRange::Last90Days | DateRange::Custom { .. } => DateRange::All,
    }
}

fn next_salary_filter(filter: SalaryFilter) -> SalaryFilter {
    match filter {
        SalaryFilter::All => SalaryFilter::With,
        SalaryFilter::With => SalaryFilter::Without,
        SalaryFilter::Without => SalaryFilter::All,
    }
}

fn next_sort(sort: Option<SortSpec>) -> Option<SortSpec> {
    match sort {
        None => Some(SortSpec::asc(Column::ALL[0])),
        Some(spec) => Column::ALL
            .iter()
            .position(|&c| c == spec.column)
            .and_then(|i| Column::ALL.get(i + 1))
            .map(|&column| SortSpec { column, ..spec }),
    }
}

fn reverse_sort(sort: Option<SortSpec>) -> Option<SortSpec> {
    match sort {
        None => Some(SortSpec::desc(Column::DateApplied)),
        Some(spec) => Some(SortSpec {
            direction: match spec.direction {
                SortDirection::Asc => SortDirection::Desc,
                SortDirection::Desc => SortDirection::Asc,
            },
            ..spec
        }),
    }
}

fn stage_filter_label(filter: StageFilter) -> &'static str {
    match filter {
        StageFilter::All => "all",
        StageFilter::Only(stage) => stage.as_str(),
    }
}

fn date_range_label(range: DateRange) -> String {
    match range {
        DateRange::All => "all time".to_string(),
        DateRange::Last7Days => "7 days".to_string(),
        DateRange::Last30Days => "30 days".to_string(),
        DateRange::Last90Days => "90 days".to_string(),
        DateRange::Custom { start, end } => format!("{start}..{end}"),
    }
}

fn salary_label(filter: SalaryFilter) -> &'static str {
    match filter {
        SalaryFilter::All => "any",
        SalaryFilter::With => "listed",
        SalaryFilter::Without => "unlisted",
    }
}

fn sort_label(sort: Option<SortSpec>) -> String {
    match sort {
        None => "none".to_string(),
        Some(spec) => {
            let arrow = match spec.direction {
                SortDirection::Asc => "asc",
                SortDirection::Desc => "desc",
            };
            format!("{} {}", spec.column, arrow)
        }
    }
}

fn stage_style(stage: Stage) -> Style {
    match stage {
        Stage::Applied => Style::default().fg(Color::Cyan),
        Stage::Screening => Style::default().fg(Color::Yellow),
        Stage::Interview => Style::default().fg(Color::Magenta),
        Stage::Offer => Style::default().fg(Color::Green),
        Stage::Rejected => Style::default().fg(Color::Red),
    }
}

fn fit(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let kept: String = s.chars().take(width.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

fn draw(frame: &mut Frame, state: &mut AppState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(2), Constraint::Min(0), Constraint::Length(1)])
        .split(frame.area());

    frame.render_widget(Paragraph::new(build_header(state)), rows[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(rows[1]);

    draw_list(frame, state, body[0]);

    let detail_width = usize::from(body[1].width.saturating_sub(4)).max(20);
    let detail = Paragraph::new(build_detail(state, detail_width))
        .block(Block::default().borders(Borders::ALL).title(" Detail "))
        .wrap(Wrap { trim: false })
        .scroll((state.detail_scroll, 0));
    frame.render_widget(detail, body[1]);

    let footer = match (state.status.latest(Instant::now()), state.mode) {
        (Some(update), _) => Paragraph::new(format!(" {}", update.message)).style(Style::default().fg(Color::Yellow)),
        (None, Mode::Search) => Paragraph::new(" type to search  Enter:apply  Esc:clear")
            .style(Style::default().fg(Color::DarkGray)),
        (None, Mode::Normal) => Paragraph::new(
            " j/k:move  /:search  a/s/i/o/x:stage  f:stage filter  d:dates  $:salary  c:sort  r:reverse  v:density  q:quit",
        )
        .style(Style::default().fg(Color::DarkGray)),
    };
    frame.render_widget(footer, rows[2]);
}

fn build_header(state: &AppState) -> Text<'static> {
    let quick = state.engine.quick_filter();
    let filter_color = if quick.is_empty() { Color::DarkGray } else { Color::Yellow };
    let cursor = if state.mode == Mode::Search { "_" } else { "" };
    let search = Line::from(vec![
        Span::styled(" Search: ", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(format!("{}{}", state.engine.pending_search(), cursor)),
        Span::styled(
            format!(
                "   stage: {}  since: {}  salary: {}  sort: {}",
                stage_filter_label(quick.stage),
                date_range_label(quick.date_range),
                salary_label(quick.salary),
                sort_label(state.engine.sort_spec())
            ),
            Style::default().fg(filter_color),
        ),
    ]);

    let stats = state.engine.stats();
    let summary = Line::from(format!(
        " {}/{} shown   active {}   response {:.0}%   success {:.0}%   open tasks {} ({} overdue)",
        state.engine.len(),
        stats.total,
        stats.active,
        stats.response_rate * 100.0,
        stats.success_rate * 100.0,
        stats.pending_tasks,
        stats.overdue_tasks
    ));
    Text::from(vec![search, summary])
}

fn draw_list(frame: &mut Frame, state: &mut AppState, area: Rect) {
    state.window.set_viewport_height(u32::from(area.height.saturating_sub(2)));
    if let Some(pos) = state.selected_position() {
        state.window.scroll_to_index(pos);
    }

    let range = state.window.range();
    let selected = state.selected_position();
    let width = usize::from(area.width.saturating_sub(2));
    let now = Instant::now();

    let mut lines: Vec<Line> = Vec::with_capacity(range.len() * state.density.terminal_rows() as usize);
    for pos in range.indices() {
        let Some(app) = state.engine.get(pos) else { break };
        let status = state.status.for_target(&app.id, now);
        lines.extend(row_lines(app, state.density, Some(pos) == selected, width, status));
    }

    // Only the mounted rows are in `lines`; shift them by where the block starts.
    let skip = state.window.scroll_offset().saturating_sub(range.vertical_offset);
    let list = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" Applications ({}) ", state.engine.len())),
        )
        .scroll((u16::try_from(skip).unwrap_or(u16::MAX), 0));
    frame.render_widget(list, area);
}

/// Exactly `density.terminal_rows()` lines per application.
fn row_lines(
    app: &Application,
    density: Density,
    selected: bool,
    width: usize,
    status: Option<&StatusUpdate>,
) -> Vec<Line<'static>> {
    let base = if selected {
        Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    let marker = if selected { "> " } else { "  " };

    let mut first = format!("{}{} | {}", marker, app.position, app.company.name);
    if density == Density::Compact {
        first = format!("{} [{}]", first, app.stage.label());
        if let Some(update) = status {
            first = format!("{}  {}", first, update.message);
        }
    }
    let mut lines = vec![Line::from(Span::styled(fit(&first, width), base))];

    if density.terminal_rows() >= 2 {
        let mut second = format!("  {:<10} {}", app.stage.label(), format_date(app.date_applied));
        if let Some(update) = status {
            second = format!("{}  {}", second, update.message);
        }
        lines.push(Line::from(Span::styled(fit(&second, width), stage_style(app.stage).patch(base))));
    }

    if density.terminal_rows() >= 3 {
        let mut third = String::from("  ");
        if !app.location.is_empty() {
            third.push_str(&app.location);
        }
        if app.remote {
            third.push_str(" (remote)");
        }
        if app.has_salary() {
            third = format!("{}  {}", third, app.salary);
        }
        lines.push(Line::from(Span::styled(fit(&third, width), Style::default().fg(Color::DarkGray).patch(base))));
    }

    lines
}

fn build_detail(state: &AppState, width: usize) -> Text<'static> {
    let Some(app) = state.current() else {
        return Text::raw("No application selected");
    };

    let bold = Style::default().add_modifier(Modifier::BOLD);
    let dim = Style::default().fg(Color::DarkGray);
    let mut lines: Vec<Line> = Vec::new();

    lines.push(Line::from(Span::styled(app.position.clone(), bold)));
    lines.push(Line::from(format!("at {}", app.company.name)));
    lines.push(Line::from(Span::styled(
        format!("Stage: {}", app.stage.label()),
        stage_style(app.stage),
    )));
    lines.push(Line::from(format!("Applied: {}", format_date(app.date_applied))));
    if !app.location.is_empty() || app.remote {
        let remote = if app.remote { " (remote)" } else { "" };
        lines.push(Line::from(format!("Location: {}{}", app.location, remote)));
    }
    if app.has_salary() {
        lines.push(Line::from(format!("Salary: {}", app.salary)));
    }
    if app.shortlisted {
        lines.push(Line::from(Span::styled("Shortlisted", Style::default().fg(Color::Green))));
    }
    lines.push(Line::from(""));

    if !app.notes.is_empty() {
        for line in textwrap::fill(&app.notes, width).lines() {
            lines.push(Line::from(line.to_string()));
        }
        lines.push(Line::from(""));
    }

    if !app.contacts.is_empty() {
        lines.push(Line::from(Span::styled("Contacts", bold)));
        for contact in &app.contacts {
            lines.push(Line::from(format!("  {} {} {}", contact.name, contact.role, contact.email)));
        }
        lines.push(Line::from(""));
    }

    if !app.interviews.is_empty() {
        lines.push(Line::from(Span::styled("Interviews", bold)));
        for interview in &app.interviews {
            let done = if interview.completed { "x" } else { " " };
            lines.push(Line::from(format!(
                "  [{}] {} {}",
                done,
                interview.date.format("%Y-%m-%d %H:%M"),
                interview.kind
            )));
        }
        lines.push(Line::from(""));
    }

    if !app.tasks.is_empty() {
        let now = chrono::Utc::now();
        lines.push(Line::from(Span::styled("Tasks", bold)));
        for task in &app.tasks {
            let done = if task.completed { "x" } else { " " };
            let due = task.due_date.map(format_date).unwrap_or_default();
            let style = if task.is_overdue(now) {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };
            lines.push(Line::from(Span::styled(format!("  [{}] {} {}", done, task.title, due), style)));
        }
        lines.push(Line::from(""));
    }

    if !app.note_entries.is_empty() {
        lines.push(Line::from(Span::styled("Notes", bold)));
        for note in &app.note_entries {
            lines.push(Line::from(Span::styled(format!("  {}", note.created_at.format("%Y-%m-%d")), dim)));
            for line in textwrap::fill(&note.content, width.saturating_sub(4).max(10)).lines() {
                lines.push(Line::from(format!("    {}", line)));
            }
        }
        lines.push(Line::from(""));
    }

    if !app.job_description.is_empty() {
        lines.push(Line::from(Span::styled("Job Description", bold)));
        for line in textwrap::fill(&app.job_description, width).lines() {
            lines.push(Line::from(line.to_string()));
        }
    }

    Text::from(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_filter_cycles_through_every_stage() {
        let mut filter = StageFilter::All;
        let mut seen = Vec::new();
        for _ in 0..Stage::ALL.len() + 1 {
            filter = next_stage_filter(filter);
            seen.push(filter);
        }
        assert_eq!(seen.first(), Some(&StageFilter::Only(Stage::Applied)));
        assert_eq!(seen.last(), Some(&StageFilter::All));
    }

    #[test]
    fn sort_cycle_ends_unsorted() {
        let mut sort = None;
        for _ in 0..Column::ALL.len() {
            sort = next_sort(sort);
            assert!(sort.is_some());
        }
        assert_eq!(next_sort(sort), None);
        assert_eq!(reverse_sort(None), Some(SortSpec::desc(Column::DateApplied)));
    }

    #[test]
    fn rows_match_density_height() {
        let app = jobtrack::seed::applications().remove(0);
        for density in Density::ALL {
            let lines = row_lines(&app, density, false, 60, None);
            assert_eq!(lines.len() as u32, density.terminal_rows());
        }
    }
}
