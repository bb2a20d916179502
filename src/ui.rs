use water_management::config::Settings;
use water_management::db::{Reading, ReadingStore};
use water_management::entry::{EntryForm, EntryWorkflow};
use water_management::export::{export_to_path, DEFAULT_EXPORT_FILE};
use water_management::report::{
    build_chart, format_amount, Chart, ChartKind, ColumnMaxima, DateRange,
    DetailFilter, HouseTotal, Overview, UsageSeries, UsageShare, VOLUME_UNIT,
};
use anyhow::Result;
use chrono::{Duration, Local, NaiveDate};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{
        Axis, Bar, BarChart, BarGroup, Block, Borders, Cell, Chart as LineChart, Dataset,
        GraphType, Paragraph, Row, Table, TableState, Tabs, Wrap,
    },
    Frame, Terminal,
};
use std::io;
use std::path::PathBuf;

const SERIES_COLORS: [Color; 6] = [
    Color::Cyan,
    Color::Yellow,
    Color::Green,
    Color::Magenta,
    Color::Red,
    Color::Blue,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Form,
    Dashboard,
    DataManagement,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Form => Page::Dashboard,
            Page::Dashboard => Page::DataManagement,
            Page::DataManagement => Page::Form,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Form => Page::DataManagement,
            Page::Dashboard => Page::Form,
            Page::DataManagement => Page::Dashboard,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Form => "Form",
            Page::Dashboard => "Dashboard",
            Page::DataManagement => "Data Management",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardTab {
    Overview,
    Charts,
    Detailed,
}

impl DashboardTab {
    const ALL: [DashboardTab; 3] = [
        DashboardTab::Overview,
        DashboardTab::Charts,
        DashboardTab::Detailed,
    ];

    fn index(&self) -> usize {
        match self {
            DashboardTab::Overview => 0,
            DashboardTab::Charts => 1,
            DashboardTab::Detailed => 2,
        }
    }

    fn title(&self) -> &'static str {
        match self {
            DashboardTab::Overview => "Overview",
            DashboardTab::Charts => "Charts",
            DashboardTab::Detailed => "Detailed Data",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    HouseNumber,
    WaterMeter,
}

#[derive(Debug, Clone, Default)]
pub struct FormState {
    pub house_number: String,
    pub water_meter: String,
    pub focus: Option<FormField>,
}

impl FormState {
    fn focused(&self) -> FormField {
        self.focus.unwrap_or(FormField::HouseNumber)
    }

    fn toggle_focus(&mut self) {
        self.focus = Some(match self.focused() {
            FormField::HouseNumber => FormField::WaterMeter,
            FormField::WaterMeter => FormField::HouseNumber,
        });
    }

    fn push(&mut self, c: char) {
        match self.focused() {
            FormField::HouseNumber => self.house_number.push(c),
            FormField::WaterMeter => {
                if c.is_ascii_digit() || (c == '.' && !self.water_meter.contains('.')) {
                    self.water_meter.push(c);
                }
            }
        }
    }

    fn pop(&mut self) {
        match self.focused() {
            FormField::HouseNumber => self.house_number.pop(),
            FormField::WaterMeter => self.water_meter.pop(),
        };
    }

    /// An empty meter field counts as 0, like a fresh number input
    fn water_meter_value(&self) -> Option<f64> {
        let raw = self.water_meter.trim();
        if raw.is_empty() {
            Some(0.0)
        } else {
            raw.parse().ok()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub kind: StatusKind,
    pub text: String,
}

pub struct App<'a> {
    store: &'a ReadingStore,
    workflow: EntryWorkflow,
    currency: String,
    pub export_path: PathBuf,
    pub readings: Vec<Reading>,
    pub current_page: Page,
    pub dashboard_tab: DashboardTab,
    pub chart_kind: ChartKind,
    pub form: FormState,
    pub filter: DetailFilter,
    pub editing_search: bool,
    pub confirm_clear: bool,
    pub state: TableState,
    pub status: Option<StatusMessage>,
}

impl<'a> App<'a> {
    pub fn new(store: &'a ReadingStore, settings: &Settings) -> Self {
        let mut app = Self {
            store,
            workflow: EntryWorkflow::new(settings.unit_rate),
            currency: settings.currency.clone(),
            export_path: PathBuf::from(DEFAULT_EXPORT_FILE),
            readings: Vec::new(),
            current_page: Page::Form,
            dashboard_tab: DashboardTab::Overview,
            chart_kind: ChartKind::Bar,
            form: FormState::default(),
            filter: DetailFilter::default(),
            editing_search: false,
            confirm_clear: false,
            state: TableState::default(),
            status: None,
        };
        app.refresh();
        app
    }

    /// Re-read the whole table; every view is recomputed from this
    pub fn refresh(&mut self) {
        match self.store.read_all() {
            Ok(readings) => self.readings = readings,
            Err(e) => {
                self.readings.clear();
                self.set_status(StatusKind::Error, format!("Error loading data: {}", e));
            }
        }
    }

    pub fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }

    fn set_status(&mut self, kind: StatusKind, text: impl Into<String>) {
        self.status = Some(StatusMessage {
            kind,
            text: text.into(),
        });
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
        self.state.select(None);
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
        self.state.select(None);
    }

    /// Rows the table on the current page shows
    pub fn visible_rows(&self) -> Vec<Reading> {
        match (self.current_page, self.dashboard_tab) {
            (Page::Dashboard, DashboardTab::Detailed) => {
                self.filter.apply(&self.readings, self.today()).rows
            }
            (Page::DataManagement, _) => self.readings.clone(),
            _ => Vec::new(),
        }
    }

    pub fn submit_form(&mut self) {
        let water_meter = match self.form.water_meter_value() {
            Some(v) => v,
            None => {
                self.set_status(StatusKind::Error, "Water meter reading must be a number");
                return;
            }
        };

        let form = EntryForm::new(self.form.house_number.clone(), water_meter);
        match self.workflow.submit(self.store, &form) {
            Ok(submitted) => {
                self.set_status(
                    StatusKind::Success,
                    format!(
                        "Data successfully added! {} used {} {} → {} {}",
                        submitted.house_number,
                        format_amount(submitted.water_meter),
                        VOLUME_UNIT,
                        format_amount(submitted.price),
                        self.currency
                    ),
                );
                self.form = FormState::default();
            }
            Err(e) => self.set_status(StatusKind::Error, e.to_string()),
        }
    }

    pub fn export_visible(&mut self) {
        let rows = self.visible_rows();
        if rows.is_empty() {
            self.set_status(StatusKind::Info, "Nothing to export");
            return;
        }

        match export_to_path(&rows, &self.export_path) {
            Ok(()) => self.set_status(
                StatusKind::Success,
                format!("Exported {} rows to {}", rows.len(), self.export_path.display()),
            ),
            Err(e) => self.set_status(StatusKind::Error, format!("Export failed: {}", e)),
        }
    }

    pub fn clear_data(&mut self) {
        self.confirm_clear = false;
        if self.store.clear_all() {
            self.set_status(StatusKind::Success, "All data has been cleared!");
            self.state.select(None);
        } else {
            self.set_status(StatusKind::Error, "Failed to clear data");
        }
    }

    /// Move one bound of the detailed view's date range by `days`
    pub fn shift_range(&mut self, start_days: i64, end_days: i64) {
        let today = self.today();
        let current = self.filter.effective_range(&self.readings, today);
        let start = current.start + Duration::days(start_days);
        let end = current.end + Duration::days(end_days);
        self.filter.range = Some(DateRange::new(start, end).clamped(today));
        self.state.select(None);
    }

    pub fn next(&mut self) {
        let len = self.visible_rows().len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.visible_rows().len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    /// Apply one key press. Returns `true` when the app should quit.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return true;
        }

        match key.code {
            KeyCode::Tab => {
                self.next_page();
                return false;
            }
            KeyCode::BackTab => {
                self.previous_page();
                return false;
            }
            _ => {}
        }

        let quit = match self.current_page {
            Page::Form => self.handle_form_key(key),
            Page::Dashboard => self.handle_dashboard_key(key),
            Page::DataManagement => self.handle_management_key(key),
        };

        self.refresh();
        quit
    }

    fn handle_form_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Esc => return true,
            KeyCode::Enter => self.submit_form(),
            KeyCode::Up | KeyCode::Down => self.form.toggle_focus(),
            KeyCode::Backspace => self.form.pop(),
            KeyCode::Char(c) => self.form.push(c),
            _ => {}
        }
        false
    }

    fn handle_dashboard_key(&mut self, key: KeyEvent) -> bool {
        if self.editing_search {
            match key.code {
                KeyCode::Enter | KeyCode::Esc => self.editing_search = false,
                KeyCode::Backspace => {
                    self.filter.search.pop();
                }
                KeyCode::Char(c) => self.filter.search.push(c),
                _ => {}
            }
            self.state.select(None);
            return false;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Char('1') => self.dashboard_tab = DashboardTab::Overview,
            KeyCode::Char('2') => self.dashboard_tab = DashboardTab::Charts,
            KeyCode::Char('3') => self.dashboard_tab = DashboardTab::Detailed,
            KeyCode::Char('b') => self.chart_kind = ChartKind::Bar,
            KeyCode::Char('p') => self.chart_kind = ChartKind::Pie,
            KeyCode::Char('l') => self.chart_kind = ChartKind::Line,
            _ if self.dashboard_tab != DashboardTab::Detailed => {}
            KeyCode::Char('/') => self.editing_search = true,
            KeyCode::Char('[') => self.shift_range(-1, 0),
            KeyCode::Char(']') => self.shift_range(1, 0),
            KeyCode::Char('{') => self.shift_range(0, -1),
            KeyCode::Char('}') => self.shift_range(0, 1),
            KeyCode::Char('r') => {
                self.filter = DetailFilter::default();
                self.state.select(None);
            }
            KeyCode::Char('e') => self.export_visible(),
            KeyCode::Down | KeyCode::Char('j') => self.next(),
            KeyCode::Up | KeyCode::Char('k') => self.previous(),
            _ => {}
        }
        false
    }

    fn handle_management_key(&mut self, key: KeyEvent) -> bool {
        if self.confirm_clear {
            if key.code == KeyCode::Char('y') {
                self.clear_data();
            } else {
                self.confirm_clear = false;
                self.set_status(StatusKind::Info, "Clear cancelled");
            }
            return false;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Char('e') => self.export_visible(),
            KeyCode::Char('X') if !self.readings.is_empty() => self.confirm_clear = true,
            KeyCode::Down | KeyCode::Char('j') => self.next(),
            KeyCode::Up | KeyCode::Char('k') => self.previous(),
            _ => {}
        }
        false
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res?;
    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press && app.handle_key(key) {
                return Ok(());
            }
        }
    }
}

pub fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    match app.current_page {
        Page::Form => render_form(f, chunks[1], app),
        Page::Dashboard => render_dashboard(f, chunks[1], app),
        Page::DataManagement => render_data_management(f, chunks[1], app),
    }

    render_status_bar(f, chunks[2], app);
}

fn title_style() -> Style {
    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let pages = [Page::Form, Page::Dashboard, Page::DataManagement];

    let mut spans = vec![Span::styled(
        "💧 Water Management System  ",
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    )];
    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(page.title().to_string(), style));
    }

    spans.push(Span::raw("  |  "));
    spans.push(Span::styled(
        format!(
            "Water price: {:.1} {} per unit",
            app.workflow.unit_rate(),
            app.currency
        ),
        Style::default().fg(Color::Green),
    ));
    spans.push(Span::raw("  |  "));
    spans.push(Span::styled(
        format!("Rows: {}", app.readings.len()),
        Style::default().fg(Color::White),
    ));

    let header = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );
    f.render_widget(header, area);
}

fn render_form(f: &mut Frame, area: Rect, app: &App) {
    let field = |label: &'static str, value: &str, placeholder: &'static str, focused: bool| {
        let marker = if focused { "→ " } else { "  " };
        let value_span = if value.is_empty() {
            Span::styled(placeholder, Style::default().fg(Color::DarkGray))
        } else {
            Span::styled(value.to_string(), Style::default().fg(Color::White))
        };
        Line::from(vec![
            Span::styled(marker, Style::default().fg(Color::Green)),
            Span::styled(
                format!("{:<28}", label),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
            value_span,
            if focused {
                Span::styled("▏", Style::default().fg(Color::Yellow))
            } else {
                Span::raw("")
            },
        ])
    };

    let focus = app.form.focused();
    let content = vec![
        Line::from(""),
        Line::from(Span::styled(
            "  Enter water meter readings for each house",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )),
        Line::from(""),
        field(
            "House Number",
            &app.form.house_number,
            "e.g. H-123",
            focus == FormField::HouseNumber,
        ),
        Line::from(""),
        field(
            "Water Meter Reading (m³)",
            &app.form.water_meter,
            "0.0",
            focus == FormField::WaterMeter,
        ),
        Line::from(""),
        Line::from(vec![
            Span::raw("  Price preview: "),
            Span::styled(
                app.form
                    .water_meter_value()
                    .map(|m| {
                        format!("{} {}", format_amount(app.workflow.price_for(m)), app.currency)
                    })
                    .unwrap_or_else(|| "-".to_string()),
                Style::default().fg(Color::Green),
            ),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Enter", Style::default().fg(Color::Yellow)),
            Span::raw(" Save Data   "),
            Span::styled("↑/↓", Style::default().fg(Color::Yellow)),
            Span::raw(" Switch field"),
        ]),
    ];

    let form = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Data Entry Form "),
    );
    f.render_widget(form, area);
}

fn render_dashboard(f: &mut Frame, area: Rect, app: &mut App) {
    if app.readings.is_empty() {
        render_empty(f, area, "No data available yet. Please add data using the Form page.");
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    let tabs = Tabs::new(
        DashboardTab::ALL
            .iter()
            .map(|t| Line::from(t.title()))
            .collect::<Vec<_>>(),
    )
    .select(app.dashboard_tab.index())
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Water Management Dashboard "),
    )
    .highlight_style(title_style().add_modifier(Modifier::UNDERLINED));
    f.render_widget(tabs, chunks[0]);

    match app.dashboard_tab {
        DashboardTab::Overview => render_overview(f, chunks[1], app),
        DashboardTab::Charts => render_charts(f, chunks[1], app),
        DashboardTab::Detailed => render_detailed(f, chunks[1], app),
    }
}

fn render_empty(f: &mut Frame, area: Rect, message: &str) {
    let info = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled(
            format!("  ℹ️  {}", message),
            Style::default().fg(Color::Cyan),
        )),
    ])
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(info, area);
}

fn render_overview(f: &mut Frame, area: Rect, app: &App) {
    let overview = match Overview::from_readings(&app.readings) {
        Some(o) => o,
        None => return render_empty(f, area, "No data available yet."),
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(9), Constraint::Min(0)])
        .split(area);

    let mut lines = vec![Line::from(Span::styled("  Key Metrics", title_style()))];
    for (i, metric) in overview.metrics(&app.currency).iter().enumerate() {
        if i == 3 {
            lines.push(Line::from(Span::styled("  Financial Summary", title_style())));
        }
        lines.push(Line::from(vec![
            Span::styled(
                format!("    {:<20}", metric.label),
                Style::default().fg(Color::Cyan),
            ),
            Span::styled(
                format!("{} {}", metric.value, metric.unit),
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            ),
        ]));
    }

    let metrics = Paragraph::new(lines).block(Block::default().borders(Borders::ALL));
    f.render_widget(metrics, chunks[0]);

    let table = readings_table(&overview.recent, &app.currency, None)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Recent Entries "),
        );
    f.render_widget(table, chunks[1]);
}

fn render_charts(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(0)])
        .split(area);

    let mut selector = vec![Span::raw(" Chart type: ")];
    for (kind, key) in ChartKind::ALL.iter().zip(['b', 'p', 'l']) {
        let style = if *kind == app.chart_kind {
            title_style().add_modifier(Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        selector.push(Span::styled(format!("[{}] {}", key, kind.title()), style));
        selector.push(Span::raw("  "));
    }
    f.render_widget(Paragraph::new(Line::from(selector)), chunks[0]);

    match build_chart(app.chart_kind, &app.readings) {
        Chart::Bar(totals) => render_bar_charts(f, chunks[1], &totals, &app.currency),
        Chart::Pie(shares) => render_usage_shares(f, chunks[1], &shares),
        Chart::Line(series) => render_usage_series(f, chunks[1], &series),
    }
}

/// Bar values are integers; scale by 100 so two decimals survive
fn scaled(value: f64) -> u64 {
    (value.max(0.0) * 100.0).round() as u64
}

fn render_bar_charts(f: &mut Frame, area: Rect, totals: &[HouseTotal], currency: &str) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let usage_bars: Vec<Bar> = totals
        .iter()
        .map(|t| {
            Bar::default()
                .label(Line::from(t.house_number.clone()))
                .value(scaled(t.usage))
                .text_value(format_amount(t.usage))
        })
        .collect();
    let revenue_bars: Vec<Bar> = totals
        .iter()
        .map(|t| {
            Bar::default()
                .label(Line::from(t.house_number.clone()))
                .value(scaled(t.revenue))
                .text_value(format_amount(t.revenue))
        })
        .collect();

    let usage = BarChart::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" Water Usage by House ({}) ", VOLUME_UNIT)),
        )
        .data(BarGroup::default().bars(&usage_bars))
        .bar_width(9)
        .bar_gap(2)
        .bar_style(Style::default().fg(Color::Blue))
        .value_style(Style::default().fg(Color::White).bg(Color::Blue));
    f.render_widget(usage, chunks[0]);

    let revenue = BarChart::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" Revenue by House ({}) ", currency)),
        )
        .data(BarGroup::default().bars(&revenue_bars))
        .bar_width(9)
        .bar_gap(2)
        .bar_style(Style::default().fg(Color::Green))
        .value_style(Style::default().fg(Color::Black).bg(Color::Green));
    f.render_widget(revenue, chunks[1]);
}

/// Text bar proportional to `percent`, `width` cells at 100%
pub fn share_bar(percent: f64, width: usize) -> String {
    let filled = ((percent.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize;
    "█".repeat(filled)
}

fn render_usage_shares(f: &mut Frame, area: Rect, shares: &[UsageShare]) {
    let header = Row::new(
        ["House Number", "Usage", "Share", ""].map(|h| Cell::from(h).style(title_style())),
    )
    .style(Style::default().bg(Color::DarkGray));

    let rows = shares.iter().enumerate().map(|(i, s)| {
        let color = SERIES_COLORS[i % SERIES_COLORS.len()];
        Row::new(vec![
            Cell::from(s.house_number.clone()),
            Cell::from(format!("{} {}", format_amount(s.usage), VOLUME_UNIT)),
            Cell::from(format!("{:.1}%", s.percent)),
            Cell::from(share_bar(s.percent, 40)).style(Style::default().fg(color)),
        ])
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(18),
            Constraint::Length(14),
            Constraint::Length(8),
            Constraint::Min(10),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Water Usage Distribution "),
    );
    f.render_widget(table, area);
}

fn render_usage_series(f: &mut Frame, area: Rect, series: &[UsageSeries]) {
    let first_day = series
        .iter()
        .filter_map(|s| s.points.first().map(|(d, _)| *d))
        .min();
    let last_day = series
        .iter()
        .filter_map(|s| s.points.last().map(|(d, _)| *d))
        .max();

    let (first_day, last_day) = match (first_day, last_day) {
        (Some(a), Some(b)) => (a, b),
        _ => return render_empty(f, area, "No dated readings to plot."),
    };

    // x = days since the first observed day
    let points: Vec<Vec<(f64, f64)>> = series
        .iter()
        .map(|s| {
            s.points
                .iter()
                .map(|(d, usage)| ((*d - first_day).num_days() as f64, *usage))
                .collect()
        })
        .collect();

    let max_usage = series
        .iter()
        .flat_map(|s| s.points.iter().map(|(_, u)| *u))
        .fold(0.0_f64, f64::max);
    let span_days = ((last_day - first_day).num_days() as f64).max(1.0);

    let datasets: Vec<Dataset> = series
        .iter()
        .zip(points.iter())
        .enumerate()
        .map(|(i, (s, data))| {
            Dataset::default()
                .name(s.house_number.clone())
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(SERIES_COLORS[i % SERIES_COLORS.len()]))
                .data(data)
        })
        .collect();

    let chart = LineChart::new(datasets)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Water Usage Over Time "),
        )
        .x_axis(
            Axis::default()
                .title("Date")
                .bounds([0.0, span_days])
                .labels(vec![
                    Span::raw(first_day.to_string()),
                    Span::raw(last_day.to_string()),
                ]),
        )
        .y_axis(
            Axis::default()
                .title(format!("Usage ({})", VOLUME_UNIT))
                .bounds([0.0, max_usage.max(1.0)])
                .labels(vec![
                    Span::raw("0"),
                    Span::raw(format_amount(max_usage)),
                ]),
        );
    f.render_widget(chart, area);
}

fn readings_table<'r>(
    rows: &'r [Reading],
    currency: &str,
    maxima: Option<ColumnMaxima>,
) -> Table<'r> {
    let header_cells = [
        "House Number".to_string(),
        format!("Water Meter ({})", VOLUME_UNIT),
        format!("Price ({})", currency),
        "Date".to_string(),
    ]
    .into_iter()
    .map(|h| Cell::from(h).style(title_style()));

    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let highlight = |value: f64, max: Option<f64>| {
        if max == Some(value) {
            Style::default().fg(Color::Black).bg(Color::Yellow)
        } else {
            Style::default()
        }
    };

    let body = rows.iter().map(move |r| {
        let (meter_max, price_max) = maxima
            .map(|m| (m.water_meter, m.price))
            .unwrap_or((None, None));
        Row::new(vec![
            Cell::from(truncate(&r.house_number, 20)),
            Cell::from(format_amount(r.water_meter)).style(highlight(r.water_meter, meter_max)),
            Cell::from(format_amount(r.price)).style(highlight(r.price, price_max)),
            Cell::from(r.date.clone()),
        ])
        .height(1)
    });

    Table::new(
        body,
        [
            Constraint::Length(22),
            Constraint::Length(18),
            Constraint::Length(16),
            Constraint::Length(21),
        ],
    )
    .header(header)
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ")
}

fn render_detailed(f: &mut Frame, area: Rect, app: &mut App) {
    let view = app.filter.apply(&app.readings, app.today());

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    let search_style = if app.editing_search {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::White)
    };
    let search_text = if app.filter.search.is_empty() && !app.editing_search {
        "Enter house number".to_string()
    } else {
        app.filter.search.clone()
    };

    let filters = Paragraph::new(Line::from(vec![
        Span::styled("🔍 Search: ", Style::default().fg(Color::Cyan)),
        Span::styled(search_text, search_style),
        Span::raw("   "),
        Span::styled("Date range: ", Style::default().fg(Color::Cyan)),
        Span::raw(format!("{} → {}", view.range.start, view.range.end)),
        Span::raw("   "),
        Span::styled(
            format!("{} rows", view.rows.len()),
            Style::default().fg(Color::Green),
        ),
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Data Explorer "),
    );
    f.render_widget(filters, chunks[0]);

    let table = readings_table(&view.rows, &app.currency, Some(view.maxima)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );
    f.render_stateful_widget(table, chunks[1], &mut app.state);
}

fn render_data_management(f: &mut Frame, area: Rect, app: &mut App) {
    if app.readings.is_empty() {
        render_empty(f, area, "No data available yet.");
        return;
    }

    // Stored order, identical to what `e` exports
    let rows = app.visible_rows();

    let title = if app.confirm_clear {
        " Clear All Data? press y to confirm, any other key to cancel "
    } else {
        " Data Management "
    };
    let border = if app.confirm_clear { Color::Red } else { Color::White };

    let table = readings_table(&rows, &app.currency, None).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .title(title),
    );
    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let mut spans = Vec::new();

    if let Some(status) = &app.status {
        let (icon, color) = match status.kind {
            StatusKind::Success => ("✅", Color::Green),
            StatusKind::Error => ("❌", Color::Red),
            StatusKind::Info => ("ℹ️", Color::Cyan),
        };
        spans.push(Span::styled(
            format!(" {} {} ", icon, status.text),
            Style::default().fg(color),
        ));
        spans.push(Span::raw(" | "));
    }

    let hints: &[(&str, &str)] = match app.current_page {
        Page::Form => &[("Enter", "Save"), ("Esc", "Quit")],
        Page::Dashboard => match app.dashboard_tab {
            DashboardTab::Detailed => &[
                ("1-3", "Tabs"),
                ("/", "Search"),
                ("[ ]", "Start"),
                ("{ }", "End"),
                ("r", "Reset"),
                ("e", "Export CSV"),
                ("q", "Quit"),
            ],
            DashboardTab::Charts => &[("1-3", "Tabs"), ("b/p/l", "Chart"), ("q", "Quit")],
            DashboardTab::Overview => &[("1-3", "Tabs"), ("q", "Quit")],
        },
        Page::DataManagement => &[("e", "Export CSV"), ("X", "Clear All Data"), ("q", "Quit")],
    };

    spans.push(Span::styled("Tab", Style::default().fg(Color::Yellow)));
    spans.push(Span::raw(" Page"));
    for (key, label) in hints {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(*key, Style::default().fg(Color::Yellow)));
        spans.push(Span::raw(format!(" {}", label)));
    }

    let status_bar = Paragraph::new(Line::from(spans))
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White)),
        );
    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::TestBackend;

    fn press(app: &mut App, code: KeyCode) -> bool {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    fn screen(app: &mut App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(140, 40)).unwrap();
        terminal.draw(|f| ui(f, app)).unwrap();

        let buffer = terminal.backend().buffer();
        let mut text = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                text.push_str(buffer.get(x, y).symbol());
            }
            text.push('\n');
        }
        text
    }

    #[test]
    fn test_page_cycle() {
        assert_eq!(Page::Form.next(), Page::Dashboard);
        assert_eq!(Page::DataManagement.next(), Page::Form);
        assert_eq!(Page::Form.previous(), Page::DataManagement);
    }

    #[test]
    fn test_form_submission_via_keys() {
        let store = ReadingStore::open_in_memory().unwrap();
        let mut app = App::new(&store, &Settings::default());

        type_text(&mut app, "H-42");
        press(&mut app, KeyCode::Down);
        type_text(&mut app, "1x2.5.0");
        assert_eq!(app.form.water_meter, "12.50");

        press(&mut app, KeyCode::Enter);

        assert_eq!(app.readings.len(), 1);
        assert_eq!(app.readings[0].house_number, "H-42");
        assert_eq!(app.readings[0].price, 12.5 * 4.5);
        assert_eq!(app.status.as_ref().unwrap().kind, StatusKind::Success);
        assert!(app.form.house_number.is_empty(), "form resets after save");
    }

    #[test]
    fn test_form_rejects_empty_house() {
        let store = ReadingStore::open_in_memory().unwrap();
        let mut app = App::new(&store, &Settings::default());

        press(&mut app, KeyCode::Enter);

        let status = app.status.as_ref().unwrap();
        assert_eq!(status.kind, StatusKind::Error);
        assert_eq!(status.text, "Please enter a house number");
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_dashboard_empty_message() {
        let store = ReadingStore::open_in_memory().unwrap();
        let mut app = App::new(&store, &Settings::default());
        press(&mut app, KeyCode::Tab);

        assert!(screen(&mut app).contains("No data available yet"));
    }

    #[test]
    fn test_overview_renders_metrics() {
        let store = ReadingStore::open_in_memory().unwrap();
        store.insert("H-1", 10.0, "2024-01-01 08:00:00", 45.0);
        let mut app = App::new(&store, &Settings::default());
        press(&mut app, KeyCode::Tab);

        let text = screen(&mut app);
        assert!(text.contains("Total Water Usage"));
        assert!(text.contains("10.00 m³"));
        assert!(text.contains("45.00 Baht"));
    }

    #[test]
    fn test_every_chart_renders() {
        let store = ReadingStore::open_in_memory().unwrap();
        store.insert("H-1", 10.0, "2024-01-01 08:00:00", 45.0);
        store.insert("H-2", 5.0, "2024-01-02 08:00:00", 22.5);
        let mut app = App::new(&store, &Settings::default());
        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Char('2'));

        assert!(screen(&mut app).contains("Water Usage by House"));
        press(&mut app, KeyCode::Char('p'));
        assert!(screen(&mut app).contains("66.7%"));
        press(&mut app, KeyCode::Char('l'));
        assert!(screen(&mut app).contains("Water Usage Over Time"));
    }

    #[test]
    fn test_detailed_search_and_export() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReadingStore::open_in_memory().unwrap();
        store.insert("H-1", 10.0, "2024-01-01 08:00:00", 45.0);
        store.insert("X-2", 5.0, "2024-01-02 08:00:00", 22.5);

        let mut app = App::new(&store, &Settings::default());
        app.export_path = dir.path().join("out.csv");
        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Char('3'));
        press(&mut app, KeyCode::Char('/'));
        type_text(&mut app, "h-");
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.filter.search, "h-");
        assert_eq!(app.visible_rows().len(), 1);

        press(&mut app, KeyCode::Char('e'));
        let exported = water_management::export::load_csv(&app.export_path).unwrap();
        assert_eq!(exported, app.visible_rows());
    }

    #[test]
    fn test_data_management_exports_whole_table() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReadingStore::open_in_memory().unwrap();
        store.insert("H-1", 10.0, "2024-01-01 08:00:00", 45.0);
        store.insert("X-2", 5.0, "2024-01-02 08:00:00", 22.5);
        store.insert("H-3", 1.0, "garbled", 4.5);

        let mut app = App::new(&store, &Settings::default());
        app.export_path = dir.path().join("all.csv");
        app.dashboard_tab = DashboardTab::Detailed;
        app.filter.search = "h-1".to_string();
        app.current_page = Page::DataManagement;

        press(&mut app, KeyCode::Char('e'));

        let exported = water_management::export::load_csv(&app.export_path).unwrap();
        assert_eq!(exported, store.read_all().unwrap());
        assert_eq!(app.status.as_ref().unwrap().kind, StatusKind::Success);
    }

    #[test]
    fn test_range_shift_is_inclusive_and_clamped() {
        let store = ReadingStore::open_in_memory().unwrap();
        store.insert("H-1", 1.0, "2024-01-01 08:00:00", 4.5);
        store.insert("H-1", 2.0, "2024-01-02 08:00:00", 9.0);
        store.insert("H-1", 3.0, "2024-01-03 08:00:00", 13.5);

        let mut app = App::new(&store, &Settings::default());
        app.current_page = Page::Dashboard;
        app.dashboard_tab = DashboardTab::Detailed;

        press(&mut app, KeyCode::Char(']'));
        press(&mut app, KeyCode::Char('{'));
        let range = app.filter.range.unwrap();
        assert_eq!(range.start.to_string(), "2024-01-02");
        assert_eq!(range.end.to_string(), "2024-01-02");
        assert_eq!(app.visible_rows().len(), 1);

        // Moving the end past today is pulled back
        for _ in 0..5 {
            press(&mut app, KeyCode::Char('}'));
        }
        assert!(app.filter.range.unwrap().end <= app.today());
    }

    #[test]
    fn test_clear_requires_confirmation() {
        let store = ReadingStore::open_in_memory().unwrap();
        store.insert("H-1", 1.0, "2024-01-01 08:00:00", 4.5);
        let mut app = App::new(&store, &Settings::default());
        app.current_page = Page::DataManagement;

        press(&mut app, KeyCode::Char('X'));
        assert!(app.confirm_clear);
        press(&mut app, KeyCode::Char('n'));
        assert_eq!(app.readings.len(), 1);

        press(&mut app, KeyCode::Char('X'));
        press(&mut app, KeyCode::Char('y'));
        assert!(app.readings.is_empty());
        assert_eq!(app.status.as_ref().unwrap().text, "All data has been cleared!");
    }

    #[test]
    fn test_quit_keys() {
        let store = ReadingStore::open_in_memory().unwrap();
        let mut app = App::new(&store, &Settings::default());

        // 'q' is text on the form page
        assert!(!press(&mut app, KeyCode::Char('q')));
        assert!(press(&mut app, KeyCode::Esc));

        app.current_page = Page::Dashboard;
        assert!(press(&mut app, KeyCode::Char('q')));
    }

    #[test]
    fn test_share_bar_and_truncate() {
        assert_eq!(share_bar(50.0, 10).chars().count(), 5);
        assert_eq!(share_bar(250.0, 4).chars().count(), 4);
        assert_eq!(truncate("บ้านเลขที่ 12345678901234", 10).chars().count(), 10);
    }
}
