use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Utc;
use crossbeam_channel::{unbounded, Receiver, Sender};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Padding, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use textwrap::{wrap, Options as WrapOptions};
use tracing::{info, warn};
use unicode_width::UnicodeWidthStr;

use crate::api;
use crate::auth::{AuthService, LoginRequest, SignupRequest};
use crate::catalog::{CatalogView, FETCH_ERROR};
use crate::comments::{self, Entry};
use crate::config::PlayerConfig;
use crate::data::{CatalogService, CommentService};
use crate::detail::{DetailView, Reaction};
use crate::event::{AsyncResponse, AuthAction};
use crate::flight;
use crate::player;
use crate::routes::{self, History, Route, CATEGORIES, SIDEBAR_TAGS};
use crate::session::Session;

// Palette
const COLOR_BG: Color = Color::Rgb(30, 30, 46);
const COLOR_PANEL_BG: Color = Color::Rgb(24, 24, 36);
const COLOR_PANEL_FOCUSED_BG: Color = Color::Rgb(49, 50, 68);
const COLOR_PANEL_SELECTED_BG: Color = Color::Rgb(69, 71, 90);
const COLOR_BORDER_IDLE: Color = Color::Rgb(49, 50, 68);
const COLOR_BORDER_FOCUSED: Color = Color::Rgb(137, 180, 250);
const COLOR_TEXT_PRIMARY: Color = Color::Rgb(205, 214, 244);
const COLOR_TEXT_SECONDARY: Color = Color::Rgb(166, 173, 200);
const COLOR_ACCENT: Color = Color::Rgb(137, 180, 250);
const COLOR_BRAND: Color = Color::Rgb(243, 139, 168);
const COLOR_SUCCESS: Color = Color::Rgb(166, 227, 161);
const COLOR_ERROR: Color = Color::Rgb(243, 139, 168);

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const ICON_VERIFIED: &str = "✓";
const ICON_LIKE: &str = "▲";
const ICON_DISLIKE: &str = "▼";
const CURSOR: &str = "▏";
const INFO_PANE_HEIGHT: u16 = 12;

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let percent_x = percent_x.min(100);
    let percent_y = percent_y.min(100);
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage(100 - percent_x - (100 - percent_x) / 2),
        ])
        .split(area);
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage(100 - percent_y - (100 - percent_y) / 2),
        ])
        .split(horizontal[1]);
    vertical[1]
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Pane {
    Categories,
    Videos,
    Tags,
    Info,
    Comments,
    Related,
}

impl Pane {
    fn title(self) -> &'static str {
        match self {
            Pane::Categories => "Categories",
            Pane::Videos => "Videos",
            Pane::Tags => "Explore",
            Pane::Info => "Now Playing",
            Pane::Comments => "Comments",
            Pane::Related => "Up Next",
        }
    }

    fn cycle(route: &Route) -> &'static [Pane] {
        match route {
            Route::Home(_) => &[Pane::Categories, Pane::Videos, Pane::Tags],
            Route::Video { .. } => &[Pane::Info, Pane::Comments, Pane::Related],
            Route::Login | Route::Signup => &[],
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum FormField {
    Username,
    Email,
    Password,
    Confirm,
    Submit,
    Switch,
}

const LOGIN_FIELDS: [FormField; 4] = [
    FormField::Username,
    FormField::Password,
    FormField::Submit,
    FormField::Switch,
];
const SIGNUP_FIELDS: [FormField; 6] = [
    FormField::Username,
    FormField::Email,
    FormField::Password,
    FormField::Confirm,
    FormField::Submit,
    FormField::Switch,
];

struct AuthForm {
    action: AuthAction,
    active: usize,
    username: String,
    email: String,
    password: String,
    confirm: String,
    error: Option<String>,
    pending: bool,
}

impl AuthForm {
    fn new(action: AuthAction) -> Self {
        Self {
            action,
            active: 0,
            username: String::new(),
            email: String::new(),
            password: String::new(),
            confirm: String::new(),
            error: None,
            pending: false,
        }
    }

    fn fields(&self) -> &'static [FormField] {
        match self.action {
            AuthAction::Login => &LOGIN_FIELDS,
            AuthAction::Signup => &SIGNUP_FIELDS,
        }
    }

    fn active_field(&self) -> FormField {
        let fields = self.fields();
        fields[self.active.min(fields.len() - 1)]
    }

    fn next(&mut self) {
        self.active = (self.active + 1) % self.fields().len();
    }

    fn previous(&mut self) {
        let len = self.fields().len();
        self.active = (self.active + len - 1) % len;
    }

    fn active_value_mut(&mut self) -> Option<&mut String> {
        match self.active_field() {
            FormField::Username => Some(&mut self.username),
            FormField::Email => Some(&mut self.email),
            FormField::Password => Some(&mut self.password),
            FormField::Confirm => Some(&mut self.confirm),
            FormField::Submit | FormField::Switch => None,
        }
    }

    fn insert_char(&mut self, ch: char) {
        if let Some(value) = self.active_value_mut() {
            value.push(ch);
        }
        self.error = None;
    }

    fn backspace(&mut self) {
        if let Some(value) = self.active_value_mut() {
            value.pop();
        }
        self.error = None;
    }

    fn label(&self, field: FormField) -> &'static str {
        match (field, self.action) {
            (FormField::Username, AuthAction::Login) => "Email or username",
            (FormField::Username, AuthAction::Signup) => "Username",
            (FormField::Email, _) => "Email",
            (FormField::Password, _) => "Password",
            (FormField::Confirm, _) => "Confirm password",
            (FormField::Submit, AuthAction::Login) => "Sign In",
            (FormField::Submit, AuthAction::Signup) => "Sign Up",
            (FormField::Switch, AuthAction::Login) => "Don't have an account? Sign up",
            (FormField::Switch, AuthAction::Signup) => "Already have an account? Sign in",
        }
    }

    fn display_value(&self, field: FormField) -> String {
        match field {
            FormField::Username => self.username.clone(),
            FormField::Email => self.email.clone(),
            FormField::Password => "*".repeat(self.password.chars().count()),
            FormField::Confirm => "*".repeat(self.confirm.chars().count()),
            FormField::Submit | FormField::Switch => String::new(),
        }
    }
}

enum Input {
    Search(String),
    Comment,
    Edit { comment_id: String, text: String },
}

struct Spinner {
    index: usize,
    last_tick: Instant,
}

impl Spinner {
    fn new() -> Self {
        Self {
            index: 0,
            last_tick: Instant::now(),
        }
    }

    fn frame(&self) -> &'static str {
        SPINNER_FRAMES[self.index % SPINNER_FRAMES.len()]
    }

    fn advance(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.last_tick) >= Duration::from_millis(120) {
            self.index = (self.index + 1) % SPINNER_FRAMES.len();
            self.last_tick = now;
            true
        } else {
            false
        }
    }

    fn reset(&mut self) {
        self.index = 0;
        self.last_tick = Instant::now();
    }
}

fn wrap_plain(text: &str, width: usize, style: Style) -> Vec<Line<'static>> {
    if text.trim().is_empty() {
        return vec![Line::from(Span::styled(String::new(), style))];
    }
    let options = WrapOptions::new(width.max(1)).break_words(true);
    text.lines()
        .flat_map(|paragraph| {
            if paragraph.is_empty() {
                vec![String::new()]
            } else {
                wrap(paragraph, &options)
                    .into_iter()
                    .map(|cow| cow.into_owned())
                    .collect()
            }
        })
        .map(|line| Line::from(Span::styled(line, style)))
        .collect()
}

fn pad_lines_to_width(lines: &mut [Line<'static>], width: u16) {
    let width = width as usize;
    if width == 0 {
        return;
    }

    for line in lines {
        let mut current_width = 0usize;
        for span in &line.spans {
            current_width =
                current_width.saturating_add(UnicodeWidthStr::width(span.content.as_ref()));
        }
        if current_width >= width {
            continue;
        }
        let pad_style = line.spans.last().map(|span| span.style).unwrap_or_default();
        let padding = " ".repeat(width - current_width);
        line.spans.push(Span::styled(padding, pad_style));
    }
}

fn move_index(current: usize, len: usize, delta: i32) -> usize {
    if len == 0 {
        return 0;
    }
    let max = len as i64 - 1;
    (current as i64 + delta as i64).clamp(0, max) as usize
}

fn muted() -> Style {
    Style::default().fg(COLOR_TEXT_SECONDARY)
}

pub struct Options {
    pub status_message: String,
    pub start_route: Route,
    pub catalog_service: Arc<dyn CatalogService>,
    pub comment_service: Arc<dyn CommentService>,
    pub auth_service: Arc<dyn AuthService>,
    pub session: Arc<Session>,
    pub player: PlayerConfig,
}

pub struct Model {
    status_message: String,
    route: Route,
    history: History,
    catalog: CatalogView,
    detail: DetailView,
    form: AuthForm,
    focused_pane: Pane,
    selected_video: usize,
    selected_category: usize,
    selected_tag: usize,
    selected_comment: usize,
    selected_related: usize,
    input: Option<Input>,
    notice: Option<String>,
    confirm_delete: Option<String>,
    catalog_service: Arc<dyn CatalogService>,
    comment_service: Arc<dyn CommentService>,
    auth_service: Arc<dyn AuthService>,
    session: Arc<Session>,
    player: PlayerConfig,
    spinner: Spinner,
    needs_redraw: bool,
    response_tx: Sender<AsyncResponse>,
    response_rx: Receiver<AsyncResponse>,
}

impl Model {
    pub fn new(opts: Options) -> Self {
        let (response_tx, response_rx) = unbounded();
        let mut model = Self {
            status_message: opts.status_message,
            route: opts.start_route,
            history: History::default(),
            catalog: CatalogView::default(),
            detail: DetailView::default(),
            form: AuthForm::new(AuthAction::Login),
            focused_pane: Pane::Videos,
            selected_video: 0,
            selected_category: 0,
            selected_tag: 0,
            selected_comment: 0,
            selected_related: 0,
            input: None,
            notice: None,
            confirm_delete: None,
            catalog_service: opts.catalog_service,
            comment_service: opts.comment_service,
            auth_service: opts.auth_service,
            session: opts.session,
            player: opts.player,
            spinner: Spinner::new(),
            needs_redraw: true,
            response_tx,
            response_rx,
        };
        let startup = std::mem::take(&mut model.status_message);
        model.mount();
        if !startup.is_empty() {
            model.status_message = startup;
        }
        model
    }

    pub fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode()?;
        stdout.execute(EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        let tick_rate = Duration::from_millis(120);

        loop {
            if self.poll_async() {
                self.mark_dirty();
            }

            if self.needs_redraw {
                terminal.draw(|frame| self.draw(frame))?;
                self.needs_redraw = false;
            }

            let timeout = tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(16));

            if event::poll(timeout)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        match self.handle_key(key.code) {
                            Ok(true) => break,
                            Ok(false) => {}
                            Err(err) => {
                                self.status_message = format!("Error: {}", err);
                            }
                        }
                        self.mark_dirty();
                    }
                } else {
                    self.mark_dirty();
                }
            }

            if last_tick.elapsed() >= tick_rate {
                last_tick = Instant::now();
                if self.is_loading() {
                    if self.spinner.advance() {
                        self.mark_dirty();
                    }
                } else {
                    self.spinner.reset();
                }
            }
        }

        Ok(())
    }

    fn mark_dirty(&mut self) {
        self.needs_redraw = true;
    }

    fn is_loading(&self) -> bool {
        match &self.route {
            Route::Home(_) => self.catalog.is_loading(),
            Route::Video { .. } => {
                let thread = self.detail.thread();
                self.detail.is_loading() || thread.is_loading() || thread.is_posting()
            }
            Route::Login | Route::Signup => self.form.pending,
        }
    }

    // Navigation

    fn navigate(&mut self, route: Route) {
        if route == self.route {
            return;
        }
        self.history.push(self.route.clone());
        self.enter(route);
    }

    fn go_back(&mut self) {
        match self.history.back() {
            Some(previous) => self.enter(previous),
            None if self.route != Route::home() => self.enter(Route::home()),
            None => {}
        }
    }

    fn enter(&mut self, route: Route) {
        info!(path = %route.to_path(), "navigate");
        self.input = None;
        self.confirm_delete = None;
        let same_page = matches!(self.route, Route::Home(_)) && matches!(route, Route::Home(_));
        if same_page {
            // New query on the same page: the cached catalog is filtered again.
            if let Route::Home(filter) = &route {
                self.catalog.set_filter(filter.clone());
            }
            self.route = route;
            self.selected_video = 0;
            self.sync_filter_cursors();
            self.status_message = self.filter_status();
        } else {
            self.unmount();
            self.route = route;
            self.mount();
        }
    }

    fn unmount(&mut self) {
        match &self.route {
            Route::Home(_) => self.catalog.cancel(),
            Route::Video { .. } => self.detail.close(),
            Route::Login | Route::Signup => self.form.pending = false,
        }
    }

    fn mount(&mut self) {
        match self.route.clone() {
            Route::Home(filter) => {
                self.catalog = CatalogView::new(filter);
                self.catalog
                    .fetch(&self.catalog_service, &self.response_tx);
                self.focused_pane = Pane::Videos;
                self.selected_video = 0;
                self.sync_filter_cursors();
                self.status_message = "Loading videos…".to_string();
            }
            Route::Video { id } => {
                self.detail.open(
                    &id,
                    &self.catalog_service,
                    &self.comment_service,
                    &self.response_tx,
                );
                self.focused_pane = Pane::Info;
                self.selected_comment = 0;
                self.selected_related = 0;
                self.status_message = "Loading video…".to_string();
            }
            Route::Login => {
                self.form = AuthForm::new(AuthAction::Login);
                self.status_message = "Sign in to comment on videos".to_string();
            }
            Route::Signup => {
                self.form = AuthForm::new(AuthAction::Signup);
                self.status_message = "Create a ZuTube account".to_string();
            }
        }
    }

    fn sync_filter_cursors(&mut self) {
        let filter = self.catalog.filter();
        self.selected_category = filter
            .active_category()
            .and_then(|active| {
                CATEGORIES
                    .iter()
                    .position(|category| category.eq_ignore_ascii_case(active))
            })
            .unwrap_or(0);
        if let Some(active) = filter.active_tag() {
            if let Some(index) = SIDEBAR_TAGS
                .iter()
                .position(|tag| tag.eq_ignore_ascii_case(active))
            {
                self.selected_tag = index;
            }
        }
    }

    fn filter_status(&self) -> String {
        let count = self.catalog.visible().len();
        let noun = if count == 1 { "video" } else { "videos" };
        match self.filter_summary() {
            Some(summary) => format!("{count} {noun} matching {summary}"),
            None => format!("{count} {noun}"),
        }
    }

    fn filter_summary(&self) -> Option<String> {
        let filter = self.catalog.filter();
        let mut parts = Vec::new();
        if let Some(search) = filter.active_search() {
            parts.push(format!("\"{search}\""));
        }
        if let Some(category) = filter.active_category() {
            parts.push(format!("category {category}"));
        }
        if let Some(tag) = filter.active_tag() {
            parts.push(format!("tag {tag}"));
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }

    // Keys

    fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        if self.notice.is_some() {
            if matches!(code, KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ')) {
                self.notice = None;
            }
            return Ok(false);
        }

        if let Some(comment_id) = self.confirm_delete.clone() {
            match code {
                KeyCode::Char('y') | KeyCode::Enter => {
                    self.confirm_delete = None;
                    self.delete_comment(&comment_id);
                }
                KeyCode::Char('n') | KeyCode::Esc => {
                    self.confirm_delete = None;
                    self.status_message = "Delete cancelled".to_string();
                }
                _ => {}
            }
            return Ok(false);
        }

        if self.input.is_some() {
            self.handle_input_key(code);
            return Ok(false);
        }

        if matches!(self.route, Route::Login | Route::Signup) {
            self.handle_form_key(code);
            return Ok(false);
        }

        match code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('b') => self.go_back(),
            KeyCode::Char('/') => {
                let current = self
                    .route
                    .filter()
                    .and_then(|filter| filter.active_search())
                    .unwrap_or_default()
                    .to_string();
                self.input = Some(Input::Search(current));
            }
            KeyCode::Tab => self.shift_focus(1),
            KeyCode::BackTab => self.shift_focus(-1),
            KeyCode::Char('H') => self.navigate(Route::home()),
            KeyCode::Char('L') => {
                if self.session.is_authenticated() {
                    self.status_message = "Already signed in".to_string();
                } else {
                    self.navigate(Route::Login);
                }
            }
            KeyCode::Char('S') => {
                if !self.session.is_authenticated() {
                    self.navigate(Route::Signup);
                }
            }
            KeyCode::Char('O') => self.logout()?,
            _ => match self.route {
                Route::Home(_) => self.handle_home_key(code),
                Route::Video { .. } => self.handle_video_key(code)?,
                Route::Login | Route::Signup => {}
            },
        }
        Ok(false)
    }

    fn shift_focus(&mut self, delta: i32) {
        let cycle = Pane::cycle(&self.route);
        if cycle.is_empty() {
            return;
        }
        let current = cycle
            .iter()
            .position(|pane| *pane == self.focused_pane)
            .unwrap_or(0);
        let len = cycle.len() as i32;
        let next = (current as i32 + delta).rem_euclid(len) as usize;
        self.focused_pane = cycle[next];
    }

    fn handle_home_key(&mut self, code: KeyCode) {
        let delta = match code {
            KeyCode::Char('j') | KeyCode::Down | KeyCode::Char('l') | KeyCode::Right => Some(1),
            KeyCode::Char('k') | KeyCode::Up | KeyCode::Char('h') | KeyCode::Left => Some(-1),
            _ => None,
        };
        if let Some(delta) = delta {
            match self.focused_pane {
                Pane::Categories => {
                    self.selected_category =
                        move_index(self.selected_category, CATEGORIES.len(), delta)
                }
                Pane::Tags => {
                    self.selected_tag = move_index(self.selected_tag, SIDEBAR_TAGS.len(), delta)
                }
                _ => {
                    self.selected_video =
                        move_index(self.selected_video, self.catalog.visible().len(), delta)
                }
            }
            return;
        }

        match code {
            KeyCode::Char('g') => self.selected_video = 0,
            KeyCode::Char('G') => {
                self.selected_video = self.catalog.visible().len().saturating_sub(1)
            }
            KeyCode::Enter => match self.focused_pane {
                Pane::Categories => {
                    self.navigate(routes::category_link(CATEGORIES[self.selected_category]))
                }
                Pane::Tags => self.navigate(routes::tag_link(SIDEBAR_TAGS[self.selected_tag])),
                _ => {
                    if let Some(video) = self.catalog.visible().get(self.selected_video) {
                        let route = Route::video(video.id.clone());
                        self.navigate(route);
                    }
                }
            },
            KeyCode::Char('c') => self.navigate(Route::home()),
            KeyCode::Char('r') => {
                if self
                    .catalog
                    .retry(&self.catalog_service, &self.response_tx)
                {
                    self.status_message = "Loading videos…".to_string();
                }
            }
            _ => {}
        }
    }

    fn handle_video_key(&mut self, code: KeyCode) -> Result<()> {
        let delta = match code {
            KeyCode::Char('j') | KeyCode::Down => Some(1),
            KeyCode::Char('k') | KeyCode::Up => Some(-1),
            _ => None,
        };
        if let Some(delta) = delta {
            match self.focused_pane {
                Pane::Comments => {
                    let len = self.detail.thread().entries().len();
                    self.selected_comment = move_index(self.selected_comment, len, delta);
                }
                Pane::Related => {
                    let len = self.detail.related().len();
                    self.selected_related = move_index(self.selected_related, len, delta);
                }
                _ => {}
            }
            return Ok(());
        }

        match code {
            KeyCode::Enter if self.focused_pane == Pane::Related => {
                if let Some(video) = self.detail.related().get(self.selected_related) {
                    let route = Route::video(video.id.clone());
                    self.navigate(route);
                }
            }
            KeyCode::Char('l') => self.detail.toggle_like(),
            KeyCode::Char('d') => self.detail.toggle_dislike(),
            KeyCode::Char('s') => {
                self.detail.toggle_subscribe();
                self.status_message = if self.detail.is_subscribed() {
                    "Subscribed".to_string()
                } else {
                    "Unsubscribed".to_string()
                };
            }
            KeyCode::Char('p') => self.play_current()?,
            KeyCode::Char('r') => {
                if self.detail.error().is_some() {
                    self.detail
                        .retry(&self.catalog_service, &self.comment_service, &self.response_tx);
                    self.status_message = "Loading video…".to_string();
                } else if self
                    .detail
                    .thread_mut()
                    .fetch(&self.comment_service, &self.response_tx)
                {
                    self.status_message = "Refreshing comments…".to_string();
                }
            }
            KeyCode::Char('c') => {
                if !self.session.is_authenticated() {
                    self.status_message = "Sign in to comment (press L)".to_string();
                } else if self.detail.video().is_some() {
                    self.focused_pane = Pane::Comments;
                    self.input = Some(Input::Comment);
                }
            }
            KeyCode::Char('e') if self.focused_pane == Pane::Comments => {
                if let Some(Entry::Confirmed(comment)) = self.selected_entry() {
                    if self.session.owns(&comment.user_id) {
                        self.input = Some(Input::Edit {
                            comment_id: comment.id.clone(),
                            text: comment.text.clone(),
                        });
                    }
                }
            }
            KeyCode::Char('x') if self.focused_pane == Pane::Comments => {
                if let Some(entry) = self.selected_entry() {
                    if comments::can_modify(entry, &self.session) {
                        self.confirm_delete = Some(entry.comment().id.clone());
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn selected_entry(&self) -> Option<&Entry> {
        self.detail.thread().entries().get(self.selected_comment)
    }

    fn handle_input_key(&mut self, code: KeyCode) {
        let Some(input) = self.input.take() else {
            return;
        };
        match input {
            Input::Search(mut text) => match code {
                KeyCode::Esc => {}
                KeyCode::Enter => self.navigate(routes::search_submit(&text)),
                KeyCode::Backspace => {
                    text.pop();
                    self.input = Some(Input::Search(text));
                }
                KeyCode::Char(ch) => {
                    text.push(ch);
                    self.input = Some(Input::Search(text));
                }
                _ => self.input = Some(Input::Search(text)),
            },
            Input::Comment => match code {
                KeyCode::Esc => {}
                KeyCode::Enter => self.submit_comment(),
                KeyCode::Backspace => {
                    self.detail.thread_mut().input_mut().pop();
                    self.input = Some(Input::Comment);
                }
                KeyCode::Char(ch) => {
                    self.detail.thread_mut().input_mut().push(ch);
                    self.input = Some(Input::Comment);
                }
                _ => self.input = Some(Input::Comment),
            },
            Input::Edit {
                comment_id,
                mut text,
            } => match code {
                KeyCode::Esc => {}
                KeyCode::Enter => {
                    match self.detail.thread_mut().edit(
                        &comment_id,
                        &text,
                        &self.comment_service,
                        &self.response_tx,
                    ) {
                        Ok(()) => self.status_message = "Saving comment…".to_string(),
                        Err(err) => {
                            self.status_message = err.to_string();
                            self.input = Some(Input::Edit { comment_id, text });
                        }
                    }
                }
                KeyCode::Backspace => {
                    text.pop();
                    self.input = Some(Input::Edit { comment_id, text });
                }
                KeyCode::Char(ch) => {
                    text.push(ch);
                    self.input = Some(Input::Edit { comment_id, text });
                }
                _ => self.input = Some(Input::Edit { comment_id, text }),
            },
        }
    }

    fn submit_comment(&mut self) {
        let result = self.detail.thread_mut().submit(
            &self.session,
            &self.comment_service,
            &self.response_tx,
        );
        match result {
            Ok(_) => {
                self.selected_comment = 0;
                self.status_message = "Posting comment…".to_string();
            }
            Err(err) => {
                self.status_message = err.to_string();
                self.input = Some(Input::Comment);
            }
        }
    }

    fn delete_comment(&mut self, comment_id: &str) {
        match self
            .detail
            .thread_mut()
            .delete(comment_id, &self.comment_service, &self.response_tx)
        {
            Ok(()) => self.status_message = "Deleting comment…".to_string(),
            Err(err) => self.status_message = err.to_string(),
        }
    }

    fn play_current(&mut self) -> Result<()> {
        let Some(video) = self.detail.video() else {
            return Ok(());
        };
        let url = video.video_url.clone();
        let title = video.title.clone();
        player::play(&self.player, &url)?;
        self.status_message = format!("Playing {title}");
        Ok(())
    }

    fn logout(&mut self) -> Result<()> {
        if !self.session.is_authenticated() {
            return Ok(());
        }
        self.session.logout()?;
        self.history.clear();
        self.enter(Route::home());
        self.status_message = "Signed out".to_string();
        Ok(())
    }

    fn handle_form_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Esc => self.go_back(),
            KeyCode::Tab | KeyCode::Down => self.form.next(),
            KeyCode::BackTab | KeyCode::Up => self.form.previous(),
            KeyCode::Backspace => self.form.backspace(),
            KeyCode::Enter => match self.form.active_field() {
                FormField::Submit => self.submit_auth_form(),
                FormField::Switch => {
                    let route = match self.form.action {
                        AuthAction::Login => Route::Signup,
                        AuthAction::Signup => Route::Login,
                    };
                    self.navigate(route);
                }
                _ => self.form.next(),
            },
            KeyCode::Char(ch) => self.form.insert_char(ch),
            _ => {}
        }
    }

    fn submit_auth_form(&mut self) {
        if self.form.pending {
            return;
        }
        let action = self.form.action;
        let auth = self.auth_service.clone();
        let validation = match action {
            AuthAction::Login => {
                let request = LoginRequest {
                    email_or_username: self.form.username.clone(),
                    password: self.form.password.clone(),
                };
                request.validate().map(|()| {
                    flight::spawn_detached(
                        &self.response_tx,
                        move || auth.login(&request),
                        move |result| AsyncResponse::Auth { action, result },
                    );
                })
            }
            AuthAction::Signup => {
                let request = SignupRequest {
                    username: self.form.username.clone(),
                    email: self.form.email.clone(),
                    password: self.form.password.clone(),
                    confirm_password: self.form.confirm.clone(),
                };
                request.validate().map(|()| {
                    flight::spawn_detached(
                        &self.response_tx,
                        move || auth.signup(&request),
                        move |result| AsyncResponse::Auth { action, result },
                    );
                })
            }
        };
        match validation {
            Ok(()) => {
                self.form.pending = true;
                self.form.error = None;
                self.status_message = match action {
                    AuthAction::Login => "Signing in…".to_string(),
                    AuthAction::Signup => "Creating account…".to_string(),
                };
            }
            Err(err) => self.form.error = Some(err.to_string()),
        }
    }

    // Async

    fn poll_async(&mut self) -> bool {
        let mut changed = false;
        while let Ok(message) = self.response_rx.try_recv() {
            self.handle_async_response(message);
            changed = true;
        }
        changed
    }

    fn handle_async_response(&mut self, message: AsyncResponse) {
        match message {
            AsyncResponse::Catalog { request_id, result } => {
                if self.catalog.apply(request_id, result) {
                    self.status_message = match self.catalog.error() {
                        Some(_) => format!("{FETCH_ERROR}. Press r to retry."),
                        None => self.filter_status(),
                    };
                    self.selected_video = self
                        .selected_video
                        .min(self.catalog.visible().len().saturating_sub(1));
                }
            }
            AsyncResponse::Video {
                request_id,
                video_id,
                result,
            } => {
                if self.detail.apply_video(request_id, &video_id, result) {
                    self.status_message = match (self.detail.video(), self.detail.error()) {
                        (_, Some(error)) => error.to_string(),
                        (Some(video), None) => video.title.clone(),
                        (None, None) => String::new(),
                    };
                }
            }
            AsyncResponse::Related {
                request_id,
                video_id,
                result,
            } => {
                self.detail.apply_related(request_id, &video_id, result);
                self.selected_related = self
                    .selected_related
                    .min(self.detail.related().len().saturating_sub(1));
            }
            AsyncResponse::Comments {
                request_id,
                generation,
                result,
            } => {
                self.detail
                    .thread_mut()
                    .apply_fetched(request_id, generation, result);
                self.clamp_comment_selection();
            }
            AsyncResponse::CommentCreated {
                request_id,
                generation,
                temp_id,
                result,
            } => {
                let posted = result.is_ok();
                let outcome = self.detail.thread_mut().apply_created(
                    request_id,
                    generation,
                    temp_id,
                    result,
                    &self.comment_service,
                    &self.response_tx,
                );
                match outcome {
                    Some(message) => self.show_notice(message),
                    None if posted && generation == self.detail.thread().generation() => {
                        self.status_message = "Comment posted".to_string();
                    }
                    None => {}
                }
                self.clamp_comment_selection();
            }
            AsyncResponse::CommentEdited {
                generation,
                comment_id,
                text,
                result,
            } => {
                let saved = result.is_ok();
                match self
                    .detail
                    .thread_mut()
                    .apply_edited(generation, &comment_id, text, result)
                {
                    Some(message) => self.show_notice(message),
                    None if saved => self.status_message = "Comment updated".to_string(),
                    None => {}
                }
            }
            AsyncResponse::CommentDeleted {
                generation,
                comment_id,
                result,
            } => {
                let removed = result.is_ok();
                match self
                    .detail
                    .thread_mut()
                    .apply_deleted(generation, &comment_id, result)
                {
                    Some(message) => self.show_notice(message),
                    None if removed => self.status_message = "Comment deleted".to_string(),
                    None => {}
                }
                self.clamp_comment_selection();
            }
            AsyncResponse::Auth { action, result } => self.handle_auth_result(action, result),
        }
    }

    fn handle_auth_result(&mut self, action: AuthAction, result: Result<crate::models::AuthResponse>) {
        if !self.form.pending || self.form.action != action {
            return;
        }
        self.form.pending = false;
        let outcome = result.and_then(|response| self.session.login(response));
        match outcome {
            Ok(user) => {
                info!(username = %user.username, ?action, "authenticated");
                self.history.clear();
                self.enter(Route::home());
                self.status_message = format!("Signed in as {}", user.display_name());
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), ?action, "authentication failed");
                let message = api::error_message(&err);
                self.status_message = message.clone();
                self.form.error = Some(message);
            }
        }
    }

    fn show_notice(&mut self, message: String) {
        self.status_message = message.clone();
        self.notice = Some(message);
    }

    fn clamp_comment_selection(&mut self) {
        let len = self.detail.thread().entries().len();
        self.selected_comment = self.selected_comment.min(len.saturating_sub(1));
    }

    // Drawing

    fn draw(&mut self, frame: &mut Frame<'_>) {
        let full = frame.size();
        frame.render_widget(Block::default().style(Style::default().bg(COLOR_BG)), full);

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(full);

        frame.render_widget(Paragraph::new(self.status_line(layout[0].width)), layout[0]);

        match &self.route {
            Route::Home(_) => self.draw_home(frame, layout[1]),
            Route::Video { .. } => self.draw_video(frame, layout[1]),
            Route::Login | Route::Signup => self.draw_form(frame, layout[1]),
        }

        let footer = Paragraph::new(self.footer_text())
            .style(
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .bg(COLOR_PANEL_BG)
                    .add_modifier(Modifier::ITALIC),
            )
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        frame.render_widget(footer, layout[2]);

        if let Some(Input::Search(text)) = &self.input {
            self.draw_search(frame, layout[1], text);
        }
        if self.confirm_delete.is_some() {
            self.draw_modal(
                frame,
                layout[1],
                "Delete comment",
                "Are you sure you want to delete this comment?",
                "y delete · n cancel",
                COLOR_ACCENT,
            );
        }
        if let Some(message) = &self.notice {
            self.draw_modal(frame, layout[1], "Error", message, "Enter to dismiss", COLOR_ERROR);
        }
    }

    fn status_line(&self, width: u16) -> Line<'static> {
        let bar = Style::default().bg(COLOR_PANEL_FOCUSED_BG);
        let mut spans = vec![Span::styled(
            " ▶ ZuTube ",
            bar.fg(COLOR_BRAND).add_modifier(Modifier::BOLD),
        )];
        let status = if self.is_loading() {
            format!("{} {}", self.spinner.frame(), self.status_message)
        } else {
            self.status_message.clone()
        };
        spans.push(Span::styled(
            format!(" {} ", status.trim()),
            bar.fg(COLOR_TEXT_PRIMARY).add_modifier(Modifier::BOLD),
        ));
        let account = match self.session.current_user() {
            Some(user) => format!(" {} ", user.display_name()),
            None => " not signed in ".to_string(),
        };
        spans.push(Span::styled(account, bar.fg(COLOR_TEXT_SECONDARY)));
        spans.push(Span::styled(String::new(), bar));
        let mut lines = vec![Line::from(spans)];
        pad_lines_to_width(&mut lines, width);
        lines.pop().unwrap_or_default()
    }

    fn pane_block(&self, pane: Pane, title: String) -> Block<'static> {
        let focused = self.focused_pane == pane;
        let border_style = if focused {
            Style::default().fg(COLOR_BORDER_FOCUSED)
        } else {
            Style::default().fg(COLOR_BORDER_IDLE)
        };
        let title_style = if focused {
            Style::default()
                .fg(COLOR_ACCENT)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(COLOR_TEXT_SECONDARY)
        };
        Block::default()
            .title(Span::styled(title, title_style))
            .borders(Borders::ALL)
            .border_style(border_style)
            .style(Style::default().bg(COLOR_PANEL_BG))
            .padding(Padding::horizontal(1))
    }

    fn highlight() -> Style {
        Style::default()
            .fg(COLOR_TEXT_PRIMARY)
            .bg(COLOR_PANEL_SELECTED_BG)
            .add_modifier(Modifier::BOLD)
    }

    fn draw_home(&self, frame: &mut Frame<'_>, area: Rect) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0)])
            .split(area);
        self.draw_categories(frame, rows[0]);

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(72), Constraint::Percentage(28)])
            .split(rows[1]);
        self.draw_videos(frame, columns[0]);
        self.draw_tags(frame, columns[1]);
    }

    fn draw_categories(&self, frame: &mut Frame<'_>, area: Rect) {
        let block = self.pane_block(Pane::Categories, Pane::Categories.title().to_string());
        let focused = self.focused_pane == Pane::Categories;
        let active = self.catalog.filter().active_category();

        let mut spans = Vec::new();
        for (index, category) in CATEGORIES.iter().enumerate() {
            let is_active = match active {
                Some(active) => category.eq_ignore_ascii_case(active),
                None => index == 0,
            };
            let mut style = if is_active {
                Style::default()
                    .fg(COLOR_BG)
                    .bg(COLOR_TEXT_PRIMARY)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(COLOR_TEXT_PRIMARY).bg(COLOR_PANEL_FOCUSED_BG)
            };
            if focused && index == self.selected_category {
                style = style.add_modifier(Modifier::UNDERLINED | Modifier::BOLD);
            }
            spans.push(Span::styled(format!(" {category} "), style));
            spans.push(Span::raw(" "));
        }
        frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
    }

    fn draw_videos(&self, frame: &mut Frame<'_>, area: Rect) {
        let title = match self.filter_summary() {
            Some(summary) => format!("{} · {}", Pane::Videos.title(), summary),
            None => Pane::Videos.title().to_string(),
        };
        let block = self.pane_block(Pane::Videos, title);
        let inner = block.inner(area);

        if let Some(error) = self.catalog.error() {
            let text = Text::from(vec![
                Line::from(Span::styled(error.to_string(), Style::default().fg(COLOR_ERROR))),
                Line::default(),
                Line::from(Span::styled("Press r to try again", muted())),
            ]);
            frame.render_widget(
                Paragraph::new(text).block(block).alignment(Alignment::Center),
                area,
            );
            return;
        }

        if self.catalog.visible().is_empty() {
            let message = if !self.catalog.is_loaded() {
                format!("{} Loading videos…", self.spinner.frame())
            } else if self.catalog.filter().is_empty() {
                "No videos yet".to_string()
            } else {
                "No videos found. Try different search terms or browse categories.".to_string()
            };
            frame.render_widget(
                Paragraph::new(Span::styled(message, muted().add_modifier(Modifier::ITALIC)))
                    .block(block)
                    .wrap(Wrap { trim: true }),
                area,
            );
            return;
        }

        let width = inner.width.max(1) as usize;
        let items: Vec<ListItem> = self
            .catalog
            .visible()
            .iter()
            .map(|video| {
                let mut lines = wrap_plain(
                    &video.title,
                    width,
                    Style::default()
                        .fg(COLOR_TEXT_PRIMARY)
                        .add_modifier(Modifier::BOLD),
                );
                let mut meta = vec![Span::styled(video.channel_name.clone(), muted())];
                if video.is_verified {
                    meta.push(Span::styled(
                        format!(" {ICON_VERIFIED}"),
                        Style::default().fg(COLOR_SUCCESS),
                    ));
                }
                meta.push(Span::styled(
                    format!(" · {} views · {}", video.views, video.upload_time),
                    muted(),
                ));
                if let Some(duration) = video.duration.as_deref().filter(|d| !d.is_empty()) {
                    meta.push(Span::styled(format!(" · {duration}"), muted()));
                }
                lines.push(Line::from(meta));
                lines.push(Line::default());
                ListItem::new(lines)
            })
            .collect();

        let mut state = ListState::default();
        state.select(Some(
            self.selected_video
                .min(self.catalog.visible().len().saturating_sub(1)),
        ));
        let list = List::new(items)
            .block(block)
            .highlight_style(Self::highlight())
            .highlight_symbol("▶ ");
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_tags(&self, frame: &mut Frame<'_>, area: Rect) {
        let block = self.pane_block(Pane::Tags, Pane::Tags.title().to_string());
        let active = self.catalog.filter().active_tag();
        let items: Vec<ListItem> = SIDEBAR_TAGS
            .iter()
            .map(|tag| {
                let style = if active.is_some_and(|active| tag.eq_ignore_ascii_case(active)) {
                    Style::default().fg(COLOR_ACCENT).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(COLOR_TEXT_PRIMARY)
                };
                ListItem::new(Line::from(Span::styled(format!("# {tag}"), style)))
            })
            .collect();

        let mut state = ListState::default();
        if self.focused_pane == Pane::Tags {
            state.select(Some(self.selected_tag));
        }
        let list = List::new(items)
            .block(block)
            .highlight_style(Self::highlight())
            .highlight_symbol("▶ ");
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_video(&self, frame: &mut Frame<'_>, area: Rect) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
            .split(area);
        let left = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(INFO_PANE_HEIGHT), Constraint::Min(0)])
            .split(columns[0]);
        self.draw_info(frame, left[0]);
        self.draw_comments(frame, left[1]);
        self.draw_related(frame, columns[1]);
    }

    fn draw_info(&self, frame: &mut Frame<'_>, area: Rect) {
        let block = self.pane_block(Pane::Info, Pane::Info.title().to_string());
        let inner = block.inner(area);

        if let Some(error) = self.detail.error() {
            let text = Text::from(vec![
                Line::from(Span::styled(
                    error.to_string(),
                    Style::default().fg(COLOR_ERROR).add_modifier(Modifier::BOLD),
                )),
                Line::default(),
                Line::from(Span::styled("Esc to go back · r to retry", muted())),
            ]);
            frame.render_widget(
                Paragraph::new(text).block(block).alignment(Alignment::Center),
                area,
            );
            return;
        }

        let Some(video) = self.detail.video() else {
            frame.render_widget(
                Paragraph::new(Span::styled(
                    format!("{} Loading video…", self.spinner.frame()),
                    muted(),
                ))
                .block(block),
                area,
            );
            return;
        };

        let width = inner.width.max(1) as usize;
        let mut lines = wrap_plain(
            &video.title,
            width,
            Style::default()
                .fg(COLOR_TEXT_PRIMARY)
                .add_modifier(Modifier::BOLD),
        );
        lines.push(Line::from(Span::styled(
            format!("{} views • {}", video.views, video.upload_time),
            muted(),
        )));

        let mut channel = vec![Span::styled(
            video.channel_name.clone(),
            Style::default().fg(COLOR_TEXT_PRIMARY),
        )];
        if video.is_verified {
            channel.push(Span::styled(
                format!(" {ICON_VERIFIED}"),
                Style::default().fg(COLOR_SUCCESS),
            ));
        }
        if !video.subscriber.is_empty() {
            channel.push(Span::styled(
                format!(" · {} subscribers", video.subscriber),
                muted(),
            ));
        }
        channel.push(Span::raw("  "));
        channel.push(if self.detail.is_subscribed() {
            Span::styled(
                " Subscribed ",
                Style::default().fg(COLOR_TEXT_PRIMARY).bg(COLOR_PANEL_SELECTED_BG),
            )
        } else {
            Span::styled(
                " Subscribe ",
                Style::default()
                    .fg(COLOR_BG)
                    .bg(COLOR_BRAND)
                    .add_modifier(Modifier::BOLD),
            )
        });
        lines.push(Line::from(channel));

        let reaction = self.detail.reaction();
        let toggle_style = |on: bool| {
            if on {
                Style::default()
                    .fg(COLOR_BG)
                    .bg(COLOR_ACCENT)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(COLOR_TEXT_PRIMARY).bg(COLOR_PANEL_FOCUSED_BG)
            }
        };
        lines.push(Line::from(vec![
            Span::styled(
                format!(" {ICON_LIKE} {} ", video.likes),
                toggle_style(reaction == Reaction::Liked),
            ),
            Span::raw(" "),
            Span::styled(
                format!(" {ICON_DISLIKE} {} ", video.dislikes),
                toggle_style(reaction == Reaction::Disliked),
            ),
            Span::raw(" "),
            Span::styled(" p Play ", Style::default().fg(COLOR_BG).bg(COLOR_SUCCESS)),
        ]));
        lines.push(Line::default());
        lines.extend(wrap_plain(&video.description, width, muted()));

        frame.render_widget(Paragraph::new(Text::from(lines)).block(block), area);
    }

    fn draw_comments(&self, frame: &mut Frame<'_>, area: Rect) {
        let thread = self.detail.thread();
        let title = format!("{} {}", thread.entries().len(), Pane::Comments.title());
        let block = self.pane_block(Pane::Comments, title);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(2), Constraint::Min(0)])
            .split(inner);

        let composer = if !self.session.is_authenticated() {
            Line::from(Span::styled(
                "Sign in to comment (press L)",
                muted().add_modifier(Modifier::ITALIC),
            ))
        } else if thread.is_posting() {
            Line::from(Span::styled(
                format!("{} Posting…", self.spinner.frame()),
                muted(),
            ))
        } else if matches!(self.input, Some(Input::Comment)) {
            Line::from(vec![
                Span::styled("› ", Style::default().fg(COLOR_ACCENT)),
                Span::styled(thread.input().to_string(), Style::default().fg(COLOR_TEXT_PRIMARY)),
                Span::styled(CURSOR, Style::default().fg(COLOR_ACCENT)),
            ])
        } else if !thread.input().is_empty() {
            Line::from(Span::styled(
                format!("› {} (c to continue)", thread.input()),
                muted(),
            ))
        } else {
            Line::from(Span::styled(
                "Add a comment... (c)",
                muted().add_modifier(Modifier::ITALIC),
            ))
        };
        frame.render_widget(Paragraph::new(composer), rows[0]);

        if thread.entries().is_empty() {
            let message = if let Some(error) = thread.error() {
                Span::styled(error.to_string(), Style::default().fg(COLOR_ERROR))
            } else if !thread.is_loaded() {
                Span::styled(format!("{} Loading comments…", self.spinner.frame()), muted())
            } else {
                Span::styled(
                    "No comments yet. Be the first to comment!",
                    muted().add_modifier(Modifier::ITALIC),
                )
            };
            frame.render_widget(Paragraph::new(message).wrap(Wrap { trim: true }), rows[1]);
            return;
        }

        let width = rows[1].width.saturating_sub(2).max(1) as usize;
        let now = Utc::now();
        let editing = match &self.input {
            Some(Input::Edit { comment_id, text }) => Some((comment_id.as_str(), text.as_str())),
            _ => None,
        };
        let focused = self.focused_pane == Pane::Comments;
        let items: Vec<ListItem> = thread
            .entries()
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                let comment = entry.comment();
                let when = if entry.is_pending() {
                    "Posting…".to_string()
                } else {
                    comments::age_label(comment.created_at, now)
                };
                let mut header = vec![Span::styled(
                    comment.username.clone(),
                    Style::default()
                        .fg(COLOR_TEXT_PRIMARY)
                        .add_modifier(Modifier::BOLD),
                )];
                if !when.is_empty() {
                    header.push(Span::styled(format!(" · {when}"), muted()));
                }
                if focused && index == self.selected_comment && comments::can_modify(entry, &self.session) {
                    header.push(Span::styled(
                        "  e edit · x delete",
                        Style::default().fg(COLOR_ACCENT),
                    ));
                }
                let mut lines = vec![Line::from(header)];

                let body_style = if entry.is_pending() {
                    muted().add_modifier(Modifier::ITALIC)
                } else {
                    Style::default().fg(COLOR_TEXT_PRIMARY)
                };
                match editing {
                    Some((id, text)) if !entry.is_pending() && id == comment.id => {
                        lines.push(Line::from(vec![
                            Span::styled(text.to_string(), Style::default().fg(COLOR_ACCENT)),
                            Span::styled(CURSOR, Style::default().fg(COLOR_ACCENT)),
                        ]));
                    }
                    _ => lines.extend(wrap_plain(&comment.text, width, body_style)),
                }
                lines.push(Line::default());
                ListItem::new(lines)
            })
            .collect();

        let mut state = ListState::default();
        if focused {
            state.select(Some(self.selected_comment));
        }
        let list = List::new(items)
            .highlight_style(Style::default().bg(COLOR_PANEL_SELECTED_BG))
            .highlight_symbol("▌ ");
        frame.render_stateful_widget(list, rows[1], &mut state);
    }

    fn draw_related(&self, frame: &mut Frame<'_>, area: Rect) {
        let block = self.pane_block(Pane::Related, Pane::Related.title().to_string());
        let related = self.detail.related();
        if related.is_empty() {
            frame.render_widget(
                Paragraph::new(Span::styled("Nothing queued", muted())).block(block),
                area,
            );
            return;
        }
        let width = block.inner(area).width.max(1) as usize;
        let items: Vec<ListItem> = related
            .iter()
            .map(|video| {
                let mut lines = wrap_plain(
                    &video.title,
                    width,
                    Style::default().fg(COLOR_TEXT_PRIMARY),
                );
                lines.push(Line::from(Span::styled(
                    format!("{} · {} views", video.channel_name, video.views),
                    muted(),
                )));
                lines.push(Line::default());
                ListItem::new(lines)
            })
            .collect();

        let mut state = ListState::default();
        if self.focused_pane == Pane::Related {
            state.select(Some(self.selected_related));
        }
        let list = List::new(items)
            .block(block)
            .highlight_style(Self::highlight())
            .highlight_symbol("▶ ");
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_form(&self, frame: &mut Frame<'_>, area: Rect) {
        let popup = centered_rect(50, 70, area);
        frame.render_widget(Clear, popup);

        let heading = match self.form.action {
            AuthAction::Login => "Sign in to ZuTube",
            AuthAction::Signup => "Create your account",
        };
        let mut lines = vec![
            Line::from(Span::styled(
                heading,
                Style::default()
                    .fg(COLOR_ACCENT)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::default(),
        ];

        let active = self.form.active_field();
        for field in self.form.fields() {
            let selected = *field == active;
            let marker = Span::styled(
                if selected { "› " } else { "  " },
                Style::default().fg(COLOR_ACCENT),
            );
            match field {
                FormField::Submit => {
                    let label = if self.form.pending {
                        format!("{} Please wait…", self.spinner.frame())
                    } else {
                        format!("[ {} ]", self.form.label(*field))
                    };
                    let mut style = Style::default().fg(COLOR_BG).bg(COLOR_BRAND);
                    if selected {
                        style = style.add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
                    }
                    lines.push(Line::from(vec![marker, Span::styled(label, style)]));
                }
                FormField::Switch => {
                    let mut style = Style::default().fg(COLOR_ACCENT);
                    if selected {
                        style = style.add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
                    }
                    lines.push(Line::default());
                    lines.push(Line::from(vec![
                        marker,
                        Span::styled(self.form.label(*field), style),
                    ]));
                }
                _ => {
                    lines.push(Line::from(vec![
                        marker,
                        Span::styled(self.form.label(*field), muted()),
                    ]));
                    let mut value = vec![
                        Span::raw("  "),
                        Span::styled(
                            self.form.display_value(*field),
                            Style::default().fg(COLOR_TEXT_PRIMARY),
                        ),
                    ];
                    if selected {
                        value.push(Span::styled(CURSOR, Style::default().fg(COLOR_ACCENT)));
                    }
                    lines.push(Line::from(value));
                    lines.push(Line::default());
                }
            }
        }

        if let Some(error) = &self.form.error {
            lines.push(Line::default());
            lines.push(Line::from(Span::styled(
                error.clone(),
                Style::default().fg(COLOR_ERROR).add_modifier(Modifier::BOLD),
            )));
        }

        let form = Paragraph::new(Text::from(lines))
            .block(
                Block::default()
                    .title(Span::styled(
                        match self.form.action {
                            AuthAction::Login => "Sign In",
                            AuthAction::Signup => "Sign Up",
                        },
                        Style::default()
                            .fg(COLOR_ACCENT)
                            .add_modifier(Modifier::BOLD),
                    ))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(COLOR_ACCENT))
                    .style(Style::default().bg(COLOR_PANEL_BG))
                    .padding(Padding::uniform(1)),
            )
            .wrap(Wrap { trim: false });
        frame.render_widget(form, popup);
    }

    fn draw_search(&self, frame: &mut Frame<'_>, area: Rect, text: &str) {
        let popup = centered_rect(60, 20, area);
        frame.render_widget(Clear, popup);
        let content = if text.is_empty() {
            Line::from(vec![
                Span::styled(CURSOR, Style::default().fg(COLOR_ACCENT)),
                Span::styled("Search videos...", muted().add_modifier(Modifier::ITALIC)),
            ])
        } else {
            Line::from(vec![
                Span::styled(text.to_string(), Style::default().fg(COLOR_TEXT_PRIMARY)),
                Span::styled(CURSOR, Style::default().fg(COLOR_ACCENT)),
            ])
        };
        let search = Paragraph::new(content).block(
            Block::default()
                .title(Span::styled(
                    "Search",
                    Style::default()
                        .fg(COLOR_ACCENT)
                        .add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(COLOR_ACCENT))
                .style(Style::default().bg(COLOR_PANEL_BG))
                .padding(Padding::uniform(1)),
        );
        frame.render_widget(search, popup);
    }

    fn draw_modal(
        &self,
        frame: &mut Frame<'_>,
        area: Rect,
        title: &str,
        message: &str,
        hint: &str,
        accent: Color,
    ) {
        let popup = centered_rect(50, 30, area);
        frame.render_widget(Clear, popup);
        let text = Text::from(vec![
            Line::from(Span::styled(
                message.to_string(),
                Style::default().fg(COLOR_TEXT_PRIMARY),
            )),
            Line::default(),
            Line::from(Span::styled(hint.to_string(), muted().add_modifier(Modifier::ITALIC))),
        ]);
        let modal = Paragraph::new(text)
            .block(
                Block::default()
                    .title(Span::styled(
                        title.to_string(),
                        Style::default().fg(accent).add_modifier(Modifier::BOLD),
                    ))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(accent))
                    .style(Style::default().bg(COLOR_PANEL_BG))
                    .padding(Padding::uniform(1)),
            )
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        frame.render_widget(modal, popup);
    }

    fn footer_text(&self) -> String {
        if self.notice.is_some() {
            return "Enter dismiss".to_string();
        }
        if self.confirm_delete.is_some() {
            return "y delete · n cancel".to_string();
        }
        match &self.input {
            Some(Input::Search(_)) => return "Type to search · Enter submit · Esc cancel".to_string(),
            Some(Input::Comment) => return "Enter post · Esc stop typing".to_string(),
            Some(Input::Edit { .. }) => return "Enter save · Esc cancel edit".to_string(),
            None => {}
        }

        let mut parts: Vec<String> = Vec::new();
        match &self.route {
            Route::Login | Route::Signup => {
                parts.push("Tab/↑/↓ change field".to_string());
                parts.push("Enter submit".to_string());
                parts.push("Esc back".to_string());
                return parts.join(" · ");
            }
            Route::Home(_) => match self.focused_pane {
                Pane::Categories => parts.push("Categories: h/l move, Enter filter".to_string()),
                Pane::Tags => parts.push("Tags: j/k move, Enter filter".to_string()),
                _ => {
                    parts.push("Videos: j/k move, Enter watch".to_string());
                    if !self.catalog.filter().is_empty() {
                        parts.push("c clear filters".to_string());
                    }
                    if self.catalog.error().is_some() {
                        parts.push("r retry".to_string());
                    }
                }
            },
            Route::Video { .. } => {
                match self.focused_pane {
                    Pane::Comments => {
                        parts.push("Comments: j/k move, c comment".to_string());
                        if self
                            .selected_entry()
                            .is_some_and(|entry| comments::can_modify(entry, &self.session))
                        {
                            parts.push("e edit, x delete".to_string());
                        }
                    }
                    Pane::Related => parts.push("Up next: j/k move, Enter watch".to_string()),
                    _ => parts.push("p play · l like · d dislike · s subscribe".to_string()),
                }
                parts.push("Esc back".to_string());
            }
        }

        parts.push("Tab switch pane".to_string());
        parts.push("/ search".to_string());
        if self.session.is_authenticated() {
            parts.push("O sign out".to_string());
        } else {
            parts.push("L sign in".to_string());
        }
        parts.push("q quit".to_string());
        parts.join(" · ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::auth::{MockAuthService, DEMO_PASSWORD, DEMO_USERNAME};
    use crate::data::{MockCatalogService, MockCommentService};
    use crate::filter::FilterState;
    use crate::storage::Store;

    fn total_width(line: &Line<'_>) -> usize {
        line.spans
            .iter()
            .map(|span| UnicodeWidthStr::width(span.content.as_ref()))
            .sum()
    }

    fn model(start: Route) -> Model {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let session = Arc::new(Session::init(store).unwrap());
        Model::new(Options {
            status_message: String::new(),
            start_route: start,
            catalog_service: Arc::new(MockCatalogService::default()),
            comment_service: Arc::new(MockCommentService::with_session(session.clone())),
            auth_service: Arc::new(MockAuthService),
            session,
            player: PlayerConfig::default(),
        })
    }

    fn settle(model: &mut Model, mut done: impl FnMut(&Model) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done(model) {
            assert!(Instant::now() < deadline, "timed out waiting for responses");
            if let Ok(message) = model.response_rx.recv_timeout(Duration::from_millis(50)) {
                model.handle_async_response(message);
            }
        }
    }

    fn type_text(model: &mut Model, text: &str) {
        for ch in text.chars() {
            model.handle_key(KeyCode::Char(ch)).unwrap();
        }
    }

    #[test]
    fn pad_lines_extends_to_width() {
        let mut lines = vec![Line::from(vec![Span::raw("abc")])];
        pad_lines_to_width(&mut lines, 6);
        assert_eq!(lines[0].spans.len(), 2);
        assert_eq!(lines[0].spans[1].content.as_ref(), "   ");
        assert_eq!(total_width(&lines[0]), 6);
    }

    #[test]
    fn pad_lines_does_not_shorten() {
        let mut lines = vec![Line::from(vec![Span::raw("abcdef")])];
        pad_lines_to_width(&mut lines, 4);
        assert_eq!(lines[0].spans.len(), 1);
        assert_eq!(total_width(&lines[0]), 6);
    }

    #[test]
    fn wrap_plain_keeps_paragraph_breaks() {
        let lines = wrap_plain("one two three\n\nfour", 7, Style::default());
        let text: Vec<String> = lines
            .iter()
            .map(|line| line.spans[0].content.to_string())
            .collect();
        assert_eq!(text, vec!["one two", "three", "", "four"]);
    }

    #[test]
    fn search_filters_without_refetching() {
        let mut model = model(Route::home());
        settle(&mut model, |m| m.catalog.is_loaded());
        assert_eq!(model.catalog.visible().len(), 6);

        model.handle_key(KeyCode::Char('/')).unwrap();
        type_text(&mut model, "python");
        model.handle_key(KeyCode::Enter).unwrap();

        assert_eq!(model.route.to_path(), "/?search=python");
        assert!(!model.catalog.is_loading());
        assert_eq!(model.catalog.visible().len(), 1);

        model.handle_key(KeyCode::Esc).unwrap();
        assert_eq!(model.route, Route::home());
        assert_eq!(model.catalog.visible().len(), 6);
    }

    #[test]
    fn category_and_tag_links_replace_the_query() {
        let mut model = model(Route::Home(FilterState {
            search: Some("rust".into()),
            ..Default::default()
        }));
        settle(&mut model, |m| m.catalog.is_loaded());

        model.focused_pane = Pane::Categories;
        model.selected_category = CATEGORIES.iter().position(|c| *c == "Music").unwrap();
        model.handle_key(KeyCode::Enter).unwrap();
        assert_eq!(model.route.to_path(), "/?category=Music");

        model.focused_pane = Pane::Tags;
        model.selected_tag = SIDEBAR_TAGS.iter().position(|t| *t == "AI").unwrap();
        model.handle_key(KeyCode::Enter).unwrap();
        assert_eq!(model.route.to_path(), "/?tag=AI");
        assert_eq!(model.catalog.visible().len(), 2);
    }

    #[test]
    fn opening_a_video_and_going_back_remounts_home() {
        let mut model = model(Route::home());
        settle(&mut model, |m| m.catalog.is_loaded());
        model.handle_key(KeyCode::Enter).unwrap();
        assert_eq!(model.route, Route::video("1"));
        settle(&mut model, |m| {
            m.detail.video().is_some() && m.detail.thread().is_loaded()
        });
        assert_eq!(model.detail.thread().entries().len(), 2);

        model.handle_key(KeyCode::Esc).unwrap();
        assert_eq!(model.route, Route::home());
        assert!(model.detail.video_id().is_none());
        settle(&mut model, |m| m.catalog.is_loaded());
    }

    #[test]
    fn login_flow_signs_in_and_returns_home() {
        let mut model = model(Route::Login);
        model.handle_key(KeyCode::Tab).unwrap();
        model.handle_key(KeyCode::Tab).unwrap();
        model.handle_key(KeyCode::Enter).unwrap();
        assert_eq!(
            model.form.error.as_deref(),
            Some("Please fill in all fields")
        );

        model.form.active = 0;
        type_text(&mut model, DEMO_USERNAME);
        model.handle_key(KeyCode::Tab).unwrap();
        type_text(&mut model, DEMO_PASSWORD);
        model.handle_key(KeyCode::Tab).unwrap();
        model.handle_key(KeyCode::Enter).unwrap();
        assert!(model.form.pending);

        settle(&mut model, |m| m.session.is_authenticated());
        assert_eq!(model.route, Route::home());

        model.handle_key(KeyCode::Char('O')).unwrap();
        assert!(!model.session.is_authenticated());
    }

    #[test]
    fn anonymous_users_cannot_open_the_composer() {
        let mut model = model(Route::video("1"));
        settle(&mut model, |m| m.detail.video().is_some());
        model.handle_key(KeyCode::Char('c')).unwrap();
        assert!(model.input.is_none());
        assert!(model.status_message.contains("Sign in"));
    }

    #[test]
    fn failed_delete_raises_a_blocking_notice() {
        let mut model = model(Route::video("1"));
        model
            .session
            .login(crate::models::AuthResponse {
                token: "t".into(),
                user: crate::models::User {
                    id: "user-demo".into(),
                    username: "demo".into(),
                    avatar: None,
                    email: None,
                },
            })
            .unwrap();
        settle(&mut model, |m| m.detail.thread().is_loaded());

        model.show_notice("Failed to delete comment: Not authorized".into());
        model.handle_key(KeyCode::Char('q')).unwrap();
        assert!(model.notice.is_some(), "other keys are swallowed by the notice");
        model.handle_key(KeyCode::Enter).unwrap();
        assert!(model.notice.is_none());

        model.focused_pane = Pane::Comments;
        model.selected_comment = 1;
        model.handle_key(KeyCode::Char('x')).unwrap();
        assert_eq!(model.confirm_delete.as_deref(), Some("seed-2"));
        model.handle_key(KeyCode::Char('y')).unwrap();
        settle(&mut model, |m| m.detail.thread().entries().len() == 1);
        assert_eq!(model.detail.thread().entries()[0].comment().id, "seed-1");
    }
}
