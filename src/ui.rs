use std::cell::Cell;
use std::io::{self, Stdout};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, Sender};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, MouseEvent,
    MouseEventKind,
};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, Padding, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use textwrap::{wrap, Options as WrapOptions};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::config;
use crate::data::{TitleDetailService, TitleSource};
use crate::detail::{DetailOutcome, DetailView, NOT_FOUND_MESSAGE};
use crate::feed::{
    FeedController, FeedView, LoadReport, LoadTicket, Notice, PendingLoad, PendingWork,
};
use crate::imdb::{ApiError, PageEnvelope, Title};
use crate::poster::PosterFetcher;
use crate::preloader::{Preloader, Spinner};
use crate::restore::{RestorePlan, RestoreStep, ScrollRestorer, Viewport};
use crate::session;
use crate::storage;
use crate::theme::{self, AccentTheme, Palette, ThemeMode};
use crate::trigger::Trigger;

const TICK_RATE: Duration = Duration::from_millis(120);
const CARD_MIN_WIDTH: u16 = 34;
const MIN_CARD_HEIGHT: u16 = 3;
const SENTINEL_LINES: u32 = 1;
const MOUSE_SCROLL_LINES: i64 = 3;
const ACCENT_PALETTE_SIZE: usize = 5;
const SEARCH_PLACEHOLDER: &str = "Press / to search movies and TV series";

/// One grid card, formatted once when the title is appended.
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub id: String,
    pub title: String,
    pub subtitle: String,
    pub rating: String,
    pub genres: String,
    pub imdb_url: String,
}

impl Card {
    pub fn from_title(title: &Title) -> Self {
        Self {
            id: title.id.clone(),
            title: title.display_name().to_string(),
            subtitle: format!("{} · {}", title.year_label(), title.kind_label()),
            rating: title
                .aggregate_rating()
                .map(|rating| format!("★ {rating:.1}"))
                .unwrap_or_else(|| "★ N/A".into()),
            genres: if title.genres.is_empty() {
                "N/A".into()
            } else {
                title.genres.join(", ")
            },
            imdb_url: title.imdb_url(),
        }
    }

    fn field(&self, index: usize) -> &str {
        match index {
            0 => &self.title,
            1 => &self.subtitle,
            2 => &self.rating,
            3 => &self.genres,
            _ => "",
        }
    }
}

/// The scrollable card grid. Heights and offsets are in terminal lines.
#[derive(Debug)]
pub struct FeedSurface {
    cards: Vec<Card>,
    notice: Option<Notice>,
    loading: bool,
    card_height: u16,
    columns: u16,
    viewport_height: u16,
    scroll: u32,
    selected: usize,
}

impl FeedSurface {
    pub fn new(card_height: u16) -> Self {
        Self {
            cards: Vec::new(),
            notice: None,
            loading: false,
            card_height: card_height.max(MIN_CARD_HEIGHT),
            columns: 1,
            viewport_height: 0,
            scroll: 0,
            selected: 0,
        }
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn clear(&mut self) {
        self.cards.clear();
        self.notice = None;
        self.loading = false;
        self.scroll = 0;
        self.selected = 0;
    }

    pub fn set_layout(&mut self, width: u16, height: u16) {
        self.columns = (width / CARD_MIN_WIDTH).max(1);
        self.viewport_height = height;
        self.scroll = self.scroll.min(self.max_scroll());
    }

    pub fn columns(&self) -> u16 {
        self.columns
    }

    pub fn scroll(&self) -> u32 {
        self.scroll
    }

    pub fn viewport_bottom(&self) -> u32 {
        self.scroll + self.viewport_height as u32
    }

    /// The line just below the last card row.
    pub fn sentinel_line(&self) -> u32 {
        self.document_height()
    }

    fn rows(&self) -> u32 {
        (self.cards.len() as u32).div_ceil(self.columns.max(1) as u32)
    }

    fn content_height(&self) -> u32 {
        self.document_height() + SENTINEL_LINES
    }

    pub fn scroll_by(&mut self, delta: i64) {
        let next = (self.scroll as i64 + delta).clamp(0, self.max_scroll() as i64);
        self.scroll = next as u32;
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn selected_card(&self) -> Option<&Card> {
        self.cards.get(self.selected)
    }

    pub fn move_selection(&mut self, delta: i64) {
        if self.cards.is_empty() {
            return;
        }
        let last = self.cards.len() as i64 - 1;
        self.selected = (self.selected as i64 + delta).clamp(0, last) as usize;
        self.ensure_selected_visible();
    }

    /// Selects the first card whose top edge is in view.
    pub fn select_first_visible(&mut self) {
        if self.cards.is_empty() {
            self.selected = 0;
            return;
        }
        let row = self.scroll.div_ceil(self.card_height as u32) as usize;
        self.selected = (row * self.columns.max(1) as usize).min(self.cards.len() - 1);
    }

    fn ensure_selected_visible(&mut self) {
        if self.viewport_height == 0 {
            return;
        }
        let row = (self.selected / self.columns.max(1) as usize) as u32;
        let top = row * self.card_height as u32;
        let bottom = top + self.card_height as u32;
        if top < self.scroll {
            self.scroll = top;
        } else if bottom > self.viewport_bottom() {
            self.scroll = bottom.saturating_sub(self.viewport_height as u32);
        }
    }
}

impl FeedView for FeedSurface {
    fn render_title(&mut self, title: &Title) {
        self.cards.push(Card::from_title(title));
    }

    fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
        if loading {
            self.notice = None;
        }
    }

    fn show_notice(&mut self, notice: Notice) {
        self.notice = Some(notice);
    }
}

impl Viewport for FeedSurface {
    fn document_height(&self) -> u32 {
        self.rows() * self.card_height as u32
    }

    fn max_scroll(&self) -> u32 {
        self.content_height()
            .saturating_sub(self.viewport_height as u32)
    }

    // Layout is computed synchronously when cards are appended.
    fn wait_frame(&mut self) {}

    fn scroll_to(&mut self, offset: u32) {
        self.scroll = offset.min(self.max_scroll());
    }
}

pub struct Options {
    pub status_message: String,
    pub source: Arc<dyn TitleSource>,
    pub details: Arc<dyn TitleDetailService>,
    pub posters: Option<Arc<PosterFetcher>>,
    pub session: Arc<session::Store>,
    pub store: Arc<storage::Store>,
    pub feed: config::FeedConfig,
    pub theme: ThemeMode,
    pub dynamic_theme: bool,
    pub initial_query: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Grid,
    Search,
}

struct DetailScreen {
    id: String,
    imdb_url: String,
    request_id: u64,
    outcome: Option<DetailOutcome>,
    view: Option<DetailView>,
    accent: Option<AccentTheme>,
    scroll: u16,
    content_lines: Cell<u16>,
}

enum Screen {
    Feed,
    Detail(Box<DetailScreen>),
}

struct PendingSearch {
    request_id: u64,
    cancel_flag: Arc<AtomicBool>,
}

struct RestoreState {
    restorer: ScrollRestorer,
    awaiting_frame: bool,
}

enum AsyncResponse {
    Page {
        ticket: LoadTicket,
        result: Result<PageEnvelope, ApiError>,
    },
    Search {
        request_id: u64,
        result: Result<PageEnvelope, ApiError>,
    },
    Detail {
        request_id: u64,
        outcome: DetailOutcome,
    },
    Accent {
        request_id: u64,
        result: Result<Option<AccentTheme>>,
    },
}

pub struct Model {
    status_message: String,
    source: Arc<dyn TitleSource>,
    details: Arc<dyn TitleDetailService>,
    posters: Option<Arc<PosterFetcher>>,
    session: Arc<session::Store>,
    store: Arc<storage::Store>,
    feed: FeedController,
    surface: FeedSurface,
    preloader: Preloader,
    spinner: Spinner,
    screen: Screen,
    focus: Focus,
    search_input: String,
    theme: ThemeMode,
    dynamic_theme: bool,
    restore: Option<RestoreState>,
    pending_search: Option<PendingSearch>,
    sentinel_in_range: bool,
    response_tx: Sender<AsyncResponse>,
    response_rx: Receiver<AsyncResponse>,
    next_request_id: u64,
    needs_redraw: bool,
}

impl Model {
    pub fn new(opts: Options) -> Self {
        let (response_tx, response_rx) = unbounded();
        let mut model = Self {
            status_message: opts.status_message,
            source: opts.source,
            details: opts.details,
            posters: opts.posters,
            session: opts.session,
            store: opts.store,
            feed: FeedController::new(Trigger::new(opts.feed.prefetch_margin)),
            surface: FeedSurface::new(opts.feed.card_height),
            preloader: Preloader::new(opts.feed.preloader_delay),
            spinner: Spinner::new(),
            screen: Screen::Feed,
            focus: Focus::Grid,
            search_input: String::new(),
            theme: opts.theme,
            dynamic_theme: opts.dynamic_theme,
            restore: None,
            pending_search: None,
            sentinel_in_range: false,
            response_tx,
            response_rx,
            next_request_id: 1,
            needs_redraw: true,
        };

        if let Some(query) = opts.initial_query.as_deref() {
            model.session.set_search_query(query);
        }
        model.search_input = model.session.search_query().unwrap_or_default();
        model.start_feed();
        model
    }

    pub fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode()?;
        stdout.execute(EnterAlternateScreen)?;
        stdout.execute(EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        terminal.backend_mut().execute(DisableMouseCapture)?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();

        loop {
            if self.poll_async() {
                self.mark_dirty();
            }

            if self.needs_redraw {
                terminal.draw(|frame| self.draw(frame))?;
                self.needs_redraw = false;
                self.after_frame();
            }

            let timeout = TICK_RATE
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(16));

            if event::poll(timeout)? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        match self.handle_key(key.code) {
                            Ok(true) => break,
                            Ok(false) => {}
                            Err(err) => {
                                self.status_message = format!("Error: {}", err);
                                self.mark_dirty();
                            }
                        }
                    }
                    Event::Mouse(mouse) => self.handle_mouse(mouse),
                    Event::Resize(_, _) => self.mark_dirty(),
                    _ => {}
                }
            }

            if self.poll_async() {
                self.mark_dirty();
            }

            if last_tick.elapsed() >= TICK_RATE {
                last_tick = Instant::now();
                if self.preloader.tick(last_tick) {
                    self.mark_dirty();
                }
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

    fn next_id(&mut self) -> u64 {
        let id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        id
    }

    fn is_loading(&self) -> bool {
        self.feed.is_busy()
            || self.pending_search.is_some()
            || matches!(&self.screen, Screen::Detail(detail) if detail.outcome.is_none())
    }

    /// Fresh feed page: replays to the saved offset when there is one.
    fn start_feed(&mut self) {
        self.feed.reset();
        self.surface.clear();
        self.sentinel_in_range = false;
        self.restore = None;

        match ScrollRestorer::plan(&self.session, self.feed.trigger_mut()) {
            RestorePlan::ColdStart => {
                self.request_page(None);
            }
            RestorePlan::Replay(restorer) => {
                self.status_message = "Restoring your place in the feed…".to_string();
                self.restore = Some(RestoreState {
                    restorer,
                    awaiting_frame: false,
                });
                if !self.request_page(None) {
                    self.finish_restore();
                }
            }
        }
        self.mark_dirty();
    }

    /// Starts a page load unless one is already in flight.
    fn request_page(&mut self, prefetched: Option<PageEnvelope>) -> bool {
        let Some(PendingLoad { ticket, work }) =
            self.feed
                .begin_load(&self.session, prefetched, &mut self.surface)
        else {
            return false;
        };
        self.preloader.show();
        self.spinner.reset();

        match work {
            PendingWork::Ready(page) => self.finish_page(ticket, Ok(page)),
            PendingWork::Fetch(request) => {
                let tx = self.response_tx.clone();
                let source = Arc::clone(&self.source);
                thread::spawn(move || {
                    if ticket.is_cancelled() {
                        return;
                    }
                    let result = request.fetch(&*source);
                    if ticket.is_cancelled() {
                        return;
                    }
                    let _ = tx.send(AsyncResponse::Page { ticket, result });
                });
            }
        }
        self.mark_dirty();
        true
    }

    fn finish_page(&mut self, ticket: LoadTicket, result: Result<PageEnvelope, ApiError>) {
        let report = self.feed.complete_load(ticket, result, &mut self.surface);
        match &report {
            LoadReport::Stale | LoadReport::Skipped => return,
            LoadReport::Appended { has_more, .. } => {
                self.sentinel_in_range = false;
                let total = self.feed.items().len();
                self.status_message = if *has_more {
                    format!("{total} titles loaded.")
                } else {
                    format!("{total} titles loaded. End of list.")
                };
            }
            LoadReport::Empty { .. } => {
                self.status_message = format!("{} titles loaded.", self.feed.items().len());
            }
            LoadReport::Failed(_) => {
                self.status_message = "Load failed. Press r to retry.".to_string();
            }
        }
        self.preloader.sync(self.feed.is_busy(), Instant::now());
        if let Some(state) = self.restore.as_mut() {
            state.awaiting_frame = true;
        }
        self.mark_dirty();
    }

    /// Runs once per drawn frame, after layout has settled.
    fn after_frame(&mut self) {
        if let Some(state) = self.restore.as_mut() {
            if state.awaiting_frame {
                state.awaiting_frame = false;
                self.advance_restore();
            }
            return;
        }
        self.maybe_load_more();
    }

    fn advance_restore(&mut self) {
        let Some(state) = self.restore.as_ref() else {
            return;
        };
        let step = state
            .restorer
            .next_step(self.surface.max_scroll(), &self.feed);
        match step {
            RestoreStep::LoadMore => {
                if !self.request_page(None) {
                    self.finish_restore();
                }
            }
            RestoreStep::Finish { .. } => self.finish_restore(),
        }
    }

    fn finish_restore(&mut self) {
        let Some(state) = self.restore.take() else {
            return;
        };
        let offset = state.restorer.finish(self.feed.trigger_mut());
        self.surface.scroll_to(offset);
        self.surface.select_first_visible();
        if !self.feed.last_load_failed() {
            self.status_message = format!("{} titles loaded.", self.feed.items().len());
        }
        self.mark_dirty();
    }

    // Fires when the sentinel comes into range, not while it stays there, so a
    // failed page is not retried on every frame.
    fn maybe_load_more(&mut self) {
        if !matches!(self.screen, Screen::Feed) || self.pending_search.is_some() {
            return;
        }
        let in_range = self.feed.trigger().should_fire(
            self.surface.viewport_bottom() as usize,
            self.surface.sentinel_line() as usize,
        );
        if !in_range {
            self.sentinel_in_range = false;
            return;
        }
        if self.sentinel_in_range || self.feed.is_busy() {
            return;
        }
        self.sentinel_in_range = true;
        self.request_page(None);
    }

    fn submit_search(&mut self) {
        self.focus = Focus::Grid;
        self.cancel_pending_search();
        match self.session.set_search_query(&self.search_input) {
            None => self.go_home(),
            Some(query) => {
                self.search_input = query.clone();
                self.feed.reset();
                self.surface.clear();
                self.restore = None;
                self.sentinel_in_range = false;
                self.feed.trigger_mut().disconnect();
                self.preloader.show();
                self.spinner.reset();
                self.status_message = format!("Searching for \"{query}\"…");

                let request_id = self.next_id();
                let cancel_flag = Arc::new(AtomicBool::new(false));
                self.pending_search = Some(PendingSearch {
                    request_id,
                    cancel_flag: cancel_flag.clone(),
                });
                let tx = self.response_tx.clone();
                let source = Arc::clone(&self.source);
                thread::spawn(move || {
                    let result = source.search_titles(&query);
                    if cancel_flag.load(Ordering::SeqCst) {
                        return;
                    }
                    let _ = tx.send(AsyncResponse::Search { request_id, result });
                });
                self.mark_dirty();
            }
        }
    }

    /// Back to the unfiltered listing from the top.
    fn go_home(&mut self) {
        self.cancel_pending_search();
        self.session.clear_search_query();
        self.session.remove(session::SCROLL_POSITION_KEY);
        self.search_input.clear();
        self.focus = Focus::Grid;
        self.screen = Screen::Feed;
        self.status_message = "Showing all titles.".to_string();
        self.start_feed();
    }

    fn cancel_pending_search(&mut self) {
        if let Some(pending) = self.pending_search.take() {
            pending.cancel_flag.store(true, Ordering::SeqCst);
            self.feed.trigger_mut().connect();
        }
    }

    fn open_selected(&mut self) {
        let Some(card) = self.surface.selected_card() else {
            return;
        };
        let id = card.id.clone();
        let imdb_url = card.imdb_url.clone();

        self.session.save_scroll_position(self.surface.scroll());
        self.cancel_pending_search();
        self.restore = None;
        self.feed.reset();
        self.surface.clear();
        self.preloader.hide();

        self.open_detail(id, imdb_url);
    }

    fn open_detail(&mut self, id: String, imdb_url: String) {
        let request_id = self.next_id();
        self.screen = Screen::Detail(Box::new(DetailScreen {
            id: id.clone(),
            imdb_url,
            request_id,
            outcome: None,
            view: None,
            accent: None,
            scroll: 0,
            content_lines: Cell::new(0),
        }));
        self.status_message = "Loading title…".to_string();
        self.spinner.reset();

        let tx = self.response_tx.clone();
        let details = Arc::clone(&self.details);
        thread::spawn(move || {
            let outcome = DetailOutcome::load(&*details, &id);
            let _ = tx.send(AsyncResponse::Detail { request_id, outcome });
        });
        self.mark_dirty();
    }

    fn close_detail(&mut self) {
        self.screen = Screen::Feed;
        self.start_feed();
    }

    fn request_accent(&mut self, title: Title, request_id: u64) {
        if !self.dynamic_theme {
            return;
        }
        let Some(fetcher) = self.posters.clone() else {
            return;
        };
        let tx = self.response_tx.clone();
        thread::spawn(move || {
            let result = fetcher
                .fetch(&title)
                .and_then(|bytes| theme::extract_palette(&bytes, ACCENT_PALETTE_SIZE))
                .map(|colors| AccentTheme::from_palette(&colors));
            let _ = tx.send(AsyncResponse::Accent { request_id, result });
        });
    }

    fn toggle_theme(&mut self) -> Result<()> {
        self.theme = self.theme.toggle();
        self.status_message = format!("Switched to {} theme.", self.theme.as_str());
        theme::save_mode(&self.store, self.theme)?;
        Ok(())
    }

    fn open_in_browser(&mut self) {
        let url = match &self.screen {
            Screen::Detail(detail) => detail.imdb_url.clone(),
            Screen::Feed => match self.surface.selected_card() {
                Some(card) => card.imdb_url.clone(),
                None => {
                    self.status_message = "No title selected.".to_string();
                    return;
                }
            },
        };
        match webbrowser::open(&url) {
            Ok(_) => self.status_message = format!("Opened {url} in your browser."),
            Err(err) => self.status_message = format!("Failed to open {url}: {err}"),
        }
    }

    fn retry(&mut self) {
        if let Screen::Detail(detail) = &self.screen {
            if matches!(detail.outcome, Some(DetailOutcome::Failed(_))) {
                let (id, imdb_url) = (detail.id.clone(), detail.imdb_url.clone());
                self.open_detail(id, imdb_url);
            }
            return;
        }
        if self.feed.last_load_failed() {
            self.status_message = "Retrying…".to_string();
            self.request_page(None);
        }
    }

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
            AsyncResponse::Page { ticket, result } => self.finish_page(ticket, result),
            AsyncResponse::Search { request_id, result } => {
                let Some(pending) = &self.pending_search else {
                    return;
                };
                if pending.request_id != request_id || pending.cancel_flag.load(Ordering::SeqCst)
                {
                    return;
                }
                self.pending_search = None;
                self.feed.trigger_mut().connect();
                match result {
                    Ok(page) => {
                        self.request_page(Some(page));
                    }
                    Err(err) => {
                        // Route the failure through the controller so the banner and
                        // busy flag behave like any other page.
                        if let Some(PendingLoad { ticket, .. }) =
                            self.feed.begin_load(&self.session, None, &mut self.surface)
                        {
                            self.finish_page(ticket, Err(err));
                        }
                    }
                }
            }
            AsyncResponse::Detail {
                request_id,
                outcome,
            } => {
                let Screen::Detail(detail) = &mut self.screen else {
                    return;
                };
                if detail.request_id != request_id {
                    return;
                }
                let found = match &outcome {
                    DetailOutcome::Found(title) => {
                        detail.view = Some(DetailView::from_title(title));
                        self.status_message = title.display_name().to_string();
                        Some((**title).clone())
                    }
                    DetailOutcome::NotFound => {
                        self.status_message = NOT_FOUND_MESSAGE.to_string();
                        None
                    }
                    DetailOutcome::Failed(_) => {
                        self.status_message = "Load failed. Press r to retry.".to_string();
                        None
                    }
                };
                detail.outcome = Some(outcome);
                if let Some(title) = found {
                    self.request_accent(title, request_id);
                }
            }
            AsyncResponse::Accent { request_id, result } => {
                let Screen::Detail(detail) = &mut self.screen else {
                    return;
                };
                if detail.request_id != request_id {
                    return;
                }
                match result {
                    Ok(accent) => detail.accent = accent,
                    Err(err) => log::warn!("ui: poster accent unavailable: {err:#}"),
                }
            }
        }
    }

    fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        if self.focus == Focus::Search {
            self.handle_search_key(code);
            return Ok(false);
        }
        let quit = if matches!(self.screen, Screen::Detail(_)) {
            self.handle_detail_key(code)?
        } else {
            self.handle_feed_key(code)?
        };
        self.mark_dirty();
        Ok(quit)
    }

    fn handle_search_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Enter => self.submit_search(),
            KeyCode::Esc => {
                self.focus = Focus::Grid;
                self.search_input = self.session.search_query().unwrap_or_default();
            }
            KeyCode::Backspace => {
                self.search_input.pop();
            }
            KeyCode::Char(ch) => self.search_input.push(ch),
            _ => {}
        }
        self.mark_dirty();
    }

    fn handle_feed_key(&mut self, code: KeyCode) -> Result<bool> {
        let columns = self.surface.columns().max(1) as i64;
        let page = (self.surface.viewport_height.max(1)) as i64;
        match code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Char('j') | KeyCode::Down => self.surface.move_selection(columns),
            KeyCode::Char('k') | KeyCode::Up => self.surface.move_selection(-columns),
            KeyCode::Char('l') | KeyCode::Right => self.surface.move_selection(1),
            KeyCode::Char('h') | KeyCode::Left => self.surface.move_selection(-1),
            KeyCode::PageDown | KeyCode::Char(' ') => {
                self.surface.scroll_by(page);
                self.surface.select_first_visible();
            }
            KeyCode::PageUp => {
                self.surface.scroll_by(-page);
                self.surface.select_first_visible();
            }
            KeyCode::Home | KeyCode::Char('g') => {
                self.surface.scroll_to(0);
                self.surface.select_first_visible();
            }
            KeyCode::End | KeyCode::Char('G') => {
                let last = self.surface.cards().len() as i64;
                self.surface.move_selection(last);
            }
            KeyCode::Char('/') => self.focus = Focus::Search,
            KeyCode::Char('H') => self.go_home(),
            KeyCode::Enter => self.open_selected(),
            KeyCode::Char('t') => self.toggle_theme()?,
            KeyCode::Char('o') => self.open_in_browser(),
            KeyCode::Char('r') => self.retry(),
            _ => {}
        }
        Ok(false)
    }

    fn handle_detail_key(&mut self, code: KeyCode) -> Result<bool> {
        match code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('h') | KeyCode::Left => {
                self.close_detail()
            }
            KeyCode::Char('H') => self.go_home(),
            KeyCode::Char('j') | KeyCode::Down => self.scroll_detail(1),
            KeyCode::Char('k') | KeyCode::Up => self.scroll_detail(-1),
            KeyCode::Char('t') => self.toggle_theme()?,
            KeyCode::Char('o') => self.open_in_browser(),
            KeyCode::Char('r') => self.retry(),
            _ => {}
        }
        Ok(false)
    }

    fn scroll_detail(&mut self, delta: i32) {
        if let Screen::Detail(detail) = &mut self.screen {
            let max = detail.content_lines.get() as i32;
            detail.scroll = (detail.scroll as i32 + delta).clamp(0, max.max(0)) as u16;
        }
    }

    fn handle_mouse(&mut self, event: MouseEvent) {
        let delta = match event.kind {
            MouseEventKind::ScrollDown => MOUSE_SCROLL_LINES,
            MouseEventKind::ScrollUp => -MOUSE_SCROLL_LINES,
            _ => return,
        };
        if matches!(self.screen, Screen::Feed) {
            self.surface.scroll_by(delta);
            self.surface.select_first_visible();
        } else {
            self.scroll_detail(delta.signum() as i32);
        }
        self.mark_dirty();
    }

    fn palette(&self) -> Palette {
        let base = Palette::for_mode(self.theme);
        match &self.screen {
            Screen::Detail(detail) if self.dynamic_theme => match &detail.accent {
                Some(accent) => base.with_accent(accent),
                None => base,
            },
            _ => base,
        }
    }

    fn draw(&mut self, frame: &mut Frame<'_>) {
        let palette = self.palette();
        let full = frame.size();
        frame.render_widget(Block::default().style(Style::default().bg(palette.bg)), full);

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(full);

        let status_text = if self.is_loading() {
            format!("{} {}", self.spinner.frame(), self.status_message)
                .trim()
                .to_string()
        } else {
            self.status_message.clone()
        };
        let status_line = Paragraph::new(status_text).style(
            Style::default()
                .fg(palette.text_primary)
                .bg(palette.panel_selected_bg)
                .add_modifier(Modifier::BOLD),
        );
        frame.render_widget(status_line, layout[0]);

        if matches!(self.screen, Screen::Feed) {
            self.draw_feed(frame, layout[1], &palette);
            if self.preloader.is_visible() {
                self.draw_preloader(frame, layout[1], &palette);
            }
        } else {
            self.draw_detail(frame, layout[1], &palette);
        }

        let footer = Paragraph::new(self.footer_text())
            .style(
                Style::default()
                    .fg(palette.text_secondary)
                    .bg(palette.panel_bg)
                    .add_modifier(Modifier::ITALIC),
            )
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        frame.render_widget(footer, layout[2]);
    }

    fn panel_block(title: String, focused: bool, palette: &Palette) -> Block<'static> {
        let border_style = if focused {
            Style::default().fg(palette.border_focused)
        } else {
            Style::default().fg(palette.border_idle)
        };
        let title_style = if focused {
            Style::default()
                .fg(palette.accent)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(palette.text_secondary)
        };
        Block::default()
            .title(Span::styled(title, title_style))
            .borders(Borders::ALL)
            .border_style(border_style)
            .style(Style::default().bg(palette.panel_bg))
            .padding(Padding::horizontal(1))
    }

    fn draw_feed(&mut self, frame: &mut Frame<'_>, area: Rect, palette: &Palette) {
        let mut constraints = vec![Constraint::Length(3)];
        if self.surface.notice.is_some() {
            constraints.push(Constraint::Length(3));
        }
        constraints.push(Constraint::Min(0));
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(area);

        let searching = self.focus == Focus::Search;
        let (search_text, search_style) = if searching {
            (
                format!("{}▏", self.search_input),
                Style::default().fg(palette.text_primary),
            )
        } else if self.search_input.is_empty() {
            (
                SEARCH_PLACEHOLDER.to_string(),
                Style::default()
                    .fg(palette.text_secondary)
                    .add_modifier(Modifier::ITALIC),
            )
        } else {
            (
                self.search_input.clone(),
                Style::default().fg(palette.text_primary),
            )
        };
        let search = Paragraph::new(search_text)
            .style(search_style)
            .block(Self::panel_block("Search".into(), searching, palette));
        frame.render_widget(search, chunks[0]);

        if let Some(notice) = &self.surface.notice {
            let color = match notice {
                Notice::Empty => palette.accent,
                Notice::Error(_) => palette.error,
            };
            let banner = Paragraph::new(notice.message().to_string())
                .style(Style::default().fg(color).add_modifier(Modifier::BOLD))
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .border_style(Style::default().fg(color))
                        .style(Style::default().bg(palette.panel_bg)),
                )
                .wrap(Wrap { trim: true });
            frame.render_widget(banner, chunks[1]);
        }

        let grid_area = chunks[chunks.len() - 1];
        let title = match self.session.search_query() {
            Some(query) => format!("Results for \"{query}\""),
            None => "Movies & TV Series".to_string(),
        };
        let block = Self::panel_block(title, !searching, palette);
        let inner = block.inner(grid_area);
        frame.render_widget(block, grid_area);

        self.surface.set_layout(inner.width, inner.height);
        let lines = self.grid_lines(inner.width, palette);
        frame.render_widget(
            Paragraph::new(lines).style(Style::default().bg(palette.panel_bg)),
            inner,
        );
    }

    fn grid_lines(&self, width: u16, palette: &Palette) -> Vec<Line<'static>> {
        let surface = &self.surface;
        let columns = surface.columns.max(1) as usize;
        let cell_width = (width as usize / columns).max(1);
        let card_height = surface.card_height as usize;
        let document = surface.document_height() as usize;
        let start = surface.scroll as usize;
        let end = start + surface.viewport_height as usize;

        let mut lines = Vec::new();
        for line_no in start..end {
            if line_no < document {
                let row = line_no / card_height;
                let line_in_card = line_no % card_height;
                let mut spans = Vec::new();
                for column in 0..columns {
                    let index = row * columns + column;
                    match surface.cards.get(index) {
                        Some(card) => spans.extend(card_spans(
                            card,
                            line_in_card,
                            card_height,
                            cell_width,
                            index == surface.selected,
                            palette,
                        )),
                        None => spans.push(Span::raw(" ".repeat(cell_width))),
                    }
                }
                lines.push(Line::from(spans));
            } else if line_no == document {
                lines.push(self.sentinel_row(palette));
            } else {
                break;
            }
        }
        lines
    }

    fn sentinel_row(&self, palette: &Palette) -> Line<'static> {
        let text = if self.surface.loading {
            format!("{} Loading more titles…", self.spinner.frame())
        } else if self.feed.has_more() {
            "Scroll for more".to_string()
        } else if !self.surface.cards.is_empty() {
            "End of list".to_string()
        } else {
            String::new()
        };
        Line::from(Span::styled(
            text,
            Style::default()
                .fg(palette.text_secondary)
                .add_modifier(Modifier::ITALIC),
        ))
        .alignment(Alignment::Center)
    }

    fn draw_preloader(&self, frame: &mut Frame<'_>, area: Rect, palette: &Palette) {
        let popup = centered_rect(40, 20, area);
        frame.render_widget(Clear, popup);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(palette.border_focused))
            .style(Style::default().bg(palette.panel_bg));
        let text = Text::from(vec![
            Line::from(""),
            Line::from(Span::styled(
                format!("{} Loading titles…", self.spinner.frame()),
                Style::default()
                    .fg(palette.accent)
                    .add_modifier(Modifier::BOLD),
            )),
        ]);
        frame.render_widget(
            Paragraph::new(text)
                .alignment(Alignment::Center)
                .block(block),
            popup,
        );
    }

    fn draw_detail(&self, frame: &mut Frame<'_>, area: Rect, palette: &Palette) {
        let Screen::Detail(detail) = &self.screen else {
            return;
        };
        let accent = detail.accent.filter(|_| self.dynamic_theme);

        let view = match (&detail.outcome, &detail.view) {
            (Some(DetailOutcome::Found(_)), Some(view)) => view,
            (outcome, _) => {
                let (message, color) = match outcome {
                    None => (
                        format!("{} Loading title…", self.spinner.frame()),
                        palette.accent,
                    ),
                    Some(DetailOutcome::Failed(err)) => (
                        format!("Failed to load title: {err}. Press r to retry."),
                        palette.error,
                    ),
                    Some(_) => (NOT_FOUND_MESSAGE.to_string(), palette.text_primary),
                };
                let body = Paragraph::new(message)
                    .style(Style::default().fg(color))
                    .alignment(Alignment::Center)
                    .block(Self::panel_block("Title".into(), true, palette))
                    .wrap(Wrap { trim: true });
                frame.render_widget(body, area);
                return;
            }
        };

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0)])
            .split(area);

        let (title_fg, title_bg) = match accent {
            Some(accent) => (accent.title_text.color(), accent.title_bg.color()),
            None => (palette.bg, palette.accent),
        };
        let heading = Paragraph::new(view.heading.clone())
            .style(
                Style::default()
                    .fg(title_fg)
                    .bg(title_bg)
                    .add_modifier(Modifier::BOLD),
            )
            .alignment(Alignment::Center)
            .block(Block::default().padding(Padding::vertical(1)));
        frame.render_widget(heading, chunks[0]);

        let block = Self::panel_block("Overview".into(), true, palette);
        let inner = block.inner(chunks[1]);
        let width = (inner.width as usize).max(1);

        let mut lines: Vec<Line<'static>> = wrap(&view.overview, WrapOptions::new(width))
            .into_iter()
            .map(|line| {
                Line::from(Span::styled(
                    line.into_owned(),
                    Style::default().fg(palette.text_primary),
                ))
            })
            .collect();
        lines.push(Line::from(""));
        for (label, value) in &view.rows {
            lines.push(Line::from(vec![
                Span::styled(
                    format!("{label}: "),
                    Style::default()
                        .fg(palette.accent)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled(value.clone(), Style::default().fg(palette.text_primary)),
            ]));
        }
        detail
            .content_lines
            .set((lines.len() as u16).saturating_sub(inner.height));

        let body = Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: false })
            .scroll((detail.scroll, 0));
        frame.render_widget(body, chunks[1]);
    }

    fn footer_text(&self) -> String {
        if self.focus == Focus::Search {
            return "Search: type a title · Enter submit (empty shows all) · Esc cancel".to_string();
        }
        match self.screen {
            Screen::Feed => {
                let mut parts = vec!["j/k/h/l move", "Enter details", "/ search", "H home"];
                if self.feed.last_load_failed() {
                    parts.push("r retry");
                }
                parts.extend(["t theme", "o open on IMDb", "q quit"]);
                parts.join(" · ")
            }
            Screen::Detail(_) => {
                "Esc back · H home · j/k scroll · t theme · o open on IMDb · q quit".to_string()
            }
        }
    }
}

fn card_spans(
    card: &Card,
    line_in_card: usize,
    card_height: usize,
    cell_width: usize,
    selected: bool,
    palette: &Palette,
) -> Vec<Span<'static>> {
    let border = Style::default().fg(if selected {
        palette.border_focused
    } else {
        palette.border_idle
    });
    let background = if selected {
        palette.panel_selected_bg
    } else {
        palette.panel_bg
    };
    // One column of the cell is left blank as a gutter.
    let rule = "─".repeat(cell_width.saturating_sub(3));
    let last = card_height.saturating_sub(1);

    if line_in_card == 0 {
        return vec![
            Span::styled(format!("╭{rule}╮"), border),
            Span::raw(" "),
        ];
    }
    if line_in_card == last {
        return vec![
            Span::styled(format!("╰{rule}╯"), border),
            Span::raw(" "),
        ];
    }

    let field = line_in_card - 1;
    let style = match field {
        0 => Style::default()
            .fg(palette.text_primary)
            .add_modifier(Modifier::BOLD),
        2 => Style::default().fg(palette.success),
        _ => Style::default().fg(palette.text_secondary),
    };
    vec![
        Span::styled("│ ", border),
        Span::styled(
            fit_width(card.field(field), cell_width.saturating_sub(5)),
            style.bg(background),
        ),
        Span::styled(" │", border),
        Span::raw(" "),
    ]
}

/// Truncates with an ellipsis and pads to exactly `width` columns.
fn fit_width(text: &str, width: usize) -> String {
    if width == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0;
    if UnicodeWidthStr::width(text) <= width {
        out.push_str(text);
        used = UnicodeWidthStr::width(text);
    } else {
        for ch in text.chars() {
            let ch_width = UnicodeWidthChar::width(ch).unwrap_or(0);
            if used + ch_width + 1 > width {
                break;
            }
            out.push(ch);
            used += ch_width;
        }
        out.push('…');
        used += 1;
    }
    out.extend(std::iter::repeat(' ').take(width.saturating_sub(used)));
    out
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Min(3),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}
