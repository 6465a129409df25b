//! Incremental loading of the title feed.
//!
//! A [`FeedController`] owns one feed: the accumulated titles, the position in the
//! listing and the busy flag that keeps at most one page request in flight. A request
//! made while busy is dropped, not queued.
//!
//! The event loop drives a load in two halves ([`FeedController::begin_load`] on the UI
//! thread, [`FeedController::complete_load`] once the worker answers) so the network
//! call never blocks drawing. [`FeedController::load_next_page`] runs both halves inline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, error, info};

use crate::data::TitleSource;
use crate::imdb::{ApiError, PageEnvelope, Title};
use crate::session;
use crate::trigger::Trigger;

pub const EMPTY_FEED_MESSAGE: &str = "No movies found.";
const LOAD_FAILURE_PREFIX: &str =
    "Failed to load movies and tv series. Please try again later. Error:";

/// Where the feed stands in the listing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Cursor {
    /// Nothing has been loaded successfully yet.
    #[default]
    Start,
    Next(String),
    Exhausted,
}

impl Cursor {
    pub fn token(&self) -> Option<&str> {
        match self {
            Cursor::Next(token) => Some(token),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct FeedState {
    accumulated: Vec<Title>,
    cursor: Cursor,
    busy: bool,
}

impl FeedState {
    pub fn items(&self) -> &[Title] {
        &self.accumulated
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }
}

/// Result of fetching one page.
#[derive(Debug)]
pub enum PageOutcome {
    More { titles: Vec<Title>, next: String },
    Last { titles: Vec<Title> },
    Failed(ApiError),
}

impl From<PageEnvelope> for PageOutcome {
    fn from(page: PageEnvelope) -> Self {
        match page.next_page_token {
            Some(next) if !next.trim().is_empty() => PageOutcome::More {
                titles: page.titles,
                next,
            },
            _ => PageOutcome::Last {
                titles: page.titles,
            },
        }
    }
}

impl From<Result<PageEnvelope, ApiError>> for PageOutcome {
    fn from(result: Result<PageEnvelope, ApiError>) -> Self {
        match result {
            Ok(page) => page.into(),
            Err(err) => PageOutcome::Failed(err),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The very first page came back empty.
    Empty,
    Error(String),
}

impl Notice {
    pub fn message(&self) -> &str {
        match self {
            Notice::Empty => EMPTY_FEED_MESSAGE,
            Notice::Error(message) => message,
        }
    }
}

/// Presentation side of the feed.
pub trait FeedView {
    fn render_title(&mut self, title: &Title);
    fn set_loading(&mut self, loading: bool);
    fn show_notice(&mut self, notice: Notice);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageRequest {
    Listing { token: Option<String> },
    Search { query: String },
}

impl PageRequest {
    pub fn fetch(&self, source: &dyn TitleSource) -> Result<PageEnvelope, ApiError> {
        match self {
            PageRequest::Listing { token } => source.list_titles(token.as_deref()),
            PageRequest::Search { query } => source.search_titles(query),
        }
    }
}

#[derive(Debug)]
pub enum PendingWork {
    /// The caller already holds the page, e.g. a freshly submitted search.
    Ready(PageEnvelope),
    Fetch(PageRequest),
}

impl PendingWork {
    pub fn resolve(self, source: &dyn TitleSource) -> Result<PageEnvelope, ApiError> {
        match self {
            PendingWork::Ready(page) => Ok(page),
            PendingWork::Fetch(request) => request.fetch(source),
        }
    }
}

/// Identifies one in-flight load so late answers can be recognised.
#[derive(Debug, Clone)]
pub struct LoadTicket {
    request_id: u64,
    cancel_flag: Arc<AtomicBool>,
}

impl LoadTicket {
    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct PendingLoad {
    pub ticket: LoadTicket,
    pub work: PendingWork,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadReport {
    /// Busy, or nothing left to load. Nothing was fetched.
    Skipped,
    /// The answer belonged to a feed that has since been reset.
    Stale,
    Appended { count: usize, has_more: bool },
    Empty { first_load: bool },
    Failed(String),
}

pub struct FeedController {
    state: FeedState,
    trigger: Trigger,
    in_flight: Option<LoadTicket>,
    next_request_id: u64,
    last_report: Option<LoadReport>,
}

impl FeedController {
    pub fn new(trigger: Trigger) -> Self {
        Self {
            state: FeedState::default(),
            trigger,
            in_flight: None,
            next_request_id: 1,
            last_report: None,
        }
    }

    pub fn state(&self) -> &FeedState {
        &self.state
    }

    pub fn items(&self) -> &[Title] {
        self.state.items()
    }

    pub fn cursor(&self) -> &Cursor {
        self.state.cursor()
    }

    pub fn is_busy(&self) -> bool {
        self.state.busy
    }

    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    pub fn trigger_mut(&mut self) -> &mut Trigger {
        &mut self.trigger
    }

    pub fn last_report(&self) -> Option<&LoadReport> {
        self.last_report.as_ref()
    }

    pub fn last_load_failed(&self) -> bool {
        matches!(self.last_report, Some(LoadReport::Failed(_)))
    }

    /// A further page exists and the trigger still allows fetching it.
    pub fn has_more(&self) -> bool {
        self.trigger.is_enabled() && matches!(self.state.cursor, Cursor::Next(_))
    }

    /// Drops the feed. An answer for the previous feed still in flight is ignored.
    pub fn reset(&mut self) {
        if let Some(ticket) = self.in_flight.take() {
            ticket.cancel_flag.store(true, Ordering::SeqCst);
        }
        let margin = self.trigger.margin();
        let connected = self.trigger.is_connected();
        self.trigger = Trigger::new(margin);
        if connected {
            self.trigger.connect();
        }
        self.state = FeedState::default();
        self.last_report = None;
    }

    /// First half of a load. `None` when a load is already in flight, or when no page
    /// was supplied and pagination is over.
    pub fn begin_load(
        &mut self,
        session: &session::Store,
        prefetched: Option<PageEnvelope>,
        view: &mut dyn FeedView,
    ) -> Option<PendingLoad> {
        if self.state.busy {
            debug!("feed: load skipped, a page is already in flight");
            return None;
        }

        let work = match prefetched {
            Some(page) => PendingWork::Ready(page),
            None if !self.trigger.is_enabled() => {
                debug!("feed: load skipped, trigger disabled");
                return None;
            }
            None => match session.search_query() {
                Some(query) => PendingWork::Fetch(PageRequest::Search { query }),
                None => PendingWork::Fetch(PageRequest::Listing {
                    token: self.state.cursor.token().map(str::to_string),
                }),
            },
        };

        let ticket = LoadTicket {
            request_id: self.next_request_id,
            cancel_flag: Arc::new(AtomicBool::new(false)),
        };
        self.next_request_id = self.next_request_id.wrapping_add(1);
        self.in_flight = Some(ticket.clone());
        self.state.busy = true;
        view.set_loading(true);

        Some(PendingLoad { ticket, work })
    }

    /// Second half of a load. Clears the busy flag on every path.
    pub fn complete_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<PageEnvelope, ApiError>,
        view: &mut dyn FeedView,
    ) -> LoadReport {
        let current = self
            .in_flight
            .as_ref()
            .is_some_and(|pending| pending.request_id == ticket.request_id);
        if !current || ticket.is_cancelled() {
            debug!("feed: dropping stale answer for request {}", ticket.request_id);
            return LoadReport::Stale;
        }
        self.in_flight = None;

        let report = self.apply(PageOutcome::from(result), view);

        self.state.busy = false;
        view.set_loading(false);
        self.last_report = Some(report.clone());
        report
    }

    /// Fetches and appends one page inline.
    pub fn load_next_page(
        &mut self,
        source: &dyn TitleSource,
        session: &session::Store,
        prefetched: Option<PageEnvelope>,
        view: &mut dyn FeedView,
    ) -> LoadReport {
        let Some(PendingLoad { ticket, work }) = self.begin_load(session, prefetched, view) else {
            return LoadReport::Skipped;
        };
        let result = work.resolve(source);
        self.complete_load(ticket, result, view)
    }

    fn apply(&mut self, outcome: PageOutcome, view: &mut dyn FeedView) -> LoadReport {
        let (titles, next) = match outcome {
            PageOutcome::Failed(err) => {
                error!("feed: page load failed: {err:?}");
                let message = format!("{LOAD_FAILURE_PREFIX} {err}");
                view.show_notice(Notice::Error(message.clone()));
                return LoadReport::Failed(message);
            }
            PageOutcome::More { titles, next } => (titles, Some(next)),
            PageOutcome::Last { titles } => (titles, None),
        };

        let first_load = self.state.cursor == Cursor::Start;
        if titles.is_empty() {
            self.state.cursor = Cursor::Exhausted;
            self.trigger.disable();
            if first_load {
                info!("feed: first page was empty");
                view.show_notice(Notice::Empty);
            } else {
                debug!("feed: empty page, pagination stopped");
            }
            return LoadReport::Empty { first_load };
        }

        let start = self.state.accumulated.len();
        self.state.accumulated.extend(titles);
        for title in &self.state.accumulated[start..] {
            view.render_title(title);
        }
        let count = self.state.accumulated.len() - start;

        let has_more = match next {
            Some(token) => {
                self.state.cursor = Cursor::Next(token);
                true
            }
            None => {
                self.state.cursor = Cursor::Exhausted;
                self.trigger.disable();
                debug!("feed: no continuation token, trigger disabled");
                false
            }
        };
        debug!(
            "feed: appended {count} titles ({} total)",
            self.state.accumulated.len()
        );

        LoadReport::Appended { count, has_more }
    }
}

#[cfg(test)]
pub(crate) mod recording {
    use super::*;

    /// View that records every call made on it.
    #[derive(Default)]
    pub struct RecordingView {
        pub rendered: Vec<String>,
        pub notices: Vec<Notice>,
        pub loading: bool,
        pub loading_changes: usize,
    }

    impl FeedView for RecordingView {
        fn render_title(&mut self, title: &Title) {
            self.rendered.push(title.id.clone());
        }

        fn set_loading(&mut self, loading: bool) {
            self.loading = loading;
            self.loading_changes += 1;
        }

        fn show_notice(&mut self, notice: Notice) {
            self.notices.push(notice);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::recording::RecordingView;
    use super::*;
    use crate::data::scripted::{page, server_error, Call, ScriptedSource};

    fn controller() -> FeedController {
        FeedController::new(Trigger::new(10))
    }

    fn ids(controller: &FeedController) -> Vec<String> {
        controller.items().iter().map(|title| title.id.clone()).collect()
    }

    #[test]
    fn pages_accumulate_in_arrival_order() {
        let source = ScriptedSource::new(vec![
            page("a", 3, Some("t1")),
            page("b", 2, Some("t2")),
            page("c", 4, None),
        ]);
        let session = session::Store::new();
        let mut view = RecordingView::default();
        let mut feed = controller();

        assert_eq!(
            feed.load_next_page(&source, &session, None, &mut view),
            LoadReport::Appended { count: 3, has_more: true }
        );
        feed.load_next_page(&source, &session, None, &mut view);
        assert_eq!(
            feed.load_next_page(&source, &session, None, &mut view),
            LoadReport::Appended { count: 4, has_more: false }
        );

        assert_eq!(feed.items().len(), 9);
        assert_eq!(
            ids(&feed),
            vec!["a0", "a1", "a2", "b0", "b1", "c0", "c1", "c2", "c3"]
        );
        assert_eq!(view.rendered, ids(&feed));
        assert_eq!(
            source.calls(),
            vec![
                Call::Listing(None),
                Call::Listing(Some("t1".into())),
                Call::Listing(Some("t2".into())),
            ]
        );
        assert!(!feed.is_busy());
        assert!(!view.loading);
    }

    #[test]
    fn load_while_busy_is_a_noop() {
        let source = ScriptedSource::new(vec![page("a", 2, Some("t1"))]);
        let session = session::Store::new();
        let mut view = RecordingView::default();
        let mut feed = controller();

        let pending = feed.begin_load(&session, None, &mut view).unwrap();
        assert!(feed.is_busy());

        assert!(feed.begin_load(&session, None, &mut view).is_none());
        assert_eq!(
            feed.load_next_page(&source, &session, None, &mut view),
            LoadReport::Skipped
        );
        assert!(feed.items().is_empty());
        assert_eq!(feed.cursor(), &Cursor::Start);
        assert!(source.calls().is_empty());

        let result = pending.work.resolve(&source);
        feed.complete_load(pending.ticket, result, &mut view);
        assert_eq!(feed.items().len(), 2);
        assert_eq!(source.calls().len(), 1);
        assert!(!feed.is_busy());
    }

    #[test]
    fn empty_first_page_shows_empty_notice_and_stops() {
        let source = ScriptedSource::new(vec![page("a", 0, Some("t1"))]);
        let session = session::Store::new();
        let mut view = RecordingView::default();
        let mut feed = controller();

        assert_eq!(
            feed.load_next_page(&source, &session, None, &mut view),
            LoadReport::Empty { first_load: true }
        );
        assert_eq!(view.notices, vec![Notice::Empty]);
        assert!(!feed.trigger().is_enabled());
        assert_eq!(
            feed.load_next_page(&source, &session, None, &mut view),
            LoadReport::Skipped
        );
        assert_eq!(source.calls().len(), 1);
    }

    #[test]
    fn empty_later_page_stops_without_notice() {
        let source = ScriptedSource::new(vec![page("a", 2, Some("t1")), page("b", 0, Some("t2"))]);
        let session = session::Store::new();
        let mut view = RecordingView::default();
        let mut feed = controller();

        feed.load_next_page(&source, &session, None, &mut view);
        assert_eq!(
            feed.load_next_page(&source, &session, None, &mut view),
            LoadReport::Empty { first_load: false }
        );
        assert!(view.notices.is_empty());
        assert!(!feed.has_more());
        assert_eq!(feed.cursor(), &Cursor::Exhausted);
    }

    #[test]
    fn missing_token_disables_further_loads() {
        let source = ScriptedSource::new(vec![page("a", 5, None)]);
        let session = session::Store::new();
        let mut view = RecordingView::default();
        let mut feed = controller();
        feed.trigger_mut().connect();

        feed.load_next_page(&source, &session, None, &mut view);
        assert!(!feed.trigger().is_enabled());
        assert!(!feed.trigger().should_fire(0, 0));
        assert_eq!(
            feed.load_next_page(&source, &session, None, &mut view),
            LoadReport::Skipped
        );
        assert_eq!(feed.items().len(), 5);
        assert_eq!(source.calls().len(), 1);
    }

    #[test]
    fn server_error_keeps_state_and_clears_busy() {
        let source = ScriptedSource::new(vec![page("a", 2, Some("t1")), server_error()]);
        let session = session::Store::new();
        let mut view = RecordingView::default();
        let mut feed = controller();

        feed.load_next_page(&source, &session, None, &mut view);
        let report = feed.load_next_page(&source, &session, None, &mut view);

        let message = match report {
            LoadReport::Failed(message) => message,
            other => panic!("expected failure, got {other:?}"),
        };
        assert!(message.contains("500"));
        assert!(message.starts_with("Failed to load movies and tv series."));
        assert_eq!(view.notices, vec![Notice::Error(message)]);
        assert_eq!(ids(&feed), vec!["a0", "a1"]);
        assert_eq!(feed.cursor(), &Cursor::Next("t1".into()));
        assert!(!feed.is_busy());
        assert!(!view.loading);
        assert!(feed.last_load_failed());
        assert!(feed.trigger().is_enabled());
    }

    #[test]
    fn empty_search_reports_no_movies_found() {
        let source = ScriptedSource::new(vec![page("s", 0, None)]);
        let session = session::Store::new();
        session.set_search_query("batman");
        let mut view = RecordingView::default();
        let mut feed = controller();

        feed.load_next_page(&source, &session, None, &mut view);
        assert_eq!(source.calls(), vec![Call::Search("batman".into())]);
        assert_eq!(view.notices.len(), 1);
        assert_eq!(view.notices[0].message(), "No movies found.");
    }

    #[test]
    fn prefetched_page_bypasses_fetch() {
        let source = ScriptedSource::new(vec![]);
        let session = session::Store::new();
        let mut view = RecordingView::default();
        let mut feed = controller();

        let prefetched = page("p", 3, None).unwrap();
        assert_eq!(
            feed.load_next_page(&source, &session, Some(prefetched), &mut view),
            LoadReport::Appended { count: 3, has_more: false }
        );
        assert!(source.calls().is_empty());
    }

    #[test]
    fn answer_after_reset_is_ignored() {
        let source = ScriptedSource::new(vec![page("old", 2, Some("t1"))]);
        let session = session::Store::new();
        let mut view = RecordingView::default();
        let mut feed = controller();

        let pending = feed.begin_load(&session, None, &mut view).unwrap();
        feed.reset();
        assert!(!feed.is_busy());

        let result = pending.work.resolve(&source);
        assert_eq!(
            feed.complete_load(pending.ticket, result, &mut view),
            LoadReport::Stale
        );
        assert!(feed.items().is_empty());
        assert!(view.rendered.is_empty());
    }

    #[test]
    fn loading_indicator_brackets_every_load() {
        let source = ScriptedSource::new(vec![server_error(), page("a", 1, None)]);
        let session = session::Store::new();
        let mut view = RecordingView::default();
        let mut feed = controller();

        feed.load_next_page(&source, &session, None, &mut view);
        feed.load_next_page(&source, &session, None, &mut view);
        assert_eq!(view.loading_changes, 4);
        assert!(!view.loading);
    }
}
