//! Scroll restoration after returning to the feed.
//!
//! The saved offset is only reachable once enough pages are back on screen, so the
//! restorer replays pages one at a time, lets a frame settle, measures, and repeats.
//! It stops once the surface can scroll as far as the offset, when pagination is over,
//! or when a page fails. The last two keep an offset beyond the content from looping.

use log::{debug, info};

use crate::data::TitleSource;
use crate::feed::{FeedController, FeedView, LoadReport};
use crate::session;
use crate::trigger::Trigger;

/// Layout side of the feed surface.
pub trait Viewport {
    /// Total height of the rendered items in lines.
    fn document_height(&self) -> u32;
    /// Furthest offset `scroll_to` can reach with the current content and viewport.
    fn max_scroll(&self) -> u32;
    /// Lets pending layout settle before measuring.
    fn wait_frame(&mut self);
    /// Scrolls to `offset`, clamped to what the document can reach.
    fn scroll_to(&mut self, offset: u32);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestorePlan {
    /// No saved offset: one ordinary load.
    ColdStart,
    Replay(ScrollRestorer),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreStep {
    LoadMore,
    Finish { offset: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollRestorer {
    target: u32,
}

impl ScrollRestorer {
    pub fn new(target: u32) -> Self {
        Self { target }
    }

    pub fn target(&self) -> u32 {
        self.target
    }

    /// Consumes the saved offset. When there is one, the trigger is disconnected for
    /// the replay; otherwise it is connected for ordinary lazy loading.
    pub fn plan(session: &session::Store, trigger: &mut Trigger) -> RestorePlan {
        if session.peek_scroll_position().ok().flatten().is_none() {
            session.remove(session::SCROLL_POSITION_KEY);
            trigger.connect();
            return RestorePlan::ColdStart;
        }
        trigger.disconnect();
        match session.take_scroll_position() {
            Some(target) => {
                info!("restore: replaying pages to reach offset {target}");
                RestorePlan::Replay(Self::new(target))
            }
            None => {
                trigger.connect();
                RestorePlan::ColdStart
            }
        }
    }

    /// Decides what follows a settled frame, given the furthest reachable offset.
    pub fn next_step(&self, max_scroll: u32, controller: &FeedController) -> RestoreStep {
        if max_scroll < self.target
            && controller.has_more()
            && !controller.last_load_failed()
        {
            RestoreStep::LoadMore
        } else {
            debug!(
                "restore: stopping at reachable offset {max_scroll} (target {})",
                self.target
            );
            RestoreStep::Finish {
                offset: self.target,
            }
        }
    }

    /// Reconnects the trigger and hands back the offset to scroll to.
    pub fn finish(self, trigger: &mut Trigger) -> u32 {
        trigger.connect();
        self.target
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoreSummary {
    pub pages: usize,
    pub offset: Option<u32>,
}

/// Runs the whole restoration inline against one surface.
pub fn restore<S>(
    controller: &mut FeedController,
    source: &dyn TitleSource,
    session: &session::Store,
    surface: &mut S,
) -> RestoreSummary
where
    S: FeedView + Viewport,
{
    let restorer = match ScrollRestorer::plan(session, controller.trigger_mut()) {
        RestorePlan::ColdStart => {
            controller.load_next_page(source, session, None, surface);
            return RestoreSummary {
                pages: 1,
                offset: None,
            };
        }
        RestorePlan::Replay(restorer) => restorer,
    };

    let mut pages = 0;
    loop {
        let report = controller.load_next_page(source, session, None, surface);
        if !matches!(report, LoadReport::Skipped | LoadReport::Stale) {
            pages += 1;
        }
        surface.wait_frame();
        let step = restorer.next_step(surface.max_scroll(), controller);
        if matches!(step, RestoreStep::Finish { .. })
            || matches!(report, LoadReport::Skipped | LoadReport::Stale)
        {
            break;
        }
    }

    let offset = restorer.finish(controller.trigger_mut());
    surface.scroll_to(offset);
    info!("restore: done after {pages} pages");
    RestoreSummary {
        pages,
        offset: Some(offset),
    }
}
