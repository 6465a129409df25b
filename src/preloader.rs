use std::time::{Duration, Instant};

pub const DEFAULT_HIDE_DELAY: Duration = Duration::from_millis(300);
const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const SPINNER_INTERVAL: Duration = Duration::from_millis(120);

/// Full-screen curtain shown while pages load. Hiding is deferred by a short delay
/// so quick loads do not flash it on and off.
#[derive(Debug, Clone)]
pub struct Preloader {
    visible: bool,
    hide_at: Option<Instant>,
    delay: Duration,
}

impl Default for Preloader {
    fn default() -> Self {
        Self::new(DEFAULT_HIDE_DELAY)
    }
}

impl Preloader {
    pub fn new(delay: Duration) -> Self {
        Self {
            visible: false,
            hide_at: None,
            delay,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn show(&mut self) {
        self.visible = true;
        self.hide_at = None;
    }

    /// Hides at once, dropping any scheduled hide.
    pub fn hide(&mut self) {
        self.visible = false;
        self.hide_at = None;
    }

    /// Schedules the hide. A hide already scheduled keeps its deadline.
    pub fn hide_after(&mut self, now: Instant) {
        if self.visible && self.hide_at.is_none() {
            self.hide_at = Some(now + self.delay);
        }
    }

    /// Follows the busy flag: shown while busy, hidden `delay` after it clears.
    pub fn sync(&mut self, busy: bool, now: Instant) {
        if busy {
            self.show();
        } else {
            self.hide_after(now);
        }
    }

    /// Applies a due hide. Returns true when visibility changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.hide_at {
            Some(deadline) if now >= deadline => {
                self.visible = false;
                self.hide_at = None;
                true
            }
            _ => false,
        }
    }
}

pub struct Spinner {
    index: usize,
    last_tick: Instant,
}

impl Default for Spinner {
    fn default() -> Self {
        Self::new()
    }
}

impl Spinner {
    pub fn new() -> Self {
        Self {
            index: 0,
            last_tick: Instant::now(),
        }
    }

    pub fn frame(&self) -> &'static str {
        SPINNER_FRAMES[self.index % SPINNER_FRAMES.len()]
    }

    pub fn advance(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.last_tick) >= SPINNER_INTERVAL {
            self.index = (self.index + 1) % SPINNER_FRAMES.len();
            self.last_tick = now;
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.index = 0;
        self.last_tick = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hides_only_after_delay() {
        let start = Instant::now();
        let mut preloader = Preloader::new(Duration::from_millis(300));
        preloader.sync(true, start);
        assert!(preloader.is_visible());

        preloader.sync(false, start);
        assert!(!preloader.tick(start + Duration::from_millis(299)));
        assert!(preloader.is_visible());
        assert!(preloader.tick(start + Duration::from_millis(300)));
        assert!(!preloader.is_visible());
    }

    #[test]
    fn becoming_busy_again_cancels_pending_hide() {
        let start = Instant::now();
        let mut preloader = Preloader::default();
        preloader.show();
        preloader.hide_after(start);
        preloader.sync(true, start + Duration::from_millis(100));
        assert!(!preloader.tick(start + Duration::from_secs(5)));
        assert!(preloader.is_visible());
    }

    #[test]
    fn repeated_hide_keeps_first_deadline() {
        let start = Instant::now();
        let mut preloader = Preloader::new(Duration::from_millis(300));
        preloader.show();
        preloader.hide_after(start);
        preloader.hide_after(start + Duration::from_millis(200));
        assert!(preloader.tick(start + Duration::from_millis(300)));
    }

    #[test]
    fn hidden_preloader_ignores_hide() {
        let mut preloader = Preloader::default();
        preloader.hide_after(Instant::now());
        assert!(!preloader.tick(Instant::now() + Duration::from_secs(1)));
        assert!(!preloader.is_visible());
    }
}
