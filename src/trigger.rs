pub const DEFAULT_PREFETCH_MARGIN: usize = 40;

/// Binding between the feed's sentinel line and the controller.
///
/// `connected` is toggled around scroll restoration; `enabled` is cleared for good
/// once pagination is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trigger {
    connected: bool,
    enabled: bool,
    margin: usize,
}

impl Default for Trigger {
    fn default() -> Self {
        Self::new(DEFAULT_PREFETCH_MARGIN)
    }
}

impl Trigger {
    pub fn new(margin: usize) -> Self {
        Self {
            connected: false,
            enabled: true,
            margin,
        }
    }

    pub fn connect(&mut self) {
        self.connected = true;
    }

    pub fn disconnect(&mut self) {
        self.connected = false;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn margin(&self) -> usize {
        self.margin
    }

    /// True when the sentinel sits inside the viewport or within `margin` lines below it.
    pub fn should_fire(&self, viewport_bottom: usize, sentinel_line: usize) -> bool {
        self.connected && self.enabled && viewport_bottom.saturating_add(self.margin) >= sentinel_line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_within_margin_only_when_connected() {
        let mut trigger = Trigger::new(10);
        assert!(!trigger.should_fire(100, 105));
        trigger.connect();
        assert!(trigger.should_fire(100, 105));
        assert!(trigger.should_fire(100, 110));
        assert!(!trigger.should_fire(100, 111));
    }

    #[test]
    fn disabled_trigger_never_fires() {
        let mut trigger = Trigger::new(10);
        trigger.connect();
        trigger.disable();
        assert!(!trigger.should_fire(100, 0));
        trigger.disconnect();
        trigger.connect();
        assert!(!trigger.is_enabled());
    }
}
