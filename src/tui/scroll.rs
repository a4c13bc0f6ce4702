//! Feed scroll position: pinned-to-bottom detection and the jump-to-latest affordance.

/// Lines of slack before the view counts as "not at the bottom".
pub const BOTTOM_TOLERANCE: usize = 1;

/// Tracks the feed viewport in rendered lines.
#[derive(Debug, Clone)]
pub struct ScrollTracker {
    /// First visible line.
    offset: usize,
    /// Visible lines.
    viewport: usize,
    /// Total rendered lines.
    content: usize,
    /// Follow new content as it arrives.
    pinned: bool,
}

impl Default for ScrollTracker {
    fn default() -> Self {
        Self {
            offset: 0,
            viewport: 0,
            content: 0,
            pinned: true,
        }
    }
}

impl ScrollTracker {
    pub fn offset(&self) -> usize {
        self.offset
    }

    fn max_offset(&self) -> usize {
        self.content.saturating_sub(self.viewport)
    }

    /// Record the latest layout. A pinned view stays on the newest line.
    pub fn update_layout(&mut self, content: usize, viewport: usize) {
        self.content = content;
        self.viewport = viewport;
        if self.pinned {
            self.offset = self.max_offset();
        } else {
            self.offset = self.offset.min(self.max_offset());
        }
    }

    pub fn is_at_bottom(&self) -> bool {
        self.content.saturating_sub(self.offset) <= self.viewport + BOTTOM_TOLERANCE
    }

    /// Whether the "jump to latest" hint should be shown.
    pub fn show_jump_button(&self) -> bool {
        !self.is_at_bottom()
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.offset = self.offset.saturating_sub(lines);
        self.pinned = self.is_at_bottom();
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.offset = self.offset.saturating_add(lines).min(self.max_offset());
        self.pinned = self.is_at_bottom();
    }

    pub fn scroll_to_top(&mut self) {
        self.offset = 0;
        self.pinned = self.is_at_bottom();
    }

    /// Jump to the newest message and clear the affordance.
    pub fn scroll_to_bottom(&mut self) {
        self.offset = self.max_offset();
        self.pinned = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pinned_view_follows_new_content() {
        let mut s = ScrollTracker::default();
        s.update_layout(50, 10);
        assert_eq!(s.offset(), 40);
        assert!(s.is_at_bottom());

        s.update_layout(60, 10);
        assert_eq!(s.offset(), 50);
        assert!(!s.show_jump_button());
    }

    #[test]
    fn test_scrolled_up_view_stays_put_and_shows_button() {
        let mut s = ScrollTracker::default();
        s.update_layout(50, 10);
        s.scroll_up(5);
        assert_eq!(s.offset(), 35);
        assert!(s.show_jump_button());

        s.update_layout(70, 10);
        assert_eq!(s.offset(), 35);
        assert!(s.show_jump_button());
    }

    #[test]
    fn test_within_tolerance_counts_as_bottom() {
        let mut s = ScrollTracker::default();
        s.update_layout(50, 10);
        s.scroll_up(BOTTOM_TOLERANCE);
        assert!(s.is_at_bottom());
        s.scroll_up(1);
        assert!(!s.is_at_bottom());
    }

    #[test]
    fn test_scroll_to_bottom_clears_button() {
        let mut s = ScrollTracker::default();
        s.update_layout(50, 10);
        s.scroll_to_top();
        assert!(s.show_jump_button());

        s.scroll_to_bottom();
        assert!(!s.show_jump_button());
        s.update_layout(55, 10);
        assert_eq!(s.offset(), 45);
    }

    #[test]
    fn test_scrolling_down_to_end_re_pins() {
        let mut s = ScrollTracker::default();
        s.update_layout(30, 10);
        s.scroll_up(10);
        s.scroll_down(100);
        assert_eq!(s.offset(), 20);
        s.update_layout(35, 10);
        assert_eq!(s.offset(), 25);
    }

    #[test]
    fn test_short_content_never_shows_button() {
        let mut s = ScrollTracker::default();
        s.update_layout(3, 10);
        s.scroll_up(5);
        assert_eq!(s.offset(), 0);
        assert!(!s.show_jump_button());
    }
}
