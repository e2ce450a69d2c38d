use std::ops::Range;

/// Scroll-window math for a fixed-item-height virtual list.
///
/// Tracks item count, viewport height, and scroll offset, and answers which
/// slice of the list should actually exist on screen. A small buffer on each
/// side of the viewport avoids pop-in during fast scrolls.
#[derive(Debug, Clone)]
pub struct VirtualList {
    item_height: f32,
    viewport_height: f32,
    buffer_items: usize,
    scroll_offset: f32,
    count: usize,
}

impl VirtualList {
    pub fn new(item_height: f32, viewport_height: f32, buffer_items: usize) -> Self {
        Self {
            item_height: item_height.max(1.0),
            viewport_height: viewport_height.max(0.0),
            buffer_items,
            scroll_offset: 0.0,
            count: 0,
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn scroll_offset(&self) -> f32 {
        self.scroll_offset
    }

    pub fn total_height(&self) -> f32 {
        self.count as f32 * self.item_height
    }

    fn max_scroll(&self) -> f32 {
        (self.total_height() - self.viewport_height).max(0.0)
    }

    /// Update the item count after an insert or removal, clamping the scroll
    /// position to the new extent.
    pub fn set_count(&mut self, count: usize) {
        self.count = count;
        self.scroll_offset = self.scroll_offset.clamp(0.0, self.max_scroll());
    }

    /// New notifications enter at the head; surface them by scrolling to the
    /// top.
    pub fn scroll_to_top(&mut self) {
        self.scroll_offset = 0.0;
    }

    pub fn set_scroll_offset(&mut self, offset: f32) {
        self.scroll_offset = offset.clamp(0.0, self.max_scroll());
    }

    pub fn set_viewport_height(&mut self, height: f32) {
        self.viewport_height = height.max(0.0);
        self.scroll_offset = self.scroll_offset.clamp(0.0, self.max_scroll());
    }

    /// The `[start, end)` slice to render, including the buffer.
    pub fn visible_range(&self) -> Range<usize> {
        if self.count == 0 {
            return 0..0;
        }
        let first_visible = (self.scroll_offset / self.item_height).floor() as usize;
        let visible_count =
            (self.viewport_height / self.item_height).ceil() as usize + 1;

        let start = first_visible.saturating_sub(self.buffer_items);
        let end = (first_visible + visible_count + self.buffer_items).min(self.count);
        start..end
    }

    /// Offset transform positioning the rendered slice: `start × item_height`.
    pub fn slice_offset(&self) -> f32 {
        self.visible_range().start as f32 * self.item_height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(count: usize) -> VirtualList {
        // 10 items fit the viewport exactly
        let mut list = VirtualList::new(50.0, 500.0, 2);
        list.set_count(count);
        list
    }

    #[test]
    fn test_empty_list() {
        let list = list(0);
        assert_eq!(list.visible_range(), 0..0);
        assert_eq!(list.total_height(), 0.0);
        assert_eq!(list.slice_offset(), 0.0);
    }

    #[test]
    fn test_range_at_top() {
        let list = list(100);
        let range = list.visible_range();
        assert_eq!(range.start, 0);
        // 10 visible + 1 partial + 2 buffer below
        assert_eq!(range.end, 13);
        assert_eq!(list.slice_offset(), 0.0);
    }

    #[test]
    fn test_range_mid_scroll_includes_buffer() {
        let mut list = list(100);
        list.set_scroll_offset(1000.0); // first fully visible item = 20

        let range = list.visible_range();
        assert_eq!(range.start, 18);
        assert_eq!(range.end, 33);
        assert_eq!(list.slice_offset(), 18.0 * 50.0);
    }

    #[test]
    fn test_range_clamped_at_bottom() {
        let mut list = list(100);
        list.set_scroll_offset(f32::MAX);

        assert_eq!(list.scroll_offset(), 100.0 * 50.0 - 500.0);
        let range = list.visible_range();
        assert_eq!(range.end, 100);
        assert!(range.start <= 88);
    }

    #[test]
    fn test_scroll_never_negative() {
        let mut list = list(100);
        list.set_scroll_offset(-200.0);
        assert_eq!(list.scroll_offset(), 0.0);
    }

    #[test]
    fn test_count_shrink_clamps_scroll() {
        let mut list = list(100);
        list.set_scroll_offset(4000.0);
        list.set_count(20);

        // 20 items × 50px - 500px viewport = 500px max scroll
        assert_eq!(list.scroll_offset(), 500.0);
        assert_eq!(list.visible_range().end, 20);
    }

    #[test]
    fn test_content_shorter_than_viewport() {
        let mut list = list(3);
        list.set_scroll_offset(250.0);
        assert_eq!(list.scroll_offset(), 0.0);
        assert_eq!(list.visible_range(), 0..3);
    }

    #[test]
    fn test_resize_recomputes_range() {
        let mut list = list(100);
        list.set_viewport_height(200.0);
        let range = list.visible_range();
        // 4 visible + 1 partial + 2 buffer
        assert_eq!(range.end, 7);
    }

    #[test]
    fn test_scroll_to_top_surfaces_head() {
        let mut list = list(100);
        list.set_scroll_offset(2000.0);
        list.scroll_to_top();
        assert_eq!(list.visible_range().start, 0);
    }
}
