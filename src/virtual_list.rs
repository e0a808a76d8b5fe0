//! Row virtualization for fixed-height rows.
//!
//! Only the rows intersecting the viewport (plus `overscroll` rows on each
//! side) are produced. The first candidate row is derived from the scroll
//! offset, so the work per frame is proportional to the window size and not
//! to the number of rows.

use std::collections::HashMap;
use std::hash::Hash;
use std::ops::Range;

/// Stable identity of a list item, used as the mount key of its row.
pub trait VirtualItem {
    type Key: Clone + Eq + Hash;

    fn key(&self) -> Self::Key;
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WindowParams {
    pub scroll_top: f64,
    pub row_height: f64,
    pub viewport_height: f64,
    pub item_count: usize,
    pub overscroll: usize,
}

/// Half-open range of rows to mount.
pub fn compute_window(params: WindowParams) -> Range<usize> {
    let WindowParams {
        scroll_top,
        row_height,
        viewport_height,
        item_count,
        overscroll,
    } = params;

    if item_count == 0 || !(row_height > 0.0) || !scroll_top.is_finite() {
        return 0..0;
    }

    let overscroll_px = overscroll as f64 * row_height;
    let total_height = item_count as f64 * row_height;
    let viewport_height = viewport_height.max(0.0);
    let top = (scroll_top - overscroll_px).max(0.0);
    let bottom = (scroll_top + viewport_height + overscroll_px).min(total_height);

    let first = (scroll_top / row_height).floor() as i64 - overscroll as i64;
    let start = first.max(0) as usize;
    // One extra row covers a viewport edge that falls in the middle of a row.
    let budget = ((viewport_height + 2.0 * overscroll_px) / row_height).ceil() as usize + 1;

    let mut window: Option<Range<usize>> = None;
    let mut index = start;
    let mut visited = 0;
    while index < item_count && visited < budget {
        let row_top = index as f64 * row_height;
        let row_bottom = row_top + row_height;
        if row_top >= bottom {
            break;
        }
        if row_bottom > top {
            match window.as_mut() {
                Some(range) => range.end = index + 1,
                None => window = Some(index..index + 1),
            }
            visited += 1;
        }
        index += 1;
    }

    window.unwrap_or(0..0)
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RowStyle {
    pub top: f64,
    pub height: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VirtualizedRow<K, R> {
    pub index: usize,
    pub key: K,
    pub style: RowStyle,
    pub node: R,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScrollAnchor {
    /// Row top aligned with the viewport top.
    Top,
    Center,
    /// Center the row unless it is already fully visible.
    CenterIfOutside,
    /// Scroll as little as possible to bring the row fully into view.
    #[default]
    Auto,
}

/// Scroll state plus a per-index cache of rendered rows.
///
/// Cached renders survive scrolling and are only dropped by
/// [`VirtualizedList::clear_cache`] (resize, data change).
#[derive(Debug)]
pub struct VirtualizedList<K, R> {
    row_height: f64,
    overscroll: usize,
    scroll_top: f64,
    viewport_height: f64,
    item_count: usize,
    cache: HashMap<usize, VirtualizedRow<K, R>>,
}

impl<K: Clone, R: Clone> VirtualizedList<K, R> {
    pub fn new(row_height: f64, overscroll: usize) -> Self {
        Self {
            row_height,
            overscroll,
            scroll_top: 0.0,
            viewport_height: 0.0,
            item_count: 0,
            cache: HashMap::new(),
        }
    }

    pub fn row_height(&self) -> f64 {
        self.row_height
    }

    pub fn scroll_top(&self) -> f64 {
        self.scroll_top
    }

    pub fn viewport_height(&self) -> f64 {
        self.viewport_height
    }

    pub fn item_count(&self) -> usize {
        self.item_count
    }

    pub fn total_height(&self) -> f64 {
        self.item_count as f64 * self.row_height
    }

    pub fn max_scroll_top(&self) -> f64 {
        (self.total_height() - self.viewport_height).max(0.0)
    }

    pub fn set_item_count(&mut self, item_count: usize) {
        if self.item_count != item_count {
            self.item_count = item_count;
            self.cache.clear();
            self.scroll_top = self.scroll_top.min(self.max_scroll_top());
        }
    }

    pub fn set_viewport_height(&mut self, viewport_height: f64) {
        let viewport_height = viewport_height.max(0.0);
        if self.viewport_height != viewport_height {
            self.viewport_height = viewport_height;
            self.cache.clear();
            self.scroll_top = self.scroll_top.min(self.max_scroll_top());
        }
    }

    /// Returns the clamped scroll offset.
    pub fn set_scroll_top(&mut self, scroll_top: f64) -> f64 {
        if scroll_top.is_finite() {
            self.scroll_top = scroll_top.clamp(0.0, self.max_scroll_top());
        }
        self.scroll_top
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    pub fn cached_rows(&self) -> usize {
        self.cache.len()
    }

    pub fn window(&self) -> Range<usize> {
        compute_window(WindowParams {
            scroll_top: self.scroll_top,
            row_height: self.row_height,
            viewport_height: self.viewport_height,
            item_count: self.item_count,
            overscroll: self.overscroll,
        })
    }

    /// Rows to mount for the current scroll position. `render` runs only for
    /// indices without a cached render.
    pub fn rows<I>(
        &mut self,
        items: &[I],
        mut render: impl FnMut(usize, &I) -> R,
    ) -> Vec<VirtualizedRow<K, R>>
    where
        I: VirtualItem<Key = K>,
    {
        let _span = tracing::trace_span!("virtualize", items = items.len()).entered();
        self.set_item_count(items.len());

        let row_height = self.row_height;
        let window = self.window();
        let mut rows = Vec::with_capacity(window.len());
        for index in window {
            let item = &items[index];
            let row = self.cache.entry(index).or_insert_with(|| VirtualizedRow {
                index,
                key: item.key(),
                style: RowStyle {
                    top: index as f64 * row_height,
                    height: row_height,
                },
                node: render(index, item),
            });
            rows.push(row.clone());
        }
        rows
    }

    /// Moves the scroll offset so row `index` is placed according to `anchor`.
    /// Returns the new scroll offset.
    pub fn scroll_to_row(&mut self, index: usize, anchor: ScrollAnchor) -> f64 {
        if self.item_count == 0 {
            return self.scroll_top;
        }
        let index = index.min(self.item_count - 1);
        let row_top = index as f64 * self.row_height;
        let row_bottom = row_top + self.row_height;
        let view_top = self.scroll_top;
        let view_bottom = view_top + self.viewport_height;
        let centered = row_top - (self.viewport_height - self.row_height) / 2.0;

        let target = match anchor {
            ScrollAnchor::Top => row_top,
            ScrollAnchor::Center => centered,
            ScrollAnchor::CenterIfOutside => {
                if row_top >= view_top && row_bottom <= view_bottom {
                    view_top
                } else {
                    centered
                }
            }
            ScrollAnchor::Auto => {
                if row_top < view_top {
                    row_top
                } else if row_bottom > view_bottom {
                    row_bottom - self.viewport_height
                } else {
                    view_top
                }
            }
        };
        self.set_scroll_top(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(
        scroll_top: f64,
        viewport_height: f64,
        item_count: usize,
        overscroll: usize,
    ) -> WindowParams {
        WindowParams {
            scroll_top,
            row_height: 10.0,
            viewport_height,
            item_count,
            overscroll,
        }
    }

    #[test]
    fn window_includes_overscroll() {
        assert_eq!(compute_window(params(0.0, 30.0, 100, 2)), 0..5);
        assert_eq!(compute_window(params(100.0, 30.0, 100, 2)), 8..15);
        assert_eq!(compute_window(params(970.0, 30.0, 100, 2)), 95..100);
    }

    #[test]
    fn window_handles_edges_mid_row() {
        assert_eq!(compute_window(params(5.0, 10.0, 100, 0)), 0..2);
        assert_eq!(compute_window(params(25.0, 10.0, 100, 1)), 1..5);
    }

    #[test]
    fn empty_and_degenerate_inputs() {
        assert_eq!(compute_window(params(0.0, 30.0, 0, 2)), 0..0);
        let mut p = params(0.0, 30.0, 10, 2);
        p.row_height = 0.0;
        assert_eq!(compute_window(p), 0..0);
    }

    fn check_window(scroll_top: f64, viewport: f64, item_count: usize, overscroll: usize) {
        let range = compute_window(params(scroll_top, viewport, item_count, overscroll));
        let over = overscroll as f64 * 10.0;
        for index in 0..item_count {
            let top = index as f64 * 10.0;
            let bottom = top + 10.0;
            if top < scroll_top + viewport && bottom > scroll_top {
                assert!(range.contains(&index), "{index} missing at {scroll_top}");
            }
            if bottom <= scroll_top - over || top >= scroll_top + viewport + over {
                assert!(!range.contains(&index), "{index} included at {scroll_top}");
            }
        }
    }

    #[test]
    fn window_covers_viewport_and_nothing_far_outside() {
        for item_count in [1usize, 7, 50, 333] {
            for overscroll in [0usize, 1, 3] {
                for viewport in [0.0, 9.0, 10.0, 35.0, 120.0] {
                    let mut scroll_top = 0.0;
                    while scroll_top < item_count as f64 * 10.0 + 20.0 {
                        check_window(scroll_top, viewport, item_count, overscroll);
                        scroll_top += 3.5;
                    }
                }
            }
        }
    }

    #[derive(Clone)]
    struct Item(u32);

    impl VirtualItem for Item {
        type Key = u32;

        fn key(&self) -> u32 {
            self.0
        }
    }

    #[test]
    fn renders_are_cached_by_index() {
        let items: Vec<Item> = (0..100).map(Item).collect();
        let mut list = VirtualizedList::new(10.0, 1);
        list.set_viewport_height(30.0);

        let mut renders = 0;
        let rows = list.rows(&items, |index, _| {
            renders += 1;
            index * 2
        });
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[2].node, 4);
        assert_eq!(rows[2].style.top, 20.0);
        let first_pass = renders;

        list.set_scroll_top(200.0);
        list.rows(&items, |_, _| {
            renders += 1;
            0
        });
        let second_pass = renders;
        list.set_scroll_top(0.0);
        list.rows(&items, |_, _| {
            renders += 1;
            0
        });
        assert!(second_pass > first_pass);
        assert_eq!(renders, second_pass);

        list.clear_cache();
        assert_eq!(list.cached_rows(), 0);
    }

    #[test]
    fn scroll_to_row_anchors() {
        let mut list: VirtualizedList<u32, ()> = VirtualizedList::new(10.0, 0);
        list.set_item_count(100);
        list.set_viewport_height(50.0);

        assert_eq!(list.scroll_to_row(20, ScrollAnchor::Top), 200.0);
        assert_eq!(list.scroll_to_row(20, ScrollAnchor::Center), 180.0);

        // Already visible: no movement.
        assert_eq!(list.scroll_to_row(21, ScrollAnchor::CenterIfOutside), 180.0);
        assert_eq!(list.scroll_to_row(60, ScrollAnchor::CenterIfOutside), 580.0);

        // Auto scrolls minimally in either direction.
        assert_eq!(list.scroll_to_row(70, ScrollAnchor::Auto), 660.0);
        assert_eq!(list.scroll_to_row(50, ScrollAnchor::Auto), 500.0);
        assert_eq!(list.scroll_to_row(52, ScrollAnchor::Auto), 500.0);

        // Clamped at both ends.
        assert_eq!(list.scroll_to_row(0, ScrollAnchor::Center), 0.0);
        assert_eq!(list.scroll_to_row(99, ScrollAnchor::Top), 950.0);
    }
}
