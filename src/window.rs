//! Virtual windowing for long lists: decide which rows to actually render
//! given the scroll position, so render cost does not grow with the
//! collection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

/// Collections at or below this size are rendered in full.
pub const DEFAULT_THRESHOLD: usize = 50;
pub const DEFAULT_OVERSCAN: usize = 5;

/// Named row densities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Density {
    Compact,
    #[default]
    Comfortable,
    Spacious,
}

impl Density {
    pub const ALL: [Density; 3] = [Density::Compact, Density::Comfortable, Density::Spacious];

    /// Row height in pixels.
    pub fn row_height(self) -> u32 {
        match self {
            Self::Compact => 40,
            Self::Comfortable => 56,
            Self::Spacious => 72,
        }
    }

    /// Row height in terminal lines.
    pub fn terminal_rows(self) -> u32 {
        match self {
            Self::Compact => 1,
            Self::Comfortable => 2,
            Self::Spacious => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Comfortable => "comfortable",
            Self::Spacious => "spacious",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Self::Compact => Self::Comfortable,
            Self::Comfortable => Self::Spacious,
            Self::Spacious => Self::Compact,
        }
    }
}

impl fmt::Display for Density {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Density {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Density::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown density '{s}' (expected compact, comfortable, spacious)"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowConfig {
    pub threshold: usize,
    pub overscan: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            overscan: DEFAULT_OVERSCAN,
        }
    }
}

/// The slice of rows to mount and where to place it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowRange {
    pub start_index: usize,
    pub end_index: usize,
    /// Offset applied to the rendered block: `start_index * row_height`.
    pub vertical_offset: u64,
    /// Height of the whole scrollable content, mounted or not.
    pub total_height: u64,
}

impl WindowRange {
    pub fn len(&self) -> usize {
        self.end_index - self.start_index
    }

    pub fn is_empty(&self) -> bool {
        self.start_index == self.end_index
    }

    pub fn indices(&self) -> Range<usize> {
        self.start_index..self.end_index
    }

    pub fn contains(&self, index: usize) -> bool {
        self.indices().contains(&index)
    }
}

/// Fixed-row-height window over `item_count` rows. All units are the same
/// (pixels or terminal lines); only the ratios matter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualWindow {
    item_count: usize,
    row_height: u32,
    viewport_height: u32,
    scroll_offset: u64,
    config: WindowConfig,
}

impl VirtualWindow {
    pub fn new(item_count: usize, row_height: u32, config: WindowConfig) -> Self {
        Self {
            item_count,
            row_height: row_height.max(1),
            viewport_height: 0,
            scroll_offset: 0,
            config,
        }
    }

    #[must_use]
    pub fn with_viewport(mut self, viewport_height: u32) -> Self {
        self.viewport_height = viewport_height;
        self
    }

    #[must_use]
    pub fn with_scroll(mut self, scroll_offset: u64) -> Self {
        self.scroll_offset = scroll_offset;
        self
    }

    pub fn item_count(&self) -> usize {
        self.item_count
    }

    pub fn row_height(&self) -> u32 {
        self.row_height
    }

    pub fn viewport_height(&self) -> u32 {
        self.viewport_height
    }

    pub fn scroll_offset(&self) -> u64 {
        self.scroll_offset
    }

    pub fn set_item_count(&mut self, item_count: usize) {
        self.item_count = item_count;
        self.scroll_offset = self.scroll_offset.min(self.max_scroll());
    }

    pub fn set_row_height(&mut self, row_height: u32) {
        self.row_height = row_height.max(1);
        self.scroll_offset = self.scroll_offset.min(self.max_scroll());
    }

    /// Container resize.
    pub fn set_viewport_height(&mut self, viewport_height: u32) {
        self.viewport_height = viewport_height;
        self.scroll_offset = self.scroll_offset.min(self.max_scroll());
    }

    pub fn set_scroll_offset(&mut self, scroll_offset: u64) {
        self.scroll_offset = scroll_offset.min(self.max_scroll());
    }

    pub fn scroll_by(&mut self, delta: i64) {
        let next = if delta.is_negative() {
            self.scroll_offset.saturating_sub(delta.unsigned_abs())
        } else {
            self.scroll_offset.saturating_add(delta.unsigned_abs())
        };
        self.set_scroll_offset(next);
    }

    /// Scroll the minimum amount that brings row `index` fully into view.
    pub fn scroll_to_index(&mut self, index: usize) {
        let h = u64::from(self.row_height);
        let top = index as u64 * h;
        let bottom = top + h;
        let viewport = u64::from(self.viewport_height);
        if top < self.scroll_offset {
            self.set_scroll_offset(top);
        } else if bottom > self.scroll_offset + viewport {
            self.set_scroll_offset(bottom.saturating_sub(viewport));
        }
    }

    pub fn total_height(&self) -> u64 {
        self.item_count as u64 * u64::from(self.row_height)
    }

    pub fn max_scroll(&self) -> u64 {
        self.total_height().saturating_sub(u64::from(self.viewport_height))
    }

    /// Whether the collection is large enough to be windowed at all.
    pub fn is_windowed(&self) -> bool {
        self.item_count > self.config.threshold
    }

    /// Rows that intersect the viewport, without overscan.
    pub fn visible_range(&self) -> Range<usize> {
        let h = u64::from(self.row_height);
        let s = self.scroll_offset.min(self.max_scroll());
        let first = (s / h) as usize;
        let end = (s + u64::from(self.viewport_height)).div_ceil(h) as usize;
        first.min(self.item_count)..end.min(self.item_count)
    }

    /// The rows to render. Pure arithmetic; cheap enough to run on every
    /// scroll tick.
    pub fn range(&self) -> WindowRange {
        let n = self.item_count;
        let h = u64::from(self.row_height);
        let total_height = self.total_height();

        if !self.is_windowed() {
            return WindowRange {
                start_index: 0,
                end_index: n,
                vertical_offset: 0,
                total_height,
            };
        }

        let viewport = u64::from(self.viewport_height);
        let s = self.scroll_offset.min(self.max_scroll());
        let overscan = self.config.overscan;
        let rows_in_view = viewport.div_ceil(h) as usize;

        let start_index = ((s / h) as usize).saturating_sub(overscan).min(n);
        let mut end_index = (start_index + rows_in_view + 2 * overscan).min(n);
        // A viewport that starts mid-row can touch one more row than it holds.
        let last_touched = ((s + viewport).div_ceil(h) as usize).min(n);
        end_index = end_index.max(last_touched);

        WindowRange {
            start_index,
            end_index,
            vertical_offset: start_index as u64 * h,
            total_height,
        }
    }
}

/// Selection tracked by entity id, never by render position, so it survives
/// scrolling, filtering and re-sorting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    id: Option<String>,
}

impl Selection {
    pub fn select(&mut self, id: &str) {
        self.id = Some(id.to_string());
    }

    pub fn clear(&mut self) {
        self.id = None;
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.id.as_deref() == Some(id)
    }

    /// Where the selected entity currently sits among `ids`.
    pub fn position_in<'a, I>(&self, ids: I) -> Option<usize>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let selected = self.id.as_deref()?;
        ids.into_iter().position(|id| id == selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(n: usize, h: u32, v: u32, s: u64) -> VirtualWindow {
        VirtualWindow::new(n, h, WindowConfig::default())
            .with_viewport(v)
            .with_scroll(s)
    }

    #[test]
    fn sixty_rows_at_top_render_about_twenty() {
        let range = window(60, 56, 600, 0).range();
        assert_eq!(range.start_index, 0);
        assert_eq!(range.end_index, 21);
        assert_eq!(range.vertical_offset, 0);
        assert_eq!(range.total_height, 60 * 56);
    }

    #[test]
    fn small_lists_render_in_full() {
        let range = window(50, 56, 600, 400).range();
        assert_eq!(range.indices(), 0..50);
        assert_eq!(range.vertical_offset, 0);
        assert!(!window(50, 56, 600, 0).is_windowed());
        assert!(window(51, 56, 600, 0).is_windowed());
    }

    #[test]
    fn scrolled_window_applies_overscan_and_offset() {
        let range = window(1000, 56, 600, 56 * 100).range();
        assert_eq!(range.start_index, 95);
        assert_eq!(range.end_index, 95 + 11 + 10);
        assert_eq!(range.vertical_offset, 95 * 56);
        assert_eq!(range.total_height, 56_000);
    }

    #[test]
    fn scroll_past_end_is_clamped() {
        let w = window(100, 10, 100, 1_000_000);
        let range = w.range();
        assert_eq!(range.end_index, 100);
        assert!(range.start_index <= range.end_index);
        assert!(range.contains(99));
    }

    #[test]
    fn covers_every_visible_row_within_bound() {
        for &(n, h, v) in &[(60usize, 56u32, 600u32), (500, 40, 333), (75, 72, 1), (200, 7, 100), (80, 30, 0)] {
            for overscan in [0usize, 1, 5] {
                let config = WindowConfig { threshold: 50, overscan };
                let total = n as u64 * u64::from(h);
                let mut s = 0;
                while s <= total {
                    let w = VirtualWindow::new(n, h, config).with_viewport(v).with_scroll(s);
                    let range = w.range();
                    let clamped = s.min(w.max_scroll());
                    for i in 0..n {
                        let top = i as u64 * u64::from(h);
                        let bottom = top + u64::from(h);
                        if top < clamped + u64::from(v) && bottom > clamped {
                            assert!(range.contains(i), "row {i} missing for n={n} h={h} v={v} s={s} o={overscan}");
                        }
                    }
                    let bound = (u64::from(v).div_ceil(u64::from(h))) as usize + 2 * overscan + 1;
                    assert!(range.len() <= bound, "window too large: {} > {bound}", range.len());
                    s += 13;
                }
            }
        }
    }

    #[test]
    fn scroll_to_index_keeps_row_visible() {
        let mut w = window(200, 2, 20, 0);
        w.scroll_to_index(50);
        assert!(w.visible_range().contains(&50));
        w.scroll_to_index(3);
        assert_eq!(w.scroll_offset(), 6);
        w.scroll_by(-100);
        assert_eq!(w.scroll_offset(), 0);
    }

    #[test]
    fn selection_follows_id_not_slot() {
        let mut selection = Selection::default();
        selection.select("b");
        assert_eq!(selection.position_in(["a", "b", "c"]), Some(1));
        assert_eq!(selection.position_in(["c", "b"]), Some(1));
        assert_eq!(selection.position_in(["b", "a"]), Some(0));
        assert_eq!(selection.position_in(["a"]), None);
        selection.clear();
        assert_eq!(selection.position_in(["a", "b"]), None);
    }

    #[test]
    fn densities_map_to_distinct_heights() {
        let heights: Vec<u32> = Density::ALL.iter().map(|d| d.row_height()).collect();
        assert_eq!(heights, vec![40, 56, 72]);
        assert_eq!("Compact".parse::<Density>(), Ok(Density::Compact));
    }
}
