use std::ops::Range;

/// Remote tiles shown per page in the demo layout.
pub const DEFAULT_TILES_PER_PAGE: usize = 2;

/// Paged window over the remote tile sequence.
///
/// The pager only keeps the current page index; the tile sequence is
/// passed in on every call so a page is always derived from the latest
/// meeting state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoTilePager {
    page_size: usize,
    page_index: usize,
}

impl Default for VideoTilePager {
    fn default() -> Self {
        Self::new(DEFAULT_TILES_PER_PAGE)
    }
}

impl VideoTilePager {
    /// A page size of zero is treated as one.
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            page_index: 0,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    /// 1-based page number for display.
    pub fn page_label(&self) -> usize {
        self.page_index + 1
    }

    pub fn total_pages(&self, tile_count: usize) -> usize {
        tile_count.div_ceil(self.page_size)
    }

    /// `[index * size, min(len, index * size + size))`, empty past the end.
    pub fn page_bounds(&self, tile_count: usize) -> Range<usize> {
        let start = self.page_index.saturating_mul(self.page_size);
        let end = tile_count.min(start.saturating_add(self.page_size));
        if end < start { tile_count..tile_count } else { start..end }
    }

    pub fn page<'a, T>(&self, tiles: &'a [T]) -> &'a [T] {
        tiles.get(self.page_bounds(tiles.len())).unwrap_or(&[])
    }

    /// Clamp the index after the tile sequence changed length.
    pub fn on_tiles_changed(&mut self, tile_count: usize) {
        let last = self.total_pages(tile_count).saturating_sub(1);
        if self.page_index > last {
            tracing::debug!("page index {} clamped to {last}", self.page_index);
            self.page_index = last;
        }
    }

    /// Returns false (and stays put) on the last page.
    pub fn next(&mut self, tile_count: usize) -> bool {
        if self.page_index + 1 < self.total_pages(tile_count) {
            self.page_index += 1;
            true
        } else {
            false
        }
    }

    /// Returns false (and stays put) on the first page.
    pub fn prev(&mut self) -> bool {
        if self.page_index > 0 {
            self.page_index -= 1;
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.page_index = 0;
    }
}
