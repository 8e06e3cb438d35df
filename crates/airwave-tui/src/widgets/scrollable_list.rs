//! Generic scrollable + filterable list widget.

pub struct ScrollableList<T> {
    pub items: Vec<T>,
    pub filtered_indices: Vec<usize>,
    pub selected: usize,
    pub scroll_offset: usize,
    pub filter: String,
    filter_fn: Box<dyn Fn(&T, &str) -> bool + Send + Sync>,
}

impl<T> ScrollableList<T> {
    pub fn new(filter_fn: impl Fn(&T, &str) -> bool + Send + Sync + 'static) -> Self {
        Self {
            items: Vec::new(),
            filtered_indices: Vec::new(),
            selected: 0,
            scroll_offset: 0,
            filter: String::new(),
            filter_fn: Box::new(filter_fn),
        }
    }

    pub fn set_items(&mut self, items: Vec<T>) {
        self.items = items;
        self.rebuild_filter();
    }

    /// Replace the items, keeping the cursor on the item `same` matches.
    pub fn replace_items(&mut self, items: Vec<T>, same: impl Fn(&T, &T) -> bool) {
        let previous = self
            .filtered_indices
            .get(self.selected)
            .and_then(|&i| self.items.get(i))
            .map(|old| items.iter().position(|new| same(old, new)));
        self.set_items(items);
        if let Some(Some(orig)) = previous {
            self.set_selected_by_original(orig);
        }
    }

    pub fn set_filter(&mut self, query: &str) {
        self.filter = query.to_string();
        let old_idx = self.filtered_indices.get(self.selected).copied();
        self.rebuild_filter();
        // Try to keep the same item selected after filter change
        if let Some(prev) = old_idx {
            if let Some(pos) = self.filtered_indices.iter().position(|&i| i == prev) {
                self.selected = pos;
            } else {
                self.selected = 0;
            }
        }
        self.scroll_offset = 0;
    }

    pub fn rebuild_filter(&mut self) {
        if self.filter.is_empty() {
            self.filtered_indices = (0..self.items.len()).collect();
        } else {
            self.filtered_indices = self
                .items
                .iter()
                .enumerate()
                .filter(|(_, item)| (self.filter_fn)(item, &self.filter))
                .map(|(i, _)| i)
                .collect();
        }
        if self.selected >= self.filtered_indices.len() {
            self.selected = self.filtered_indices.len().saturating_sub(1);
        }
    }

    pub fn select_up(&mut self, n: usize) {
        if self.filtered_indices.is_empty() {
            return;
        }
        self.selected = self.selected.saturating_sub(n);
    }

    pub fn select_down(&mut self, n: usize) {
        if self.filtered_indices.is_empty() {
            return;
        }
        self.selected = (self.selected + n).min(self.filtered_indices.len().saturating_sub(1));
    }

    pub fn select_first(&mut self) {
        self.selected = 0;
        self.scroll_offset = 0;
    }

    pub fn select_last(&mut self) {
        self.selected = self.filtered_indices.len().saturating_sub(1);
    }

    pub fn selected_item(&self) -> Option<&T> {
        let idx = self.filtered_indices.get(self.selected)?;
        self.items.get(*idx)
    }

    /// Returns (original_index, &item) pairs visible in `height` rows.
    /// Call ensure_visible first to update scroll_offset.
    pub fn visible_items(&self, height: usize) -> Vec<(usize, &T)> {
        if height == 0 || self.filtered_indices.is_empty() {
            return Vec::new();
        }
        let end = (self.scroll_offset + height).min(self.filtered_indices.len());
        self.filtered_indices[self.scroll_offset..end]
            .iter()
            .map(|&i| (i, &self.items[i]))
            .collect()
    }

    pub fn ensure_visible(&mut self, height: usize) {
        if height == 0 {
            return;
        }
        if self.selected < self.scroll_offset {
            self.scroll_offset = self.selected;
        } else if self.selected >= self.scroll_offset + height {
            self.scroll_offset = self.selected.saturating_sub(height - 1);
        }
    }

    /// Handle a click at `row` within the rendered area.
    /// Returns true if selection changed.
    pub fn handle_click(&mut self, row: usize) -> bool {
        let target = self.scroll_offset + row;
        if target < self.filtered_indices.len() {
            self.selected = target;
            return true;
        }
        false
    }

    pub fn len(&self) -> usize {
        self.filtered_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filtered_indices.is_empty()
    }

    pub fn total_len(&self) -> usize {
        self.items.len()
    }

    pub fn selected_in_view(&self, height: usize) -> usize {
        self.selected
            .saturating_sub(self.scroll_offset)
            .min(height.saturating_sub(1))
    }

    /// Set selection by original item index (not filtered index).
    pub fn set_selected_by_original(&mut self, orig_idx: usize) {
        if let Some(pos) = self.filtered_indices.iter().position(|&i| i == orig_idx) {
            self.selected = pos;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(items: &[&str]) -> ScrollableList<String> {
        let mut l = ScrollableList::new(|s: &String, q: &str| s.contains(q));
        l.set_items(items.iter().map(|s| s.to_string()).collect());
        l
    }

    #[test]
    fn filter_keeps_selection_when_possible() {
        let mut l = list(&["alpha", "beta", "gamma"]);
        l.select_down(2);
        l.set_filter("a");
        assert_eq!(l.selected_item().map(String::as_str), Some("gamma"));
        l.set_filter("bet");
        assert_eq!(l.selected_item().map(String::as_str), Some("beta"));
        l.set_filter("zzz");
        assert!(l.is_empty());
        assert_eq!(l.selected_item(), None);
        assert_eq!(l.total_len(), 3);
    }

    #[test]
    fn scrolling_follows_selection() {
        let mut l = list(&["a", "b", "c", "d", "e", "f"]);
        l.select_down(4);
        l.ensure_visible(3);
        assert_eq!(l.scroll_offset, 2);
        assert_eq!(l.selected_in_view(3), 2);
        let visible: Vec<&String> = l.visible_items(3).into_iter().map(|(_, s)| s).collect();
        assert_eq!(visible, vec!["c", "d", "e"]);
        assert!(l.handle_click(0));
        assert_eq!(l.selected_item().map(String::as_str), Some("c"));
        assert!(!l.handle_click(10));
    }

    #[test]
    fn replacing_items_tracks_the_cursor() {
        let mut l = list(&["a", "b", "c"]);
        l.select_down(1);
        l.replace_items(
            vec!["z".into(), "a".into(), "b".into(), "c".into()],
            |old, new| old == new,
        );
        assert_eq!(l.selected_item().map(String::as_str), Some("b"));

        l.replace_items(vec!["x".into()], |old, new| old == new);
        assert_eq!(l.selected_item().map(String::as_str), Some("x"));
    }
}
