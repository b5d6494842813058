use std::cmp::Reverse;

use retro_types::models::RetroItem;

/// Most-voted first; ties go to whichever was written earlier.
pub fn order_for_discussion(mut items: Vec<RetroItem>) -> Vec<RetroItem> {
    items.sort_by_key(|item| (Reverse(item.votes), item.created_at));
    items
}

/// Steps through items during the discussion phase. Movement stops at either
/// end instead of wrapping.
#[derive(Debug, Clone)]
pub struct DiscussionCursor {
    items: Vec<RetroItem>,
    index: usize,
}

impl DiscussionCursor {
    pub fn new(items: Vec<RetroItem>) -> Self {
        Self {
            items: order_for_discussion(items),
            index: 0,
        }
    }

    pub fn items(&self) -> &[RetroItem] {
        &self.items
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current(&self) -> Option<&RetroItem> {
        self.items.get(self.index)
    }

    pub fn has_next(&self) -> bool {
        self.index + 1 < self.items.len()
    }

    pub fn has_previous(&self) -> bool {
        self.index > 0
    }

    pub fn next(&mut self) -> Option<&RetroItem> {
        if self.has_next() {
            self.index += 1;
        }
        self.current()
    }

    pub fn previous(&mut self) -> Option<&RetroItem> {
        if self.has_previous() {
            self.index -= 1;
        }
        self.current()
    }

    /// Jump to `index`, clamped to the last item.
    pub fn seek(&mut self, index: usize) -> Option<&RetroItem> {
        self.index = index.min(self.items.len().saturating_sub(1));
        self.current()
    }

    pub fn into_items(self) -> Vec<RetroItem> {
        self.items
    }
}
