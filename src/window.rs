//! Selection and visible-window bookkeeping over the flattened group list.
//!
//! Invariant whenever `total > 0`:
//! `start <= selected < total` and `selected < start + window_size`.
//! With `total == 0` both indices are 0 and every move is a no-op.

use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motion {
    Up,
    Down,
    PageUp,
    PageDown,
    Top,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowState {
    selected: usize,
    start: usize,
    window_size: usize,
}

impl WindowState {
    pub fn new(window_size: usize) -> Self {
        Self {
            selected: 0,
            start: 0,
            window_size: window_size.max(1),
        }
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Indices of the rows currently on screen.
    pub fn visible_range(&self, total: usize) -> Range<usize> {
        let end = self.start.saturating_add(self.window_size).min(total);
        self.start.min(end)..end
    }

    pub fn apply(&mut self, motion: Motion, total: usize) {
        match motion {
            Motion::Up => self.up(total),
            Motion::Down => self.down(total),
            Motion::PageUp => self.page_up(total),
            Motion::PageDown => self.page_down(total),
            Motion::Top => self.top(total),
            Motion::Bottom => self.bottom(total),
        }
    }

    pub fn up(&mut self, total: usize) {
        if total == 0 {
            return;
        }
        self.selected = self.selected.saturating_sub(1);
        self.follow_selection();
    }

    pub fn down(&mut self, total: usize) {
        if total == 0 {
            return;
        }
        self.selected = (self.selected + 1).min(total - 1);
        self.follow_selection();
    }

    pub fn page_up(&mut self, total: usize) {
        if total == 0 {
            return;
        }
        self.selected = self.selected.saturating_sub(self.window_size);
        self.start = self.start.saturating_sub(self.window_size);
        self.follow_selection();
    }

    pub fn page_down(&mut self, total: usize) {
        if total == 0 {
            return;
        }
        let max_start = total.saturating_sub(self.window_size);
        self.selected = self.selected.saturating_add(self.window_size).min(total - 1);
        self.start = self.start.saturating_add(self.window_size).min(max_start);
        self.follow_selection();
    }

    pub fn top(&mut self, total: usize) {
        if total == 0 {
            return;
        }
        self.selected = 0;
        self.start = 0;
    }

    pub fn bottom(&mut self, total: usize) {
        if total == 0 {
            return;
        }
        self.selected = total - 1;
        self.start = total.saturating_sub(self.window_size);
    }

    /// Change the window height (terminal resize) and re-clamp.
    pub fn resize(&mut self, window_size: usize, total: usize) {
        self.window_size = window_size.max(1);
        self.clamp(total);
    }

    /// Re-establish the invariant after the list changed length. `start` only
    /// moves when `selected` no longer fits.
    pub fn clamp(&mut self, total: usize) {
        if total == 0 {
            self.selected = 0;
            self.start = 0;
            return;
        }
        self.selected = self.selected.min(total - 1);
        self.start = self.start.min(self.selected);
        self.follow_selection();
    }

    /// Put `selected` on a specific row (e.g. a group header after a toggle).
    pub fn select(&mut self, index: usize, total: usize) {
        if total == 0 {
            return;
        }
        self.selected = index.min(total - 1);
        self.follow_selection();
    }

    /// Scroll just enough to keep `selected` inside the window, at the near
    /// edge.
    fn follow_selection(&mut self) {
        if self.selected < self.start {
            self.start = self.selected;
        } else if self.selected >= self.start.saturating_add(self.window_size) {
            self.start = self.selected + 1 - self.window_size;
        }
    }

    #[cfg(test)]
    fn holds_invariant(&self, total: usize) -> bool {
        if total == 0 {
            return self.selected == 0 && self.start == 0;
        }
        self.start <= self.selected
            && self.selected < total
            && self.selected < self.start.saturating_add(self.window_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn down_scrolls_at_near_edge() {
        let mut w = WindowState::new(3);
        for _ in 0..3 {
            w.down(10);
        }
        assert_eq!(w.selected(), 3);
        assert_eq!(w.start(), 1);
        w.up(10);
        w.up(10);
        assert_eq!(w.selected(), 1);
        assert_eq!(w.start(), 1);
        w.up(10);
        assert_eq!((w.selected(), w.start()), (0, 0));
    }

    #[test]
    fn page_moves_shift_both_indices() {
        let mut w = WindowState::new(4);
        w.down(10);
        w.page_down(10);
        assert_eq!((w.selected(), w.start()), (5, 4));
        w.page_down(10);
        assert_eq!((w.selected(), w.start()), (9, 6));
        w.page_up(10);
        assert_eq!((w.selected(), w.start()), (5, 2));
    }

    #[test]
    fn top_and_bottom() {
        let mut w = WindowState::new(4);
        w.bottom(10);
        assert_eq!((w.selected(), w.start()), (9, 6));
        w.top(10);
        assert_eq!((w.selected(), w.start()), (0, 0));
    }

    #[test]
    fn shrink_keeps_start_when_selection_fits() {
        let mut w = WindowState::new(5);
        w.select(6, 20);
        assert_eq!((w.selected(), w.start()), (6, 2));
        w.clamp(8);
        assert_eq!((w.selected(), w.start()), (6, 2));
        w.clamp(4);
        assert_eq!((w.selected(), w.start()), (3, 2));
    }

    #[test]
    fn empty_list_is_noop() {
        let mut w = WindowState::new(5);
        for motion in [
            Motion::Up,
            Motion::Down,
            Motion::PageUp,
            Motion::PageDown,
            Motion::Top,
            Motion::Bottom,
        ] {
            w.apply(motion, 0);
            assert!(w.holds_invariant(0));
        }
        assert_eq!(w.visible_range(0), 0..0);
    }

    #[test]
    fn single_element_list() {
        let mut w = WindowState::new(5);
        for motion in [Motion::Down, Motion::PageDown, Motion::Bottom, Motion::Up] {
            w.apply(motion, 1);
            assert_eq!((w.selected(), w.start()), (0, 0));
        }
    }

    #[test]
    fn huge_window_does_not_overflow() {
        let mut w = WindowState::new(usize::MAX);
        w.select(7, 10);
        for motion in [Motion::PageDown, Motion::Down, Motion::PageUp, Motion::Bottom] {
            w.apply(motion, 10);
            assert!(w.holds_invariant(10));
        }
        assert_eq!(w.visible_range(10), 0..10);

        w.resize(3, 10);
        w.resize(usize::MAX, 10);
        assert_eq!((w.selected(), w.start()), (9, 7));
        assert_eq!(w.visible_range(10), 7..10);
    }

    #[test]
    fn resize_smaller_pulls_start_forward() {
        let mut w = WindowState::new(10);
        w.select(8, 20);
        assert_eq!(w.start(), 0);
        w.resize(3, 20);
        assert_eq!((w.selected(), w.start()), (8, 6));
        assert_eq!(w.visible_range(20), 6..9);
    }

    #[test]
    fn invariant_over_operation_sequences() {
        // Deterministic pseudo-random walk over moves, resizes and shrinks.
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = move || {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            seed
        };
        for _ in 0..50 {
            let mut total = usize::try_from(next() % 40).unwrap();
            let mut w = WindowState::new(usize::try_from(next() % 8).unwrap() + 1);
            for _ in 0..200 {
                match next() % 9 {
                    0 => w.up(total),
                    1 => w.down(total),
                    2 => w.page_up(total),
                    3 => w.page_down(total),
                    4 => w.top(total),
                    5 => w.bottom(total),
                    6 => w.resize(usize::try_from(next() % 12).unwrap(), total),
                    7 => {
                        total = total.saturating_sub(usize::try_from(next() % 3).unwrap());
                        w.clamp(total);
                    }
                    _ => {
                        total += usize::try_from(next() % 3).unwrap();
                        w.clamp(total);
                    }
                }
                assert!(w.holds_invariant(total), "{w:?} total={total}");
            }
        }
    }
}
