//! Per-pixel event history and the background-activity timestamp map.
//!
//! The reference implementation this crate descends from keeps each pixel's
//! history as a small linked list, shifting every entry down by one slot on
//! every insert (O(K) per event). That's needless work for a fixed K=3: a
//! per-cell head index over fixed-size storage gives O(1) inserts and O(1)
//! reads, which is what's implemented here.

use crate::event::Event;

const DEFAULT_DEPTH: usize = 3;

struct Cell {
    slots: [Event; DEFAULT_DEPTH],
    head: usize,
}

impl Cell {
    fn new() -> Self {
        Cell {
            slots: [Event::sentinel(); DEFAULT_DEPTH],
            head: 0,
        }
    }

    fn add(&mut self, e: Event) {
        self.head = (self.head + 1) % DEFAULT_DEPTH;
        self.slots[self.head] = e;
    }

    fn read(&self, k: usize) -> Event {
        let idx = (self.head + DEFAULT_DEPTH - (k % DEFAULT_DEPTH)) % DEFAULT_DEPTH;
        self.slots[idx]
    }
}

/// W x H grid of fixed-depth per-pixel event history.
pub struct EventBuffer {
    width: u16,
    height: u16,
    cells: Vec<Cell>,
}

impl EventBuffer {
    pub fn new(width: u16, height: u16) -> Self {
        let n = width as usize * height as usize;
        let mut cells = Vec::with_capacity(n);
        cells.resize_with(n, Cell::new);
        EventBuffer { width, height, cells }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    #[inline]
    fn index(&self, x: u16, y: u16) -> usize {
        debug_assert!(x < self.width && y < self.height);
        y as usize * self.width as usize + x as usize
    }

    pub fn add(&mut self, e: Event) {
        let idx = self.index(e.x, e.y);
        self.cells[idx].add(e);
    }

    /// Returns the k-th most recent event at (x, y), 0 = latest. Sentinels
    /// are returned for slots never written.
    pub fn read(&self, x: u16, y: u16, k: usize) -> Event {
        let idx = self.index(x, y);
        self.cells[idx].read(k)
    }

    pub fn latest(&self, x: u16, y: u16) -> Event {
        self.read(x, y, 0)
    }
}

/// Latest timestamp written to each pixel's Moore neighborhood (never the
/// pixel's own timestamp). Used by the adaptive background-activity filter.
pub struct LastTimestampMap {
    width: u16,
    height: u16,
    values: Vec<i64>,
}

impl LastTimestampMap {
    pub fn new(width: u16, height: u16) -> Self {
        LastTimestampMap {
            width,
            height,
            values: vec![0; width as usize * height as usize],
        }
    }

    #[inline]
    fn index(&self, x: u16, y: u16) -> usize {
        y as usize * self.width as usize + x as usize
    }

    pub fn get(&self, x: u16, y: u16) -> i64 {
        self.values[self.index(x, y)]
    }

    /// Writes `t` into every Moore neighbor of (x, y) that lies on the grid.
    /// (x, y) itself is never written.
    pub fn stamp_neighbors(&mut self, x: u16, y: u16, t: i64) {
        let xi = x as i32;
        let yi = y as i32;
        for dy in -1..=1i32 {
            for dx in -1..=1i32 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let nx = xi + dx;
                let ny = yi + dy;
                if nx < 0 || ny < 0 || nx >= self.width as i32 || ny >= self.height as i32 {
                    continue;
                }
                let idx = self.index(nx as u16, ny as u16);
                self.values[idx] = t;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_read_zero_returns_same_event() {
        let mut buf = EventBuffer::new(16, 16);
        let e = Event::new(4, 4, 1000, true);
        buf.add(e);
        assert_eq!(buf.read(4, 4, 0), e);
    }

    #[test]
    fn history_is_ordered_newest_first() {
        let mut buf = EventBuffer::new(16, 16);
        let e0 = Event::new(2, 2, 100, true);
        let e1 = Event::new(2, 2, 200, false);
        let e2 = Event::new(2, 2, 300, true);
        buf.add(e0);
        buf.add(e1);
        buf.add(e2);
        assert_eq!(buf.read(2, 2, 0).t, 300);
        assert_eq!(buf.read(2, 2, 1).t, 200);
        assert_eq!(buf.read(2, 2, 2).t, 100);
    }

    #[test]
    fn unwritten_slots_are_sentinels() {
        let buf = EventBuffer::new(8, 8);
        assert!(buf.read(0, 0, 0).is_sentinel());
        assert!(buf.read(0, 0, 2).is_sentinel());
    }

    #[test]
    fn oldest_entry_is_discarded_past_depth() {
        let mut buf = EventBuffer::new(8, 8);
        for i in 0..4 {
            buf.add(Event::new(1, 1, 100 * (i + 1), true));
        }
        // Only the 3 most recent survive: t=200,300,400.
        assert_eq!(buf.read(1, 1, 0).t, 400);
        assert_eq!(buf.read(1, 1, 1).t, 300);
        assert_eq!(buf.read(1, 1, 2).t, 200);
    }

    #[test]
    fn last_timestamp_map_never_stamps_self() {
        let mut map = LastTimestampMap::new(8, 8);
        map.stamp_neighbors(3, 3, 555);
        assert_eq!(map.get(3, 3), 0);
        assert_eq!(map.get(2, 2), 555);
        assert_eq!(map.get(4, 4), 555);
    }

    #[test]
    fn last_timestamp_map_clips_at_borders() {
        let mut map = LastTimestampMap::new(4, 4);
        map.stamp_neighbors(0, 0, 42);
        assert_eq!(map.get(1, 0), 42);
        assert_eq!(map.get(0, 1), 42);
        assert_eq!(map.get(1, 1), 42);
    }
}
