//! Active cell and active range

use powersheet_core::{CellAddress, CellRange};

/// Arrow direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// `(d_row, d_col)` for one step
    pub fn delta(self) -> (i64, i64) {
        match self {
            Direction::Up => (-1, 0),
            Direction::Down => (1, 0),
            Direction::Left => (0, -1),
            Direction::Right => (0, 1),
        }
    }
}

/// Selection state of one grid
///
/// The active cell is always inside the extent; with an empty extent nothing is
/// selected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    active: Option<CellAddress>,
    /// Fixed corner of a shift/drag selection
    anchor: Option<CellAddress>,
    rows: u32,
    cols: u32,
}

impl Selection {
    /// Empty selection over a `rows × cols` grid
    pub fn new(rows: u32, cols: u32) -> Self {
        Self {
            active: None,
            anchor: None,
            rows,
            cols,
        }
    }

    pub fn active(&self) -> Option<CellAddress> {
        self.active
    }

    pub fn extent(&self) -> (u32, u32) {
        (self.rows, self.cols)
    }

    /// The active range, in drag order (anchor to cursor)
    pub fn range(&self) -> Option<CellRange> {
        let active = self.active?;
        Some(CellRange::new(self.anchor.unwrap_or(active), active))
    }

    fn clamp(&self, row: i64, col: i64) -> Option<CellAddress> {
        if self.rows == 0 || self.cols == 0 {
            return None;
        }
        let row = row.clamp(0, i64::from(self.rows) - 1);
        let col = col.clamp(0, i64::from(self.cols) - 1);
        Some(CellAddress::new(row as u32, col as u32))
    }

    /// Select a single cell, clamped into the extent
    pub fn select(&mut self, addr: CellAddress) -> Option<CellAddress> {
        self.active = self.clamp(i64::from(addr.row), i64::from(addr.col));
        self.anchor = None;
        self.active
    }

    /// Move one cell; the first move from nothing selects the top-left cell
    pub fn move_by(&mut self, direction: Direction) -> Option<CellAddress> {
        let target = self.step(direction);
        self.active = target;
        self.anchor = None;
        target
    }

    /// Move the cursor one cell while keeping the anchor (shift + arrow)
    pub fn extend(&mut self, direction: Direction) -> Option<CellAddress> {
        if self.anchor.is_none() {
            self.anchor = self.active;
        }
        self.active = self.step(direction);
        if self.anchor.is_none() {
            self.anchor = self.active;
        }
        self.active
    }

    /// Move the cursor to a cell while keeping the anchor (drag)
    pub fn extend_to(&mut self, addr: CellAddress) -> Option<CellAddress> {
        if self.anchor.is_none() {
            self.anchor = self.active;
        }
        self.active = self.clamp(i64::from(addr.row), i64::from(addr.col));
        if self.anchor.is_none() {
            self.anchor = self.active;
        }
        self.active
    }

    fn step(&self, direction: Direction) -> Option<CellAddress> {
        let Some(current) = self.active else {
            return self.clamp(0, 0);
        };
        let (dr, dc) = direction.delta();
        self.clamp(i64::from(current.row) + dr, i64::from(current.col) + dc)
    }

    /// Move right; past the last column continue at the start of the next row
    pub fn advance_wrapping(&mut self) -> Option<CellAddress> {
        let Some(current) = self.active else {
            return self.move_by(Direction::Right);
        };
        if current.col + 1 < self.cols {
            return self.move_by(Direction::Right);
        }
        if current.row + 1 < self.rows {
            return self.select(CellAddress::new(current.row + 1, 0));
        }
        self.anchor = None;
        self.active
    }

    /// Change the extent after rows or columns were added or removed
    pub fn resize(&mut self, rows: u32, cols: u32) {
        self.rows = rows;
        self.cols = cols;
        self.active = self
            .active
            .and_then(|a| self.clamp(i64::from(a.row), i64::from(a.col)));
        self.anchor = self
            .anchor
            .and_then(|a| self.clamp(i64::from(a.row), i64::from(a.col)));
    }

    pub fn clear(&mut self) {
        self.active = None;
        self.anchor = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(a1: &str) -> CellAddress {
        CellAddress::parse(a1).unwrap()
    }

    #[test]
    fn test_navigation_clamps() {
        let mut sel = Selection::new(3, 2);
        assert_eq!(sel.move_by(Direction::Down), Some(at("A1")));
        assert_eq!(sel.move_by(Direction::Up), Some(at("A1")));
        assert_eq!(sel.move_by(Direction::Left), Some(at("A1")));
        sel.move_by(Direction::Right);
        assert_eq!(sel.move_by(Direction::Right), Some(at("B1")));
        sel.move_by(Direction::Down);
        sel.move_by(Direction::Down);
        assert_eq!(sel.move_by(Direction::Down), Some(at("B3")));
    }

    #[test]
    fn test_empty_extent_selects_nothing() {
        let mut sel = Selection::new(0, 4);
        assert_eq!(sel.move_by(Direction::Down), None);
        assert_eq!(sel.select(at("B2")), None);
        assert_eq!(sel.range(), None);
    }

    #[test]
    fn test_extend_keeps_anchor() {
        let mut sel = Selection::new(10, 10);
        sel.select(at("C3"));
        sel.extend(Direction::Up);
        sel.extend(Direction::Left);
        let range = sel.range().unwrap();
        assert_eq!(range.to_string(), "C3:B2");
        assert_eq!(range.normalized().to_string(), "B2:C3");

        // Plain navigation drops the anchor
        sel.move_by(Direction::Down);
        assert_eq!(sel.range().unwrap().to_string(), "B3:B3");
    }

    #[test]
    fn test_extend_to_drag() {
        let mut sel = Selection::new(5, 5);
        sel.select(at("D4"));
        sel.extend_to(at("A1"));
        assert_eq!(sel.range().unwrap().cell_count(), 16);
        sel.extend_to(at("Z99"));
        assert_eq!(sel.active(), Some(at("E5")));
    }

    #[test]
    fn test_advance_wrapping() {
        let mut sel = Selection::new(2, 2);
        sel.select(at("B1"));
        assert_eq!(sel.advance_wrapping(), Some(at("A2")));
        assert_eq!(sel.advance_wrapping(), Some(at("B2")));
        // Last cell stays put
        assert_eq!(sel.advance_wrapping(), Some(at("B2")));
    }

    #[test]
    fn test_resize_clamps() {
        let mut sel = Selection::new(10, 10);
        sel.select(at("J10"));
        sel.resize(4, 3);
        assert_eq!(sel.active(), Some(at("C4")));
        sel.resize(0, 0);
        assert_eq!(sel.active(), None);
    }
}
