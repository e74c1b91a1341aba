//! Rectangular value grid backing one evaluation context

use crate::error::{FormulaError, FormulaResult};
use powersheet_core::{CellAddress, Scalar};

/// Most rows a grid may grow to
pub const MAX_ROWS: usize = 1_048_576;

/// Most columns a grid may grow to
pub const MAX_COLS: usize = 16_384;

/// Most cells a grid may grow to; the grid is dense so this bounds its memory
pub const MAX_CELLS: usize = 1 << 22;

/// Dense row-major grid of computed values
///
/// Every row has the same number of columns. Cells outside the grid read as
/// [`Scalar::Empty`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grid {
    rows: Vec<Vec<Scalar>>,
    cols: usize,
}

impl Grid {
    /// Create an empty grid
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a grid from rows, rejecting ragged input
    pub fn from_rows(rows: Vec<Vec<Scalar>>) -> FormulaResult<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        if let Some((row, r)) = rows.iter().enumerate().find(|(_, r)| r.len() != cols) {
            return Err(FormulaError::NotRectangular {
                row,
                expected: cols,
                actual: r.len(),
            });
        }
        Ok(Self { rows, cols })
    }

    /// `(rows, cols)`
    pub fn dimensions(&self) -> (usize, usize) {
        (self.rows.len(), self.cols)
    }

    /// Check if the grid holds no cells
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.cols == 0
    }

    /// Check if the address falls inside the current extent
    pub fn in_bounds(&self, addr: CellAddress) -> bool {
        (addr.row as usize) < self.rows.len() && (addr.col as usize) < self.cols
    }

    /// Value at an address, `None` outside the grid
    pub fn get(&self, addr: CellAddress) -> Option<&Scalar> {
        self.rows
            .get(addr.row as usize)
            .and_then(|row| row.get(addr.col as usize))
    }

    /// Value at an address, [`Scalar::Empty`] outside the grid
    pub fn value(&self, addr: CellAddress) -> Scalar {
        self.get(addr).cloned().unwrap_or_default()
    }

    /// Store a value, growing the grid with empty cells if needed
    ///
    /// Returns `true` when the grid had to grow, and
    /// [`FormulaError::TooLarge`] without touching the grid when growing would
    /// pass [`MAX_ROWS`], [`MAX_COLS`] or [`MAX_CELLS`].
    pub fn set(&mut self, addr: CellAddress, value: Scalar) -> FormulaResult<bool> {
        let grew = self.ensure_size(addr.row as usize + 1, addr.col as usize + 1)?;
        self.rows[addr.row as usize][addr.col as usize] = value;
        Ok(grew)
    }

    /// Fail when growing to cover `rows` x `cols` would pass the limits
    fn check_growth(&self, rows: usize, cols: usize) -> FormulaResult<()> {
        if rows <= self.rows.len() && cols <= self.cols {
            return Ok(());
        }
        let rows = rows.max(self.rows.len());
        let cols = cols.max(self.cols);
        if rows > MAX_ROWS || cols > MAX_COLS || rows.saturating_mul(cols) > MAX_CELLS {
            return Err(FormulaError::TooLarge { rows, cols });
        }
        Ok(())
    }

    fn ensure_size(&mut self, rows: usize, cols: usize) -> FormulaResult<bool> {
        self.check_growth(rows, cols)?;
        let mut grew = false;
        if cols > self.cols {
            self.cols = cols;
            for row in &mut self.rows {
                row.resize(cols, Scalar::Empty);
            }
            grew = true;
        }
        if rows > self.rows.len() {
            self.rows.resize(rows, vec![Scalar::Empty; self.cols]);
            grew = true;
        }
        Ok(grew)
    }

    /// Row slices in order
    pub fn rows(&self) -> impl Iterator<Item = &[Scalar]> {
        self.rows.iter().map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rows_rejects_ragged() {
        let err = Grid::from_rows(vec![
            vec![Scalar::Number(1.0), Scalar::Number(2.0)],
            vec![Scalar::Number(3.0)],
        ])
        .unwrap_err();
        assert_eq!(
            err,
            FormulaError::NotRectangular {
                row: 1,
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn test_get_outside_is_none() {
        let grid = Grid::from_rows(vec![vec![Scalar::Number(1.0)]]).unwrap();
        assert_eq!(grid.get(CellAddress::new(0, 0)), Some(&Scalar::Number(1.0)));
        assert_eq!(grid.get(CellAddress::new(0, 1)), None);
        assert_eq!(grid.value(CellAddress::new(5, 5)), Scalar::Empty);
    }

    #[test]
    fn test_set_grows() {
        let mut grid = Grid::new();
        assert!(grid.is_empty());
        assert!(grid.set(CellAddress::new(1, 2), Scalar::text("x")).unwrap());
        assert_eq!(grid.dimensions(), (2, 3));
        assert_eq!(grid.value(CellAddress::new(0, 0)), Scalar::Empty);
        assert!(!grid.set(CellAddress::new(0, 0), Scalar::Number(1.0)).unwrap());
        assert!(grid.rows().all(|r| r.len() == 3));
    }

    #[test]
    fn test_growth_is_capped() {
        let mut grid = Grid::from_rows(vec![vec![Scalar::Number(1.0)]]).unwrap();

        let err = grid
            .set(CellAddress::new(4_000_000_000, 0), Scalar::Number(2.0))
            .unwrap_err();
        assert_eq!(
            err,
            FormulaError::TooLarge {
                rows: 4_000_000_001,
                cols: 1
            }
        );
        assert!(grid.set(CellAddress::new(0, MAX_COLS as u32), Scalar::Empty).is_err());

        // Within both axis limits but too many cells in total
        assert!(grid.set(CellAddress::new(100_000, 100), Scalar::Empty).is_err());
        assert_eq!(grid.dimensions(), (1, 1));

        assert!(grid.set(CellAddress::new(MAX_ROWS as u32 - 1, 0), Scalar::Empty).unwrap());
        assert_eq!(grid.dimensions(), (MAX_ROWS, 1));
    }
}
