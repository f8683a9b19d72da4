#![no_std]

//! a uniform grid of buckets for point entities.
//!
//! the world is cut into square cells of a fixed size, every entity lives in exactly one
//! bucket. neighbourhood queries only ever look at the 3×3 block of cells around a cell,
//! so if the cell size is at least as big as the largest query radius nothing is missed.
//!
//! the grid does not store positions, only keys. callers keep the cell index they got back from
//! [`CellGrid::insert`] and hand it back on [`CellGrid::remove`] and [`CellGrid::relocate`],
//! which is what makes those operations cheap.

extern crate alloc;
use alloc::vec::Vec;

#[cfg(test)]
mod tests;

pub type Point = [f64; 2];

#[derive(PartialEq, Debug, Clone)]
pub struct CellGrid<K> {
    cell_size: f64,
    columns: usize,
    rows: usize,
    cells: Vec<Vec<K>>,
    len: usize,
}

impl<K> CellGrid<K>
where
    K: Copy + PartialEq,
{
    /// width and height are the declared world bounds, positions outside of them are clamped
    /// into the nearest border cell.
    ///
    /// a non-positive or non-finite cell size is treated as one cell covering everything.
    pub fn new(width: f64, height: f64, cell_size: f64) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0. {
            cell_size
        } else {
            width.max(height).max(1.)
        };
        let columns = axis_cells(width, cell_size);
        let rows = axis_cells(height, cell_size);
        let mut cells = Vec::with_capacity(columns * rows);
        cells.resize_with(columns * rows, Vec::new);
        Self {
            cell_size,
            columns,
            rows,
            cells,
            len: 0,
        }
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }
    pub fn columns(&self) -> usize {
        self.columns
    }
    pub fn rows(&self) -> usize {
        self.rows
    }
    /// number of entities over all cells
    pub fn len(&self) -> usize {
        self.len
    }
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// `clamp(floor(x/size)) + clamp(floor(y/size)) * columns`
    /// nan coordinates land in the first column/row.
    pub fn cell_index(&self, p: &Point) -> usize {
        let col = clamp_axis(p[0], self.cell_size, self.columns);
        let row = clamp_axis(p[1], self.cell_size, self.rows);
        col + row * self.columns
    }

    /// returns the cell the key was put into, store it next to the entity.
    pub fn insert(&mut self, key: K, p: &Point) -> usize {
        let cell = self.cell_index(p);
        self.cells[cell].push(key);
        self.len += 1;
        cell
    }

    /// removes the key from the cell it was inserted into.
    /// returns false if the key was not there.
    ///
    /// a stale cell hint is a logic error in the caller, debug builds panic,
    /// release builds fall back to searching the whole grid.
    pub fn remove(&mut self, key: K, cell: usize) -> bool {
        if self.remove_from(key, cell) {
            return true;
        }
        debug_assert!(false, "grid entry not in its recorded cell {}", cell);
        let found = (0..self.cells.len()).find(|&c| self.cells[c].contains(&key));
        match found {
            Some(c) => self.remove_from(key, c),
            None => false,
        }
    }

    /// moves the key to the cell belonging to p.
    /// if the cell did not change this does nothing.
    /// returns the (possibly new) cell.
    pub fn relocate(&mut self, key: K, cell: usize, p: &Point) -> usize {
        let new_cell = self.cell_index(p);
        if new_cell == cell {
            return cell;
        }
        self.remove(key, cell);
        self.cells[new_cell].push(key);
        self.len += 1;
        new_cell
    }

    /// the raw content of a single cell, out of range cells are empty.
    pub fn cell(&self, cell: usize) -> &[K] {
        self.cells.get(cell).map(Vec::as_slice).unwrap_or(&[])
    }

    /// the indices of the 3×3 block of cells around cell, cut off at the borders.
    pub fn neighbourhood(&self, cell: usize) -> impl Iterator<Item = usize> + use<K> {
        let cell = cell.min(self.cells.len() - 1);
        let columns = self.columns;
        let col = cell % columns;
        let row = cell / columns;
        let cols = col.saturating_sub(1)..=(col + 1).min(columns - 1);
        let rows = row.saturating_sub(1)..=(row + 1).min(self.rows - 1);
        rows.flat_map(move |r| cols.clone().map(move |c| c + r * columns))
    }

    /// all keys in the 3×3 block of cells around cell
    pub fn query_cell(&self, cell: usize) -> impl Iterator<Item = &K> + '_ {
        self.neighbourhood(cell)
            .flat_map(move |c| self.cells[c].iter())
    }

    /// shorthand for `query_cell(cell_index(p))`
    pub fn query_point(&self, p: &Point) -> impl Iterator<Item = &K> + '_ {
        self.query_cell(self.cell_index(p))
    }

    /// every key together with the cell it is stored in
    pub fn iter(&self) -> impl Iterator<Item = (usize, &K)> {
        self.cells
            .iter()
            .enumerate()
            .flat_map(|(i, c)| c.iter().map(move |k| (i, k)))
    }

    /// empties all cells but keeps their allocations
    pub fn clear(&mut self) {
        self.cells.iter_mut().for_each(Vec::clear);
        self.len = 0;
    }

    fn remove_from(&mut self, key: K, cell: usize) -> bool {
        let Some(bucket) = self.cells.get_mut(cell) else {
            return false;
        };
        // buckets are unordered so swap_remove is fine
        match bucket.iter().position(|k| *k == key) {
            Some(i) => {
                bucket.swap_remove(i);
                self.len -= 1;
                true
            }
            None => false,
        }
    }
}

// f64::floor and f64::ceil live in std, the casts below do the same for non-negative values
fn axis_cells(extent: f64, cell_size: f64) -> usize {
    if !(extent.is_finite() && extent > 0.) {
        return 1;
    }
    let q = extent / cell_size;
    let t = q as usize;
    let ceil = if (t as f64) < q { t + 1 } else { t };
    ceil.max(1)
}

fn clamp_axis(v: f64, cell_size: f64, n: usize) -> usize {
    let q = v / cell_size;
    // also catches nan
    if !(q >= 0.) {
        return 0;
    }
    // truncation is floor here, the cast saturates on huge values
    (q as usize).min(n - 1)
}
