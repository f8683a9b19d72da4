extern crate std;
use crate::CellGrid;
use quickcheck::{Arbitrary, Gen};
use quickcheck_macros::quickcheck;
use std::boxed::Box;
use std::collections::HashSet;
use std::vec::Vec;

const WIDTH: f64 = 1000.;
const HEIGHT: f64 = 600.;
const CELL: f64 = 70.;

/// a position that is usually, but not always, inside the world
#[derive(Clone, Copy, Debug)]
struct Pos(f64, f64);

impl Arbitrary for Pos {
    fn arbitrary(g: &mut Gen) -> Self {
        // i16/20 covers roughly -1600..1600, so some points are out of bounds on every side
        Pos(i16::arbitrary(g) as f64 / 20., i16::arbitrary(g) as f64 / 20.)
    }

    fn shrink(&self) -> Box<dyn Iterator<Item = Self>> {
        let Pos(x, y) = *self;
        Box::new(
            x.shrink()
                .map(move |nx| Pos(nx, y))
                .chain(y.shrink().map(move |ny| Pos(x, ny))),
        )
    }
}

impl Pos {
    fn p(self) -> [f64; 2] {
        [self.0, self.1]
    }
    /// column and row computed without the grid
    fn col_row(self) -> (i64, i64) {
        let cols = (WIDTH / CELL).ceil() as i64;
        let rows = (HEIGHT / CELL).ceil() as i64;
        let c = ((self.0 / CELL).floor() as i64).clamp(0, cols - 1);
        let r = ((self.1 / CELL).floor() as i64).clamp(0, rows - 1);
        (c, r)
    }
}

fn build(points: &[Pos]) -> (CellGrid<usize>, Vec<usize>) {
    let mut grid = CellGrid::new(WIDTH, HEIGHT, CELL);
    let cells = points
        .iter()
        .enumerate()
        .map(|(i, p)| grid.insert(i, &p.p()))
        .collect();
    (grid, cells)
}

#[quickcheck]
/// the 3x3 query returns exactly what a linear scan over all points would.
fn query_matches_linear_scan(points: Vec<Pos>, center: Pos) -> bool {
    let (grid, _) = build(&points);
    let found: HashSet<usize> = grid.query_point(&center.p()).copied().collect();

    let (cc, cr) = center.col_row();
    let expected: HashSet<usize> = points
        .iter()
        .enumerate()
        .filter(|(_, p)| {
            let (c, r) = p.col_row();
            (c - cc).abs() <= 1 && (r - cr).abs() <= 1
        })
        .map(|(i, _)| i)
        .collect();
    found == expected
}

#[quickcheck]
/// after relocating every entity it can only be found in the cell of its new position.
fn relocate_leaves_no_trace(moves: Vec<(Pos, Pos)>) -> bool {
    let from: Vec<Pos> = moves.iter().map(|m| m.0).collect();
    let (mut grid, mut cells) = build(&from);
    for (i, (_, to)) in moves.iter().enumerate() {
        cells[i] = grid.relocate(i, cells[i], &to.p());
    }
    let consistent = moves.iter().enumerate().all(|(i, (_, to))| {
        let home = grid.cell_index(&to.p());
        cells[i] == home
            && (0..grid.columns() * grid.rows()).all(|c| grid.cell(c).contains(&i) == (c == home))
    });
    consistent && grid.len() == moves.len()
}

#[quickcheck]
fn remove_everything(points: Vec<Pos>) -> bool {
    let (mut grid, cells) = build(&points);
    let removed = cells
        .iter()
        .enumerate()
        .all(|(i, cell)| grid.remove(i, *cell));
    removed && grid.is_empty() && grid.iter().next().is_none()
}

#[test]
fn out_of_bounds_is_clamped() {
    let grid: CellGrid<u8> = CellGrid::new(WIDTH, HEIGHT, CELL);
    let last = grid.columns() * grid.rows() - 1;
    assert_eq!(grid.cell_index(&[-50., -50.]), 0);
    assert_eq!(grid.cell_index(&[WIDTH * 3., HEIGHT * 3.]), last);
    assert_eq!(grid.cell_index(&[f64::NAN, f64::NAN]), 0);
    assert_eq!(grid.cell_index(&[WIDTH + 1., 0.]), grid.columns() - 1);
}

#[test]
fn neighbourhood_is_cut_at_the_border() {
    let grid: CellGrid<u8> = CellGrid::new(WIDTH, HEIGHT, CELL);
    assert_eq!(grid.neighbourhood(0).count(), 4);
    let inner = grid.columns() + 1;
    assert_eq!(grid.neighbourhood(inner).count(), 9);
    let edge = 1;
    assert_eq!(grid.neighbourhood(edge).count(), 6);
}

#[test]
fn relocate_within_cell_is_noop() {
    let mut grid = CellGrid::new(WIDTH, HEIGHT, CELL);
    let cell = grid.insert(7u32, &[10., 10.]);
    assert_eq!(grid.relocate(7, cell, &[20., 20.]), cell);
    assert_eq!(grid.cell(cell), &[7]);
    assert_eq!(grid.len(), 1);
}

#[test]
fn dimensions_round_up_and_indices_round_down() {
    let grid: CellGrid<usize> = CellGrid::new(WIDTH, HEIGHT, CELL);
    // 1000 / 70 and 600 / 70 leave a partial cell on each axis
    assert_eq!(grid.columns(), 15);
    assert_eq!(grid.rows(), 9);
    let exact: CellGrid<usize> = CellGrid::new(700., 140., 70.);
    assert_eq!(exact.columns(), 10);
    assert_eq!(exact.rows(), 2);

    assert_eq!(grid.cell_index(&[69.99, 0.]), 0);
    assert_eq!(grid.cell_index(&[70., 0.]), 1);
    assert_eq!(grid.cell_index(&[-0.5, 0.]), 0);
    assert_eq!(grid.cell_index(&[0., 139.99]), 15);
    assert_eq!(grid.cell_index(&[f64::INFINITY, f64::INFINITY]), 15 * 9 - 1);
}
