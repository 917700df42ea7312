//! Decorative prediction grid. There is no predictive computation here: the
//! output is uniformly random trap placement, only the dimensions and trap
//! count matter.

use rand::seq::SliceRandom;
use rand::Rng;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cell {
    Star,
    Bomb,
}

#[derive(Clone, Debug)]
pub struct Grid {
    rows: usize,
    cols: usize,
    cells: Vec<Cell>,
}

impl Grid {
    /// Generate a `rows x cols` grid with exactly `traps` bombs placed
    /// uniformly at random (capped at the cell count).
    pub fn generate(rows: usize, cols: usize, traps: usize, rng: &mut impl Rng) -> Self {
        let total = rows * cols;
        let traps = traps.min(total);
        let mut indices: Vec<usize> = (0..total).collect();
        indices.shuffle(rng);
        let mut cells = vec![Cell::Star; total];
        for &index in indices.iter().take(traps) {
            cells[index] = Cell::Bomb;
        }
        Self { rows, cols, cells }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn trap_count(&self) -> usize {
        self.cells.iter().filter(|cell| **cell == Cell::Bomb).count()
    }

    /// One row per line, `*` for stars and `X` for bombs.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.cells.len() + self.rows);
        for row in 0..self.rows {
            for col in 0..self.cols {
                out.push(match self.cells[row * self.cols + col] {
                    Cell::Star => '*',
                    Cell::Bomb => 'X',
                });
            }
            if row + 1 < self.rows {
                out.push('\n');
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn grid_has_declared_size_and_trap_count() {
        let mut rng = StdRng::seed_from_u64(7);
        for traps in [1usize, 3, 5] {
            let grid = Grid::generate(5, 5, traps, &mut rng);
            assert_eq!(grid.cells().len(), 25);
            assert_eq!(grid.trap_count(), traps);
        }
    }

    #[test]
    fn trap_count_is_capped_at_cell_count() {
        let mut rng = StdRng::seed_from_u64(7);
        let grid = Grid::generate(2, 2, 10, &mut rng);
        assert_eq!(grid.trap_count(), 4);
    }

    #[test]
    fn render_is_row_major() {
        let mut rng = StdRng::seed_from_u64(7);
        let grid = Grid::generate(5, 5, 3, &mut rng);
        let rendered = grid.render();
        assert_eq!(rendered.lines().count(), 5);
        assert!(rendered.lines().all(|line| line.len() == 5));
        assert_eq!(rendered.matches('X').count(), 3);
    }
}
