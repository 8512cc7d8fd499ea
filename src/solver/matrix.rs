//! Dense matrix storage and the direct linear solver.

use std::ops::{Index, IndexMut};

use super::SINGULAR_PIVOT;

/// Dense row-major matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

/// Result of a direct solve.
#[derive(Debug, Clone)]
pub struct LinearSolution {
    /// Solution vector
    pub x: Vec<f64>,
    /// Columns whose pivot candidates were all zero and received a
    /// synthetic diagonal entry
    pub patched: Vec<usize>,
}

impl Matrix {
    /// Allocate a zero-initialized `rows x cols` matrix.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Build a matrix from row slices. All rows must have the same length.
    pub fn from_rows(rows: &[&[f64]]) -> Self {
        let cols = rows.first().map_or(0, |r| r.len());
        let mut m = Self::zeros(rows.len(), cols);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row.len(), cols, "ragged rows");
            m.data[i * cols..(i + 1) * cols].copy_from_slice(row);
        }
        m
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Set every entry to zero.
    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }

    /// Add to matrix element at (row, col).
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.cols + col] += value;
    }

    fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        let cols = self.cols;
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        let (head, tail) = self.data.split_at_mut(hi * cols);
        head[lo * cols..(lo + 1) * cols].swap_with_slice(&mut tail[..cols]);
    }

    /// Form `b = scale * M * x`.
    pub fn mul_vec_into(&self, x: &[f64], b: &mut [f64], scale: f64) {
        assert_eq!(x.len(), self.cols, "x does not match matrix columns");
        assert_eq!(b.len(), self.rows, "b does not match matrix rows");
        for (i, bi) in b.iter_mut().enumerate() {
            let sum: f64 = self.row(i).iter().zip(x).map(|(m, v)| m * v).sum();
            *bi = scale * sum;
        }
    }

    /// Form `out = self + scale * other` over the bounds of `self`.
    pub fn add_scaled_into(&self, other: &Matrix, scale: f64, out: &mut Matrix) {
        self.check_fits(other);
        self.check_fits(out);
        for i in 0..self.rows {
            for j in 0..self.cols {
                out[(i, j)] = self[(i, j)] + scale * other[(i, j)];
            }
        }
    }

    /// Form `out[i][j] = row_scale[i] * self[i][j] + scale * other[i][j]`.
    pub fn row_scaled_add_into(
        &self,
        row_scale: &[f64],
        other: &Matrix,
        scale: f64,
        out: &mut Matrix,
    ) {
        assert_eq!(row_scale.len(), self.rows, "row scale length");
        self.check_fits(other);
        self.check_fits(out);
        for i in 0..self.rows {
            for j in 0..self.cols {
                out[(i, j)] = row_scale[i] * self[(i, j)] + scale * other[(i, j)];
            }
        }
    }

    /// Copy `self` into the top-left corner of `dest`.
    pub fn copy_into(&self, dest: &mut Matrix) {
        self.check_fits(dest);
        for i in 0..self.rows {
            let src = self.row(i);
            let start = i * dest.cols;
            dest.data[start..start + self.cols].copy_from_slice(src);
        }
    }

    fn check_fits(&self, other: &Matrix) {
        assert!(
            self.rows <= other.rows && self.cols <= other.cols,
            "{}x{} does not fit in {}x{}",
            self.rows,
            self.cols,
            other.rows,
            other.cols
        );
    }

    /// Copy `rhs` into the last column and solve the augmented system.
    pub fn solve_with_rhs(&mut self, rhs: &[f64]) -> LinearSolution {
        assert_eq!(self.cols, self.rows + 1, "matrix is not augmented");
        assert_eq!(rhs.len(), self.rows, "rhs length");
        let last = self.cols - 1;
        for (i, &b) in rhs.iter().enumerate() {
            self[(i, last)] = b;
        }
        self.solve_augmented()
    }

    /// Solve `A x = b` for an augmented `N x (N+1)` matrix `[A | b]`.
    ///
    /// Gaussian elimination with partial pivoting, performed in place.
    /// A column with no nonzero pivot candidate gets [`SINGULAR_PIVOT`]
    /// on the diagonal instead of failing; such columns are reported in
    /// [`LinearSolution::patched`].
    pub fn solve_augmented(&mut self) -> LinearSolution {
        let n = self.rows;
        assert_eq!(self.cols, n + 1, "matrix is not augmented");
        let mut patched = Vec::new();

        for col in 0..n {
            // Find pivot
            let mut max_val = self[(col, col)].abs();
            let mut max_row = col;
            for i in (col + 1)..n {
                let val = self[(i, col)].abs();
                if val > max_val {
                    max_val = val;
                    max_row = i;
                }
            }

            if max_val == 0.0 {
                self[(col, col)] = SINGULAR_PIVOT;
                patched.push(col);
            } else {
                self.swap_rows(col, max_row);
            }

            // Eliminate, including the augmented column
            let pivot = self[(col, col)];
            for i in (col + 1)..n {
                let factor = self[(i, col)] / pivot;
                if factor != 0.0 {
                    for j in col..=n {
                        let v = self[(col, j)];
                        self[(i, j)] -= factor * v;
                    }
                }
            }
        }

        // Back substitution
        let mut x = vec![0.0; n];
        for i in (0..n).rev() {
            let mut acc = self[(i, n)];
            for j in (i + 1)..n {
                acc -= self[(i, j)] * x[j];
            }
            x[i] = acc / self[(i, i)];
        }

        LinearSolution { x, patched }
    }

    /// Numerical rank by Gaussian elimination.
    ///
    /// Entries below `1e-12` times the largest magnitude count as zero.
    pub fn rank(&self) -> usize {
        let mut m = self.clone();
        let max_abs = m.data.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
        if max_abs == 0.0 {
            return 0;
        }
        let threshold = 1e-12 * max_abs;

        let mut rank = 0;
        let mut start_col = 0;
        for row in 0..m.rows {
            for col in start_col..m.cols {
                let mut max_v = m[(row, col)].abs();
                let mut max_row = row;
                for i in (row + 1)..m.rows {
                    let v = m[(i, col)].abs();
                    if v > max_v {
                        max_v = v;
                        max_row = i;
                    }
                }
                if max_v > threshold {
                    start_col = col + 1;
                    rank += 1;
                    m.swap_rows(row, max_row);
                    let pivot = m[(row, col)];
                    for i in (row + 1)..m.rows {
                        let factor = m[(i, col)] / pivot;
                        if factor != 0.0 {
                            for j in col..m.cols {
                                let v = m[(row, j)];
                                m[(i, j)] -= factor * v;
                            }
                        }
                    }
                    break;
                }
            }
        }
        rank
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = f64;

    fn index(&self, (row, col): (usize, usize)) -> &f64 {
        &self.data[row * self.cols + col]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut f64 {
        &mut self.data[row * self.cols + col]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_solve_pivoting() {
        // Needs a row swap in the first column
        let mut m = Matrix::from_rows(&[
            &[2.0, 1.0, -1.0, 8.0],
            &[-3.0, -1.0, 2.0, -11.0],
            &[-2.0, 1.0, 2.0, -3.0],
        ]);
        let sol = m.solve_augmented();
        assert!(sol.patched.is_empty());
        assert_abs_diff_eq!(sol.x[0], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(sol.x[1], 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(sol.x[2], -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_solve_with_rhs_overwrites_last_column() {
        let mut m = Matrix::zeros(2, 3);
        m[(0, 0)] = 4.0;
        m[(1, 1)] = 2.0;
        m[(0, 2)] = 99.0;
        let sol = m.solve_with_rhs(&[8.0, 1.0]);
        assert_abs_diff_eq!(sol.x[0], 2.0);
        assert_abs_diff_eq!(sol.x[1], 0.5);
    }

    #[test]
    fn test_zero_column_is_patched() {
        let mut m = Matrix::from_rows(&[&[1.0, 0.0, 3.0], &[0.0, 0.0, 0.0]]);
        let sol = m.solve_augmented();
        assert_eq!(sol.patched, vec![1]);
        assert_abs_diff_eq!(sol.x[0], 3.0);
        assert_abs_diff_eq!(sol.x[1], 0.0);
        assert!(sol.x.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_mul_and_scale_add() {
        let a = Matrix::from_rows(&[&[1.0, 2.0], &[3.0, 4.0]]);
        let mut b = vec![0.0; 2];
        a.mul_vec_into(&[1.0, 1.0], &mut b, -1.0);
        assert_eq!(b, vec![-3.0, -7.0]);

        let mut out = Matrix::zeros(2, 3);
        a.add_scaled_into(&a, 2.0, &mut out);
        assert_eq!(out[(1, 1)], 12.0);
        assert_eq!(out[(1, 2)], 0.0);

        a.row_scaled_add_into(&[0.5, 1.0], &a, 1.0, &mut out);
        assert_eq!(out[(0, 1)], 3.0);
        assert_eq!(out[(1, 0)], 6.0);
    }

    #[test]
    fn test_copy_into_larger() {
        let a = Matrix::from_rows(&[&[1.0, 2.0], &[3.0, 4.0]]);
        let mut dest = Matrix::zeros(2, 3);
        dest[(0, 2)] = 7.0;
        a.copy_into(&mut dest);
        assert_eq!(dest[(1, 0)], 3.0);
        assert_eq!(dest[(0, 2)], 7.0);
    }

    #[test]
    fn test_rank() {
        let full = Matrix::from_rows(&[&[1.0, 0.0], &[0.0, 1.0]]);
        assert_eq!(full.rank(), 2);
        let deficient = Matrix::from_rows(&[&[1.0, -1.0, 0.0], &[-1.0, 1.0, 0.0]]);
        assert_eq!(deficient.rank(), 1);
        assert_eq!(Matrix::zeros(3, 3).rank(), 0);
    }
}
