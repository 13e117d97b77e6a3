use num_traits::Float;
use core::ops::{Index, IndexMut, Deref};
use crate::linalg;

//

/// Dense matrix
///
/// <script src="https://polyfill.io/v3/polyfill.min.js?features=es6"></script>
/// <script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-svg.js"></script>
///
/// Matrix struct which owns a `Vec` of data array stored in column-major.
/// Batched row vectors are held as a `batch x features` matrix.
#[derive(Clone, PartialEq)]
pub struct Mat<F: Float>
{
    n_row: usize,
    n_col: usize,
    array: Vec<F>,
}

impl<F: Float> Mat<F>
{
    /// Creates an instance.
    ///
    /// Returns the [`Mat`] instance with zero data.
    pub fn new(n_row: usize, n_col: usize) -> Self
    {
        Mat {
            n_row,
            n_col,
            array: vec![F::zero(); n_row * n_col],
        }
    }

    /// Identity matrix \\(I_{n_{row} \times n_{col}}\\), padded with zeros when not square.
    pub fn eye(n_row: usize, n_col: usize) -> Self
    {
        let mut m = Self::new(n_row, n_col);
        for i in 0.. n_row.min(n_col) {
            m[(i, i)] = F::one();
        }
        m
    }

    /// Rectangular diagonal matrix with `diag` on its leading diagonal.
    ///
    /// `diag` is padded with zeros up to `max(n_row, n_col)` entries before
    /// diagonalization, then the square matrix is sliced to `n_row x n_col`.
    pub fn diag(n_row: usize, n_col: usize, diag: &[F]) -> Self
    {
        let n = n_row.max(n_col);
        let mut padded = diag.to_vec();
        padded.resize(n, F::zero());

        let mut m = Self::new(n_row, n_col);
        for (i, d) in padded.iter().enumerate().take(n_row.min(n_col)) {
            m[(i, i)] = *d;
        }
        m
    }

    /// Size of the matrix.
    ///
    /// Returns a tuple of a number of rows and columns.
    pub fn size(&self) -> (usize, usize)
    {
        (self.n_row, self.n_col)
    }

    /// Data by a function.
    ///
    /// * `func` takes a row and a column of the matrix and returns data of each element.
    pub fn set_by_fn<M>(&mut self, mut func: M)
    where M: FnMut(usize, usize) -> F
    {
        for c in 0.. self.n_col {
            for r in 0.. self.n_row {
                self[(r, c)] = func(r, c);
            }
        }
    }
    /// Builder pattern of [`Mat::set_by_fn`].
    pub fn by_fn<M>(mut self, func: M) -> Self
    where M: FnMut(usize, usize) -> F
    {
        self.set_by_fn(func);
        self
    }

    /// Data by an iterator in row-major.
    ///
    /// * `iter` iterates matrix data in row-major.
    pub fn set_iter_rowmaj<T, I>(&mut self, iter: T)
    where T: IntoIterator<Item=I>, I: Deref<Target=F>
    {
        let mut i = iter.into_iter();

        for r in 0.. self.n_row {
            for c in 0.. self.n_col {
                if let Some(v) = i.next() {
                    self[(r, c)] = *v;
                }
                else {
                    break;
                }
            }
        }
    }
    /// Builder pattern of [`Mat::set_iter_rowmaj`].
    pub fn iter_rowmaj<T, I>(mut self, iter: T) -> Self
    where T: IntoIterator<Item=I>, I: Deref<Target=F>
    {
        self.set_iter_rowmaj(iter);
        self
    }

    /// Scales by \\(\alpha\\).
    pub fn set_scale(&mut self, alpha: F)
    {
        linalg::scale(alpha, &mut self.array);
    }
    /// Builder pattern of [`Mat::set_scale`].
    pub fn scale(mut self, alpha: F) -> Self
    {
        self.set_scale(alpha);
        self
    }

    /// Scales each row `r` by `alpha[r]`.
    pub fn set_scale_rows(&mut self, alpha: &[F])
    {
        assert_eq!(alpha.len(), self.n_row);

        for c in 0.. self.n_col {
            for r in 0.. self.n_row {
                self[(r, c)] = alpha[r] * self[(r, c)];
            }
        }
    }
    /// Builder pattern of [`Mat::set_scale_rows`].
    pub fn scale_rows(mut self, alpha: &[F]) -> Self
    {
        self.set_scale_rows(alpha);
        self
    }

    /// Zeros the strictly lower-triangular part.
    pub fn set_triu(&mut self)
    {
        for c in 0.. self.n_col {
            for r in c + 1.. self.n_row {
                self[(r, c)] = F::zero();
            }
        }
    }
    /// Builder pattern of [`Mat::set_triu`].
    pub fn triu(mut self) -> Self
    {
        self.set_triu();
        self
    }

    /// Data array in column-major.
    pub fn as_slice(&self) -> &[F]
    {
        &self.array
    }

    /// Mutable data array in column-major.
    pub fn as_mut_slice(&mut self) -> &mut[F]
    {
        &mut self.array
    }

    /// Column `c` as a slice.
    pub fn col(&self, c: usize) -> &[F]
    {
        assert!(c < self.n_col);

        &self.array[c * self.n_row.. (c + 1) * self.n_row]
    }

    /// Row `r` copied into a `Vec`.
    pub fn row(&self, r: usize) -> Vec<F>
    {
        (0.. self.n_col).map(|c| self[(r, c)]).collect()
    }

    /// Transposed copy.
    pub fn t(&self) -> Self
    {
        Self::new(self.n_col, self.n_row).by_fn(|r, c| self[(c, r)])
    }

    /// Matrix product \\(A B\\).
    ///
    /// The number of columns of `self` shall equal the number of rows of `rhs`.
    pub fn matmul(&self, rhs: &Self) -> Self
    {
        assert_eq!(self.n_col, rhs.n_row);

        let f0 = F::zero();
        let f1 = F::one();
        let mut out = Self::new(self.n_row, rhs.n_col);

        for c in 0.. rhs.n_col {
            let (nr, nc) = (self.n_row, self.n_col);
            let y = &mut out.array[c * nr.. (c + 1) * nr];
            linalg::transform_ge(false, nr, nc, f1, &self.array, rhs.col(c), f0, y);
        }
        out
    }

    /// Elementwise map.
    pub fn map<M>(&self, mut func: M) -> Self
    where M: FnMut(F) -> F
    {
        Mat {
            n_row: self.n_row,
            n_col: self.n_col,
            array: self.array.iter().map(|v| func(*v)).collect(),
        }
    }

    /// Elementwise combination with another matrix of the same size.
    pub fn zip_map<M>(&self, rhs: &Self, mut func: M) -> Self
    where M: FnMut(F, F) -> F
    {
        assert_eq!(self.size(), rhs.size());

        Mat {
            n_row: self.n_row,
            n_col: self.n_col,
            array: self.array.iter().zip(&rhs.array).map(|(a, b)| func(*a, *b)).collect(),
        }
    }

    /// Calculates \\(\alpha X + Y\\) into `self` as \\(Y\\).
    pub fn add_assign(&mut self, alpha: F, x: &Self)
    {
        assert_eq!(self.size(), x.size());

        linalg::add(alpha, &x.array, &mut self.array);
    }

    /// Adds `row` to every row.
    pub fn add_row(&mut self, row: &[F])
    {
        assert_eq!(row.len(), self.n_col);

        for c in 0.. self.n_col {
            let v = row[c];
            for e in &mut self.array[c * self.n_row.. (c + 1) * self.n_row] {
                *e = *e + v;
            }
        }
    }

    /// Sums of each row.
    pub fn row_sums(&self) -> Vec<F>
    {
        (0.. self.n_row).map(|r| {
            let mut sum = F::zero();
            for c in 0.. self.n_col {
                sum = sum + self[(r, c)];
            }
            sum
        }).collect()
    }

    /// Sums of each column.
    pub fn col_sums(&self) -> Vec<F>
    {
        (0.. self.n_col).map(|c| {
            self.col(c).iter().fold(F::zero(), |s, v| s + *v)
        }).collect()
    }

    /// Frobenius norm.
    pub fn norm_fro(&self) -> F
    {
        linalg::norm(&self.array)
    }

    /// Sum of absolute values of all elements.
    pub fn abssum(&self) -> F
    {
        linalg::abssum(&self.array)
    }

    /// Calculates singular values \\(\sigma_i(A)\\) via the eigenvalues of \\(A^T A\\).
    ///
    /// Returns `min(n_row, n_col)` singular values in descending order.
    /// Intended for diagnostics of small weight matrices; the cost is
    /// dominated by the Jacobi sweeps over an `n_col x n_col` matrix.
    pub fn singular_values(&self, eps: F) -> Vec<F>
    {
        let n = self.n_col;
        let ata = self.t().matmul(self);

        let mut packed = Vec::with_capacity(n * (n + 1) / 2);
        for c in 0.. n {
            for r in 0..= c {
                packed.push(ata[(r, c)]);
            }
        }

        let mut w = linalg::sym_eig(n, &mut packed, eps);
        w.truncate(self.n_row.min(n));
        w.iter().map(|e| e.max(F::zero()).sqrt()).collect()
    }

    fn index(&self, (r, c): (usize, usize)) -> usize
    {
        assert!(r < self.n_row);
        assert!(c < self.n_col);

        c * self.n_row + r
    }
}

//

impl<F: Float> Index<(usize, usize)> for Mat<F>
{
    type Output = F;
    fn index(&self, index: (usize, usize)) -> &Self::Output
    {
        let i = self.index(index);

        &self.array[i]
    }
}

impl<F: Float> IndexMut<(usize, usize)> for Mat<F>
{
    fn index_mut(&mut self, index: (usize, usize)) -> &mut Self::Output
    {
        let i = self.index(index);

        &mut self.array[i]
    }
}

impl<F: Float> AsRef<[F]> for Mat<F>
{
    fn as_ref(&self) -> &[F]
    {
        &self.array
    }
}

//

impl<F: Float + core::fmt::LowerExp> core::fmt::Debug for Mat<F>
{
    fn fmt(&self, f: &mut core::fmt::Formatter) -> Result<(), core::fmt::Error>
    {
        let (nr, nc) = self.size();

        if nr == 0 || nc == 0 {
            write!(f, "[ ]")?;
        }
        else {
            for r in 0.. nr {
                if r == 0 {
                    write!(f, "[")?;
                }
                else {
                    write!(f, " ")?;
                }

                for c in 0.. nc {
                    write!(f, " {:.3e}", self[(r, c)])?;
                }

                if r < nr - 1 {
                    writeln!(f)?;
                }
                else {
                    write!(f, " ] ({} x {})", nr, nc)?;
                }
            }
        }

        Ok(())
    }
}

impl<F: Float + core::fmt::LowerExp> core::fmt::Display for Mat<F>
{
    fn fmt(&self, f: &mut core::fmt::Formatter) -> Result<(), core::fmt::Error>
    {
        let (nr, nc) = self.size();
        if nr == 0 || nc == 0 {
            write!(f, "[ ]")?;
        }
        else {
            write!(f, "[ {:.3e}", self[(0, 0)])?;
            if nc > 2 {
                write!(f, " ...")?;
            }
            if nc > 1 {
                write!(f, " {:.3e}", self[(0, nc - 1)])?;
            }

            if nr > 2 {
                writeln!(f)?;
                write!(f, "  ...")?;
            }

            if nr > 1 {
                writeln!(f)?;
                write!(f, "  {:.3e}", self[(nr - 1, 0)])?;
                if nc > 2 {
                    write!(f, " ...")?;
                }
                if nc > 1 {
                    write!(f, " {:.3e}", self[(nr - 1, nc - 1)])?;
                }
            }
            write!(f, " ]")?;
        }

        write!(f, " ({} x {})", nr, nc)
    }
}

//

#[test]
fn test_mat_matmul1()
{
    use float_eq::assert_float_eq;

    let a = Mat::<f64>::new(2, 3).iter_rowmaj(&[
        1., 2., 3.,
        4., 5., 6.,
    ]);
    let b = Mat::<f64>::new(3, 2).iter_rowmaj(&[
        1., 0.,
        0., 1.,
        1., 1.,
    ]);
    let ab = a.matmul(&b);
    assert_eq!(ab.size(), (2, 2));
    assert_float_eq!(ab.t().as_slice(), [4., 5., 10., 11.].as_ref(), abs_all <= 1e-12);
}

#[test]
fn test_mat_diag1()
{
    let d = Mat::<f64>::diag(4, 6, &[1., 2., 3., 4.]);
    assert_eq!(d.size(), (4, 6));
    for r in 0.. 4 {
        for c in 0.. 6 {
            let expected = if r == c {(r + 1) as f64} else {0.};
            assert_eq!(d[(r, c)], expected);
        }
    }
}

#[test]
fn test_mat_singular_values1()
{
    use float_eq::assert_float_eq;

    // rotation by 90 degrees scaled by diag(3, 2)
    let a = Mat::<f64>::new(2, 2).iter_rowmaj(&[
        0., -2.,
        3.,  0.,
    ]);
    let s = a.singular_values(1e-12);
    assert_float_eq!(s.as_slice(), [3., 2.].as_ref(), abs_all <= 1e-9);
}
