//! Dense linear algebra kernels
//!
//! `num::Float`-generic, written in pure Rust.
//! Matrices handled here are stored in column-major unless noted otherwise.

use num_traits::Float;
use core::ops::{Index, IndexMut};

/// Converts an `f64` literal into `F`.
///
/// Every `num::Float` can represent (possibly rounded) finite `f64` values,
/// so the conversion falls back to NaN only for exotic scalar types.
pub fn cast<F: Float>(v: f64) -> F
{
    F::from(v).unwrap_or_else(F::nan)
}

/// Logistic sigmoid \\(1 / (1 + e^{-x})\\), evaluated without overflow for large \\(|x|\\).
pub fn sigmoid<F: Float>(x: F) -> F
{
    let f1 = F::one();

    if x >= F::zero() {
        f1 / (f1 + (-x).exp())
    }
    else {
        let e = x.exp();
        e / (f1 + e)
    }
}

/// Rectified linear unit.
pub fn relu<F: Float>(x: F) -> F
{
    x.max(F::zero())
}

/// Calculate 2-norm (or euclidean norm) \\(\\|x\\|_2\\).
pub fn norm<F: Float>(x: &[F]) -> F
{
    dot(x, x).sqrt()
}

/// Calculate \\(x^T y\\).
pub fn dot<F: Float>(x: &[F], y: &[F]) -> F
{
    assert_eq!(x.len(), y.len());

    let mut sum = F::zero();
    for (u, v) in x.iter().zip(y) {
        sum = sum + *u * *v;
    }
    sum
}

/// Calculate \\(\alpha x\\) in place.
pub fn scale<F: Float>(alpha: F, x: &mut[F])
{
    for u in x {
        *u = alpha * *u;
    }
}

/// Calculate \\(\alpha x + y\\) into `y`.
pub fn add<F: Float>(alpha: F, x: &[F], y: &mut[F])
{
    assert_eq!(x.len(), y.len());

    for (u, v) in x.iter().zip(y) {
        *v = *v + alpha * *u;
    }
}

/// Calculate 1-norm (or sum of absolute values) \\(\\|x\\|_1\\).
pub fn abssum<F: Float>(x: &[F]) -> F
{
    let mut sum = F::zero();
    for u in x {
        sum = sum + u.abs();
    }
    sum
}

//

struct MatIdx<'a, F: Float>
{
    n_row: usize,
    n_col: usize,
    mat: &'a[F],
    transpose: bool,
}

impl<'a, F: Float> MatIdx<'a, F>
{
    fn idx(&self, (r, c): (usize, usize)) -> usize
    {
        let (r, c) = if !self.transpose {(r, c)} else {(c, r)};

        assert!(r < self.n_row);
        assert!(c < self.n_col);

        c * self.n_row + r
    }
}

impl<'a, F: Float> Index<(usize, usize)> for MatIdx<'a, F>
{
    type Output = F;

    fn index(&self, index: (usize, usize)) -> &Self::Output
    {
        &self.mat[self.idx(index)]
    }
}

/// Calculates \\(\alpha G x + \beta y\\).
///
/// * If `transpose` is `true`, calculates \\(\alpha G^T x + \beta y\\) instead.
/// * `mat` is a matrix \\(G\\) of `n_row` x `n_col`, stored in column-major.
/// * `y` is \\(y\\) before entry, the result on exit.
pub fn transform_ge<F: Float>(transpose: bool, n_row: usize, n_col: usize, alpha: F, mat: &[F], x: &[F], beta: F, y: &mut[F])
{
    assert_eq!(mat.len(), n_row * n_col);
    if transpose {
        assert_eq!(x.len(), n_row);
        assert_eq!(y.len(), n_col);
    } else {
        assert_eq!(x.len(), n_col);
        assert_eq!(y.len(), n_row);
    };

    let mat = MatIdx {
        n_row, n_col, mat, transpose,
    };

    for r in 0.. y.len() {
        let mut mat_x = F::zero();
        for c in 0.. x.len() {
            mat_x = mat_x + mat[(r, c)] * x[c];
        }
        y[r] = alpha * mat_x + beta * y[r];
    }
}

//

struct SpMatIdxMut<'a, F: Float>
{
    n: usize,
    mat: &'a mut[F],
}

impl<'a, F: Float> SpMatIdxMut<'a, F>
{
    fn idx(&self, (r, c): (usize, usize)) -> usize
    {
        assert!(r < self.n);
        assert!(c < self.n);

        let (r, c) = if r < c {(r, c)} else {(c, r)};

        c * (c + 1) / 2 + r
    }
}

impl<'a, F: Float> Index<(usize, usize)> for SpMatIdxMut<'a, F>
{
    type Output = F;

    fn index(&self, index: (usize, usize)) -> &Self::Output
    {
        &self.mat[self.idx(index)]
    }
}

impl<'a, F: Float> IndexMut<(usize, usize)> for SpMatIdxMut<'a, F>
{
    fn index_mut(&mut self, index: (usize, usize)) -> &mut Self::Output
    {
        let i = self.idx(index);

        &mut self.mat[i]
    }
}

// cyclic Jacobi rotations, until off-diagonals vanish relative to eps
fn jacobi_eig<F: Float>(spmat_x: &mut SpMatIdxMut<F>, eps: F)
{
    let n = spmat_x.n;
    let tol = eps * eps;
    let f0 = F::zero();
    let f1 = F::one();
    let f2 = f1 + f1;

    let mut conv = false;

    while !conv {
        conv = true;

        for i in 0.. n {
            for j in i + 1.. n {
                let a = spmat_x[(i, i)];
                let b = spmat_x[(j, j)];
                let d = spmat_x[(i, j)];

                if (d * d > tol * a * b) && (d * d > tol) {
                    conv = false;

                    let zeta = (b - a) / (f2 * d);
                    let t = if zeta > f0 {
                        f1 / (zeta + (f1 + zeta * zeta).sqrt())
                    }
                    else {
                        -f1 / (-zeta + (f1 + zeta * zeta).sqrt())
                    };
                    let c = (f1 + t * t).sqrt().recip();
                    let s = c * t;

                    for k in 0.. n {
                        if k == i || k == j {
                            continue;
                        }
                        let xi = spmat_x[(k, i)];
                        let xj = spmat_x[(k, j)];
                        spmat_x[(k, i)] = c * xi - s * xj;
                        spmat_x[(k, j)] = s * xi + c * xj;
                    }

                    spmat_x[(i, i)] = c * c * a + s * s * b - f2 * c * s * d;
                    spmat_x[(j, j)] = s * s * a + c * c * b + f2 * c * s * d;
                    spmat_x[(i, j)] = f0;
                }
            }
        }
    }
}

/// Eigenvalues of a symmetric matrix \\(S\\) supplied in packed form.
///
/// Returns the eigenvalues in descending order.
/// * `mat` is \\(S\\), stored in packed form (the upper-triangular part in column-wise).
///   It is destroyed on exit.
/// * `eps` is a relative tolerance for the off-diagonal elements.
pub fn sym_eig<F: Float>(n: usize, mat: &mut[F], eps: F) -> Vec<F>
{
    assert_eq!(mat.len(), n * (n + 1) / 2);

    let mut spmat_x = SpMatIdxMut {
        n, mat,
    };

    jacobi_eig(&mut spmat_x, eps);

    let mut w: Vec<F> = (0.. n).map(|i| spmat_x[(i, i)]).collect();
    w.sort_by(|a, b| b.partial_cmp(a).unwrap_or(core::cmp::Ordering::Equal));
    w
}

//

#[test]
fn test_transform_ge1()
{
    use float_eq::assert_float_eq;

    let mat = &[ // column-major
        1., 4.,
        2., 5.,
        3., 6.,
    ];
    let x = &[1., 0., -1.];
    let y = &mut[1., 1.];

    transform_ge(false, 2, 3, 2., mat, x, 1., y);
    assert_float_eq!(y.as_ref(), [-3., -3.].as_ref(), abs_all <= 1e-12);

    let xt = &[1., 1.];
    let yt = &mut[0.; 3];
    transform_ge(true, 2, 3, 1., mat, xt, 0., yt);
    assert_float_eq!(yt.as_ref(), [5., 7., 9.].as_ref(), abs_all <= 1e-12);
}

#[test]
fn test_sym_eig1()
{
    use float_eq::assert_float_eq;

    let mat = &mut[ // column-major, upper-triangle
        2.,
        1., 2.,
        0., 0., 5.,
    ];
    let w = sym_eig(3, mat, 1e-12);
    assert_float_eq!(w.as_slice(), [5., 3., 1.].as_ref(), abs_all <= 1e-9);
}

#[test]
fn test_sigmoid1()
{
    use float_eq::assert_float_eq;

    assert_float_eq!(sigmoid(0.), 0.5, abs <= 1e-15);
    assert_float_eq!(sigmoid(1000.), 1., abs <= 1e-15);
    assert_float_eq!(sigmoid(-1000.), 0., abs <= 1e-15);
    assert_float_eq!(sigmoid(2.) + sigmoid(-2.), 1., abs <= 1e-15);
}
