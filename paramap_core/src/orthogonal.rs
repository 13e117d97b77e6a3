use num_traits::Float;
use rand::Rng;
use crate::{Mat, Param};
use crate::param::rand_normal;

//

/// Near-orthogonal square weight
///
/// <script src="https://polyfill.io/v3/polyfill.min.js?features=es6"></script>
/// <script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js"></script>
///
/// Owns a square \\(Q\\) which is kept close to orthonormal by penalizing
/// \\[
/// \\| I - Q Q^T \\|_F + \\| I - Q^T Q \\|_F
/// \\]
/// in a training loss. Orthogonality is never enforced by projection.
#[derive(Clone)]
pub struct OrthogonalWeight<F: Float>
{
    q: Param<F>,
}

impl<F: Float> OrthogonalWeight<F>
{
    /// Creates an instance with \\(Q = I + 0.01 Z\\), \\(Z\\) standard Gaussian.
    pub fn new<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Self
    {
        let mut q = rand_normal(n, n, 0.01, rng);
        q.add_assign(F::one(), &Mat::eye(n, n));

        OrthogonalWeight {
            q: Param::new("q", q),
        }
    }

    /// Creates an instance with \\(Q = I\\).
    pub fn identity(n: usize) -> Self
    {
        OrthogonalWeight {
            q: Param::new("q", Mat::eye(n, n)),
        }
    }

    /// Dimension of \\(Q\\).
    pub fn size(&self) -> usize
    {
        self.q.value().size().0
    }

    pub fn q(&self) -> &Mat<F>
    {
        self.q.value()
    }

    pub fn param(&self) -> &Param<F>
    {
        &self.q
    }

    pub fn param_mut(&mut self) -> &mut Param<F>
    {
        &mut self.q
    }

    // I - Q Q^T and I - Q^T Q
    fn residuals(&self) -> (Mat<F>, Mat<F>)
    {
        let n = self.size();
        let q = self.q.value();
        let qt = q.t();

        let mut a = Mat::eye(n, n);
        a.add_assign(-F::one(), &q.matmul(&qt));
        let mut b = Mat::eye(n, n);
        b.add_assign(-F::one(), &qt.matmul(q));
        (a, b)
    }

    /// Orthogonality violation, a non-negative scalar.
    pub fn forward(&self) -> F
    {
        let (a, b) = self.residuals();

        (a.norm_fro() + b.norm_fro()).abs()
    }

    /// Accumulates `scale` times the gradient of [`OrthogonalWeight::forward`] into \\(Q\\).
    ///
    /// A residual of exactly zero contributes nothing.
    pub fn backward(&mut self, scale: F)
    {
        let f0 = F::zero();
        let f2 = F::one() + F::one();
        let (a, b) = self.residuals();
        let na = a.norm_fro();
        let nb = b.norm_fro();

        // d||A||/dQ = -2 A Q / ||A||, d||B||/dQ = -2 Q B / ||B||
        if na > f0 {
            let g = a.matmul(self.q.value());
            self.q.accumulate(-f2 * scale / na, &g);
        }
        if nb > f0 {
            let g = self.q.value().matmul(&b);
            self.q.accumulate(-f2 * scale / nb, &g);
        }
    }
}

//

#[test]
fn test_orthogonal1()
{
    use float_eq::assert_float_eq;

    let o = OrthogonalWeight::<f64>::identity(4);
    assert_float_eq!(o.forward(), 0., abs <= 1e-15);

    // rotation by 30 degrees
    let mut r = OrthogonalWeight::<f64>::identity(2);
    let (s, c) = (0.5_f64, 0.75_f64.sqrt());
    r.param_mut().value_mut().set_iter_rowmaj(&[c, -s, s, c]);
    assert_float_eq!(r.forward(), 0., abs <= 1e-12);

    let mut d = OrthogonalWeight::<f64>::identity(2);
    d.param_mut().value_mut()[(0, 0)] = 2.;
    // both residuals are diag(-3, 0)
    assert_float_eq!(d.forward(), 6., abs <= 1e-12);
}
