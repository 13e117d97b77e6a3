use num_traits::Float;
use rand::Rng;
use crate::{LinearMap, Mat, Param, MapParam, MapError, Init};
use crate::map::check_backward;
use crate::error::check_features;
use crate::linalg::{cast, sigmoid};
use crate::param::rand_normal;

//

/// Householder reflection of batched row vectors on a trailing subspace.
///
/// <script src="https://polyfill.io/v3/polyfill.min.js?features=es6"></script>
/// <script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js"></script>
///
/// With \\(\tilde x, \tilde u\\) the last `k` elements of each row of \\(x\\) and of \\(u\\),
/// calculates \\(\tilde x - \frac{2 \tilde x^T \tilde u}{\tilde u^T \tilde u} \tilde u\\)
/// in place and leaves the leading elements untouched.
/// A zero \\(\tilde u\\) is treated as no reflection.
/// * `x` is a `batch x dim` matrix.
/// * `u` is a reflector of length `dim`.
/// * `k` is the active length, `1..=dim`.
pub fn hprod<F: Float>(x: &mut Mat<F>, u: &[F], k: usize)
{
    let (nb, dim) = x.size();
    assert_eq!(u.len(), dim);
    assert!(k <= dim);

    let o = dim - k;
    let us = &u[o..];
    let s = us.iter().fold(F::zero(), |acc, e| acc + *e * *e);
    if s == F::zero() {
        return;
    }
    let c = (F::one() + F::one()) / s;

    for b in 0.. nb {
        let mut a = F::zero();
        for (j, uj) in us.iter().enumerate() {
            a = a + x[(b, o + j)] * *uj;
        }
        for (j, uj) in us.iter().enumerate() {
            x[(b, o + j)] = x[(b, o + j)] - c * a * *uj;
        }
    }
}

// backward of hprod at its input x
// returns dL/dx and dL/du (zero on the leading elements)
fn hprod_backward<F: Float>(x: &Mat<F>, u: &[F], k: usize, grad_y: &Mat<F>) -> (Mat<F>, Vec<F>)
{
    let (nb, dim) = x.size();
    let o = dim - k;
    let us = &u[o..];
    let s = us.iter().fold(F::zero(), |acc, e| acc + *e * *e);

    let mut grad_x = grad_y.clone();
    let mut grad_u = vec![F::zero(); dim];
    if s == F::zero() {
        return (grad_x, grad_u);
    }
    let f2 = F::one() + F::one();
    let c = f2 / s;
    let c2 = f2 * c / s;

    for b in 0.. nb {
        let mut a = F::zero();
        let mut d = F::zero();
        for (j, uj) in us.iter().enumerate() {
            a = a + x[(b, o + j)] * *uj;
            d = d + grad_y[(b, o + j)] * *uj;
        }
        for (j, uj) in us.iter().enumerate() {
            let gy = grad_y[(b, o + j)];
            grad_x[(b, o + j)] = gy - c * d * *uj;
            grad_u[o + j] = grad_u[o + j] - c * (d * x[(b, o + j)] + a * gy) + c2 * a * d * *uj;
        }
    }

    (grad_x, grad_u)
}

//

/// Householder-reflector spectral linear map
///
/// <script src="https://polyfill.io/v3/polyfill.min.js?features=es6"></script>
/// <script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js"></script>
///
/// \\[
/// W = H_U \\, \Sigma \\, H_V, \quad
/// \sigma_i = 2 r \left({\rm sigmoid}(p_i) - \tfrac12\right) + \bar\sigma
/// \\]
/// where \\(r = (\sigma_{\rm max} - \sigma_{\rm min}) / 2\\), \\(\bar\sigma = \sigma_{\rm min} + r\\),
/// and \\(H_U, H_V\\) are products of Householder reflections whose reflectors are
/// the rows of the upper-triangular parameters \\(U\\) and \\(V\\).
///
/// Every singular value lies in \\([\sigma_{\rm min}, \sigma_{\rm max}]\\) by construction.
/// [`SpectralLinear::forward`](LinearMap::forward) applies the reflections to the input one by one
/// and never forms \\(W\\); [`SpectralLinear::materialize`] does.
#[derive(Clone)]
pub struct SpectralLinear<F: Float>
{
    u: Param<F>,
    v: Param<F>,
    p: Param<F>,
    bias: Option<Param<F>>,
    n_u: usize,
    n_v: usize,
    r: F,
    sigma_mean: F,
}

impl<F: Float> SpectralLinear<F>
{
    /// Creates an instance.
    ///
    /// \\(U, V\\) are upper triangles of standard Gaussian matrices and
    /// \\(p\\) has `min(in_features, out_features)` logits of \\(0.001 Z\\).
    /// [`Init::Identity`] sets \\(U = I, V = I, p = 0\\).
    ///
    /// The numbers of reflectors are clamped to `in_features` and `out_features` respectively.
    pub fn new<R: Rng + ?Sized>(insize: usize, outsize: usize, par: &MapParam<F>, rng: &mut R) -> Result<Self, MapError>
    {
        par.validate()?;

        let n_u = par.n_u_reflectors.min(insize);
        if n_u < par.n_u_reflectors {
            log::warn!("SpectralLinear: n_u_reflectors {} clamped to {}", par.n_u_reflectors, n_u);
        }
        let n_v = par.n_v_reflectors.min(outsize);
        if n_v < par.n_v_reflectors {
            log::warn!("SpectralLinear: n_v_reflectors {} clamped to {}", par.n_v_reflectors, n_v);
        }

        let nsigma = insize.min(outsize);
        let (u, v, p) = match par.init {
            Init::Basic => (
                rand_normal(insize, insize, 1., rng).triu(),
                rand_normal(outsize, outsize, 1., rng).triu(),
                rand_normal(nsigma, 1, 0.001, rng),
            ),
            Init::Identity => (
                Mat::eye(insize, insize),
                Mat::eye(outsize, outsize),
                Mat::new(nsigma, 1),
            ),
        };

        let r = (par.sigma_max - par.sigma_min) / cast(2.);

        Ok(SpectralLinear {
            u: Param::new("u", u),
            v: Param::new("v", v),
            p: Param::new("p", p),
            bias: if par.bias {Some(Param::new("bias", Mat::new(1, outsize)))} else {None},
            n_u,
            n_v,
            r,
            sigma_mean: par.sigma_min + r,
        })
    }

    /// Numbers of reflectors of the input and the output sides.
    pub fn n_reflectors(&self) -> (usize, usize)
    {
        (self.n_u, self.n_v)
    }

    /// Bounded singular values \\(\sigma\\).
    pub fn sigmas(&self) -> Vec<F>
    {
        let f2 = F::one() + F::one();
        let half = F::one() / f2;

        self.p.value().as_slice().iter()
            .map(|p| f2 * self.r * (sigmoid(*p) - half) + self.sigma_mean)
            .collect()
    }

    /// \\(\Sigma\\), `in_features x out_features`.
    ///
    /// \\(\sigma\\) is padded with `|in_features - out_features|` zeros, diagonalized
    /// into a square matrix and then sliced.
    pub fn sigma(&self) -> Mat<F>
    {
        let (nr, nc) = self.size();

        Mat::diag(nr, nc, &self.sigmas())
    }

    /// Applies \\(H_U\\) to `x`, `batch x in_features`.
    pub fn u_multiply(&self, x: &Mat<F>) -> Result<Mat<F>, MapError>
    {
        check_features("SpectralLinear::u_multiply", self.size().0, x.size().1)?;

        let mut x = x.clone();
        self.u_apply(&mut x);
        Ok(x)
    }

    /// Applies \\(H_V\\) to `x`, `batch x out_features`.
    pub fn v_multiply(&self, x: &Mat<F>) -> Result<Mat<F>, MapError>
    {
        check_features("SpectralLinear::v_multiply", self.size().1, x.size().1)?;

        let mut x = x.clone();
        self.v_apply(&mut x);
        Ok(x)
    }

    /// Dense \\(W = H_U \Sigma H_V\\), by applying the reflectors and \\(\Sigma\\) to the identity of `in_features`.
    ///
    /// The bias is excluded. With a bias, `forward` of the identity differs from this by the bias added to every row.
    ///
    /// Costs \\(O(n_{in}^2)\\) reflections work; for diagnostics rather than training.
    pub fn materialize(&self) -> Mat<F>
    {
        let n = self.size().0;

        let mut x = Mat::eye(n, n);
        self.u_apply(&mut x);
        let mut x = x.matmul(&self.sigma());
        self.v_apply(&mut x);
        x
    }

    // ascending, shrinking active length
    fn u_apply(&self, x: &mut Mat<F>)
    {
        let n = self.size().0;

        for i in 0.. self.n_u {
            hprod(x, &self.u.value().row(i), n - i);
        }
    }

    // descending, growing active length
    fn v_apply(&self, x: &mut Mat<F>)
    {
        let n = self.size().1;

        for i in (0.. self.n_v).rev() {
            hprod(x, &self.v.value().row(i), n - i);
        }
    }
}

impl<F: Float> LinearMap<F> for SpectralLinear<F>
{
    fn size(&self) -> (usize, usize)
    {
        (self.u.value().size().0, self.v.value().size().0)
    }

    fn effective_w(&self) -> Mat<F>
    {
        self.materialize()
    }

    fn forward(&self, x: &Mat<F>) -> Result<Mat<F>, MapError>
    {
        let x = self.u_multiply(x)?;
        let x = x.matmul(&self.sigma());
        let mut y = self.v_multiply(&x)?;

        if let Some(b) = &self.bias {
            y.add_row(b.value().as_slice());
        }
        Ok(y)
    }

    fn backward(&mut self, x: &Mat<F>, grad_y: &Mat<F>) -> Result<Mat<F>, MapError>
    {
        check_backward("SpectralLinear::backward", self.size(), x, grad_y)?;

        let (nin, nout) = self.size();
        let f1 = F::one();

        if let Some(b) = self.bias.as_mut() {
            for (c, g) in grad_y.col_sums().into_iter().enumerate() {
                b.accumulate_at((0, c), g);
            }
        }

        // forward again, keeping the input of every reflection
        let mut xs_u = vec![x.clone()];
        for i in 0.. self.n_u {
            let mut next = xs_u[i].clone();
            hprod(&mut next, &self.u.value().row(i), nin - i);
            xs_u.push(next);
        }
        let w = &xs_u[self.n_u];
        let mut xs_v = vec![w.matmul(&self.sigma())];
        for t in 0.. self.n_v {
            let i = self.n_v - 1 - t;
            let mut next = xs_v[t].clone();
            hprod(&mut next, &self.v.value().row(i), nout - i);
            xs_v.push(next);
        }

        let mut g = grad_y.clone();

        for t in (0.. self.n_v).rev() {
            let i = self.n_v - 1 - t;
            let (gx, gu) = hprod_backward(&xs_v[t], &self.v.value().row(i), nout - i, &g);
            for (j, e) in gu.into_iter().enumerate() {
                self.v.accumulate_at((i, j), e);
            }
            g = gx;
        }

        // z = w Sigma
        let sg: Vec<F> = self.p.value().as_slice().iter().map(|p| sigmoid(*p)).collect();
        let sigmas = self.sigmas();
        let f2 = f1 + f1;
        let (nb, _) = g.size();
        let mut gw = Mat::new(nb, nin);
        for (j, sj) in sigmas.iter().enumerate() {
            let mut gs = F::zero();
            for b in 0.. nb {
                gw[(b, j)] = g[(b, j)] * *sj;
                gs = gs + g[(b, j)] * w[(b, j)];
            }
            self.p.accumulate_at((j, 0), gs * f2 * self.r * sg[j] * (f1 - sg[j]));
        }
        g = gw;

        for i in (0.. self.n_u).rev() {
            let (gx, gu) = hprod_backward(&xs_u[i], &self.u.value().row(i), nin - i, &g);
            for (j, e) in gu.into_iter().enumerate() {
                self.u.accumulate_at((i, j), e);
            }
            g = gx;
        }

        Ok(g)
    }

    fn params(&self) -> Vec<&Param<F>>
    {
        let mut v = vec![&self.u, &self.v, &self.p];
        v.extend(self.bias.as_ref());
        v
    }

    fn params_mut(&mut self) -> Vec<&mut Param<F>>
    {
        let mut v = vec![&mut self.u, &mut self.v, &mut self.p];
        v.extend(self.bias.as_mut());
        v
    }
}

//

#[test]
fn test_hprod1()
{
    use float_eq::assert_float_eq;

    let mut x = Mat::<f64>::new(2, 3).iter_rowmaj(&[
        1., 2., 3.,
        4., 5., 6.,
    ]);
    // reflects the last element only
    hprod(&mut x, &[9., 9., 1.], 1);
    assert_float_eq!(x.row(0).as_slice(), [1., 2., -3.].as_ref(), abs_all <= 1e-12);
    assert_float_eq!(x.row(1).as_slice(), [4., 5., -6.].as_ref(), abs_all <= 1e-12);

    // swaps the last two elements
    hprod(&mut x, &[0., 1., -1.], 2);
    assert_float_eq!(x.row(0).as_slice(), [1., -3., 2.].as_ref(), abs_all <= 1e-12);
}

#[test]
fn test_spectral_sigma1()
{
    use float_eq::assert_float_eq;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256StarStar;

    let mut rng = Xoshiro256StarStar::seed_from_u64(3);
    let l = SpectralLinear::<f64>::new(5, 5, &MapParam::spectral(), &mut rng).unwrap();
    assert_eq!(l.n_reflectors(), (5, 5));

    let s = l.sigma();
    assert_eq!(s.size(), (5, 5));
    for (i, e) in l.sigmas().iter().enumerate() {
        assert_float_eq!(s[(i, i)], *e, abs <= 0.);
        assert!(*e >= 0.6 && *e <= 1.);
    }
}
