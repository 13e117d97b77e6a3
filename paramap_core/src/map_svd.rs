use num_traits::Float;
use rand::Rng;
use crate::{LinearMap, Mat, Param, MapParam, MapError, Init, OrthogonalWeight};
use crate::map::{affine, affine_backward, check_backward};
use crate::error::check_features;
use crate::linalg::sigmoid;
use crate::param::rand_uniform;

//

/// SVD-factorized linear map
///
/// <script src="https://polyfill.io/v3/polyfill.min.js?features=es6"></script>
/// <script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js"></script>
///
/// \\[
/// W = Q_U \\, \Sigma \\, Q_V, \quad
/// \sigma_i = \sigma_{\rm max} - (\sigma_{\rm max} - \sigma_{\rm min}) \,{\rm sigmoid}(p_i)
/// \\]
/// where \\(Q_U, Q_V\\) are [`OrthogonalWeight`]s of the input and output sizes
/// and \\(\Sigma\\) is `in_features x out_features` with \\(\sigma\\) on its diagonal.
///
/// The singular values of the intended weight lie in \\([\sigma_{\rm min}, \sigma_{\rm max}]\\);
/// the realized ones only approximately, as far as \\(Q_U, Q_V\\) are orthogonal.
/// [`LinearMap::spectral_error`] has to be added to a training loss by the caller.
#[derive(Clone)]
pub struct SvdLinear<F: Float>
{
    u: OrthogonalWeight<F>,
    v: OrthogonalWeight<F>,
    p: Param<F>,
    bias: Option<Param<F>>,
    sigma_min: F,
    sigma_max: F,
}

impl<F: Float> SvdLinear<F>
{
    /// Creates an instance.
    ///
    /// \\(p\\) has `min(in_features, out_features)` logits drawn uniformly from \\([0, 1)\\).
    /// [`Init::Identity`] sets \\(Q_U = I, Q_V = I, p = 0\\).
    pub fn new<R: Rng + ?Sized>(insize: usize, outsize: usize, par: &MapParam<F>, rng: &mut R) -> Result<Self, MapError>
    {
        par.validate()?;

        let nsigma = insize.min(outsize);
        let (u, v, p) = match par.init {
            Init::Basic => (
                OrthogonalWeight::new(insize, rng),
                OrthogonalWeight::new(outsize, rng),
                rand_uniform(nsigma, 1, 0., 1., rng),
            ),
            Init::Identity => (
                OrthogonalWeight::identity(insize),
                OrthogonalWeight::identity(outsize),
                Mat::new(nsigma, 1),
            ),
        };

        Ok(SvdLinear {
            u, v,
            p: Param::new("sigma", p),
            bias: if par.bias {Some(Param::new("bias", Mat::new(1, outsize)))} else {None},
            sigma_min: par.sigma_min,
            sigma_max: par.sigma_max,
        })
    }

    /// Bounded singular values \\(\sigma\\).
    pub fn sigmas(&self) -> Vec<F>
    {
        let d = self.sigma_max - self.sigma_min;

        self.p.value().as_slice().iter()
            .map(|p| self.sigma_max - d * sigmoid(*p))
            .collect()
    }

    /// \\(\Sigma\\), `in_features x out_features`.
    pub fn sigma(&self) -> Mat<F>
    {
        let (nr, nc) = self.size();

        Mat::diag(nr, nc, &self.sigmas())
    }

    pub fn u(&self) -> &OrthogonalWeight<F>
    {
        &self.u
    }

    pub fn v(&self) -> &OrthogonalWeight<F>
    {
        &self.v
    }

}

impl<F: Float> LinearMap<F> for SvdLinear<F>
{
    fn size(&self) -> (usize, usize)
    {
        (self.u.size(), self.v.size())
    }

    fn effective_w(&self) -> Mat<F>
    {
        self.u.q().matmul(&self.sigma().matmul(self.v.q()))
    }

    fn forward(&self, x: &Mat<F>) -> Result<Mat<F>, MapError>
    {
        check_features("SvdLinear::forward", self.size().0, x.size().1)?;

        Ok(affine(x, &self.effective_w(), self.bias.as_ref()))
    }

    fn backward(&mut self, x: &Mat<F>, grad_y: &Mat<F>) -> Result<Mat<F>, MapError>
    {
        check_backward("SvdLinear::backward", self.size(), x, grad_y)?;

        let f1 = F::one();
        let s = self.sigma();
        let w = self.effective_w();
        let (grad_w, grad_x) = affine_backward(x, &w, self.bias.as_mut(), grad_y);

        // W = Q_U S Q_V
        let grad_qu = grad_w.matmul(&s.matmul(self.v.q()).t());
        let grad_qv = self.u.q().matmul(&s).t().matmul(&grad_w);
        let grad_s = self.u.q().t().matmul(&grad_w).matmul(&self.v.q().t());

        self.u.param_mut().accumulate(f1, &grad_qu);
        self.v.param_mut().accumulate(f1, &grad_qv);

        let d = self.sigma_max - self.sigma_min;
        for i in 0.. self.p.value().size().0 {
            let sg = sigmoid(self.p.value()[(i, 0)]);
            self.p.accumulate_at((i, 0), -grad_s[(i, i)] * d * sg * (f1 - sg));
        }

        Ok(grad_x)
    }

    /// Sum of the orthogonality errors of \\(Q_U\\) and \\(Q_V\\).
    fn spectral_error(&self) -> F
    {
        self.u.forward() + self.v.forward()
    }

    fn spectral_backward(&mut self, scale: F)
    {
        self.u.backward(scale);
        self.v.backward(scale);
    }

    fn params(&self) -> Vec<&Param<F>>
    {
        let mut v = vec![self.u.param(), self.v.param(), &self.p];
        v.extend(self.bias.as_ref());
        v
    }

    fn params_mut(&mut self) -> Vec<&mut Param<F>>
    {
        let mut v = vec![self.u.param_mut(), self.v.param_mut(), &mut self.p];
        v.extend(self.bias.as_mut());
        v
    }
}

//

#[test]
fn test_svd1()
{
    use float_eq::assert_float_eq;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256StarStar;

    let mut rng = Xoshiro256StarStar::seed_from_u64(0);
    let par = MapParam::<f64>::svd().par(|p| p.init = Init::Identity);
    let l = SvdLinear::new(4, 6, &par, &mut rng).unwrap();

    // sigmoid(0) = 0.5
    assert_float_eq!(l.sigmas().as_slice(), [0.55; 4].as_ref(), abs_all <= 1e-12);
    assert_float_eq!(l.spectral_error(), 0., abs <= 1e-15);
    assert_eq!(l.effective_w().size(), (4, 6));
    assert_eq!(l.regularization_error(), 0.);
}
