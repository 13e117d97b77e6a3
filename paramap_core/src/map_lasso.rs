use num_traits::Float;
use rand::Rng;
use crate::{LinearMap, Mat, Param, MapParam, MapError, Init};
use crate::map::{affine, affine_backward, check_backward};
use crate::error::check_features;
use crate::linalg::relu;
use crate::param::rand_uniform;

//

/// Sparsity-inducing linear map
///
/// <script src="https://polyfill.io/v3/polyfill.min.js?features=es6"></script>
/// <script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js"></script>
///
/// \\(W = \max(U, 0) - \max(V, 0)\\) with the shrinkage term \\(\gamma \\|W\\|_1\\)
/// as its regularization error.
/// Used for sparse identification of nonlinear dynamics.
#[derive(Clone)]
pub struct LassoLinear<F: Float>
{
    u: Param<F>,
    v: Param<F>,
    bias: Option<Param<F>>,
    gamma: F,
}

impl<F: Float> LassoLinear<F>
{
    /// Creates an instance.
    ///
    /// \\(U, V\\) are drawn uniformly from \\([0, 1)\\),
    /// or \\(U = I, V = 0\\) for [`Init::Identity`].
    pub fn new<R: Rng + ?Sized>(insize: usize, outsize: usize, par: &MapParam<F>, rng: &mut R) -> Result<Self, MapError>
    {
        par.validate()?;

        let (u, v) = match par.init {
            Init::Basic => (
                rand_uniform(insize, outsize, 0., 1., rng),
                rand_uniform(insize, outsize, 0., 1., rng),
            ),
            Init::Identity => (
                Mat::eye(insize, outsize),
                Mat::new(insize, outsize),
            ),
        };

        Ok(LassoLinear {
            u: Param::new("u", u),
            v: Param::new("v", v),
            bias: if par.bias {Some(Param::new("bias", Mat::new(1, outsize)))} else {None},
            gamma: par.gamma,
        })
    }
}

impl<F: Float> LinearMap<F> for LassoLinear<F>
{
    fn size(&self) -> (usize, usize)
    {
        self.u.value().size()
    }

    fn effective_w(&self) -> Mat<F>
    {
        self.u.value().zip_map(self.v.value(), |u, v| relu(u) - relu(v))
    }

    fn forward(&self, x: &Mat<F>) -> Result<Mat<F>, MapError>
    {
        check_features("LassoLinear::forward", self.size().0, x.size().1)?;

        Ok(affine(x, &self.effective_w(), self.bias.as_ref()))
    }

    fn regularization_error(&self) -> F
    {
        self.gamma * self.effective_w().abssum()
    }

    fn backward(&mut self, x: &Mat<F>, grad_y: &Mat<F>) -> Result<Mat<F>, MapError>
    {
        check_backward("LassoLinear::backward", self.size(), x, grad_y)?;

        let w = self.effective_w();
        let (grad_w, grad_x) = affine_backward(x, &w, self.bias.as_mut(), grad_y);
        self.accumulate_w(&grad_w);
        Ok(grad_x)
    }

    fn regularization_backward(&mut self, scale: F)
    {
        let f0 = F::zero();
        let g = scale * self.gamma;

        let grad_w = self.effective_w().map(|w| {
            if w > f0 {g} else if w < f0 {-g} else {f0}
        });
        self.accumulate_w(&grad_w);
    }

    fn params(&self) -> Vec<&Param<F>>
    {
        let mut v = vec![&self.u, &self.v];
        v.extend(self.bias.as_ref());
        v
    }

    fn params_mut(&mut self) -> Vec<&mut Param<F>>
    {
        let mut v = vec![&mut self.u, &mut self.v];
        v.extend(self.bias.as_mut());
        v
    }
}

impl<F: Float> LassoLinear<F>
{
    // chain rule through W = relu(U) - relu(V)
    fn accumulate_w(&mut self, grad_w: &Mat<F>)
    {
        let f0 = F::zero();
        let grad_u = grad_w.zip_map(self.u.value(), |g, u| if u > f0 {g} else {f0});
        let grad_v = grad_w.zip_map(self.v.value(), |g, v| if v > f0 {-g} else {f0});
        self.u.accumulate(F::one(), &grad_u);
        self.v.accumulate(F::one(), &grad_v);
    }
}

//

#[test]
fn test_lasso1()
{
    use float_eq::assert_float_eq;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256StarStar;

    let mut rng = Xoshiro256StarStar::seed_from_u64(1);
    let par = MapParam::<f64>::default().par(|p| p.gamma = 0.5);
    let l = LassoLinear::new(3, 2, &par, &mut rng).unwrap();

    let w = l.effective_w();
    assert_float_eq!(l.regularization_error(), 0.5 * w.abssum(), abs <= 1e-12);
}
