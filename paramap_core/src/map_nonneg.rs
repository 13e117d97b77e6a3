use num_traits::Float;
use rand::Rng;
use crate::{LinearMap, Mat, Param, MapParam, MapError, Init};
use crate::map::{affine, affine_backward, check_backward};
use crate::error::check_features;
use crate::linalg::relu;
use crate::param::rand_uniform;

//

/// Nonnegative linear map
///
/// <script src="https://polyfill.io/v3/polyfill.min.js?features=es6"></script>
/// <script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js"></script>
///
/// \\(W = \max(\Theta, 0)\\) elementwise, so every entry of the effective weight is non-negative.
#[derive(Clone)]
pub struct NonnegativeLinear<F: Float>
{
    weight: Param<F>,
    bias: Option<Param<F>>,
}

impl<F: Float> NonnegativeLinear<F>
{
    /// Creates an instance.
    ///
    /// \\(\Theta\\) is drawn uniformly from \\([0, 1)\\), or \\(\Theta = I\\) for [`Init::Identity`].
    pub fn new<R: Rng + ?Sized>(insize: usize, outsize: usize, par: &MapParam<F>, rng: &mut R) -> Result<Self, MapError>
    {
        par.validate()?;

        let weight = match par.init {
            Init::Basic => rand_uniform(insize, outsize, 0., 1., rng),
            Init::Identity => Mat::eye(insize, outsize),
        };

        Ok(NonnegativeLinear {
            weight: Param::new("weight", weight),
            bias: if par.bias {Some(Param::new("bias", Mat::new(1, outsize)))} else {None},
        })
    }
}

impl<F: Float> LinearMap<F> for NonnegativeLinear<F>
{
    fn size(&self) -> (usize, usize)
    {
        self.weight.value().size()
    }

    fn effective_w(&self) -> Mat<F>
    {
        self.weight.value().map(relu)
    }

    fn forward(&self, x: &Mat<F>) -> Result<Mat<F>, MapError>
    {
        check_features("NonnegativeLinear::forward", self.size().0, x.size().1)?;

        Ok(affine(x, &self.effective_w(), self.bias.as_ref()))
    }

    fn backward(&mut self, x: &Mat<F>, grad_y: &Mat<F>) -> Result<Mat<F>, MapError>
    {
        check_backward("NonnegativeLinear::backward", self.size(), x, grad_y)?;

        let w = self.effective_w();
        let (grad_w, grad_x) = affine_backward(x, &w, self.bias.as_mut(), grad_y);

        let f0 = F::zero();
        let grad_theta = grad_w.zip_map(self.weight.value(), |g, t| if t > f0 {g} else {f0});
        self.weight.accumulate(F::one(), &grad_theta);
        Ok(grad_x)
    }

    fn params(&self) -> Vec<&Param<F>>
    {
        let mut v = vec![&self.weight];
        v.extend(self.bias.as_ref());
        v
    }

    fn params_mut(&mut self) -> Vec<&mut Param<F>>
    {
        let mut v = vec![&mut self.weight];
        v.extend(self.bias.as_mut());
        v
    }
}

//

#[test]
fn test_nonneg1()
{
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256StarStar;

    let mut rng = Xoshiro256StarStar::seed_from_u64(0);
    let mut l = NonnegativeLinear::<f64>::new(3, 4, &MapParam::default(), &mut rng).unwrap();
    l.params_mut()[0].value_mut().set_by_fn(|r, c| if (r + c) % 2 == 0 {-1.} else {1.});

    let w = l.effective_w();
    assert!(w.as_slice().iter().all(|v| *v >= 0.));
    assert_eq!(w[(0, 0)], 0.);
    assert_eq!(w[(0, 1)], 1.);
}
