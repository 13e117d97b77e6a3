use num_traits::Float;
use rand::Rng;
use crate::{LinearMap, Mat, Param, MapParam, MapError, Init};
use crate::map::{affine, affine_backward, check_backward};
use crate::error::check_features;
use crate::param::rand_uniform;

//

/// Dense linear map
///
/// <script src="https://polyfill.io/v3/polyfill.min.js?features=es6"></script>
/// <script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js"></script>
///
/// \\(y = x W + b\\) with unconstrained \\(W\\).
#[derive(Clone)]
pub struct Linear<F: Float>
{
    weight: Param<F>,
    bias: Option<Param<F>>,
}

impl<F: Float> Linear<F>
{
    /// Creates an instance.
    ///
    /// Weights and bias are drawn uniformly from \\([-1/\sqrt{n_{in}}, 1/\sqrt{n_{in}})\\),
    /// or \\(W = I\\) and \\(b = 0\\) for [`Init::Identity`].
    pub fn new<R: Rng + ?Sized>(insize: usize, outsize: usize, par: &MapParam<F>, rng: &mut R) -> Result<Self, MapError>
    {
        par.validate()?;

        let bound = 1. / (insize.max(1) as f64).sqrt();
        let (weight, bias) = match par.init {
            Init::Basic => (
                rand_uniform(insize, outsize, -bound, bound, rng),
                rand_uniform(1, outsize, -bound, bound, rng),
            ),
            Init::Identity => (
                Mat::eye(insize, outsize),
                Mat::new(1, outsize),
            ),
        };

        Ok(Linear {
            weight: Param::new("weight", weight),
            bias: if par.bias {Some(Param::new("bias", bias))} else {None},
        })
    }

    /// Creates an instance from given values.
    ///
    /// * `weight` is \\(W\\), `in_features x out_features`.
    /// * `bias` is \\(b\\) of length `out_features` if any.
    pub fn from_parts(weight: Mat<F>, bias: Option<&[F]>) -> Result<Self, MapError>
    {
        let (_, outsize) = weight.size();
        let bias = match bias {
            Some(b) => {
                check_features("Linear::from_parts", outsize, b.len())?;
                Some(Param::new("bias", Mat::new(1, outsize).iter_rowmaj(b)))
            },
            None => None,
        };

        Ok(Linear {
            weight: Param::new("weight", weight),
            bias,
        })
    }
}

impl<F: Float> LinearMap<F> for Linear<F>
{
    fn size(&self) -> (usize, usize)
    {
        self.weight.value().size()
    }

    fn effective_w(&self) -> Mat<F>
    {
        self.weight.value().clone()
    }

    fn forward(&self, x: &Mat<F>) -> Result<Mat<F>, MapError>
    {
        check_features("Linear::forward", self.size().0, x.size().1)?;

        Ok(affine(x, self.weight.value(), self.bias.as_ref()))
    }

    fn backward(&mut self, x: &Mat<F>, grad_y: &Mat<F>) -> Result<Mat<F>, MapError>
    {
        check_backward("Linear::backward", self.size(), x, grad_y)?;

        let (grad_w, grad_x) = affine_backward(x, self.weight.value(), self.bias.as_mut(), grad_y);
        self.weight.accumulate(F::one(), &grad_w);
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
fn test_linear1()
{
    use float_eq::assert_float_eq;

    let w = Mat::<f64>::new(2, 3).iter_rowmaj(&[
        1., 0., 2.,
        0., 1., -1.,
    ]);
    let l = Linear::from_parts(w, Some(&[0.5, 0.5, 0.5])).unwrap();
    let x = Mat::new(1, 2).iter_rowmaj(&[2., 3.]);
    let y = l.forward(&x).unwrap();
    assert_float_eq!(y.as_slice(), [2.5, 3.5, 1.5].as_ref(), abs_all <= 1e-12);

    let bad = Mat::new(1, 3);
    assert!(l.forward(&bad).is_err());
}
