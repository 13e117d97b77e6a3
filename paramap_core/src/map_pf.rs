use num_traits::Float;
use rand::Rng;
use crate::{LinearMap, Mat, Param, MapParam, MapError, Init};
use crate::map::{affine, affine_backward, check_backward};
use crate::error::check_features;
use crate::linalg::{cast, sigmoid};
use crate::param::rand_uniform;

//

/// Perron-Frobenius constrained linear map
///
/// <script src="https://polyfill.io/v3/polyfill.min.js?features=es6"></script>
/// <script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js"></script>
///
/// \\[
/// W_{ij} = s_i \frac{e^{\Theta_{ij}}}{\sum_k e^{\Theta_{ik}}}, \quad
/// s_i = \sigma_{\rm max} - (\sigma_{\rm max} - \sigma_{\rm min}) \,{\rm sigmoid}(c_i)
/// \\]
///
/// Each row of \\(W\\) is non-negative and sums to exactly \\(s_i \in [\sigma_{\rm min}, \sigma_{\rm max}]\\),
/// which bounds the dominant eigenvalue of \\(W\\) by the Perron-Frobenius theorem.
#[derive(Clone)]
pub struct PerronFrobeniusLinear<F: Float>
{
    weight: Param<F>,
    scaling: Param<F>,
    bias: Option<Param<F>>,
    sigma_min: F,
    sigma_max: F,
}

impl<F: Float> PerronFrobeniusLinear<F>
{
    /// Creates an instance.
    ///
    /// \\(\Theta\\) and \\(c\\) are drawn uniformly from \\([0, 1)\\).
    /// [`Init::Identity`] sets \\(\Theta = -1000 \cdot \mathbf{1} + 1001 I\\) and \\(c = -100\\),
    /// so that \\(W \approx \sigma_{\rm max} I\\).
    pub fn new<R: Rng + ?Sized>(insize: usize, outsize: usize, par: &MapParam<F>, rng: &mut R) -> Result<Self, MapError>
    {
        par.validate()?;

        let (weight, scaling) = match par.init {
            Init::Basic => (
                rand_uniform(insize, outsize, 0., 1., rng),
                rand_uniform(insize, 1, 0., 1., rng),
            ),
            Init::Identity => (
                Mat::eye(insize, outsize).map(|e| cast::<F>(1001.) * e - cast(1000.)),
                Mat::new(insize, 1).map(|_| cast(-100.)),
            ),
        };

        Ok(PerronFrobeniusLinear {
            weight: Param::new("weight", weight),
            scaling: Param::new("scaling", scaling),
            bias: if par.bias {Some(Param::new("bias", Mat::new(1, outsize)))} else {None},
            sigma_min: par.sigma_min,
            sigma_max: par.sigma_max,
        })
    }

    /// Row sums \\(s_i\\) of the effective weight.
    pub fn row_scales(&self) -> Vec<F>
    {
        let d = self.sigma_max - self.sigma_min;

        self.scaling.value().as_slice().iter()
            .map(|c| self.sigma_max - d * sigmoid(*c))
            .collect()
    }

    // row-wise softmax with max subtraction
    fn softmax(&self) -> Mat<F>
    {
        let theta = self.weight.value();
        let (nr, nc) = theta.size();
        let mut p = Mat::new(nr, nc);

        for r in 0.. nr {
            let max = (0.. nc).fold(F::neg_infinity(), |m, c| m.max(theta[(r, c)]));
            let mut sum = F::zero();
            for c in 0.. nc {
                let e = (theta[(r, c)] - max).exp();
                p[(r, c)] = e;
                sum = sum + e;
            }
            for c in 0.. nc {
                p[(r, c)] = p[(r, c)] / sum;
            }
        }
        p
    }
}

impl<F: Float> LinearMap<F> for PerronFrobeniusLinear<F>
{
    fn size(&self) -> (usize, usize)
    {
        self.weight.value().size()
    }

    fn effective_w(&self) -> Mat<F>
    {
        let s = self.row_scales();

        self.softmax().scale_rows(&s)
    }

    fn forward(&self, x: &Mat<F>) -> Result<Mat<F>, MapError>
    {
        check_features("PerronFrobeniusLinear::forward", self.size().0, x.size().1)?;

        Ok(affine(x, &self.effective_w(), self.bias.as_ref()))
    }

    fn backward(&mut self, x: &Mat<F>, grad_y: &Mat<F>) -> Result<Mat<F>, MapError>
    {
        check_backward("PerronFrobeniusLinear::backward", self.size(), x, grad_y)?;

        let (nr, nc) = self.size();
        let p = self.softmax();
        let s = self.row_scales();
        let w = p.clone().scale_rows(&s);
        let (grad_w, grad_x) = affine_backward(x, &w, self.bias.as_mut(), grad_y);

        let f1 = F::one();
        let d = self.sigma_max - self.sigma_min;
        let mut grad_theta = Mat::new(nr, nc);

        for r in 0.. nr {
            // W_rc = s_r p_rc
            let mut grad_s = F::zero();
            let mut gp_p = F::zero();
            for c in 0.. nc {
                grad_s = grad_s + grad_w[(r, c)] * p[(r, c)];
                gp_p = gp_p + grad_w[(r, c)] * s[r] * p[(r, c)];
            }
            for c in 0.. nc {
                grad_theta[(r, c)] = p[(r, c)] * (grad_w[(r, c)] * s[r] - gp_p);
            }

            let sg = sigmoid(self.scaling.value()[(r, 0)]);
            self.scaling.accumulate_at((r, 0), -grad_s * d * sg * (f1 - sg));
        }

        self.weight.accumulate(f1, &grad_theta);
        Ok(grad_x)
    }

    fn params(&self) -> Vec<&Param<F>>
    {
        let mut v = vec![&self.weight, &self.scaling];
        v.extend(self.bias.as_ref());
        v
    }

    fn params_mut(&mut self) -> Vec<&mut Param<F>>
    {
        let mut v = vec![&mut self.weight, &mut self.scaling];
        v.extend(self.bias.as_mut());
        v
    }
}

//

#[test]
fn test_pf_identity1()
{
    use float_eq::assert_float_eq;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256StarStar;

    let mut rng = Xoshiro256StarStar::seed_from_u64(0);
    let par = MapParam::<f64>::perron_frobenius().par(|p| p.init = Init::Identity);
    let l = PerronFrobeniusLinear::new(3, 3, &par, &mut rng).unwrap();

    let w = l.effective_w();
    let ref_w = Mat::<f64>::eye(3, 3);
    assert_float_eq!(w.as_slice(), ref_w.as_slice(), abs_all <= 1e-9);
}
