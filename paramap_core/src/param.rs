use num_traits::{Float, Num};
use rand::Rng;
use rand_distr::StandardNormal;
use crate::{Mat, MapError, MapKind};
use crate::linalg::cast;

//

/// Trainable parameter
///
/// A weight matrix with its gradient accumulator.
/// Gradients are accumulated by `backward` calls until [`Param::zero_grad`].
#[derive(Clone)]
pub struct Param<F: Float>
{
    name: &'static str,
    value: Mat<F>,
    grad: Mat<F>,
    trainable: bool,
}

impl<F: Float> Param<F>
{
    /// Creates a trainable instance with zero gradient.
    pub fn new(name: &'static str, value: Mat<F>) -> Self
    {
        let (nr, nc) = value.size();

        Param {
            name,
            value,
            grad: Mat::new(nr, nc),
            trainable: true,
        }
    }

    pub fn name(&self) -> &'static str
    {
        self.name
    }

    pub fn value(&self) -> &Mat<F>
    {
        &self.value
    }

    /// Mutable value, for initialization and custom update rules.
    pub fn value_mut(&mut self) -> &mut Mat<F>
    {
        &mut self.value
    }

    pub fn grad(&self) -> &Mat<F>
    {
        &self.grad
    }

    pub fn is_trainable(&self) -> bool
    {
        self.trainable
    }

    pub fn set_trainable(&mut self, trainable: bool)
    {
        self.trainable = trainable;
    }

    /// Adds \\(\alpha G\\) to the gradient accumulator.
    pub fn accumulate(&mut self, alpha: F, g: &Mat<F>)
    {
        self.grad.add_assign(alpha, g);
    }

    /// Adds `g` to a single gradient element.
    pub fn accumulate_at(&mut self, index: (usize, usize), g: F)
    {
        self.grad[index] = self.grad[index] + g;
    }

    pub fn zero_grad(&mut self)
    {
        self.grad.set_scale(F::zero());
    }

    /// Plain gradient step \\(\theta \leftarrow \theta - \eta \nabla\\).
    ///
    /// Does nothing for a frozen parameter.
    pub fn descend(&mut self, lr: F)
    {
        if self.trainable {
            self.value.add_assign(-lr, &self.grad);
        }
    }
}

//

/// Uniform random matrix in `[lo, hi)`.
pub fn rand_uniform<F: Float, R: Rng + ?Sized>(n_row: usize, n_col: usize, lo: f64, hi: f64, rng: &mut R) -> Mat<F>
{
    Mat::new(n_row, n_col).by_fn(|_, _| {
        let u: f64 = rng.gen();
        cast(lo + (hi - lo) * u)
    })
}

/// Gaussian random matrix with zero mean and standard deviation `std`.
pub fn rand_normal<F: Float, R: Rng + ?Sized>(n_row: usize, n_col: usize, std: f64, rng: &mut R) -> Mat<F>
{
    Mat::new(n_row, n_col).by_fn(|_, _| {
        let z: f64 = rng.sample(StandardNormal);
        cast(std * z)
    })
}

//

/// Weight initialization scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Init
{
    /// Random initialization.
    Basic,
    /// Initialization such that the map starts as (a scaled) identity.
    Identity,
}

impl core::str::FromStr for Init
{
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s {
            "basic" => Ok(Init::Basic),
            "identity" => Ok(Init::Identity),
            _ => Err(MapError::InvalidParam(format!("init: {}", s))),
        }
    }
}

//

/// Linear map construction parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct MapParam<F: Float>
{
    /// Whether the map owns a trainable bias added to the output.
    pub bias: bool,
    /// Lower bound of singular values (or of row sums for Perron-Frobenius).
    pub sigma_min: F,
    /// Upper bound of singular values (or of row sums for Perron-Frobenius).
    pub sigma_max: F,
    /// Number of Householder reflectors of the input side, clamped to the input size.
    pub n_u_reflectors: usize,
    /// Number of Householder reflectors of the output side, clamped to the output size.
    pub n_v_reflectors: usize,
    /// Weight initialization scheme.
    pub init: Init,
    /// Weight of the L1 shrinkage term of [`crate::LassoLinear`].
    pub gamma: F,
}

impl<F: Float> Default for MapParam<F>
{
    fn default() -> Self
    {
        MapParam {
            bias: false,
            sigma_min: cast(0.6),
            sigma_max: F::one(),
            n_u_reflectors: 20,
            n_v_reflectors: 20,
            init: Init::Basic,
            gamma: F::one(),
        }
    }
}

impl<F: Float> MapParam<F>
{
    /// Defaults of [`crate::PerronFrobeniusLinear`].
    pub fn perron_frobenius() -> Self
    {
        MapParam {
            sigma_min: cast(0.95),
            ..Default::default()
        }
    }

    /// Defaults of [`crate::SvdLinear`].
    pub fn svd() -> Self
    {
        MapParam {
            sigma_min: cast(0.1),
            ..Default::default()
        }
    }

    /// Defaults of [`crate::SpectralLinear`].
    pub fn spectral() -> Self
    {
        Default::default()
    }

    /// Defaults of a map kind.
    pub fn for_kind(kind: MapKind) -> Self
    {
        match kind {
            MapKind::PerronFrobenius => Self::perron_frobenius(),
            MapKind::Svd => Self::svd(),
            _ => Self::spectral(),
        }
    }

    /// Modifies parameters by a closure.
    pub fn par<P>(mut self, f: P) -> Self
    where P: FnOnce(&mut Self)
    {
        f(&mut self);
        self
    }

    /// Checks the parameter ranges.
    pub fn validate(&self) -> Result<(), MapError>
    {
        if !(self.sigma_min.is_finite() && self.sigma_max.is_finite()) {
            return Err(MapError::InvalidParam("sigma bounds must be finite".into()));
        }
        if self.sigma_min > self.sigma_max {
            return Err(MapError::InvalidParam("sigma_min must not exceed sigma_max".into()));
        }
        if !(self.gamma >= F::zero()) {
            return Err(MapError::InvalidParam("gamma must be non-negative".into()));
        }
        Ok(())
    }

    /// Overrides parameters by environment variables `{prefix}SIGMA_MIN`, `{prefix}SIGMA_MAX`,
    /// `{prefix}N_U_REFLECTORS`, `{prefix}N_V_REFLECTORS`, `{prefix}BIAS`, `{prefix}GAMMA` and `{prefix}INIT`.
    pub fn set_by_env(&mut self, prefix: &str)
    where F: core::fmt::Display
    {
        let key = |k: &str| format!("{}{}", prefix, k);

        self.sigma_min = num_by_env(&key("SIGMA_MIN")).unwrap_or(self.sigma_min);
        self.sigma_max = num_by_env(&key("SIGMA_MAX")).unwrap_or(self.sigma_max);
        self.n_u_reflectors = num_by_env(&key("N_U_REFLECTORS")).unwrap_or(self.n_u_reflectors);
        self.n_v_reflectors = num_by_env(&key("N_V_REFLECTORS")).unwrap_or(self.n_v_reflectors);
        self.gamma = num_by_env(&key("GAMMA")).unwrap_or(self.gamma);
        self.bias = parsed_by_env(&key("BIAS")).unwrap_or(self.bias);
        self.init = parsed_by_env(&key("INIT")).unwrap_or(self.init);
    }
}

fn num_by_env<N: Num + core::fmt::Display>(e: &str) -> Option<N>
{
    if let Some(v) = std::env::var(e).ok()
                     .and_then(|s| {N::from_str_radix(&s, 10).ok()}) {
        log::info!("{}: {}", e, v);
        Some(v)
    }
    else {
        None
    }
}

fn parsed_by_env<T: core::str::FromStr + core::fmt::Debug>(e: &str) -> Option<T>
{
    if let Some(v) = std::env::var(e).ok()
                     .and_then(|s| {s.parse().ok()}) {
        log::info!("{}: {:?}", e, v);
        Some(v)
    }
    else {
        None
    }
}

//

#[test]
fn test_map_param1()
{
    let p = MapParam::<f64>::perron_frobenius().par(|p| {
        p.bias = true;
        p.init = Init::Identity;
    });
    assert!(p.bias);
    assert_eq!(p.init, Init::Identity);
    assert_eq!(p.sigma_min, 0.95);
    assert!(p.validate().is_ok());

    let bad = MapParam::<f64>::svd().par(|p| p.sigma_min = 2.);
    assert!(bad.validate().is_err());
}

#[test]
fn test_map_param_env1()
{
    std::env::set_var("TEST_MAP_PARAM_ENV1_SIGMA_MAX", "0.5");
    std::env::set_var("TEST_MAP_PARAM_ENV1_N_U_REFLECTORS", "3");
    std::env::set_var("TEST_MAP_PARAM_ENV1_INIT", "identity");

    let mut p = MapParam::<f64>::svd();
    p.set_by_env("TEST_MAP_PARAM_ENV1_");
    assert_eq!(p.sigma_max, 0.5);
    assert_eq!(p.n_u_reflectors, 3);
    assert_eq!(p.n_v_reflectors, 20);
    assert_eq!(p.init, Init::Identity);
}
