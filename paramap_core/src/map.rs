//! Linear map

use num_traits::Float;
use rand::Rng;
use crate::{Mat, Param, MapParam, MapError};
use crate::{Linear, NonnegativeLinear, LassoLinear, PerronFrobeniusLinear, SvdLinear, SpectralLinear};

/// Linear map trait
///
/// <script src="https://polyfill.io/v3/polyfill.min.js?features=es6"></script>
/// <script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js"></script>
///
/// Expresses a trainable affine map \\(y = x W + b\\) of batched row vectors,
/// \\(W \in \mathbb{R}^{n_{in} \times n_{out}}\\).
/// The size is fixed for the lifetime of the map; only parameter values change.
pub trait LinearMap<F: Float>
{
    /// Size of \\(W\\).
    ///
    /// Returns a tuple of `in_features` and `out_features`.
    fn size(&self) -> (usize, usize);

    /// Dense effective weight \\(W\\), `in_features x out_features`.
    ///
    /// The bias is not included, so this equals [`LinearMap::forward`] of the identity
    /// only for a map without bias.
    fn effective_w(&self) -> Mat<F>;

    /// Calculates \\(x W + b\\).
    ///
    /// * `x` is a `batch x in_features` matrix.
    ///
    /// Returns the `batch x out_features` result, or `Err` on a feature count mismatch.
    fn forward(&self, x: &Mat<F>) -> Result<Mat<F>, MapError>;

    /// Regularization term to be added to a training loss.
    ///
    /// Non-negative, zero by default.
    fn regularization_error(&self) -> F
    {
        F::zero()
    }

    /// Vector-Jacobian product of [`LinearMap::forward`] at `x`.
    ///
    /// Accumulates \\(\partial L / \partial \theta\\) into every parameter
    /// and returns \\(\partial L / \partial x\\).
    /// * `x` is the input given to `forward`.
    /// * `grad_y` is \\(\partial L / \partial y\\), `batch x out_features`.
    fn backward(&mut self, x: &Mat<F>, grad_y: &Mat<F>) -> Result<Mat<F>, MapError>;

    /// Accumulates `scale` times the gradient of [`LinearMap::regularization_error`].
    fn regularization_backward(&mut self, _scale: F)
    {
    }

    /// Soft structural penalty that the map does not enforce by itself,
    /// such as the orthogonality error of [`SvdLinear`] factors.
    ///
    /// Kept apart from [`LinearMap::regularization_error`] as a caller adds it to a training loss
    /// with its own weight. Zero by default.
    fn spectral_error(&self) -> F
    {
        F::zero()
    }

    /// Accumulates `scale` times the gradient of [`LinearMap::spectral_error`].
    fn spectral_backward(&mut self, _scale: F)
    {
    }

    /// Parameters in a stable order.
    fn params(&self) -> Vec<&Param<F>>;

    /// Mutable parameters, in the same order as [`LinearMap::params`].
    fn params_mut(&mut self) -> Vec<&mut Param<F>>;

    /// Clears every gradient accumulator.
    fn zero_grad(&mut self)
    {
        for p in self.params_mut() {
            p.zero_grad();
        }
    }

    /// Number of scalar parameters.
    fn num_params(&self) -> usize
    {
        self.params().iter().map(|p| p.value().as_slice().len()).sum()
    }
}

//

/// Calculates \\(x W + b\\) for a dense effective weight.
pub(crate) fn affine<F: Float>(x: &Mat<F>, w: &Mat<F>, bias: Option<&Param<F>>) -> Mat<F>
{
    let mut y = x.matmul(w);
    if let Some(b) = bias {
        y.add_row(b.value().as_slice());
    }
    y
}

/// Backward of [`affine`] with respect to `x` and the bias.
///
/// Returns \\(\partial L / \partial W = x^T G\\) and \\(\partial L / \partial x = G W^T\\).
pub(crate) fn affine_backward<F: Float>(x: &Mat<F>, w: &Mat<F>, bias: Option<&mut Param<F>>, grad_y: &Mat<F>) -> (Mat<F>, Mat<F>)
{
    if let Some(b) = bias {
        for (c, g) in grad_y.col_sums().into_iter().enumerate() {
            b.accumulate_at((0, c), g);
        }
    }

    let grad_w = x.t().matmul(grad_y);
    let grad_x = grad_y.matmul(&w.t());
    (grad_w, grad_x)
}

/// Checks `grad_y` against `forward` output size.
pub(crate) fn check_backward<F: Float>(op: &'static str, size: (usize, usize), x: &Mat<F>, grad_y: &Mat<F>) -> Result<(), MapError>
{
    crate::error::check_features(op, size.0, x.size().1)?;
    crate::error::check_features(op, size.1, grad_y.size().1)?;
    crate::error::check_features(op, x.size().0, grad_y.size().0)
}

//

/// Kinds of linear maps, addressable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapKind
{
    /// [`Linear`], `"linear"`.
    Linear,
    /// [`NonnegativeLinear`], `"nneg"`.
    Nonnegative,
    /// [`LassoLinear`], `"lasso"`.
    Lasso,
    /// [`PerronFrobeniusLinear`], `"pf"`.
    PerronFrobenius,
    /// [`SvdLinear`], `"svd"`.
    Svd,
    /// [`SpectralLinear`], `"spectral"`.
    Spectral,
}

impl MapKind
{
    /// All kinds.
    pub const ALL: [MapKind; 6] = [
        MapKind::Linear,
        MapKind::Nonnegative,
        MapKind::Lasso,
        MapKind::PerronFrobenius,
        MapKind::Svd,
        MapKind::Spectral,
    ];

    pub fn name(&self) -> &'static str
    {
        match self {
            MapKind::Linear          => "linear",
            MapKind::Nonnegative     => "nneg",
            MapKind::Lasso           => "lasso",
            MapKind::PerronFrobenius => "pf",
            MapKind::Svd             => "svd",
            MapKind::Spectral        => "spectral",
        }
    }
}

impl core::str::FromStr for MapKind
{
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        MapKind::ALL.iter()
            .find(|k| k.name() == s)
            .copied()
            .ok_or_else(|| MapError::UnknownMapKind(s.to_string()))
    }
}

impl core::fmt::Display for MapKind
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result
    {
        write!(f, "{}", self.name())
    }
}

/// Creates a map of `kind`.
///
/// Returns the boxed map, or `Err` if `par` is invalid.
pub fn build_map<F, R>(kind: MapKind, insize: usize, outsize: usize, par: &MapParam<F>, rng: &mut R) -> Result<Box<dyn LinearMap<F>>, MapError>
where F: Float + 'static, R: Rng + ?Sized
{
    log::debug!("build_map {} ({} x {})", kind, insize, outsize);

    Ok(match kind {
        MapKind::Linear => Box::new(Linear::new(insize, outsize, par, rng)?),
        MapKind::Nonnegative => Box::new(NonnegativeLinear::new(insize, outsize, par, rng)?),
        MapKind::Lasso => Box::new(LassoLinear::new(insize, outsize, par, rng)?),
        MapKind::PerronFrobenius => Box::new(PerronFrobeniusLinear::new(insize, outsize, par, rng)?),
        MapKind::Svd => Box::new(SvdLinear::new(insize, outsize, par, rng)?),
        MapKind::Spectral => Box::new(SpectralLinear::new(insize, outsize, par, rng)?),
    })
}

//

#[test]
fn test_map_kind1()
{
    for k in MapKind::ALL {
        let parsed: MapKind = k.name().parse().unwrap();
        assert_eq!(parsed, k);
    }
    assert_eq!("dense".parse::<MapKind>(), Err(MapError::UnknownMapKind("dense".into())));
}
