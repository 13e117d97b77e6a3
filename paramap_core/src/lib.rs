/*!
Structured, spectrally-constrained linear maps.

<script src="https://polyfill.io/v3/polyfill.min.js?features=es6"></script>
<script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js"></script>

This crate for Rust provides **trainable linear map layers** \\(y = x W + b\\)
whose weight \\(W\\) is parameterized so that it stays structured:

* [`Linear`] - dense, unconstrained.
* [`NonnegativeLinear`] - elementwise non-negative.
* [`LassoLinear`] - difference of non-negative parts with an L1 shrinkage term.
* [`PerronFrobeniusLinear`] - bounded row sums, hence a bounded dominant eigenvalue.
* [`SvdLinear`] - \\(Q_U \Sigma Q_V\\) with near-orthogonal factors ([`OrthogonalWeight`]).
* [`SpectralLinear`] - \\(H_U \Sigma H_V\\) with products of Householder reflections.

Singular values of [`SvdLinear`] and [`SpectralLinear`] are squashed into
\\([\sigma_{\rm min}, \sigma_{\rm max}]\\) by a sigmoid, independently of parameter values.

Every map implements [`LinearMap`], which also carries an explicit reverse-mode
`backward` so that a caller can train the maps by gradient descent.

# Examples

```
use float_eq::assert_float_eq;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;
use paramap_core::*;

//env_logger::init(); // Use any logger crate as `paramap_core` uses `log` crate.

let mut rng = Xoshiro256StarStar::seed_from_u64(0);

let par = MapParam::<f64>::spectral().par(|p| {
    p.sigma_min = 0.5;
    p.sigma_max = 0.9;
});
let map = build_map(MapKind::Spectral, 4, 6, &par, &mut rng).unwrap();

let x = Mat::new(3, 4).by_fn(|r, c| (r + c) as f64);
let y = map.forward(&x).unwrap();
assert_eq!(y.size(), (3, 6));

let w = map.effective_w();
for s in w.singular_values(1e-12) {
    assert!(s >= 0.5 - 1e-9 && s <= 0.9 + 1e-9);
}
assert_float_eq!(map.regularization_error(), 0., abs <= 0.);
```
*/

pub mod linalg;
mod mat;
mod error;
mod param;
mod map;
mod map_linear;
mod map_nonneg;
mod map_lasso;
mod map_pf;
mod orthogonal;
mod map_svd;
mod map_spectral;

pub use mat::*;
pub use error::*;
pub use param::*;
pub use map::*;
pub use map_linear::*;
pub use map_nonneg::*;
pub use map_lasso::*;
pub use map_pf::*;
pub use orthogonal::*;
pub use map_svd::*;
pub use map_spectral::*;
