/*!
Differentiable solution maps and their simulators.

<script src="https://polyfill.io/v3/polyfill.min.js?features=es6"></script>
<script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js"></script>

This crate for Rust provides **learned solution maps of parametric optimization problems**
built on the structured linear maps of [`paramap_core`],
and **simulators** replaying trained models over time series.

# General usage

1. Express each sub-model as a [`Component`] mapping named [`Tensor`]s to named tensors:
   * [`SolutionMap`] - a multilayer [`paramap_core::LinearMap`] network.
   * [`FnComponent`] - any closure with declared keys, e.g. a process emulator.
1. Chain components into a [`Composite`] model, which qualifies its outputs by partition names.
1. Replay the model:
   * [`OpenLoopSimulator`] - a whole partition at once.
   * [`MultiSequenceOpenLoopSimulator`] - many sequences, aggregated.
   * [`MhOpenLoopSimulator`] - a moving window fed back with the model's own predictions.
   * [`ClosedLoopSimulator`] - a policy, an emulator and an optional estimator stepped in time.

# Examples

```
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;
use paramap::prelude::*;
use paramap::*;

//env_logger::init(); // Use any logger crate as `paramap` uses `log` crate.

let mut rng = Xoshiro256StarStar::seed_from_u64(0);

let sol = SolutionMap::new(
    "sol", &["p"], "x", &[2, 8, 2],
    MapKind::Linear, &MapParam::<f64>::default(), &mut rng,
).unwrap();
let model = Composite::new(vec![Box::new(sol)]);

let mk = |name: &str| Batch::new(name, DataMap::new())
    .with("p", Tensor::by_fn(&[5, 2], |i| i as f64 * 0.1));
let sim = OpenLoopSimulator::new(&model, Partitions::new(mk("train"), mk("dev"), mk("test")));

let out = sim.test_eval().unwrap();
assert_eq!(out["test_x"].shape(), &[5, 2]);
assert!(out.contains_key("dev_reg_error_sol"));
```
*/

mod error;
mod tensor;
mod data;

pub use error::*;
pub use tensor::*;
pub use data::*;

//

mod component;
mod solution_map;

pub use component::*;
pub use solution_map::*;

//

mod simulator;

pub use simulator::*;

//

/// Prelude
pub mod prelude
{
    pub use paramap_core::{Mat, MapParam, MapKind, LinearMap, Init, build_map};
    pub use crate::{Component, Policy, Estimator, Model, Simulator};
}
