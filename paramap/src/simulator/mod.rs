mod open_loop;
mod multi_sequence;
mod mh_open_loop;
mod arena;
mod closed_loop;

pub use open_loop::*;
pub use multi_sequence::*;
pub use mh_open_loop::*;
pub use arena::*;
pub use closed_loop::*;

//

use num_traits::Float;
use crate::{DataMap, SimError};

/// Train, dev and test data partitions.
#[derive(Debug, Clone, PartialEq)]
pub struct Partitions<D>
{
    pub train: D,
    pub dev: D,
    pub test: D,
}

impl<D> Partitions<D>
{
    pub fn new(train: D, dev: D, test: D) -> Self
    {
        Partitions {
            train, dev, test,
        }
    }
}

/// Simulator trait
///
/// Replays a trained model over data partitions it was constructed with.
/// No state is kept between calls.
pub trait Simulator<F: Float>
{
    /// Data of one partition.
    type Data: ?Sized;

    /// Partitions given at construction.
    fn partitions(&self) -> Partitions<&Self::Data>;

    /// Whether [`Simulator::dev_eval`] evaluates at all.
    fn is_eval_sim(&self) -> bool;

    /// Simulates the model over `data`.
    fn simulate(&self, data: &Self::Data) -> Result<DataMap<F>, SimError>;

    /// Simulation of the dev partition, or an empty map if evaluation is off.
    fn dev_eval(&self) -> Result<DataMap<F>, SimError>
    {
        if self.is_eval_sim() {
            self.simulate(self.partitions().dev)
        }
        else {
            Ok(DataMap::new())
        }
    }

    /// Union of the simulations of the train, dev and test partitions.
    ///
    /// Output keys are qualified by partition names, so they do not collide.
    fn test_eval(&self) -> Result<DataMap<F>, SimError>
    {
        let parts = self.partitions();
        let mut all = DataMap::new();

        for data in [parts.train, parts.dev, parts.test] {
            all.extend(self.simulate(data)?);
        }
        Ok(all)
    }
}
