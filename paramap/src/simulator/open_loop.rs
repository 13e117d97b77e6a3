use num_traits::Float;
use crate::{Batch, DataMap, Model, SimError, Simulator, Partitions};

/// Open-loop simulator
///
/// Feeds a whole partition through the model at once.
pub struct OpenLoopSimulator<'a, F: Float>
{
    model: &'a dyn Model<F>,
    data: Partitions<Batch<F>>,
    eval_sim: bool,
}

impl<'a, F: Float> OpenLoopSimulator<'a, F>
{
    pub fn new(model: &'a dyn Model<F>, data: Partitions<Batch<F>>) -> Self
    {
        OpenLoopSimulator {
            model,
            data,
            eval_sim: true,
        }
    }

    /// Builder pattern of [`Simulator::is_eval_sim`].
    pub fn eval_sim(mut self, eval_sim: bool) -> Self
    {
        self.eval_sim = eval_sim;
        self
    }
}

impl<'a, F: Float> Simulator<F> for OpenLoopSimulator<'a, F>
{
    type Data = Batch<F>;

    fn partitions(&self) -> Partitions<&Batch<F>>
    {
        Partitions::new(&self.data.train, &self.data.dev, &self.data.test)
    }

    fn is_eval_sim(&self) -> bool
    {
        self.eval_sim
    }

    fn simulate(&self, data: &Batch<F>) -> Result<DataMap<F>, SimError>
    {
        log::debug!("OpenLoopSimulator: {}", data.name);

        self.model.call(data)
    }
}
