use num_traits::Float;
use crate::{Batch, DataMap, Model, SimError, Simulator, Partitions, Tensor};

/// Multi-sequence open-loop simulator
///
/// Each partition is a list of sequences.
/// The model is evaluated on every sequence, then the outputs are aggregated by
/// [`MultiSequenceOpenLoopSimulator::agg`].
pub struct MultiSequenceOpenLoopSimulator<'a, F: Float>
{
    model: &'a dyn Model<F>,
    data: Partitions<Vec<Batch<F>>>,
    eval_sim: bool,
    stack: bool,
}

impl<'a, F: Float> MultiSequenceOpenLoopSimulator<'a, F>
{
    pub fn new(model: &'a dyn Model<F>, data: Partitions<Vec<Batch<F>>>) -> Self
    {
        MultiSequenceOpenLoopSimulator {
            model,
            data,
            eval_sim: true,
            stack: false,
        }
    }

    /// Builder pattern of [`Simulator::is_eval_sim`].
    pub fn eval_sim(mut self, eval_sim: bool) -> Self
    {
        self.eval_sim = eval_sim;
        self
    }

    /// Builder pattern choosing stacking over concatenation in [`MultiSequenceOpenLoopSimulator::agg`].
    pub fn stack(mut self, stack: bool) -> Self
    {
        self.stack = stack;
        self
    }

    /// Aggregates per-sequence outputs into one.
    ///
    /// Keys are those of the first output.
    /// * Tensors of rank less than 2 are averaged over all their elements into a scalar.
    /// * Others are concatenated along the leading axis, or stacked along a new one.
    ///
    /// Returns `Err` if a later output lacks a key of the first one.
    pub fn agg(&self, outputs: &[DataMap<F>]) -> Result<DataMap<F>, SimError>
    {
        let mut agg = DataMap::new();
        let first = match outputs.first() {
            Some(o) => o,
            None => return Ok(agg),
        };

        for o in &outputs[1..] {
            for k in o.keys().filter(|k| !first.contains_key(*k)) {
                log::warn!("agg: {} ignored", k);
            }
        }

        for (k, t0) in first {
            let mut ts = Vec::with_capacity(outputs.len());
            for o in outputs {
                let t = o.get(k).ok_or_else(|| {
                    log::error!("agg: {} absent", k);
                    SimError::KeyMismatch {key: k.clone()}
                })?;
                ts.push(t.clone());
            }

            let v = if t0.rank() < 2 {
                let all = ts.iter().flat_map(|t| t.data().iter().copied()).collect::<Vec<_>>();
                let n = F::from(all.len()).unwrap_or_else(F::nan);
                Tensor::scalar(all.into_iter().fold(F::zero(), |s, e| s + e) / n)
            }
            else if self.stack {
                Tensor::stack(&ts)?
            }
            else {
                Tensor::concat0(&ts)?
            };
            agg.insert(k.clone(), v);
        }

        Ok(agg)
    }
}

impl<'a, F: Float> Simulator<F> for MultiSequenceOpenLoopSimulator<'a, F>
{
    type Data = [Batch<F>];

    fn partitions(&self) -> Partitions<&[Batch<F>]>
    {
        Partitions::new(&self.data.train[..], &self.data.dev[..], &self.data.test[..])
    }

    fn is_eval_sim(&self) -> bool
    {
        self.eval_sim
    }

    fn simulate(&self, data: &[Batch<F>]) -> Result<DataMap<F>, SimError>
    {
        log::debug!("MultiSequenceOpenLoopSimulator: {} sequences", data.len());

        let outputs = data.iter()
            .map(|d| self.model.call(d))
            .collect::<Result<Vec<_>, _>>()?;

        self.agg(&outputs)
    }
}
