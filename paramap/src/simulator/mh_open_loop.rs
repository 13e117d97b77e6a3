use std::collections::BTreeMap;
use num_traits::Float;
use crate::{Batch, DataMap, Model, SimError, Simulator, Partitions, Tensor};

/// Moving-horizon simulation parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct MhParam
{
    /// Length of the moving window.
    pub nsteps: usize,
    /// Data key replaced by a rolling window of the model's own predictions.
    pub feedback: String,
    /// Model output key (before partition qualification) of the predictions.
    pub prediction: String,
}

impl Default for MhParam
{
    fn default() -> Self
    {
        MhParam {
            nsteps: 1,
            feedback: "Yp".to_string(),
            prediction: "Y_pred".to_string(),
        }
    }
}

/// Moving-horizon open-loop simulator
///
/// For \\(i = 0, \ldots, T - n - 1\\) with the window length \\(n\\),
/// every series is windowed to `i..i + n` and the feedback series is replaced by
/// the latest \\(n\\) predictions of the model, initially the first \\(n\\) rows of that series.
/// The first time step of every output is recorded and the records are stacked
/// into `(T - n, ...)` tensors, merged over the input data.
pub struct MhOpenLoopSimulator<'a, F: Float>
{
    model: &'a dyn Model<F>,
    data: Partitions<Batch<F>>,
    eval_sim: bool,
    /// Parameters, see [`MhParam`].
    pub par: MhParam,
}

impl<'a, F: Float> MhOpenLoopSimulator<'a, F>
{
    pub fn new(model: &'a dyn Model<F>, data: Partitions<Batch<F>>) -> Self
    {
        MhOpenLoopSimulator {
            model,
            data,
            eval_sim: true,
            par: MhParam::default(),
        }
    }

    /// Changes parameters by a closure.
    pub fn par<P>(mut self, f: P) -> Self
    where P: FnOnce(&mut MhParam)
    {
        f(&mut self.par);
        self
    }

    /// Builder pattern of [`Simulator::is_eval_sim`].
    pub fn eval_sim(mut self, eval_sim: bool) -> Self
    {
        self.eval_sim = eval_sim;
        self
    }

    fn horizon_data(&self, batch: &Batch<F>, i: usize) -> Result<Batch<F>, SimError>
    {
        let n = self.par.nsteps;
        let mut step = Batch::new(&batch.name, DataMap::new());

        for (k, v) in &batch.data {
            let w = if v.rank() == 0 {
                v.clone()
            }
            else {
                v.slice0(i, i + n).ok_or(SimError::OutOfRange {
                    key: k.clone(), start: i, end: i + n, len: v.len0(),
                })?
            };
            step.data.insert(k.clone(), w);
        }
        Ok(step)
    }
}

impl<'a, F: Float> Simulator<F> for MhOpenLoopSimulator<'a, F>
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

    fn simulate(&self, batch: &Batch<F>) -> Result<DataMap<F>, SimError>
    {
        log::debug!("{:?}", self.par);

        let n = self.par.nsteps;
        let fb_key = &self.par.feedback;
        let pred_key = batch.key(&self.par.prediction);

        let fb = crate::required("MhOpenLoopSimulator", &batch.data, fb_key)?;
        let nt = fb.len0();
        let mut y_n = fb.slice0(0, n).filter(|_| n > 0).ok_or(SimError::OutOfRange {
            key: fb_key.clone(), start: 0, end: n, len: nt,
        })?;

        log::info!("----- Started");

        let mut rec: BTreeMap<String, Vec<Tensor<F>>> = BTreeMap::new();

        for i in 0.. nt - n {
            let mut step = self.horizon_data(batch, i)?;
            step.data.insert(fb_key.clone(), y_n.clone());

            let out = self.model.call(&step)?;

            let pred = crate::required("MhOpenLoopSimulator", &out, &pred_key)?;
            let y = pred.slice0(0, 1).ok_or(SimError::OutOfRange {
                key: pred_key.clone(), start: 0, end: 1, len: pred.len0(),
            })?;
            y_n = Tensor::concat0(&[y_n, y])?.slice0(1, n + 1).ok_or(SimError::OutOfRange {
                key: fb_key.clone(), start: 1, end: n + 1, len: n + 1,
            })?;
            log::trace!("{}: {:?}", i, y_n.shape());

            for (k, t) in out {
                let first = if t.rank() == 0 {
                    t
                }
                else {
                    t.select0(0).ok_or(SimError::OutOfRange {
                        key: k.clone(), start: 0, end: 1, len: 0,
                    })?
                };
                rec.entry(k).or_default().push(first);
            }
        }

        let mut result = batch.data.clone();
        for (k, ts) in rec {
            result.insert(k, Tensor::stack(&ts)?);
        }

        log::info!("----- Finished");
        Ok(result)
    }
}
