use num_traits::Float;
use crate::{Component, Policy, Estimator, DataMap, SimError, Arena};

/// Closed-loop simulation parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedLoopParam
{
    /// Number of simulation steps.
    pub nsim: usize,
    /// Period of steps to output progress log (for debug level).
    pub log_period: usize,
    /// Pairs of an emulator output key and a simulation data key.
    /// The output at step `k` overwrites the data series at `k`, seen by later windows.
    /// A series too short to take it is an error.
    pub feedback: Vec<(String, String)>,
}

impl Default for ClosedLoopParam
{
    fn default() -> Self
    {
        ClosedLoopParam {
            nsim: 100,
            log_period: 10,
            feedback: Vec::new(),
        }
    }
}

/// Closed-loop simulator
///
/// Steps a policy against an emulator over `k = start_k, ..., start_k + nsim - 1`,
/// where `start_k` is the larger of the policy horizon and the estimator window.
/// At each step:
/// 1. The estimator, if any, reads `k - window_size..k` of the simulation data.
/// 1. The policy reads `k - nsteps..k` together with the estimator outputs;
///    only the first time step of its first output key is kept (receding horizon control).
/// 1. The emulator reads `k..k + 1` together with the estimator and policy outputs.
/// 1. The outputs, later ones overriding, are recorded except for `reg_error*` keys.
///
/// A required input key which is neither in the simulation data nor produced upstream is an error;
/// an optional one is skipped.
pub struct ClosedLoopSimulator<F: Float>
{
    sim_data: DataMap<F>,
    policy: Box<dyn Policy<F>>,
    emulator: Box<dyn Component<F>>,
    estimator: Option<Box<dyn Estimator<F>>>,
    /// Parameters, see [`ClosedLoopParam`].
    pub par: ClosedLoopParam,
}

impl<F: Float> ClosedLoopSimulator<F>
{
    /// Creates an instance.
    ///
    /// Returns `Err` if a component cannot take its role:
    /// a policy needs `nsteps >= 1` and an output key, an emulator an output key,
    /// and an estimator `window_size >= 1`.
    pub fn new(sim_data: DataMap<F>, policy: Box<dyn Policy<F>>, emulator: Box<dyn Component<F>>, estimator: Option<Box<dyn Estimator<F>>>) -> Result<Self, SimError>
    {
        let invalid = |arg: &'static str, name: &str, reason: &str| {
            log::error!("{} ({}): {}", arg, name, reason);
            Err(SimError::InvalidComponent {
                arg,
                name: name.to_string(),
                reason: reason.to_string(),
            })
        };

        if policy.nsteps() == 0 {
            return invalid("policy", policy.name(), "nsteps must be positive");
        }
        if policy.output_keys().is_empty() {
            return invalid("policy", policy.name(), "no output key");
        }
        if emulator.output_keys().is_empty() {
            return invalid("emulator", emulator.name(), "no output key");
        }
        if let Some(e) = &estimator {
            if e.window_size() == 0 {
                return invalid("estimator", e.name(), "window_size must be positive");
            }
        }

        Ok(ClosedLoopSimulator {
            sim_data,
            policy,
            emulator,
            estimator,
            par: ClosedLoopParam::default(),
        })
    }

    /// Changes parameters by a closure.
    pub fn par<P>(mut self, f: P) -> Self
    where P: FnOnce(&mut ClosedLoopParam)
    {
        f(&mut self.par);
        self
    }

    /// First time index, the largest moving-horizon window.
    pub fn start_k(&self) -> usize
    {
        let w = self.estimator.as_ref().map_or(0, |e| e.window_size());

        self.policy.nsteps().max(w)
    }

    /// Keys recorded by [`ClosedLoopSimulator::simulate`].
    pub fn cl_keys(&self) -> Vec<String>
    {
        let mut keys = Vec::new();
        if let Some(e) = &self.estimator {
            keys.extend_from_slice(e.output_keys());
        }
        keys.extend_from_slice(self.policy.output_keys());
        keys.extend_from_slice(self.emulator.output_keys());

        keys.retain(|k| !crate::is_reg_error(k));
        keys.sort();
        keys.dedup();
        keys
    }

    /// Runs the closed loop for `nsim` steps.
    ///
    /// Returns a series of `nsim` steps for every recorded key.
    pub fn simulate(&self) -> Result<DataMap<F>, SimError>
    {
        log::debug!("{:?}", self.par);

        let nsim = self.par.nsim;
        let start_k = self.start_k();
        let mut data = self.sim_data.clone();
        let mut arena = Arena::new(self.cl_keys(), nsim);

        let estim_keys = self.estimator.as_ref().map_or(Vec::new(), |e| e.output_keys().to_vec());
        let mut upstream_keys = estim_keys.clone();
        upstream_keys.extend_from_slice(self.policy.output_keys());

        log::info!("----- Started");

        for step in 0.. nsim {
            let k = start_k + step;

            let log_trig = if self.par.log_period > 0 {
                step % self.par.log_period == 0
            }
            else {
                if step == 0 && log::log_enabled!(log::Level::Debug) {
                    log::warn!("log_period == 0: no periodic log");
                }
                false
            };

            // estimator step
            let estim_out = match &self.estimator {
                Some(e) => {
                    let d = step_data(&**e, &data, k - e.window_size(), k, &[])?;
                    e.call(&d)?
                },
                None => DataMap::new(),
            };

            // policy step
            let mut d = step_data(&*self.policy, &data, k - self.policy.nsteps(), k, &estim_keys)?;
            d.extend(estim_out.clone());
            let mut policy_out = self.policy.call(&d)?;
            self.rhc(&mut policy_out, step)?;

            // emulator step
            let mut d = step_data(&*self.emulator, &data, k, k + 1, &upstream_keys)?;
            d.extend(estim_out.clone());
            d.extend(policy_out.clone());
            let emulator_out = self.emulator.call(&d)?;

            for (out_key, data_key) in &self.par.feedback {
                let t = emulator_out.get(out_key).ok_or(SimError::MissingStep {
                    key: out_key.clone(), step,
                })?;
                let series = data.get_mut(data_key).ok_or_else(|| crate::missing_key("ClosedLoopSimulator", data_key))?;
                let end = k + t.len0();
                if end > series.len0() {
                    log::error!("feedback {} -> {} beyond the series", out_key, data_key);
                    return Err(SimError::OutOfRange {
                        key: data_key.clone(), start: k, end, len: series.len0(),
                    });
                }
                series.set_slice0(k, t)?;
            }

            let mut cl_step = estim_out;
            cl_step.extend(policy_out);
            cl_step.extend(emulator_out);

            if log_trig {
                log::debug!("{}: k {} keys {:?}", step, k, cl_step.keys().collect::<Vec<_>>());
            }

            for (key, t) in cl_step {
                if crate::is_reg_error(&key) {
                    continue;
                }
                log::trace!("{}: {} {:?}", step, key, t.shape());
                arena.put(&key, step, t);
            }
        }

        let cl_data = arena.finalize()?;

        log::info!("----- Finished");
        Ok(cl_data)
    }

    /// Receding horizon control, keeping only the first time step of the first policy output.
    fn rhc(&self, policy_out: &mut DataMap<F>, step: usize) -> Result<(), SimError>
    {
        let key = &self.policy.output_keys()[0];

        let t = policy_out.get_mut(key).ok_or_else(|| {
            log::error!("{}: {} not produced", self.policy.name(), key);
            SimError::MissingStep {key: key.clone(), step}
        })?;
        *t = t.slice0(0, 1).ok_or(SimError::ShapeMismatch {
            what: "ClosedLoopSimulator::rhc",
            expected: vec![1],
            actual: t.shape().to_vec(),
        })?;
        Ok(())
    }
}

// time window start..end of the inputs of c
fn step_data<F, C>(c: &C, data: &DataMap<F>, start: usize, end: usize, upstream: &[String]) -> Result<DataMap<F>, SimError>
where F: Float, C: Component<F> + ?Sized
{
    let mut d = DataMap::new();

    for key in c.input_keys() {
        match data.get(key) {
            Some(t) => {
                let w = t.slice0(start, end).ok_or(SimError::OutOfRange {
                    key: key.clone(), start, end, len: t.len0(),
                })?;
                d.insert(key.clone(), w);
            },
            None if upstream.contains(key) => {},
            None if c.is_optional(key) => {
                log::warn!("{}: optional {} absent", c.name(), key);
            },
            None => return Err(crate::missing_key(c.name(), key)),
        }
    }
    Ok(d)
}
