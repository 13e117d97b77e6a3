use std::collections::BTreeMap;
use num_traits::Float;
use crate::{DataMap, SimError, Tensor};

/// Pre-sized per-key step storage
///
/// Holds a fixed number of slots for each key, one per simulation step.
pub struct Arena<F: Float>
{
    nsim: usize,
    slots: BTreeMap<String, Vec<Option<Tensor<F>>>>,
}

impl<F: Float> Arena<F>
{
    /// Creates an instance with `nsim` empty slots for each of `keys`.
    pub fn new<I>(keys: I, nsim: usize) -> Self
    where I: IntoIterator<Item=String>
    {
        Arena {
            nsim,
            slots: keys.into_iter().map(|k| (k, vec![None; nsim])).collect(),
        }
    }

    pub fn nsim(&self) -> usize
    {
        self.nsim
    }

    pub fn keys(&self) -> impl Iterator<Item=&String>
    {
        self.slots.keys()
    }

    /// Stores `t` at `step` of `key`.
    ///
    /// Returns `false` without storing if `key` is not tracked.
    pub fn put(&mut self, key: &str, step: usize, t: Tensor<F>) -> bool
    {
        assert!(step < self.nsim);

        if let Some(s) = self.slots.get_mut(key) {
            s[step] = Some(t);
            true
        }
        else {
            false
        }
    }

    /// Joins the steps of every key.
    ///
    /// Step tensors are concatenated along the leading axis, or stacked if they are scalars.
    /// Returns `Err` if any slot is left empty.
    pub fn finalize(self) -> Result<DataMap<F>, SimError>
    {
        let mut out = DataMap::new();

        for (key, slots) in self.slots {
            let mut ts = Vec::with_capacity(slots.len());
            for (step, s) in slots.into_iter().enumerate() {
                match s {
                    Some(t) => ts.push(t),
                    None => {
                        log::error!("Arena: {} empty at step {}", key, step);
                        return Err(SimError::MissingStep {key, step});
                    },
                }
            }

            let joined = if ts.first().map_or(false, |t| t.rank() == 0) {
                Tensor::stack(&ts)?
            }
            else {
                Tensor::concat0(&ts)?
            };
            out.insert(key, joined);
        }

        Ok(out)
    }
}

//

#[test]
fn test_arena1()
{
    let mut a = Arena::<f64>::new(vec!["u".to_string(), "loss".to_string()], 3);

    for step in 0.. 3 {
        assert!(a.put("u", step, Tensor::zeros(&[1, 2, 4])));
        assert!(a.put("loss", step, Tensor::scalar(step as f64)));
        assert!(!a.put("reg_error_policy", step, Tensor::scalar(0.)));
    }

    let out = a.finalize().unwrap();
    assert_eq!(out["u"].shape(), &[3, 2, 4]);
    assert_eq!(out["loss"].data(), &[0., 1., 2.]);

    let mut b = Arena::<f64>::new(vec!["y".to_string()], 2);
    b.put("y", 1, Tensor::zeros(&[1, 1]));
    assert_eq!(b.finalize(), Err(SimError::MissingStep {key: "y".to_string(), step: 0}));
}
