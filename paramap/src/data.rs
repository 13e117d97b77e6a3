use std::collections::BTreeMap;
use num_traits::Float;
use crate::Tensor;

/// Named tensors.
pub type DataMap<F> = BTreeMap<String, Tensor<F>>;

/// A data partition with its name, such as `"train"`, `"dev"` or `"test"`.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch<F: Float>
{
    pub name: String,
    pub data: DataMap<F>,
}

impl<F: Float> Batch<F>
{
    pub fn new(name: &str, data: DataMap<F>) -> Self
    {
        Batch {
            name: name.to_string(),
            data,
        }
    }

    /// Builder pattern adding a tensor.
    pub fn with(mut self, key: &str, t: Tensor<F>) -> Self
    {
        self.data.insert(key.to_string(), t);
        self
    }

    /// `key` qualified by the partition name, `"{name}_{key}"`.
    pub fn key(&self, key: &str) -> String
    {
        format!("{}_{}", self.name, key)
    }
}

/// Keys owned by a list of `&str`.
pub fn keys(k: &[&str]) -> Vec<String>
{
    k.iter().map(|s| s.to_string()).collect()
}

/// Whether `key` carries a regularization error, excluded from simulated trajectories.
pub fn is_reg_error(key: &str) -> bool
{
    key.starts_with("reg_error")
}
