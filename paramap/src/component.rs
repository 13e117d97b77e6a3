//! Named-input/named-output components

use num_traits::Float;
use crate::{DataMap, Batch, SimError, Tensor};

/// Component trait
///
/// A callable mapping named input tensors to named output tensors,
/// such as a solution map, a state estimator or a process emulator.
pub trait Component<F: Float>
{
    fn name(&self) -> &str;

    /// Keys read from the input data.
    fn input_keys(&self) -> &[String];

    /// Keys written to the output data.
    fn output_keys(&self) -> &[String];

    /// Input keys which may be absent from the data.
    fn optional_keys(&self) -> &[String]
    {
        &[]
    }

    /// Evaluates the component.
    ///
    /// Returns the outputs, or `Err` if a required input is missing or malformed.
    fn call(&self, data: &DataMap<F>) -> Result<DataMap<F>, SimError>;

    /// Whether `key` is declared optional.
    fn is_optional(&self, key: &str) -> bool
    {
        self.optional_keys().iter().any(|k| k == key)
    }
}

/// Control policy producing an action sequence over a horizon.
pub trait Policy<F: Float>: Component<F>
{
    /// Length of the trailing window the policy reads, and of its horizon.
    fn nsteps(&self) -> usize;
}

/// State estimator reading a trailing window of observations.
pub trait Estimator<F: Float>: Component<F>
{
    fn window_size(&self) -> usize;
}

/// Looks up `key` for `component`, failing with [`SimError::MissingKey`].
pub fn required<'a, F: Float>(component: &str, data: &'a DataMap<F>, key: &str) -> Result<&'a Tensor<F>, SimError>
{
    data.get(key).ok_or_else(|| missing_key(component, key))
}

pub(crate) fn missing_key(component: &str, key: &str) -> SimError
{
    log::error!("{}: missing {}", component, key);
    SimError::MissingKey {
        component: component.to_string(),
        key: key.to_string(),
    }
}

//

type ComponentFn<F> = Box<dyn Fn(&DataMap<F>) -> Result<DataMap<F>, SimError>>;

/// Closure-backed component
///
/// Wraps a closure with declared keys. It also serves as a [`Policy`] with [`FnComponent::nsteps`]
/// and as an [`Estimator`] with [`FnComponent::window_size`].
pub struct FnComponent<F: Float>
{
    name: String,
    input_keys: Vec<String>,
    output_keys: Vec<String>,
    optional_keys: Vec<String>,
    nsteps: usize,
    window_size: usize,
    func: ComponentFn<F>,
}

impl<F: Float> FnComponent<F>
{
    /// Creates an instance with `nsteps` and `window_size` of one.
    pub fn new<M>(name: &str, input_keys: &[&str], output_keys: &[&str], func: M) -> Self
    where M: Fn(&DataMap<F>) -> Result<DataMap<F>, SimError> + 'static
    {
        FnComponent {
            name: name.to_string(),
            input_keys: crate::keys(input_keys),
            output_keys: crate::keys(output_keys),
            optional_keys: Vec::new(),
            nsteps: 1,
            window_size: 1,
            func: Box::new(func),
        }
    }

    /// Builder pattern declaring optional input keys.
    pub fn optional(mut self, keys: &[&str]) -> Self
    {
        self.optional_keys = crate::keys(keys);
        self
    }

    /// Builder pattern of the policy horizon.
    pub fn nsteps(mut self, nsteps: usize) -> Self
    {
        self.nsteps = nsteps;
        self
    }

    /// Builder pattern of the estimator window.
    pub fn window_size(mut self, window_size: usize) -> Self
    {
        self.window_size = window_size;
        self
    }
}

impl<F: Float> Component<F> for FnComponent<F>
{
    fn name(&self) -> &str
    {
        &self.name
    }

    fn input_keys(&self) -> &[String]
    {
        &self.input_keys
    }

    fn output_keys(&self) -> &[String]
    {
        &self.output_keys
    }

    fn optional_keys(&self) -> &[String]
    {
        &self.optional_keys
    }

    fn call(&self, data: &DataMap<F>) -> Result<DataMap<F>, SimError>
    {
        for k in &self.input_keys {
            if !self.is_optional(k) {
                required(&self.name, data, k)?;
            }
        }

        (self.func)(data)
    }
}

impl<F: Float> Policy<F> for FnComponent<F>
{
    fn nsteps(&self) -> usize
    {
        self.nsteps
    }
}

impl<F: Float> Estimator<F> for FnComponent<F>
{
    fn window_size(&self) -> usize
    {
        self.window_size
    }
}

//

/// Composite model consumed by open-loop simulators.
pub trait Model<F: Float>
{
    /// Evaluates the model on a data partition.
    ///
    /// Returns every data entry and output, keyed `"{batch.name}_{key}"`.
    fn call(&self, batch: &Batch<F>) -> Result<DataMap<F>, SimError>;
}

impl<F, M> Model<F> for M
where F: Float, M: Fn(&Batch<F>) -> Result<DataMap<F>, SimError>
{
    fn call(&self, batch: &Batch<F>) -> Result<DataMap<F>, SimError>
    {
        self(batch)
    }
}

/// Components run in order
///
/// Each component sees the batch data together with the outputs of earlier components.
pub struct Composite<F: Float>
{
    components: Vec<Box<dyn Component<F>>>,
}

impl<F: Float> Composite<F>
{
    pub fn new(components: Vec<Box<dyn Component<F>>>) -> Self
    {
        Composite {
            components,
        }
    }

    pub fn components(&self) -> &[Box<dyn Component<F>>]
    {
        &self.components
    }

    /// Runs every component over `data` and returns it extended by their outputs, unprefixed.
    pub fn call_data(&self, data: &DataMap<F>) -> Result<DataMap<F>, SimError>
    {
        let mut data = data.clone();

        for c in &self.components {
            log::trace!("Composite: {}", c.name());
            let out = c.call(&data)?;
            data.extend(out);
        }
        Ok(data)
    }
}

impl<F: Float> Model<F> for Composite<F>
{
    fn call(&self, batch: &Batch<F>) -> Result<DataMap<F>, SimError>
    {
        let data = self.call_data(&batch.data)?;

        Ok(data.into_iter().map(|(k, v)| (batch.key(&k), v)).collect())
    }
}
