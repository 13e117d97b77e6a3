use num_traits::Float;
use rand::Rng;
use paramap_core::{LinearMap, Mat, MapKind, MapParam, build_map};
use paramap_core::linalg::relu;
use crate::{Component, DataMap, SimError, Tensor};

//

/// Learned solution map
///
/// <script src="https://polyfill.io/v3/polyfill.min.js?features=es6"></script>
/// <script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js"></script>
///
/// A multilayer map \\(x \mapsto L_n(\cdots {\rm relu}(L_1(x)))\\) of [`LinearMap`] layers
/// from problem parameters to a solution.
///
/// As a [`Component`], its inputs are concatenated along the feature axis,
/// with a `(T, batch, f)` window flattened to `batch x (T * f)`.
/// It writes its output key, either `batch x out` or `(h, batch, out / h)` for a horizon `h`,
/// and `reg_error_{name}`, the sum of the regularization and spectral errors of its layers.
pub struct SolutionMap<F: Float>
{
    name: String,
    input_keys: Vec<String>,
    output_keys: Vec<String>,
    optional_keys: Vec<String>,
    layers: Vec<Box<dyn LinearMap<F>>>,
    horizon: Option<usize>,
}

impl<F: Float + 'static> SolutionMap<F>
{
    /// Creates an instance with layers of `kind`.
    ///
    /// * `sizes` lists the input size, hidden sizes and the output size.
    pub fn new<R>(name: &str, input_keys: &[&str], output_key: &str, sizes: &[usize], kind: MapKind, par: &MapParam<F>, rng: &mut R) -> Result<Self, SimError>
    where R: Rng + ?Sized
    {
        if sizes.len() < 2 {
            return Err(SimError::InvalidComponent {
                arg: "sizes",
                name: name.to_string(),
                reason: format!("{} sizes given, at least input and output are required", sizes.len()),
            });
        }

        let mut layers = Vec::new();
        for w in sizes.windows(2) {
            layers.push(build_map(kind, w[0], w[1], par, rng)?);
        }
        log::info!("SolutionMap {}: {:?} of {}", name, sizes, kind);

        Self::from_layers(name, input_keys, output_key, layers)
    }
}

impl<F: Float> SolutionMap<F>
{
    /// Creates an instance of given layers.
    pub fn from_layers(name: &str, input_keys: &[&str], output_key: &str, layers: Vec<Box<dyn LinearMap<F>>>) -> Result<Self, SimError>
    {
        let invalid = |reason: String| SimError::InvalidComponent {
            arg: "layers",
            name: name.to_string(),
            reason,
        };

        if layers.is_empty() {
            return Err(invalid("no layer".into()));
        }
        for (i, w) in layers.windows(2).enumerate() {
            if w[0].size().1 != w[1].size().0 {
                return Err(invalid(format!("layer {} outputs {}, layer {} takes {}", i, w[0].size().1, i + 1, w[1].size().0)));
            }
        }

        Ok(SolutionMap {
            name: name.to_string(),
            input_keys: crate::keys(input_keys),
            output_keys: vec![output_key.to_string(), format!("reg_error_{}", name)],
            optional_keys: Vec::new(),
            layers,
            horizon: None,
        })
    }

    /// Builder pattern of an output horizon `h`, reshaping the output to `(h, batch, out / h)`.
    pub fn with_horizon(mut self, h: usize) -> Result<Self, SimError>
    {
        let n = self.outsize();
        if h == 0 || n % h != 0 {
            return Err(SimError::InvalidComponent {
                arg: "horizon",
                name: self.name.clone(),
                reason: format!("output size {} is not divisible by {}", n, h),
            });
        }

        self.horizon = Some(h);
        Ok(self)
    }

    /// Builder pattern declaring optional input keys.
    pub fn optional(mut self, keys: &[&str]) -> Self
    {
        self.optional_keys = crate::keys(keys);
        self
    }

    pub fn layers(&self) -> &[Box<dyn LinearMap<F>>]
    {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut[Box<dyn LinearMap<F>>]
    {
        &mut self.layers
    }

    pub fn insize(&self) -> usize
    {
        self.layers[0].size().0
    }

    pub fn outsize(&self) -> usize
    {
        self.layers[self.layers.len() - 1].size().1
    }

    /// Key of the solution output.
    pub fn output_key(&self) -> &str
    {
        &self.output_keys[0]
    }

    /// Input matrix, the feature-wise concatenation of the input tensors.
    pub fn input_mat(&self, data: &DataMap<F>) -> Result<Mat<F>, SimError>
    {
        let mut parts = Vec::new();

        for k in &self.input_keys {
            let t = match data.get(k) {
                Some(t) => t,
                None if self.is_optional(k) => {
                    log::warn!("{}: optional {} absent", self.name, k);
                    continue;
                },
                None => return Err(crate::missing_key(&self.name, k)),
            };
            parts.push(if t.rank() == 3 {t.flatten_time()?} else {t.to_mat()?});
        }

        hcat(&parts)
    }

    /// Evaluates the layers on `x`, `batch x insize`.
    pub fn forward_mat(&self, x: &Mat<F>) -> Result<Mat<F>, SimError>
    {
        let last = self.layers.len() - 1;
        let mut a = x.clone();

        for (i, l) in self.layers.iter().enumerate() {
            a = l.forward(&a)?;
            if i < last {
                a = a.map(relu);
            }
        }
        Ok(a)
    }

    /// Vector-Jacobian product of [`SolutionMap::forward_mat`] at `x`.
    ///
    /// Accumulates gradients into every layer parameter and returns \\(\partial L / \partial x\\).
    pub fn backward(&mut self, x: &Mat<F>, grad_y: &Mat<F>) -> Result<Mat<F>, SimError>
    {
        let last = self.layers.len() - 1;
        let f0 = F::zero();

        // inputs of each layer and pre-activations of hidden layers
        let mut inputs = vec![x.clone()];
        let mut pre = Vec::new();
        for (i, l) in self.layers.iter().enumerate() {
            let z = l.forward(&inputs[i])?;
            if i < last {
                inputs.push(z.map(relu));
            }
            pre.push(z);
        }

        let mut g = grad_y.clone();
        for i in (0..= last).rev() {
            if i < last {
                g = g.zip_map(&pre[i], |g, z| if z > f0 {g} else {f0});
            }
            g = self.layers[i].backward(&inputs[i], &g)?;
        }
        Ok(g)
    }

    /// Sum of the regularization errors of the layers.
    pub fn regularization_error(&self) -> F
    {
        self.layers.iter().fold(F::zero(), |s, l| s + l.regularization_error())
    }

    /// Accumulates `scale` times the gradient of [`SolutionMap::regularization_error`].
    pub fn regularization_backward(&mut self, scale: F)
    {
        for l in &mut self.layers {
            l.regularization_backward(scale);
        }
    }

    /// Sum of the spectral errors of the layers, see [`LinearMap::spectral_error`].
    pub fn spectral_error(&self) -> F
    {
        self.layers.iter().fold(F::zero(), |s, l| s + l.spectral_error())
    }

    /// Accumulates `scale` times the gradient of [`SolutionMap::spectral_error`].
    pub fn spectral_backward(&mut self, scale: F)
    {
        for l in &mut self.layers {
            l.spectral_backward(scale);
        }
    }

    pub fn zero_grad(&mut self)
    {
        for l in &mut self.layers {
            l.zero_grad();
        }
    }

    /// Plain gradient step of every trainable parameter.
    pub fn descend(&mut self, lr: F)
    {
        for l in &mut self.layers {
            for p in l.params_mut() {
                p.descend(lr);
            }
        }
    }
}

impl<F: Float> Component<F> for SolutionMap<F>
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
        let x = self.input_mat(data)?;
        let y = self.forward_mat(&x)?;

        let y = match self.horizon {
            Some(h) => Tensor::unflatten_time(&y, h)?,
            None => Tensor::from_mat(&y),
        };

        let mut out = DataMap::new();
        out.insert(self.output_keys[0].clone(), y);
        out.insert(self.output_keys[1].clone(), Tensor::scalar(self.regularization_error() + self.spectral_error()));
        Ok(out)
    }
}

// feature-wise concatenation
fn hcat<F: Float>(parts: &[Mat<F>]) -> Result<Mat<F>, SimError>
{
    let nb = parts.first().map(|m| m.size().0).unwrap_or(0);
    let mut nc = 0;

    for m in parts {
        if m.size().0 != nb {
            return Err(SimError::ShapeMismatch {
                what: "SolutionMap inputs",
                expected: vec![nb],
                actual: vec![m.size().0],
            });
        }
        nc += m.size().1;
    }

    let mut out = Mat::new(nb, nc);
    let mut c0 = 0;
    for m in parts {
        let (_, mc) = m.size();
        for c in 0.. mc {
            out.as_mut_slice()[(c0 + c) * nb.. (c0 + c + 1) * nb].copy_from_slice(m.col(c));
        }
        c0 += mc;
    }
    Ok(out)
}
