use num_traits::Float;
use paramap_core::Mat;
use crate::SimError;

//

/// N-dimensional array
///
/// Owns a `Vec` of data stored in row-major with its shape.
/// Time series are held with the time axis first, `(T, batch, features)`.
/// A rank-0 tensor holds a single scalar.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<F: Float>
{
    shape: Vec<usize>,
    data: Vec<F>,
}

impl<F: Float> Tensor<F>
{
    /// Creates an instance.
    ///
    /// Returns `Err` if the length of `data` differs from the product of `shape`.
    pub fn new(shape: &[usize], data: Vec<F>) -> Result<Self, SimError>
    {
        let n: usize = shape.iter().product();
        if n != data.len() {
            return Err(SimError::ShapeMismatch {
                what: "Tensor::new",
                expected: shape.to_vec(),
                actual: vec![data.len()],
            });
        }

        Ok(Tensor {
            shape: shape.to_vec(),
            data,
        })
    }

    pub fn zeros(shape: &[usize]) -> Self
    {
        Tensor {
            shape: shape.to_vec(),
            data: vec![F::zero(); shape.iter().product()],
        }
    }

    pub fn scalar(v: F) -> Self
    {
        Tensor {
            shape: Vec::new(),
            data: vec![v],
        }
    }

    /// Data by a function of the flat row-major index.
    pub fn by_fn<M>(shape: &[usize], func: M) -> Self
    where M: FnMut(usize) -> F
    {
        let n = shape.iter().product();

        Tensor {
            shape: shape.to_vec(),
            data: (0.. n).map(func).collect(),
        }
    }

    pub fn shape(&self) -> &[usize]
    {
        &self.shape
    }

    pub fn rank(&self) -> usize
    {
        self.shape.len()
    }

    /// Data array in row-major.
    pub fn data(&self) -> &[F]
    {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut[F]
    {
        &mut self.data
    }

    /// Length of the leading axis, zero for a scalar.
    pub fn len0(&self) -> usize
    {
        self.shape.first().copied().unwrap_or(0)
    }

    /// The single value of a one-element tensor.
    pub fn item(&self) -> Option<F>
    {
        if self.data.len() == 1 {Some(self.data[0])} else {None}
    }

    fn stride0(&self) -> usize
    {
        self.shape.iter().skip(1).product()
    }

    /// Elements `start..end` along the leading axis, keeping the rank.
    ///
    /// Returns `None` if the range is out of the leading axis.
    pub fn slice0(&self, start: usize, end: usize) -> Option<Self>
    {
        if self.rank() == 0 || start > end || end > self.len0() {
            return None;
        }

        let st = self.stride0();
        let mut shape = self.shape.clone();
        shape[0] = end - start;

        Some(Tensor {
            shape,
            data: self.data[start * st.. end * st].to_vec(),
        })
    }

    /// Element `i` along the leading axis, dropping that axis.
    pub fn select0(&self, i: usize) -> Option<Self>
    {
        let mut t = self.slice0(i, i + 1)?;
        t.shape.remove(0);
        Some(t)
    }

    /// Overwrites elements from `start` along the leading axis by `src`.
    pub fn set_slice0(&mut self, start: usize, src: &Self) -> Result<(), SimError>
    {
        let st = self.stride0();

        if self.rank() == 0 || self.rank() != src.rank()
           || self.shape[1..] != src.shape[1..] || start + src.len0() > self.len0() {
            return Err(SimError::ShapeMismatch {
                what: "Tensor::set_slice0",
                expected: self.shape.clone(),
                actual: src.shape.clone(),
            });
        }

        self.data[start * st.. start * st + src.data.len()].copy_from_slice(&src.data);
        Ok(())
    }

    /// Same data with another shape of the same number of elements.
    pub fn reshape(&self, shape: &[usize]) -> Result<Self, SimError>
    {
        Tensor::new(shape, self.data.clone())
    }

    /// Concatenates tensors along the leading axis.
    ///
    /// All parts shall have the same rank (at least 1) and trailing shape.
    pub fn concat0(parts: &[Self]) -> Result<Self, SimError>
    {
        let first = Self::check_parts("Tensor::concat0", parts, true)?;
        if first.rank() == 0 {
            return Err(SimError::ShapeMismatch {
                what: "Tensor::concat0",
                expected: vec![1],
                actual: Vec::new(),
            });
        }

        let mut shape = first.shape.clone();
        shape[0] = parts.iter().map(|t| t.len0()).sum();

        Ok(Tensor {
            shape,
            data: parts.iter().flat_map(|t| t.data.iter().copied()).collect(),
        })
    }

    /// Stacks tensors of the same shape along a new leading axis.
    pub fn stack(parts: &[Self]) -> Result<Self, SimError>
    {
        let first = Self::check_parts("Tensor::stack", parts, false)?;

        let mut shape = vec![parts.len()];
        shape.extend_from_slice(&first.shape);

        Ok(Tensor {
            shape,
            data: parts.iter().flat_map(|t| t.data.iter().copied()).collect(),
        })
    }

    // same trailing shape, or same whole shape
    fn check_parts<'a>(what: &'static str, parts: &'a [Self], trailing: bool) -> Result<&'a Self, SimError>
    {
        let first = parts.first().ok_or(SimError::ShapeMismatch {
            what,
            expected: vec![1],
            actual: vec![0],
        })?;

        for t in parts {
            let same = if trailing {
                t.rank() == first.rank() && t.shape.get(1..) == first.shape.get(1..)
            }
            else {
                t.shape == first.shape
            };

            if !same {
                log::error!("{}: {:?} and {:?}", what, first.shape, t.shape);
                return Err(SimError::ShapeMismatch {
                    what,
                    expected: first.shape.clone(),
                    actual: t.shape.clone(),
                });
            }
        }
        Ok(first)
    }

    /// Mean over all elements.
    pub fn mean(&self) -> F
    {
        let n = F::from(self.data.len()).unwrap_or_else(F::nan);

        self.data.iter().fold(F::zero(), |s, v| s + *v) / n
    }

    /// Rank-2 tensor of a matrix.
    pub fn from_mat(m: &Mat<F>) -> Self
    {
        let (nr, nc) = m.size();

        Tensor::by_fn(&[nr, nc], |i| m[(i / nc, i % nc)])
    }

    /// Matrix of a rank-2 tensor.
    pub fn to_mat(&self) -> Result<Mat<F>, SimError>
    {
        match self.shape[..] {
            [nr, nc] => Ok(Mat::new(nr, nc).by_fn(|r, c| self.data[r * nc + c])),
            _ => Err(SimError::ShapeMismatch {
                what: "Tensor::to_mat",
                expected: vec![0, 0],
                actual: self.shape.clone(),
            }),
        }
    }

    /// Matrix of a rank-3 `(T, batch, features)` window, flattened per batch to `batch x (T * features)`.
    ///
    /// Row `b` is the concatenation of `x[0, b, :]`, `x[1, b, :]`, and so on.
    pub fn flatten_time(&self) -> Result<Mat<F>, SimError>
    {
        match self.shape[..] {
            [nt, nb, nf] => Ok(Mat::new(nb, nt * nf).by_fn(|b, c| {
                let (t, f) = (c / nf, c % nf);
                self.data[(t * nb + b) * nf + f]
            })),
            _ => Err(SimError::ShapeMismatch {
                what: "Tensor::flatten_time",
                expected: vec![0, 0, 0],
                actual: self.shape.clone(),
            }),
        }
    }

    /// Inverse of [`Tensor::flatten_time`] for a horizon `h`.
    ///
    /// `m` is `batch x n` with `n` divisible by `h`; returns `(h, batch, n / h)`.
    pub fn unflatten_time(m: &Mat<F>, h: usize) -> Result<Self, SimError>
    {
        let (nb, n) = m.size();
        if h == 0 || n % h != 0 {
            return Err(SimError::ShapeMismatch {
                what: "Tensor::unflatten_time",
                expected: vec![h, nb, 0],
                actual: vec![nb, n],
            });
        }
        let nf = n / h;

        Ok(Tensor::by_fn(&[h, nb, nf], |i| {
            let (t, b, f) = (i / (nb * nf), (i / nf) % nb, i % nf);
            m[(b, t * nf + f)]
        }))
    }
}

//

#[test]
fn test_tensor_slice1()
{
    let t = Tensor::by_fn(&[4, 2, 3], |i| i as f64);

    let s = t.slice0(1, 3).unwrap();
    assert_eq!(s.shape(), &[2, 2, 3]);
    assert_eq!(s.data()[0], 6.);

    let e = t.select0(3).unwrap();
    assert_eq!(e.shape(), &[2, 3]);
    assert_eq!(e.data()[5], 23.);

    assert!(t.slice0(3, 5).is_none());
    assert!(Tensor::scalar(1.).slice0(0, 1).is_none());
}

#[test]
fn test_tensor_concat_stack1()
{
    let a = Tensor::by_fn(&[5, 3], |i| i as f64);
    let b = Tensor::by_fn(&[5, 3], |i| -(i as f64));

    let c = Tensor::concat0(&[a.clone(), b.clone()]).unwrap();
    assert_eq!(c.shape(), &[10, 3]);
    assert_eq!(c.data()[15], 0.);
    assert_eq!(c.data()[16], -1.);

    let s = Tensor::stack(&[a.clone(), b]).unwrap();
    assert_eq!(s.shape(), &[2, 5, 3]);

    let bad = Tensor::<f64>::zeros(&[5, 2]);
    assert!(Tensor::concat0(&[a.clone(), bad.clone()]).is_err());
    assert!(Tensor::stack(&[a, bad]).is_err());
    assert!(Tensor::<f64>::stack(&[]).is_err());
}

#[test]
fn test_tensor_time1()
{
    // (T=2, B=2, f=2)
    let t = Tensor::by_fn(&[2, 2, 2], |i| i as f64);
    let m = t.flatten_time().unwrap();
    assert_eq!(m.size(), (2, 4));
    assert_eq!(m.row(0), vec![0., 1., 4., 5.]);
    assert_eq!(m.row(1), vec![2., 3., 6., 7.]);

    let back = Tensor::unflatten_time(&m, 2).unwrap();
    assert_eq!(back, t);
    assert!(Tensor::unflatten_time(&m, 3).is_err());
}
