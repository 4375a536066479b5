//! Runtime values.

use std::fmt;

use crate::error::EvalError;

/// A runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Index(i64),
    Float(f64),
    Tensor(Tensor),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Index(_) => "index",
            Value::Float(_) => "float",
            Value::Tensor(_) => "tensor",
        }
    }

    pub fn as_index(&self, op: &str) -> Result<i64, EvalError> {
        match self {
            Value::Index(i) => Ok(*i),
            other => Err(mismatch(op, "index", other)),
        }
    }

    pub fn as_tensor(&self, op: &str) -> Result<&Tensor, EvalError> {
        match self {
            Value::Tensor(t) => Ok(t),
            other => Err(mismatch(op, "tensor", other)),
        }
    }

    /// Scalar payload as an element value. Index scalars widen to `f64`.
    pub fn as_element(&self, op: &str) -> Result<f64, EvalError> {
        match self {
            Value::Index(i) => Ok(*i as f64),
            Value::Float(f) => Ok(*f),
            other => Err(mismatch(op, "scalar", other)),
        }
    }

    pub fn into_tensor(self, op: &str) -> Result<Tensor, EvalError> {
        match self {
            Value::Tensor(t) => Ok(t),
            other => Err(mismatch(op, "tensor", &other)),
        }
    }
}

fn mismatch(op: &str, expected: &'static str, found: &Value) -> EvalError {
    EvalError::TypeMismatch {
        op: op.to_string(),
        expected,
        found: found.kind(),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Index(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Tensor(t) => write!(f, "{t}"),
        }
    }
}

impl From<Tensor> for Value {
    fn from(t: Tensor) -> Self {
        Value::Tensor(t)
    }
}

// ============================================================================
// Tensor
// ============================================================================

/// A dense tensor of `f64` stored in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl Tensor {
    pub fn new(shape: Vec<usize>, data: Vec<f64>) -> Result<Self, EvalError> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(EvalError::DataLength {
                shape,
                expected,
                found: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    pub fn zeros(shape: Vec<usize>) -> Self {
        let len = shape.iter().product();
        Self {
            shape,
            data: vec![0.0; len],
        }
    }

    /// Build a tensor by evaluating `f` at every multi-index, row-major.
    pub fn from_fn(shape: Vec<usize>, mut f: impl FnMut(&[usize]) -> f64) -> Self {
        let mut data = Vec::with_capacity(shape.iter().product());
        for_each_index(&shape, |idx| data.push(f(idx)));
        Self { shape, data }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn get(&self, idx: &[usize]) -> Option<f64> {
        if idx.len() != self.rank() || idx.iter().zip(&self.shape).any(|(i, n)| i >= n) {
            return None;
        }
        Some(self.data[self.linear(idx)])
    }

    fn linear(&self, idx: &[usize]) -> usize {
        idx.iter()
            .zip(&self.shape)
            .fold(0, |acc, (&i, &n)| acc * n + i)
    }

    /// A copy with every element set to `value`.
    pub fn filled(&self, value: f64) -> Self {
        Self {
            shape: self.shape.clone(),
            data: vec![value; self.data.len()],
        }
    }

    pub fn add(&self, other: &Tensor) -> Result<Self, EvalError> {
        if self.shape != other.shape {
            return Err(EvalError::ShapeMismatch {
                expected: self.shape.clone(),
                found: other.shape.clone(),
            });
        }
        let data = self.data.iter().zip(&other.data).map(|(a, b)| a + b).collect();
        Ok(Self {
            shape: self.shape.clone(),
            data,
        })
    }

    /// The elements selected by `window`, as a tensor of shape `window.sizes`.
    pub fn extract(&self, window: &Window) -> Result<Self, EvalError> {
        window.check_against(&self.shape)?;
        let mut data = Vec::with_capacity(window.sizes.iter().product());
        let mut src = vec![0; self.rank()];
        for_each_index(&window.sizes, |idx| {
            window.map(idx, &mut src);
            data.push(self.data[self.linear(&src)]);
        });
        Ok(Self {
            shape: window.sizes.clone(),
            data,
        })
    }

    /// A copy of `self` with the elements selected by `window` replaced by
    /// `src`, which must have shape `window.sizes`.
    pub fn insert(&self, src: &Tensor, window: &Window) -> Result<Self, EvalError> {
        window.check_against(&self.shape)?;
        if src.shape != window.sizes {
            return Err(EvalError::ShapeMismatch {
                expected: window.sizes.clone(),
                found: src.shape.clone(),
            });
        }
        let mut out = self.clone();
        let mut dest = vec![0; self.rank()];
        let mut next = src.data.iter();
        for_each_index(&window.sizes, |idx| {
            window.map(idx, &mut dest);
            let at = out.linear(&dest);
            if let Some(&v) = next.next() {
                out.data[at] = v;
            }
        });
        Ok(out)
    }
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = self.shape.iter().map(usize::to_string).collect();
        let items: Vec<String> = self.data.iter().map(f64::to_string).collect();
        write!(f, "tensor<{}>[{}]", dims.join("x"), items.join(", "))
    }
}

/// Visit every multi-index of `shape` in row-major order.
fn for_each_index(shape: &[usize], mut f: impl FnMut(&[usize])) {
    if shape.iter().any(|&n| n == 0) {
        return;
    }
    let mut idx = vec![0; shape.len()];
    loop {
        f(&idx);
        let mut d = shape.len();
        loop {
            if d == 0 {
                return;
            }
            d -= 1;
            idx[d] += 1;
            if idx[d] < shape[d] {
                break;
            }
            idx[d] = 0;
        }
    }
}

// ============================================================================
// Window
// ============================================================================

/// A strided rectangular selection: per dimension, `sizes[d]` elements
/// starting at `offsets[d]`, `strides[d]` apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub offsets: Vec<usize>,
    pub sizes: Vec<usize>,
    pub strides: Vec<usize>,
}

impl Window {
    /// Build a window from index operands, rejecting negative values and
    /// zero strides.
    pub fn from_indices(offsets: &[i64], sizes: &[i64], strides: &[i64]) -> Result<Self, EvalError> {
        let window = Self {
            offsets: to_usize(offsets)?,
            sizes: to_usize(sizes)?,
            strides: to_usize(strides)?,
        };
        if let Some(&stride) = window.strides.iter().find(|&&s| s == 0) {
            return Err(EvalError::ZeroStride { stride });
        }
        Ok(window)
    }

    /// The whole of dimension 0 from `offset` for `size` rows, trailing
    /// dimensions complete.
    pub fn leading(shape: &[usize], offset: usize, size: usize) -> Self {
        let mut offsets = vec![0; shape.len()];
        let mut sizes = shape.to_vec();
        if let (Some(o), Some(s)) = (offsets.first_mut(), sizes.first_mut()) {
            *o = offset;
            *s = size;
        }
        Self {
            offsets,
            sizes,
            strides: vec![1; shape.len()],
        }
    }

    pub fn rank(&self) -> usize {
        self.offsets.len()
    }

    fn check_against(&self, shape: &[usize]) -> Result<(), EvalError> {
        if self.rank() != shape.len() {
            return Err(EvalError::RankMismatch {
                expected: shape.len(),
                found: self.rank(),
            });
        }
        for (dim, &extent) in shape.iter().enumerate() {
            let (offset, size, stride) = (self.offsets[dim], self.sizes[dim], self.strides[dim]);
            let end = if size == 0 {
                offset
            } else {
                offset + (size - 1) * stride + 1
            };
            if end > extent {
                return Err(EvalError::OutOfBounds {
                    dim,
                    offset,
                    size,
                    stride,
                    extent,
                });
            }
        }
        Ok(())
    }

    fn map(&self, idx: &[usize], out: &mut [usize]) {
        for (d, &i) in idx.iter().enumerate() {
            out[d] = self.offsets[d] + i * self.strides[d];
        }
    }
}

fn to_usize(values: &[i64]) -> Result<Vec<usize>, EvalError> {
    values
        .iter()
        .map(|&value| usize::try_from(value).map_err(|_| EvalError::NegativeIndex { value }))
        .collect()
}
