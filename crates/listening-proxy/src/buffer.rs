//! Fixed-width numeric buffers.

use std::fmt;

/// Element kind of a [`NumericBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericKind {
    Int8,
    Uint8,
    Uint8Clamped,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Float32,
    Float64,
}

impl NumericKind {
    pub fn name(self) -> &'static str {
        match self {
            NumericKind::Int8 => "Int8Array",
            NumericKind::Uint8 => "Uint8Array",
            NumericKind::Uint8Clamped => "Uint8ClampedArray",
            NumericKind::Int16 => "Int16Array",
            NumericKind::Uint16 => "Uint16Array",
            NumericKind::Int32 => "Int32Array",
            NumericKind::Uint32 => "Uint32Array",
            NumericKind::Float32 => "Float32Array",
            NumericKind::Float64 => "Float64Array",
        }
    }

    pub fn bytes_per_element(self) -> usize {
        match self {
            NumericKind::Int8 | NumericKind::Uint8 | NumericKind::Uint8Clamped => 1,
            NumericKind::Int16 | NumericKind::Uint16 => 2,
            NumericKind::Int32 | NumericKind::Uint32 | NumericKind::Float32 => 4,
            NumericKind::Float64 => 8,
        }
    }

    /// Converts `n` to the value an element of this kind actually stores.
    pub fn coerce(self, n: f64) -> f64 {
        match self {
            NumericKind::Int8 => wrap_integer(n, 8, true),
            NumericKind::Uint8 => wrap_integer(n, 8, false),
            NumericKind::Uint8Clamped => {
                if n.is_nan() {
                    0.0
                } else {
                    n.clamp(0.0, 255.0).round_ties_even()
                }
            }
            NumericKind::Int16 => wrap_integer(n, 16, true),
            NumericKind::Uint16 => wrap_integer(n, 16, false),
            NumericKind::Int32 => wrap_integer(n, 32, true),
            NumericKind::Uint32 => wrap_integer(n, 32, false),
            NumericKind::Float32 => {
                if n.is_nan() {
                    f64::NAN
                } else {
                    f64::from(n as f32)
                }
            }
            NumericKind::Float64 => {
                if n.is_nan() {
                    f64::NAN
                } else {
                    n
                }
            }
        }
    }
}

fn wrap_integer(n: f64, bits: i32, signed: bool) -> f64 {
    if !n.is_finite() {
        return 0.0;
    }
    let modulus = 2f64.powi(bits);
    let wrapped = n.trunc().rem_euclid(modulus) + 0.0;
    if signed && wrapped >= modulus / 2.0 {
        wrapped - modulus
    } else {
        wrapped
    }
}

/// A fixed-length buffer of numbers, each coerced to its element kind on write.
#[derive(Clone, PartialEq)]
pub struct NumericBuffer {
    kind: NumericKind,
    items: Vec<f64>,
}

impl NumericBuffer {
    /// A zero-filled buffer.
    pub fn new(kind: NumericKind, len: usize) -> Self {
        NumericBuffer {
            kind,
            items: vec![0.0; len],
        }
    }

    pub fn from_values<I>(kind: NumericKind, values: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        NumericBuffer {
            kind,
            items: values.into_iter().map(|n| kind.coerce(n)).collect(),
        }
    }

    pub fn kind(&self) -> NumericKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.items.get(index).copied()
    }

    /// Coerced write. Out-of-range writes are ignored and return `false`.
    pub fn set(&mut self, index: usize, n: f64) -> bool {
        let kind = self.kind;
        match self.items.get_mut(index) {
            Some(slot) => {
                *slot = kind.coerce(n);
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.items.iter().copied()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.items
    }

    pub fn fill(&mut self, n: f64, start: usize, end: usize) {
        let n = self.kind.coerce(n);
        let end = end.min(self.items.len());
        if start < end {
            self.items[start..end].fill(n);
        }
    }

    pub fn reverse(&mut self) {
        self.items.reverse();
    }

    /// Ascending numeric order with `NaN` last and `-0` before `+0`.
    pub fn sort(&mut self) {
        self.items.sort_by(|a, b| match (a.is_nan(), b.is_nan()) {
            (true, true) => std::cmp::Ordering::Equal,
            (true, false) => std::cmp::Ordering::Greater,
            (false, true) => std::cmp::Ordering::Less,
            (false, false) => a.total_cmp(b),
        });
    }

    pub fn copy_within(&mut self, target: usize, start: usize, end: usize) {
        let len = self.items.len();
        let end = end.min(len);
        if start >= end || target >= len {
            return;
        }
        let count = (end - start).min(len - target);
        self.items.copy_within(start..start + count, target);
    }

    /// Copies `values` in starting at `offset`; fails when they do not fit.
    pub fn set_from(&mut self, values: &[f64], offset: usize) -> Result<(), String> {
        if offset.checked_add(values.len()).map_or(true, |end| end > self.items.len()) {
            return Err("offset is out of bounds".to_string());
        }
        for (slot, n) in self.items[offset..].iter_mut().zip(values) {
            *slot = self.kind.coerce(*n);
        }
        Ok(())
    }

    /// A copy of `[start, end)` with the same element kind.
    pub fn subarray(&self, start: usize, end: usize) -> NumericBuffer {
        let end = end.min(self.items.len());
        let items = if start < end {
            self.items[start..end].to_vec()
        } else {
            Vec::new()
        };
        NumericBuffer {
            kind: self.kind,
            items,
        }
    }
}

impl fmt::Debug for NumericBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:?}", self.kind.name(), self.items)
    }
}
