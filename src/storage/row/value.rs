use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;
use smallvec::SmallVec;

/// Number of key cells stored inline before a [`Rowkey`] spills to the heap.
pub const INLINE_KEY_CELLS: usize = 8;

/// Semantic type of a stored column.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
pub enum ColumnType {
    /// Boolean column.
    Bool,
    /// Signed 64-bit integer column.
    Int,
    /// Unsigned 64-bit integer column.
    UInt,
    /// 64-bit floating point column.
    Float,
    /// UTF-8 string column.
    Str,
    /// Raw byte column.
    Bytes,
}

impl ColumnType {
    /// Parses the lowercase name used by tooling (`int`, `uint`, `str`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "bool" => Some(Self::Bool),
            "int" => Some(Self::Int),
            "uint" => Some(Self::UInt),
            "float" => Some(Self::Float),
            "str" | "string" => Some(Self::Str),
            "bytes" => Some(Self::Bytes),
            _ => None,
        }
    }
}

/// A decoded cell borrowing from the block buffer (zero-copy).
///
/// `Min` and `Max` never appear in stored rows; they let range keys express
/// open bounds on trailing columns.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value<'a> {
    /// Sorts before every other value.
    Min,
    /// SQL null; sorts before all non-null values.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Unsigned integer.
    UInt(u64),
    /// Floating point number.
    Float(f64),
    /// String slice reference.
    Str(&'a str),
    /// Byte slice reference.
    Bytes(&'a [u8]),
    /// Sorts after every other value.
    Max,
}

impl<'a> Value<'a> {
    /// Returns `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns `true` for the open-bound sentinels.
    pub fn is_min_or_max(&self) -> bool {
        matches!(self, Value::Min | Value::Max)
    }

    /// Returns the integer payload, if any.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns `true` when the value may be stored in a column of type `ty`.
    pub fn matches_type(&self, ty: ColumnType) -> bool {
        match self {
            Value::Min | Value::Null | Value::Max => true,
            Value::Bool(_) => ty == ColumnType::Bool,
            Value::Int(_) => ty == ColumnType::Int,
            Value::UInt(_) => ty == ColumnType::UInt,
            Value::Float(_) => ty == ColumnType::Float,
            Value::Str(_) => ty == ColumnType::Str,
            Value::Bytes(_) => ty == ColumnType::Bytes,
        }
    }

    /// Type-aware three-way comparison ignoring collation.
    ///
    /// Numeric families compare by value across signedness, strings and bytes
    /// compare bytewise; otherwise values order by type rank.
    pub fn compare(&self, other: &Value<'_>) -> Ordering {
        let (lhs, rhs) = (self.rank(), other.rank());
        if lhs != rhs {
            return lhs.cmp(&rhs);
        }
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::UInt(a), Value::UInt(b)) => a.cmp(b),
            (Value::Int(a), Value::UInt(b)) => cmp_int_uint(*a, *b),
            (Value::UInt(a), Value::Int(b)) => cmp_int_uint(*b, *a).reverse(),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Float(a), Value::Int(b)) => cmp_integer_float(i128::from(*b), *a).reverse(),
            (Value::Int(a), Value::Float(b)) => cmp_integer_float(i128::from(*a), *b),
            (Value::Float(a), Value::UInt(b)) => cmp_integer_float(i128::from(*b), *a).reverse(),
            (Value::UInt(a), Value::Float(b)) => cmp_integer_float(i128::from(*a), *b),
            (a, b) => match (a.byte_view(), b.byte_view()) {
                (Some(x), Some(y)) => x.cmp(y),
                // Same rank, same family: Min/Null/Max against themselves.
                _ => Ordering::Equal,
            },
        }
    }

    fn byte_view(&self) -> Option<&[u8]> {
        match self {
            Value::Str(s) => Some(s.as_bytes()),
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Min => 0,
            Value::Null => 1,
            Value::Bool(_) => 2,
            Value::Int(_) | Value::UInt(_) | Value::Float(_) => 3,
            Value::Str(_) | Value::Bytes(_) => 4,
            Value::Max => 5,
        }
    }
}

/// 2^127, the first float past the `i128` range.
const I128_FLOAT_EDGE: f64 = 170_141_183_460_469_231_731_687_303_715_884_105_728.0;

/// Exact comparison of an integer against a float, without rounding the
/// integer through `f64`. NaN orders by sign as in `f64::total_cmp`.
fn cmp_integer_float(a: i128, b: f64) -> Ordering {
    if b.is_nan() {
        return if b.is_sign_negative() {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }
    if b >= I128_FLOAT_EDGE {
        return Ordering::Less;
    }
    if b < -I128_FLOAT_EDGE {
        return Ordering::Greater;
    }
    let whole = b.trunc();
    match a.cmp(&(whole as i128)) {
        Ordering::Equal => {
            if b > whole {
                Ordering::Less
            } else if b < whole {
                Ordering::Greater
            } else {
                Ordering::Equal
            }
        }
        ord => ord,
    }
}

fn cmp_int_uint(a: i64, b: u64) -> Ordering {
    if a < 0 {
        Ordering::Less
    } else {
        (a as u64).cmp(&b)
    }
}

impl fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Min => write!(f, "MIN"),
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::UInt(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(v) => write!(f, "{v:?}"),
            Value::Bytes(v) => write!(f, "bytes(len={})", v.len()),
            Value::Max => write!(f, "MAX"),
        }
    }
}

/// Ordered tuple of key cells identifying a logical row.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Rowkey<'k> {
    cells: SmallVec<[Value<'k>; INLINE_KEY_CELLS]>,
}

impl<'k> Rowkey<'k> {
    /// Builds a rowkey from the provided cells.
    pub fn new(cells: impl IntoIterator<Item = Value<'k>>) -> Self {
        Self {
            cells: cells.into_iter().collect(),
        }
    }

    /// Convenience constructor for single-column integer keys.
    pub fn int(v: i64) -> Self {
        Self::new([Value::Int(v)])
    }

    /// Number of key cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns `true` when the key carries no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// A key is usable for lookups when it has at least one cell.
    pub fn is_valid(&self) -> bool {
        !self.cells.is_empty()
    }

    /// Borrowed view of the cells.
    pub fn cells(&self) -> &[Value<'k>] {
        &self.cells
    }
}

impl<'k> From<Vec<Value<'k>>> for Rowkey<'k> {
    fn from(cells: Vec<Value<'k>>) -> Self {
        Self::new(cells)
    }
}

impl fmt::Display for Rowkey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (idx, cell) in self.cells.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{cell}")?;
        }
        write!(f, ")")
    }
}
