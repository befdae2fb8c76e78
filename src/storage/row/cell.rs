//! Self-describing cell encoding: `tag:u8` followed by a tag-specific payload.

use crate::primitives::bytes::{buf::ByteCursor, var};
use crate::storage::row::value::{ColumnType, Value};
use crate::types::{MicroBlockError, Result};

const TAG_NULL: u8 = 0;
const TAG_INT: u8 = 1;
const TAG_UINT: u8 = 2;
const TAG_FLOAT: u8 = 3;
const TAG_BOOL: u8 = 4;
const TAG_STR: u8 = 5;
const TAG_BYTES: u8 = 6;
const TAG_MIN: u8 = 7;
const TAG_MAX: u8 = 8;

/// Appends the encoded form of `value` to `out`.
pub fn encode_cell(value: &Value<'_>, out: &mut Vec<u8>) {
    match value {
        Value::Null => out.push(TAG_NULL),
        Value::Min => out.push(TAG_MIN),
        Value::Max => out.push(TAG_MAX),
        Value::Int(v) => {
            out.push(TAG_INT);
            var::encode_i64(*v, out);
        }
        Value::UInt(v) => {
            out.push(TAG_UINT);
            var::encode_u64(*v, out);
        }
        Value::Float(v) => {
            out.push(TAG_FLOAT);
            out.extend_from_slice(&v.to_bits().to_be_bytes());
        }
        Value::Bool(v) => {
            out.push(TAG_BOOL);
            out.push(u8::from(*v));
        }
        Value::Str(s) => {
            out.push(TAG_STR);
            var::encode_u64(s.len() as u64, out);
            out.extend_from_slice(s.as_bytes());
        }
        Value::Bytes(b) => {
            out.push(TAG_BYTES);
            var::encode_u64(b.len() as u64, out);
            out.extend_from_slice(b);
        }
    }
}

/// Decodes the cell at `cur`, checking it against the expected column type.
pub(crate) fn decode_cell<'a>(cur: &mut ByteCursor<'a>, expected: ColumnType) -> Result<Value<'a>> {
    let value = match cur.read_u8()? {
        TAG_NULL => Value::Null,
        TAG_MIN => Value::Min,
        TAG_MAX => Value::Max,
        TAG_INT => Value::Int(cur.read_var_i64()?),
        TAG_UINT => Value::UInt(cur.read_var_u64()?),
        TAG_FLOAT => Value::Float(f64::from_bits(cur.read_u64_be()?)),
        TAG_BOOL => match cur.read_u8()? {
            0 => Value::Bool(false),
            1 => Value::Bool(true),
            _ => return Err(MicroBlockError::Corruption("bool cell out of range")),
        },
        TAG_STR => {
            let bytes = cur.read_len_prefixed()?;
            let s = core::str::from_utf8(bytes)
                .map_err(|_| MicroBlockError::Corruption("string cell not valid UTF-8"))?;
            Value::Str(s)
        }
        TAG_BYTES => Value::Bytes(cur.read_len_prefixed()?),
        _ => return Err(MicroBlockError::Corruption("unknown cell tag")),
    };
    if !value.matches_type(expected) {
        return Err(MicroBlockError::Corruption(
            "cell type does not match column type",
        ));
    }
    Ok(value)
}

/// Advances `cur` past one cell without materialising it.
pub(crate) fn skip_cell(cur: &mut ByteCursor<'_>) -> Result<()> {
    match cur.read_u8()? {
        TAG_NULL | TAG_MIN | TAG_MAX => {}
        TAG_INT | TAG_UINT => {
            cur.read_var_u64()?;
        }
        TAG_FLOAT => {
            cur.take(8)?;
        }
        TAG_BOOL => {
            cur.take(1)?;
        }
        TAG_STR | TAG_BYTES => {
            cur.read_len_prefixed()?;
        }
        _ => return Err(MicroBlockError::Corruption("unknown cell tag")),
    }
    Ok(())
}
