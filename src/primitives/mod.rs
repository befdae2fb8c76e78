//! Low-level primitives shared by the block and row codecs.

/// Byte-level utilities: varints and a bounds-checked read cursor.
pub mod bytes;
