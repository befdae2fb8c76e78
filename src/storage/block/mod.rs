//! Micro block layout: fixed header, row data, and the row offset index.

mod builder;
mod header;

pub use builder::BlockBuilder;
pub use header::{
    BlockHeader, BlockView, RowIndex, MICRO_BLOCK_FORMAT_VERSION, MICRO_BLOCK_HEADER_LEN,
    MICRO_BLOCK_MAGIC, ROW_INDEX_ENTRY_LEN,
};
