use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

/// Table holding one row per indexed chunk inside a generation database.
pub const CHUNKS_TABLE: &str = "chunks";

pub fn vector_field(dim: i32) -> Field {
    Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true)
}

pub fn build_arrow_schema(dim: i32) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("doc_id", DataType::Utf8, false),
        Field::new("doc_path", DataType::Utf8, false),
        Field::new("origin", DataType::Utf8, false),
        Field::new("file_name", DataType::Utf8, false),
        Field::new("content", DataType::Utf8, false),
        Field::new("start", DataType::UInt64, false),
        Field::new("end", DataType::UInt64, false),
        Field::new("chunk_index", DataType::UInt64, false),
        Field::new("total_chunks", DataType::UInt64, false),
        Field::new("token_count", DataType::UInt64, false),
        Field::new("ordinal", DataType::UInt64, false),
        vector_field(dim),
    ]))
}
