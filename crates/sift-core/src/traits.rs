use crate::types::FieldMapping;

/// Source of the schema snapshot used to validate aggregation fields.
pub trait MappingStore: Send + Sync {
    fn stored_mapping(&self) -> crate::error::Result<FieldMapping>;
}
