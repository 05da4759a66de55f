use crate::entities::item::ItemTypeId;
use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

/// Hard failures: bad arguments and broken references. Soft outcomes
/// (capacity remainders, failed conditions) are ordinary return values
/// and never surface through this enum.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid amount zero")]
    InvalidAmount,

    #[error("unknown item type {0}")]
    UnknownItemType(u16),

    #[error("duplicate item type {0}")]
    DuplicateItemType(u16),

    #[error("config read failed: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("config parse failed: {0}")]
    ConfigParse(#[from] serde_yaml::Error),
}

impl EngineError {
    pub fn unknown_type(type_id: ItemTypeId) -> Self {
        EngineError::UnknownItemType(type_id.0)
    }
}
