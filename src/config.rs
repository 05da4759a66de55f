use crate::error::EngineResult;
use serde::Deserialize;
use std::path::Path;

/// Engine tuning knobs. Loaded from a YAML file when one exists;
/// otherwise every field falls back to its default.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Length of one authoritative loop tick, in milliseconds.
    pub tick_millis: u64,
    /// Maximum Chebyshev distance for throwing things onto the map.
    pub throw_range: u16,
    /// Half-extent of the spectator viewport on the x axis.
    pub viewport_x: u16,
    /// Half-extent of the spectator viewport on the y axis.
    pub viewport_y: u16,
    /// Capacity used for container types that declare none.
    pub default_container_capacity: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_millis: 200,
            throw_range: 7,
            viewport_x: 8,
            viewport_y: 6,
            default_container_capacity: 8,
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> EngineResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&text)?)
    }
}
