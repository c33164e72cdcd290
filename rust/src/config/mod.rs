use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Sizing of a buffer and of the blocks a buffered file caches in it.
///
/// ```
/// use slotbuffer::config::BufferConfig;
///
/// let cfg = BufferConfig::from_json(r#"{ "capacity": 16, "capacity_bytes": 65536 }"#).unwrap();
/// assert_eq!(cfg.capacity, 16);
/// assert_eq!(cfg.block_size, 4096);
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct BufferConfig {
    /// Number of slots.
    pub capacity: usize,
    /// Byte budget over all cached objects; unlimited when absent.
    pub capacity_bytes: Option<usize>,
    pub block_size: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        BufferConfig {
            capacity: 64,
            capacity_bytes: None,
            block_size: 4096,
        }
    }
}

impl BufferConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let cfg: BufferConfig = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::InvalidConfig("capacity must be positive".into()));
        }
        if self.block_size == 0 {
            return Err(Error::InvalidConfig("block_size must be positive".into()));
        }
        if self.capacity_bytes == Some(0) {
            return Err(Error::InvalidConfig("capacity_bytes must be positive".into()));
        }
        Ok(())
    }
}
