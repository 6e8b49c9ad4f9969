//! World and sizing configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Result, WorldError};

/// Default identifier-space size of every world and component store.
pub const DEFAULT_SIZE: usize = 100_000;

/// Default fraction of the world size that must be waiting in the removed
/// queue before automatic recycling starts reusing ids.
pub const DEFAULT_REMOVED_REUSE_THRESHOLD: f64 = 0.01;

/// Configuration for a single world.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Explicit identifier-space size. Defaults to the universe's global size.
    pub size: Option<usize>,
    /// Hold freed ids until [`Universe::flush_removed_entities`] is called
    /// instead of recycling them automatically.
    ///
    /// [`Universe::flush_removed_entities`]: crate::Universe::flush_removed_entities
    pub manual_entity_recycling: bool,
}

impl WorldConfig {
    /// Create a config with automatic recycling and the global size.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the identifier-space size for this world.
    #[must_use]
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    /// Enable manual entity recycling.
    #[must_use]
    pub fn with_manual_entity_recycling(mut self) -> Self {
        self.manual_entity_recycling = true;
        self
    }
}

/// Process-wide sizing and recycling defaults held by a [`Universe`].
///
/// [`Universe`]: crate::Universe
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizingPolicy {
    /// Identifier-space size given to new worlds and restored by
    /// [`Universe::reset_globals`](crate::Universe::reset_globals).
    pub default_size: usize,
    /// Fraction (0..=1) of a world's size that must be queued as removed
    /// before automatic recycling reuses ids. Set it to a share of the size
    /// you would never add and remove within a single frame.
    pub removed_reuse_threshold: f64,
}

impl Default for SizingPolicy {
    fn default() -> Self {
        Self {
            default_size: DEFAULT_SIZE,
            removed_reuse_threshold: DEFAULT_REMOVED_REUSE_THRESHOLD,
        }
    }
}

impl SizingPolicy {
    /// Parse a policy from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let policy: Self = serde_json::from_str(json)?;
        policy.validate()?;
        Ok(policy)
    }

    /// Checks that the size is addressable and the threshold is a fraction.
    pub fn validate(&self) -> Result<()> {
        validate_size(self.default_size)?;
        validate_threshold(self.removed_reuse_threshold)
    }
}

pub(crate) fn validate_size(size: usize) -> Result<()> {
    // Ids run from 0 to size - 1; u32::MAX stays reserved for Entity::INVALID.
    if size > u32::MAX as usize {
        return Err(WorldError::InvalidSize(size));
    }
    Ok(())
}

pub(crate) fn validate_threshold(threshold: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(WorldError::InvalidThreshold(threshold));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_config_builder() {
        let config = WorldConfig::new().with_size(64).with_manual_entity_recycling();
        assert_eq!(config.size, Some(64));
        assert!(config.manual_entity_recycling);
    }

    #[test]
    fn test_world_config_defaults() {
        let config = WorldConfig::default();
        assert_eq!(config.size, None);
        assert!(!config.manual_entity_recycling);
    }

    #[test]
    fn test_sizing_policy_defaults() {
        let policy = SizingPolicy::default();
        assert_eq!(policy.default_size, 100_000);
        assert!((policy.removed_reuse_threshold - 0.01).abs() < f64::EPSILON);
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_sizing_policy_from_partial_json() {
        let policy = SizingPolicy::from_json(r#"{ "default_size": 5000 }"#).unwrap();
        assert_eq!(policy.default_size, 5000);
        assert!((policy.removed_reuse_threshold - DEFAULT_REMOVED_REUSE_THRESHOLD).abs() < f64::EPSILON);
    }

    #[test]
    fn test_sizing_policy_rejects_bad_threshold() {
        let err = SizingPolicy::from_json(r#"{ "removed_reuse_threshold": 1.5 }"#).unwrap_err();
        assert!(matches!(err, WorldError::InvalidThreshold(_)));

        assert!(validate_threshold(f64::NAN).is_err());
    }

    #[test]
    fn test_sizing_policy_rejects_malformed_json() {
        let err = SizingPolicy::from_json("{ default_size: ").unwrap_err();
        assert!(matches!(err, WorldError::Config(_)));
    }

    #[test]
    fn test_world_config_json() {
        let config: WorldConfig =
            serde_json::from_str(r#"{ "manual_entity_recycling": true }"#).unwrap();
        assert_eq!(config, WorldConfig::new().with_manual_entity_recycling());
    }
}
