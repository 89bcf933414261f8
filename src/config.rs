//! Construction-time configuration and tuning constants.

use crate::error::ConfigError;

/// Table length used when no initial capacity is configured.
pub const DEFAULT_INITIAL_CAPACITY: usize = 16;
/// Largest table length; once reached the table stops growing.
pub const MAXIMUM_CAPACITY: usize = 1 << 30;
/// Load factor used when none is configured.
pub const DEFAULT_LOAD_FACTOR: f32 = 0.75;
/// Chain length at which a bucket is escalated to a tree.
pub const TREEIFY_THRESHOLD: usize = 8;
/// Tree size at or below which a bucket goes back to a chain.
pub const UNTREEIFY_THRESHOLD: usize = 6;
/// Tables shorter than this grow instead of escalating a bucket.
pub const MIN_TREEIFY_CAPACITY: usize = 64;

/// Initial capacity and load factor for a `SafeHashMap`.
///
/// The load factor is fixed for the lifetime of the map. The initial
/// capacity is rounded up to a power of two and clamped to
/// [`MAXIMUM_CAPACITY`]; the table itself is only allocated on first insert.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MapConfig {
    pub initial_capacity: usize,
    pub load_factor: f32,
}

impl MapConfig {
    pub const fn new(initial_capacity: usize, load_factor: f32) -> Self {
        Self {
            initial_capacity,
            load_factor,
        }
    }

    pub fn with_initial_capacity(self, initial_capacity: usize) -> Self {
        Self {
            initial_capacity,
            ..self
        }
    }

    pub fn with_load_factor(self, load_factor: f32) -> Self {
        Self {
            load_factor,
            ..self
        }
    }

    /// Reject load factors that are not strictly positive and finite.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.load_factor.is_finite() && self.load_factor > 0.0 {
            Ok(())
        } else {
            Err(ConfigError::InvalidLoadFactor(self.load_factor))
        }
    }

    /// Resize threshold for a table of `capacity` slots.
    pub(crate) fn threshold_for(&self, capacity: usize) -> usize {
        if capacity >= MAXIMUM_CAPACITY {
            return usize::MAX;
        }
        (capacity as f64 * self.load_factor as f64).floor() as usize
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self::new(DEFAULT_INITIAL_CAPACITY, DEFAULT_LOAD_FACTOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let c = MapConfig::default();
        assert_eq!(c.initial_capacity, 16);
        assert_eq!(c.load_factor, 0.75);
        assert!(c.validate().is_ok());
    }

    /// Invariant: only strictly positive, finite load factors are accepted.
    #[test]
    fn bad_load_factors_rejected() {
        for lf in [0.0, -0.5, f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            match MapConfig::default().with_load_factor(lf).validate() {
                Err(ConfigError::InvalidLoadFactor(_)) => {}
                other => panic!("load factor {lf} unexpectedly gave {:?}", other),
            }
        }
        assert!(MapConfig::new(0, 4.0).validate().is_ok());
        assert!(MapConfig::new(0, 0.01).validate().is_ok());
    }

    /// Invariant: threshold is floor(capacity * load_factor) below the
    /// maximum capacity and saturates at it.
    #[test]
    fn threshold_formula() {
        let c = MapConfig::default();
        assert_eq!(c.threshold_for(16), 12);
        assert_eq!(c.threshold_for(32), 24);
        assert_eq!(c.threshold_for(1), 0);
        assert_eq!(MapConfig::new(16, 0.1).threshold_for(16), 1);
        assert_eq!(MapConfig::new(16, 3.0).threshold_for(64), 192);
        assert_eq!(c.threshold_for(MAXIMUM_CAPACITY), usize::MAX);
    }
}
