use crate::error::{Error, Result};

/// Scoring and fusion parameters, validated once at engine construction.
///
/// Defaults follow the usual BM25 literature values and a fusion pool of
/// `max(top_k * 4, 50)` candidates per sub-index.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// BM25 term-frequency saturation. Higher values let repeated terms keep
    /// contributing; typical range 1.0-2.0.
    pub k1: f32,
    /// BM25 document-length normalization strength. 0.0 disables length
    /// normalization, 1.0 applies it fully.
    pub b: f32,
    /// Hybrid fusion requests `top_k * pool_factor` candidates per sub-index.
    pub pool_factor: usize,
    /// Lower bound on the fusion candidate pool, applied after `pool_factor`.
    pub pool_floor: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            k1: 1.5,
            b: 0.75,
            pool_factor: 4,
            pool_floor: 50,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.k1.is_finite() || self.k1 < 0.0 {
            return Err(Error::Config(format!("k1 must be >= 0, got {}", self.k1)));
        }
        if !self.b.is_finite() || !(0.0..=1.0).contains(&self.b) {
            return Err(Error::Config(format!("b must be in [0, 1], got {}", self.b)));
        }
        if self.pool_factor == 0 {
            return Err(Error::Config("pool_factor must be positive".into()));
        }
        if self.pool_floor == 0 {
            return Err(Error::Config("pool_floor must be positive".into()));
        }
        Ok(())
    }

    /// Number of candidates to request from each sub-index when fusing.
    pub fn pool_size(&self, top_k: usize) -> usize {
        (top_k * self.pool_factor).max(self.pool_floor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_parameters() {
        let mut cfg = EngineConfig::default();
        cfg.b = 1.5;
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));

        let mut cfg = EngineConfig::default();
        cfg.k1 = -0.1;
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));

        let mut cfg = EngineConfig::default();
        cfg.pool_factor = 0;
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn pool_size_applies_factor_and_floor() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.pool_size(10), 50); // floor wins
        assert_eq!(cfg.pool_size(20), 80); // factor wins
    }
}
