pub mod hyperloglog;

use getset::CopyGetters;
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

pub const DEFAULT_PRECISION: usize = 14;
pub const DEFAULT_KSIZE: usize = 31;
pub const DEFAULT_SEED: u64 = 42;

/// Which formula turns a register array into a cardinality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Estimator {
    /// Harmonic mean with linear counting for small ranges
    /// (Flajolet et al. 2007).
    #[default]
    Classic,
    /// Maximum-likelihood estimate (Ertl 2017).
    Mle,
}

/// Parameters fixed at sketch construction.
///
/// Sketches built from different configurations are not comparable.
#[derive(Debug, Clone, Copy, PartialEq, TypedBuilder, CopyGetters, Serialize, Deserialize)]
#[serde(default)]
pub struct SketchConfig {
    #[getset(get_copy = "pub")]
    #[builder(default = DEFAULT_PRECISION)]
    precision: usize,

    #[getset(get_copy = "pub")]
    #[builder(default = DEFAULT_KSIZE)]
    ksize: usize,

    #[getset(get_copy = "pub")]
    #[builder(default = DEFAULT_SEED)]
    seed: u64,

    #[getset(get_copy = "pub")]
    #[builder(default)]
    estimator: Estimator,
}

impl Default for SketchConfig {
    fn default() -> Self {
        SketchConfig::builder().build()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = SketchConfig::default();
        assert_eq!(config.precision(), 14);
        assert_eq!(config.ksize(), 31);
        assert_eq!(config.seed(), 42);
        assert_eq!(config.estimator(), Estimator::Classic);
    }

    #[test]
    fn config_from_partial_json() {
        let config: SketchConfig =
            serde_json::from_str(r#"{"precision": 10, "estimator": "mle"}"#).unwrap();
        assert_eq!(config.precision(), 10);
        assert_eq!(config.ksize(), DEFAULT_KSIZE);
        assert_eq!(config.estimator(), Estimator::Mle);
    }
}
