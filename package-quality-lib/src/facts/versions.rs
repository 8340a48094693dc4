//! Release maturity, from the number of published versions.

use crate::estimation::{FactorValue, FetchError};
use crate::facts::registry;
use std::sync::Arc;

const LOG_TARGET: &str = "  versions";

/// Computes the versions factor: `1 - 1/count`, `0` for a package without versions.
#[derive(Debug, Clone)]
pub struct Provider {
    registry: Arc<registry::Client>,
}

impl Provider {
    #[must_use]
    pub const fn new(registry: Arc<registry::Client>) -> Self {
        Self { registry }
    }

    pub async fn estimate(&self, name: &str) -> Result<FactorValue, FetchError> {
        let metadata = self.registry.metadata(name).await?;

        log::debug!(target: LOG_TARGET, "{name} has {} published versions", metadata.version_count);
        Ok(FactorValue::weighted(versions_quality(metadata.version_count)))
    }
}

#[expect(clippy::cast_precision_loss, reason = "version counts are tiny")]
fn versions_quality(count: usize) -> f64 {
    if count == 0 { 0.0 } else { 1.0 - 1.0 / count as f64 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_by_count() {
        assert!(versions_quality(0).abs() < f64::EPSILON);
        assert!(versions_quality(1).abs() < f64::EPSILON);
        assert!((versions_quality(2) - 0.5).abs() < f64::EPSILON);
        assert!((versions_quality(10) - 0.9).abs() < 1e-9);
    }
}
