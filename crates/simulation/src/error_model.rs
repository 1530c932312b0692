//! Modèle d'erreur du séquenceur simulé

use demux_core::{DemuxError, Result};
use serde::{Deserialize, Serialize};

/// Intervalle fermé de scores Phred tirés uniformément
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityRange {
    pub min: u8,
    pub max: u8,
}

impl QualityRange {
    pub fn new(min: u8, max: u8) -> Self {
        Self { min, max }
    }
}

/// Modèle d'erreur pour la simulation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorModel {
    /// Taux de substitution (par base)
    pub substitution_rate: f64,

    /// Proportion de lectures marquées en échec par le séquenceur
    pub qcfail_rate: f64,

    /// Qualité des bases correctes
    pub quality: QualityRange,

    /// Qualité des bases substituées
    pub error_quality: QualityRange,

    /// Seed pour reproductibilité
    pub seed: u64,
}

impl Default for ErrorModel {
    fn default() -> Self {
        Self {
            substitution_rate: 0.01,
            qcfail_rate: 0.0,
            quality: QualityRange::new(30, 40),
            error_quality: QualityRange::new(2, 15),
            seed: 42,
        }
    }
}

impl ErrorModel {
    /// Crée un modèle avec un taux de substitution donné
    pub fn new(substitution_rate: f64) -> Self {
        Self { substitution_rate, ..Default::default() }
    }

    /// Définit le seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Vérifie les taux et les intervalles de qualité
    pub fn validate(&self) -> Result<()> {
        for (name, rate) in [("substitution", self.substitution_rate), ("échec qualité", self.qcfail_rate)] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(DemuxError::configuration(format!(
                    "le taux de {} {} doit être compris entre 0 et 1",
                    name, rate
                )));
            }
        }
        for range in [self.quality, self.error_quality] {
            if range.min > range.max {
                return Err(DemuxError::configuration(format!(
                    "intervalle de qualité vide: {}..={}",
                    range.min, range.max
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_model() {
        let model = ErrorModel::default();
        assert_eq!(model.substitution_rate, 0.01);
        assert_eq!(model.quality, QualityRange::new(30, 40));
        assert!(model.validate().is_ok());
    }

    #[test]
    fn test_with_seed() {
        let model = ErrorModel::new(0.05).with_seed(123);
        assert_eq!(model.seed, 123);
        assert_eq!(model.substitution_rate, 0.05);
    }

    #[test]
    fn test_validity() {
        assert!(ErrorModel::new(1.5).validate().is_err());

        let invalid = ErrorModel { quality: QualityRange::new(40, 30), ..Default::default() };
        assert!(matches!(invalid.validate(), Err(DemuxError::Configuration(_))));
    }
}
