//! Échelle Phred et table de substitution précalculée

use serde::{Deserialize, Serialize};
use std::fmt;

/// Décalage ASCII des qualités SAM/FASTQ
pub const SAM_PHRED_DECODING_OFFSET: u8 = 33;

/// Plus petite qualité Phred significative
pub const MIN_PHRED_VALUE: u8 = 2;

/// Plus grande qualité Phred représentable
pub const MAX_PHRED_VALUE: u8 = 104;

/// Nombre de valeurs Phred suivies par les histogrammes de qualité
pub const EFFECTIVE_PHRED_RANGE: usize = 42;

/// Qualité d'une base tirée uniformément, `10 * log10(4)`
pub const UNIFORM_BASE_QUALITY: f64 = 6.020_599_913_279_624;

/// Base des probabilités Phred, `10^-0.1`
pub const PHRED_PROBABILITY_BASE: f64 = 0.794_328_234_724_281_5;

const LOOKUP_SIZE: usize = 0x8000;
const QUALITY_SIZE: usize = 0x80;

/// Probabilités conditionnelles de substitution, indexées par `attendu * 4 + observé`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubstitutionModel {
    /// Toute substitution a une probabilité 1/3
    #[default]
    Uniform,
    /// Table empirique C12_T_PWO (DOI 10.1038/s41598-018-29325-6)
    Empirical,
}

impl SubstitutionModel {
    /// Table 4x4 des probabilités conditionnelles, ordre A C G T
    pub fn conditional_probability(self) -> [f64; 16] {
        match self {
            SubstitutionModel::Uniform => {
                let third = 1.0 / 3.0;
                [
                    0.0, third, third, third,
                    third, 0.0, third, third,
                    third, third, 0.0, third,
                    third, third, third, 0.0,
                ]
            }
            SubstitutionModel::Empirical => [
                0.0, 0.03 / 0.17, 0.11 / 0.17, 0.03 / 0.17,
                0.05 / 0.14, 0.0, 0.04 / 0.14, 0.05 / 0.14,
                0.08 / 0.14, 0.02 / 0.14, 0.0, 0.04 / 0.14,
                0.03 / 0.17, 0.06 / 0.17, 0.08 / 0.17, 0.0,
            ],
        }
    }
}

/// Rang A C G T d'un code BAM standard
#[inline]
fn standard_rank(code: u8) -> Option<usize> {
    match code {
        0x1 => Some(0),
        0x2 => Some(1),
        0x4 => Some(2),
        0x8 => Some(3),
        _ => None,
    }
}

/// Table de correspondance (qualité, base attendue, base observée) vers un score Phred
///
/// Construite une seule fois puis partagée en lecture seule (`Arc<PhredScale>`)
/// entre tous les décodeurs. La clé est `qualité << 8 | attendu << 4 | observé`
/// avec des codes BAM sur 4 bits.
pub struct PhredScale {
    model: SubstitutionModel,
    substitution_lookup: Box<[f64]>,
    false_positive_probability: [f64; QUALITY_SIZE],
    true_positive_quality: [f64; QUALITY_SIZE],
}

impl PhredScale {
    /// Construit la table pour un modèle de substitution
    pub fn new(model: SubstitutionModel) -> Self {
        let mut false_positive_probability = [0.0; QUALITY_SIZE];
        let mut true_positive_quality = [UNIFORM_BASE_QUALITY; QUALITY_SIZE];
        for q in 1..QUALITY_SIZE {
            let error = PHRED_PROBABILITY_BASE.powi(q as i32);
            false_positive_probability[q] = error;
            true_positive_quality[q] = -10.0 * (1.0 - error).log10();
        }

        let conditional = model.conditional_probability();
        let mut offset = [0.0; 16];
        for (i, probability) in conditional.iter().enumerate() {
            if *probability > 0.0 {
                offset[i] = -10.0 * probability.log10();
            }
        }

        let mut substitution_lookup = vec![UNIFORM_BASE_QUALITY; LOOKUP_SIZE].into_boxed_slice();
        for q in 1..QUALITY_SIZE {
            for expected in 0..16u8 {
                for observed in 0..16u8 {
                    let key = (q << 8) | ((expected as usize) << 4) | observed as usize;
                    if let (Some(e), Some(o)) = (standard_rank(expected), standard_rank(observed)) {
                        substitution_lookup[key] = if e == o {
                            true_positive_quality[q]
                        } else {
                            q as f64 + offset[e * 4 + o]
                        };
                    }
                }
            }
        }

        Self {
            model,
            substitution_lookup,
            false_positive_probability,
            true_positive_quality,
        }
    }

    /// Modèle de substitution utilisé
    pub fn model(&self) -> SubstitutionModel {
        self.model
    }

    /// Score Phred de l'observation d'une base sachant la base attendue
    #[inline]
    pub fn substitution_quality(&self, expected: u8, observed: u8, quality: u8) -> f64 {
        let key = (((quality & 0x7f) as usize) << 8) | (((expected & 0xf) as usize) << 4) | (observed & 0xf) as usize;
        self.substitution_lookup[key]
    }

    /// Probabilité d'erreur associée à une qualité
    #[inline]
    pub fn probability_of_quality(&self, quality: u8) -> f64 {
        self.false_positive_probability[(quality & 0x7f) as usize]
    }

    /// Score Phred d'une base correcte, `-10 * log10(1 - p)`
    #[inline]
    pub fn true_positive_quality(&self, quality: u8) -> f64 {
        self.true_positive_quality[(quality & 0x7f) as usize]
    }
}

impl Default for PhredScale {
    fn default() -> Self {
        Self::new(SubstitutionModel::default())
    }
}

impl fmt::Debug for PhredScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhredScale").field("model", &self.model).finish()
    }
}

impl fmt::Display for PhredScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Q\tP(erreur)\tQ(vrai positif)")?;
        for q in MIN_PHRED_VALUE as usize..EFFECTIVE_PHRED_RANGE {
            writeln!(
                f,
                "{}\t{:.6e}\t{:.6e}",
                q, self.false_positive_probability[q], self.true_positive_quality[q]
            )?;
        }
        Ok(())
    }
}
