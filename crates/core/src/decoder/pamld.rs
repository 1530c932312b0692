//! Décodage par maximum de vraisemblance a posteriori ajusté par la qualité (PAMLD)
//!
//! Pour chaque code-barres b et observation r, P(r|b) est calculée depuis les
//! qualités Phred; la probabilité ajustée P(b)·P(r|b) est sommée (Kahan) avec
//! le bruit ajusté pour obtenir la confiance a posteriori du meilleur candidat.

use super::{Algorithm, Codec, Decoding, DecodingStrategy};
use crate::accumulator::AccumulatingClassifier;
use crate::barcode::Observation;
use crate::kahan::KahanSum;
use crate::phred::PhredScale;
use std::sync::Arc;

/// Meilleur candidat et somme des probabilités ajustées pour une observation
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Posterior {
    pub barcode_index: usize,
    pub distance: usize,
    /// P(r|b) du meilleur candidat
    pub conditional_probability: f64,
    /// P(b)·P(r|b) du meilleur candidat
    pub adjusted_probability: f64,
    /// Somme des probabilités ajustées et du bruit ajusté
    pub sigma: f64,
}

impl Posterior {
    /// P(b|r) du meilleur candidat
    #[inline]
    pub fn confidence(&self) -> f64 {
        if self.sigma > 0.0 {
            self.adjusted_probability / self.sigma
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone)]
pub struct PhredAdjusted {
    scale: Arc<PhredScale>,
    noise: f64,
    confidence_threshold: f64,
    /// Probabilité d'une séquence aléatoire de la longueur du code-barres, 4^-L
    random_barcode_probability: f64,
    adjusted_noise_probability: f64,
}

impl PhredAdjusted {
    pub fn new(scale: Arc<PhredScale>, noise: f64, confidence_threshold: f64, nucleotide_cardinality: usize) -> Self {
        let random_barcode_probability = 0.25_f64.powi(nucleotide_cardinality as i32);
        Self {
            scale,
            noise,
            confidence_threshold,
            random_barcode_probability,
            adjusted_noise_probability: noise * random_barcode_probability,
        }
    }

    pub fn noise(&self) -> f64 {
        self.noise
    }

    pub fn confidence_threshold(&self) -> f64 {
        self.confidence_threshold
    }

    pub fn random_barcode_probability(&self) -> f64 {
        self.random_barcode_probability
    }

    pub fn adjusted_noise_probability(&self) -> f64 {
        self.adjusted_noise_probability
    }

    /// Évalue tous les codes-barres; le premier maximum strict l'emporte
    pub fn posterior(&self, observation: &Observation, codec: &Codec) -> Posterior {
        let mut best = Posterior::default();
        let mut sigma = KahanSum::new();
        for barcode in &codec.barcodes {
            let (conditional, distance) = barcode.compensated_decoding_probability(observation, &self.scale);
            let adjusted = conditional * barcode.concentration;
            sigma.add(adjusted);
            if adjusted > best.adjusted_probability {
                best.barcode_index = barcode.index;
                best.distance = distance;
                best.conditional_probability = conditional;
                best.adjusted_probability = adjusted;
            }
        }
        sigma.add(self.adjusted_noise_probability);
        best.sigma = sigma.value();
        best
    }

    /// Applique les filtres de bruit et de confiance au meilleur candidat
    pub fn resolve(
        &self,
        posterior: &Posterior,
        qcfail: &mut bool,
        accumulator: &mut AccumulatingClassifier,
    ) -> Decoding {
        if posterior.conditional_probability > self.random_barcode_probability {
            let confidence = posterior.confidence();
            let tag = accumulator.tag_mut(posterior.barcode_index);
            if confidence > self.confidence_threshold {
                tag.accumulated_confidence += confidence;
                if !*qcfail {
                    tag.accumulated_pf_confidence += confidence;
                }
            } else {
                // La lecture garde son code-barres mais échoue au contrôle qualité
                tag.low_confidence_count += 1;
                *qcfail = true;
            }
            Decoding { barcode_index: posterior.barcode_index, distance: posterior.distance, confidence }
        } else {
            // Compté sur le meilleur candidat pour l'estimation du bruit
            accumulator.tag_mut(posterior.barcode_index).low_conditional_confidence_count += 1;
            *qcfail = true;
            Decoding::unclassified()
        }
    }
}

impl DecodingStrategy for PhredAdjusted {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Probabilistic
    }

    fn decode(
        &mut self,
        observation: &Observation,
        codec: &Codec,
        qcfail: &mut bool,
        accumulator: &mut AccumulatingClassifier,
    ) -> Decoding {
        let posterior = self.posterior(observation, codec);
        self.resolve(&posterior, qcfail, accumulator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::barcode::Barcode;
    use crate::sequence::Sequence;

    fn codec() -> Codec {
        let barcodes = [("AAAA", 0.5), ("CCCC", 0.3), ("GGGG", 0.2)]
            .iter()
            .enumerate()
            .map(|(i, (w, c))| Barcode::new(i + 1, *w, &[w.to_string()], *c).unwrap())
            .collect();
        Codec::new(Barcode::undetermined(&[4], 0.01), barcodes, vec![4], None).unwrap()
    }

    fn strategy() -> PhredAdjusted {
        PhredAdjusted::new(Arc::new(PhredScale::default()), 0.01, 0.95, 4)
    }

    fn observation(bases: &str, quality: u8) -> Observation {
        Observation::from_segments(vec![Sequence::with_uniform_quality(bases, quality)])
    }

    #[test]
    fn test_random_barcode_probability() {
        let s = strategy();
        assert!((s.random_barcode_probability() - 1.0 / 256.0).abs() < 1e-15);
        assert!((s.adjusted_noise_probability() - 0.01 / 256.0).abs() < 1e-15);
    }

    #[test]
    fn test_confident_decoding() {
        let codec = codec();
        let mut s = strategy();
        let mut accumulator = AccumulatingClassifier::new(0, &codec.undetermined, &codec.barcodes);
        let mut qcfail = false;
        let decoding = s.decode(&observation("AAAA", 30), &codec, &mut qcfail, &mut accumulator);
        assert_eq!(decoding.barcode_index, 1);
        assert_eq!(decoding.distance, 0);
        assert!(decoding.confidence > 0.99);
        assert!(!qcfail);
        assert!((accumulator.tags[0].accumulated_confidence - decoding.confidence).abs() < 1e-15);
        assert!((accumulator.tags[0].accumulated_pf_confidence - decoding.confidence).abs() < 1e-15);
    }

    #[test]
    fn test_noise_is_unclassified() {
        let codec = codec();
        let mut s = strategy();
        let mut accumulator = AccumulatingClassifier::new(0, &codec.undetermined, &codec.barcodes);
        let mut qcfail = false;
        let decoding = s.decode(&observation("TTTT", 30), &codec, &mut qcfail, &mut accumulator);
        assert_eq!(decoding, Decoding::unclassified());
        assert!(qcfail);
        // À distance égale, AAAA l'emporte par sa concentration
        assert_eq!(accumulator.tags[0].low_conditional_confidence_count, 1);
        assert_eq!(accumulator.unclassified.low_conditional_confidence_count, 0);
        assert_eq!(accumulator.unclassified.count, 0);
    }

    #[test]
    fn test_confidence_equal_to_threshold_is_low_confidence() {
        let codec = codec();
        let s = strategy();
        let mut accumulator = AccumulatingClassifier::new(0, &codec.undetermined, &codec.barcodes);
        let mut qcfail = false;
        let posterior = Posterior {
            barcode_index: 2,
            distance: 1,
            conditional_probability: 0.5,
            adjusted_probability: 0.95,
            sigma: 1.0,
        };
        let decoding = s.resolve(&posterior, &mut qcfail, &mut accumulator);
        assert_eq!(decoding.barcode_index, 2);
        assert_eq!(decoding.distance, 1);
        assert!(qcfail);
        assert_eq!(accumulator.tags[1].low_confidence_count, 1);
        assert_eq!(accumulator.tags[1].accumulated_confidence, 0.0);
    }

    #[test]
    fn test_conditional_equal_to_random_is_unclassified() {
        let codec = codec();
        let s = strategy();
        let mut accumulator = AccumulatingClassifier::new(0, &codec.undetermined, &codec.barcodes);
        let mut qcfail = false;
        let posterior = Posterior {
            barcode_index: 1,
            distance: 3,
            conditional_probability: 1.0 / 256.0,
            adjusted_probability: 0.5 / 256.0,
            sigma: 0.5 / 256.0,
        };
        let decoding = s.resolve(&posterior, &mut qcfail, &mut accumulator);
        assert_eq!(decoding, Decoding::unclassified());
        assert!(qcfail);
        assert_eq!(accumulator.tags[0].low_conditional_confidence_count, 1);
        assert_eq!(accumulator.unclassified.low_conditional_confidence_count, 0);
        assert_eq!(accumulator.tags[0].low_confidence_count, 0);
    }

    #[test]
    fn test_confidence_just_above_threshold_is_accepted() {
        let codec = codec();
        let s = strategy();
        let mut accumulator = AccumulatingClassifier::new(0, &codec.undetermined, &codec.barcodes);
        let mut qcfail = false;
        let posterior = Posterior {
            barcode_index: 2,
            distance: 1,
            conditional_probability: 0.5,
            adjusted_probability: 0.95 + 1e-12,
            sigma: 1.0,
        };
        let decoding = s.resolve(&posterior, &mut qcfail, &mut accumulator);
        assert_eq!(decoding.barcode_index, 2);
        assert!(!qcfail);
        assert_eq!(accumulator.tags[1].low_confidence_count, 0);
        assert_eq!(accumulator.tags[1].accumulated_confidence, 0.95 + 1e-12);
        assert_eq!(accumulator.tags[1].accumulated_pf_confidence, 0.95 + 1e-12);
    }

    #[test]
    fn test_conditional_just_above_random_is_kept() {
        let codec = codec();
        let s = strategy();
        let mut accumulator = AccumulatingClassifier::new(0, &codec.undetermined, &codec.barcodes);
        let mut qcfail = false;
        let conditional = f64::from_bits(s.random_barcode_probability().to_bits() + 1);
        assert!(conditional > s.random_barcode_probability());
        let posterior = Posterior {
            barcode_index: 1,
            distance: 3,
            conditional_probability: conditional,
            adjusted_probability: 0.5 * conditional,
            sigma: 0.5 * conditional,
        };
        let decoding = s.resolve(&posterior, &mut qcfail, &mut accumulator);
        assert_eq!(decoding.barcode_index, 1);
        assert_eq!(decoding.distance, 3);
        assert!(!qcfail);
        assert_eq!(accumulator.tags[0].low_conditional_confidence_count, 0);
        assert_eq!(accumulator.unclassified.low_conditional_confidence_count, 0);
    }

    #[test]
    fn test_tied_posterior_at_threshold() {
        let barcodes = vec![
            Barcode::new(1, "a", &["AAAC".to_string()], 0.5).unwrap(),
            Barcode::new(2, "b", &["AACA".to_string()], 0.5).unwrap(),
        ];
        let codec = Codec::new(Barcode::undetermined(&[4], 0.0), barcodes, vec![4], None).unwrap();
        // Les deux bases ambiguës rendent les deux candidats exactement équiprobables
        let observed = observation("AANN", 30);

        let mut at = PhredAdjusted::new(Arc::new(PhredScale::default()), 0.0, 0.5, 4);
        let posterior = at.posterior(&observed, &codec);
        assert!(posterior.conditional_probability > at.random_barcode_probability());
        assert_eq!(posterior.confidence(), 0.5);

        let mut accumulator = AccumulatingClassifier::new(0, &codec.undetermined, &codec.barcodes);
        let mut qcfail = false;
        let decoding = at.decode(&observed, &codec, &mut qcfail, &mut accumulator);
        assert_eq!(decoding.barcode_index, 1);
        assert!(qcfail);
        assert_eq!(accumulator.tags[0].low_confidence_count, 1);

        let mut below = PhredAdjusted::new(Arc::new(PhredScale::default()), 0.0, 0.499_999_999, 4);
        let mut accumulator = AccumulatingClassifier::new(0, &codec.undetermined, &codec.barcodes);
        let mut qcfail = false;
        let decoding = below.decode(&observed, &codec, &mut qcfail, &mut accumulator);
        assert_eq!(decoding.barcode_index, 1);
        assert_eq!(decoding.confidence, 0.5);
        assert!(!qcfail);
        assert_eq!(accumulator.tags[0].low_confidence_count, 0);
        assert_eq!(accumulator.tags[0].accumulated_pf_confidence, 0.5);
    }

    #[test]
    fn test_inherited_qcfail_skips_pf_confidence() {
        let codec = codec();
        let mut s = strategy();
        let mut accumulator = AccumulatingClassifier::new(0, &codec.undetermined, &codec.barcodes);
        let mut qcfail = true;
        let decoding = s.decode(&observation("CCCC", 35), &codec, &mut qcfail, &mut accumulator);
        assert_eq!(decoding.barcode_index, 2);
        assert!(accumulator.tags[1].accumulated_confidence > 0.0);
        assert_eq!(accumulator.tags[1].accumulated_pf_confidence, 0.0);
    }

    #[test]
    fn test_ties_keep_first_barcode() {
        let barcodes = vec![
            Barcode::new(1, "a", &["AC".to_string()], 0.5).unwrap(),
            Barcode::new(2, "b", &["CA".to_string()], 0.5).unwrap(),
        ];
        let codec = Codec::new(Barcode::undetermined(&[2], 0.0), barcodes, vec![2], None).unwrap();
        let s = PhredAdjusted::new(Arc::new(PhredScale::default()), 0.0, 0.4, 2);
        let posterior = s.posterior(&observation("AA", 30), &codec);
        assert_eq!(posterior.barcode_index, 1);
        assert!((posterior.confidence() - 0.5).abs() < 1e-12);
    }
}
