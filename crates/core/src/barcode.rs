//! Codes-barres attendus, observations et probabilité de décodage

use crate::error::{DemuxError, Result};
use crate::kahan::KahanSum;
use crate::nucleotide::{IupacBase, ANY_NUCLEOTIDE};
use crate::phred::{PhredScale, PHRED_PROBABILITY_BASE};
use crate::sequence::{hamming_distance, Sequence};
use std::fmt;

/// Sous-séquences observées, parallèles aux segments d'un code-barres
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Observation {
    segments: Vec<Sequence>,
}

impl Observation {
    pub fn new(segment_cardinality: usize) -> Self {
        Self { segments: vec![Sequence::new(); segment_cardinality] }
    }

    pub fn from_segments(segments: Vec<Sequence>) -> Self {
        Self { segments }
    }

    pub fn segment_cardinality(&self) -> usize {
        self.segments.len()
    }

    pub fn segments(&self) -> &[Sequence] {
        &self.segments
    }

    pub fn segments_mut(&mut self) -> &mut [Sequence] {
        &mut self.segments
    }

    /// Longueur totale en nucléotides
    pub fn len(&self) -> usize {
        self.segments.iter().map(Sequence::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Écrit les codes concaténés de tous les segments dans `buffer`
    pub fn write_key(&self, buffer: &mut Vec<u8>) {
        buffer.clear();
        for segment in &self.segments {
            buffer.extend_from_slice(&segment.code);
        }
    }

    /// Écrit l'observation concaténée dans `target`
    pub fn concatenate_into(&self, target: &mut Sequence) {
        target.clear();
        for segment in &self.segments {
            target.append(segment, 0, segment.len());
        }
    }
}

/// Code-barres attendu avec sa concentration a priori
///
/// L'index 0 est réservé au code-barres non déterminé.
#[derive(Debug, Clone, PartialEq)]
pub struct Barcode {
    pub index: usize,
    pub id: String,
    segments: Vec<Vec<u8>>,
    pub concentration: f64,
}

impl Barcode {
    /// Construit un code-barres depuis ses segments en ASCII
    pub fn new(index: usize, id: impl Into<String>, segments: &[String], concentration: f64) -> Result<Self> {
        let segments = segments
            .iter()
            .map(|segment| {
                segment
                    .chars()
                    .map(|c| {
                        IupacBase::from_char(c).map(IupacBase::code).map_err(|_| {
                            DemuxError::configuration(format!("base {} invalide dans le code-barres {}", c, segment))
                        })
                    })
                    .collect::<Result<Vec<u8>>>()
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { index, id: id.into(), segments, concentration })
    }

    /// Code-barres non déterminé, composé de N
    pub fn undetermined(segment_lengths: &[usize], concentration: f64) -> Self {
        Self {
            index: 0,
            id: "undetermined".to_string(),
            segments: segment_lengths.iter().map(|&l| vec![ANY_NUCLEOTIDE; l]).collect(),
            concentration,
        }
    }

    #[inline]
    pub fn is_classified(&self) -> bool {
        self.index > 0
    }

    pub fn segment_cardinality(&self) -> usize {
        self.segments.len()
    }

    pub fn segments(&self) -> &[Vec<u8>] {
        &self.segments
    }

    /// Nombre total de nucléotides
    pub fn total_length(&self) -> usize {
        self.segments.iter().map(Vec::len).sum()
    }

    /// Codes concaténés, clé de la recherche exacte
    pub fn key(&self) -> Vec<u8> {
        self.segments.concat()
    }

    /// Segments en ASCII
    pub fn segment_strings(&self) -> Vec<String> {
        self.segments
            .iter()
            .map(|segment| segment.iter().map(|&c| crate::nucleotide::code_to_ascii(c) as char).collect())
            .collect()
    }

    /// Distance de Hamming d'un segment
    #[inline]
    pub fn segment_distance(&self, segment: usize, observed: &Sequence) -> usize {
        hamming_distance(&self.segments[segment], &observed.code)
    }

    /// Distance d'un segment en ignorant les positions de qualité inférieure au seuil
    #[inline]
    pub fn masked_segment_distance(&self, segment: usize, observed: &Sequence, threshold: u8) -> usize {
        self.segments[segment]
            .iter()
            .zip(observed.code.iter().zip(&observed.quality))
            .filter(|(expected, (code, quality))| **quality >= threshold && *expected != *code)
            .count()
    }

    /// Distance totale sur tous les segments
    pub fn distance(&self, observation: &Observation) -> usize {
        self.segments
            .iter()
            .zip(observation.segments())
            .map(|(expected, observed)| hamming_distance(expected, &observed.code))
            .sum()
    }

    /// P(observation | code-barres), somme séquentielle simple
    pub fn decoding_probability(&self, observation: &Observation, scale: &PhredScale) -> (f64, usize) {
        let mut sigma = 0.0;
        let mut distance = 0;
        self.visit_scores(observation, scale, |score, mismatch| {
            sigma += score;
            distance += mismatch as usize;
        });
        (PHRED_PROBABILITY_BASE.powf(sigma), distance)
    }

    /// P(observation | code-barres), somme compensée de Kahan
    pub fn compensated_decoding_probability(&self, observation: &Observation, scale: &PhredScale) -> (f64, usize) {
        let mut sigma = KahanSum::new();
        let mut distance = 0;
        self.visit_scores(observation, scale, |score, mismatch| {
            sigma.add(score);
            distance += mismatch as usize;
        });
        (PHRED_PROBABILITY_BASE.powf(sigma.value()), distance)
    }

    #[inline]
    fn visit_scores<F: FnMut(f64, bool)>(&self, observation: &Observation, scale: &PhredScale, mut visit: F) {
        for (expected, observed) in self.segments.iter().zip(observation.segments()) {
            for ((&e, &o), &q) in expected.iter().zip(&observed.code).zip(&observed.quality) {
                visit(scale.substitution_quality(e, o, q), e != o);
            }
        }
    }

    /// Séquence corrigée: bases attendues avec les qualités observées
    pub fn correct_into(&self, observation: &Observation, target: &mut Sequence) {
        target.clear();
        for (expected, observed) in self.segments.iter().zip(observation.segments()) {
            target.code.extend_from_slice(expected);
            target.quality.extend_from_slice(&observed.quality[..expected.len().min(observed.len())]);
        }
    }
}

impl fmt::Display for Barcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segment_strings().join("-"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn barcode(index: usize, segments: &[&str]) -> Barcode {
        let segments: Vec<String> = segments.iter().map(|s| s.to_string()).collect();
        Barcode::new(index, format!("b{}", index), &segments, 1.0).unwrap()
    }

    fn observation(segments: &[(&str, u8)]) -> Observation {
        Observation::from_segments(
            segments.iter().map(|(b, q)| Sequence::with_uniform_quality(b, *q)).collect(),
        )
    }

    #[test]
    fn test_invalid_base_is_configuration_error() {
        let result = Barcode::new(1, "x", &["ACGX".to_string()], 1.0);
        assert!(matches!(result, Err(DemuxError::Configuration(_))));
    }

    #[test]
    fn test_undetermined_is_not_classified() {
        let undetermined = Barcode::undetermined(&[4, 2], 0.01);
        assert!(!undetermined.is_classified());
        assert_eq!(undetermined.to_string(), "NNNN-NN");
        assert!(barcode(1, &["ACGT"]).is_classified());
    }

    #[test]
    fn test_masked_distance_ignores_low_quality() {
        let expected = barcode(1, &["AAAA"]);
        let mut observed = Sequence::with_uniform_quality("AAAT", 30);
        assert_eq!(expected.segment_distance(0, &observed), 1);
        observed.quality[3] = 5;
        assert_eq!(expected.masked_segment_distance(0, &observed, 10), 0);
        assert_eq!(expected.masked_segment_distance(0, &observed, 5), 1);
    }

    #[test]
    fn test_compensated_probability_of_perfect_match() {
        let scale = PhredScale::default();
        let expected = barcode(1, &["AAAA"]);
        let (probability, distance) = expected.compensated_decoding_probability(&observation(&[("AAAA", 40)]), &scale);
        assert_eq!(distance, 0);
        assert!((probability - (1.0 - 1e-4_f64).powi(4)).abs() < 1e-12);
    }

    #[test]
    fn test_probability_variants_agree() {
        let scale = PhredScale::default();
        let expected = barcode(1, &["ACGT", "GG"]);
        let observed = observation(&[("ACGA", 25), ("GN", 12)]);
        let (simple, d1) = expected.decoding_probability(&observed, &scale);
        let (compensated, d2) = expected.compensated_decoding_probability(&observed, &scale);
        assert_eq!(d1, 2);
        assert_eq!(d2, 2);
        assert!((simple - compensated).abs() <= 1e-12 * simple.max(compensated));
    }

    #[test]
    fn test_correct_into_keeps_observed_quality() {
        let expected = barcode(1, &["ACGT"]);
        let observed = observation(&[("ACCT", 17)]);
        let mut corrected = Sequence::new();
        expected.correct_into(&observed, &mut corrected);
        assert_eq!(corrected.to_string(), "ACGT");
        assert_eq!(corrected.quality, vec![17; 4]);
    }
}
