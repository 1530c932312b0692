//! Séquences nucléotidiques avec qualités Phred

use crate::error::{DemuxError, Result};
use crate::nucleotide::{ascii_to_code, code_to_ascii, complement_code};
use crate::phred::SAM_PHRED_DECODING_OFFSET;
use std::fmt;

/// Séquence observée: codes BAM et qualités Phred brutes (sans décalage ASCII)
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Sequence {
    pub code: Vec<u8>,
    pub quality: Vec<u8>,
}

impl Sequence {
    /// Crée une séquence vide
    pub fn new() -> Self {
        Self::default()
    }

    /// Décode des bases et des qualités ASCII (décalage SAM de 33)
    pub fn from_ascii(bases: &[u8], quality: &[u8]) -> Result<Self> {
        if bases.len() != quality.len() {
            return Err(DemuxError::sequence(format!(
                "longueur de qualité {} différente de la longueur de séquence {}",
                quality.len(),
                bases.len()
            )));
        }
        Ok(Self {
            code: bases.iter().map(|&b| ascii_to_code(b)).collect(),
            quality: quality.iter().map(|&q| q.saturating_sub(SAM_PHRED_DECODING_OFFSET)).collect(),
        })
    }

    /// Séquence à qualité uniforme
    pub fn with_uniform_quality(bases: &str, quality: u8) -> Self {
        let code: Vec<u8> = bases.bytes().map(ascii_to_code).collect();
        let quality = vec![quality; code.len()];
        Self { code, quality }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.code.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Vide la séquence en conservant la capacité
    pub fn clear(&mut self) {
        self.code.clear();
        self.quality.clear();
    }

    /// Ajoute l'intervalle `[start, end)` d'une autre séquence
    pub fn append(&mut self, other: &Sequence, start: usize, end: usize) {
        if start < end {
            self.code.extend_from_slice(&other.code[start..end]);
            self.quality.extend_from_slice(&other.quality[start..end]);
        }
    }

    /// Ajoute le complément inverse de l'intervalle `[start, end)`
    pub fn append_reverse_complement(&mut self, other: &Sequence, start: usize, end: usize) {
        if start < end {
            self.code.extend(other.code[start..end].iter().rev().map(|&c| complement_code(c)));
            self.quality.extend(other.quality[start..end].iter().rev());
        }
    }

    /// Bases en ASCII
    pub fn to_ascii(&self) -> Vec<u8> {
        self.code.iter().map(|&c| code_to_ascii(c)).collect()
    }

    /// Qualités en ASCII avec le décalage SAM
    pub fn quality_to_ascii(&self) -> Vec<u8> {
        self.quality.iter().map(|&q| q.saturating_add(SAM_PHRED_DECODING_OFFSET)).collect()
    }

    /// Moyenne des qualités, 0 pour une séquence vide
    pub fn mean_quality(&self) -> f64 {
        if self.quality.is_empty() {
            return 0.0;
        }
        self.quality.iter().map(|&q| q as f64).sum::<f64>() / self.quality.len() as f64
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &c in &self.code {
            write!(f, "{}", code_to_ascii(c) as char)?;
        }
        Ok(())
    }
}

/// Distance de Hamming entre deux mots de même longueur
#[inline]
pub fn hamming_distance(left: &[u8], right: &[u8]) -> usize {
    left.iter().zip(right).filter(|(l, r)| l != r).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_ascii() {
        let sequence = Sequence::from_ascii(b"ACGN", b"II#!").unwrap();
        assert_eq!(sequence.len(), 4);
        assert_eq!(sequence.quality, vec![40, 40, 2, 0]);
        assert_eq!(sequence.to_string(), "ACGN");
        assert_eq!(sequence.quality_to_ascii(), b"II#!".to_vec());
    }

    #[test]
    fn test_length_mismatch_is_sequence_error() {
        let result = Sequence::from_ascii(b"ACGT", b"III");
        assert!(matches!(result, Err(DemuxError::Sequence(_))));
    }

    #[test]
    fn test_append_reverse_complement() {
        let source = Sequence::from_ascii(b"AACG", b"ABCD").unwrap();
        let mut target = Sequence::new();
        target.append_reverse_complement(&source, 1, 4);
        assert_eq!(target.to_string(), "CGT");
        // Les qualités suivent l'inversion
        assert_eq!(target.quality_to_ascii(), b"DCB".to_vec());
    }

    #[test]
    fn test_hamming_distance() {
        let a = Sequence::with_uniform_quality("ACGT", 30);
        let b = Sequence::with_uniform_quality("ACCA", 30);
        assert_eq!(hamming_distance(&a.code, &b.code), 2);
        assert_eq!(hamming_distance(&a.code, &a.code), 0);
    }
}
