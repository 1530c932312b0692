//! Métrique de Hamming d'un jeu de codes-barres et borne de Shannon

use crate::barcode::Barcode;
use crate::error::{DemuxError, Result};
use crate::nucleotide::code_to_ascii;
use crate::sequence::hamming_distance;
use serde::Serialize;
use std::fmt;

/// Résumé sérialisable d'une métrique
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricSummary {
    pub word_length: usize,
    pub word_count: usize,
    pub minimum_distance: usize,
    pub shannon_bound: usize,
}

/// Matrice des distances deux à deux d'un ensemble de mots de même longueur
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordMetric {
    word_length: usize,
    words: Vec<Vec<u8>>,
    distance: Vec<Vec<usize>>,
    minimum_distance: usize,
}

impl WordMetric {
    /// Crée une métrique vide pour des mots de longueur donnée
    pub fn new(word_length: usize) -> Self {
        Self {
            word_length,
            words: Vec::new(),
            distance: Vec::new(),
            minimum_distance: word_length,
        }
    }

    /// Ajoute un mot, les doublons sont ignorés
    pub fn add(&mut self, word: &[u8]) -> Result<()> {
        if word.len() != self.word_length {
            return Err(DemuxError::configuration(format!(
                "mot de longueur {} dans une métrique de longueur {}",
                word.len(),
                self.word_length
            )));
        }
        if !self.words.iter().any(|w| w == word) {
            let row: Vec<usize> = self.words.iter().map(|w| hamming_distance(w, word)).collect();
            for (existing, d) in self.distance.iter_mut().zip(&row) {
                existing.push(*d);
            }
            if let Some(&smallest) = row.iter().min() {
                self.minimum_distance = self.minimum_distance.min(smallest);
            }
            let mut row = row;
            row.push(0);
            self.distance.push(row);
            self.words.push(word.to_vec());
        }
        Ok(())
    }

    pub fn word_length(&self) -> usize {
        self.word_length
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    /// Distance entre les mots `i` et `j`
    pub fn distance(&self, i: usize, j: usize) -> usize {
        self.distance[i][j]
    }

    /// Plus petite distance deux à deux, la longueur des mots s'il y a moins de deux mots
    pub fn minimum_distance(&self) -> usize {
        self.minimum_distance
    }

    /// Nombre d'erreurs toujours corrigibles sans ambiguïté
    pub fn shannon_bound(&self) -> usize {
        pairwise_shannon_bound(self.minimum_distance)
    }

    pub fn summary(&self) -> MetricSummary {
        MetricSummary {
            word_length: self.word_length,
            word_count: self.words.len(),
            minimum_distance: self.minimum_distance,
            shannon_bound: self.shannon_bound(),
        }
    }
}

#[inline]
fn pairwise_shannon_bound(distance: usize) -> usize {
    distance.saturating_sub(1) / 2
}

impl fmt::Display for WordMetric {
    /// Distances au-dessus de la diagonale, bornes de Shannon deux à deux en dessous
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<String> = self
            .words
            .iter()
            .map(|w| w.iter().map(|&c| code_to_ascii(c) as char).collect())
            .collect();
        write!(f, "{:width$}", "", width = self.word_length)?;
        for label in &labels {
            write!(f, " {}", label)?;
        }
        writeln!(f)?;
        for (i, label) in labels.iter().enumerate() {
            write!(f, "{}", label)?;
            for j in 0..labels.len() {
                let cell = match i.cmp(&j) {
                    std::cmp::Ordering::Less => self.distance[i][j].to_string(),
                    std::cmp::Ordering::Greater => pairwise_shannon_bound(self.distance[i][j]).to_string(),
                    std::cmp::Ordering::Equal => "-".to_string(),
                };
                write!(f, " {:>width$}", cell, width = self.word_length)?;
            }
            writeln!(f)?;
        }
        writeln!(
            f,
            "Distance minimale: {}  Borne de Shannon: {}",
            self.minimum_distance,
            self.shannon_bound()
        )
    }
}

/// Métriques par segment et concaténée d'un codec
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecMetric {
    segments: Vec<WordMetric>,
    concatenated: WordMetric,
}

impl CodecMetric {
    /// Calcule les métriques d'un jeu de codes-barres classés
    pub fn new(barcodes: &[Barcode], segment_lengths: &[usize]) -> Result<Self> {
        let mut segments: Vec<WordMetric> = segment_lengths.iter().map(|&l| WordMetric::new(l)).collect();
        let mut concatenated = WordMetric::new(segment_lengths.iter().sum());

        for barcode in barcodes.iter().filter(|b| b.is_classified()) {
            if barcode.segment_cardinality() != segment_lengths.len() {
                return Err(DemuxError::configuration(format!(
                    "le code-barres {} a {} segments, {} attendus",
                    barcode.id,
                    barcode.segment_cardinality(),
                    segment_lengths.len()
                )));
            }
            for (index, (metric, word)) in segments.iter_mut().zip(barcode.segments()).enumerate() {
                metric.add(word).map_err(|_| {
                    DemuxError::configuration(format!(
                        "le segment {} du code-barres {} doit faire {} nucléotides",
                        index,
                        barcode.id,
                        metric.word_length()
                    ))
                })?;
            }
            concatenated.add(&barcode.key())?;
        }
        Ok(Self { segments, concatenated })
    }

    pub fn segments(&self) -> &[WordMetric] {
        &self.segments
    }

    pub fn concatenated(&self) -> &WordMetric {
        &self.concatenated
    }

    /// Borne de Shannon de chaque segment
    pub fn shannon_bounds(&self) -> Vec<usize> {
        self.segments.iter().map(WordMetric::shannon_bound).collect()
    }

    /// Valide la tolérance configurée, ou retourne les bornes de Shannon par défaut
    pub fn compile_tolerance(&self, configured: Option<&[usize]>) -> Result<Vec<usize>> {
        let bounds = self.shannon_bounds();
        match configured {
            None => Ok(bounds),
            Some(tolerance) => {
                if tolerance.len() != bounds.len() {
                    return Err(DemuxError::configuration(format!(
                        "{} tolérances spécifiées pour {} segments",
                        tolerance.len(),
                        bounds.len()
                    )));
                }
                for (index, (t, bound)) in tolerance.iter().zip(&bounds).enumerate() {
                    if t > bound {
                        return Err(DemuxError::configuration(format!(
                            "la tolérance du segment {} est supérieure à la borne de Shannon {}",
                            index, bound
                        )));
                    }
                }
                Ok(tolerance.to_vec())
            }
        }
    }
}

impl fmt::Display for CodecMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, metric) in self.segments.iter().enumerate() {
            writeln!(f, "Segment {}", index)?;
            write!(f, "{}", metric)?;
            writeln!(f)?;
        }
        if self.segments.len() > 1 {
            writeln!(f, "Concaténé")?;
            write!(f, "{}", self.concatenated)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn barcodes(words: &[&[&str]]) -> Vec<Barcode> {
        words
            .iter()
            .enumerate()
            .map(|(i, segments)| {
                let segments: Vec<String> = segments.iter().map(|s| s.to_string()).collect();
                Barcode::new(i + 1, format!("b{}", i + 1), &segments, 1.0).unwrap()
            })
            .collect()
    }

    #[test]
    fn test_shannon_bound() {
        let set = barcodes(&[&["AAAA"], &["CCCC"], &["GGGG"]]);
        let metric = CodecMetric::new(&set, &[4]).unwrap();
        assert_eq!(metric.segments()[0].minimum_distance(), 4);
        assert_eq!(metric.shannon_bounds(), vec![1]);
    }

    #[test]
    fn test_single_word_metric() {
        let mut metric = WordMetric::new(6);
        metric.add(b"\x01\x01\x01\x01\x01\x01").unwrap();
        assert_eq!(metric.minimum_distance(), 6);
        assert_eq!(metric.shannon_bound(), 2);
    }

    #[test]
    fn test_duplicates_are_ignored() {
        let mut metric = WordMetric::new(2);
        metric.add(&[1, 2]).unwrap();
        metric.add(&[1, 2]).unwrap();
        assert_eq!(metric.word_count(), 1);
        assert!(metric.add(&[1]).is_err());
    }

    #[test]
    fn test_concatenated_metric() {
        let set = barcodes(&[&["AC", "GT"], &["AG", "GA"]]);
        let metric = CodecMetric::new(&set, &[2, 2]).unwrap();
        assert_eq!(metric.segments()[0].minimum_distance(), 1);
        assert_eq!(metric.segments()[1].minimum_distance(), 1);
        assert_eq!(metric.concatenated().minimum_distance(), 2);
        assert_eq!(metric.concatenated().word_length(), 4);
    }

    #[test]
    fn test_tolerance_above_bound_is_rejected() {
        let set = barcodes(&[&["AAAA"], &["CCCC"]]);
        let metric = CodecMetric::new(&set, &[4]).unwrap();
        assert_eq!(metric.compile_tolerance(None).unwrap(), vec![1]);
        assert_eq!(metric.compile_tolerance(Some(&[0])).unwrap(), vec![0]);
        assert!(matches!(metric.compile_tolerance(Some(&[2])), Err(DemuxError::Configuration(_))));
        assert!(matches!(metric.compile_tolerance(Some(&[1, 1])), Err(DemuxError::Configuration(_))));
    }

    #[test]
    fn test_segment_length_mismatch() {
        let set = barcodes(&[&["AAAA"], &["CCC"]]);
        assert!(matches!(CodecMetric::new(&set, &[4]), Err(DemuxError::Configuration(_))));
        let set = barcodes(&[&["AAAA", "A"]]);
        assert!(matches!(CodecMetric::new(&set, &[4]), Err(DemuxError::Configuration(_))));
    }

    #[test]
    fn test_describe_matrix() {
        let set = barcodes(&[&["AAAA"], &["AACC"]]);
        let metric = CodecMetric::new(&set, &[4]).unwrap();
        let text = metric.segments()[0].to_string();
        assert!(text.contains("AACC"));
        assert!(text.contains("Borne de Shannon: 0"));
        assert_eq!(metric.segments()[0].distance(0, 1), 2);
        assert_eq!(metric.segments()[0].distance(1, 0), 2);
    }
}
