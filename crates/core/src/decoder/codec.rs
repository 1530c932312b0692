//! Jeu de codes-barres partagé en lecture seule entre les pivots

use crate::barcode::Barcode;
use crate::error::{DemuxError, Result};
use crate::metric::CodecMetric;
use std::collections::HashMap;

/// Codes-barres compilés, métrique et tolérances d'un décodeur
#[derive(Debug, Clone)]
pub struct Codec {
    pub undetermined: Barcode,
    pub barcodes: Vec<Barcode>,
    pub segment_lengths: Vec<usize>,
    pub tolerance: Vec<usize>,
    pub metric: Option<CodecMetric>,
    index_by_key: HashMap<Vec<u8>, usize>,
}

impl Codec {
    /// Compile un codec; les index des codes-barres doivent valoir 1..=N dans l'ordre
    pub fn new(
        undetermined: Barcode,
        barcodes: Vec<Barcode>,
        segment_lengths: Vec<usize>,
        tolerance: Option<&[usize]>,
    ) -> Result<Self> {
        if barcodes.is_empty() {
            return Err(DemuxError::configuration("le codec ne contient aucun code-barres"));
        }
        for (position, barcode) in barcodes.iter().enumerate() {
            if barcode.index != position + 1 {
                return Err(DemuxError::internal(format!(
                    "le code-barres {} porte l'index {} à la position {}",
                    barcode.id, barcode.index, position
                )));
            }
        }

        let metric = CodecMetric::new(&barcodes, &segment_lengths)?;
        let tolerance = metric.compile_tolerance(tolerance)?;

        let mut index_by_key = HashMap::with_capacity(barcodes.len());
        for barcode in &barcodes {
            if let Some(previous) = index_by_key.insert(barcode.key(), barcode.index) {
                return Err(DemuxError::configuration(format!(
                    "la séquence {} est dupliquée entre les codes-barres {} et {}",
                    barcode, barcodes[previous - 1].id, barcode.id
                )));
            }
        }

        Ok(Self {
            undetermined,
            barcodes,
            segment_lengths,
            tolerance,
            metric: Some(metric),
            index_by_key,
        })
    }

    /// Codec sans code-barres, pour un décodeur transparent
    pub fn transparent(segment_cardinality: usize) -> Self {
        Self {
            undetermined: Barcode::undetermined(&vec![0; segment_cardinality], 1.0),
            barcodes: Vec::new(),
            segment_lengths: vec![0; segment_cardinality],
            tolerance: vec![0; segment_cardinality],
            metric: None,
            index_by_key: HashMap::new(),
        }
    }

    pub fn is_transparent(&self) -> bool {
        self.barcodes.is_empty()
    }

    pub fn segment_cardinality(&self) -> usize {
        self.segment_lengths.len()
    }

    /// Nombre total de nucléotides d'un code-barres
    pub fn nucleotide_cardinality(&self) -> usize {
        self.segment_lengths.iter().sum()
    }

    /// Recherche exacte sur les codes concaténés
    #[inline]
    pub fn lookup(&self, key: &[u8]) -> Option<usize> {
        self.index_by_key.get(key).copied()
    }

    /// Code-barres par index, 0 pour le non déterminé
    #[inline]
    pub fn barcode(&self, index: usize) -> &Barcode {
        match index {
            0 => &self.undetermined,
            i => &self.barcodes[i - 1],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn barcode(index: usize, bases: &str) -> Barcode {
        Barcode::new(index, bases, &[bases.to_string()], 0.5).unwrap()
    }

    #[test]
    fn test_lookup() {
        let codec = Codec::new(
            Barcode::undetermined(&[4], 0.01),
            vec![barcode(1, "AAAA"), barcode(2, "CCCC")],
            vec![4],
            None,
        )
        .unwrap();
        assert_eq!(codec.lookup(&barcode(2, "CCCC").key()), Some(2));
        assert_eq!(codec.lookup(&[1, 1, 1, 2]), None);
        assert_eq!(codec.barcode(0).id, "undetermined");
        assert_eq!(codec.barcode(1).id, "AAAA");
        assert_eq!(codec.nucleotide_cardinality(), 4);
    }

    #[test]
    fn test_duplicate_sequence() {
        let result = Codec::new(
            Barcode::undetermined(&[4], 0.01),
            vec![barcode(1, "AAAA"), barcode(2, "AAAA")],
            vec![4],
            None,
        );
        assert!(matches!(result, Err(DemuxError::Configuration(_))));
    }

    #[test]
    fn test_empty_codec() {
        let result = Codec::new(Barcode::undetermined(&[4], 0.01), Vec::new(), vec![4], None);
        assert!(matches!(result, Err(DemuxError::Configuration(_))));
        assert!(Codec::transparent(1).is_transparent());
    }
}
