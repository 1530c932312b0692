//! Décodage par distance minimale (MDD)

use super::{Algorithm, Codec, Decoding, DecodingStrategy};
use crate::accumulator::AccumulatingClassifier;
use crate::barcode::{Barcode, Observation};

/// Recherche exacte puis premier code-barres dont chaque segment respecte sa tolérance
#[derive(Debug, Clone, Default)]
pub struct MinimumDistance {
    /// Les positions de qualité strictement inférieure sont ignorées, 0 désactive le masquage
    quality_masking_threshold: u8,
    key: Vec<u8>,
}

impl MinimumDistance {
    pub fn new(quality_masking_threshold: u8) -> Self {
        Self { quality_masking_threshold, key: Vec::new() }
    }

    /// Distance totale si chaque segment reste dans sa tolérance
    #[inline]
    fn within_tolerance(&self, barcode: &Barcode, observation: &Observation, tolerance: &[usize]) -> Option<usize> {
        let mut distance = 0;
        for (index, (observed, &limit)) in observation.segments().iter().zip(tolerance).enumerate() {
            let error = if self.quality_masking_threshold > 0 {
                barcode.masked_segment_distance(index, observed, self.quality_masking_threshold)
            } else {
                barcode.segment_distance(index, observed)
            };
            if error > limit {
                return None;
            }
            distance += error;
        }
        Some(distance)
    }
}

impl DecodingStrategy for MinimumDistance {
    fn algorithm(&self) -> Algorithm {
        Algorithm::MinimumDistance
    }

    fn decode(
        &mut self,
        observation: &Observation,
        codec: &Codec,
        _qcfail: &mut bool,
        _accumulator: &mut AccumulatingClassifier,
    ) -> Decoding {
        observation.write_key(&mut self.key);
        if let Some(barcode_index) = codec.lookup(&self.key) {
            return Decoding { barcode_index, distance: 0, confidence: 0.0 };
        }

        // Premier arrivé dans l'ordre de configuration
        for barcode in &codec.barcodes {
            if let Some(distance) = self.within_tolerance(barcode, observation, &codec.tolerance) {
                return Decoding { barcode_index: barcode.index, distance, confidence: 0.0 };
            }
        }
        Decoding::unclassified()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::Sequence;

    fn codec(words: &[&str], tolerance: Option<&[usize]>) -> Codec {
        let length = words[0].len();
        let barcodes = words
            .iter()
            .enumerate()
            .map(|(i, w)| Barcode::new(i + 1, *w, &[w.to_string()], 1.0).unwrap())
            .collect();
        Codec::new(Barcode::undetermined(&[length], 0.01), barcodes, vec![length], tolerance).unwrap()
    }

    fn decode(strategy: &mut MinimumDistance, codec: &Codec, observed: Sequence) -> Decoding {
        let mut accumulator = AccumulatingClassifier::new(0, &codec.undetermined, &codec.barcodes);
        let mut qcfail = false;
        let observation = Observation::from_segments(vec![observed]);
        strategy.decode(&observation, codec, &mut qcfail, &mut accumulator)
    }

    #[test]
    fn test_exact_match() {
        let codec = codec(&["AAAA", "CCCC", "GGGG"], None);
        let decoding = decode(&mut MinimumDistance::new(0), &codec, Sequence::with_uniform_quality("GGGG", 30));
        assert_eq!(decoding.barcode_index, 3);
        assert_eq!(decoding.distance, 0);
    }

    #[test]
    fn test_correction_within_tolerance() {
        let codec = codec(&["AAAA", "CCCC", "GGGG"], None);
        let mut strategy = MinimumDistance::new(0);
        let decoding = decode(&mut strategy, &codec, Sequence::with_uniform_quality("AGAA", 30));
        assert_eq!(decoding.barcode_index, 1);
        assert_eq!(decoding.distance, 1);

        let decoding = decode(&mut strategy, &codec, Sequence::with_uniform_quality("AGGA", 30));
        assert_eq!(decoding, Decoding::unclassified());
    }

    #[test]
    fn test_zero_tolerance_requires_exact_match() {
        let codec = codec(&["AACC", "AAGG"], Some(&[0]));
        let decoding = decode(&mut MinimumDistance::new(0), &codec, Sequence::with_uniform_quality("AACG", 30));
        assert_eq!(decoding.barcode_index, 0);
    }

    #[test]
    fn test_first_fit_in_configuration_order() {
        // Le masquage rend l'observation compatible avec les deux codes-barres
        let codec = codec(&["AAGG", "AACC"], None);
        let mut observed = Sequence::with_uniform_quality("AATT", 30);
        observed.quality[2] = 2;
        observed.quality[3] = 2;
        let decoding = decode(&mut MinimumDistance::new(10), &codec, observed);
        assert_eq!(decoding.barcode_index, 1);
        assert_eq!(decoding.distance, 0);
    }

    #[test]
    fn test_quality_masking() {
        let codec = codec(&["AAAA", "CCCC", "GGGG"], None);
        let mut observed = Sequence::with_uniform_quality("ATTA", 30);
        observed.quality[1] = 3;

        let decoding = decode(&mut MinimumDistance::new(0), &codec, observed.clone());
        assert_eq!(decoding.barcode_index, 0);

        let decoding = decode(&mut MinimumDistance::new(10), &codec, observed);
        assert_eq!(decoding.barcode_index, 1);
        assert_eq!(decoding.distance, 1);
    }
}
