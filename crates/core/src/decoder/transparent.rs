//! Décodeur transparent: extrait la séquence sans la classer

use super::{Algorithm, Codec, Decoding, DecodingStrategy};
use crate::accumulator::AccumulatingClassifier;
use crate::barcode::Observation;

/// Toute observation reste non classée; la séquence corrigée est la séquence brute
#[derive(Debug, Clone, Copy, Default)]
pub struct Transparent;

impl DecodingStrategy for Transparent {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Transparent
    }

    fn decode(
        &mut self,
        _observation: &Observation,
        _codec: &Codec,
        _qcfail: &mut bool,
        _accumulator: &mut AccumulatingClassifier,
    ) -> Decoding {
        Decoding::unclassified()
    }
}
