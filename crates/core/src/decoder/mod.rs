//! Décodeurs de codes-barres
//!
//! Un [`Decoder`] compose une stratégie de décodage ([`MinimumDistance`],
//! [`PhredAdjusted`] ou [`Transparent`]) avec une cible ([`Target`]) qui
//! détermine où le résultat est écrit sur la lecture. Chaque pivot instancie
//! ses propres décodeurs depuis un [`CompiledDecoder`] partagé.

pub mod codec;
pub mod mdd;
pub mod pamld;
pub mod transparent;

pub use codec::Codec;
pub use mdd::MinimumDistance;
pub use pamld::PhredAdjusted;
pub use transparent::Transparent;

use crate::accumulator::AccumulatingClassifier;
use crate::barcode::Observation;
use crate::error::Result;
use crate::nucleotide::ANY_NUCLEOTIDE;
use crate::phred::PhredScale;
use crate::read::{Annotation, Read};
use crate::transform::Rule;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Algorithme de décodage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    #[serde(alias = "mdd")]
    MinimumDistance,
    #[default]
    #[serde(alias = "pamld")]
    Probabilistic,
    Transparent,
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Algorithm::MinimumDistance => "minimum-distance",
            Algorithm::Probabilistic => "probabilistic",
            Algorithm::Transparent => "transparent",
        };
        write!(f, "{}", name)
    }
}

/// Cible de classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Échantillon: détermine le canal de sortie
    Multiplex,
    Cellular(usize),
    Molecular(usize),
}

impl Target {
    fn annotation_mut<'a>(&self, read: &'a mut Read) -> &'a mut Annotation {
        match *self {
            Target::Multiplex => &mut read.sample,
            Target::Cellular(index) => &mut read.cellular[index],
            Target::Molecular(index) => &mut read.molecular[index],
        }
    }

    /// Écrit le résultat du décodage sur la lecture
    fn update(&self, read: &mut Read, codec: &Codec, observation: &Observation, decoding: &Decoding) {
        if *self == Target::Multiplex {
            read.channel_index = decoding.barcode_index;
        }
        let annotation = self.annotation_mut(read);
        observation.concatenate_into(&mut annotation.raw);
        if decoding.barcode_index > 0 {
            codec.barcode(decoding.barcode_index).correct_into(observation, &mut annotation.corrected);
        } else {
            observation.concatenate_into(&mut annotation.corrected);
        }
        annotation.barcode_index = decoding.barcode_index;
        annotation.distance = decoding.distance;
        annotation.confidence = decoding.confidence;
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Multiplex => write!(f, "multiplex"),
            Target::Cellular(index) => write!(f, "cellular {}", index),
            Target::Molecular(index) => write!(f, "molecular {}", index),
        }
    }
}

/// Issue d'une stratégie de décodage pour une observation
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Decoding {
    pub barcode_index: usize,
    pub distance: usize,
    pub confidence: f64,
}

impl Decoding {
    pub fn unclassified() -> Self {
        Self::default()
    }
}

/// Algorithme de décodage d'une observation
pub trait DecodingStrategy: Send {
    fn algorithm(&self) -> Algorithm;

    /// Décide du code-barres; peut marquer la lecture en échec qualité et
    /// mettre à jour les compteurs propres à l'algorithme
    fn decode(
        &mut self,
        observation: &Observation,
        codec: &Codec,
        qcfail: &mut bool,
        accumulator: &mut AccumulatingClassifier,
    ) -> Decoding;
}

/// Capacité commune aux décodeurs, manipulée par les pivots
pub trait Classifier: Send {
    fn target(&self) -> Target;
    fn algorithm(&self) -> Algorithm;
    fn codec(&self) -> &Codec;
    /// Extrait l'observation, la décode et annote la lecture
    fn classify(&mut self, read: &mut Read) -> Result<Decoding>;
    fn accumulator(&self) -> &AccumulatingClassifier;
    fn accumulator_mut(&mut self) -> &mut AccumulatingClassifier;
}

/// Décodeur générique: extraction, stratégie, comptage puis mise à jour de la cible
pub struct Decoder<S: DecodingStrategy> {
    target: Target,
    rule: Arc<Rule>,
    codec: Arc<Codec>,
    strategy: S,
    observation: Observation,
    accumulator: AccumulatingClassifier,
}

impl<S: DecodingStrategy> Decoder<S> {
    pub fn new(index: usize, target: Target, rule: Arc<Rule>, codec: Arc<Codec>, strategy: S) -> Self {
        let observation = Observation::new(rule.output_cardinality());
        let accumulator = AccumulatingClassifier::new(index, &codec.undetermined, &codec.barcodes);
        Self { target, rule, codec, strategy, observation, accumulator }
    }

    /// Complète une observation trop courte par des N de qualité nulle
    fn pad_observation(&mut self) {
        if self.codec.is_transparent() {
            return;
        }
        for (segment, &length) in self.observation.segments_mut().iter_mut().zip(&self.codec.segment_lengths) {
            if segment.len() < length {
                segment.code.resize(length, ANY_NUCLEOTIDE);
                segment.quality.resize(length, 0);
            }
        }
    }
}

impl<S: DecodingStrategy> Classifier for Decoder<S> {
    fn target(&self) -> Target {
        self.target
    }

    fn algorithm(&self) -> Algorithm {
        self.strategy.algorithm()
    }

    fn codec(&self) -> &Codec {
        &self.codec
    }

    fn classify(&mut self, read: &mut Read) -> Result<Decoding> {
        self.rule.apply(read, self.observation.segments_mut());
        self.pad_observation();

        let mut qcfail = read.qcfail;
        let decoding = self.strategy.decode(&self.observation, &self.codec, &mut qcfail, &mut self.accumulator);

        let tag = self.accumulator.tag_mut(decoding.barcode_index);
        if decoding.barcode_index > 0 && decoding.distance > 0 {
            tag.accumulated_distance += decoding.distance as u64;
            if !qcfail {
                tag.accumulated_pf_distance += decoding.distance as u64;
            }
        }
        tag.count += 1;
        if !qcfail {
            tag.pf_count += 1;
        }

        read.qcfail = qcfail;
        self.target.update(read, &self.codec, &self.observation, &decoding);
        Ok(decoding)
    }

    fn accumulator(&self) -> &AccumulatingClassifier {
        &self.accumulator
    }

    fn accumulator_mut(&mut self) -> &mut AccumulatingClassifier {
        &mut self.accumulator
    }
}

/// Paramètres compilés d'un décodeur, partagés entre pivots
#[derive(Debug, Clone)]
pub struct CompiledDecoder {
    pub index: usize,
    pub target: Target,
    pub algorithm: Algorithm,
    pub rule: Arc<Rule>,
    pub codec: Arc<Codec>,
    pub noise: f64,
    pub confidence_threshold: f64,
    pub quality_masking_threshold: u8,
}

impl CompiledDecoder {
    /// Instancie un décodeur privé pour un pivot
    pub fn instantiate(&self, scale: &Arc<PhredScale>) -> Box<dyn Classifier> {
        let rule = Arc::clone(&self.rule);
        let codec = Arc::clone(&self.codec);
        match self.algorithm {
            Algorithm::MinimumDistance => Box::new(Decoder::new(
                self.index,
                self.target,
                rule,
                codec,
                MinimumDistance::new(self.quality_masking_threshold),
            )),
            Algorithm::Probabilistic => {
                let strategy = PhredAdjusted::new(
                    Arc::clone(scale),
                    self.noise,
                    self.confidence_threshold,
                    self.codec.nucleotide_cardinality(),
                );
                Box::new(Decoder::new(self.index, self.target, rule, codec, strategy))
            }
            Algorithm::Transparent => Box::new(Decoder::new(self.index, self.target, rule, codec, Transparent)),
        }
    }
}
