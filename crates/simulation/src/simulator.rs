//! Générateur de lectures tirées d'un jeu de codes-barres

use crate::error_model::{ErrorModel, QualityRange};
use demux_core::decoder::Codec;
use demux_core::transform::{LeftOperator, TokenSource};
use demux_core::{DemuxError, InputFeeds, JobConfig, MemoryFeed, Result, Segment, Sequence, SharedFeed, Target};
use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Codes BAM de A, C, G et T
const STANDARD_CODES: [u8; 4] = [0x1, 0x2, 0x4, 0x8];

/// Paramètres d'une simulation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub read_count: usize,
    /// Longueur de chaque segment d'entrée
    pub read_length: usize,
    pub error_model: ErrorModel,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self { read_count: 1000, read_length: 100, error_model: ErrorModel::default() }
    }
}

/// Lecture simulée et le code-barres dont elle est issue
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedRead {
    pub segments: Vec<Segment>,
    /// Index du code-barres d'origine, 0 pour une lecture de bruit
    pub truth: usize,
    pub substitutions: usize,
}

/// Position d'un segment de code-barres dans les segments d'entrée
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Placement {
    segment: usize,
    start: usize,
}

/// Générateur déterministe sous un seed
///
/// Le code-barres d'origine est tiré selon les concentrations compilées du
/// décodeur d'échantillon, le non déterminé recevant le bruit. Les segments de
/// code-barres sont posés aux positions que lit la règle du décodeur.
pub struct ReadSimulator {
    codec: Arc<Codec>,
    layout: Vec<Placement>,
    weights: WeightedIndex<f64>,
    input_segment_cardinality: usize,
    config: SimulationConfig,
    rng: ChaCha8Rng,
    produced: usize,
}

impl ReadSimulator {
    pub fn new(job: &JobConfig, config: SimulationConfig) -> Result<Self> {
        config.error_model.validate()?;
        let decoder = job
            .multiplex
            .as_ref()
            .ok_or_else(|| DemuxError::configuration("la simulation requiert un décodeur d'échantillon"))?
            .compile(0, Target::Multiplex, job.input_segment_cardinality)?;
        if decoder.codec.is_transparent() {
            return Err(DemuxError::configuration("le décodeur d'échantillon n'a aucun code-barres"));
        }

        let mut layout = Vec::with_capacity(decoder.rule.output_cardinality());
        for output in 0..decoder.rule.output_cardinality() {
            let mut transforms = decoder.rule.transforms().iter().filter(|t| t.output_segment_index == output);
            let placement = match (transforms.next(), transforms.next()) {
                (Some(transform), None) if transform.operator == LeftOperator::Identity => {
                    match (transform.token.source, transform.token.start(), transform.token.end()) {
                        (TokenSource::Segment(segment), start, Some(end)) if start >= 0 && end > start => {
                            if end as usize > config.read_length {
                                return Err(DemuxError::configuration(format!(
                                    "le jeton {} dépasse la longueur de lecture {}",
                                    transform.token, config.read_length
                                )));
                            }
                            Placement { segment, start: start as usize }
                        }
                        _ => return Err(unsupported(output)),
                    }
                }
                _ => return Err(unsupported(output)),
            };
            layout.push(placement);
        }

        let concentrations = std::iter::once(decoder.codec.undetermined.concentration)
            .chain(decoder.codec.barcodes.iter().map(|b| b.concentration));
        let weights = WeightedIndex::new(concentrations)
            .map_err(|error| DemuxError::configuration(format!("concentrations invalides: {}", error)))?;

        tracing::debug!(
            "Simulation de {} lectures sur {} codes-barres",
            config.read_count,
            decoder.codec.barcodes.len()
        );
        Ok(Self {
            codec: decoder.codec,
            layout,
            weights,
            input_segment_cardinality: job.input_segment_cardinality,
            rng: ChaCha8Rng::seed_from_u64(config.error_model.seed),
            config,
            produced: 0,
        })
    }

    /// Tire la lecture suivante
    pub fn next_read(&mut self) -> SimulatedRead {
        let truth = self.weights.sample(&mut self.rng);
        let length = self.config.read_length;
        let mut codes: Vec<Vec<u8>> = (0..self.input_segment_cardinality)
            .map(|_| (0..length).map(|_| self.random_code()).collect())
            .collect();

        if truth > 0 {
            let barcode = self.codec.barcode(truth);
            for (placement, word) in self.layout.iter().zip(barcode.segments()) {
                codes[placement.segment][placement.start..placement.start + word.len()].copy_from_slice(word);
            }
        }

        let model = self.config.error_model.clone();
        let qcfail = self.rng.gen_bool(model.qcfail_rate);
        let name = format!("sim.{}.{}", self.produced, truth);
        self.produced += 1;

        let mut substitutions = 0;
        let mut segments = Vec::with_capacity(codes.len());
        for mut code in codes {
            let mut quality = Vec::with_capacity(code.len());
            for nucleotide in code.iter_mut() {
                if self.rng.gen_bool(model.substitution_rate) {
                    *nucleotide = self.substitute(*nucleotide);
                    quality.push(self.draw_quality(model.error_quality));
                    substitutions += 1;
                } else {
                    quality.push(self.draw_quality(model.quality));
                }
            }
            let mut segment = Segment::new(name.clone(), Sequence { code, quality });
            segment.qcfail = qcfail;
            segments.push(segment);
        }
        SimulatedRead { segments, truth, substitutions }
    }

    /// Tire `read_count` lectures
    pub fn simulate(&mut self) -> Vec<SimulatedRead> {
        (0..self.config.read_count).map(|_| self.next_read()).collect()
    }

    /// Flux d'entrée en mémoire, un par segment
    pub fn input_feeds(&self, reads: &[SimulatedRead]) -> Result<InputFeeds> {
        let feeds = (0..self.input_segment_cardinality)
            .map(|index| {
                let segments: Vec<Segment> = reads.iter().map(|r| r.segments[index].clone()).collect();
                SharedFeed::new(index, format!("simulation.{}", index), Box::new(MemoryFeed::new(segments)))
            })
            .collect();
        InputFeeds::new(feeds)
    }

    fn random_code(&mut self) -> u8 {
        STANDARD_CODES[self.rng.gen_range(0..STANDARD_CODES.len())]
    }

    fn substitute(&mut self, code: u8) -> u8 {
        let mut replacement = code;
        while replacement == code {
            replacement = self.random_code();
        }
        replacement
    }

    fn draw_quality(&mut self, range: QualityRange) -> u8 {
        self.rng.gen_range(range.min..=range.max)
    }
}

/// Index du code-barres d'origine encodé dans le nom d'une lecture simulée
pub fn parse_truth(name: &str) -> Option<usize> {
    let mut parts = name.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some("sim"), Some(_), Some(truth), None) => truth.parse().ok(),
        _ => None,
    }
}

fn unsupported(output: usize) -> DemuxError {
    DemuxError::configuration(format!(
        "le segment {} du code-barres doit être lu par un seul jeton direct à bornes positives",
        output
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use demux_core::{BarcodeConfig, DecoderConfig, RuleConfig};

    fn job(tokens: &[&str]) -> JobConfig {
        JobConfig {
            input_segment_cardinality: 2,
            multiplex: Some(DecoderConfig {
                noise: 0.1,
                transform: RuleConfig::new(tokens),
                codec: vec![
                    BarcodeConfig::new(&["AAAAAA", "CCCC"]).with_concentration(3.0),
                    BarcodeConfig::new(&["GGGGGG", "TTTT"]).with_concentration(1.0),
                ],
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn config(seed: u64) -> SimulationConfig {
        SimulationConfig { read_count: 50, read_length: 20, error_model: ErrorModel::new(0.0).with_seed(seed) }
    }

    #[test]
    fn test_same_seed_same_reads() {
        let job = job(&["0:0:6", "1:4:8"]);
        let first = ReadSimulator::new(&job, config(7)).unwrap().simulate();
        let second = ReadSimulator::new(&job, config(7)).unwrap().simulate();
        assert_eq!(first, second);
        let other = ReadSimulator::new(&job, config(8)).unwrap().simulate();
        assert_ne!(first, other);
    }

    #[test]
    fn test_barcodes_are_placed() {
        let mut simulator = ReadSimulator::new(&job(&["0:0:6", "1:4:8"]), config(1)).unwrap();
        for read in simulator.simulate() {
            assert_eq!(read.segments.len(), 2);
            assert_eq!(read.segments[0].sequence.len(), 20);
            assert_eq!(parse_truth(&read.segments[1].name), Some(read.truth));
            let first = read.segments[0].sequence.to_string();
            let second = read.segments[1].sequence.to_string();
            match read.truth {
                1 => assert!(first.starts_with("AAAAAA") && &second[4..8] == "CCCC"),
                2 => assert!(first.starts_with("GGGGGG") && &second[4..8] == "TTTT"),
                _ => assert_eq!(read.truth, 0),
            }
        }
    }

    #[test]
    fn test_draws_follow_concentration() {
        let mut config = config(3);
        config.read_count = 4000;
        let mut simulator = ReadSimulator::new(&job(&["0:0:6", "1:4:8"]), config).unwrap();
        let mut counts = [0usize; 3];
        for read in simulator.simulate() {
            counts[read.truth] += 1;
        }
        // 0.1 de bruit puis 0.675 et 0.225
        assert!((counts[0] as f64 / 4000.0 - 0.1).abs() < 0.03);
        assert!((counts[1] as f64 / 4000.0 - 0.675).abs() < 0.03);
        assert!((counts[2] as f64 / 4000.0 - 0.225).abs() < 0.03);
    }

    #[test]
    fn test_substitutions_lower_quality() {
        let mut config = config(5);
        config.error_model.substitution_rate = 0.5;
        let mut simulator = ReadSimulator::new(&job(&["0:0:6", "1:4:8"]), config).unwrap();
        let read = simulator.next_read();
        assert!(read.substitutions > 0);
        let low = read
            .segments
            .iter()
            .flat_map(|s| s.sequence.quality.iter())
            .filter(|&&q| q <= 15)
            .count();
        assert_eq!(low, read.substitutions);
    }

    #[test]
    fn test_unsupported_layout() {
        assert!(ReadSimulator::new(&job(&["0:-6:", "1:4:8"]), config(1)).is_err());
        assert!(ReadSimulator::new(&job(&["0:0:6", "1:16:20"]), SimulationConfig { read_length: 12, ..config(1) }).is_err());
        let mut without = job(&["0:0:6", "1:4:8"]);
        without.multiplex = None;
        assert!(ReadSimulator::new(&without, config(1)).is_err());
    }

    #[test]
    fn test_parse_truth() {
        assert_eq!(parse_truth("sim.12.3"), Some(3));
        assert_eq!(parse_truth("read12"), None);
    }
}
