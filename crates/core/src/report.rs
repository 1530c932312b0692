//! Rapport sérialisable d'une tâche, construit depuis les accumulateurs finalisés

use crate::accumulator::{
    AccumulatingClassifier, AccumulatingTag, CycleAccumulator, NucleotideAccumulator, SegmentAccumulator,
};
use crate::channel::Channel;
use crate::decoder::{Algorithm, Codec, Target};
use crate::metric::MetricSummary;
use crate::nucleotide::{code_to_ascii, NO_NUCLEOTIDE};
use serde::Serialize;
use std::collections::BTreeMap;

fn is_zero(value: &u64) -> bool {
    *value == 0
}

fn is_zero_f64(value: &f64) -> bool {
    *value == 0.0
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn nucleotide_label(code: usize) -> String {
    if code == NO_NUCLEOTIDE as usize {
        "*".to_string()
    } else {
        (code_to_ascii(code as u8) as char).to_string()
    }
}

/// Rapport complet
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub input: InputReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiplex: Option<ClassifierReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cellular: Vec<ClassifierReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub molecular: Vec<ClassifierReport>,
    pub channels: Vec<ChannelReport>,
}

impl Report {
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Lectures tirées des flux d'entrée
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InputReport {
    pub count: u64,
    pub pf_count: u64,
    pub pf_fraction: f64,
}

impl InputReport {
    pub fn new(count: u64, pf_count: u64) -> Self {
        let pf_fraction = if count > 0 { pf_count as f64 / count as f64 } else { 0.0 };
        Self { count, pf_count, pf_fraction }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CodecMetricReport {
    pub segments: Vec<MetricSummary>,
    pub concatenated: MetricSummary,
    pub distance_tolerance: Vec<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassifierReport {
    pub index: usize,
    pub target: String,
    pub algorithm: Algorithm,
    pub count: u64,
    pub pf_count: u64,
    pub pf_fraction: f64,
    pub classified_count: u64,
    pub classified_fraction: f64,
    pub pf_classified_count: u64,
    pub pf_classified_fraction: f64,
    pub classified_pf_fraction: f64,
    #[serde(skip_serializing_if = "is_zero_f64")]
    pub average_classified_distance: f64,
    #[serde(skip_serializing_if = "is_zero_f64")]
    pub average_pf_classified_distance: f64,
    #[serde(skip_serializing_if = "is_zero_f64")]
    pub average_classified_confidence: f64,
    #[serde(skip_serializing_if = "is_zero_f64")]
    pub average_pf_classified_confidence: f64,
    #[serde(skip_serializing_if = "is_zero")]
    pub low_conditional_confidence_count: u64,
    #[serde(skip_serializing_if = "is_zero")]
    pub low_confidence_count: u64,
    pub estimated_noise_prior: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<CodecMetricReport>,
    pub unclassified: TagReport,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub classified: Vec<TagReport>,
}

impl ClassifierReport {
    pub fn new(target: Target, algorithm: Algorithm, codec: &Codec, classifier: &AccumulatingClassifier) -> Self {
        let metric = codec.metric.as_ref().map(|metric| CodecMetricReport {
            segments: metric.segments().iter().map(|m| m.summary()).collect(),
            concatenated: metric.concatenated().summary(),
            distance_tolerance: codec.tolerance.clone(),
        });
        Self {
            index: classifier.index,
            target: target.to_string(),
            algorithm,
            count: classifier.count,
            pf_count: classifier.pf_count,
            pf_fraction: classifier.pf_fraction,
            classified_count: classifier.classified_count,
            classified_fraction: classifier.classified_fraction,
            pf_classified_count: classifier.pf_classified_count,
            pf_classified_fraction: classifier.pf_classified_fraction,
            classified_pf_fraction: classifier.classified_pf_fraction,
            average_classified_distance: classifier.average_classified_distance,
            average_pf_classified_distance: classifier.average_pf_classified_distance,
            average_classified_confidence: classifier.average_classified_confidence,
            average_pf_classified_confidence: classifier.average_pf_classified_confidence,
            low_conditional_confidence_count: classifier.low_conditional_confidence_count,
            low_confidence_count: classifier.low_confidence_count,
            estimated_noise_prior: classifier.estimated_noise_prior,
            metric,
            unclassified: TagReport::from(&classifier.unclassified),
            classified: classifier.tags.iter().map(TagReport::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TagReport {
    pub index: usize,
    pub id: String,
    pub barcode: String,
    pub concentration: f64,
    pub estimated_concentration_prior: f64,
    pub count: u64,
    pub pf_count: u64,
    pub pf_fraction: f64,
    pub pooled_fraction: f64,
    pub pf_pooled_fraction: f64,
    #[serde(skip_serializing_if = "is_zero_f64")]
    pub pooled_classified_fraction: f64,
    #[serde(skip_serializing_if = "is_zero_f64")]
    pub pf_pooled_classified_fraction: f64,
    #[serde(skip_serializing_if = "is_zero_f64")]
    pub average_distance: f64,
    #[serde(skip_serializing_if = "is_zero_f64")]
    pub average_pf_distance: f64,
    #[serde(skip_serializing_if = "is_zero_f64")]
    pub average_confidence: f64,
    #[serde(skip_serializing_if = "is_zero_f64")]
    pub average_pf_confidence: f64,
    #[serde(skip_serializing_if = "is_zero")]
    pub low_conditional_confidence_count: u64,
    #[serde(skip_serializing_if = "is_zero")]
    pub low_confidence_count: u64,
}

impl From<&AccumulatingTag> for TagReport {
    fn from(tag: &AccumulatingTag) -> Self {
        Self {
            index: tag.index,
            id: tag.id.clone(),
            barcode: tag.barcode.clone(),
            concentration: tag.concentration,
            estimated_concentration_prior: tag.estimated_concentration_prior,
            count: tag.count,
            pf_count: tag.pf_count,
            pf_fraction: tag.pf_fraction,
            pooled_fraction: tag.pooled_fraction,
            pf_pooled_fraction: tag.pf_pooled_fraction,
            pooled_classified_fraction: tag.pooled_classified_fraction,
            pf_pooled_classified_fraction: tag.pf_pooled_classified_fraction,
            average_distance: tag.average_distance,
            average_pf_distance: tag.average_pf_distance,
            average_confidence: tag.average_confidence,
            average_pf_confidence: tag.average_pf_confidence,
            low_conditional_confidence_count: tag.low_conditional_confidence_count,
            low_confidence_count: tag.low_confidence_count,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelReport {
    pub index: usize,
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub barcode: String,
    #[serde(skip_serializing_if = "is_false")]
    pub undetermined: bool,
    pub count: u64,
    pub pf_count: u64,
    pub pf_fraction: f64,
    pub pooled_fraction: f64,
    pub pf_pooled_fraction: f64,
    /// Fractions des lectures assignées à un code-barres, absentes du canal non déterminé
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pooled_multiplex_fraction: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pf_pooled_multiplex_fraction: Option<f64>,
    #[serde(skip_serializing_if = "is_zero_f64")]
    pub multiplex_distance: f64,
    #[serde(skip_serializing_if = "is_zero_f64")]
    pub pf_multiplex_distance: f64,
    #[serde(skip_serializing_if = "is_zero_f64")]
    pub multiplex_confidence: f64,
    #[serde(skip_serializing_if = "is_zero_f64")]
    pub pf_multiplex_confidence: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub segments: Vec<SegmentReport>,
}

impl ChannelReport {
    pub fn new(channel: &Channel) -> Self {
        let statistics = &channel.statistics;
        let determined = |fraction: f64| (!channel.undetermined).then_some(fraction);
        let quality = &channel.accumulator;
        Self {
            index: channel.index,
            id: channel.id.clone(),
            barcode: channel.barcode.clone(),
            undetermined: channel.undetermined,
            count: statistics.count,
            pf_count: statistics.pf_count,
            pf_fraction: statistics.pf_fraction,
            pooled_fraction: statistics.pooled_fraction,
            pf_pooled_fraction: statistics.pf_pooled_fraction,
            pooled_multiplex_fraction: determined(statistics.pooled_multiplex_fraction),
            pf_pooled_multiplex_fraction: determined(statistics.pf_pooled_multiplex_fraction),
            multiplex_distance: statistics.multiplex_distance,
            pf_multiplex_distance: statistics.pf_multiplex_distance,
            multiplex_confidence: statistics.multiplex_confidence,
            pf_multiplex_confidence: statistics.pf_multiplex_confidence,
            segments: if quality.count > 0 { quality.segments.iter().map(SegmentReport::from).collect() } else { Vec::new() },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SegmentReport {
    pub shortest: usize,
    pub longest: usize,
    /// Nombre de bases par code IUPAC, `*` pour le total
    pub nucleotide_count: BTreeMap<String, u64>,
    pub average_phred: AveragePhredReport,
    pub cycles: Vec<CycleReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AveragePhredReport {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl From<&SegmentAccumulator> for SegmentReport {
    fn from(segment: &SegmentAccumulator) -> Self {
        let nucleotide_count = segment
            .nucleotide_count
            .iter()
            .enumerate()
            .filter(|(_, count)| **count > 0)
            .map(|(code, count)| (nucleotide_label(code), *count))
            .collect();
        Self {
            shortest: segment.shortest,
            longest: segment.longest,
            nucleotide_count,
            average_phred: AveragePhredReport {
                min: segment.average_phred.min,
                max: segment.average_phred.max,
                mean: segment.average_phred.mean,
            },
            cycles: segment
                .cycles
                .iter()
                .enumerate()
                .map(|(index, cycle)| CycleReport::new(index + 1, cycle))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub cycle: usize,
    pub nucleotides: Vec<BoxplotReport>,
}

impl CycleReport {
    pub fn new(cycle: usize, accumulator: &CycleAccumulator) -> Self {
        let nucleotides = accumulator
            .nucleotides
            .iter()
            .enumerate()
            .filter(|(_, n)| n.count > 0)
            .map(|(code, n)| BoxplotReport::new(nucleotide_label(code), n))
            .collect();
        Self { cycle, nucleotides }
    }
}

/// Boîte à moustaches de Tukey des qualités
#[derive(Debug, Clone, Serialize)]
pub struct BoxplotReport {
    pub nucleotide: String,
    pub count: u64,
    pub min: usize,
    pub max: usize,
    pub mean: f64,
    pub median: usize,
    pub q1: usize,
    pub q3: usize,
    pub iqr: usize,
    pub lw: f64,
    pub rw: f64,
}

impl BoxplotReport {
    pub fn new(nucleotide: String, n: &NucleotideAccumulator) -> Self {
        Self {
            nucleotide,
            count: n.count,
            min: n.min,
            max: n.max,
            mean: n.mean,
            median: n.median,
            q1: n.q1,
            q3: n.q3,
            iqr: n.iqr,
            lw: n.lw,
            rw: n.rw,
        }
    }
}
