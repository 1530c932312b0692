//! Configuration typée d'une tâche de démultiplexage
//!
//! La configuration est lue en JSON puis compilée: chaque [`DecoderConfig`]
//! devient un [`CompiledDecoder`] dont le codec est normalisé et validé.

use crate::barcode::Barcode;
use crate::decoder::{Algorithm, Codec, CompiledDecoder, Target};
use crate::error::{DemuxError, Result};
use crate::phred::SubstitutionModel;
use crate::transform::{Rule, SourceCardinality};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

pub const DEFAULT_NOISE: f64 = 0.01;
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.95;

fn default_threads() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// Code-barres attendu: un sous-code par segment d'observation
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BarcodeConfig {
    /// Identifiant, la séquence concaténée par défaut
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub barcode: Vec<String>,
    /// Concentration relative, 1 par défaut
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concentration: Option<f64>,
}

impl BarcodeConfig {
    pub fn new(barcode: &[&str]) -> Self {
        Self { id: None, barcode: barcode.iter().map(|s| s.to_string()).collect(), concentration: None }
    }

    pub fn with_concentration(mut self, concentration: f64) -> Self {
        self.concentration = Some(concentration);
        self
    }
}

/// Jetons et patron d'assemblage d'une règle
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RuleConfig {
    pub token: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knit: Option<Vec<String>>,
}

impl RuleConfig {
    pub fn new(tokens: &[&str]) -> Self {
        Self { token: tokens.iter().map(|s| s.to_string()).collect(), knit: None }
    }

    pub fn compile(&self) -> Result<Rule> {
        Rule::new(&self.token, self.knit.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    pub algorithm: Algorithm,
    /// Proportion a priori de lectures sans code-barres valide
    pub noise: f64,
    pub confidence_threshold: f64,
    pub quality_masking_threshold: u8,
    /// Tolérance par segment, les bornes de Shannon par défaut
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_tolerance: Option<Vec<usize>>,
    pub transform: RuleConfig,
    pub codec: Vec<BarcodeConfig>,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            noise: DEFAULT_NOISE,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            quality_masking_threshold: 0,
            distance_tolerance: None,
            transform: RuleConfig::default(),
            codec: Vec::new(),
        }
    }
}

impl DecoderConfig {
    /// Compile le décodeur pour des lectures de `input_segment_cardinality` segments
    pub fn compile(&self, index: usize, target: Target, input_segment_cardinality: usize) -> Result<CompiledDecoder> {
        if !(0.0..=1.0).contains(&self.noise) {
            return Err(DemuxError::configuration(format!(
                "décodeur {}: le bruit {} doit être compris entre 0 et 1",
                target, self.noise
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(DemuxError::configuration(format!(
                "décodeur {}: le seuil de confiance {} doit être compris entre 0 et 1",
                target, self.confidence_threshold
            )));
        }
        if self.transform.token.is_empty() {
            return Err(DemuxError::configuration(format!("décodeur {}: aucun jeton d'observation", target)));
        }

        let rule = self.transform.compile()?;
        rule.validate(SourceCardinality::segments(input_segment_cardinality))?;

        let codec = match self.algorithm {
            Algorithm::Transparent => {
                if !self.codec.is_empty() {
                    tracing::warn!(%target, "codes-barres ignorés par le décodeur transparent");
                }
                Codec::transparent(rule.output_cardinality())
            }
            _ => self.compile_codec(&rule)?,
        };

        tracing::debug!(
            %target,
            algorithm = %self.algorithm,
            barcodes = codec.barcodes.len(),
            tolerance = ?codec.tolerance,
            "décodeur compilé"
        );

        Ok(CompiledDecoder {
            index,
            target,
            algorithm: self.algorithm,
            rule: Arc::new(rule),
            codec: Arc::new(codec),
            noise: self.noise,
            confidence_threshold: self.confidence_threshold,
            quality_masking_threshold: self.quality_masking_threshold,
        })
    }

    fn compile_codec(&self, rule: &Rule) -> Result<Codec> {
        let segment_lengths = rule.segment_lengths()?;

        let mut total = 0.0;
        for config in &self.codec {
            match config.concentration {
                Some(c) if c < 0.0 => {
                    return Err(DemuxError::configuration(format!(
                        "concentration négative {} pour le code-barres {}",
                        c,
                        config.barcode.concat()
                    )))
                }
                Some(c) => total += c,
                None => total += 1.0,
            }
        }
        if !self.codec.is_empty() && total <= 0.0 {
            return Err(DemuxError::configuration("la somme des concentrations doit être positive"));
        }
        let factor = (1.0 - self.noise) / total;

        let mut ids = HashSet::with_capacity(self.codec.len());
        let mut barcodes = Vec::with_capacity(self.codec.len());
        for (position, config) in self.codec.iter().enumerate() {
            let id = config.id.clone().unwrap_or_else(|| config.barcode.concat());
            if !ids.insert(id.clone()) {
                return Err(DemuxError::configuration(format!("identifiant de code-barres dupliqué: {}", id)));
            }
            let concentration = config.concentration.unwrap_or(1.0) * factor;
            barcodes.push(Barcode::new(position + 1, id, &config.barcode, concentration)?);
        }

        let undetermined = Barcode::undetermined(&segment_lengths, self.noise);
        Codec::new(undetermined, barcodes, segment_lengths, self.distance_tolerance.as_deref())
    }
}

/// Configuration complète d'une tâche
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    pub input_segment_cardinality: usize,
    pub decoding_threads: usize,
    /// Assemblage des lectures de sortie, identité par défaut
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<RuleConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiplex: Option<DecoderConfig>,
    pub cellular: Vec<DecoderConfig>,
    pub molecular: Vec<DecoderConfig>,
    pub enable_quality_control: bool,
    pub filter_outgoing_qc_fail: bool,
    pub substitution_model: SubstitutionModel,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            input_segment_cardinality: 1,
            decoding_threads: default_threads(),
            template: None,
            multiplex: None,
            cellular: Vec::new(),
            molecular: Vec::new(),
            enable_quality_control: true,
            filter_outgoing_qc_fail: false,
            substitution_model: SubstitutionModel::default(),
        }
    }
}

impl JobConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: JobConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.input_segment_cardinality == 0 {
            return Err(DemuxError::configuration("au moins un segment d'entrée est requis"));
        }
        if self.decoding_threads == 0 {
            return Err(DemuxError::configuration("au moins un fil de décodage est requis"));
        }
        Ok(())
    }

    /// Sources disponibles pour le patron de sortie
    pub fn template_sources(&self) -> SourceCardinality {
        SourceCardinality {
            segments: self.input_segment_cardinality,
            sample: self.multiplex.is_some(),
            cellular: self.cellular.len(),
            molecular: self.molecular.len(),
        }
    }

    /// Compile le patron de sortie
    pub fn compile_template(&self) -> Result<Rule> {
        let rule = match &self.template {
            Some(template) => template.compile()?,
            None => Rule::identity(self.input_segment_cardinality),
        };
        rule.validate(self.template_sources())?;
        Ok(rule)
    }
}
