//! Lectures multi-segments et annotations de décodage

use crate::error::{DemuxError, Result};
use crate::sequence::Sequence;

/// Segment physique d'une lecture (une entrée FASTQ)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Segment {
    /// Identifiant de la lecture
    pub name: String,
    pub sequence: Sequence,
    /// Marqué en échec qualité par le séquenceur
    pub qcfail: bool,
}

impl Segment {
    pub fn new(name: impl Into<String>, sequence: Sequence) -> Self {
        Self { name: name.into(), sequence, qcfail: false }
    }

    pub fn clear(&mut self) {
        self.name.clear();
        self.sequence.clear();
        self.qcfail = false;
    }
}

/// Résultat d'un décodeur sur une lecture
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Annotation {
    /// Observation brute concaténée
    pub raw: Sequence,
    /// Code-barres décodé, ou l'observation brute si non classé
    pub corrected: Sequence,
    /// Index du code-barres décodé, 0 si non classé
    pub barcode_index: usize,
    pub distance: usize,
    pub confidence: f64,
}

impl Annotation {
    pub fn clear(&mut self) {
        self.raw.clear();
        self.corrected.clear();
        self.barcode_index = 0;
        self.distance = 0;
        self.confidence = 0.0;
    }

    /// Vrai si un code-barres a été attribué
    pub fn is_classified(&self) -> bool {
        self.barcode_index > 0
    }
}

/// Lecture logique: segments d'entrée et annotations des décodeurs
#[derive(Debug, Clone, Default)]
pub struct Read {
    pub segments: Vec<Segment>,
    /// Canal de sortie attribué par le décodeur d'échantillon
    pub channel_index: usize,
    pub qcfail: bool,
    pub sample: Annotation,
    pub cellular: Vec<Annotation>,
    pub molecular: Vec<Annotation>,
}

impl Read {
    /// Crée une lecture vide avec les cardinalités données
    pub fn new(segment_cardinality: usize, cellular_cardinality: usize, molecular_cardinality: usize) -> Self {
        Self {
            segments: vec![Segment::default(); segment_cardinality],
            channel_index: 0,
            qcfail: false,
            sample: Annotation::default(),
            cellular: vec![Annotation::default(); cellular_cardinality],
            molecular: vec![Annotation::default(); molecular_cardinality],
        }
    }

    pub fn segment_cardinality(&self) -> usize {
        self.segments.len()
    }

    /// Nom de la lecture, pris sur le premier segment
    pub fn name(&self) -> &str {
        self.segments.first().map(|s| s.name.as_str()).unwrap_or("")
    }

    /// Vérifie que tous les segments portent le même identifiant
    pub fn validate(&self) -> Result<()> {
        if let Some((first, rest)) = self.segments.split_first() {
            for (offset, segment) in rest.iter().enumerate() {
                if segment.name != first.name {
                    return Err(DemuxError::sequence(format!(
                        "segment {} nommé {} ne correspond pas au segment 0 nommé {}",
                        offset + 1,
                        segment.name,
                        first.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Reporte le drapeau qualité du séquenceur sur la lecture
    pub fn inherit_qcfail(&mut self) {
        self.qcfail = self.segments.iter().any(|s| s.qcfail);
    }

    /// Remet la lecture à zéro pour le prochain tirage
    pub fn clear(&mut self) {
        for segment in &mut self.segments {
            segment.clear();
        }
        self.channel_index = 0;
        self.qcfail = false;
        self.sample.clear();
        for annotation in self.cellular.iter_mut().chain(self.molecular.iter_mut()) {
            annotation.clear();
        }
    }
}
