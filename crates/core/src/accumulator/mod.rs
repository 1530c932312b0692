//! Accumulateurs de classification et de qualité
//!
//! Chaque pivot possède ses propres accumulateurs. Ils ne contiennent que des
//! sommes courantes, fusionnées avec `+=` une fois tous les pivots terminés;
//! les champs dérivés ne sont calculés que par `finalize()`.

pub mod quality;

pub use quality::{
    AveragePhredAccumulator, CycleAccumulator, NucleotideAccumulator, ReadAccumulator, SegmentAccumulator,
};

use crate::barcode::Barcode;
use crate::error::{DemuxError, Result};
use std::ops::AddAssign;

#[inline]
pub(crate) fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// Compteurs d'un code-barres (ou du code-barres non déterminé)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AccumulatingTag {
    pub index: usize,
    pub id: String,
    pub barcode: String,
    /// Concentration a priori utilisée pendant le décodage
    pub concentration: f64,

    pub count: u64,
    pub pf_count: u64,
    pub accumulated_distance: u64,
    pub accumulated_pf_distance: u64,
    pub accumulated_confidence: f64,
    pub accumulated_pf_confidence: f64,
    pub low_conditional_confidence_count: u64,
    pub low_confidence_count: u64,

    // Champs dérivés
    pub pf_fraction: f64,
    pub average_distance: f64,
    pub average_pf_distance: f64,
    pub average_confidence: f64,
    pub average_pf_confidence: f64,
    pub pooled_fraction: f64,
    pub pf_pooled_fraction: f64,
    pub pooled_classified_fraction: f64,
    pub pf_pooled_classified_fraction: f64,
    pub estimated_concentration_prior: f64,
}

impl AccumulatingTag {
    pub fn new(barcode: &Barcode) -> Self {
        Self {
            index: barcode.index,
            id: barcode.id.clone(),
            barcode: barcode.to_string(),
            concentration: barcode.concentration,
            ..Default::default()
        }
    }

    /// Calcule les champs dérivés relativement au classifieur parent
    pub fn finalize(&mut self, parent: &AccumulatingClassifier) {
        let count = self.count as f64;
        let pf_count = self.pf_count as f64;
        self.pf_fraction = ratio(pf_count, count);
        self.average_distance = ratio(self.accumulated_distance as f64, count);
        self.average_confidence = ratio(self.accumulated_confidence, count);
        self.average_pf_distance = ratio(self.accumulated_pf_distance as f64, pf_count);
        self.average_pf_confidence = ratio(self.accumulated_pf_confidence, pf_count);
        self.pooled_fraction = ratio(count, parent.count as f64);
        self.pf_pooled_fraction = ratio(pf_count, parent.pf_count as f64);
        self.pooled_classified_fraction = ratio(count, parent.classified_count as f64);
        self.pf_pooled_classified_fraction = ratio(pf_count, parent.pf_classified_count as f64);
    }
}

impl AddAssign<&AccumulatingTag> for AccumulatingTag {
    fn add_assign(&mut self, rhs: &AccumulatingTag) {
        self.count += rhs.count;
        self.pf_count += rhs.pf_count;
        self.accumulated_distance += rhs.accumulated_distance;
        self.accumulated_pf_distance += rhs.accumulated_pf_distance;
        self.accumulated_confidence += rhs.accumulated_confidence;
        self.accumulated_pf_confidence += rhs.accumulated_pf_confidence;
        self.low_conditional_confidence_count += rhs.low_conditional_confidence_count;
        self.low_confidence_count += rhs.low_confidence_count;
    }
}

/// Totaux d'un décodeur et estimation du bruit
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AccumulatingClassifier {
    pub index: usize,
    pub unclassified: AccumulatingTag,
    pub tags: Vec<AccumulatingTag>,

    // Totaux recalculés depuis les étiquettes par finalize()
    pub count: u64,
    pub pf_count: u64,
    pub classified_count: u64,
    pub pf_classified_count: u64,
    pub accumulated_classified_distance: u64,
    pub accumulated_pf_classified_distance: u64,
    pub accumulated_classified_confidence: f64,
    pub accumulated_pf_classified_confidence: f64,
    pub low_conditional_confidence_count: u64,
    pub low_confidence_count: u64,

    // Champs dérivés
    pub pf_fraction: f64,
    pub classified_fraction: f64,
    pub pf_classified_fraction: f64,
    pub classified_pf_fraction: f64,
    pub average_classified_distance: f64,
    pub average_pf_classified_distance: f64,
    pub average_classified_confidence: f64,
    pub average_pf_classified_confidence: f64,
    pub estimated_noise_prior: f64,
}

impl AccumulatingClassifier {
    /// Un compteur par code-barres, l'index 0 étant le non déterminé
    pub fn new(index: usize, undetermined: &Barcode, barcodes: &[Barcode]) -> Self {
        Self {
            index,
            unclassified: AccumulatingTag::new(undetermined),
            tags: barcodes.iter().map(AccumulatingTag::new).collect(),
            ..Default::default()
        }
    }

    /// Compteur d'un code-barres par index
    #[inline]
    pub fn tag_mut(&mut self, barcode_index: usize) -> &mut AccumulatingTag {
        match barcode_index {
            0 => &mut self.unclassified,
            i => &mut self.tags[i - 1],
        }
    }

    /// Fusionne un classifieur de même forme
    pub fn merge(&mut self, other: &AccumulatingClassifier) -> Result<()> {
        if self.index != other.index || self.tags.len() != other.tags.len() {
            return Err(DemuxError::internal(format!(
                "fusion du classifieur {} ({} codes-barres) avec le classifieur {} ({} codes-barres)",
                self.index,
                self.tags.len(),
                other.index,
                other.tags.len()
            )));
        }
        self.unclassified += &other.unclassified;
        for (left, right) in self.tags.iter_mut().zip(&other.tags) {
            *left += right;
        }
        Ok(())
    }

    /// Agrège les étiquettes, dérive les fractions et estime le bruit
    pub fn finalize(&mut self) {
        self.classified_count = 0;
        self.pf_classified_count = 0;
        self.accumulated_classified_distance = 0;
        self.accumulated_pf_classified_distance = 0;
        self.accumulated_classified_confidence = 0.0;
        self.accumulated_pf_classified_confidence = 0.0;
        self.low_conditional_confidence_count = self.unclassified.low_conditional_confidence_count;
        self.low_confidence_count = self.unclassified.low_confidence_count;

        for tag in &self.tags {
            self.classified_count += tag.count;
            self.pf_classified_count += tag.pf_count;
            self.accumulated_classified_distance += tag.accumulated_distance;
            self.accumulated_pf_classified_distance += tag.accumulated_pf_distance;
            self.accumulated_classified_confidence += tag.accumulated_confidence;
            self.accumulated_pf_classified_confidence += tag.accumulated_pf_confidence;
            self.low_conditional_confidence_count += tag.low_conditional_confidence_count;
            self.low_confidence_count += tag.low_confidence_count;
        }
        self.count = self.classified_count + self.unclassified.count;
        self.pf_count = self.pf_classified_count + self.unclassified.pf_count;

        let parent = self.clone_totals();
        self.unclassified.finalize(&parent);
        for tag in &mut self.tags {
            tag.finalize(&parent);
        }

        let count = self.count as f64;
        let pf_count = self.pf_count as f64;
        let classified = self.classified_count as f64;
        let pf_classified = self.pf_classified_count as f64;
        self.pf_fraction = ratio(pf_count, count);
        self.classified_fraction = ratio(classified, count);
        self.pf_classified_fraction = ratio(pf_classified, pf_count);
        self.classified_pf_fraction = ratio(pf_classified, classified);
        self.average_classified_distance = ratio(self.accumulated_classified_distance as f64, classified);
        self.average_classified_confidence = ratio(self.accumulated_classified_confidence, classified);
        self.average_pf_classified_distance = ratio(self.accumulated_pf_classified_distance as f64, pf_classified);
        self.average_pf_classified_confidence = ratio(self.accumulated_pf_classified_confidence, pf_classified);

        self.estimate_noise_prior();
    }

    /// Les lectures de faible confiance contiennent la même proportion de bruit
    /// que les lectures de faible confiance conditionnelle
    fn estimate_noise_prior(&mut self) {
        let mut noise = self.low_conditional_confidence_count as f64;
        let confident_noise_ratio = ratio(noise, noise + self.pf_classified_count as f64);
        if self.low_confidence_count > 0 {
            noise += self.low_confidence_count as f64 * confident_noise_ratio;
        }
        self.estimated_noise_prior = ratio(noise, self.count as f64);
        self.unclassified.estimated_concentration_prior = self.estimated_noise_prior;
        for tag in &mut self.tags {
            tag.estimated_concentration_prior = (1.0 - self.estimated_noise_prior) * tag.pf_pooled_classified_fraction;
        }
    }

    fn clone_totals(&self) -> AccumulatingClassifier {
        AccumulatingClassifier {
            index: self.index,
            count: self.count,
            pf_count: self.pf_count,
            classified_count: self.classified_count,
            pf_classified_count: self.pf_classified_count,
            ..Default::default()
        }
    }
}
