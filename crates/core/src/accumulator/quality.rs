//! Histogrammes de qualité par cycle, par segment et par lecture

use crate::error::{DemuxError, Result};
use crate::nucleotide::{IUPAC_CODE_SIZE, NO_NUCLEOTIDE};
use crate::phred::EFFECTIVE_PHRED_RANGE;
use crate::read::Segment;
use crate::sequence::Sequence;
use std::ops::AddAssign;

#[inline]
fn bucket(phred: u8) -> usize {
    (phred as usize).min(EFFECTIVE_PHRED_RANGE - 1)
}

/// Histogramme des qualités d'un nucléotide à un cycle donné
#[derive(Debug, Clone, PartialEq)]
pub struct NucleotideAccumulator {
    pub distribution: [u64; EFFECTIVE_PHRED_RANGE],
    // Champs dérivés, valides après finalize()
    pub count: u64,
    pub min: usize,
    pub max: usize,
    pub sum: u64,
    pub mean: f64,
    pub median: usize,
    pub q1: usize,
    pub q3: usize,
    pub iqr: usize,
    pub lw: f64,
    pub rw: f64,
}

impl Default for NucleotideAccumulator {
    fn default() -> Self {
        Self {
            distribution: [0; EFFECTIVE_PHRED_RANGE],
            count: 0,
            min: 0,
            max: 0,
            sum: 0,
            mean: 0.0,
            median: 0,
            q1: 0,
            q3: 0,
            iqr: 0,
            lw: 0.0,
            rw: 0.0,
        }
    }
}

impl NucleotideAccumulator {
    #[inline]
    pub fn increment(&mut self, phred: u8) {
        self.distribution[bucket(phred)] += 1;
    }

    /// Plus petite qualité dont la distribution cumulée atteint `portion * count`
    pub fn quantile(&self, portion: f64) -> usize {
        let mut position = portion * self.count as f64;
        let mut last = 0;
        for (phred, &value) in self.distribution.iter().enumerate() {
            if value == 0 {
                continue;
            }
            last = phred;
            if value as f64 >= position {
                return phred;
            }
            position -= value as f64;
        }
        last
    }

    /// Calcule les statistiques de boîte à moustaches
    pub fn finalize(&mut self) {
        let distribution = self.distribution;
        *self = Self { distribution, ..Default::default() };

        self.count = distribution.iter().sum();
        if self.count == 0 {
            return;
        }
        let mut first = None;
        for (phred, &value) in distribution.iter().enumerate() {
            if value != 0 {
                self.sum += value * phred as u64;
                self.max = phred;
                first.get_or_insert(phred);
            }
        }
        self.min = first.unwrap_or(0);
        self.mean = self.sum as f64 / self.count as f64;
        self.median = self.quantile(0.5);
        self.q1 = self.quantile(0.25);
        self.q3 = self.quantile(0.75);
        self.iqr = self.q3.saturating_sub(self.q1);
        self.lw = (self.q1 as f64 - 1.5 * self.iqr as f64).max(self.min as f64);
        self.rw = (self.q3 as f64 + 1.5 * self.iqr as f64).min(self.max as f64);
    }
}

impl AddAssign<&NucleotideAccumulator> for NucleotideAccumulator {
    fn add_assign(&mut self, rhs: &NucleotideAccumulator) {
        for (left, right) in self.distribution.iter_mut().zip(rhs.distribution.iter()) {
            *left += right;
        }
    }
}

/// Un histogramme par code IUPAC à un cycle, le code 0 agrège toutes les bases
#[derive(Debug, Clone, PartialEq)]
pub struct CycleAccumulator {
    pub nucleotides: Vec<NucleotideAccumulator>,
}

impl Default for CycleAccumulator {
    fn default() -> Self {
        Self { nucleotides: vec![NucleotideAccumulator::default(); IUPAC_CODE_SIZE] }
    }
}

impl CycleAccumulator {
    #[inline]
    pub fn increment(&mut self, code: u8, phred: u8) {
        self.nucleotides[(code & 0xf) as usize].increment(phred);
    }

    pub fn finalize(&mut self) {
        let mut aggregate = [0u64; EFFECTIVE_PHRED_RANGE];
        for nucleotide in self.nucleotides.iter().skip(1) {
            for (total, value) in aggregate.iter_mut().zip(nucleotide.distribution.iter()) {
                *total += value;
            }
        }
        self.nucleotides[NO_NUCLEOTIDE as usize].distribution = aggregate;
        for nucleotide in &mut self.nucleotides {
            nucleotide.finalize();
        }
    }
}

impl AddAssign<&CycleAccumulator> for CycleAccumulator {
    fn add_assign(&mut self, rhs: &CycleAccumulator) {
        for (left, right) in self.nucleotides.iter_mut().zip(&rhs.nucleotides) {
            *left += right;
        }
    }
}

/// Distribution de la qualité moyenne par lecture
#[derive(Debug, Clone, PartialEq)]
pub struct AveragePhredAccumulator {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub sum: f64,
    pub distribution: [u64; EFFECTIVE_PHRED_RANGE],
    pub mean: f64,
}

impl Default for AveragePhredAccumulator {
    fn default() -> Self {
        Self {
            count: 0,
            min: f64::MAX,
            max: 0.0,
            sum: 0.0,
            distribution: [0; EFFECTIVE_PHRED_RANGE],
            mean: 0.0,
        }
    }
}

impl AveragePhredAccumulator {
    pub fn increment(&mut self, sequence: &Sequence) {
        if sequence.is_empty() {
            return;
        }
        let value = sequence.mean_quality();
        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.distribution[bucket(value as u8)] += 1;
    }

    pub fn finalize(&mut self) {
        if self.count > 0 {
            self.mean = self.sum / self.count as f64;
        } else {
            self.min = 0.0;
            self.mean = 0.0;
        }
    }
}

impl AddAssign<&AveragePhredAccumulator> for AveragePhredAccumulator {
    fn add_assign(&mut self, rhs: &AveragePhredAccumulator) {
        self.count += rhs.count;
        self.sum += rhs.sum;
        self.min = self.min.min(rhs.min);
        self.max = self.max.max(rhs.max);
        for (left, right) in self.distribution.iter_mut().zip(rhs.distribution.iter()) {
            *left += right;
        }
    }
}

/// Statistiques de qualité d'un segment de sortie
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentAccumulator {
    pub longest: usize,
    pub shortest: usize,
    pub nucleotide_count: [u64; IUPAC_CODE_SIZE],
    pub average_phred: AveragePhredAccumulator,
    pub cycles: Vec<CycleAccumulator>,
}

impl Default for SegmentAccumulator {
    fn default() -> Self {
        Self {
            longest: 0,
            shortest: usize::MAX,
            nucleotide_count: [0; IUPAC_CODE_SIZE],
            average_phred: AveragePhredAccumulator::default(),
            cycles: Vec::new(),
        }
    }
}

impl SegmentAccumulator {
    pub fn increment(&mut self, sequence: &Sequence) {
        if sequence.len() > self.cycles.len() {
            self.cycles.resize_with(sequence.len(), CycleAccumulator::default);
        }
        self.longest = self.longest.max(sequence.len());
        self.shortest = self.shortest.min(sequence.len());
        for ((cycle, &code), &quality) in self.cycles.iter_mut().zip(&sequence.code).zip(&sequence.quality) {
            self.nucleotide_count[NO_NUCLEOTIDE as usize] += 1;
            self.nucleotide_count[(code & 0xf) as usize] += 1;
            cycle.increment(code, quality);
        }
        self.average_phred.increment(sequence);
    }

    pub fn finalize(&mut self) {
        if self.shortest == usize::MAX {
            self.shortest = 0;
        }
        self.average_phred.finalize();
        for cycle in &mut self.cycles {
            cycle.finalize();
        }
    }
}

impl AddAssign<&SegmentAccumulator> for SegmentAccumulator {
    fn add_assign(&mut self, rhs: &SegmentAccumulator) {
        if rhs.cycles.len() > self.cycles.len() {
            self.cycles.resize_with(rhs.cycles.len(), CycleAccumulator::default);
        }
        self.longest = self.longest.max(rhs.longest);
        self.shortest = self.shortest.min(rhs.shortest);
        for (left, right) in self.nucleotide_count.iter_mut().zip(rhs.nucleotide_count.iter()) {
            *left += right;
        }
        self.average_phred += &rhs.average_phred;
        for (left, right) in self.cycles.iter_mut().zip(&rhs.cycles) {
            *left += right;
        }
    }
}

/// Statistiques de qualité de tous les segments d'un canal
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReadAccumulator {
    pub count: u64,
    pub pf_count: u64,
    pub pf_fraction: f64,
    pub segments: Vec<SegmentAccumulator>,
}

impl ReadAccumulator {
    pub fn new(segment_cardinality: usize) -> Self {
        Self {
            segments: vec![SegmentAccumulator::default(); segment_cardinality],
            ..Default::default()
        }
    }

    pub fn increment(&mut self, segments: &[Segment], qcfail: bool) {
        self.count += 1;
        if !qcfail {
            self.pf_count += 1;
        }
        for (accumulator, segment) in self.segments.iter_mut().zip(segments) {
            accumulator.increment(&segment.sequence);
        }
    }

    /// Fusionne un accumulateur de même forme
    pub fn merge(&mut self, other: &ReadAccumulator) -> Result<()> {
        if self.segments.len() != other.segments.len() {
            return Err(DemuxError::internal(format!(
                "fusion d'accumulateurs de {} et {} segments",
                self.segments.len(),
                other.segments.len()
            )));
        }
        self.count += other.count;
        self.pf_count += other.pf_count;
        for (left, right) in self.segments.iter_mut().zip(&other.segments) {
            *left += right;
        }
        Ok(())
    }

    pub fn finalize(&mut self) {
        self.pf_fraction = if self.count > 0 { self.pf_count as f64 / self.count as f64 } else { 0.0 };
        for segment in &mut self.segments {
            segment.finalize();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nucleotide::IupacBase;

    fn with_qualities(qualities: &[u8]) -> NucleotideAccumulator {
        let mut accumulator = NucleotideAccumulator::default();
        for &q in qualities {
            accumulator.increment(q);
        }
        accumulator
    }

    #[test]
    fn test_boxplot() {
        let mut accumulator = with_qualities(&[10, 20, 20, 30, 30, 30, 40, 40]);
        accumulator.finalize();
        assert_eq!(accumulator.count, 8);
        assert_eq!(accumulator.min, 10);
        assert_eq!(accumulator.max, 40);
        assert!((accumulator.mean - 27.5).abs() < 1e-12);
        assert_eq!(accumulator.q1, 20);
        assert_eq!(accumulator.median, 30);
        assert_eq!(accumulator.q3, 30);
        assert_eq!(accumulator.iqr, 10);
        assert_eq!(accumulator.lw, 10.0);
        assert_eq!(accumulator.rw, 40.0);
    }

    #[test]
    fn test_whiskers_within_range() {
        let mut accumulator = with_qualities(&[2, 30, 30, 30, 30, 30, 30, 41]);
        accumulator.finalize();
        assert_eq!(accumulator.iqr, 0);
        assert_eq!(accumulator.lw, 30.0);
        assert_eq!(accumulator.rw, 30.0);
    }

    #[test]
    fn test_empty_finalize() {
        let mut accumulator = NucleotideAccumulator::default();
        accumulator.finalize();
        assert_eq!(accumulator.count, 0);
        assert_eq!(accumulator.mean, 0.0);
    }

    #[test]
    fn test_quality_above_range_is_clamped() {
        let mut accumulator = with_qualities(&[60]);
        accumulator.finalize();
        assert_eq!(accumulator.max, EFFECTIVE_PHRED_RANGE - 1);
    }

    #[test]
    fn test_cycle_aggregate_bucket() {
        let mut cycle = CycleAccumulator::default();
        cycle.increment(IupacBase::A.code(), 30);
        cycle.increment(IupacBase::C.code(), 20);
        cycle.finalize();
        assert_eq!(cycle.nucleotides[0].count, 2);
        assert_eq!(cycle.nucleotides[IupacBase::A.code() as usize].count, 1);
        // finalize deux fois ne double pas l'agrégat
        cycle.finalize();
        assert_eq!(cycle.nucleotides[0].count, 2);
    }

    #[test]
    fn test_segment_grows_and_merges() {
        let mut left = SegmentAccumulator::default();
        left.increment(&Sequence::with_uniform_quality("ACG", 30));
        let mut right = SegmentAccumulator::default();
        right.increment(&Sequence::with_uniform_quality("ACGTT", 20));

        left += &right;
        assert_eq!(left.cycles.len(), 5);
        assert_eq!(left.longest, 5);
        assert_eq!(left.shortest, 3);
        assert_eq!(left.nucleotide_count[0], 8);
        assert_eq!(left.average_phred.count, 2);

        left.finalize();
        assert!((left.average_phred.mean - 25.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_segment_finalize() {
        let mut segment = SegmentAccumulator::default();
        segment.finalize();
        assert_eq!(segment.shortest, 0);
        assert_eq!(segment.average_phred.min, 0.0);
    }

    #[test]
    fn test_read_accumulator_shape_mismatch() {
        let mut left = ReadAccumulator::new(2);
        let right = ReadAccumulator::new(1);
        assert!(matches!(left.merge(&right), Err(DemuxError::Internal(_))));
    }
}
