//! Canaux de sortie et multiplexeur

use crate::accumulator::{ratio, ReadAccumulator};
use crate::decoder::Decoding;
use crate::error::{DemuxError, Result};
use crate::feed::OutputFeeds;
use crate::read::Segment;
use std::ops::AddAssign;

/// Description d'un canal, un par code-barres d'échantillon
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSpec {
    pub index: usize,
    pub id: String,
    pub barcode: String,
    /// Canal des lectures sans code-barres d'échantillon
    pub undetermined: bool,
}

/// Totaux de la tâche auxquels chaque canal est rapporté
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PooledTotals {
    pub count: u64,
    pub pf_count: u64,
    /// Lectures des canaux déterminés
    pub multiplex_count: u64,
    pub pf_multiplex_count: u64,
}

/// Comptes d'un canal et qualité de ses assignations d'échantillon
///
/// Compté pour chaque lecture, que le contrôle qualité soit actif ou non.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChannelAccumulator {
    pub count: u64,
    pub pf_count: u64,
    pub accumulated_multiplex_distance: u64,
    pub accumulated_pf_multiplex_distance: u64,
    pub accumulated_multiplex_confidence: f64,
    pub accumulated_pf_multiplex_confidence: f64,

    // Champs dérivés
    pub pf_fraction: f64,
    pub multiplex_distance: f64,
    pub pf_multiplex_distance: f64,
    pub multiplex_confidence: f64,
    pub pf_multiplex_confidence: f64,
    pub pooled_fraction: f64,
    pub pf_pooled_fraction: f64,
    pub pooled_multiplex_fraction: f64,
    pub pf_pooled_multiplex_fraction: f64,
}

impl ChannelAccumulator {
    #[inline]
    pub fn increment(&mut self, multiplex: &Decoding, qcfail: bool) {
        let distance = multiplex.distance as u64;
        self.count += 1;
        self.accumulated_multiplex_distance += distance;
        self.accumulated_multiplex_confidence += multiplex.confidence;
        if !qcfail {
            self.pf_count += 1;
            self.accumulated_pf_multiplex_distance += distance;
            self.accumulated_pf_multiplex_confidence += multiplex.confidence;
        }
    }

    /// Moyennes du canal et fractions rapportées aux totaux de la tâche
    pub fn finalize(&mut self, totals: &PooledTotals) {
        let count = self.count as f64;
        let pf_count = self.pf_count as f64;
        self.pf_fraction = ratio(pf_count, count);
        self.multiplex_distance = ratio(self.accumulated_multiplex_distance as f64, count);
        self.multiplex_confidence = ratio(self.accumulated_multiplex_confidence, count);
        self.pf_multiplex_distance = ratio(self.accumulated_pf_multiplex_distance as f64, pf_count);
        self.pf_multiplex_confidence = ratio(self.accumulated_pf_multiplex_confidence, pf_count);
        self.pooled_fraction = ratio(count, totals.count as f64);
        self.pf_pooled_fraction = ratio(pf_count, totals.pf_count as f64);
        self.pooled_multiplex_fraction = ratio(count, totals.multiplex_count as f64);
        self.pf_pooled_multiplex_fraction = ratio(pf_count, totals.pf_multiplex_count as f64);
    }
}

impl AddAssign<&ChannelAccumulator> for ChannelAccumulator {
    fn add_assign(&mut self, rhs: &ChannelAccumulator) {
        self.count += rhs.count;
        self.pf_count += rhs.pf_count;
        self.accumulated_multiplex_distance += rhs.accumulated_multiplex_distance;
        self.accumulated_pf_multiplex_distance += rhs.accumulated_pf_multiplex_distance;
        self.accumulated_multiplex_confidence += rhs.accumulated_multiplex_confidence;
        self.accumulated_pf_multiplex_confidence += rhs.accumulated_pf_multiplex_confidence;
    }
}

/// Destination des lectures d'un code-barres d'échantillon
#[derive(Debug, Clone)]
pub struct Channel {
    pub index: usize,
    pub id: String,
    pub barcode: String,
    pub undetermined: bool,
    output: OutputFeeds,
    filter_outgoing_qc_fail: bool,
    enable_quality_control: bool,
    pub statistics: ChannelAccumulator,
    pub accumulator: ReadAccumulator,
}

impl Channel {
    pub fn new(spec: &ChannelSpec, output: OutputFeeds, filter_outgoing_qc_fail: bool, enable_quality_control: bool) -> Self {
        let accumulator = ReadAccumulator::new(output.segment_cardinality());
        Self {
            index: spec.index,
            id: spec.id.clone(),
            barcode: spec.barcode.clone(),
            undetermined: spec.undetermined,
            output,
            filter_outgoing_qc_fail,
            enable_quality_control,
            statistics: ChannelAccumulator::default(),
            accumulator,
        }
    }

    pub fn output(&self) -> &OutputFeeds {
        &self.output
    }

    pub fn push(&mut self, segments: &[Segment], multiplex: &Decoding, qcfail: bool) -> Result<()> {
        self.statistics.increment(multiplex, qcfail);
        if self.enable_quality_control {
            self.accumulator.increment(segments, qcfail);
        }
        if qcfail && self.filter_outgoing_qc_fail {
            return Ok(());
        }
        self.output.push(segments)
    }

    /// Copie sans statistiques, pour un nouveau pivot
    pub fn fresh(&self) -> Self {
        Self {
            statistics: ChannelAccumulator::default(),
            accumulator: ReadAccumulator::new(self.output.segment_cardinality()),
            ..self.clone()
        }
    }
}

/// Aiguille chaque lecture vers le canal de son code-barres d'échantillon
#[derive(Debug, Clone)]
pub struct Multiplexer {
    channels: Vec<Channel>,
}

impl Multiplexer {
    pub fn new(channels: Vec<Channel>) -> Result<Self> {
        for (position, channel) in channels.iter().enumerate() {
            if channel.index != position {
                return Err(DemuxError::internal(format!(
                    "canal {} à la position {}",
                    channel.index, position
                )));
            }
        }
        Ok(Self { channels })
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn push(&mut self, channel_index: usize, segments: &[Segment], multiplex: &Decoding, qcfail: bool) -> Result<()> {
        let cardinality = self.channels.len();
        let channel = self.channels.get_mut(channel_index).ok_or_else(|| {
            DemuxError::internal(format!("canal {} inexistant sur {}", channel_index, cardinality))
        })?;
        channel.push(segments, multiplex, qcfail)
    }

    pub fn fresh(&self) -> Self {
        Self { channels: self.channels.iter().map(Channel::fresh).collect() }
    }

    pub fn merge(&mut self, other: &Multiplexer) -> Result<()> {
        if self.channels.len() != other.channels.len() {
            return Err(DemuxError::internal(format!(
                "fusion de {} canaux avec {} canaux",
                self.channels.len(),
                other.channels.len()
            )));
        }
        for (left, right) in self.channels.iter_mut().zip(&other.channels) {
            left.statistics += &right.statistics;
            left.accumulator.merge(&right.accumulator)?;
        }
        Ok(())
    }

    /// Finalise chaque canal relativement aux `count` et `pf_count` de la tâche
    pub fn finalize(&mut self, count: u64, pf_count: u64) {
        let mut totals = PooledTotals { count, pf_count, ..Default::default() };
        for channel in self.channels.iter().filter(|c| !c.undetermined) {
            totals.multiplex_count += channel.statistics.count;
            totals.pf_multiplex_count += channel.statistics.pf_count;
        }
        for channel in &mut self.channels {
            channel.statistics.finalize(&totals);
            channel.accumulator.finalize();
        }
    }

    pub fn flush(&self) -> Result<()> {
        for channel in &self.channels {
            channel.output.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{MemoryFeed, SharedFeed};
    use crate::sequence::Sequence;

    fn spec(index: usize) -> ChannelSpec {
        ChannelSpec { index, id: format!("c{}", index), barcode: String::new(), undetermined: index == 0 }
    }

    fn decoding(barcode_index: usize, distance: usize, confidence: f64) -> Decoding {
        Decoding { barcode_index, distance, confidence }
    }

    fn segment(name: &str) -> Vec<Segment> {
        vec![Segment::new(name, Sequence::with_uniform_quality("ACGT", 30))]
    }

    #[test]
    fn test_filter_outgoing_qc_fail() {
        let memory = MemoryFeed::new(Vec::new());
        let sink = memory.sink();
        let output = OutputFeeds::new(vec![SharedFeed::new(0, "out", Box::new(memory))]);
        let mut channel = Channel::new(&spec(0), output, true, true);

        channel.push(&segment("kept"), &Decoding::unclassified(), false).unwrap();
        channel.push(&segment("dropped"), &Decoding::unclassified(), true).unwrap();
        assert_eq!(sink.lock().len(), 1);
        assert_eq!(channel.accumulator.count, 2);
        assert_eq!(channel.accumulator.pf_count, 1);
        assert_eq!(channel.statistics.count, 2);
        assert_eq!(channel.statistics.pf_count, 1);
    }

    #[test]
    fn test_multiplexer_routes_and_merges() {
        let channels = vec![
            Channel::new(&spec(0), OutputFeeds::null(0, 1), false, true),
            Channel::new(&spec(1), OutputFeeds::null(0, 1), false, true),
        ];
        let mut left = Multiplexer::new(channels).unwrap();
        let mut right = left.fresh();
        let unclassified = Decoding::unclassified();
        left.push(1, &segment("a"), &decoding(1, 0, 1.0), false).unwrap();
        right.push(1, &segment("b"), &decoding(1, 0, 1.0), false).unwrap();
        right.push(0, &segment("c"), &unclassified, false).unwrap();
        assert!(matches!(right.push(2, &segment("d"), &unclassified, false), Err(DemuxError::Internal(_))));

        left.merge(&right).unwrap();
        left.finalize(3, 3);
        assert_eq!(left.channels()[1].accumulator.count, 2);
        assert_eq!(left.channels()[0].accumulator.count, 1);
        assert_eq!(left.channels()[1].statistics.count, 2);
    }

    #[test]
    fn test_channel_fractions_against_job_totals() {
        let channels = (0..3).map(|i| Channel::new(&spec(i), OutputFeeds::null(0, 1), false, true)).collect();
        let mut multiplexer = Multiplexer::new(channels).unwrap();
        multiplexer.push(1, &segment("a"), &decoding(1, 0, 0.99), false).unwrap();
        multiplexer.push(1, &segment("b"), &decoding(1, 2, 0.97), true).unwrap();
        multiplexer.push(2, &segment("c"), &decoding(2, 1, 0.96), false).unwrap();
        multiplexer.push(0, &segment("d"), &Decoding::unclassified(), true).unwrap();
        multiplexer.finalize(4, 2);

        let first = &multiplexer.channels()[1].statistics;
        assert_eq!(first.pooled_fraction, 0.5);
        assert_eq!(first.pf_pooled_fraction, 0.5);
        assert!((first.pooled_multiplex_fraction - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(first.pf_pooled_multiplex_fraction, 0.5);
        assert_eq!(first.multiplex_distance, 1.0);
        assert!((first.multiplex_confidence - 0.98).abs() < 1e-12);
        assert_eq!(first.pf_multiplex_distance, 0.0);
        assert!((first.pf_multiplex_confidence - 0.99).abs() < 1e-12);

        let undetermined = &multiplexer.channels()[0].statistics;
        assert_eq!(undetermined.pooled_fraction, 0.25);
        assert_eq!(undetermined.pf_pooled_fraction, 0.0);
        assert_eq!(undetermined.pf_fraction, 0.0);
    }

    #[test]
    fn test_finalize_with_empty_job() {
        let channels = (0..2).map(|i| Channel::new(&spec(i), OutputFeeds::null(0, 1), false, true)).collect();
        let mut multiplexer = Multiplexer::new(channels).unwrap();
        multiplexer.finalize(0, 0);
        for channel in multiplexer.channels() {
            assert_eq!(channel.statistics.pooled_fraction, 0.0);
            assert_eq!(channel.statistics.pooled_multiplex_fraction, 0.0);
            assert_eq!(channel.statistics.multiplex_confidence, 0.0);
        }
    }

    #[test]
    fn test_quality_control_disabled() {
        let mut channel = Channel::new(&spec(0), OutputFeeds::null(0, 1), false, false);
        channel.push(&segment("a"), &Decoding::unclassified(), false).unwrap();
        assert_eq!(channel.accumulator.count, 0);
        assert_eq!(channel.statistics.count, 1);
    }
}
