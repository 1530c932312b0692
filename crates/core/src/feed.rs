//! Flux d'entrée et de sortie partagés entre les pivots
//!
//! Les flux sont le seul état mutable partagé. Un tirage verrouille tous les
//! flux d'entrée dans l'ordre de leur index puis les libère dans l'ordre
//! inverse; l'écriture procède de même sur les flux de sortie distincts.

use crate::error::{DemuxError, Result};
use crate::read::{Read, Segment};
use parking_lot::{Mutex, MutexGuard};
use std::collections::VecDeque;
use std::sync::Arc;

/// Source ou destination de segments
pub trait Feed: Send {
    /// Remplit `segment`; faux en fin de flux
    fn pull(&mut self, segment: &mut Segment) -> Result<bool>;

    fn push(&mut self, segment: &Segment) -> Result<()>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Un flux nul absorbe les écritures et n'entre pas dans l'ordre de verrouillage
    fn is_null(&self) -> bool {
        false
    }
}

/// Flux verrouillable identifié par un index global
pub struct SharedFeed {
    index: usize,
    name: String,
    null: bool,
    inner: Mutex<Box<dyn Feed>>,
}

impl SharedFeed {
    pub fn new(index: usize, name: impl Into<String>, feed: Box<dyn Feed>) -> Arc<Self> {
        let null = feed.is_null();
        Arc::new(Self { index, name: name.into(), null, inner: Mutex::new(feed) })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_null(&self) -> bool {
        self.null
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn Feed>> {
        self.inner.lock()
    }

    pub fn flush(&self) -> Result<()> {
        self.lock().flush()
    }
}

impl std::fmt::Debug for SharedFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedFeed").field("index", &self.index).field("name", &self.name).finish()
    }
}

/// Flux d'entrée d'une tâche, un par segment (un flux peut servir plusieurs segments)
#[derive(Debug, Clone)]
pub struct InputFeeds {
    /// Flux distincts triés par index, ordre de verrouillage
    feeds: Vec<Arc<SharedFeed>>,
    /// Position dans `feeds` du flux de chaque segment
    feed_by_segment: Vec<usize>,
}

impl InputFeeds {
    /// Associe à chaque segment d'entrée son flux
    pub fn new(by_segment: Vec<Arc<SharedFeed>>) -> Result<Self> {
        if by_segment.is_empty() {
            return Err(DemuxError::configuration("aucun flux d'entrée"));
        }
        let feeds = distinct_by_index(&by_segment, true);
        let feed_by_segment = by_segment
            .iter()
            .map(|feed| feeds.iter().position(|f| f.index == feed.index).unwrap_or_default())
            .collect();
        Ok(Self { feeds, feed_by_segment })
    }

    pub fn segment_cardinality(&self) -> usize {
        self.feed_by_segment.len()
    }

    pub fn feeds(&self) -> &[Arc<SharedFeed>] {
        &self.feeds
    }

    /// Tire un segment par flux; faux quand toutes les entrées sont épuisées
    pub fn pull(&self, read: &mut Read) -> Result<bool> {
        let mut guards: Vec<MutexGuard<'_, Box<dyn Feed>>> = self.feeds.iter().map(|f| f.lock()).collect();

        let mut pulled = 0;
        let mut outcome = Ok(());
        for (segment, &position) in read.segments.iter_mut().zip(&self.feed_by_segment) {
            match guards[position].pull(segment) {
                Ok(true) => pulled += 1,
                Ok(false) => {}
                Err(error) => {
                    outcome = Err(error);
                    break;
                }
            }
        }

        while guards.pop().is_some() {}
        outcome?;

        match pulled {
            0 => Ok(false),
            n if n == self.feed_by_segment.len() => Ok(true),
            n => Err(DemuxError::sequence(format!(
                "flux d'entrée désynchronisés: {} segments sur {} lus pour {}",
                n,
                self.feed_by_segment.len(),
                read.name()
            ))),
        }
    }
}

/// Flux de sortie d'un canal, un par segment de sortie
#[derive(Debug, Clone)]
pub struct OutputFeeds {
    by_segment: Vec<Arc<SharedFeed>>,
    /// Flux distincts non nuls triés par index
    lock_order: Vec<Arc<SharedFeed>>,
}

impl OutputFeeds {
    pub fn new(by_segment: Vec<Arc<SharedFeed>>) -> Self {
        let lock_order = distinct_by_index(&by_segment, false);
        Self { by_segment, lock_order }
    }

    /// Sortie entièrement nulle de `segment_cardinality` segments
    pub fn null(index: usize, segment_cardinality: usize) -> Self {
        let feed = SharedFeed::new(index, "/dev/null", Box::new(NullFeed));
        Self::new(vec![feed; segment_cardinality])
    }

    pub fn segment_cardinality(&self) -> usize {
        self.by_segment.len()
    }

    pub fn lock_order(&self) -> &[Arc<SharedFeed>] {
        &self.lock_order
    }

    /// Écrit les segments d'une lecture de sortie
    pub fn push(&self, segments: &[Segment]) -> Result<()> {
        if self.lock_order.is_empty() {
            return Ok(());
        }
        let mut guards: Vec<(usize, MutexGuard<'_, Box<dyn Feed>>)> =
            self.lock_order.iter().map(|f| (f.index, f.lock())).collect();

        let mut outcome = Ok(());
        for (segment, feed) in segments.iter().zip(&self.by_segment) {
            if feed.null {
                continue;
            }
            if let Some((_, guard)) = guards.iter_mut().find(|(index, _)| *index == feed.index) {
                if let Err(error) = guard.push(segment) {
                    outcome = Err(error);
                    break;
                }
            }
        }

        while guards.pop().is_some() {}
        outcome
    }

    pub fn flush(&self) -> Result<()> {
        for feed in &self.lock_order {
            feed.flush()?;
        }
        Ok(())
    }
}

fn distinct_by_index(feeds: &[Arc<SharedFeed>], keep_null: bool) -> Vec<Arc<SharedFeed>> {
    let mut distinct: Vec<Arc<SharedFeed>> = Vec::with_capacity(feeds.len());
    for feed in feeds {
        if (keep_null || !feed.null) && !distinct.iter().any(|f| f.index == feed.index) {
            distinct.push(Arc::clone(feed));
        }
    }
    distinct.sort_by_key(|f| f.index);
    distinct
}

/// Absorbe toutes les écritures
#[derive(Debug, Default, Clone, Copy)]
pub struct NullFeed;

impl Feed for NullFeed {
    fn pull(&mut self, _segment: &mut Segment) -> Result<bool> {
        Ok(false)
    }

    fn push(&mut self, _segment: &Segment) -> Result<()> {
        Ok(())
    }

    fn is_null(&self) -> bool {
        true
    }
}

/// Segments écrits dans un [`MemoryFeed`]
pub type MemorySink = Arc<Mutex<Vec<Segment>>>;

/// Flux en mémoire: file de segments à lire et puits partagé des écritures
#[derive(Debug, Default)]
pub struct MemoryFeed {
    queue: VecDeque<Segment>,
    sink: MemorySink,
}

impl MemoryFeed {
    pub fn new(segments: impl IntoIterator<Item = Segment>) -> Self {
        Self { queue: segments.into_iter().collect(), sink: MemorySink::default() }
    }

    /// Poignée sur les segments écrits, consultable après la tâche
    pub fn sink(&self) -> MemorySink {
        Arc::clone(&self.sink)
    }
}

impl Feed for MemoryFeed {
    fn pull(&mut self, segment: &mut Segment) -> Result<bool> {
        match self.queue.pop_front() {
            Some(next) => {
                *segment = next;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn push(&mut self, segment: &Segment) -> Result<()> {
        self.sink.lock().push(segment.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::Sequence;

    fn segments(name_prefix: &str, count: usize) -> Vec<Segment> {
        (0..count)
            .map(|i| Segment::new(format!("{}{}", name_prefix, i), Sequence::with_uniform_quality("ACGT", 30)))
            .collect()
    }

    #[test]
    fn test_pull_all_segments() {
        let inputs = InputFeeds::new(vec![
            SharedFeed::new(1, "r2", Box::new(MemoryFeed::new(segments("r", 2)))),
            SharedFeed::new(0, "r1", Box::new(MemoryFeed::new(segments("r", 2)))),
        ])
        .unwrap();
        assert_eq!(inputs.feeds()[0].index(), 0);

        let mut read = Read::new(2, 0, 0);
        assert!(inputs.pull(&mut read).unwrap());
        assert_eq!(read.segments[1].name, "r0");
        assert!(inputs.pull(&mut read).unwrap());
        assert!(!inputs.pull(&mut read).unwrap());
    }

    #[test]
    fn test_desynchronized_inputs() {
        let inputs = InputFeeds::new(vec![
            SharedFeed::new(0, "r1", Box::new(MemoryFeed::new(segments("r", 2)))),
            SharedFeed::new(1, "r2", Box::new(MemoryFeed::new(segments("r", 1)))),
        ])
        .unwrap();
        let mut read = Read::new(2, 0, 0);
        assert!(inputs.pull(&mut read).unwrap());
        assert!(matches!(inputs.pull(&mut read), Err(DemuxError::Sequence(_))));
    }

    #[test]
    fn test_interleaved_input() {
        let feed = SharedFeed::new(0, "interleaved", Box::new(MemoryFeed::new(segments("r", 4))));
        let inputs = InputFeeds::new(vec![Arc::clone(&feed), feed]).unwrap();
        assert_eq!(inputs.feeds().len(), 1);
        let mut read = Read::new(2, 0, 0);
        assert!(inputs.pull(&mut read).unwrap());
        assert_eq!(read.segments[0].name, "r0");
        assert_eq!(read.segments[1].name, "r1");
    }

    #[test]
    fn test_output_lock_order_skips_null() {
        let memory = MemoryFeed::new(Vec::new());
        let sink = memory.sink();
        let shared = SharedFeed::new(5, "out", Box::new(memory));
        let null = SharedFeed::new(2, "/dev/null", Box::new(NullFeed));
        let outputs = OutputFeeds::new(vec![Arc::clone(&shared), null, shared]);
        assert_eq!(outputs.lock_order().len(), 1);

        outputs.push(&segments("r", 3)).unwrap();
        let written = sink.lock();
        assert_eq!(written.len(), 2);
        assert_eq!(written[0].name, "r0");
        assert_eq!(written[1].name, "r2");
    }
}
