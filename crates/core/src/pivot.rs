//! Pivot: boucle de traitement d'un fil de décodage
//!
//! Chaque pivot possède ses décodeurs, ses accumulateurs et son multiplexeur;
//! seuls les flux sont partagés.

use crate::decoder::{Classifier, Decoding};
use crate::error::Result;
use crate::feed::InputFeeds;
use crate::channel::Multiplexer;
use crate::read::{Read, Segment};
use crate::sequence::Sequence;
use crate::transform::Rule;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct Pivot {
    pub index: usize,
    input: InputFeeds,
    read: Read,
    template: Arc<Rule>,
    assembled: Vec<Sequence>,
    output: Vec<Segment>,
    pub multiplex: Option<Box<dyn Classifier>>,
    pub cellular: Vec<Box<dyn Classifier>>,
    pub molecular: Vec<Box<dyn Classifier>>,
    pub multiplexer: Multiplexer,
    /// Lectures tirées
    pub count: u64,
    /// Lectures non marquées en échec par le séquenceur
    pub pf_count: u64,
}

impl Pivot {
    pub fn new(
        index: usize,
        input: InputFeeds,
        template: Arc<Rule>,
        multiplex: Option<Box<dyn Classifier>>,
        cellular: Vec<Box<dyn Classifier>>,
        molecular: Vec<Box<dyn Classifier>>,
        multiplexer: Multiplexer,
    ) -> Self {
        let read = Read::new(input.segment_cardinality(), cellular.len(), molecular.len());
        let output_cardinality = template.output_cardinality();
        Self {
            index,
            input,
            read,
            template,
            assembled: vec![Sequence::new(); output_cardinality],
            output: vec![Segment::default(); output_cardinality],
            multiplex,
            cellular,
            molecular,
            multiplexer,
            count: 0,
            pf_count: 0,
        }
    }

    /// Traite les lectures jusqu'à épuisement des entrées
    ///
    /// Une erreur lève `abort`, ce qui arrête les autres pivots au tirage suivant.
    pub fn run(&mut self, abort: &AtomicBool) -> Result<()> {
        tracing::debug!(pivot = self.index, "début du pivot");
        let outcome = self.drain(abort);
        match &outcome {
            Ok(()) => tracing::debug!(pivot = self.index, reads = self.count, "fin du pivot"),
            Err(error) => {
                abort.store(true, Ordering::SeqCst);
                tracing::error!(pivot = self.index, %error, "pivot interrompu");
            }
        }
        outcome
    }

    fn drain(&mut self, abort: &AtomicBool) -> Result<()> {
        while !abort.load(Ordering::Relaxed) {
            if !self.input.pull(&mut self.read)? {
                break;
            }
            self.process()?;
        }
        Ok(())
    }

    fn process(&mut self) -> Result<()> {
        self.read.validate()?;
        self.read.inherit_qcfail();
        self.count += 1;
        if !self.read.qcfail {
            self.pf_count += 1;
        }

        let multiplex = match self.multiplex.as_mut() {
            Some(decoder) => decoder.classify(&mut self.read)?,
            None => Decoding::unclassified(),
        };
        for decoder in &mut self.molecular {
            decoder.classify(&mut self.read)?;
        }
        for decoder in &mut self.cellular {
            decoder.classify(&mut self.read)?;
        }

        self.template.apply(&self.read, &mut self.assembled);
        for (segment, sequence) in self.output.iter_mut().zip(self.assembled.iter_mut()) {
            segment.name.clear();
            segment.name.push_str(self.read.name());
            segment.qcfail = self.read.qcfail;
            std::mem::swap(&mut segment.sequence, sequence);
        }
        self.multiplexer.push(self.read.channel_index, &self.output, &multiplex, self.read.qcfail)?;

        self.read.clear();
        Ok(())
    }
}
