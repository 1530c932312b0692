//! Exécution d'une tâche de démultiplexage sur un groupe de pivots
//!
//! Les pivots tournent en parallèle sur un pool rayon jusqu'à épuisement des
//! entrées. Leurs accumulateurs sont fusionnés une seule fois, après la fin de
//! tous les pivots, puis finalisés pour produire le [`Report`].

use crate::accumulator::AccumulatingClassifier;
use crate::channel::{Channel, ChannelSpec, Multiplexer};
use crate::config::JobConfig;
use crate::decoder::{Classifier, CompiledDecoder, Target};
use crate::error::{DemuxError, Result};
use crate::feed::{InputFeeds, OutputFeeds};
use crate::log_operation;
use crate::phred::PhredScale;
use crate::pivot::Pivot;
use crate::report::{ChannelReport, ClassifierReport, InputReport, Report};
use crate::transform::Rule;
use rayon::ThreadPoolBuilder;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Tâche compilée, prête à être exécutée sur des flux
#[derive(Debug, Clone)]
pub struct Pipeline {
    input_segment_cardinality: usize,
    threads: usize,
    scale: Arc<PhredScale>,
    template: Arc<Rule>,
    multiplex: Option<CompiledDecoder>,
    cellular: Vec<CompiledDecoder>,
    molecular: Vec<CompiledDecoder>,
    filter_outgoing_qc_fail: bool,
    enable_quality_control: bool,
}

impl Pipeline {
    pub fn compile(config: &JobConfig) -> Result<Self> {
        config.validate()?;
        let segments = config.input_segment_cardinality;
        let multiplex = config
            .multiplex
            .as_ref()
            .map(|decoder| decoder.compile(0, Target::Multiplex, segments))
            .transpose()?;
        let cellular = config
            .cellular
            .iter()
            .enumerate()
            .map(|(index, decoder)| decoder.compile(index, Target::Cellular(index), segments))
            .collect::<Result<Vec<_>>>()?;
        let molecular = config
            .molecular
            .iter()
            .enumerate()
            .map(|(index, decoder)| decoder.compile(index, Target::Molecular(index), segments))
            .collect::<Result<Vec<_>>>()?;
        let template = config.compile_template()?;

        tracing::info!(
            segments,
            threads = config.decoding_threads,
            cellular = cellular.len(),
            molecular = molecular.len(),
            model = ?config.substitution_model,
            "tâche compilée"
        );

        Ok(Self {
            input_segment_cardinality: segments,
            threads: config.decoding_threads,
            scale: Arc::new(PhredScale::new(config.substitution_model)),
            template: Arc::new(template),
            multiplex,
            cellular,
            molecular,
            filter_outgoing_qc_fail: config.filter_outgoing_qc_fail,
            enable_quality_control: config.enable_quality_control,
        })
    }

    pub fn input_segment_cardinality(&self) -> usize {
        self.input_segment_cardinality
    }

    pub fn output_segment_cardinality(&self) -> usize {
        self.template.output_cardinality()
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn multiplex(&self) -> Option<&CompiledDecoder> {
        self.multiplex.as_ref()
    }

    /// Tous les décodeurs dans l'ordre d'exécution
    pub fn decoders(&self) -> impl Iterator<Item = &CompiledDecoder> {
        self.multiplex.iter().chain(&self.molecular).chain(&self.cellular)
    }

    /// Un canal par code-barres d'échantillon, le non déterminé en premier
    pub fn channels(&self) -> Vec<ChannelSpec> {
        match &self.multiplex {
            Some(decoder) => std::iter::once(&decoder.codec.undetermined)
                .chain(&decoder.codec.barcodes)
                .map(|barcode| ChannelSpec {
                    index: barcode.index,
                    id: barcode.id.clone(),
                    barcode: barcode.to_string(),
                    undetermined: barcode.index == 0,
                })
                .collect(),
            None => vec![ChannelSpec { index: 0, id: "all".to_string(), barcode: String::new(), undetermined: false }],
        }
    }

    /// Démultiplexe toutes les lectures de `input` vers les canaux de `outputs`
    pub fn run(&self, input: InputFeeds, outputs: Vec<OutputFeeds>) -> Result<Report> {
        log_operation!("demultiplexage", {
            let mut multiplexer = self.multiplexer(&input, outputs)?;
            let pivots = self.execute(&input, &multiplexer)?;

            let mut count = 0;
            let mut pf_count = 0;
            let mut multiplex = self.multiplex.as_ref().map(master_accumulator);
            let mut cellular: Vec<AccumulatingClassifier> = self.cellular.iter().map(master_accumulator).collect();
            let mut molecular: Vec<AccumulatingClassifier> = self.molecular.iter().map(master_accumulator).collect();

            for pivot in &pivots {
                count += pivot.count;
                pf_count += pivot.pf_count;
                if let (Some(master), Some(decoder)) = (multiplex.as_mut(), pivot.multiplex.as_ref()) {
                    master.merge(decoder.accumulator())?;
                }
                merge_all(&mut cellular, &pivot.cellular)?;
                merge_all(&mut molecular, &pivot.molecular)?;
                multiplexer.merge(&pivot.multiplexer)?;
            }
            tracing::info!(pivots = pivots.len(), reads = count, "accumulateurs fusionnés");

            multiplexer.flush()?;
            multiplexer.finalize(count, pf_count);
            let report_of = |decoder: &CompiledDecoder, mut classifier: AccumulatingClassifier| {
                classifier.finalize();
                ClassifierReport::new(decoder.target, decoder.algorithm, &decoder.codec, &classifier)
            };
            let multiplex = self.multiplex.as_ref().zip(multiplex).map(|(d, c)| report_of(d, c));
            let cellular = self.cellular.iter().zip(cellular).map(|(d, c)| report_of(d, c)).collect();
            let molecular = self.molecular.iter().zip(molecular).map(|(d, c)| report_of(d, c)).collect();

            Ok(Report {
                input: InputReport::new(count, pf_count),
                multiplex,
                cellular,
                molecular,
                channels: multiplexer.channels().iter().map(ChannelReport::new).collect(),
            })
        })
    }

    fn multiplexer(&self, input: &InputFeeds, outputs: Vec<OutputFeeds>) -> Result<Multiplexer> {
        if input.segment_cardinality() != self.input_segment_cardinality {
            return Err(DemuxError::configuration(format!(
                "{} flux d'entrée pour {} segments",
                input.segment_cardinality(),
                self.input_segment_cardinality
            )));
        }
        let specs = self.channels();
        if outputs.len() != specs.len() {
            return Err(DemuxError::configuration(format!(
                "{} sorties pour {} canaux",
                outputs.len(),
                specs.len()
            )));
        }
        let mut channels = Vec::with_capacity(specs.len());
        for (spec, output) in specs.iter().zip(outputs) {
            if output.segment_cardinality() != self.output_segment_cardinality() {
                return Err(DemuxError::configuration(format!(
                    "le canal {} a {} sorties pour {} segments",
                    spec.id,
                    output.segment_cardinality(),
                    self.output_segment_cardinality()
                )));
            }
            channels.push(Channel::new(spec, output, self.filter_outgoing_qc_fail, self.enable_quality_control));
        }
        Multiplexer::new(channels)
    }

    fn pivot(&self, index: usize, input: &InputFeeds, multiplexer: &Multiplexer) -> Pivot {
        let instantiate = |decoder: &CompiledDecoder| decoder.instantiate(&self.scale);
        Pivot::new(
            index,
            input.clone(),
            Arc::clone(&self.template),
            self.multiplex.as_ref().map(instantiate),
            self.cellular.iter().map(instantiate).collect(),
            self.molecular.iter().map(instantiate).collect(),
            multiplexer.fresh(),
        )
    }

    /// Lance un pivot par fil et attend la fin de tous
    fn execute(&self, input: &InputFeeds, multiplexer: &Multiplexer) -> Result<Vec<Pivot>> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .thread_name(|index| format!("pivot-{}", index))
            .build()
            .map_err(|e| DemuxError::internal(format!("création du pool de pivots impossible: {}", e)))?;

        let abort = AtomicBool::new(false);
        let results = pool.broadcast(|context| {
            let mut pivot = self.pivot(context.index(), input, multiplexer);
            pivot.run(&abort).map(|()| pivot)
        });
        results.into_iter().collect()
    }
}

fn master_accumulator(decoder: &CompiledDecoder) -> AccumulatingClassifier {
    AccumulatingClassifier::new(decoder.index, &decoder.codec.undetermined, &decoder.codec.barcodes)
}

fn merge_all(masters: &mut [AccumulatingClassifier], decoders: &[Box<dyn Classifier>]) -> Result<()> {
    if masters.len() != decoders.len() {
        return Err(DemuxError::internal(format!(
            "fusion de {} décodeurs avec {} décodeurs",
            masters.len(),
            decoders.len()
        )));
    }
    for (master, decoder) in masters.iter_mut().zip(decoders) {
        master.merge(decoder.accumulator())?;
    }
    Ok(())
}
