//! Demux Core Library
//!
//! Moteur de décodage de codes-barres et de statistiques pour le
//! démultiplexage de lectures de séquençage: extraction par jetons,
//! décodeurs MDD et PAMLD, accumulateurs fusionnés entre pivots.

pub mod accumulator;
pub mod barcode;
pub mod channel;
pub mod config;
pub mod decoder;
pub mod error;
pub mod fastq;
pub mod feed;
pub mod job;
pub mod kahan;
pub mod logging;
pub mod metric;
pub mod nucleotide;
pub mod phred;
pub mod pivot;
pub mod read;
pub mod report;
pub mod sequence;
pub mod transform;

// Réexportations principales
pub use accumulator::{AccumulatingClassifier, AccumulatingTag, ReadAccumulator};
pub use barcode::{Barcode, Observation};
pub use channel::{Channel, ChannelAccumulator, ChannelSpec, Multiplexer, PooledTotals};
pub use config::{BarcodeConfig, DecoderConfig, JobConfig, RuleConfig};
pub use decoder::{Algorithm, Classifier, Codec, CompiledDecoder, Decoder, Decoding, Target};
pub use error::{DemuxError, Result};
pub use fastq::{FastqInputFeed, FastqOutputFeed};
pub use feed::{Feed, InputFeeds, MemoryFeed, NullFeed, OutputFeeds, SharedFeed};
pub use job::Pipeline;
pub use kahan::KahanSum;
pub use logging::init_logging;
// Les macros log_operation et log_error sont automatiquement exportées à la racine du crate
pub use metric::{CodecMetric, WordMetric};
pub use nucleotide::IupacBase;
pub use phred::{PhredScale, SubstitutionModel};
pub use read::{Annotation, Read, Segment};
pub use report::Report;
pub use sequence::Sequence;
pub use transform::{Rule, Token};
