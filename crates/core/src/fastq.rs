//! Flux FASTQ adossés à `bio::io::fastq`

use crate::error::{DemuxError, Result};
use crate::feed::Feed;
use crate::read::Segment;
use crate::sequence::Sequence;
use bio::io::fastq;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

/// Description Illumina d'un segment marqué en échec par le séquenceur
const QC_FAIL_DESCRIPTION: &str = "0:Y:0:";

/// Le deuxième champ de la description Illumina vaut `Y` pour une lecture filtrée
fn is_filtered(description: Option<&str>) -> bool {
    description.and_then(|d| d.split(':').nth(1)) == Some("Y")
}

/// Lecteur FASTQ
pub struct FastqInputFeed {
    records: fastq::Records<BufReader<Box<dyn Read + Send>>>,
}

impl FastqInputFeed {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Ok(Self::from_reader(file))
    }

    pub fn from_reader(reader: impl Read + Send + 'static) -> Self {
        let reader: Box<dyn Read + Send> = Box::new(reader);
        Self { records: fastq::Reader::new(reader).records() }
    }
}

impl Feed for FastqInputFeed {
    fn pull(&mut self, segment: &mut Segment) -> Result<bool> {
        match self.records.next() {
            Some(Ok(record)) => {
                segment.name.clear();
                segment.name.push_str(record.id());
                segment.sequence = Sequence::from_ascii(record.seq(), record.qual())?;
                segment.qcfail = is_filtered(record.desc());
                Ok(true)
            }
            Some(Err(error)) => Err(DemuxError::sequence(format!("enregistrement FASTQ invalide: {}", error))),
            None => Ok(false),
        }
    }

    fn push(&mut self, _segment: &Segment) -> Result<()> {
        Err(DemuxError::internal("écriture dans un flux FASTQ d'entrée"))
    }
}

/// Écrivain FASTQ
pub struct FastqOutputFeed {
    writer: fastq::Writer<Box<dyn Write + Send>>,
}

impl FastqOutputFeed {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        Ok(Self::from_writer(file))
    }

    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        let writer: Box<dyn Write + Send> = Box::new(writer);
        Self { writer: fastq::Writer::new(writer) }
    }
}

impl Feed for FastqOutputFeed {
    fn pull(&mut self, _segment: &mut Segment) -> Result<bool> {
        Ok(false)
    }

    fn push(&mut self, segment: &Segment) -> Result<()> {
        let description = segment.qcfail.then_some(QC_FAIL_DESCRIPTION);
        self.writer.write(
            &segment.name,
            description,
            &segment.sequence.to_ascii(),
            &segment.sequence.quality_to_ascii(),
        )?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::io::Cursor;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_pull_records() {
        let text = "@r1 1:N:0:ACGT\nACGT\n+\nIIII\n@r2 1:Y:0:ACGT\nGG\n+\n#5\n";
        let mut feed = FastqInputFeed::from_reader(Cursor::new(text.as_bytes().to_vec()));
        let mut segment = Segment::default();

        assert!(feed.pull(&mut segment).unwrap());
        assert_eq!(segment.name, "r1");
        assert_eq!(segment.sequence.to_string(), "ACGT");
        assert_eq!(segment.sequence.quality, vec![40; 4]);
        assert!(!segment.qcfail);

        assert!(feed.pull(&mut segment).unwrap());
        assert_eq!(segment.sequence.quality, vec![2, 20]);
        assert!(segment.qcfail);

        assert!(!feed.pull(&mut segment).unwrap());
    }

    #[test]
    fn test_push_records() {
        let buffer = SharedBuffer::default();
        let mut feed = FastqOutputFeed::from_writer(buffer.clone());
        let mut segment = Segment::new("r1", Sequence::with_uniform_quality("ACGT", 40));
        feed.push(&segment).unwrap();
        segment.qcfail = true;
        feed.push(&segment).unwrap();
        feed.flush().unwrap();

        let text = String::from_utf8(buffer.0.lock().clone()).unwrap();
        assert_eq!(text, "@r1\nACGT\n+\nIIII\n@r1 0:Y:0:\nACGT\n+\nIIII\n");
    }
}
