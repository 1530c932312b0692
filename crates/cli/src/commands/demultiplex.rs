//! Commande de démultiplexage

use crate::create_spinner;
use crate::display::summary;
use anyhow::{bail, Result};
use demux_core::{
    ChannelSpec, FastqInputFeed, FastqOutputFeed, InputFeeds, JobConfig, OutputFeeds, Pipeline, SharedFeed,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub fn run(
    config: PathBuf,
    input: Vec<PathBuf>,
    output: PathBuf,
    report: Option<PathBuf>,
    threads: Option<usize>,
    discard_undetermined: bool,
) -> Result<()> {
    println!("🧬 Démultiplexage selon: {}", config.display());

    // 1. Compiler la configuration
    let mut job = JobConfig::from_file(&config)?;
    if let Some(threads) = threads {
        job.decoding_threads = threads;
    }
    let pipeline = Pipeline::compile(&job)?;
    if input.len() != pipeline.input_segment_cardinality() {
        bail!(
            "{} fichiers d'entrée pour {} segments",
            input.len(),
            pipeline.input_segment_cardinality()
        );
    }

    // 2. Ouvrir les flux
    let stems = output_stems(&pipeline.channels(), discard_undetermined)?;
    let input = open_inputs(&input)?;
    std::fs::create_dir_all(&output)?;
    let mut next_index = input.feeds().len();
    let mut outputs = Vec::new();
    for stem in stems {
        let segments = pipeline.output_segment_cardinality();
        let Some(stem) = stem else {
            outputs.push(OutputFeeds::null(next_index, segments));
            next_index += 1;
            continue;
        };
        let mut by_segment = Vec::with_capacity(segments);
        for segment in 0..segments {
            let path = output.join(format!("{}_{}.fastq", stem, segment + 1));
            let feed = FastqOutputFeed::create(&path)?;
            by_segment.push(SharedFeed::new(next_index, path.display().to_string(), Box::new(feed)));
            next_index += 1;
        }
        outputs.push(OutputFeeds::new(by_segment));
    }

    // 3. Décoder
    let spinner = create_spinner(&format!("Démultiplexage sur {} fils...", pipeline.threads()))?;
    let result = pipeline.run(input, outputs)?;
    spinner.finish_with_message(format!("{} lectures traitées", result.input.count));

    // 4. Rapport
    summary::display_report(&result);
    let json = result.to_json()?;
    match report {
        Some(path) => {
            std::fs::write(&path, json)?;
            println!("\nRapport écrit: {}", path.display());
        }
        None => println!("{}", json),
    }

    println!("\n✅ Démultiplexage terminé!");
    Ok(())
}

/// Un même chemin répété désigne un fichier entrelacé lu par un seul flux
fn open_inputs(paths: &[PathBuf]) -> Result<InputFeeds> {
    let mut opened: Vec<(&Path, Arc<SharedFeed>)> = Vec::new();
    let mut by_segment = Vec::with_capacity(paths.len());
    for path in paths {
        let feed = match opened.iter().find(|(p, _)| *p == path.as_path()) {
            Some((_, feed)) => Arc::clone(feed),
            None => {
                let feed = SharedFeed::new(
                    opened.len(),
                    path.display().to_string(),
                    Box::new(FastqInputFeed::open(path)?),
                );
                opened.push((path.as_path(), Arc::clone(&feed)));
                feed
            }
        };
        by_segment.push(feed);
    }
    Ok(InputFeeds::new(by_segment)?)
}

/// Préfixe des fichiers de chaque canal, `None` pour un canal écarté
///
/// Deux identifiants qui se réduisent au même préfixe sont refusés avant
/// l'ouverture de toute sortie.
fn output_stems(channels: &[ChannelSpec], discard_undetermined: bool) -> Result<Vec<Option<String>>> {
    let mut owner: HashMap<String, &str> = HashMap::with_capacity(channels.len());
    let mut stems = Vec::with_capacity(channels.len());
    for channel in channels {
        if discard_undetermined && channel.undetermined {
            stems.push(None);
            continue;
        }
        let stem = file_stem(&channel.id);
        if let Some(previous) = owner.insert(stem.clone(), &channel.id) {
            bail!(
                "les canaux {} et {} écriraient dans les mêmes fichiers {}_*.fastq",
                previous,
                channel.id,
                stem
            );
        }
        stems.push(Some(stem));
    }
    Ok(stems)
}

fn file_stem(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect()
}
