//! Commande d'inspection des codecs

use anyhow::Result;
use console::style;
use demux_core::{CompiledDecoder, JobConfig, Pipeline};
use std::path::PathBuf;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct BarcodeRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Code-barres")]
    barcode: String,
    #[tabled(rename = "Concentration")]
    concentration: String,
}

pub fn run(config: PathBuf) -> Result<()> {
    println!("🔍 Inspection de: {}", config.display());

    let job = JobConfig::from_file(&config)?;
    let pipeline = Pipeline::compile(&job)?;
    println!(
        "{} segments d'entrée, {} segments de sortie, {} canaux",
        pipeline.input_segment_cardinality(),
        pipeline.output_segment_cardinality(),
        pipeline.channels().len()
    );

    for decoder in pipeline.decoders() {
        describe(decoder);
    }
    Ok(())
}

fn describe(decoder: &CompiledDecoder) {
    println!();
    println!("{}", style(format!("Décodeur {} ({})", decoder.target, decoder.algorithm)).bold());
    println!("Règle: {}", decoder.rule);
    if decoder.codec.is_transparent() {
        println!("Aucun code-barres, observation recopiée");
        return;
    }
    println!("Tolérance: {:?}", decoder.codec.tolerance);

    let rows: Vec<BarcodeRow> = std::iter::once(&decoder.codec.undetermined)
        .chain(&decoder.codec.barcodes)
        .map(|barcode| BarcodeRow {
            index: barcode.index,
            id: barcode.id.clone(),
            barcode: barcode.segment_strings().join("-"),
            concentration: format!("{:.6}", barcode.concentration),
        })
        .collect();
    println!("{}", Table::new(rows));

    if let Some(metric) = &decoder.codec.metric {
        println!("{}", metric);
    }
}
