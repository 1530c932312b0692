//! Tableaux récapitulatifs d'une exécution

use demux_core::report::ClassifierReport;
use demux_core::Report;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct DecoderRow {
    #[tabled(rename = "Décodeur")]
    target: String,
    #[tabled(rename = "Algorithme")]
    algorithm: String,
    #[tabled(rename = "Lectures")]
    count: u64,
    #[tabled(rename = "Classées")]
    classified: String,
    #[tabled(rename = "Confiance moyenne")]
    confidence: String,
    #[tabled(rename = "Bruit estimé")]
    noise: String,
}

#[derive(Tabled)]
struct ChannelRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Code-barres")]
    barcode: String,
    #[tabled(rename = "Lectures")]
    count: u64,
    #[tabled(rename = "PF")]
    pf_count: u64,
    #[tabled(rename = "PF%")]
    pf_percent: String,
    #[tabled(rename = "Part")]
    share: String,
}

fn percent(value: f64) -> String {
    format!("{:.2}%", 100.0 * value)
}

fn decoder_row(report: &ClassifierReport) -> DecoderRow {
    DecoderRow {
        target: report.target.clone(),
        algorithm: report.algorithm.to_string(),
        count: report.count,
        classified: percent(report.classified_fraction),
        confidence: format!("{:.4}", report.average_classified_confidence),
        noise: format!("{:.4}", report.estimated_noise_prior),
    }
}

/// Affiche les décodeurs puis les canaux
pub fn display_report(report: &Report) {
    let decoders: Vec<DecoderRow> = report
        .multiplex
        .iter()
        .chain(&report.molecular)
        .chain(&report.cellular)
        .map(decoder_row)
        .collect();
    if !decoders.is_empty() {
        println!();
        println!("{}", Table::new(decoders));
    }

    let channels: Vec<ChannelRow> = report
        .channels
        .iter()
        .map(|channel| ChannelRow {
            index: channel.index,
            id: channel.id.clone(),
            barcode: channel.barcode.clone(),
            count: channel.count,
            pf_count: channel.pf_count,
            pf_percent: percent(channel.pf_fraction),
            share: percent(channel.pooled_fraction),
        })
        .collect();
    println!();
    println!("{}", Table::new(channels));
}
