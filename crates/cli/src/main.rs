//! CLI de démultiplexage de lectures de séquençage

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;

mod commands;
mod display;

use commands::{demultiplex, inspect, simulate};

#[derive(Parser)]
#[command(name = "demux")]
#[command(about = "Décodage de codes-barres et démultiplexage de lectures", long_about = None)]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Niveau de verbosité
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Démultiplexe des fichiers FASTQ selon une configuration JSON
    Demultiplex {
        /// Configuration de la tâche
        #[arg(short, long)]
        config: PathBuf,

        /// Fichier FASTQ par segment d'entrée, dans l'ordre
        #[arg(short, long, required = true)]
        input: Vec<PathBuf>,

        /// Répertoire des fichiers de sortie
        #[arg(short, long)]
        output: PathBuf,

        /// Rapport JSON, la sortie standard par défaut
        #[arg(short, long)]
        report: Option<PathBuf>,

        /// Nombre de fils de décodage
        #[arg(short, long)]
        threads: Option<usize>,

        /// Ne pas écrire les lectures non déterminées
        #[arg(long)]
        discard_undetermined: bool,
    },

    /// Décrit les codes-barres et les distances de chaque décodeur
    Inspect {
        /// Configuration de la tâche
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Génère des lectures FASTQ depuis le décodeur d'échantillon d'une configuration
    Simulate {
        /// Configuration de la tâche
        #[arg(short, long)]
        config: PathBuf,

        /// Fichier FASTQ par segment d'entrée
        #[arg(short, long, required = true)]
        output: Vec<PathBuf>,

        /// Nombre de lectures
        #[arg(short = 'n', long, default_value = "10000")]
        reads: usize,

        /// Longueur de chaque segment
        #[arg(short, long, default_value = "100")]
        length: usize,

        /// Taux de substitution (0.0-1.0)
        #[arg(short, long, default_value = "0.01")]
        substitution_rate: f64,

        /// Proportion de lectures en échec qualité (0.0-1.0)
        #[arg(short, long, default_value = "0.0")]
        qcfail_rate: f64,

        /// Seed pour reproductibilité
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Décode les lectures générées et compare à la vérité
        #[arg(short, long)]
        evaluate: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    demux_core::logging::init_logging_with_default(filter);

    match cli.command {
        Commands::Demultiplex {
            config,
            input,
            output,
            report,
            threads,
            discard_undetermined,
        } => {
            demultiplex::run(config, input, output, report, threads, discard_undetermined)?;
        }
        Commands::Inspect { config } => {
            inspect::run(config)?;
        }
        Commands::Simulate {
            config,
            output,
            reads,
            length,
            substitution_rate,
            qcfail_rate,
            seed,
            evaluate,
        } => {
            let options = simulate::Options { reads, length, substitution_rate, qcfail_rate, seed, evaluate };
            simulate::run(config, output, options)?;
        }
    }

    Ok(())
}

/// Crée une barre de progression spinner
pub fn create_spinner(msg: &str) -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    Ok(pb)
}
