//! Journalisation du moteur de démultiplexage

use tracing_subscriber::{fmt, EnvFilter};

/// Initialise le système de logging à partir de `RUST_LOG`
pub fn init_logging() {
    init_logging_with_default("warn");
}

/// Initialise le logging avec un filtre par défaut quand `RUST_LOG` est absent
pub fn init_logging_with_default(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    // try_init: un second appel (tests, CLI) ne doit pas paniquer
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .try_init();
}

/// Macro pour le logging des opérations critiques
#[macro_export]
macro_rules! log_operation {
    ($name:expr, $block:block) => {{
        let span = tracing::span!(tracing::Level::INFO, $name);
        let _enter = span.enter();
        tracing::debug!("Début de l'opération: {}", $name);
        let result = $block;
        tracing::debug!("Fin de l'opération: {}", $name);
        result
    }};
}

/// Macro pour le logging des erreurs
#[macro_export]
macro_rules! log_error {
    ($error:expr) => {{
        let error = $error;
        tracing::error!("Erreur: {}", error);
        error
    }};
}
