//! Types d'erreurs pour le moteur de démultiplexage

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DemuxError {
    /// Paramètres de décodeur invalides ou incohérents, levée à la construction
    #[error("Erreur de configuration: {0}")]
    Configuration(String),

    /// Segments d'une même lecture désynchronisés
    #[error("Erreur de séquence: {0}")]
    Sequence(String),

    /// Violation d'invariant interne
    #[error("Erreur interne: {0}")]
    Internal(String),

    #[error("Base IUPAC invalide: {0}")]
    InvalidBase(char),

    #[error("Erreur IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("Erreur de sérialisation: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DemuxError {
    /// Raccourci pour une erreur de configuration
    pub fn configuration(message: impl Into<String>) -> Self {
        DemuxError::Configuration(message.into())
    }

    /// Raccourci pour une erreur de séquence
    pub fn sequence(message: impl Into<String>) -> Self {
        DemuxError::Sequence(message.into())
    }

    /// Raccourci pour une erreur interne
    pub fn internal(message: impl Into<String>) -> Self {
        DemuxError::Internal(message.into())
    }
}

pub type Result<T> = std::result::Result<T, DemuxError>;
