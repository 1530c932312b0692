//! Comparaison des affectations décodées à la vérité simulée

use serde::{Deserialize, Serialize};

/// Matrice de confusion réduite d'un décodage de lectures simulées
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentMetrics {
    /// Nombre total de lectures
    pub total_reads: usize,

    /// Lectures affectées à leur code-barres d'origine
    pub correct: usize,

    /// Lectures affectées à un autre code-barres
    pub misassigned: usize,

    /// Lectures à code-barres laissées non déterminées
    pub unassigned: usize,

    /// Lectures de bruit laissées non déterminées
    pub noise_rejected: usize,

    /// Lectures de bruit affectées à un code-barres
    pub noise_assigned: usize,

    /// Substitutions introduites
    pub substitutions: usize,
}

impl AssignmentMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enregistre une lecture; l'index 0 désigne le non déterminé des deux côtés
    pub fn record(&mut self, truth: usize, decoded: usize) {
        self.total_reads += 1;
        match (truth, decoded) {
            (0, 0) => self.noise_rejected += 1,
            (0, _) => self.noise_assigned += 1,
            (_, 0) => self.unassigned += 1,
            (t, d) if t == d => self.correct += 1,
            _ => self.misassigned += 1,
        }
    }

    pub fn merge(&mut self, other: &AssignmentMetrics) {
        self.total_reads += other.total_reads;
        self.correct += other.correct;
        self.misassigned += other.misassigned;
        self.unassigned += other.unassigned;
        self.noise_rejected += other.noise_rejected;
        self.noise_assigned += other.noise_assigned;
        self.substitutions += other.substitutions;
    }

    /// Part des affectations correctes parmi les lectures affectées
    pub fn precision(&self) -> f64 {
        let assigned = self.correct + self.misassigned + self.noise_assigned;
        if assigned == 0 {
            return 0.0;
        }
        self.correct as f64 / assigned as f64
    }

    /// Part des lectures à code-barres retrouvées
    pub fn recall(&self) -> f64 {
        let barcoded = self.correct + self.misassigned + self.unassigned;
        if barcoded == 0 {
            return 0.0;
        }
        self.correct as f64 / barcoded as f64
    }

    /// Formate les métriques en tableau
    pub fn format_table(&self) -> String {
        format!(
            "┌────────────────────────────────────┐\n\
             │ Affectations simulées              │\n\
             ├────────────────────────────────────┤\n\
             │ Lectures         : {:>8}        │\n\
             │ Correctes        : {:>8}        │\n\
             │ Mal affectées    : {:>8}        │\n\
             │ Non affectées    : {:>8}        │\n\
             │ Bruit rejeté     : {:>8}        │\n\
             │ Bruit affecté    : {:>8}        │\n\
             │ Précision        : {:>7.2}%        │\n\
             │ Rappel           : {:>7.2}%        │\n\
             └────────────────────────────────────┘",
            self.total_reads,
            self.correct,
            self.misassigned,
            self.unassigned,
            self.noise_rejected,
            self.noise_assigned,
            100.0 * self.precision(),
            100.0 * self.recall()
        )
    }
}
