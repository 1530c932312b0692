//! Moteur de jetons et de règles d'assemblage
//!
//! Un [`Token`] décrit un intervalle d'un segment source, résolu contre la
//! longueur réelle du segment au moment de l'application. Une [`Rule`]
//! ordonne des [`Transform`] qui copient ces intervalles dans des segments
//! cibles, éventuellement en complément inverse.

use crate::error::{DemuxError, Result};
use crate::read::Read;
use crate::sequence::Sequence;
use std::fmt;
use std::str::FromStr;

/// Origine des données d'un jeton
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenSource {
    /// Segment d'entrée
    Segment(usize),
    /// Code-barres d'échantillon déjà décodé
    Sample,
    /// Code-barres cellulaire déjà décodé
    Cellular(usize),
    /// Code-barres moléculaire déjà décodé
    Molecular(usize),
}

impl fmt::Display for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenSource::Segment(index) => write!(f, "{}", index),
            TokenSource::Sample => write!(f, "S"),
            TokenSource::Cellular(index) => write!(f, "C{}", index),
            TokenSource::Molecular(index) => write!(f, "M{}", index),
        }
    }
}

impl FromStr for TokenSource {
    type Err = DemuxError;

    fn from_str(s: &str) -> Result<Self> {
        let parse_index = |digits: &str| {
            digits
                .parse::<usize>()
                .map_err(|_| DemuxError::configuration(format!("source de jeton invalide: {}", s)))
        };
        match s.as_bytes().first() {
            Some(b'S') if s.len() == 1 => Ok(TokenSource::Sample),
            Some(b'C') => Ok(TokenSource::Cellular(parse_index(&s[1..])?)),
            Some(b'M') => Ok(TokenSource::Molecular(parse_index(&s[1..])?)),
            _ => Ok(TokenSource::Segment(parse_index(s)?)),
        }
    }
}

/// Intervalle `[start, end)` d'une source, bornes négatives comptées depuis la fin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub index: usize,
    pub source: TokenSource,
    start: i32,
    /// `None` pour un intervalle ouvert jusqu'à la fin
    end: Option<i32>,
}

impl Token {
    pub fn new(index: usize, source: TokenSource, start: i32, end: Option<i32>) -> Self {
        Self { index, source, start, end }
    }

    /// Analyse la forme `source:start:end`
    pub fn parse(index: usize, pattern: &str) -> Result<Self> {
        let parts: Vec<&str> = pattern.split(':').collect();
        if parts.len() != 3 {
            return Err(DemuxError::configuration(format!(
                "jeton {} invalide: attendu source:start:end",
                pattern
            )));
        }
        let source = parts[0].trim().parse::<TokenSource>()?;
        let bound = |text: &str| -> Result<Option<i32>> {
            let text = text.trim();
            if text.is_empty() {
                Ok(None)
            } else {
                text.parse::<i32>()
                    .map(Some)
                    .map_err(|_| DemuxError::configuration(format!("borne de jeton invalide: {}", pattern)))
            }
        };
        let start = bound(parts[1])?.unwrap_or(0);
        let end = bound(parts[2])?;
        Ok(Self::new(index, source, start, end))
    }

    pub fn start(&self) -> i32 {
        self.start
    }

    pub fn end(&self) -> Option<i32> {
        self.end
    }

    /// Début résolu contre la longueur de la source, borné à `[0, length]`
    #[inline]
    pub fn decode_start(&self, length: usize) -> usize {
        resolve_bound(self.start, length)
    }

    /// Fin résolue contre la longueur de la source, bornée à `[0, length]`
    #[inline]
    pub fn decode_end(&self, length: usize) -> usize {
        match self.end {
            Some(end) => resolve_bound(end, length),
            None => length,
        }
    }

    /// Intervalle toujours vide quelle que soit la longueur de la source
    pub fn is_empty(&self) -> bool {
        match self.end {
            Some(end) => (self.start >= 0) == (end >= 0) && end <= self.start,
            None => false,
        }
    }

    /// Vrai si la longueur extraite ne dépend pas de la source
    pub fn is_constant(&self) -> bool {
        match self.end {
            Some(end) => (self.start >= 0) == (end >= 0),
            None => self.start < 0,
        }
    }

    /// Longueur fixe d'un jeton constant
    pub fn length(&self) -> Option<usize> {
        if !self.is_constant() {
            return None;
        }
        match self.end {
            Some(end) => Some((end - self.start).max(0) as usize),
            None => Some(self.start.unsigned_abs() as usize),
        }
    }
}

#[inline]
fn resolve_bound(bound: i32, length: usize) -> usize {
    if bound >= 0 {
        (bound as usize).min(length)
    } else {
        length.saturating_sub(bound.unsigned_abs() as usize)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:", self.source, self.start)?;
        if let Some(end) = self.end {
            write!(f, "{}", end)?;
        }
        Ok(())
    }
}

/// Opérateur appliqué à un jeton avant concaténation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LeftOperator {
    #[default]
    Identity,
    ReverseComplement,
}

/// Jeton lié à un segment de sortie
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transform {
    pub token: Token,
    pub output_segment_index: usize,
    pub operator: LeftOperator,
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.operator == LeftOperator::ReverseComplement {
            write!(f, "~")?;
        }
        write!(f, "{} -> {}", self.token, self.output_segment_index)
    }
}

/// Cardinalités des sources disponibles pour la validation d'une règle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceCardinality {
    pub segments: usize,
    pub sample: bool,
    pub cellular: usize,
    pub molecular: usize,
}

impl SourceCardinality {
    /// Seuls les segments d'entrée sont disponibles
    pub fn segments(segments: usize) -> Self {
        Self { segments, ..Default::default() }
    }

    fn contains(&self, source: TokenSource) -> bool {
        match source {
            TokenSource::Segment(index) => index < self.segments,
            TokenSource::Sample => self.sample,
            TokenSource::Cellular(index) => index < self.cellular,
            TokenSource::Molecular(index) => index < self.molecular,
        }
    }
}

/// Programme de copie ordonné
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    tokens: Vec<Token>,
    transforms: Vec<Transform>,
    output_cardinality: usize,
}

impl Rule {
    /// Compile des jetons et un patron d'assemblage optionnel
    ///
    /// Chaque entrée de `knit` décrit un segment de sortie comme une liste de
    /// références de jetons séparées par des virgules, préfixées de `~` pour le
    /// complément inverse. Sans patron, chaque jeton forme son propre segment.
    pub fn new(patterns: &[String], knit: Option<&[String]>) -> Result<Self> {
        let tokens = patterns
            .iter()
            .enumerate()
            .map(|(index, pattern)| Token::parse(index, pattern))
            .collect::<Result<Vec<_>>>()?;

        let mut transforms = Vec::new();
        match knit {
            Some(knit) => {
                for (output_segment_index, entry) in knit.iter().enumerate() {
                    for reference in entry.split(',') {
                        let reference = reference.trim();
                        let (operator, digits) = match reference.strip_prefix('~') {
                            Some(rest) => (LeftOperator::ReverseComplement, rest),
                            None => (LeftOperator::Identity, reference),
                        };
                        let token_index: usize = digits.parse().map_err(|_| {
                            DemuxError::configuration(format!("référence de jeton invalide: {}", reference))
                        })?;
                        let token = *tokens.get(token_index).ok_or_else(|| {
                            DemuxError::configuration(format!("référence au jeton inexistant {}", token_index))
                        })?;
                        transforms.push(Transform { token, output_segment_index, operator });
                    }
                }
            }
            None => {
                for token in &tokens {
                    transforms.push(Transform {
                        token: *token,
                        output_segment_index: token.index,
                        operator: LeftOperator::Identity,
                    });
                }
            }
        }

        let output_cardinality = knit.map(|k| k.len()).unwrap_or(tokens.len());
        Ok(Self { tokens, transforms, output_cardinality })
    }

    /// Règle identité: chaque segment d'entrée copié intégralement
    pub fn identity(segment_cardinality: usize) -> Self {
        let tokens: Vec<Token> = (0..segment_cardinality)
            .map(|i| Token::new(i, TokenSource::Segment(i), 0, None))
            .collect();
        let transforms = tokens
            .iter()
            .map(|token| Transform {
                token: *token,
                output_segment_index: token.index,
                operator: LeftOperator::Identity,
            })
            .collect();
        Self { tokens, transforms, output_cardinality: segment_cardinality }
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn transforms(&self) -> &[Transform] {
        &self.transforms
    }

    pub fn output_cardinality(&self) -> usize {
        self.output_cardinality
    }

    /// Vérifie que chaque jeton référence une source existante
    pub fn validate(&self, available: SourceCardinality) -> Result<()> {
        for token in &self.tokens {
            if !available.contains(token.source) {
                return Err(DemuxError::configuration(format!(
                    "le jeton {} référence la source inexistante {}",
                    token, token.source
                )));
            }
        }
        Ok(())
    }

    /// Longueur fixe de chaque segment produit, exigée pour un code-barres
    pub fn segment_lengths(&self) -> Result<Vec<usize>> {
        let mut lengths = vec![0; self.output_cardinality];
        for transform in &self.transforms {
            let length = transform.token.length().ok_or_else(|| {
                DemuxError::configuration(format!(
                    "le jeton {} n'a pas de longueur constante",
                    transform.token
                ))
            })?;
            lengths[transform.output_segment_index] += length;
        }
        Ok(lengths)
    }

    /// Applique le programme: vide puis remplit chaque segment cible
    pub fn apply(&self, read: &Read, target: &mut [Sequence]) {
        for sequence in target.iter_mut() {
            sequence.clear();
        }
        for transform in &self.transforms {
            let Some(source) = resolve_source(read, transform.token.source) else {
                continue;
            };
            let Some(output) = target.get_mut(transform.output_segment_index) else {
                continue;
            };
            let length = source.len();
            let start = transform.token.decode_start(length);
            let end = transform.token.decode_end(length);
            match transform.operator {
                LeftOperator::Identity => output.append(source, start, end),
                LeftOperator::ReverseComplement => output.append_reverse_complement(source, start, end),
            }
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for transform in &self.transforms {
            writeln!(f, "{}", transform)?;
        }
        Ok(())
    }
}

fn resolve_source(read: &Read, source: TokenSource) -> Option<&Sequence> {
    match source {
        TokenSource::Segment(index) => read.segments.get(index).map(|s| &s.sequence),
        TokenSource::Sample => Some(&read.sample.corrected),
        TokenSource::Cellular(index) => read.cellular.get(index).map(|a| &a.corrected),
        TokenSource::Molecular(index) => read.molecular.get(index).map(|a| &a.corrected),
    }
}
