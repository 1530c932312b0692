//! Codes nucléotidiques IUPAC sur 4 bits (encodage BAM)

use crate::error::{DemuxError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Nombre de codes IUPAC (4 bits)
pub const IUPAC_CODE_SIZE: usize = 16;

/// Code réservé à l'agrégat « toute base »
pub const NO_NUCLEOTIDE: u8 = 0x0;

/// Code de la base indéterminée N
pub const ANY_NUCLEOTIDE: u8 = 0xf;

/// Alphabet BAM indexé par code
pub const BAM_ALPHABET: &[u8; IUPAC_CODE_SIZE] = b"=ACMGRSVTWYHKDBN";

const BAM_COMPLEMENT: [u8; IUPAC_CODE_SIZE] = [0, 8, 4, 12, 2, 10, 6, 14, 1, 9, 5, 13, 3, 11, 7, 15];

/// Codes IUPAC pour les nucléotides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IupacBase {
    A,  // Adénine
    C,  // Cytosine
    G,  // Guanine
    T,  // Thymine
    R,  // A ou G (purine)
    Y,  // C ou T (pyrimidine)
    S,  // G ou C (strong)
    W,  // A ou T (weak)
    K,  // G ou T (keto)
    M,  // A ou C (amino)
    B,  // C ou G ou T
    D,  // A ou G ou T
    H,  // A ou C ou T
    V,  // A ou C ou G
    N,  // Any base
}

impl IupacBase {
    /// Convertit un caractère en base IUPAC
    pub fn from_char(c: char) -> Result<Self> {
        match c.to_ascii_uppercase() {
            'A' => Ok(IupacBase::A),
            'C' => Ok(IupacBase::C),
            'G' => Ok(IupacBase::G),
            'T' => Ok(IupacBase::T),
            'R' => Ok(IupacBase::R),
            'Y' => Ok(IupacBase::Y),
            'S' => Ok(IupacBase::S),
            'W' => Ok(IupacBase::W),
            'K' => Ok(IupacBase::K),
            'M' => Ok(IupacBase::M),
            'B' => Ok(IupacBase::B),
            'D' => Ok(IupacBase::D),
            'H' => Ok(IupacBase::H),
            'V' => Ok(IupacBase::V),
            'N' => Ok(IupacBase::N),
            _ => Err(DemuxError::InvalidBase(c)),
        }
    }

    /// Convertit une base en caractère
    pub fn as_char(self) -> char {
        BAM_ALPHABET[self.code() as usize] as char
    }

    /// Code BAM sur 4 bits, un bit par base standard
    pub fn code(self) -> u8 {
        match self {
            IupacBase::A => 0x1,
            IupacBase::C => 0x2,
            IupacBase::M => 0x3,
            IupacBase::G => 0x4,
            IupacBase::R => 0x5,
            IupacBase::S => 0x6,
            IupacBase::V => 0x7,
            IupacBase::T => 0x8,
            IupacBase::W => 0x9,
            IupacBase::Y => 0xa,
            IupacBase::H => 0xb,
            IupacBase::K => 0xc,
            IupacBase::D => 0xd,
            IupacBase::B => 0xe,
            IupacBase::N => 0xf,
        }
    }

    /// Base correspondant à un code BAM, `None` pour le code 0
    pub fn from_code(code: u8) -> Option<Self> {
        match code & 0xf {
            NO_NUCLEOTIDE => None,
            c => IupacBase::from_char(BAM_ALPHABET[c as usize] as char).ok(),
        }
    }

    /// Base complémentaire
    pub fn complement(self) -> Self {
        IupacBase::from_code(complement_code(self.code())).unwrap_or(IupacBase::N)
    }

    /// Vérifie si c'est une base standard (non ambiguë)
    pub fn is_standard(self) -> bool {
        matches!(self, IupacBase::A | IupacBase::C | IupacBase::G | IupacBase::T)
    }
}

impl fmt::Display for IupacBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl TryFrom<char> for IupacBase {
    type Error = DemuxError;

    fn try_from(c: char) -> Result<Self> {
        IupacBase::from_char(c)
    }
}

/// Encode un caractère ASCII, tout symbole inconnu devient N
#[inline]
pub fn ascii_to_code(c: u8) -> u8 {
    match IupacBase::from_char(c as char) {
        Ok(base) => base.code(),
        Err(_) => ANY_NUCLEOTIDE,
    }
}

/// Décode un code BAM en caractère ASCII
#[inline]
pub fn code_to_ascii(code: u8) -> u8 {
    BAM_ALPHABET[(code & 0xf) as usize]
}

/// Complément d'un code BAM
#[inline]
pub fn complement_code(code: u8) -> u8 {
    BAM_COMPLEMENT[(code & 0xf) as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_roundtrip() {
        for c in "ACGTRYSWKMBDHVN".chars() {
            let base = IupacBase::from_char(c).unwrap();
            assert_eq!(IupacBase::from_code(base.code()), Some(base));
            assert_eq!(base.as_char(), c);
        }
        assert_eq!(IupacBase::from_code(NO_NUCLEOTIDE), None);
    }

    #[test]
    fn test_complement() {
        assert_eq!(IupacBase::A.complement(), IupacBase::T);
        assert_eq!(IupacBase::C.complement(), IupacBase::G);
        assert_eq!(IupacBase::R.complement(), IupacBase::Y);
        assert_eq!(IupacBase::H.complement(), IupacBase::D);
        assert_eq!(IupacBase::N.complement(), IupacBase::N);

        // Involution sur tous les codes
        for code in 0..IUPAC_CODE_SIZE as u8 {
            assert_eq!(complement_code(complement_code(code)), code);
        }
    }

    #[test]
    fn test_unknown_ascii_is_any() {
        assert_eq!(ascii_to_code(b'.'), ANY_NUCLEOTIDE);
        assert_eq!(ascii_to_code(b'a'), IupacBase::A.code());
        assert_eq!(code_to_ascii(ascii_to_code(b'g')), b'G');
    }
}
