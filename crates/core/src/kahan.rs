//! Sommation compensée de Kahan

/// Accumulateur de somme compensée
///
/// Garde un terme de compensation qui capture les bits de poids faible perdus
/// à chaque addition. L'erreur finale reste bornée indépendamment du nombre de
/// termes, ce qui n'est pas le cas d'une somme séquentielle naïve.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct KahanSum {
    value: f64,
    compensation: f64,
}

impl KahanSum {
    /// Crée une somme nulle
    pub fn new() -> Self {
        Self::default()
    }

    /// Crée une somme initialisée à une valeur
    pub fn with_value(value: f64) -> Self {
        Self { value, compensation: 0.0 }
    }

    /// Ajoute un terme
    #[inline]
    pub fn add(&mut self, term: f64) {
        let y = term - self.compensation;
        let t = self.value + y;
        self.compensation = (t - self.value) - y;
        self.value = t;
    }

    /// Valeur courante de la somme
    #[inline]
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Remet la somme à zéro
    #[inline]
    pub fn reset(&mut self) {
        self.value = 0.0;
        self.compensation = 0.0;
    }
}

impl Extend<f64> for KahanSum {
    fn extend<I: IntoIterator<Item = f64>>(&mut self, iter: I) {
        for term in iter {
            self.add(term);
        }
    }
}

impl FromIterator<f64> for KahanSum {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut sum = KahanSum::new();
        sum.extend(iter);
        sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn pairwise_sum(values: &[f64]) -> f64 {
        match values.len() {
            0 => 0.0,
            1 => values[0],
            n => {
                let (left, right) = values.split_at(n / 2);
                pairwise_sum(left) + pairwise_sum(right)
            }
        }
    }

    #[test]
    fn test_empty_and_single() {
        assert_eq!(KahanSum::new().value(), 0.0);
        let sum: KahanSum = vec![2.5].into_iter().collect();
        assert_eq!(sum.value(), 2.5);
    }

    #[test]
    fn test_kahan_bound_against_naive_drift() {
        // Somme déjà grande (1.5 * 2^16) suivie de 10^6 petits termes de signe
        // aléatoire, chacun inférieur à un demi ulp de la somme courante
        let offset = 98304.0_f64;
        let ulp = 2f64.powi(-36);
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        let mut terms = Vec::with_capacity(1_000_001);
        terms.push(offset);
        for _ in 0..1_000_000 {
            let magnitude = ulp * rng.gen_range(0.30..0.45);
            let sign = if rng.gen_bool(0.75) { 1.0 } else { -1.0 };
            terms.push(sign * magnitude);
        }

        let reference = pairwise_sum(&terms);
        let compensated: KahanSum = terms.iter().copied().collect();
        let naive = terms.iter().fold(0.0_f64, |sum, term| sum + term);

        assert!((compensated.value() - reference).abs() < 1e-9);
        assert!((naive - reference).abs() > 1e-6);
        // La somme naïve n'a jamais bougé
        assert_eq!(naive, offset);
    }

    #[test]
    fn test_reset() {
        let mut sum = KahanSum::with_value(3.0);
        sum.add(0.5);
        assert_eq!(sum.value(), 3.5);
        sum.reset();
        assert_eq!(sum, KahanSum::new());
    }
}
