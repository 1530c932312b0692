//! Propriétés de la métrique, des fusions d'accumulateurs et des règles

use demux_core::sequence::hamming_distance;
use demux_core::{AccumulatingClassifier, Barcode, ReadAccumulator, Read, Rule, Segment, Sequence, WordMetric};
use proptest::prelude::*;

fn word_strategy(length: usize) -> impl Strategy<Value = String> {
    proptest::string::string_regex(&format!("[ACGT]{{{}}}", length)).expect("expression valide")
}

fn codes(word: &str) -> Vec<u8> {
    Sequence::with_uniform_quality(word, 30).code
}

/// Compteurs d'un classifieur à deux codes-barres; les confiances sont des
/// multiples de 1/4 pour que les sommes flottantes soient exactes
fn classifier_strategy() -> impl Strategy<Value = AccumulatingClassifier> {
    prop::collection::vec((0u64..50, 0u64..50, 0u64..20, 0u16..200, 0u64..5, 0u64..5), 3).prop_map(|tags| {
        let undetermined = Barcode::undetermined(&[4], 0.01);
        let barcodes = vec![
            Barcode::new(1, "a", &["AAAA".to_string()], 0.5).expect("code-barres valide"),
            Barcode::new(2, "c", &["CCCC".to_string()], 0.49).expect("code-barres valide"),
        ];
        let mut classifier = AccumulatingClassifier::new(0, &undetermined, &barcodes);
        for (index, (count, pf, distance, confidence, low_conditional, low)) in tags.into_iter().enumerate() {
            let tag = classifier.tag_mut(index);
            tag.count = count + pf;
            tag.pf_count = pf;
            tag.accumulated_distance = distance;
            tag.accumulated_confidence = confidence as f64 / 4.0;
            tag.low_conditional_confidence_count = low_conditional;
            tag.low_confidence_count = low;
        }
        classifier
    })
}

fn quality_strategy() -> impl Strategy<Value = ReadAccumulator> {
    prop::collection::vec(("[ACGTN]{0,12}", 0u8..45, any::<bool>()), 0..8).prop_map(|reads| {
        let mut accumulator = ReadAccumulator::new(1);
        for (bases, quality, qcfail) in reads {
            let segment = Segment::new("r", Sequence::with_uniform_quality(&bases, quality));
            accumulator.increment(&[segment], qcfail);
        }
        accumulator
    })
}

fn merged<T: Clone>(left: &T, right: &T, merge: impl Fn(&mut T, &T)) -> T {
    let mut result = left.clone();
    merge(&mut result, right);
    result
}

proptest! {
    /// Property: la distance de Hamming est symétrique et nulle sur la diagonale
    #[test]
    fn prop_distance_symmetric(a in word_strategy(8), b in word_strategy(8)) {
        let (a, b) = (codes(&a), codes(&b));
        prop_assert_eq!(hamming_distance(&a, &b), hamming_distance(&b, &a));
        prop_assert_eq!(hamming_distance(&a, &a), 0);
    }

    /// Property: la borne de Shannon garantit des sphères de correction disjointes
    #[test]
    fn prop_shannon_bound(words in prop::collection::vec(word_strategy(6), 2..10)) {
        let mut metric = WordMetric::new(6);
        for word in &words {
            metric.add(&codes(word)).expect("longueur correcte");
        }
        prop_assume!(metric.word_count() >= 2);
        let bound = metric.shannon_bound();
        prop_assert!(2 * bound < metric.minimum_distance());
        prop_assert!(2 * (bound + 1) >= metric.minimum_distance());
        for i in 0..metric.word_count() {
            for j in 0..metric.word_count() {
                prop_assert_eq!(metric.distance(i, j), metric.distance(j, i));
                prop_assert!(i == j || metric.distance(i, j) >= metric.minimum_distance());
            }
        }
    }

    /// Property: la fusion des classifieurs est commutative et associative
    #[test]
    fn prop_classifier_merge(a in classifier_strategy(), b in classifier_strategy(), c in classifier_strategy()) {
        let merge = |left: &mut AccumulatingClassifier, right: &AccumulatingClassifier| {
            left.merge(right).expect("même forme")
        };
        prop_assert_eq!(merged(&a, &b, merge), merged(&b, &a, merge));

        let mut left = merged(&merged(&a, &b, merge), &c, merge);
        let mut right = merged(&a, &merged(&b, &c, merge), merge);
        left.finalize();
        right.finalize();
        prop_assert_eq!(left, right);
    }

    /// Property: la fusion des accumulateurs de qualité est commutative et associative
    #[test]
    fn prop_quality_merge(a in quality_strategy(), b in quality_strategy(), c in quality_strategy()) {
        let merge = |left: &mut ReadAccumulator, right: &ReadAccumulator| left.merge(right).expect("même forme");
        prop_assert_eq!(merged(&a, &b, merge), merged(&b, &a, merge));
        prop_assert_eq!(
            merged(&merged(&a, &b, merge), &c, merge),
            merged(&a, &merged(&b, &c, merge), merge)
        );
    }

    /// Property: appliquer une règle deux fois donne le même résultat
    #[test]
    fn prop_rule_idempotent(bases in "[ACGTN]{0,30}", start in -12i32..12, end in -12i32..12, reverse in any::<bool>()) {
        let token = format!("0:{}:{}", start, end);
        let knit = if reverse { "~0" } else { "0" };
        let rule = Rule::new(&[token], Some(&[knit.to_string()])).expect("règle valide");
        let mut read = Read::new(1, 0, 0);
        read.segments[0] = Segment::new("r", Sequence::with_uniform_quality(&bases, 30));

        let mut once = vec![Sequence::new()];
        rule.apply(&read, &mut once);
        let mut twice = once.clone();
        rule.apply(&read, &mut twice);
        prop_assert_eq!(&once, &twice);
        prop_assert!(once[0].len() <= bases.len());
    }
}
