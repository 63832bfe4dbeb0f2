//! Property-based tests for path-embed
//!
//! These tests verify invariants that hold for any input graph:
//! - Vector norms stay inside the unit ball
//! - Negative samples are never known positives
//! - Path shares per pair are normalized and allocation is deterministic

use proptest::prelude::*;

use path_embed::Triple;

/// Up to `max` triples over `entities` entities and `relations` base relations
fn arb_triples(
    entities: usize,
    relations: usize,
    max: usize,
) -> impl Strategy<Value = Vec<Triple>> {
    prop::collection::vec((0..entities, 0..relations, 0..entities), 1..max).prop_map(|raw| {
        let mut triples: Vec<Triple> = raw
            .into_iter()
            .map(|(h, r, t)| Triple::new(h, r, t))
            .collect();
        triples.sort();
        triples.dedup();
        triples
    })
}

mod norm_props {
    use super::*;
    use path_embed::embedding::{cap_norm, l2_norm, EmbeddingTable};
    use rand::SeedableRng;
    use rand_xorshift::XorShiftRng;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn cap_norm_bounds_any_vector(mut v in prop::collection::vec(-100.0f32..100.0, 1..32)) {
            let before = l2_norm(&v);
            cap_norm(&mut v);
            let after = l2_norm(&v);
            prop_assert!(after <= 1.0 + 1e-5, "norm {} after capping", after);
            if before <= 1.0 {
                prop_assert!((after - before).abs() < 1e-6);
            }
        }

        #[test]
        fn random_tables_start_in_unit_ball(rows in 1usize..40, dim in 1usize..64, seed: u64) {
            let mut rng = XorShiftRng::seed_from_u64(seed);
            let table = EmbeddingTable::random(rows, dim, &mut rng).unwrap();
            prop_assert_eq!(table.len(), rows);
            for row in table.rows() {
                prop_assert!(l2_norm(row) <= 1.0 + 1e-5);
            }
        }
    }
}

mod corruption_props {
    use super::*;
    use path_embed::graph::PositiveTriples;
    use path_embed::trainer::{Corruption, NegativeSampler};
    use rand::SeedableRng;
    use rand_xorshift::XorShiftRng;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn corrupted_triples_are_never_positive(
            triples in arb_triples(6, 3, 30),
            seed: u64,
        ) {
            let positives: PositiveTriples = triples.iter().copied().collect();
            let sampler = NegativeSampler::new(&positives, 6, 3, 200);
            let mut rng = XorShiftRng::seed_from_u64(seed);

            for &triple in &triples {
                for kind in [Corruption::Head, Corruption::Tail, Corruption::Relation] {
                    if let Ok(negative) = sampler.corrupt(triple, kind, &mut rng) {
                        prop_assert!(!positives.contains_triple(&negative));
                        match kind {
                            Corruption::Head => {
                                prop_assert_eq!(negative.relation, triple.relation);
                                prop_assert_eq!(negative.tail, triple.tail);
                            }
                            Corruption::Tail => {
                                prop_assert_eq!(negative.head, triple.head);
                                prop_assert_eq!(negative.relation, triple.relation);
                            }
                            Corruption::Relation => {
                                prop_assert_eq!(negative.head, triple.head);
                                prop_assert_eq!(negative.tail, triple.tail);
                            }
                        }
                    }
                }
            }
        }
    }
}

mod pcra_props {
    use super::*;
    use path_embed::pcra::{Pcra, PcraConfig};

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn shares_are_normalized(triples in arb_triples(8, 3, 40)) {
            let config = PcraConfig::default();
            let output = Pcra::new(config.clone()).unwrap().run(&triples, 3);

            for (pair, shares) in output.resources.iter() {
                let total: f32 = shares.iter().map(|s| s.share).sum();
                prop_assert!(total <= 1.0 + 1e-4, "{:?} sums to {}", pair, total);
                for share in shares {
                    prop_assert!(share.share > config.min_resource);
                    prop_assert!(!share.path.is_empty() && share.path.len() <= 2);
                }
            }
        }

        #[test]
        fn confidences_are_fractions(triples in arb_triples(8, 3, 40)) {
            let output = Pcra::default().run(&triples, 3);
            for (_, relations) in output.confidences.groups() {
                for (relation, confidence) in relations {
                    prop_assert!(relation < 6);
                    prop_assert!(confidence > 0.0 && confidence <= 1.0);
                }
            }
        }

        #[test]
        fn allocation_is_deterministic(triples in arb_triples(8, 3, 40)) {
            let pcra = Pcra::default();
            let first = pcra.run(&triples, 3);
            let second = pcra.run(&triples, 3);
            prop_assert_eq!(first.resources, second.resources);
            prop_assert_eq!(first.confidences, second.confidences);
        }
    }
}

mod training_props {
    use super::*;
    use path_embed::embedding::l2_norm;
    use path_embed::trainer::{Trainer, TrainingConfig, TrainingSet};

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn norms_stay_bounded_after_training(triples in arb_triples(12, 2, 20), seed: u64) {
            let data = TrainingSet::from_triples(&triples, 12, 4);
            let config = TrainingConfig::default()
                .with_dim(6)
                .with_epochs(5)
                .with_batches_per_epoch(2)
                .with_learning_rate(0.1)
                .with_workers(2)
                .with_seed(seed);
            let mut trainer = Trainer::new(config, data).unwrap();
            trainer.train().unwrap();

            let embeddings = trainer.embeddings().unwrap();
            for row in embeddings.entities.rows().chain(embeddings.relations.rows()) {
                prop_assert!(l2_norm(row) <= 1.0 + 1e-4);
            }
        }
    }
}
