//! Training and ranking on tiny graphs

use path_embed::embedding::{Distance, EmbeddingTable, Embeddings};
use path_embed::eval::{EvalConfig, Evaluator, PathEvidence};
use path_embed::graph::PositiveTriples;
use path_embed::trainer::{Trainer, TrainerState, TrainingConfig, TrainingSet};
use path_embed::{Error, Triple};

const A: usize = 0;
const B: usize = 1;
const C: usize = 2;
const R: usize = 0;
const R_INV: usize = 1;

fn config() -> TrainingConfig {
    TrainingConfig::default()
        .with_dim(10)
        .with_epochs(500)
        .with_batches_per_epoch(1)
        .with_learning_rate(0.02)
        .with_workers(1)
        .with_seed(7)
}

fn trained(triples: &[Triple]) -> Embeddings {
    let data = TrainingSet::from_triples(triples, 3, 2);
    let mut trainer = Trainer::new(config(), data).unwrap();
    let report = trainer.train().unwrap();
    assert_eq!(report.epoch_errors.len(), 500);
    assert!(report.final_error().unwrap().is_finite());
    trainer.into_embeddings().unwrap()
}

#[test]
fn test_positive_moves_closer_than_corruption() {
    let embeddings = trained(&[Triple::new(A, R, B)]);
    let distance = |tail: usize| {
        Distance::L1.triple(
            embeddings.entities.row(A),
            embeddings.relations.row(R),
            embeddings.entities.row(tail),
        )
    };
    assert!(distance(B) < distance(C), "{} !< {}", distance(B), distance(C));
}

#[test]
fn test_trained_triple_ranks_first() {
    let positives = [Triple::new(A, R, B), Triple::new(B, R_INV, A)];
    let embeddings = trained(&positives);
    let known: PositiveTriples = positives.iter().copied().collect();

    let evaluator = Evaluator::new(
        EvalConfig::default().with_hits_at(1),
        Distance::L1,
        embeddings,
        PathEvidence::default(),
        known,
        1,
    )
    .unwrap();
    let report = evaluator.evaluate(&[Triple::new(A, R, B)]);

    assert_eq!(report.evaluated, 1);
    assert_eq!(report.tail.filtered.mean_rank, 1.0);
    assert_eq!(report.tail.filtered.hits, 1.0);
    assert_eq!(report.head.filtered.hits, 1.0);
}

#[test]
fn test_fixed_vectors_rank_first() {
    // B sits exactly at A + R; C and D are off the translation
    let entities = EmbeddingTable::from_rows(vec![
        vec![0.0, 0.0],
        vec![0.5, 0.0],
        vec![0.0, -0.5],
        vec![-0.5, 0.0],
    ])
    .unwrap();
    let relations = EmbeddingTable::from_rows(vec![vec![0.5, 0.0], vec![-0.5, 0.0]]).unwrap();
    let known: PositiveTriples = vec![Triple::new(A, R, B)].into_iter().collect();

    let evaluator = Evaluator::new(
        EvalConfig::default().with_hits_at(1),
        Distance::L1,
        Embeddings::new(entities, relations).unwrap(),
        PathEvidence::default(),
        known,
        1,
    )
    .unwrap();
    let report = evaluator.evaluate(&[Triple::new(A, R, B)]);

    assert_eq!(report.tail.filtered.mean_rank, 1.0);
    assert_eq!(report.tail.filtered.hits, 1.0);
    assert_eq!(report.tail.raw.mrr, 1.0);
}

#[test]
fn test_saturated_graph_exhausts_corruption() {
    // every possible triple is positive
    let mut triples = Vec::new();
    for head in 0..2 {
        for relation in 0..2 {
            for tail in 0..2 {
                triples.push(Triple::new(head, relation, tail));
            }
        }
    }
    let data = TrainingSet::from_triples(&triples, 2, 2);
    let mut trainer = Trainer::new(config().with_max_corruption_attempts(10), data).unwrap();

    let err = trainer.train().unwrap_err();
    assert!(matches!(err, Error::CorruptionExhausted { attempts: 10, .. }));
    assert_eq!(trainer.state(), TrainerState::Training { epoch: 0 });
}

#[test]
fn test_initialize_with_caps_norms() {
    let data = TrainingSet::from_triples(&[Triple::new(A, R, B)], 3, 2);
    let mut trainer = Trainer::new(config().with_dim(2), data).unwrap();
    let entities =
        EmbeddingTable::from_rows(vec![vec![3.0, 4.0], vec![0.1, 0.0], vec![0.0, 0.1]]).unwrap();
    let relations = EmbeddingTable::from_rows(vec![vec![0.2, 0.0], vec![-0.2, 0.0]]).unwrap();

    trainer
        .initialize_with(Embeddings::new(entities, relations).unwrap())
        .unwrap();
    assert_eq!(trainer.state(), TrainerState::VectorsInitialized);

    let row = trainer.embeddings().unwrap().entities.row(A);
    assert!((row[0] - 0.6).abs() < 1e-6);
    assert!((row[1] - 0.8).abs() < 1e-6);
}
