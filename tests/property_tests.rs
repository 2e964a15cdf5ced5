mod common;

use common::ScriptedSource;
use proptest::prelude::*;
use qexpand::engine::{Engine, EngineConfig, OverlapMethod};
use qexpand::frontier::SelectionStrategy;
use qexpand::query::normalize_query;
use qexpand::similarity::{content_kernel, lexical_overlap, LexicalMode, NgramIndex};
use qexpand::store::CheckpointStore;
use tempfile::TempDir;

const WORDS: [&str; 8] = [
    "coffee", "espresso", "latte", "beans", "roast", "brew", "grinder", "mocha",
];

fn query_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(WORDS.to_vec()), 1..4).prop_map(|w| w.join(" "))
}

/// Eight nodes, each with up to four related nodes by index.
fn graph_strategy() -> impl Strategy<Value = Vec<Vec<usize>>> {
    prop::collection::vec(prop::collection::vec(0usize..8, 0..4), 8)
}

fn graph_source(edges: &[Vec<usize>]) -> ScriptedSource {
    let mut source = ScriptedSource::new();
    for (node, related) in edges.iter().enumerate() {
        let related: Vec<&str> = related.iter().map(|&i| WORDS[i]).collect();
        let snippet = format!("{} {} tasting notes", WORDS[node], related.join(" "));
        source = source.ok(WORDS[node], &related, &[snippet.as_str()]);
    }
    source
}

proptest! {
    #[test]
    fn test_overlap_is_bounded(
        candidates in prop::collection::vec(query_strategy(), 1..10),
        reference in prop::collection::vec(query_strategy(), 1..10),
    ) {
        let index = NgramIndex::from_queries(reference.iter().map(|q| normalize_query(q)));
        for mode in [LexicalMode::Ngram, LexicalMode::String] {
            let score = lexical_overlap(&candidates, &index, mode);
            prop_assert!((0.0..=1.0).contains(&score), "{mode:?} gave {score}");
        }
    }

    #[test]
    fn test_overlap_edge_values(candidates in prop::collection::vec(query_strategy(), 0..5)) {
        prop_assert_eq!(lexical_overlap(&candidates, &NgramIndex::new(), LexicalMode::Ngram), 1.0);
        let index = NgramIndex::from_queries(["coffee"]);
        prop_assert_eq!(lexical_overlap(&[], &index, LexicalMode::String), 0.0);
    }

    #[test]
    fn test_kernel_self_similarity(docs in prop::collection::vec(query_strategy(), 1..5)) {
        let score = content_kernel(&docs, &docs).unwrap();
        prop_assert!((score - 1.0).abs() < 1e-9, "self similarity was {}", score);
    }

    #[test]
    fn test_kernel_is_symmetric(
        a in prop::collection::vec(query_strategy(), 1..4),
        b in prop::collection::vec(query_strategy(), 1..4),
    ) {
        let ab = content_kernel(&a, &b);
        let ba = content_kernel(&b, &a);
        match (ab, ba) {
            (Some(x), Some(y)) => prop_assert!((x - y).abs() < 1e-9),
            (x, y) => prop_assert_eq!(x, y),
        }
    }

    #[test]
    fn test_engine_never_duplicates(
        edges in graph_strategy(),
        method in prop::sample::select(vec![
            OverlapMethod::LexicalNgram,
            OverlapMethod::LexicalString,
            OverlapMethod::ContentKernel,
            OverlapMethod::ContentKernelStatistical,
        ]),
        factor in 0.0f64..=1.0,
        shuffle_seed in any::<u64>(),
    ) {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path());
        let config = EngineConfig {
            method,
            iteration_limit: 4,
            selection_factor: factor,
            selection: SelectionStrategy::Shuffle,
            shuffle_seed: Some(shuffle_seed),
            ..Default::default()
        };

        let mut source = graph_source(&edges);
        let mut engine = Engine::new(WORDS[0], config.clone()).unwrap();
        engine.run(&mut source, &store).unwrap();

        for query in engine.approved().queries() {
            prop_assert!(!engine.rejected().contains(query), "{} approved and rejected", query);
            prop_assert!(!engine.state().junk.contains(query), "{} approved and junk", query);
        }
        if method.is_lexical() {
            prop_assert!(engine.approved().contains(WORDS[0]));
        }

        // Resuming a finished run changes nothing
        let before_approved = engine.approved().clone();
        let before_rejected = engine.rejected().clone();
        let mut source = graph_source(&edges);
        let mut resumed = Engine::resume(WORDS[0], config, store.load(WORDS[0]).unwrap()).unwrap();
        resumed.run(&mut source, &store).unwrap();
        prop_assert_eq!(resumed.approved(), &before_approved);
        prop_assert_eq!(resumed.rejected(), &before_rejected);
    }
}
