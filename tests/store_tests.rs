use std::fs;
use std::time::Duration;

use qexpand::engine::{Engine, EngineConfig, OverlapMethod, StopReason, STATE_SCHEMA_VERSION};
use qexpand::frontier::SelectionStrategy;
use qexpand::source::{CredentialRing, Paced, ReplaySource};
use qexpand::store::CheckpointStore;
use tempfile::TempDir;

const RECORDING: &str = r#"{
    "queries": {
        "coffee": {"related": ["Coffee Shop", "coffee beans", "the"]},
        "coffee shop": {"related": ["espresso bar"]},
        "coffee beans": {"status": "throttled"}
    }
}"#;

fn config() -> EngineConfig {
    EngineConfig {
        method: OverlapMethod::LexicalNgram,
        iteration_limit: 3,
        selection: SelectionStrategy::Truncate,
        ..Default::default()
    }
}

fn replay_from_file(dir: &TempDir, credentials: &[&str]) -> Paced<ReplaySource> {
    let path = dir.path().join("recording.json");
    fs::write(&path, RECORDING).unwrap();
    let replay = ReplaySource::from_path(&path)
        .unwrap()
        .with_credentials(CredentialRing::new(credentials.iter().copied()));
    Paced::with_sleeper(replay, 0, Duration::ZERO, Box::new(|_: Duration| {}))
}

#[test]
fn test_replayed_run_writes_checkpoint_files() {
    let dir = TempDir::new().unwrap();
    let store = CheckpointStore::new(dir.path().join("data"));
    let mut source = replay_from_file(&dir, &["key-one", "key-two"]);

    let mut engine = Engine::new("Coffee", config()).unwrap();
    let summary = engine.run(&mut source, &store).unwrap();

    // one credential in use, one spare: the second throttle ends the run
    assert_eq!(summary.stop_reason, StopReason::ResourceExhausted);
    assert_eq!(
        source.inner().requests(),
        &["coffee", "coffee shop", "coffee beans", "coffee beans"]
    );

    let paths = store.paths("coffee");
    let approved = fs::read_to_string(&paths.approved).unwrap();
    let rejected = fs::read_to_string(&paths.rejected).unwrap();
    assert_eq!(approved.lines().collect::<Vec<_>>(), vec!["query,parent,score", "coffee,,1"]);
    assert_eq!(
        rejected.lines().collect::<Vec<_>>(),
        vec!["query,parent,score", "coffee shop,coffee,0"]
    );

    let state: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&paths.state).unwrap()).unwrap();
    assert_eq!(state["version"], STATE_SCHEMA_VERSION);
    assert_eq!(state["method"], "ngram");
    assert_eq!(state["seed"], "coffee");
    assert_eq!(state["junk"][0], "espresso bar");
}

#[test]
fn test_fresh_start_after_clear() {
    let dir = TempDir::new().unwrap();
    let store = CheckpointStore::new(dir.path().join("data"));
    let mut source = replay_from_file(&dir, &[]);

    let mut engine = Engine::new("coffee", config()).unwrap();
    engine.run(&mut source, &store).unwrap();
    assert!(!store.load("coffee").unwrap().is_empty());

    store.clear("coffee").unwrap();
    let checkpoint = store.load("coffee").unwrap();
    assert!(checkpoint.is_empty());

    let mut source = replay_from_file(&dir, &[]);
    let mut engine = Engine::resume("coffee", config(), checkpoint).unwrap();
    engine.run(&mut source, &store).unwrap();
    assert_eq!(source.inner().requests()[0], "coffee");
}

#[test]
fn test_saved_tables_have_no_duplicates() {
    let dir = TempDir::new().unwrap();
    let store = CheckpointStore::new(dir.path().join("data"));

    for _ in 0..3 {
        let mut source = replay_from_file(&dir, &["k1", "k2", "k3"]);
        let checkpoint = store.load("coffee").unwrap();
        let mut engine = Engine::resume("coffee", config(), checkpoint).unwrap();
        engine.run(&mut source, &store).unwrap();
    }

    let checkpoint = store.load("coffee").unwrap();
    for query in checkpoint.approved.queries() {
        assert!(!checkpoint.rejected.contains(query), "{query} in both tables");
    }
    let text = fs::read_to_string(store.paths("coffee").approved).unwrap();
    let mut rows: Vec<&str> = text.lines().skip(1).collect();
    let total = rows.len();
    rows.sort();
    rows.dedup();
    assert_eq!(rows.len(), total);
}
