use std::fs;
use std::path::Path;

use hiverag_core::traits::Embedder;
use hiverag_core::{Document, Error};
use hiverag_embed::FakeEmbedder;
use hiverag_index::{artifact, default_paths, IndexManager};
use tempfile::TempDir;

fn write_corpus(path: &Path, docs: &[(&str, &str)]) {
    let docs: Vec<Document> = docs.iter().map(|(t, c)| Document::new(*t, *c)).collect();
    fs::write(path, serde_json::to_string(&docs).unwrap()).unwrap();
}

fn sample_corpus(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("documents.json");
    write_corpus(&path, &[
        ("Hive inspections", "Inspect brood frames every week during the active season."),
        ("Swarm control", "Give the colony space early to prevent swarming."),
        ("Varroa", "Monitor mite counts with a sugar roll and treat above threshold."),
        ("Winter prep", "Leave enough honey stores and reduce the entrance before winter."),
        ("Smoker use", "Cool smoke calms bees before opening the hive."),
    ]);
    path
}

fn manager(tmp: &TempDir) -> IndexManager {
    let corpus = sample_corpus(tmp.path());
    IndexManager::new(corpus, default_paths(&tmp.path().join("artifacts"))).batch_size(2)
}

#[test]
fn build_persists_both_artifacts_and_load_matches() {
    let tmp = TempDir::new().unwrap();
    let embedder = FakeEmbedder::new(64);
    let mgr = manager(&tmp);

    let built = mgr.load_or_build(&embedder, false).expect("build");
    assert_eq!(built.len(), 5);
    assert_eq!(built.index().len(), 5);
    assert!(mgr.paths().index.exists());
    assert!(mgr.paths().meta.exists());

    let loaded = mgr.load(&embedder).expect("load");
    assert_eq!(loaded, built);
    assert_eq!(loaded.model_id(), embedder.model_id());
}

#[test]
fn existing_pair_is_loaded_not_rebuilt() {
    let tmp = TempDir::new().unwrap();
    let embedder = FakeEmbedder::new(64);
    let mgr = manager(&tmp);
    mgr.load_or_build(&embedder, false).expect("build");

    // Change the corpus; without force_rebuild the stale artifacts win.
    write_corpus(&tmp.path().join("documents.json"), &[("Only", "one document now")]);
    let loaded = mgr.load_or_build(&embedder, false).expect("load");
    assert_eq!(loaded.len(), 5);

    let rebuilt = mgr.load_or_build(&embedder, true).expect("rebuild");
    assert_eq!(rebuilt.len(), 1);
    assert_eq!(mgr.load(&embedder).expect("load").len(), 1);
}

#[test]
fn half_a_pair_is_fatal_unless_forced() {
    let tmp = TempDir::new().unwrap();
    let embedder = FakeEmbedder::new(64);
    let mgr = manager(&tmp);
    mgr.load_or_build(&embedder, false).expect("build");
    fs::remove_file(&mgr.paths().meta).unwrap();

    let err = mgr.load_or_build(&embedder, false).unwrap_err();
    assert!(matches!(err, Error::CorruptIndex(ref m) if m.contains("incomplete")), "{err}");

    assert_eq!(mgr.load_or_build(&embedder, true).expect("forced").len(), 5);
}

#[test]
fn size_mismatch_on_load_is_corrupt() {
    let tmp = TempDir::new().unwrap();
    let embedder = FakeEmbedder::new(64);
    let mgr = manager(&tmp);
    let corpus = mgr.load_or_build(&embedder, false).expect("build");

    // Simulate a crash that left metadata from a smaller build.
    let smaller = artifact::encode_metadata(&corpus.documents()[..4]).unwrap();
    artifact::write_metadata(&mgr.paths().meta, &smaller).unwrap();
    let err = mgr.load_or_build(&embedder, false).unwrap_err();
    assert!(matches!(err, Error::CorruptIndex(_)), "{err}");
}

#[test]
fn index_from_another_build_with_same_size_is_corrupt() {
    let tmp = TempDir::new().unwrap();
    let embedder = FakeEmbedder::new(64);
    let corpus_a = tmp.path().join("a.json");
    let corpus_b = tmp.path().join("b.json");
    write_corpus(&corpus_a, &[("A0", "queen rearing grafting larvae"), ("A1", "smoker fuel and pine needles")]);
    write_corpus(&corpus_b, &[("B0", "winter feeding syrup"), ("B1", "varroa sugar roll counts")]);
    let a = IndexManager::new(&corpus_a, default_paths(&tmp.path().join("a")));
    let b = IndexManager::new(&corpus_b, default_paths(&tmp.path().join("b")));
    a.load_or_build(&embedder, false).expect("build a");
    b.load_or_build(&embedder, false).expect("build b");

    // A rebuild from corpus B that died after writing only the index.
    fs::copy(&b.paths().index, &a.paths().index).unwrap();
    let err = a.load_or_build(&embedder, false).unwrap_err();
    assert!(matches!(err, Error::CorruptIndex(ref m) if m.contains("same build")), "{err}");

    assert_eq!(a.load_or_build(&embedder, true).expect("forced").documents()[0].title, "A0");
    assert_eq!(a.load(&embedder).expect("reload").len(), 2);
}

#[test]
fn edited_metadata_is_corrupt() {
    let tmp = TempDir::new().unwrap();
    let embedder = FakeEmbedder::new(64);
    let mgr = manager(&tmp);
    mgr.load_or_build(&embedder, false).expect("build");
    let meta = fs::read_to_string(&mgr.paths().meta).unwrap();
    fs::write(&mgr.paths().meta, meta.replace("Swarm control", "Swarm contro1")).unwrap();
    assert!(matches!(mgr.load(&embedder), Err(Error::CorruptIndex(_))));
}

#[test]
fn encoder_with_other_dimension_cannot_load() {
    let tmp = TempDir::new().unwrap();
    let mgr = manager(&tmp);
    mgr.load_or_build(&FakeEmbedder::new(64), false).expect("build");
    let err = mgr.load(&FakeEmbedder::new(32)).unwrap_err();
    assert!(matches!(err, Error::CorruptIndex(ref m) if m.contains("dimension")), "{err}");
}

#[test]
fn malformed_corpus_fails_build_and_writes_nothing() {
    let tmp = TempDir::new().unwrap();
    let corpus = tmp.path().join("documents.json");
    fs::write(&corpus, r#"[{"title": "ok", "content": "fine"}, {"title": "broken"}]"#).unwrap();
    let mgr = IndexManager::new(&corpus, default_paths(tmp.path()));
    let err = mgr.load_or_build(&FakeEmbedder::new(16), false).unwrap_err();
    assert!(matches!(err, Error::CorpusParse { item: 1, .. }), "{err}");
    assert!(!mgr.paths().index.exists());
    assert!(!mgr.paths().meta.exists());
}

#[test]
fn missing_corpus_is_a_parse_error() {
    let tmp = TempDir::new().unwrap();
    let mgr = IndexManager::new(tmp.path().join("absent.json"), default_paths(tmp.path()));
    assert!(matches!(mgr.build(&FakeEmbedder::new(16)), Err(Error::CorpusParse { .. })));
}

#[test]
fn rebuilds_from_the_same_corpus_are_identical() {
    let tmp = TempDir::new().unwrap();
    let embedder = FakeEmbedder::new(64);
    let corpus = sample_corpus(tmp.path());
    let a = IndexManager::new(&corpus, default_paths(&tmp.path().join("a"))).batch_size(2);
    let b = IndexManager::new(&corpus, default_paths(&tmp.path().join("b"))).batch_size(3);
    a.build(&embedder).unwrap();
    b.build(&embedder).unwrap();

    assert_eq!(fs::read(&a.paths().index).unwrap(), fs::read(&b.paths().index).unwrap());
    let (ca, cb) = (a.load(&embedder).unwrap(), b.load(&embedder).unwrap());
    let q = embedder.embed_batch(&["how do I stop my bees swarming".to_string()]).unwrap().remove(0);
    assert_eq!(ca.search(&q, 3).unwrap(), cb.search(&q, 3).unwrap());
}

#[test]
fn empty_corpus_round_trips() {
    let tmp = TempDir::new().unwrap();
    let corpus = tmp.path().join("documents.json");
    fs::write(&corpus, "[]").unwrap();
    let mgr = IndexManager::new(&corpus, default_paths(tmp.path()));
    let embedder = FakeEmbedder::new(16);
    assert!(mgr.load_or_build(&embedder, false).unwrap().is_empty());
    let loaded = mgr.load_or_build(&embedder, false).unwrap();
    assert!(loaded.is_empty());
    assert!(loaded.search(&[0.0; 16], 3).unwrap().is_empty());
}
