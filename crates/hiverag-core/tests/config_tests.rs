use std::path::{Path, PathBuf};

use figment::Jail;
use hiverag_core::config::{resolve_with_base, Config, RagSettings};
use hiverag_core::Error;

#[test]
fn defaults_without_any_files() {
    Jail::expect_with(|_jail| {
        let settings = Config::load().expect("load").settings().expect("settings");
        assert_eq!(settings, RagSettings::default());
        assert_eq!(settings.batch_size, 32);
        assert_eq!(settings.retrieval_top_k, 3);
        assert!(settings.use_reranker);
        assert!(!settings.force_rebuild);
        Ok(())
    });
}

#[test]
fn toml_then_env_override() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
            [rag]
            corpus_path = "corpus/bees.json"
            batch_size = 8
            retrieval_top_k = 10
            rerank_top_k = 4
            "#,
        )?;
        jail.set_env("APP_RAG__BATCH_SIZE", "16");
        let settings = Config::load().expect("load").settings().expect("settings");
        assert_eq!(settings.corpus_path, PathBuf::from("corpus/bees.json"));
        assert_eq!(settings.batch_size, 16, "env wins over toml");
        assert_eq!(settings.retrieval_top_k, 10);
        assert_eq!(settings.rerank_top_k, 4);
        Ok(())
    });
}

#[test]
fn recall_narrower_than_rerank_is_rejected() {
    Jail::expect_with(|jail| {
        jail.create_file("config.toml", "[rag]\nretrieval_top_k = 2\nrerank_top_k = 5\n")?;
        let err = Config::load().expect("load").settings().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)), "{err}");
        Ok(())
    });
}

#[test]
fn zero_batch_size_is_rejected() {
    let settings = RagSettings { batch_size: 0, ..RagSettings::default() };
    assert!(matches!(settings.validate(), Err(Error::InvalidConfig(_))));
}

#[test]
fn model_dirs_use_last_identifier_segment() {
    let settings = RagSettings::default();
    assert_eq!(settings.embedding_model_dir(), Path::new("models").join("all-MiniLM-L6-v2"));
    assert_eq!(settings.rerank_model_dir(), Path::new("models").join("ms-marco-MiniLM-L-6-v2"));
}

#[test]
fn relative_paths_resolve_against_base() {
    let base = Path::new("/srv/rag");
    assert_eq!(resolve_with_base(base, "rag.index"), PathBuf::from("/srv/rag/rag.index"));
    assert_eq!(resolve_with_base(base, "/abs/meta.json"), PathBuf::from("/abs/meta.json"));
}
