use std::path::PathBuf;

use clap::Parser;
use hiverag_embed::{get_default_embedder, TimeoutEmbedder};
use hiverag_index::IndexManager;

/// Load the persisted index, or stream the corpus and build it.
#[derive(Parser, Debug)]
#[command(name = "hiverag-indexer", version)]
struct Args {
    /// Corpus JSON file (array of {title, content}); overrides rag.corpus_path.
    #[arg(long)]
    corpus: Option<PathBuf>,
    /// Ignore existing artifacts and rebuild from the corpus.
    #[arg(long)]
    force_rebuild: bool,
    /// Documents per encoder call; overrides rag.batch_size.
    #[arg(long)]
    batch_size: Option<usize>,
}

fn main() -> anyhow::Result<()> {
    hiverag_cli::init_logging();
    let args = Args::parse();
    let mut settings = hiverag_cli::load_settings()?;
    if let Some(corpus) = args.corpus { settings.corpus_path = corpus; }
    if let Some(batch_size) = args.batch_size { settings.batch_size = batch_size; }
    settings.force_rebuild |= args.force_rebuild;
    settings.validate()?;

    let embedder = get_default_embedder(&settings.embedding_model_dir(), &settings.embedding_model)?;
    let embedder = TimeoutEmbedder::wrap(embedder, settings.encode_timeout())?;
    let manager = IndexManager::from_settings(&settings).show_progress(true);
    let corpus = manager.load_or_build(embedder.as_ref(), settings.force_rebuild)?;

    println!("✅ Index ready");
    println!("📊 {} documents, dimension {}", corpus.len(), corpus.dim().map_or_else(|| "-".to_string(), |d| d.to_string()));
    println!("📦 {}", manager.paths().index.display());
    println!("📦 {}", manager.paths().meta.display());
    Ok(())
}
