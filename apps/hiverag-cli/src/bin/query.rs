use clap::Parser;
use hiverag_pipeline::{build_context, preview, RagPipeline};

/// Retrieve (and rerank) documents for a query.
#[derive(Parser, Debug)]
#[command(name = "hiverag-query", version)]
struct Args {
    /// Query text.
    #[arg(required = true)]
    query: Vec<String>,
    /// Return the recall order without cross-encoder reranking.
    #[arg(long)]
    no_rerank: bool,
    /// Number of documents to return; overrides rag.rerank_top_k.
    #[arg(long)]
    top_k: Option<usize>,
    /// Candidates fetched before reranking; overrides rag.retrieval_top_k.
    #[arg(long)]
    recall_k: Option<usize>,
    /// Print the prompt context block instead of the ranked list.
    #[arg(long)]
    context: bool,
}

fn main() -> anyhow::Result<()> {
    hiverag_cli::init_logging();
    let args = Args::parse();
    let mut settings = hiverag_cli::load_settings()?;
    if let Some(k) = args.top_k {
        settings.rerank_top_k = k;
        settings.retrieval_top_k = settings.retrieval_top_k.max(k);
    }
    if let Some(k) = args.recall_k { settings.retrieval_top_k = k; }
    if args.no_rerank { settings.use_reranker = false; }

    let pipeline = RagPipeline::open(&settings)?;
    let query = args.query.join(" ");
    let results = pipeline.query(&query)?;
    tracing::debug!(results = results.len(), rerank = settings.use_reranker, "query finished");

    if args.context {
        println!("{}", build_context(&results));
        return Ok(());
    }
    println!("Query: {query}\n");
    if results.is_empty() { println!("No documents found."); }
    for (i, doc) in results.iter().enumerate() {
        println!("{}. {} - {}\n", i + 1, doc.title, preview(&doc.content, 200));
    }
    Ok(())
}
