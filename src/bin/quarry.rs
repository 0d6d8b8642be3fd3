use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use quarry::{
    read_document, Digest, DigestRun, DirectoryLoader, Document, DocumentLoader,
    MapReduceSummarizer, OpenAiClient, QuarryConfig, RagPipeline, RecursiveChunker, Retriever,
    VectorIndex,
};

const EXIT_WORDS: &[&str] = &["exit", "quit", "q"];

#[derive(Parser, Debug)]
#[command(
    name = "quarry",
    about = "Ask questions over a folder of notes, or digest a batch of long documents"
)]
struct Cli {
    /// TOML config file; every key is optional
    #[arg(long, global = true, env = "QUARRY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Chunk, embed and persist every supported file under a directory
    Index {
        /// Directory to walk
        dir: PathBuf,

        /// Where index.bin and metadata.json are written
        #[arg(long, env = "QUARRY_INDEX")]
        out: PathBuf,
    },

    /// Answer a question from a persisted index
    Ask {
        /// Directory holding index.bin and metadata.json
        #[arg(long, env = "QUARRY_INDEX")]
        index: PathBuf,

        /// Ask once and exit; without it, read questions from stdin
        #[arg(long)]
        question: Option<String>,

        /// Override retrieval.top_k
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Summarize each file and print a themed digest
    Digest {
        /// Documents to digest
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Date in the recap heading (default: today)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Extra attempts for documents whose summarization failed
        #[arg(long, default_value_t = 1)]
        retries: usize,

        /// Print the HTML mail body instead of the Markdown recap
        #[arg(long)]
        html: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => QuarryConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => QuarryConfig::default(),
    };

    match cli.command {
        Command::Index { dir, out } => index(&config, &dir, &out).await,
        Command::Ask {
            index,
            question,
            top_k,
        } => ask(&config, &index, question, top_k).await,
        Command::Digest {
            files,
            date,
            retries,
            html,
        } => digest(&config, &files, date, retries, html).await,
    }
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn index(config: &QuarryConfig, dir: &Path, out: &Path) -> Result<()> {
    let documents = DirectoryLoader::new(dir).load()?;
    if documents.is_empty() {
        bail!("no readable documents under {}", dir.display());
    }

    let client = Arc::new(OpenAiClient::from_env(&config.openai)?);
    let chunker =
        RecursiveChunker::try_prose(config.retrieval.chunk_size, config.retrieval.chunk_overlap)?;
    let mut retriever =
        Retriever::new(client, chunker).with_batch_size(config.retrieval.embed_batch_size);

    let chunks = retriever.index_documents(&documents).await?;
    retriever
        .index()
        .persist(out)
        .with_context(|| format!("failed to write index to {}", out.display()))?;

    println!(
        "Indexed {chunks} chunks from {} documents into {}",
        documents.len(),
        out.display()
    );
    Ok(())
}

async fn ask(
    config: &QuarryConfig,
    index_dir: &Path,
    question: Option<String>,
    top_k: Option<usize>,
) -> Result<()> {
    let index = VectorIndex::load(index_dir)
        .with_context(|| format!("failed to load index from {}", index_dir.display()))?;
    let client = Arc::new(OpenAiClient::from_env(&config.openai)?);
    let chunker =
        RecursiveChunker::try_prose(config.retrieval.chunk_size, config.retrieval.chunk_overlap)?;
    let retriever = Retriever::new(client.clone(), chunker).with_index(index);
    let pipeline = RagPipeline::new(retriever, client)
        .with_top_k(top_k.unwrap_or(config.retrieval.top_k));

    if let Some(question) = question {
        return answer(&pipeline, &question).await;
    }

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("\nQuestion (or 'exit'): ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next() else { break };
        let line = line?;
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if EXIT_WORDS.contains(&question.to_lowercase().as_str()) {
            break;
        }
        answer(&pipeline, question).await?;
    }
    Ok(())
}

async fn answer(pipeline: &RagPipeline, question: &str) -> Result<()> {
    let answer = pipeline.ask_with_context(question).await?;
    println!("\n{}", answer.text);

    let mut sources: Vec<&str> = Vec::new();
    for hit in &answer.context {
        if !sources.contains(&hit.chunk.source.as_str()) {
            sources.push(&hit.chunk.source);
        }
    }
    if !sources.is_empty() {
        println!("\nSources: {}", sources.join(", "));
    }
    Ok(())
}

async fn digest(
    config: &QuarryConfig,
    files: &[PathBuf],
    date: Option<NaiveDate>,
    retries: usize,
    html: bool,
) -> Result<()> {
    let documents = files
        .iter()
        .map(|path| {
            read_document(path).with_context(|| format!("failed to read {}", path.display()))
        })
        .collect::<Result<Vec<Document>>>()?
        .into_iter()
        .filter(|doc| !doc.text.trim().is_empty())
        .collect::<Vec<_>>();

    if documents.is_empty() {
        println!("No documents today.");
        return Ok(());
    }

    let settings = &config.summarize;
    let client = Arc::new(OpenAiClient::from_env(&config.openai)?);
    let summarizer = MapReduceSummarizer::new(client)
        .with_chunk_size(settings.chunk_size)
        .with_max_in_flight(settings.max_in_flight)
        .with_summary_temperature(settings.summary_temperature)
        .with_digest_sampling(settings.digest_temperature, settings.digest_max_tokens);

    let mut run = DigestRun::new();
    let mut attempt = 0;
    loop {
        match run.summarize_pending(&summarizer, &documents).await {
            Ok(_) => break,
            Err(e) if e.is_retryable() && attempt < retries => {
                attempt += 1;
                tracing::warn!(error = %e, attempt, done = run.packs().len(), "retrying pending documents");
            }
            Err(e) => return Err(e.into()),
        }
    }

    let digest = run.finish(&summarizer).await?;
    let date = date.unwrap_or_else(|| Local::now().date_naive());
    if html {
        println!("<!-- {} -->\n{}", Digest::subject(date), digest.to_html());
    } else {
        println!("{}", digest.recap(date));
    }
    Ok(())
}
