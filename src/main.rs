use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use log::{error, info};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use pdf_rag::config::AppConfig;
use pdf_rag::document::Document;
use pdf_rag::gemini::GeminiClient;
use pdf_rag::index::{InMemoryIndex, QdrantIndex, VectorIndex};
use pdf_rag::{Answer, RagEngine};

/// Ask questions about your PDF and text documents, answered only from their content
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Keep vectors in process memory instead of Qdrant
    #[arg(long, global = true)]
    memory: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Chunk, embed and store a document (text or PDF)
    Ingest {
        file_path: PathBuf,
        /// Target collection (defaults to RAG_COLLECTION)
        #[arg(short, long)]
        collection: Option<String>,
    },
    /// Answer one question from a collection
    Query {
        question: String,
        #[arg(short, long)]
        collection: Option<String>,
        /// Number of chunks used to ground the answer (defaults to RAG_TOP_K)
        #[arg(short)]
        k: Option<usize>,
    },
    /// Interactive question loop, ingesting the file first if its collection is new
    Chat {
        #[arg(short, long)]
        file: Option<PathBuf>,
        #[arg(short, long)]
        collection: Option<String>,
        #[arg(short)]
        k: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    // Load configuration once; every component receives it explicitly
    let config = AppConfig::from_env().context("Invalid configuration")?;

    let gemini = Arc::new(GeminiClient::new(config.gemini.clone())?);
    let index: Arc<dyn VectorIndex> = if args.memory {
        Arc::new(InMemoryIndex::new())
    } else {
        Arc::new(QdrantIndex::new(&config.index).context("Failed to initialize Qdrant client")?)
    };
    let engine = RagEngine::new(&config, gemini.clone(), index, gemini)?;

    let default_collection = config.index.collection_name.clone();

    match args.command {
        Command::Ingest {
            file_path,
            collection,
        } => {
            let collection = collection.unwrap_or(default_collection);
            ingest_file(&engine, &file_path, &collection).await?;
        }
        Command::Query {
            question,
            collection,
            k,
        } => {
            let collection = collection.unwrap_or(default_collection);
            let k = k.unwrap_or(engine.default_k());
            let answer = engine
                .query(&question, &collection, k)
                .await
                .context("Failed to answer question")?;
            print_answer(&answer);
        }
        Command::Chat {
            file,
            collection,
            k,
        } => {
            let collection = collection.unwrap_or(default_collection);
            if let Some(file_path) = file {
                if engine.collection_exists(&collection).await? {
                    info!("Using existing collection: {}", collection);
                } else {
                    ingest_file(&engine, &file_path, &collection).await?;
                }
            }
            let k = k.unwrap_or(engine.default_k());
            run_query_loop(&engine, &collection, k).await?;
        }
    }

    Ok(())
}

async fn ingest_file(engine: &RagEngine, file_path: &Path, collection: &str) -> Result<()> {
    info!("Processing file: {}", file_path.display());

    // Validate input file exists
    if !file_path.exists() {
        error!("File not found: {}", file_path.display());
        return Err(anyhow::anyhow!("File not found: {}", file_path.display()));
    }

    let document = Document::from_file(file_path).context("Failed to process document")?;
    info!("Document type: {}", document.mime_type);

    let report = engine
        .ingest_text(&document.content, collection)
        .await
        .with_context(|| format!("Failed to ingest {}", document.document_id))?;

    println!(
        "Stored {} chunks from {} in collection '{}'",
        report.chunks, document.document_id, collection
    );
    Ok(())
}

/// Run the query loop for a collection
async fn run_query_loop(engine: &RagEngine, collection: &str, k: usize) -> Result<()> {
    println!(
        "Ready to answer questions about '{}'. Type 'exit' to quit.",
        collection
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut buffer = String::new();

    loop {
        print!("\nYour question: ");
        stdout.flush()?;

        buffer.clear();
        if stdin.read_line(&mut buffer)? == 0 {
            break;
        }

        let question = buffer.trim();
        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit") {
            println!("Goodbye!");
            break;
        }

        // A failed question should not end the session
        match engine.query(question, collection, k).await {
            Ok(answer) => print_answer(&answer),
            Err(e) => error!("Failed to answer question: {}", e),
        }
    }

    Ok(())
}

fn print_answer(answer: &Answer) {
    println!("\n{}", answer.text);

    println!("\nSimilar excerpts:");
    if answer.grounding_chunks.is_empty() {
        println!("  (none)");
    }
    for (rank, chunk) in answer.grounding_chunks.iter().enumerate() {
        println!(
            "  [{}] chars {}..{}: {}",
            rank + 1,
            chunk.source_offset,
            chunk.end_offset(),
            chunk.text.replace('\n', " ")
        );
    }

    println!("\nTotal usage cost:\n{}", answer.usage);
}
