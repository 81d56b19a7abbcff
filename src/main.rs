use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use codementor_rag::core::config::AppPaths;
use codementor_rag::core::logging;
use codementor_rag::qa::{QaAnswer, RelatedQuestions, Source};
use codementor_rag::rag::VectorStore;
use codementor_rag::seed;
use codementor_rag::state::AppState;

#[derive(Parser)]
#[command(name = "codementor", version, about = "Documentation-grounded answers to programming questions")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write the default config and load documentation into the collection
    Init {
        /// JSON array or JSON-lines file of {text, metadata} records; defaults to the bundled samples
        #[arg(long)]
        file: Option<PathBuf>,
        /// Clear the collection first
        #[arg(long)]
        reset: bool,
    },
    /// Answer a question from the documentation
    Ask {
        question: String,
        #[arg(long)]
        language: Option<String>,
        #[arg(long)]
        level: Option<String>,
        /// Number of passages to retrieve
        #[arg(long)]
        docs: Option<usize>,
        #[arg(long)]
        no_examples: bool,
        #[arg(long)]
        stream: bool,
        /// Print the full result as JSON
        #[arg(long, conflicts_with = "stream")]
        json: bool,
    },
    /// Explain a programming concept
    Explain {
        concept: String,
        #[arg(long, default_value = "Python")]
        language: String,
        #[arg(long, default_value = "Beginner")]
        level: String,
    },
    /// Suggest follow-up questions
    Related {
        question: String,
        #[arg(short = 'n', long, default_value_t = 3)]
        count: usize,
    },
    /// Show collection statistics
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let paths = Arc::new(AppPaths::new());
    logging::init(&paths);

    let state = AppState::initialize(paths)
        .await
        .context("Failed to initialize CodeMentor")?;

    match cli.command {
        Command::Init { file, reset } => init(&state, file, reset).await?,
        Command::Ask {
            question,
            language,
            level,
            docs,
            no_examples,
            stream,
            json,
        } => {
            let mut request = state.qa.request(question).with_examples(!no_examples);
            if let Some(language) = language {
                request = request.with_language(language);
            }
            if let Some(level) = level {
                request = request.with_level(level);
            }
            if let Some(docs) = docs {
                request = request.with_context_docs(docs);
            }

            if stream {
                let mut answer = state.qa.answer_question_streaming(request).await?;
                let mut stdout = std::io::stdout();
                while let Some(fragment) = answer.fragments.recv().await {
                    write!(stdout, "{}", fragment?)?;
                    stdout.flush()?;
                }
                println!();
                print_sources(&answer.sources);
            } else {
                let answer = state.qa.answer_question(request).await;
                print_answer(&answer, json)?;
            }
        }
        Command::Explain {
            concept,
            language,
            level,
        } => {
            println!("{}", state.qa.explain_concept(&concept, &language, &level).await);
        }
        Command::Related { question, count } => {
            let related = state.qa.get_related_questions(&question, count).await;
            for (i, q) in related.questions().iter().enumerate() {
                println!("{}. {}", i + 1, q);
            }
            if let RelatedQuestions::Failed(message) = &related {
                eprintln!("{}", message);
            }
        }
        Command::Stats => {
            let stats = state.engine.stats().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}

async fn init(state: &AppState, file: Option<PathBuf>, reset: bool) -> anyhow::Result<()> {
    let config_path = state.config.ensure_config_file()?;
    println!("Config: {}", config_path.display());

    if reset {
        state.engine.reset().await?;
    }

    let existing = state.store.count().await?;
    if existing > 0 && file.is_none() {
        println!(
            "Collection {} already holds {} documents; use --reset to reload the samples",
            state.settings.rag.collection_name, existing
        );
        return Ok(());
    }

    let documents = match &file {
        Some(path) => seed::load_documents(path)
            .with_context(|| format!("Failed to load documents from {}", path.display()))?,
        None => seed::sample_documents(),
    };

    let report = state.engine.ingest(&documents).await?;
    println!(
        "Loaded {} documents as {} chunks ({} added)",
        report.documents, report.chunks, report.added
    );

    let stats = state.engine.stats().await?;
    println!("Collection: {}", stats.collection.collection_name);
    println!("Documents: {}", stats.collection.document_count);
    Ok(())
}

fn print_answer(answer: &QaAnswer, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(answer)?);
        return Ok(());
    }

    println!("{}", answer.answer);
    print_sources(&answer.sources);
    Ok(())
}

fn print_sources(sources: &[Source]) {
    if sources.is_empty() {
        return;
    }

    println!();
    println!("Sources:");
    for (i, source) in sources.iter().enumerate() {
        if source.url.is_empty() {
            println!("  [{}] {} (relevance {:.2})", i + 1, source.title, source.relevance);
        } else {
            println!(
                "  [{}] {} (relevance {:.2}) {}",
                i + 1,
                source.title,
                source.relevance,
                source.url
            );
        }
    }
}
