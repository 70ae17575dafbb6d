use anyhow::{Context, Result};
use console::style;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::answer::{ChatAnswer, answer};
use crate::config::Config;
use crate::pipeline::{IndexProgress, IndexingJob};
use crate::session::{ConversationTurn, ManualRecord, SessionContext};

const MAX_CITED_SOURCES: usize = 5;
const SOURCE_EXCERPT_CHARS: usize = 700;

/// Index a PDF manual and make it the active one
#[inline]
pub async fn load_manual(path: &Path) -> Result<()> {
    let config = Config::load_default()?;
    let mut session = SessionContext::load(config.clone())?;

    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .context("Path has no usable file name")?
        .to_string();
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    info!("Loading manual {} ({} bytes)", filename, bytes.len());

    let client = session.indexing_client()?;
    client
        .health_check()
        .context("Ollama is not reachable or a configured model is missing")?;

    let mut job = IndexingJob::spawn(bytes, filename.clone(), Arc::new(client), config);

    let bar = if console::user_attended_stderr() {
        ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner} {msg}").expect("style template is valid"),
        )
    } else {
        ProgressBar::hidden()
    };

    while let Some(event) = job.progress.recv().await {
        match event {
            IndexProgress::Saving => bar.set_message("Saving upload"),
            IndexProgress::Extracting => bar.set_message("Extracting text"),
            IndexProgress::Chunking => bar.set_message("Splitting into chunks"),
            IndexProgress::Embedding { done, total } => {
                bar.set_message(format!("Embedding chunks ({}/{})", done, total));
            }
            IndexProgress::Writing => bar.set_message("Writing index"),
        }
        bar.tick();
    }

    let outcome = job.handle.await.context("Indexing task panicked")??;
    bar.finish_and_clear();

    session.set_manual(ManualRecord::from_outcome(&outcome, &filename))?;

    println!("{}", style("✓ Manual indexed successfully!").green());
    println!("  File: {}", filename);
    println!("  Document ID: {}", outcome.document_id);
    println!("  Pages: {}", outcome.page_count);
    println!("  Chunks: {}", outcome.chunk_count);
    println!("  Embedding model: {}", outcome.embedding_model);
    println!();
    println!("Ask a question with 'manual-qa ask \"...\"' or start 'manual-qa chat'.");

    Ok(())
}

/// Answer a single question about the active manual
#[inline]
pub async fn ask_question(question: &str) -> Result<()> {
    let config = Config::load_default()?;
    let mut session = SessionContext::load(config)?;

    let Some(manual) = session.manual().cloned() else {
        println!("No manual is loaded. Load one with 'manual-qa load <pdf>'.");
        return Ok(());
    };

    let retrieval = session.config().retrieval;
    let client = session.ollama_client()?.clone();
    let store = session.vector_store().await?;

    let result = answer(question, store, &client, &client, &retrieval).await;

    println!("{} {}", style("Manual:").bold(), manual.filename);
    println!();
    println!("{}", result.text);
    print_citations(&result);

    Ok(())
}

/// Interactive question loop over the active manual
#[inline]
pub async fn chat() -> Result<()> {
    let config = Config::load_default()?;
    let mut session = SessionContext::load(config)?;

    let Some(manual) = session.manual().cloned() else {
        println!("No manual is loaded. Load one with 'manual-qa load <pdf>'.");
        return Ok(());
    };

    println!(
        "{} {} (type 'exit' to leave)",
        style("Chatting about").bold(),
        manual.filename
    );

    loop {
        let question: String = Input::new()
            .with_prompt("❓")
            .allow_empty(true)
            .interact_text()?;
        let question = question.trim().to_string();

        if question.is_empty() || question.eq_ignore_ascii_case("exit") {
            break;
        }

        let retrieval = session.config().retrieval;
        let client = session.ollama_client()?.clone();
        let store = session.vector_store().await?;

        let result = answer(&question, store, &client, &client, &retrieval).await;

        println!();
        println!("{}", result.text);
        print_citations(&result);
        println!();

        session.record_turn(ConversationTurn {
            question,
            answer: result.text,
            sources: result.sources,
        });
    }

    info!("Chat ended after {} turns", session.turns().len());
    Ok(())
}

/// Show the active manual and storage layout
#[inline]
pub async fn show_status() -> Result<()> {
    let config = Config::load_default()?;
    let mut session = SessionContext::load(config)?;

    println!("{}", style("📖 Manual QA Status").bold().cyan());
    println!();

    match session.ollama_client()?.ping() {
        Ok(()) => println!("Ollama: {}", style("reachable").green()),
        Err(e) => println!("Ollama: {} ({})", style("unreachable").red(), e),
    }
    println!();

    let Some(manual) = session.manual().cloned() else {
        println!("No manual is loaded.");
        println!("Load one with 'manual-qa load <pdf>'.");
        return Ok(());
    };

    println!("Active manual: {}", style(&manual.filename).cyan());
    println!("  Document ID: {}", manual.document_id);
    println!("  Uploaded: {}", manual.uploaded_at);
    println!("  Pages: {}", manual.page_count);
    println!("  Chunks: {}", manual.chunk_count);
    println!("  Embedding model: {}", manual.embedding_model);
    println!("  Upload: {}", manual.pdf_path.display());
    println!("  Index: {}", manual.index_dir.display());

    match session.vector_store().await {
        Ok(store) => match store.count_chunks().await {
            Ok(count) => println!("  Indexed rows: {}", count),
            Err(e) => println!("  Indexed rows: unavailable ({})", e),
        },
        Err(e) => println!("  Index: unreadable ({})", e),
    }

    Ok(())
}

/// Discard the active manual and all of its stored artifacts
#[inline]
pub fn discard_manual() -> Result<()> {
    let config = Config::load_default()?;
    let mut session = SessionContext::load(config)?;

    match session.discard_manual()? {
        Some(record) => {
            println!(
                "{} {} ({})",
                style("✓ Discarded").green(),
                record.filename,
                record.document_id
            );
        }
        None => {
            println!("No manual is loaded; nothing to discard.");
        }
    }

    Ok(())
}

fn print_citations(result: &ChatAnswer) {
    if result.sources.is_empty() {
        return;
    }

    println!();
    println!("{}", style("Sources:").bold());
    for source in result.sources.iter().take(MAX_CITED_SOURCES) {
        let excerpt: String = source.content.chars().take(SOURCE_EXCERPT_CHARS).collect();
        let suffix = if source.content.chars().count() > SOURCE_EXCERPT_CHARS {
            "…"
        } else {
            ""
        };
        println!("  [page {}] {}{}", source.page, excerpt.trim(), suffix);
    }
}
