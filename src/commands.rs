use anyhow::{Context, Result};
use console::style;
use dialoguer::Input;
use tracing::{info, warn};

use crate::app::AppContext;
use crate::config::Config;
use crate::database::lancedb::VectorStore;
use crate::database::sqlite::Database;
use crate::embeddings::ollama::OllamaClient;
use crate::indexer::{
    IngestLock, IngestOptions, Ingestor, ItemErrorPolicy, load_processed_wards,
    validate_consistency,
};
use crate::query::QueryResult;

/// Run the ingestion pipeline and print what it did
#[inline]
pub async fn run_ingest(config: Config, refresh: bool, on_error: ItemErrorPolicy) -> Result<()> {
    println!("📥 Ingesting ward boundaries from {}", config.boundaries.source);

    let mut ingestor = Ingestor::new(config).await?;
    let stats = ingestor
        .run(IngestOptions { refresh, on_error })
        .await
        .context("Ingestion failed")?;

    println!("✅ Ingestion run {} completed", stats.run_id);
    println!("   Wards loaded: {}", stats.ward_count);
    println!("   Records written: {}", stats.embedded);
    if !stats.skipped.is_empty() {
        println!(
            "   ⚠️  Skipped wards ({}): {}",
            stats.skipped.len(),
            stats.skipped.join(", ")
        );
    }
    if stats.pruned > 0 {
        println!("   Stale records removed: {}", stats.pruned);
    }
    println!("   Duration: {:.1?}", stats.duration);

    Ok(())
}

/// Ingest with default options unless a processed snapshot already exists
#[inline]
pub async fn ensure_ingested(config: &Config) -> Result<()> {
    if config.processed_wards_path().exists() {
        return Ok(());
    }

    info!("No processed ward data found, running ingestion first");
    run_ingest(config.clone(), false, ItemErrorPolicy::Abort).await
}

/// Answer one question and print the result
#[inline]
pub async fn ask(config: Config, question: &str, json: bool, auto_ingest: bool) -> Result<()> {
    if auto_ingest {
        ensure_ingested(&config).await?;
    }

    let context = AppContext::initialize(config).await?;
    let result = context.ask(question).await;
    print_result(&result, json)?;
    context.shutdown();

    Ok(())
}

/// Interactive question loop over one loaded context
#[inline]
pub async fn chat(config: Config) -> Result<()> {
    let context = AppContext::initialize(config).await?;

    eprintln!(
        "{}",
        style(format!(
            "🗺️  Ask which {} ward a landmark is in. Empty line or 'exit' to quit.",
            context.wards().city
        ))
        .bold()
        .cyan()
    );

    loop {
        let question: String = Input::new()
            .with_prompt("Question")
            .allow_empty(true)
            .interact_text()?;

        let question = question.trim();
        if question.is_empty() || matches!(question, "exit" | "quit") {
            break;
        }

        let result = context.ask(question).await;
        print_result(&result, false)?;
        println!();
    }

    context.shutdown();
    Ok(())
}

/// Nearest ward descriptions to a piece of text
#[inline]
pub async fn search(config: Config, text: &str, limit: usize) -> Result<()> {
    let ollama = OllamaClient::new(&config).context("Failed to initialize Ollama client")?;
    let store = VectorStore::new(&config)
        .await
        .context("Failed to open LanceDB vector store")?;

    let vector = ollama
        .generate_embedding(text)
        .context("Failed to embed search text")?;
    let hits = store
        .search_similar(&vector, limit)
        .await
        .context("Vector search failed")?;

    if hits.is_empty() {
        println!("No ward descriptions indexed yet. Run 'ward-rag ingest' first.");
        return Ok(());
    }

    for (rank, hit) in hits.iter().enumerate() {
        println!(
            "{}. Ward {} (similarity {:.3})",
            rank + 1,
            style(&hit.id).bold(),
            hit.similarity_score
        );
        println!("   {}", hit.text);
    }

    Ok(())
}

/// Ledger, store and consistency report
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    println!("📊 Ward RAG Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🗄️  Ingestion Ledger:");
    match Database::initialize_from_config_dir(config.get_base_dir()).await {
        Ok(database) => {
            match database.latest_completed_run().await {
                Ok(Some(run)) => {
                    let took = run
                        .duration()
                        .map_or_else(String::new, |d| format!(" in {}s", d.num_seconds()));
                    println!(
                        "   ✅ Last successful run {}{} ({} wards, {} stale records removed)",
                        run.id, took, run.ward_count, run.pruned_count
                    );
                }
                Ok(None) => println!("   📭 No successful ingestion yet"),
                Err(e) => println!("   ❌ Failed to read ledger: {}", e),
            }
            match database.recent_runs(5).await {
                Ok(runs) if runs.is_empty() => println!("   📭 No ingestion runs yet"),
                Ok(runs) => {
                    for run in &runs {
                        let finished = run.finished_at.map_or_else(
                            || "-".to_string(),
                            |at| at.format("%Y-%m-%d %H:%M:%S").to_string(),
                        );
                        println!(
                            "   {} {} started {} finished {} ({} wards, {} written, {} skipped)",
                            run.status,
                            run.id,
                            run.started_at.format("%Y-%m-%d %H:%M:%S"),
                            finished,
                            run.ward_count,
                            run.embedded_count,
                            run.skipped_count
                        );
                        if let Some(message) = &run.error_message {
                            println!("      ⚠️  {}", message);
                        }
                    }
                }
                Err(e) => println!("   ❌ Failed to read ledger: {}", e),
            }
            database.close().await;
        }
        Err(e) => println!("   ❌ SQLite: Failed to open - {}", e),
    }

    if IngestLock::is_held(&config.ingest_lock_path()) {
        println!("   🔄 An ingestion run currently holds the lock");
    }

    println!();
    println!("🤖 Ollama:");
    match OllamaClient::new(config).and_then(|client| client.health_check()) {
        Ok(()) => println!(
            "   ✅ Connected ({}:{}), embedding model {}, chat model {}",
            config.ollama.host, config.ollama.port, config.ollama.model, config.llm.model
        ),
        Err(e) => println!("   ❌ Unavailable: {}", e),
    }

    println!();
    println!("🔍 Vector Store:");
    let store = match VectorStore::new(config).await {
        Ok(store) => {
            match store.count().await {
                Ok(count) => println!("   📄 {} records in table {}", count, store.table_name()),
                Err(e) => println!("   ❌ Failed to count records: {}", e),
            }
            if !store.validate_integrity().await {
                println!("   ⚠️  Table failed the integrity check");
            }
            Some(store)
        }
        Err(e) => {
            println!("   ❌ Failed to open: {}", e);
            None
        }
    };

    println!();
    println!("🗺️  Ward Boundaries:");
    match load_processed_wards(config) {
        Ok(wards) => {
            println!(
                "   {} wards for {} (loaded {} from {})",
                wards.len(),
                wards.city,
                wards.loaded_at.format("%Y-%m-%d %H:%M:%S"),
                wards.source
            );

            if let Some(store) = &store {
                match validate_consistency(&wards, store).await {
                    Ok(report) => {
                        if report.is_consistent {
                            println!("   ✅ {}", report.summary());
                        } else {
                            println!(
                                "   ⚠️  {} ({} issues, re-run 'ward-rag ingest')",
                                report.summary(),
                                report.total_issues()
                            );
                        }
                    }
                    Err(e) => println!("   ❌ Failed to check consistency: {}", e),
                }
            }
        }
        Err(e) => {
            warn!("No processed wards: {}", e);
            println!("   📭 Not ingested yet. Run 'ward-rag ingest'.");
        }
    }

    Ok(())
}

/// Print an answer, or the whole result as JSON
#[inline]
pub fn print_result(result: &QueryResult, json: bool) -> Result<()> {
    if json {
        let text =
            serde_json::to_string_pretty(result).context("Failed to serialize query result")?;
        println!("{}", text);
        return Ok(());
    }

    println!("{}", result.answer);
    if let Some(ward) = &result.ward {
        let name = ward.name.as_deref().unwrap_or("unnamed");
        eprintln!("{}", style(format!("ward {} ({})", ward.id, name)).dim());
    }
    if let Some(failure) = &result.failure {
        eprintln!("{}", style(format!("{}: {}", failure.kind, failure.detail)).dim());
    }

    Ok(())
}
