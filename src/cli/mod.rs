//! Command-line interface for loreweave.
//!
//! Provides commands for ingesting documents into a universe, checking
//! run status, listing mentions, and working the review queue.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use uuid::Uuid;

use crate::config;
use crate::core::{IngestOrchestrator, ReviewWorkflow};
use crate::domain::{AmbiguityStatus, ResolutionStatus};
use crate::ingest::{ingest_hash, normalize_text, segment_text};
use crate::store::{CanonStore, SqliteStore};

/// loreweave - canon knowledge-graph pipeline for fiction
#[derive(Parser, Debug)]
#[command(name = "loreweave")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest a text file into a universe
    Ingest {
        /// Path to the document text
        file: PathBuf,

        /// Universe to ingest into (a new one is minted if omitted)
        #[arg(short, long)]
        universe: Option<Uuid>,
    },

    /// Check the status of an ingestion run
    Status {
        /// Run ID (UUID)
        run_id: Uuid,
    },

    /// List mentions in a universe
    Mentions {
        /// Universe to list
        #[arg(short, long)]
        universe: Uuid,

        /// Only mentions with this resolution status
        #[arg(short, long, value_enum, default_value = "candidate")]
        status: StatusFilter,
    },

    /// Work the review queue for ambiguous mentions
    Review {
        #[command(subcommand)]
        command: ReviewCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum ReviewCommands {
    /// List open ambiguity items
    List {
        /// Universe to list
        #[arg(short, long)]
        universe: Uuid,
    },

    /// Resolve an item by choosing one of its candidates
    Resolve {
        /// Ambiguity item ID
        item: Uuid,

        /// Chosen entity ID
        entity: Uuid,

        /// Reviewer notes
        #[arg(short, long)]
        notes: Option<String>,
    },

    /// Dismiss an item, leaving the mention escalated
    Dismiss {
        /// Ambiguity item ID
        item: Uuid,

        /// Reviewer notes
        #[arg(short, long)]
        notes: Option<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum StatusFilter {
    Unresolved,
    Candidate,
    Resolved,
}

impl From<StatusFilter> for ResolutionStatus {
    fn from(filter: StatusFilter) -> Self {
        match filter {
            StatusFilter::Unresolved => ResolutionStatus::Unresolved,
            StatusFilter::Candidate => ResolutionStatus::Candidate,
            StatusFilter::Resolved => ResolutionStatus::Resolved,
        }
    }
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let store = open_store()?;

        match self.command {
            Commands::Ingest { file, universe } => ingest(store, file, universe).await,
            Commands::Status { run_id } => status(store, run_id).await,
            Commands::Mentions { universe, status } => {
                mentions(store, universe, status.into()).await
            }
            Commands::Review { command } => review(store, command).await,
        }
    }
}

fn open_store() -> Result<Arc<dyn CanonStore>> {
    let path = config::db_path()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create data directory: {}", parent.display()))?;
    }
    let store = SqliteStore::open(&path)
        .with_context(|| format!("Failed to open canon database: {}", path.display()))?;
    Ok(Arc::new(store))
}

async fn ingest(store: Arc<dyn CanonStore>, file: PathBuf, universe: Option<Uuid>) -> Result<()> {
    let raw = fs::read_to_string(&file)
        .with_context(|| format!("Failed to read document: {}", file.display()))?;

    let universe_id = universe.unwrap_or_else(Uuid::new_v4);
    let document_id = Uuid::new_v4();

    let normalized = normalize_text(&raw);
    let segments = segment_text(Uuid::new_v4(), &normalized);
    let hash = ingest_hash(&raw, &normalized);

    let orchestrator = IngestOrchestrator::new(store.clone());
    let run_id = orchestrator
        .ingest(universe_id, document_id, &segments)
        .await?;

    let run = store
        .get_run(run_id)
        .await?
        .context("Run record missing after ingestion")?;

    println!("Universe:  {universe_id}");
    println!("Document:  {document_id} (ingest hash {})", &hash[..16]);
    println!("Run:       {run_id}");
    println!("Status:    {}", run.status.as_str());
    if let Some(error) = &run.error {
        println!("Error:     {error}");
    }
    print_progress(&run.progress);
    Ok(())
}

async fn status(store: Arc<dyn CanonStore>, run_id: Uuid) -> Result<()> {
    let run = store
        .get_run(run_id)
        .await?
        .with_context(|| format!("Run {run_id} not found"))?;

    println!("Run:       {}", run.id);
    println!("Universe:  {}", run.universe_id);
    println!("Document:  {}", run.document_id);
    println!("Status:    {}", run.status.as_str());
    println!("Started:   {}", run.created_at.to_rfc3339());
    if let Some(completed) = run.completed_at {
        println!("Completed: {}", completed.to_rfc3339());
    }
    if let Some(error) = &run.error {
        println!("Error:     {error}");
    }
    print_progress(&run.progress);
    Ok(())
}

async fn mentions(
    store: Arc<dyn CanonStore>,
    universe_id: Uuid,
    status: ResolutionStatus,
) -> Result<()> {
    let mentions = store.mentions_by_status(universe_id, status).await?;
    if mentions.is_empty() {
        println!("No {} mentions.", status.as_str());
        return Ok(());
    }

    for mention in mentions {
        let entity = match mention.entity_id {
            Some(id) => format!(" -> {id}"),
            None => String::new(),
        };
        println!(
            "{}  {:<24} [{}..{})  conf {:.2}{}",
            mention.id, mention.surface_form, mention.span_start, mention.span_end,
            mention.confidence, entity,
        );
    }
    Ok(())
}

async fn review(store: Arc<dyn CanonStore>, command: ReviewCommands) -> Result<()> {
    let workflow = ReviewWorkflow::new(store.clone());

    match command {
        ReviewCommands::List { universe } => {
            let items = store
                .ambiguities_by_status(universe, AmbiguityStatus::Open)
                .await?;
            if items.is_empty() {
                println!("Review queue is empty.");
                return Ok(());
            }
            for item in items {
                println!("{}  \"{}\"", item.id, item.surface_form);
                for candidate in &item.candidates {
                    println!(
                        "    {}  {:<24} {}  score {:.2}",
                        candidate.entity_id,
                        candidate.canonical_name,
                        candidate.entity_type.as_str(),
                        candidate.score,
                    );
                }
            }
        }
        ReviewCommands::Resolve { item, entity, notes } => {
            let resolved = workflow.resolve(item, entity, notes).await?;
            println!("Resolved {} -> entity {}", resolved.id, entity);
        }
        ReviewCommands::Dismiss { item, notes } => {
            let dismissed = workflow.dismiss(item, notes).await?;
            println!("Dismissed {}", dismissed.id);
        }
    }
    Ok(())
}

fn print_progress(progress: &crate::domain::ProgressSnapshot) {
    println!("Segments:  {}", progress.segments);
    if let Some(mentions) = progress.mentions {
        println!("Mentions:  {mentions}");
    }
    if let (Some(resolved), Some(candidates), Some(unresolved)) =
        (progress.resolved, progress.candidates, progress.unresolved)
    {
        println!("Resolved:  {resolved}  candidates: {candidates}  unresolved: {unresolved}");
    }
}
