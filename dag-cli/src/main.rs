use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::{
    fmt::{self, time::ChronoUtc},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};
use zanzibar_dag::{
    config::{self, ObservabilityConfig},
    repository, CollectCondition, Compare, RelationEngine, RelationTuple, SearchCondition, Vertex,
};

/// Zanzibar DAG relation store
#[derive(Parser, Debug)]
#[command(name = "zanzibar-dag")]
#[command(about = "Manage and query an acyclic relation tuple graph", version)]
#[command(
    after_help = "The default `memory` store lives only as long as one invocation, so tuples \
                  written by one command are gone for the next. Set `store.backend: postgres` \
                  to keep them."
)]
struct Cli {
    /// Configuration file path. Without one the process-local memory store is used.
    #[arg(short, long, default_value = "zanzibar-dag.yaml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ping the configured store. The memory store is always healthy and always
    /// starts empty.
    Health,

    /// Create a tuple, e.g. `doc:1#viewer@group:eng#member`
    Create {
        tuple: RelationTuple,

        /// Succeed if the tuple is already stored
        #[arg(long)]
        exist_ok: bool,
    },

    /// Delete a tuple
    Delete { tuple: RelationTuple },

    /// List tuples; without filters this is a paginated full scan
    Get {
        #[command(flatten)]
        pattern: PatternArgs,

        /// Token returned by the previous page
        #[arg(long)]
        page_token: Option<String>,
    },

    /// List every namespace in use
    Namespaces,

    /// Whether the subject reaches the object
    Check {
        subject: Vertex,
        object: Vertex,

        #[command(flatten)]
        search: SearchArgs,
    },

    /// Justification paths from the subject to the object
    Path {
        subject: Vertex,
        object: Vertex,

        /// Enumerate every path instead of one shortest path
        #[arg(long)]
        all: bool,

        #[command(flatten)]
        search: SearchArgs,
    },

    /// Tuples reachable from the subject
    Objects {
        subject: Vertex,

        #[arg(long, default_value_t = 5)]
        max_depth: usize,

        #[command(flatten)]
        search: SearchArgs,

        #[command(flatten)]
        collect: CollectArgs,
    },

    /// Tuples leading into the object
    Subjects {
        object: Vertex,

        #[arg(long, default_value_t = 5)]
        max_depth: usize,

        #[command(flatten)]
        search: SearchArgs,

        #[command(flatten)]
        collect: CollectArgs,
    },

    /// Delete every stored tuple
    Clear,
}

#[derive(Args, Debug)]
struct PatternArgs {
    #[arg(long)]
    object_namespace: Option<String>,
    #[arg(long)]
    object_name: Option<String>,
    #[arg(long)]
    relation: Option<String>,
    #[arg(long)]
    subject_namespace: Option<String>,
    #[arg(long)]
    subject_name: Option<String>,
    #[arg(long)]
    subject_relation: Option<String>,
}

impl PatternArgs {
    fn into_pattern(self) -> RelationTuple {
        RelationTuple {
            object_namespace: self.object_namespace.unwrap_or_default(),
            object_name: self.object_name.unwrap_or_default(),
            relation: self.relation.unwrap_or_default(),
            subject_namespace: self.subject_namespace.unwrap_or_default(),
            subject_name: self.subject_name.unwrap_or_default(),
            subject_relation: self.subject_relation.unwrap_or_default(),
        }
    }
}

/// Restrict traversal to matching vertices (repeatable)
#[derive(Args, Debug)]
struct SearchArgs {
    #[arg(long = "search-namespace")]
    namespaces: Vec<String>,
    #[arg(long = "search-name")]
    names: Vec<String>,
    #[arg(long = "search-relation")]
    relations: Vec<String>,
}

impl SearchArgs {
    fn into_condition(self) -> SearchCondition {
        SearchCondition::new(compare(self.namespaces, self.names, self.relations))
    }
}

/// Only return tuples whose far vertex matches (repeatable)
#[derive(Args, Debug)]
struct CollectArgs {
    #[arg(long = "collect-namespace")]
    namespaces: Vec<String>,
    #[arg(long = "collect-name")]
    names: Vec<String>,
    #[arg(long = "collect-relation")]
    relations: Vec<String>,
}

impl CollectArgs {
    fn into_condition(self) -> CollectCondition {
        CollectCondition::new(compare(self.namespaces, self.names, self.relations))
    }
}

fn compare(namespaces: Vec<String>, names: Vec<String>, relations: Vec<String>) -> Compare {
    Compare {
        namespaces: namespaces.into_iter().collect(),
        names: names.into_iter().collect(),
        relations: relations.into_iter().collect(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = config::load(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    init_tracing(&config.observability, cli.verbose)?;
    debug!(?config, "Configuration loaded");

    let store = repository::connect(&config.store).await?;
    let engine = RelationEngine::new(store, &config.pagination)?;

    let result = run(&engine, cli.command).await;
    engine.shutdown().await;

    let output = result?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn run(engine: &RelationEngine, command: Command) -> Result<serde_json::Value> {
    let output = match command {
        Command::Health => {
            engine.healthy().await?;
            json!({ "status": "ok" })
        }
        Command::Create { tuple, exist_ok } => {
            engine.create(&tuple, exist_ok).await?;
            info!("Created {}", tuple);
            json!({ "created": tuple })
        }
        Command::Delete { tuple } => {
            engine.delete(&tuple).await?;
            json!({ "deleted": tuple })
        }
        Command::Get { pattern, page_token } => {
            let (tuples, next) = engine
                .get(&pattern.into_pattern(), page_token.as_deref())
                .await?;
            json!({ "tuples": tuples, "next_page_token": next })
        }
        Command::Namespaces => json!(engine.get_all_namespaces().await?),
        Command::Check {
            subject,
            object,
            search,
        } => {
            let allowed = engine
                .check(&subject, &object, &search.into_condition())
                .await?;
            json!({ "allowed": allowed })
        }
        Command::Path {
            subject,
            object,
            all,
            search,
        } => {
            let search = search.into_condition();
            if all {
                json!({ "paths": engine.get_all_paths(&subject, &object, &search).await? })
            } else {
                json!({ "path": engine.get_shortest_path(&subject, &object, &search).await? })
            }
        }
        Command::Objects {
            subject,
            max_depth,
            search,
            collect,
        } => json!(
            engine
                .get_all_object_relations(
                    &subject,
                    &search.into_condition(),
                    &collect.into_condition(),
                    max_depth,
                )
                .await?
        ),
        Command::Subjects {
            object,
            max_depth,
            search,
            collect,
        } => json!(
            engine
                .get_all_subject_relations(
                    &object,
                    &search.into_condition(),
                    &collect.into_condition(),
                    max_depth,
                )
                .await?
        ),
        Command::Clear => {
            engine.clear_all_relations().await?;
            json!({ "cleared": true })
        }
    };
    Ok(output)
}

fn init_tracing(observability: &ObservabilityConfig, verbose: bool) -> Result<()> {
    let level = if verbose {
        "debug"
    } else {
        observability.log_level.as_str()
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("zanzibar_dag={},dag_cli={},sqlx=warn", level, level).into());

    // Logs go to stderr so stdout stays machine readable
    if observability.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(false)
                    .with_writer(std::io::stderr)
                    .json(),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    }

    Ok(())
}
