//! Scribe command line
//!
//! Runs the orchestrator over local text files. Documents are indexed into
//! in-memory stores; the model is reached through the configured
//! OpenAI-compatible endpoint with the key from `SCRIBE_API_KEY`.

use anyhow::{bail, Context};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use scribe_core::{
    DocumentStore, EditCoordinator, HttpLlmClient, HttpLlmConfig, InMemoryDocumentStore,
    LlmClient, OrchestratorBuilder, ScribeConfig, SessionManager,
};
use scribe_retrieval::{
    EvidenceStore, HttpWebSearchClient, HttpWebSearchConfig, InMemoryEvidenceStore,
};
use scribe_types::{
    ConversationHistory, Document, DocumentId, EditPlacement, QueryRequest, DEFAULT_MAX_TOKENS,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const API_KEY_VAR: &str = "SCRIBE_API_KEY";
const SEARCH_KEY_VAR: &str = "SCRIBE_SEARCH_API_KEY";
const LOCAL_USER: &str = "local";

fn cli() -> Command {
    let config_arg = Arg::new("config")
        .long("config")
        .short('c')
        .value_parser(value_parser!(PathBuf))
        .help("TOML configuration file");

    Command::new("scribe")
        .version(scribe_core::VERSION)
        .about("Retrieval-augmented writing assistant")
        .subcommand_required(true)
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("ask")
                .about("Run one request through the pipeline")
                .arg(Arg::new("message").required(true).help("The request"))
                .arg(config_arg.clone())
                .arg(
                    Arg::new("document")
                        .long("document")
                        .short('d')
                        .value_parser(value_parser!(PathBuf))
                        .help("Current document (text or markdown file)"),
                )
                .arg(
                    Arg::new("link")
                        .long("link")
                        .short('l')
                        .action(ArgAction::Append)
                        .value_parser(value_parser!(PathBuf))
                        .help("Linked document; at most five are kept"),
                )
                .arg(
                    Arg::new("selection")
                        .long("selection")
                        .short('s')
                        .help("Selected text in the current document"),
                )
                .arg(
                    Arg::new("web")
                        .long("web")
                        .action(ArgAction::SetTrue)
                        .help("Allow web search"),
                )
                .arg(
                    Arg::new("max-tokens")
                        .long("max-tokens")
                        .default_value("2000")
                        .value_parser(value_parser!(usize))
                        .help("Generation token budget"),
                )
                .arg(
                    Arg::new("apply")
                        .long("apply")
                        .action(ArgAction::SetTrue)
                        .help("Write a live edit back into the current document file"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the full response as JSON"),
                ),
        )
        .subcommand(
            Command::new("route")
                .about("Classify a request and print the router decision")
                .arg(Arg::new("message").required(true).help("The request"))
                .arg(config_arg.clone())
                .arg(
                    Arg::new("selection")
                        .long("selection")
                        .short('s')
                        .help("Selected text"),
                ),
        )
        .subcommand(
            Command::new("check-config")
                .about("Validate a configuration file and print the effective settings")
                .arg(config_arg),
        )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    match matches.subcommand() {
        Some(("ask", args)) => ask(args).await,
        Some(("route", args)) => route(args).await,
        Some(("check-config", args)) => check_config(args),
        _ => bail!("unknown command"),
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "scribe_core=info,scribe_retrieval=info,warn".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn load_config(args: &ArgMatches) -> anyhow::Result<ScribeConfig> {
    let mut config = match args.get_one::<PathBuf>("config") {
        Some(path) => ScribeConfig::load(path)?,
        None => ScribeConfig::new(),
    };
    config.validate()?;
    Ok(config)
}

fn llm_client(config: &ScribeConfig) -> anyhow::Result<Arc<dyn LlmClient>> {
    let mut http = HttpLlmConfig::new(config.llm.endpoint.clone());
    match std::env::var(API_KEY_VAR) {
        Ok(key) => http = http.with_api_key(key),
        Err(_) => tracing::warn!("{API_KEY_VAR} is not set; calling the model without a key"),
    }
    Ok(Arc::new(HttpLlmClient::new(http)?))
}

/// Index a file into both stores; the id is the file stem
fn load_document(
    path: &Path,
    evidence: &InMemoryEvidenceStore,
    documents: &InMemoryDocumentStore,
) -> anyhow::Result<DocumentId> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document");
    let id = DocumentId::new(stem);
    let title = text
        .lines()
        .find_map(|line| line.strip_prefix("# "))
        .map_or_else(|| stem.to_string(), |t| t.trim().to_string());

    let chunks = evidence.index_document(&id, &text);
    tracing::debug!(document = %id, chunks, "loaded document");
    documents.insert(Document::new(id.clone(), LOCAL_USER, title, text));
    Ok(id)
}

async fn ask(args: &ArgMatches) -> anyhow::Result<()> {
    let config = load_config(args)?;
    let llm = llm_client(&config)?;
    let evidence = Arc::new(InMemoryEvidenceStore::new());
    let documents = Arc::new(InMemoryDocumentStore::new());

    let current = args
        .get_one::<PathBuf>("document")
        .map(|path| load_document(path, &evidence, &documents).map(|id| (id, path.clone())))
        .transpose()?;
    let mut linked = Vec::new();
    for path in args.get_many::<PathBuf>("link").into_iter().flatten() {
        linked.push(load_document(path, &evidence, &documents)?);
    }

    let web_endpoint = config.web.endpoint.clone();
    let sessions = SessionManager::new(config.history.max_turns);
    let document_store: Arc<dyn DocumentStore> = documents.clone();
    let evidence_store: Arc<dyn EvidenceStore> = evidence;
    let mut builder = OrchestratorBuilder::new(config, llm, evidence_store, document_store);
    if let Some(endpoint) = web_endpoint {
        let mut search = HttpWebSearchConfig::new(endpoint);
        if let Ok(key) = std::env::var(SEARCH_KEY_VAR) {
            search = search.with_api_key(key);
        }
        builder = builder.with_web_search(Arc::new(HttpWebSearchClient::new(search)));
    }
    let orchestrator = builder.build()?;

    let mut request = QueryRequest::new(
        args.get_one::<String>("message")
            .cloned()
            .unwrap_or_default(),
    )
    .with_web_search(args.get_flag("web"))
    .with_max_tokens(
        args.get_one::<usize>("max-tokens")
            .copied()
            .unwrap_or(DEFAULT_MAX_TOKENS),
    )
    .with_linked_documents(linked);
    if let Some((id, _)) = &current {
        request = request.with_document(id.clone());
    }
    if let Some(selection) = args.get_one::<String>("selection") {
        request = request.with_selection(selection.clone());
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let (session_id, session) = sessions.create(LOCAL_USER);
    let mut session = session.lock().await;
    tracing::debug!(session_id = %session_id, "session started");
    let response = match orchestrator.process_query(&mut session, request, &cancel).await {
        Ok(response) => response,
        Err(err) => {
            tracing::error!(error = %err, category = err.category(), "request failed");
            bail!("{}", err.user_message());
        }
    };

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        println!("{}", response.content);
        if let Some(content) = &response.live_edit_content {
            println!("\n--- live edit ---\n{content}");
        }
        if !response.citations.is_empty() {
            println!("\nSources:");
            for (n, title) in response.citations.iter().enumerate() {
                println!("  [{}] {title}", n + 1);
            }
        }
        for warning in &response.verification.warnings {
            println!("warning: {warning}");
        }
    }

    if args.get_flag("apply") {
        let (Some((id, path)), Some(content), Some(placement)) = (
            &current,
            &response.live_edit_content,
            &response.live_edit_placement,
        ) else {
            tracing::info!("nothing to apply");
            return Ok(());
        };
        apply_live_edit(orchestrator.edits(), id, path, content, placement.clone()).await?;
    }
    Ok(())
}

/// Merge a live edit into the loaded document and write it back to its file
async fn apply_live_edit(
    edits: &EditCoordinator,
    id: &DocumentId,
    path: &Path,
    content: &str,
    placement: EditPlacement,
) -> anyhow::Result<()> {
    edits.begin(id)?;
    let proposal = edits.propose(id, LOCAL_USER, content, placement).await?;
    let updated = edits.apply(id, LOCAL_USER, &proposal.id).await?;
    std::fs::write(path, updated.plain_text)
        .with_context(|| format!("writing {}", path.display()))?;
    tracing::info!(document = %id, path = %path.display(), "live edit applied");
    Ok(())
}

async fn route(args: &ArgMatches) -> anyhow::Result<()> {
    let config = load_config(args)?;
    let llm = llm_client(&config)?;
    let rules = Arc::new(config.rule_table()?);
    let router = scribe_core::TaskRouter::new(llm, rules, &config.llm);

    let message = args
        .get_one::<String>("message")
        .map(String::as_str)
        .unwrap_or_default();
    let selection = args.get_one::<String>("selection").map(String::as_str);
    let decision = router
        .route(message, selection, &ConversationHistory::default())
        .await;

    println!("{}", serde_json::to_string_pretty(&decision)?);
    if decision.is_fallback() {
        eprintln!("(fallback decision)");
    }
    Ok(())
}

fn check_config(args: &ArgMatches) -> anyhow::Result<()> {
    let config = load_config(args)?;
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
