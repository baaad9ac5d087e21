use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

use jd2cv::app_log;
use jd2cv::batch::{BatchOrchestrator, BatchRequest, DirectorySink, TracingProgress};
use jd2cv::board::{read_jd_csv, Board, JdFilters};
use jd2cv::core::ServiceClient;
use jd2cv::local_store::LastViewedArticle;
use jd2cv::reading::ReadingView;
use jd2cv::{start_web_server, ConfigManager, LocalStore};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "jd2cv=info,rocket::server=off";

#[derive(Parser)]
#[command(name = "jd2cv")]
#[command(about = "JD tracking board, batch CV generation and article reading cards")]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Write logs to this file (truncated on start) instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve,
    /// Generate tailored resumes for a selection of JDs
    Batch {
        #[arg(short, long)]
        user_id: String,
        /// JD ids in processing order; omit to take every visible record
        #[arg(long = "jd", value_name = "ID")]
        jd_ids: Vec<String>,
        #[command(flatten)]
        filters: FilterArgs,
        /// PDF configuration scope in the local store
        #[arg(long)]
        scope: Option<String>,
        /// Output directory (defaults to the configured output path)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Import JD records from a CSV file
    ImportJds {
        #[arg(short, long)]
        user_id: String,
        #[arg(short, long)]
        file: PathBuf,
    },
    /// List the JD board
    Jds {
        #[arg(short, long)]
        user_id: String,
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Render an article with its card highlights as HTML
    Highlight {
        #[arg(short, long)]
        article_id: i64,
        #[arg(long, default_value = "en")]
        native_language: String,
        /// Write the markup here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[derive(Args)]
struct FilterArgs {
    /// Stage name, "none" for records without a stage, or "all"
    #[arg(long, default_value = "all")]
    stage: String,
    /// all, yesterday, past3days, past7days or past30days
    #[arg(long, default_value = "all")]
    time: String,
    /// Case-insensitive match on company or comment
    #[arg(long, default_value = "")]
    search: String,
    /// newest, oldest, score-desc or score-asc
    #[arg(long, default_value = "newest")]
    sort: String,
}

impl FilterArgs {
    fn to_filters(&self) -> Result<JdFilters> {
        Ok(JdFilters {
            stage: self.stage.parse()?,
            time: self.time.parse()?,
            search: self.search.clone(),
            sort: self.sort.parse()?,
        })
    }
}

fn init_tracing(json: bool, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true) // Clear file on startup
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            let writer = Mutex::new(file);
            if json {
                registry
                    .with(
                        fmt::layer()
                            .json()
                            .with_writer(writer)
                            .with_current_span(false)
                            .with_span_list(false),
                    )
                    .init();
            } else {
                registry
                    .with(fmt::layer().with_ansi(false).with_writer(writer))
                    .init();
            }
        }
        None if json => registry.with(fmt::layer().json()).init(),
        None => registry.with(fmt::layer()).init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json, cli.log_file.as_deref())?;

    let config = ConfigManager::load()?;
    app_log!(info, "Environment: {}", ConfigManager::environment_name());

    match cli.command {
        Commands::Serve => start_web_server(config).await,
        Commands::Batch {
            user_id,
            jd_ids,
            filters,
            scope,
            out,
        } => run_batch(&config, user_id, jd_ids, &filters, scope.as_deref(), out).await,
        Commands::ImportJds { user_id, file } => import_jds(&config, user_id, &file).await,
        Commands::Jds { user_id, filters } => list_jds(&config, user_id, &filters).await,
        Commands::Highlight {
            article_id,
            native_language,
            out,
        } => highlight(&config, article_id, &native_language, out.as_deref()).await,
    }
}

fn service_client(config: &ConfigManager) -> Result<ServiceClient> {
    ServiceClient::new(
        config.service.api_base_url.clone(),
        config.service.timeout_seconds,
    )
}

async fn run_batch(
    config: &ConfigManager,
    user_id: String,
    jd_ids: Vec<String>,
    filters: &FilterArgs,
    scope: Option<&str>,
    out: Option<PathBuf>,
) -> Result<()> {
    let store = LocalStore::open(&config.environment.local_store_path)?;
    let mut board = Board::new(service_client(config)?, user_id.clone());
    board.load().await?;

    if jd_ids.is_empty() {
        board.filters = filters.to_filters()?;
        board.select_all_visible(&Utc::now());
    } else {
        for id in &jd_ids {
            if board.get(id).is_none() {
                anyhow::bail!("Unknown JD id: {}", id);
            }
            board.selection.toggle(id);
        }
    }

    let out_dir = out.unwrap_or_else(|| config.environment.output_path.clone());
    tokio::fs::create_dir_all(&out_dir)
        .await
        .with_context(|| format!("Failed to create output directory: {}", out_dir.display()))?;

    let request = BatchRequest {
        user_id: &user_id,
        records: board.selected_records(),
        config: store.pdf_config(scope),
        starred: store.starred_ids(),
    };

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            app_log!(warn, "Interrupt received, stopping after the current JD");
            on_ctrl_c.cancel();
        }
    });

    let mut sink = DirectorySink::new(&out_dir);
    let mut progress = TracingProgress;
    let mut orchestrator = BatchOrchestrator::new(service_client(config)?);
    let summary = orchestrator
        .run(request, &mut board.selection, &cancel, &mut sink, &mut progress)
        .await?;

    for item in &summary.items {
        println!("{:<12} {} @ {}", format!("{:?}", item.status), item.title, item.company);
    }
    for path in sink.written() {
        println!("saved {}", path.display());
    }
    println!(
        "{} completed, {} failed, {} pending",
        summary.completed(),
        summary.failed(),
        summary.pending()
    );
    Ok(())
}

async fn import_jds(config: &ConfigManager, user_id: String, file: &Path) -> Result<()> {
    let reader = std::fs::File::open(file)
        .with_context(|| format!("Failed to open CSV file: {}", file.display()))?;
    let requests = read_jd_csv(reader, &user_id)?;
    app_log!(info, "Importing {} JD records from {}", requests.len(), file.display());

    let mut board = Board::new(service_client(config)?, user_id);
    let mut imported = 0;
    for request in requests {
        let title = request.title.clone();
        match board.create(request).await {
            Ok(record) => {
                println!("created {} ({})", record.id, record.title);
                imported += 1;
            }
            Err(e) => eprintln!("failed {}: {:#}", title, e),
        }
    }
    println!("{} records imported", imported);
    Ok(())
}

async fn list_jds(config: &ConfigManager, user_id: String, filters: &FilterArgs) -> Result<()> {
    let mut board = Board::new(service_client(config)?, user_id);
    board.filters = filters.to_filters()?;
    board.load().await?;

    let visible = board.visible(&Utc::now());
    for record in &visible {
        let score = record
            .match_score
            .map(|s| format!("{:.1}", s))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}  {:<4} {:<14} {} @ {}",
            record.created_at.format("%Y-%m-%d"),
            score,
            record.application_stage,
            record.title,
            record.company
        );
    }
    println!("{} of {} records", visible.len(), board.records().len());
    Ok(())
}

async fn highlight(
    config: &ConfigManager,
    article_id: i64,
    native_language: &str,
    out: Option<&Path>,
) -> Result<()> {
    let client = service_client(config)?;
    let article = client.get_article(article_id).await?;
    let view = ReadingView::open(&client, article, native_language).await?;

    let mut store = LocalStore::open(&config.environment.local_store_path)?;
    store.set_last_viewed_article(&LastViewedArticle {
        id: view.article().id,
        title: view.article().title.clone(),
        content: view.article().content.clone(),
    })?;

    let markup = view.markup();
    match out {
        Some(path) => {
            jd2cv::utils::write_bytes_safe(path, markup.as_bytes())?;
            println!(
                "{} cards rendered to {}",
                view.cards().cards().len(),
                path.display()
            );
        }
        None => println!("{}", markup),
    }
    Ok(())
}
