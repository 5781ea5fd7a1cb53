// Pictor - Main Entry Point
//
// This is the command-line client that manages:
// - Generation sessions against the remote service
// - Quota tracking and the usage report
// - Result downloads
//
// All state lives in versioned JSON records under the data directory.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use pictor::api::{GenerationOptions, HttpGenerationClient, JobRequest};
use pictor::clock::SystemClock;
use pictor::config::Config;
use pictor::job::{CancellationToken, JobOutcome};
use pictor::quota::{LimitResolver, ResourceClass, UsageTracker};
use pictor::session::{
    DownloadController, SessionConfig, SessionController, SessionError, TracingSink,
};
use pictor::storage::FileStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

/// Pictor: quota-aware image generation client
#[derive(Parser, Debug)]
#[command(name = "pictor")]
#[command(author = "Pictor Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Quota-aware client for a remote image-generation service", long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Path to a config file (defaults to the XDG config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Command to run
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Submit a generation job and poll it to completion
    Generate {
        /// Prompt text
        prompt: String,

        /// Output resolution (1K, 2K, 4K)
        #[arg(long)]
        resolution: Option<String>,

        /// Aspect ratio (e.g. 3:4)
        #[arg(long)]
        aspect_ratio: Option<String>,

        /// Output format (png, jpeg)
        #[arg(long)]
        format: Option<String>,
    },
    /// Download a result image, charging the download quota
    Download {
        /// Image URL from a finished generation
        url: String,

        /// Destination file (defaults to the URL's file name)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show the usage report
    Usage {
        /// Reset all counters to zero
        #[arg(long)]
        reset: bool,
    },
    /// Show the current subscription plan and its limits
    Plan,
    /// Submit a low-cost probe job to verify API connectivity
    TestApi,
}

/// Everything the subcommands need, wired from configuration
struct App {
    config: Config,
    store: Arc<FileStore>,
    tracker: Arc<UsageTracker>,
    resolver: LimitResolver,
}

impl App {
    fn build(config: Config) -> Result<Self> {
        let data_dir = config.storage.resolved_data_dir();
        let store = Arc::new(
            FileStore::new(&data_dir)
                .with_context(|| format!("Failed to open data dir {:?}", data_dir))?,
        );
        let clock = Arc::new(SystemClock);
        let resolver = LimitResolver::new(clock.clone(), store.clone())
            .with_warning_threshold(config.usage.warning_threshold);
        let tracker = if config.usage.enabled {
            UsageTracker::new(clock, store.clone(), Arc::new(resolver.clone()))
        } else {
            UsageTracker::disabled(clock, store.clone(), Arc::new(resolver.clone()))
        };
        Ok(Self {
            config,
            store,
            tracker: Arc::new(tracker),
            resolver,
        })
    }

    fn api_client(&self) -> Result<HttpGenerationClient> {
        let Some(api_key) = self.config.api.api_key.clone() else {
            bail!("No API key configured. Set PICTOR_API_KEY or api.api_key in the config file.");
        };
        Ok(HttpGenerationClient::new(
            self.config.api.endpoint.clone(),
            api_key,
            self.config.api.model.clone(),
        ))
    }

    fn session_controller(&self) -> Result<SessionController> {
        Ok(SessionController::new(
            Arc::new(self.api_client()?),
            self.tracker.clone(),
            self.store.clone(),
            Arc::new(TracingSink),
            Arc::new(SystemClock),
            SessionConfig {
                poll_interval: self.config.polling.interval(),
                max_polls: self.config.polling.max_polls,
            },
        ))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    // Initialize tracing
    let filter = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(filter.into())
                .from_env_lossy(),
        )
        .init();

    let config = match &args.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    let app = App::build(config)?;

    // Match commands
    match args.command {
        Some(Commands::Generate {
            prompt,
            resolution,
            aspect_ratio,
            format,
        }) => {
            run_generate(&app, prompt, resolution, aspect_ratio, format).await?;
        }
        Some(Commands::Download { url, output }) => {
            run_download(&app, &url, output).await?;
        }
        Some(Commands::Usage { reset }) => {
            if reset {
                app.tracker.reset_all().await;
                println!("All usage counters reset.");
            } else {
                show_usage(&app).await;
            }
        }
        Some(Commands::Plan) => {
            show_plan(&app).await;
        }
        Some(Commands::TestApi) => {
            test_api(&app).await?;
        }
        None => {
            info!("No command specified. Use \"pictor --help\" for usage.");
        }
    }

    Ok(())
}

async fn run_generate(
    app: &App,
    prompt: String,
    resolution: Option<String>,
    aspect_ratio: Option<String>,
    format: Option<String>,
) -> Result<()> {
    let defaults = &app.config.api;
    let request = JobRequest {
        prompt,
        options: GenerationOptions {
            resolution: resolution.unwrap_or_else(|| defaults.default_resolution.clone()),
            aspect_ratio: aspect_ratio.unwrap_or_else(|| defaults.default_aspect_ratio.clone()),
            output_format: format.unwrap_or_else(|| defaults.default_output_format.clone()),
            reference_images: Vec::new(),
        },
    };

    let controller = app.session_controller()?;
    let token = CancellationToken::new();
    let ctrlc_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Stopping generation...");
            ctrlc_token.cancel();
        }
    });

    println!("Submitting generation job...");
    let result = controller
        .generate(
            &request,
            |progress| {
                println!(
                    "  [{}/{}] {}",
                    progress.poll_count, progress.max_polls, progress.state
                );
            },
            &token,
        )
        .await;

    match result {
        Ok(outcome) => match outcome.outcome {
            JobOutcome::Succeeded(urls) => {
                println!("Generation succeeded ({} images):", urls.len());
                for url in urls {
                    println!("  {url}");
                }
                println!("Use \"pictor download <url>\" to save an image.");
                Ok(())
            }
            JobOutcome::Failed(message) => bail!("Generation failed: {message}"),
            JobOutcome::TimedOut { polls } => {
                bail!("Generation timed out after {polls} status checks")
            }
            JobOutcome::Cancelled => {
                // A user stop is not an error
                println!("Generation stopped.");
                Ok(())
            }
        },
        Err(SessionError::QuotaExceeded { class, scope }) => {
            bail!("Your {scope} {class} limit is reached. See \"pictor usage\" or upgrade your plan.")
        }
        Err(e) => Err(e.into()),
    }
}

async fn run_download(app: &App, url: &str, output: Option<PathBuf>) -> Result<()> {
    let dest = output.unwrap_or_else(|| {
        let name = url
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or("generated-image.png");
        PathBuf::from(name)
    });

    let controller = DownloadController::new(app.tracker.clone(), Arc::new(TracingSink));
    let outcome = controller.download(url, &dest).await?;
    println!(
        "Saved {} bytes to {} ({} downloads left today)",
        outcome.bytes_written,
        outcome.path.display(),
        outcome.remaining_today
    );
    Ok(())
}

async fn show_usage(app: &App) {
    let summary = app.tracker.summary().await;

    println!("Usage for {} (month {})", summary.today, summary.current_month);
    for snapshot in [&summary.generation, &summary.download] {
        println!(
            "  {:<11} today {:>5}/{:<5} ({:>3.0}%)   month {:>6}/{:<6} ({:>3.0}%){}",
            snapshot.class.to_string(),
            snapshot.daily.count,
            snapshot.daily.limit,
            snapshot.daily.percentage,
            snapshot.monthly.count,
            snapshot.monthly.limit,
            snapshot.monthly.percentage,
            if snapshot.limit_reached {
                "  [limit reached]"
            } else if snapshot.near_limit {
                "  [near limit]"
            } else {
                ""
            }
        );
    }
    println!("Daily counters reset at {}", summary.next_daily_reset);

    if !summary.history.is_empty() {
        println!("Recent days:");
        for record in summary.history.iter().take(7) {
            println!(
                "  {} {:<11} {}",
                record.window_key, record.class.to_string(), record.count
            );
        }
    }
}

async fn show_plan(app: &App) {
    let subscription = app.resolver.current_subscription().await;
    let limits = subscription.plan.limits();

    let price = subscription.plan.monthly_price_cents();
    if price == 0 {
        println!("Plan: {}", subscription.plan.display_name());
    } else {
        println!(
            "Plan: {} ({}.{:02}/month)",
            subscription.plan.display_name(),
            price / 100,
            price % 100
        );
    }
    match subscription.expires_at {
        Some(expires_at) => println!("Renews or expires at {expires_at}"),
        None => println!("No expiry"),
    }
    println!(
        "Limits: {}/day and {}/month generations, {}/day and {}/month downloads",
        limits.daily_generation_limit,
        limits.monthly_generation_limit,
        limits.daily_download_limit,
        limits.monthly_download_limit
    );
}

async fn test_api(app: &App) -> Result<()> {
    use pictor::api::GenerationApi;

    let client = app.api_client()?;
    let probe = JobRequest {
        prompt: "A simple test image of a red apple on a white background".to_string(),
        options: GenerationOptions {
            resolution: "1K".to_string(),
            aspect_ratio: "1:1".to_string(),
            ..GenerationOptions::default()
        },
    };

    println!("Submitting probe job...");
    let job_id = client.submit(&probe).await?;
    println!("Probe job accepted: {job_id}");

    let status = client.status(&job_id).await?;
    println!("Status query ok, state: {}", status.state);
    println!("API connection looks good.");
    Ok(())
}
