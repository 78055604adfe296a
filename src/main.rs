use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use slow_appeears::appeears::Appeears;
use slow_appeears::catalog::ProductCatalog;
use slow_appeears::config::{Settings, DEFAULT_CONFIG_FILE};
use slow_appeears::date_chunks::{chunk_range, DateRange};
use slow_appeears::logging::init_logging;
use slow_appeears::orchestrator::Orchestrator;
use slow_appeears::remote::Token;
use slow_appeears::request::HarvestRequest;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about = "Harvest ECOSTRESS rasters from AppEEARS in date chunks")]
struct Cli {
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit, monitor and download every region of a request file
    Run {
        #[arg(short, long)]
        request: PathBuf,
        /// Overrides `output_dir` from the settings
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long, env = "APPEEARS_USERNAME")]
        username: Option<String>,
        #[arg(long, env = "APPEEARS_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// Skips the login when set
        #[arg(long, env = "APPEEARS_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },
    /// Print the chunks a date range is split into
    Chunks {
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
    },
    /// List the products that can be requested
    Catalog,
    /// Write the default settings to the config path
    InitConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = Settings::load(&cli.config)
        .with_context(|| format!("loading settings from {}", cli.config.display()))?;

    match cli.command {
        Command::Run {
            request,
            output,
            username,
            password,
            token,
        } => {
            let request = HarvestRequest::read(&request)
                .with_context(|| format!("reading request {}", request.display()))?;
            let catalog = load_catalog(&settings)?;
            let output_dir = output.unwrap_or_else(|| settings.output_dir.clone());

            let appeears = Appeears::new(settings.api_url.clone());
            let token = match (token, username, password) {
                (Some(token), _, _) => Token::new(token),
                (None, Some(username), Some(password)) => {
                    let token = appeears.login(&username, &password).await?;
                    tracing::info!("authenticated as {username}");
                    token
                }
                _ => bail!("Set APPEEARS_TOKEN or both APPEEARS_USERNAME and APPEEARS_PASSWORD"),
            };

            let report = Orchestrator::new(&appeears, &catalog, &settings)
                .with_output_dir(&output_dir)
                .run(&request, &token)
                .await?;

            let report_path = output_dir.join("run_report.json");
            report.write(&report_path)?;
            tracing::info!(
                jobs_completed = report.jobs_completed(),
                jobs_failed = report.jobs_failed(),
                files_downloaded = report.files_downloaded(),
                files_failed = report.files_failed(),
                "run finished, report at {}",
                report_path.display()
            );
        }
        Command::Chunks { start, end } => {
            let range = DateRange::new(start, end)?;
            for chunk in chunk_range(&range, settings.chunking.months) {
                println!("{}", chunk.period_label());
            }
        }
        Command::Catalog => {
            let catalog = load_catalog(&settings)?;
            for entry in catalog.entries() {
                println!("{} [{}]", entry.key, entry.product);
                for layer in &entry.layers {
                    println!("    {layer}");
                }
            }
        }
        Command::InitConfig => {
            if cli.config.exists() {
                bail!("{} already exists", cli.config.display());
            }
            Settings::default().write(&cli.config)?;
            println!("wrote {}", cli.config.display());
        }
    }

    Ok(())
}

fn load_catalog(settings: &Settings) -> Result<ProductCatalog> {
    match &settings.catalog_path {
        Some(path) => ProductCatalog::read(path)
            .with_context(|| format!("reading catalog {}", path.display())),
        None => Ok(ProductCatalog::ecostress()),
    }
}
