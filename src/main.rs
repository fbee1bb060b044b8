// sitecapture is a website capture engine.
// Copyright (C) 2026 sitecapture contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sitecapture::capability::{Capability, ConvertFormat};
use sitecapture::config::CaptureConfig;
use sitecapture::diagnostics::{ErrorLogger, ReportFormat};
use sitecapture::job::CaptureManager;
use sitecapture::render::{BrowserlessRenderSlot, SlotPool};
use sitecapture::store::RedbStore;

#[derive(Parser)]
#[command(name = "sitecapture", version, about = "Capture a site's pages into a local document store")]
struct Cli {
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Starts a capture job over one or more seed URLs and waits for it to finish.
    Start {
        seeds: Vec<String>,
    },
    /// Prints a previously started job's status.
    Status { job_id: String },
    /// Cancels the active job if its id matches.
    Cancel { job_id: String },
    /// Resumes a previously interrupted job.
    Resume { job_id: String },
    /// Lists captured pages for a job.
    Pages { job_id: String },
    /// Converts one captured page to text, markdown, or json.
    Convert {
        job_id: String,
        page_id: String,
        #[arg(value_enum)]
        format: ConvertFormatArg,
        /// Minimum markdown confidence before falling back to text.
        #[arg(long, default_value = "0.0")]
        confidence_threshold: f64,
        /// Include the page's extracted metadata in json output.
        #[arg(long)]
        include_metadata: bool,
    },
    /// Exports a job's pages as a base64-encoded text/markdown archive.
    Export {
        job_id: String,
        #[arg(value_enum)]
        format: ArchiveFormatArg,
        #[arg(long, default_value = "0.0")]
        confidence_threshold: f64,
    },
    /// Prints a diagnostics report.
    Report {
        #[arg(value_enum, default_value = "text")]
        format: ReportFormatArg,
    },
}

#[derive(Clone, clap::ValueEnum)]
enum ConvertFormatArg {
    Text,
    Markdown,
    Json,
}

impl From<ConvertFormatArg> for ConvertFormat {
    fn from(value: ConvertFormatArg) -> Self {
        match value {
            ConvertFormatArg::Text => ConvertFormat::Text,
            ConvertFormatArg::Markdown => ConvertFormat::Markdown,
            ConvertFormatArg::Json => ConvertFormat::Json,
        }
    }
}

#[derive(Clone, clap::ValueEnum)]
enum ArchiveFormatArg {
    Text,
    Markdown,
}

impl From<ArchiveFormatArg> for ConvertFormat {
    fn from(value: ArchiveFormatArg) -> Self {
        match value {
            ArchiveFormatArg::Text => ConvertFormat::Text,
            ArchiveFormatArg::Markdown => ConvertFormat::Markdown,
        }
    }
}

#[derive(Clone, clap::ValueEnum)]
enum ReportFormatArg {
    Text,
    Json,
}

impl From<ReportFormatArg> for ReportFormat {
    fn from(value: ReportFormatArg) -> Self {
        match value {
            ReportFormatArg::Text => ReportFormat::Text,
            ReportFormatArg::Json => ReportFormat::Json,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sitecapture=info")),
        )
        .without_time()
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => CaptureConfig::from_file(path)?,
        None => CaptureConfig::default(),
    };

    let store = Arc::new(RedbStore::open(&config.store_path).context("failed to open document store")?);
    let logger = Arc::new(ErrorLogger::new(
        config.error_log.max_entries,
        config.error_log.retention_days,
    ));

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.render.wall_clock_cap_secs))
        .build()
        .context("failed to build http client")?;

    let slots: Vec<Arc<dyn sitecapture::render::RenderSlot>> = (0..config.num_workers)
        .map(|_| {
            Arc::new(BrowserlessRenderSlot::new(
                &config.browserless_base_url,
                config.browserless_token.as_deref(),
                Duration::from_secs(config.render.wall_clock_cap_secs),
            )) as Arc<dyn sitecapture::render::RenderSlot>
        })
        .collect();
    let pool = Arc::new(SlotPool::new(slots));

    let manager = Arc::new(CaptureManager::new(
        config.clone(),
        Arc::clone(&store) as Arc<dyn sitecapture::store::Store>,
        Arc::clone(&logger),
        Arc::clone(&pool),
        http_client,
    ));
    let capability = Capability::new(
        Arc::clone(&manager),
        Arc::clone(&store) as Arc<dyn sitecapture::store::Store>,
        Arc::clone(&logger),
    );

    match cli.command {
        Command::Start { seeds } => {
            let handle = manager.start(seeds).await?;
            tracing::info!(job_id = %handle.job_id, "capture started");

            let job_id = handle.job_id.clone();
            let manager_for_signal = Arc::clone(&manager);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("received interrupt, cancelling job");
                    let _ = manager_for_signal.cancel(&job_id).await;
                }
            });

            let mut progress = handle.progress;
            while progress.changed().await.is_some() {
                let snapshot = progress.latest();
                tracing::info!(
                    queued = snapshot.queued,
                    in_flight = snapshot.in_flight,
                    captured = snapshot.pages_captured,
                    failed = snapshot.pages_failed,
                    "{:?}",
                    snapshot.status
                );
            }

            let job = manager.status(&handle.job_id).await?;
            println!("{}", serde_json::to_string_pretty(&job)?);
        }
        Command::Status { job_id } => {
            let job = capability.crawl_status(&job_id).await?;
            println!("{}", serde_json::to_string_pretty(&job)?);
        }
        Command::Cancel { job_id } => {
            capability.crawl_cancel(&job_id).await?;
            println!("cancelled {job_id}");
        }
        Command::Resume { job_id } => {
            let handle = capability.crawl_resume(&job_id).await?;
            println!("resumed {}", handle.job_id);
        }
        Command::Pages { job_id } => {
            let pages = capability.pages_list(&job_id).await?;
            println!("{}", serde_json::to_string_pretty(&pages)?);
        }
        Command::Convert {
            job_id,
            page_id,
            format,
            confidence_threshold,
            include_metadata,
        } => {
            let pages = capability.pages_list(&job_id).await?;
            let page = pages
                .into_iter()
                .find(|p| p.id == page_id)
                .with_context(|| format!("page '{page_id}' not found in job '{job_id}'"))?;
            let result = capability.convert_to_format(&page, format.into(), confidence_threshold, include_metadata)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Export {
            job_id,
            format,
            confidence_threshold,
        } => {
            let archive = capability
                .export_as_archive(&job_id, format.into(), confidence_threshold)
                .await?;
            println!("{}", serde_json::to_string_pretty(&archive)?);
        }
        Command::Report { format } => {
            println!("{}", capability.diagnostics_get_report(format.into()).await?);
        }
    }

    Ok(())
}
