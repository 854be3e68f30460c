//! High-level pipeline: pulls a SharePoint site's pages and/or drive files into the output directory.
//!
//! The [`Orchestrator`] moves through `Idle → Authenticating → Running(mode) → Done | Failed`:
//!   - Authenticating: acquires the first token and resolves the site, plus its document drive
//!     when files are requested; failure here is fatal and nothing is written.
//!   - Running: scrapes pages, then files, depending on [`Mode`]. Per-item failures are
//!     counted and never stop the run.
//!   - Failed: reached only on [`RunError`] (bad credentials, unresolvable site or drive).
//!
//! # Major Types
//! - [`Orchestrator`]: owns the Graph client and the text extractor for one run
//! - [`RunSummary`]: per-operation success / failure counts reported at `Done`
//!
//! # Navigation
//! - Main entrypoint: [`synchronise`]

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::auth::TokenProvider;
use crate::config::{Config, Settings};
use crate::contract::{HttpTransport, TextExtractor};
use crate::download::{DownloadOutcome, FileDownloader};
use crate::drive::{DriveTraversal, TraversalStats};
use crate::error::{GraphError, ItemError, RunError};
use crate::graph::GraphClient;
use crate::html_text::HtmlTextExtractor;
use crate::http::ReqwestTransport;
use crate::models::ResourceRef;
use crate::pages::PageScraper;

/// Which parts of the site a run pulls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Pages,
    Files,
    All,
}

impl Mode {
    pub fn includes_pages(self) -> bool {
        matches!(self, Mode::Pages | Mode::All)
    }

    pub fn includes_files(self) -> bool {
        matches!(self, Mode::Files | Mode::All)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Authenticating,
    Running(Mode),
    Done,
    Failed,
}

/// Tally for one operation (pages or files).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OperationSummary {
    pub succeeded: usize,
    pub failed: usize,
    /// Items deliberately not fetched (unsupported extension, unrecognised drive item).
    pub skipped: usize,
    /// The top-level listing itself failed, so the counts cover only what was reached.
    pub listing_failed: bool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FilesSummary {
    pub files: OperationSummary,
    pub traversal: TraversalStats,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub pages: Option<OperationSummary>,
    pub files: Option<FilesSummary>,
}

impl RunSummary {
    pub fn total_failed(&self) -> usize {
        let pages = self.pages.map(|p| p.failed).unwrap_or(0);
        let files = self
            .files
            .map(|f| f.files.failed + f.traversal.folders_failed)
            .unwrap_or(0);
        pages + files
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(p) = &self.pages {
            writeln!(
                f,
                "pages: {} succeeded, {} failed{}",
                p.succeeded,
                p.failed,
                if p.listing_failed { " (listing incomplete)" } else { "" }
            )?;
        }
        if let Some(files) = &self.files {
            writeln!(
                f,
                "files: {} succeeded, {} failed, {} skipped; folders: {} visited, {} failed",
                files.files.succeeded,
                files.files.failed,
                files.files.skipped,
                files.traversal.folders_visited,
                files.traversal.folders_failed
            )?;
        }
        Ok(())
    }
}

pub struct Orchestrator {
    client: GraphClient,
    extractor: Box<dyn TextExtractor>,
    site_id: String,
    settings: Settings,
    state: RunState,
}

impl Orchestrator {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        extractor: Box<dyn TextExtractor>,
        config: &Config,
    ) -> Self {
        let tokens = Arc::new(TokenProvider::new(
            transport.clone(),
            &config.credentials,
            &config.settings,
        ));
        Self {
            client: GraphClient::new(transport, tokens, &config.settings),
            extractor,
            site_id: config.credentials.site_id.clone(),
            settings: config.settings.clone(),
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub async fn run(&mut self, mode: Mode) -> Result<RunSummary, RunError> {
        info!(?mode, site_id = %self.site_id, "[SYNC] Starting run");
        self.state = RunState::Authenticating;

        match self.execute(mode).await {
            Ok(summary) => {
                self.state = RunState::Done;
                info!(
                    failed = summary.total_failed(),
                    "[SYNC] Run complete\n{summary}"
                );
                Ok(summary)
            }
            Err(e) => {
                self.state = RunState::Failed;
                error!(error = %e, "[SYNC][ERROR] Run failed");
                Err(e)
            }
        }
    }

    async fn execute(&mut self, mode: Mode) -> Result<RunSummary, RunError> {
        self.client.tokens().get_token().await?;
        self.resolve(&format!("sites/{}", self.site_id), "site").await?;
        let drive = if mode.includes_files() {
            Some(
                self.resolve(&format!("sites/{}/drive", self.site_id), "document drive")
                    .await?,
            )
        } else {
            None
        };
        self.state = RunState::Running(mode);

        let mut summary = RunSummary::default();
        if mode.includes_pages() {
            let scraper = PageScraper::new(
                &self.client,
                self.extractor.as_ref(),
                &self.settings.pages_dir(),
            );
            summary.pages = Some(scraper.scrape_pages(&self.site_id).await?);
        }
        if let Some(drive) = drive {
            summary.files = Some(self.scrape_files(&drive.id).await?);
        }
        Ok(summary)
    }

    async fn resolve(&self, path: &str, what: &str) -> Result<ResourceRef, RunError> {
        let value = self.client.get_json(path, &[]).await.map_err(|e| match e {
            GraphError::Auth(auth) => RunError::Auth(auth),
            other => RunError::Unresolved {
                what: format!("{what} ({path})"),
                source: other,
            },
        })?;
        let resource: ResourceRef =
            serde_json::from_value(value).map_err(|e| RunError::Unresolved {
                what: format!("{what} ({path})"),
                source: GraphError::Decode(e.to_string()),
            })?;
        info!(
            what,
            id = %resource.id,
            name = resource.display_name.as_deref().or(resource.name.as_deref()).unwrap_or(""),
            "[SYNC] Resolved"
        );
        Ok(resource)
    }

    async fn scrape_files(&self, drive_id: &str) -> Result<FilesSummary, RunError> {
        let base_dir = self.settings.files_dir();
        info!(drive_id, out_dir = %base_dir.display(), "[FILES] Walking document drive");

        let downloader = FileDownloader::new(&self.client, drive_id, &base_dir)
            .skip_existing(self.settings.skip_existing);
        let mut traversal = DriveTraversal::new(&self.client, drive_id, self.settings.page_size);
        let mut files = OperationSummary::default();

        while let Some(item) = traversal.next_file().await? {
            match downloader.download(&item).await {
                Ok(DownloadOutcome::Written { .. }) | Ok(DownloadOutcome::Unchanged { .. }) => {
                    files.succeeded += 1
                }
                Ok(DownloadOutcome::Unsupported) => files.skipped += 1,
                Err(ItemError::Graph(GraphError::Auth(auth))) => return Err(auth.into()),
                Err(e) => {
                    error!(item = %item.display_path(), error = %e, "[FILES] Download failed");
                    files.failed += 1;
                }
            }
        }

        let traversal = traversal.stats();
        files.skipped += traversal.unrecognised;
        files.listing_failed = traversal.folders_visited == 0 && traversal.folders_failed > 0;
        info!(
            succeeded = files.succeeded,
            failed = files.failed,
            skipped = files.skipped,
            "[FILES] File pass finished"
        );
        Ok(FilesSummary { files, traversal })
    }
}

/// Runs `mode` against the live Graph API with the production transport and extractor.
pub async fn synchronise(config: &Config, mode: Mode) -> Result<RunSummary, RunError> {
    let transport = ReqwestTransport::new(Duration::from_secs(config.settings.http_timeout_secs))?;
    let mut orchestrator = Orchestrator::new(
        Arc::new(transport),
        Box::new(HtmlTextExtractor::new()),
        config,
    );
    orchestrator.run(mode).await
}
