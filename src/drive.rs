//! Drive traversal.
//!
//! [`DriveTraversal`] walks a drive breadth-first from its root using an explicit frontier of
//! folders. It is a pull-based cursor: [`DriveTraversal::next_file`] lists folders only as far
//! as needed to produce the next file, so callers download as they go. Folders are expanded
//! internally and never handed out.
//!
//! Every folder is expanded at most once (tracked by id). A folder whose listing fails after
//! retries is logged and skipped together with its subtree; an authentication failure ends the
//! traversal with an error.

use futures::TryStreamExt;
use std::collections::{HashSet, VecDeque};
use tracing::{debug, error, info, warn};

use crate::error::{AuthError, GraphError};
use crate::graph::GraphClient;
use crate::models::{DriveItem, DriveItemKind};

/// Counters describing how much of the tree was seen.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TraversalStats {
    pub folders_visited: usize,
    pub folders_failed: usize,
    pub files_found: usize,
    pub unrecognised: usize,
}

#[derive(Debug)]
struct PendingFolder {
    /// `None` for the drive root.
    id: Option<String>,
    path: Vec<String>,
}

pub struct DriveTraversal<'a> {
    client: &'a GraphClient,
    drive_id: String,
    page_size: String,
    frontier: VecDeque<PendingFolder>,
    ready: VecDeque<DriveItem>,
    expanded: HashSet<Option<String>>,
    stats: TraversalStats,
}

impl<'a> DriveTraversal<'a> {
    pub fn new(client: &'a GraphClient, drive_id: &str, page_size: u32) -> Self {
        let mut frontier = VecDeque::new();
        frontier.push_back(PendingFolder {
            id: None,
            path: Vec::new(),
        });
        Self {
            client,
            drive_id: drive_id.to_string(),
            page_size: page_size.to_string(),
            frontier,
            ready: VecDeque::new(),
            expanded: HashSet::new(),
            stats: TraversalStats::default(),
        }
    }

    pub fn stats(&self) -> TraversalStats {
        self.stats
    }

    /// Next file in the drive, `Ok(None)` once every reachable folder has been expanded.
    pub async fn next_file(&mut self) -> Result<Option<DriveItem>, AuthError> {
        loop {
            if let Some(item) = self.ready.pop_front() {
                return Ok(Some(item));
            }
            let Some(folder) = self.frontier.pop_front() else {
                info!(
                    folders = self.stats.folders_visited,
                    files = self.stats.files_found,
                    failed_folders = self.stats.folders_failed,
                    "[FILES] Drive traversal complete"
                );
                return Ok(None);
            };
            if !self.expanded.insert(folder.id.clone()) {
                warn!(folder = %folder.path.join("/"), "Folder already expanded, skipping");
                continue;
            }
            self.expand(folder).await?;
        }
    }

    async fn expand(&mut self, folder: PendingFolder) -> Result<(), AuthError> {
        let folder_path = if folder.path.is_empty() {
            "/".to_string()
        } else {
            folder.path.join("/")
        };
        let endpoint = match &folder.id {
            None => format!("drives/{}/root/children", self.drive_id),
            Some(id) => format!("drives/{}/items/{id}/children", self.drive_id),
        };
        debug!(folder = %folder_path, "Listing folder");

        let listing: Result<Vec<_>, GraphError> = self
            .client
            .paginate(&endpoint, &[("$top", self.page_size.as_str())])
            .try_collect()
            .await;

        let children = match listing {
            Ok(children) => children,
            Err(GraphError::Auth(auth)) => return Err(auth),
            Err(e) => {
                error!(folder = %folder_path, error = %e, "[FILES] Folder listing failed; skipping subtree");
                self.stats.folders_failed += 1;
                return Ok(());
            }
        };
        self.stats.folders_visited += 1;

        for value in children {
            let item = match DriveItem::from_value(value, &folder.path) {
                Ok(item) => item,
                Err(reason) => {
                    warn!(folder = %folder_path, %reason, "Skipping malformed drive item");
                    self.stats.unrecognised += 1;
                    continue;
                }
            };
            match item.kind {
                DriveItemKind::Folder => {
                    debug!(folder = %item.display_path(), "Queueing folder");
                    self.frontier.push_back(PendingFolder {
                        path: item.child_path(),
                        id: Some(item.id),
                    });
                }
                DriveItemKind::File => {
                    self.stats.files_found += 1;
                    self.ready.push_back(item);
                }
                DriveItemKind::Other => {
                    warn!(item = %item.display_path(), "Skipping unrecognised drive item");
                    self.stats.unrecognised += 1;
                }
            }
        }
        Ok(())
    }
}
