//! Site page scraping: list the site's pages, pull each page's canvas, keep the text.
//!
//! Each page is written to `<pages_dir>/<page name>.txt`. A page that cannot be fetched,
//! extracted or written is logged and counted; the pass moves on to the next page. Only an
//! authentication failure stops the pass.

use futures::StreamExt;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::contract::TextExtractor;
use crate::error::{AuthError, GraphError, ItemError};
use crate::graph::GraphClient;
use crate::models::SitePageRef;
use crate::sink::{sanitize_segment, write_atomic};
use crate::synchronise::OperationSummary;

pub struct PageScraper<'a> {
    client: &'a GraphClient,
    extractor: &'a dyn TextExtractor,
    out_dir: PathBuf,
}

impl<'a> PageScraper<'a> {
    pub fn new(client: &'a GraphClient, extractor: &'a dyn TextExtractor, out_dir: &Path) -> Self {
        Self {
            client,
            extractor,
            out_dir: out_dir.to_path_buf(),
        }
    }

    /// Scrapes every page of `site_id`. Returns the per-page tally, or the auth failure that
    /// cut the pass short.
    pub async fn scrape_pages(&self, site_id: &str) -> Result<OperationSummary, AuthError> {
        info!(site_id, out_dir = %self.out_dir.display(), "[PAGES] Listing site pages");
        let mut summary = OperationSummary::default();
        let mut listing = self.client.paginate(&format!("sites/{site_id}/pages"), &[]);
        let mut written = HashSet::new();

        while let Some(entry) = listing.next().await {
            let page = match entry {
                Ok(value) => match SitePageRef::from_value(value) {
                    Ok(page) => page,
                    Err(reason) => {
                        warn!(%reason, "[PAGES] Skipping malformed page entry");
                        summary.failed += 1;
                        continue;
                    }
                },
                Err(GraphError::Auth(auth)) => return Err(auth),
                Err(e) => {
                    error!(error = %e, "[PAGES] Page listing failed; remaining pages are not reachable");
                    summary.listing_failed = true;
                    break;
                }
            };

            let stem = unique_stem(&page, &written);
            match self.scrape_page(site_id, &page, &stem).await {
                Ok(path) => {
                    info!(page = %page.name, path = %path.display(), "[PAGES] Page saved");
                    written.insert(stem.to_lowercase());
                    summary.succeeded += 1;
                }
                Err(ItemError::Graph(GraphError::Auth(auth))) => return Err(auth),
                Err(e) => {
                    error!(page = %page.name, page_id = %page.id, error = %e, "[PAGES] Page failed");
                    summary.failed += 1;
                }
            }
        }

        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            "[PAGES] Page pass finished"
        );
        Ok(summary)
    }

    async fn scrape_page(
        &self,
        site_id: &str,
        page: &SitePageRef,
        stem: &str,
    ) -> Result<PathBuf, ItemError> {
        let document = self
            .client
            .get_json(
                &format!("sites/{site_id}/pages/{}/microsoft.graph.sitePage", page.id),
                &[("$expand", "canvasLayout")],
            )
            .await?;

        let text = page_text(&document, self.extractor)?;
        let path = self.out_dir.join(format!("{stem}.txt"));
        write_atomic(&path, text.as_bytes()).map_err(|e| ItemError::io(&path, e))?;
        Ok(path)
    }
}

/// Stem for `page` that no earlier page of this pass has written. Compared case-insensitively,
/// since the output directory may live on a case-insensitive filesystem.
fn unique_stem(page: &SitePageRef, written: &HashSet<String>) -> String {
    let stem = page_file_stem(page);
    if !written.contains(&stem.to_lowercase()) {
        return stem;
    }
    let renamed = sanitize_segment(&format!("{stem}-{}", page.id));
    warn!(
        page = %page.name,
        page_id = %page.id,
        file = %renamed,
        "[PAGES] Another page already wrote this file name; saving under the page id"
    );
    renamed
}

/// Plain text of a page document: optional description header, then the text of every
/// `innerHtml` web part in document order.
pub fn page_text(document: &Value, extractor: &dyn TextExtractor) -> Result<String, ItemError> {
    let mut fragments = Vec::new();
    collect_inner_html(document, &mut fragments);

    let mut parts = Vec::with_capacity(fragments.len());
    for html in fragments {
        let text = extractor.extract(html)?;
        if !text.is_empty() {
            parts.push(text);
        }
    }
    let body = parts.join(" ");

    match document.get("description").and_then(Value::as_str) {
        Some(description) if !description.trim().is_empty() => Ok(format!(
            "Page Description: {description}\n Content: {body}"
        )),
        _ => Ok(body),
    }
}

fn collect_inner_html<'v>(value: &'v Value, out: &mut Vec<&'v str>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if key == "innerHtml" {
                    if let Some(html) = child.as_str() {
                        out.push(html);
                    }
                } else {
                    collect_inner_html(child, out);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_inner_html(item, out);
            }
        }
        _ => {}
    }
}

/// File stem for a page: its name without `.aspx`, else its title, else its id.
pub fn page_file_stem(page: &SitePageRef) -> String {
    let name = page.name.trim();
    let name = if name.to_ascii_lowercase().ends_with(".aspx") {
        &name[..name.len() - ".aspx".len()]
    } else {
        name
    };
    let stem = Some(name)
        .filter(|n| !n.is_empty())
        .or_else(|| page.title.as_deref().map(str::trim).filter(|t| !t.is_empty()))
        .unwrap_or(page.id.as_str());
    sanitize_segment(stem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html_text::HtmlTextExtractor;
    use serde_json::json;

    fn page(name: &str, title: Option<&str>) -> SitePageRef {
        SitePageRef {
            id: "p1".into(),
            name: name.into(),
            title: title.map(String::from),
            web_url: None,
        }
    }

    #[test]
    fn stem_drops_aspx_and_falls_back() {
        assert_eq!(page_file_stem(&page("Home.aspx", None)), "Home");
        assert_eq!(page_file_stem(&page("News.ASPX", None)), "News");
        assert_eq!(page_file_stem(&page("", Some("Team Site"))), "Team Site");
        assert_eq!(page_file_stem(&page("", None)), "p1");
        assert_eq!(page_file_stem(&page("HR/Policies.aspx", None)), "HR_Policies");
    }

    #[test]
    fn clashing_stem_falls_back_to_page_id() {
        let mut written = HashSet::new();
        assert_eq!(unique_stem(&page("Home.aspx", None), &written), "Home");
        written.insert("home".to_string());
        assert_eq!(unique_stem(&page("HOME.aspx", None), &written), "HOME-p1");
        assert_eq!(unique_stem(&page("News.aspx", None), &written), "News");
    }

    #[test]
    fn text_collects_nested_inner_html_in_order() {
        let doc = json!({
            "canvasLayout": {"horizontalSections": [{"columns": [
                {"webparts": [{"innerHtml": "<p>First</p>"}]},
                {"webparts": [{"innerHtml": "<p>Second</p>"}, {"webPartType": "image"}]}
            ]}]}
        });
        let text = page_text(&doc, &HtmlTextExtractor::new()).unwrap();
        assert_eq!(text, "First Second");
    }

    #[test]
    fn description_becomes_header() {
        let doc = json!({
            "description": "About us",
            "canvasLayout": {"horizontalSections": [{"columns": [{"webparts": [{"innerHtml": "<p>Hi</p>"}]}]}]}
        });
        let text = page_text(&doc, &HtmlTextExtractor::new()).unwrap();
        assert_eq!(text, "Page Description: About us\n Content: Hi");
    }
}
