//! Scripted Microsoft Graph stand-in shared by the integration tests.
//!
//! Routes are keyed by URL. A request first matches an exact URL (query included), then the
//! URL without its query string. Each route holds a queue of responses; the last one repeats.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use sharepoint_scrape::config::{Config, Credentials, RetryPolicy, Settings};
use sharepoint_scrape::contract::{HttpRequest, HttpResponse, HttpTransport};
use sharepoint_scrape::error::TransportError;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;

pub const GRAPH: &str = "https://graph.test/v1.0";
pub const TOKEN_URL: &str = "https://login.test/tenant/oauth2/v2.0/token";
pub const SITE: &str = "site-1";
pub const DRIVE: &str = "drive-1";

pub fn settings(output_dir: &Path) -> Settings {
    Settings {
        output_dir: output_dir.to_path_buf(),
        retry: RetryPolicy::immediate(3),
        authority_host: "https://login.test".to_string(),
        graph_base_url: GRAPH.to_string(),
        ..Settings::default()
    }
}

pub fn config(output_dir: &Path) -> Config {
    Config {
        credentials: Credentials {
            tenant_id: "tenant".into(),
            client_id: "client".into(),
            client_secret: "secret".into(),
            site_id: SITE.into(),
        },
        settings: settings(output_dir),
    }
}

pub fn graph(path: &str) -> String {
    format!("{GRAPH}/{path}")
}

pub fn token(value: &str, expires_in: i64) -> HttpResponse {
    HttpResponse::json(200, &json!({"access_token": value, "expires_in": expires_in, "token_type": "Bearer"}))
}

pub fn ok(value: Value) -> HttpResponse {
    HttpResponse::json(200, &value)
}

pub fn bytes(body: &[u8]) -> HttpResponse {
    HttpResponse::new(200, body.to_vec())
}

pub fn status(code: u16) -> HttpResponse {
    HttpResponse::json(
        code,
        &json!({"error": {"code": format!("http{code}"), "message": "scripted failure"}}),
    )
}

pub fn collection(items: Vec<Value>, next_link: Option<&str>) -> HttpResponse {
    let mut body = json!({ "value": items });
    if let Some(link) = next_link {
        body["@odata.nextLink"] = Value::String(link.to_string());
    }
    ok(body)
}

pub fn file(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "size": 4,
        "file": {"mimeType": "application/octet-stream"},
        "@microsoft.graph.downloadUrl": download_url(id),
    })
}

pub fn folder(id: &str, name: &str) -> Value {
    json!({"id": id, "name": name, "folder": {"childCount": 1}})
}

pub fn download_url(id: &str) -> String {
    format!("https://download.test/{id}")
}

pub fn root_children() -> String {
    graph(&format!("drives/{DRIVE}/root/children"))
}

pub fn children(folder_id: &str) -> String {
    graph(&format!("drives/{DRIVE}/items/{folder_id}/children"))
}

pub fn page_document(html: &str) -> Value {
    json!({
        "canvasLayout": {"horizontalSections": [{"columns": [{"webparts": [
            {"id": "wp1", "innerHtml": html}
        ]}]}]}
    })
}

#[derive(Default)]
pub struct FakeGraph {
    routes: Mutex<HashMap<String, VecDeque<HttpResponse>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl FakeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fake with a working token endpoint and a resolvable site and drive.
    pub fn with_site() -> Self {
        let fake = Self::new();
        fake.route(TOKEN_URL, token("token-1", 3600));
        fake.route(&graph(&format!("sites/{SITE}")), ok(json!({"id": SITE, "displayName": "HR"})));
        fake.route(
            &graph(&format!("sites/{SITE}/drive")),
            ok(json!({"id": DRIVE, "name": "Documents"})),
        );
        fake
    }

    pub fn route(&self, url: &str, response: HttpResponse) {
        self.routes
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(response);
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of requests whose URL (query stripped) equals `url`.
    pub fn hits(&self, url: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| strip_query(&r.url) == url || r.url == url)
            .count()
    }
}

fn strip_query(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

#[async_trait]
impl HttpTransport for FakeGraph {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        let mut routes = self.routes.lock().unwrap();
        let key = if routes.contains_key(&request.url) {
            request.url.clone()
        } else {
            strip_query(&request.url).to_string()
        };
        match routes.get_mut(&key) {
            Some(queue) if queue.len() > 1 => Ok(queue.pop_front().unwrap()),
            Some(queue) if !queue.is_empty() => Ok(queue[0].clone()),
            _ => Ok(status(404)),
        }
    }
}
