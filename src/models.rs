//! Domain records produced from Graph listings.

use serde::Deserialize;
use serde_json::Value;

/// One entry of `/sites/{id}/pages`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SitePageRef {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub web_url: Option<String>,
}

impl SitePageRef {
    pub fn from_value(value: Value) -> Result<Self, String> {
        serde_json::from_value(value).map_err(|e| format!("unreadable site page entry: {e}"))
    }
}

/// What a drive child turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveItemKind {
    File,
    Folder,
    /// Packages, notebooks and anything else without a file or folder facet.
    Other,
}

/// A drive child together with where it sits relative to the drive root.
#[derive(Debug, Clone, PartialEq)]
pub struct DriveItem {
    pub id: String,
    pub name: String,
    pub kind: DriveItemKind,
    pub download_url: Option<String>,
    pub size: u64,
    /// Folder names from the root down to the parent of this item.
    pub parent_path: Vec<String>,
}

impl DriveItem {
    /// Builds an item from a raw `children` entry found under `parent_path`.
    pub fn from_value(value: Value, parent_path: &[String]) -> Result<Self, String> {
        let dto: DriveItemDto =
            serde_json::from_value(value).map_err(|e| format!("unreadable drive item: {e}"))?;
        let kind = if dto.folder.is_some() {
            DriveItemKind::Folder
        } else if dto.file.is_some() || dto.download_url.is_some() {
            DriveItemKind::File
        } else {
            DriveItemKind::Other
        };
        Ok(DriveItem {
            id: dto.id,
            name: dto.name.unwrap_or_default(),
            kind,
            download_url: dto.download_url,
            size: dto.size.unwrap_or(0),
            parent_path: parent_path.to_vec(),
        })
    }

    /// Path of this item itself, for folders the path of their children.
    pub fn child_path(&self) -> Vec<String> {
        let mut path = self.parent_path.clone();
        path.push(self.name.clone());
        path
    }

    pub fn display_path(&self) -> String {
        self.child_path().join("/")
    }
}

#[derive(Debug, Deserialize)]
struct DriveItemDto {
    id: String,
    name: Option<String>,
    size: Option<u64>,
    folder: Option<Value>,
    file: Option<Value>,
    #[serde(rename = "@microsoft.graph.downloadUrl")]
    download_url: Option<String>,
}

/// `/sites/{id}` and `/sites/{id}/drive` both carry an `id`; nothing else is needed.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRef {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}
