use crate::errors::{Result, TgVaultError};
use reqwest::multipart;
use serde::Deserialize;
use tokio::sync::RwLock;

/// Cookie-authenticated WebAPI client for qBittorrent (spec.md §4.8
/// "External BitTorrent client"). Grounded on the WebAPI surface shape seen
/// in the pack's qBittorrent reference crates (reqwest + serde, cookie-jar
/// auth, `/api/v2/...` routes).
pub struct QbittorrentClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    cookie: RwLock<Option<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TorrentInfo {
    pub hash: String,
    pub name: String,
    pub size: i64,
    pub progress: f64,
    pub state: String,
    #[serde(default)]
    pub save_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TorrentFile {
    pub index: u32,
    pub name: String,
    pub size: i64,
    pub priority: u32,
    pub progress: f64,
}

/// The subset of `/torrents/properties` the path-resolution priority chain
/// needs (spec.md §4.8): `save_path` is where qBittorrent was told to put
/// the download, `content_path` is its own resolved root for the torrent's
/// content (the file itself for a single-file torrent, the containing
/// directory otherwise).
#[derive(Debug, Clone, Deserialize)]
pub struct TorrentProperties {
    #[serde(default)]
    pub save_path: Option<String>,
    #[serde(default)]
    pub content_path: Option<String>,
}

impl QbittorrentClient {
    pub fn new(base_url: String, username: String, password: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            username,
            password,
            cookie: RwLock::new(None),
        }
    }

    async fn ensure_authenticated(&self) -> Result<String> {
        if let Some(cookie) = self.cookie.read().await.clone() {
            return Ok(cookie);
        }
        self.login().await
    }

    async fn login(&self) -> Result<String> {
        let response = self
            .http
            .post(format!("{}/api/v2/auth/login", self.base_url))
            .form(&[("username", &self.username), ("password", &self.password)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TgVaultError::UpstreamUnavailable(format!(
                "qbittorrent login returned {}",
                response.status()
            )));
        }

        let cookie = response
            .headers()
            .get("set-cookie")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.to_string())
            .ok_or_else(|| TgVaultError::UpstreamUnavailable("qbittorrent login returned no cookie".into()))?;

        *self.cookie.write().await = Some(cookie.clone());
        Ok(cookie)
    }

    async fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let cookie = self.ensure_authenticated().await.unwrap_or_default();
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .header("Cookie", cookie)
    }

    pub async fn add_torrent(&self, source: &crate::models::TorrentSource, save_path: &str) -> Result<()> {
        let cookie = self.ensure_authenticated().await?;
        let mut form = multipart::Form::new().text("savepath", save_path.to_string());
        form = match source {
            crate::models::TorrentSource::Url(url) => form.text("urls", url.clone()),
            crate::models::TorrentSource::File(path) => {
                let bytes = tokio::fs::read(path).await?;
                form.part("torrents", multipart::Part::bytes(bytes).file_name("upload.torrent"))
            }
        };

        let response = self
            .http
            .post(format!("{}/api/v2/torrents/add", self.base_url))
            .header("Cookie", cookie)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TgVaultError::UpstreamUnavailable(format!(
                "qbittorrent add returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    pub async fn list_torrents(&self, hash_filter: Option<&str>) -> Result<Vec<TorrentInfo>> {
        let mut request = self
            .request(reqwest::Method::GET, "/api/v2/torrents/info")
            .await;
        if let Some(hash) = hash_filter {
            request = request.query(&[("hashes", hash)]);
        }
        let response = request.send().await?;
        Ok(response.json().await?)
    }

    pub async fn torrent_properties(&self, hash: &str) -> Result<TorrentInfo> {
        let torrents = self.list_torrents(Some(hash)).await?;
        torrents
            .into_iter()
            .next()
            .ok_or_else(|| TgVaultError::NotFound(format!("torrent {}", hash)))
    }

    pub async fn properties(&self, hash: &str) -> Result<TorrentProperties> {
        let response = self
            .request(reqwest::Method::GET, "/api/v2/torrents/properties")
            .await
            .query(&[("hash", hash)])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(TgVaultError::UpstreamUnavailable(format!(
                "qbittorrent properties returned {}",
                response.status()
            )));
        }
        Ok(response.json().await?)
    }

    pub async fn torrent_files(&self, hash: &str) -> Result<Vec<TorrentFile>> {
        let response = self
            .request(reqwest::Method::GET, "/api/v2/torrents/files")
            .await
            .query(&[("hash", hash)])
            .send()
            .await?;
        Ok(response.json().await?)
    }

    /// `0` = do not download, `1` = normal priority (spec.md §4.8
    /// "file selection").
    pub async fn set_file_priority(&self, hash: &str, file_indices: &[u32], priority: u32) -> Result<()> {
        let ids = file_indices
            .iter()
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join("|");
        let cookie = self.ensure_authenticated().await?;
        self.http
            .post(format!("{}/api/v2/torrents/filePrio", self.base_url))
            .header("Cookie", cookie)
            .form(&[("hash", hash), ("id", &ids), ("priority", &priority.to_string())])
            .send()
            .await?;
        Ok(())
    }

    pub async fn delete_torrent(&self, hash: &str, delete_files: bool) -> Result<()> {
        let cookie = self.ensure_authenticated().await?;
        self.http
            .post(format!("{}/api/v2/torrents/delete", self.base_url))
            .header("Cookie", cookie)
            .form(&[("hashes", hash), ("deleteFiles", if delete_files { "true" } else { "false" })])
            .send()
            .await?;
        Ok(())
    }
}
