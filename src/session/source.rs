use anyhow::Context;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use super::SessionKey;
use super::data::{EventInfo, SessionData, events_from_schedule};
use crate::error::SessionError;
use crate::fetch::{BasicClient, HttpClient, fetch_optional_bytes};
use crate::parser::{parse_schedule, parse_session};

/// Loads sessions and season schedules.
#[async_trait]
pub trait SessionSource: Send + Sync {
    async fn load_session(&self, key: &SessionKey) -> Result<SessionData, SessionError>;

    /// Events of `year` that have a race session.
    async fn load_schedule(&self, year: i32) -> Result<Vec<EventInfo>, SessionError>;
}

/// Reads sessions from a directory tree:
///
/// ```text
/// {root}/{year}/schedule.json
/// {root}/{year}/round_{RR}_{TYPE}.json      (or .json.gz)
/// ```
#[derive(Debug, Clone)]
pub struct FileSource {
    root: PathBuf,
}

impl FileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn session_path(&self, key: &SessionKey) -> PathBuf {
        self.root.join(key.year.to_string()).join(format!(
            "round_{:02}_{}.json",
            key.round, key.session_type
        ))
    }

    pub fn schedule_path(&self, year: i32) -> PathBuf {
        self.root.join(year.to_string()).join("schedule.json")
    }

    /// Reads `path`, or `path` + `.gz` when only the compressed file exists.
    async fn read_any(path: &Path) -> Result<Option<Vec<u8>>, SessionError> {
        let mut gz = path.as_os_str().to_owned();
        gz.push(".gz");
        for candidate in [path.to_path_buf(), PathBuf::from(gz)] {
            match tokio::fs::read(&candidate).await {
                Ok(bytes) => {
                    debug!(path = %candidate.display(), bytes = bytes.len(), "Read session file");
                    return Ok(Some(bytes));
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(anyhow::Error::new(e)
                        .context(format!("reading {}", candidate.display()))
                        .into());
                }
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl SessionSource for FileSource {
    async fn load_session(&self, key: &SessionKey) -> Result<SessionData, SessionError> {
        let path = self.session_path(key);
        let bytes = Self::read_any(&path)
            .await?
            .ok_or_else(|| SessionError::NotFound(key.to_string()))?;
        let session =
            parse_session(&bytes).with_context(|| format!("in {}", path.display()))?;
        Ok(session)
    }

    async fn load_schedule(&self, year: i32) -> Result<Vec<EventInfo>, SessionError> {
        let path = self.schedule_path(year);
        let bytes = Self::read_any(&path)
            .await?
            .ok_or_else(|| SessionError::NotFound(format!("schedule {year}")))?;
        let rows =
            parse_schedule(&bytes).with_context(|| format!("in {}", path.display()))?;
        Ok(events_from_schedule(&rows))
    }
}

/// Fetches sessions from an HTTP mirror laid out as:
///
/// ```text
/// {base}/{year}/schedule.json
/// {base}/{year}/{round}/{TYPE}.json
/// ```
pub struct HttpSource {
    base_url: String,
    client: Arc<dyn HttpClient>,
}

impl HttpSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Arc::new(BasicClient::new()))
    }

    pub fn with_client(base_url: impl Into<String>, client: Arc<dyn HttpClient>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, client }
    }

    pub fn session_url(&self, key: &SessionKey) -> String {
        format!(
            "{}/{}/{}/{}.json",
            self.base_url, key.year, key.round, key.session_type
        )
    }

    pub fn schedule_url(&self, year: i32) -> String {
        format!("{}/{}/schedule.json", self.base_url, year)
    }
}

#[async_trait]
impl SessionSource for HttpSource {
    #[tracing::instrument(skip(self, key), fields(key = %key))]
    async fn load_session(&self, key: &SessionKey) -> Result<SessionData, SessionError> {
        let url = self.session_url(key);
        let bytes = fetch_optional_bytes(self.client.as_ref(), &url)
            .await
            .with_context(|| format!("fetching {url}"))?
            .ok_or_else(|| SessionError::NotFound(key.to_string()))?;
        debug!(bytes = bytes.len(), "Session downloaded");
        Ok(parse_session(&bytes).with_context(|| format!("in {url}"))?)
    }

    async fn load_schedule(&self, year: i32) -> Result<Vec<EventInfo>, SessionError> {
        let url = self.schedule_url(year);
        let bytes = fetch_optional_bytes(self.client.as_ref(), &url)
            .await
            .with_context(|| format!("fetching {url}"))?
            .ok_or_else(|| SessionError::NotFound(format!("schedule {year}")))?;
        let rows = parse_schedule(&bytes).with_context(|| format!("in {url}"))?;
        Ok(events_from_schedule(&rows))
    }
}
