//! Snapshot provider: re-reads a local JSON document or fetches a URL with a
//! cache-busting query, plus the worker thread that keeps fetches off the UI
//! thread. Each fetch returns a complete snapshot; deltas are computed by the
//! reconciler, never by the provider.

use crate::model::ThreadDocument;
use anyhow::{anyhow, bail, Context, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Where snapshots come from.
#[derive(Debug, Clone)]
pub enum SnapshotSource {
    File(PathBuf),
    Http(String),
}

impl SnapshotSource {
    pub fn parse(raw: &str) -> Self {
        if raw.starts_with("http://") || raw.starts_with("https://") {
            SnapshotSource::Http(raw.to_string())
        } else {
            SnapshotSource::File(PathBuf::from(raw))
        }
    }

    pub fn describe(&self) -> String {
        match self {
            SnapshotSource::File(path) => path.display().to_string(),
            SnapshotSource::Http(url) => url.clone(),
        }
    }

    /// Fetch one complete snapshot. Blocking; called from the worker thread
    /// (or directly from one-shot commands).
    pub fn fetch(&self, client: &reqwest::blocking::Client) -> Result<ThreadDocument> {
        match self {
            SnapshotSource::File(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                serde_json::from_str(&raw).context("Failed to parse snapshot document")
            }
            SnapshotSource::Http(url) => {
                let response = client
                    .get(cache_busted(url))
                    .send()
                    .with_context(|| format!("Failed to fetch {}", url))?;
                let status = response.status();
                if !status.is_success() {
                    bail!("Snapshot fetch failed: HTTP {}", status);
                }
                let raw = response.text().context("Failed to read response body")?;
                serde_json::from_str(&raw).context("Failed to parse snapshot document")
            }
        }
    }
}

/// Append a timestamp query parameter so intermediaries never serve a stale
/// document.
fn cache_busted(url: &str) -> String {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or(0);
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}_={}", url, separator, stamp)
}

/// Dedicated fetch thread. The UI requests a fetch per poll tick and drains
/// responses from its event loop; the channel never blocks the UI side.
pub struct SourceWorker {
    request_tx: Sender<()>,
    response_rx: Receiver<Result<ThreadDocument>>,
}

impl SourceWorker {
    pub fn spawn(source: SnapshotSource) -> Self {
        let (request_tx, request_rx) = unbounded::<()>();
        let (response_tx, response_rx) = unbounded();

        thread::spawn(move || {
            let client = reqwest::blocking::Client::builder()
                .timeout(FETCH_TIMEOUT)
                .build();

            while request_rx.recv().is_ok() {
                let result = match &client {
                    Ok(client) => source.fetch(client),
                    Err(err) => Err(anyhow!("Failed to build HTTP client: {}", err)),
                };
                if response_tx.send(result).is_err() {
                    break;
                }
            }
        });

        Self {
            request_tx,
            response_rx,
        }
    }

    /// Ask the worker for a fresh snapshot. Never blocks.
    pub fn request_fetch(&self) {
        let _ = self.request_tx.send(());
    }

    /// Non-blocking drain of the next completed fetch, if any.
    pub fn try_response(&self) -> Option<Result<ThreadDocument>> {
        self.response_rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn client() -> reqwest::blocking::Client {
        reqwest::blocking::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .unwrap()
    }

    #[test]
    fn test_parse_distinguishes_urls_from_paths() {
        assert!(matches!(
            SnapshotSource::parse("https://example.com/comments.json"),
            SnapshotSource::Http(_)
        ));
        assert!(matches!(
            SnapshotSource::parse("./comments.json"),
            SnapshotSource::File(_)
        ));
    }

    #[test]
    fn test_file_source_reads_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("comments.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{ "title": "t", "Comments": [ {{ "id": "a" }} ] }}"#
        )
        .unwrap();

        let doc = SnapshotSource::File(path).fetch(&client()).unwrap();
        assert_eq!(doc.comments.len(), 1);
        assert_eq!(doc.comments[0].id, "a");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        let source = SnapshotSource::File(dir.path().join("nope.json"));
        assert!(source.fetch(&client()).is_err());
    }

    #[test]
    fn test_malformed_document_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("comments.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(SnapshotSource::File(path).fetch(&client()).is_err());
    }

    #[test]
    fn test_cache_buster_respects_existing_query() {
        assert!(cache_busted("https://a/b.json").starts_with("https://a/b.json?_="));
        assert!(cache_busted("https://a/b.json?k=v").starts_with("https://a/b.json?k=v&_="));
    }

    #[test]
    fn test_worker_round_trip_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("comments.json");
        std::fs::write(&path, r#"{ "comments": [ { "id": "a" } ] }"#).unwrap();

        let worker = SourceWorker::spawn(SnapshotSource::File(path));
        worker.request_fetch();

        let mut waited = Duration::ZERO;
        loop {
            if let Some(result) = worker.try_response() {
                let doc = result.unwrap();
                assert_eq!(doc.comments.len(), 1);
                break;
            }
            assert!(waited < Duration::from_secs(5), "worker never responded");
            thread::sleep(Duration::from_millis(10));
            waited += Duration::from_millis(10);
        }
    }
}
