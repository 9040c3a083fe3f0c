//! Byte fetchers for asset URLs
//!
//! The loader only ever needs "give me the bytes behind this URL". HTTP(S)
//! goes through ureq (blocking, one attempt, no retries); `file://` URLs and
//! bare paths read from disk.

use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Connection timeout for asset downloads
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Read timeout for asset downloads (instructor tracks can be large)
pub const READ_TIMEOUT_SECS: u64 = 60;

/// Upper bound on a single asset download
pub const MAX_ASSET_BYTES: u64 = 512 * 1024 * 1024;

const USER_AGENT: &str = concat!("somnus/", env!("CARGO_PKG_VERSION"));

/// Network, HTTP or file-system failure while fetching asset bytes
#[derive(Debug, Error)]
pub enum FetchError {
    /// Server answered with a non-success status
    #[error("HTTP {status} fetching {url}")]
    Status { url: String, status: u16 },

    /// Connection, DNS, TLS or timeout failure
    #[error("Network error fetching {url}: {reason}")]
    Network { url: String, reason: String },

    /// Body exceeds the download limit
    #[error("{url} is larger than the {limit}-byte download limit")]
    TooLarge { url: String, limit: u64 },

    /// Local file could not be read
    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Scheme other than http, https or file
    #[error("Unsupported URL scheme in {0}")]
    UnsupportedScheme(String),
}

/// Source of raw asset bytes
///
/// Implementations must be callable from several threads at once; the
/// loader fetches instructor and soundscape in parallel.
pub trait AssetFetcher: Send + Sync {
    /// Fetch all bytes behind `url`
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// HTTP(S) fetcher backed by a shared ureq agent
pub struct HttpFetcher {
    agent: ureq::Agent,
    max_bytes: u64,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::with_limit(MAX_ASSET_BYTES)
    }

    /// Fetcher that rejects bodies larger than `max_bytes`
    pub fn with_limit(max_bytes: u64) -> Self {
        let agent = ureq::AgentBuilder::new()
            .user_agent(USER_AGENT)
            .timeout_connect(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout_read(Duration::from_secs(READ_TIMEOUT_SECS))
            .build();
        Self { agent, max_bytes }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        log::debug!("Downloading {}", url);

        let response = self.agent.get(url).call().map_err(|e| match e {
            ureq::Error::Status(status, _) => FetchError::Status {
                url: url.to_string(),
                status,
            },
            ureq::Error::Transport(t) => FetchError::Network {
                url: url.to_string(),
                reason: t.to_string(),
            },
        })?;

        // Content-Length is only a hint; never trust it past the limit
        let capacity = response
            .header("Content-Length")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0)
            .min(self.max_bytes) as usize;

        let mut bytes = Vec::with_capacity(capacity);
        response
            .into_reader()
            .take(self.max_bytes.saturating_add(1))
            .read_to_end(&mut bytes)
            .map_err(|e| FetchError::Network {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        if bytes.len() as u64 > self.max_bytes {
            return Err(FetchError::TooLarge {
                url: url.to_string(),
                limit: self.max_bytes,
            });
        }

        log::debug!("Downloaded {} bytes from {}", bytes.len(), url);
        Ok(bytes)
    }
}

/// Reads `file://` URLs and plain paths from disk
#[derive(Debug, Default)]
pub struct FileFetcher;

impl AssetFetcher for FileFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let path = PathBuf::from(url.strip_prefix("file://").unwrap_or(url));
        std::fs::read(&path).map_err(|source| FetchError::Io { path, source })
    }
}

/// Dispatches to the HTTP or file fetcher by URL scheme
#[derive(Default)]
pub struct RouterFetcher {
    http: HttpFetcher,
    file: FileFetcher,
}

impl RouterFetcher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AssetFetcher for RouterFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        match url.split_once("://").map(|(scheme, _)| scheme.to_ascii_lowercase()) {
            Some(scheme) if scheme == "http" || scheme == "https" => self.http.fetch(url),
            Some(scheme) if scheme == "file" => self.file.fetch(url),
            None => self.file.fetch(url),
            Some(_) => Err(FetchError::UnsupportedScheme(url.to_string())),
        }
    }
}

/// File extension of the last path segment, ignoring query and fragment
///
/// Used as a container hint for the decoder.
pub fn url_extension(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let segment = path.rsplit('/').next()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        None
    } else {
        Some(ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::TcpListener;

    #[test]
    fn test_url_extension() {
        assert_eq!(url_extension("https://cdn.example.com/a/intro.mp3"), Some("mp3"));
        assert_eq!(url_extension("https://cdn.example.com/a/track.wav?sig=abc.def"), Some("wav"));
        assert_eq!(url_extension("/tmp/rain.flac#t=3"), Some("flac"));
        assert_eq!(url_extension("https://cdn.example.com/stream"), None);
        assert_eq!(url_extension("/tmp/.hidden"), None);
    }

    #[test]
    fn test_file_fetcher_reads_path_and_file_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        std::fs::write(&path, b"[0, 10]").unwrap();

        let plain = FileFetcher.fetch(path.to_str().unwrap()).unwrap();
        let url = format!("file://{}", path.display());
        let via_url = FileFetcher.fetch(&url).unwrap();
        assert_eq!(plain, b"[0, 10]");
        assert_eq!(plain, via_url);
    }

    #[test]
    fn test_file_fetcher_missing_file() {
        let result = FileFetcher.fetch("/nonexistent/somnus/file.mp3");
        assert!(matches!(result, Err(FetchError::Io { .. })));
    }

    #[test]
    fn test_router_rejects_unknown_scheme() {
        let result = RouterFetcher::new().fetch("ftp://example.com/a.mp3");
        assert!(matches!(result, Err(FetchError::UnsupportedScheme(_))));
    }

    /// Serve one canned HTTP response on a local port; returns its URL
    fn serve_once(response: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut byte = [0u8; 1];
            while !request.ends_with(b"\r\n\r\n") && stream.read(&mut byte).unwrap_or(0) == 1 {
                request.push(byte[0]);
            }
            let _ = stream.write_all(&response);
        });
        format!("http://{}/voice.mp3", addr)
    }

    fn response(headers: &str, body: &[u8]) -> Vec<u8> {
        let mut bytes = format!("HTTP/1.1 200 OK\r\nConnection: close\r\n{}\r\n", headers).into_bytes();
        bytes.extend_from_slice(body);
        bytes
    }

    #[test]
    fn test_http_fetch_body() {
        let url = serve_once(response("Content-Length: 5\r\n", b"hello"));
        assert_eq!(HttpFetcher::new().fetch(&url).unwrap(), b"hello");
    }

    #[test]
    fn test_http_huge_content_length_is_an_error() {
        let url = serve_once(response("Content-Length: 18446744073709551615\r\n", b"short"));
        let result = HttpFetcher::new().fetch(&url);
        assert!(
            matches!(result, Err(FetchError::Network { .. }) | Err(FetchError::TooLarge { .. })),
            "unexpected {:?}",
            result
        );
    }

    #[test]
    fn test_http_body_over_limit_is_rejected() {
        let body = vec![7u8; 64];
        let url = serve_once(response("Content-Length: 64\r\n", &body));
        let result = HttpFetcher::with_limit(16).fetch(&url);
        assert!(matches!(result, Err(FetchError::TooLarge { limit: 16, .. })));

        // Exactly at the limit is fine
        let url = serve_once(response("Content-Length: 16\r\n", &body[..16]));
        assert_eq!(HttpFetcher::with_limit(16).fetch(&url).unwrap().len(), 16);
    }

    #[test]
    fn test_http_fetch_invalid_host() {
        let result = HttpFetcher::new().fetch("http://invalid.invalid.invalid/a.mp3");
        assert!(matches!(result, Err(FetchError::Network { .. })));
    }
}
