//! Retrieval of circuit artifacts (program, proving key, verification key).
//!
//! Content-addressed artifacts are tried against each mirror in order; the
//! first complete download wins. Nothing is cached.

use std::path::PathBuf;

use reqwest::Client;
use tracing::{info, warn};

use crate::{
    config::FetchConfig,
    error::{Error, Result},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetLocator {
    Url(String),
    ContentAddress(String),
    File(PathBuf),
}

impl AssetLocator {
    pub fn parse(locator: &str, content_prefix: &str) -> Self {
        if locator.starts_with("http://") || locator.starts_with("https://") {
            AssetLocator::Url(locator.to_string())
        } else if locator.starts_with(content_prefix) {
            AssetLocator::ContentAddress(locator.to_string())
        } else {
            AssetLocator::File(PathBuf::from(locator))
        }
    }

    pub fn describe(&self) -> String {
        match self {
            AssetLocator::Url(url) => url.clone(),
            AssetLocator::ContentAddress(cid) => cid.clone(),
            AssetLocator::File(path) => path.display().to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssetFetcher {
    client: Client,
    mirrors: Vec<String>,
    content_prefix: String,
}

impl AssetFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::InvalidParams(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            client,
            mirrors: config.mirrors.clone(),
            content_prefix: config.content_prefix.clone(),
        })
    }

    pub fn locate(&self, locator: &str) -> AssetLocator {
        AssetLocator::parse(locator, &self.content_prefix)
    }

    /// Fetch by locator string; see [`AssetLocator::parse`].
    pub async fn fetch(&self, locator: &str) -> Result<Vec<u8>> {
        self.fetch_located(&self.locate(locator)).await
    }

    pub async fn fetch_located(&self, locator: &AssetLocator) -> Result<Vec<u8>> {
        match locator {
            AssetLocator::Url(url) => self.get(url).await.map_err(|reason| {
                warn!(url = %url, %reason, "asset download failed");
                Error::AssetFetch {
                    locator: url.clone(),
                    attempts: 1,
                }
            }),
            AssetLocator::ContentAddress(cid) => self.fetch_from_mirrors(cid).await,
            AssetLocator::File(path) => {
                let bytes = tokio::fs::read(path).await.map_err(|e| {
                    warn!(path = %path.display(), error = %e, "asset read failed");
                    Error::AssetFetch {
                        locator: path.display().to_string(),
                        attempts: 1,
                    }
                })?;
                info!(path = %path.display(), bytes = bytes.len(), "loaded asset from disk");
                Ok(bytes)
            }
        }
    }

    async fn fetch_from_mirrors(&self, cid: &str) -> Result<Vec<u8>> {
        for mirror in &self.mirrors {
            let url = format!("{mirror}{cid}");
            match self.get(&url).await {
                Ok(bytes) => {
                    info!(url = %url, bytes = bytes.len(), "fetched asset from mirror");
                    return Ok(bytes);
                }
                Err(reason) => warn!(url = %url, %reason, "mirror failed, trying next"),
            }
        }

        Err(Error::AssetFetch {
            locator: cid.to_string(),
            attempts: self.mirrors.len(),
        })
    }

    /// One attempt; the error is a human-readable reason for logging.
    async fn get(&self, url: &str) -> std::result::Result<Vec<u8>, String> {
        let response = self.client.get(url).send().await.map_err(|e| e.to_string())?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {status}"));
        }
        let body = response.bytes().await.map_err(|e| e.to_string())?;
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{mock, server_url};
    use std::time::{Duration, Instant};
    use tokio::net::TcpListener;

    fn fetcher(mirrors: Vec<String>) -> AssetFetcher {
        fetcher_with_timeout(mirrors, Duration::from_secs(5))
    }

    fn fetcher_with_timeout(mirrors: Vec<String>, timeout: Duration) -> AssetFetcher {
        AssetFetcher::new(&FetchConfig {
            mirrors,
            content_prefix: "bafybe".into(),
            timeout,
        })
        .unwrap()
    }

    /// Accepts connections and never answers them.
    async fn stalled_mirror() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        format!("http://{addr}/ipfs/")
    }

    #[test]
    fn classifies_locators() {
        assert_eq!(
            AssetLocator::parse("https://host/a.wasm", "bafybe"),
            AssetLocator::Url("https://host/a.wasm".into())
        );
        assert_eq!(
            AssetLocator::parse("bafybeigdyrzt", "bafybe"),
            AssetLocator::ContentAddress("bafybeigdyrzt".into())
        );
        assert_eq!(
            AssetLocator::parse("circuits/jwt.zkey", "bafybe"),
            AssetLocator::File(PathBuf::from("circuits/jwt.zkey"))
        );
    }

    #[tokio::test]
    async fn direct_url() {
        let _m = mock("GET", "/direct/program.wasm")
            .with_status(200)
            .with_body(b"\0asm")
            .create();
        let bytes = fetcher(vec![])
            .fetch(&format!("{}/direct/program.wasm", server_url()))
            .await
            .unwrap();
        assert_eq!(bytes, b"\0asm");
    }

    #[tokio::test]
    async fn direct_url_failure_is_not_retried() {
        let m = mock("GET", "/direct/missing.zkey")
            .with_status(404)
            .expect(1)
            .create();
        let err = fetcher(vec![])
            .fetch(&format!("{}/direct/missing.zkey", server_url()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AssetFetch { attempts: 1, .. }));
        m.assert();
    }

    #[tokio::test]
    async fn falls_back_through_mirrors_in_order() {
        let down = mock("GET", "/down/ipfs/bafybeifallback")
            .with_status(502)
            .expect(1)
            .create();
        let up = mock("GET", "/up/ipfs/bafybeifallback")
            .with_status(200)
            .with_body("zkey-bytes")
            .expect(1)
            .create();
        let never = mock("GET", "/later/ipfs/bafybeifallback")
            .with_status(200)
            .expect(0)
            .create();

        let mirrors = vec![
            "http://127.0.0.1:1/ipfs/".to_string(),
            format!("{}/down/ipfs/", server_url()),
            format!("{}/up/ipfs/", server_url()),
            format!("{}/later/ipfs/", server_url()),
        ];
        let bytes = fetcher(mirrors).fetch("bafybeifallback").await.unwrap();

        assert_eq!(bytes, b"zkey-bytes");
        down.assert();
        up.assert();
        never.assert();
    }

    #[tokio::test]
    async fn exhausted_mirrors_report_attempts() {
        let mirrors = vec![
            format!("{}/gone-a/ipfs/", server_url()),
            format!("{}/gone-b/ipfs/", server_url()),
            "http://127.0.0.1:1/ipfs/".to_string(),
        ];
        let err = fetcher(mirrors).fetch("bafybeinowhere").await.unwrap_err();
        match err {
            Error::AssetFetch { locator, attempts } => {
                assert_eq!(locator, "bafybeinowhere");
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn local_files() {
        let path = std::env::temp_dir().join(format!("zkvc-fetch-{}.bin", rand::random::<u64>()));
        std::fs::write(&path, b"verification key").unwrap();

        let fetcher = fetcher(vec![]);
        let bytes = fetcher.fetch(path.to_str().unwrap()).await.unwrap();
        assert_eq!(bytes, b"verification key");
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(
            fetcher.fetch(path.to_str().unwrap()).await,
            Err(Error::AssetFetch { .. })
        ));
    }

    #[tokio::test]
    async fn stalled_mirror_times_out_and_next_is_tried() {
        let up = mock("GET", "/after-stall/ipfs/bafybeistalled")
            .with_status(200)
            .with_body("program")
            .expect(1)
            .create();
        let mirrors = vec![
            stalled_mirror().await,
            format!("{}/after-stall/ipfs/", server_url()),
        ];

        let started = Instant::now();
        let bytes = fetcher_with_timeout(mirrors, Duration::from_millis(200))
            .fetch("bafybeistalled")
            .await
            .unwrap();
        let elapsed = started.elapsed();

        assert_eq!(bytes, b"program");
        assert!(elapsed >= Duration::from_millis(200), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(5), "{elapsed:?}");
        up.assert();
    }

    #[tokio::test]
    async fn stalled_direct_url_fails_after_one_attempt() {
        let url = format!("{}program.wasm", stalled_mirror().await);
        let started = Instant::now();
        let err = fetcher_with_timeout(vec![], Duration::from_millis(200))
            .fetch(&url)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AssetFetch { attempts: 1, .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
