use futures::future::{self, BoxFuture, FutureExt, Shared};
use image::DynamicImage;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::AbortHandle;

use super::http::HttpClient;
use crate::error::{Error, Result};

/// A decoded image, shared between the cache and every caller that asked for it.
pub type Image = Arc<DynamicImage>;

type PendingFetch = Shared<BoxFuture<'static, Result<Image>>>;

/// Two-tier (memory, disk) image cache keyed by source URL.
///
/// Concurrent requests for the same URL share one download. Cloning is cheap
/// and every clone sees the same state.
#[derive(Clone)]
pub struct ImageCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    http: Arc<dyn HttpClient>,
    cache_dir: PathBuf,
    state: Mutex<CacheState>,
}

struct CacheState {
    memory: MemoryStore,
    in_flight: HashMap<String, InFlight>,
    next_ticket: u64,
}

struct InFlight {
    ticket: u64,
    fetch: PendingFetch,
    abort: AbortHandle,
}

struct MemoryStore {
    images: HashMap<String, Image>,
    access_order: VecDeque<String>,
    capacity: usize,
}

impl ImageCache {
    pub fn new(http: Arc<dyn HttpClient>, cache_dir: PathBuf, memory_capacity: usize) -> Self {
        if let Err(e) = std::fs::create_dir_all(&cache_dir) {
            log::warn!("Failed to create image cache directory {}: {e}", cache_dir.display());
        }

        Self {
            inner: Arc::new(CacheInner {
                http,
                cache_dir,
                state: Mutex::new(CacheState {
                    memory: MemoryStore::new(memory_capacity),
                    in_flight: HashMap::new(),
                    next_ticket: 0,
                }),
            }),
        }
    }

    /// Returns the image for `url` from memory, disk, an in-flight download
    /// or a new download, in that order.
    pub async fn fetch(&self, url: &str) -> Result<Image> {
        if let Some(image) = self.inner.state.lock().await.memory.get(url) {
            return Ok(image);
        }

        if let Some(image) = self.load_from_disk(url).await {
            log::trace!("disk hit for {url}");
            self.inner.state.lock().await.memory.insert(url.to_string(), image.clone());
            return Ok(image);
        }

        let pending = {
            let mut state = self.inner.state.lock().await;
            // A download may have settled while the disk was being read.
            if let Some(image) = state.memory.get(url) {
                return Ok(image);
            }
            let joined = state.in_flight.get(url).map(|entry| entry.fetch.clone());
            match joined {
                Some(fetch) => {
                    log::trace!("joining in-flight download for {url}");
                    fetch
                }
                None => self.start_download(&mut state, url),
            }
        };

        pending.await
    }

    /// Warms the cache for every URL concurrently.
    ///
    /// Individual failures are logged and skipped; only cancellation is
    /// reported to the caller.
    pub async fn preheat(&self, urls: &[String]) -> Result<()> {
        let results = future::join_all(urls.iter().map(|url| self.fetch(url))).await;

        let mut cancelled = false;
        for (url, result) in urls.iter().zip(results) {
            match result {
                Ok(_) => {}
                Err(Error::Cancelled) => cancelled = true,
                Err(e) => log::warn!("preheat skipped {url}: {e}"),
            }
        }

        if cancelled { Err(Error::Cancelled) } else { Ok(()) }
    }

    /// Aborts the in-flight download for `url`. Everyone awaiting it gets
    /// [`Error::Cancelled`]. Returns false if nothing was in flight.
    pub async fn cancel(&self, url: &str) -> bool {
        let mut state = self.inner.state.lock().await;
        match state.in_flight.remove(url) {
            Some(entry) => {
                log::debug!("cancelling download of {url}");
                entry.abort.abort();
                true
            }
            None => false,
        }
    }

    /// Whether `url` is resident in memory or on disk. Does not decode.
    pub async fn is_cached(&self, url: &str) -> bool {
        if self.inner.state.lock().await.memory.contains(url) {
            return true;
        }
        tokio::fs::try_exists(self.disk_path(url)).await.unwrap_or(false)
    }

    fn start_download(&self, state: &mut CacheState, url: &str) -> PendingFetch {
        let ticket = state.next_ticket;
        state.next_ticket += 1;

        let cache = self.clone();
        let key = url.to_string();
        let task = tokio::spawn(async move {
            let result = cache.download(&key).await;

            let mut state = cache.inner.state.lock().await;
            if let Ok(image) = &result {
                state.memory.insert(key.clone(), image.clone());
            }
            state.release(&key, ticket);
            result
        });

        let abort = task.abort_handle();
        let failed_url = url.to_string();
        let fetch = async move {
            match task.await {
                Ok(result) => result,
                Err(e) if e.is_cancelled() => Err(Error::Cancelled),
                Err(e) => Err(Error::ImageUnavailable {
                    url: failed_url,
                    reason: e.to_string(),
                }),
            }
        }
        .boxed()
        .shared();

        state.in_flight.insert(
            url.to_string(),
            InFlight {
                ticket,
                fetch: fetch.clone(),
                abort,
            },
        );
        fetch
    }

    async fn download(&self, url: &str) -> Result<Image> {
        log::debug!("downloading {url}");
        let bytes = self.inner.http.get(url).await.map_err(|e| match e {
            Error::Cancelled => Error::Cancelled,
            other => Error::ImageUnavailable {
                url: url.to_string(),
                reason: other.to_string(),
            },
        })?;

        let image = decode(&bytes).map_err(|e| Error::ImageUnavailable {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        if let Err(e) = self.save_to_disk(url, &bytes).await {
            log::warn!("failed to persist {url}: {e}");
        }

        Ok(Arc::new(image))
    }

    fn disk_path(&self, url: &str) -> PathBuf {
        self.inner.cache_dir.join(hex::encode(Sha256::digest(url.as_bytes())))
    }

    async fn load_from_disk(&self, url: &str) -> Option<Image> {
        let path = self.disk_path(url);
        let bytes = tokio::fs::read(&path).await.ok()?;
        match decode(&bytes) {
            Ok(image) => Some(Arc::new(image)),
            Err(e) => {
                log::warn!("dropping undecodable cache file {}: {e}", path.display());
                let _ = tokio::fs::remove_file(&path).await;
                None
            }
        }
    }

    async fn save_to_disk(&self, url: &str, bytes: &[u8]) -> std::io::Result<()> {
        let path = self.disk_path(url);
        let tmp = path.with_extension("tmp");
        tokio::fs::create_dir_all(&self.inner.cache_dir).await?;
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await
    }
}

impl CacheState {
    /// Drops the ledger entry for `url` if it still belongs to `ticket`.
    fn release(&mut self, url: &str, ticket: u64) {
        if self.in_flight.get(url).is_some_and(|entry| entry.ticket == ticket) {
            self.in_flight.remove(url);
        }
    }
}

impl MemoryStore {
    fn new(capacity: usize) -> Self {
        Self {
            images: HashMap::new(),
            access_order: VecDeque::new(),
            capacity,
        }
    }

    fn contains(&self, url: &str) -> bool {
        self.images.contains_key(url)
    }

    fn get(&mut self, url: &str) -> Option<Image> {
        let image = self.images.get(url).cloned()?;
        self.touch(url);
        Some(image)
    }

    fn insert(&mut self, url: String, image: Image) {
        if self.capacity == 0 {
            return;
        }

        if !self.images.contains_key(&url) && self.images.len() >= self.capacity {
            if let Some(oldest) = self.access_order.pop_front() {
                self.images.remove(&oldest);
            }
        }

        self.touch(&url);
        self.images.insert(url, image);
    }

    fn touch(&mut self, url: &str) {
        self.access_order.retain(|k| k != url);
        self.access_order.push_back(url.to_string());
    }
}

fn decode(bytes: &[u8]) -> image::ImageResult<DynamicImage> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .decode()
}
