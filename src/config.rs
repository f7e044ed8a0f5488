use std::path::PathBuf;
use std::time::Duration;

const API_BASE: &str = "https://pokeapi.co/api/v2";
const PAGE_SIZE: usize = 20;
const PREFETCH_WINDOW: usize = 5;
const MAX_MEMORY_IMAGES: usize = 228;
const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Runtime settings shared by every component built from a [`crate::Container`].
#[derive(Debug, Clone)]
pub struct Config {
    pub api_base: String,
    /// Items requested per list page.
    pub page_size: usize,
    /// How close to the end of the list an item must be to trigger the next page.
    pub prefetch_window: usize,
    /// Entry bound of the in-memory image tier.
    pub memory_capacity: usize,
    pub cache_dir: PathBuf,
    pub gallery_dir: PathBuf,
    pub user_agent: String,
    pub request_timeout: Duration,
}

impl Config {
    pub fn new() -> Self {
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pokedex-core")
            .join("images");

        let gallery_dir = dirs::picture_dir()
            .map(|dir| dir.join("pokedex-core"))
            .unwrap_or_else(|| PathBuf::from("gallery"));

        Self {
            api_base: API_BASE.to_string(),
            page_size: PAGE_SIZE,
            prefetch_window: PREFETCH_WINDOW,
            memory_capacity: MAX_MEMORY_IMAGES,
            cache_dir,
            gallery_dir,
            user_agent: format!("pokedex-core/{}", env!("CARGO_PKG_VERSION")),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    pub fn with_gallery_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.gallery_dir = dir.into();
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_memory_capacity(mut self, capacity: usize) -> Self {
        self.memory_capacity = capacity;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
