use async_trait::async_trait;

use super::cache::{Image, ImageCache};
use crate::error::Result;

/// Image access as seen by the controllers.
#[async_trait]
pub trait ImageRepository: Send + Sync {
    async fn image(&self, url: &str) -> Result<Image>;

    /// Warms the cache so later [`ImageRepository::image`] calls are hits.
    async fn preheat(&self, urls: &[String]) -> Result<()>;
}

pub struct CachedImageRepository {
    cache: ImageCache,
}

impl CachedImageRepository {
    pub fn new(cache: ImageCache) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl ImageRepository for CachedImageRepository {
    async fn image(&self, url: &str) -> Result<Image> {
        self.cache.fetch(url).await
    }

    async fn preheat(&self, urls: &[String]) -> Result<()> {
        self.cache.preheat(urls).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{StubHttp, png_bytes};
    use std::sync::Arc;

    #[tokio::test]
    async fn preheat_then_image_is_served_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        let http = Arc::new(StubHttp::new());
        let urls = vec![
            "https://cdn.test/p/1.png".to_string(),
            "https://cdn.test/p/2.png".to_string(),
        ];
        http.respond(&urls[0], Ok(png_bytes(1, 1)));
        http.respond(&urls[1], Ok(png_bytes(2, 2)));

        let cache = ImageCache::new(http.clone(), dir.path().to_path_buf(), 8);
        let repository = CachedImageRepository::new(cache);

        repository.preheat(&urls).await.unwrap();
        let first = repository.image(&urls[0]).await.unwrap();
        let second = repository.image(&urls[1]).await.unwrap();

        assert_eq!((first.width(), second.width()), (1, 2));
        assert_eq!(http.total_calls(), 2);
    }
}
