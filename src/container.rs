use std::sync::Arc;

use crate::backend::cache::ImageCache;
use crate::backend::gallery::{DirectoryGallery, GalleryClient, SaveToGallery};
use crate::backend::http::{HttpClient, ReqwestClient};
use crate::backend::images::{CachedImageRepository, ImageRepository};
use crate::backend::pokeapi::{PokeApiRepository, PokemonDetail, PokemonRepository};
use crate::config::Config;
use crate::error::Result;
use crate::ui::detail::DetailController;
use crate::ui::list::ListController;

/// Builds the object graph once and hands out controllers.
///
/// Create it at startup and pass it (or the pieces it holds) down; the
/// image cache inside is the one every controller shares.
pub struct Container {
    pub config: Config,
    pub image_cache: ImageCache,
    pub pokemon_repository: Arc<dyn PokemonRepository>,
    pub image_repository: Arc<dyn ImageRepository>,
    pub save_to_gallery: SaveToGallery,
}

impl Container {
    pub fn live(config: Config) -> Result<Self> {
        let http: Arc<dyn HttpClient> = Arc::new(ReqwestClient::new(&config)?);
        let gallery: Arc<dyn GalleryClient> =
            Arc::new(DirectoryGallery::new(config.gallery_dir.clone()));
        Ok(Self::with_parts(config, http, gallery))
    }

    /// Wires the container around caller-supplied transport and gallery.
    pub fn with_parts(
        config: Config,
        http: Arc<dyn HttpClient>,
        gallery: Arc<dyn GalleryClient>,
    ) -> Self {
        let image_cache =
            ImageCache::new(http.clone(), config.cache_dir.clone(), config.memory_capacity);
        let image_repository: Arc<dyn ImageRepository> =
            Arc::new(CachedImageRepository::new(image_cache.clone()));
        let pokemon_repository: Arc<dyn PokemonRepository> =
            Arc::new(PokeApiRepository::new(http, config.api_base.clone()));

        Self {
            config,
            image_cache,
            pokemon_repository,
            image_repository,
            save_to_gallery: SaveToGallery::new(gallery),
        }
    }

    pub fn make_list_controller(&self) -> ListController {
        ListController::new(
            self.pokemon_repository.clone(),
            self.image_repository.clone(),
            self.config.page_size,
            self.config.prefetch_window,
        )
    }

    pub fn make_detail_controller(&self, detail: PokemonDetail) -> DetailController {
        DetailController::new(detail, self.image_repository.clone(), self.save_to_gallery.clone())
    }
}
