use futures::StreamExt;
use futures::stream::FuturesUnordered;
use parking_lot::Mutex;
use std::sync::Arc;

use super::Release;
use crate::backend::cache::Image;
use crate::backend::gallery::SaveToGallery;
use crate::backend::images::ImageRepository;
use crate::backend::pokeapi::PokemonDetail;

#[derive(Debug, Clone, Default)]
pub struct DetailState {
    /// Loaded sprites in sprite URL order; failed ones are left out.
    pub images: Vec<Image>,
    pub is_loading: bool,
    /// Transient confirmation or error. Clearing it after a delay is up to
    /// the presentation layer.
    pub toast: Option<String>,
}

pub struct DetailController {
    detail: PokemonDetail,
    images: Arc<dyn ImageRepository>,
    saver: SaveToGallery,
    state: Mutex<DetailState>,
}

impl DetailController {
    pub fn new(
        detail: PokemonDetail,
        images: Arc<dyn ImageRepository>,
        saver: SaveToGallery,
    ) -> Self {
        Self {
            detail,
            images,
            saver,
            state: Mutex::new(DetailState::default()),
        }
    }

    pub fn detail(&self) -> &PokemonDetail {
        &self.detail
    }

    pub fn snapshot(&self) -> DetailState {
        self.state.lock().clone()
    }

    pub fn images(&self) -> Vec<Image> {
        self.state.lock().images.clone()
    }

    pub fn dismiss_toast(&self) {
        self.state.lock().toast = None;
    }

    /// Loads this Pokémon's own sprites; normally cache hits after
    /// the list preheated them.
    pub async fn load_from_cache(&self) {
        self.load_images(&self.detail.sprite_urls).await;
    }

    /// Fetches every URL concurrently and publishes the successes in URL
    /// order. Does nothing once images are loaded.
    pub async fn load_images(&self, urls: &[String]) {
        {
            let mut state = self.state.lock();
            if !state.images.is_empty() || state.is_loading {
                return;
            }
            state.is_loading = true;
        }
        let _loading = Release::new(&self.state, |state: &mut DetailState| {
            state.is_loading = false
        });

        let mut pending: FuturesUnordered<_> = urls
            .iter()
            .enumerate()
            .map(|(idx, url)| async move { (idx, self.images.image(url).await) })
            .collect();

        let mut slots: Vec<Option<Image>> = vec![None; urls.len()];
        while let Some((idx, result)) = pending.next().await {
            match result {
                Ok(image) => slots[idx] = Some(image),
                Err(e) => log::warn!("dropping sprite {}: {e}", urls[idx]),
            }
        }

        self.state.lock().images = slots.into_iter().flatten().collect();
    }

    pub async fn save_one(&self, image: Image) {
        let toast = match self.saver.save_one(image).await {
            Ok(()) => "Saved to gallery".to_string(),
            Err(e) => e.humanized(),
        };
        self.state.lock().toast = Some(toast);
    }

    pub async fn save_all(&self) {
        let images = self.images();
        let toast = match self.saver.save_all(&images).await {
            Ok(()) => format!("Saved {} images", images.len()),
            Err(e) => e.humanized(),
        };
        self.state.lock().toast = Some(toast);
    }
}
