use parking_lot::Mutex;
use std::sync::Arc;

use super::Release;
use crate::backend::images::ImageRepository;
use crate::backend::pokeapi::{PokemonDetail, PokemonRepository, PokemonSummary};
use crate::error::Error;

/// What the list screen renders.
#[derive(Debug, Clone, Default)]
pub struct ListState {
    pub items: Vec<PokemonSummary>,
    /// Full-list load after a reset.
    pub is_loading: bool,
    pub is_refreshing: bool,
    /// Next page being appended.
    pub is_paging: bool,
    pub error: Option<String>,
    /// Detail ready to navigate to; its sprites are already cached.
    pub navigation_detail: Option<PokemonDetail>,
    pub opening_id: Option<i64>,
}

#[derive(Default)]
struct Inner {
    view: ListState,
    page: usize,
    end_reached: bool,
    load_gate: bool,
}

/// Paginated Pokémon list with single-flight loading.
pub struct ListController {
    repository: Arc<dyn PokemonRepository>,
    images: Arc<dyn ImageRepository>,
    page_size: usize,
    prefetch_window: usize,
    state: Mutex<Inner>,
}

impl ListController {
    pub fn new(
        repository: Arc<dyn PokemonRepository>,
        images: Arc<dyn ImageRepository>,
        page_size: usize,
        prefetch_window: usize,
    ) -> Self {
        Self {
            repository,
            images,
            page_size: page_size.max(1),
            prefetch_window,
            state: Mutex::new(Inner::default()),
        }
    }

    pub fn snapshot(&self) -> ListState {
        self.state.lock().view.clone()
    }

    pub fn items(&self) -> Vec<PokemonSummary> {
        self.state.lock().view.items.clone()
    }

    pub fn end_reached(&self) -> bool {
        self.state.lock().end_reached
    }

    pub fn dismiss_error(&self) {
        self.state.lock().view.error = None;
    }

    /// Hands the pending navigation target to the caller, clearing it.
    pub fn take_navigation(&self) -> Option<PokemonDetail> {
        self.state.lock().view.navigation_detail.take()
    }

    /// Loads the first page (`reset`) or appends the next one. Returns
    /// immediately if another load is running.
    pub async fn load(&self, reset: bool) {
        let offset = {
            let mut state = self.state.lock();
            if state.load_gate {
                log::debug!("load(reset={reset}) skipped, another load is running");
                return;
            }
            state.load_gate = true;

            if reset {
                state.page = 0;
                state.end_reached = false;
                state.view.items.clear();
                state.view.is_loading = true;
            } else {
                state.view.is_paging = true;
            }
            state.page * self.page_size
        };
        let _gate = Release::new(&self.state, |state: &mut Inner| {
            state.load_gate = false;
            state.view.is_loading = false;
            state.view.is_paging = false;
        });

        match self.repository.page(self.page_size, offset).await {
            Ok(new_items) => {
                let mut state = self.state.lock();
                state.end_reached = new_items.len() < self.page_size;
                state.view.items.extend(new_items);
                state.page += 1;
            }
            Err(e) => self.fail("load page", &e),
        }
    }

    /// Appends the next page when `current` is within the prefetch window
    /// at the end of the list.
    pub async fn load_next_if_needed(&self, current: &PokemonSummary) {
        let near_end = {
            let state = self.state.lock();
            !state.end_reached
                && state
                    .view
                    .items
                    .iter()
                    .position(|item| item == current)
                    .is_some_and(|idx| idx + self.prefetch_window >= state.view.items.len())
        };

        if near_end {
            self.load(false).await;
        }
    }

    /// Fetches the detail for `item`, caches its sprites, then publishes it
    /// as the navigation target. Nothing is published on failure.
    pub async fn open_detail(&self, item: &PokemonSummary) {
        {
            let mut state = self.state.lock();
            if state.view.opening_id.is_some() {
                return;
            }
            state.view.opening_id = Some(item.id);
        }
        let _opening = Release::new(&self.state, |state: &mut Inner| state.view.opening_id = None);

        let result = async {
            let detail = self.repository.detail(&item.name).await?;
            self.images.preheat(&detail.sprite_urls).await?;
            Ok::<_, Error>(detail)
        }
        .await;

        match result {
            Ok(detail) => self.state.lock().view.navigation_detail = Some(detail),
            Err(e) => self.fail("open detail", &e),
        }
    }

    pub async fn user_refresh(&self) {
        {
            let mut state = self.state.lock();
            if state.view.is_refreshing {
                return;
            }
            state.view.is_refreshing = true;
        }
        let _refreshing = Release::new(&self.state, |state: &mut Inner| {
            state.view.is_refreshing = false
        });

        self.load(true).await;
    }

    fn fail(&self, action: &str, error: &Error) {
        log::warn!("{action} failed: {error}");
        self.state.lock().view.error = Some(error.humanized());
    }
}
