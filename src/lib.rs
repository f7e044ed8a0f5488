//! Catalog client core for the PokeAPI: paginated list loading, detail
//! fetches, a two-tier sprite cache and saving sprites to a local gallery.
//!
//! Everything is wired explicitly through [`Container`]; there is no global
//! state.

pub mod backend;
pub mod config;
pub mod container;
pub mod error;
pub mod ui;

#[cfg(test)]
mod test_support;

pub use backend::cache::{Image, ImageCache};
pub use backend::gallery::{Authorization, DirectoryGallery, GalleryClient, SaveToGallery};
pub use backend::http::{HttpClient, ReqwestClient};
pub use backend::images::{CachedImageRepository, ImageRepository};
pub use backend::pokeapi::{
    PokeApiRepository, PokemonDetail, PokemonRepository, PokemonSummary, Stat,
};
pub use config::Config;
pub use container::Container;
pub use error::{DecodingKind, Error, Result};
pub use ui::detail::{DetailController, DetailState};
pub use ui::list::{ListController, ListState};
