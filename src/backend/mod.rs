pub mod cache;
pub mod gallery;
pub mod http;
pub mod images;
pub mod pokeapi;
