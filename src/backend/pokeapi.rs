use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

use super::http::HttpClient;
use crate::error::Result;

const IMAGE_EXTENSIONS: [&str; 5] = [".png", ".jpg", ".jpeg", ".gif", ".webp"];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PokemonSummary {
    pub id: i64,
    pub name: String,
    pub detail_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Stat {
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PokemonDetail {
    pub id: i64,
    pub name: String,
    pub stats: Vec<Stat>,
    /// Every sprite URL known for this Pokémon, without duplicates.
    pub sprite_urls: Vec<String>,
}

#[async_trait]
pub trait PokemonRepository: Send + Sync {
    async fn page(&self, limit: usize, offset: usize) -> Result<Vec<PokemonSummary>>;
    async fn detail(&self, name_or_id: &str) -> Result<PokemonDetail>;
}

#[derive(Debug, Deserialize)]
struct PokemonListResponse {
    count: u64,
    results: Vec<NamedResource>,
}

#[derive(Debug, Deserialize)]
struct NamedResource {
    name: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct PokemonResponse {
    id: i64,
    name: String,
    stats: Vec<StatEntry>,
    sprites: Sprites,
}

#[derive(Debug, Deserialize)]
struct StatEntry {
    base_stat: i64,
    stat: StatName,
}

#[derive(Debug, Deserialize)]
struct StatName {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Sprites {
    front_default: Option<String>,
    front_shiny: Option<String>,
    back_default: Option<String>,
    back_shiny: Option<String>,
    other: Option<OtherSprites>,
}

#[derive(Debug, Deserialize)]
struct OtherSprites {
    #[serde(rename = "official-artwork")]
    official_artwork: Option<Artwork>,
}

#[derive(Debug, Deserialize)]
struct Artwork {
    front_default: Option<String>,
}

fn parse_pokemon_list(response: PokemonListResponse) -> Vec<PokemonSummary> {
    response
        .results
        .into_iter()
        .map(|r| PokemonSummary {
            id: id_from_url(&r.url),
            name: capitalize(&r.name),
            detail_url: r.url,
        })
        .collect()
}

fn parse_pokemon_detail(response: PokemonResponse, raw: &Value) -> PokemonDetail {
    let stats = response
        .stats
        .into_iter()
        .map(|s| Stat {
            name: capitalize(&s.stat.name),
            value: s.base_stat,
        })
        .collect();

    let sprites = response.sprites;
    let artwork = sprites
        .other
        .and_then(|o| o.official_artwork)
        .and_then(|a| a.front_default);

    let mut urls = OrderedUrls::default();
    for url in [
        sprites.front_default,
        sprites.front_shiny,
        sprites.back_default,
        sprites.back_shiny,
        artwork,
    ]
    .into_iter()
    .flatten()
    {
        urls.insert(url);
    }

    // Sprite fields differ between API versions; pick up whatever else is there.
    if let Some(raw_sprites) = raw.get("sprites") {
        collect_image_urls(raw_sprites, &mut urls);
    }

    PokemonDetail {
        id: response.id,
        name: capitalize(&response.name),
        stats,
        sprite_urls: urls.into_vec(),
    }
}

fn collect_image_urls(value: &Value, urls: &mut OrderedUrls) {
    match value {
        Value::Object(map) => map.values().for_each(|v| collect_image_urls(v, urls)),
        Value::Array(items) => items.iter().for_each(|v| collect_image_urls(v, urls)),
        Value::String(s) if looks_like_image_url(s) => urls.insert(s.clone()),
        _ => {}
    }
}

fn looks_like_image_url(s: &str) -> bool {
    let lower = s.to_ascii_lowercase();
    lower.contains("http") && IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Numeric id from the last path segment, e.g. `.../pokemon/25/` -> 25.
/// Anything non-numeric yields 0.
fn id_from_url(url: &str) -> i64 {
    let segment = url.trim_end_matches('/').rsplit('/').next().unwrap_or_default();
    let stem = segment.rsplit_once('.').map_or(segment, |(stem, _)| stem);
    stem.parse().unwrap_or(0)
}

/// Upper-cases the first letter of every word, e.g. `mr-mime` -> `Mr-Mime`.
fn capitalize(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut word_start = true;
    for c in s.chars() {
        if word_start {
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }
        word_start = c.is_whitespace() || c == '-';
    }
    out
}

#[derive(Default)]
struct OrderedUrls {
    seen: HashSet<String>,
    urls: Vec<String>,
}

impl OrderedUrls {
    fn insert(&mut self, url: String) {
        if !url.is_empty() && self.seen.insert(url.clone()) {
            self.urls.push(url);
        }
    }

    fn into_vec(self) -> Vec<String> {
        self.urls
    }
}

/// [`PokemonRepository`] backed by the public PokeAPI.
pub struct PokeApiRepository {
    http: Arc<dyn HttpClient>,
    base_url: String,
}

impl PokeApiRepository {
    pub fn new(http: Arc<dyn HttpClient>, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl PokemonRepository for PokeApiRepository {
    async fn page(&self, limit: usize, offset: usize) -> Result<Vec<PokemonSummary>> {
        let url = format!("{}/pokemon?limit={}&offset={}", self.base_url, limit, offset);

        let body = self.http.get(&url).await?;
        let response: PokemonListResponse = serde_json::from_slice(&body)?;
        log::debug!(
            "page offset={} returned {} of {} pokemon",
            offset,
            response.results.len(),
            response.count
        );

        Ok(parse_pokemon_list(response))
    }

    async fn detail(&self, name_or_id: &str) -> Result<PokemonDetail> {
        let key = name_or_id.to_lowercase();
        let url = format!("{}/pokemon/{}", self.base_url, urlencoding::encode(&key));

        let body = self.http.get(&url).await?;
        let raw: Value = serde_json::from_slice(&body)?;
        let response = PokemonResponse::deserialize(&raw)?;

        Ok(parse_pokemon_detail(response, &raw))
    }
}
