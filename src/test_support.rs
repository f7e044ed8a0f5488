//! Doubles and fixtures shared by the unit tests.

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::cache::Image;
use crate::backend::http::HttpClient;
use crate::backend::images::ImageRepository;
use crate::error::{Error, Result};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn solid_image(width: u32, height: u32) -> Image {
    let buffer = RgbaImage::from_pixel(width, height, Rgba([200, 30, 30, 255]));
    Arc::new(DynamicImage::ImageRgba8(buffer))
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    solid_image(width, height)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

/// Canned responses per URL, with call counting and an optional delay.
#[derive(Default)]
pub struct StubHttp {
    responses: Mutex<HashMap<String, Result<Vec<u8>>>>,
    requests: Mutex<Vec<String>>,
    delay: Duration,
}

impl StubHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn respond(&self, url: &str, response: Result<Vec<u8>>) {
        self.responses.lock().insert(url.to_string(), response);
    }

    pub fn calls(&self, url: &str) -> usize {
        self.requests.lock().iter().filter(|u| *u == url).count()
    }

    pub fn total_calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requested(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl HttpClient for StubHttp {
    async fn get(&self, url: &str) -> Result<Vec<u8>> {
        self.requests.lock().push(url.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.responses
            .lock()
            .get(url)
            .cloned()
            .unwrap_or(Err(Error::BadStatus(404)))
    }
}

/// Image repository serving fixed images per URL after a per-URL delay.
#[derive(Default)]
pub struct StubImages {
    images: Mutex<HashMap<String, (Duration, Result<Image>)>>,
    preheated: Mutex<Vec<Vec<String>>>,
    preheat_error: Mutex<Option<Error>>,
}

impl StubImages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, url: &str, delay: Duration, image: Result<Image>) {
        self.images.lock().insert(url.to_string(), (delay, image));
    }

    pub fn fail_preheat(&self, error: Error) {
        *self.preheat_error.lock() = Some(error);
    }

    pub fn preheated(&self) -> Vec<Vec<String>> {
        self.preheated.lock().clone()
    }
}

#[async_trait]
impl ImageRepository for StubImages {
    async fn image(&self, url: &str) -> Result<Image> {
        let entry = self.images.lock().get(url).cloned();
        let Some((delay, image)) = entry else {
            return Err(Error::ImageUnavailable {
                url: url.to_string(),
                reason: "not stubbed".to_string(),
            });
        };
        tokio::time::sleep(delay).await;
        image
    }

    async fn preheat(&self, urls: &[String]) -> Result<()> {
        self.preheated.lock().push(urls.to_vec());
        match self.preheat_error.lock().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
