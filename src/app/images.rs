//! Generated image download and texture cache

use super::App;
use eframe::egui;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

pub(crate) enum RemoteImage {
    Loading,
    Ready(egui::TextureHandle),
    Failed(String),
}

type Downloads = Arc<Mutex<HashMap<String, Result<egui::ColorImage, String>>>>;

#[derive(Default)]
pub(crate) struct ImageCache {
    entries: HashMap<String, RemoteImage>,
    downloads: Downloads,
}

impl ImageCache {
    /// Takes the finished download for `url`, dropping results for any older URL.
    fn take_download(&self, url: &str) -> Option<Result<egui::ColorImage, String>> {
        let mut downloads = self.downloads.lock().ok()?;
        let result = downloads.remove(url);
        downloads.clear();
        result
    }
}

fn decode_image(bytes: &[u8]) -> Result<egui::ColorImage, String> {
    let rgba = image::load_from_memory(bytes)
        .map_err(|e| e.to_string())?
        .to_rgba8();
    let size = [rgba.width() as usize, rgba.height() as usize];
    Ok(egui::ColorImage::from_rgba_unmultiplied(size, rgba.as_raw()))
}

async fn fetch_image(url: &str) -> Result<egui::ColorImage, String> {
    let response = reqwest::get(url).await.map_err(|e| e.to_string())?;
    if !response.status().is_success() {
        return Err(format!("HTTP {}", response.status()));
    }
    let bytes = response.bytes().await.map_err(|e| e.to_string())?;
    decode_image(&bytes)
}

impl App {
    /// Returns the texture state for `url`, starting a download on first sight.
    /// Only the most recent image is kept.
    pub(crate) fn remote_image(&mut self, ctx: &egui::Context, url: &str) -> Option<&RemoteImage> {
        if let Some(result) = self.images.take_download(url) {
            let entry = match result {
                Ok(image) => RemoteImage::Ready(ctx.load_texture(
                    url,
                    image,
                    egui::TextureOptions::LINEAR,
                )),
                Err(e) => {
                    warn!(url, error = %e, "Failed to load generated image");
                    RemoteImage::Failed(e)
                }
            };
            self.images.entries.insert(url.to_string(), entry);
        }

        if !self.images.entries.contains_key(url) {
            self.images.entries.clear();
            self.images
                .entries
                .insert(url.to_string(), RemoteImage::Loading);

            debug!(url, "Downloading generated image");
            let downloads = self.images.downloads.clone();
            let url_owned = url.to_string();
            let ctx = ctx.clone();
            self.runtime.spawn(async move {
                let result = fetch_image(&url_owned).await;
                if let Ok(mut downloads) = downloads.lock() {
                    downloads.insert(url_owned, result);
                }
                ctx.request_repaint();
            });
        }

        self.images.entries.get(url)
    }
}
