//! App module - root state, screen switching and shared helpers

mod generator_view;
mod images;
mod sign_in;

use crate::generator::Generator;
use crate::platform::Platform;
use crate::settings::Settings;
use crate::theme;
use crate::utils::rasterize_logo;
use eframe::egui;
use images::ImageCache;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Which top-level screen is shown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    SignIn,
    Generator,
}

impl Screen {
    pub fn for_platform(platform: &dyn Platform) -> Self {
        if platform.is_signed_in() {
            Self::Generator
        } else {
            Self::SignIn
        }
    }
}

// ============================================================================
// APP STATE
// ============================================================================

pub struct App {
    pub(crate) platform: Arc<dyn Platform>,
    pub(crate) generator: Generator,
    pub(crate) screen: Screen,
    pub(crate) runtime: tokio::runtime::Runtime,
    pub(crate) images: ImageCache,
    pub(crate) logo_texture: Option<egui::TextureHandle>,
    pub(crate) focus_theme_input: bool,
    // Window geometry, saved on exit
    pub(crate) window_pos: Option<egui::Pos2>,
    pub(crate) window_size: Option<egui::Vec2>,
    pub(crate) needs_center: bool,
    pub(crate) settings: Settings,
    pub(crate) data_dir: PathBuf,
}

// ============================================================================
// APP INITIALIZATION & HELPERS
// ============================================================================

impl App {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        platform: Arc<dyn Platform>,
        runtime: tokio::runtime::Runtime,
        settings: Settings,
        data_dir: PathBuf,
    ) -> Self {
        cc.egui_ctx.set_theme(egui::Theme::Dark);

        let mut fonts = egui::FontDefinitions::default();
        egui_phosphor::add_to_fonts(&mut fonts, egui_phosphor::Variant::Regular);
        cc.egui_ctx.set_fonts(fonts);

        theme::apply_visuals(&cc.egui_ctx);

        // Platform state changes off the UI thread (sign-in, credits, sync)
        let repaint_ctx = cc.egui_ctx.clone();
        platform.set_change_notifier(Arc::new(move || repaint_ctx.request_repaint()));

        let logo_texture = rasterize_logo(256).map(|(pixels, w, h)| {
            cc.egui_ctx.load_texture(
                "logo",
                egui::ColorImage::from_rgba_unmultiplied([w as usize, h as usize], &pixels),
                egui::TextureOptions::LINEAR,
            )
        });

        let generator = Generator::new(platform.storage());
        let screen = Screen::for_platform(platform.as_ref());
        debug!(?screen, history = generator.history().len(), "App initialized");

        Self {
            platform,
            generator,
            screen,
            runtime,
            images: ImageCache::default(),
            logo_texture,
            focus_theme_input: true,
            window_pos: None,
            window_size: None,
            needs_center: false,
            settings,
            data_dir,
        }
    }

    pub fn save_settings(&self) {
        let settings = Settings {
            window_x: self.window_pos.map(|p| p.x),
            window_y: self.window_pos.map(|p| p.y),
            window_w: self.window_size.map(|s| s.x),
            window_h: self.window_size.map(|s| s.y),
            ..self.settings.clone()
        };
        settings.save(&self.data_dir);
    }

    /// Re-evaluates the screen. Leaving the generator discards its UI state.
    pub(crate) fn sync_screen(&mut self) {
        let screen = Screen::for_platform(self.platform.as_ref());
        if screen == self.screen {
            return;
        }
        info!(from = ?self.screen, to = ?screen, "Switching screen");
        if screen == Screen::SignIn {
            self.generator.reset();
        } else {
            self.focus_theme_input = true;
        }
        self.screen = screen;
    }

    /// Submits the current theme. Silently ignored when not ready.
    pub(crate) fn generate(&mut self, ctx: &egui::Context) {
        let repaint_ctx = ctx.clone();
        let client = self.platform.client();
        let started = self
            .generator
            .submit(client, self.runtime.handle(), move || repaint_ctx.request_repaint());
        if started {
            debug!(theme = %self.generator.state.theme, "Generation started");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::fake::FakePlatform;
    use std::sync::atomic::Ordering;

    #[test]
    fn screen_follows_sign_in_flag() {
        let platform = FakePlatform::new(false, None);
        assert_eq!(Screen::for_platform(&platform), Screen::SignIn);

        platform.sign_in();
        assert_eq!(platform.sign_in_calls.load(Ordering::SeqCst), 1);
        assert_eq!(Screen::for_platform(&platform), Screen::Generator);

        platform.sign_out();
        assert_eq!(Screen::for_platform(&platform), Screen::SignIn);
    }
}
