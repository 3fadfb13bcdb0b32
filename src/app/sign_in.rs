//! Sign-in screen shown while no session exists

use super::App;
use crate::theme;
use crate::ui::components::{label, logo};
use eframe::egui;

impl App {
    pub(crate) fn render_sign_in(&mut self, ctx: &egui::Context) {
        let mut sign_in = false;

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.add_space((ui.available_height() * 0.22).max(theme::SPACING_XXL));
                logo(ui, self.logo_texture.as_ref(), theme::LOGO_SIZE_LARGE);
                ui.add_space(theme::SPACING_LG);
                label(ui, "Themed Duck Generator", theme::FONT_HERO, theme::TEXT_PRIMARY);
                label(
                    ui,
                    "Generate custom duck images with any theme you can imagine",
                    theme::FONT_BODY,
                    theme::TEXT_MUTED,
                );
                ui.add_space(theme::SPACING_XXL);

                let pending = self.platform.sign_in_pending();
                let text = if pending {
                    "Waiting for browser sign-in...".to_string()
                } else {
                    format!("{}  Sign In to Start Generating", egui_phosphor::regular::SIGN_IN)
                };
                if ui
                    .add_enabled(!pending, theme::button_primary_large(text, !pending))
                    .clicked()
                {
                    sign_in = true;
                }
                if pending {
                    ui.add_space(theme::SPACING_MD);
                    ui.add(egui::Spinner::new().color(theme::ACCENT));
                }
            });
        });

        if sign_in {
            self.platform.sign_in();
        }
    }
}
