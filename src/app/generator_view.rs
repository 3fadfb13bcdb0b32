//! Generator screen: header, theme input, result and recent themes

use super::images::RemoteImage;
use super::App;
use crate::theme;
use crate::ui::components::{self, label};
use eframe::egui;

#[derive(Default)]
struct HeaderAction {
    sign_out: bool,
    manage_plan: bool,
}

impl App {
    pub(crate) fn render_generator(&mut self, ctx: &egui::Context) {
        let header = self.render_header(ctx);
        if header.sign_out {
            self.platform.sign_out();
            self.sync_screen();
            return;
        }
        if header.manage_plan {
            self.platform.subscribe();
        }

        let mut submit = false;
        let mut upgrade = false;
        let mut selected: Option<usize> = None;

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical()
                .auto_shrink([false; 2])
                .show(ui, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.set_max_width(theme::CONTENT_MAX_WIDTH);
                        ui.add_space(theme::SPACING_XXL);
                        components::logo(ui, self.logo_texture.as_ref(), theme::LOGO_SIZE);
                        label(ui, "Themed Duck Generator", theme::FONT_HERO, theme::TEXT_PRIMARY);
                        label(
                            ui,
                            "Enter any theme to generate a unique duck image",
                            theme::FONT_BODY,
                            theme::TEXT_MUTED,
                        );
                        ui.add_space(theme::SPACING_XL);

                        submit |= self.render_input(ui);

                        if let (Some(kind), Some(message)) =
                            (self.generator.state.error, self.generator.state.error_message())
                        {
                            ui.add_space(theme::SPACING_LG);
                            theme::error_frame().show(ui, |ui| {
                                ui.horizontal_wrapped(|ui| {
                                    label(
                                        ui,
                                        format!("{} {message}", egui_phosphor::regular::WARNING),
                                        theme::FONT_LABEL,
                                        theme::STATUS_ERROR,
                                    );
                                    if kind.offers_upgrade()
                                        && ui.add(theme::button_accent("Upgrade Now")).clicked()
                                    {
                                        upgrade = true;
                                    }
                                });
                            });
                        }

                        ui.add_space(theme::SPACING_XL);
                        if self.generator.state.loading {
                            ui.add(egui::Spinner::new().size(40.0).color(theme::ACCENT));
                            label(ui, "Creating your themed duck...", theme::FONT_BODY, theme::TEXT_MUTED);
                        } else if let Some(url) = self.generator.state.generated_image.clone() {
                            self.render_result(ui, ctx, &url);
                        }

                        if !self.generator.history().is_empty() {
                            ui.add_space(theme::SPACING_XXL);
                            selected = self.render_history(ui);
                        }
                        ui.add_space(theme::SPACING_XXL);
                    });
                });
        });

        if submit {
            self.generate(ctx);
        }
        if upgrade {
            self.platform.subscribe();
        }
        if let Some(index) = selected {
            self.generator.select_history(index);
            self.focus_theme_input = true;
        }
    }

    fn render_header(&mut self, ctx: &egui::Context) -> HeaderAction {
        let mut action = HeaderAction::default();
        let email = self.platform.user().map(|u| u.email).unwrap_or_default();
        let credits = components::format_credits(self.platform.usage().as_ref());
        let subscription = self.platform.subscription_status();
        let plan = components::plan_name(subscription.as_ref()).to_string();

        egui::TopBottomPanel::top("header")
            .exact_height(theme::HEADER_HEIGHT)
            .frame(theme::header_frame())
            .show(ctx, |ui| {
                ui.horizontal_centered(|ui| {
                    label(ui, email, theme::FONT_LABEL, theme::TEXT_SECONDARY);
                    if ui
                        .add(theme::button(format!("{}  Sign Out", egui_phosphor::regular::SIGN_OUT)))
                        .clicked()
                    {
                        action.sign_out = true;
                    }

                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.add(theme::button_accent("Manage Plan")).clicked() {
                            action.manage_plan = true;
                        }
                        ui.add_space(theme::SPACING_MD);
                        ui.horizontal(|ui| {
                            components::stat(ui, "CREDITS", &credits);
                            ui.add_space(theme::SPACING_LG);
                            components::stat(ui, "PLAN", &plan);
                        });
                    });
                });
            });
        action
    }

    /// Theme input and generate button. Returns true when the user submitted.
    fn render_input(&mut self, ui: &mut egui::Ui) -> bool {
        let loading = self.generator.state.loading;
        let mut submit = false;

        ui.horizontal(|ui| {
            let button_width = 160.0;
            let input_width = (ui.available_width() - button_width - theme::SPACING_MD).max(120.0);
            let response = theme::input_frame()
                .show(ui, |ui| {
                    ui.add_enabled(
                        !loading,
                        egui::TextEdit::singleline(&mut self.generator.state.theme)
                            .hint_text("e.g., pirate, astronaut, wizard...")
                            .frame(false)
                            .font(egui::FontId::proportional(theme::FONT_BODY))
                            .desired_width(input_width - 20.0),
                    )
                })
                .inner;

            if self.focus_theme_input && !loading {
                self.focus_theme_input = false;
                response.request_focus();
            }
            if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) && !loading {
                submit = true;
            }

            let text = if loading { "Generating..." } else { "Generate Duck" };
            let enabled = self.generator.state.can_submit();
            if ui
                .add_enabled(enabled, theme::button_primary_large(text, enabled))
                .clicked()
            {
                submit = true;
            }
        });
        submit
    }

    fn render_result(&mut self, ui: &mut egui::Ui, ctx: &egui::Context, url: &str) {
        let caption_theme = self
            .generator
            .state
            .generated_theme
            .clone()
            .unwrap_or_else(|| self.generator.state.theme.clone());

        theme::card_frame().show(ui, |ui| {
            ui.vertical_centered(|ui| {
                let size = egui::vec2(theme::IMAGE_DISPLAY_SIZE, theme::IMAGE_DISPLAY_SIZE);
                match self.remote_image(ctx, url) {
                    Some(RemoteImage::Ready(texture)) => {
                        ui.add(
                            egui::Image::new(egui::load::SizedTexture::new(texture.id(), size))
                                .corner_radius(theme::RADIUS_LARGE)
                                .alt_text(format!("Duck themed as {caption_theme}")),
                        );
                    }
                    Some(RemoteImage::Failed(e)) => {
                        label(
                            ui,
                            format!("{} Couldn't load image: {e}", egui_phosphor::regular::IMAGE_BROKEN),
                            theme::FONT_LABEL,
                            theme::STATUS_ERROR,
                        );
                    }
                    Some(RemoteImage::Loading) | None => {
                        ui.add_sized(size, egui::Spinner::new().color(theme::ACCENT_DARK));
                    }
                }
                ui.add_space(theme::SPACING_MD);
                ui.horizontal(|ui| {
                    label(ui, "Duck themed as:", theme::FONT_LABEL, theme::TEXT_MUTED);
                    ui.add(
                        egui::Label::new(
                            egui::RichText::new(caption_theme.as_str())
                                .size(theme::FONT_LABEL)
                                .color(theme::TEXT_PRIMARY)
                                .strong(),
                        )
                        .selectable(false),
                    );
                });
            });
        });
    }

    /// Recent themes list. Returns the clicked entry index.
    fn render_history(&self, ui: &mut egui::Ui) -> Option<usize> {
        let mut selected = None;
        let status = self.generator.sync_status();

        ui.horizontal(|ui| {
            label(ui, "Recent Themes", theme::FONT_HEADING, theme::TEXT_PRIMARY);
            label(
                ui,
                format!("({status})"),
                theme::FONT_SMALL,
                components::sync_status_color(status),
            );
        });
        ui.add_space(theme::SPACING_SM);
        ui.horizontal_wrapped(|ui| {
            for (index, entry) in self.generator.history().iter().enumerate() {
                if ui.add(theme::button_pill(entry.theme.as_str())).clicked() {
                    selected = Some(index);
                }
            }
        });
        selected
    }
}
