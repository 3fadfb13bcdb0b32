//! Reusable UI components
//!
//! This module contains standalone UI components that can be used
//! throughout the application.

use crate::platform::{SubscriptionStatus, SyncStatus, Usage};
use crate::theme;
use eframe::egui;

/// Remaining credits for display, "0" when unknown
pub fn format_credits(usage: Option<&Usage>) -> String {
    usage.map_or(0, |u| u.remaining_credits).to_string()
}

/// Plan name for display, "Free" when unknown
pub fn plan_name(status: Option<&SubscriptionStatus>) -> &str {
    status
        .and_then(|s| s.plan.as_ref())
        .map_or("Free", |p| p.name.as_str())
}

pub fn sync_status_color(status: SyncStatus) -> egui::Color32 {
    match status {
        SyncStatus::Synced => theme::STATUS_SUCCESS,
        SyncStatus::Syncing | SyncStatus::Idle => theme::TEXT_DIM,
        SyncStatus::Offline => theme::STATUS_WARNING,
        SyncStatus::Error => theme::STATUS_ERROR,
    }
}

/// Non-selectable label, the default for static text in this app
pub fn label(ui: &mut egui::Ui, text: impl Into<String>, size: f32, color: egui::Color32) -> egui::Response {
    ui.add(egui::Label::new(egui::RichText::new(text).size(size).color(color)).selectable(false))
}

/// Small "LABEL value" pair used in the header
pub fn stat(ui: &mut egui::Ui, name: &str, value: &str) {
    ui.spacing_mut().item_spacing.x = theme::SPACING_SM;
    label(ui, name, theme::FONT_SMALL, theme::TEXT_DIM);
    label(ui, value, theme::FONT_LABEL, theme::ACCENT);
}

/// Duck logo, drawn at `size` points
pub fn logo(ui: &mut egui::Ui, texture: Option<&egui::TextureHandle>, size: f32) {
    match texture {
        Some(texture) => {
            ui.image(egui::load::SizedTexture::new(texture.id(), egui::vec2(size, size)));
        }
        None => {
            label(ui, "🦆", size * 0.75, theme::ACCENT);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Plan;

    #[test]
    fn credits_default_to_zero() {
        assert_eq!(format_credits(None), "0");
        assert_eq!(
            format_credits(Some(&Usage {
                remaining_credits: 42
            })),
            "42"
        );
    }

    #[test]
    fn plan_defaults_to_free() {
        assert_eq!(plan_name(None), "Free");
        assert_eq!(plan_name(Some(&SubscriptionStatus { plan: None })), "Free");
        let pro = SubscriptionStatus {
            plan: Some(Plan { name: "Pro".into() }),
        };
        assert_eq!(plan_name(Some(&pro)), "Pro");
    }

    #[test]
    fn sync_colors() {
        assert_eq!(sync_status_color(SyncStatus::Error), theme::STATUS_ERROR);
        assert_eq!(sync_status_color(SyncStatus::Synced), theme::STATUS_SUCCESS);
    }
}
