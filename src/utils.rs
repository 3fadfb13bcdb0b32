//! Utility functions

use crate::constants::APP_NAME;
use std::path::PathBuf;

// Square viewBox so the same art works for the header logo and window icon
pub const DUCK_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 128 128"><ellipse cx="62" cy="90" rx="46" ry="28" fill="#facc15"/><path d="M96 76c14-6 22-2 26 4-8 2-14 8-26 6z" fill="#facc15"/><circle cx="48" cy="46" r="26" fill="#facc15"/><path d="M20 46c-10-2-16 2-18 6 6 4 14 4 20 2z" fill="#f97316"/><circle cx="40" cy="40" r="4" fill="#1c1917"/><circle cx="41" cy="39" r="1.3" fill="#fff"/><path d="M46 86c12 10 30 12 44 4" stroke="#ca8a04" stroke-width="4" fill="none" stroke-linecap="round"/></svg>"##;

/// Rasterize the duck SVG to a square RGBA image of `size` x `size` pixels.
pub fn rasterize_logo(size: u32) -> Option<(Vec<u8>, u32, u32)> {
    let tree = resvg::usvg::Tree::from_str(DUCK_SVG, &resvg::usvg::Options::default()).ok()?;
    let scale = size as f32 / tree.size().width();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size, size)?;
    resvg::render(
        &tree,
        resvg::usvg::Transform::from_scale(scale, scale),
        &mut pixmap.as_mut(),
    );
    Some((premul_to_straight(pixmap.data()), size, size))
}

/// Convert premultiplied RGBA bytes to straight alpha.
fn premul_to_straight(data: &[u8]) -> Vec<u8> {
    data.chunks_exact(4)
        .flat_map(|p| {
            let a = p[3];
            if a == 0 {
                [0, 0, 0, 0]
            } else {
                let r = (p[0] as u16 * 255 / a as u16) as u8;
                let g = (p[1] as u16 * 255 / a as u16) as u8;
                let b = (p[2] as u16 * 255 / a as u16) as u8;
                [r, g, b, a]
            }
        })
        .collect()
}

/// Get the app data directory path
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn premul_conversion() {
        let px = premul_to_straight(&[0, 0, 0, 0, 64, 32, 0, 128, 255, 255, 255, 255]);
        assert_eq!(&px[0..4], &[0, 0, 0, 0]);
        assert_eq!(&px[4..8], &[127, 63, 0, 128]);
        assert_eq!(&px[8..12], &[255, 255, 255, 255]);
    }

    #[test]
    fn logo_rasterizes_at_requested_size() {
        let (pixels, w, h) = rasterize_logo(64).unwrap();
        assert_eq!((w, h), (64, 64));
        assert_eq!(pixels.len(), 64 * 64 * 4);
        assert!(pixels.chunks_exact(4).any(|p| p[3] > 0));
    }

    #[test]
    fn data_dir_is_app_scoped() {
        assert!(get_data_dir().ends_with(APP_NAME));
    }
}
