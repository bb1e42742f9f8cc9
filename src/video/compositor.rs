// Webcam overlay compositing
//
// Each camera frame goes through the same fixed pipeline:
// center-crop to square -> resize to overlay size -> circular mask ->
// border ring -> masked blit onto the screen frame.

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use serde::Serialize;
use std::sync::Arc;

use super::mask::CircularMask;

/// Top-left pixel where the overlay is placed on the screen frame.
///
/// Signed so that anchors computed for screens smaller than the overlay
/// stay representable (and are rejected by the bounds check).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Anchor {
    pub x: i64,
    pub y: i64,
}

impl Anchor {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

/// Darker ring drawn first, offset down-right, for a drop shadow
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowStyle {
    pub offset: i64,
    pub color: Rgb<u8>,
}

/// Border ring drawn around the circular overlay
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RingStyle {
    pub thickness: u32,
    pub color: Rgb<u8>,
    pub shadow: Option<ShadowStyle>,
}

impl Default for RingStyle {
    fn default() -> Self {
        Self {
            thickness: 5,
            color: Rgb([255, 255, 255]),
            shadow: None,
        }
    }
}

impl RingStyle {
    /// White 6px ring over a dark ring offset by 3px
    pub fn with_shadow() -> Self {
        Self {
            thickness: 6,
            color: Rgb([255, 255, 255]),
            shadow: Some(ShadowStyle {
                offset: 3,
                color: Rgb([40, 40, 40]),
            }),
        }
    }
}

/// Center region `(x, y, side)` that crops a `width × height` frame to a square
pub fn square_crop_rect(width: u32, height: u32) -> (u32, u32, u32) {
    if height > width {
        (0, (height - width) / 2, width)
    } else if width > height {
        ((width - height) / 2, 0, height)
    } else {
        (0, 0, width)
    }
}

/// Center-crop a frame to a square without scaling
pub fn crop_to_square(frame: &RgbImage) -> RgbImage {
    let (x, y, side) = square_crop_rect(frame.width(), frame.height());
    if side == frame.width() && side == frame.height() {
        return frame.clone();
    }
    imageops::crop_imm(frame, x, y, side, side).to_image()
}

/// Whether a `size × size` region at `anchor` lies fully inside the screen
pub fn overlay_fits(screen_width: u32, screen_height: u32, size: u32, anchor: Anchor) -> bool {
    anchor.x >= 0
        && anchor.y >= 0
        && anchor.x + size as i64 <= screen_width as i64
        && anchor.y + size as i64 <= screen_height as i64
}

/// Copy mask-true overlay pixels onto `screen` at `anchor`.
///
/// Returns `false` without touching the screen when the region does not
/// fit; there is never a partial write.
pub fn blit_masked(
    screen: &mut RgbImage,
    overlay: &RgbImage,
    mask: &CircularMask,
    anchor: Anchor,
) -> bool {
    let size = mask.size();
    if overlay.width() != size || overlay.height() != size {
        return false;
    }
    if !overlay_fits(screen.width(), screen.height(), size, anchor) {
        return false;
    }

    let (ax, ay) = (anchor.x as u32, anchor.y as u32);
    for (x, y) in mask.iter_inside() {
        screen.put_pixel(ax + x, ay + y, *overlay.get_pixel(x, y));
    }
    true
}

fn draw_ring(canvas: &mut RgbImage, cx: f64, cy: f64, radius: f64, thickness: u32, color: Rgb<u8>) {
    let half = thickness as f64 / 2.0;
    for y in 0..canvas.height() {
        let dy = y as f64 - cy;
        for x in 0..canvas.width() {
            let dx = x as f64 - cx;
            let dist = (dx * dx + dy * dy).sqrt();
            if (dist - radius).abs() <= half {
                canvas.put_pixel(x, y, color);
            }
        }
    }
}

/// Turns camera frames into circular overlays and blits them onto screen frames.
///
/// Holds the session's shared mask and a reusable overlay buffer so that no
/// per-frame mask or buffer allocation happens.
pub struct OverlayCompositor {
    mask: Arc<CircularMask>,
    ring: RingStyle,
    overlay: RgbImage,
}

impl OverlayCompositor {
    pub fn new(mask: Arc<CircularMask>, ring: RingStyle) -> Self {
        let size = mask.size();
        Self {
            mask,
            ring,
            overlay: RgbImage::new(size, size),
        }
    }

    pub fn size(&self) -> u32 {
        self.mask.size()
    }

    pub fn mask(&self) -> &CircularMask {
        &self.mask
    }

    /// Render the circular, bordered overlay for one camera frame.
    ///
    /// Pixels outside the mask are left black; the ring is drawn last.
    pub fn render_overlay(&mut self, camera: &RgbImage) -> &RgbImage {
        let size = self.size();
        let square = crop_to_square(camera);
        let resized = imageops::resize(&square, size, size, FilterType::Triangle);

        for pixel in self.overlay.pixels_mut() {
            *pixel = Rgb([0, 0, 0]);
        }
        for (x, y) in self.mask.iter_inside() {
            self.overlay.put_pixel(x, y, *resized.get_pixel(x, y));
        }

        let center = (size / 2) as f64;
        let radius = (size / 2).saturating_sub((self.ring.thickness + 1) / 2) as f64;
        if let Some(shadow) = self.ring.shadow {
            let offset = shadow.offset as f64;
            draw_ring(
                &mut self.overlay,
                center + offset,
                center + offset,
                radius,
                self.ring.thickness,
                shadow.color,
            );
        }
        draw_ring(
            &mut self.overlay,
            center,
            center,
            radius,
            self.ring.thickness,
            self.ring.color,
        );

        &self.overlay
    }

    /// Composite `camera` onto `screen` at `anchor`.
    ///
    /// Returns whether the overlay was applied. An overlay that would not fit
    /// entirely inside the screen is skipped and the screen left untouched.
    pub fn composite(&mut self, screen: &mut RgbImage, camera: &RgbImage, anchor: Anchor) -> bool {
        if camera.width() == 0 || camera.height() == 0 {
            return false;
        }
        if !overlay_fits(screen.width(), screen.height(), self.size(), anchor) {
            return false;
        }

        self.render_overlay(camera);
        blit_masked(screen, &self.overlay, &self.mask, anchor)
    }
}
