//! RGBA8 drawing surfaces
//!
//! A minimal 2D target for the compositor: scaled image draws with an optional
//! rounded-rectangle clip, alpha-blended strokes and whole-surface filters.

use super::filters::Filter;
use crate::types::VideoFrame;

/// Axis-aligned rectangle in surface pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    /// Create a new rectangle
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle covering a whole `width` x `height` area
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0.0, 0.0, width as f32, height as f32)
    }

    /// `width` x `height` rectangle centred in a container
    pub fn centered(container: (u32, u32), width: f32, height: f32) -> Self {
        Self::new(
            container.0 as f32 / 2.0 - width / 2.0,
            container.1 as f32 / 2.0 - height / 2.0,
            width,
            height,
        )
    }

    /// Whether a point lies inside the rectangle
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }

    /// Integer pixel bounds clipped to a surface: (x0, y0, x1, y1), end exclusive
    fn pixel_bounds(&self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let x0 = self.x.floor().clamp(0.0, width as f32) as u32;
        let y0 = self.y.floor().clamp(0.0, height as f32) as u32;
        let x1 = (self.x + self.width).ceil().clamp(0.0, width as f32) as u32;
        let y1 = (self.y + self.height).ceil().clamp(0.0, height as f32) as u32;
        (x0, y0, x1, y1)
    }
}

/// Rectangle with rounded corners, used as a clip path
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundedRect {
    pub rect: Rect,
    pub radius: f32,
}

impl RoundedRect {
    /// Create a new rounded rectangle
    pub fn new(rect: Rect, radius: f32) -> Self {
        Self { rect, radius }
    }

    /// Whether a point lies inside the rounded shape
    pub fn contains(&self, x: f32, y: f32) -> bool {
        if !self.rect.contains(x, y) {
            return false;
        }
        let r = self
            .radius
            .min(self.rect.width / 2.0)
            .min(self.rect.height / 2.0)
            .max(0.0);
        if r == 0.0 {
            return true;
        }
        let cx = x.clamp(self.rect.x + r, self.rect.x + self.rect.width - r);
        let cy = y.clamp(self.rect.y + r, self.rect.y + self.rect.height - r);
        let (dx, dy) = (x - cx, y - cy);
        dx * dx + dy * dy <= r * r
    }
}

/// Source-over blend of one RGBA pixel onto another
fn blend(dst: &mut [u8; 4], src: [u8; 4]) {
    let alpha = src[3] as u32;
    if alpha == 255 {
        *dst = src;
        return;
    }
    if alpha == 0 {
        return;
    }
    for i in 0..3 {
        dst[i] = ((src[i] as u32 * alpha + dst[i] as u32 * (255 - alpha)) / 255) as u8;
    }
    dst[3] = (alpha + dst[3] as u32 * (255 - alpha) / 255).min(255) as u8;
}

/// Owned RGBA8 output surface
#[derive(Debug, Clone)]
pub struct Surface {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Surface {
    /// Create a transparent surface
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * 4],
        }
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// (width, height)
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Packed RGBA data
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    fn pixels_mut(&mut self) -> &mut [[u8; 4]] {
        bytemuck::cast_slice_mut(&mut self.data)
    }

    /// Pixel at (x, y), or `None` outside the surface
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        self.data
            .get(idx..idx + 4)
            .and_then(|px| px.try_into().ok())
    }

    /// Reset every pixel to transparent black
    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    /// Copy of the current contents as a frame
    pub fn snapshot(&self) -> VideoFrame {
        VideoFrame::new(self.width, self.height, self.data.clone())
    }

    /// Draw `src` scaled into `dest`, optionally clipped to a rounded rectangle
    ///
    /// Sampling is nearest-neighbour at pixel centres. A zero-sized source draws nothing.
    pub fn draw_image(&mut self, src: &VideoFrame, dest: Rect, clip: Option<&RoundedRect>) {
        if !src.is_ready() || dest.width <= 0.0 || dest.height <= 0.0 {
            return;
        }

        let (x0, y0, x1, y1) = dest.pixel_bounds(self.width, self.height);
        let width = self.width as usize;
        let src_pixels = src.pixels();
        let sx_scale = src.width as f32 / dest.width;
        let sy_scale = src.height as f32 / dest.height;
        let pixels = self.pixels_mut();

        for py in y0..y1 {
            let cy = py as f32 + 0.5;
            let sy = (((cy - dest.y) * sy_scale) as u32).min(src.height - 1);
            for px in x0..x1 {
                let cx = px as f32 + 0.5;
                if !dest.contains(cx, cy) {
                    continue;
                }
                if let Some(clip) = clip {
                    if !clip.contains(cx, cy) {
                        continue;
                    }
                }
                let sx = (((cx - dest.x) * sx_scale) as u32).min(src.width - 1);
                let Some(&color) = src_pixels.get(sy as usize * src.width as usize + sx as usize)
                else {
                    continue;
                };
                blend(&mut pixels[py as usize * width + px as usize], color);
            }
        }
    }

    /// Fill an integer rectangle with an alpha-blended colour
    fn fill_blend(&mut self, x0: u32, y0: u32, x1: u32, y1: u32, color: [u8; 4]) {
        let width = self.width as usize;
        let (x1, y1) = (x1.min(self.width), y1.min(self.height));
        let pixels = self.pixels_mut();
        for py in y0..y1 {
            for px in x0..x1 {
                blend(&mut pixels[py as usize * width + px as usize], color);
            }
        }
    }

    /// Stroke the outline of `rect` with a line centred on its edges
    pub fn stroke_rect(&mut self, rect: Rect, color: [u8; 4], line_width: u32) {
        if line_width == 0 {
            return;
        }
        let lw = line_width as f32;
        let (left, top) = (rect.x - lw / 2.0, rect.y - lw / 2.0);
        let (outer_w, outer_h) = (rect.width + lw, rect.height + lw);

        // Top and bottom bands span the full width, sides fill the rows between them.
        let bands = [
            Rect::new(left, top, outer_w, lw),
            Rect::new(left, top + outer_h - lw, outer_w, lw),
            Rect::new(left, top + lw, lw, outer_h - 2.0 * lw),
            Rect::new(left + outer_w - lw, top + lw, lw, outer_h - 2.0 * lw),
        ];
        for band in bands {
            if band.width <= 0.0 || band.height <= 0.0 {
                continue;
            }
            let (x0, y0, x1, y1) = band.pixel_bounds(self.width, self.height);
            self.fill_blend(x0, y0, x1, y1, color);
        }
    }

    /// Apply a filter to the whole surface
    pub fn apply_filter(&mut self, filter: Filter) {
        filter.apply(&mut self.data, self.width, self.height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounded_rect_excludes_corners() {
        let shape = RoundedRect::new(Rect::new(0.0, 0.0, 100.0, 100.0), 20.0);
        assert!(shape.contains(50.0, 50.0));
        assert!(shape.contains(50.0, 0.5));
        assert!(!shape.contains(0.5, 0.5));
        assert!(!shape.contains(99.5, 99.5));
        assert!(!shape.contains(150.0, 50.0));
    }

    #[test]
    fn test_draw_image_scales_to_fill() {
        let mut surface = Surface::new(8, 4);
        let src = VideoFrame::solid(2, 2, [200, 100, 50, 255]);
        surface.draw_image(&src, Rect::full(8, 4), None);
        assert_eq!(surface.pixel(0, 0), Some([200, 100, 50, 255]));
        assert_eq!(surface.pixel(7, 3), Some([200, 100, 50, 255]));
    }

    #[test]
    fn test_draw_image_respects_clip() {
        let mut surface = Surface::new(10, 10);
        let src = VideoFrame::solid(1, 1, [255, 0, 0, 255]);
        let dest = Rect::new(2.0, 2.0, 6.0, 6.0);
        surface.draw_image(&src, dest, Some(&RoundedRect::new(dest, 3.0)));
        assert_eq!(surface.pixel(5, 5), Some([255, 0, 0, 255]));
        assert_eq!(surface.pixel(2, 2), Some([0, 0, 0, 0]));
        assert_eq!(surface.pixel(0, 5), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_draw_empty_source_is_noop() {
        let mut surface = Surface::new(4, 4);
        surface.draw_image(&VideoFrame::empty(), Rect::full(4, 4), None);
        assert!(surface.data().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_stroke_blends_outline_only() {
        let mut surface = Surface::new(20, 20);
        surface.draw_image(
            &VideoFrame::solid(1, 1, [0, 0, 0, 255]),
            Rect::full(20, 20),
            None,
        );
        surface.stroke_rect(Rect::new(5.0, 5.0, 10.0, 10.0), [255, 255, 255, 255], 2);
        assert_eq!(surface.pixel(4, 10), Some([255, 255, 255, 255]));
        assert_eq!(surface.pixel(10, 5), Some([255, 255, 255, 255]));
        assert_eq!(surface.pixel(10, 10), Some([0, 0, 0, 255]));
        assert_eq!(surface.pixel(0, 0), Some([0, 0, 0, 255]));
    }

    #[test]
    fn test_offscreen_stroke_leaves_edges_alone() {
        let mut surface = Surface::new(16, 16);
        surface.stroke_rect(Rect::new(-100.0, -100.0, 300.0, 300.0), [255; 4], 2);
        assert!(surface.data().iter().all(|&b| b == 0));
    }
}
