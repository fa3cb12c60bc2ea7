//! Pixel filters for RGBA8 buffers
//!
//! Blur is a three-pass box approximation of a Gaussian with standard
//! deviation `radius`, matching what a `blur(<radius>px)` draw filter produces.

/// Filter applied to a whole surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Filter {
    /// Gaussian blur, radius is the standard deviation in pixels
    Blur { radius: f32 },
    /// Multiply RGB by a factor (1.0 = unchanged)
    Brightness(f32),
    /// Scale RGB distance from mid-grey by a factor (1.0 = unchanged)
    Contrast(f32),
}

impl Filter {
    /// Whether applying this filter changes nothing
    pub fn is_identity(&self) -> bool {
        match self {
            Self::Blur { radius } => *radius <= 0.0,
            Self::Brightness(f) | Self::Contrast(f) => (*f - 1.0).abs() < f32::EPSILON,
        }
    }

    /// Apply to packed RGBA data of the given size
    pub fn apply(&self, data: &mut [u8], width: u32, height: u32) {
        if self.is_identity() {
            return;
        }
        match *self {
            Self::Blur { radius } => gaussian_blur(data, width as usize, height as usize, radius),
            Self::Brightness(factor) => brightness(data, factor),
            Self::Contrast(factor) => contrast(data, factor),
        }
    }
}

/// Box sizes whose successive application approximates a Gaussian
fn boxes_for_gauss(sigma: f32, passes: usize) -> Vec<usize> {
    let n = passes as f32;
    let ideal = ((12.0 * sigma * sigma / n) + 1.0).sqrt();
    let mut lower = ideal.floor() as i64;
    if lower % 2 == 0 {
        lower -= 1;
    }
    let lower = lower.max(1);
    let upper = lower + 2;

    let lf = lower as f32;
    let m_ideal = (12.0 * sigma * sigma - n * lf * lf - 4.0 * n * lf - 3.0 * n) / (-4.0 * lf - 4.0);
    let m = m_ideal.round().max(0.0) as usize;

    (0..passes)
        .map(|i| if i < m { lower as usize } else { upper as usize })
        .collect()
}

/// One box pass along rows (horizontal) or columns, clamping at the edges
fn box_pass(src: &[u8], dst: &mut [u8], width: usize, height: usize, radius: usize, horizontal: bool) {
    let (lines, len, line_stride, step) = if horizontal {
        (height, width, width * 4, 4)
    } else {
        (width, height, 4, width * 4)
    };
    let window = (2 * radius + 1) as u32;
    let r = radius as isize;
    let last = len as isize - 1;

    for line in 0..lines {
        let base = line * line_stride;
        let at = |i: isize| base + i.clamp(0, last) as usize * step;

        let mut acc = [0u32; 4];
        for i in -r..=r {
            let p = at(i);
            for (c, sum) in acc.iter_mut().enumerate() {
                *sum += src[p + c] as u32;
            }
        }

        for i in 0..len as isize {
            let out = base + i as usize * step;
            for (c, sum) in acc.iter().enumerate() {
                dst[out + c] = ((sum + window / 2) / window) as u8;
            }
            let add = at(i + r + 1);
            let sub = at(i - r);
            for (c, sum) in acc.iter_mut().enumerate() {
                *sum = *sum + src[add + c] as u32 - src[sub + c] as u32;
            }
        }
    }
}

/// In-place Gaussian blur approximation
pub fn gaussian_blur(data: &mut [u8], width: usize, height: usize, sigma: f32) {
    if sigma <= 0.0 || width == 0 || height == 0 || data.len() < width * height * 4 {
        return;
    }

    let mut scratch = vec![0u8; width * height * 4];
    for size in boxes_for_gauss(sigma, 3) {
        let radius = (size - 1) / 2;
        if radius == 0 {
            continue;
        }
        box_pass(data, &mut scratch, width, height, radius, true);
        box_pass(&scratch, data, width, height, radius, false);
    }
}

/// Multiply RGB channels, leaving alpha untouched
pub fn brightness(data: &mut [u8], factor: f32) {
    let whole = data.len() - data.len() % 4;
    let pixels: &mut [[u8; 4]] = bytemuck::cast_slice_mut(&mut data[..whole]);
    for px in pixels {
        for c in &mut px[..3] {
            *c = (*c as f32 * factor).round().clamp(0.0, 255.0) as u8;
        }
    }
}

/// Scale RGB distance from mid-grey, leaving alpha untouched
pub fn contrast(data: &mut [u8], factor: f32) {
    let whole = data.len() - data.len() % 4;
    let pixels: &mut [[u8; 4]] = bytemuck::cast_slice_mut(&mut data[..whole]);
    for px in pixels {
        for c in &mut px[..3] {
            let v = (*c as f32 / 255.0 - 0.5) * factor + 0.5;
            *c = (v * 255.0).round().clamp(0.0, 255.0) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkerboard(size: usize) -> Vec<u8> {
        let mut data = Vec::with_capacity(size * size * 4);
        for y in 0..size {
            for x in 0..size {
                let v = if (x + y) % 2 == 0 { 255 } else { 0 };
                data.extend_from_slice(&[v, v, v, 255]);
            }
        }
        data
    }

    #[test]
    fn test_box_sizes_are_odd() {
        for size in boxes_for_gauss(20.0, 3) {
            assert_eq!(size % 2, 1);
        }
    }

    #[test]
    fn test_blur_preserves_solid_colour() {
        let mut data = [10u8, 20, 30, 255].repeat(16 * 16);
        let original = data.clone();
        gaussian_blur(&mut data, 16, 16, 5.0);
        assert_eq!(data, original);
    }

    #[test]
    fn test_blur_smooths_checkerboard() {
        let mut data = checkerboard(32);
        gaussian_blur(&mut data, 32, 32, 4.0);
        for (i, px) in data.chunks_exact(4).enumerate() {
            let (x, y) = (i % 32, i / 32);
            assert!(px[0] > 20 && px[0] < 235, "pixel not smoothed: {}", px[0]);
            if (8..24).contains(&x) && (8..24).contains(&y) {
                assert!(px[0] > 110 && px[0] < 145, "interior not grey: {}", px[0]);
            }
            assert_eq!(px[3], 255);
        }
    }

    #[test]
    fn test_zero_radius_is_identity() {
        let mut data = checkerboard(4);
        let original = data.clone();
        Filter::Blur { radius: 0.0 }.apply(&mut data, 4, 4);
        assert_eq!(data, original);
    }

    #[test]
    fn test_brightness_clamps_and_keeps_alpha() {
        let mut data = vec![100, 200, 250, 128];
        brightness(&mut data, 1.1);
        assert_eq!(data, vec![110, 220, 255, 128]);
    }

    #[test]
    fn test_contrast_pushes_from_mid_grey() {
        let mut data = vec![64, 192, 128, 255];
        contrast(&mut data, 2.0);
        assert!(data[0] < 10);
        assert!(data[1] > 245);
        assert!((data[2] as i32 - 129).abs() <= 1);
        assert_eq!(data[3], 255);
    }
}
