//! Resamples a source texture into a tile's content box.
//!
//! Filtering runs on linear values: sRGB sources are decoded before filtering
//! and re-encoded on read-back. A non-identity UV scale/offset is honoured with
//! repeat wrapping, matching how the material displayed the texture.

use image::imageops::{self, FilterType};
use image::{Rgba, Rgba32FImage, RgbaImage};

use crate::color::{linear_to_srgb, srgb_to_linear};
use crate::scratch::{ScratchPool, ScratchTarget};

/// Samples `source` through `scale`/`offset` into a `size x size` image.
pub fn sample_tile(
    pool: &ScratchPool,
    source: &RgbaImage,
    scale: [f32; 2],
    offset: [f32; 2],
    size: u32,
    srgb: bool,
) -> RgbaImage {
    let mut target = pool.acquire(size, size);
    if scale == [1.0, 1.0] && offset == [0.0, 0.0] {
        resize_into(&mut target, source, srgb);
    } else {
        bilinear_into(&mut target, source, scale, offset, srgb);
    }
    if srgb {
        target.read_back(linear_to_srgb)
    } else {
        target.read_back(|c| c)
    }
}

fn decode(pixel: &Rgba<u8>, srgb: bool) -> [f32; 4] {
    let f = |c: u8| {
        let c = c as f32 / 255.0;
        if srgb { srgb_to_linear(c) } else { c }
    };
    [f(pixel[0]), f(pixel[1]), f(pixel[2]), pixel[3] as f32 / 255.0]
}

fn resize_into(target: &mut ScratchTarget<'_>, source: &RgbaImage, srgb: bool) {
    let linear = Rgba32FImage::from_fn(source.width(), source.height(), |x, y| {
        Rgba(decode(source.get_pixel(x, y), srgb))
    });
    let resized = imageops::resize(&linear, target.width(), target.height(), FilterType::Triangle);
    for (x, y, pixel) in resized.enumerate_pixels() {
        target.put(x, y, pixel.0);
    }
}

fn bilinear_into(
    target: &mut ScratchTarget<'_>,
    source: &RgbaImage,
    scale: [f32; 2],
    offset: [f32; 2],
    srgb: bool,
) {
    let (sw, sh) = source.dimensions();
    if sw == 0 || sh == 0 {
        return;
    }
    let (w, h) = (target.width(), target.height());
    let fetch = |x: i64, y: i64| {
        let x = x.rem_euclid(sw as i64) as u32;
        let y = y.rem_euclid(sh as i64) as u32;
        decode(source.get_pixel(x, y), srgb)
    };

    for y in 0..h {
        for x in 0..w {
            let u = (x as f32 + 0.5) / w as f32 * scale[0] + offset[0];
            let v = (1.0 - (y as f32 + 0.5) / h as f32) * scale[1] + offset[1];
            let u = u - u.floor();
            let v = v - v.floor();

            let fx = u * sw as f32 - 0.5;
            let fy = (1.0 - v) * sh as f32 - 0.5;
            let x0 = fx.floor();
            let y0 = fy.floor();
            let tx = fx - x0;
            let ty = fy - y0;
            let (x0, y0) = (x0 as i64, y0 as i64);

            let p00 = fetch(x0, y0);
            let p10 = fetch(x0 + 1, y0);
            let p01 = fetch(x0, y0 + 1);
            let p11 = fetch(x0 + 1, y0 + 1);
            let mut out = [0.0; 4];
            for c in 0..4 {
                let top = p00[c] + (p10[c] - p00[c]) * tx;
                let bottom = p01[c] + (p11[c] - p01[c]) * tx;
                out[c] = top + (bottom - top) * ty;
            }
            target.put(x, y, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(size: u32) -> RgbaImage {
        RgbaImage::from_fn(size, size, |x, y| {
            if (x + y) % 2 == 0 {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([0, 0, 0, 255])
            }
        })
    }

    #[test]
    fn test_identity_resample_of_flat_color_is_exact() {
        let pool = ScratchPool::new();
        let source = RgbaImage::from_pixel(16, 16, Rgba([200, 100, 50, 255]));
        for srgb in [true, false] {
            let out = sample_tile(&pool, &source, [1.0, 1.0], [0.0, 0.0], 5, srgb);
            assert_eq!(out.dimensions(), (5, 5));
            for pixel in out.pixels() {
                assert_eq!(pixel, &Rgba([200, 100, 50, 255]));
            }
        }
        assert_eq!(pool.live(), 0);
    }

    #[test]
    fn test_linear_downsample_averages_in_linear_space() {
        let pool = ScratchPool::new();
        let source = checker(8);
        let srgb = sample_tile(&pool, &source, [1.0, 1.0], [0.0, 0.0], 1, true);
        let linear = sample_tile(&pool, &source, [1.0, 1.0], [0.0, 0.0], 1, false);
        // Averaging black and white is 0.5 linear, which encodes brighter in sRGB.
        let s = srgb.get_pixel(0, 0)[0];
        let l = linear.get_pixel(0, 0)[0];
        assert!((126..=129).contains(&l), "linear {l}");
        assert!(s > 180, "srgb {s}");
    }

    #[test]
    fn test_offset_selects_texture_quadrant() {
        // Bottom-left quadrant red, rest blue. UV origin is bottom-left, so the
        // red quadrant sits in the lower-left of the image.
        let source = RgbaImage::from_fn(8, 8, |x, y| {
            if x < 4 && y >= 4 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        });
        let pool = ScratchPool::new();
        let out = sample_tile(&pool, &source, [0.25, 0.25], [0.1, 0.1], 4, false);
        for pixel in out.pixels() {
            assert_eq!(pixel, &Rgba([255, 0, 0, 255]));
        }
        let out = sample_tile(&pool, &source, [0.25, 0.25], [0.6, 0.6], 4, false);
        for pixel in out.pixels() {
            assert_eq!(pixel, &Rgba([0, 0, 255, 255]));
        }
    }

    #[test]
    fn test_tiling_wraps() {
        let pool = ScratchPool::new();
        let source = RgbaImage::from_pixel(4, 4, Rgba([10, 20, 30, 40]));
        let out = sample_tile(&pool, &source, [3.0, 3.0], [0.5, -2.25], 6, false);
        for pixel in out.pixels() {
            assert_eq!(pixel, &Rgba([10, 20, 30, 40]));
        }
    }
}
