//! CPU image passes over RGBA f32 lightmap buffers.
//!
//! A texel is *valid* when any of its four channels is above zero; texels
//! no hemicube covered stay all-zero and are filled in by dilation.

use std::path::Path;

use image::{ImageFormat, RgbaImage};
use log::info;

use super::BakeError;

const CHANNELS: usize = 4;

/// Rounds of paired dilation applied before smoothing.
pub const DILATE_ROUNDS: usize = 16;
/// Inverse display gamma applied to the baked radiance.
pub const GAMMA_POWER: f32 = 1.0 / 2.2;
/// Channel mask selecting r, g and b.
pub const RGB_MASK: u32 = 0x7;

fn texel(image: &[f32], width: usize, x: usize, y: usize) -> &[f32] {
    let i = (y * width + x) * CHANNELS;
    &image[i..i + CHANNELS]
}

fn is_valid(texel: &[f32]) -> bool {
    texel.iter().any(|&c| c > 0.0)
}

/// Fill each invalid texel of `src` with the average of its valid
/// 4-neighbours. Valid texels are copied through.
pub fn dilate(src: &[f32], dst: &mut [f32], width: u32, height: u32) {
    let (w, h) = (width as usize, height as usize);
    for y in 0..h {
        for x in 0..w {
            let mut color = [0.0f32; CHANNELS];
            color.copy_from_slice(texel(src, w, x, y));
            if !is_valid(&color) {
                let mut n = 0;
                for (dx, dy) in [(-1i64, 0i64), (0, 1), (1, 0), (0, -1)] {
                    let (cx, cy) = (x as i64 + dx, y as i64 + dy);
                    if cx < 0 || cy < 0 || cx >= w as i64 || cy >= h as i64 {
                        continue;
                    }
                    let neighbour = texel(src, w, cx as usize, cy as usize);
                    if is_valid(neighbour) {
                        for (c, v) in color.iter_mut().zip(neighbour) {
                            *c += v;
                        }
                        n += 1;
                    }
                }
                if n > 0 {
                    let inv = 1.0 / n as f32;
                    color.iter_mut().for_each(|c| *c *= inv);
                }
            }
            let i = (y * w + x) * CHANNELS;
            dst[i..i + CHANNELS].copy_from_slice(&color);
        }
    }
}

/// Average of the valid texels in each 3×3 neighbourhood, or zero if none.
pub fn smooth(src: &[f32], dst: &mut [f32], width: u32, height: u32) {
    let (w, h) = (width as usize, height as usize);
    for y in 0..h {
        for x in 0..w {
            let mut color = [0.0f32; CHANNELS];
            let mut n = 0;
            for cy in y.saturating_sub(1)..(y + 2).min(h) {
                for cx in x.saturating_sub(1)..(x + 2).min(w) {
                    let neighbour = texel(src, w, cx, cy);
                    if is_valid(neighbour) {
                        for (c, v) in color.iter_mut().zip(neighbour) {
                            *c += v;
                        }
                        n += 1;
                    }
                }
            }
            if n > 0 {
                let inv = 1.0 / n as f32;
                color.iter_mut().for_each(|c| *c *= inv);
            }
            let i = (y * w + x) * CHANNELS;
            dst[i..i + CHANNELS].copy_from_slice(&color);
        }
    }
}

/// Raise the channels selected by `mask` (bit i = channel i) to `exponent`.
pub fn power(image: &mut [f32], exponent: f32, mask: u32) {
    for texel in image.chunks_exact_mut(CHANNELS) {
        for (i, c) in texel.iter_mut().enumerate() {
            if mask & (1 << i) != 0 {
                *c = c.powf(exponent);
            }
        }
    }
}

/// The fixed finishing pipeline run on every completed bake: 16 rounds of
/// ping-pong dilation, two smoothing passes, one more dilation, then gamma
/// on rgb. `data` holds the result; `temp` is scratch of the same size.
pub fn post_process(data: &mut [f32], temp: &mut [f32], width: u32, height: u32) {
    for _ in 0..DILATE_ROUNDS {
        dilate(data, temp, width, height);
        dilate(temp, data, width, height);
    }
    smooth(data, temp, width, height);
    smooth(data, temp, width, height);
    dilate(temp, data, width, height);
    power(data, GAMMA_POWER, RGB_MASK);
}

/// `value × scale × 255`, clamped to the byte range and truncated.
fn quantise(value: f32, scale: f32) -> u8 {
    (value * scale * 255.0).clamp(0.0, 255.0) as u8
}

/// Quantise to 8-bit RGBA and write a TGA.
/// Row 0 of `data` is the bottom row of the saved image.
pub fn save_tga(path: &Path, data: &[f32], width: u32, height: u32, scale: f32) -> Result<(), BakeError> {
    let bytes: Vec<u8> = data.iter().map(|&v| quantise(v, scale)).collect();
    let mut image = RgbaImage::from_raw(width, height, bytes).ok_or(BakeError::BufferSize {
        expected: width as usize * height as usize * CHANNELS,
        actual: data.len(),
    })?;
    image::imageops::flip_vertical_in_place(&mut image);
    image.save_with_format(path, ImageFormat::Tga)?;
    info!("Saved {}x{} lightmap to {}", width, height, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// 4×4 buffer with a lit 2×2 block in one corner and the rest empty.
    fn sparse() -> Vec<f32> {
        let mut data = vec![0.0; 4 * 4 * CHANNELS];
        for (x, y, v) in [(0, 0, 0.2), (1, 0, 0.4), (0, 1, 0.6), (1, 1, 0.8)] {
            let i = (y * 4 + x) * CHANNELS;
            data[i..i + CHANNELS].copy_from_slice(&[v, v * 0.5, v * 0.25, 1.0]);
        }
        data
    }

    #[test]
    fn dilate_keeps_valid_texels_and_fills_neighbours() {
        let src = sparse();
        let mut dst = vec![0.0; src.len()];
        dilate(&src, &mut dst, 4, 4);

        for (x, y) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
            assert_eq!(texel(&dst, 4, x, y), texel(&src, 4, x, y));
        }
        // (2, 0) touches only (1, 0)
        assert_eq!(texel(&dst, 4, 2, 0), texel(&src, 4, 1, 0));
        // (3, 3) has no valid neighbour
        assert!(!is_valid(texel(&dst, 4, 3, 3)));
    }

    #[test]
    fn dilate_is_identity_on_a_fully_valid_image() {
        let src: Vec<f32> = (0..3 * 2 * CHANNELS).map(|i| 0.1 + i as f32 * 0.01).collect();
        let mut dst = vec![0.0; src.len()];
        dilate(&src, &mut dst, 3, 2);
        assert_eq!(src, dst);
    }

    #[test]
    fn repeated_dilation_never_moves_filled_texels() {
        let original = sparse();
        let mut src = original.clone();
        let mut dst = vec![0.0; src.len()];
        for _ in 0..8 {
            dilate(&src, &mut dst, 4, 4);
            for (before, after) in src.chunks_exact(CHANNELS).zip(dst.chunks_exact(CHANNELS)) {
                if is_valid(before) {
                    assert_eq!(before, after);
                }
            }
            for (x, y) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                assert_eq!(texel(&dst, 4, x, y), texel(&original, 4, x, y));
            }
            std::mem::swap(&mut src, &mut dst);
        }
        // filled by now, so one more pass is a fixed point
        assert!(src.chunks_exact(CHANNELS).all(is_valid));
        dilate(&src, &mut dst, 4, 4);
        assert_eq!(src, dst);
    }

    #[test]
    fn smooth_averages_valid_neighbourhood() {
        let src = sparse();
        let mut dst = vec![0.0; src.len()];
        smooth(&src, &mut dst, 4, 4);
        let mean = (0.2 + 0.4 + 0.6 + 0.8) / 4.0;
        assert_relative_eq!(texel(&dst, 4, 0, 0)[0], mean, epsilon = 1e-6);
        assert_eq!(texel(&dst, 4, 3, 3), &[0.0; 4]);
    }

    #[test]
    fn gamma_leaves_alpha_untouched() {
        let mut data = vec![0.25, 0.5, 0.75, 0.3];
        power(&mut data, GAMMA_POWER, RGB_MASK);
        assert_relative_eq!(data[0], 0.25f32.powf(1.0 / 2.2), epsilon = 1e-6);
        assert_relative_eq!(data[1], 0.5f32.powf(1.0 / 2.2), epsilon = 1e-6);
        assert_relative_eq!(data[2], 0.75f32.powf(1.0 / 2.2), epsilon = 1e-6);
        assert_eq!(data[3], 0.3);
    }

    #[test]
    fn post_process_is_deterministic() {
        let run = || {
            let mut data = sparse();
            let mut temp = vec![0.0; data.len()];
            post_process(&mut data, &mut temp, 4, 4);
            data
        };
        let a = run();
        let b = run();
        assert_eq!(a.iter().map(|v| v.to_bits()).collect::<Vec<_>>(), b.iter().map(|v| v.to_bits()).collect::<Vec<_>>());
        // dilation reaches every texel of a 4×4 image
        assert!(a.chunks_exact(CHANNELS).all(is_valid));
    }

    #[test]
    fn saved_tga_has_target_size_and_opaque_alpha() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result.tga");
        let mut data = sparse();
        let mut temp = vec![0.0; data.len()];
        post_process(&mut data, &mut temp, 4, 4);
        save_tga(&path, &data, 4, 4, 1.0).unwrap();

        let saved = image::open(&path).unwrap().to_rgba8();
        assert_eq!(saved.dimensions(), (4, 4));
        assert!(saved.pixels().all(|p| p.0[3] == 255));
    }

    #[test]
    fn quantisation_truncates_and_clamps() {
        assert_eq!(quantise(0.5, 1.0), 127);
        assert_eq!(quantise(0.999, 1.0), 254);
        assert_eq!(quantise(1.0, 1.0), 255);
        assert_eq!(quantise(3.0, 1.0), 255);
        assert_eq!(quantise(-0.2, 1.0), 0);
        assert_eq!(quantise(0.25, 2.0), 127);
    }

    #[test]
    fn save_rejects_mismatched_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let err = save_tga(&dir.path().join("bad.tga"), &[0.0; 7], 2, 2, 1.0).unwrap_err();
        assert!(matches!(err, BakeError::BufferSize { expected: 16, actual: 7 }));
    }
}
