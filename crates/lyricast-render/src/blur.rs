//! Separable gaussian blur over coverage masks with Q16 fixed-point weights.
//!
//! Integer accumulation keeps results bit-identical across runs and thread
//! counts, so exported frames hash the same everywhere.

use rayon::prelude::*;

use crate::mask::AlphaMask;

/// Blur `mask` with a gaussian of the given pixel radius (sigma = radius / 2).
pub fn gaussian_blur(mask: &AlphaMask, radius: f32) -> AlphaMask {
    let radius = radius.max(0.0).min(mask.reach() as f32);
    let r = radius.ceil() as u32;
    if r == 0 || mask.width == 0 || mask.height == 0 {
        return mask.clone();
    }
    let sigma = (radius / 2.0).max(0.5);
    let kernel = gaussian_kernel_q16(r, sigma);

    let mut tmp = vec![0u8; mask.data.len()];
    let mut out = vec![0u8; mask.data.len()];
    horizontal_pass(&mask.data, &mut tmp, mask.width as usize, &kernel);
    vertical_pass(&tmp, &mut out, mask.width as usize, mask.height as usize, &kernel);
    AlphaMask {
        width: mask.width,
        height: mask.height,
        data: out,
    }
}

/// Normalized weights summing to exactly 1 << 16.
fn gaussian_kernel_q16(radius: u32, sigma: f32) -> Vec<u32> {
    let r = radius as i32;
    let denom = 2.0 * (sigma as f64) * (sigma as f64);
    let weights_f: Vec<f64> = (-r..=r)
        .map(|i| (-(i as f64) * (i as f64) / denom).exp())
        .collect();
    let sum: f64 = weights_f.iter().sum();

    let mut weights: Vec<u32> = weights_f
        .iter()
        .map(|w| ((w / sum) * 65536.0).round().clamp(0.0, 65536.0) as u32)
        .collect();
    let acc: i64 = weights.iter().map(|w| *w as i64).sum();
    let delta = 65536 - acc;
    if delta != 0 {
        let mid = weights.len() / 2;
        weights[mid] = (weights[mid] as i64 + delta).clamp(0, 65536) as u32;
    }
    weights
}

// Samples outside the mask read as zero so glows fade out at the padding edge.
fn horizontal_pass(src: &[u8], dst: &mut [u8], width: usize, k: &[u32]) {
    let radius = (k.len() / 2) as isize;
    dst.par_chunks_mut(width)
        .zip(src.par_chunks(width))
        .for_each(|(out_row, in_row)| {
            for (x, out) in out_row.iter_mut().enumerate() {
                let mut acc = 0u64;
                for (ki, &kw) in k.iter().enumerate() {
                    let sx = x as isize + ki as isize - radius;
                    if sx >= 0 && (sx as usize) < width {
                        acc += kw as u64 * in_row[sx as usize] as u64;
                    }
                }
                *out = q16_to_u8(acc);
            }
        });
}

fn vertical_pass(src: &[u8], dst: &mut [u8], width: usize, height: usize, k: &[u32]) {
    let radius = (k.len() / 2) as isize;
    dst.par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, out_row)| {
            for (x, out) in out_row.iter_mut().enumerate() {
                let mut acc = 0u64;
                for (ki, &kw) in k.iter().enumerate() {
                    let sy = y as isize + ki as isize - radius;
                    if sy >= 0 && (sy as usize) < height {
                        acc += kw as u64 * src[sy as usize * width + x] as u64;
                    }
                }
                *out = q16_to_u8(acc);
            }
        });
}

#[inline]
fn q16_to_u8(acc: u64) -> u8 {
    ((acc + 32768) >> 16).min(255) as u8
}
