//! Non-local-means denoising for single-channel images.
//!
//! Each output pixel is a weighted mean of the pixels in its search window,
//! weighted by how closely the template patch around each candidate matches
//! the patch around the pixel itself. Distances are accumulated one search
//! offset at a time over the whole image, so the per-offset patch sums are
//! plain box filters.

use image::GrayImage;
use rayon::prelude::*;

use crate::config::DenoiseConfig;

/// Weights below this contribute nothing visible and are skipped.
const MIN_WEIGHT: f32 = 0.001;

pub fn non_local_means(src: &GrayImage, params: &DenoiseConfig) -> GrayImage {
    let (width, height) = src.dimensions();
    if width == 0 || height == 0 {
        return src.clone();
    }
    let (w, h) = (width as usize, height as usize);
    let template_radius = (params.template_window / 2) as isize;
    let search_radius = (params.search_window / 2) as isize;
    let patch_area = (params.template_window * params.template_window) as f32;
    let h_sq = params.strength * params.strength;

    let px: Vec<f32> = src.as_raw().iter().map(|&v| v as f32).collect();

    let mut weight_sum = vec![0f32; w * h];
    let mut value_sum = vec![0f32; w * h];
    let mut sq_diff = vec![0f32; w * h];
    let mut row_sums = vec![0f32; w * h];
    let mut patch_dist = vec![0f32; w * h];

    for dy in -search_radius..=search_radius {
        for dx in -search_radius..=search_radius {
            sq_diff.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
                let ny = clamp_index(y as isize + dy, h);
                for (x, out) in row.iter_mut().enumerate() {
                    let nx = clamp_index(x as isize + dx, w);
                    let d = px[y * w + x] - px[ny * w + nx];
                    *out = d * d;
                }
            });

            box_sum(&sq_diff, &mut row_sums, &mut patch_dist, w, h, template_radius);

            weight_sum
                .par_chunks_mut(w)
                .zip(value_sum.par_chunks_mut(w))
                .enumerate()
                .for_each(|(y, (weights, values))| {
                    let ny = clamp_index(y as isize + dy, h);
                    for x in 0..w {
                        let dist = patch_dist[y * w + x] / patch_area;
                        let weight = (-dist / h_sq).exp();
                        if weight < MIN_WEIGHT {
                            continue;
                        }
                        let nx = clamp_index(x as isize + dx, w);
                        weights[x] += weight;
                        values[x] += weight * px[ny * w + nx];
                    }
                });
        }
    }

    // The zero offset always contributes weight 1, so every sum is positive.
    let out: Vec<u8> = value_sum
        .par_iter()
        .zip(weight_sum.par_iter())
        .map(|(v, wt)| (v / wt).round().clamp(0.0, 255.0) as u8)
        .collect();

    // Buffer length is width * height by construction.
    GrayImage::from_raw(width, height, out).unwrap_or_else(|| src.clone())
}

/// Sum of `src` over a `(2r+1)²` square around each pixel, borders replicated.
fn box_sum(src: &[f32], tmp: &mut [f32], dst: &mut [f32], w: usize, h: usize, r: isize) {
    tmp.par_chunks_mut(w).enumerate().for_each(|(y, out)| {
        let row = &src[y * w..(y + 1) * w];
        let mut acc: f32 = (-r..=r).map(|k| row[clamp_index(k, w)]).sum();
        out[0] = acc;
        for x in 1..w {
            acc += row[clamp_index(x as isize + r, w)];
            acc -= row[clamp_index(x as isize - r - 1, w)];
            out[x] = acc;
        }
    });

    let tmp = &*tmp;
    dst.par_chunks_mut(w).enumerate().for_each(|(y, out)| {
        out.fill(0.0);
        for k in -r..=r {
            let ry = clamp_index(y as isize + k, h);
            for (o, v) in out.iter_mut().zip(&tmp[ry * w..(ry + 1) * w]) {
                *o += v;
            }
        }
    });
}

fn clamp_index(i: isize, len: usize) -> usize {
    i.clamp(0, len as isize - 1) as usize
}
