//! Reading the bit grid of a candidate quad.

use camproj_core::{homography_from_4pt, warp_perspective_gray, GrayImage, GrayImageView};
use nalgebra::Point2;

use crate::threshold::{mean_std, otsu_threshold_from_samples};
use crate::DetectorParams;

/// Rectify the quad into a `cells × cells` grid (data bits plus border) and
/// read its inner code.
///
/// Returns `None` when the patch is flat, or when more border cells than
/// `max_erroneous_bits_in_border_rate` allows come out white. The code uses
/// the dictionary layout: bit `y * n + x`, white = 1, read with `corners[0]`
/// as the top-left cell.
pub(crate) fn read_marker_code(
    image: &GrayImageView<'_>,
    corners: &[Point2<f32>; 4],
    marker_size: usize,
    params: &DetectorParams,
) -> Option<u64> {
    let border = params.marker_border_bits;
    let cells = marker_size + 2 * border;
    let ppc = params.perspective_remove_pixel_per_cell.max(1);
    let side = cells * ppc;

    let s = side as f32;
    let rect = [
        Point2::new(0.0, 0.0),
        Point2::new(s, 0.0),
        Point2::new(s, s),
        Point2::new(0.0, s),
    ];
    let h_img_from_rect = homography_from_4pt(&rect, corners)?;
    let patch = warp_perspective_gray(image, h_img_from_rect, side, side);

    let (_, std_dev) = mean_std(&patch.data);
    if std_dev < params.min_otsu_std_dev {
        log::trace!("candidate rejected: flat patch (std {std_dev:.2})");
        return None;
    }
    let threshold = otsu_threshold_from_samples(&patch.data) as f32;

    let margin = ((ppc as f32 * params.perspective_remove_ignored_margin_per_cell).round()
        as usize)
        .min((ppc - 1) / 2);
    let is_white = |cx: usize, cy: usize| cell_mean(&patch, cx, cy, ppc, margin) > threshold;

    let mut border_errors = 0usize;
    for cy in 0..cells {
        for cx in 0..cells {
            let in_border = cx < border
                || cy < border
                || cx >= cells - border
                || cy >= cells - border;
            if in_border && is_white(cx, cy) {
                border_errors += 1;
            }
        }
    }
    let max_border_errors = ((marker_size * marker_size) as f32
        * params.max_erroneous_bits_in_border_rate)
        .floor() as usize;
    if border_errors > max_border_errors {
        log::trace!("candidate rejected: {border_errors} white border cells");
        return None;
    }

    let mut code = 0u64;
    for y in 0..marker_size {
        for x in 0..marker_size {
            if is_white(x + border, y + border) {
                code |= 1u64 << (y * marker_size + x);
            }
        }
    }
    Some(code)
}

fn cell_mean(patch: &GrayImage, cx: usize, cy: usize, ppc: usize, margin: usize) -> f32 {
    let (x0, x1) = (cx * ppc + margin, (cx + 1) * ppc - margin);
    let (y0, y1) = (cy * ppc + margin, (cy + 1) * ppc - margin);
    let mut sum = 0u32;
    for y in y0..y1 {
        let row = &patch.data[y * patch.width + x0..y * patch.width + x1];
        sum += row.iter().map(|&v| v as u32).sum::<u32>();
    }
    let n = ((x1 - x0) * (y1 - y0)).max(1);
    sum as f32 / n as f32
}
