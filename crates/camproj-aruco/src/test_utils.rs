//! Synthetic marker images for tests.

use camproj_core::{homography_from_4pt, GrayImage};
use nalgebra::Point2;

use crate::{rotate_code_u64, Dictionary};

/// Render marker `id` with a one-cell black border, turned `rotation`
/// quarter turns clockwise. Returns `None` for an unknown id.
pub fn render_marker(dict: &Dictionary, id: u32, rotation: u8, cell_px: usize) -> Option<GrayImage> {
    let n = dict.marker_size;
    let code = rotate_code_u64(dict.code(id)?, n, rotation);
    let side = (n + 2) * cell_px;
    let mut img = GrayImage::filled(side, side, 0);
    for y in 0..n {
        for x in 0..n {
            if dict.is_white(code, x, y) {
                let (x0, y0) = ((x + 1) * cell_px, (y + 1) * cell_px);
                img.fill_rect(x0, y0, x0 + cell_px, y0 + cell_px, 255);
            }
        }
    }
    Some(img)
}

/// Copy `patch` into `canvas` with its top-left pixel at `(x0, y0)`, clipped.
pub fn paste(canvas: &mut GrayImage, patch: &GrayImage, x0: usize, y0: usize) {
    for y in 0..patch.height {
        let cy = y0 + y;
        if cy >= canvas.height {
            break;
        }
        for x in 0..patch.width {
            let cx = x0 + x;
            if cx >= canvas.width {
                break;
            }
            canvas.data[cy * canvas.width + cx] = patch.data[y * patch.width + x];
        }
    }
}

/// Outer corners (TL, TR, BR, BL) of a `side`-pixel square pasted at
/// `(x0, y0)`, with pixel centres at integer coordinates.
pub fn axis_aligned_corners(x0: usize, y0: usize, side: usize) -> [Point2<f32>; 4] {
    let (l, t) = (x0 as f32 - 0.5, y0 as f32 - 0.5);
    let (r, b) = (l + side as f32, t + side as f32);
    [
        Point2::new(l, t),
        Point2::new(r, t),
        Point2::new(r, b),
        Point2::new(l, b),
    ]
}

/// Draw `patch` so that its outer corners land on `corners` (TL, TR, BR, BL),
/// nearest-neighbour sampled.
pub fn draw_warped(canvas: &mut GrayImage, patch: &GrayImage, corners: &[Point2<f32>; 4]) {
    let (w, h) = (patch.width as f32, patch.height as f32);
    let rect = [
        Point2::new(0.0, 0.0),
        Point2::new(w, 0.0),
        Point2::new(w, h),
        Point2::new(0.0, h),
    ];
    let Some(h_patch_from_canvas) = homography_from_4pt(corners, &rect) else {
        return;
    };

    let min_x = corners.iter().map(|p| p.x).fold(f32::INFINITY, f32::min).floor().max(0.0) as usize;
    let min_y = corners.iter().map(|p| p.y).fold(f32::INFINITY, f32::min).floor().max(0.0) as usize;
    let max_x = (corners.iter().map(|p| p.x).fold(0.0, f32::max).ceil() as usize).min(canvas.width);
    let max_y = (corners.iter().map(|p| p.y).fold(0.0, f32::max).ceil() as usize).min(canvas.height);

    for y in min_y..max_y {
        for x in min_x..max_x {
            let q = h_patch_from_canvas.apply(Point2::new(x as f32, y as f32));
            if q.x < 0.0 || q.y < 0.0 || q.x >= w || q.y >= h {
                continue;
            }
            let (px, py) = (q.x as usize, q.y as usize);
            canvas.data[y * canvas.width + x] = patch.data[py * patch.width + px];
        }
    }
}

/// `corners` cycled so that index `r` comes first.
pub fn cycle_corners(corners: &[Point2<f32>; 4], r: usize) -> [Point2<f32>; 4] {
    std::array::from_fn(|k| corners[(r + k) % 4])
}
