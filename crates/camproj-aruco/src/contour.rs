//! Connected components and outer-border tracing on a binary mask.

use std::collections::VecDeque;

use nalgebra::Point2;

/// 8-neighbourhood offsets, clockwise on screen (y down) starting east.
const NEIGHBOURS: [(i32, i32); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

/// Direction index of west in [`NEIGHBOURS`].
const WEST: usize = 4;

struct Mask<'a> {
    width: usize,
    height: usize,
    data: &'a [u8],
}

impl Mask<'_> {
    #[inline]
    fn is_set(&self, x: i32, y: i32) -> bool {
        x >= 0
            && y >= 0
            && (x as usize) < self.width
            && (y as usize) < self.height
            && self.data[y as usize * self.width + x as usize] != 0
    }
}

/// Outer contours of all 8-connected foreground components whose traced
/// length lies in `[min_len, max_len]`.
///
/// `mask` is row-major with non-zero meaning foreground. Pixels outside the
/// raster count as background.
pub(crate) fn find_outer_contours(
    mask: &[u8],
    width: usize,
    height: usize,
    min_len: usize,
    max_len: usize,
) -> Vec<Vec<Point2<i32>>> {
    let m = Mask {
        width,
        height,
        data: mask,
    };
    let mut labels = vec![0u32; width * height];
    let mut next_label = 0u32;
    let mut queue = VecDeque::new();
    let mut contours = Vec::new();

    for y in 0..height {
        for x in 0..width {
            let idx = y * width + x;
            if mask[idx] == 0 || labels[idx] != 0 {
                continue;
            }
            next_label += 1;
            let pixels = flood(&m, &mut labels, (x, y), next_label, &mut queue);

            // a traced border visits each pixel at most twice on thin parts
            if 2 * pixels < min_len {
                continue;
            }
            let start = Point2::new(x as i32, y as i32);
            let Some(contour) = trace_outer(&m, start, 4 * pixels + 16) else {
                continue;
            };
            if (min_len..=max_len).contains(&contour.len()) {
                contours.push(contour);
            }
        }
    }

    contours
}

/// Breadth-first labelling of the component containing `seed`; returns its pixel count.
fn flood(
    m: &Mask<'_>,
    labels: &mut [u32],
    seed: (usize, usize),
    label: u32,
    queue: &mut VecDeque<(i32, i32)>,
) -> usize {
    queue.clear();
    labels[seed.1 * m.width + seed.0] = label;
    queue.push_back((seed.0 as i32, seed.1 as i32));
    let mut count = 0;

    while let Some((x, y)) = queue.pop_front() {
        count += 1;
        for &(dx, dy) in &NEIGHBOURS {
            let (nx, ny) = (x + dx, y + dy);
            if !m.is_set(nx, ny) {
                continue;
            }
            let nidx = ny as usize * m.width + nx as usize;
            if labels[nidx] == 0 {
                labels[nidx] = label;
                queue.push_back((nx, ny));
            }
        }
    }

    count
}

/// Moore-neighbour tracing of the outer border, clockwise on screen.
///
/// `start` must be the first foreground pixel of its component in raster
/// order, so its west neighbour is background. Returns `None` if the trace
/// exceeds `max_steps`.
fn trace_outer(m: &Mask<'_>, start: Point2<i32>, max_steps: usize) -> Option<Vec<Point2<i32>>> {
    let mut contour = vec![start];

    let Some(first_dir) = next_step(m, start, WEST) else {
        // isolated pixel
        return Some(contour);
    };

    let mut p = start;
    let mut dir = first_dir;
    loop {
        let (dx, dy) = NEIGHBOURS[dir];
        p = Point2::new(p.x + dx, p.y + dy);
        // last background pixel examined before the move, seen from `p`
        let backtrack = (dir + if dir % 2 == 0 { 6 } else { 5 }) % 8;
        let next = next_step(m, p, backtrack)?;
        if p == start && next == first_dir {
            break;
        }
        contour.push(p);
        if contour.len() > max_steps {
            return None;
        }
        dir = next;
    }

    Some(contour)
}

/// First foreground neighbour of `p`, scanning clockwise from the one after `from`.
#[inline]
fn next_step(m: &Mask<'_>, p: Point2<i32>, from: usize) -> Option<usize> {
    (1..=8).map(|k| (from + k) % 8).find(|&d| {
        let (dx, dy) = NEIGHBOURS[d];
        m.is_set(p.x + dx, p.y + dy)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_with_rect(w: usize, h: usize, x0: usize, y0: usize, x1: usize, y1: usize) -> Vec<u8> {
        let mut mask = vec![0u8; w * h];
        for y in y0..y1 {
            for x in x0..x1 {
                mask[y * w + x] = 1;
            }
        }
        mask
    }

    #[test]
    fn filled_square_traces_its_perimeter_once() {
        let mask = mask_with_rect(12, 12, 2, 3, 8, 9);
        let contours = find_outer_contours(&mask, 12, 12, 1, 1000);
        assert_eq!(contours.len(), 1);
        let c = &contours[0];
        // 6×6 square: 4 * (6 - 1) border pixels
        assert_eq!(c.len(), 20);
        assert_eq!(c[0], Point2::new(2, 3));
        // clockwise on screen: heads east first
        assert_eq!(c[1], Point2::new(3, 3));
        let mut unique = c.clone();
        unique.sort_by_key(|p| (p.y, p.x));
        unique.dedup();
        assert_eq!(unique.len(), c.len());
    }

    #[test]
    fn ring_yields_only_its_outer_border() {
        let mut mask = mask_with_rect(20, 20, 2, 2, 18, 18);
        for y in 5..15 {
            for x in 5..15 {
                mask[y * 20 + x] = 0;
            }
        }
        let contours = find_outer_contours(&mask, 20, 20, 1, 1000);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].len(), 4 * 15);
    }

    #[test]
    fn length_filter_drops_small_and_large_components() {
        let mut mask = mask_with_rect(30, 30, 2, 2, 4, 4);
        for y in 10..25 {
            for x in 10..25 {
                mask[y * 30 + x] = 1;
            }
        }
        // small blob has 4 border pixels, big one 56
        assert_eq!(find_outer_contours(&mask, 30, 30, 10, 1000).len(), 1);
        assert_eq!(find_outer_contours(&mask, 30, 30, 1, 20).len(), 1);
        assert_eq!(find_outer_contours(&mask, 30, 30, 1, 1000).len(), 2);
    }

    #[test]
    fn diagonal_line_is_traced_there_and_back() {
        let mut mask = vec![0u8; 10 * 10];
        for i in 1..6 {
            mask[i * 10 + i] = 1;
        }
        let contours = find_outer_contours(&mask, 10, 10, 1, 1000);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].len(), 8);
    }
}
