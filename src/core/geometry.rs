use crate::core::grid::Grid2;
use crate::core::lattice::Lattice;
use nalgebra::Vector3;
use rayon::prelude::*;

/// Distances below this are treated as identical (used both for `is_close`
/// default tolerances and for collapsing the self/zero shell).
const DEFAULT_ATOL: f64 = 1.0e-3;
const DEFAULT_RTOL: f64 = 1.0e-5;

/// Parallelization threshold for the O(n^2) distance matrix: below this size
/// the `rayon` setup cost outweighs the benefit of splitting pairwise work
/// across threads.
const PARALLEL_THRESHOLD: usize = 100;

#[inline]
pub fn is_close(a: f64, b: f64, atol: f64, rtol: f64) -> bool {
    (a - b).abs() <= atol + rtol * b.abs().max(a.abs())
}

/// Minimum-image distance between two fractional-coordinate positions under
/// the 27-image `(-1, 0, 1)^3` neighbourhood, honouring per-axis PBC flags.
/// The full 27-image sweep is needed for correctness on arbitrary (not just
/// near-cubic) Bravais lattices.
pub fn minimum_image_distance(lattice: &Lattice, frac_i: &Vector3<f64>, frac_j: &Vector3<f64>) -> f64 {
    let mut best = f64::INFINITY;
    let axis = |pbc: bool| -> &'static [i32] {
        if pbc {
            &[-1, 0, 1]
        } else {
            &[0]
        }
    };
    for &i in axis(lattice.pbc[0]) {
        for &j in axis(lattice.pbc[1]) {
            for &k in axis(lattice.pbc[2]) {
                let image = Vector3::new(
                    frac_j.x + i as f64,
                    frac_j.y + j as f64,
                    frac_j.z + k as f64,
                );
                let delta_frac = frac_i - image;
                let delta_cart = lattice.to_cartesian(&delta_frac);
                let norm = delta_cart.norm();
                if norm < best {
                    best = norm;
                }
            }
        }
    }
    best
}

/// Computes the symmetric, zero-diagonal N x N minimum-image distance matrix.
pub fn distance_matrix(lattice: &Lattice, frac_coords: &[Vector3<f64>]) -> Grid2<f64> {
    let n = frac_coords.len();
    let mut grid = Grid2::<f64>::zeros(n);
    let pairs: Vec<(usize, usize)> = (0..n).flat_map(|i| (i + 1..n).map(move |j| (i, j))).collect();

    let compute = |&(i, j): &(usize, usize)| -> (usize, usize, f64) {
        let d = minimum_image_distance(lattice, &frac_coords[i], &frac_coords[j]);
        (i, j, d)
    };

    let results: Vec<(usize, usize, f64)> = if n > PARALLEL_THRESHOLD {
        pairs.par_iter().map(compute).collect()
    } else {
        pairs.iter().map(compute).collect()
    };

    for (i, j, d) in results {
        grid.set(i, j, d);
        grid.set(j, i, d);
    }
    grid
}

/// Auto-detects shell radii as unique sorted distances collapsed with
/// absolute+relative tolerance, prefixed with `0.0`.
pub fn radii_naive(distances: &Grid2<f64>, atol: f64, rtol: f64) -> Vec<f64> {
    let n = distances.n();
    let mut values: Vec<f64> = Vec::with_capacity(n * (n.saturating_sub(1)) / 2);
    for i in 0..n {
        for j in (i + 1)..n {
            values.push(*distances.get(i, j));
        }
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());

    let mut radii = vec![0.0];
    for d in values {
        if !radii.last().map(|&last| is_close(d, last, atol, rtol)).unwrap_or(false) {
            radii.push(d);
        }
    }
    radii
}

impl Default for RadiiTolerances {
    fn default() -> Self {
        Self {
            atol: DEFAULT_ATOL,
            rtol: DEFAULT_RTOL,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RadiiTolerances {
    pub atol: f64,
    pub rtol: f64,
}

/// Auto-detects shell radii via a distance histogram: a shell boundary is
/// declared wherever two consecutive occupied bins are separated by a run of
/// empty bins whose span is `>= peak_isolation`; radii are the right edges
/// of the occupied runs ("peaks").
pub fn radii_peak(distances: &Grid2<f64>, bin_width: f64, peak_isolation: f64) -> Vec<f64> {
    let n = distances.n();
    let mut max_d: f64 = 0.0;
    let mut values: Vec<f64> = Vec::new();
    for i in 0..n {
        for j in (i + 1)..n {
            let d = *distances.get(i, j);
            max_d = max_d.max(d);
            values.push(d);
        }
    }
    if values.is_empty() {
        return vec![0.0];
    }

    let num_bins = (max_d / bin_width).ceil() as usize + 1;
    let mut occupied = vec![false; num_bins];
    for d in &values {
        let bin = (d / bin_width).floor() as usize;
        occupied[bin.min(num_bins - 1)] = true;
    }

    let gap_bins = (peak_isolation / bin_width).ceil() as usize;
    let mut radii = vec![0.0];
    let mut run_start: Option<usize> = None;
    let mut empty_run = 0usize;

    for bin in 0..num_bins {
        if occupied[bin] {
            if run_start.is_none() {
                run_start = Some(bin);
            }
            empty_run = 0;
        } else if run_start.is_some() {
            empty_run += 1;
            if empty_run >= gap_bins.max(1) {
                // Close the current run: radius is the right edge of the
                // occupied span just ended.
                let run_end = bin - empty_run;
                radii.push((run_end + 1) as f64 * bin_width);
                run_start = None;
                empty_run = 0;
            }
        }
    }
    if run_start.is_some() {
        radii.push(num_bins as f64 * bin_width);
    }
    radii
}

/// Builds the shell-index matrix: `shell(i, j)` is the smallest `s` such that
/// `radii[s-1] < D(i,j) <= radii[s]` under `is_close`; `0` for the diagonal
/// and out-of-range distances.
pub fn shell_matrix(distances: &Grid2<f64>, radii: &[f64], atol: f64, rtol: f64) -> Grid2<u32> {
    let n = distances.n();
    let mut shells = Grid2::<u32>::zeros(n);
    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            let d = *distances.get(i, j);
            shells.set(i, j, shell_of(d, radii, atol, rtol));
        }
    }
    shells
}

fn shell_of(d: f64, radii: &[f64], atol: f64, rtol: f64) -> u32 {
    if is_close(d, 0.0, atol, rtol) {
        return 0;
    }
    for s in 1..radii.len() {
        let lower = radii[s - 1];
        let upper = radii[s];
        let below_upper = d < upper || is_close(d, upper, atol, rtol);
        let above_lower = d > lower && !is_close(d, lower, atol, rtol);
        if above_lower && below_upper {
            return s as u32;
        }
    }
    0
}
