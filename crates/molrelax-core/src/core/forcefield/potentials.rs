/// Harmonic well `k (x - x0)^2`, returned as `(energy, dE/dx)`.
#[inline]
pub fn harmonic(x: f64, x0: f64, k: f64) -> (f64, f64) {
    let dx = x - x0;
    (k * dx * dx, 2.0 * k * dx)
}

/// One-sided quadratic wall: `k (d0 - r)^2` for `r < d0`, zero beyond.
/// Returned as `(energy, dE/dr)`.
#[inline]
pub fn soft_repulsion(r: f64, d0: f64, k: f64) -> (f64, f64) {
    if r >= d0 {
        return (0.0, 0.0);
    }
    let overlap = d0 - r;
    (k * overlap * overlap, -2.0 * k * overlap)
}
