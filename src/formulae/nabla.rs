//! Centred difference operators for the elliptic solver.
//!
//! The pressure path materialises intermediate gradient arrays (one per
//! dimension, halo-exchanged between stages) and applies the divergence
//! to them; the Laplacian is the composition of the two. All operators
//! are cell-centred with the wide (2Δ) stencil.

use crate::arr::SharedArr;
use crate::grid::shifted;

/// ∂a/∂x_d at cell `ix`: `(a(ix+e_d) − a(ix−e_d)) / (2 Δ_d)`.
///
/// # Arguments
/// * `a` - Field to differentiate (halos must be valid)
/// * `ix` - Cell to evaluate
/// * `d` - Differentiation dimension
/// * `dx` - Cell spacing along `d`
///
/// # Returns
/// The centred derivative at the cell centre
#[inline]
pub fn grad<const D: usize>(a: &SharedArr<D>, ix: [i64; D], d: usize, dx: f64) -> f64 {
    (a.get(shifted(ix, d, 1)) - a.get(shifted(ix, d, -1))) / dx * 0.5
}

/// Divergence of the component arrays `v` at cell `ix`.
///
/// # Arguments
/// * `v` - One component array per dimension (halos must be valid)
/// * `ix` - Cell to evaluate
/// * `spacing` - Cell spacing per dimension
///
/// # Returns
/// The sum of the centred derivatives of each component
#[inline]
pub fn div<const D: usize>(v: &[&SharedArr<D>], ix: [i64; D], spacing: &[f64; D]) -> f64 {
    let mut acc = 0.0;
    for d in 0..D {
        acc += grad(v[d], ix, d, spacing[d]);
    }
    acc
}
