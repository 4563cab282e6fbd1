//! Boundary conditions: halo filling on the Arakawa-C mesh.
//!
//! Each face of the domain (dimension × side) carries one [`Bcond`] object
//! constructed from the interior range and the halo width. The object owns
//! the precomputed halo and interior subranges for that face and fills
//! halos for four kinds of data:
//!
//! - scalars (`fill_halos_sclr`): cell-centred prognostic fields,
//! - pressure (`fill_halos_pres`): may differ from scalars (rigid walls
//!   need a zero normal derivative),
//! - the advector component along this dimension
//!   (`fill_halos_vctr_alng`): face-centred, staggered half a cell,
//! - advector components normal to this dimension
//!   (`fill_halos_vctr_nrml`): cell-centred along this dimension.
//!
//! `set_edge_pres` stamps the edge value used when the pressure gradient
//! is projected at a rigid wall (Neumann via edge substitution).
//!
//! Boundary fills sit on a hot path, so the policy is a small tagged enum
//! dispatched through a match rather than a virtual call per cell. Corner
//! halos need no special pass: the exchange driver processes dimensions in
//! ascending order with halo-widened perpendicular ranges, so later
//! dimensions copy from already-filled halos.

mod cyclic;
mod open;
mod polar;
mod rigid;

use crate::arr::SharedArr;
use crate::grid::{iter_region, with_dim, Region, Rng, Side};

/// Boundary policy selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BcondKind {
    /// Periodic wrap-around.
    Cyclic,
    /// Impermeable free-slip wall.
    Rigid,
    /// Pole of a spherical-type grid: hemispheres swap with an index
    /// permutation, normal components flip sign.
    Polar,
    /// Outflow: zero-gradient extrapolation from the outermost interior.
    Open,
    /// Placeholder that must never be invoked.
    Null,
    /// Interior subdomain edge owned by a neighbouring worker; halos are
    /// already present in shared memory, so fills are no-ops.
    Shared,
}

/// One boundary object: a policy bound to a face of the domain.
#[derive(Clone, Debug)]
pub struct Bcond<const D: usize> {
    kind: BcondKind,
    dim: usize,
    side: Side,
    n: i64,
    /// Halo cells along `dim` (scalar indexing).
    halo_sclr: Rng,
    /// Interior cells mirrored into the opposite halo under cyclic wrap.
    intr_sclr: Rng,
    /// Halo faces along `dim` (face indexing; the wall face is included
    /// on the left, stamped separately on the right).
    halo_vctr: Rng,
    /// Interior faces copied into the opposite halo under cyclic wrap.
    intr_vctr: Rng,
    /// First/last interior cell, used for edge stamping.
    edge_sclr: i64,
    /// The wall face index (`-1` on the left, `n-1` on the right).
    wall_vctr: i64,
    /// Permuted dimension and its extent (polar only).
    perm_dim: usize,
    perm_n: i64,
}

impl<const D: usize> Bcond<D> {
    /// Build the boundary object for one face of the domain.
    ///
    /// For [`BcondKind::Polar`] the hemisphere swap permutes the first
    /// dimension other than `dim`, whose extent must be even.
    ///
    /// # Arguments
    /// * `kind` - Boundary policy for this face
    /// * `dim` - Dimension the face closes off
    /// * `side` - Which end of that dimension
    /// * `n` - Interior cells along `dim`
    /// * `halo` - Halo width
    /// * `sizes` - Interior cells of every dimension (for the polar swap)
    pub fn new(kind: BcondKind, dim: usize, side: Side, n: usize, halo: usize, sizes: [usize; D]) -> Self {
        let n = n as i64;
        let h = halo as i64;
        let (halo_sclr, intr_sclr, halo_vctr, intr_vctr, edge_sclr, wall_vctr) = match side {
            Side::Left => (
                Rng::new(-h, -1),
                Rng::new(0, h - 1),
                Rng::new(-h, -1),
                Rng::new(0, h - 1),
                0,
                -1,
            ),
            Side::Right => (
                Rng::new(n, n + h - 1),
                Rng::new(n - h, n - 1),
                Rng::new(n, n + h - 1),
                Rng::new(n - h, n - 1),
                n - 1,
                n - 1,
            ),
        };
        let perm_dim = (0..D).find(|&q| q != dim).unwrap_or(dim);
        if kind == BcondKind::Polar {
            debug_assert!(D >= 2, "polar boundaries need at least two dimensions");
            debug_assert!(sizes[perm_dim] % 2 == 0, "polar swap needs an even extent");
        }
        Self {
            kind,
            dim,
            side,
            n,
            halo_sclr,
            intr_sclr,
            halo_vctr,
            intr_vctr,
            edge_sclr,
            wall_vctr,
            perm_dim,
            perm_n: sizes[perm_dim] as i64,
        }
    }

    /// The policy this face uses.
    #[inline]
    pub fn kind(&self) -> BcondKind {
        self.kind
    }

    /// Halo cell range along this face's dimension (scalar indexing).
    #[inline]
    pub fn halo_sclr(&self) -> Rng {
        self.halo_sclr
    }

    /// Interior cell range feeding the opposite halo under cyclic wrap.
    #[inline]
    pub fn intr_sclr(&self) -> Rng {
        self.intr_sclr
    }

    /// Halo face range along this face's dimension.
    #[inline]
    pub fn halo_vctr(&self) -> Rng {
        self.halo_vctr
    }

    /// Interior face range feeding the opposite halo under cyclic wrap.
    #[inline]
    pub fn intr_vctr(&self) -> Rng {
        self.intr_vctr
    }

    /// Fill the scalar halo of `a` on this face.
    ///
    /// # Arguments
    /// * `a` - Field whose halo cells are written
    /// * `perp` - Perpendicular ranges to cover; the entry for this
    ///   face's dimension is ignored
    pub fn fill_halos_sclr(&self, a: &SharedArr<D>, perp: &Region<D>) {
        match self.kind {
            BcondKind::Cyclic => cyclic::fill_sclr(self, a, perp),
            BcondKind::Rigid => rigid::fill_sclr(self, a, perp),
            BcondKind::Polar => polar::fill_sclr(self, a, perp),
            BcondKind::Open => open::fill_sclr(self, a, perp),
            BcondKind::Shared => {}
            BcondKind::Null => debug_assert!(false, "null boundary invoked"),
        }
    }

    /// Fill the pressure halo of `a` on this face.
    pub fn fill_halos_pres(&self, a: &SharedArr<D>, perp: &Region<D>) {
        match self.kind {
            BcondKind::Cyclic => cyclic::fill_sclr(self, a, perp),
            // Mirroring gives the zero normal derivative a rigid wall needs.
            BcondKind::Rigid => rigid::fill_sclr(self, a, perp),
            BcondKind::Polar => polar::fill_sclr(self, a, perp),
            BcondKind::Open => open::fill_sclr(self, a, perp),
            BcondKind::Shared => {}
            BcondKind::Null => debug_assert!(false, "null boundary invoked"),
        }
    }

    /// Fill the halo of the advector component along this face's
    /// dimension (face-centred data).
    ///
    /// # Arguments
    /// * `av` - The component staggered along this face's dimension
    /// * `perp` - Perpendicular ranges to cover
    pub fn fill_halos_vctr_alng(&self, av: &SharedArr<D>, perp: &Region<D>) {
        match self.kind {
            BcondKind::Cyclic => cyclic::fill_vctr_alng(self, av, perp),
            BcondKind::Rigid => rigid::fill_vctr_alng(self, av, perp),
            BcondKind::Polar => polar::fill_vctr_alng(self, av, perp),
            BcondKind::Open => open::fill_vctr_alng(self, av, perp),
            BcondKind::Shared => {}
            BcondKind::Null => debug_assert!(false, "null boundary invoked"),
        }
    }

    /// Fill the halo of an advector component normal to this face's
    /// dimension (cell-centred along it).
    pub fn fill_halos_vctr_nrml(&self, a: &SharedArr<D>, perp: &Region<D>) {
        match self.kind {
            BcondKind::Cyclic => cyclic::fill_sclr(self, a, perp),
            BcondKind::Rigid => rigid::fill_sclr(self, a, perp),
            BcondKind::Polar => polar::fill_vctr_nrml(self, a, perp),
            BcondKind::Open => open::fill_sclr(self, a, perp),
            BcondKind::Shared => {}
            BcondKind::Null => debug_assert!(false, "null boundary invoked"),
        }
    }

    /// Stamp the edge value of a pressure-gradient component on this face.
    ///
    /// # Arguments
    /// * `a` - Gradient component along this face's dimension
    /// * `v` - `None` zeroes the edge (the Laplacian's inner gradients);
    ///   `Some(vel)` sets it to `-vel` so the projected correction
    ///   cancels the wall-normal velocity
    /// * `perp` - Perpendicular ranges to cover
    pub fn set_edge_pres(&self, a: &SharedArr<D>, v: Option<&SharedArr<D>>, perp: &Region<D>) {
        if self.kind != BcondKind::Rigid {
            return;
        }
        rigid::set_edge_pres(self, a, v, perp);
    }

    // -- shared helpers used by the policy modules ------------------------

    /// Apply `f` to every halo cell (scalar indexing) of this face.
    fn for_each_halo_sclr(&self, perp: &Region<D>, mut f: impl FnMut([i64; D])) {
        let region = with_dim(*perp, self.dim, self.halo_sclr);
        for ix in iter_region(region) {
            f(ix);
        }
    }

    /// Apply `f` to every halo face of this face.
    fn for_each_halo_vctr(&self, perp: &Region<D>, mut f: impl FnMut([i64; D])) {
        let region = with_dim(*perp, self.dim, self.halo_vctr);
        for ix in iter_region(region) {
            f(ix);
        }
    }

    /// Apply `f` to every edge cell of this face.
    fn for_each_edge(&self, perp: &Region<D>, mut f: impl FnMut([i64; D])) {
        let region = with_dim(*perp, self.dim, Rng::new(self.edge_sclr, self.edge_sclr));
        for ix in iter_region(region) {
            f(ix);
        }
    }
}
