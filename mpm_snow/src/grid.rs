//! The uniform Eulerian grid: node storage, index <-> coordinate mapping, and the
//! per-particle stencil walk used by every transfer stage.

use glam::DVec3;

use crate::kernel;
use crate::kinematics::Kinematics;

/// A single lattice sample. `mass`, `force`, and `velocity_star` are recomputed
/// every tick; `density0` is frozen during the initialization tick (tick 0).
#[derive(Clone, Debug)]
pub struct GridNode {
    pub location: (i64, i64, i64),
    pub mass: f64,
    pub kinematics: Kinematics,
    pub force: DVec3,
    pub density0: f64,
}

impl GridNode {
    fn new(location: (i64, i64, i64)) -> Self {
        Self {
            location,
            mass: 0.0,
            kinematics: Kinematics::default(),
            force: DVec3::ZERO,
            density0: 0.0,
        }
    }

    pub fn position(&self, h: f64) -> DVec3 {
        DVec3::new(
            self.location.0 as f64,
            self.location.1 as f64,
            self.location.2 as f64,
        ) * h
    }
}

/// A uniform `(nx, ny, nz)` lattice of spacing `h`, flat-indexed as
/// `i = ix + nx*(iy + ny*iz)`.
#[derive(Clone, Debug)]
pub struct Grid {
    dims: (usize, usize, usize),
    h: f64,
    nodes: Vec<GridNode>,
}

impl Grid {
    pub fn new(dims: (usize, usize, usize), h: f64) -> Self {
        let (nx, ny, nz) = dims;
        let mut nodes = Vec::with_capacity(nx * ny * nz);
        for iz in 0..nz {
            for iy in 0..ny {
                for ix in 0..nx {
                    nodes.push(GridNode::new((ix as i64, iy as i64, iz as i64)));
                }
            }
        }
        Self { dims, h, nodes }
    }

    pub fn dims(&self) -> (usize, usize, usize) {
        self.dims
    }

    pub fn h(&self) -> f64 {
        self.h
    }

    pub fn inv_h(&self) -> f64 {
        1.0 / self.h
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> &[GridNode] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut [GridNode] {
        &mut self.nodes
    }

    /// Flat index for an in-range `(ix, iy, iz)`, or `None` if any axis is
    /// outside `[0, n-1]`.
    pub fn index_of(&self, ix: i64, iy: i64, iz: i64) -> Option<usize> {
        let (nx, ny, nz) = self.dims;
        if ix < 0 || iy < 0 || iz < 0 || ix as usize >= nx || iy as usize >= ny || iz as usize >= nz {
            return None;
        }
        Some(ix as usize + nx * (iy as usize + ny * iz as usize))
    }

    pub fn node(&self, index: usize) -> &GridNode {
        &self.nodes[index]
    }

    pub fn node_mut(&mut self, index: usize) -> &mut GridNode {
        &mut self.nodes[index]
    }

    /// Every valid `(node index, weight, weight gradient)` triple in the 4x4x4
    /// stencil around `position`. Nodes outside the grid are simply omitted, per
    /// the "invalid and skipped" contract on out-of-range lattice coordinates.
    pub fn stencil(&self, position: DVec3) -> StencilIter<'_> {
        let d = position * self.inv_h();
        let base = (
            kernel::stencil_start(d.x),
            kernel::stencil_start(d.y),
            kernel::stencil_start(d.z),
        );
        StencilIter {
            grid: self,
            position,
            base,
            offset: 0,
        }
    }
}

/// Iterator over the (up to 64) grid nodes a particle couples to.
pub struct StencilIter<'a> {
    grid: &'a Grid,
    position: DVec3,
    base: (i64, i64, i64),
    offset: u8,
}

/// One particle/node coupling: the node's flat index, the interpolation weight,
/// and the weight gradient, both evaluated at the node.
pub struct StencilEntry {
    pub index: usize,
    pub weight: f64,
    pub gradient: DVec3,
}

impl<'a> Iterator for StencilIter<'a> {
    type Item = StencilEntry;

    fn next(&mut self) -> Option<Self::Item> {
        while self.offset < 64 {
            let (dx, dy, dz) = (
                (self.offset % 4) as i64,
                ((self.offset / 4) % 4) as i64,
                (self.offset / 16) as i64,
            );
            self.offset += 1;

            let node_coord = (self.base.0 + dx, self.base.1 + dy, self.base.2 + dz);
            let Some(index) = self.grid.index_of(node_coord.0, node_coord.1, node_coord.2) else {
                continue;
            };
            let node_pos = DVec3::new(
                node_coord.0 as f64,
                node_coord.1 as f64,
                node_coord.2 as f64,
            ) * self.grid.h;
            let delta = (self.position - node_pos) * self.grid.inv_h();
            let weight = kernel::weight(delta);
            if weight == 0.0 {
                continue;
            }
            let gradient = kernel::weight_gradient(delta, self.grid.inv_h());
            return Some(StencilEntry {
                index,
                weight,
                gradient,
            });
        }
        None
    }
}
