//! Fixed-capacity storage sized by a pre-build scan of the definition.
//! Arenas never reallocate, so indices handed out during the build stay
//! valid for the lifetime of the rig.

use std::ops::{Index, IndexMut};

use crate::defs::RigDef;
use crate::error::SoftbodyError;

pub struct Arena<T> {
    kind: &'static str,
    capacity: usize,
    items: Vec<T>,
}

impl<T> Arena<T> {
    pub fn with_capacity(kind: &'static str, capacity: usize) -> Self {
        Self { kind, capacity, items: Vec::with_capacity(capacity) }
    }

    pub fn try_push(&mut self, item: T) -> Result<usize, SoftbodyError> {
        if self.items.len() >= self.capacity {
            return Err(SoftbodyError::CapacityExceeded {
                kind: self.kind,
                capacity: self.capacity,
            });
        }
        self.items.push(item);
        Ok(self.items.len() - 1)
    }

    #[inline] pub fn len(&self) -> usize { self.items.len() }
    #[inline] pub fn is_empty(&self) -> bool { self.items.is_empty() }
    #[inline] pub fn capacity(&self) -> usize { self.capacity }
    #[inline] pub fn get(&self, index: usize) -> Option<&T> { self.items.get(index) }
    #[inline] pub fn iter(&self) -> std::slice::Iter<'_, T> { self.items.iter() }
    #[inline] pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> { self.items.iter_mut() }
    #[inline] pub fn as_slice(&self) -> &[T] { &self.items }
}

impl<T> Index<usize> for Arena<T> {
    type Output = T;
    #[inline] fn index(&self, index: usize) -> &T { &self.items[index] }
}

impl<T> IndexMut<usize> for Arena<T> {
    #[inline] fn index_mut(&mut self, index: usize) -> &mut T { &mut self.items[index] }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Arena<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("kind", &self.kind)
            .field("len", &self.items.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// Exact arena sizes for one definition. Wheel formulas mirror the
/// construction routines: single-ring wheels add `2r` nodes and `8r`
/// beams (`9r` with a rigidity node), dual-ring wheels `4r` nodes and
/// `24r`/`25r` beams, flexbody wheels `4r` nodes and `20r`/`21r` beams.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct MemoryEstimate {
    pub nodes: usize,
    pub beams: usize,
    pub shocks: usize,
    pub rotators: usize,
    pub wheels: usize,
}

impl MemoryEstimate {
    pub fn scan(def: &RigDef) -> Self {
        let mut est = Self::default();

        est.nodes += def.nodes.len();
        // each hook point gets a pre-allocated locking beam
        est.beams += def.nodes.iter().filter(|n| n.hook).count();

        est.beams += def.beams.len();
        est.beams += def.ties.len();
        est.beams += def.ropes.len();
        est.beams += def.hydros.len();

        est.beams += def.triggers.len();
        est.shocks += def.triggers.len();

        est.nodes += def.cinecams.len();
        est.beams += def.cinecams.len() * 8;

        est.beams += def.shocks.len();
        est.shocks += def.shocks.len();
        est.beams += def.shocks2.len();
        est.shocks += def.shocks2.len();
        est.beams += def.shocks3.len();
        est.shocks += def.shocks3.len();

        est.beams += def.commands.len();

        est.rotators += def.rotators.len();
        est.rotators += def.rotators2.len();

        for w in &def.wheels {
            let r = w.num_rays as usize;
            est.nodes += r * 2;
            est.beams += r * if w.rigidity_node.is_some() { 9 } else { 8 };
        }
        for w in &def.wheels2 {
            let r = w.num_rays as usize;
            est.nodes += r * 4;
            est.beams += r * if w.rigidity_node.is_some() { 25 } else { 24 };
        }
        for w in &def.meshwheels {
            let r = w.num_rays as usize;
            est.nodes += r * 2;
            est.beams += r * if w.rigidity_node.is_some() { 9 } else { 8 };
        }
        for w in &def.flexbodywheels {
            let r = w.num_rays as usize;
            est.nodes += r * 4;
            est.beams += r * if w.rigidity_node.is_some() { 21 } else { 20 };
        }

        est.wheels = def.wheels.len()
            + def.wheels2.len()
            + def.meshwheels.len()
            + def.flexbodywheels.len();

        est
    }
}
