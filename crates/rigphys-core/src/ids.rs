use core::fmt;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);
impl NodeId { #[inline] pub fn idx(self) -> usize { self.0 as usize } }
impl fmt::Display for NodeId { fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "NodeId({})", self.0) } }

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct BeamId(pub u32);
impl BeamId { #[inline] pub fn idx(self) -> usize { self.0 as usize } }
impl fmt::Display for BeamId { fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "BeamId({})", self.0) } }

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ShockId(pub u32);
impl ShockId { #[inline] pub fn idx(self) -> usize { self.0 as usize } }
impl fmt::Display for ShockId { fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "ShockId({})", self.0) } }

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct WheelId(pub u32);
impl WheelId { #[inline] pub fn idx(self) -> usize { self.0 as usize } }
impl fmt::Display for WheelId { fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "WheelId({})", self.0) } }

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct RotatorId(pub u32);
impl RotatorId { #[inline] pub fn idx(self) -> usize { self.0 as usize } }
impl fmt::Display for RotatorId { fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "RotatorId({})", self.0) } }

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct DiffId(pub u32);
impl DiffId { #[inline] pub fn idx(self) -> usize { self.0 as usize } }
impl fmt::Display for DiffId { fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "DiffId({})", self.0) } }

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct RailGroupId(pub u32);
impl fmt::Display for RailGroupId { fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "RailGroupId({})", self.0) } }
