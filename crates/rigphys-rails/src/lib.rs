//! Slide-node rail constraints: beams chained into rails, nodes that
//! ride them under a threshold-gated corrective spring, and the
//! scene-wide lock toggle that attaches nodes to the closest rail on
//! any vehicle in reach.

pub mod build;
pub mod rail;
pub mod scene;
pub mod slidenode;

pub use build::{
    build_vehicle_rails, AttachConstraint, RailGroupDef, RailsDef, SlideNodeDef, VehicleRails,
};
pub use rail::{beam_distance, find_beam, RailGroup, RailSegment};
pub use scene::{
    reset_slide_node_positions, reset_slide_nodes, toggle_slide_node_lock,
    update_slide_node_forces,
};
pub use slidenode::{RailRef, SlideNode};
