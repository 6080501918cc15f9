pub mod scalar;
pub mod ids;
pub mod types;
pub mod spline;
pub mod rng;
pub mod hash;

pub use scalar::Scalar;
pub use ids::{NodeId, BeamId, ShockId, WheelId, RotatorId, DiffId, RailGroupId};
pub use types::{Vec3, vec3};
pub use spline::Spline;
pub use rng::XorShift64;
pub use hash::{StateHasher, hash_scalar, hash_vec3};
pub use glam::Vec2;
