pub mod relative;
pub mod rig;
pub mod scheduler;

pub use relative::{JointLink, JointRotation, NotReady, RelativeRotationResolver, resolve};
pub use rig::{FrameHandler, PoseSink, RigDriver};
pub use scheduler::FrameScheduler;
