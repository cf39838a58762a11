use std::collections::HashSet;

use log::{debug, info};
use nalgebra::Quaternion;

use crate::{math::quaternion::identity, telemetry::SampleLookup};

use super::relative::RelativeRotationResolver;

/// Work performed on each scheduler tick.
pub trait FrameHandler: Send {
    fn on_tick(&mut self);

    /// Called once when the scheduler is cancelled.
    fn on_cancel(&mut self) {}
}

/// Whatever displays the rig. Receives orientations in parent space.
pub trait PoseSink: Send {
    fn set_bone_rotation(&mut self, bone: &str, rotation: Quaternion<f64>);
}

/// Drives a skeleton from the latest joint samples.
pub struct RigDriver<L, S> {
    resolver: RelativeRotationResolver,
    lookup: L,
    sink: S,
    ready: HashSet<String>,
    complete: bool,
}

impl<L, S> RigDriver<L, S>
where
    L: SampleLookup + Send,
    S: PoseSink,
{
    pub fn new(resolver: RelativeRotationResolver, lookup: L, sink: S) -> Self {
        Self {
            resolver,
            lookup,
            sink,
            ready: HashSet::new(),
            complete: false,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    pub fn is_ready(&self, bone: &str) -> bool {
        self.ready.contains(bone)
    }

    /// Applies every joint that can be resolved now. Joints whose samples are
    /// missing keep their previous pose.
    pub fn update(&mut self) -> usize {
        let resolved = self.resolver.resolve_all(&self.lookup);

        for (bone, reason) in &resolved.skipped {
            if self.ready.remove(bone) {
                debug!("Joint '{bone}' lost its input: {reason}");
            } else {
                debug!("Skipping joint '{bone}': {reason}");
            }
        }

        for joint in &resolved.rotations {
            if self.ready.insert(joint.bone.clone()) {
                debug!("Joint '{}' is now tracking", joint.bone);
            }
            self.sink.set_bone_rotation(&joint.bone, joint.rotation);
        }

        if resolved.is_complete() != self.complete {
            self.complete = resolved.is_complete();

            if self.complete {
                info!("All {} joints ready", self.resolver.links().len());
            } else {
                info!("{} joint(s) waiting for samples", resolved.skipped.len());
            }
        }

        resolved.rotations.len()
    }

    /// Puts every driven bone back in its rest pose.
    pub fn reset(&mut self) {
        for link in self.resolver.links() {
            self.sink.set_bone_rotation(&link.bone, identity());
        }
        self.ready.clear();
        self.complete = false;

        info!("Rig reset to rest pose");
    }
}

impl<L, S> FrameHandler for RigDriver<L, S>
where
    L: SampleLookup + Send,
    S: PoseSink,
{
    fn on_tick(&mut self) {
        self.update();
    }

    fn on_cancel(&mut self) {
        self.reset();
    }
}
