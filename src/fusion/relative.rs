use nalgebra::Quaternion;
use thiserror::Error;

use crate::{
    math::quaternion::{invert, multiply, quaternion_from_value},
    telemetry::{SampleLookup, ShapeError},
};

/// Orientation of `child` expressed in the frame of `parent`, both given as
/// absolute orientations.
pub fn resolve(parent: &Quaternion<f64>, child: &Quaternion<f64>) -> Quaternion<f64> {
    multiply(&invert(parent), child)
}

/// A bone driven by one telemetry key. Bones without a parent receive their
/// absolute orientation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JointLink {
    pub bone: String,
    pub key: String,
    pub parent: Option<String>,
}

impl JointLink {
    pub fn root(bone: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bone: bone.into(),
            key: key.into(),
            parent: None,
        }
    }

    pub fn child(
        bone: impl Into<String>,
        key: impl Into<String>,
        parent: impl Into<String>,
    ) -> Self {
        Self {
            bone: bone.into(),
            key: key.into(),
            parent: Some(parent.into()),
        }
    }
}

/// Why a joint could not be resolved this tick. Not an error: the caller
/// keeps the previous pose for that joint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotReady {
    #[error("No sample received yet for '{0}'")]
    Missing(String),

    #[error("Sample for '{key}' is not a quaternion: {source}")]
    Malformed { key: String, source: ShapeError },
}

#[derive(Debug, Clone, PartialEq)]
pub struct JointRotation {
    pub bone: String,
    pub rotation: Quaternion<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct Resolved {
    pub rotations: Vec<JointRotation>,
    pub skipped: Vec<(String, NotReady)>,
}

impl Resolved {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RelativeRotationResolver {
    links: Vec<JointLink>,
}

impl RelativeRotationResolver {
    pub fn new(links: Vec<JointLink>) -> Self {
        Self { links }
    }

    pub fn links(&self) -> &[JointLink] {
        &self.links
    }

    pub fn resolve_link<L: SampleLookup + ?Sized>(
        &self,
        link: &JointLink,
        lookup: &L,
    ) -> Result<Quaternion<f64>, NotReady> {
        let child = absolute(lookup, &link.key)?;

        match &link.parent {
            Some(parent_key) => Ok(resolve(&absolute(lookup, parent_key)?, &child)),
            None => Ok(child),
        }
    }

    /// Resolves every configured joint from the current samples, never
    /// waiting for missing ones.
    pub fn resolve_all<L: SampleLookup + ?Sized>(&self, lookup: &L) -> Resolved {
        let mut resolved = Resolved::default();

        for link in &self.links {
            match self.resolve_link(link, lookup) {
                Ok(rotation) => resolved.rotations.push(JointRotation {
                    bone: link.bone.clone(),
                    rotation,
                }),
                Err(reason) => resolved.skipped.push((link.bone.clone(), reason)),
            }
        }

        resolved
    }
}

fn absolute<L: SampleLookup + ?Sized>(lookup: &L, key: &str) -> Result<Quaternion<f64>, NotReady> {
    let value = lookup
        .lookup(key)
        .ok_or_else(|| NotReady::Missing(key.to_string()))?;

    quaternion_from_value(&value).map_err(|source| NotReady::Malformed {
        key: key.to_string(),
        source,
    })
}
