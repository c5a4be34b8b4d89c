//! Keyframed actions.

use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};

use crate::math::Transform;

fn default_scale() -> DVec3 {
    DVec3::ONE
}

/// One key: a rest-relative local transform at a time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub time: f64,
    #[serde(default)]
    pub location: DVec3,
    #[serde(default)]
    pub rotation: DQuat,
    #[serde(default = "default_scale")]
    pub scale: DVec3,
}

impl Keyframe {
    /// Rest-pose key at `time`.
    pub fn new(time: f64) -> Self {
        Self::from_transform(time, &Transform::IDENTITY)
    }

    pub fn from_transform(time: f64, transform: &Transform) -> Self {
        Self {
            time,
            location: transform.translation,
            rotation: transform.rotation,
            scale: transform.scale,
        }
    }

    pub fn with_location(mut self, location: DVec3) -> Self {
        self.location = location;
        self
    }

    pub fn with_rotation(mut self, rotation: DQuat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn transform(&self) -> Transform {
        Transform {
            translation: self.location,
            rotation: self.rotation,
            scale: self.scale,
        }
    }
}

/// Keys for one bone, sorted by time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub bone: String,
    #[serde(default)]
    pub keyframes: Vec<Keyframe>,
}

impl Channel {
    pub fn new(bone: impl Into<String>, mut keyframes: Vec<Keyframe>) -> Self {
        keyframes.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self {
            bone: bone.into(),
            keyframes,
        }
    }

    /// Value at `time`: linear between keys, spherical for rotation, held
    /// constant outside the key range.
    pub fn sample(&self, time: f64) -> Transform {
        let keys = &self.keyframes;
        let (Some(first), Some(last)) = (keys.first(), keys.last()) else {
            return Transform::IDENTITY;
        };
        if time <= first.time {
            return first.transform();
        }
        if time >= last.time {
            return last.transform();
        }
        let next = keys.partition_point(|k| k.time <= time);
        let (a, b) = (&keys[next - 1], &keys[next]);
        let span = b.time - a.time;
        if span <= 0.0 {
            return b.transform();
        }
        a.transform().interpolate(&b.transform(), (time - a.time) / span)
    }
}

/// Named set of channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub name: String,
    #[serde(default)]
    pub channels: Vec<Channel>,
}

impl Action {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            channels: Vec::new(),
        }
    }

    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channels.push(channel);
        self
    }

    pub fn channel(&self, bone: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.bone == bone)
    }

    /// Union of every key time, ascending, without duplicates.
    pub fn key_times(&self) -> Vec<f64> {
        let mut times: Vec<f64> = self
            .channels
            .iter()
            .flat_map(|c| c.keyframes.iter().map(|k| k.time))
            .filter(|t| t.is_finite())
            .collect();
        times.sort_by(f64::total_cmp);
        times.dedup_by(|a, b| (*a - *b).abs() < 1e-9);
        times
    }
}
