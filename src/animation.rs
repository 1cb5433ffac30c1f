//! Keyframe animation of node transforms.
//!
//! glTF stores animations as channels: one sampler (timestamps + values) per
//! animated property of a node. An [`AnimationClip`] groups the channels of one
//! glTF animation, and an [`AnimationMixer`] plays a clip on a loaded model
//! root, advanced by the render loop with the measured frame delta.

use std::collections::HashMap;

use cgmath::{InnerSpace, Quaternion, Vector3, VectorSpace};
use instant::Duration;

use crate::data_structures::scene_graph::{SceneNode, for_each_node_mut};

#[derive(Clone, Debug, PartialEq)]
pub enum Keyframes {
    Translation(Vec<Vector3<f32>>),
    Rotation(Vec<Quaternion<f32>>),
    Scale(Vec<Vector3<f32>>),
}

impl Keyframes {
    pub fn len(&self) -> usize {
        match self {
            Keyframes::Translation(v) => v.len(),
            Keyframes::Rotation(v) => v.len(),
            Keyframes::Scale(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interpolation {
    Linear,
    Step,
    /// Keyframe values are used, tangents are dropped at load time.
    CubicSpline,
}

/// The animated value of one node property at a point in time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Pose {
    Translation(Vector3<f32>),
    Rotation(Quaternion<f32>),
    Scale(Vector3<f32>),
}

/// Animates one property of the node with glTF index `node`.
#[derive(Clone, Debug)]
pub struct Channel {
    pub node: usize,
    pub interpolation: Interpolation,
    pub timestamps: Vec<f32>,
    pub keyframes: Keyframes,
}

impl Channel {
    /// Samples the channel at `time` seconds, holding the first/last keyframe
    /// outside the animated range.
    pub fn sample(&self, time: f32) -> Option<Pose> {
        let count = self.timestamps.len().min(self.keyframes.len());
        if count == 0 {
            return None;
        }
        let ts = &self.timestamps[..count];
        let (from, to, t) = if time <= ts[0] {
            (0, 0, 0.0)
        } else if time >= ts[count - 1] {
            (count - 1, count - 1, 0.0)
        } else {
            // first keyframe strictly after `time`
            let next = ts.partition_point(|&stamp| stamp <= time);
            let prev = next - 1;
            let span = ts[next] - ts[prev];
            let t = if span > 0.0 { (time - ts[prev]) / span } else { 0.0 };
            match self.interpolation {
                Interpolation::Step => (prev, prev, 0.0),
                Interpolation::Linear | Interpolation::CubicSpline => (prev, next, t),
            }
        };

        let pose = match &self.keyframes {
            Keyframes::Translation(v) => Pose::Translation(v[from].lerp(v[to], t)),
            Keyframes::Scale(v) => Pose::Scale(v[from].lerp(v[to], t)),
            Keyframes::Rotation(q) => Pose::Rotation(slerp(q[from], q[to], t)),
        };
        Some(pose)
    }

    pub fn duration(&self) -> f32 {
        self.timestamps.last().copied().unwrap_or(0.0)
    }
}

fn slerp(a: Quaternion<f32>, b: Quaternion<f32>, t: f32) -> Quaternion<f32> {
    if t == 0.0 {
        return a;
    }
    // take the short way around
    let b = if a.dot(b) < 0.0 { -b } else { b };
    a.slerp(b, t).normalize()
}

#[derive(Clone, Debug)]
pub struct AnimationClip {
    pub name: String,
    pub channels: Vec<Channel>,
}

impl AnimationClip {
    pub fn new(name: impl Into<String>, channels: Vec<Channel>) -> Self {
        Self {
            name: name.into(),
            channels,
        }
    }

    /// Length of the clip in seconds: the latest keyframe of any channel.
    pub fn duration(&self) -> f32 {
        self.channels
            .iter()
            .map(Channel::duration)
            .fold(0.0, f32::max)
    }
}

/// Plays one clip on a model, looping forever.
///
/// The mixer's clock only moves when [`AnimationMixer::update`] is called, by
/// exactly the delta it is given.
#[derive(Debug)]
pub struct AnimationMixer {
    clip: AnimationClip,
    duration: f32,
    time: f32,
    channels_by_node: HashMap<usize, Vec<usize>>,
}

impl AnimationMixer {
    /// Binds `clip` and starts playback at time zero.
    pub fn play(clip: AnimationClip) -> Self {
        let mut channels_by_node: HashMap<usize, Vec<usize>> = HashMap::new();
        for (idx, channel) in clip.channels.iter().enumerate() {
            channels_by_node.entry(channel.node).or_default().push(idx);
        }
        Self {
            duration: clip.duration(),
            clip,
            time: 0.0,
            channels_by_node,
        }
    }

    pub fn clip(&self) -> &AnimationClip {
        &self.clip
    }

    /// Total playback time in seconds since [`AnimationMixer::play`].
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Position inside the clip after looping.
    pub fn local_time(&self) -> f32 {
        if self.duration > 0.0 {
            self.time % self.duration
        } else {
            0.0
        }
    }

    /// Advances playback by `delta` and poses every animated node under `root`.
    pub fn update(&mut self, delta: Duration, root: &mut dyn SceneNode) {
        self.time += delta.as_secs_f32();
        let local_time = self.local_time();
        let channels = &self.clip.channels;
        let by_node = &self.channels_by_node;
        for_each_node_mut(root, &mut |node| {
            let Some(targets) = node.node_index().and_then(|idx| by_node.get(&idx)) else {
                return;
            };
            let transform = node.local_transform_mut();
            for pose in targets.iter().filter_map(|&c| channels[c].sample(local_time)) {
                match pose {
                    Pose::Translation(t) => transform.position = t,
                    Pose::Rotation(r) => transform.rotation = r,
                    Pose::Scale(s) => transform.scale = s,
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translation(times: Vec<f32>, xs: Vec<f32>, interpolation: Interpolation) -> Channel {
        Channel {
            node: 0,
            interpolation,
            timestamps: times,
            keyframes: Keyframes::Translation(
                xs.into_iter().map(|x| Vector3::new(x, 0.0, 0.0)).collect(),
            ),
        }
    }

    #[test]
    fn linear_channels_interpolate_between_keys() {
        let channel = translation(vec![0.0, 1.0, 3.0], vec![0.0, 2.0, 6.0], Interpolation::Linear);
        assert_eq!(channel.sample(0.5), Some(Pose::Translation(Vector3::new(1.0, 0.0, 0.0))));
        assert_eq!(channel.sample(2.0), Some(Pose::Translation(Vector3::new(4.0, 0.0, 0.0))));
    }

    #[test]
    fn samples_are_clamped_outside_the_range() {
        let channel = translation(vec![0.5, 1.0], vec![3.0, 5.0], Interpolation::Linear);
        assert_eq!(channel.sample(0.0), Some(Pose::Translation(Vector3::new(3.0, 0.0, 0.0))));
        assert_eq!(channel.sample(9.0), Some(Pose::Translation(Vector3::new(5.0, 0.0, 0.0))));
    }

    #[test]
    fn step_channels_hold_the_previous_key() {
        let channel = translation(vec![0.0, 1.0], vec![1.0, 9.0], Interpolation::Step);
        assert_eq!(channel.sample(0.99), Some(Pose::Translation(Vector3::new(1.0, 0.0, 0.0))));
        assert_eq!(channel.sample(1.0), Some(Pose::Translation(Vector3::new(9.0, 0.0, 0.0))));
    }

    #[test]
    fn empty_channels_yield_nothing() {
        let channel = translation(vec![], vec![], Interpolation::Linear);
        assert_eq!(channel.sample(0.3), None);
    }

    #[test]
    fn clip_duration_is_the_latest_keyframe() {
        let clip = AnimationClip::new(
            "walk",
            vec![
                translation(vec![0.0, 1.5], vec![0.0, 1.0], Interpolation::Linear),
                translation(vec![0.0, 2.5], vec![0.0, 1.0], Interpolation::Linear),
            ],
        );
        assert_eq!(clip.duration(), 2.5);
    }
}
