//! Keyframe animation over data arrays.
//!
//! An animation node has a single `progress` input in `[0, 1]` and produces
//! one output per channel plus the overall `duration`. Local time is
//! `progress * duration`, where duration is the last timestamp of the longest
//! channel.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::data_array::{DataArray, DataArrayData};
use crate::id::{DataArrayHandle, ObjectId};
use crate::property::{PropertySemantics, PropertySpec, PropertyTree};
use crate::value::{PropertyType, PropertyValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interpolation {
    Step,
    Linear,
    Cubic,
    LinearQuaternions,
    CubicQuaternions,
}

impl Interpolation {
    pub fn is_cubic(self) -> bool {
        matches!(self, Interpolation::Cubic | Interpolation::CubicQuaternions)
    }

    pub fn is_quaternion(self) -> bool {
        matches!(self, Interpolation::LinearQuaternions | Interpolation::CubicQuaternions)
    }
}

/// One channel as passed to [`AnimationNodeConfig::add_channel`].
#[derive(Debug, Clone)]
pub struct AnimationChannel {
    pub name: String,
    pub timestamps: DataArrayHandle,
    pub keyframes: DataArrayHandle,
    pub interpolation: Interpolation,
    pub tangents_in: Option<DataArrayHandle>,
    pub tangents_out: Option<DataArrayHandle>,
}

impl AnimationChannel {
    pub fn new(
        name: impl Into<String>,
        timestamps: DataArrayHandle,
        keyframes: DataArrayHandle,
        interpolation: Interpolation,
    ) -> Self {
        AnimationChannel {
            name: name.into(),
            timestamps,
            keyframes,
            interpolation,
            tangents_in: None,
            tangents_out: None,
        }
    }

    pub fn with_tangents(mut self, tangents_in: DataArrayHandle, tangents_out: DataArrayHandle) -> Self {
        self.tangents_in = Some(tangents_in);
        self.tangents_out = Some(tangents_out);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnimationNodeConfig {
    channels: Vec<AnimationChannel>,
}

impl AnimationNodeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_channel(&mut self, channel: AnimationChannel) -> &mut Self {
        self.channels.push(channel);
        self
    }

    pub fn channels(&self) -> &[AnimationChannel] {
        &self.channels
    }
}

/// Persisted channel: data arrays by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelDescriptor {
    pub name: String,
    pub timestamps: ObjectId,
    pub keyframes: ObjectId,
    pub interpolation: Interpolation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tangents_in: Option<ObjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tangents_out: Option<ObjectId>,
}

impl From<&AnimationChannel> for ChannelDescriptor {
    fn from(c: &AnimationChannel) -> Self {
        ChannelDescriptor {
            name: c.name.clone(),
            timestamps: c.timestamps.id(),
            keyframes: c.keyframes.id(),
            interpolation: c.interpolation,
            tangents_in: c.tangents_in.map(|h| h.id()),
            tangents_out: c.tangents_out.map(|h| h.id()),
        }
    }
}

impl ChannelDescriptor {
    /// Every data array this channel references.
    pub fn data_arrays(&self) -> impl Iterator<Item = ObjectId> + '_ {
        [Some(self.timestamps), Some(self.keyframes), self.tangents_in, self.tangents_out]
            .into_iter()
            .flatten()
    }
}

pub struct AnimationNode {
    pub(crate) channels: Vec<ChannelDescriptor>,
    pub(crate) duration: f32,
}

fn lookup<'a>(
    arrays: &'a IndexMap<ObjectId, DataArray>,
    id: ObjectId,
    channel: &str,
) -> Result<&'a DataArray, String> {
    arrays
        .get(&id)
        .ok_or_else(|| format!("Data array ({id}) of channel '{channel}' not found"))
}

/// Validates the channels and returns the overall duration.
pub(crate) fn validate_channels(
    node_name: &str,
    channels: &[ChannelDescriptor],
    arrays: &IndexMap<ObjectId, DataArray>,
) -> Result<f32, String> {
    if channels.is_empty() {
        return Err(format!("Cannot create AnimationNode '{node_name}' without channels"));
    }
    let mut names = HashSet::new();
    let mut duration = 0.0f32;
    for ch in channels {
        if !names.insert(ch.name.as_str()) {
            return Err(format!("Channel name '{}' is used more than once", ch.name));
        }
        let timestamps = lookup(arrays, ch.timestamps, &ch.name)?;
        let keyframes = lookup(arrays, ch.keyframes, &ch.name)?;
        let DataArrayData::Float(ts) = &timestamps.data else {
            return Err(format!(
                "Timestamps data array of channel '{}' must be of type FLOAT",
                ch.name
            ));
        };
        if ts.len() != keyframes.len() {
            return Err(format!(
                "Number of keyframes must match number of timestamps in channel '{}'",
                ch.name
            ));
        }
        if ts.windows(2).any(|w| w[0] >= w[1]) {
            return Err(format!("Timestamps of channel '{}' must be strictly ascending", ch.name));
        }
        if ch.interpolation.is_quaternion() && !matches!(keyframes.data, DataArrayData::Vec4f(_)) {
            return Err(format!(
                "Quaternion interpolation requires VEC4F keyframes in channel '{}'",
                ch.name
            ));
        }
        if ch.interpolation.is_cubic() {
            let fits = |id: Option<ObjectId>| -> Result<bool, String> {
                let Some(id) = id else { return Ok(false) };
                let t = lookup(arrays, id, &ch.name)?;
                Ok(t.data_type() == keyframes.data_type()
                    && t.len() == keyframes.len()
                    && t.data.components() == keyframes.data.components())
            };
            if !fits(ch.tangents_in)? || !fits(ch.tangents_out)? {
                return Err(format!(
                    "Cubic interpolation requires tangents of the same type and size as keyframes in channel '{}'",
                    ch.name
                ));
            }
        }
        if let Some(last) = ts.last() {
            duration = duration.max(*last);
        }
    }
    Ok(duration)
}

pub(crate) fn build_tree(
    channels: &[ChannelDescriptor],
    arrays: &IndexMap<ObjectId, DataArray>,
) -> Result<PropertyTree, String> {
    let inputs = PropertySpec::structure("", vec![PropertySpec::leaf("progress", PropertyType::Float)]);
    let mut outputs = vec![PropertySpec::leaf("duration", PropertyType::Float)];
    for ch in channels {
        let keyframes = lookup(arrays, ch.keyframes, &ch.name)?;
        outputs.push(match keyframes.data.element_property_type() {
            Some(ty) => PropertySpec::leaf(ch.name.clone(), ty),
            None => PropertySpec::array(
                ch.name.clone(),
                PropertySpec::leaf("", PropertyType::Float),
                keyframes.data.components(),
            ),
        });
    }
    PropertyTree::new(
        &inputs,
        Some(&PropertySpec::structure("", outputs)),
        PropertySemantics::Input,
    )
}

fn hermite(p0: f32, p1: f32, m0: f32, m1: f32, t: f32) -> f32 {
    let t2 = t * t;
    let t3 = t2 * t;
    (2.0 * t3 - 3.0 * t2 + 1.0) * p0 + (t3 - 2.0 * t2 + t) * m0 + (-2.0 * t3 + 3.0 * t2) * p1 + (t3 - t2) * m1
}

fn is_integral(data: &DataArrayData) -> bool {
    matches!(
        data,
        DataArrayData::Int32(_) | DataArrayData::Vec2i(_) | DataArrayData::Vec3i(_) | DataArrayData::Vec4i(_)
    )
}

impl AnimationNode {
    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn channels(&self) -> &[ChannelDescriptor] {
        &self.channels
    }

    pub fn uses_data_array(&self, id: ObjectId) -> Option<&str> {
        self.channels
            .iter()
            .find(|c| c.data_arrays().any(|d| d == id))
            .map(|c| c.name.as_str())
    }

    pub(crate) fn execute(
        &self,
        tree: &mut PropertyTree,
        arrays: &IndexMap<ObjectId, DataArray>,
    ) -> Result<(), String> {
        let progress = tree
            .resolve_path(tree.inputs(), "progress")
            .and_then(|idx| tree.value(idx))
            .and_then(|v| v.get::<f32>())
            .unwrap_or_default();
        let local_time = progress * self.duration;
        let outputs = tree.outputs().ok_or("Animation node has no outputs")?;
        if let Some(idx) = tree.child_by_name(outputs, "duration") {
            tree.set_leaf(idx, PropertyValue::Float(self.duration));
        }

        for ch in &self.channels {
            let components = self.sample(ch, local_time, arrays)?;
            let target = tree
                .child_by_name(outputs, &ch.name)
                .ok_or_else(|| format!("Missing output for channel '{}'", ch.name))?;
            let keyframes = lookup(arrays, ch.keyframes, &ch.name)?;
            match keyframes.data.element_property_type() {
                Some(ty) => {
                    let value = DataArrayData::value_from_f32(ty, &components)
                        .ok_or_else(|| format!("Keyframes of channel '{}' are malformed", ch.name))?;
                    tree.set_leaf(target, value);
                }
                None => {
                    for (i, c) in components.into_iter().enumerate() {
                        if let Some(leaf) = tree.child_at(target, i) {
                            tree.set_leaf(leaf, PropertyValue::Float(c));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn sample(
        &self,
        ch: &ChannelDescriptor,
        local_time: f32,
        arrays: &IndexMap<ObjectId, DataArray>,
    ) -> Result<Vec<f32>, String> {
        let DataArrayData::Float(ts) = &lookup(arrays, ch.timestamps, &ch.name)?.data else {
            return Err(format!("Timestamps of channel '{}' are not floats", ch.name));
        };
        let keyframes = &lookup(arrays, ch.keyframes, &ch.name)?.data;
        if ts.is_empty() {
            return Err(format!("Channel '{}' has no keyframes", ch.name));
        }

        // upper bound: first timestamp strictly greater than local time
        let upper = ts.partition_point(|t| *t <= local_time);
        let lower = upper.saturating_sub(1);
        let upper = upper.min(ts.len() - 1);
        let dt = ts[upper] - ts[lower];
        let ratio = if upper != lower {
            ((local_time - ts[lower]) / dt).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let element = |data: &DataArrayData, i: usize| {
            data.element_f32(i)
                .ok_or_else(|| format!("Keyframe index {i} out of range in channel '{}'", ch.name))
        };
        let lo = element(keyframes, lower)?;
        let hi = element(keyframes, upper)?;
        let integral = is_integral(keyframes);

        let mut out: Vec<f32> = match ch.interpolation {
            Interpolation::Step => lo,
            Interpolation::Linear | Interpolation::LinearQuaternions => lo
                .iter()
                .zip(&hi)
                .map(|(l, u)| {
                    let delta = ratio * (u - l);
                    if integral {
                        l + delta.round()
                    } else {
                        l + delta
                    }
                })
                .collect(),
            Interpolation::Cubic | Interpolation::CubicQuaternions => {
                let (Some(tin), Some(tout)) = (ch.tangents_in, ch.tangents_out) else {
                    return Err(format!("Channel '{}' is missing tangents", ch.name));
                };
                let tout = element(&lookup(arrays, tout, &ch.name)?.data, lower)?;
                let tin = element(&lookup(arrays, tin, &ch.name)?.data, upper)?;
                lo.iter()
                    .zip(&hi)
                    .zip(tout.iter().zip(&tin))
                    .map(|((p0, p1), (m0, m1))| hermite(*p0, *p1, dt * m0, dt * m1, ratio))
                    .collect()
            }
        };

        if ch.interpolation.is_quaternion() {
            let len = out.iter().map(|c| c * c).sum::<f32>().sqrt();
            if len > 0.0 {
                out.iter_mut().for_each(|c| *c /= len);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectMeta;

    struct Fixture {
        arrays: IndexMap<ObjectId, DataArray>,
    }

    impl Fixture {
        fn new() -> Self {
            Fixture {
                arrays: IndexMap::new(),
            }
        }

        fn add(&mut self, data: DataArrayData) -> ObjectId {
            let meta = ObjectMeta::new("array");
            let id = meta.id;
            self.arrays.insert(id, DataArray { meta, data });
            id
        }
    }

    fn channel(name: &str, ts: ObjectId, kf: ObjectId, interpolation: Interpolation) -> ChannelDescriptor {
        ChannelDescriptor {
            name: name.into(),
            timestamps: ts,
            keyframes: kf,
            interpolation,
            tangents_in: None,
            tangents_out: None,
        }
    }

    fn run(fx: &Fixture, channels: Vec<ChannelDescriptor>, progress: f32) -> PropertyTree {
        let duration = validate_channels("anim", &channels, &fx.arrays).unwrap();
        let node = AnimationNode { channels, duration };
        let mut tree = build_tree(&node.channels, &fx.arrays).unwrap();
        let p = tree.resolve_path(tree.inputs(), "progress").unwrap();
        tree.set_leaf(p, PropertyValue::Float(progress));
        node.execute(&mut tree, &fx.arrays).unwrap();
        tree
    }

    fn output(tree: &PropertyTree, path: &str) -> PropertyValue {
        let idx = tree.resolve_path(tree.outputs().unwrap(), path).unwrap();
        tree.value(idx).unwrap().clone()
    }

    #[test]
    fn linear_interpolates_between_neighbours() {
        let mut fx = Fixture::new();
        let ts = fx.add(DataArrayData::Float(vec![0.0, 1.0, 2.0]));
        let kf = fx.add(DataArrayData::Vec2f(vec![[0.0, 0.0], [10.0, 20.0], [20.0, 40.0]]));
        let tree = run(&fx, vec![channel("pos", ts, kf, Interpolation::Linear)], 0.25);
        assert_eq!(output(&tree, "pos"), PropertyValue::Vec2f([5.0, 10.0]));
        assert_eq!(output(&tree, "duration"), PropertyValue::Float(2.0));
    }

    #[test]
    fn step_holds_lower_keyframe_and_clamps_past_end() {
        let mut fx = Fixture::new();
        let ts = fx.add(DataArrayData::Float(vec![0.0, 1.0]));
        let kf = fx.add(DataArrayData::Int32(vec![3, 9]));
        let mid = run(&fx, vec![channel("v", ts, kf, Interpolation::Step)], 0.9);
        assert_eq!(output(&mid, "v"), PropertyValue::Int32(3));
        let end = run(&fx, vec![channel("v", ts, kf, Interpolation::Step)], 2.0);
        assert_eq!(output(&end, "v"), PropertyValue::Int32(9));
    }

    #[test]
    fn integer_channels_round() {
        let mut fx = Fixture::new();
        let ts = fx.add(DataArrayData::Float(vec![0.0, 1.0]));
        let kf = fx.add(DataArrayData::Int32(vec![0, 3]));
        let tree = run(&fx, vec![channel("v", ts, kf, Interpolation::Linear)], 0.5);
        assert_eq!(output(&tree, "v"), PropertyValue::Int32(2));
    }

    #[test]
    fn cubic_hits_keyframes_at_ends() {
        let mut fx = Fixture::new();
        let ts = fx.add(DataArrayData::Float(vec![0.0, 2.0]));
        let kf = fx.add(DataArrayData::Float(vec![1.0, 5.0]));
        let tin = fx.add(DataArrayData::Float(vec![1.0, 1.0]));
        let tout = fx.add(DataArrayData::Float(vec![1.0, 1.0]));
        let mut ch = channel("v", ts, kf, Interpolation::Cubic);
        ch.tangents_in = Some(tin);
        ch.tangents_out = Some(tout);
        let start = run(&fx, vec![ch.clone()], 0.0);
        assert_eq!(output(&start, "v"), PropertyValue::Float(1.0));
        let end = run(&fx, vec![ch], 1.0);
        assert_eq!(output(&end, "v"), PropertyValue::Float(5.0));
    }

    #[test]
    fn quaternions_are_normalized() {
        let mut fx = Fixture::new();
        let ts = fx.add(DataArrayData::Float(vec![0.0, 1.0]));
        let kf = fx.add(DataArrayData::Vec4f(vec![[1.0, 0.0, 0.0, 0.0], [0.0, 1.0, 0.0, 0.0]]));
        let tree = run(&fx, vec![channel("q", ts, kf, Interpolation::LinearQuaternions)], 0.5);
        let PropertyValue::Vec4f(q) = output(&tree, "q") else {
            panic!("expected vec4f")
        };
        let len: f32 = q.iter().map(|c| c * c).sum::<f32>().sqrt();
        assert!((len - 1.0).abs() < 1e-5);
    }

    #[test]
    fn float_array_channels_write_array_outputs() {
        let mut fx = Fixture::new();
        let ts = fx.add(DataArrayData::Float(vec![0.0, 1.0]));
        let kf = fx.add(DataArrayData::FloatArray(vec![vec![0.0, 2.0, 4.0], vec![2.0, 4.0, 6.0]]));
        let tree = run(&fx, vec![channel("w", ts, kf, Interpolation::Linear)], 0.5);
        assert_eq!(output(&tree, "w.2"), PropertyValue::Float(5.0));
    }

    #[test]
    fn validation_rejects_bad_channels() {
        let mut fx = Fixture::new();
        let ts = fx.add(DataArrayData::Float(vec![0.0, 1.0]));
        let unsorted = fx.add(DataArrayData::Float(vec![1.0, 0.0]));
        let kf3 = fx.add(DataArrayData::Float(vec![0.0, 1.0, 2.0]));
        let kf = fx.add(DataArrayData::Float(vec![0.0, 1.0]));

        assert!(validate_channels("a", &[], &fx.arrays).is_err());
        assert!(validate_channels("a", &[channel("c", ts, kf3, Interpolation::Linear)], &fx.arrays).is_err());
        assert!(validate_channels("a", &[channel("c", unsorted, kf, Interpolation::Linear)], &fx.arrays).is_err());
        assert!(validate_channels("a", &[channel("c", ts, kf, Interpolation::Cubic)], &fx.arrays).is_err());
        assert!(validate_channels("a", &[channel("c", ts, kf, Interpolation::LinearQuaternions)], &fx.arrays).is_err());
        let dup = vec![
            channel("c", ts, kf, Interpolation::Linear),
            channel("c", ts, kf, Interpolation::Step),
        ];
        assert_eq!(
            validate_channels("a", &dup, &fx.arrays).unwrap_err(),
            "Channel name 'c' is used more than once"
        );
    }
}
