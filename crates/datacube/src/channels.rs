//! Velocity to channel lookup on an ascending or descending velocity axis.

use core::ops::Range;

use ndarray::ArrayView1;

use crate::units::{VelocityUnit, VelocityValue};

/// Channels resolved for a list of query velocities.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedChannels {
    pub channels: Vec<usize>,
    /// Axis velocity at each resolved channel, clamped into the axis.
    pub velocities: Vec<f64>,
}

/// Left-insertion lookup of velocities on a monotonic channel axis.
#[derive(Debug, Clone, Copy)]
pub struct ChannelResolver<'a> {
    axis: ArrayView1<'a, f64>,
    unit: VelocityUnit,
}

impl<'a> ChannelResolver<'a> {
    /// `axis` holds one velocity per channel expressed in `unit`.
    pub fn new(axis: ArrayView1<'a, f64>, unit: VelocityUnit) -> Self {
        ChannelResolver { axis, unit }
    }

    fn is_descending(&self) -> bool {
        let n = self.axis.len();
        n > 1 && self.axis[0] > self.axis[n - 1]
    }

    /// Leftmost insertion point of `velocity`. On a descending axis the
    /// search runs on the reversed axis and maps back as `N-1-r`.
    pub fn channel(&self, velocity: impl Into<VelocityValue>) -> usize {
        let v = velocity.into().in_unit(self.unit);
        let n = self.axis.len();
        if self.is_descending() {
            // values below `v` form a suffix of a descending axis
            let r = n - self.partition_point(|x| x >= v);
            (n.saturating_sub(1)).saturating_sub(r)
        } else {
            self.partition_point(|x| x < v)
        }
    }

    fn partition_point(&self, pred: impl Fn(f64) -> bool) -> usize {
        match self.axis.as_slice() {
            Some(axis) => axis.partition_point(|&x| pred(x)),
            None => self.axis.to_vec().partition_point(|&x| pred(x)),
        }
    }

    /// Resolve each velocity to a channel and report the axis velocity there.
    pub fn channels_for_velocities<V>(&self, velocities: &[V]) -> ResolvedChannels
    where
        V: Into<VelocityValue> + Copy,
    {
        let channels: Vec<usize> = velocities.iter().map(|&v| self.channel(v)).collect();
        let velocities = channels.iter().map(|&c| self.velocity_at(c)).collect();
        ResolvedChannels {
            channels,
            velocities,
        }
    }

    /// Axis velocity at `channel`, clamped to the last channel.
    pub fn velocity_at(&self, channel: usize) -> f64 {
        match self.axis.len() {
            0 => f64::NAN,
            n => self.axis[channel.min(n - 1)],
        }
    }

    /// Half-open channel range covering the velocity interval `[a, b]` in
    /// either order; the upper channel is inclusive.
    pub fn range(&self, a: impl Into<VelocityValue>, b: impl Into<VelocityValue>) -> Range<usize> {
        let (mut lo, mut hi) = (self.channel(a), self.channel(b));
        if lo > hi {
            core::mem::swap(&mut lo, &mut hi);
        }
        let n = self.axis.len();
        lo.min(n)..(hi + 1).min(n)
    }
}
