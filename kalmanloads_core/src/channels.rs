// kalmanloads_core/src/channels.rs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{EstimatorError, Result};

pub mod layout;

/// Every physical quantity that can occupy a slot of a state, input or
/// measurement vector.
///
/// The serialized form is the short label used in channel maps, sigma
/// overrides and export headers (e.g. `ut1`, `Qaero`, `TTacc`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Channel {
    /// Tower-top fore-aft displacement [m].
    #[serde(rename = "ut1")]
    TowerTopDisplacement,
    /// Rotor azimuth [rad], kept in [0, 2π).
    #[serde(rename = "psi")]
    Azimuth,
    /// Tower-top fore-aft velocity [m/s].
    #[serde(rename = "ut1dot")]
    TowerTopVelocity,
    /// Rotor speed [rad/s].
    #[serde(rename = "omega")]
    RotorSpeed,
    /// Rotor thrust [N].
    #[serde(rename = "Thrust")]
    Thrust,
    /// Aerodynamic torque on the low-speed shaft [Nm].
    #[serde(rename = "Qaero")]
    AeroTorque,
    /// Generator torque, expressed on the rotor side [Nm].
    #[serde(rename = "Qgen")]
    GeneratorTorque,
    /// Rotor-effective wind speed [m/s].
    #[serde(rename = "WS")]
    WindSpeed,
    /// Blade pitch [deg].
    #[serde(rename = "pitch")]
    Pitch,
    /// Tower-top fore-aft acceleration [m/s^2].
    #[serde(rename = "TTacc")]
    TowerTopAcceleration,
}

impl Channel {
    pub const COUNT: usize = 10;

    pub const ALL: [Channel; Channel::COUNT] = [
        Channel::TowerTopDisplacement,
        Channel::Azimuth,
        Channel::TowerTopVelocity,
        Channel::RotorSpeed,
        Channel::Thrust,
        Channel::AeroTorque,
        Channel::GeneratorTorque,
        Channel::WindSpeed,
        Channel::Pitch,
        Channel::TowerTopAcceleration,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Channel::TowerTopDisplacement => "ut1",
            Channel::Azimuth => "psi",
            Channel::TowerTopVelocity => "ut1dot",
            Channel::RotorSpeed => "omega",
            Channel::Thrust => "Thrust",
            Channel::AeroTorque => "Qaero",
            Channel::GeneratorTorque => "Qgen",
            Channel::WindSpeed => "WS",
            Channel::Pitch => "pitch",
            Channel::TowerTopAcceleration => "TTacc",
        }
    }

    fn ordinal(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Channel {
    type Err = EstimatorError;

    fn from_str(s: &str) -> Result<Self> {
        Channel::ALL
            .iter()
            .copied()
            .find(|c| c.label() == s)
            .ok_or_else(|| EstimatorError::UnknownChannel {
                label: s.to_string(),
            })
    }
}

/// An ordered list of channels with a precomputed channel → slot table.
///
/// The order is fixed at construction. Lookups are array indexing on the
/// channel ordinal, so they are safe to use inside the time loop.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelLayout {
    channels: Vec<Channel>,
    slots: [Option<usize>; Channel::COUNT],
}

impl ChannelLayout {
    pub fn new(channels: Vec<Channel>) -> Result<Self> {
        let mut slots = [None; Channel::COUNT];
        for (i, ch) in channels.iter().enumerate() {
            let slot = &mut slots[ch.ordinal()];
            if slot.is_some() {
                return Err(EstimatorError::DuplicateChannel { channel: *ch });
            }
            *slot = Some(i);
        }
        Ok(Self { channels, slots })
    }

    /// Returns the dimension of the vector described by this layout.
    pub fn dim(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Finds the slot of a channel in the layout.
    pub fn find_idx(&self, channel: Channel) -> Option<usize> {
        self.slots[channel.ordinal()]
    }

    /// Like [`ChannelLayout::find_idx`], but a missing channel is an error.
    pub fn require(&self, channel: Channel) -> Result<usize> {
        self.find_idx(channel)
            .ok_or_else(|| EstimatorError::MissingChannel {
                name: channel.label().to_string(),
            })
    }

    pub fn contains(&self, channel: Channel) -> bool {
        self.find_idx(channel).is_some()
    }

    pub fn labels(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.channels.iter().map(|c| c.label())
    }

    /// Concatenates two layouts, e.g. mechanical states followed by augmented states.
    pub fn concat(&self, other: &ChannelLayout) -> Result<Self> {
        let mut channels = self.channels.clone();
        channels.extend_from_slice(&other.channels);
        Self::new(channels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_follow_construction_order() {
        let layout = ChannelLayout::new(vec![
            Channel::TowerTopAcceleration,
            Channel::RotorSpeed,
            Channel::Pitch,
        ])
        .unwrap();

        assert_eq!(layout.dim(), 3);
        assert_eq!(layout.find_idx(Channel::TowerTopAcceleration), Some(0));
        assert_eq!(layout.find_idx(Channel::Pitch), Some(2));
        assert_eq!(layout.find_idx(Channel::Thrust), None);
        assert!(matches!(
            layout.require(Channel::Thrust),
            Err(EstimatorError::MissingChannel { .. })
        ));
    }

    #[test]
    fn duplicate_channels_are_rejected() {
        let err = ChannelLayout::new(vec![Channel::AeroTorque, Channel::AeroTorque]).unwrap_err();
        assert_eq!(
            err,
            EstimatorError::DuplicateChannel {
                channel: Channel::AeroTorque
            }
        );
    }

    #[test]
    fn labels_round_trip_through_from_str() {
        for ch in Channel::ALL {
            assert_eq!(ch.label().parse::<Channel>().unwrap(), ch);
        }
        assert!("Azimuth".parse::<Channel>().is_err());
    }
}
