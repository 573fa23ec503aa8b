// kalmanloads_core/src/channels/layout.rs
use crate::channels::{Channel, ChannelLayout};
use crate::error::Result;

/// Selects where rotor thrust lives in the estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateTopology {
    /// Thrust is an augmented (estimated) state; pitch is the only input.
    ThrustInStates,
    /// Thrust is an exogenous input alongside pitch.
    ThrustAsInput,
}

impl StateTopology {
    pub fn from_flag(thrust_in_states: bool) -> Self {
        if thrust_in_states {
            Self::ThrustInStates
        } else {
            Self::ThrustAsInput
        }
    }
}

/// The complete vector schema of one estimator: states (mechanical first,
/// augmented after), inputs and measurements.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterLayout {
    pub topology: StateTopology,
    /// Mechanical first-order states `[q, qdot]`.
    pub mechanical: ChannelLayout,
    /// Augmented disturbance states appended after the mechanical ones.
    pub augmented: ChannelLayout,
    /// Full state vector, `mechanical ++ augmented`.
    pub states: ChannelLayout,
    pub inputs: ChannelLayout,
    pub measurements: ChannelLayout,
}

impl FilterLayout {
    pub fn n_states(&self) -> usize {
        self.states.dim()
    }

    pub fn n_inputs(&self) -> usize {
        self.inputs.dim()
    }

    pub fn n_measurements(&self) -> usize {
        self.measurements.dim()
    }

    /// Number of second-order degrees of freedom behind the mechanical states.
    pub fn n_dof(&self) -> usize {
        self.mechanical.dim() / 2
    }
}

/// Returns the layout of the tower/nacelle estimator with a single tower
/// shape: `q = [ut1, psi]`.
///
/// The layout is always well formed; whether a linear system can be built
/// for the topology is decided by the connection matrices.
pub fn tower_nacelle_layout(topology: StateTopology) -> Result<FilterLayout> {
    let mechanical = ChannelLayout::new(vec![
        Channel::TowerTopDisplacement,
        Channel::Azimuth,
        Channel::TowerTopVelocity,
        Channel::RotorSpeed,
    ])?;

    let (augmented, inputs) = match topology {
        StateTopology::ThrustInStates => (
            vec![
                Channel::Thrust,
                Channel::AeroTorque,
                Channel::GeneratorTorque,
                Channel::WindSpeed,
            ],
            vec![Channel::Pitch],
        ),
        StateTopology::ThrustAsInput => (
            vec![
                Channel::AeroTorque,
                Channel::GeneratorTorque,
                Channel::WindSpeed,
            ],
            vec![Channel::Thrust, Channel::Pitch],
        ),
    };
    let augmented = ChannelLayout::new(augmented)?;

    let measurements = ChannelLayout::new(vec![
        Channel::TowerTopAcceleration,
        Channel::RotorSpeed,
        Channel::GeneratorTorque,
        Channel::Pitch,
    ])?;

    Ok(FilterLayout {
        topology,
        states: mechanical.concat(&augmented)?,
        mechanical,
        augmented,
        inputs: ChannelLayout::new(inputs)?,
        measurements,
    })
}
