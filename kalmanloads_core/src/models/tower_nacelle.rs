// kalmanloads_core/src/models/tower_nacelle.rs

use crate::channels::layout::{FilterLayout, StateTopology};
use crate::channels::Channel;
use crate::error::{EstimatorError, Result};
use crate::models::system::ConnectionMatrices;

/// Connection matrices of the tower/nacelle model with generalized
/// coordinates `q = [ut1, psi]`.
///
/// * Tower-top acceleration is `ut1''`.
/// * The rotor-speed measurement is `psi'`.
/// * The generator-torque measurement is the augmented `Qgen` state.
/// * Thrust forces `ut1`; `Qaero - Qgen` drives `psi`.
/// * The pitch measurement is the pitch input.
///
/// All remaining couplings are zero, so the augmented states are random walks.
pub fn tower_nacelle_connections(
    layout: &FilterLayout,
    n_tower_shapes: usize,
) -> Result<ConnectionMatrices> {
    if n_tower_shapes != 1 {
        return Err(EstimatorError::UnsupportedConfiguration {
            what: format!("{n_tower_shapes} tower shapes (only 1 is implemented)"),
        });
    }
    if layout.topology == StateTopology::ThrustAsInput {
        return Err(EstimatorError::UnsupportedConfiguration {
            what: "thrust as an input (thrust_in_states = false)".into(),
        });
    }

    let n_dof = layout.n_dof();
    let (ny, np, nu) = (
        layout.n_measurements(),
        layout.augmented.dim(),
        layout.n_inputs(),
    );
    let mut conn = ConnectionMatrices::zeros(n_dof, ny, np, nu);

    // Degrees of freedom share their slot with the matching position state.
    let dof_ut1 = layout.mechanical.require(Channel::TowerTopDisplacement)?;
    let dof_psi = layout.mechanical.require(Channel::Azimuth)?;

    let y_acc = layout.measurements.require(Channel::TowerTopAcceleration)?;
    let y_omega = layout.measurements.require(Channel::RotorSpeed)?;
    let y_qgen = layout.measurements.require(Channel::GeneratorTorque)?;
    let y_pitch = layout.measurements.require(Channel::Pitch)?;

    let p_thrust = layout.augmented.require(Channel::Thrust)?;
    let p_qaero = layout.augmented.require(Channel::AeroTorque)?;
    let p_qgen = layout.augmented.require(Channel::GeneratorTorque)?;

    let u_pitch = layout.inputs.require(Channel::Pitch)?;

    conn.ya[(y_acc, dof_ut1)] = 1.0;
    conn.yv[(y_omega, dof_psi)] = 1.0;
    conn.yp[(y_qgen, p_qgen)] = 1.0;
    conn.yu[(y_pitch, u_pitch)] = 1.0;

    conn.fp[(dof_ut1, p_thrust)] = 1.0;
    conn.fp[(dof_psi, p_qaero)] = 1.0;
    conn.fp[(dof_psi, p_qgen)] = -1.0;

    Ok(conn)
}
