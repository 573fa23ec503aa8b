// kalmanloads_core/src/models/system.rs

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::{EstimatorError, Result};
use crate::types::{Input, Output, State};

/// Sparse "wiring" between a second-order mechanical model, its augmented
/// disturbance states `p`, inputs `u` and outputs `y`.
///
/// ```text
/// M q'' + C q' + K q = Fp p + Fu u
/// p'                 = Pp p + Pq q + Pv q'
/// y                  = Ya q'' + Yv q' + Yq q + Yp p + Yu u
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionMatrices {
    /// Acceleration to output (nY x n).
    pub ya: DMatrix<f64>,
    /// Velocity to output (nY x n).
    pub yv: DMatrix<f64>,
    /// Position to output (nY x n).
    pub yq: DMatrix<f64>,
    /// Augmented state to output, direct feed-through (nY x nP).
    pub yp: DMatrix<f64>,
    /// Input to output, direct feed-through (nY x nU).
    pub yu: DMatrix<f64>,
    /// Augmented state forcing on the mechanical DOFs (n x nP).
    pub fp: DMatrix<f64>,
    /// Input forcing on the mechanical DOFs (n x nU).
    pub fu: DMatrix<f64>,
    /// Augmented state dynamics (nP x nP).
    pub pp: DMatrix<f64>,
    /// Position to augmented state coupling (nP x n).
    pub pq: DMatrix<f64>,
    /// Velocity to augmented state coupling (nP x n).
    pub pv: DMatrix<f64>,
}

impl ConnectionMatrices {
    /// All-zero connections: no outputs are observed and the augmented states
    /// are pure random walks.
    pub fn zeros(n_dof: usize, n_y: usize, n_p: usize, n_u: usize) -> Self {
        Self {
            ya: DMatrix::zeros(n_y, n_dof),
            yv: DMatrix::zeros(n_y, n_dof),
            yq: DMatrix::zeros(n_y, n_dof),
            yp: DMatrix::zeros(n_y, n_p),
            yu: DMatrix::zeros(n_y, n_u),
            fp: DMatrix::zeros(n_dof, n_p),
            fu: DMatrix::zeros(n_dof, n_u),
            pp: DMatrix::zeros(n_p, n_p),
            pq: DMatrix::zeros(n_p, n_dof),
            pv: DMatrix::zeros(n_p, n_dof),
        }
    }

    pub fn n_dof(&self) -> usize {
        self.ya.ncols()
    }

    pub fn n_outputs(&self) -> usize {
        self.ya.nrows()
    }

    pub fn n_augmented(&self) -> usize {
        self.fp.ncols()
    }

    pub fn n_inputs(&self) -> usize {
        self.yu.ncols()
    }

    fn check_shapes(&self) -> Result<()> {
        let (n, ny, np, nu) = (
            self.n_dof(),
            self.n_outputs(),
            self.n_augmented(),
            self.n_inputs(),
        );
        let expected = [
            ("Yv", &self.yv, ny, n),
            ("Yq", &self.yq, ny, n),
            ("Yp", &self.yp, ny, np),
            ("Yu", &self.yu, ny, nu),
            ("Fp", &self.fp, n, np),
            ("Fu", &self.fu, n, nu),
            ("Pp", &self.pp, np, np),
            ("Pq", &self.pq, np, n),
            ("Pv", &self.pv, np, n),
        ];
        for (name, m, rows, cols) in expected {
            check_shape(name, m, rows, cols)?;
        }
        Ok(())
    }
}

fn check_shape(what: &'static str, m: &DMatrix<f64>, rows: usize, cols: usize) -> Result<()> {
    if m.shape() != (rows, cols) {
        return Err(EstimatorError::DimensionMismatch {
            what,
            expected: format!("{rows}x{cols}"),
            found: format!("{}x{}", m.nrows(), m.ncols()),
        });
    }
    Ok(())
}

/// How the first-order system is assembled from the mechanical model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMethod {
    /// Mechanical states `[q, q']` only; augmented connections are ignored.
    Standard,
    /// Mechanical states followed by the augmented disturbance states.
    AugmentedFirstOrder,
}

/// Discretisation scheme for a continuous-time system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Discretization {
    /// Exact zero-order hold through the matrix exponential.
    #[default]
    Exponential,
    /// `I + A dt`, `B dt`.
    ForwardEuler,
}

/// A linear state-space system `x' = Xx x + Xu u`, `y = Yx x + Yu u`
/// (or the discrete-time analogue).
#[derive(Debug, Clone, PartialEq)]
pub struct LinearSystem {
    pub xx: DMatrix<f64>,
    pub xu: DMatrix<f64>,
    pub yx: DMatrix<f64>,
    pub yu: DMatrix<f64>,
}

impl LinearSystem {
    pub fn new(
        xx: DMatrix<f64>,
        xu: DMatrix<f64>,
        yx: DMatrix<f64>,
        yu: DMatrix<f64>,
    ) -> Result<Self> {
        let (nx, nu, ny) = (xx.nrows(), xu.ncols(), yx.nrows());
        check_shape("Xx", &xx, nx, nx)?;
        check_shape("Xu", &xu, nx, nu)?;
        check_shape("Yx", &yx, ny, nx)?;
        check_shape("Yu", &yu, ny, nu)?;
        Ok(Self { xx, xu, yx, yu })
    }

    pub fn n_states(&self) -> usize {
        self.xx.nrows()
    }

    pub fn n_inputs(&self) -> usize {
        self.xu.ncols()
    }

    pub fn n_outputs(&self) -> usize {
        self.yx.nrows()
    }

    /// `y = Yx x + Yu u`
    pub fn output(&self, x: &State, u: &Input) -> Output {
        &self.yx * x + &self.yu * u
    }

    /// Converts the continuous system to discrete time with sample interval `dt`.
    ///
    /// The exponential scheme takes the exponential of the block matrix
    /// `[[Xx, Xu], [0, 0]]·dt`, whose top row holds `exp(Xx dt)` and
    /// `∫exp(Xx s) ds · Xu`. This stays valid when `Xx` is singular, as it is
    /// for any system with random-walk states.
    pub fn discretize(&self, dt: f64, method: Discretization) -> Result<DiscreteSystem> {
        if !(dt > 0.0 && dt.is_finite()) {
            return Err(EstimatorError::InvalidParameter {
                name: "dt",
                value: dt,
                reason: "sample interval must be positive",
            });
        }
        let (nx, nu) = (self.n_states(), self.n_inputs());
        let (xx, xu) = match method {
            Discretization::Exponential => {
                let mut block = DMatrix::zeros(nx + nu, nx + nu);
                block.view_mut((0, 0), (nx, nx)).copy_from(&(&self.xx * dt));
                block.view_mut((0, nx), (nx, nu)).copy_from(&(&self.xu * dt));
                let phi = block.exp();
                if phi.iter().any(|v| !v.is_finite()) {
                    return Err(EstimatorError::NonFinite {
                        what: "discrete transition matrix",
                    });
                }
                (
                    phi.view((0, 0), (nx, nx)).into_owned(),
                    phi.view((0, nx), (nx, nu)).into_owned(),
                )
            }
            Discretization::ForwardEuler => (
                DMatrix::identity(nx, nx) + &self.xx * dt,
                &self.xu * dt,
            ),
        };
        Ok(DiscreteSystem {
            system: LinearSystem {
                xx,
                xu,
                yx: self.yx.clone(),
                yu: self.yu.clone(),
            },
            dt,
        })
    }
}

/// A discrete-time system together with the sample interval it was built for.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscreteSystem {
    pub system: LinearSystem,
    pub dt: f64,
}

impl std::ops::Deref for DiscreteSystem {
    type Target = LinearSystem;

    fn deref(&self) -> &LinearSystem {
        &self.system
    }
}

/// Assembles a continuous first-order system from `M, C, K` and the
/// connection matrices.
///
/// For [`BuildMethod::AugmentedFirstOrder`]:
/// ```text
/// Xx = [ 0        I        0      ]    Yx = [ Yq - Ya M⁻¹K,  Yv - Ya M⁻¹C,  Yp + Ya M⁻¹Fp ]
///      [ -M⁻¹K    -M⁻¹C    M⁻¹Fp  ]
///      [ Pq       Pv       Pp     ]    Xu = [ 0; M⁻¹Fu; 0 ],   Yu = Yu + Ya M⁻¹Fu
/// ```
pub fn build_linear_system(
    m: &DMatrix<f64>,
    c: &DMatrix<f64>,
    k: &DMatrix<f64>,
    conn: &ConnectionMatrices,
    method: BuildMethod,
) -> Result<LinearSystem> {
    let n = m.nrows();
    check_shape("mass matrix", m, n, n)?;
    check_shape("damping matrix", c, n, n)?;
    check_shape("stiffness matrix", k, n, n)?;
    if conn.n_dof() != n {
        return Err(EstimatorError::DimensionMismatch {
            what: "connection matrices",
            expected: format!("{n} degrees of freedom"),
            found: format!("{}", conn.n_dof()),
        });
    }
    conn.check_shapes()?;

    let lu = m.clone().lu();
    let solve = |rhs: &DMatrix<f64>| -> Result<DMatrix<f64>> {
        lu.solve(rhs).ok_or(EstimatorError::SingularMatrix {
            what: "mass matrix",
        })
    };
    let m_k = -solve(k)?;
    let m_c = -solve(c)?;
    let m_fu = solve(&conn.fu)?;

    let np = match method {
        BuildMethod::Standard => 0,
        BuildMethod::AugmentedFirstOrder => conn.n_augmented(),
    };
    let (nu, ny) = (conn.n_inputs(), conn.n_outputs());
    let nx = 2 * n + np;

    let mut xx = DMatrix::zeros(nx, nx);
    xx.view_mut((0, n), (n, n)).fill_with_identity();
    xx.view_mut((n, 0), (n, n)).copy_from(&m_k);
    xx.view_mut((n, n), (n, n)).copy_from(&m_c);

    let mut xu = DMatrix::zeros(nx, nu);
    xu.view_mut((n, 0), (n, nu)).copy_from(&m_fu);

    let mut yx = DMatrix::zeros(ny, nx);
    yx.view_mut((0, 0), (ny, n))
        .copy_from(&(&conn.yq + &conn.ya * &m_k));
    yx.view_mut((0, n), (ny, n))
        .copy_from(&(&conn.yv + &conn.ya * &m_c));
    let yu = &conn.yu + &conn.ya * &m_fu;

    if np > 0 {
        let m_fp = solve(&conn.fp)?;
        xx.view_mut((n, 2 * n), (n, np)).copy_from(&m_fp);
        xx.view_mut((2 * n, 0), (np, n)).copy_from(&conn.pq);
        xx.view_mut((2 * n, n), (np, n)).copy_from(&conn.pv);
        xx.view_mut((2 * n, 2 * n), (np, np)).copy_from(&conn.pp);
        yx.view_mut((0, 2 * n), (ny, np))
            .copy_from(&(&conn.yp + &conn.ya * &m_fp));
    }

    LinearSystem::new(xx, xu, yx, yu)
}
