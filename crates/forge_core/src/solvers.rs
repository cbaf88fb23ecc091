use crate::config::SolverSettings;
use crate::traits::{OdeSystem, Steppable};
use nalgebra::{DMatrix, DVector, Dyn, LU};
use thiserror::Error;

/// Why a single integration attempt stopped short of the end time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntegrationFailure {
    #[error("step budget of {max_steps} exhausted at t = {t:e}")]
    StepBudgetExhausted { max_steps: usize, t: f64 },
    #[error("step size {h:e} fell below the minimum at t = {t:e}")]
    StepSizeUnderflow { t: f64, h: f64 },
    #[error("non-finite state or derivative at t = {t:e}")]
    NonFinite { t: f64 },
    #[error("singular iteration matrix at t = {t:e}")]
    SingularMatrix { t: f64 },
}

/// Samples produced by one successful attempt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trajectory {
    pub t: Vec<f64>,
    pub y: Vec<Vec<f64>>,
}

impl Trajectory {
    fn start(t0: f64, y0: &[f64]) -> Self {
        Self {
            t: vec![t0],
            y: vec![y0.to_vec()],
        }
    }

    fn push(&mut self, t: f64, y: &[f64]) {
        self.t.push(t);
        self.y.push(y.to_vec());
    }
}

fn all_finite(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_finite())
}

/// Classic Runge-Kutta 4th Order Solver
pub struct RK4 {
    k1: Vec<f64>,
    k2: Vec<f64>,
    k3: Vec<f64>,
    k4: Vec<f64>,
    tmp: Vec<f64>,
}

impl RK4 {
    pub fn new(dim: usize) -> Self {
        Self {
            k1: vec![0.0; dim],
            k2: vec![0.0; dim],
            k3: vec![0.0; dim],
            k4: vec![0.0; dim],
            tmp: vec![0.0; dim],
        }
    }
}

impl Steppable for RK4 {
    fn step(&mut self, system: &impl OdeSystem, t: &mut f64, state: &mut [f64], dt: f64) {
        let t0 = *t;

        // k1 = f(t, y)
        system.derivative(t0, state, &mut self.k1);

        // k2 = f(t + dt/2, y + dt*k1/2)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k1[i] * 0.5;
        }
        system.derivative(t0 + dt * 0.5, &self.tmp, &mut self.k2);

        // k3 = f(t + dt/2, y + dt*k2/2)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k2[i] * 0.5;
        }
        system.derivative(t0 + dt * 0.5, &self.tmp, &mut self.k3);

        // k4 = f(t + dt, y + dt*k3)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k3[i];
        }
        system.derivative(t0 + dt, &self.tmp, &mut self.k4);

        // y_next = y + dt/6 * (k1 + 2k2 + 2k3 + k4)
        for i in 0..state.len() {
            state[i] += dt / 6.0 * (self.k1[i] + 2.0 * self.k2[i] + 2.0 * self.k3[i] + self.k4[i]);
        }

        *t = t0 + dt;
    }
}

/// Drives a fixed-step stepper over `[t0, t1]` in `steps` equal steps.
pub fn integrate_fixed(
    stepper: &mut impl Steppable,
    system: &impl OdeSystem,
    t0: f64,
    t1: f64,
    y0: &[f64],
    steps: usize,
) -> Result<Trajectory, IntegrationFailure> {
    let dt = (t1 - t0) / steps as f64;
    let mut trajectory = Trajectory::start(t0, y0);
    let mut t = t0;
    let mut state = y0.to_vec();

    for i in 0..steps {
        stepper.step(system, &mut t, &mut state, dt);
        if !all_finite(&state) {
            return Err(IntegrationFailure::NonFinite { t });
        }
        // Land exactly on the end point instead of accumulating dt.
        if i + 1 == steps {
            t = t1;
        }
        trajectory.push(t, &state);
    }

    Ok(trajectory)
}

// Dormand-Prince 5(4) tableau.
const A21: f64 = 1.0 / 5.0;
const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;
const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;
const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;
const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;

// 5th-order weights, used to advance.
const B1: f64 = 35.0 / 384.0;
const B3: f64 = 500.0 / 1113.0;
const B4: f64 = 125.0 / 192.0;
const B5: f64 = -2187.0 / 6784.0;
const B6: f64 = 11.0 / 84.0;

// 5th minus embedded 4th order.
const E1: f64 = B1 - 5179.0 / 57600.0;
const E3: f64 = B3 - 7571.0 / 16695.0;
const E4: f64 = B4 - 393.0 / 640.0;
const E5: f64 = B5 - -92097.0 / 339200.0;
const E6: f64 = B6 - 187.0 / 2100.0;
const E7: f64 = -1.0 / 40.0;

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 5.0;

fn step_factor(err_norm: f64, exponent: f64) -> f64 {
    if err_norm == 0.0 {
        MAX_FACTOR
    } else if !err_norm.is_finite() {
        MIN_FACTOR
    } else {
        (SAFETY * err_norm.powf(-exponent)).clamp(MIN_FACTOR, MAX_FACTOR)
    }
}

fn scaled_rms(error: impl Iterator<Item = f64>, y: &[f64], y_new: &[f64], settings: &SolverSettings) -> f64 {
    let mut sum = 0.0;
    for (i, ei) in error.enumerate() {
        let sc = settings.atol + settings.rtol * y[i].abs().max(y_new[i].abs());
        sum += (ei / sc) * (ei / sc);
    }
    (sum / y.len().max(1) as f64).sqrt()
}

/// Dormand-Prince 4(5) with local extrapolation and error-based step control.
pub fn rk45(
    system: &impl OdeSystem,
    t0: f64,
    t1: f64,
    y0: &[f64],
    settings: &SolverSettings,
) -> Result<Trajectory, IntegrationFailure> {
    let n = y0.len();
    let mut trajectory = Trajectory::start(t0, y0);
    let mut t = t0;
    let mut y = y0.to_vec();
    let mut h = settings.first_step(t1 - t0);

    let mut k1 = vec![0.0; n];
    let mut k2 = vec![0.0; n];
    let mut k3 = vec![0.0; n];
    let mut k4 = vec![0.0; n];
    let mut k5 = vec![0.0; n];
    let mut k6 = vec![0.0; n];
    let mut k7 = vec![0.0; n];
    let mut y_tmp = vec![0.0; n];
    let mut y_new = vec![0.0; n];

    system.derivative(t, &y, &mut k1);
    if !all_finite(&k1) {
        return Err(IntegrationFailure::NonFinite { t });
    }

    let mut steps = 0usize;
    while t < t1 {
        if steps == settings.max_steps {
            return Err(IntegrationFailure::StepBudgetExhausted {
                max_steps: settings.max_steps,
                t,
            });
        }
        steps += 1;

        let last = t + h >= t1;
        if last {
            h = t1 - t;
        }

        for i in 0..n {
            y_tmp[i] = y[i] + h * A21 * k1[i];
        }
        system.derivative(t + h / 5.0, &y_tmp, &mut k2);

        for i in 0..n {
            y_tmp[i] = y[i] + h * (A31 * k1[i] + A32 * k2[i]);
        }
        system.derivative(t + 3.0 * h / 10.0, &y_tmp, &mut k3);

        for i in 0..n {
            y_tmp[i] = y[i] + h * (A41 * k1[i] + A42 * k2[i] + A43 * k3[i]);
        }
        system.derivative(t + 4.0 * h / 5.0, &y_tmp, &mut k4);

        for i in 0..n {
            y_tmp[i] = y[i] + h * (A51 * k1[i] + A52 * k2[i] + A53 * k3[i] + A54 * k4[i]);
        }
        system.derivative(t + 8.0 * h / 9.0, &y_tmp, &mut k5);

        for i in 0..n {
            y_tmp[i] =
                y[i] + h * (A61 * k1[i] + A62 * k2[i] + A63 * k3[i] + A64 * k4[i] + A65 * k5[i]);
        }
        system.derivative(t + h, &y_tmp, &mut k6);

        for i in 0..n {
            y_new[i] = y[i] + h * (B1 * k1[i] + B3 * k3[i] + B4 * k4[i] + B5 * k5[i] + B6 * k6[i]);
        }

        // FSAL
        system.derivative(t + h, &y_new, &mut k7);

        let err_norm = scaled_rms(
            (0..n).map(|i| {
                h * (E1 * k1[i] + E3 * k3[i] + E4 * k4[i] + E5 * k5[i] + E6 * k6[i] + E7 * k7[i])
            }),
            &y,
            &y_new,
            settings,
        );

        let accepted = err_norm <= 1.0 && all_finite(&y_new) && all_finite(&k7);
        if accepted {
            t = if last { t1 } else { t + h };
            y.copy_from_slice(&y_new);
            k1.copy_from_slice(&k7);
            trajectory.push(t, &y);
            if last {
                break;
            }
        }

        let next = h * step_factor(err_norm, 0.2);
        if !accepted && next < settings.h_min {
            return Err(IntegrationFailure::StepSizeUnderflow { t, h: next });
        }
        h = next.max(settings.h_min);
    }

    Ok(trajectory)
}

/// Central-difference Jacobian `df/dy` at `(t, y)`.
fn finite_difference_jacobian(system: &impl OdeSystem, t: f64, y: &[f64]) -> DMatrix<f64> {
    let n = y.len();
    let mut jac = DMatrix::zeros(n, n);
    let mut yp = y.to_vec();
    let mut fp = vec![0.0; n];
    let mut fm = vec![0.0; n];
    for j in 0..n {
        let orig = yp[j];
        let dy = 1e-8 * (1.0 + orig.abs());
        yp[j] = orig + dy;
        system.derivative(t, &yp, &mut fp);
        yp[j] = orig - dy;
        system.derivative(t, &yp, &mut fm);
        yp[j] = orig;
        for i in 0..n {
            jac[(i, j)] = (fp[i] - fm[i]) / (2.0 * dy);
        }
    }
    jac
}

const MAX_NEWTON: usize = 10;
const NEWTON_TOL: f64 = 0.01;

enum Newton {
    Converged,
    Diverged,
}

/// Solves `k = f(t_stage, base + hg * k)` for `k`, starting from the value in `k`.
#[allow(clippy::too_many_arguments)]
fn newton_stage(
    system: &impl OdeSystem,
    lu: &LU<f64, Dyn, Dyn>,
    t_stage: f64,
    base: &[f64],
    hg: f64,
    k: &mut [f64],
    scale_ref: &[f64],
    settings: &SolverSettings,
) -> Newton {
    let n = base.len();
    let mut stage_y = vec![0.0; n];
    let mut residual = vec![0.0; n];

    for _ in 0..MAX_NEWTON {
        for i in 0..n {
            stage_y[i] = base[i] + hg * k[i];
        }
        system.derivative(t_stage, &stage_y, &mut residual);
        for i in 0..n {
            residual[i] -= k[i];
        }
        let Some(delta) = lu.solve(&DVector::from_column_slice(&residual)) else {
            return Newton::Diverged;
        };
        let mut norm = 0.0;
        for i in 0..n {
            k[i] += delta[i];
            let sc = settings.atol + settings.rtol * scale_ref[i].abs();
            norm += (delta[i] / sc) * (delta[i] / sc);
        }
        norm = (norm / n.max(1) as f64).sqrt();
        if !norm.is_finite() {
            return Newton::Diverged;
        }
        if norm < NEWTON_TOL {
            return Newton::Converged;
        }
    }
    Newton::Diverged
}

/// Two-stage L-stable SDIRK (`gamma = 1 - 1/sqrt(2)`) with an embedded
/// first-order estimate, simplified Newton on `I - h*gamma*J`.
///
/// The error estimate is filtered through the iteration matrix so stiff
/// components that have already decayed do not throttle the step.
pub fn sdirk2(
    system: &impl OdeSystem,
    t0: f64,
    t1: f64,
    y0: &[f64],
    settings: &SolverSettings,
) -> Result<Trajectory, IntegrationFailure> {
    let gamma = 1.0 - std::f64::consts::FRAC_1_SQRT_2;
    let n = y0.len();
    let mut trajectory = Trajectory::start(t0, y0);
    let mut t = t0;
    let mut y = y0.to_vec();
    let mut h = settings.first_step(t1 - t0);

    let mut f0 = vec![0.0; n];
    let mut k1 = vec![0.0; n];
    let mut k2 = vec![0.0; n];
    let mut base = vec![0.0; n];
    let mut y_new = vec![0.0; n];

    system.derivative(t, &y, &mut f0);
    if !all_finite(&f0) {
        return Err(IntegrationFailure::NonFinite { t });
    }

    let mut steps = 0usize;
    while t < t1 {
        if steps == settings.max_steps {
            return Err(IntegrationFailure::StepBudgetExhausted {
                max_steps: settings.max_steps,
                t,
            });
        }
        steps += 1;

        let last = t + h >= t1;
        if last {
            h = t1 - t;
        }
        let hg = h * gamma;

        let jac = finite_difference_jacobian(system, t, &y);
        if !jac.iter().all(|v| v.is_finite()) {
            return Err(IntegrationFailure::NonFinite { t });
        }
        let lu = (DMatrix::identity(n, n) - jac * hg).lu();
        if !lu.is_invertible() {
            return Err(IntegrationFailure::SingularMatrix { t });
        }

        // Stage 1: k1 = f(t + gamma*h, y + h*gamma*k1)
        k1.copy_from_slice(&f0);
        let stage1 = newton_stage(system, &lu, t + hg, &y, hg, &mut k1, &y, settings);

        // Stage 2: k2 = f(t + h, y + h*(1-gamma)*k1 + h*gamma*k2)
        let converged = match stage1 {
            Newton::Diverged => false,
            Newton::Converged => {
                for i in 0..n {
                    base[i] = y[i] + h * (1.0 - gamma) * k1[i];
                }
                k2.copy_from_slice(&k1);
                matches!(
                    newton_stage(system, &lu, t + h, &base, hg, &mut k2, &y, settings),
                    Newton::Converged
                )
            }
        };

        if !converged {
            h *= 0.5;
            if h < settings.h_min {
                return Err(IntegrationFailure::StepSizeUnderflow { t, h });
            }
            continue;
        }

        for i in 0..n {
            y_new[i] = y[i] + h * ((1.0 - gamma) * k1[i] + gamma * k2[i]);
        }

        let raw_error: Vec<f64> = (0..n).map(|i| hg * (k2[i] - k1[i])).collect();
        let err_norm = match lu.solve(&DVector::from_vec(raw_error)) {
            Some(filtered) => scaled_rms(filtered.iter().copied(), &y, &y_new, settings),
            None => f64::NAN,
        };

        let mut accepted = err_norm <= 1.0 && all_finite(&y_new);
        if accepted {
            let t_next = if last { t1 } else { t + h };
            system.derivative(t_next, &y_new, &mut f0);
            accepted = all_finite(&f0);
            if accepted {
                t = t_next;
                y.copy_from_slice(&y_new);
                trajectory.push(t, &y);
                if last {
                    break;
                }
            } else {
                system.derivative(t, &y, &mut f0);
            }
        }

        let next = h * step_factor(err_norm, 0.5);
        if !accepted && next < settings.h_min {
            return Err(IntegrationFailure::StepSizeUnderflow { t, h: next });
        }
        h = next.max(settings.h_min);
    }

    Ok(trajectory)
}
