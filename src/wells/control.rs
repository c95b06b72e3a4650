use num_dual::DualNum;
use serde::{Deserialize, Serialize};

use crate::constants::{BAR, DAY};
use crate::models::ModelError;
use crate::physics::FlowSystem;

/// Quantity a well is operated on. Rates are surface rates, positive for
/// injection and negative for production.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum WellTarget {
    Bhp(f64),
    TotalRate(f64),
    SurfacePhaseRate { phase: usize, rate: f64 },
}

impl WellTarget {
    pub fn is_rate(&self) -> bool {
        !matches!(self, WellTarget::Bhp(_))
    }

    fn rate(&self) -> Option<f64> {
        match *self {
            WellTarget::Bhp(_) => None,
            WellTarget::TotalRate(r) | WellTarget::SurfacePhaseRate { rate: r, .. } => Some(r),
        }
    }

    /// True when the operating point lies beyond this target in the
    /// direction the well pushes: higher pressure or more injection for
    /// injectors, lower pressure or more production for producers.
    fn is_exceeded(&self, injector: bool, bhp: f64, rate: f64, phase_rates: &[f64]) -> bool {
        let sign = if injector { 1.0 } else { -1.0 };
        let (value, bound, scale) = match *self {
            WellTarget::Bhp(p) => (bhp, p, p.abs()),
            WellTarget::TotalRate(r) => (rate, r, r.abs().max(RATE_SCALE)),
            WellTarget::SurfacePhaseRate { phase, rate: r } => (
                phase_rates.get(phase).copied().unwrap_or(0.0),
                r,
                r.abs().max(RATE_SCALE),
            ),
        };
        sign * (value - bound) > SWITCH_MARGIN * scale
    }
}

/// Operating limits. For producers `bhp` is a minimum, for injectors a
/// maximum. `rate` bounds the magnitude of the total surface rate and has
/// the sign of the well type.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WellLimits {
    pub bhp: Option<f64>,
    pub rate: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum WellControl {
    Injector {
        target: WellTarget,
        /// Surface composition of the injected fluid, one entry per component.
        composition: Vec<f64>,
        limits: WellLimits,
    },
    Producer {
        target: WellTarget,
        limits: WellLimits,
    },
    Disabled,
}

impl WellControl {
    pub fn injector(target: WellTarget, composition: Vec<f64>) -> Self {
        WellControl::Injector {
            target,
            composition,
            limits: WellLimits::default(),
        }
    }

    pub fn producer(target: WellTarget) -> Self {
        WellControl::Producer {
            target,
            limits: WellLimits::default(),
        }
    }

    pub fn with_limits(self, new_limits: WellLimits) -> Self {
        match self {
            WellControl::Injector {
                target, composition, ..
            } => WellControl::Injector {
                target,
                composition,
                limits: new_limits,
            },
            WellControl::Producer { target, .. } => WellControl::Producer {
                target,
                limits: new_limits,
            },
            WellControl::Disabled => WellControl::Disabled,
        }
    }

    pub fn target(&self) -> Option<&WellTarget> {
        match self {
            WellControl::Injector { target, .. } | WellControl::Producer { target, .. } => Some(target),
            WellControl::Disabled => None,
        }
    }

    pub fn limits(&self) -> Option<&WellLimits> {
        match self {
            WellControl::Injector { limits, .. } | WellControl::Producer { limits, .. } => Some(limits),
            WellControl::Disabled => None,
        }
    }

    pub fn is_injector(&self) -> bool {
        matches!(self, WellControl::Injector { .. })
    }

    pub fn validate(&self, well: &str, num_components: usize, num_phases: usize) -> Result<(), ModelError> {
        let fail = |reason: String| -> Result<(), ModelError> {
            Err(ModelError::InvalidControl {
                well: well.to_string(),
                reason,
            })
        };
        let (Some(target), Some(limits)) = (self.target(), self.limits()) else {
            return Ok(());
        };
        let sign = if self.is_injector() { 1.0 } else { -1.0 };

        match *target {
            WellTarget::Bhp(p) if !(p > 0.0) => return fail(format!("BHP target {p} must be positive")),
            WellTarget::SurfacePhaseRate { phase, .. } if phase >= num_phases => {
                return fail(format!("phase index {phase} out of range"))
            }
            _ => {}
        }
        if let Some(r) = target.rate() {
            if r * sign < 0.0 || !r.is_finite() {
                return fail(format!("rate target {r} has the wrong sign"));
            }
        }
        if let Some(p) = limits.bhp {
            if !(p > 0.0) {
                return fail(format!("BHP limit {p} must be positive"));
            }
        }
        if let Some(r) = limits.rate {
            if !(r * sign > 0.0) {
                return fail(format!("rate limit {r} has the wrong sign"));
            }
        }
        if let WellControl::Injector { composition, .. } = self {
            if composition.len() != num_components
                || composition.iter().any(|&c| c < 0.0)
                || !(composition.iter().sum::<f64>() > 0.0)
            {
                return fail(format!("invalid injection composition {composition:?}"));
            }
        }
        Ok(())
    }
}

/// Control of one well during a report step, with the target currently in
/// force after limit switching.
#[derive(Clone, Debug, PartialEq)]
pub struct WellDrive {
    pub control: WellControl,
    pub active: Option<WellTarget>,
    /// Component amounts per unit surface rate of the injected fluid; empty
    /// for producers.
    pub stream: Vec<f64>,
}

impl WellDrive {
    pub fn new<S: FlowSystem>(system: &S, control: WellControl) -> Self {
        let stream = match &control {
            WellControl::Injector { composition, .. } => system.injection_stream(composition),
            _ => Vec::new(),
        };
        Self {
            active: control.target().cloned(),
            control,
            stream,
        }
    }

    pub fn is_injector(&self) -> bool {
        self.control.is_injector()
    }

    /// Switch the active target if the solution violates a limit or
    /// overshoots the user target. `phase_rates` are the signed surface
    /// phase rates of the current solution.
    pub fn update(&mut self, bhp: f64, rate: f64, phase_rates: &[f64]) -> Option<&WellTarget> {
        let active = self.active.as_ref()?;
        let next = check_limits(&self.control, active, bhp, rate, phase_rates)?;
        if &next == active {
            return None;
        }
        self.active = Some(next);
        self.active.as_ref()
    }
}

/// Rates below this magnitude are scaled as if they were one m^3/day.
const RATE_SCALE: f64 = 1.0 / DAY;

/// Relative overshoot needed before a constraint takes over.
const SWITCH_MARGIN: f64 = 1e-6;

/// Scaled facility equation of the active target. `phase_fractions` are the
/// surface phase fractions of the produced or injected fluid.
pub fn control_equation<T: DualNum<f64>>(target: Option<&WellTarget>, bhp: T, rate: T, phase_fractions: &[T]) -> T {
    match target {
        Some(WellTarget::Bhp(p)) => (bhp - *p) / BAR,
        Some(WellTarget::TotalRate(r)) => (rate - *r) / r.abs().max(RATE_SCALE),
        Some(WellTarget::SurfacePhaseRate { phase, rate: r }) => {
            (rate * phase_fractions[*phase].clone() - *r) / r.abs().max(RATE_SCALE)
        }
        None => rate / RATE_SCALE,
    }
}

/// Constraint to switch to when the current solution goes beyond one that is
/// not active. The BHP limit is checked first, then the rate limit, then the
/// user target, so a well held on a limit returns to its own target once it
/// would overshoot it.
pub fn check_limits(
    control: &WellControl,
    active: &WellTarget,
    bhp: f64,
    rate: f64,
    phase_rates: &[f64],
) -> Option<WellTarget> {
    let limits = control.limits()?;
    let target = control.target()?;
    let injector = control.is_injector();
    [
        limits.bhp.map(WellTarget::Bhp),
        limits.rate.map(WellTarget::TotalRate),
        Some(target.clone()),
    ]
    .into_iter()
    .flatten()
    .filter(|c| c != active)
    .find(|c| c.is_exceeded(injector, bhp, rate, phase_rates))
}
