use std::sync::Arc;

use num_dual::DualNum;

/// Field identifier stored as a runtime string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field(pub Arc<str>);

impl Field {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<T: Into<Arc<str>>> From<T> for Field {
    fn from(name: T) -> Self {
        Field::new(name)
    }
}

/// Geometric point in space.
#[derive(Clone, Copy, Debug)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl From<[f64; 3]> for Point {
    fn from(c: [f64; 3]) -> Self {
        Self {
            x: c[0],
            y: c[1],
            z: c[2],
        }
    }
}

/// Outward pointing unit normal.
#[derive(Clone, Copy, Debug)]
pub struct Normal {
    pub nx: f64,
    pub ny: f64,
    pub nz: f64,
}

impl From<[f64; 3]> for Normal {
    fn from(n: [f64; 3]) -> Self {
        Self {
            nx: n[0],
            ny: n[1],
            nz: n[2],
        }
    }
}

#[derive(Clone)]
pub enum BoundarySelector {
    Label(String),
    Predicate(Arc<dyn Fn(Point, Normal) -> bool + Send + Sync>),
}

impl BoundarySelector {
    pub fn label(l: impl Into<String>) -> Self {
        BoundarySelector::Label(l.into())
    }

    pub fn predicate(f: impl Fn(Point, Normal) -> bool + Send + Sync + 'static) -> Self {
        BoundarySelector::Predicate(Arc::new(f))
    }

    pub fn matches(&self, label: Option<&str>, p: Point, n: Normal) -> bool {
        match self {
            BoundarySelector::Label(l) => label == Some(l.as_str()),
            BoundarySelector::Predicate(pred) => pred(p, n),
        }
    }
}

impl std::fmt::Debug for BoundarySelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BoundarySelector::Label(l) => write!(f, "Label({l:?})"),
            BoundarySelector::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Fixed-pressure flow boundary on a set of boundary faces.
///
/// Flow goes through the half transmissibility of the boundary face to a
/// ghost node at the given pressure. Without `fractions` the ghost copies the
/// fractions of the interior cell, so outflow carries the resident fluid.
#[derive(Clone, Debug)]
pub struct FlowBoundaryCondition {
    pub on: BoundarySelector,
    pub pressure: f64,
    pub fractions: Option<Vec<f64>>,
    pub trans_multiplier: f64,
}

impl FlowBoundaryCondition {
    pub fn pressure(on: BoundarySelector, pressure: f64) -> Self {
        Self {
            on,
            pressure,
            fractions: None,
            trans_multiplier: 1.0,
        }
    }

    pub fn with_fractions(mut self, fractions: Vec<f64>) -> Self {
        self.fractions = Some(fractions);
        self
    }

    pub fn with_trans_multiplier(mut self, multiplier: f64) -> Self {
        self.trans_multiplier = multiplier;
        self
    }
}

/// Ordered set of boundary conditions; later rules take precedence.
#[derive(Clone, Debug, Default)]
pub struct BoundaryRegistry {
    rules: Vec<FlowBoundaryCondition>,
}

impl BoundaryRegistry {
    pub fn add(&mut self, rule: FlowBoundaryCondition) {
        self.rules.push(rule);
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> &[FlowBoundaryCondition] {
        &self.rules
    }

    pub fn find_for(&self, label: Option<&str>, p: Point, n: Normal) -> Option<&FlowBoundaryCondition> {
        self.rules.iter().rev().find(|r| r.on.matches(label, p, n))
    }
}

/// Volumetric source in a single cell, in surface units per second
/// (positive injects). Without `fractions` the cell fluid is produced or
/// injected with mobility weighting.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceTerm {
    pub cell: usize,
    pub rate: f64,
    pub fractions: Option<Vec<f64>>,
}

impl SourceTerm {
    pub fn new(cell: usize, rate: f64) -> Self {
        Self {
            cell,
            rate,
            fractions: None,
        }
    }

    pub fn with_fractions(mut self, fractions: Vec<f64>) -> Self {
        self.fractions = Some(fractions);
        self
    }
}

/// Primary variables of the ghost node behind a boundary face.
#[inline]
pub fn ghost_values<T: DualNum<f64>>(u_cell: &[T], pressure: f64, fractions: Option<&[f64]>) -> Vec<T> {
    let m = u_cell.len();
    let mut ghost = Vec::with_capacity(m);
    ghost.push(T::from(pressure));
    match fractions {
        Some(f) => ghost.extend(f.iter().take(m - 1).map(|&v| T::from(v))),
        None => ghost.extend(u_cell[1..].iter().cloned()),
    }
    ghost
}
