//! Unit conversion factors and physical constants. Everything inside the
//! simulator is SI: Pa, m, m^2, s, kg, mol, K.

/// Standard gravity [m/s^2].
pub const GRAVITY: f64 = 9.80665;

/// Universal gas constant [J/(mol K)].
pub const GAS_CONSTANT: f64 = 8.314_462_618;

/// One bar [Pa].
pub const BAR: f64 = 1.0e5;

/// One darcy [m^2].
pub const DARCY: f64 = 9.869_233e-13;

/// One millidarcy [m^2].
pub const MILLIDARCY: f64 = 1.0e-3 * DARCY;

/// One centipoise [Pa s].
pub const CENTIPOISE: f64 = 1.0e-3;

/// One day [s].
pub const DAY: f64 = 86_400.0;

/// One year (365 days) [s].
pub const YEAR: f64 = 365.0 * DAY;

/// Standard surface conditions used by separator flashes.
pub const STANDARD_PRESSURE: f64 = 101_325.0;
pub const STANDARD_TEMPERATURE: f64 = 288.15;
