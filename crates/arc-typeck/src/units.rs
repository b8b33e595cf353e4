use smol_str::SmolStr;
use std::fmt;

/// Physical dimension a unit measures. Units only convert within one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Dimension {
    Time,
    Frequency,
    Length,
    Pressure,
    Voltage,
    Current,
}

/// A physical unit: its name, dimension, and scale relative to the SI
/// base unit of that dimension.
#[derive(Clone, Debug, PartialEq)]
pub struct Unit {
    pub name: SmolStr,
    pub dimension: Dimension,
    pub scale: f64,
}

impl Unit {
    pub fn new(name: impl Into<SmolStr>, dimension: Dimension, scale: f64) -> Self {
        Self {
            name: name.into(),
            dimension,
            scale,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

const UNITS: &[(&str, Dimension, f64)] = &[
    ("ns", Dimension::Time, 1e-9),
    ("us", Dimension::Time, 1e-6),
    ("ms", Dimension::Time, 1e-3),
    ("s", Dimension::Time, 1.0),
    ("min", Dimension::Time, 60.0),
    ("h", Dimension::Time, 3600.0),
    ("hz", Dimension::Frequency, 1.0),
    ("khz", Dimension::Frequency, 1e3),
    ("mhz", Dimension::Frequency, 1e6),
    ("mm", Dimension::Length, 1e-3),
    ("cm", Dimension::Length, 1e-2),
    ("m", Dimension::Length, 1.0),
    ("km", Dimension::Length, 1e3),
    ("pa", Dimension::Pressure, 1.0),
    ("kpa", Dimension::Pressure, 1e3),
    ("bar", Dimension::Pressure, 1e5),
    ("psi", Dimension::Pressure, 6_894.757_293_168),
    ("mv", Dimension::Voltage, 1e-3),
    ("v", Dimension::Voltage, 1.0),
    ("kv", Dimension::Voltage, 1e3),
    ("ma", Dimension::Current, 1e-3),
    ("a", Dimension::Current, 1.0),
];

/// Looks up a unit by name. Names are case-insensitive (`Hz`, `hz`).
pub fn resolve(name: &str) -> Option<Unit> {
    let lower = name.to_ascii_lowercase();
    UNITS
        .iter()
        .find(|(n, _, _)| *n == lower)
        .map(|(canonical, dimension, scale)| Unit::new(*canonical, *dimension, *scale))
}

/// The SI base unit of a dimension, with scale 1.
pub fn si(dimension: Dimension) -> Unit {
    let name = match dimension {
        Dimension::Time => "s",
        Dimension::Frequency => "hz",
        Dimension::Length => "m",
        Dimension::Pressure => "pa",
        Dimension::Voltage => "v",
        Dimension::Current => "a",
    };
    Unit::new(name, dimension, 1.0)
}

/// Multiplier taking a value in `from` to the same quantity in `to`.
pub fn scale_factor(from: &Unit, to: &Unit) -> Option<f64> {
    (from.dimension == to.dimension).then(|| from.scale / to.scale)
}
