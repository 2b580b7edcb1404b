//! Target metadata and the immutable target registry.
//!
//! This module provides types for describing modulation targets:
//! - [`Target`] - One addressable destination (key, index, range, default)
//! - [`TargetUnit`] - Unit hint for displaying a target's value
//! - [`Registry`] - The immutable table of all [`TARGET_COUNT`] targets
//! - [`TargetRef`] - An external reference to a target (index or key)
//!
//! The builder in [`Registry::build`] is the only place where target keys and
//! ranges are defined. Every other component asks the registry.

use std::collections::HashMap;

use serde::Serialize;

/// Number of addressable targets on the bus.
pub const TARGET_COUNT: usize = 149;

/// Unit hint for a target's plain value.
///
/// Informational only: the bus treats every target as a plain `f32` in
/// `[min, max]` regardless of unit.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetUnit {
    /// Unitless value (usually 0-1)
    #[default]
    Generic,
    /// Frequency in Hertz
    Hertz,
    /// Pitch in cents
    Cents,
    /// Relative pitch in semitones
    Semitones,
    /// Level in decibels
    Decibels,
    /// Time in milliseconds
    Milliseconds,
    /// Angle in degrees
    Degrees,
    /// Stereo pan (-1 to +1)
    Pan,
    /// Ratio (e.g., compression ratio)
    Ratio,
    /// Whole-number count stored as float
    Count,
}

/// Metadata describing a single modulation target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Target {
    /// Position in the registry, `0..TARGET_COUNT`.
    pub index: usize,
    /// Unique dotted key (e.g., `"osc1.freq"`).
    pub key: String,
    /// Lower bound of the plain value.
    pub min: f32,
    /// Upper bound of the plain value.
    pub max: f32,
    /// Value the base store is seeded with.
    pub default: f32,
    /// Unit hint.
    pub unit: TargetUnit,
}

impl Target {
    /// Clamp a value into this target's range.
    #[inline]
    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }

    /// Default value, clamped into range.
    #[inline]
    pub fn safe_default(&self) -> f32 {
        self.clamp(self.default)
    }
}

/// External reference to a target, as accepted by the control surface.
///
/// Indices are signed so that out-of-range input (including negatives coming
/// from untyped sources) can be rejected instead of wrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetRef<'a> {
    /// Numeric index.
    Index(i64),
    /// Dotted key.
    Key(&'a str),
}

impl From<usize> for TargetRef<'_> {
    fn from(index: usize) -> Self {
        // usize beyond i64::MAX can never be a valid index
        Self::Index(i64::try_from(index).unwrap_or(i64::MAX))
    }
}

impl From<i32> for TargetRef<'_> {
    fn from(index: i32) -> Self {
        Self::Index(i64::from(index))
    }
}

impl From<i64> for TargetRef<'_> {
    fn from(index: i64) -> Self {
        Self::Index(index)
    }
}

impl<'a> From<&'a str> for TargetRef<'a> {
    fn from(key: &'a str) -> Self {
        Self::Key(key)
    }
}

impl std::fmt::Display for TargetRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Index(index) => write!(f, "#{index}"),
            Self::Key(key) => write!(f, "{key:?}"),
        }
    }
}

/// Immutable table of all modulation targets.
#[derive(Debug, Clone)]
pub struct Registry {
    targets: Vec<Target>,
    by_key: HashMap<String, usize>,
}

impl Registry {
    /// Build the registry from the static target table.
    ///
    /// # Panics
    ///
    /// Panics if the table is malformed (wrong count, duplicate key, empty
    /// range or default outside range). This can only happen through an edit
    /// to the table below and is covered by tests.
    pub fn build() -> Self {
        let mut table = TableBuilder::with_capacity(TARGET_COUNT);

        // Oscillators
        for (n, freq) in [(1, 440.0), (2, 220.0), (3, 110.0), (4, 880.0)] {
            let osc = format!("osc{n}");
            table.add(&osc, "freq", 20.0, 20_000.0, freq, TargetUnit::Hertz);
            table.add(&osc, "fine", -100.0, 100.0, 0.0, TargetUnit::Cents);
            table.add(&osc, "level", 0.0, 1.0, 0.5, TargetUnit::Generic);
            table.add(&osc, "pan", -1.0, 1.0, 0.0, TargetUnit::Pan);
            table.add(&osc, "shape", 0.0, 1.0, 0.0, TargetUnit::Generic);
            table.add(&osc, "pulse_width", 0.05, 0.95, 0.5, TargetUnit::Generic);
            table.add(&osc, "fm_amount", 0.0, 1.0, 0.0, TargetUnit::Generic);
            table.add(&osc, "sync", 0.0, 1.0, 0.0, TargetUnit::Generic);
        }

        for n in 1..=2 {
            let filter = format!("filter{n}");
            table.add(&filter, "cutoff", 20.0, 20_000.0, 8_000.0, TargetUnit::Hertz);
            table.add(&filter, "resonance", 0.0, 1.0, 0.2, TargetUnit::Generic);
            table.add(&filter, "drive", 0.0, 24.0, 0.0, TargetUnit::Decibels);
            table.add(&filter, "env_amount", -1.0, 1.0, 0.0, TargetUnit::Generic);
            table.add(&filter, "key_track", 0.0, 1.0, 0.5, TargetUnit::Generic);
            table.add(&filter, "mix", 0.0, 1.0, 1.0, TargetUnit::Generic);
        }

        for n in 1..=4 {
            let env = format!("env{n}");
            table.add(&env, "attack", 0.0, 10_000.0, 10.0, TargetUnit::Milliseconds);
            table.add(&env, "decay", 0.0, 10_000.0, 200.0, TargetUnit::Milliseconds);
            table.add(&env, "sustain", 0.0, 1.0, 0.7, TargetUnit::Generic);
            table.add(&env, "release", 0.0, 20_000.0, 400.0, TargetUnit::Milliseconds);
            table.add(&env, "curve", -1.0, 1.0, 0.0, TargetUnit::Generic);
        }

        for n in 1..=4 {
            let lfo = format!("lfo{n}");
            table.add(&lfo, "rate", 0.01, 50.0, 1.0, TargetUnit::Hertz);
            table.add(&lfo, "depth", 0.0, 1.0, 0.0, TargetUnit::Generic);
            table.add(&lfo, "phase", 0.0, 360.0, 0.0, TargetUnit::Degrees);
            table.add(&lfo, "shape", 0.0, 1.0, 0.0, TargetUnit::Generic);
        }

        for n in 1..=3 {
            let grain = format!("grain{n}");
            table.add(&grain, "position", 0.0, 1.0, 0.0, TargetUnit::Generic);
            table.add(&grain, "size", 1.0, 1_000.0, 80.0, TargetUnit::Milliseconds);
            table.add(&grain, "density", 1.0, 200.0, 20.0, TargetUnit::Hertz);
            table.add(&grain, "spray", 0.0, 1.0, 0.1, TargetUnit::Generic);
            table.add(&grain, "pitch", -24.0, 24.0, 0.0, TargetUnit::Semitones);
            table.add(&grain, "level", 0.0, 1.0, 0.0, TargetUnit::Generic);
        }

        table.add("voice", "glide", 0.0, 2_000.0, 0.0, TargetUnit::Milliseconds);
        table.add("voice", "spread", 0.0, 1.0, 0.0, TargetUnit::Generic);
        table.add("voice", "detune", 0.0, 50.0, 0.0, TargetUnit::Cents);
        table.add("voice", "unison", 1.0, 8.0, 1.0, TargetUnit::Count);

        table.add("noise", "level", 0.0, 1.0, 0.0, TargetUnit::Generic);
        table.add("noise", "color", -1.0, 1.0, 0.0, TargetUnit::Generic);

        table.add("ring", "freq", 1.0, 5_000.0, 100.0, TargetUnit::Hertz);
        table.add("ring", "mix", 0.0, 1.0, 0.0, TargetUnit::Generic);

        table.add("distortion", "drive", 0.0, 36.0, 0.0, TargetUnit::Decibels);
        table.add("distortion", "tone", 0.0, 1.0, 0.5, TargetUnit::Generic);
        table.add("distortion", "mix", 0.0, 1.0, 0.0, TargetUnit::Generic);

        table.add("chorus", "rate", 0.05, 10.0, 0.8, TargetUnit::Hertz);
        table.add("chorus", "depth", 0.0, 1.0, 0.3, TargetUnit::Generic);
        table.add("chorus", "mix", 0.0, 1.0, 0.0, TargetUnit::Generic);

        table.add("delay", "time", 1.0, 2_000.0, 375.0, TargetUnit::Milliseconds);
        table.add("delay", "feedback", 0.0, 0.95, 0.35, TargetUnit::Generic);
        table.add("delay", "mix", 0.0, 1.0, 0.0, TargetUnit::Generic);
        table.add("delay", "tone", 0.0, 1.0, 0.5, TargetUnit::Generic);

        table.add("reverb", "size", 0.0, 1.0, 0.5, TargetUnit::Generic);
        table.add("reverb", "damping", 0.0, 1.0, 0.5, TargetUnit::Generic);
        table.add("reverb", "mix", 0.0, 1.0, 0.0, TargetUnit::Generic);
        table.add("reverb", "predelay", 0.0, 250.0, 10.0, TargetUnit::Milliseconds);
        table.add("reverb", "width", 0.0, 1.0, 1.0, TargetUnit::Generic);

        table.add("eq", "low", -18.0, 18.0, 0.0, TargetUnit::Decibels);
        table.add("eq", "mid", -18.0, 18.0, 0.0, TargetUnit::Decibels);
        table.add("eq", "high", -18.0, 18.0, 0.0, TargetUnit::Decibels);
        table.add("eq", "mid_freq", 100.0, 8_000.0, 1_000.0, TargetUnit::Hertz);

        table.add("comp", "threshold", -60.0, 0.0, -12.0, TargetUnit::Decibels);
        table.add("comp", "ratio", 1.0, 20.0, 4.0, TargetUnit::Ratio);
        table.add("comp", "attack", 0.1, 100.0, 10.0, TargetUnit::Milliseconds);
        table.add("comp", "release", 10.0, 1_000.0, 100.0, TargetUnit::Milliseconds);
        table.add("comp", "makeup", 0.0, 24.0, 0.0, TargetUnit::Decibels);

        for n in 1..=16 {
            table.add("macro", &n.to_string(), 0.0, 1.0, 0.0, TargetUnit::Generic);
        }

        table.add("master", "gain", -60.0, 12.0, 0.0, TargetUnit::Decibels);
        table.add("master", "pan", -1.0, 1.0, 0.0, TargetUnit::Pan);
        table.add("master", "tune", -100.0, 100.0, 0.0, TargetUnit::Cents);

        table.finish()
    }

    /// Number of targets (always [`TARGET_COUNT`]).
    #[inline]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Always false; present for API symmetry with `len`.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Look up a target by index.
    pub fn lookup_by_index(&self, index: usize) -> Option<&Target> {
        self.targets.get(index)
    }

    /// Look up a target by key.
    pub fn lookup_by_key(&self, key: &str) -> Option<&Target> {
        self.by_key.get(key).map(|&index| &self.targets[index])
    }

    /// Resolve an external reference, rejecting anything out of range.
    pub fn resolve(&self, target: TargetRef<'_>) -> Option<&Target> {
        match target {
            TargetRef::Index(index) => usize::try_from(index)
                .ok()
                .and_then(|index| self.lookup_by_index(index)),
            TargetRef::Key(key) => self.lookup_by_key(key),
        }
    }

    /// Iterate all targets in index order.
    pub fn iter(&self) -> impl Iterator<Item = &Target> {
        self.targets.iter()
    }

    /// All targets as a slice, in index order.
    pub fn as_slice(&self) -> &[Target] {
        &self.targets
    }

    /// Dump all target definitions as a pretty-printed JSON array.
    pub fn dump_json(&self) -> String {
        // Target serialization is infallible (plain strings, numbers, unit enum)
        serde_json::to_string_pretty(&self.targets).unwrap_or_default()
    }
}

/// Local accumulator used by [`Registry::build`].
struct TableBuilder {
    targets: Vec<Target>,
}

impl TableBuilder {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            targets: Vec::with_capacity(capacity),
        }
    }

    fn add(&mut self, section: &str, name: &str, min: f32, max: f32, default: f32, unit: TargetUnit) {
        assert!(min < max, "target {section}.{name}: min must be below max");
        assert!(
            (min..=max).contains(&default),
            "target {section}.{name}: default must lie within [min, max]"
        );
        let index = self.targets.len();
        self.targets.push(Target {
            index,
            key: format!("{section}.{name}"),
            min,
            max,
            default,
            unit,
        });
    }

    fn finish(self) -> Registry {
        assert_eq!(
            self.targets.len(),
            TARGET_COUNT,
            "target table must define exactly {TARGET_COUNT} targets"
        );
        let mut by_key = HashMap::with_capacity(self.targets.len());
        for target in &self.targets {
            let previous = by_key.insert(target.key.clone(), target.index);
            assert!(previous.is_none(), "duplicate target key {:?}", target.key);
        }
        Registry {
            targets: self.targets,
            by_key,
        }
    }
}
