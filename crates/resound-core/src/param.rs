//! Node parameters: plain attributes, controls and scheduled control changes.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Scheduling primitive a [`ScheduledChange`] resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScheduleMethod {
    /// Jump to the target value at the given time
    SetValueAtTime,
    /// Ramp linearly to the target value, arriving at the given time
    LinearRampToValueAtTime,
    /// Ramp exponentially to the target value, arriving at the given time
    ExponentialRampToValueAtTime,
}

impl fmt::Display for ScheduleMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SetValueAtTime => "setValueAtTime",
            Self::LinearRampToValueAtTime => "linearRampToValueAtTime",
            Self::ExponentialRampToValueAtTime => "exponentialRampToValueAtTime",
        };
        f.write_str(name)
    }
}

/// A future-time instruction for a control.
///
/// `time` is an offset in seconds from the host clock at the moment the
/// change is applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScheduledChange {
    /// Scheduling primitive
    pub method: ScheduleMethod,
    /// Value to reach
    pub target: f64,
    /// Offset from the current host time, in seconds
    pub time: f64,
}

impl ScheduledChange {
    /// Immediate set at `time` seconds from now.
    #[must_use]
    pub fn set(target: f64, time: f64) -> Self {
        Self { method: ScheduleMethod::SetValueAtTime, target, time }
    }

    /// Linear ramp ending `time` seconds from now.
    #[must_use]
    pub fn linear(target: f64, time: f64) -> Self {
        Self { method: ScheduleMethod::LinearRampToValueAtTime, target, time }
    }

    /// Exponential ramp ending `time` seconds from now.
    #[must_use]
    pub fn exponential(target: f64, time: f64) -> Self {
        Self { method: ScheduleMethod::ExponentialRampToValueAtTime, target, time }
    }

    /// Absolute host time at which this change lands, given the current time.
    #[must_use]
    pub fn resolve(&self, now: f64) -> f64 {
        now + self.time
    }
}

/// Parameter kind, the second half of a parameter's diff identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ParamKind {
    Property,
    Control,
    Scheduled,
}

/// A single parameter of a virtual node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Parameter {
    /// Plain attribute of the resource, replaced as a whole
    #[serde(rename = "NodeProperty")]
    Property { label: String, value: Value },
    /// Continuously controllable value
    #[serde(rename = "AudioParam")]
    Control { label: String, value: f64 },
    /// Scheduled change of a control
    #[serde(rename = "ScheduledUpdate")]
    Scheduled {
        label: String,
        #[serde(rename = "value")]
        change: ScheduledChange,
    },
}

impl Parameter {
    /// Create a plain attribute parameter.
    pub fn property(label: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Property { label: label.into(), value: value.into() }
    }

    /// Create a control parameter.
    pub fn control(label: impl Into<String>, value: f64) -> Self {
        Self::Control { label: label.into(), value }
    }

    /// Create a scheduled control change.
    pub fn scheduled(label: impl Into<String>, change: ScheduledChange) -> Self {
        Self::Scheduled { label: label.into(), change }
    }

    /// Label of the attribute or control this parameter targets.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Property { label, .. } | Self::Control { label, .. } | Self::Scheduled { label, .. } => {
                label
            }
        }
    }

    /// Kind of this parameter.
    #[must_use]
    pub fn kind(&self) -> ParamKind {
        match self {
            Self::Property { .. } => ParamKind::Property,
            Self::Control { .. } => ParamKind::Control,
            Self::Scheduled { .. } => ParamKind::Scheduled,
        }
    }

    /// Diff identity: (label, kind).
    #[must_use]
    pub fn identity(&self) -> (&str, ParamKind) {
        (self.label(), self.kind())
    }

    /// Whether this is a scheduled change.
    #[must_use]
    pub fn is_scheduled(&self) -> bool {
        matches!(self, Self::Scheduled { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_shapes_parse() {
        let params: Vec<Parameter> = serde_json::from_value(json!([
            { "type": "NodeProperty", "label": "type", "value": "sawtooth" },
            { "type": "AudioParam", "label": "frequency", "value": 440 },
            {
                "type": "ScheduledUpdate",
                "label": "gain",
                "value": { "method": "linearRampToValueAtTime", "target": 0.0, "time": 2.5 }
            }
        ]))
        .unwrap();

        assert_eq!(params[0], Parameter::property("type", "sawtooth"));
        assert_eq!(params[1], Parameter::control("frequency", 440.0));
        assert_eq!(params[2], Parameter::scheduled("gain", ScheduledChange::linear(0.0, 2.5)));
    }

    #[test]
    fn test_identity_distinguishes_kind() {
        let control = Parameter::control("gain", 1.0);
        let scheduled = Parameter::scheduled("gain", ScheduledChange::set(0.5, 0.0));
        assert_eq!(control.label(), scheduled.label());
        assert_ne!(control.identity(), scheduled.identity());
    }

    #[test]
    fn test_resolve_is_relative_to_now() {
        let change = ScheduledChange::exponential(880.0, 0.25);
        assert!((change.resolve(10.0) - 10.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_method_display_matches_wire_name() {
        assert_eq!(ScheduleMethod::SetValueAtTime.to_string(), "setValueAtTime");
        let wire = serde_json::to_value(ScheduleMethod::ExponentialRampToValueAtTime).unwrap();
        assert_eq!(wire, json!("exponentialRampToValueAtTime"));
    }
}
