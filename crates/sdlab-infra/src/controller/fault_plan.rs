//! Scriptable fault injection for the simulated controller.
//!
//! A plan maps an operation name (`aspirate`, `move_to_well`, ...) to a
//! number of upcoming failures and the kind of error to raise. Specs are
//! written `OP[:COUNT[:KIND]]`, e.g. `aspirate:2:liquid`.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use sdlab_core::controller::ControllerError;

/// Error kinds that can be injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedKind {
    Motion,
    Liquid,
    Instrument,
    Communication,
}

impl InjectedKind {
    /// Kind used when a spec leaves it out.
    pub fn default_for(operation: &str) -> Self {
        match operation {
            "aspirate" | "dispense" => InjectedKind::Liquid,
            "run_measurement" => InjectedKind::Instrument,
            _ => InjectedKind::Motion,
        }
    }

    pub fn to_error(self, operation: &str) -> ControllerError {
        let message = format!("injected fault in {operation}");
        match self {
            InjectedKind::Motion => ControllerError::Motion(message),
            InjectedKind::Liquid => ControllerError::Liquid(message),
            InjectedKind::Instrument => ControllerError::Instrument(message),
            InjectedKind::Communication => ControllerError::Communication(message),
        }
    }
}

impl FromStr for InjectedKind {
    type Err = FaultSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "motion" => Ok(InjectedKind::Motion),
            "liquid" => Ok(InjectedKind::Liquid),
            "instrument" => Ok(InjectedKind::Instrument),
            "communication" | "comm" => Ok(InjectedKind::Communication),
            other => Err(FaultSpecError::UnknownKind(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FaultSpecError {
    #[error("fault spec is empty")]
    Empty,

    #[error("invalid failure count: {0}")]
    InvalidCount(String),

    #[error("unknown fault kind: {0} (expected motion, liquid, instrument or communication)")]
    UnknownKind(String),
}

/// One parsed `OP[:COUNT[:KIND]]` spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultSpec {
    pub operation: String,
    pub count: u32,
    pub kind: InjectedKind,
}

impl FromStr for FaultSpec {
    type Err = FaultSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let operation = parts.next().map(str::trim).unwrap_or_default();
        if operation.is_empty() {
            return Err(FaultSpecError::Empty);
        }
        let count = match parts.next() {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| FaultSpecError::InvalidCount(raw.to_string()))?,
            None => 1,
        };
        let kind = match parts.next() {
            Some(raw) => raw.trim().parse()?,
            None => InjectedKind::default_for(operation),
        };
        Ok(Self {
            operation: operation.to_string(),
            count,
            kind,
        })
    }
}

impl fmt::Display for FaultSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{:?}", self.operation, self.count, self.kind)
    }
}

/// Pending injected failures keyed by operation.
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    pending: HashMap<String, (u32, InjectedKind)>,
}

impl FaultPlan {
    pub fn add(&mut self, spec: FaultSpec) {
        self.pending
            .insert(spec.operation, (spec.count, spec.kind));
    }

    /// Consume one failure for `operation`, if any are left.
    pub fn take(&mut self, operation: &str) -> Option<ControllerError> {
        let (remaining, kind) = self.pending.get_mut(operation)?;
        if *remaining == 0 {
            return None;
        }
        *remaining -= 1;
        Some(kind.to_error(operation))
    }

    pub fn remaining(&self, operation: &str) -> u32 {
        self.pending.get(operation).map_or(0, |(n, _)| *n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_defaults_count_and_kind() {
        let spec: FaultSpec = "aspirate".parse().unwrap();
        assert_eq!(spec.count, 1);
        assert_eq!(spec.kind, InjectedKind::Liquid);

        let spec: FaultSpec = "move_to_well:3".parse().unwrap();
        assert_eq!(spec.count, 3);
        assert_eq!(spec.kind, InjectedKind::Motion);

        let spec: FaultSpec = "home:1:comm".parse().unwrap();
        assert_eq!(spec.kind, InjectedKind::Communication);
    }

    #[test]
    fn bad_specs_are_rejected() {
        assert_eq!("".parse::<FaultSpec>(), Err(FaultSpecError::Empty));
        assert!(matches!(
            "aspirate:x".parse::<FaultSpec>(),
            Err(FaultSpecError::InvalidCount(_))
        ));
        assert!(matches!(
            "aspirate:1:gremlins".parse::<FaultSpec>(),
            Err(FaultSpecError::UnknownKind(_))
        ));
    }

    #[test]
    fn plan_counts_down() {
        let mut plan = FaultPlan::default();
        plan.add("run_measurement:2".parse().unwrap());
        assert!(matches!(
            plan.take("run_measurement"),
            Some(ControllerError::Instrument(_))
        ));
        assert_eq!(plan.remaining("run_measurement"), 1);
        assert!(plan.take("run_measurement").is_some());
        assert!(plan.take("run_measurement").is_none());
        assert!(plan.take("home").is_none());
    }
}
