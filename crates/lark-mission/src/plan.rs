use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::MissionError;
use crate::waypoint::WaypointRecord;

/// An ordered set of waypoint records per named leg, e.g.
/// `{"A": [...], "B": [...]}`. Loaded once before flight and immutable
/// after that.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MissionPlan {
    legs: BTreeMap<String, Vec<WaypointRecord>>,
}

impl MissionPlan {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read mission file {}", path.display()))?;
        let plan: MissionPlan = serde_json::from_str(&s)
            .with_context(|| format!("parse mission file {}", path.display()))?;
        Ok(plan)
    }

    pub fn leg_names(&self) -> impl Iterator<Item = &str> {
        self.legs.keys().map(String::as_str)
    }

    pub fn legs(&self) -> impl Iterator<Item = (&str, &[WaypointRecord])> {
        self.legs.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.legs.is_empty()
    }

    /// Flatten the named legs, in the order given, into one waypoint list.
    pub fn resolve(&self, leg_names: &[String]) -> Result<Vec<WaypointRecord>, MissionError> {
        let mut out = Vec::new();
        for name in leg_names {
            let leg = self
                .legs
                .get(name)
                .ok_or_else(|| MissionError::UnknownLeg(name.clone()))?;
            out.extend(leg.iter().cloned());
        }
        Ok(out)
    }
}
