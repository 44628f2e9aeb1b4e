//! Train schedules.
//!
//! A [`Schedule`] is an ordered list of stops plus the locomotives that
//! follow it. Locomotives are held as associations, so a schedule whose
//! locomotive has been removed keeps a dead reference until export, where
//! it is reported as dangling.

use crate::association::Association;
use crate::collection::{EntityCollection, EntityRef};
use crate::error::CollectionError;
use schematic_core::catalog::EntityCategory;
use schematic_core::id::EntityKey;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitConditionKind {
    Time,
    Inactivity,
    Full,
    Empty,
    ItemCount,
    FluidCount,
    Circuit,
    RobotsInactive,
    PassengerPresent,
    PassengerNotPresent,
}

/// How a condition combines with the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareType {
    And,
    #[default]
    Or,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitCondition {
    #[serde(rename = "type")]
    pub kind: WaitConditionKind,
    #[serde(default)]
    pub compare_type: CompareType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticks: Option<u32>,
    /// Signal comparison for item, fluid and circuit conditions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<serde_json::Value>,
}

impl WaitCondition {
    pub fn new(kind: WaitConditionKind) -> Self {
        Self {
            kind,
            compare_type: CompareType::default(),
            ticks: None,
            condition: None,
        }
    }

    pub fn time(ticks: u32) -> Self {
        Self {
            ticks: Some(ticks),
            ..Self::new(WaitConditionKind::Time)
        }
    }

    pub fn inactivity(ticks: u32) -> Self {
        Self {
            ticks: Some(ticks),
            ..Self::new(WaitConditionKind::Inactivity)
        }
    }

    pub fn and(mut self) -> Self {
        self.compare_type = CompareType::And;
        self
    }

    pub fn with_condition(mut self, condition: serde_json::Value) -> Self {
        self.condition = Some(condition);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleStop {
    pub station: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub wait_conditions: Vec<WaitCondition>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schedule {
    stops: Vec<ScheduleStop>,
    locomotives: Vec<Association>,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stops(&self) -> &[ScheduleStop] {
        &self.stops
    }

    pub fn add_stop(&mut self, station: &str, wait_conditions: Vec<WaitCondition>) {
        self.stops.push(ScheduleStop {
            station: station.to_string(),
            wait_conditions,
        });
    }

    pub fn insert_stop(&mut self, index: usize, stop: ScheduleStop) -> Result<(), CollectionError> {
        if index > self.stops.len() {
            return Err(CollectionError::IndexOutOfRange {
                index,
                len: self.stops.len(),
            });
        }
        self.stops.insert(index, stop);
        Ok(())
    }

    pub fn remove_stop(&mut self, index: usize) -> Option<ScheduleStop> {
        (index < self.stops.len()).then(|| self.stops.remove(index))
    }

    pub fn locomotives(&self) -> &[Association] {
        &self.locomotives
    }

    /// Attach a locomotive from `collection`. Other rolling stock and
    /// non-train entities are rejected.
    pub fn add_locomotive(
        &mut self,
        collection: &EntityCollection,
        locomotive: impl Into<EntityRef>,
    ) -> Result<(), CollectionError> {
        let key = collection.resolve(locomotive)?;
        let node = collection.get(key).ok_or(CollectionError::NotInCollection)?;
        if node.category() != EntityCategory::Locomotive {
            return Err(CollectionError::NotLocomotive(node.kind().to_string()));
        }
        self.push_locomotive(key);
        Ok(())
    }

    pub(crate) fn push_locomotive(&mut self, key: EntityKey) {
        let assoc = Association::new(key);
        if !self.locomotives.contains(&assoc) {
            self.locomotives.push(assoc);
        }
    }

    pub fn remove_locomotive(&mut self, locomotive: Association) -> bool {
        let before = self.locomotives.len();
        self.locomotives.retain(|l| *l != locomotive);
        self.locomotives.len() != before
    }

    /// Locomotives that still exist in `collection`.
    pub fn live_locomotives(&self, collection: &EntityCollection) -> Vec<EntityKey> {
        self.locomotives
            .iter()
            .filter(|l| l.is_live(collection))
            .map(|l| l.key())
            .collect()
    }
}
