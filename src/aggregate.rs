//! Per-entity, per-marketplace result aggregation.

use crate::dispatch::TaskOutcome;
use crate::error::Failure;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

/// Lifecycle of one (entity, marketplace) slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    Pending,
    Success,
    Failure,
}

/// One addressed cell of the aggregated result.
///
/// A slot starts as `Pending` holding `T::default()`, the conservative
/// "closed / no data" value, and moves exactly once to `Success` or
/// `Failure`. A failed slot keeps the default value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Slot<T> {
    pub state: SlotState,
    #[serde(flatten)]
    pub value: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Failure>,
}

impl<T: Default> Slot<T> {
    pub fn pending() -> Self {
        Self { state: SlotState::Pending, value: T::default(), error: None }
    }
}

impl<T: Default> Default for Slot<T> {
    fn default() -> Self {
        Self::pending()
    }
}

impl<T> Slot<T> {
    /// Applies a task outcome. Returns `false`, leaving the slot untouched,
    /// if the slot already reached a terminal state.
    pub fn settle(&mut self, outcome: TaskOutcome<T>) -> bool {
        if self.state != SlotState::Pending {
            return false;
        }

        match outcome {
            TaskOutcome::Success { value } => {
                self.value = value;
                self.state = SlotState::Success;
            }
            TaskOutcome::Failure { reason } => {
                self.error = Some(reason);
                self.state = SlotState::Failure;
            }
        }
        true
    }

    pub fn is_settled(&self) -> bool {
        self.state != SlotState::Pending
    }
}

/// entity → marketplace → slot. Sorted maps keep output stable across runs.
pub type AggregatedResult<T> = BTreeMap<String, BTreeMap<String, Slot<T>>>;

/// Builds an [`AggregatedResult`] whose shape is fixed up front.
#[derive(Debug)]
pub struct Aggregator<T> {
    slots: AggregatedResult<T>,
}

impl<T: Default> Aggregator<T> {
    /// Pre-populates every (entity, marketplace) pair with a pending default.
    pub fn new(entities: &[String], marketplaces: &[String]) -> Self {
        let slots = entities
            .iter()
            .map(|entity| {
                let row = marketplaces.iter().map(|m| (m.clone(), Slot::pending())).collect();
                (entity.clone(), row)
            })
            .collect();
        Self { slots }
    }
}

impl<T> Aggregator<T> {
    /// Writes a task outcome into its own slot.
    ///
    /// Outcomes for pairs outside the pre-built shape, or for slots that
    /// already settled, are dropped and reported as `false`.
    pub fn settle(&mut self, entity: &str, marketplace: &str, outcome: TaskOutcome<T>) -> bool {
        let Some(slot) = self.slots.get_mut(entity).and_then(|row| row.get_mut(marketplace)) else {
            warn!("Dropping outcome for unrequested slot {}/{}", entity, marketplace);
            return false;
        };

        let applied = slot.settle(outcome);
        if !applied {
            warn!("Slot {}/{} already settled; ignoring second outcome", entity, marketplace);
        }
        applied
    }

    #[cfg(test)]
    pub fn get(&self, entity: &str, marketplace: &str) -> Option<&Slot<T>> {
        self.slots.get(entity)?.get(marketplace)
    }

    /// Number of slots, settled or not.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.slots.values().map(BTreeMap::len).sum()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slots that have not settled yet.
    pub fn pending(&self) -> usize {
        self.slots.values().flat_map(BTreeMap::values).filter(|s| !s.is_settled()).count()
    }

    pub fn into_result(self) -> AggregatedResult<T> {
        self.slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::marketplace::models::RestrictionStatus;

    fn ids(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn failure() -> Failure {
        Failure::new(FailureKind::UnknownMarketplace, "Unknown marketplace 'XX'")
    }

    #[test]
    fn test_every_pair_prepopulated() {
        let agg: Aggregator<RestrictionStatus> =
            Aggregator::new(&ids(&["A1", "A2", "A3"]), &ids(&["us", "de"]));

        assert_eq!(agg.len(), 6);
        assert_eq!(agg.pending(), 6);
        for entity in ["A1", "A2", "A3"] {
            for market in ["us", "de"] {
                let slot = agg.get(entity, market).unwrap();
                assert_eq!(slot.state, SlotState::Pending);
                assert_eq!(slot.value, RestrictionStatus::default());
            }
        }
    }

    #[test]
    fn test_empty_inputs() {
        let agg: Aggregator<RestrictionStatus> = Aggregator::new(&[], &ids(&["us"]));
        assert!(agg.is_empty());
        assert!(agg.into_result().is_empty());
    }

    #[test]
    fn test_settle_success_and_failure() {
        let mut agg: Aggregator<RestrictionStatus> =
            Aggregator::new(&ids(&["A1"]), &ids(&["us", "XX"]));

        assert!(agg.settle("A1", "us", TaskOutcome::Success { value: RestrictionStatus::open() }));
        assert!(agg.settle("A1", "XX", TaskOutcome::Failure { reason: failure() }));
        assert_eq!(agg.pending(), 0);

        let result = agg.into_result();
        let row = &result["A1"];
        assert_eq!(row["us"].state, SlotState::Success);
        assert!(row["us"].value.allowed);
        assert_eq!(row["XX"].state, SlotState::Failure);
        // Failed slot keeps the closed default
        assert!(!row["XX"].value.allowed);
        assert_eq!(row["XX"].error.as_ref().unwrap().kind, FailureKind::UnknownMarketplace);
    }

    #[test]
    fn test_terminal_state_is_final() {
        let mut slot: Slot<RestrictionStatus> = Slot::pending();
        assert!(slot.settle(TaskOutcome::Failure { reason: failure() }));
        assert!(!slot.settle(TaskOutcome::Success { value: RestrictionStatus::open() }));
        assert_eq!(slot.state, SlotState::Failure);
        assert!(!slot.value.allowed);
    }

    #[test]
    fn test_unrequested_slot_dropped() {
        let mut agg: Aggregator<RestrictionStatus> = Aggregator::new(&ids(&["A1"]), &ids(&["us"]));
        assert!(!agg.settle("A2", "us", TaskOutcome::Success { value: RestrictionStatus::open() }));
        assert!(!agg.settle("A1", "de", TaskOutcome::Success { value: RestrictionStatus::open() }));
        assert_eq!(agg.len(), 1);
        assert_eq!(agg.pending(), 1);
    }

    #[test]
    fn test_slot_serialization() {
        let mut slot: Slot<RestrictionStatus> = Slot::pending();
        let json = serde_json::to_value(&slot).unwrap();
        assert_eq!(json["state"], "pending");
        assert_eq!(json["allowed"], false);
        assert!(json.get("error").is_none());

        slot.settle(TaskOutcome::Failure { reason: failure() });
        let json = serde_json::to_value(&slot).unwrap();
        assert_eq!(json["state"], "failure");
        assert_eq!(json["error"]["kind"], "unknown_marketplace");
        assert_eq!(json["reasons"], serde_json::json!([]));
    }
}
