//! Fixed-slot parameter collections
//!
//! Callers that expose a fixed number of optional inputs (ten parameter sets
//! for a batch, four overrides per multi-parameter slot group) fill a
//! [`ParamSlots`] by index and turn it into the ordered value the engine
//! consumes. Empty slots are skipped; order of the filled slots is kept.

use crate::error::{Error, Result};
use crate::types::{ParamAssignment, ParamBundle, ParamSet};

/// Field name that defers to a caller-supplied custom field name
pub const CUSTOM_FIELD: &str = "custom";

/// Number of parameter sets a bundle can hold
pub const BUNDLE_SLOTS: usize = 10;

/// Number of overrides a [`FieldSlot`] group can hold
pub const FIELD_SLOTS: usize = 4;

/// A fixed-size ordered collection of optional slots, addressed 1..=N
#[derive(Clone, Debug, PartialEq)]
pub struct ParamSlots<T, const N: usize> {
    slots: [Option<T>; N],
}

impl<T, const N: usize> Default for ParamSlots<T, N> {
    fn default() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
        }
    }
}

impl<T, const N: usize> ParamSlots<T, N> {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of slots
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Fill slot `index` (1-based), returning the previous value
    pub fn set(&mut self, index: usize, value: T) -> Result<Option<T>> {
        let slot = self.slot_mut(index)?;
        Ok(slot.replace(value))
    }

    /// Empty slot `index` (1-based)
    pub fn clear(&mut self, index: usize) -> Result<Option<T>> {
        let slot = self.slot_mut(index)?;
        Ok(slot.take())
    }

    /// Borrow slot `index` (1-based)
    pub fn get(&self, index: usize) -> Option<&T> {
        index
            .checked_sub(1)
            .and_then(|i| self.slots.get(i))
            .and_then(Option::as_ref)
    }

    /// Filled slots with their 1-based index, in slot order
    pub fn filled(&self) -> impl Iterator<Item = (usize, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|v| (i + 1, v)))
    }

    fn slot_mut(&mut self, index: usize) -> Result<&mut Option<T>> {
        let len = N;
        index
            .checked_sub(1)
            .and_then(|i| self.slots.get_mut(i))
            .ok_or(Error::IndexOutOfRange { index, len })
    }
}

impl<const N: usize> ParamSlots<ParamSet, N> {
    /// Collect the filled parameter sets into a bundle, one task per set
    pub fn into_bundle(self) -> ParamBundle {
        let bundle: ParamBundle = self.slots.into_iter().flatten().collect();
        if bundle.is_empty() {
            tracing::warn!("no parameter sets were provided");
        } else {
            tracing::debug!(sets = bundle.len(), "bundled parameter sets");
        }
        bundle
    }
}

/// Slots for building a [`ParamBundle`]
pub type BundleSlots = ParamSlots<ParamSet, BUNDLE_SLOTS>;

/// One node override whose field name may be indirected through [`CUSTOM_FIELD`]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldSlot {
    /// Node id inside the workflow
    pub node_id: String,
    /// Field name, or `custom` to use `custom_field_name`
    pub field_name: String,
    /// Value to assign
    pub field_value: String,
    /// Field name used when `field_name` is `custom`
    pub custom_field_name: String,
}

impl FieldSlot {
    /// Build a slot with a plain field name
    pub fn new(
        node_id: impl Into<String>,
        field_name: impl Into<String>,
        field_value: impl Into<String>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            field_name: field_name.into(),
            field_value: field_value.into(),
            custom_field_name: String::new(),
        }
    }

    /// Build a slot that targets a custom field name
    pub fn custom(
        node_id: impl Into<String>,
        custom_field_name: impl Into<String>,
        field_value: impl Into<String>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            field_name: CUSTOM_FIELD.to_string(),
            field_value: field_value.into(),
            custom_field_name: custom_field_name.into(),
        }
    }

    /// Field name after resolving the `custom` indirection
    ///
    /// A `custom` slot with a blank custom name keeps the literal `custom`.
    pub fn resolved_field_name(&self) -> &str {
        let custom = self.custom_field_name.trim();
        if self.field_name == CUSTOM_FIELD && !custom.is_empty() {
            custom
        } else {
            self.field_name.trim()
        }
    }

    /// Convert into an assignment, or `None` when node id or field name is missing
    pub fn to_assignment(&self) -> Option<ParamAssignment> {
        if self.node_id.trim().is_empty() || self.field_name.trim().is_empty() {
            return None;
        }
        if self.field_name == CUSTOM_FIELD && self.custom_field_name.trim().is_empty() {
            tracing::warn!(
                node_id = %self.node_id,
                "field name is 'custom' but no custom field name was given, using 'custom'"
            );
        }
        Some(ParamAssignment::new(
            self.node_id.as_str(),
            self.resolved_field_name(),
            self.field_value.as_str(),
        ))
    }

    fn is_blank(&self) -> bool {
        self.node_id.is_empty() && self.field_name.is_empty() && self.field_value.is_empty()
    }
}

/// Slots for building a multi-override [`ParamSet`]
pub type FieldSlots = ParamSlots<FieldSlot, FIELD_SLOTS>;

impl<const N: usize> ParamSlots<FieldSlot, N> {
    /// Append the complete slots to `previous`, skipping incomplete ones
    pub fn into_param_set(self, previous: Option<ParamSet>) -> ParamSet {
        let mut params = previous.unwrap_or_default();
        for (index, slot) in self.filled() {
            match slot.to_assignment() {
                Some(assignment) => {
                    tracing::debug!(
                        slot = index,
                        node_id = %assignment.node_id,
                        field = %assignment.field_name,
                        "added parameter"
                    );
                    params.push(assignment);
                }
                None if !slot.is_blank() => {
                    tracing::warn!(slot = index, "slot has incomplete data and will be skipped");
                }
                None => {}
            }
        }
        params
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_are_one_based() {
        let mut slots: ParamSlots<u8, 3> = ParamSlots::new();
        assert!(slots.set(0, 1).is_err());
        assert!(slots.set(4, 1).is_err());
        assert_eq!(slots.set(3, 7).unwrap(), None);
        assert_eq!(slots.get(3), Some(&7));
        assert_eq!(slots.capacity(), 3);
    }

    #[test]
    fn bundle_keeps_slot_order_and_skips_gaps() {
        let mut slots = BundleSlots::new();
        slots
            .set(7, vec![ParamAssignment::new("1", "seed", "7")])
            .unwrap();
        slots
            .set(2, vec![ParamAssignment::new("1", "seed", "2")])
            .unwrap();

        let bundle = slots.into_bundle();
        assert_eq!(bundle.len(), 2);
        assert_eq!(bundle[0][0].field_value, "2");
        assert_eq!(bundle[1][0].field_value, "7");
    }

    #[test]
    fn empty_bundle_is_empty() {
        assert!(BundleSlots::new().into_bundle().is_empty());
    }

    #[test]
    fn custom_field_indirection() {
        assert_eq!(
            FieldSlot::custom("5", " denoise_strength ", "0.4").resolved_field_name(),
            "denoise_strength"
        );
        assert_eq!(FieldSlot::custom("5", "", "0.4").resolved_field_name(), "custom");
        assert_eq!(FieldSlot::new("5", "seed", "1").resolved_field_name(), "seed");
    }

    #[test]
    fn field_slots_append_to_previous() {
        let previous = vec![ParamAssignment::new("1", "text", "a cat")];
        let mut slots = FieldSlots::new();
        slots.set(1, FieldSlot::new("3", "seed", "42")).unwrap();
        // incomplete: no node id
        slots.set(2, FieldSlot::new("", "steps", "20")).unwrap();
        slots.set(4, FieldSlot::custom("9", "lora_name", "x.safetensors")).unwrap();

        let set = slots.into_param_set(Some(previous));
        let fields: Vec<_> = set.iter().map(|p| p.field_name.as_str()).collect();
        assert_eq!(fields, vec!["text", "seed", "lora_name"]);
    }
}
