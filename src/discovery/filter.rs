use std::collections::BTreeSet;

use crate::types::CapabilityFilter;

/// True if `capabilities` satisfies any filter, or there are no filters
///
/// A filter is satisfied when every capability it names is present.
#[must_use]
pub fn compatible(capabilities: &BTreeSet<String>, filters: &[CapabilityFilter]) -> bool {
    filters.is_empty() || filters.iter().any(|f| f.matches(capabilities))
}
