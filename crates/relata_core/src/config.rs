//! Transaction configuration.

use crate::collection::ChangeDetection;

/// Configuration for a transaction hierarchy.
///
/// A root transaction takes its configuration at creation; its
/// sub-transactions share it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// How root transactions decide whether a collection changed.
    ///
    /// Sub-transactions always compare order so their parent receives
    /// reordering.
    pub root_change_detection: ChangeDetection,

    /// Whether commit checks mandatory relations of new and changed objects.
    pub validate_mandatory_relations: bool,

    /// Maximum depth of nested sub-transactions below the root.
    pub max_nesting_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_change_detection: ChangeDetection::SetBased,
            validate_mandatory_relations: true,
            max_nesting_depth: 16,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the change detection used by root transactions.
    #[must_use]
    pub const fn root_change_detection(mut self, detection: ChangeDetection) -> Self {
        self.root_change_detection = detection;
        self
    }

    /// Sets whether commit validates mandatory relations.
    #[must_use]
    pub const fn validate_mandatory_relations(mut self, value: bool) -> Self {
        self.validate_mandatory_relations = value;
        self
    }

    /// Sets the maximum sub-transaction nesting depth.
    #[must_use]
    pub const fn max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = depth;
        self
    }
}
