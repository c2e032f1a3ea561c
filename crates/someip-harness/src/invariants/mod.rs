//! Invariant checking for simulated-node testing.
//!
//! Invariants capture properties that must hold across every reachable
//! state of a [`SimNode`](crate::SimNode), independent of how it got there,
//! rather than asserting on one specific scenario's outcome.

mod checks;

pub use checks::{DiscoveredServicesAreKnownToHost, DiscoveredServicesHaveEndpoint};

pub use crate::node::Snapshot as NodeSnapshot;

/// Invariant check result.
pub type InvariantResult = Result<(), Violation>;

/// An invariant violation, with the name of the invariant that failed.
#[derive(Debug, Clone)]
pub struct Violation {
    /// Name of the violated invariant.
    pub invariant: &'static str,
    /// Description of what went wrong.
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// An invariant that can be checked against a node snapshot.
pub trait Invariant: Send + Sync {
    /// Invariant name, used in violation messages.
    fn name(&self) -> &'static str;

    /// Check the invariant against `snapshot`.
    fn check(&self, snapshot: &NodeSnapshot) -> InvariantResult;
}

/// A collection of invariants checked together after each simulated step.
#[derive(Default)]
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl InvariantRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { invariants: Vec::new() }
    }

    /// The invariants every simulated node is expected to uphold.
    #[must_use]
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(DiscoveredServicesHaveEndpoint);
        registry.add(DiscoveredServicesAreKnownToHost);
        registry
    }

    /// Register one more invariant.
    pub fn add(&mut self, invariant: impl Invariant + 'static) -> &mut Self {
        self.invariants.push(Box::new(invariant));
        self
    }

    /// Check every registered invariant, collecting every violation rather
    /// than stopping at the first.
    #[must_use]
    pub fn check_all(&self, snapshot: &NodeSnapshot) -> Vec<Violation> {
        self.invariants.iter().filter_map(|invariant| invariant.check(snapshot).err()).collect()
    }

    /// Check every registered invariant, panicking with `context` if any
    /// fails.
    ///
    /// # Panics
    ///
    /// Panics if any registered invariant reports a violation.
    pub fn assert_all(&self, snapshot: &NodeSnapshot, context: &str) {
        let violations = self.check_all(snapshot);
        assert!(violations.is_empty(), "invariant violation(s) {context}: {violations:?}");
    }
}
