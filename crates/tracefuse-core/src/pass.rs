//! Graph pass trait and stage definitions.

use crate::Result;
use crate::ir::Graph;

/// Compilation stage for organizing passes.
///
/// Passes are grouped into stages and run in a fixed order. Within each stage,
/// passes run in the order they were registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Structural checks on the freshly traced graph (earliest stage).
    ///
    /// Passes in this stage must not mutate the graph. They reject graphs the
    /// later stages cannot handle, such as cycles or operators with the wrong
    /// number of inputs.
    Validation,

    /// Graph rewriting (expression fusion and similar transforms).
    Fusion,
}

/// Trait for implementing graph passes.
///
/// A pass is a graph transformation that runs during a specific stage. Passes
/// are standalone objects so that one pass can reason across many operator
/// kinds.
///
/// # Return Value
///
/// The `run()` method returns `Ok(true)` if the pass made changes to the
/// graph, or `Ok(false)` if no changes were made.
///
/// # Example
///
/// ```ignore
/// struct CountOperatorsPass;
///
/// impl Pass for CountOperatorsPass {
///     fn name(&self) -> &str {
///         "count_operators"
///     }
///
///     fn stage(&self) -> Stage {
///         Stage::Validation
///     }
///
///     fn run(&self, graph: &mut Graph) -> Result<bool> {
///         tracing::info!(count = graph.operator_count(), "operators");
///         Ok(false)
///     }
/// }
/// ```
pub trait Pass: Send + Sync {
    /// Get the pass name (used for logging and debugging).
    fn name(&self) -> &str;

    /// Get the stage this pass belongs to.
    fn stage(&self) -> Stage;

    /// Run the pass on the given graph.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` if the pass made changes to the graph.
    /// * `Ok(false)` if no changes were made.
    /// * `Err(_)` if the pass encountered an error.
    fn run(&self, graph: &mut Graph) -> Result<bool>;
}
