//! Query shape: predicate clauses, joins and the shared predicate fold.

mod buffer;
mod clause;
mod join;
pub mod render;

#[cfg(test)]
mod tests;

// re-exports
pub use buffer::StatementBuffer;
pub use clause::{Clause, ClauseList, ClauseNode, CompareOp, ComparePredicate, Connective};
pub use join::{Join, JoinList};
pub use render::{PredicateRenderer, render_clauses};
