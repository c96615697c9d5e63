//! One tree fold over `ClauseList`, parameterised by an output language.
//!
//! SQL compilation and document-store view compilation both walk the clause
//! tree with [`render_clauses`]; they differ only in how a connective is
//! spelled and how a leaf comparison is written. Sharing the walk keeps
//! nesting and precedence identical across engines.

use crate::{
    error::InternalError,
    query::{ClauseList, ClauseNode, ComparePredicate, Connective, StatementBuffer},
};

///
/// PredicateRenderer
///

pub trait PredicateRenderer<'a> {
    /// Text joining a clause to its previous sibling, without padding.
    fn connective(&self, connective: Connective) -> &'static str;

    /// Write one leaf comparison. Renderers that bind parameters record
    /// `predicate.value` here, in the order leaves are visited.
    fn leaf(
        &mut self,
        out: &mut StatementBuffer,
        predicate: &'a ComparePredicate,
    ) -> Result<(), InternalError>;
}

/// Render `clauses` depth-first into `out`.
pub fn render_clauses<'a, R>(
    renderer: &mut R,
    clauses: &'a ClauseList,
    out: &mut StatementBuffer,
) -> Result<(), InternalError>
where
    R: PredicateRenderer<'a> + ?Sized,
{
    for (index, clause) in clauses.iter().enumerate() {
        if index > 0 {
            out.push(" ")?;
            out.push(renderer.connective(clause.connective()))?;
            out.push(" ")?;
        }

        match clause.node() {
            ClauseNode::Compare(predicate) => renderer.leaf(out, predicate)?,
            ClauseNode::Nested(children) => {
                out.push("(")?;
                render_clauses(renderer, children, out)?;
                out.push(")")?;
            }
        }
    }

    Ok(())
}
