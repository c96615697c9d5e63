use crate::{
    error::{ErrorOrigin, InternalError},
    value::Value,
};
use derive_more::{Deref, IntoIterator};

///
/// Connective
/// Boolean operator joining a clause to its previous sibling.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Connective {
    #[default]
    And,
    Or,
}

///
/// CompareOp
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Ge,
    Gt,
    IsNull,
    IsNotNull,
}

impl CompareOp {
    /// False for the null tests, which carry no operand.
    #[must_use]
    pub const fn takes_value(self) -> bool {
        !matches!(self, Self::IsNull | Self::IsNotNull)
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Lt => "lt",
            Self::Le => "le",
            Self::Ge => "ge",
            Self::Gt => "gt",
            Self::IsNull => "is_null",
            Self::IsNotNull => "is_not_null",
        }
    }
}

///
/// ComparePredicate
/// Leaf predicate: `table.field <op> value`.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ComparePredicate {
    pub table: String,
    pub field: String,
    pub op: CompareOp,
    pub value: Value,
}

///
/// ClauseNode
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ClauseNode {
    Compare(ComparePredicate),
    Nested(ClauseList),
}

///
/// Clause
///
/// One predicate node plus the connective to its previous sibling.
/// The connective of the first clause in a list is never rendered.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Clause {
    connective: Connective,
    node: ClauseNode,
}

impl Clause {
    /// Build a leaf comparison. Non-null comparators need a non-empty value;
    /// null tests discard any value given.
    pub fn compare(
        table: impl Into<String>,
        field: impl Into<String>,
        op: CompareOp,
        value: Value,
    ) -> Result<Self, InternalError> {
        let table = table.into();
        let field = field.into();

        if table.is_empty() || field.is_empty() {
            return Err(InternalError::invariant(
                ErrorOrigin::Query,
                "comparison clause needs a table and a field",
            ));
        }
        if op.takes_value() && value.is_empty() {
            return Err(InternalError::invariant(
                ErrorOrigin::Query,
                format!("{table}.{field} {} needs a non-empty value", op.label()),
            ));
        }
        let value = if op.takes_value() { value } else { Value::new() };

        Ok(Self {
            connective: Connective::And,
            node: ClauseNode::Compare(ComparePredicate {
                table,
                field,
                op,
                value,
            }),
        })
    }

    pub fn equal(
        table: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Self, InternalError> {
        Self::compare(table, field, CompareOp::Eq, value.into())
    }

    pub fn is_null(table: impl Into<String>, field: impl Into<String>) -> Result<Self, InternalError> {
        Self::compare(table, field, CompareOp::IsNull, Value::new())
    }

    pub fn is_not_null(
        table: impl Into<String>,
        field: impl Into<String>,
    ) -> Result<Self, InternalError> {
        Self::compare(table, field, CompareOp::IsNotNull, Value::new())
    }

    /// Group a child list. The child list must not be empty.
    pub fn nested(children: ClauseList) -> Result<Self, InternalError> {
        if children.is_empty() {
            return Err(InternalError::invariant(
                ErrorOrigin::Query,
                "nested clause needs at least one child",
            ));
        }

        Ok(Self {
            connective: Connective::And,
            node: ClauseNode::Nested(children),
        })
    }

    /// Join this clause to its previous sibling with OR.
    #[must_use]
    pub const fn or(mut self) -> Self {
        self.connective = Connective::Or;
        self
    }

    #[must_use]
    pub const fn with_connective(mut self, connective: Connective) -> Self {
        self.connective = connective;
        self
    }

    #[must_use]
    pub const fn connective(&self) -> Connective {
        self.connective
    }

    #[must_use]
    pub const fn node(&self) -> &ClauseNode {
        &self.node
    }

    #[must_use]
    pub const fn as_compare(&self) -> Option<&ComparePredicate> {
        match &self.node {
            ClauseNode::Compare(compare) => Some(compare),
            ClauseNode::Nested(_) => None,
        }
    }
}

///
/// ClauseList
///
/// Ordered sibling clauses; insertion order is evaluation order.
///

#[derive(Clone, Debug, Default, Deref, Eq, IntoIterator, PartialEq)]
#[deref(forward)]
#[into_iterator(owned, ref)]
pub struct ClauseList {
    clauses: Vec<Clause>,
}

impl ClauseList {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            clauses: Vec::new(),
        }
    }

    /// Append a clause; the list takes ownership.
    pub fn push(&mut self, clause: Clause) {
        self.clauses.push(clause);
    }

    /// Append `clause` joined with AND.
    #[must_use]
    pub fn and(mut self, clause: Clause) -> Self {
        self.push(clause.with_connective(Connective::And));
        self
    }

    /// Append `clause` joined with OR.
    #[must_use]
    pub fn or(mut self, clause: Clause) -> Self {
        self.push(clause.with_connective(Connective::Or));
        self
    }

    /// Leaf predicates in depth-first order.
    #[must_use]
    pub fn leaves(&self) -> Vec<&ComparePredicate> {
        let mut out = Vec::new();
        collect_leaves(self, &mut out);
        out
    }

    /// Number of leaves that carry a bound operand.
    #[must_use]
    pub fn parameter_count(&self) -> usize {
        self.leaves()
            .iter()
            .filter(|leaf| leaf.op.takes_value())
            .count()
    }
}

fn collect_leaves<'a>(list: &'a ClauseList, out: &mut Vec<&'a ComparePredicate>) {
    for clause in list {
        match clause.node() {
            ClauseNode::Compare(compare) => out.push(compare),
            ClauseNode::Nested(children) => collect_leaves(children, out),
        }
    }
}
