//! Tree rewrites applied once after parsing.
//!
//! [`reorder`] moves cheap operands of commutative nodes to the front so
//! short-circuit evaluation rejects most files before any expensive
//! metadata is touched. [`make_non_recursive`] switches off the path
//! pruning of every pattern leaf.

use super::Criterion;

/// Sort operands of And/Or/Bracket by cost (stable), swap Xor operands
/// when the left one is dearer. Not and IfThenElse keep their order.
pub fn reorder(node: &mut Criterion) {
    match node {
        Criterion::Leaf(_) => {}
        Criterion::And(children) | Criterion::Or(children) | Criterion::Bracket(children) => {
            for child in children.iter_mut() {
                reorder(child);
            }
            children.sort_by_key(Criterion::cost_class);
        }
        Criterion::Xor(a, b) => {
            reorder(a);
            reorder(b);
            if a.cost_class() > b.cost_class() {
                std::mem::swap(a, b);
            }
        }
        Criterion::Not(inner) => reorder(inner),
        Criterion::IfThenElse {
            condition,
            then,
            otherwise,
        } => {
            reorder(condition);
            reorder(then);
            if let Some(otherwise) = otherwise {
                reorder(otherwise);
            }
        }
    }
}

pub fn make_non_recursive(node: &mut Criterion) {
    match node {
        Criterion::Leaf(leaf) => leaf.make_non_recursive(),
        Criterion::And(children) | Criterion::Or(children) | Criterion::Bracket(children) => {
            children.iter_mut().for_each(make_non_recursive);
        }
        Criterion::Xor(a, b) => {
            make_non_recursive(a);
            make_non_recursive(b);
        }
        Criterion::Not(inner) => make_non_recursive(inner),
        Criterion::IfThenElse {
            condition,
            then,
            otherwise,
        } => {
            make_non_recursive(condition);
            make_non_recursive(then);
            if let Some(otherwise) = otherwise {
                make_non_recursive(otherwise);
            }
        }
    }
}
