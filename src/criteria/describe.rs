//! Indented text dump of a criteria tree, two spaces per level.

use super::Criterion;
use std::fmt::Write;

impl Criterion {
    /// Multi-line dump used by `--debug` and `pevfind tree`
    pub fn describe(&self) -> String {
        let mut out = String::new();
        self.describe_into(&mut out, 0);
        out
    }

    fn describe_into(&self, out: &mut String, depth: usize) {
        let pad = "  ".repeat(depth);
        match self {
            Criterion::Leaf(leaf) => {
                let _ = writeln!(out, "{pad}{leaf}");
            }
            Criterion::And(children) => describe_list(out, &pad, "AND", children, depth),
            Criterion::Or(children) => describe_list(out, &pad, "OR", children, depth),
            Criterion::Bracket(children) => describe_list(out, &pad, "BRACKET", children, depth),
            Criterion::Xor(a, b) => {
                let _ = writeln!(out, "{pad}XOR");
                a.describe_into(out, depth + 1);
                b.describe_into(out, depth + 1);
            }
            Criterion::Not(inner) => {
                let _ = writeln!(out, "{pad}NOT");
                inner.describe_into(out, depth + 1);
            }
            Criterion::IfThenElse {
                condition,
                then,
                otherwise,
            } => {
                let _ = writeln!(out, "{pad}IF");
                condition.describe_into(out, depth + 1);
                let _ = writeln!(out, "{pad}THEN");
                then.describe_into(out, depth + 1);
                if let Some(otherwise) = otherwise {
                    let _ = writeln!(out, "{pad}ELSE");
                    otherwise.describe_into(out, depth + 1);
                }
            }
        }
    }
}

fn describe_list(out: &mut String, pad: &str, label: &str, children: &[Criterion], depth: usize) {
    let _ = writeln!(out, "{pad}{label}");
    for child in children {
        child.describe_into(out, depth + 1);
    }
}
