//! Criteria trees: boolean expressions over file metadata.
//!
//! A tree is built once by the parser, optionally rewritten by the
//! [`optimizer`] passes, then evaluated read-only for every file the
//! scanner visits. Besides [`Criterion::evaluate`] the tree answers a
//! second question, [`Criterion::directory_decision`], which lets the
//! scanner skip whole directories that cannot hold a match.
//!
//! ```
//! use pevfind::criteria::{AttributeTest, Criterion, Leaf};
//!
//! let hidden = Criterion::from(Leaf::Attribute(AttributeTest::Hidden));
//! let tree = Criterion::not(hidden);
//! assert_eq!(tree.describe(), "NOT\n  IsHidden\n");
//! ```

mod describe;
pub mod leaf;
pub mod optimizer;
pub mod pattern;

pub use leaf::{AttributeTest, DateComparison, DateField, Leaf, SizeComparison};
pub use pattern::{PathPattern, PathRegex, SkipDirectory};

use crate::metadata::FileMetadataView;
use std::path::{Path, PathBuf};

/// Relative price of evaluating a criterion, cheapest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CostClass {
    FastAttribute = 1,
    SlowAttribute = 2,
    PatternMatch = 3,
    PeHeaderData = 4,
    ContentSearch = 5,
    HashCheck = 6,
    SignatureCheck = 7,
}

/// Answer to "can this directory contain a match?"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryDecision {
    Include,
    Exclude,
    DontCare,
}

impl DirectoryDecision {
    /// Combine two operand decisions.
    ///
    /// DontCare yields to the other side; two definite answers are joined
    /// with AND (`and_like`) or OR.
    pub fn combine(self, other: Self, and_like: bool) -> Self {
        use DirectoryDecision::*;
        match (self, other) {
            (DontCare, DontCare) => DontCare,
            (DontCare, decided) | (decided, DontCare) => decided,
            (a, b) => {
                let (a, b) = (a == Include, b == Include);
                let include = if and_like { a && b } else { a || b };
                if include { Include } else { Exclude }
            }
        }
    }

    /// Decision for the negation of a criterion.
    ///
    /// Include only says the directory may hold a match, so its negation
    /// says nothing. Exclude means every file below fails the operand,
    /// hence satisfies the negation.
    pub fn negate(self) -> Self {
        match self {
            DirectoryDecision::Include => DirectoryDecision::DontCare,
            DirectoryDecision::Exclude => DirectoryDecision::Include,
            DirectoryDecision::DontCare => DirectoryDecision::DontCare,
        }
    }
}

/// A node of a criteria tree
#[derive(Debug, Clone)]
pub enum Criterion {
    Leaf(Leaf),
    /// All children true; built pairwise from `AND`
    And(Vec<Criterion>),
    /// Any child true; built pairwise from `OR`
    Or(Vec<Criterion>),
    /// Exactly one side true
    Xor(Box<Criterion>, Box<Criterion>),
    Not(Box<Criterion>),
    /// Implicit AND of consecutive atoms
    Bracket(Vec<Criterion>),
    /// Without `otherwise`, a false condition makes the node true
    IfThenElse {
        condition: Box<Criterion>,
        then: Box<Criterion>,
        otherwise: Option<Box<Criterion>>,
    },
}

impl From<Leaf> for Criterion {
    fn from(leaf: Leaf) -> Self {
        Criterion::Leaf(leaf)
    }
}

impl Criterion {
    pub fn and(left: Criterion, right: Criterion) -> Self {
        Criterion::And(vec![left, right])
    }

    pub fn or(left: Criterion, right: Criterion) -> Self {
        Criterion::Or(vec![left, right])
    }

    pub fn xor(left: Criterion, right: Criterion) -> Self {
        Criterion::Xor(Box::new(left), Box::new(right))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(inner: Criterion) -> Self {
        Criterion::Not(Box::new(inner))
    }

    /// Group atoms; a single atom is returned unchanged
    pub fn bracket(mut children: Vec<Criterion>) -> Self {
        if children.len() == 1
            && let Some(only) = children.pop()
        {
            return only;
        }
        Criterion::Bracket(children)
    }

    pub fn if_then_else(
        condition: Criterion,
        then: Criterion,
        otherwise: Option<Criterion>,
    ) -> Self {
        Criterion::IfThenElse {
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise: otherwise.map(Box::new),
        }
    }

    /// Evaluate against one file. Never fails: missing metadata makes the
    /// affected leaf false.
    pub fn evaluate(&self, file: &dyn FileMetadataView) -> bool {
        match self {
            Criterion::Leaf(leaf) => leaf.evaluate(file),
            Criterion::And(children) | Criterion::Bracket(children) => {
                children.iter().all(|c| c.evaluate(file))
            }
            Criterion::Or(children) => children.iter().any(|c| c.evaluate(file)),
            Criterion::Xor(a, b) => a.evaluate(file) != b.evaluate(file),
            Criterion::Not(inner) => !inner.evaluate(file),
            Criterion::IfThenElse {
                condition,
                then,
                otherwise,
            } => {
                if condition.evaluate(file) {
                    then.evaluate(file)
                } else {
                    otherwise.as_ref().map(|o| o.evaluate(file)).unwrap_or(true)
                }
            }
        }
    }

    /// A composite costs as much as its most expensive child
    pub fn cost_class(&self) -> CostClass {
        match self {
            Criterion::Leaf(leaf) => leaf.cost_class(),
            Criterion::And(children) | Criterion::Or(children) | Criterion::Bracket(children) => {
                children
                    .iter()
                    .map(Criterion::cost_class)
                    .max()
                    .unwrap_or(CostClass::FastAttribute)
            }
            Criterion::Xor(a, b) => a.cost_class().max(b.cost_class()),
            Criterion::Not(inner) => inner.cost_class(),
            Criterion::IfThenElse {
                condition,
                then,
                otherwise,
            } => {
                let mut cost = condition.cost_class().max(then.cost_class());
                if let Some(o) = otherwise {
                    cost = cost.max(o.cost_class());
                }
                cost
            }
        }
    }

    /// Whether the scanner should descend into `dir`.
    ///
    /// Only rooted patterns and skip rules give definite answers; every
    /// other leaf is DontCare.
    pub fn directory_decision(&self, dir: &Path) -> DirectoryDecision {
        match self {
            Criterion::Leaf(leaf) => leaf.directory_decision(dir),
            Criterion::And(children) | Criterion::Bracket(children) => {
                fold_decisions(children, dir, true)
            }
            Criterion::Or(children) => fold_decisions(children, dir, false),
            Criterion::Xor(a, b) => a
                .directory_decision(dir)
                .combine(b.directory_decision(dir), false),
            Criterion::Not(inner) => inner.directory_decision(dir).negate(),
            Criterion::IfThenElse {
                condition,
                then,
                otherwise,
            } => {
                let otherwise = otherwise
                    .as_ref()
                    .map(|o| o.directory_decision(dir))
                    .unwrap_or(DirectoryDecision::Include);
                match condition.directory_decision(dir) {
                    DirectoryDecision::Exclude => otherwise,
                    _ => then.directory_decision(dir).combine(otherwise, false),
                }
            }
        }
    }

    /// Pattern roots every match lies under, empty when the tree does not
    /// confine matches to anchored patterns
    pub fn pattern_roots(&self) -> Vec<PathBuf> {
        self.anchored_roots().unwrap_or_default()
    }

    /// An AND is bounded by any one bounded operand, an OR only when
    /// every operand is bounded.
    fn anchored_roots(&self) -> Option<Vec<PathBuf>> {
        match self {
            Criterion::Leaf(Leaf::Pattern(p)) => p.root_dir().map(|r| vec![r.to_path_buf()]),
            Criterion::And(children) | Criterion::Bracket(children) => {
                children.iter().find_map(Criterion::anchored_roots)
            }
            Criterion::Or(children) => {
                let mut roots = Vec::new();
                for c in children {
                    roots.extend(c.anchored_roots()?);
                }
                Some(roots)
            }
            _ => None,
        }
    }
}

fn fold_decisions(children: &[Criterion], dir: &Path, and_like: bool) -> DirectoryDecision {
    children
        .iter()
        .map(|c| c.directory_decision(dir))
        .fold(DirectoryDecision::DontCare, |acc, d| acc.combine(d, and_like))
}

/// Parsed criteria tree ready for scanning.
///
/// The host calls [`CriterionTree::reorder_tree`] and then, when recursion
/// is disabled, [`CriterionTree::make_non_recursive`], once each, before
/// the first evaluation.
#[derive(Debug, Clone)]
pub struct CriterionTree {
    root: Criterion,
}

impl CriterionTree {
    pub fn new(root: Criterion) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Criterion {
        &self.root
    }

    pub fn evaluate(&self, file: &dyn FileMetadataView) -> bool {
        self.root.evaluate(file)
    }

    pub fn directory_decision(&self, dir: &Path) -> DirectoryDecision {
        self.root.directory_decision(dir)
    }

    pub fn cost_class(&self) -> CostClass {
        self.root.cost_class()
    }

    pub fn describe(&self) -> String {
        self.root.describe()
    }

    pub fn reorder_tree(&mut self) {
        optimizer::reorder(&mut self.root);
    }

    pub fn make_non_recursive(&mut self) {
        optimizer::make_non_recursive(&mut self.root);
    }

    pub fn pattern_roots(&self) -> Vec<PathBuf> {
        self.root.pattern_roots()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory [`FileMetadataView`] with call counters.

    use crate::metadata::digest::digest_bytes;
    use crate::metadata::{FileAttributes, FileMetadataView, HashKind, PeInfo};
    use chrono::{DateTime, Utc};
    use std::cell::{Cell, OnceCell};
    use std::path::{Path, PathBuf};

    #[derive(Default)]
    pub struct MockFile {
        pub path: PathBuf,
        pub size: u64,
        pub modified: Option<DateTime<Utc>>,
        pub attributes: FileAttributes,
        pub contents: Option<Vec<u8>>,
        pe: OnceCell<Option<PeInfo>>,
        hashes: [OnceCell<Option<Vec<u8>>>; 6],
        pub hash_computations: Cell<usize>,
        pub pe_parses: Cell<usize>,
    }

    impl MockFile {
        pub fn new(path: &str) -> Self {
            Self {
                path: PathBuf::from(path),
                ..Self::default()
            }
        }

        pub fn with_size(mut self, size: u64) -> Self {
            self.size = size;
            self
        }

        pub fn with_attributes(mut self, bits: u32) -> Self {
            self.attributes = FileAttributes(bits);
            self
        }

        pub fn with_modified(mut self, at: DateTime<Utc>) -> Self {
            self.modified = Some(at);
            self
        }

        pub fn with_contents(mut self, bytes: &[u8]) -> Self {
            self.size = bytes.len() as u64;
            self.contents = Some(bytes.to_vec());
            self
        }
    }

    impl FileMetadataView for MockFile {
        fn path(&self) -> &Path {
            &self.path
        }

        fn size(&self) -> u64 {
            self.size
        }

        fn created(&self) -> Option<DateTime<Utc>> {
            None
        }

        fn modified(&self) -> Option<DateTime<Utc>> {
            self.modified
        }

        fn accessed(&self) -> Option<DateTime<Utc>> {
            None
        }

        fn attributes(&self) -> FileAttributes {
            self.attributes
        }

        fn contents(&self) -> Option<&[u8]> {
            self.contents.as_deref()
        }

        fn pe_info(&self) -> Option<&PeInfo> {
            self.pe
                .get_or_init(|| {
                    self.pe_parses.set(self.pe_parses.get() + 1);
                    self.contents().and_then(PeInfo::parse)
                })
                .as_ref()
        }

        fn pe_checksum_valid(&self) -> bool {
            match (self.pe_info(), self.contents()) {
                (Some(info), Some(data)) => info.checksum_matches(data),
                _ => false,
            }
        }

        fn hash(&self, kind: HashKind) -> Option<&[u8]> {
            self.hashes[kind.index()]
                .get_or_init(|| {
                    self.hash_computations.set(self.hash_computations.get() + 1);
                    self.contents().map(|data| digest_bytes(kind, data))
                })
                .as_deref()
        }

        fn signature_valid(&self) -> bool {
            false
        }

        fn sfc_protected(&self) -> bool {
            false
        }
    }
}
