// Scanner111 - core/fragment.rs
//
// Report fragments: the tree of text chunks that analyzers emit and the
// formatters render. Modelled as an algebraic sum type so the composition
// laws (Empty identity, associativity) hold structurally instead of by
// null-checking.

use crate::core::model::Severity;
use serde::{Deserialize, Serialize};

// =============================================================================
// Fragment kind
// =============================================================================

/// Visual/semantic role of a leaf fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FragmentKind {
    Header,
    Section,
    Info,
    Warning,
    Error,
    Critical,
    Success,
    Notice,
    Fix,
    Separator,
}

impl FragmentKind {
    /// Severity contributed by the kind itself.
    pub fn severity(&self) -> Severity {
        match self {
            FragmentKind::Critical => Severity::Critical,
            FragmentKind::Error => Severity::Error,
            FragmentKind::Warning => Severity::Warning,
            FragmentKind::Info | FragmentKind::Notice | FragmentKind::Fix => Severity::Info,
            FragmentKind::Header
            | FragmentKind::Section
            | FragmentKind::Success
            | FragmentKind::Separator => Severity::None,
        }
    }

    /// Stable lowercase name, used as the JSON `kind` value and the HTML
    /// class name.
    pub fn name(&self) -> &'static str {
        match self {
            FragmentKind::Header => "header",
            FragmentKind::Section => "section",
            FragmentKind::Info => "info",
            FragmentKind::Warning => "warning",
            FragmentKind::Error => "error",
            FragmentKind::Critical => "critical",
            FragmentKind::Success => "success",
            FragmentKind::Notice => "notice",
            FragmentKind::Fix => "fix",
            FragmentKind::Separator => "separator",
        }
    }
}

// =============================================================================
// Fragment tree
// =============================================================================

/// A node in the report tree.
///
/// `Empty` is the identity of composition: `f + Empty` is `f`, and
/// composing any number of empties yields `Empty`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "lowercase")]
pub enum ReportFragment {
    Empty,
    Leaf {
        kind: FragmentKind,
        title: Option<String>,
        /// Sort key between siblings; lower renders first, ties break on
        /// insertion order.
        order: i32,
        content: Option<String>,
    },
    Node {
        title: Option<String>,
        order: i32,
        children: Vec<ReportFragment>,
    },
}

impl ReportFragment {
    // -------------------------------------------------------------------------
    // Constructors
    // -------------------------------------------------------------------------

    pub fn leaf(kind: FragmentKind, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Leaf {
            kind,
            title: Some(title.into()),
            order: 0,
            content: Some(content.into()),
        }
    }

    /// Leaf with content only (no title line of its own).
    pub fn text(kind: FragmentKind, content: impl Into<String>) -> Self {
        Self::Leaf {
            kind,
            title: None,
            order: 0,
            content: Some(content.into()),
        }
    }

    pub fn info(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self::leaf(FragmentKind::Info, title, content)
    }

    pub fn warning(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self::leaf(FragmentKind::Warning, title, content)
    }

    pub fn error(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self::leaf(FragmentKind::Error, title, content)
    }

    pub fn critical(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self::leaf(FragmentKind::Critical, title, content)
    }

    pub fn success(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self::leaf(FragmentKind::Success, title, content)
    }

    pub fn separator() -> Self {
        Self::Leaf {
            kind: FragmentKind::Separator,
            title: None,
            order: 0,
            content: None,
        }
    }

    /// Titled section with the given children (empties dropped).
    pub fn section(title: impl Into<String>, children: Vec<ReportFragment>) -> Self {
        Self::Node {
            title: Some(title.into()),
            order: 0,
            children: children.into_iter().filter(|c| !c.is_empty()).collect(),
        }
    }

    /// Return the same fragment with an explicit sibling sort key.
    pub fn with_order(mut self, new_order: i32) -> Self {
        match &mut self {
            Self::Empty => {}
            Self::Leaf { order, .. } | Self::Node { order, .. } => *order = new_order,
        }
        self
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Structural emptiness: the Empty variant, or a Node whose children
    /// are all structurally empty. Leaves always count as present, so a
    /// bare separator survives composition.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Leaf { .. } => false,
            Self::Node { children, .. } => children.iter().all(ReportFragment::is_empty),
        }
    }

    /// True iff this fragment carries text: non-empty content, or any
    /// child with content. Headers over content-free bodies report false,
    /// which is what lets conditional sections collapse.
    pub fn has_content(&self) -> bool {
        match self {
            Self::Empty => false,
            Self::Leaf { content, .. } => {
                content.as_deref().is_some_and(|c| !c.trim().is_empty())
            }
            Self::Node { children, .. } => children.iter().any(ReportFragment::has_content),
        }
    }

    /// Max of the own kind's severity and every child's severity.
    pub fn severity(&self) -> Severity {
        match self {
            Self::Empty => Severity::None,
            Self::Leaf { kind, .. } => kind.severity(),
            Self::Node { children, .. } => children
                .iter()
                .map(ReportFragment::severity)
                .max()
                .unwrap_or(Severity::None),
        }
    }

    /// Sibling sort key.
    pub fn order(&self) -> i32 {
        match self {
            Self::Empty => 0,
            Self::Leaf { order, .. } | Self::Node { order, .. } => *order,
        }
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            Self::Empty => None,
            Self::Leaf { title, .. } | Self::Node { title, .. } => title.as_deref(),
        }
    }

    /// Children sorted by `(order, insertion index)`. Formatters call this
    /// at render time; the underlying vector keeps insertion order.
    pub fn sorted_children(&self) -> Vec<&ReportFragment> {
        match self {
            Self::Node { children, .. } => {
                let mut sorted: Vec<&ReportFragment> = children.iter().collect();
                // Stable sort: insertion order is the tiebreak.
                sorted.sort_by_key(|c| c.order());
                sorted
            }
            _ => Vec::new(),
        }
    }
}

// =============================================================================
// Composition
// =============================================================================

/// Compose fragments into one.
///
/// Structurally empty inputs are dropped, and untitled nodes are spliced
/// into their parent so composition is associative: `compose([a,
/// compose([b, c])])` and `compose([compose([a, b]), c])` produce the same
/// tree. Zero survivors yield `Empty`; a single survivor is returned as-is
/// (the identity law holds by construction).
pub fn compose(fragments: Vec<ReportFragment>) -> ReportFragment {
    // Untitled groups have no rendering of their own; splicing their
    // children (recursively) keeps the tree canonical, so equal trees
    // compare equal regardless of how they were grouped.
    fn splice(fragment: ReportFragment, into: &mut Vec<ReportFragment>) {
        if fragment.is_empty() {
            return;
        }
        match fragment {
            ReportFragment::Node {
                title: None,
                children,
                ..
            } => {
                for child in children {
                    splice(child, into);
                }
            }
            other => into.push(other),
        }
    }

    let mut flat: Vec<ReportFragment> = Vec::new();
    for fragment in fragments {
        splice(fragment, &mut flat);
    }

    match flat.len() {
        0 => ReportFragment::Empty,
        1 => flat.into_iter().next().expect("length checked"),
        _ => ReportFragment::Node {
            title: None,
            order: 0,
            children: flat,
        },
    }
}

impl std::ops::Add for ReportFragment {
    type Output = ReportFragment;

    fn add(self, rhs: ReportFragment) -> ReportFragment {
        compose(vec![self, rhs])
    }
}

/// Deferred section builder: the titled header materialises only if the
/// body produced content.
///
/// ```
/// use scanner111::core::fragment::{conditional_section, ReportFragment};
/// let empty = conditional_section("Suspects", 5, || ReportFragment::Empty);
/// assert!(empty.is_empty());
/// ```
pub fn conditional_section(
    title: &str,
    order: i32,
    body: impl FnOnce() -> ReportFragment,
) -> ReportFragment {
    let produced = body();
    if !produced.has_content() {
        return ReportFragment::Empty;
    }
    ReportFragment::section(title, vec![produced]).with_order(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(content: &str) -> ReportFragment {
        ReportFragment::text(FragmentKind::Info, content)
    }

    #[test]
    fn test_empty_is_identity_left_and_right() {
        let f = ReportFragment::warning("W", "watch out");
        assert_eq!(compose(vec![f.clone(), ReportFragment::Empty]), f);
        assert_eq!(compose(vec![ReportFragment::Empty, f.clone()]), f);
        assert_eq!(
            compose(vec![ReportFragment::Empty, ReportFragment::Empty]),
            ReportFragment::Empty
        );
    }

    #[test]
    fn test_compose_is_associative() {
        let (a, b, c) = (leaf("a"), leaf("b"), leaf("c"));
        let left = compose(vec![compose(vec![a.clone(), b.clone()]), c.clone()]);
        let right = compose(vec![a, compose(vec![b, c])]);
        assert_eq!(left, right);
    }

    #[test]
    fn test_compose_preserves_bare_separator() {
        // A separator has no content but is not structurally empty.
        let sep = ReportFragment::separator();
        assert_eq!(compose(vec![sep.clone(), ReportFragment::Empty]), sep);
    }

    #[test]
    fn test_titled_sections_are_not_spliced() {
        let section = ReportFragment::section("S", vec![leaf("x")]);
        let composed = compose(vec![section.clone(), leaf("y")]);
        match composed {
            ReportFragment::Node { children, .. } => {
                assert_eq!(children.len(), 2);
                assert_eq!(children[0], section);
            }
            other => panic!("expected Node, got {other:?}"),
        }
    }

    #[test]
    fn test_severity_is_max_over_tree() {
        let tree = ReportFragment::section(
            "root",
            vec![
                leaf("fine"),
                ReportFragment::section(
                    "inner",
                    vec![ReportFragment::critical("bad", "stack overflow")],
                ),
            ],
        );
        assert_eq!(tree.severity(), Severity::Critical);
    }

    #[test]
    fn test_has_content_ignores_blank_text() {
        assert!(!leaf("   ").has_content());
        assert!(leaf("real").has_content());
        let header_only = ReportFragment::section("title only", vec![]);
        assert!(!header_only.has_content());
    }

    #[test]
    fn test_conditional_section_collapses_without_content() {
        let collapsed = conditional_section("Suspects", 2, || {
            ReportFragment::section("inner", vec![])
        });
        assert_eq!(collapsed, ReportFragment::Empty);

        let kept = conditional_section("Suspects", 2, || leaf("one suspect"));
        assert_eq!(kept.title(), Some("Suspects"));
        assert!(kept.has_content());
        assert_eq!(kept.order(), 2);
    }

    #[test]
    fn test_sorted_children_orders_by_key_then_insertion() {
        let node = ReportFragment::Node {
            title: Some("root".to_string()),
            order: 0,
            children: vec![
                leaf("third").with_order(5),
                leaf("first").with_order(1),
                leaf("second").with_order(1),
            ],
        };
        let contents: Vec<_> = node
            .sorted_children()
            .iter()
            .map(|c| match c {
                ReportFragment::Leaf { content, .. } => content.clone().unwrap(),
                _ => unreachable!(),
            })
            .collect();
        // Equal keys keep insertion order (stable sort).
        assert_eq!(contents, vec!["first", "second", "third"]);
    }

    // -------------------------------------------------------------------------
    // Property tests: the algebra holds for arbitrary trees
    // -------------------------------------------------------------------------

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn arb_kind() -> impl Strategy<Value = FragmentKind> {
            prop_oneof![
                Just(FragmentKind::Info),
                Just(FragmentKind::Warning),
                Just(FragmentKind::Error),
                Just(FragmentKind::Critical),
                Just(FragmentKind::Success),
                Just(FragmentKind::Separator),
            ]
        }

        fn arb_fragment() -> impl Strategy<Value = ReportFragment> {
            let base = prop_oneof![
                Just(ReportFragment::Empty),
                (arb_kind(), "[a-z ]{0,12}", -5..5i32).prop_map(|(kind, content, order)| {
                    ReportFragment::Leaf {
                        kind,
                        title: None,
                        order,
                        content: if content.is_empty() { None } else { Some(content) },
                    }
                }),
            ];
            base.prop_recursive(3, 24, 4, |inner| {
                (proptest::option::of("[A-Z][a-z]{0,8}"), -5..5i32, prop::collection::vec(inner, 0..4))
                    .prop_map(|(title, order, children)| ReportFragment::Node {
                        title,
                        order,
                        children,
                    })
            })
        }

        proptest! {
            /// compose(f, Empty) and compose(Empty, f) equal compose([f]).
            #[test]
            fn prop_empty_identity(f in arb_fragment()) {
                let canonical = compose(vec![f.clone()]);
                prop_assert_eq!(compose(vec![f.clone(), ReportFragment::Empty]), canonical.clone());
                prop_assert_eq!(compose(vec![ReportFragment::Empty, f]), canonical);
            }

            /// Grouping does not matter.
            #[test]
            fn prop_associativity(a in arb_fragment(), b in arb_fragment(), c in arb_fragment()) {
                let left = compose(vec![compose(vec![a.clone(), b.clone()]), c.clone()]);
                let right = compose(vec![a, compose(vec![b, c])]);
                prop_assert_eq!(left, right);
            }

            /// Composition never invents or loses severity.
            #[test]
            fn prop_compose_severity_is_max(a in arb_fragment(), b in arb_fragment()) {
                let expected = a.severity().max(b.severity());
                prop_assert_eq!(compose(vec![a, b]).severity(), expected);
            }
        }
    }
}
