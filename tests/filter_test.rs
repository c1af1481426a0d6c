//! Tests for tag-driven pruning

use std::collections::BTreeSet;

use rstest::rstest;

use mindtab::domain::{
    plan_all, ExtractMode, Forest, GroupTree, Node, PathExtractor, RootTagPolicy, Sheet, TagFilter,
    TagId,
};
use mindtab::util::testing;

fn select(tags: &[&str], policy: RootTagPolicy) -> TagFilter {
    TagFilter::new(tags.iter().map(|t| TagId::from(*t)), policy).unwrap()
}

fn suite(login_children_tagged: bool) -> Forest {
    let user_pass = if login_children_tagged {
        Node::new("UserPass").with_tag("priority-1")
    } else {
        Node::new("UserPass")
    };
    Forest::new(vec![Sheet::new(
        "Smoke",
        Node::new("Suite")
            .with_child(
                Node::new("Login")
                    .with_tag("priority-1")
                    .with_child(user_pass)
                    .with_child(Node::new("Captcha")),
            )
            .with_child(
                Node::new("Register")
                    .with_child(Node::new("EmailReg").with_tag("priority-2"))
                    .with_child(Node::new("PhoneReg")),
            ),
    )])
}

fn titles(forest: &Forest) -> Vec<(String, usize)> {
    forest
        .iter_nodes()
        .map(|(n, depth)| (n.title.clone(), depth))
        .collect()
}

#[test]
fn given_suite_when_selecting_p1_p2_then_keeps_context_and_drops_untagged_leaves() {
    testing::init_test_setup();
    let forest = suite(false);

    let (pruned, report) = select(&["priority-1", "priority-2"], RootTagPolicy::DropSheet).apply(&forest);

    assert_eq!(
        titles(&pruned),
        vec![
            ("Suite".to_string(), 1),
            ("Login".to_string(), 2),
            ("Register".to_string(), 2),
            ("EmailReg".to_string(), 3),
        ]
    );
    assert_eq!(report.sheets_processed, 1);
    assert_eq!(report.sheets_removed, 0);
    assert_eq!(report.nodes_removed, 3);
}

#[test]
fn given_suite_with_tagged_login_child_when_filtering_then_keeps_that_child_only() {
    let forest = suite(true);

    let (pruned, _) = select(&["priority-1", "priority-2"], RootTagPolicy::DropSheet).apply(&forest);

    let login = &pruned.sheets[0].root.children[0];
    assert_eq!(login.title, "Login");
    let kept: Vec<&str> = login.children.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(kept, vec!["UserPass"]);
}

#[rstest]
#[case(RootTagPolicy::DropSheet, 0)]
#[case(RootTagPolicy::Retain, 1)]
fn given_tagged_root_when_filtering_then_policy_decides_sheet_fate(
    #[case] policy: RootTagPolicy,
    #[case] expected_sheets: usize,
) {
    let forest = Forest::new(vec![Sheet::new(
        "s",
        Node::new("Root")
            .with_tag("priority-1")
            .with_child(Node::new("child")),
    )]);

    let (pruned, report) = select(&["priority-1"], policy).apply(&forest);

    assert_eq!(pruned.sheets.len(), expected_sheets);
    assert_eq!(report.sheets_removed, 1 - expected_sheets);
    if expected_sheets == 1 {
        // the tagged root itself survives, its untagged leaf does not
        assert!(pruned.sheets[0].root.children.is_empty());
    }
}

#[test]
fn given_retained_tagged_root_without_tagged_descendants_when_filtering_then_root_survives_alone() {
    // Arrange
    let forest = Forest::new(vec![Sheet::new(
        "Release",
        Node::new("Release")
            .with_tag("priority-1")
            .with_child(Node::new("Notes").with_child(Node::new("Draft").with_tag("star-red")))
            .with_child(Node::new("Checklist"))
            .with_child(Node::new("Owners").with_tag("flag-yellow")),
    )]);

    // Act
    let (pruned, report) = select(&["priority-1"], RootTagPolicy::Retain).apply(&forest);
    let records = PathExtractor::new(ExtractMode::EveryNode).extract(&pruned);
    let groups = GroupTree::build(records);

    // Assert
    assert_eq!(titles(&pruned), vec![("Release".to_string(), 1)]);
    assert!(pruned.sheets[0].root.is_leaf());
    assert_eq!(report.sheets_removed, 0);
    assert_eq!(report.nodes_removed, 4);
    assert_eq!(groups.total_rows(), 1);
    assert!(plan_all(&groups, 2).unwrap().is_empty());
}

#[test]
fn given_no_matching_tag_when_filtering_then_forest_is_empty() {
    let (pruned, report) = select(&["star-red"], RootTagPolicy::DropSheet).apply(&suite(false));

    assert!(pruned.is_empty());
    assert_eq!(report.sheets_removed, 1);
    assert_eq!(report.nodes_removed, 7);
}

#[test]
fn given_empty_root_when_filtering_then_sheet_is_dropped_without_error() {
    let forest = Forest::new(vec![Sheet::new("blank", Node::new(""))]);

    let (pruned, _) = select(&["priority-1"], RootTagPolicy::DropSheet).apply(&forest);

    assert!(pruned.is_empty());
}

#[test]
fn given_pruned_forest_when_filtering_again_then_result_is_unchanged() {
    let filter = select(&["priority-1", "priority-2"], RootTagPolicy::DropSheet);
    let (once, _) = filter.apply(&suite(true));

    let (twice, report) = filter.apply(&once);

    assert_eq!(twice, once);
    assert_eq!(report.nodes_removed, 0);
}

#[test]
fn given_source_forest_when_filtering_then_source_is_untouched() {
    let forest = suite(false);
    let before = forest.clone();

    let _ = select(&["priority-2"], RootTagPolicy::DropSheet).apply(&forest);

    assert_eq!(forest, before);
}

// ============================================================
// Generated trees
// ============================================================

/// Small deterministic generator so the cases are reproducible.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self, bound: u64) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.0 >> 33) % bound
    }
}

fn random_tree(rng: &mut Lcg, counter: &mut usize, depth: usize) -> Node {
    *counter += 1;
    let mut node = Node::new(format!("n{}", counter));
    match rng.next(6) {
        0 => node = node.with_tag("priority-1"),
        1 => node = node.with_tag("flag-red"),
        _ => {}
    }
    if depth < 6 {
        for _ in 0..rng.next(4) {
            let child = random_tree(rng, counter, depth + 1);
            node = node.with_child(child);
        }
    }
    node
}

fn check_survivors(node: &Node, selected: &BTreeSet<TagId>) {
    assert!(
        node.has_any_tag(selected) || !node.children.is_empty(),
        "{} survived without a selected tag or surviving child",
        node.title
    );
    for child in &node.children {
        check_survivors(child, selected);
    }
}

#[test]
fn given_generated_forests_when_filtering_then_pruning_invariants_hold() {
    let filter = select(&["priority-1"], RootTagPolicy::DropSheet);
    let mut rng = Lcg(7);

    for _ in 0..50 {
        let mut counter = 0;
        let mut root = random_tree(&mut rng, &mut counter, 1);
        root.tags.clear();
        let forest = Forest::new(vec![Sheet::new("g", root)]);

        let (pruned, report) = filter.apply(&forest);

        let tagged = |f: &Forest| {
            f.iter_nodes()
                .filter(|(n, _)| n.has_any_tag(filter.selected()))
                .map(|(n, _)| n.title.clone())
                .collect::<Vec<_>>()
        };
        // every tagged node survives, in document order
        assert_eq!(tagged(&pruned), tagged(&forest));
        for sheet in &pruned.sheets {
            check_survivors(&sheet.root, filter.selected());
        }
        // survivors keep their relative order
        let source: Vec<String> = forest.iter_nodes().map(|(n, _)| n.title.clone()).collect();
        let mut pos = source.iter();
        for (node, _) in pruned.iter_nodes() {
            assert!(pos.any(|t| *t == node.title), "order changed at {}", node.title);
        }
        assert_eq!(report.nodes_removed, forest.node_count() - pruned.node_count());
    }
}
