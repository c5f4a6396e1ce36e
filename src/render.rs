//! ASCII rendering of the forest.

use crate::models::TreeView;

/// Render every tree, one after another.
///
/// Example output:
/// ```text
/// root (#1)
/// ├── docs (#2)
/// │   └── api (#4)
/// └── src (#3)
/// ```
pub fn render_forest(trees: &[TreeView]) -> String {
    let mut output = String::new();
    for tree in trees {
        output.push_str(&line(tree));
        output.push('\n');
        render_children(&mut output, tree);
    }
    output
}

/// Depth-first walk with an explicit stack, so deep chains do not recurse.
fn render_children(output: &mut String, root: &TreeView) {
    // (children still to print, prefix for that level)
    let mut stack: Vec<(std::slice::Iter<'_, TreeView>, String)> =
        vec![(root.children.iter(), String::new())];

    while let Some((siblings, prefix)) = stack.last_mut() {
        let Some(child) = siblings.next() else {
            stack.pop();
            continue;
        };
        let is_last = siblings.as_slice().is_empty();
        let branch = if is_last { "└── " } else { "├── " };
        output.push_str(prefix);
        output.push_str(branch);
        output.push_str(&line(child));
        output.push('\n');

        let continuation = if is_last { "    " } else { "│   " };
        let nested = format!("{}{}", prefix, continuation);
        stack.push((child.children.iter(), nested));
    }
}

fn line(node: &TreeView) -> String {
    format!("{} (#{})", node.label, node.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(id: u64, label: &str, children: Vec<TreeView>) -> TreeView {
        TreeView {
            id,
            label: label.to_string(),
            children,
        }
    }

    #[test]
    fn empty_forest_renders_nothing() {
        assert_eq!(render_forest(&[]), "");
    }

    #[test]
    fn single_root() {
        assert_eq!(render_forest(&[view(1, "root", vec![])]), "root (#1)\n");
    }

    #[test]
    fn nested_children() {
        let forest = vec![
            view(
                1,
                "root",
                vec![
                    view(2, "docs", vec![view(4, "api", vec![])]),
                    view(3, "src", vec![view(5, "main", vec![])]),
                ],
            ),
            view(6, "other", vec![]),
        ];
        let expected = "root (#1)\n├── docs (#2)\n│   └── api (#4)\n└── src (#3)\n    └── main (#5)\nother (#6)\n";
        assert_eq!(render_forest(&forest), expected);
    }

    #[test]
    fn deep_chain() {
        let mut tree = view(1_000, "leaf", vec![]);
        for id in (1..1_000).rev() {
            tree = view(id, "n", vec![tree]);
        }

        let output = render_forest(std::slice::from_ref(&tree));
        assert_eq!(output.lines().count(), 1_000);
        let last = output.lines().last().unwrap();
        assert_eq!(last, format!("{}└── leaf (#1000)", "    ".repeat(998)));
    }
}
