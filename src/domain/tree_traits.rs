use generational_arena::Index;
use termtree::Tree;

use crate::domain::arena::TreeArena;
use crate::domain::model::TreeModel;
use crate::domain::provider::NodeFactory;

pub trait TreeNodeConvert {
    fn to_tree_string(&self) -> Tree<String>;
}

impl<F: NodeFactory> TreeNodeConvert for TreeModel<F> {
    /// One synthetic root labelled with the provider, roots as its leaves.
    fn to_tree_string(&self) -> Tree<String> {
        fn build_tree(arena: &TreeArena, node_idx: Index) -> Tree<String> {
            let label = arena
                .get(node_idx)
                .map(ToString::to_string)
                .unwrap_or_default();
            let leaves = arena
                .children(node_idx)
                .unwrap_or_default()
                .into_iter()
                .map(|child| build_tree(arena, child));
            Tree::new(label).with_leaves(leaves)
        }

        let roots = self.all().into_iter().map(|idx| build_tree(self.arena(), idx));
        let label = if self.is_empty() {
            "Empty structure".to_string()
        } else {
            format!("{} structure", self.factory().name())
        };
        Tree::new(label).with_leaves(roots)
    }
}
