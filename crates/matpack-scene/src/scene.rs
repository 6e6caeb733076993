//! Scene hierarchy: nodes, renderers, and subtree cloning.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::ids::{MaterialId, MeshId, NodeId};

/// Binds a mesh to a list of material slots. Slot `i` renders submesh `i`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Renderer {
    /// Rendered mesh.
    pub mesh: Option<MeshId>,
    /// Material slots.
    pub materials: Vec<Option<MaterialId>>,
}

/// One node in the scene hierarchy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Node identity.
    pub id: NodeId,
    /// Display name.
    pub name: String,
    /// Parent node, `None` for roots.
    pub parent: Option<NodeId>,
    /// Children in order.
    pub children: Vec<NodeId>,
    /// Renderer, if this node is a surface.
    pub renderer: Option<Renderer>,
}

/// A scene: a forest of nodes addressed by [`NodeId`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    nodes: BTreeMap<NodeId, Node>,
    next_id: u64,
}

impl Scene {
    /// Creates an empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node under `parent` (or as a root) and returns its id.
    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        parent: Option<NodeId>,
        renderer: Option<Renderer>,
    ) -> NodeId {
        self.next_id += 1;
        let id = NodeId(self.next_id);
        self.nodes.insert(
            id,
            Node {
                id,
                name: name.into(),
                parent,
                children: Vec::new(),
                renderer,
            },
        );
        if let Some(parent) = parent
            && let Some(p) = self.nodes.get_mut(&parent)
        {
            p.children.push(id);
        }
        id
    }

    /// Returns the node with this id.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Returns the node with this id, mutably.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    /// Returns `true` if the node exists.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Iterates root nodes in id order.
    pub fn roots(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values().filter(|n| n.parent.is_none())
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the scene has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Removes a node and its subtree.
    pub fn remove_subtree(&mut self, root: NodeId) {
        let doomed = self.descendants(root);
        if let Some(parent) = self.nodes.get(&root).and_then(|n| n.parent)
            && let Some(p) = self.nodes.get_mut(&parent)
        {
            p.children.retain(|c| *c != root);
        }
        for id in doomed {
            self.nodes.remove(&id);
        }
    }

    /// Returns `root` and all its descendants in pre-order.
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            out.push(id);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    /// Returns every node carrying a renderer under `root`, or in the whole
    /// scene when `root` is `None`. Order is pre-order per root.
    pub fn surfaces_under(&self, root: Option<NodeId>) -> Vec<NodeId> {
        let roots: Vec<NodeId> = match root {
            Some(r) => vec![r],
            None => self.roots().map(|n| n.id).collect(),
        };
        roots
            .into_iter()
            .flat_map(|r| self.descendants(r))
            .filter(|id| self.nodes.get(id).is_some_and(|n| n.renderer.is_some()))
            .collect()
    }

    /// Deep-copies the subtree at `root` as a sibling of `root`.
    ///
    /// Cloned nodes get fresh ids; renderers keep referencing the same assets.
    /// Returns the id of the cloned root, or `None` if `root` does not exist.
    pub fn clone_subtree(&mut self, root: NodeId, suffix: &str) -> Option<NodeId> {
        let source = self.nodes.get(&root)?.clone();
        let clone_root = self.add_node(
            format!("{}{}", source.name, suffix),
            source.parent,
            source.renderer.clone(),
        );
        let mut pending: VecDeque<(NodeId, NodeId)> = source
            .children
            .iter()
            .map(|child| (*child, clone_root))
            .collect();
        while let Some((src, parent)) = pending.pop_front() {
            let Some(node) = self.nodes.get(&src).cloned() else {
                continue;
            };
            let copy = self.add_node(node.name, Some(parent), node.renderer);
            pending.extend(node.children.iter().map(|c| (*c, copy)));
        }
        Some(clone_root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer(mat: &str) -> Option<Renderer> {
        Some(Renderer {
            mesh: Some(MeshId::new("m.mesh")),
            materials: vec![Some(MaterialId::new(mat))],
        })
    }

    #[test]
    fn test_surfaces_under_root_in_preorder() {
        let mut scene = Scene::new();
        let root = scene.add_node("root", None, None);
        let a = scene.add_node("a", Some(root), renderer("a.mat"));
        let group = scene.add_node("group", Some(root), None);
        let b = scene.add_node("b", Some(group), renderer("b.mat"));
        let other = scene.add_node("other", None, renderer("c.mat"));

        assert_eq!(scene.surfaces_under(Some(root)), vec![a, b]);
        assert_eq!(scene.surfaces_under(None), vec![a, b, other]);
    }

    #[test]
    fn test_clone_subtree_copies_hierarchy_with_new_ids() {
        let mut scene = Scene::new();
        let root = scene.add_node("root", None, None);
        let a = scene.add_node("a", Some(root), renderer("a.mat"));
        let inner = scene.add_node("inner", Some(root), None);
        scene.add_node("b", Some(inner), renderer("b.mat"));

        let copy = scene.clone_subtree(root, " (copy)").unwrap();
        assert_ne!(copy, root);
        assert_eq!(scene.node(copy).unwrap().name, "root (copy)");

        let copied_surfaces = scene.surfaces_under(Some(copy));
        assert_eq!(copied_surfaces.len(), 2);
        assert!(!copied_surfaces.contains(&a));
        let first = scene.node(copied_surfaces[0]).unwrap();
        assert_eq!(first.renderer, renderer("a.mat"));
        assert_eq!(scene.len(), 8);
    }

    #[test]
    fn test_remove_subtree_detaches_from_parent() {
        let mut scene = Scene::new();
        let root = scene.add_node("root", None, None);
        let a = scene.add_node("a", Some(root), renderer("a.mat"));
        scene.add_node("a.child", Some(a), None);

        scene.remove_subtree(a);
        assert!(!scene.contains(a));
        assert!(scene.node(root).unwrap().children.is_empty());
        assert_eq!(scene.len(), 1);
    }

    #[test]
    fn test_scene_ron_roundtrip() {
        let mut scene = Scene::new();
        let root = scene.add_node("root", None, None);
        scene.add_node("a", Some(root), renderer("a.mat"));
        let text = ron::to_string(&scene).unwrap();
        let back: Scene = ron::from_str(&text).unwrap();
        assert_eq!(scene, back);
    }
}
