//! The host scene the importer writes into.
//!
//! `TargetScene` is everything the importer needs from a 3D application: creating a group and
//! joints, setting plain and keyed attribute values, and listing/deleting the animation
//! connections that drive an attribute. `MemoryScene` implements it in memory and is what the
//! command line tool and the tests run against.

use std::collections::BTreeMap;

use cgmath::{ElementWise, Zero};
use thiserror::Error;

use crate::types::{ChannelKind, Position, RotationOrder, PATH_SEPARATOR};

/// Errors a host reports when it refuses to create or mutate a node.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SceneError {
    #[error("No such node: {0}")]
    NoSuchNode(String),

    #[error("Node already exists: {0}")]
    AlreadyExists(String),

    #[error("Unknown attribute: {0}")]
    UnknownAttribute(String),

    #[error("Host refused the operation: {0}")]
    Refused(String),
}

/// A node created or resolved in the host scene, identified by its full path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeHandle {
    path: String,
}

impl NodeHandle {
    pub fn new(path: impl Into<String>) -> Self {
        NodeHandle { path: path.into() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// An incoming connection (typically an animation curve) driving an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ConnectionHandle(pub u64);

/// Operations the importer requires from the host scene.
/// Attribute paths have the form `<node full path>.<attribute>`.
pub trait TargetScene {
    fn create_group(&mut self, name: &str) -> Result<NodeHandle, SceneError>;

    fn set_uniform_scale(&mut self, node: &NodeHandle, scale: f64) -> Result<(), SceneError>;

    fn joint_exists(&self, path: &str) -> bool;

    /// Create a joint under `parent_path` (or at the top level), translated by `offset`.
    fn create_joint(
        &mut self,
        name: &str,
        parent_path: Option<&str>,
        offset: Position,
    ) -> Result<NodeHandle, SceneError>;

    fn set_rotation_order(
        &mut self,
        node: &NodeHandle,
        order: RotationOrder,
    ) -> Result<(), SceneError>;

    fn set_key(&mut self, attribute_path: &str, time: u64, value: f64) -> Result<(), SceneError>;

    fn list_connections(&self, attribute_path: &str) -> Vec<ConnectionHandle>;

    fn delete(&mut self, connection: ConnectionHandle) -> Result<(), SceneError>;

    fn set_attribute(&mut self, attribute_path: &str, value: f64) -> Result<(), SceneError>;

    /// The node at `path` followed by all of its descendants.
    fn hierarchy(&self, path: &str) -> Result<Vec<String>, SceneError>;

    /// Informational selection echo. Hosts without a selection can ignore it.
    fn select_path(&mut self, _path: &str) {}
}

/////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneNodeKind {
    Group,
    Joint,
}

#[derive(Debug, Clone)]
pub struct SceneNode {
    pub kind: SceneNodeKind,
    pub translate: Position,
    pub rotate: Position,
    pub scale: Position,
    pub rotation_order: RotationOrder,
}

impl SceneNode {
    fn new(kind: SceneNodeKind, translate: Position) -> Self {
        SceneNode {
            kind,
            translate,
            rotate: Position::zero(),
            scale: Position::new(1.0, 1.0, 1.0),
            rotation_order: RotationOrder::default(),
        }
    }

    fn channel_mut(&mut self, kind: ChannelKind) -> &mut f64 {
        match kind {
            ChannelKind::TranslateX => &mut self.translate.x,
            ChannelKind::TranslateY => &mut self.translate.y,
            ChannelKind::TranslateZ => &mut self.translate.z,
            ChannelKind::RotateX => &mut self.rotate.x,
            ChannelKind::RotateY => &mut self.rotate.y,
            ChannelKind::RotateZ => &mut self.rotate.z,
        }
    }
}

/// Keys of one attribute, by frame.
#[derive(Debug, Clone, Default)]
pub struct AnimCurve {
    pub id: u64,
    pub keys: BTreeMap<u64, f64>,
}

/// In-memory host scene. Nodes are addressed by full path, curves by attribute path.
#[derive(Debug, Default)]
pub struct MemoryScene {
    nodes: BTreeMap<String, SceneNode>,
    curves: BTreeMap<String, AnimCurve>,
    next_curve: u64,
    selection: Option<String>,
}

fn split_attribute(attribute_path: &str) -> Result<(&str, ChannelKind), SceneError> {
    let (node, attribute) = attribute_path
        .rsplit_once('.')
        .ok_or_else(|| SceneError::UnknownAttribute(attribute_path.to_string()))?;
    ChannelKind::TRANSLATIONS
        .into_iter()
        .chain(ChannelKind::ROTATIONS)
        .find(|kind| kind.attribute() == attribute)
        .map(|kind| (node, kind))
        .ok_or_else(|| SceneError::UnknownAttribute(attribute_path.to_string()))
}

fn parent_of(path: &str) -> Option<&str> {
    path.rsplit_once(PATH_SEPARATOR).map(|(parent, _)| parent)
}

impl MemoryScene {
    pub fn new() -> Self {
        MemoryScene::default()
    }

    pub fn node(&self, path: &str) -> Option<&SceneNode> {
        self.nodes.get(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn joint_count(&self) -> usize {
        self.nodes
            .values()
            .filter(|node| node.kind == SceneNodeKind::Joint)
            .count()
    }

    pub fn curve(&self, attribute_path: &str) -> Option<&AnimCurve> {
        self.curves.get(attribute_path)
    }

    pub fn key(&self, attribute_path: &str, time: u64) -> Option<f64> {
        self.curve(attribute_path)
            .and_then(|curve| curve.keys.get(&time).copied())
    }

    pub fn selection(&self) -> Option<&str> {
        self.selection.as_deref()
    }

    /// Rest position in world space: translations accumulated up the chain and scaled by each ancestor. Rotations are ignored.
    pub fn world_position(&self, path: &str) -> Option<Position> {
        let mut position = self.nodes.get(path)?.translate;
        let mut current = parent_of(path);
        while let Some(parent_path) = current {
            let parent = self.nodes.get(parent_path)?;
            position = position.mul_element_wise(parent.scale) + parent.translate;
            current = parent_of(parent_path);
        }
        Some(position)
    }

    fn node_mut(&mut self, path: &str) -> Result<&mut SceneNode, SceneError> {
        self.nodes
            .get_mut(path)
            .ok_or_else(|| SceneError::NoSuchNode(path.to_string()))
    }

    fn insert(&mut self, path: String, node: SceneNode) -> Result<NodeHandle, SceneError> {
        if self.nodes.contains_key(&path) {
            return Err(SceneError::AlreadyExists(path));
        }
        self.nodes.insert(path.clone(), node);
        Ok(NodeHandle::new(path))
    }
}

impl TargetScene for MemoryScene {
    fn create_group(&mut self, name: &str) -> Result<NodeHandle, SceneError> {
        // like most hosts, a clashing top level name gets a numeric suffix
        let mut path = name.to_string();
        let mut suffix = 1;
        while self.nodes.contains_key(&path) {
            path = format!("{}{}", name, suffix);
            suffix += 1;
        }
        self.insert(path, SceneNode::new(SceneNodeKind::Group, Position::zero()))
    }

    fn set_uniform_scale(&mut self, node: &NodeHandle, scale: f64) -> Result<(), SceneError> {
        self.node_mut(node.path())?.scale = Position::new(scale, scale, scale);
        Ok(())
    }

    fn joint_exists(&self, path: &str) -> bool {
        self.nodes
            .get(path)
            .is_some_and(|node| node.kind == SceneNodeKind::Joint)
    }

    fn create_joint(
        &mut self,
        name: &str,
        parent_path: Option<&str>,
        offset: Position,
    ) -> Result<NodeHandle, SceneError> {
        if name.is_empty() || name.contains(PATH_SEPARATOR) || name.contains('.') {
            return Err(SceneError::Refused(format!("invalid joint name '{}'", name)));
        }
        let path = match parent_path {
            Some(parent) => {
                if !self.nodes.contains_key(parent) {
                    return Err(SceneError::NoSuchNode(parent.to_string()));
                }
                format!("{}{}{}", parent, PATH_SEPARATOR, name)
            }
            None => name.to_string(),
        };
        self.insert(path, SceneNode::new(SceneNodeKind::Joint, offset))
    }

    fn set_rotation_order(
        &mut self,
        node: &NodeHandle,
        order: RotationOrder,
    ) -> Result<(), SceneError> {
        self.node_mut(node.path())?.rotation_order = order;
        Ok(())
    }

    fn set_key(&mut self, attribute_path: &str, time: u64, value: f64) -> Result<(), SceneError> {
        let (path, kind) = split_attribute(attribute_path)?;
        *self.node_mut(path)?.channel_mut(kind) = value;
        if !self.curves.contains_key(attribute_path) {
            self.next_curve += 1;
            let curve = AnimCurve {
                id: self.next_curve,
                keys: BTreeMap::new(),
            };
            self.curves.insert(attribute_path.to_string(), curve);
        }
        if let Some(curve) = self.curves.get_mut(attribute_path) {
            curve.keys.insert(time, value);
        }
        Ok(())
    }

    fn list_connections(&self, attribute_path: &str) -> Vec<ConnectionHandle> {
        self.curves
            .get(attribute_path)
            .map(|curve| vec![ConnectionHandle(curve.id)])
            .unwrap_or_default()
    }

    fn delete(&mut self, connection: ConnectionHandle) -> Result<(), SceneError> {
        let before = self.curves.len();
        self.curves.retain(|_, curve| curve.id != connection.0);
        if self.curves.len() == before {
            return Err(SceneError::Refused(format!(
                "no connection with id {}",
                connection.0
            )));
        }
        Ok(())
    }

    fn set_attribute(&mut self, attribute_path: &str, value: f64) -> Result<(), SceneError> {
        let (path, kind) = split_attribute(attribute_path)?;
        *self.node_mut(path)?.channel_mut(kind) = value;
        Ok(())
    }

    fn hierarchy(&self, path: &str) -> Result<Vec<String>, SceneError> {
        if !self.nodes.contains_key(path) {
            return Err(SceneError::NoSuchNode(path.to_string()));
        }
        let prefix = format!("{}{}", path, PATH_SEPARATOR);
        Ok(self
            .nodes
            .keys()
            .filter(|key| key.as_str() == path || key.starts_with(&prefix))
            .cloned()
            .collect())
    }

    fn select_path(&mut self, path: &str) {
        self.selection = Some(path.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joints_are_addressed_by_full_path() {
        let mut scene = MemoryScene::new();
        let group = scene.create_group("grp").unwrap();
        let hips = scene
            .create_joint("Hips", Some(group.path()), Position::new(0.0, 1.0, 0.0))
            .unwrap();
        assert_eq!(hips.path(), "grp|Hips");
        assert!(scene.joint_exists("grp|Hips"));
        // groups are not joints
        assert!(!scene.joint_exists("grp"));
        assert_eq!(
            scene.create_joint("Hips", Some("grp"), Position::zero()),
            Err(SceneError::AlreadyExists("grp|Hips".to_string()))
        );
    }

    #[test]
    fn clashing_group_names_get_a_suffix() {
        let mut scene = MemoryScene::new();
        assert_eq!(scene.create_group("grp").unwrap().path(), "grp");
        assert_eq!(scene.create_group("grp").unwrap().path(), "grp1");
    }

    #[test]
    fn keys_create_a_deletable_connection() {
        let mut scene = MemoryScene::new();
        scene.create_joint("Hips", None, Position::zero()).unwrap();
        scene.set_key("Hips.rotateY", 3, 45.0).unwrap();
        scene.set_key("Hips.rotateY", 4, 50.0).unwrap();
        assert_eq!(scene.key("Hips.rotateY", 3), Some(45.0));

        let connections = scene.list_connections("Hips.rotateY");
        assert_eq!(connections.len(), 1);
        scene.delete(connections[0]).unwrap();
        assert!(scene.list_connections("Hips.rotateY").is_empty());
        assert!(scene.delete(connections[0]).is_err());
    }

    #[test]
    fn unknown_attributes_are_refused() {
        let mut scene = MemoryScene::new();
        scene.create_joint("Hips", None, Position::zero()).unwrap();
        assert!(matches!(
            scene.set_attribute("Hips.visibility", 1.0),
            Err(SceneError::UnknownAttribute(_))
        ));
        assert!(matches!(
            scene.set_key("Nope.translateX", 0, 1.0),
            Err(SceneError::NoSuchNode(_))
        ));
    }

    #[test]
    fn world_position_applies_group_scale() {
        let mut scene = MemoryScene::new();
        let group = scene.create_group("grp").unwrap();
        scene.set_uniform_scale(&group, 0.5).unwrap();
        scene
            .create_joint("Hips", Some("grp"), Position::new(0.0, 10.0, 0.0))
            .unwrap();
        scene
            .create_joint("Spine", Some("grp|Hips"), Position::new(0.0, 4.0, 2.0))
            .unwrap();
        assert_eq!(
            scene.world_position("grp|Hips|Spine"),
            Some(Position::new(0.0, 7.0, 1.0))
        );
    }

    #[test]
    fn hierarchy_lists_node_and_descendants() {
        let mut scene = MemoryScene::new();
        scene.create_joint("Hips", None, Position::zero()).unwrap();
        scene.create_joint("Spine", Some("Hips"), Position::zero()).unwrap();
        scene.create_joint("HipsOther", None, Position::zero()).unwrap();
        assert_eq!(
            scene.hierarchy("Hips").unwrap(),
            vec!["Hips".to_string(), "Hips|Spine".to_string()]
        );
    }
}
