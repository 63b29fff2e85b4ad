use crate::error::ImportResult;
use crate::scene::{NodeHandle, SceneError, TargetScene};
use crate::types::*;

/// Counts from materializing a tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BindStats {
    pub created: usize,
    pub reused: usize,
}

/// Connects a parsed skeleton to the host scene: prepares the anchor, creates or reuses joints,
/// and resolves channel entries to attribute paths.
pub struct SceneBinder<'s, S: TargetScene + ?Sized> {
    scene: &'s mut S,
    rotation_order: RotationOrder,
}

impl<'s, S: TargetScene + ?Sized> SceneBinder<'s, S> {
    pub fn new(scene: &'s mut S, rotation_order: RotationOrder) -> Self {
        SceneBinder {
            scene,
            rotation_order,
        }
    }

    /// Create the host group for a fresh import, scaled uniformly.
    pub fn create_host_group(&mut self, name: &str, scale: f64) -> ImportResult<Anchor> {
        let group = self.scene.create_group(name)?;
        self.scene.set_uniform_scale(&group, scale)?;
        log::debug!("Created host group {} (scale {})", group.path(), scale);
        Ok(Anchor::Group(group.path().to_string()))
    }

    /// Prepare an existing joint as retarget root, dropping animation left by an earlier import.
    pub fn retarget(&mut self, root_path: &str) -> ImportResult<Anchor> {
        if !self.scene.joint_exists(root_path) {
            return Err(SceneError::NoSuchNode(root_path.to_string()).into());
        }
        self.clear_animation(root_path)?;
        Ok(Anchor::Retarget(root_path.to_string()))
    }

    /// Remove incoming connections on all six channels of the node and its descendants,
    /// then zero rotations. Translations keep their offset-driven rest values.
    pub fn clear_animation(&mut self, root_path: &str) -> ImportResult<usize> {
        let nodes = self.scene.hierarchy(root_path)?;
        let mut removed = 0;
        for node in &nodes {
            for kind in ChannelKind::TRANSLATIONS.into_iter().chain(ChannelKind::ROTATIONS) {
                let attribute = format!("{}.{}", node, kind.attribute());
                for connection in self.scene.list_connections(&attribute) {
                    self.scene.delete(connection)?;
                    removed += 1;
                }
            }
            for kind in ChannelKind::ROTATIONS {
                self.scene
                    .set_attribute(&format!("{}.{}", node, kind.attribute()), 0.0)?;
            }
        }
        log::debug!(
            "Cleared {} connection(s) below {} ({} nodes)",
            removed,
            root_path,
            nodes.len()
        );
        Ok(removed)
    }

    /// Create every joint of the tree (parents first), reusing joints already at the same path.
    pub fn materialize(&mut self, tree: &JointTree) -> ImportResult<BindStats> {
        let mut stats = BindStats::default();
        for (index, node) in tree.joints() {
            let path = tree.full_path(index);
            let handle = if self.scene.joint_exists(&path) {
                let handle = NodeHandle::new(path.as_str());
                for (kind, value) in ChannelKind::TRANSLATIONS.into_iter().zip([
                    node.offset.x,
                    node.offset.y,
                    node.offset.z,
                ]) {
                    self.scene
                        .set_attribute(&format!("{}.{}", path, kind.attribute()), value)?;
                }
                log::debug!("Reusing joint {}", path);
                stats.reused += 1;
                handle
            } else {
                let parent = node.parent.map(|parent| tree.full_path(parent));
                let handle = self
                    .scene
                    .create_joint(&node.name, parent.as_deref(), node.offset)?;
                if handle.path() != path {
                    return Err(SceneError::Refused(format!(
                        "joint {} was created at {}",
                        path,
                        handle.path()
                    ))
                    .into());
                }
                log::debug!("Created joint {}", path);
                stats.created += 1;
                handle
            };
            self.scene.set_rotation_order(&handle, self.rotation_order)?;
        }
        Ok(stats)
    }

    /// Attribute path for every channel entry, in table order.
    pub fn resolve(&self, hierarchy: &Hierarchy) -> Vec<String> {
        hierarchy.attribute_paths()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ImportError;
    use crate::parse::HierarchyParser;
    use crate::scene::{ConnectionHandle, MemoryScene};
    use crate::utils::LineReader;
    use cgmath::Zero;

    const ARM: &str = "HIERARCHY
ROOT Hips
{
  OFFSET 0 10 0
  CHANNELS 3 Zrotation Xrotation Yrotation
  JOINT Arm
  {
    OFFSET 4 0 0
    CHANNELS 3 Zrotation Xrotation Yrotation
    End Site
    {
      OFFSET 2 0 0
    }
  }
}
MOTION
";

    fn parse(anchor: Anchor) -> Hierarchy {
        let mut reader = LineReader::new(ARM.as_bytes());
        reader.expect_header().unwrap();
        HierarchyParser::new(anchor, RotationOrder::ZXY)
            .parse(&mut reader, &mut ())
            .unwrap()
    }

    #[test]
    fn fresh_import_creates_scaled_group_and_joints() {
        let mut scene = MemoryScene::new();
        let mut binder = SceneBinder::new(&mut scene, RotationOrder::ZXY);
        let anchor = binder.create_host_group("_mocap_arm_bvh_grp", 0.5).unwrap();
        let hierarchy = parse(anchor);
        let stats = binder.materialize(&hierarchy.tree).unwrap();
        assert_eq!(stats, BindStats { created: 3, reused: 0 });

        let group = scene.node("_mocap_arm_bvh_grp").unwrap();
        assert_eq!(group.scale, Position::new(0.5, 0.5, 0.5));
        let tip = scene.node("_mocap_arm_bvh_grp|Hips|Arm|Arm_tip").unwrap();
        assert_eq!(tip.translate, Position::new(2.0, 0.0, 0.0));
        assert_eq!(tip.rotation_order, RotationOrder::ZXY);
        // offsets stay in source units, the group scale propagates them
        assert_eq!(
            scene.world_position("_mocap_arm_bvh_grp|Hips|Arm|Arm_tip"),
            Some(Position::new(3.0, 5.0, 0.0))
        );
    }

    #[test]
    fn materialize_is_idempotent() {
        let mut scene = MemoryScene::new();
        let mut binder = SceneBinder::new(&mut scene, RotationOrder::XYZ);
        let anchor = binder.create_host_group("grp", 1.0).unwrap();
        let hierarchy = parse(anchor);
        binder.materialize(&hierarchy.tree).unwrap();
        let stats = binder.materialize(&hierarchy.tree).unwrap();
        assert_eq!(stats, BindStats { created: 0, reused: 3 });
        assert_eq!(scene.joint_count(), 3);
    }

    #[test]
    fn retarget_clears_keys_and_rotations_only() {
        let mut scene = MemoryScene::new();
        scene
            .create_joint("hips_jnt", None, Position::new(0.0, 10.0, 0.0))
            .unwrap();
        scene
            .create_joint("Arm", Some("hips_jnt"), Position::new(4.0, 0.0, 0.0))
            .unwrap();
        scene.set_key("hips_jnt|Arm.rotateZ", 0, 30.0).unwrap();
        scene.set_key("hips_jnt.translateY", 0, 12.0).unwrap();

        let mut binder = SceneBinder::new(&mut scene, RotationOrder::XYZ);
        let anchor = binder.retarget("hips_jnt").unwrap();
        assert_eq!(anchor, Anchor::Retarget("hips_jnt".to_string()));

        assert!(scene.curve("hips_jnt|Arm.rotateZ").is_none());
        assert!(scene.curve("hips_jnt.translateY").is_none());
        assert_eq!(scene.node("hips_jnt|Arm").unwrap().rotate.z, 0.0);
        // translation keeps its last value, it is not zeroed
        assert_eq!(scene.node("hips_jnt").unwrap().translate.y, 12.0);
    }

    #[test]
    fn retarget_onto_missing_node_fails() {
        let mut scene = MemoryScene::new();
        let mut binder = SceneBinder::new(&mut scene, RotationOrder::XYZ);
        assert!(binder.retarget("nothing").is_err());
    }

    #[test]
    fn retargeted_tree_reuses_existing_root() {
        let mut scene = MemoryScene::new();
        scene.create_joint("hips_jnt", None, Position::zero()).unwrap();
        let mut binder = SceneBinder::new(&mut scene, RotationOrder::YXZ);
        let anchor = binder.retarget("hips_jnt").unwrap();
        let hierarchy = parse(anchor);
        let stats = binder.materialize(&hierarchy.tree).unwrap();
        assert_eq!(stats, BindStats { created: 2, reused: 1 });
        assert_eq!(
            binder.resolve(&hierarchy)[3],
            "hips_jnt|Arm.rotateZ".to_string()
        );
        // the reused root takes the file's offset
        assert_eq!(
            scene.node("hips_jnt").unwrap().translate,
            Position::new(0.0, 10.0, 0.0)
        );
    }

    /// A host that appends a suffix to every joint it creates.
    struct RenamingScene(MemoryScene);

    impl TargetScene for RenamingScene {
        fn create_group(&mut self, name: &str) -> Result<NodeHandle, SceneError> {
            self.0.create_group(name)
        }
        fn set_uniform_scale(&mut self, node: &NodeHandle, scale: f64) -> Result<(), SceneError> {
            self.0.set_uniform_scale(node, scale)
        }
        fn joint_exists(&self, path: &str) -> bool {
            self.0.joint_exists(path)
        }
        fn create_joint(
            &mut self,
            name: &str,
            parent_path: Option<&str>,
            offset: Position,
        ) -> Result<NodeHandle, SceneError> {
            self.0.create_joint(&format!("{}1", name), parent_path, offset)
        }
        fn set_rotation_order(
            &mut self,
            node: &NodeHandle,
            order: RotationOrder,
        ) -> Result<(), SceneError> {
            self.0.set_rotation_order(node, order)
        }
        fn set_key(&mut self, attribute_path: &str, time: u64, value: f64) -> Result<(), SceneError> {
            self.0.set_key(attribute_path, time, value)
        }
        fn list_connections(&self, attribute_path: &str) -> Vec<ConnectionHandle> {
            self.0.list_connections(attribute_path)
        }
        fn delete(&mut self, connection: ConnectionHandle) -> Result<(), SceneError> {
            self.0.delete(connection)
        }
        fn set_attribute(&mut self, attribute_path: &str, value: f64) -> Result<(), SceneError> {
            self.0.set_attribute(attribute_path, value)
        }
        fn hierarchy(&self, path: &str) -> Result<Vec<String>, SceneError> {
            self.0.hierarchy(path)
        }
    }

    #[test]
    fn renamed_joint_is_refused() {
        let mut scene = RenamingScene(MemoryScene::new());
        let mut binder = SceneBinder::new(&mut scene, RotationOrder::XYZ);
        let anchor = binder.create_host_group("grp", 1.0).unwrap();
        let hierarchy = parse(anchor);
        let err = binder.materialize(&hierarchy.tree).unwrap_err();
        assert!(matches!(
            err,
            ImportError::SceneBinding(SceneError::Refused(_))
        ));
        // the first joint was created, under its host name, before the mismatch was seen
        assert!(scene.0.joint_exists("grp|Hips1"));
        assert_eq!(scene.0.joint_count(), 1);
    }
}
