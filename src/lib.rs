//! Import `.bvh` (BioVision Hierarchy) motion capture into a host scene.
//!
//! The hierarchy section is parsed into a [`JointTree`] plus an ordered channel table, the
//! joints are created (or reused) in a [`TargetScene`], and the motion section is streamed
//! line by line as keys on the channel attributes.
//!
//! ```
//! use bvh_anim_importer::{import_bvh_from_string, ImportConfig, MemoryScene, RotationOrder};
//!
//! let bvh = "HIERARCHY\nROOT Hips\n{\nOFFSET 0 0 0\nCHANNELS 3 Xposition Yposition Zposition\n}\nMOTION\nFrames: 1\nFrame Time: 0.0333\n1.0 2.0 3.0\n";
//! let mut scene = MemoryScene::new();
//! let config = ImportConfig::default().with_rotation_order(RotationOrder::ZXY);
//! let summary = import_bvh_from_string(bvh, "hips.bvh", &mut scene, &config).unwrap();
//! assert_eq!(summary.root_path, "_mocap_hips_bvh_grp|Hips");
//! assert_eq!(scene.key("_mocap_hips_bvh_grp|Hips.translateY", 0), Some(2.0));
//! ```

pub mod apply;
pub mod binder;
pub mod error;
pub mod parse;
pub mod scene;
pub mod session;
pub mod types;
pub mod utils;

pub use apply::AnimationApplier;
pub use binder::{BindStats, SceneBinder};
pub use error::{ImportError, ImportResult};
pub use parse::{parse_hierarchy_str, HierarchyObserver, HierarchyParser, MotionFrames, MotionHeader};
pub use scene::{ConnectionHandle, MemoryScene, NodeHandle, SceneError, TargetScene};
pub use session::{
    import_bvh_from_file, import_bvh_from_string, BvhImporter, ImportConfig, ImportSession,
    ImportState, ImportSummary,
};
pub use types::{
    Anchor, ChannelEntry, ChannelKind, Hierarchy, JointNode, JointTree, MotionFrame, NodeKind,
    Position, RotationOrder,
};
