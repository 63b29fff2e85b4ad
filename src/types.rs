use std::fmt;
use std::str::FromStr;

use cgmath::{Vector3, Zero};

use crate::error::ImportError;

/////////////////////////////////////////////////////////////////////////////////////////////////

pub type Index = usize;
pub type Position = Vector3<f64>;

/// Separator between names in a full path, e.g. `_mocap_walk.bvh_grp|Hips|Spine`.
pub const PATH_SEPARATOR: char = '|';

/////////////////////////////////////////////////////////////////////////////////////////////////

/// Euler rotation order applied to every joint of one import.
/// The `.bvh` format doesn't encode it per joint, so it comes from the import configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RotationOrder {
    #[default]
    XYZ,
    YZX,
    ZXY,
    XZY,
    YXZ,
    ZYX,
}

impl RotationOrder {
    pub const ALL: [RotationOrder; 6] = [
        RotationOrder::XYZ,
        RotationOrder::YZX,
        RotationOrder::ZXY,
        RotationOrder::XZY,
        RotationOrder::YXZ,
        RotationOrder::ZYX,
    ];

    /// Position in the host's rotate-order enumeration.
    pub fn index(self) -> usize {
        match self {
            RotationOrder::XYZ => 0,
            RotationOrder::YZX => 1,
            RotationOrder::ZXY => 2,
            RotationOrder::XZY => 3,
            RotationOrder::YXZ => 4,
            RotationOrder::ZYX => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RotationOrder::XYZ => "XYZ",
            RotationOrder::YZX => "YZX",
            RotationOrder::ZXY => "ZXY",
            RotationOrder::XZY => "XZY",
            RotationOrder::YXZ => "YXZ",
            RotationOrder::ZYX => "ZYX",
        }
    }
}

impl fmt::Display for RotationOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RotationOrder {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        RotationOrder::ALL
            .into_iter()
            .find(|order| order.as_str() == upper)
            .ok_or_else(|| ImportError::Config(format!("unknown rotation order '{}'", s)))
    }
}

/////////////////////////////////////////////////////////////////////////////////////////////////

/// One animatable degree of freedom of a joint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    TranslateX,
    TranslateY,
    TranslateZ,
    RotateX,
    RotateY,
    RotateZ,
}

impl ChannelKind {
    pub const TRANSLATIONS: [ChannelKind; 3] = [
        ChannelKind::TranslateX,
        ChannelKind::TranslateY,
        ChannelKind::TranslateZ,
    ];
    pub const ROTATIONS: [ChannelKind; 3] = [
        ChannelKind::RotateX,
        ChannelKind::RotateY,
        ChannelKind::RotateZ,
    ];

    /// Maps a `.bvh` channel name (`Xposition`, `Zrotation`, ...) to its kind.
    pub fn from_bvh_name(name: &str) -> Option<ChannelKind> {
        match name {
            "Xposition" => Some(ChannelKind::TranslateX),
            "Yposition" => Some(ChannelKind::TranslateY),
            "Zposition" => Some(ChannelKind::TranslateZ),
            "Xrotation" => Some(ChannelKind::RotateX),
            "Yrotation" => Some(ChannelKind::RotateY),
            "Zrotation" => Some(ChannelKind::RotateZ),
            _ => None,
        }
    }

    /// Name of the scene attribute driven by this channel.
    pub fn attribute(self) -> &'static str {
        match self {
            ChannelKind::TranslateX => "translateX",
            ChannelKind::TranslateY => "translateY",
            ChannelKind::TranslateZ => "translateZ",
            ChannelKind::RotateX => "rotateX",
            ChannelKind::RotateY => "rotateY",
            ChannelKind::RotateZ => "rotateZ",
        }
    }

    pub fn is_rotation(self) -> bool {
        matches!(
            self,
            ChannelKind::RotateX | ChannelKind::RotateY | ChannelKind::RotateZ
        )
    }
}

/// A (joint, channel) pair. The table of entries is ordered exactly like the values of a motion line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelEntry {
    pub joint: Index,
    pub kind: ChannelKind,
}

/// Values of one motion line, one per `ChannelEntry`.
pub type MotionFrame = Vec<f64>;

/////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Scene group hosting a freshly imported rig.
    Group,
    /// The `ROOT` joint. `external` is set when it stands in for an existing scene joint.
    Root { external: Option<String> },
    Joint,
    /// Terminal joint materialized from an `End Site` offset.
    Tip,
}

#[derive(Debug, Clone)]
pub struct JointNode {
    pub name: String,
    pub offset: Position,
    pub kind: NodeKind,
    pub parent: Option<Index>,
    pub children: Vec<Index>,
}

impl JointNode {
    pub fn is_group(&self) -> bool {
        self.kind == NodeKind::Group
    }
}

/// Where the parsed skeleton hangs in the target scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anchor {
    /// Root path is just the root's name.
    Detached,
    /// Root is created under a host group at this path.
    Group(String),
    /// Root binds to an existing scene joint at this path.
    Retarget(String),
}

/// Skeleton as an arena of nodes. Parents always precede their children.
#[derive(Debug, Clone)]
pub struct JointTree {
    nodes: Vec<JointNode>,
    root: Option<Index>,
    rotation_order: RotationOrder,
}

impl JointTree {
    pub fn new(rotation_order: RotationOrder) -> Self {
        JointTree {
            nodes: Vec::new(),
            root: None,
            rotation_order,
        }
    }

    pub fn rotation_order(&self) -> RotationOrder {
        self.rotation_order
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> Option<Index> {
        self.root
    }

    pub fn node(&self, index: Index) -> &JointNode {
        &self.nodes[index]
    }

    pub(crate) fn node_mut(&mut self, index: Index) -> &mut JointNode {
        &mut self.nodes[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Index, &JointNode)> {
        self.nodes.iter().enumerate()
    }

    /// Nodes that become scene joints (everything but the host group), in creation order.
    pub fn joints(&self) -> impl Iterator<Item = (Index, &JointNode)> {
        self.iter().filter(|(_, node)| !node.is_group())
    }

    pub fn find(&self, name: &str) -> Option<Index> {
        self.nodes.iter().position(|node| node.name == name)
    }

    pub fn add_node(&mut self, name: &str, kind: NodeKind, parent: Option<Index>) -> Index {
        let index = self.nodes.len();
        if matches!(kind, NodeKind::Root { .. }) {
            self.root = Some(index);
        }
        self.nodes.push(JointNode {
            name: name.to_string(),
            offset: Position::zero(),
            kind,
            parent,
            children: Vec::new(),
        });
        if let Some(parent) = parent {
            self.nodes[parent].children.push(index);
        }
        index
    }

    /// Root-to-node chain of names joined by `|`. A retargeted root resolves to its scene path.
    pub fn full_path(&self, index: Index) -> String {
        let node = &self.nodes[index];
        let own = match &node.kind {
            NodeKind::Root {
                external: Some(path),
            } => path.as_str(),
            _ => node.name.as_str(),
        };
        match node.parent {
            Some(parent) => format!("{}{}{}", self.full_path(parent), PATH_SEPARATOR, own),
            None => own.to_string(),
        }
    }

    /// Scene attribute a channel entry drives, e.g. `Hips|Spine.rotateZ`.
    pub fn attribute_path(&self, entry: &ChannelEntry) -> String {
        format!("{}.{}", self.full_path(entry.joint), entry.kind.attribute())
    }

    /// Rest position relative to the root's parent, summing offsets up the chain (source units).
    pub fn rest_position(&self, index: Index) -> Position {
        let mut position = Position::zero();
        let mut current = Some(index);
        while let Some(i) = current {
            let node = &self.nodes[i];
            if node.is_group() {
                break;
            }
            position += node.offset;
            current = node.parent;
        }
        position
    }
}

/////////////////////////////////////////////////////////////////////////////////////////////////

/// Parsed hierarchy section: the skeleton plus the ordered channel table.
#[derive(Debug, Clone)]
pub struct Hierarchy {
    pub tree: JointTree,
    pub channels: Vec<ChannelEntry>,
}

impl Hierarchy {
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn attribute_paths(&self) -> Vec<String> {
        self.channels
            .iter()
            .map(|entry| self.tree.attribute_path(entry))
            .collect()
    }
}
