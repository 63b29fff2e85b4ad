use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::apply::AnimationApplier;
use crate::binder::{BindStats, SceneBinder};
use crate::error::{ImportError, ImportResult};
use crate::parse::{HierarchyObserver, HierarchyParser, MotionFrames, MotionHeader};
use crate::scene::TargetScene;
use crate::types::*;
use crate::utils::LineReader;

///////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Options read once at the start of an import.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportConfig {
    /// Uniform scale of the host group, in [0.01, 2.0].
    pub scale: f64,
    /// Key time of the first motion frame.
    pub frame_offset: u32,
    pub rotation_order: RotationOrder,
    /// Existing joint to bind the root to instead of creating a new rig.
    pub retarget_node: Option<String>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        ImportConfig {
            scale: 1.0,
            frame_offset: 0,
            rotation_order: RotationOrder::XYZ,
            retarget_node: None,
        }
    }
}

impl ImportConfig {
    pub const MIN_SCALE: f64 = 0.01;
    pub const MAX_SCALE: f64 = 2.0;

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_frame_offset(mut self, frame_offset: u32) -> Self {
        self.frame_offset = frame_offset;
        self
    }

    pub fn with_rotation_order(mut self, rotation_order: RotationOrder) -> Self {
        self.rotation_order = rotation_order;
        self
    }

    pub fn with_retarget(mut self, retarget_node: Option<String>) -> Self {
        self.retarget_node = retarget_node;
        self
    }

    pub fn validate(&self) -> ImportResult<()> {
        if !self.scale.is_finite() || !(Self::MIN_SCALE..=Self::MAX_SCALE).contains(&self.scale) {
            return Err(ImportError::Config(format!(
                "scale {} is outside [{}, {}]",
                self.scale,
                Self::MIN_SCALE,
                Self::MAX_SCALE
            )));
        }
        if let Some(node) = &self.retarget_node {
            if node.trim().is_empty() {
                return Err(ImportError::Config("empty retarget node path".to_string()));
            }
        }
        Ok(())
    }
}

/// Name of the group hosting a fresh import of `source`, e.g. `_mocap_walk_bvh_grp`.
pub fn group_name(source: &str) -> String {
    let base = Path::new(source)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(source);
    let base: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    format!("_mocap_{}_grp", base)
}

///////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportState {
    Start,
    ParsingHierarchy,
    ParsingMotion,
    Done,
    Failed,
}

/// What an import did.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportSummary {
    pub root_path: String,
    pub joints_created: usize,
    pub joints_reused: usize,
    pub channels: usize,
    pub frames_applied: usize,
    pub header: MotionHeader,
}

/// Forwards hierarchy echoes to the host selection.
struct SelectionEcho<'a, S: ?Sized>(&'a mut S);

impl<S: TargetScene + ?Sized> HierarchyObserver for SelectionEcho<'_, S> {
    fn root_declared(&mut self, path: &str) {
        log::debug!("Root joint {}", path);
        self.0.select_path(path);
    }

    fn scope_closed(&mut self, path: &str) {
        self.0.select_path(path);
    }
}

/// One import of one source into one scene. The scene must not be touched by anything
/// else until `run` returns.
pub struct ImportSession<'s, S: TargetScene + ?Sized> {
    scene: &'s mut S,
    config: ImportConfig,
    source_name: String,
    state: ImportState,
    root_path: Option<String>,
    frames_applied: usize,
}

impl<'s, S: TargetScene + ?Sized> ImportSession<'s, S> {
    pub fn new(scene: &'s mut S, config: ImportConfig, source_name: &str) -> ImportResult<Self> {
        config.validate()?;
        Ok(ImportSession {
            scene,
            config,
            source_name: source_name.to_string(),
            state: ImportState::Start,
            root_path: None,
            frames_applied: 0,
        })
    }

    pub fn state(&self) -> ImportState {
        self.state
    }

    /// Path of the root joint once it exists in the scene, even if the import failed later.
    pub fn root_path(&self) -> Option<&str> {
        self.root_path.as_deref()
    }

    pub fn frames_applied(&self) -> usize {
        self.frames_applied
    }

    /// Parse `reader` and replay it onto the scene. A failure leaves already applied frames in place.
    pub fn run<R: BufRead>(&mut self, reader: R) -> ImportResult<ImportSummary> {
        log::info!("Importing {}", self.source_name);
        match self.run_stages(reader) {
            Ok(summary) => {
                self.state = ImportState::Done;
                log::info!(
                    "Imported {}: {} joints ({} reused), {} channels, {} frames",
                    self.source_name,
                    summary.joints_created + summary.joints_reused,
                    summary.joints_reused,
                    summary.channels,
                    summary.frames_applied
                );
                Ok(summary)
            }
            Err(err) => {
                self.state = ImportState::Failed;
                log::warn!(
                    "Import of {} failed after {} frame(s): {}",
                    self.source_name,
                    self.frames_applied,
                    err
                );
                Err(err)
            }
        }
    }

    fn run_stages<R: BufRead>(&mut self, reader: R) -> ImportResult<ImportSummary> {
        let order = self.config.rotation_order;
        let mut lines = LineReader::new(reader);
        lines.expect_header()?;
        self.state = ImportState::ParsingHierarchy;

        let anchor = {
            let mut binder = SceneBinder::new(&mut *self.scene, order);
            match &self.config.retarget_node {
                Some(path) => binder.retarget(path)?,
                None => binder.create_host_group(&group_name(&self.source_name), self.config.scale)?,
            }
        };

        let hierarchy = HierarchyParser::new(anchor, order)
            .parse(&mut lines, &mut SelectionEcho(&mut *self.scene))?;

        let mut binder = SceneBinder::new(&mut *self.scene, order);
        let BindStats { created, reused } = binder.materialize(&hierarchy.tree)?;
        let targets = binder.resolve(&hierarchy);
        let root = hierarchy
            .tree
            .root()
            .map(|root| hierarchy.tree.full_path(root))
            .unwrap_or_default();
        self.root_path = Some(root.clone());

        self.state = ImportState::ParsingMotion;
        let mut frames = MotionFrames::new(lines, hierarchy.channel_count());
        let mut applier = AnimationApplier::new(&mut *self.scene, targets, self.config.frame_offset);
        let applied = applier.apply_all(&mut frames);
        self.frames_applied = applier.applied();
        let frames_applied = applied?;

        let header = frames.header();
        if let Some(declared) = header.frames {
            if declared != frames_applied {
                log::warn!(
                    "{} declares {} frames but {} were found",
                    self.source_name,
                    declared,
                    frames_applied
                );
            }
        }

        Ok(ImportSummary {
            root_path: root,
            joints_created: created,
            joints_reused: reused,
            channels: hierarchy.channel_count(),
            frames_applied,
            header,
        })
    }
}

///////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Import a `.bvh` file. The file is opened before the scene is touched.
pub fn import_bvh_from_file<S: TargetScene + ?Sized>(
    file_path: impl AsRef<Path>,
    scene: &mut S,
    config: &ImportConfig,
) -> ImportResult<ImportSummary> {
    let file_path = file_path.as_ref();
    let file = File::open(file_path)?;
    let source = file_path.display().to_string();
    ImportSession::new(scene, config.clone(), &source)?.run(BufReader::new(file))
}

/// Import `.bvh` text. `source_name` names the host group of a fresh import.
pub fn import_bvh_from_string<S: TargetScene + ?Sized>(
    bvh_string: &str,
    source_name: &str,
    scene: &mut S,
    config: &ImportConfig,
) -> ImportResult<ImportSummary> {
    ImportSession::new(scene, config.clone(), source_name)?.run(bvh_string.as_bytes())
}

/// Importer that remembers its last file and target root, so the same file can be
/// re-imported onto the same skeleton without duplicating joints.
#[derive(Debug, Clone, Default)]
pub struct BvhImporter {
    config: ImportConfig,
    filename: Option<PathBuf>,
}

impl BvhImporter {
    pub fn new(config: ImportConfig) -> Self {
        BvhImporter {
            config,
            filename: None,
        }
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ImportConfig {
        &mut self.config
    }

    pub fn filename(&self) -> Option<&Path> {
        self.filename.as_deref()
    }

    /// Target root for the next import; `None` makes the next import create a fresh rig.
    pub fn set_retarget(&mut self, root: Option<String>) {
        self.config.retarget_node = root;
    }

    pub fn retarget(&self) -> Option<&str> {
        self.config.retarget_node.as_deref()
    }

    pub fn import_file<S: TargetScene + ?Sized>(
        &mut self,
        file_path: impl Into<PathBuf>,
        scene: &mut S,
    ) -> ImportResult<ImportSummary> {
        self.filename = Some(file_path.into());
        self.reload(scene)
    }

    /// Import the last file again, onto the root of the previous import.
    pub fn reload<S: TargetScene + ?Sized>(&mut self, scene: &mut S) -> ImportResult<ImportSummary> {
        let file_path = self
            .filename
            .clone()
            .ok_or_else(|| ImportError::Config("no file to reload".to_string()))?;
        let file = File::open(&file_path)?;
        let source = file_path.display().to_string();

        let mut session = ImportSession::new(scene, self.config.clone(), &source)?;
        let result = session.run(BufReader::new(file));
        if self.config.retarget_node.is_none() {
            if let Some(root) = session.root_path() {
                log::debug!("Later reloads retarget onto {}", root);
                self.config.retarget_node = Some(root.to_string());
            }
        }
        result
    }
}
