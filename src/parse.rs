use std::io::BufRead;

use crate::error::{ImportError, ImportResult};
use crate::types::*;
use crate::utils::{Line, LineKind, LineReader};

///////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Receives informational echoes while the hierarchy is read (the host may mirror them as a selection).
pub trait HierarchyObserver {
    /// The `ROOT` joint was declared; `path` is its full path.
    fn root_declared(&mut self, _path: &str) {}
    /// A joint scope closed and the cursor moved back to `path`.
    fn scope_closed(&mut self, _path: &str) {}
}

impl HierarchyObserver for () {}

/// Builds a `Hierarchy` from the lines between `HIERARCHY` and `MOTION`.
/// Parsing is free of side effects on the scene; materialization happens later in the binder.
#[derive(Debug)]
pub struct HierarchyParser {
    tree: JointTree,
    channels: Vec<ChannelEntry>,
    anchor: Anchor,
    cursor: Option<Index>,
    depth: usize,
    // set inside an `End Site` scope, whose closing brace must not pop the cursor
    safe_close: bool,
    tip: Option<Index>,
}

impl HierarchyParser {
    pub fn new(anchor: Anchor, rotation_order: RotationOrder) -> Self {
        let mut tree = JointTree::new(rotation_order);
        let cursor = match &anchor {
            Anchor::Group(path) => Some(tree.add_node(path, NodeKind::Group, None)),
            Anchor::Detached | Anchor::Retarget(_) => None,
        };
        HierarchyParser {
            tree,
            channels: Vec::new(),
            anchor,
            cursor,
            depth: 0,
            safe_close: false,
            tip: None,
        }
    }

    /// Read lines (the header already consumed) up to and including `MOTION`.
    pub fn parse<R: BufRead>(
        mut self,
        reader: &mut LineReader<R>,
        observer: &mut dyn HierarchyObserver,
    ) -> ImportResult<Hierarchy> {
        while let Some(line) = reader.next_line()? {
            if self.feed(&line, observer)? {
                return self.finish(line.number);
            }
        }
        Err(ImportError::format(
            reader.line_number(),
            "unexpected end of file, MOTION section not found",
        ))
    }

    /// Handle one line. Returns `true` once the `MOTION` marker is reached.
    /// Braces sharing a line with a keyword (`End Site { OFFSET 0 1 0 }`) act in source order.
    pub fn feed(&mut self, line: &Line, observer: &mut dyn HierarchyObserver) -> ImportResult<bool> {
        for segment in line.segments() {
            if self.feed_segment(&segment, observer)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn feed_segment(&mut self, line: &Line, observer: &mut dyn HierarchyObserver) -> ImportResult<bool> {
        self.track_braces(line)?;

        match LineKind::classify(&line.text) {
            LineKind::Root => self.on_root(line, observer)?,
            LineKind::Joint => self.on_joint(line)?,
            LineKind::EndSite => {
                self.joint_cursor(line, "End Site")?;
                self.safe_close = true;
                self.tip = None;
            }
            LineKind::Close => self.on_close(line, observer)?,
            LineKind::Channels => self.on_channels(line)?,
            LineKind::Offset => self.on_offset(line)?,
            LineKind::Motion => return Ok(true),
            LineKind::Other => {}
        }
        Ok(false)
    }

    fn finish(self, line: usize) -> ImportResult<Hierarchy> {
        if self.depth != 0 || self.safe_close {
            return Err(ImportError::format(
                line,
                format!("unbalanced braces, {} scope(s) still open at MOTION", self.depth),
            ));
        }
        if self.tree.root().is_none() {
            return Err(ImportError::format(line, "no ROOT joint declared"));
        }
        log::debug!(
            "Parsed hierarchy: {} nodes, {} channels",
            self.tree.len(),
            self.channels.len()
        );
        Ok(Hierarchy {
            tree: self.tree,
            channels: self.channels,
        })
    }

    ///////////////////////////////////////////////////////////////////////////////////////////////////////////////////

    fn track_braces(&mut self, line: &Line) -> ImportResult<()> {
        let opens = line.text.matches('{').count();
        let closes = line.text.matches('}').count();
        self.depth += opens;
        if closes > self.depth {
            return Err(ImportError::format(
                line.number,
                "unbalanced braces, '}' without matching '{'",
            ));
        }
        self.depth -= closes;
        Ok(())
    }

    /// The cursor, provided it points at a joint (not the host group, not nothing).
    fn joint_cursor(&self, line: &Line, what: &str) -> ImportResult<Index> {
        match self.cursor {
            Some(index) if !self.tree.node(index).is_group() => Ok(index),
            _ => Err(ImportError::format(
                line.number,
                format!("{} outside of a joint scope", what),
            )),
        }
    }

    fn on_root(&mut self, line: &Line, observer: &mut dyn HierarchyObserver) -> ImportResult<()> {
        if self.tree.root().is_some() {
            return Err(ImportError::format(line.number, "more than one ROOT joint"));
        }
        let root = match &self.anchor {
            Anchor::Retarget(path) => {
                let name = path.rsplit(PATH_SEPARATOR).next().unwrap_or(path.as_str());
                self.tree.add_node(
                    name,
                    NodeKind::Root {
                        external: Some(path.clone()),
                    },
                    None,
                )
            }
            Anchor::Group(_) | Anchor::Detached => {
                let name = line.text.trim_start()["ROOT".len()..].trim();
                if name.is_empty() {
                    return Err(ImportError::format(line.number, "ROOT without a name"));
                }
                self.tree
                    .add_node(name, NodeKind::Root { external: None }, self.cursor)
            }
        };
        self.cursor = Some(root);
        observer.root_declared(&self.tree.full_path(root));
        Ok(())
    }

    fn on_joint(&mut self, line: &Line) -> ImportResult<()> {
        let parent = self.joint_cursor(line, "JOINT")?;
        let name = line
            .tokens()
            .skip_while(|token| *token != "JOINT")
            .nth(1)
            .ok_or_else(|| ImportError::format(line.number, "JOINT without a name"))?;
        let joint = self.tree.add_node(name, NodeKind::Joint, Some(parent));
        self.cursor = Some(joint);
        Ok(())
    }

    fn on_close(&mut self, line: &Line, observer: &mut dyn HierarchyObserver) -> ImportResult<()> {
        if self.safe_close {
            self.safe_close = false;
            self.tip = None;
            return Ok(());
        }
        let current = self.cursor.ok_or_else(|| {
            ImportError::format(line.number, "unbalanced braces, no open joint to close")
        })?;
        self.cursor = self.tree.node(current).parent;
        if let Some(cursor) = self.cursor {
            observer.scope_closed(&self.tree.full_path(cursor));
        }
        Ok(())
    }

    fn on_channels(&mut self, line: &Line) -> ImportResult<()> {
        let joint = self.joint_cursor(line, "CHANNELS")?;
        let mut tokens = line.tokens().skip_while(|token| *token != "CHANNELS").skip(1);
        let count: usize = tokens
            .next()
            .and_then(|token| token.parse().ok())
            .ok_or_else(|| ImportError::format(line.number, "CHANNELS without a valid count"))?;
        let names: Vec<&str> = tokens.take(count).collect();
        if names.len() != count {
            return Err(ImportError::format(
                line.number,
                format!("CHANNELS declares {} channels but lists {}", count, names.len()),
            ));
        }
        // resolve all names first so a bad line leaves the table untouched
        let kinds = names
            .iter()
            .map(|name| {
                ChannelKind::from_bvh_name(name).ok_or_else(|| {
                    ImportError::format(line.number, format!("unknown channel '{}'", name))
                })
            })
            .collect::<ImportResult<Vec<_>>>()?;
        self.channels
            .extend(kinds.into_iter().map(|kind| ChannelEntry { joint, kind }));
        Ok(())
    }

    fn on_offset(&mut self, line: &Line) -> ImportResult<()> {
        let joint = self.joint_cursor(line, "OFFSET")?;
        let values = line
            .tokens()
            .skip_while(|token| *token != "OFFSET")
            .skip(1)
            .take(3)
            .map(|token| {
                token.parse::<f64>().map_err(|_| {
                    ImportError::format(line.number, format!("invalid OFFSET value '{}'", token))
                })
            })
            .collect::<ImportResult<Vec<f64>>>()?;
        if values.len() != 3 {
            return Err(ImportError::format(
                line.number,
                "OFFSET needs three values",
            ));
        }
        let offset = Position::new(values[0], values[1], values[2]);

        if self.safe_close {
            //// End Site: the offset belongs to a `<joint>_tip` leaf, the cursor stays put
            let tip = match self.tip {
                Some(tip) => tip,
                None => {
                    let name = format!("{}_tip", self.tree.node(joint).name);
                    let tip = self.tree.add_node(&name, NodeKind::Tip, Some(joint));
                    self.tip = Some(tip);
                    tip
                }
            };
            self.tree.node_mut(tip).offset = offset;
        } else {
            self.tree.node_mut(joint).offset = offset;
        }
        Ok(())
    }
}

/// Parse a whole hierarchy section from a string, without any scene. Handy for inspection and tests.
pub fn parse_hierarchy_str(bvh_string: &str) -> ImportResult<Hierarchy> {
    let mut reader = LineReader::new(bvh_string.as_bytes());
    reader.expect_header()?;
    HierarchyParser::new(Anchor::Detached, RotationOrder::default()).parse(&mut reader, &mut ())
}

///////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Values from the `Frames:` / `Frame Time:` lines. Informational only.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MotionHeader {
    pub frames: Option<usize>,
    pub frame_time: Option<f64>,
}

impl MotionHeader {
    pub fn fps(&self) -> Option<f64> {
        self.frame_time
            .filter(|time| *time > 0.0)
            .map(|time| 1.0 / time)
    }

    fn read(&mut self, line: &Line) {
        let value = line.tokens().last();
        let parsed = if line.text.contains("Frame Time") {
            self.frame_time = value.and_then(|token| token.parse().ok());
            self.frame_time.is_some()
        } else {
            self.frames = value.and_then(|token| token.parse().ok());
            self.frames.is_some()
        };
        if !parsed {
            log::debug!("Ignoring motion header line {}: '{}'", line.number, line.text.trim());
        }
    }
}

/// Forward-only stream of motion frames following the `MOTION` line.
/// Stops for good after the first error.
pub struct MotionFrames<R> {
    reader: LineReader<R>,
    channel_count: usize,
    header: MotionHeader,
    failed: bool,
}

impl<R: BufRead> MotionFrames<R> {
    pub fn new(reader: LineReader<R>, channel_count: usize) -> Self {
        MotionFrames {
            reader,
            channel_count,
            header: MotionHeader::default(),
            failed: false,
        }
    }

    pub fn header(&self) -> MotionHeader {
        self.header
    }

    fn parse_frame(&self, line: &Line) -> ImportResult<MotionFrame> {
        let frame = line
            .tokens()
            .map(|token| {
                token.parse::<f64>().map_err(|_| {
                    ImportError::format(line.number, format!("invalid motion value '{}'", token))
                })
            })
            .collect::<ImportResult<MotionFrame>>()?;
        if frame.len() != self.channel_count {
            return Err(ImportError::format(
                line.number,
                format!(
                    "frame has {} values but the hierarchy declares {} channels",
                    frame.len(),
                    self.channel_count
                ),
            ));
        }
        Ok(frame)
    }
}

impl<R: BufRead> Iterator for MotionFrames<R> {
    type Item = ImportResult<MotionFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            let line = match self.reader.next_line() {
                Ok(Some(line)) => line,
                Ok(None) => return None,
                Err(err) => {
                    self.failed = true;
                    return Some(Err(err));
                }
            };
            if line.text.contains("Frame") {
                self.header.read(&line);
                continue;
            }
            if line.is_blank() {
                continue;
            }
            let frame = self.parse_frame(&line);
            self.failed = frame.is_err();
            return Some(frame);
        }
    }
}
