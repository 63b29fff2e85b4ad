use crate::error::{ImportError, ImportResult};
use crate::scene::TargetScene;
use crate::types::MotionFrame;

/// Writes motion frames as keys, one frame at a time, in ascending frame order.
/// Nothing is rolled back: frames applied before an error stay applied.
pub struct AnimationApplier<'s, S: TargetScene + ?Sized> {
    scene: &'s mut S,
    targets: Vec<String>,
    frame_start: u32,
    applied: usize,
}

impl<'s, S: TargetScene + ?Sized> AnimationApplier<'s, S> {
    /// `targets` are the attribute paths of the channel table, in order.
    pub fn new(scene: &'s mut S, targets: Vec<String>, frame_start: u32) -> Self {
        AnimationApplier {
            scene,
            targets,
            frame_start,
            applied: 0,
        }
    }

    /// Number of frames fully applied so far.
    pub fn applied(&self) -> usize {
        self.applied
    }

    /// Key time of the next frame.
    pub fn next_time(&self) -> u64 {
        u64::from(self.frame_start) + self.applied as u64
    }

    pub fn apply_frame(&mut self, frame: &MotionFrame) -> ImportResult<()> {
        if frame.len() != self.targets.len() {
            return Err(ImportError::FrameLength {
                expected: self.targets.len(),
                found: frame.len(),
            });
        }
        let time = self.next_time();
        for (target, value) in self.targets.iter().zip(frame) {
            self.scene.set_key(target, time, *value)?;
        }
        self.applied += 1;
        Ok(())
    }

    /// Drain a frame stream, stopping at the first error.
    pub fn apply_all<I>(&mut self, frames: I) -> ImportResult<usize>
    where
        I: IntoIterator<Item = ImportResult<MotionFrame>>,
    {
        for frame in frames {
            self.apply_frame(&frame?)?;
        }
        Ok(self.applied)
    }
}
