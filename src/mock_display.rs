use crate::{config::Config, host::Surface, render::Frame};
use log::trace;

/// Mock display, to allow compiling/running tests on non-device machines.
/// Frames go nowhere, but we count them.
#[derive(Debug, Default)]
pub struct Display {
    frames_shown: usize,
}

impl Display {
    pub fn new(_: &Config) -> anyhow::Result<Self> {
        Ok(Self::default())
    }

    pub fn frames_shown(&self) -> usize {
        self.frames_shown
    }
}

impl Surface for Display {
    fn show(&mut self, frame: &Frame) -> anyhow::Result<()> {
        self.frames_shown += 1;
        trace!(
            "Mock display frame #{}: {} pixels",
            self.frames_shown,
            frame.pixels().len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::FACE_SIZE;

    #[test]
    fn test_counts_frames() {
        let mut display = Display::new(&Config::default()).unwrap();
        let frame = Frame::new(FACE_SIZE);
        display.show(&frame).unwrap();
        display.show(&frame).unwrap();
        assert_eq!(display.frames_shown(), 2);
    }
}
