//! Bounded frame history of a dynamic object.

use std::collections::VecDeque;

use hgx_golix::MAX_HISTORY;
use hgx_persistence::MIN_LEGROOM;
use hgx_types::Ghid;

/// How a remote frame was merged into local history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    /// The frame was already the newest local frame.
    Current,
    /// `n` remote frames were spliced onto the front.
    Spliced(usize),
    /// Nothing overlapped; local history restarted from the remote frame.
    Reset,
}

/// Most-recent-first frame addresses with their container targets.
///
/// Targets of frames learned only through a remote frame's declared history
/// are unknown and stored as `None`.
#[derive(Debug, Clone)]
pub struct History {
    legroom: usize,
    frames: VecDeque<Ghid>,
    targets: VecDeque<Option<Ghid>>,
}

impl History {
    /// Empty history keeping at most `legroom` frames, clamped to
    /// `MIN_LEGROOM..=MAX_HISTORY`.
    pub fn new(legroom: usize) -> Self {
        let legroom = clamp_legroom(legroom);
        Self {
            legroom,
            frames: VecDeque::with_capacity(legroom),
            targets: VecDeque::with_capacity(legroom),
        }
    }

    pub fn legroom(&self) -> usize {
        self.legroom
    }

    /// Change the depth, reallocating both lists. Shrinking keeps the
    /// newest frames.
    pub fn set_legroom(&mut self, legroom: usize) {
        let legroom = clamp_legroom(legroom);
        if legroom == self.legroom {
            return;
        }
        self.legroom = legroom;

        let mut frames = VecDeque::with_capacity(legroom);
        frames.extend(self.frames.iter().take(legroom).copied());
        let mut targets = VecDeque::with_capacity(legroom);
        targets.extend(self.targets.iter().take(legroom).copied());
        self.frames = frames;
        self.targets = targets;
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frame addresses, newest first.
    pub fn frames(&self) -> Vec<Ghid> {
        self.frames.iter().copied().collect()
    }

    /// Target addresses parallel to [`Self::frames`].
    pub fn targets(&self) -> Vec<Option<Ghid>> {
        self.targets.iter().copied().collect()
    }

    pub fn newest_frame(&self) -> Option<Ghid> {
        self.frames.front().copied()
    }

    pub fn newest_target(&self) -> Option<Ghid> {
        self.targets.front().copied().flatten()
    }

    pub fn contains(&self, frame: &Ghid) -> bool {
        self.frames.contains(frame)
    }

    /// Known target of `frame`, if it is held and its target was recorded.
    pub fn target_of(&self, frame: &Ghid) -> Option<Ghid> {
        self.frames
            .iter()
            .position(|f| f == frame)
            .and_then(|i| self.targets[i])
    }

    /// Record a new newest frame, dropping the oldest beyond legroom.
    pub fn push_front(&mut self, frame: Ghid, target: Option<Ghid>) {
        self.frames.push_front(frame);
        self.targets.push_front(target);
        self.frames.truncate(self.legroom);
        self.targets.truncate(self.legroom);
    }

    pub fn clear(&mut self) {
        self.frames.clear();
        self.targets.clear();
    }

    /// Merge a remote frame and its declared history (newest first).
    ///
    /// Finds the smallest offset `k` at which the remote chain
    /// `[frame, declared...]` lines up with local history, then splices the
    /// first `k` remote frames on the front. Only `frame` has a known
    /// target. With no overlap at all, local history is discarded.
    pub fn align(&mut self, frame: Ghid, target: Ghid, declared: &[Ghid]) -> Alignment {
        let remote: Vec<Ghid> = std::iter::once(frame)
            .chain(declared.iter().copied())
            .collect();

        match self.offset(&remote) {
            Some(0) => Alignment::Current,
            Some(k) => {
                for i in (1..k).rev() {
                    self.push_front(remote[i], None);
                }
                self.push_front(frame, Some(target));
                Alignment::Spliced(k)
            }
            None => {
                self.clear();
                self.push_front(frame, Some(target));
                Alignment::Reset
            }
        }
    }

    fn offset(&self, remote: &[Ghid]) -> Option<usize> {
        if self.frames.is_empty() {
            return None;
        }
        (0..remote.len()).find(|&offset| {
            remote[offset..]
                .iter()
                .zip(self.frames.iter())
                .all(|(r, l)| r == l)
        })
    }
}

fn clamp_legroom(legroom: usize) -> usize {
    legroom.clamp(MIN_LEGROOM, MAX_HISTORY)
}
