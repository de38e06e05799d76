/// A part is an ordered list of timed events that can loop
use crate::error::{Error, Result};
use crate::time::Position;

#[derive(Debug, Clone, PartialEq)]
pub struct Part<T> {
    events: Vec<(Position, T)>,
    looping: bool,
    loop_start: u32,
    loop_end: u32,
}

impl<T: PartialEq> Part<T> {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            looping: false,
            loop_start: 0,
            loop_end: 0,
        }
    }

    pub fn from_events(events: impl IntoIterator<Item = (Position, T)>) -> Self {
        let mut part = Self::new();
        for (position, value) in events {
            part.add(position, value);
        }
        part
    }

    /// Loop over `[start, end)` ticks.
    pub fn set_loop(&mut self, start: u32, end: u32) -> Result<()> {
        if end <= start {
            return Err(Error::InvalidLoop { start, end });
        }
        self.looping = true;
        self.loop_start = start;
        self.loop_end = end;
        Ok(())
    }

    pub fn with_loop(mut self, start: u32, end: u32) -> Result<Self> {
        self.set_loop(start, end)?;
        Ok(self)
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn loop_bounds(&self) -> (u32, u32) {
        (self.loop_start, self.loop_end)
    }

    /// Inserts after any events already at `position`, keeping the list
    /// sorted.
    pub fn add(&mut self, position: Position, value: T) {
        let index = self.events.partition_point(|(p, _)| *p <= position);
        self.events.insert(index, (position, value));
    }

    /// Removes one event matching both position and value.
    pub fn remove(&mut self, position: Position, value: &T) -> bool {
        match self
            .events
            .iter()
            .rposition(|(p, v)| *p == position && v == value)
        {
            Some(index) => {
                self.events.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Position, T)> {
        self.events.iter()
    }

    pub fn contains(&self, position: Position, value: &T) -> bool {
        self.events.iter().any(|(p, v)| *p == position && v == value)
    }

    /// Maps a transport tick onto this part's own timeline. Plays straight
    /// through until the loop end, then wraps into the loop.
    pub fn local_tick(&self, global_tick: u64) -> u64 {
        let end = self.loop_end as u64;
        if !self.looping || global_tick < end {
            return global_tick;
        }
        let start = self.loop_start as u64;
        start + (global_tick - start) % (end - start)
    }

    pub fn values_at(&self, global_tick: u64) -> impl Iterator<Item = &T> {
        let local = self.local_tick(global_tick);
        self.events
            .iter()
            .filter(move |(p, _)| p.ticks() as u64 == local)
            .map(|(_, v)| v)
    }
}

impl<T: PartialEq> Default for Part<T> {
    fn default() -> Self {
        Self::new()
    }
}
