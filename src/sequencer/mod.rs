/// Core sequencer logic - grid state, lead-pattern editing and playhead
/// This is grid-agnostic and can work with any grid size
use crate::error::{Error, Result};
use crate::pitch::Pitch;
use crate::time::Position;

pub mod part;
pub mod patterns;
pub mod playback;

use part::Part;

pub const DEFAULT_COLUMNS: usize = 32;

/// Row pitches, top row first.
pub const DEFAULT_ROWS: [&str; 12] = [
    "B3", "G#3", "E3", "C#3", "B2", "G#2", "E2", "C#2", "B1", "G#1", "E1", "C#1",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    cells: Vec<Vec<bool>>,
    width: usize,
    height: usize,
}

impl Grid {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            cells: vec![vec![false; width]; height],
            width,
            height,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn get(&self, x: usize, y: usize) -> bool {
        self.cells
            .get(y)
            .and_then(|row| row.get(x))
            .copied()
            .unwrap_or(false)
    }

    pub fn set(&mut self, x: usize, y: usize, value: bool) {
        if let Some(row) = self.cells.get_mut(y) {
            if let Some(cell) = row.get_mut(x) {
                *cell = value;
            }
        }
    }

    pub fn toggle(&mut self, x: usize, y: usize) {
        let current = self.get(x, y);
        self.set(x, y, !current);
    }

    pub fn clear(&mut self) {
        for row in &mut self.cells {
            for cell in row {
                *cell = false;
            }
        }
    }

    pub fn active_cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.cells.iter().enumerate().flat_map(|(y, row)| {
            row.iter()
                .enumerate()
                .filter(|(_, on)| **on)
                .map(move |(x, _)| (x, y))
        })
    }
}

/// One cell flipping on or off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellChange {
    pub column: usize,
    pub row: usize,
    pub state: bool,
}

/// The step grid that edits the lead part. Each column is one sixteenth,
/// each row one pitch.
#[derive(Debug, Clone)]
pub struct Sequencer {
    grid: Grid,
    row_pitches: Vec<Pitch>,
    playhead: usize,
}

impl Sequencer {
    pub fn new(columns: usize, row_pitches: Vec<Pitch>) -> Self {
        Self {
            grid: Grid::new(columns, row_pitches.len()),
            row_pitches,
            playhead: 0,
        }
    }

    pub fn from_names(columns: usize, names: &[impl AsRef<str>]) -> Result<Self> {
        let row_pitches = names
            .iter()
            .map(|name| Pitch::parse(name.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(columns, row_pitches))
    }

    pub fn with_defaults() -> Result<Self> {
        Self::from_names(DEFAULT_COLUMNS, &DEFAULT_ROWS[..])
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn columns(&self) -> usize {
        self.grid.width()
    }

    pub fn rows(&self) -> usize {
        self.grid.height()
    }

    pub fn row_pitch(&self, row: usize) -> Option<Pitch> {
        self.row_pitches.get(row).copied()
    }

    /// The lead event a cell stands for.
    pub fn cell_event(&self, column: usize, row: usize) -> Result<(Position, Pitch)> {
        match self.row_pitch(row) {
            Some(pitch) if column < self.columns() => {
                Ok((Position::from_ticks(column as u32), pitch))
            }
            _ => Err(Error::CellOutOfRange {
                column,
                row,
                columns: self.columns(),
                rows: self.rows(),
            }),
        }
    }

    /// Applies a cell change to the grid and mirrors it into the lead part.
    /// Returns whether the lead part changed.
    pub fn change(&mut self, change: CellChange, lead: &mut Part<Pitch>) -> Result<bool> {
        let CellChange { column, row, state } = change;
        let (position, pitch) = self.cell_event(column, row)?;
        if self.grid.get(column, row) == state {
            return Ok(false);
        }
        self.grid.set(column, row, state);
        if state {
            lead.add(position, pitch);
        } else {
            lead.remove(position, &pitch);
        }
        log::debug!(
            "lead {} {} at {}",
            if state { "+" } else { "-" },
            pitch,
            position
        );
        Ok(true)
    }

    /// Flips a cell, as a click does.
    pub fn toggle(&mut self, column: usize, row: usize, lead: &mut Part<Pitch>) -> Result<bool> {
        let state = !self.grid.get(column, row);
        self.change(CellChange { column, row, state }, lead)
    }

    /// Turns every cell off, removing its events from the lead part.
    pub fn clear(&mut self, lead: &mut Part<Pitch>) -> Result<()> {
        let active: Vec<(usize, usize)> = self.grid.active_cells().collect();
        for (column, row) in active {
            self.change(
                CellChange {
                    column,
                    row,
                    state: false,
                },
                lead,
            )?;
        }
        Ok(())
    }

    /// Makes the lead loop exactly as long as the grid is wide, so every
    /// column is heard once per pass and the playhead tracks the loop.
    pub fn fit_lead_loop(&self, lead: &mut Part<Pitch>) -> Result<()> {
        let end = u32::try_from(self.columns()).map_err(|_| Error::InvalidLoop {
            start: 0,
            end: u32::MAX,
        })?;
        lead.set_loop(0, end)
    }

    pub fn playhead(&self) -> usize {
        self.playhead
    }

    pub fn set_playhead(&mut self, column: usize) {
        if self.columns() > 0 {
            self.playhead = column % self.columns();
        }
    }

    pub fn next(&mut self) -> usize {
        self.set_playhead(self.playhead + 1);
        self.playhead
    }

    pub fn reset_playhead(&mut self) {
        self.playhead = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::patterns::lead_pattern;

    #[test]
    fn test_grid_creation() {
        let grid = Grid::new(8, 8);
        assert_eq!(grid.width(), 8);
        assert_eq!(grid.height(), 8);
        assert_eq!(grid.active_cells().count(), 0);
    }

    #[test]
    fn test_grid_toggle() {
        let mut grid = Grid::new(4, 4);
        assert!(!grid.get(0, 0));
        grid.toggle(0, 0);
        assert!(grid.get(0, 0));
        assert_eq!(grid.active_cells().collect::<Vec<_>>(), vec![(0, 0)]);
    }

    #[test]
    fn test_default_rows() {
        let seq = Sequencer::with_defaults().unwrap();
        assert_eq!(seq.columns(), 32);
        assert_eq!(seq.rows(), 12);
        assert_eq!(seq.row_pitch(0).unwrap().to_string(), "B3");
        assert_eq!(seq.row_pitch(11).unwrap().to_string(), "C#1");
    }

    #[test]
    fn test_cell_maps_to_sixteenth_and_pitch() {
        let seq = Sequencer::with_defaults().unwrap();
        let (position, pitch) = seq.cell_event(5, 3).unwrap();
        assert_eq!(position.to_string(), "0:1:1");
        assert_eq!(pitch.to_string(), "C#3");
        assert!(seq.cell_event(32, 0).is_err());
        assert!(seq.cell_event(0, 12).is_err());
    }

    #[test]
    fn test_toggle_on_then_off_restores_lead() {
        let mut seq = Sequencer::with_defaults().unwrap();
        let mut lead = lead_pattern().unwrap();
        seq.toggle(2, 2, &mut lead).unwrap();
        let before = lead.clone();

        assert!(seq.change(CellChange { column: 9, row: 4, state: true }, &mut lead).unwrap());
        assert_eq!(lead.len(), 2);
        assert!(seq.change(CellChange { column: 9, row: 4, state: false }, &mut lead).unwrap());
        assert_eq!(lead, before);
    }

    #[test]
    fn test_repeated_change_is_noop() {
        let mut seq = Sequencer::with_defaults().unwrap();
        let mut lead = lead_pattern().unwrap();
        let on = CellChange { column: 0, row: 0, state: true };
        assert!(seq.change(on, &mut lead).unwrap());
        assert!(!seq.change(on, &mut lead).unwrap());
        assert_eq!(lead.len(), 1);
    }

    #[test]
    fn test_clear_empties_lead() {
        let mut seq = Sequencer::with_defaults().unwrap();
        let mut lead = lead_pattern().unwrap();
        seq.toggle(0, 0, &mut lead).unwrap();
        seq.toggle(31, 11, &mut lead).unwrap();
        seq.clear(&mut lead).unwrap();
        assert!(lead.is_empty());
        assert_eq!(seq.grid().active_cells().count(), 0);
    }

    #[test]
    fn test_lead_loop_follows_grid_width() {
        let seq = Sequencer::from_names(48, &DEFAULT_ROWS[..]).unwrap();
        let mut lead = lead_pattern().unwrap();
        seq.fit_lead_loop(&mut lead).unwrap();
        assert_eq!(lead.loop_bounds(), (0, 48));

        let empty = Sequencer::from_names(0, &DEFAULT_ROWS[..]).unwrap();
        assert!(empty.fit_lead_loop(&mut lead).is_err());
    }

    #[test]
    fn test_playhead_wraps() {
        let mut seq = Sequencer::with_defaults().unwrap();
        for _ in 0..31 {
            seq.next();
        }
        assert_eq!(seq.playhead(), 31);
        assert_eq!(seq.next(), 0);
        seq.set_playhead(37);
        assert_eq!(seq.playhead(), 5);
    }
}
