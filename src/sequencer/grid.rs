// Grid - Voice x step on/off matrix
// Holds the editable sequence, locked columns and the play-head column

use crate::messaging::listeners::{Event, Listeners, SubscriptionId};
use crate::sequencer::pattern::Pattern;
use crate::sequencer::{SequencerError, SequencerResult, Voice};
use std::fmt;

/// Notifications emitted by the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridEvent {
    /// A user edit switched a cell on
    CellOn { voice: Voice, step: usize },
    /// A user edit switched a cell off
    CellOff { voice: Voice, step: usize },
    /// Any user edit completed
    Update,
    /// Brief visual highlight of a cell
    Pulse { voice: Voice, step: usize },
    /// The highlighted column changed
    ActiveColumn(Option<usize>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GridEventKind {
    CellOn,
    CellOff,
    Update,
    Pulse,
    ActiveColumn,
}

impl Event for GridEvent {
    type Kind = GridEventKind;

    fn kind(&self) -> GridEventKind {
        match self {
            GridEvent::CellOn { .. } => GridEventKind::CellOn,
            GridEvent::CellOff { .. } => GridEventKind::CellOff,
            GridEvent::Update => GridEventKind::Update,
            GridEvent::Pulse { .. } => GridEventKind::Pulse,
            GridEvent::ActiveColumn(_) => GridEventKind::ActiveColumn,
        }
    }
}

/// Step sequencer grid
///
/// Rows are voices (in configured order), columns are steps. Two kinds of
/// writes exist: system writes (`set_cell`, `clear`) ignore locked columns,
/// user writes (`user_set_cell`, `toggle_cell`) are no-ops on them.
pub struct Grid {
    voices: Vec<Voice>,
    steps: usize,
    cells: Vec<Vec<bool>>,
    locked: Vec<bool>,
    monophonic: bool,
    active_column: Option<usize>,
    listeners: Listeners<GridEvent>,
}

impl Grid {
    /// Create an empty polyphonic grid
    pub fn new(voices: Vec<Voice>, steps: usize) -> Self {
        let mut unique = Vec::with_capacity(voices.len());
        for voice in voices {
            if !unique.contains(&voice) {
                unique.push(voice);
            }
        }

        Self {
            cells: vec![vec![false; steps]; unique.len()],
            voices: unique,
            steps,
            locked: vec![false; steps],
            monophonic: false,
            active_column: None,
            listeners: Listeners::new(),
        }
    }

    /// Allow at most one voice per step
    pub fn with_monophonic(mut self, monophonic: bool) -> Self {
        self.monophonic = monophonic;
        self
    }

    /// Configured voices in row order
    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    /// Number of steps (columns)
    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn is_monophonic(&self) -> bool {
        self.monophonic
    }

    fn coordinate(&self, voice: Voice, step: usize) -> SequencerResult<usize> {
        match self.voices.iter().position(|v| *v == voice) {
            Some(row) if step < self.steps => Ok(row),
            _ => Err(SequencerError::InvalidCoordinate { voice, step }),
        }
    }

    /// Read a cell
    pub fn get_cell(&self, voice: Voice, step: usize) -> SequencerResult<bool> {
        let row = self.coordinate(voice, step)?;
        Ok(self.cells[row][step])
    }

    /// System write: ignores locked columns
    pub fn set_cell(&mut self, voice: Voice, step: usize, on: bool) -> SequencerResult<()> {
        let row = self.coordinate(voice, step)?;
        if self.monophonic && on {
            for cells in self.cells.iter_mut() {
                cells[step] = false;
            }
        }
        self.cells[row][step] = on;
        Ok(())
    }

    /// User write: returns `None` without touching the cell if the step is locked
    pub fn user_set_cell(
        &mut self,
        voice: Voice,
        step: usize,
        on: bool,
    ) -> SequencerResult<Option<bool>> {
        self.coordinate(voice, step)?;
        if self.is_locked(step) {
            return Ok(None);
        }
        self.set_cell(voice, step, on)?;
        let event = if on {
            GridEvent::CellOn { voice, step }
        } else {
            GridEvent::CellOff { voice, step }
        };
        self.listeners.emit(&event);
        self.listeners.emit(&GridEvent::Update);
        Ok(Some(on))
    }

    /// User toggle; returns the new state, or `None` if the step is locked
    pub fn toggle_cell(&mut self, voice: Voice, step: usize) -> SequencerResult<Option<bool>> {
        let on = self.get_cell(voice, step)?;
        self.user_set_cell(voice, step, !on)
    }

    /// Switch off every voice in steps `[from, to)`, clamped to the grid
    pub fn clear(&mut self, from: usize, to: usize) {
        let to = to.min(self.steps);
        for cells in self.cells.iter_mut() {
            for cell in cells.iter_mut().take(to).skip(from) {
                *cell = false;
            }
        }
    }

    /// Switch off every cell
    pub fn clear_all(&mut self) {
        self.clear(0, self.steps);
    }

    /// Snapshot of the grid as a pattern with one entry per step
    pub fn sequence(&self) -> Pattern {
        let mut pattern = Pattern::new(self.steps);
        for step in 0..self.steps {
            for (row, voice) in self.voices.iter().enumerate() {
                if self.cells[row][step] {
                    pattern.insert(step, *voice);
                }
            }
        }
        pattern
    }

    /// Highlighted column, if any
    pub fn active_column(&self) -> Option<usize> {
        self.active_column
    }

    /// Move the highlighted column (presentation only)
    pub fn set_active_column(&mut self, column: Option<usize>) {
        let column = column.filter(|c| *c < self.steps);
        if self.active_column != column {
            self.active_column = column;
            self.listeners.emit(&GridEvent::ActiveColumn(column));
        }
    }

    /// Lock or unlock steps `from..=to` for user edits
    pub fn lock_columns(&mut self, from: usize, to: usize, lock: bool) {
        if self.steps == 0 {
            return;
        }
        for step in from..=to.min(self.steps - 1) {
            self.locked[step] = lock;
        }
    }

    pub fn is_locked(&self, step: usize) -> bool {
        self.locked.get(step).copied().unwrap_or(false)
    }

    /// Visual highlight of one cell
    pub fn pulse_cell(&mut self, voice: Voice, step: usize) -> SequencerResult<()> {
        self.coordinate(voice, step)?;
        self.listeners.emit(&GridEvent::Pulse { voice, step });
        Ok(())
    }

    /// Register a grid listener
    pub fn subscribe<F>(&mut self, kind: GridEventKind, callback: F) -> SubscriptionId
    where
        F: FnMut(&GridEvent) + Send + 'static,
    {
        self.listeners.subscribe(kind, callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "     ")?;
        for step in 0..self.steps {
            let marker = if self.active_column == Some(step) { 'v' } else { ' ' };
            write!(f, "{}", marker)?;
        }
        writeln!(f)?;

        for (row, voice) in self.voices.iter().enumerate() {
            write!(f, "{:>3}  ", voice)?;
            for step in 0..self.steps {
                let symbol = match (self.cells[row][step], self.locked[step]) {
                    (true, _) => 'x',
                    (false, true) => ':',
                    (false, false) => '.',
                };
                write!(f, "{}", symbol)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
