// Transition - Column-by-column pattern replacement
// Rewrites a grid range left to right over a fixed duration

use crate::sequencer::grid::Grid;
use crate::sequencer::pattern::Pattern;
use crate::sequencer::{SequencerResult, Voice};
use std::time::{Duration, Instant};

/// Callbacks invoked while a transition rewrites the grid
pub trait TransitionHooks {
    /// Called once before the first column is written
    fn on_start(&mut self, _grid: &mut Grid, _start_col: usize, _end_col: usize) -> SequencerResult<()> {
        Ok(())
    }

    /// Called for every voice of every written column
    fn on_cell(&mut self, _grid: &mut Grid, _voice: Voice, _col: usize, _on: bool) -> SequencerResult<()> {
        Ok(())
    }

    /// Called once after the last column
    fn on_end(&mut self, _grid: &mut Grid) {}
}

impl TransitionHooks for () {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionStatus {
    Pending,
    Running,
    Finished,
    Aborted,
}

/// A steppable transition over columns `start_col..=end_col`
///
/// Column `k` of the range is due `k * interval` after `start`. Nothing is
/// scheduled internally: the owner calls `poll` with the current time, or
/// `step`/`finish` to drive it synchronously.
#[derive(Debug, Clone)]
pub struct PatternTransition {
    target: Pattern,
    start_col: usize,
    end_col: usize,
    interval: Duration,
    next_col: usize,
    started_at: Option<Instant>,
    status: TransitionStatus,
}

impl PatternTransition {
    /// Returns `None` for an empty range (`end_col < start_col`)
    pub fn new(target: Pattern, duration: Duration, start_col: usize, end_col: usize) -> Option<Self> {
        if end_col < start_col {
            return None;
        }
        let columns = (end_col - start_col + 1) as u32;
        Some(Self {
            target,
            start_col,
            end_col,
            interval: duration / columns,
            next_col: start_col,
            started_at: None,
            status: TransitionStatus::Pending,
        })
    }

    pub fn status(&self) -> TransitionStatus {
        self.status
    }

    pub fn is_done(&self) -> bool {
        matches!(self.status, TransitionStatus::Finished | TransitionStatus::Aborted)
    }

    /// Delay between two column writes
    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn range(&self) -> (usize, usize) {
        (self.start_col, self.end_col)
    }

    pub fn target(&self) -> &Pattern {
        &self.target
    }

    /// When the next column becomes due, if any remain
    pub fn next_due(&self) -> Option<Instant> {
        if self.status != TransitionStatus::Running {
            return None;
        }
        let started = self.started_at?;
        let offset = (self.next_col - self.start_col) as u32;
        Some(started + self.interval * offset)
    }

    /// Run `on_start` and write the first column
    pub fn start<H: TransitionHooks + ?Sized>(
        &mut self,
        grid: &mut Grid,
        hooks: &mut H,
        now: Instant,
    ) -> SequencerResult<TransitionStatus> {
        if self.status != TransitionStatus::Pending {
            return Ok(self.status);
        }
        self.status = TransitionStatus::Running;
        self.started_at = Some(now);
        if let Err(e) = hooks.on_start(grid, self.start_col, self.end_col) {
            self.status = TransitionStatus::Aborted;
            return Err(e);
        }
        self.step(grid, hooks)
    }

    /// Write every column whose due time has passed
    pub fn poll<H: TransitionHooks + ?Sized>(
        &mut self,
        grid: &mut Grid,
        hooks: &mut H,
        now: Instant,
    ) -> SequencerResult<TransitionStatus> {
        while let Some(due) = self.next_due() {
            if due > now {
                break;
            }
            self.step(grid, hooks)?;
        }
        Ok(self.status)
    }

    /// Write the next column regardless of time
    pub fn step<H: TransitionHooks + ?Sized>(
        &mut self,
        grid: &mut Grid,
        hooks: &mut H,
    ) -> SequencerResult<TransitionStatus> {
        if self.status != TransitionStatus::Running {
            return Ok(self.status);
        }

        let col = self.next_col;
        if let Err(e) = self.write_column(grid, hooks, col) {
            self.status = TransitionStatus::Aborted;
            return Err(e);
        }

        self.next_col += 1;
        if self.next_col > self.end_col {
            self.status = TransitionStatus::Finished;
            hooks.on_end(grid);
        }
        Ok(self.status)
    }

    /// Write all remaining columns immediately
    pub fn finish<H: TransitionHooks + ?Sized>(
        &mut self,
        grid: &mut Grid,
        hooks: &mut H,
    ) -> SequencerResult<TransitionStatus> {
        while self.status == TransitionStatus::Running {
            self.step(grid, hooks)?;
        }
        Ok(self.status)
    }

    fn write_column<H: TransitionHooks + ?Sized>(
        &self,
        grid: &mut Grid,
        hooks: &mut H,
        col: usize,
    ) -> SequencerResult<()> {
        let voices = grid.voices().to_vec();
        for voice in voices {
            let on = self.target.contains(col, voice);
            grid.set_cell(voice, col, on)?;
            hooks.on_cell(grid, voice, col, on)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::SequencerError;

    #[derive(Default)]
    struct Recorder {
        started: bool,
        cells: Vec<(Voice, usize, bool)>,
        ended: usize,
    }

    impl TransitionHooks for Recorder {
        fn on_start(&mut self, grid: &mut Grid, start_col: usize, end_col: usize) -> SequencerResult<()> {
            self.started = true;
            grid.clear(start_col, end_col + 1);
            Ok(())
        }

        fn on_cell(&mut self, _grid: &mut Grid, voice: Voice, col: usize, on: bool) -> SequencerResult<()> {
            self.cells.push((voice, col, on));
            Ok(())
        }

        fn on_end(&mut self, _grid: &mut Grid) {
            self.ended += 1;
        }
    }

    fn target() -> Pattern {
        let mut pattern = Pattern::new(16);
        pattern.insert(6, 36);
        pattern.insert(9, 38);
        pattern
    }

    #[test]
    fn test_empty_range_is_noop() {
        assert!(PatternTransition::new(target(), Duration::from_millis(600), 8, 7).is_none());
    }

    #[test]
    fn test_interval() {
        let transition =
            PatternTransition::new(target(), Duration::from_millis(600), 6, 15).unwrap();
        assert_eq!(transition.interval(), Duration::from_millis(60));
    }

    #[test]
    fn test_start_writes_first_column() {
        let mut grid = Grid::new(vec![36, 38], 16);
        let mut hooks = Recorder::default();
        let mut transition =
            PatternTransition::new(target(), Duration::from_millis(600), 6, 15).unwrap();

        let status = transition.start(&mut grid, &mut hooks, Instant::now()).unwrap();
        assert_eq!(status, TransitionStatus::Running);
        assert!(hooks.started);
        assert_eq!(hooks.cells, vec![(36, 6, true), (38, 6, false)]);
        assert!(grid.get_cell(36, 6).unwrap());
    }

    #[test]
    fn test_poll_follows_schedule() {
        let mut grid = Grid::new(vec![36, 38], 16);
        let mut hooks = Recorder::default();
        let mut transition =
            PatternTransition::new(target(), Duration::from_millis(100), 6, 15).unwrap();
        let t0 = Instant::now();

        transition.start(&mut grid, &mut hooks, t0).unwrap();
        transition
            .poll(&mut grid, &mut hooks, t0 + Duration::from_millis(35))
            .unwrap();
        // columns 6, 7, 8, 9 written (due at 0, 10, 20, 30 ms)
        assert_eq!(hooks.cells.len(), 8);
        assert!(grid.get_cell(38, 9).unwrap());

        let status = transition
            .poll(&mut grid, &mut hooks, t0 + Duration::from_secs(1))
            .unwrap();
        assert_eq!(status, TransitionStatus::Finished);
        assert_eq!(hooks.ended, 1);
        assert_eq!(transition.next_due(), None);
    }

    #[test]
    fn test_finish_leaves_outside_untouched() {
        let mut grid = Grid::new(vec![36, 38], 16);
        grid.set_cell(36, 0, true).unwrap();
        grid.set_cell(38, 12, true).unwrap();

        let mut hooks = Recorder::default();
        let mut transition =
            PatternTransition::new(target(), Duration::from_millis(600), 6, 10).unwrap();
        transition.start(&mut grid, &mut hooks, Instant::now()).unwrap();
        transition.finish(&mut grid, &mut hooks).unwrap();

        assert!(grid.get_cell(36, 0).unwrap());
        assert!(grid.get_cell(38, 12).unwrap());
        assert!(grid.get_cell(36, 6).unwrap());
        assert!(grid.get_cell(38, 9).unwrap());
        assert_eq!(hooks.ended, 1);

        // finishing twice does not call on_end again
        transition.finish(&mut grid, &mut hooks).unwrap();
        assert_eq!(hooks.ended, 1);
    }

    #[test]
    fn test_out_of_range_aborts_without_rollback() {
        let mut grid = Grid::new(vec![36, 38], 8);
        let mut transition =
            PatternTransition::new(target(), Duration::from_millis(100), 6, 9).unwrap();

        transition.start(&mut grid, &mut (), Instant::now()).unwrap();
        transition.step(&mut grid, &mut ()).unwrap();
        let result = transition.step(&mut grid, &mut ());

        assert_eq!(
            result,
            Err(SequencerError::InvalidCoordinate { voice: 36, step: 8 })
        );
        assert_eq!(transition.status(), TransitionStatus::Aborted);
        assert!(grid.get_cell(36, 6).unwrap());
    }
}
