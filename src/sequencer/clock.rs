// Step clock - Background thread emitting one tick per sixteenth note

use crate::sequencer::transport::Clock;
use ringbuf::traits::Producer;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

pub type TickProducer = ringbuf::HeapProd<ClockTick>;
pub type TickConsumer = ringbuf::HeapCons<ClockTick>;

/// One step of the loop became due
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockTick {
    pub step: usize,
    pub at: Instant,
}

/// Duration of one sixteenth note
pub fn step_duration(bpm: f64) -> Duration {
    Duration::from_secs_f64(60.0 / bpm.max(1.0) / 4.0)
}

struct ClockShared {
    running: AtomicBool,
    restart: AtomicBool,
    shutdown: AtomicBool,
    bpm_bits: AtomicU64,
}

/// Wall-clock step generator
///
/// The thread is spawned by `bootstrap`. Ticks go into a ringbuf producer;
/// a full buffer drops the tick.
pub struct StepClock {
    steps: usize,
    shared: Arc<ClockShared>,
    tick_tx: Arc<Mutex<TickProducer>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl StepClock {
    pub fn new(steps: usize, tick_tx: TickProducer) -> Self {
        Self {
            steps: steps.max(1),
            shared: Arc::new(ClockShared {
                running: AtomicBool::new(false),
                restart: AtomicBool::new(false),
                shutdown: AtomicBool::new(false),
                bpm_bits: AtomicU64::new(120.0f64.to_bits()),
            }),
            tick_tx: Arc::new(Mutex::new(tick_tx)),
            handle: None,
        }
    }

    pub fn bpm(&self) -> f64 {
        f64::from_bits(self.shared.bpm_bits.load(Ordering::Relaxed))
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Relaxed)
    }

    fn spawn(&mut self) {
        let shared = Arc::clone(&self.shared);
        let tick_tx = Arc::clone(&self.tick_tx);
        let steps = self.steps;

        let handle = thread::spawn(move || {
            let mut step = 0;
            let mut next_tick = Instant::now();

            while !shared.shutdown.load(Ordering::Relaxed) {
                if !shared.running.load(Ordering::Relaxed) {
                    thread::sleep(Duration::from_millis(2));
                    continue;
                }

                if shared.restart.swap(false, Ordering::Relaxed) {
                    step = 0;
                    next_tick = Instant::now();
                }

                let now = Instant::now();
                if now >= next_tick {
                    let tick = ClockTick { step, at: next_tick };
                    if let Ok(mut tx) = tick_tx.try_lock() {
                        let _ = tx.try_push(tick);
                    }
                    step = (step + 1) % steps;
                    let bpm = f64::from_bits(shared.bpm_bits.load(Ordering::Relaxed));
                    next_tick += step_duration(bpm);
                    // Do not try to catch up after a long stall
                    if next_tick < now {
                        next_tick = now;
                    }
                } else {
                    thread::sleep((next_tick - now).min(Duration::from_millis(1)));
                }
            }
        });

        self.handle = Some(handle);
    }
}

impl Clock for StepClock {
    fn bootstrap(&mut self) {
        if self.handle.is_none() {
            self.spawn();
            log::info!("Step clock thread started");
        }
    }

    fn start(&mut self) {
        self.shared.restart.store(true, Ordering::Relaxed);
        self.shared.running.store(true, Ordering::Relaxed);
    }

    fn stop(&mut self) {
        self.shared.running.store(false, Ordering::Relaxed);
    }

    fn set_bpm(&mut self, bpm: f64) {
        self.shared.bpm_bits.store(bpm.to_bits(), Ordering::Relaxed);
    }
}

impl Drop for StepClock {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringbuf::HeapRb;
    use ringbuf::traits::{Consumer, Split};

    #[test]
    fn test_step_duration() {
        assert_eq!(step_duration(60.0), Duration::from_millis(250));
        assert_eq!(step_duration(120.0), Duration::from_millis(125));
    }

    #[test]
    fn test_clock_emits_wrapping_steps() {
        let (tx, mut rx) = HeapRb::<ClockTick>::new(64).split();
        let mut clock = StepClock::new(4, tx);
        clock.set_bpm(1200.0); // 12.5 ms per step
        clock.bootstrap();
        clock.start();

        thread::sleep(Duration::from_millis(150));
        clock.stop();

        let mut steps = Vec::new();
        while let Some(tick) = rx.try_pop() {
            steps.push(tick.step);
        }
        assert!(steps.len() >= 5, "got {:?}", steps);
        assert_eq!(&steps[..5], &[0, 1, 2, 3, 0]);
    }

    #[test]
    fn test_stopped_clock_is_silent() {
        let (tx, mut rx) = HeapRb::<ClockTick>::new(8).split();
        let mut clock = StepClock::new(16, tx);
        clock.bootstrap();
        thread::sleep(Duration::from_millis(20));
        assert!(!clock.is_running());
        assert!(rx.try_pop().is_none());
    }
}
