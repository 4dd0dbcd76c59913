use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use mmi_drums::bridge::protocol;
use mmi_drums::generation::note_seq::NoteSequence;
use mmi_drums::generation::{Continuation, ContinuationNote, place_continuation, random_pattern};
use mmi_drums::sequencer::{Grid, Voice};
use rand::SeedableRng;
use rand::rngs::StdRng;

const VOICES: [Voice; 9] = [36, 38, 42, 46, 45, 48, 50, 49, 51];

fn busy_grid() -> Grid {
    let mut grid = Grid::new(VOICES.to_vec(), 16);
    for step in 0..16 {
        for (row, voice) in VOICES.iter().enumerate() {
            if (step + row) % 3 == 0 {
                let _ = grid.set_cell(*voice, step, true);
            }
        }
    }
    grid
}

/// Grid snapshot and wire flattening run on every generation
fn bench_sequence_and_wire(c: &mut Criterion) {
    let grid = busy_grid();

    c.bench_function("grid_sequence", |b| b.iter(|| black_box(grid.sequence())));

    let pattern = grid.sequence();
    c.bench_function("pattern_to_wire", |b| {
        b.iter(|| black_box(pattern.to_wire_format()))
    });

    let wire = pattern.to_wire_format();
    c.bench_function("wire_to_osc", |b| {
        b.iter(|| {
            let [notes, steps] = protocol::pattern_messages(&wire.notes, &wire.steps, false);
            black_box(protocol::encode(&notes).ok());
            black_box(protocol::encode(&steps).ok());
        })
    });
}

/// Continuation placement and random generation
fn bench_generation(c: &mut Criterion) {
    let seed = busy_grid().sequence().slice(0..6);
    let mut group = c.benchmark_group("placement");

    for notes in [4usize, 32, 128] {
        let continuation = Continuation::new(
            (0..notes)
                .map(|i| ContinuationNote::new(VOICES[i % VOICES.len()], (i % 14) as i32 - 2))
                .collect(),
        );
        group.bench_with_input(BenchmarkId::from_parameter(notes), &continuation, |b, c| {
            b.iter(|| black_box(place_continuation(&seed, c, 16, &VOICES)))
        });
    }
    group.finish();

    let mut rng = StdRng::seed_from_u64(0);
    c.bench_function("random_pattern", |b| {
        b.iter(|| black_box(random_pattern(&seed, &VOICES, 16, 0.15, &mut rng)))
    });

    c.bench_function("note_sequence_encoding", |b| {
        b.iter(|| black_box(NoteSequence::from_pattern(&seed, 4, 120.0)))
    });
}

criterion_group!(benches, bench_sequence_and_wire, bench_generation);
criterion_main!(benches);
