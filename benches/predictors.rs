//! Benchmarks for the predictor hot paths.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rand::SeedableRng;
use rand::rngs::StdRng;

use spaic::{
    compute::{Dataset, OneHot, Vocabulary, agent::Agent, sequence::SequenceModel},
    schema::{Architecture, EvolutionOptions, ModelConfig},
};

const TEXT: &str = "It read every word it could find, and then it began to write. \
                    What it wrote, it read again. What it read, it learned.";

fn bench_sequence_predict(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequence_predict");
    let vocabulary = Vocabulary::build(TEXT);

    for architecture in [Architecture::Lstm, Architecture::Dense] {
        let mut rng = StdRng::seed_from_u64(1);
        let config = ModelConfig {
            architecture,
            ..Default::default()
        };
        let mut model = SequenceModel::new(config, 20, &vocabulary);
        model.build(&mut rng).unwrap();
        let window = OneHot::new(vocabulary.encode(&TEXT[..20]), vocabulary.len());

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{:?}", architecture)),
            &architecture,
            |b, _| {
                b.iter(|| model.predict(black_box(&window)).unwrap());
            },
        );
    }

    group.finish();
}

fn bench_sequence_train_epoch(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequence_train_epoch");
    group.sample_size(10);
    let vocabulary = Vocabulary::build(TEXT);

    for units in [16, 48] {
        let mut rng = StdRng::seed_from_u64(2);
        let config = ModelConfig {
            units,
            ..Default::default()
        };
        let mut model = SequenceModel::new(config, 20, &vocabulary);
        model.build(&mut rng).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(units), &units, |b, _| {
            b.iter(|| {
                model
                    .train(&vocabulary, black_box(TEXT), 1, 32, &mut rng)
                    .unwrap()
            });
        });
    }

    group.finish();
}

fn bench_agent_activate(c: &mut Criterion) {
    let mut group = c.benchmark_group("agent_activate");

    for hidden in [8, 20, 35] {
        let mut rng = StdRng::seed_from_u64(3);
        let agent = Agent::new("A1", 20, hidden, &mut rng);
        let window: Vec<f32> = (0..20).map(|i| i as f32 / 20.0).collect();

        group.bench_with_input(BenchmarkId::from_parameter(hidden), &hidden, |b, _| {
            b.iter(|| agent.activate(black_box(&window)));
        });
    }

    group.finish();
}

fn bench_agent_evolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("agent_evolve");
    group.sample_size(10);

    let vocabulary = Vocabulary::build(TEXT);
    let samples = Dataset::build(&vocabulary, TEXT, 20, 800).normalized();
    let options = EvolutionOptions {
        iterations: 5,
        target_error: 0.0,
        ..Default::default()
    };

    group.bench_function("5_generations", |b| {
        let mut rng = StdRng::seed_from_u64(4);
        b.iter(|| {
            let mut agent = Agent::new("G1", 20, 20, &mut rng);
            agent.evolve(black_box(&samples), &options, &mut rng)
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_sequence_predict,
    bench_sequence_train_epoch,
    bench_agent_activate,
    bench_agent_evolve
);
criterion_main!(benches);
