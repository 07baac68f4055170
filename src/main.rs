//! spaic CLI - Run a self-training session from JSON configuration.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use spaic::{
    Session, SessionError,
    compute::{DEFAULT_PADDING, NetworkLayout},
    schema::SessionConfig,
};

const DEFAULT_CORPUS: &str = "\
Once upon a time there was a small machine that liked to read.
It read every word it could find, and then it began to write.
What it wrote, it read again. What it read, it learned.
And so the little machine kept writing, one letter at a time.
";

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <config.json> [ticks] [corpus.txt]", args[0]);
        eprintln!();
        eprintln!("Run a self-feeding text generation session from JSON configuration.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  config.json  Path to session configuration file");
        eprintln!("  ticks        Number of self-training ticks (default: 5)");
        eprintln!("  corpus.txt   Initial corpus (default: built-in text)");
        eprintln!();
        eprintln!("Example configuration is generated with --example flag.");
        std::process::exit(1);
    }

    if args[1] == "--example" {
        print_example_config();
        return;
    }

    let config_path = PathBuf::from(&args[1]);
    let ticks: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(5);

    let config_str = fs::read_to_string(&config_path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        std::process::exit(1);
    });

    let config: SessionConfig = serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        std::process::exit(1);
    });

    let corpus = match args.get(3) {
        Some(path) => fs::read_to_string(path).unwrap_or_else(|e| {
            eprintln!("Error reading corpus file: {}", e);
            std::process::exit(1);
        }),
        None => DEFAULT_CORPUS.to_string(),
    };

    let output_path = config_path.with_extension("corpus.txt");
    if let Err(e) = run(config, corpus, ticks, &output_path) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(
    config: SessionConfig,
    corpus: String,
    ticks: usize,
    output_path: &std::path::Path,
) -> Result<(), SessionError> {
    println!("spaic Self-Training Session");
    println!("===========================");
    println!("Window: {} characters", config.window_length);
    println!("Model: {:?}, {} units", config.model.architecture, config.model.units);
    println!(
        "Agents: {} (search population {}, {} generations)",
        config.population_size, config.evolution.population_size, config.evolution.iterations
    );
    println!("Ticks: {}", ticks);
    println!();

    let mut session = Session::with_corpus(config, corpus)?;
    println!("Initial corpus: {} characters", session.corpus().char_len());
    println!(
        "Vocabulary: {} characters",
        session.refresh_vocabulary().len()
    );
    println!();

    let start = Instant::now();

    println!("Training sequence model...");
    match session.train_model_with_progress(|p| {
        println!("  Epoch {}/{}: loss={:.4}", p.epoch, p.epochs, p.loss);
    }) {
        Ok(_) => {}
        Err(SessionError::InsufficientData { needed, available }) => {
            println!(
                "  Skipped: need {} characters, corpus has {}",
                needed, available
            );
        }
        Err(e) => return Err(e),
    }
    if let Some(model) = session.model() {
        println!(
            "  {:?} model, {} parameters",
            model.architecture(),
            model.parameter_count()
        );
    }
    println!();

    println!("Evolving agent population...");
    match session.evolve_population_with_progress(|p| {
        let status = if p.evolved { "ok" } else { "failed" };
        println!("  Agent {}/{} {}: {}", p.index, p.total, p.id, status);
    }) {
        Ok(_) => {}
        Err(SessionError::InsufficientData { needed, available }) => {
            println!(
                "  Skipped: need {} characters, corpus has {}",
                needed, available
            );
        }
        Err(e) => return Err(e),
    }
    println!();

    if ticks > 0 {
        println!("Running self-training loop...");
    }
    for i in 0..ticks {
        match session.tick() {
            Ok(report) => {
                let loss = report
                    .retrain_loss
                    .map_or_else(|| "-".to_string(), |l| format!("{:.4}", l));
                println!(
                    "  Tick {}/{}: {} blocks, corpus {} -> {}, loss={}",
                    i + 1,
                    ticks,
                    report.generated.len(),
                    report.corpus_before,
                    report.corpus_after,
                    loss
                );
            }
            Err(e @ SessionError::ModelUnavailable(_)) => {
                println!("  {}", e);
                break;
            }
            Err(e) => return Err(e),
        }
    }
    println!();

    if session.model().is_some() {
        let sample = session.generate_from_model()?;
        println!("Sequence model sample:");
        println!("{}", sample.text);
        println!();
    }
    if !session.population().is_empty() {
        let sample = session.generate_from_agent()?;
        println!("Agent {} sample:", sample.source);
        println!("{}", sample.text);
        println!();

        if let Some(agent) = session.population().agents().first() {
            let layout = NetworkLayout::compute(&agent.snapshot(), 600.0, 400.0, DEFAULT_PADDING);
            println!(
                "Agent {} layout: {} nodes, {} edges",
                agent.id(),
                layout.nodes.len(),
                layout.edges.len()
            );
            log::debug!(
                "{}",
                serde_json::to_string(&layout).unwrap_or_else(|e| e.to_string())
            );
        }
    }

    session.export_corpus(output_path)?;

    let elapsed = start.elapsed();
    println!();
    println!(
        "Final corpus: {} characters written to {}",
        session.corpus().char_len(),
        output_path.display()
    );
    println!("Time: {:.2}s", elapsed.as_secs_f32());
    Ok(())
}

fn print_example_config() {
    let config = SessionConfig::default();

    println!("Example configuration (config.json):");
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing config: {}", e),
    }
}
