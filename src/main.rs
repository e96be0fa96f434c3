use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use mnist_mlp::mnist::MnistData;
use mnist_mlp::network::{Network, argmax};
use mnist_mlp::train::{self, TrainingConfig};
use mnist_mlp::view;
use ndarray_rand::rand::{Rng, SeedableRng, rngs::StdRng};
use std::path::PathBuf;

/// Trains a small fully connected network to classify MNIST handwritten digits.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Directory holding the four MNIST IDX files, gzip-compressed or raw
    #[arg(default_value = "data")]
    data_dir: PathBuf,

    /// Number of passes over the training set
    #[arg(long, default_value_t = 5)]
    epochs: usize,

    /// Samples per gradient update
    #[arg(long, default_value_t = 64)]
    batch_size: usize,

    /// Step size of stochastic gradient descent
    #[arg(long, default_value_t = 0.003)]
    learning_rate: f64,

    /// Widths of the hidden layers, comma separated
    #[arg(long, value_delimiter = ',', default_value = "128,64")]
    hidden: Vec<usize>,

    /// Seed for weight initialization and shuffling; random when omitted
    #[arg(long)]
    seed: Option<u64>,

    /// Print one test image next to the network's class probabilities
    #[arg(long)]
    show: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = TrainingConfig {
        epochs: args.epochs,
        batch_size: args.batch_size,
        learning_rate: args.learning_rate,
    };

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => {
            warn!("No --seed given, this run will not be reproducible");
            StdRng::from_entropy()
        }
    };

    let mnist_data = MnistData::load(&args.data_dir)
        .with_context(|| format!("failed to load MNIST from {}", args.data_dir.display()))?;

    let mut network =
        Network::classifier(&args.hidden, &mut rng).context("failed to build the network")?;

    train::train(&mut network, &mnist_data.training_data, &config, &mut rng)
        .context("training failed")?;

    let accuracy = train::evaluate(&network, &mnist_data.test_data, config.batch_size)
        .context("evaluation failed")?;
    info!(
        "Test accuracy: {:.2}% of {} images",
        accuracy * 100.0,
        mnist_data.test_data.len()
    );

    if args.show {
        let sample = &mnist_data.test_data[rng.gen_range(0..mnist_data.test_data.len())];
        let probabilities = network.predict(&sample.image)?;

        println!("{}", view::render_digit(&sample.image));
        print!("{}", view::render_probabilities(&probabilities));
        println!(
            "Predicted {}, labelled {}",
            argmax(&probabilities).unwrap_or_default(),
            sample.label
        );
    }

    Ok(())
}
