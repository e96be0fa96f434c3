use crate::error::ModelError;
use crate::loader::{Batch, DataLoader};
use crate::mnist::MnistSample;
use crate::network::{Network, argmax};
use crate::optimizer::Sgd;
use log::{debug, info};
use ndarray_rand::rand::Rng;

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            epochs: 5,
            batch_size: 64,
            learning_rate: 0.003,
        }
    }
}

// One gradient update: clear the old gradients, run the batch forward, compute the loss and its
// gradients, then move every parameter. Returns the loss measured before the update.
pub fn train_step(network: &mut Network, sgd: &Sgd, batch: &Batch) -> Result<f64, ModelError> {
    sgd.zero_grad(network);
    let pass = network.forward_pass(&batch.inputs)?;
    let loss = network.backward(&pass, &batch.labels)?;
    sgd.step(network);

    Ok(loss)
}

// Trains the network with minibatch stochastic gradient descent. Each epoch the training samples
// are shuffled and split into batches of `config.batch_size`, and the network takes one step per
// batch. Returns the mean batch loss of every epoch.
pub fn train<R: Rng + ?Sized>(
    network: &mut Network,
    samples: &[MnistSample],
    config: &TrainingConfig,
    rng: &mut R,
) -> Result<Vec<f64>, ModelError> {
    let sgd = Sgd::new(config.learning_rate)?;
    let loader = DataLoader::new(samples, config.batch_size, true)?;
    if samples.is_empty() {
        return Err(ModelError::EmptyBatch);
    }

    info!(
        "Training {:?} for {} epochs: {} batches of up to {} samples, learning rate {}",
        network.sizes(),
        config.epochs,
        loader.num_batches(),
        config.batch_size,
        sgd.learning_rate()
    );

    let mut epoch_losses = Vec::with_capacity(config.epochs);
    for epoch in 0..config.epochs {
        let mut running_loss = 0.0;
        let mut steps = 0;

        for batch in loader.batches(rng) {
            let loss = train_step(network, &sgd, &batch?)?;
            debug!("Epoch {epoch} batch {steps}: loss {loss:.5}");
            running_loss += loss;
            steps += 1;
        }

        let mean_loss = running_loss / steps as f64;
        info!(
            "Epoch {}/{}: training loss {mean_loss:.5}",
            epoch + 1,
            config.epochs
        );
        epoch_losses.push(mean_loss);
    }

    Ok(epoch_losses)
}

// Fraction of `samples` whose most probable class matches the label.
pub fn evaluate(
    network: &Network,
    samples: &[MnistSample],
    batch_size: usize,
) -> Result<f64, ModelError> {
    if samples.is_empty() {
        return Err(ModelError::EmptyBatch);
    }

    let mut correct_answers = 0;
    for chunk in samples.chunks(batch_size.max(1)) {
        let batch = Batch::from_samples(&chunk.iter().collect::<Vec<_>>())?;
        let scores = network.logits(&batch.inputs)?;

        correct_answers += scores
            .columns()
            .into_iter()
            .zip(&batch.labels)
            .filter(|(column, label)| argmax(column) == Some(**label))
            .count();
    }

    Ok(correct_answers as f64 / samples.len() as f64)
}
