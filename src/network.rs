use crate::error::ModelError;
use crate::loss::{log_softmax, nll_loss, nll_loss_backward};
use crate::mnist::{IMAGE_PIXELS, NUM_CLASSES};
use ndarray::{Array, Array1, Array2, Axis};
use ndarray_rand::{RandomExt, rand::Rng, rand_distr::Uniform};

// One affine transformation, z = w.a + b, together with the gradient buffers of its parameters.
// `weight` is [outputs x inputs] and `bias` is [outputs x 1], so a batch of column vectors can be
// transformed at once with the bias broadcast across columns.
pub struct Linear {
    pub weight: Array2<f64>,
    pub bias: Array2<f64>,
    pub weight_grad: Array2<f64>,
    pub bias_grad: Array2<f64>,
}

impl Linear {
    // Weights and biases are drawn uniformly from [-1/sqrt(inputs), 1/sqrt(inputs)], which keeps
    // the scale of each layer's output roughly independent of how wide its input is.
    fn new<R: Rng + ?Sized>(inputs: usize, outputs: usize, rng: &mut R) -> Linear {
        let bound = 1.0 / (inputs as f64).sqrt();
        let distribution = Uniform::new_inclusive(-bound, bound);

        Linear {
            weight: Array::random_using((outputs, inputs), distribution, rng),
            bias: Array::random_using((outputs, 1), distribution, rng),
            weight_grad: Array::zeros((outputs, inputs)),
            bias_grad: Array::zeros((outputs, 1)),
        }
    }

    fn forward(&self, activation: &Array2<f64>) -> Array2<f64> {
        self.weight.dot(activation) + &self.bias
    }

    fn zero_grad(&mut self) {
        self.weight_grad.fill(0.0);
        self.bias_grad.fill(0.0);
    }
}

pub struct Network {
    sizes: Vec<usize>,
    layers: Vec<Linear>,
}

// What backward needs from a forward pass: the input to every layer (the batch itself followed by
// each hidden layer's ReLU output) and the final log-probabilities.
pub struct ForwardPass {
    activations: Vec<Array2<f64>>,
    pub log_probs: Array2<f64>,
}

impl Network {
    // Builds a network whose layer widths are given by `sizes`, input layer first. Every hidden
    // layer is followed by a ReLU; the output layer feeds a log-softmax.
    pub fn new<R: Rng + ?Sized>(sizes: &[usize], rng: &mut R) -> Result<Network, ModelError> {
        if sizes.len() < 2 {
            return Err(ModelError::InvalidConfig(format!(
                "a network needs an input and an output layer, got {} layer(s)",
                sizes.len()
            )));
        }
        if sizes.contains(&0) {
            return Err(ModelError::InvalidConfig(format!(
                "every layer needs at least one neuron, got {sizes:?}"
            )));
        }

        let layers = sizes
            // Pair each size with the following one...
            .windows(2)
            // And make the layer that maps between them.
            .map(|pair| Linear::new(pair[0], pair[1], &mut *rng))
            .collect();

        Ok(Network {
            sizes: sizes.to_vec(),
            layers,
        })
    }

    // A digit classifier: 784 inputs, the given hidden widths, 10 outputs.
    pub fn classifier<R: Rng + ?Sized>(
        hidden: &[usize],
        rng: &mut R,
    ) -> Result<Network, ModelError> {
        let mut sizes = Vec::with_capacity(hidden.len() + 2);
        sizes.push(IMAGE_PIXELS);
        sizes.extend_from_slice(hidden);
        sizes.push(NUM_CLASSES);

        Network::new(&sizes, rng)
    }

    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    pub fn layers(&self) -> &[Linear] {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut [Linear] {
        &mut self.layers
    }

    // Raw class scores for a [inputs x batch] matrix, one column per sample.
    pub fn logits(&self, inputs: &Array2<f64>) -> Result<Array2<f64>, ModelError> {
        self.check_inputs(inputs)?;

        let Some((output, hidden)) = self.layers.split_last() else {
            return Err(ModelError::InvalidConfig(
                "network has no layers".to_string(),
            ));
        };

        let mut activation = inputs.to_owned();
        for layer in hidden {
            activation = layer.forward(&activation);
            activation.mapv_inplace(relu);
        }

        Ok(output.forward(&activation))
    }

    // Log-probabilities over the classes, one column per sample.
    pub fn forward(&self, inputs: &Array2<f64>) -> Result<Array2<f64>, ModelError> {
        Ok(log_softmax(self.logits(inputs)?.view()))
    }

    // Class probabilities for a single flattened image.
    pub fn predict(&self, image: &Array1<f64>) -> Result<Array1<f64>, ModelError> {
        let inputs = image.view().insert_axis(Axis(1)).to_owned();
        let log_probs = self.forward(&inputs)?;

        Ok(log_probs.column(0).mapv(f64::exp))
    }

    // Same as `forward`, but keeps every layer's input so that `backward` can replay the pass in
    // reverse.
    pub fn forward_pass(&self, inputs: &Array2<f64>) -> Result<ForwardPass, ModelError> {
        self.check_inputs(inputs)?;

        let mut activations = Vec::with_capacity(self.layers.len());
        let mut activation = inputs.to_owned();

        for (index, layer) in self.layers.iter().enumerate() {
            let mut z = layer.forward(&activation);
            if index + 1 < self.layers.len() {
                z.mapv_inplace(relu);
            }
            activations.push(activation);
            activation = z;
        }

        Ok(ForwardPass {
            activations,
            log_probs: log_softmax(activation.view()),
        })
    }

    // Computes the mean negative log-likelihood of `labels` under `pass` and adds its gradient with
    // respect to every weight and bias into the layers' gradient buffers. The buffers accumulate
    // across calls until `zero_grad` clears them. Returns the loss.
    pub fn backward(&mut self, pass: &ForwardPass, labels: &[usize]) -> Result<f64, ModelError> {
        if pass.activations.len() != self.layers.len() {
            return Err(ModelError::ShapeMismatch {
                what: "recorded layers",
                got: pass.activations.len(),
                expected: self.layers.len(),
            });
        }

        // The pass must have come from a network with these layer widths and the batch must match
        // the labels, otherwise the products below don't line up.
        for (activation, &width) in pass.activations.iter().zip(&self.sizes) {
            if activation.nrows() != width {
                return Err(ModelError::ShapeMismatch {
                    what: "recorded layer width",
                    got: activation.nrows(),
                    expected: width,
                });
            }
            if activation.ncols() != labels.len() {
                return Err(ModelError::ShapeMismatch {
                    what: "recorded batch",
                    got: activation.ncols(),
                    expected: labels.len(),
                });
            }
        }
        let outputs = self.sizes[self.sizes.len() - 1];
        if pass.log_probs.nrows() != outputs {
            return Err(ModelError::ShapeMismatch {
                what: "recorded outputs",
                got: pass.log_probs.nrows(),
                expected: outputs,
            });
        }

        let loss = nll_loss(pass.log_probs.view(), labels)?;

        // delta holds dLoss/dz for the current layer, one column per sample. Walk the layers from
        // the output back to the input.
        let mut delta = nll_loss_backward(pass.log_probs.view(), labels)?;

        for index in (0..self.layers.len()).rev() {
            let input = &pass.activations[index];
            let layer = &mut self.layers[index];

            // Summing the per-sample gradients over the batch falls out of the matrix product for
            // the weights, and is an explicit sum across columns for the biases.
            layer.weight_grad += &delta.dot(&input.t());
            layer.bias_grad += &delta.sum_axis(Axis(1)).insert_axis(Axis(1));

            if index > 0 {
                // `input` is the ReLU output of the previous layer, which is positive exactly
                // where the ReLU let its input through.
                delta = layer.weight.t().dot(&delta);
                delta.zip_mut_with(input, |d, &a| {
                    if a <= 0.0 {
                        *d = 0.0;
                    }
                });
            }
        }

        Ok(loss)
    }

    pub fn zero_grad(&mut self) {
        for layer in &mut self.layers {
            layer.zero_grad();
        }
    }

    fn check_inputs(&self, inputs: &Array2<f64>) -> Result<(), ModelError> {
        if inputs.nrows() != self.sizes[0] {
            return Err(ModelError::ShapeMismatch {
                what: "input rows",
                got: inputs.nrows(),
                expected: self.sizes[0],
            });
        }
        Ok(())
    }
}

// The index of the largest entry, i.e. the predicted class of a probability or score column.
pub fn argmax<'a>(values: impl IntoIterator<Item = &'a f64>) -> Option<usize> {
    values
        .into_iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(index, _)| index)
}

fn relu(z: f64) -> f64 {
    z.max(0.0)
}
