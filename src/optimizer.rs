use crate::error::ModelError;
use crate::network::Network;

// Plain stochastic gradient descent: every parameter moves against its gradient by a fixed step.
pub struct Sgd {
    learning_rate: f64,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Result<Sgd, ModelError> {
        if !learning_rate.is_finite() || learning_rate <= 0.0 {
            return Err(ModelError::InvalidConfig(format!(
                "learning rate must be a positive number, got {learning_rate}"
            )));
        }

        Ok(Sgd { learning_rate })
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    // parameter -= learning_rate * gradient, for every weight and bias.
    pub fn step(&self, network: &mut Network) {
        for layer in network.layers_mut() {
            layer
                .weight
                .scaled_add(-self.learning_rate, &layer.weight_grad);
            layer.bias.scaled_add(-self.learning_rate, &layer.bias_grad);
        }
    }

    // Clears the gradient buffers so the next backward pass starts from zero instead of adding to
    // the previous step's gradients.
    pub fn zero_grad(&self, network: &mut Network) {
        network.zero_grad();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array, Array2};
    use ndarray_rand::RandomExt;
    use ndarray_rand::rand::{SeedableRng, rngs::StdRng};
    use ndarray_rand::rand_distr::StandardNormal;

    #[test]
    fn rejects_unusable_learning_rates() {
        for learning_rate in [0.0, -0.1, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                Sgd::new(learning_rate),
                Err(ModelError::InvalidConfig(_))
            ));
        }
        assert_eq!(Sgd::new(0.003).unwrap().learning_rate(), 0.003);
    }

    #[test]
    fn step_moves_parameters_against_the_gradient() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut network = Network::new(&[2, 10], &mut rng).unwrap();
        let before = network.layers()[0].weight.clone();
        let bias_before = network.layers()[0].bias.clone();
        network.layers_mut()[0].weight_grad.fill(2.0);
        network.layers_mut()[0].bias_grad.fill(-1.0);

        Sgd::new(0.5).unwrap().step(&mut network);

        let layer = &network.layers()[0];
        assert!(
            layer
                .weight
                .iter()
                .zip(&before)
                .all(|(after, before)| (after - (before - 1.0)).abs() < 1e-12)
        );
        assert!(
            layer
                .bias
                .iter()
                .zip(&bias_before)
                .all(|(after, before)| (after - (before + 0.5)).abs() < 1e-12)
        );
    }

    // Once the buffers are zeroed, a step whose backward pass contributed nothing leaves the
    // parameters exactly where they were, rather than replaying the step before it.
    #[test]
    fn zeroed_gradients_do_not_leak_into_later_steps() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut network = Network::new(&[4, 3, 10], &mut rng).unwrap();
        let sgd = Sgd::new(0.1).unwrap();
        let inputs: Array2<f64> = Array::random_using((4, 5), StandardNormal, &mut rng);
        let labels = [0, 1, 2, 3, 4];

        // Step N: a real gradient.
        sgd.zero_grad(&mut network);
        let pass = network.forward_pass(&inputs).unwrap();
        network.backward(&pass, &labels).unwrap();
        assert!(network.layers()[1].weight_grad.iter().any(|&g| g != 0.0));
        sgd.step(&mut network);

        // Step N+1: the gradient is zero.
        sgd.zero_grad(&mut network);
        let after_n: Vec<Array2<f64>> = network
            .layers()
            .iter()
            .map(|layer| layer.weight.clone())
            .collect();
        sgd.step(&mut network);

        for (layer, expected) in network.layers().iter().zip(&after_n) {
            assert_eq!(&layer.weight, expected);
        }

        // Step N+2 sees only its own gradient.
        sgd.zero_grad(&mut network);
        let pass = network.forward_pass(&inputs).unwrap();
        network.backward(&pass, &labels).unwrap();
        let fresh = network.layers()[1].weight_grad.clone();

        let mut reference = Network::new(&[4, 3, 10], &mut StdRng::seed_from_u64(99)).unwrap();
        for (target, source) in reference.layers_mut().iter_mut().zip(network.layers()) {
            target.weight = source.weight.clone();
            target.bias = source.bias.clone();
        }
        let pass = reference.forward_pass(&inputs).unwrap();
        reference.backward(&pass, &labels).unwrap();

        assert!(
            fresh
                .iter()
                .zip(&reference.layers()[1].weight_grad)
                .all(|(a, b)| (a - b).abs() < 1e-12)
        );
    }
}
