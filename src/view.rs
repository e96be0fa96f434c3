use crate::mnist::{IMAGE_COLUMNS, IMAGE_PIXELS};
use ndarray::Array1;

const BAR_WIDTH: usize = 40;

// A text picture of a normalized digit, one line per pixel row. Darker shading means a higher
// intensity. Input values are expected in [-1, 1].
pub fn render_digit(image: &Array1<f64>) -> String {
    let mut picture = String::with_capacity(IMAGE_PIXELS * 4);

    for (index, &value) in image.iter().enumerate() {
        if index > 0 && index % IMAGE_COLUMNS == 0 {
            picture.push('\n');
        }

        // Map [-1, 1] back to [0, 1] before picking a shade.
        let intensity = (value + 1.0) / 2.0;
        let shade = match intensity {
            a if a < 0.2 => ' ',
            a if a < 0.4 => '░',
            a if a < 0.6 => '▒',
            a if a < 0.8 => '▓',
            _ => '█',
        };
        picture.push(shade);
    }

    picture
}

// A horizontal bar chart of class probabilities, one line per class.
pub fn render_probabilities(probabilities: &Array1<f64>) -> String {
    let mut chart = String::new();

    for (class, &probability) in probabilities.iter().enumerate() {
        let filled = (probability.clamp(0.0, 1.0) * BAR_WIDTH as f64).round() as usize;
        chart.push_str(&format!(
            "{class} |{}{}| {probability:.4}\n",
            "█".repeat(filled),
            " ".repeat(BAR_WIDTH - filled)
        ));
    }

    chart
}
