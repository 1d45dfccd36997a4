use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Short notes made of three harmonics over a noise floor.
pub fn synthetic_music(seed: u64, seconds: f64, sample_rate: u32) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let rate = f64::from(sample_rate);
    let len = (seconds * rate) as usize;

    let mut samples = Vec::with_capacity(len);
    let mut partials: Vec<(f64, f64)> = Vec::new();
    let mut note_left = 0;
    for i in 0..len {
        if note_left == 0 {
            note_left = rng.gen_range((0.15 * rate) as usize..(0.45 * rate) as usize);
            let base = rng.gen_range(330.0..900.0);
            partials = (1..=3).map(|h| (base * f64::from(h), rng.gen_range(0.05..0.25))).collect();
        }
        note_left -= 1;

        let t = i as f64 / rate;
        let tone = partials
            .iter()
            .map(|&(freq, amplitude)| amplitude * f64::sin(2.0 * std::f64::consts::PI * freq * t))
            .sum::<f64>();
        samples.push(tone + rng.gen_range(-0.01..0.01));
    }
    samples
}
