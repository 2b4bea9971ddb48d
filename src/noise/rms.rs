//! Windowed RMS-matching gain compensator with hysteresis and one-pole
//! smoothing, used both after the optional Butterworth shelves (§4.5.3,
//! window 16384, 10% hysteresis, alpha 0.99995) and after the swept-notch
//! overlap-add cascade (§4.5.4, 20% hysteresis, alpha 0.998).

pub struct RmsCompensator {
    window: usize,
    hysteresis_frac: f64,
    alpha: f64,
    sum_sq_pre: f64,
    sum_sq_post: f64,
    count: usize,
    target_gain: f64,
    applied_gain: f64,
    first_window: bool,
}

impl RmsCompensator {
    pub fn new(window: usize, hysteresis_frac: f64, alpha: f64) -> Self {
        Self {
            window: window.max(1),
            hysteresis_frac,
            alpha,
            sum_sq_pre: 0.0,
            sum_sq_post: 0.0,
            count: 0,
            target_gain: 1.0,
            applied_gain: 1.0,
            first_window: true,
        }
    }

    /// Applies the currently smoothed gain to `post` sample-by-sample while
    /// accumulating pre/post energy; re-evaluates the target gain once a
    /// full window has been observed.
    pub fn process(&mut self, pre: &[f64], post: &mut [f64]) {
        debug_assert_eq!(pre.len(), post.len());
        for i in 0..post.len() {
            self.sum_sq_pre += pre[i] * pre[i];
            self.sum_sq_post += post[i] * post[i];
            self.count += 1;

            self.applied_gain = self.applied_gain * self.alpha + self.target_gain * (1.0 - self.alpha);
            post[i] *= self.applied_gain;

            if self.count >= self.window {
                self.evaluate_window();
            }
        }
    }

    fn evaluate_window(&mut self) {
        let rms_pre = (self.sum_sq_pre / self.count as f64).sqrt();
        let rms_post = (self.sum_sq_post / self.count as f64).sqrt();

        if rms_post > 1e-9 {
            let candidate = (rms_pre / rms_post).clamp(0.25, 16.0);
            let modulated = rms_pre > 1e-6;
            let relative_change = if self.target_gain > 1e-9 {
                ((candidate - self.target_gain) / self.target_gain).abs()
            } else {
                1.0
            };

            if self.first_window || (relative_change > self.hysteresis_frac && modulated) {
                self.target_gain = candidate;
                self.first_window = false;
            }
        }

        self.sum_sq_pre = 0.0;
        self.sum_sq_post = 0.0;
        self.count = 0;
    }

    pub fn applied_gain(&self) -> f64 {
        self.applied_gain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compensates_constant_attenuation_after_one_window() {
        let mut comp = RmsCompensator::new(256, 0.1, 0.9);
        let pre = vec![1.0; 256];
        let mut post = vec![0.5; 256];
        comp.process(&pre, &mut post);
        // Gain should trend toward 2.0 (compensating the 0.5x attenuation).
        assert!(comp.applied_gain() > 1.0);
    }

    #[test]
    fn ignores_silence_hysteresis() {
        let mut comp = RmsCompensator::new(64, 0.1, 0.99);
        let pre = vec![0.0; 64];
        let mut post = vec![0.0; 64];
        comp.process(&pre, &mut post);
        assert_eq!(comp.target_gain, 1.0);
    }
}
