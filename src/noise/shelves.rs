//! Optional Butterworth low-cut/high-cut pair (§4.5.3): a two-section
//! high-pass at `lowcut` and a two-section low-pass at `highcut`, each
//! active only when its corner sits strictly inside `(0, nyquist)`.

use crate::math::{butterworth_highpass_coeffs, butterworth_lowpass_coeffs, BiquadCoeffs, BiquadState};

struct Section {
    coeffs: BiquadCoeffs,
    stages: [BiquadState; 2],
}

impl Section {
    fn process_block(&mut self, block: &mut [f64]) {
        for x in block.iter_mut() {
            let mut y = *x;
            for stage in self.stages.iter_mut() {
                y = stage.process(y, &self.coeffs);
            }
            *x = y;
        }
    }
}

pub struct ButterworthShelves {
    highpass: Option<Section>,
    lowpass: Option<Section>,
}

impl ButterworthShelves {
    pub fn new(lowcut: Option<f64>, highcut: Option<f64>, fs: f64) -> Self {
        let nyquist = fs / 2.0;
        let highpass = lowcut.filter(|&f| f > 0.0 && f < nyquist).map(|f| Section {
            coeffs: butterworth_highpass_coeffs(f, fs),
            stages: [BiquadState::default(); 2],
        });
        let lowpass = highcut.filter(|&f| f > 0.0 && f < nyquist).map(|f| Section {
            coeffs: butterworth_lowpass_coeffs(f, fs),
            stages: [BiquadState::default(); 2],
        });
        Self { highpass, lowpass }
    }

    pub fn is_active(&self) -> bool {
        self.highpass.is_some() || self.lowpass.is_some()
    }

    pub fn process_block(&mut self, block: &mut [f64]) {
        if let Some(hp) = self.highpass.as_mut() {
            hp.process_block(block);
        }
        if let Some(lp) = self.lowpass.as_mut() {
            lp.process_block(block);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inactive_without_corners() {
        let shelves = ButterworthShelves::new(None, None, 48_000.0);
        assert!(!shelves.is_active());
    }

    #[test]
    fn inactive_when_corner_outside_nyquist() {
        let shelves = ButterworthShelves::new(Some(30_000.0), None, 48_000.0);
        assert!(!shelves.is_active());
    }

    #[test]
    fn active_with_valid_corners() {
        let shelves = ButterworthShelves::new(Some(100.0), Some(8000.0), 48_000.0);
        assert!(shelves.is_active());
    }
}
