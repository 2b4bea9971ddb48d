//! Power-of-two real/imaginary FFT with precomputed bit-reversal and twiddle
//! tables. Used only by the streaming noise generator (§4.5).

use crate::error::{EngineError, EngineResult};
use std::f64::consts::PI;

fn is_pow2(n: usize) -> bool {
    n > 0 && (n & (n - 1)) == 0
}

/// A reusable FFT plan for a fixed power-of-two size `n`.
pub struct Fft {
    n: usize,
    bit_reversal: Vec<usize>,
    /// `cos_table[k] = cos(2*pi*k/n)` for `k` in `0..n/2`.
    cos_table: Vec<f64>,
    /// `sin_table[k] = sin(2*pi*k/n)` for `k` in `0..n/2` (forward twiddle
    /// uses `-sin`, applied at the call site).
    sin_table: Vec<f64>,
}

impl Fft {
    pub fn new(n: usize) -> EngineResult<Self> {
        if !is_pow2(n) {
            return Err(EngineError::InvalidSize(n));
        }
        let bits = n.trailing_zeros();
        let mut bit_reversal = vec![0usize; n];
        for i in 0..n {
            bit_reversal[i] = i.reverse_bits() >> (usize::BITS - bits.max(1));
        }
        if n == 1 {
            bit_reversal[0] = 0;
        }
        let half = n / 2;
        let mut cos_table = Vec::with_capacity(half.max(1));
        let mut sin_table = Vec::with_capacity(half.max(1));
        for k in 0..half.max(1) {
            let angle = 2.0 * PI * (k as f64) / (n as f64);
            cos_table.push(angle.cos());
            sin_table.push(angle.sin());
        }
        Ok(Self {
            n,
            bit_reversal,
            cos_table,
            sin_table,
        })
    }

    pub fn size(&self) -> usize {
        self.n
    }

    fn check_len(&self, real: &[f64], imag: &[f64]) -> EngineResult<()> {
        if real.len() != self.n || imag.len() != self.n {
            return Err(EngineError::Config(format!(
                "fft buffer length mismatch: expected {}, got real={} imag={}",
                self.n,
                real.len(),
                imag.len()
            )));
        }
        Ok(())
    }

    /// In-place forward transform, `X[k] = sum_n x[n] * e^{-2*pi*i*k*n/N}`.
    pub fn forward(&self, real: &mut [f64], imag: &mut [f64]) -> EngineResult<()> {
        self.check_len(real, imag)?;
        self.bit_reverse_permute(real, imag);
        self.butterflies(real, imag, -1.0);
        Ok(())
    }

    /// In-place inverse transform realised as conjugate-forward-conjugate
    /// with `1/N` scaling, per §4.2.
    pub fn inverse(&self, real: &mut [f64], imag: &mut [f64]) -> EngineResult<()> {
        self.check_len(real, imag)?;
        for v in imag.iter_mut() {
            *v = -*v;
        }
        self.bit_reverse_permute(real, imag);
        self.butterflies(real, imag, -1.0);
        let scale = 1.0 / self.n as f64;
        for v in real.iter_mut() {
            *v *= scale;
        }
        for v in imag.iter_mut() {
            *v = -*v * scale;
        }
        Ok(())
    }

    fn bit_reverse_permute(&self, real: &mut [f64], imag: &mut [f64]) {
        for i in 0..self.n {
            let j = self.bit_reversal[i];
            if j > i {
                real.swap(i, j);
                imag.swap(i, j);
            }
        }
    }

    /// `sign` is -1.0 for forward, reused (still -1.0) for the
    /// conjugate-trick inverse since the conjugation already flipped the
    /// effective rotation direction.
    fn butterflies(&self, real: &mut [f64], imag: &mut [f64], sign: f64) {
        let n = self.n;
        let mut len = 2;
        while len <= n {
            let half = len / 2;
            let step = n / len;
            let mut start = 0;
            while start < n {
                for k in 0..half {
                    let twiddle_idx = k * step;
                    let wr = self.cos_table[twiddle_idx];
                    let wi = sign * self.sin_table[twiddle_idx];
                    let i_even = start + k;
                    let i_odd = start + k + half;
                    let tr = real[i_odd] * wr - imag[i_odd] * wi;
                    let ti = real[i_odd] * wi + imag[i_odd] * wr;
                    real[i_odd] = real[i_even] - tr;
                    imag[i_odd] = imag[i_even] - ti;
                    real[i_even] += tr;
                    imag[i_even] += ti;
                }
                start += len;
            }
            len *= 2;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_power_of_two() {
        assert!(Fft::new(0).is_err());
        assert!(Fft::new(6).is_err());
        assert!(Fft::new(100).is_err());
    }

    #[test]
    fn accepts_power_of_two() {
        assert!(Fft::new(1).is_ok());
        assert!(Fft::new(256).is_ok());
    }

    #[test]
    fn round_trip_restores_signal() {
        let n = 64;
        let fft = Fft::new(n).unwrap();
        let mut real: Vec<f64> = (0..n).map(|i| (i as f64 * 0.3).sin()).collect();
        let original = real.clone();
        let mut imag = vec![0.0; n];

        fft.forward(&mut real, &mut imag).unwrap();
        fft.inverse(&mut real, &mut imag).unwrap();

        for i in 0..n {
            assert!((real[i] - original[i]).abs() < 1e-9, "i={i}");
            assert!(imag[i].abs() < 1e-9);
        }
    }

    #[test]
    fn dc_only_signal_has_energy_only_in_bin_zero() {
        let n = 32;
        let fft = Fft::new(n).unwrap();
        let mut real = vec![1.0; n];
        let mut imag = vec![0.0; n];
        fft.forward(&mut real, &mut imag).unwrap();
        assert!((real[0] - n as f64).abs() < 1e-9);
        for i in 1..n {
            assert!(real[i].abs() < 1e-9, "bin {i} = {}", real[i]);
            assert!(imag[i].abs() < 1e-9);
        }
    }
}
