//! Second-order Costas loop for BPSK, QPSK and 8PSK carrier recovery.
//!
//! Each sample is derotated by the current phase estimate, a phase error is
//! taken on the derotated sample, and a proportional-integral loop filter
//! moves the phase and frequency estimates towards the carrier. Phase and
//! frequency persist across calls to [`CostasLoop::work`], so consecutive
//! buffers are tracked rather than re-acquired.

use std::f32::consts::{FRAC_1_SQRT_2, TAU};

use futuresdr::num_complex::Complex32;
use log::debug;

use crate::{
    detector::{Bpsk, Order, PhaseDetector, Psk8, Qpsk},
    error::ConfigError,
    lut::tanh_lut,
};

pub const DEFAULT_DAMPING: f32 = FRAC_1_SQRT_2;
pub const DEFAULT_MAX_FREQUENCY: f32 = 1.0;
pub const DEFAULT_MIN_FREQUENCY: f32 = -1.0;

/// Construction parameters for a [`CostasLoop`].
#[derive(Debug, Clone, PartialEq)]
pub struct CostasConfig {
    pub loop_bandwidth: f32,
    pub order: Order,
    pub damping: f32,
    pub min_frequency: f32,
    pub max_frequency: f32,
    /// Soft-limits the phase error by this noise estimate when set.
    pub noise_estimate: Option<f32>,
}

impl CostasConfig {
    pub fn new(loop_bandwidth: f32, order: Order) -> Self {
        Self {
            loop_bandwidth,
            order,
            damping: DEFAULT_DAMPING,
            min_frequency: DEFAULT_MIN_FREQUENCY,
            max_frequency: DEFAULT_MAX_FREQUENCY,
            noise_estimate: None,
        }
    }

    pub fn damping(mut self, damping: f32) -> Self {
        self.damping = damping;
        self
    }

    /// Bounds on the tracked frequency, in radians/sample.
    pub fn frequency_limits(mut self, min: f32, max: f32) -> Self {
        self.min_frequency = min;
        self.max_frequency = max;
        self
    }

    pub fn noise_compensation(mut self, noise_estimate: f32) -> Self {
        self.noise_estimate = Some(noise_estimate);
        self
    }

    pub fn build(&self) -> Result<CostasLoop, ConfigError> {
        check_bandwidth(self.loop_bandwidth)?;
        check_damping(self.damping)?;
        check_limits(self.min_frequency, self.max_frequency)?;
        if let Some(noise) = self.noise_estimate {
            check_noise(noise)?;
        }

        let mut cl = CostasLoop {
            order: self.order,
            phase: 0.0,
            frequency: 0.0,
            min_frequency: self.min_frequency,
            max_frequency: self.max_frequency,
            damping: self.damping,
            loop_bandwidth: self.loop_bandwidth,
            alpha: 0.0,
            beta: 0.0,
            error: 0.0,
            noise_estimate: self.noise_estimate,
        };
        cl.update_gains();
        cl.frequency_limit();

        Ok(cl)
    }
}

fn check_bandwidth(bw: f32) -> Result<(), ConfigError> {
    if bw >= 0.0 && bw.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NegativeBandwidth(bw))
    }
}

fn check_damping(damping: f32) -> Result<(), ConfigError> {
    if damping >= 0.0 && damping.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::InvalidDamping(damping))
    }
}

fn check_limits(min: f32, max: f32) -> Result<(), ConfigError> {
    // Also rejects NaN bounds, which would make the clamp meaningless.
    if min <= max {
        Ok(())
    } else {
        Err(ConfigError::FrequencyLimits { min, max })
    }
}

fn check_noise(noise: f32) -> Result<(), ConfigError> {
    if noise > 0.0 && noise.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::InvalidNoiseEstimate(noise))
    }
}

/// Carrier phase and frequency tracking state for one stream.
#[derive(Debug, Clone, PartialEq)]
pub struct CostasLoop {
    order: Order,
    phase: f32,
    frequency: f32,
    min_frequency: f32,
    max_frequency: f32,
    damping: f32,
    loop_bandwidth: f32,
    alpha: f32,
    beta: f32,
    error: f32,
    noise_estimate: Option<f32>,
}

impl CostasLoop {
    /// Creates a loop with the default damping and frequency limits.
    ///
    /// `order` is the number of constellation points: 2, 4 or 8.
    pub fn new(loop_bandwidth: f32, order: u32) -> Result<Self, ConfigError> {
        CostasConfig::new(loop_bandwidth, Order::try_from(order)?).build()
    }

    /// Derotates `input` into `output`, advancing the loop once per sample.
    ///
    /// Processes `min(input.len(), output.len())` samples and returns that
    /// count.
    pub fn work(&mut self, input: &[Complex32], output: &mut [Complex32]) -> usize {
        match self.order {
            Order::Bpsk => self.track::<Bpsk>(input, output),
            Order::Qpsk => self.track::<Qpsk>(input, output),
            Order::Psk8 => self.track::<Psk8>(input, output),
        }
    }

    fn track<D: PhaseDetector>(&mut self, input: &[Complex32], output: &mut [Complex32]) -> usize {
        let mut n = 0;

        for (i, o) in input.iter().zip(output.iter_mut()) {
            let s = *i * Complex32::from_polar(1.0, -self.phase);

            self.error = match self.noise_estimate {
                Some(noise) => tanh_lut(D::calc_error(s) / noise),
                None => D::calc_error(s),
            };

            self.advance_loop(self.error);
            self.phase_wrap();
            self.frequency_limit();

            *o = s;
            n += 1;
        }

        n
    }

    fn advance_loop(&mut self, error: f32) {
        self.frequency += self.beta * error;
        self.phase += self.frequency + self.alpha * error;
    }

    // Keeps phase within (-2pi, 2pi). One fmod instead of repeated 2pi steps,
    // so results can differ from stepwise wrapping in the last ulp.
    fn phase_wrap(&mut self) {
        if self.phase.abs() >= TAU {
            self.phase %= TAU;
        }
    }

    fn frequency_limit(&mut self) {
        if self.frequency > self.max_frequency {
            self.frequency = self.max_frequency;
        } else if self.frequency < self.min_frequency {
            self.frequency = self.min_frequency;
        }
    }

    fn update_gains(&mut self) {
        let bw = self.loop_bandwidth;
        let denom = 1.0 + 2.0 * self.damping * bw + bw * bw;

        self.alpha = (4.0 * self.damping * bw) / denom;
        self.beta = (4.0 * bw * bw) / denom;

        debug!(
            "costas {}: bw {} damping {} -> alpha {} beta {}",
            self.order, bw, self.damping, self.alpha, self.beta
        );
    }

    pub fn set_loop_bandwidth(&mut self, bw: f32) -> Result<(), ConfigError> {
        check_bandwidth(bw)?;
        self.loop_bandwidth = bw;
        self.update_gains();
        Ok(())
    }

    pub fn set_damping(&mut self, damping: f32) -> Result<(), ConfigError> {
        check_damping(damping)?;
        self.damping = damping;
        self.update_gains();
        Ok(())
    }

    /// Overrides the proportional gain until the next bandwidth or damping change.
    pub fn set_alpha(&mut self, alpha: f32) {
        self.alpha = alpha;
    }

    /// Overrides the integral gain until the next bandwidth or damping change.
    pub fn set_beta(&mut self, beta: f32) {
        self.beta = beta;
    }

    pub fn set_phase(&mut self, phase: f32) {
        self.phase = phase;
        self.phase_wrap();
    }

    pub fn set_frequency(&mut self, frequency: f32) {
        self.frequency = frequency;
        self.frequency_limit();
    }

    pub fn set_min_frequency(&mut self, min: f32) -> Result<(), ConfigError> {
        check_limits(min, self.max_frequency)?;
        self.min_frequency = min;
        self.frequency_limit();
        Ok(())
    }

    pub fn set_max_frequency(&mut self, max: f32) -> Result<(), ConfigError> {
        check_limits(self.min_frequency, max)?;
        self.max_frequency = max;
        self.frequency_limit();
        Ok(())
    }

    /// Enables soft-limiting of the phase error by `noise`, or disables it with `None`.
    pub fn set_noise_compensation(&mut self, noise: Option<f32>) -> Result<(), ConfigError> {
        if let Some(n) = noise {
            check_noise(n)?;
        }
        self.noise_estimate = noise;
        Ok(())
    }

    /// Drops the tracked phase and frequency. Gains and limits are kept.
    pub fn reset(&mut self) {
        self.phase = 0.0;
        self.frequency = 0.0;
        self.error = 0.0;
        self.frequency_limit();
    }

    pub fn order(&self) -> Order {
        self.order
    }

    pub fn phase(&self) -> f32 {
        self.phase
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    /// Phase error of the most recently processed sample.
    pub fn error(&self) -> f32 {
        self.error
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn beta(&self) -> f32 {
        self.beta
    }

    pub fn damping(&self) -> f32 {
        self.damping
    }

    pub fn loop_bandwidth(&self) -> f32 {
        self.loop_bandwidth
    }

    pub fn min_frequency(&self) -> f32 {
        self.min_frequency
    }

    pub fn max_frequency(&self) -> f32 {
        self.max_frequency
    }

    pub fn noise_estimate(&self) -> Option<f32> {
        self.noise_estimate
    }

    pub fn uses_noise_compensation(&self) -> bool {
        self.noise_estimate.is_some()
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::{PI, TAU};

    use anyhow::Result;
    use futuresdr::num_complex::Complex32;

    use super::{CostasConfig, CostasLoop, DEFAULT_DAMPING};
    use crate::{detector::Order, error::ConfigError, lut::TANH_LUT, psk::TestSignal};

    fn run(cl: &mut CostasLoop, input: &[Complex32]) -> (Vec<Complex32>, Vec<f32>) {
        let mut out = vec![Complex32::new(0.0, 0.0); input.len()];
        let mut errors = Vec::with_capacity(input.len());

        for (i, o) in input.chunks(1).zip(out.chunks_mut(1)) {
            assert_eq!(cl.work(i, o), 1);
            errors.push(cl.error());
        }

        (out, errors)
    }

    fn mean_abs(x: &[f32]) -> f32 {
        x.iter().map(|e| e.abs()).sum::<f32>() / x.len() as f32
    }

    #[test]
    fn gains() -> Result<()> {
        let cl = CostasLoop::new(0.01, 4)?;
        let denom = 1.0 + 2.0 * DEFAULT_DAMPING * 0.01 + 0.0001;

        assert_eq!(cl.damping(), DEFAULT_DAMPING);
        assert!((cl.alpha() - 4.0 * DEFAULT_DAMPING * 0.01 / denom).abs() < 1e-7);
        assert!((cl.beta() - 0.0004 / denom).abs() < 1e-9);
        assert_eq!(cl.phase(), 0.0);
        assert_eq!(cl.frequency(), 0.0);
        assert!(!cl.uses_noise_compensation());
        Ok(())
    }

    #[test]
    fn rejects_bad_config() {
        assert_eq!(
            CostasLoop::new(-1.0, 4),
            Err(ConfigError::NegativeBandwidth(-1.0))
        );
        assert!(CostasLoop::new(f32::NAN, 4).is_err());
        assert_eq!(CostasLoop::new(0.01, 3), Err(ConfigError::UnsupportedOrder(3)));

        let cfg = CostasConfig::new(0.01, Order::Qpsk);
        assert!(cfg.clone().damping(-0.5).build().is_err());
        assert!(cfg.clone().frequency_limits(0.5, -0.5).build().is_err());
        assert!(cfg.clone().noise_compensation(0.0).build().is_err());
        assert!(cfg.build().is_ok());
    }

    #[test]
    fn failed_setter_keeps_state() -> Result<()> {
        let mut cl = CostasLoop::new(0.01, 2)?;
        let before = cl.clone();

        assert!(cl.set_loop_bandwidth(-0.1).is_err());
        assert!(cl.set_damping(f32::INFINITY).is_err());
        assert!(cl.set_min_frequency(2.0).is_err());
        assert!(cl.set_max_frequency(-2.0).is_err());
        assert!(cl.set_noise_compensation(Some(-1.0)).is_err());
        assert_eq!(cl, before);

        cl.set_loop_bandwidth(0.02)?;
        assert!(cl.alpha() > before.alpha());
        Ok(())
    }

    #[test]
    fn zero_bandwidth_never_moves() -> Result<()> {
        let mut cl = CostasLoop::new(0.0, 4)?;
        assert_eq!(cl.alpha(), 0.0);
        assert_eq!(cl.beta(), 0.0);

        let input: Vec<Complex32> = TestSignal::new(Order::Qpsk, 0.4, 0.01, 7).take(500).collect();
        let (out, errors) = run(&mut cl, &input);

        assert_eq!(cl.phase(), 0.0);
        assert_eq!(cl.frequency(), 0.0);
        assert_eq!(out, input);
        assert!(errors.iter().any(|e| *e != 0.0));
        Ok(())
    }

    #[test]
    fn phase_stays_wrapped() -> Result<()> {
        let mut cl = CostasConfig::new(0.5, Order::Bpsk)
            .frequency_limits(-3.0, 3.0)
            .build()?;
        cl.set_frequency(2.5);

        let input: Vec<Complex32> = TestSignal::new(Order::Psk8, 1.0, 0.9, 3).take(2000).collect();
        let mut out = [Complex32::new(0.0, 0.0)];

        for s in input.chunks(1) {
            cl.work(s, &mut out);
            assert!(cl.phase() > -TAU && cl.phase() < TAU, "phase {}", cl.phase());
        }

        cl.set_phase(7.0);
        assert!((cl.phase() - (7.0 - TAU)).abs() < 1e-6);
        cl.set_phase(-3.0 * PI);
        assert!((cl.phase() + PI).abs() < 1e-5);
        cl.set_phase(TAU);
        assert_eq!(cl.phase(), 0.0);
        Ok(())
    }

    #[test]
    fn frequency_stays_clamped() -> Result<()> {
        let mut cl = CostasConfig::new(0.05, Order::Qpsk)
            .frequency_limits(-0.01, 0.01)
            .build()?;

        let input: Vec<Complex32> = TestSignal::new(Order::Qpsk, 0.0, 0.1, 11).take(2000).collect();
        let mut out = [Complex32::new(0.0, 0.0)];

        for s in input.chunks(1) {
            cl.work(s, &mut out);
            assert!(cl.frequency() >= -0.01 && cl.frequency() <= 0.01);
        }

        cl.set_frequency(0.5);
        assert_eq!(cl.frequency(), 0.01);
        cl.set_max_frequency(0.005)?;
        assert_eq!(cl.frequency(), 0.005);
        Ok(())
    }

    #[test]
    fn identical_loops_agree() -> Result<()> {
        let mut a = CostasLoop::new(0.02, 8)?;
        let mut b = CostasLoop::new(0.02, 8)?;
        assert_eq!((a.alpha(), a.beta()), (b.alpha(), b.beta()));

        let input: Vec<Complex32> = TestSignal::new(Order::Psk8, 0.2, 0.003, 5).take(700).collect();

        assert_eq!(run(&mut a, &input), run(&mut b, &input));
        assert_eq!(a, b);
        Ok(())
    }

    #[test]
    fn state_persists_between_calls() -> Result<()> {
        let input: Vec<Complex32> = TestSignal::new(Order::Qpsk, 0.3, 0.002, 9).take(600).collect();

        let mut whole = CostasLoop::new(0.01, 4)?;
        let mut out_whole = vec![Complex32::new(0.0, 0.0); input.len()];
        assert_eq!(whole.work(&input, &mut out_whole), input.len());

        let mut split = CostasLoop::new(0.01, 4)?;
        let mut out_split = vec![Complex32::new(0.0, 0.0); input.len()];
        let (a, b) = out_split.split_at_mut(250);
        assert_eq!(split.work(&input[..250], a), 250);
        assert_eq!(split.work(&input[250..], b), 350);

        assert_eq!(out_whole, out_split);
        assert_eq!(whole, split);
        Ok(())
    }

    #[test]
    fn work_stops_at_shorter_buffer() -> Result<()> {
        let mut cl = CostasLoop::new(0.01, 2)?;
        let input = vec![Complex32::new(1.0, 0.0); 10];
        let mut out = vec![Complex32::new(0.0, 0.0); 4];

        assert_eq!(cl.work(&input, &mut out), 4);
        assert_eq!(cl.work(&[], &mut out), 0);
        Ok(())
    }

    #[test]
    fn tracks_frequency_offset() -> Result<()> {
        for order in [2, 4, 8] {
            let mut cl = CostasLoop::new(0.01, order)?;
            let input: Vec<Complex32> = TestSignal::new(cl.order(), 0.0, 0.001, 1)
                .take(1000)
                .collect();

            let (_, errors) = run(&mut cl, &input);

            assert!(
                (cl.frequency() - 0.001).abs() < 0.0001,
                "order {order}: frequency {}",
                cl.frequency()
            );
            let early = mean_abs(&errors[..100]);
            let late = mean_abs(&errors[500..]);
            assert!(late < 1e-3, "order {order}: late error {late}");
            assert!(late < early / 10.0, "order {order}: {early} -> {late}");
        }
        Ok(())
    }

    #[test]
    fn tracks_constant_tone() -> Result<()> {
        let mut cl = CostasLoop::new(0.01, 4)?;
        let input: Vec<Complex32> = (0..1000)
            .map(|n| Complex32::from_polar(1.0, PI / 4.0 + 0.001 * n as f32))
            .collect();

        let (out, errors) = run(&mut cl, &input);

        assert!((cl.frequency() - 0.001).abs() < 0.0001);
        assert!(mean_abs(&errors[500..]) < 1e-3);

        // Locked output sits on the QPSK axis.
        let last = out[999];
        assert!((last.arg() - PI / 4.0).abs() < 0.01, "{last}");
        Ok(())
    }

    #[test]
    fn noise_compensation_soft_limits() -> Result<()> {
        let mut cl = CostasConfig::new(0.01, Order::Qpsk)
            .noise_compensation(0.1)
            .build()?;
        assert_eq!(cl.noise_estimate(), Some(0.1));

        // Raw QPSK error here is 0.9, far beyond 2 * noise.
        let mut out = [Complex32::new(0.0, 0.0)];
        cl.work(&[Complex32::new(0.05, 0.95)], &mut out);
        assert_eq!(cl.error(), 1.0);

        cl.reset();
        cl.work(&[Complex32::new(0.95, 0.05)], &mut out);
        assert_eq!(cl.error(), -1.0);

        cl.set_noise_compensation(None)?;
        cl.reset();
        cl.work(&[Complex32::new(0.95, 0.05)], &mut out);
        assert!((cl.error() + 0.9).abs() < 1e-6);

        let input: Vec<Complex32> = TestSignal::new(Order::Qpsk, 0.0, 0.001, 4).take(1000).collect();
        cl.set_noise_compensation(Some(0.5))?;
        cl.reset();
        run(&mut cl, &input);
        assert!((cl.frequency() - 0.001).abs() < 0.0001);
        Ok(())
    }

    #[test]
    fn noise_compensation_error_just_below_saturation() -> Result<()> {
        let mut cl = CostasConfig::new(0.01, Order::Bpsk)
            .noise_compensation(1.0)
            .build()?;

        // BPSK error of (1, x) is x itself.
        let x = f32::from_bits(2.0f32.to_bits() - 1);
        let mut out = [Complex32::new(0.0, 0.0)];

        assert_eq!(cl.work(&[Complex32::new(1.0, x)], &mut out), 1);
        assert_eq!(cl.error(), TANH_LUT[255]);
        Ok(())
    }

    #[test]
    fn reset_keeps_gains() -> Result<()> {
        let mut cl = CostasLoop::new(0.01, 2)?;
        let input: Vec<Complex32> = TestSignal::new(Order::Bpsk, 0.5, 0.002, 2).take(300).collect();
        run(&mut cl, &input);
        assert!(cl.frequency() != 0.0);

        let (alpha, beta) = (cl.alpha(), cl.beta());
        cl.reset();

        assert_eq!(cl.phase(), 0.0);
        assert_eq!(cl.frequency(), 0.0);
        assert_eq!(cl.error(), 0.0);
        assert_eq!((cl.alpha(), cl.beta()), (alpha, beta));
        Ok(())
    }
}
