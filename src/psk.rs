use std::f64::consts::{PI, TAU};

use futuresdr::num_complex::Complex32;

use crate::detector::Order;

/// Unit-magnitude constellation points, placed on the axes the phase
/// detector of `order` settles on.
pub fn constellation(order: Order) -> Vec<Complex32> {
    let n = order.points();
    let offset = match order {
        Order::Bpsk => 0.0,
        Order::Qpsk | Order::Psk8 => PI / n as f64,
    };

    (0..n)
        .map(|k| {
            let phi = offset + TAU * k as f64 / n as f64;
            Complex32::new(phi.cos() as f32, phi.sin() as f32)
        })
        .collect()
}

/// Endless PSK symbol stream with a carrier phase and frequency offset
/// applied. Symbols are drawn from a seeded xorshift sequence so runs are
/// reproducible.
pub struct TestSignal {
    points: Vec<Complex32>,
    state: u32,
    phase: f64,
    frequency: f64,
}

impl TestSignal {
    /// `phase_offset` in radians, `frequency_offset` in radians/sample.
    pub fn new(order: Order, phase_offset: f32, frequency_offset: f32, seed: u32) -> Self {
        Self {
            points: constellation(order),
            // xorshift is stuck at zero
            state: if seed == 0 { 0x9e37_79b9 } else { seed },
            phase: phase_offset as f64,
            frequency: frequency_offset as f64,
        }
    }

    fn next_index(&mut self) -> usize {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;

        x as usize % self.points.len()
    }
}

impl Iterator for TestSignal {
    type Item = Complex32;

    fn next(&mut self) -> Option<Complex32> {
        let i = self.next_index();
        let sym = self.points[i];
        let carrier = Complex32::from_polar(1.0, self.phase as f32);

        self.phase = (self.phase + self.frequency).rem_euclid(TAU);

        Some(sym * carrier)
    }
}
