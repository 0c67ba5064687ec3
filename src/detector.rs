use std::fmt;

use futuresdr::num_complex::Complex32;

use crate::error::ConfigError;

/// Modulation order the loop tracks. Fixed for the lifetime of a loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Bpsk,
    Qpsk,
    Psk8,
}

impl Order {
    pub fn points(&self) -> u32 {
        match self {
            Order::Bpsk => 2,
            Order::Qpsk => 4,
            Order::Psk8 => 8,
        }
    }
}

impl TryFrom<u32> for Order {
    type Error = ConfigError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            2 => Ok(Order::Bpsk),
            4 => Ok(Order::Qpsk),
            8 => Ok(Order::Psk8),
            n => Err(ConfigError::UnsupportedOrder(n)),
        }
    }
}

impl From<Order> for u32 {
    fn from(value: Order) -> Self {
        value.points()
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Order::Bpsk => write!(f, "BPSK"),
            Order::Qpsk => write!(f, "QPSK"),
            Order::Psk8 => write!(f, "8PSK"),
        }
    }
}

/// A decision-directed phase detector for one modulation order.
///
/// The error is zero when the sample lies on one of the order's decision
/// axes and its sign says which way the carrier estimate has to move.
pub trait PhaseDetector {
    fn calc_error(s: Complex32) -> f32;
}

pub struct Bpsk;
pub struct Qpsk;
pub struct Psk8;

// Ties resolve positive.
fn threshold(x: f32) -> f32 {
    if x >= 0.0 {
        1.0
    } else {
        -1.0
    }
}

impl PhaseDetector for Bpsk {
    fn calc_error(s: Complex32) -> f32 {
        s.re * s.im
    }
}

impl PhaseDetector for Qpsk {
    fn calc_error(s: Complex32) -> f32 {
        (threshold(s.re) * s.im) - (threshold(s.im) * s.re)
    }
}

impl PhaseDetector for Psk8 {
    fn calc_error(s: Complex32) -> f32 {
        // tan(pi/8), ratio between the two coordinates on an 8PSK axis.
        const K: f32 = std::f32::consts::SQRT_2 - 1.0;

        if s.re.abs() >= s.im.abs() {
            (threshold(s.re) * s.im) - (threshold(s.im) * s.re * K)
        } else {
            (threshold(s.re) * s.im * K) - (threshold(s.im) * s.re)
        }
    }
}
