use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use futuresdr::{
    blocks::{FileSink, VectorSource},
    macros::connect,
    num_complex::Complex32,
    runtime::{Flowgraph, Runtime},
};
use log::info;

use costas::{psk::TestSignal, Order};

/// Writes a PSK signal with a carrier offset as interleaved cf32.
#[derive(Parser)]
struct Args {
    output: PathBuf,
    #[clap(long, default_value_t = 4)]
    order: u32,
    /// Initial carrier phase, radians.
    #[clap(long, default_value_t = 0.0)]
    phase: f32,
    /// Carrier frequency offset, radians/sample.
    #[clap(long, default_value_t = 0.001)]
    freq: f32,
    #[clap(long, default_value_t = 1)]
    seed: u32,
    #[clap(short, long, default_value_t = 100_000)]
    samples: usize,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let order = Order::try_from(args.order)?;
    let samples: Vec<Complex32> = TestSignal::new(order, args.phase, args.freq, args.seed)
        .take(args.samples)
        .collect();

    let mut fg = Flowgraph::new();

    let src = VectorSource::<Complex32>::new(samples);
    let snk = FileSink::<Complex32>::new(args.output.to_string_lossy().to_string());

    connect!(fg, src > snk);

    Runtime::new().run(fg)?;

    info!(
        "wrote {} {} samples to {}",
        args.samples,
        order,
        args.output.display()
    );

    Ok(())
}
