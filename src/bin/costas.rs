use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use futuresdr::{
    blocks::{FileSink, FileSource, SoapySourceBuilder},
    macros::connect,
    num_complex::Complex32,
    runtime::{Flowgraph, Runtime},
};
use log::info;

use costas::{carrier_sync::CarrierSync, CostasConfig, Order};

#[derive(Parser)]
struct Args {
    /// Normalized loop bandwidth, radians/sample.
    #[clap(long, default_value_t = 0.01)]
    loop_bw: f32,
    /// Modulation order: 2, 4 or 8.
    #[clap(long, default_value_t = 4)]
    order: u32,
    #[clap(long)]
    damping: Option<f32>,
    /// Soft-limit the phase error by this noise estimate.
    #[clap(long)]
    noise: Option<f32>,
    #[clap(short, long, default_value = "carrier_sync.cf32")]
    output: PathBuf,
    #[command(subcommand)]
    cmd: RxType,
}

#[derive(clap::Subcommand)]
enum RxType {
    File {
        path: PathBuf,
    },
    SDR {
        soapy_device: String,
        rx_freq: f64,
        #[clap(short, long)]
        gain: f64,
        #[clap(short, long, default_value_t = 800_000.0)]
        sample_rate: f64,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = CostasConfig::new(args.loop_bw, Order::try_from(args.order)?);
    if let Some(damping) = args.damping {
        config = config.damping(damping);
    }
    if let Some(noise) = args.noise {
        config = config.noise_compensation(noise);
    }

    let mut fg = Flowgraph::new();

    let src = match args.cmd {
        RxType::File { path } => {
            FileSource::<Complex32>::new(path.to_string_lossy().to_string(), false)
        }
        RxType::SDR {
            soapy_device,
            rx_freq,
            gain,
            sample_rate,
        } => {
            let dev = soapysdr::Device::new(soapy_device.as_str())
                .context("Could not find SDR device")?;
            SoapySourceBuilder::new()
                .device(dev)
                .sample_rate(sample_rate)
                .freq(rx_freq)
                .gain(gain)
                .build()
        }
    };

    let carrier_sync = CarrierSync::new(&config).context("Invalid carrier sync config")?;

    let snk = FileSink::<Complex32>::new(args.output.to_string_lossy().to_string());

    connect!(fg, src > carrier_sync > snk);

    Runtime::new().run(fg)?;

    info!("wrote {}", args.output.display());

    Ok(())
}
