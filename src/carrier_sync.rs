use anyhow::Result;
use futuresdr::{
    async_trait::async_trait,
    macros::message_handler,
    num_complex::Complex32,
    runtime::{
        Block, BlockMeta, BlockMetaBuilder, Kernel, MessageIo, MessageIoBuilder, Pmt, StreamIo,
        StreamIoBuilder, WorkIo,
    },
};
use log::{info, warn};

use crate::costas::{CostasConfig, CostasLoop};

/// Costas loop carrier recovery as a flowgraph block.
///
/// Stream ports: `in` and `out`, both `Complex32`.
///
/// Message ports:
/// - `loop_bw`: `F32`/`F64` sets the loop bandwidth. Replies with the
///   bandwidth in effect.
/// - `noise`: `F32`/`F64` enables noise compensation with that estimate,
///   `Null` disables it.
/// - `reset`: drops the tracked phase and frequency.
pub struct CarrierSync {
    costas: CostasLoop,
}

impl CarrierSync {
    pub fn new(config: &CostasConfig) -> Result<Block> {
        let costas = config.build()?;

        info!(
            "CarrierSync: {} loop, bw {}, damping {}",
            config.order, config.loop_bandwidth, config.damping
        );

        Ok(Block::new(
            BlockMetaBuilder::new("CarrierSync").build(),
            StreamIoBuilder::new()
                .add_input("in", std::mem::size_of::<Complex32>())
                .add_output("out", std::mem::size_of::<Complex32>())
                .build(),
            MessageIoBuilder::new()
                .add_input("loop_bw", Self::loop_bw_handler)
                .add_input("noise", Self::noise_handler)
                .add_input("reset", Self::reset_handler)
                .build(),
            CarrierSync { costas },
        ))
    }

    fn pmt_f32(p: &Pmt) -> Option<f32> {
        match p {
            Pmt::F32(v) => Some(*v),
            Pmt::F64(v) => Some(*v as f32),
            _ => None,
        }
    }

    #[message_handler]
    async fn loop_bw_handler(
        &mut self,
        _mio: &mut MessageIo<Self>,
        _meta: &mut BlockMeta,
        p: Pmt,
    ) -> Result<Pmt> {
        if let Some(bw) = Self::pmt_f32(&p) {
            match self.costas.set_loop_bandwidth(bw) {
                Ok(()) => info!(
                    "CarrierSync: loop bw {}, alpha {} beta {}",
                    bw,
                    self.costas.alpha(),
                    self.costas.beta()
                ),
                Err(e) => warn!("CarrierSync: {e}"),
            }
        }

        Ok(Pmt::F32(self.costas.loop_bandwidth()))
    }

    #[message_handler]
    async fn noise_handler(
        &mut self,
        _mio: &mut MessageIo<Self>,
        _meta: &mut BlockMeta,
        p: Pmt,
    ) -> Result<Pmt> {
        let noise = match p {
            Pmt::Null => None,
            ref p => match Self::pmt_f32(p) {
                Some(n) => Some(n),
                None => {
                    warn!("CarrierSync: unexpected noise estimate {p:?}");
                    return Ok(Pmt::Null);
                }
            },
        };

        match self.costas.set_noise_compensation(noise) {
            Ok(()) => info!("CarrierSync: noise compensation {noise:?}"),
            Err(e) => warn!("CarrierSync: {e}"),
        }

        Ok(Pmt::Null)
    }

    #[message_handler]
    async fn reset_handler(
        &mut self,
        _mio: &mut MessageIo<Self>,
        _meta: &mut BlockMeta,
        _p: Pmt,
    ) -> Result<Pmt> {
        info!(
            "CarrierSync: reset at phase {} freq {}",
            self.costas.phase(),
            self.costas.frequency()
        );
        self.costas.reset();

        Ok(Pmt::Null)
    }
}

#[async_trait]
impl Kernel for CarrierSync {
    async fn work(
        &mut self,
        io: &mut WorkIo,
        sio: &mut StreamIo,
        _mio: &mut MessageIo<Self>,
        _b: &mut BlockMeta,
    ) -> Result<()> {
        let is = sio.input(0).slice::<Complex32>();
        let os = sio.output(0).slice::<Complex32>();

        let n = self.costas.work(is, os);

        sio.input(0).consume(n);
        sio.output(0).produce(n);

        if sio.input(0).finished() && n == is.len() {
            io.finished = true;
        }

        Ok(())
    }
}
