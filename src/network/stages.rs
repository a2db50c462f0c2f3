//! Procedural stand-in synthesis stages. These give the visualizer a live
//! layer sequence with realistic shapes and value distributions; they are
//! not a generative model.

use anyhow::{ensure, Result};
use ndarray::{Array2, Array4};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use std::any::Any;

use super::{SynthesisModule, SynthesisNetwork};

/// Source stage: emits a fixed seeded base grid. The upstream tensor is
/// ignored; this is where the forward chain starts.
pub struct InputStage {
    channels: usize,
    size: (usize, usize),
    base: Array4<f32>,
}

impl InputStage {
    pub fn new(channels: usize, size: (usize, usize), seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let normal = Normal::new(0.0_f32, 1.0).expect("valid normal params");
        let (w, h) = size;
        let base = Array4::from_shape_simple_fn((1, channels, h, w), || normal.sample(&mut rng));
        Self {
            channels,
            size,
            base,
        }
    }
}

impl SynthesisModule for InputStage {
    fn out_channels(&self) -> usize {
        self.channels
    }

    fn out_size(&self) -> (usize, usize) {
        self.size
    }

    fn forward(&self, _x: &Array4<f32>) -> Result<Array4<f32>> {
        Ok(self.base.clone())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Fixed 1x1 channel mix with optional 2x nearest upsampling and a leaky
/// rectifier, weights drawn once from a seeded normal.
pub struct ProceduralStage {
    in_channels: usize,
    out_channels: usize,
    out_size: (usize, usize),
    upsample: bool,
    weights: Array2<f32>,
}

impl ProceduralStage {
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        out_size: (usize, usize),
        upsample: bool,
        seed: u64,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let std = (1.0 / in_channels as f32).sqrt();
        let normal = Normal::new(0.0_f32, std).expect("valid normal params");
        let weights =
            Array2::from_shape_simple_fn((out_channels, in_channels), || normal.sample(&mut rng));
        Self {
            in_channels,
            out_channels,
            out_size,
            upsample,
            weights,
        }
    }

    fn in_size(&self) -> (usize, usize) {
        let (w, h) = self.out_size;
        if self.upsample {
            (w / 2, h / 2)
        } else {
            (w, h)
        }
    }
}

impl SynthesisModule for ProceduralStage {
    fn out_channels(&self) -> usize {
        self.out_channels
    }

    fn out_size(&self) -> (usize, usize) {
        self.out_size
    }

    fn forward(&self, x: &Array4<f32>) -> Result<Array4<f32>> {
        let (n, c, h, w) = x.dim();
        let (in_w, in_h) = self.in_size();
        ensure!(
            c == self.in_channels && w == in_w && h == in_h,
            "stage expected [N, {}, {in_h}, {in_w}] input, got [N, {c}, {h}, {w}]",
            self.in_channels,
        );
        let (out_w, out_h) = self.out_size;
        let scale = if self.upsample { 2 } else { 1 };
        let out = Array4::from_shape_fn((n, self.out_channels, out_h, out_w), |(ni, o, y, xx)| {
            let (sy, sx) = (y / scale, xx / scale);
            let mut acc = 0.0_f32;
            for i in 0..self.in_channels {
                acc += self.weights[[o, i]] * x[[ni, i, sy, sx]];
            }
            if acc < 0.0 {
                0.2 * acc
            } else {
                acc
            }
        });
        Ok(out)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// The demo layer sequence the visualizer boots with.
pub fn demo_synthesis() -> SynthesisNetwork {
    let mut syn = SynthesisNetwork::new();
    syn.push("input", Box::new(InputStage::new(8, (8, 8), 11)));
    syn.push("s0_16", Box::new(ProceduralStage::new(8, 16, (16, 16), true, 12)));
    syn.push("s1_16", Box::new(ProceduralStage::new(16, 16, (16, 16), false, 13)));
    syn.push("s2_32", Box::new(ProceduralStage::new(16, 8, (32, 32), true, 14)));
    syn.push("output", Box::new(ProceduralStage::new(8, 3, (32, 32), false, 15)));
    syn
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_chain(syn: &SynthesisNetwork) -> Vec<(String, Array4<f32>)> {
        let mut x = Array4::<f32>::zeros((1, 1, 1, 1));
        let mut maps = Vec::new();
        for (name, module) in syn.iter() {
            x = module.forward(&x).unwrap();
            maps.push((name.to_string(), x.clone()));
        }
        maps
    }

    #[test]
    fn demo_chain_shapes_match_declared_metadata() {
        let syn = demo_synthesis();
        for (name, map) in run_chain(&syn) {
            let module = syn.layer(&name).unwrap();
            let (w, h) = module.out_size();
            assert_eq!(map.dim(), (1, module.out_channels(), h, w), "{name}");
        }
    }

    #[test]
    fn demo_chain_is_deterministic() {
        let a = run_chain(&demo_synthesis());
        let b = run_chain(&demo_synthesis());
        for ((name, ma), (_, mb)) in a.iter().zip(b.iter()) {
            assert_eq!(ma, mb, "{name}");
        }
    }

    #[test]
    fn stage_rejects_wrong_input_shape() {
        let stage = ProceduralStage::new(8, 16, (16, 16), true, 1);
        let bad = Array4::<f32>::zeros((1, 8, 16, 16));
        assert!(stage.forward(&bad).is_err());
    }
}
