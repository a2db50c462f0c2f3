//! Multiplicative channel scaling, inserted after an existing synthesis
//! stage to attenuate or amplify a subset of its output channels.

use anyhow::{bail, ensure, Result};
use ndarray::{s, Array4};
use std::any::Any;

use super::{SynthesisModule, SynthesisNetwork};

pub struct ChannelScalingLayer {
    channels: Vec<usize>,
    factor: f32,
    // Copied from the reference layer's *output* side: this stage sits after
    // it in the sequence, so input and output dimensions both match the
    // reference's outputs.
    channels_expected: usize,
    size: (usize, usize),
}

impl ChannelScalingLayer {
    /// Build a scaling stage meant to sit immediately after `after`,
    /// copying its output channel count and spatial size.
    pub fn new(
        syn: &SynthesisNetwork,
        after: &str,
        channels: Vec<usize>,
        factor: f32,
    ) -> Result<Self> {
        let Some(reference) = syn.layer(after) else {
            bail!("layer '{after}' not found in synthesis network");
        };
        let channels_expected = reference.out_channels();
        for &ch in &channels {
            ensure!(
                ch < channels_expected,
                "channel index {ch} out of range for layer '{after}' ({channels_expected} channels)"
            );
        }
        Ok(Self {
            channels,
            factor,
            channels_expected,
            size: reference.out_size(),
        })
    }

    pub fn channels(&self) -> &[usize] {
        &self.channels
    }

    pub fn factor(&self) -> f32 {
        self.factor
    }

    pub fn set_factor(&mut self, factor: f32) {
        self.factor = factor;
    }

    pub fn set_channels(&mut self, channels: Vec<usize>) -> Result<()> {
        for &ch in &channels {
            ensure!(
                ch < self.channels_expected,
                "channel index {ch} out of range ({} channels)",
                self.channels_expected
            );
        }
        self.channels = channels;
        Ok(())
    }
}

impl SynthesisModule for ChannelScalingLayer {
    fn out_channels(&self) -> usize {
        self.channels_expected
    }

    fn out_size(&self) -> (usize, usize) {
        self.size
    }

    fn forward(&self, x: &Array4<f32>) -> Result<Array4<f32>> {
        if self.channels.is_empty() {
            return Ok(x.clone());
        }
        let (_, c, h, w) = x.dim();
        ensure!(
            c == self.channels_expected && w == self.size.0 && h == self.size.1,
            "channel scaling expected [N, {}, {}, {}] input, got [N, {c}, {h}, {w}]",
            self.channels_expected,
            self.size.1,
            self.size.0,
        );
        // Fresh full-size mask each call: 1 everywhere, `factor` on the
        // selected channels.
        let mut mask = Array4::<f32>::ones(x.raw_dim());
        for &ch in &self.channels {
            mask.slice_mut(s![.., ch, .., ..]).fill(self.factor);
        }
        Ok(x * &mask)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::stages::demo_synthesis;

    fn test_input(layer: &ChannelScalingLayer) -> Array4<f32> {
        let (w, h) = layer.out_size();
        let c = layer.out_channels();
        Array4::from_shape_fn((2, c, h, w), |(n, ch, y, x)| {
            0.1 + n as f32 + ch as f32 * 0.5 + y as f32 * 0.01 + x as f32 * 0.001
        })
    }

    #[test]
    fn empty_channel_set_is_identity() {
        let syn = demo_synthesis();
        let layer = ChannelScalingLayer::new(&syn, "s1_16", vec![], 0.0).unwrap();
        let x = test_input(&layer);
        let y = layer.forward(&x).unwrap();
        assert_eq!(y.dim(), x.dim());
        assert_eq!(y, x);
    }

    #[test]
    fn factor_one_is_identity() {
        let syn = demo_synthesis();
        let layer = ChannelScalingLayer::new(&syn, "s1_16", vec![0, 3, 7], 1.0).unwrap();
        let x = test_input(&layer);
        let y = layer.forward(&x).unwrap();
        assert_eq!(y, x);
    }

    #[test]
    fn factor_zero_zeroes_selected_channels_only() {
        let syn = demo_synthesis();
        let selected = vec![1, 4];
        let layer =
            ChannelScalingLayer::new(&syn, "s1_16", selected.clone(), 0.0).unwrap();
        let x = test_input(&layer);
        let y = layer.forward(&x).unwrap();
        for ch in 0..layer.out_channels() {
            let got = y.slice(s![.., ch, .., ..]);
            if selected.contains(&ch) {
                assert!(got.iter().all(|&v| v == 0.0), "channel {ch} not zeroed");
            } else {
                assert_eq!(got, x.slice(s![.., ch, .., ..]), "channel {ch} touched");
            }
        }
    }

    #[test]
    fn shape_mismatch_fails_before_output() {
        let syn = demo_synthesis();
        let layer = ChannelScalingLayer::new(&syn, "s1_16", vec![0], 0.5).unwrap();
        let (w, h) = layer.out_size();
        // wrong channel count
        let bad = Array4::<f32>::zeros((1, layer.out_channels() + 1, h, w));
        assert!(layer.forward(&bad).is_err());
        // wrong spatial size
        let bad = Array4::<f32>::zeros((1, layer.out_channels(), h + 1, w));
        assert!(layer.forward(&bad).is_err());
    }

    #[test]
    fn construction_rejects_out_of_range_channel() {
        let syn = demo_synthesis();
        let channels = syn.layer("s1_16").unwrap().out_channels();
        assert!(ChannelScalingLayer::new(&syn, "s1_16", vec![channels], 0.5).is_err());
        assert!(ChannelScalingLayer::new(&syn, "missing", vec![], 0.5).is_err());
    }
}
