//! Generator graph: an ordered sequence of named synthesis stages plus the
//! style-vector bookkeeping shared with the mapping network.
//!
//! Layers are owned by the container as an explicit ordered list of
//! `(name, module)` entries, so inserting a stage is a plain list insert
//! rather than any kind of dynamic attribute trick.

use anyhow::{bail, ensure, Result};
use ndarray::Array4;
use std::any::Any;

pub mod scaling;
pub mod stages;

pub use scaling::ChannelScalingLayer;

/// A named stage in the synthesis sequence.
///
/// `out_size` is reported as `(width, height)` of the produced feature map;
/// tensors themselves are NCHW.
pub trait SynthesisModule: Send {
    fn out_channels(&self) -> usize;
    fn out_size(&self) -> (usize, usize);
    fn forward(&self, x: &Array4<f32>) -> Result<Array4<f32>>;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

pub struct SynthesisNetwork {
    layers: Vec<(String, Box<dyn SynthesisModule>)>,
    pub num_ws: usize,
}

impl SynthesisNetwork {
    pub fn new() -> Self {
        Self {
            layers: Vec::new(),
            num_ws: 0,
        }
    }

    /// Append a stage at the end. Every stage consumes one style vector.
    pub fn push(&mut self, name: impl Into<String>, module: Box<dyn SynthesisModule>) {
        self.layers.push((name.into(), module));
        self.num_ws += 1;
    }

    pub fn layer_names(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &dyn SynthesisModule)> {
        self.layers
            .iter()
            .map(|(name, module)| (name.as_str(), module.as_ref()))
    }

    pub fn layer(&self, name: &str) -> Option<&dyn SynthesisModule> {
        self.layers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, m)| m.as_ref())
    }

    pub fn layer_mut(&mut self, name: &str) -> Option<&mut Box<dyn SynthesisModule>> {
        self.layers
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, m)| m)
    }

    /// Insert `module` under `name` immediately after the layer called
    /// `after`. Does not touch `num_ws`; callers go through
    /// [`insert_layer`] to keep the counters consistent.
    pub fn insert_after(
        &mut self,
        after: &str,
        name: &str,
        module: Box<dyn SynthesisModule>,
    ) -> Result<()> {
        ensure!(
            self.layer(name).is_none(),
            "a layer named '{name}' already exists in the synthesis network"
        );
        let Some(idx) = self.layers.iter().position(|(n, _)| n == after) else {
            bail!("layer '{after}' not found in synthesis network");
        };
        self.layers.insert(idx + 1, (name.to_string(), module));
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<Box<dyn SynthesisModule>> {
        let idx = self.layers.iter().position(|(n, _)| n == name)?;
        Some(self.layers.remove(idx).1)
    }
}

impl Default for SynthesisNetwork {
    fn default() -> Self {
        Self::new()
    }
}

/// Produces one style vector per synthesis stage. The mapping math itself is
/// an external collaborator; only the counter matters here.
pub struct MappingNetwork {
    pub num_ws: usize,
}

pub struct Generator {
    pub synthesis: SynthesisNetwork,
    pub mapping: MappingNetwork,
    pub num_ws: usize,
}

impl Generator {
    pub fn new(synthesis: SynthesisNetwork) -> Self {
        let num_ws = synthesis.num_ws;
        Self {
            synthesis,
            mapping: MappingNetwork { num_ws },
            num_ws,
        }
    }

    /// Small deterministic stand-in network so the panel has layers to drive.
    pub fn demo() -> Self {
        Self::new(stages::demo_synthesis())
    }
}

/// Attach `module` to the generator's synthesis sequence immediately after
/// the layer named `after`, and bump the style-vector count on the synthesis
/// network, the mapping network and the generator itself.
///
/// One-shot setup operation: fails if `after` is unknown or `name` is taken,
/// with no partial mutation in either case.
pub fn insert_layer(
    gen: &mut Generator,
    module: Box<dyn SynthesisModule>,
    after: &str,
    name: &str,
) -> Result<()> {
    gen.synthesis.insert_after(after, name, module)?;
    gen.synthesis.num_ws += 1;
    gen.mapping.num_ws += 1;
    gen.num_ws += 1;
    Ok(())
}

/// Inverse of [`insert_layer`]; used when the visualizer re-wires its
/// scaling stage to a different insertion point.
pub fn remove_layer(gen: &mut Generator, name: &str) -> Option<Box<dyn SynthesisModule>> {
    let module = gen.synthesis.remove(name)?;
    gen.synthesis.num_ws -= 1;
    gen.mapping.num_ws -= 1;
    gen.num_ws -= 1;
    Some(module)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer_position(gen: &Generator, name: &str) -> Option<usize> {
        gen.synthesis.layer_names().position(|n| n == name)
    }

    #[test]
    fn insert_layer_places_after_reference_and_bumps_counters() {
        let mut gen = Generator::demo();
        let before = gen.num_ws;
        let ref_pos = layer_position(&gen, "s1_16").unwrap();

        let scaling =
            ChannelScalingLayer::new(&gen.synthesis, "s1_16", vec![0], 0.5).unwrap();
        insert_layer(&mut gen, Box::new(scaling), "s1_16", "s1_16_scaling").unwrap();

        assert_eq!(layer_position(&gen, "s1_16_scaling"), Some(ref_pos + 1));
        assert_eq!(gen.synthesis.num_ws, before + 1);
        assert_eq!(gen.mapping.num_ws, before + 1);
        assert_eq!(gen.num_ws, before + 1);
    }

    #[test]
    fn insert_layer_rejects_unknown_reference() {
        let mut gen = Generator::demo();
        let before = gen.num_ws;
        let scaling =
            ChannelScalingLayer::new(&gen.synthesis, "s1_16", vec![], 0.0).unwrap();
        let err = insert_layer(&mut gen, Box::new(scaling), "nope", "x").unwrap_err();
        assert!(err.to_string().contains("not found"));
        assert_eq!(gen.num_ws, before);
        assert_eq!(layer_position(&gen, "x"), None);
    }

    #[test]
    fn insert_layer_rejects_duplicate_name() {
        let mut gen = Generator::demo();
        let scaling =
            ChannelScalingLayer::new(&gen.synthesis, "s1_16", vec![], 0.0).unwrap();
        let err =
            insert_layer(&mut gen, Box::new(scaling), "s1_16", "output").unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn remove_layer_undoes_insert() {
        let mut gen = Generator::demo();
        let before = gen.num_ws;
        let scaling =
            ChannelScalingLayer::new(&gen.synthesis, "s1_16", vec![], 0.0).unwrap();
        insert_layer(&mut gen, Box::new(scaling), "s1_16", "s1_16_scaling").unwrap();
        assert!(remove_layer(&mut gen, "s1_16_scaling").is_some());
        assert_eq!(gen.num_ws, before);
        assert_eq!(layer_position(&gen, "s1_16_scaling"), None);
    }
}
