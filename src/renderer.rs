//! Per-frame inference driver. Owns the generator, keeps the panel's
//! channel-scaling request wired into the synthesis sequence, and turns the
//! selected feature map into layer metadata, statistics and a preview image.

use anyhow::Result;
use ndarray::{s, Array4, ArrayView4};

use crate::network::{
    insert_layer, remove_layer, ChannelScalingLayer, Generator, SynthesisModule,
};
use crate::states::args::RenderArgs;

#[derive(Debug, Clone, PartialEq)]
pub struct LayerDesc {
    pub name: String,
    /// NCHW.
    pub shape: Vec<usize>,
    pub dtype: &'static str,
}

#[derive(Default)]
pub struct RenderResult {
    pub layers: Vec<LayerDesc>,
    /// Mean/std/max over all channels and over the selected slice, in the
    /// order [mean, mean_sel, std, std_sel, max, max_sel].
    pub stats: Option<[f32; 6]>,
    pub image: Option<egui::ColorImage>,
}

fn scaling_stage_name(host: &str) -> String {
    format!("{host}_scaling")
}

pub struct Renderer {
    gen: Generator,
    /// Layer the scaling stage currently sits after, if any.
    scaling_host: Option<String>,
}

impl Renderer {
    pub fn new() -> Self {
        Self {
            gen: Generator::demo(),
            scaling_host: None,
        }
    }

    pub fn generator(&self) -> &Generator {
        &self.gen
    }

    pub fn render(&mut self, args: &RenderArgs) -> Result<RenderResult> {
        self.sync_scaling(args)?;

        let mut layers = Vec::new();
        let mut selected: Option<Array4<f32>> = None;
        let mut x = Array4::<f32>::zeros((1, 1, 1, 1));
        for (name, module) in self.gen.synthesis.iter() {
            x = module.forward(&x)?;
            layers.push(LayerDesc {
                name: name.to_string(),
                shape: x.shape().to_vec(),
                dtype: "float32",
            });
            if args.layer_name.as_deref() == Some(name) {
                selected = Some(x.clone());
            }
        }
        // no explicit selection means the final output
        let feature = selected.unwrap_or(x);

        let channels = feature.dim().1;
        let base = args.base_channel.min(channels.saturating_sub(1));
        let count = args.sel_channels.min(channels - base).max(1);
        let slice = feature.slice(s![.., base..base + count, .., ..]);

        let stats = Some([
            mean(&feature.view()),
            mean(&slice),
            std_dev(&feature.view()),
            std_dev(&slice),
            max_abs(&feature.view()),
            max_abs(&slice),
        ]);

        let image = Some(feature_image(&slice, args.img_scale_db, args.img_normalize));

        Ok(RenderResult {
            layers,
            stats,
            image,
        })
    }

    /// Keep exactly one scaling stage in the sequence, sitting after the
    /// requested layer, with the requested channel window and factor. A
    /// cleared request tears the stage down.
    fn sync_scaling(&mut self, args: &RenderArgs) -> Result<()> {
        let want = args.scaling_layer.as_deref();
        if self.scaling_host.as_deref() != want {
            if let Some(host) = self.scaling_host.take() {
                remove_layer(&mut self.gen, &scaling_stage_name(&host));
            }
            if let Some(host) = want {
                let stage =
                    ChannelScalingLayer::new(&self.gen.synthesis, host, Vec::new(), 0.0)?;
                insert_layer(
                    &mut self.gen,
                    Box::new(stage),
                    host,
                    &scaling_stage_name(host),
                )?;
                self.scaling_host = Some(host.to_string());
            }
        }
        if let Some(host) = self.scaling_host.clone() {
            let name = scaling_stage_name(&host);
            if let Some(module) = self.gen.synthesis.layer_mut(&name) {
                if let Some(stage) = module.as_any_mut().downcast_mut::<ChannelScalingLayer>() {
                    let channels = if args.scaling_channel_min < 0 {
                        Vec::new()
                    } else {
                        let lo = args.scaling_channel_min as usize;
                        let hi = args.scaling_channel_max.max(args.scaling_channel_min) as usize;
                        (lo..=hi).collect()
                    };
                    stage.set_channels(channels)?;
                    stage.set_factor(args.scaling_factor);
                }
            }
        }
        Ok(())
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

fn mean(x: &ArrayView4<f32>) -> f32 {
    x.mean().unwrap_or(0.0)
}

fn std_dev(x: &ArrayView4<f32>) -> f32 {
    x.std(0.0)
}

fn max_abs(x: &ArrayView4<f32>) -> f32 {
    x.iter().fold(0.0_f32, |m, &v| m.max(v.abs()))
}

/// Map a [1, C, H, W] channel slice (C = 1 or 3) to an sRGB preview,
/// applying the dB gain and optional peak normalization.
fn feature_image(slice: &ArrayView4<f32>, scale_db: f32, normalize: bool) -> egui::ColorImage {
    let (_, c, h, w) = slice.dim();
    let mut gain = 10.0_f32.powf(scale_db / 20.0);
    if normalize {
        let peak = slice.iter().fold(0.0_f32, |m, &v| m.max(v.abs()));
        if peak > 0.0 {
            gain /= peak;
        }
    }
    let mut rgb = Vec::with_capacity(w * h * 3);
    for y in 0..h {
        for x in 0..w {
            for ch in 0..3 {
                let v = slice[[0, ch.min(c - 1), y, x]] * gain;
                rgb.push((v * 127.5 + 128.0).clamp(0.0, 255.0) as u8);
            }
        }
    }
    egui::ColorImage::from_rgb([w, h], &rgb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_reports_every_stage_with_shapes() {
        let mut renderer = Renderer::new();
        let result = renderer.render(&RenderArgs::default()).unwrap();
        let names: Vec<&str> = result.layers.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, ["input", "s0_16", "s1_16", "s2_32", "output"]);
        for layer in &result.layers {
            assert_eq!(layer.shape.len(), 4);
            assert_eq!(layer.dtype, "float32");
        }
        assert!(result.stats.is_some());
        assert!(result.image.is_some());
    }

    #[test]
    fn active_scaling_request_wires_a_stage_after_its_host() {
        let mut renderer = Renderer::new();
        let args = RenderArgs {
            scaling_layer: Some("s1_16".to_string()),
            scaling_channel_min: 2,
            scaling_channel_max: 4,
            scaling_factor: 0.5,
            ..RenderArgs::default()
        };
        let result = renderer.render(&args).unwrap();
        let names: Vec<&str> = result.layers.iter().map(|l| l.name.as_str()).collect();
        let host = names.iter().position(|&n| n == "s1_16").unwrap();
        assert_eq!(names[host + 1], "s1_16_scaling");

        let stage = renderer
            .gen
            .synthesis
            .layer_mut("s1_16_scaling")
            .unwrap()
            .as_any_mut()
            .downcast_mut::<ChannelScalingLayer>()
            .unwrap();
        assert_eq!(stage.channels(), &[2, 3, 4]);
        assert_eq!(stage.factor(), 0.5);
    }

    #[test]
    fn changing_host_moves_the_stage_and_clearing_removes_it() {
        let mut renderer = Renderer::new();
        let mut args = RenderArgs {
            scaling_layer: Some("s0_16".to_string()),
            scaling_channel_min: 0,
            scaling_channel_max: 0,
            scaling_factor: 0.0,
            ..RenderArgs::default()
        };
        renderer.render(&args).unwrap();
        assert!(renderer.gen.synthesis.layer("s0_16_scaling").is_some());

        args.scaling_layer = Some("s2_32".to_string());
        renderer.render(&args).unwrap();
        assert!(renderer.gen.synthesis.layer("s0_16_scaling").is_none());
        assert!(renderer.gen.synthesis.layer("s2_32_scaling").is_some());

        args.scaling_layer = None;
        let result = renderer.render(&args).unwrap();
        assert!(renderer.gen.synthesis.layer("s2_32_scaling").is_none());
        assert_eq!(renderer.gen.num_ws, result.layers.len());
    }

    #[test]
    fn zero_factor_scaling_changes_downstream_output() {
        let mut renderer = Renderer::new();
        let clean = renderer.render(&RenderArgs::default()).unwrap();
        let args = RenderArgs {
            scaling_layer: Some("s1_16".to_string()),
            scaling_channel_min: 0,
            scaling_channel_max: 15,
            scaling_factor: 0.0,
            ..RenderArgs::default()
        };
        let scaled = renderer.render(&args).unwrap();
        // zeroing every channel of a mid stage flattens the final stats
        assert_ne!(clean.stats, scaled.stats);
    }

    #[test]
    fn selected_layer_drives_stats_shape() {
        let mut renderer = Renderer::new();
        let args = RenderArgs {
            layer_name: Some("input".to_string()),
            sel_channels: 1,
            base_channel: 2,
            ..RenderArgs::default()
        };
        let result = renderer.render(&args).unwrap();
        let [_, _, _, _, max_all, max_sel] = result.stats.unwrap();
        assert!(max_sel <= max_all);
        let image = result.image.unwrap();
        assert_eq!(image.size, [8, 8]);
    }
}
