//! Mutable state behind the layer panel, plus the per-frame logic that does
//! not touch egui: selection resolution, range clamping, the factor
//! animation tick, cross-field validation and publishing into `RenderArgs`.
//!
//! Ranges are derived from the frame's layer list and move as the network
//! changes, so every bounded field is re-clamped every frame. Out-of-range
//! values are corrected silently, never rejected.

use serde::{Deserialize, Serialize};

use crate::renderer::LayerDesc;
use crate::states::args::RenderArgs;

/// Per-frame increment applied to the scaling factor while animating, before
/// time-delta and speed scaling.
pub const ANIM_FACTOR_STEP: f32 = 0.2;

/// Hard ceiling on the scaling factor; the slider itself stops at 10 but the
/// animation max-factor input can push past it.
pub const SCALING_FACTOR_MAX: f32 = 100.0;

#[derive(Serialize, Deserialize)]
pub struct LayerPanelState {
    pub cur_layer: Option<String>,
    #[serde(skip)]
    pub prev_layers: Vec<LayerDesc>,
    #[serde(skip)]
    pub refocus: bool,

    pub sel_channels: usize,
    pub base_channel: i32,
    pub img_scale_db: f32,
    pub img_normalize: bool,

    pub fft_show: bool,
    pub fft_all: bool,
    pub fft_range_db: f32,
    pub fft_beta: f32,

    pub scaling_layer_idx: i32,
    pub scaling_layer: Option<String>,
    pub scaling_channel_min: i32,
    pub scaling_channel_max: i32,
    pub scaling_factor: f32,
    pub scaling_anim: bool,
    pub scaling_anim_speed: f32,
    pub scaling_anim_maxfactor: f32,
}

impl Default for LayerPanelState {
    fn default() -> Self {
        Self {
            cur_layer: None,
            prev_layers: Vec::new(),
            refocus: false,
            sel_channels: 3,
            base_channel: 0,
            img_scale_db: 0.0,
            img_normalize: false,
            fft_show: false,
            fft_all: true,
            fft_range_db: 50.0,
            fft_beta: 8.0,
            scaling_layer_idx: 0,
            scaling_layer: None,
            scaling_channel_min: -1,
            scaling_channel_max: -1,
            scaling_factor: 0.0,
            scaling_anim: false,
            scaling_anim_speed: 1.0,
            scaling_anim_maxfactor: 2.0,
        }
    }
}

/// Layers eligible as a scaling insertion point: everything except scaling
/// stages themselves.
pub fn scaling_candidates<'a>(layers: &'a [LayerDesc]) -> Vec<&'a LayerDesc> {
    layers
        .iter()
        .filter(|l| !l.name.contains("scaling"))
        .collect()
}

impl LayerPanelState {
    /// Re-resolve the current selection against this frame's layer list.
    /// A vanished selection falls back to the last layer; any list change
    /// arms a one-shot scroll-to-selection.
    pub fn resolve_selection(&mut self, layers: &[LayerDesc]) {
        if self.prev_layers != layers {
            self.prev_layers = layers.to_vec();
            self.refocus = true;
        }
        let known = self
            .cur_layer
            .as_ref()
            .is_some_and(|cur| layers.iter().any(|l| &l.name == cur));
        if !known {
            self.cur_layer = layers.last().map(|l| l.name.clone());
        }
    }

    /// Channel count of the currently selected layer.
    pub fn num_channels(&self, layers: &[LayerDesc]) -> i32 {
        self.cur_layer
            .as_ref()
            .and_then(|cur| layers.iter().find(|l| &l.name == cur))
            .map(|l| l.shape[1] as i32)
            .unwrap_or(0)
    }

    pub fn base_channel_max(&self, layers: &[LayerDesc]) -> i32 {
        (self.num_channels(layers) - self.sel_channels as i32).max(0)
    }

    pub fn clamp_base_channel(&mut self, base_channel_max: i32) {
        self.base_channel = self.base_channel.clamp(0, base_channel_max.max(0));
    }

    pub fn clamp_scaling_layer(&mut self, layers_max: i32) {
        self.scaling_layer_idx = self.scaling_layer_idx.clamp(0, layers_max.max(0));
    }

    pub fn clamp_scaling_channels(&mut self, channels_max: i32) {
        let hi = channels_max.max(0);
        self.scaling_channel_min = self.scaling_channel_min.clamp(-1, hi);
        self.scaling_channel_max = self.scaling_channel_max.clamp(-1, hi);
        if self.scaling_channel_max < self.scaling_channel_min {
            self.scaling_channel_max = self.scaling_channel_min;
        }
    }

    pub fn clamp_scaling_factor(&mut self) {
        self.scaling_factor = self.scaling_factor.clamp(0.0, SCALING_FACTOR_MAX);
        self.scaling_anim_maxfactor = self.scaling_anim_maxfactor.max(0.0);
    }

    /// Animation tick: sweep the factor up; past the configured maximum the
    /// factor resets and the channel window advances by one, wrapping at the
    /// channel-count boundary.
    pub fn advance_anim(&mut self, frame_delta: f32, channels_max: i32) {
        if !self.scaling_anim {
            return;
        }
        self.scaling_factor += ANIM_FACTOR_STEP * frame_delta * self.scaling_anim_speed;
        if self.scaling_factor > self.scaling_anim_maxfactor {
            self.scaling_factor = 0.0;
            if self.scaling_channel_min < channels_max {
                self.scaling_channel_min += 1;
            } else {
                self.scaling_channel_min = 0;
            }
            self.scaling_channel_max = self.scaling_channel_min;
        }
    }

    /// Cross-field validation: a boundary layer or an empty channel
    /// selection clears the whole scaling request back to its inactive
    /// defaults so nothing meaningless reaches the renderer.
    // TODO: the boundary exclusion does not reliably cover the input layer.
    pub fn validate_scaling(&mut self) {
        let boundary = matches!(
            self.scaling_layer.as_deref(),
            Some("input") | Some("output")
        );
        if self.scaling_layer.is_none() || boundary || self.scaling_channel_min == -1 {
            self.scaling_layer = None;
            self.scaling_channel_min = -1;
            self.scaling_channel_max = -1;
            self.scaling_factor = 0.0;
        }
    }

    /// Write the finalized settings into the shared render-arguments record.
    /// Selecting the final output layer publishes `layer_name = None` (the
    /// renderer then shows the output image itself). FFT parameters beyond
    /// the toggle are only pushed while the FFT view is on.
    pub fn publish(&self, layers: &[LayerDesc], args: &mut RenderArgs) {
        let last = layers.last().map(|l| l.name.as_str());
        args.layer_name = match (self.cur_layer.as_deref(), last) {
            (Some(cur), Some(last)) if cur != last => Some(cur.to_string()),
            _ => None,
        };
        args.sel_channels = self.sel_channels;
        args.base_channel = self.base_channel.max(0) as usize;
        args.img_scale_db = self.img_scale_db;
        args.img_normalize = self.img_normalize;
        args.scaling_layer = self.scaling_layer.clone();
        args.scaling_channel_min = self.scaling_channel_min;
        args.scaling_channel_max = self.scaling_channel_max;
        args.scaling_factor = self.scaling_factor;
        args.fft_show = self.fft_show;
        if self.fft_show {
            args.fft_all = self.fft_all;
            args.fft_range_db = self.fft_range_db;
            args.fft_beta = self.fft_beta;
        }
    }
}
