use serde::{Deserialize, Serialize};

/// Settings record published by the layer panel once per frame and consumed
/// by the renderer on the next pass. Single writer, single reader, no
/// cross-frame ownership.
///
/// `scaling_channel_min`/`max` use -1 as "no channel selected", matching the
/// panel's slider range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderArgs {
    pub layer_name: Option<String>,
    pub sel_channels: usize,
    pub base_channel: usize,
    pub img_scale_db: f32,
    pub img_normalize: bool,
    pub scaling_layer: Option<String>,
    pub scaling_channel_min: i32,
    pub scaling_channel_max: i32,
    pub scaling_factor: f32,
    pub fft_show: bool,
    pub fft_all: bool,
    pub fft_range_db: f32,
    pub fft_beta: f32,
}

impl Default for RenderArgs {
    fn default() -> Self {
        Self {
            layer_name: None,
            sel_channels: 3,
            base_channel: 0,
            img_scale_db: 0.0,
            img_normalize: false,
            scaling_layer: None,
            scaling_channel_min: -1,
            scaling_channel_max: -1,
            scaling_factor: 0.0,
            fft_show: false,
            fft_all: true,
            fft_range_db: 50.0,
            fft_beta: 8.0,
        }
    }
}
