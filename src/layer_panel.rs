//! The layer-inspector panel: layer list, channel/display options, feature
//! statistics, FFT display parameters and the channel-scaling controls.
//!
//! Per-frame cycle: resolve the selection against this frame's layer list,
//! clamp every bounded field into its (moving) range, draw the controls,
//! run cross-field validation and the animation tick, then publish the
//! finalized settings into the shared `RenderArgs`.

use eframe::egui;

use crate::app_state::AppState;
use crate::states::panel::{scaling_candidates, LayerPanelState, SCALING_FACTOR_MAX};

const BUTTON_W: f32 = 56.0;
const LIST_ROWS: f32 = 12.0;

pub fn show(ui: &mut egui::Ui, state: &mut AppState) {
    let layers = state.result.layers.clone();
    let stats = state.result.stats;
    let panel = &mut state.panel;

    panel.resolve_selection(&layers);
    let num_channels = panel.num_channels(&layers);
    let base_channel_max = panel.base_channel_max(&layers);

    layer_list(ui, panel, &layers);
    ui.separator();

    // RGB & normalize.
    ui.horizontal(|ui| {
        let mut rgb = panel.sel_channels == 3;
        ui.checkbox(&mut rgb, "RGB");
        panel.sel_channels = if rgb { 3 } else { 1 };
        ui.checkbox(&mut panel.img_normalize, "Normalize");
        let off_default = panel.sel_channels != 3 || panel.img_normalize;
        if reset_button(ui, off_default) {
            panel.sel_channels = 3;
            panel.img_normalize = false;
        }
    });

    // Image scale.
    ui.horizontal(|ui| {
        ui.add(
            egui::Slider::new(&mut panel.img_scale_db, -40.0..=40.0)
                .fixed_decimals(1)
                .text("Scale dB"),
        );
        if reset_button(ui, panel.img_scale_db != 0.0) {
            panel.img_scale_db = 0.0;
        }
    });

    // Base channel.
    panel.clamp_base_channel(base_channel_max);
    ui.horizontal(|ui| {
        ui.add_enabled_ui(base_channel_max > 0, |ui| {
            ui.add(
                egui::DragValue::new(&mut panel.base_channel)
                    .clamp_range(0..=base_channel_max)
                    .speed(0.05)
                    .prefix("Channel "),
            );
            ui.weak(format!("/{num_channels}"));
            if ui.small_button("-").clicked() {
                panel.base_channel -= 1;
            }
            if ui.small_button("+").clicked() {
                panel.base_channel += 1;
            }
        });
        panel.clamp_base_channel(base_channel_max);
        if reset_button(ui, panel.base_channel != 0 && base_channel_max > 0) {
            panel.base_channel = 0;
        }
    });

    stats_table(ui, stats);

    // FFT display parameters.
    ui.horizontal(|ui| {
        ui.checkbox(&mut panel.fft_show, "FFT");
        ui.add_enabled_ui(panel.fft_show && base_channel_max > 0, |ui| {
            ui.checkbox(&mut panel.fft_all, "All channels");
        });
        if reset_button(ui, panel.fft_show || !panel.fft_all) {
            panel.fft_show = false;
            panel.fft_all = true;
        }
    });
    ui.add_enabled_ui(panel.fft_show, |ui| {
        ui.horizontal(|ui| {
            ui.add(
                egui::Slider::new(&mut panel.fft_range_db, 0.1..=100.0)
                    .fixed_decimals(1)
                    .text("Range ± dB"),
            );
            if reset_button(ui, panel.fft_range_db != 50.0) {
                panel.fft_range_db = 50.0;
            }
        });
        ui.horizontal(|ui| {
            ui.add(
                egui::Slider::new(&mut panel.fft_beta, 0.0..=50.0)
                    .fixed_decimals(2)
                    .text("Kaiser beta"),
            );
            if reset_button(ui, panel.fft_beta != 8.0) {
                panel.fft_beta = 8.0;
            }
        });
    });

    ui.separator();
    scaling_controls(ui, panel, &layers);

    // Finalize and publish.
    panel.clamp_base_channel(base_channel_max);
    panel.publish(&layers, &mut state.args);
}

fn layer_list(ui: &mut egui::Ui, panel: &mut LayerPanelState, layers: &[crate::renderer::LayerDesc]) {
    let row_h = ui.text_style_height(&egui::TextStyle::Body);
    egui::Frame::none()
        .fill(egui::Color32::from_rgba_unmultiplied(40, 74, 122, 50))
        .inner_margin(4.0)
        .show(ui, |ui| {
            egui::ScrollArea::vertical()
                .max_height(row_h * LIST_ROWS)
                .auto_shrink([false, true])
                .show(ui, |ui| {
                    for layer in layers {
                        let selected = panel.cur_layer.as_deref() == Some(layer.name.as_str());
                        ui.horizontal(|ui| {
                            let resp = ui.selectable_label(selected, &layer.name);
                            if resp.clicked() {
                                panel.cur_layer = Some(layer.name.clone());
                            }
                            if selected && panel.refocus {
                                resp.scroll_to_me(Some(egui::Align::Center));
                                panel.refocus = false;
                            }
                            ui.with_layout(
                                egui::Layout::right_to_left(egui::Align::Center),
                                |ui| {
                                    ui.weak(layer.dtype);
                                    ui.weak(layer.shape[1].to_string());
                                    let spatial = layer.shape[2..]
                                        .iter()
                                        .map(|d| d.to_string())
                                        .collect::<Vec<_>>()
                                        .join("x");
                                    ui.weak(spatial);
                                },
                            );
                        });
                    }
                    if layers.is_empty() {
                        ui.weak("No layers found");
                    }
                });
        });
}

fn stats_table(ui: &mut egui::Ui, stats: Option<[f32; 6]>) {
    let cell = |stats: Option<[f32; 6]>, idx: usize| match stats {
        Some(s) => format!("{:.4}", s[idx]),
        None => "N/A".to_string(),
    };
    egui::Grid::new("layer_stats").striped(true).show(ui, |ui| {
        ui.weak("Statistic");
        ui.weak("All channels");
        ui.weak("Selected");
        ui.end_row();
        for (label, all_idx, sel_idx) in [("Mean", 0, 1), ("Std", 2, 3), ("Max", 4, 5)] {
            ui.weak(label);
            ui.label(cell(stats, all_idx));
            ui.label(cell(stats, sel_idx));
            ui.end_row();
        }
    });
}

fn scaling_controls(
    ui: &mut egui::Ui,
    panel: &mut LayerPanelState,
    layers: &[crate::renderer::LayerDesc],
) {
    ui.label("Scale channels after selected layer by factor:");

    let candidates = scaling_candidates(layers);
    let layers_max = candidates.len().saturating_sub(1) as i32;
    panel.clamp_scaling_layer(layers_max);

    ui.horizontal(|ui| {
        ui.add_enabled_ui(layers_max > 0, |ui| {
            ui.add(
                egui::Slider::new(&mut panel.scaling_layer_idx, 0..=layers_max)
                    .show_value(false),
            );
            if ui.small_button("-").clicked() {
                panel.scaling_layer_idx -= 1;
            }
            if ui.small_button("+").clicked() {
                panel.scaling_layer_idx += 1;
            }
            panel.clamp_scaling_layer(layers_max);
            let name = candidates
                .get(panel.scaling_layer_idx as usize)
                .map_or("None", |l| l.name.as_str());
            ui.label(format!("Scaling layer: {name}"));
        });
        if reset_button(ui, panel.scaling_layer_idx != 0 && layers_max > 0) {
            panel.scaling_layer_idx = 0;
        }
    });
    panel.clamp_scaling_layer(layers_max);

    let channels_max = match candidates.get(panel.scaling_layer_idx as usize) {
        Some(layer) => {
            panel.scaling_layer = Some(layer.name.clone());
            layer.shape[1] as i32 - 1
        }
        None => {
            panel.scaling_layer = None;
            0
        }
    };

    let boundary = matches!(panel.scaling_layer.as_deref(), Some("input") | Some("output"));
    panel.clamp_scaling_channels(channels_max);

    // Channel window, lower then upper bound.
    let min_none = panel.scaling_channel_min == -1;
    scaling_channel_row(
        ui,
        "from",
        ScalingBound::Min,
        panel,
        channels_max,
        channels_max > 0 && !boundary,
    );
    scaling_channel_row(
        ui,
        "to",
        ScalingBound::Max,
        panel,
        channels_max,
        channels_max > 0 && !boundary && !min_none,
    );
    panel.clamp_scaling_channels(channels_max);

    // Scaling factor.
    panel.clamp_scaling_factor();
    ui.add_enabled_ui(panel.scaling_channel_min != -1 && !boundary, |ui| {
        ui.horizontal(|ui| {
            ui.add(
                egui::Slider::new(&mut panel.scaling_factor, 0.0..=10.0)
                    .text("Scaling factor"),
            );
            if ui.small_button("-").clicked() {
                panel.scaling_factor -= 0.2;
            }
            if ui.small_button("+").clicked() {
                panel.scaling_factor += 0.2;
            }
            let usable = channels_max > 0;
            if labeled_button(ui, "Set 0", panel.scaling_factor != 0.0 && usable) {
                panel.scaling_factor = 0.0;
            }
            if labeled_button(ui, "Set 1", panel.scaling_factor != 1.0 && usable) {
                panel.scaling_factor = 1.0;
            }
        });
        ui.horizontal(|ui| {
            ui.checkbox(&mut panel.scaling_anim, "Anim");
            ui.label("Max factor");
            ui.add(
                egui::DragValue::new(&mut panel.scaling_anim_maxfactor)
                    .clamp_range(0.0..=SCALING_FACTOR_MAX)
                    .speed(0.1),
            );
            ui.add(
                egui::Slider::new(&mut panel.scaling_anim_speed, 0.0..=10.0).text("Speed"),
            );
        });
    });
    panel.clamp_scaling_factor();

    let frame_delta = ui.input(|i| i.stable_dt);
    panel.advance_anim(frame_delta, channels_max);
    panel.clamp_scaling_channels(channels_max);
    panel.clamp_scaling_factor();

    panel.validate_scaling();
}

enum ScalingBound {
    Min,
    Max,
}

fn scaling_channel_row(
    ui: &mut egui::Ui,
    label: &str,
    bound: ScalingBound,
    panel: &mut LayerPanelState,
    channels_max: i32,
    enabled: bool,
) {
    ui.horizontal(|ui| {
        let resettable = {
            let value = match bound {
                ScalingBound::Min => panel.scaling_channel_min,
                ScalingBound::Max => panel.scaling_channel_max,
            };
            value != -1 && channels_max > 0
        };
        ui.add_enabled_ui(enabled, |ui| {
            let value = match bound {
                ScalingBound::Min => &mut panel.scaling_channel_min,
                ScalingBound::Max => &mut panel.scaling_channel_max,
            };
            ui.add(egui::Slider::new(value, -1..=channels_max.max(0)).show_value(false));
            if ui.small_button("-").clicked() {
                *value -= 1;
            }
            if ui.small_button("+").clicked() {
                *value += 1;
            }
            let shown = if *value >= 0 {
                value.to_string()
            } else {
                "None".to_string()
            };
            ui.label(format!("Scaling channel {label} {shown}/{channels_max}"));
        });
        if reset_button(ui, resettable) {
            match bound {
                ScalingBound::Min => panel.scaling_channel_min = -1,
                ScalingBound::Max => panel.scaling_channel_max = -1,
            }
        }
    });
}

fn reset_button(ui: &mut egui::Ui, enabled: bool) -> bool {
    labeled_button(ui, "Reset", enabled)
}

fn labeled_button(ui: &mut egui::Ui, label: &str, enabled: bool) -> bool {
    ui.add_enabled(
        enabled,
        egui::Button::new(label).min_size(egui::vec2(BUTTON_W, 0.0)),
    )
    .clicked()
}
