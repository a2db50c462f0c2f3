use eframe::egui;

use crate::app_state::AppState;
use crate::layer_panel;
use crate::renderer::Renderer;

pub struct LayerScopeApp {
    state: AppState,
    renderer: Renderer,
}

pub fn create_app() -> LayerScopeApp {
    LayerScopeApp {
        state: AppState::default(),
        renderer: Renderer::new(),
    }
}

impl eframe::App for LayerScopeApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Run the forward pass with the settings published last frame.
        match self.renderer.render(&self.state.args) {
            Ok(result) => self.state.result = result,
            Err(err) => log::error!("render pass failed: {err:#}"),
        }

        if let Some(image) = self.state.result.image.take() {
            match &mut self.state.preview_texture {
                Some(texture) => texture.set(image, egui::TextureOptions::NEAREST),
                None => {
                    self.state.preview_texture =
                        Some(ctx.load_texture("feature_map", image, egui::TextureOptions::NEAREST));
                }
            }
        }

        egui::SidePanel::left("layer_panel")
            .resizable(true)
            .default_width(460.0)
            .show(ctx, |ui| {
                layer_panel::show(ui, &mut self.state);
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.add_space(12.0);
                match &self.state.preview_texture {
                    Some(texture) => {
                        let size = texture.size_vec2();
                        let avail = ui.available_size();
                        // integer upscale keeps the feature map's pixels crisp
                        let scale = ((avail.x / size.x).min(avail.y / size.y) * 0.9)
                            .floor()
                            .max(1.0);
                        ui.image(egui::load::SizedTexture::new(texture.id(), size * scale));
                    }
                    None => {
                        ui.weak("No feature map");
                    }
                }
                ui.add_space(8.0);
                ui.weak(format!(
                    "{} style vectors",
                    self.renderer.generator().num_ws
                ));
            });
        });

        if self.state.panel.scaling_anim {
            ctx.request_repaint();
        }
    }
}
