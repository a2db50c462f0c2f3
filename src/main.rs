mod app_state;
mod layer_panel;
mod network;
mod renderer;
mod states;
mod ui;

use anyhow::Result;

fn main() -> Result<()> {
    env_logger::init();
    let native_options = eframe::NativeOptions::default();
    let _ = eframe::run_native(
        "Layerscope",
        native_options,
        Box::new(|_cc| Box::new(ui::create_app())),
    );
    Ok(())
}
