use serde::{Deserialize, Serialize};

use crate::renderer::RenderResult;
use crate::states::args::RenderArgs;
use crate::states::panel::LayerPanelState;

#[derive(Serialize, Deserialize)]
pub struct AppState {
    pub panel: LayerPanelState,
    pub args: RenderArgs,

    /// Latest renderer output; rebuilt every frame.
    #[serde(skip)]
    pub result: RenderResult,
    #[serde(skip)]
    pub preview_texture: Option<egui::TextureHandle>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            panel: LayerPanelState::default(),
            args: RenderArgs::default(),
            result: RenderResult::default(),
            preview_texture: None,
        }
    }
}
