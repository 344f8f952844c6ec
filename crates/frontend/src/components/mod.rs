pub mod layer_panel;
pub mod map_canvas;
pub mod notices;
pub mod save_dialog;
pub mod tool_panel;
