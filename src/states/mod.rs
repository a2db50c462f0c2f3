pub mod args;
pub mod panel;
