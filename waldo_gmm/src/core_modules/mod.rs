pub mod component;
pub mod grid_manager;
pub mod mask;
pub mod mixture;
pub mod pixel;
