pub mod categorizer;
pub mod detection;
pub mod exposure_window;
pub mod frame_clock;
pub mod merger;
pub mod replay;
pub mod tracker;
