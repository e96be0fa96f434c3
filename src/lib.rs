pub mod error;
pub mod loader;
pub mod loss;
pub mod mnist;
pub mod network;
pub mod optimizer;
pub mod train;
pub mod view;
