pub mod camera;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod export;
pub mod loaders;
pub mod material;
pub mod math;
pub mod normalize;
pub mod scene;
pub mod scenes;
pub mod session;
pub mod sources;
pub mod stats;

pub use dispatch::{Dispatcher, ModelFormat};
pub use error::LoadError;
pub use scene::{Model, SceneNode};
pub use session::ViewerSession;
