pub mod extractor;
pub mod relay;
pub mod root;
pub mod selection;
pub mod validator;
pub mod video;
pub use root::RootController;
pub use video::VideoController;
