pub mod config;
pub mod dispatch;
pub mod interaction;
pub mod layout;
pub mod menu;
pub mod render;
pub mod server;
#[doc(hidden)]
pub mod test_support;
pub mod topology;
pub mod viewer;
