pub mod derive;
pub mod environment;
pub mod errors;
pub mod init;
pub mod lifecycle;
pub mod logging;
pub mod remote;
pub mod settings;
pub mod template;
pub mod ui;
