pub mod config;
pub mod decode;
pub mod init;
pub mod run;

pub use config::{config, ConfigArgs};
pub use decode::{decode, DecodeArgs};
pub use init::{init, InitArgs};
pub use run::{run, RunArgs};
