pub use config::Config;
pub use error::{Error, Failure};
pub use run::{run, RunReport};

pub mod config;
pub mod control;
pub mod diary;
pub mod error;
pub mod fd;
pub mod rotate;
pub mod run;
pub mod supervisor;
