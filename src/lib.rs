pub mod cli;
pub mod config;
pub mod error;
pub mod input;
pub mod orders;
pub mod positions;
pub mod remote;
pub mod rows;
pub mod run;
pub mod tax;
pub mod translate;
pub mod transport;
