pub mod assemble;
pub mod compress;
pub mod config;
pub mod errors;
pub mod generate;
pub mod tokens;
pub mod transcript;
pub mod ui;
pub mod util;
