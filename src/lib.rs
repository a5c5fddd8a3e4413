//! LECTERN application library
//!
//! Book catalog and review modules built on the LECTERN kernel, plus the
//! bootstrap shared by the server binary and the CLI.

pub mod app;
pub mod modules;
pub mod seed;
pub mod utils;

pub use app::App;
pub use modules::Services;
