pub mod cli;
pub mod detect;
pub mod document;
pub mod error;
pub mod hotspots;
pub mod index;
pub mod ingest;
pub mod model;
pub mod preprocess;
pub mod scanner;
pub mod source;
