pub mod backup;
pub mod catalog;
pub mod config;
pub mod error;
pub mod ident;
pub mod metadata;
pub mod predata;
