pub mod archive;
pub mod campaign;
pub mod config;
pub mod constants;
pub mod conversion;
pub mod download;
pub mod env_state;
pub mod manifest;
pub mod observations;
pub mod progress_bar;
pub mod retry;
pub mod sample_list;
pub mod selection;
pub mod snrfetch_errors;
pub mod time;
