mod config;
mod pipeline;

pub use config::{
    APP_NAME, config_file_path, console_filter, load_config, load_config_from, overlay_filter,
    save_config, save_config_to,
};
pub use pipeline::{Pipeline, wait_for_shutdown};
