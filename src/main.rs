//! Meadow - plant image flowers on a terrain and walk among them.
//!
//! Usage: `meadow [config.json] [flower.png]`
//!
//! Without a config argument, `config/meadow.json` is read if present.

use meadow::app::{self, AppError};
use meadow::config::Config;

const DEFAULT_CONFIG_PATH: &str = "config/meadow.json";

fn main() -> Result<(), AppError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut args = std::env::args().skip(1);
    let mut config = match args.next() {
        Some(path) => {
            log::info!("Loading config from {}", path);
            Config::load(&path)?
        }
        None => Config::load_or_default(DEFAULT_CONFIG_PATH),
    };
    if let Some(image) = args.next() {
        config.assets.flower_image = image.into();
    }

    app::run(config)
}
