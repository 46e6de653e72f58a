use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cfg = glyphcam::config::Config::parse();
    if cfg.list_devices {
        glyphcam::audio::list_input_devices()?;
        return Ok(());
    }

    let log_path = glyphcam::logging::init(cfg.log_file.as_deref())?;
    let res = glyphcam::app::run(cfg);
    if let Err(err) = &res {
        log::error!("fatal: {err:#}");
        eprintln!("log: {}", log_path.display());
    }
    res
}
