use buy_earth::app::{self, AppConfig, DEFAULT_BRIDGE_URL};
use color_eyre::eyre::{Result, eyre};
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing_appender::rolling;
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

const DEFAULT_DATA_DIR: &str = "~/.buy-earth";

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let config = build_config(std::env::args().skip(1))?;
    init_logging(&config.data_dir)?;
    app::run_app(config).await
}

fn build_config(mut args: impl Iterator<Item = String>) -> Result<AppConfig> {
    let mut bridge_url = DEFAULT_BRIDGE_URL.to_string();
    let mut data_dir = DEFAULT_DATA_DIR.to_string();
    let mut connect_on_start = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--bridge-url" => {
                bridge_url = args.next().ok_or_else(|| eyre!("--bridge-url needs a value"))?;
            }
            "--data-dir" => {
                data_dir = args.next().ok_or_else(|| eyre!("--data-dir needs a value"))?;
            }
            "--connect" => connect_on_start = true,
            "--help" | "-h" => print_usage_and_exit(),
            other => return Err(eyre!("unknown argument: {other} (try --help)")),
        }
    }

    Ok(AppConfig {
        bridge_url,
        data_dir: PathBuf::from(shellexpand::tilde(&data_dir).into_owned()),
        connect_on_start,
    })
}

fn print_usage_and_exit() -> ! {
    println!(
        "buy-earth - terminal client for the Buy Earth grid\n\
         \n\
         Usage: buy-earth [options]\n\
         \n\
         Options:\n\
         \x20 --bridge-url <url>   wallet bridge endpoint (default {DEFAULT_BRIDGE_URL})\n\
         \x20 --data-dir <path>    session and log directory (default {DEFAULT_DATA_DIR})\n\
         \x20 --connect            connect the wallet immediately on startup\n\
         \x20 -h, --help           show this help"
    );
    std::process::exit(0)
}

/// Logs go to a daily rolling file. Writing them to stdout would tear up
/// the terminal UI.
fn init_logging(data_dir: &std::path::Path) -> Result<()> {
    let log_dir = data_dir.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let (writer, guard) = tracing_appender::non_blocking(rolling::daily(log_dir, "buy-earth.log"));
    let _ = LOG_GUARD.set(guard);
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn build_config__applies_overrides() {
        let config = build_config(args(&[
            "--bridge-url",
            "http://localhost:9999",
            "--connect",
        ]))
        .unwrap();
        assert_eq!(config.bridge_url, "http://localhost:9999");
        assert!(config.connect_on_start);
    }

    #[test]
    fn build_config__rejects_unknown_arguments() {
        assert!(build_config(args(&["--frobnicate"])).is_err());
        assert!(build_config(args(&["--data-dir"])).is_err());
    }
}
