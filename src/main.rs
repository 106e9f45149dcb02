use anyhow::Context;
use log::{info, LevelFilter};
use std::process::ExitCode;

use modbus_dido::cli::{parse_config, usage};
use modbus_dido::{run_binding, Config, ErrorKind, LoopExit, ModbusError};

const EXIT_USAGE: u8 = 1;
const EXIT_RUNTIME: u8 = 2;

fn init_logging(config: &Config) {
    let level = if config.debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_env("RUST_LOG")
        .init();
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // Without a handler the process can only be stopped externally
        std::future::pending::<()>().await;
    }
}

fn print_usage(err: &dyn std::fmt::Display) {
    eprintln!("❌ {}", err);
    eprintln!("{}", usage());
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let config = match parse_config(std::env::args_os()) {
        Ok(config) => config,
        Err(err) => {
            print_usage(&err);
            return ExitCode::from(EXIT_USAGE);
        }
    };

    init_logging(&config);
    info!("🖥️  Modbus DI/DO binding v{}", modbus_dido::VERSION);

    let result = run_binding(&config, shutdown_signal())
        .await
        .with_context(|| {
            format!(
                "binding {} input {} -> coil {} failed",
                config.endpoint, config.input_ref, config.output_ref
            )
        });

    match result {
        Ok(LoopExit::Interrupted) => {
            info!("👋 Goodbye!");
            ExitCode::SUCCESS
        }
        Err(err) => {
            let is_config = err
                .downcast_ref::<ModbusError>()
                .map(|e| e.kind() == ErrorKind::Config)
                .unwrap_or(false);

            if is_config {
                print_usage(&format!("{:#}", err));
                ExitCode::from(EXIT_USAGE)
            } else {
                eprintln!("Error: {:?}", err);
                ExitCode::from(EXIT_RUNTIME)
            }
        }
    }
}
