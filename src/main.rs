#![allow(non_snake_case)]
use cosmofit::data_loading::load_dataset;
use cosmofit::fitting::pipeline::run_comparison;
use log::{error, info, LevelFilter};
use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};
use std::env;
use std::process::ExitCode;

fn main() -> ExitCode {
    let logger_instance = CombinedLogger::init(vec![TermLogger::new(
        LevelFilter::Info,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
    if let Err(e) = logger_instance {
        eprintln!("logger initialization failed: {}", e);
    }

    let path = match env::args().nth(1) {
        Some(p) => p,
        None => {
            eprintln!("usage: cosmofit <dataset file>");
            eprintln!("       whitespace-delimited table with zHD, MU_SH0ES,");
            eprintln!("       MU_SH0ES_ERR_DIAG and IS_CALIBRATOR columns");
            return ExitCode::FAILURE;
        }
    };

    info!("loading dataset from {}", path);
    let data = match load_dataset(&path) {
        Ok(data) => data,
        Err(e) => {
            error!("failed to load dataset: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let report = run_comparison(&data);
    println!("{}", report);
    ExitCode::SUCCESS
}
