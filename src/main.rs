//! `xajcal [param.yaml]`: calibrate the XAJ model with the settings of the
//! given parameter file (`param.yaml` by default).
//!
//! The logger is configured from that file, so failing to read it or to start
//! the logger is reported on stderr. Every later error goes through the logger.
//! The process exits with status 1 on any error.
use flexi_logger::{Duplicate, FileSpec, Logger, LoggerHandle, WriteMode};
use log::{error, info, warn};
use signal_hook::consts::signal::*;
use signal_hook::iterator::Signals;
use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use xajcal::cinfo;
use xajcal::param::{self, Param};

fn init_logger(param: &Param) -> Result<LoggerHandle, Box<dyn Error>> {
    let logger = Logger::try_with_env_or_str(&param.general.log_level)?;
    let handle = if param.general.log_base.is_empty() {
        logger.write_mode(WriteMode::Direct).start()?
    } else {
        logger
            .log_to_file(
                FileSpec::default()
                    .basename(&param.general.log_base)
                    .suffix(&param.general.log_suffix),
            )
            .duplicate_to_stderr(Duplicate::All)
            .write_mode(WriteMode::BufferAndFlush)
            .start()?
    };
    Ok(handle)
}

fn main() {
    let param_file = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "param.yaml".to_string());

    let param = match param::get(param_file.clone()) {
        Ok(param) => param,
        Err(e) => {
            eprintln!("Cannot read parameter file {}: {}", param_file, e);
            std::process::exit(1);
        }
    };

    let logger = match init_logger(&param) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Cannot start logger: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = calibrate(&param, &param_file) {
        error!("{}", e);
        logger.flush();
        std::process::exit(1);
    }
}

fn calibrate(param: &Param, param_file: &str) -> Result<(), Box<dyn Error>> {
    cinfo!(param.general.display_colorful, "\x1b[1;96mxajcal v{}\x1b[0m", xajcal::version());
    info!("Parameters loaded from {}", param_file);

    let running = Arc::new(AtomicBool::new(true));
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    let r = running.clone();
    thread::spawn(move || {
        for sig in signals.forever() {
            warn!("Received signal {}: stopping after the current generation...", sig);
            r.store(false, Ordering::Relaxed);
        }
    });

    let exp = xajcal::run(param, running).map_err(|e| format!("Calibration failed: {}", e))?;

    cinfo!(param.general.display_colorful, "{}", exp.display_results());

    if !param.general.save_exp.is_empty() {
        exp.save_auto(&param.general.save_exp)
            .map_err(|e| format!("Cannot save experiment to {}: {}", param.general.save_exp, e))?;
        info!("Experiment saved to {}", param.general.save_exp);
    }

    Ok(())
}
