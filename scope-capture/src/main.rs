//! # Scope Capture
//!
//! Grabs the screen of a RIGOL oscilloscope over its SCPI control port, repairs the
//! PNG checksums the instrument gets wrong and stores an annotated copy.
//!
//! ## Overview
//!
//! The instrument address and output directory come from a `scope_config.json` file
//! (see [`settings`]) and can be overridden on the command line. The captured image
//! gets the capture time, an optional note and optional channel labels drawn onto it.
pub mod annotate;
pub mod logging;
pub mod settings;
pub mod sink;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use scope_client::{
    capture::{self, CaptureRequest, TransferStatus},
    config::Config,
};

use crate::{
    settings::{Settings, config_paths, load_config_file},
    sink::PngFileSink,
};

#[derive(Parser)]
#[command(version, about = "Capture the screen of a RIGOL oscilloscope", long_about = None)]
struct Args {
    #[arg(short, long, help = "Enable debug output")]
    debug: bool,

    #[arg(long, help = "Hostname or IP address of the oscilloscope")]
    host: Option<String>,

    #[arg(short, long, help = "SCPI port of the oscilloscope")]
    port: Option<u16>,

    #[arg(short, long, help = "Name of the output file")]
    file: Option<String>,

    #[arg(short, long, help = "Note drawn onto the capture")]
    note: Option<String>,

    #[arg(long, visible_alias = "l1", help = "Label of channel 1")]
    label1: Option<String>,

    #[arg(long, visible_alias = "l2", help = "Label of channel 2")]
    label2: Option<String>,

    #[arg(long, visible_alias = "l3", help = "Label of channel 3")]
    label3: Option<String>,

    #[arg(long, visible_alias = "l4", help = "Label of channel 4")]
    label4: Option<String>,

    #[arg(long, help = "Directory to store captures in")]
    dir: Option<PathBuf>,

    #[arg(long, help = "Also append the log to this file")]
    log_file: Option<PathBuf>,
}

impl Args {
    fn request(&self, settings: &Settings) -> CaptureRequest {
        let mut request = CaptureRequest::new(&settings.host, settings.port);
        if let Some(file) = &self.file {
            request = request.filename(file);
        }
        if let Some(note) = &self.note {
            request = request.note(note);
        }
        let labels = [&self.label1, &self.label2, &self.label3, &self.label4];
        for (i, label) in labels.into_iter().enumerate() {
            if let Some(label) = label {
                request = request.label(i + 1, label);
            }
        }
        request
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let settings = match load_config_file(&config_paths())? {
        Some(file) => Settings::default().with_file(file),
        None => Settings::default(),
    }
    .with_overrides(args.host.clone(), args.port, args.dir.clone());
    log::debug!("Settings: {:?}", settings);

    let request = args.request(&settings);
    let mut sink = PngFileSink::new(&settings.capture_dir);
    let report = capture::capture(Config::default(), &request, &mut sink)?;

    if let TransferStatus::Truncated { declared, received } = report.transfer {
        log::warn!(
            "Capture is incomplete, received {} of {} bytes",
            received,
            declared
        );
    }
    println!("{}", report.path.display());
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(err) = logging::init(args.debug, args.log_file.as_deref()) {
        eprintln!("Unable to open log file: {}", err);
        return ExitCode::FAILURE;
    }
    log::info!("Starting scope capture");

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
