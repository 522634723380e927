mod app;
mod audio;
mod colors;
mod config;
mod error;
mod logging;
mod render;
mod scheduler;
mod settings;
mod terminal;

use clap::{Args, Parser, Subcommand};
use config::{AppConfig, StartSource};
use render::VisualMode;
use settings::Settings;
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "spectra")]
#[command(author = "Terminal Spectrum Visualizer")]
#[command(version = "0.1.0")]
#[command(about = "spectra: real-time audio spectrum in the terminal, from a file or the microphone", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Write a debug log (see log.file in the config, default /tmp/spectra.log)
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Args, Clone)]
struct ViewArgs {
    /// Visual mode: bars or circle
    #[arg(short, long)]
    mode: Option<VisualMode>,

    /// Frames per second while a source is live
    #[arg(short, long)]
    fps: Option<u32>,
}

#[derive(Subcommand)]
enum Commands {
    /// Play WAV files and visualize them (n: next file)
    Play {
        /// Files to play, in order
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        view: ViewArgs,
    },

    /// Visualize the microphone (never played back)
    Mic {
        #[command(flatten)]
        view: ViewArgs,
    },

    /// List audio input and output devices
    Devices,
}

fn run_visualizer(config: AppConfig) -> io::Result<()> {
    let backend = audio::CpalBackend::new(config.input_device.clone(), config.output_device.clone());
    let mut app = app::App::new(backend, &config);
    let mut term = terminal::Terminal::new(true)?;
    app.start(&config.start);
    app.run(&mut term)
}

fn print_devices() {
    let devices = audio::list_devices();
    let mark = |name: &String, default: &Option<String>| {
        if default.as_ref() == Some(name) { "*" } else { " " }
    };

    println!("Input devices:");
    for name in &devices.inputs {
        println!(" {} {}", mark(name, &devices.default_input), name);
    }
    println!("Output devices:");
    for name in &devices.outputs {
        println!(" {} {}", mark(name, &devices.default_output), name);
    }
}

fn main() -> io::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load();

    if let Err(e) = logging::init(&settings.log, cli.debug) {
        eprintln!("Warning: could not open log file {:?}: {}", settings.log.file, e);
    }

    match cli.command {
        Commands::Play { files, view } => run_visualizer(AppConfig::resolve(
            &settings,
            StartSource::Files,
            files,
            view.mode,
            view.fps,
        )),
        Commands::Mic { view } => run_visualizer(AppConfig::resolve(
            &settings,
            StartSource::Microphone,
            Vec::new(),
            view.mode,
            view.fps,
        )),
        Commands::Devices => {
            print_devices();
            Ok(())
        }
    }
}
