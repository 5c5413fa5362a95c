//! # Thermy CLI
//!
//! Command-line interface for Bluetooth LE cat printers.
//!
//! ## Usage
//!
//! ```bash
//! # Find printers nearby
//! thermy --scan
//!
//! # Print text
//! thermy --text "Hello World" --device AA:BB:CC:DD:EE:FF
//! thermy --text "Left\nAligned" --align left --device AA:BB:CC:DD:EE:FF
//! thermy --text "IMPORTANT" --invert --border 2 --font-size 24 --device AA:BB:CC:DD:EE:FF
//!
//! # Print a text file or an image
//! thermy --file notes.txt --border 1 --device AA:BB:CC:DD:EE:FF
//! thermy --image cat.jpg --dither bayer --device AA:BB:CC:DD:EE:FF
//!
//! # Render to PNG without printing
//! thermy --text "Draft" --preview draft.png
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use clap_verbosity_flag::{Verbosity, WarnLevel};

use thermy::{
    ThermyError,
    config::{BORDER_RANGE, JobInput, JobOptions, PrintSettings, TransportConfig},
    logging,
    printer::{PrinterProfile, profile},
    protocol::job::{self, PrintJob},
    render::{
        RasterImage,
        dither::DitheringAlgorithm,
        font::{BitmapFont, GlyphSource, TtfFont},
        image,
        text::{self, Alignment, TextOptions},
    },
    requirements,
    transport::{BleAdapter, TransportSession, discovery},
};

const DEFAULT_FONT_SIZE: usize = 16;

/// Thermy - Bluetooth LE cat printer utility
#[derive(Parser, Debug)]
#[command(name = "thermy")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Scan for nearby printers and list them
    #[arg(short, long)]
    scan: bool,

    /// How long to scan, in seconds
    #[arg(long, value_name = "SECS", default_value_t = 10)]
    scan_time: u64,

    /// Text to print (`\n` starts a new line)
    #[arg(short, long, group = "input")]
    text: Option<String>,

    /// Text file to print
    #[arg(short, long, value_name = "PATH", group = "input")]
    file: Option<PathBuf>,

    /// Image file to print (PNG, JPEG, GIF, BMP, ...)
    #[arg(short, long, value_name = "PATH", group = "input")]
    image: Option<PathBuf>,

    /// Bluetooth address of the printer
    #[arg(short, long, value_name = "ADDRESS")]
    device: Option<String>,

    /// Printer model or family (GB01, MX10, XW, ...)
    #[arg(long)]
    model: Option<String>,

    /// Font size in pixels [default: 16]
    #[arg(long)]
    font_size: Option<usize>,

    /// TrueType/OpenType font (defaults to the built-in bitmap font)
    #[arg(long, value_name = "PATH")]
    font: Option<PathBuf>,

    /// Text alignment: left, center or right [default: center]
    #[arg(long)]
    align: Option<Alignment>,

    /// White text on black background
    #[arg(long)]
    invert: bool,

    /// Frame around text, 1-10 dots thick
    #[arg(long, value_name = "DOTS")]
    border: Option<usize>,

    /// Image dithering: floyd-steinberg, threshold or bayer
    #[arg(long, default_value = "floyd-steinberg")]
    dither: DitheringAlgorithm,

    /// Print speed, 10-90 (lower is slower and darker)
    #[arg(long, default_value_t = 35)]
    speed: u32,

    /// Heating energy, 1-65535
    #[arg(long, default_value_t = 8000)]
    energy: u32,

    /// Paper rows to feed after printing
    #[arg(long, value_name = "ROWS", default_value_t = 50)]
    feed: u32,

    /// Write the bitmap to a PNG file (prints too if --device is given)
    #[arg(long, value_name = "PNG")]
    preview: Option<PathBuf>,

    /// Transport settings as JSON
    #[arg(long, value_name = "JSON")]
    config: Option<PathBuf>,

    /// Check system requirements and exit
    #[arg(long)]
    check_requirements: bool,

    /// List supported printer models and exit
    #[arg(long)]
    list_models: bool,

    #[command(flatten)]
    verbose: Verbosity<WarnLevel>,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose.tracing_level_filter());

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

fn run(cli: Cli) -> Result<(), ThermyError> {
    if cli.list_models {
        println!("Supported models:");
        for p in profile::PROFILES {
            println!("  {:<5} {} ({} dots)", p.name, p.model_prefixes.join(" "), p.paper_width_dots);
        }
        return Ok(());
    }

    let runtime = tokio::runtime::Runtime::new()?;

    if cli.check_requirements {
        println!("Checking system requirements...");
        let issues = runtime.block_on(requirements::check(cli.font.as_deref()));
        if issues.is_empty() {
            println!("  All requirements are met!");
            return Ok(());
        }
        println!("Issues found:");
        for issue in &issues {
            println!("  - {}", issue);
        }
        return Err(ThermyError::Input(format!("{} requirement(s) not met", issues.len())));
    }

    let transport = match &cli.config {
        Some(path) => TransportConfig::load(path)?,
        None => TransportConfig::default(),
    };

    if cli.scan {
        return runtime.block_on(scan(Duration::from_secs(cli.scan_time)));
    }

    let options = job_options(&cli)?;
    options.validate()?;

    let bitmap = render(&options)?;
    tracing::info!(
        width = bitmap.width_dots(),
        height = bitmap.height_rows(),
        ink = bitmap.ink_count(),
        "rendered bitmap"
    );

    if let Some(path) = &cli.preview {
        bitmap.save_png(path)?;
        println!("Preview saved to {}", path.display());
    }

    let Some(address) = cli.device.as_deref() else {
        if cli.preview.is_some() {
            return Ok(());
        }
        return Err(ThermyError::Input(
            "no device address given; run --scan to find printers, then use --device AA:BB:CC:DD:EE:FF"
                .to_string(),
        ));
    };

    let job = job::encode(&bitmap, options.profile, &options.settings)?;
    job.verify()?;

    runtime.block_on(print(address, &job, transport))
}

/// Validate flags into a job description. No Bluetooth activity happens here.
fn job_options(cli: &Cli) -> Result<JobOptions, ThermyError> {
    let input = if let Some(text) = &cli.text {
        JobInput::Text(text.clone())
    } else if let Some(path) = &cli.file {
        JobInput::TextFile(path.clone())
    } else if let Some(path) = &cli.image {
        JobInput::Image(path.clone())
    } else {
        return Err(ThermyError::Input(
            "no content specified; use --text, --file or --image".to_string(),
        ));
    };

    if matches!(input, JobInput::Image(_)) {
        let text_only: Vec<&str> = [
            ("--font-size", cli.font_size.is_some()),
            ("--font", cli.font.is_some()),
            ("--align", cli.align.is_some()),
            ("--invert", cli.invert),
            ("--border", cli.border.is_some()),
        ]
        .into_iter()
        .filter_map(|(flag, given)| given.then_some(flag))
        .collect();
        if !text_only.is_empty() {
            return Err(ThermyError::Input(format!(
                "{} only apply to text and cannot be used with --image",
                text_only.join(", ")
            )));
        }
    }

    // An explicit --border 0 is out of range, not "no border"
    if let Some(border) = cli.border {
        if !BORDER_RANGE.contains(&border) {
            return Err(ThermyError::Input(format!(
                "border must be between {} and {} dots, got {}",
                BORDER_RANGE.start(),
                BORDER_RANGE.end(),
                border
            )));
        }
    }

    Ok(JobOptions {
        input,
        profile: resolve_profile(cli.model.as_deref())?,
        font_size: cli.font_size.unwrap_or(DEFAULT_FONT_SIZE),
        font_path: cli.font.clone(),
        text: TextOptions {
            align: cli.align.unwrap_or_default(),
            invert: cli.invert,
            border: cli.border.unwrap_or(0),
        },
        dither: cli.dither,
        settings: PrintSettings::new(cli.speed, cli.energy, cli.feed)?,
    })
}

fn resolve_profile(model: Option<&str>) -> Result<&'static PrinterProfile, ThermyError> {
    match model {
        None => Ok(profile::DEFAULT_PROFILE),
        Some(name) => profile::by_name(name).ok_or_else(|| {
            ThermyError::Input(format!(
                "unknown model '{}'. Supported: {}",
                name,
                profile::list_models().join(", ")
            ))
        }),
    }
}

fn render(options: &JobOptions) -> Result<RasterImage, ThermyError> {
    let paper_width = options.profile.paper_width_dots as usize;

    let content = match &options.input {
        JobInput::Image(path) => return image::rasterize_file(path, paper_width, options.dither),
        JobInput::Text(text) => text.clone(),
        JobInput::TextFile(path) => std::fs::read_to_string(path).map_err(|e| {
            ThermyError::Input(format!("Error reading file {}: {}", path.display(), e))
        })?,
    };

    let font: Box<dyn GlyphSource> = match &options.font_path {
        Some(path) => Box::new(TtfFont::load(path, options.font_size)?),
        None => Box::new(BitmapFont::new(options.font_size)),
    };
    Ok(text::render_text(&content, paper_width, font.as_ref(), &options.text))
}

async fn scan(window: Duration) -> Result<(), ThermyError> {
    let adapter = open_adapter().await?;
    println!("Scanning for printers ({} s)...", window.as_secs());

    let printers = discovery::scan(adapter.as_ref(), window).await?;
    if printers.is_empty() {
        println!("No compatible printers found.");
        return Ok(());
    }

    println!("\nFound {} compatible printer(s):", printers.len());
    for printer in &printers {
        println!("  {}: {} ({})", printer.name, printer.address, printer.profile.name);
    }
    println!("\nTo use a printer, specify its address with --device");
    Ok(())
}

async fn print(address: &str, job: &PrintJob, config: TransportConfig) -> Result<(), ThermyError> {
    let adapter = open_adapter().await?;
    let mut session = TransportSession::new(adapter.as_ref(), address, config);

    let cancel = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    println!("Connecting to {}...", address);
    let report = session.run(job, cancel).await?;
    println!(
        "Printed {} rows ({} bytes in {} writes).",
        job.raster_lines(),
        report.bytes,
        report.writes
    );
    Ok(())
}

#[cfg(feature = "bluetooth")]
async fn open_adapter() -> Result<Box<dyn BleAdapter>, ThermyError> {
    let adapter = thermy::transport::btle::BtleAdapter::first().await?;
    Ok(Box::new(adapter))
}

#[cfg(not(feature = "bluetooth"))]
async fn open_adapter() -> Result<Box<dyn BleAdapter>, ThermyError> {
    Err(ThermyError::Discovery(
        "bluetooth support not compiled in (rebuild with `--features bluetooth`)".to_string(),
    ))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn options(args: &[&str]) -> Result<JobOptions, ThermyError> {
        let cli = Cli::try_parse_from(std::iter::once("thermy").chain(args.iter().copied()))
            .map_err(|e| ThermyError::Input(e.to_string()))?;
        job_options(&cli)
    }

    #[test]
    fn test_text_defaults() {
        let job = options(&["--text", "hi"]).unwrap();
        assert_eq!(job.font_size, 16);
        assert_eq!(job.text.align, Alignment::Center);
        assert_eq!(job.text.border, 0);
    }

    #[test]
    fn test_text_flags_rejected_with_image() {
        let flags: [&[&str]; 5] = [
            &["--invert"],
            &["--border", "2"],
            &["--align", "left"],
            &["--font-size", "24"],
            &["--font", "x.ttf"],
        ];
        for flag in flags {
            let mut args = vec!["--image", "cat.png"];
            args.extend_from_slice(flag);
            let err = options(&args).unwrap_err();
            assert!(matches!(err, ThermyError::Input(_)), "{:?}", flag);
            assert!(err.to_string().contains(flag[0]), "{}", err);
        }
        assert!(options(&["--image", "cat.png", "--dither", "bayer"]).is_ok());
    }

    #[test]
    fn test_border_zero_rejected() {
        assert!(options(&["--text", "hi", "--border", "0"]).is_err());
        assert_eq!(options(&["--text", "hi", "--border", "10"]).unwrap().text.border, 10);
    }

    #[test]
    fn test_inputs_are_exclusive() {
        assert!(options(&["--text", "hi", "--image", "cat.png"]).is_err());
        assert!(options(&[]).is_err());
    }
}
