use batch_image_converter::{
    BatchEvent, BatchRunner, ConversionOptions, ConversionResult, ImageConverter, ImageProcessor,
    InputList, OutputFormat, ResizeMode, DEFAULT_QUALITY,
};
use clap::{Parser, ValueEnum};
use image::imageops::FilterType;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "batch-image-converter")]
#[command(version, about = "Convert batches of images between formats", long_about = None)]
struct Cli {
    /// Image files or folders to convert
    #[arg(value_name = "INPUT", required = true)]
    inputs: Vec<PathBuf>,

    /// Destination directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Load options from a JSON file; flags below override it
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// PNG, JPEG, WEBP, GIF, BMP or TIFF
    #[arg(short, long)]
    format: Option<OutputFormat>,

    /// 1-100
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: Option<u8>,

    /// Scale by percentage
    #[arg(long, group = "resize")]
    percent: Option<f32>,

    /// Resize to exactly WIDTHxHEIGHT
    #[arg(long, group = "resize", value_name = "WIDTHxHEIGHT", value_parser = parse_dimensions)]
    size: Option<(u32, u32)>,

    /// Search for a quality that fits in this many kilobytes
    #[arg(long, group = "resize", value_name = "KB")]
    target_kb: Option<u32>,

    /// Resampling filter used when resizing
    #[arg(long, value_enum, default_value_t = Resampling::Lanczos3)]
    filter: Resampling,

    /// Print the batch summary as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Resampling {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl From<Resampling> for FilterType {
    fn from(resampling: Resampling) -> Self {
        match resampling {
            Resampling::Nearest => FilterType::Nearest,
            Resampling::Triangle => FilterType::Triangle,
            Resampling::CatmullRom => FilterType::CatmullRom,
            Resampling::Gaussian => FilterType::Gaussian,
            Resampling::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

fn parse_dimensions(s: &str) -> Result<(u32, u32), String> {
    let (width, height) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {}", s))?;
    let width = width.trim().parse().map_err(|e| format!("bad width: {}", e))?;
    let height = height.trim().parse().map_err(|e| format!("bad height: {}", e))?;
    Ok((width, height))
}

impl Cli {
    fn options(&self) -> Result<ConversionOptions, String> {
        let mut options = match &self.config {
            Some(path) => ConversionOptions::from_json_file(path).map_err(|e| e.to_string())?,
            None => ConversionOptions::new(
                OutputFormat::Png,
                DEFAULT_QUALITY,
                ResizeMode::default(),
                PathBuf::new(),
            ),
        };

        if let Some(format) = self.format {
            options.output_format = format;
        }
        if let Some(quality) = self.quality {
            options.set_quality(quality);
        }
        if let Some(percent) = self.percent {
            options.resize_mode = ResizeMode::Percent(percent);
        } else if let Some((width, height)) = self.size {
            options.resize_mode = ResizeMode::Exact { width, height };
        } else if let Some(kilobytes) = self.target_kb {
            options.resize_mode = ResizeMode::TargetSize { kilobytes };
        }
        if let Some(output) = &self.output {
            options.destination_directory = output.clone();
        }
        if options.destination_directory.as_os_str().is_empty() {
            return Err("no destination directory, pass --output".to_string());
        }

        Ok(options)
    }

    fn input_list(&self) -> InputList {
        let mut list = InputList::new();
        for input in &self.inputs {
            if input.is_dir() {
                list.add_folder(input);
            } else {
                for rejected in list.add_files([input.clone()]) {
                    eprintln!("⚠️  Unsupported file format: {}", rejected.display());
                }
            }
        }
        list
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let options = match cli.options() {
        Ok(options) => options,
        Err(e) => {
            log::error!("❌ {}", e);
            return ExitCode::FAILURE;
        }
    };

    let inputs = cli.input_list();
    if inputs.is_empty() {
        log::error!("❌ Please select at least one image file");
        return ExitCode::FAILURE;
    }

    log::info!("🦀 Converting {} images to {}", inputs.len(), options.output_format);

    let converter = ImageConverter::with_processor(ImageProcessor::with_filter(cli.filter.into()));
    let (mut events, handle) = BatchRunner::new()
        .with_converter(converter)
        .spawn(inputs.into_vec(), options);

    while let Some(event) = events.recv().await {
        match event {
            BatchEvent::Progress(progress) => {
                log::info!("Progress: {:.0}%", progress.fraction() * 100.0);
            }
            BatchEvent::Result { result: ConversionResult::Failure { input_name, message }, .. } => {
                eprintln!("Failed to convert {}:\n{}", input_name, message);
            }
            BatchEvent::Result { .. } => {}
            BatchEvent::Done(_) => log::info!("All conversions finished!"),
        }
    }

    let summary = match handle.await {
        Ok(Ok(summary)) => summary,
        Ok(Err(e)) => {
            log::error!("❌ Batch stopped: {}", e);
            return ExitCode::FAILURE;
        }
        Err(e) => {
            log::error!("❌ Conversion worker crashed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if cli.json {
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => log::error!("Failed to serialize summary: {}", e),
        }
    }

    if summary.failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
