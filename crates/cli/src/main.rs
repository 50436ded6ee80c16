use std::path::PathBuf;
use std::process;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::Parser;

use clearscale_core::audio::infrastructure::ffmpeg_audio_router::FfmpegAudioRouter;
use clearscale_core::capability::infrastructure::wgpu_prober::WgpuProber;
use clearscale_core::encode::domain::encoder_session::{
    default_candidates, Container, EncodingFormat, VideoCodec,
};
use clearscale_core::encode::infrastructure::ffmpeg_encoder_session::FfmpegEncoderSession;
use clearscale_core::model::infrastructure::content_store_loader::ContentStoreLoader;
use clearscale_core::pipeline::progress::LogProgressSink;
use clearscale_core::pipeline::upscale_video_use_case::UpscaleVideoUseCase;
use clearscale_core::shared::constants::{
    DEFAULT_AUDIO_SAMPLE_RATE, DEFAULT_MODEL_KEY, DEFAULT_STORE_URL,
};
use clearscale_core::source::infrastructure::ffmpeg_video_source::FfmpegVideoSource;
use clearscale_core::upscale::infrastructure::upscaler_factory::gpu_upscaler_factory;

/// GPU-accelerated neural video upscaling.
#[derive(Parser)]
#[command(name = "clearscale")]
struct Cli {
    /// Input video file.
    input: PathBuf,

    /// Output file; its extension is replaced by the negotiated container's.
    output: PathBuf,

    /// Model key to load from the content store.
    #[arg(long, default_value = DEFAULT_MODEL_KEY)]
    model: String,

    /// Content store base URL.
    #[arg(long, default_value = DEFAULT_STORE_URL)]
    store_url: String,

    /// Directory with pre-fetched model files (checked before the store).
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Capture frame rate (defaults to the source rate).
    #[arg(long)]
    fps: Option<f64>,

    /// Output format candidates in preference order, as container:codec
    /// pairs (containers: mp4, webm, mkv; codecs: h264, vp9, mpeg4).
    #[arg(long, value_delimiter = ',')]
    formats: Option<Vec<String>>,

    /// Decode at the source's real-time pace instead of as fast as possible.
    #[arg(long)]
    realtime: bool,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if !cli.input.exists() {
        return Err(format!("Input file not found: {}", cli.input.display()).into());
    }

    let candidates = match &cli.formats {
        Some(specs) => specs
            .iter()
            .map(|s| parse_format(s))
            .collect::<Result<Vec<_>, _>>()?,
        None => default_candidates(),
    };

    let stop = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, stop.clone())?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, stop.clone())?;

    let mut source = FfmpegVideoSource::new().with_realtime_pacing(cli.realtime);
    let metadata = source.open(&cli.input)?;
    log::info!(
        "{}: {}x{} @ {:.2} fps, {:.2} s ({})",
        cli.input.display(),
        metadata.width,
        metadata.height,
        metadata.fps,
        metadata.duration,
        metadata.codec
    );

    let mut loader = ContentStoreLoader::new(&cli.store_url);
    if let Some(dir) = &cli.model_dir {
        loader = loader.with_local_dir(dir);
    }

    let router = FfmpegAudioRouter::new(cli.input.clone(), DEFAULT_AUDIO_SAMPLE_RATE);

    let mut use_case = UpscaleVideoUseCase::new(
        Box::new(WgpuProber),
        Box::new(loader),
        Box::new(source),
        Box::new(router),
        Box::new(FfmpegEncoderSession::new()),
        gpu_upscaler_factory(),
        Box::new(LogProgressSink::new()),
        stop,
        cli.fps,
    );

    let artifact = use_case
        .execute(&cli.model, &candidates)
        .map_err(|e| format!("[{}] {e}", e.reason_code()))?;

    let output = cli.output.with_extension(artifact.extension);
    std::fs::write(&output, &artifact.data)?;
    log::info!(
        "Output written to {} ({} bytes, {:.2} s)",
        output.display(),
        artifact.data.len(),
        artifact.duration
    );
    Ok(())
}

fn parse_format(spec: &str) -> Result<EncodingFormat, String> {
    let (container, codec) = spec
        .split_once(':')
        .ok_or_else(|| format!("Format must be container:codec, got '{spec}'"))?;
    let container = match container {
        "mp4" => Container::Mp4,
        "webm" => Container::WebM,
        "mkv" => Container::Matroska,
        other => return Err(format!("Unknown container '{other}'")),
    };
    let codec = match codec {
        "h264" => VideoCodec::H264,
        "vp9" => VideoCodec::Vp9,
        "mpeg4" => VideoCodec::Mpeg4,
        other => return Err(format!("Unknown codec '{other}'")),
    };
    Ok(EncodingFormat::new(container, codec))
}
