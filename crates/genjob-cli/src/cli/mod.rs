//! CLI for the genjob media job client.
//!
//! Every command prints exactly one JSON object on stdout; logs go to the log
//! file (or stderr with `--log-stderr`).

mod commands;
mod output;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use genjob_core::config::{self, GenjobConfig};
use genjob_core::control::JobControl;
use genjob_core::job::ProviderId;
use genjob_core::JobError;

pub use output::Report;

/// How long a cancelled command may take to report before the process gives up on it.
pub const CANCEL_GRACE: Duration = Duration::from_secs(5);

use commands::{
    run_analyze, run_catalog, run_download, run_image, run_logo, run_resume, run_speech, run_status, run_video,
};

/// Top-level CLI for genjob.
#[derive(Debug, Parser)]
#[command(name = "genjob")]
#[command(about = "genjob: submit, poll and download generative media jobs", long_about = None)]
pub struct Cli {
    /// Log to stderr instead of the log file.
    #[arg(long, global = true)]
    pub log_stderr: bool,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VideoProvider {
    Sora,
    Wan,
    Veo,
}

impl From<VideoProvider> for ProviderId {
    fn from(p: VideoProvider) -> Self {
        match p {
            VideoProvider::Sora => ProviderId::Sora,
            VideoProvider::Wan => ProviderId::Wan,
            VideoProvider::Veo => ProviderId::Veo,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ImageModel {
    Seedream,
    NanoBanana,
}

impl From<ImageModel> for ProviderId {
    fn from(m: ImageModel) -> Self {
        match m {
            ImageModel::Seedream => ProviderId::Seedream,
            ImageModel::NanoBanana => ProviderId::NanoBanana,
        }
    }
}

fn parse_provider(s: &str) -> Result<ProviderId, String> {
    s.parse()
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Generate a video clip and download it.
    Video {
        #[arg(long, value_enum)]
        provider: VideoProvider,
        #[arg(long)]
        prompt: String,
        /// Clip length in seconds.
        #[arg(long, value_name = "SECS")]
        duration: Option<u32>,
        /// Size or resolution in the provider's vocabulary (720x1280, 720P, 1080p).
        #[arg(long)]
        size: Option<String>,
        #[arg(long, value_name = "RATIO")]
        aspect_ratio: Option<String>,
        /// Reference image: URL for wan, local file for sora and veo.
        #[arg(long)]
        image: Option<String>,
        #[arg(long)]
        negative_prompt: Option<String>,
        /// Override the provider's default model.
        #[arg(long)]
        model: Option<String>,
        #[arg(long, short)]
        output: PathBuf,
    },

    /// Synthesize speech with Fish Audio.
    Speech {
        #[arg(long)]
        text: String,
        /// Voice model id.
        #[arg(long)]
        voice: Option<String>,
        #[arg(long, default_value = "mp3")]
        format: String,
        #[arg(long, short)]
        output: PathBuf,
    },

    /// Generate an image with a Replicate-hosted model.
    Image {
        #[arg(long, value_enum)]
        model: ImageModel,
        #[arg(long)]
        prompt: String,
        #[arg(long, value_name = "RATIO")]
        aspect_ratio: Option<String>,
        /// Reference image URL; repeat for several.
        #[arg(long = "image", value_name = "URL")]
        images: Vec<String>,
        #[arg(long, short)]
        output: PathBuf,
    },

    /// Ask a Qwen vision-language model about a video and save the answer.
    Analyze {
        /// Local file, file:// URI or http(s) URL (omni models need a URL).
        #[arg(long)]
        video: String,
        #[arg(long)]
        prompt: String,
        /// Model name; qwen3-omni* and qwen-omni* use the OpenAI-compatible API.
        #[arg(long)]
        model: Option<String>,
        /// Require a JSON answer and save it pretty-printed.
        #[arg(long)]
        json: bool,
        #[arg(long, short)]
        output: PathBuf,
    },

    /// Fetch a brand logo through the catalog (reused when already cached).
    Logo {
        brand: String,
        /// Job that uses the logo, recorded in the catalog.
        #[arg(long)]
        job_id: Option<String>,
        #[arg(long, default_value_t = 512)]
        size: u32,
    },

    /// Check a submitted job once.
    Status {
        #[arg(long, value_parser = parse_provider)]
        provider: ProviderId,
        id: String,
    },

    /// Poll an already submitted job to completion and download its artifact.
    Resume {
        #[arg(long, value_parser = parse_provider)]
        provider: ProviderId,
        id: String,
        #[arg(long, short)]
        output: PathBuf,
    },

    /// Download an artifact URI (retry just the download after a partial failure).
    Download {
        uri: String,
        #[arg(long, short)]
        output: PathBuf,
    },

    /// List catalog entries and usage stats.
    Catalog,
}

impl Cli {
    /// Run the parsed command. Ctrl-c cancels every registered job; a command
    /// that does not wind down within [`CANCEL_GRACE`] is abandoned.
    pub async fn run(self) -> Result<Report> {
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        let control = JobControl::new();
        let dispatch = self.command.dispatch(&cfg, &control);
        tokio::pin!(dispatch);

        let signal = tokio::select! {
            report = &mut dispatch => return Ok(report),
            s = tokio::signal::ctrl_c() => s,
        };
        if let Err(e) = signal {
            tracing::warn!("cannot listen for ctrl-c: {e}");
            return Ok(dispatch.await);
        }

        let n = control.cancel_all();
        tracing::warn!(jobs = n, "interrupted, cancelling");
        match tokio::time::timeout(CANCEL_GRACE, &mut dispatch).await {
            Ok(report) => Ok(report),
            Err(_) => {
                tracing::warn!("command still running after {:?}, exiting", CANCEL_GRACE);
                Ok(Report::error(&JobError::Cancelled))
            }
        }
    }
}

impl CliCommand {
    async fn dispatch(self, cfg: &GenjobConfig, control: &JobControl) -> Report {
        match self {
            CliCommand::Video {
                provider,
                prompt,
                duration,
                size,
                aspect_ratio,
                image,
                negative_prompt,
                model,
                output,
            } => {
                let req = genjob_core::job::VideoRequest {
                    prompt,
                    duration_secs: duration,
                    resolution: size,
                    aspect_ratio,
                    reference_image: image,
                    negative_prompt,
                    model,
                };
                run_video(cfg, control, provider.into(), req, &output).await
            }
            CliCommand::Speech {
                text,
                voice,
                format,
                output,
            } => run_speech(cfg, control, text, voice, format, &output).await,
            CliCommand::Image {
                model,
                prompt,
                aspect_ratio,
                images,
                output,
            } => run_image(cfg, control, model.into(), prompt, aspect_ratio, images, &output).await,
            CliCommand::Analyze {
                video,
                prompt,
                model,
                json,
                output,
            } => {
                let req = genjob_core::job::AnalysisRequest {
                    video,
                    prompt,
                    model,
                    structured: json,
                };
                run_analyze(cfg, control, req, &output).await
            }
            CliCommand::Logo {
                brand,
                job_id,
                size,
            } => run_logo(cfg, control, &brand, job_id.as_deref(), size).await,
            CliCommand::Status { provider, id } => run_status(cfg, provider, &id).await,
            CliCommand::Resume {
                provider,
                id,
                output,
            } => run_resume(cfg, control, provider, &id, &output).await,
            CliCommand::Download { uri, output } => run_download(cfg, control, &uri, &output).await,
            CliCommand::Catalog => run_catalog(cfg).await,
        }
    }
}

#[cfg(test)]
mod tests;
