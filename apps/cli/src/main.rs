use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use anyhow::Result;
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use reelforge_core::{
    AudioFallback, IterationPolicy, Mode, Pipeline, PipelineOptions, ReelConfig, ScriptRequest,
    ScriptStyle, format_rating_readable, format_safety_readable, get_rating_path, get_safety_path,
    http_client, openai::OpenAiClient, pick_local_music, script_path_for, write_script,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.0}m {:.0}s", (secs / 60.0).floor(), secs % 60.0)
    }
}

#[derive(Parser)]
#[command(name = "reelforge")]
#[command(about = "Turn a topic or script into a captioned vertical reel with stock footage, voice and music")]
struct Cli {
    /// Topic (e.g. "benefits of meditation") or path to an existing script
    topic_or_script: String,

    /// Generate rhymed, song-like captions
    #[arg(long)]
    lyrical: bool,

    /// Add a spoken voiceover synced to the captions
    #[arg(long)]
    voiceover: bool,

    /// Background music file, or "auto" to pick from assets/music
    #[arg(short, long)]
    music: Option<String>,

    /// Background music volume, 0-1
    #[arg(long, default_value_t = 0.15)]
    music_volume: f32,

    /// Use one long clip for the whole video
    #[arg(long)]
    single_clip: bool,

    /// Sung lyrics over a generated song, on one long clip
    #[arg(long, conflicts_with_all = ["single_clip", "voiceover", "music", "lyrical"])]
    song: bool,

    /// Polish and rate repeatedly until the rating passes
    #[arg(long)]
    iterate: bool,

    /// Rate the final video once
    #[arg(long, conflicts_with = "iterate")]
    rate: bool,

    /// Number of segments when generating a script
    #[arg(short = 'n', long, default_value_t = 5)]
    segments: u32,

    /// Target duration in seconds when generating a script
    #[arg(short, long, default_value_t = 30)]
    duration: u32,

    /// Iteration budget for --iterate
    #[arg(long, default_value_t = 3)]
    max_iterations: u32,

    /// Minimum overall score for --iterate to stop early
    #[arg(long, default_value_t = 8.0)]
    min_score: f64,

    /// Project root holding scripts/, clips/, output/ and assets/music/
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Keep the footage's own audio when no voice or music is added
    #[arg(long)]
    keep_draft_audio: bool,
}

impl Cli {
    fn mode(&self) -> Mode {
        if self.song {
            Mode::Song
        } else if self.single_clip {
            Mode::SingleClip
        } else {
            Mode::Standard
        }
    }

    fn style(&self) -> ScriptStyle {
        if self.song {
            ScriptStyle::Flow
        } else if self.lyrical {
            ScriptStyle::Lyrical
        } else {
            ScriptStyle::Standard
        }
    }
}

fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn finish_step(spinner: ProgressBar, message: String, started: Instant) {
    spinner.finish_with_message(format!(
        "{} {} {}",
        style("✓").green().bold(),
        message,
        style(format!("[{}]", format_duration(started.elapsed()))).dim()
    ));
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn resolve_music(choice: Option<&str>, config: &ReelConfig) -> Option<PathBuf> {
    match choice {
        Some(choice) if choice.eq_ignore_ascii_case("auto") => {
            let picked = pick_local_music(&config.music_dir, "default");
            match &picked {
                Some(track) => println!("{} Music: {}", style("✓").green().bold(), file_name(track)),
                None => println!(
                    "{} Music: no tracks in {} (add calm.mp3, uplifting.mp3, ...)",
                    style("!").yellow().bold(),
                    config.music_dir.display()
                ),
            }
            picked
        }
        Some(path) => Some(PathBuf::from(path)),
        None => None,
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reelforge=info,reelforge_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(Cli::parse()).await {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = ReelConfig::rooted_at(&cli.root);
    config.audio.music_gain = cli.music_volume.clamp(0.0, 1.0);
    if cli.keep_draft_audio {
        config.audio.fallback = AudioFallback::KeepDraftAudio;
    }
    tracing::debug!("Config: {:?}", config);

    let options = PipelineOptions {
        mode: cli.mode(),
        voiceover: cli.voiceover,
        music: None,
    };

    // Validate API keys early
    for service in options.required_services() {
        service.validate_api_key()?;
    }

    let http = http_client(config.request_timeout)?;

    println!(
        "\n{}  {}\n",
        style("reelforge").cyan().bold(),
        style("Reel Builder").dim()
    );

    let total_start = Instant::now();

    // Step 1: Script (existing file or generated from the topic)
    let existing = PathBuf::from(&cli.topic_or_script);
    let script_path = if existing.is_file() {
        println!(
            "{} Script: {} {}",
            style("✓").green().bold(),
            file_name(&existing),
            style("(existing)").dim()
        );
        existing
    } else {
        let step_start = Instant::now();
        let spinner = create_spinner(&format!("Writing script for \"{}\"...", cli.topic_or_script));
        let request = ScriptRequest {
            topic: cli.topic_or_script.clone(),
            segments: cli.segments,
            total_duration: cli.duration,
            style: cli.style(),
        };
        let path = script_path_for(&config.scripts_dir, &cli.topic_or_script);
        let script = write_script(&OpenAiClient::new(http.clone())?, &request, &path).await?;
        finish_step(
            spinner,
            format!("Script: {} ({} segments)", file_name(&path), script.len()),
            step_start,
        );
        path
    };

    let options = PipelineOptions {
        music: resolve_music(cli.music.as_deref(), &config),
        ..options
    };
    let mut pipeline = Pipeline::open(config, http, &script_path, options).await?;

    println!("{}", style("─".repeat(60)).dim());

    // Step 2: Song (song mode only)
    if cli.song {
        let step_start = Instant::now();
        let spinner = create_spinner("Composing song...");
        let seconds = pipeline.compose_song().await?;
        finish_step(
            spinner,
            format!("Song: {} ({:.1}s)", file_name(&pipeline.song_path()), seconds),
            step_start,
        );
    }

    // Step 3: Fetch footage
    let step_start = Instant::now();
    let spinner = create_spinner("Fetching stock footage...");
    let clips = pipeline.fetch().await?;
    finish_step(spinner, format!("Fetched {} clips", clips.len()), step_start);

    // Step 4: Assemble draft
    let step_start = Instant::now();
    let spinner = create_spinner("Assembling draft...");
    let timeline = pipeline.assemble().await?;
    finish_step(
        spinner,
        format!(
            "Draft: {} ({:.1}s)",
            file_name(&pipeline.draft_path()),
            timeline.duration()
        ),
        step_start,
    );

    // Step 5: Polish, once or until the rating passes
    let step_start = Instant::now();
    let mut rating = None;
    if cli.iterate {
        let spinner = create_spinner("Polishing and rating...");
        let outcome = pipeline
            .iterate(IterationPolicy {
                max_iterations: cli.max_iterations,
                min_score: cli.min_score,
            })
            .await?;
        let status = if outcome.passed {
            style("target met").green().to_string()
        } else {
            style("budget exhausted").yellow().to_string()
        };
        finish_step(
            spinner,
            format!(
                "Iterated {}/{} ({})",
                outcome.iterations, cli.max_iterations, status
            ),
            step_start,
        );
        rating = Some(outcome.report);
    } else {
        let spinner = create_spinner("Polishing: captions and audio...");
        let output = pipeline.polish().await?;
        finish_step(spinner, format!("Final: {}", file_name(&output)), step_start);
    }

    // Step 6: Optional one-shot rating
    if cli.rate {
        let step_start = Instant::now();
        let spinner = create_spinner("Rating...");
        let report = pipeline.rate().await?;
        finish_step(spinner, "Rated".to_string(), step_start);
        rating = Some(report);
    }

    // Step 7: Safety check always runs
    let step_start = Instant::now();
    let spinner = create_spinner("Running content safety check...");
    let safety = pipeline.safety_check().await?;
    finish_step(spinner, "Safety checked".to_string(), step_start);

    println!(
        "\n{} {}\n",
        style("Total time:").dim(),
        style(format_duration(total_start.elapsed())).cyan().bold()
    );

    let final_path = pipeline.final_path();
    println!(
        "{} {}",
        style("Saved:").dim(),
        style(final_path.display()).cyan()
    );
    if rating.is_some() {
        println!(
            "{} {}",
            style("Rating:").dim(),
            style(get_rating_path(&final_path).display()).cyan()
        );
    }
    println!(
        "{} {}\n",
        style("Safety:").dim(),
        style(get_safety_path(&final_path).display()).cyan()
    );
    println!("{}", style("─".repeat(60)).dim());

    if let Some(report) = &rating {
        println!("{}", format_rating_readable(report));
    }
    println!("{}", format_safety_readable(&safety));

    if !safety.safe {
        println!(
            "{} Safety verdict is '{}'. Review the safety report before publishing.",
            style("WARNING:").yellow().bold(),
            safety.verdict.as_str()
        );
    }

    Ok(())
}
