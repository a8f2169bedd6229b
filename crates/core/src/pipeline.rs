//! The assembly state machine:
//! `Scripted -> Fetched -> Assembled -> Polished -> Rated -> SafetyChecked`.
//!
//! Each step checks that the step it depends on has completed and fails closed
//! otherwise. Only the iteration loop goes back, re-polishing and re-rating.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::{
    artifacts::{get_clips_dir, get_draft_path, get_final_path, get_song_path, script_stem},
    config::ReelConfig,
    director::{assemble_per_segment, assemble_shared},
    error::{ReelError, Result},
    iterate::{Evaluate, IterationOutcome, IterationPolicy, Refine, iterate},
    openai::OpenAiClient,
    polish::{AudioInputs, CaptionTiming, PolishRequest, caption_segments, polish},
    provider::Service,
    rate::{RatingContext, RatingReport, rate_video},
    reconcile::Timeline,
    safety::{SafetyReport, safety_check},
    scout::Scout,
    script::{Script, Segment},
    song::{SongClient, build_composition_plan},
    voice::synthesize_voice,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Scripted,
    Fetched,
    Assembled,
    Polished,
    Rated,
    SafetyChecked,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Scripted => "script",
            Stage::Fetched => "fetch",
            Stage::Assembled => "assemble",
            Stage::Polished => "polish",
            Stage::Rated => "rate",
            Stage::SafetyChecked => "safety check",
        }
    }

    /// The stage that must have completed before this one may run.
    pub fn prerequisite(&self) -> Option<Stage> {
        match self {
            Stage::Scripted => None,
            Stage::Fetched => Some(Stage::Scripted),
            Stage::Assembled => Some(Stage::Fetched),
            Stage::Polished => Some(Stage::Assembled),
            Stage::Rated | Stage::SafetyChecked => Some(Stage::Polished),
        }
    }
}

/// How footage and audio are sourced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    /// One clip per segment.
    #[default]
    Standard,
    /// One shared clip covering the whole script.
    SingleClip,
    /// A generated song sets the length; one shared clip covers it.
    Song,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub mode: Mode,
    pub voiceover: bool,
    pub music: Option<PathBuf>,
}

impl PipelineOptions {
    /// Every external service a run with these options will call.
    pub fn required_services(&self) -> Vec<Service> {
        let mut services = vec![Service::OpenAi, Service::Pexels];
        if self.mode == Mode::Song {
            services.push(Service::ElevenLabs);
        }
        services
    }
}

pub struct Pipeline {
    config: ReelConfig,
    http: reqwest::Client,
    options: PipelineOptions,
    script: Script,
    stem: String,
    stage: Stage,
    audio: AudioInputs,
    song_duration: Option<f64>,
}

impl Pipeline {
    /// Load and validate the script. Credentials for every service the run
    /// needs are checked here, before any external call.
    pub async fn open(
        config: ReelConfig,
        http: reqwest::Client,
        script_path: &Path,
        options: PipelineOptions,
    ) -> Result<Self> {
        for service in options.required_services() {
            service.validate_api_key()?;
        }

        let script = Script::load(script_path).await?;
        Self::from_script(config, http, script, script_stem(script_path), options)
    }

    pub fn from_script(
        config: ReelConfig,
        http: reqwest::Client,
        script: Script,
        stem: String,
        options: PipelineOptions,
    ) -> Result<Self> {
        script.ensure_not_empty()?;
        if options.mode == Mode::Song {
            script.ensure_captions()?;
        }
        if let Some(music) = options.music.as_ref().filter(|m| !m.exists()) {
            return Err(ReelError::InvalidInput {
                reason: format!("music file not found: {}", music.display()),
            });
        }

        let audio = AudioInputs {
            music: options.music.clone(),
            ..AudioInputs::default()
        };

        Ok(Self {
            config,
            http,
            options,
            script,
            stem,
            stage: Stage::Scripted,
            audio,
            song_duration: None,
        })
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    pub fn clips_dir(&self) -> PathBuf {
        get_clips_dir(&self.config.clips_dir, &self.stem)
    }

    pub fn draft_path(&self) -> PathBuf {
        get_draft_path(&self.config.output_dir, &self.stem)
    }

    pub fn final_path(&self) -> PathBuf {
        get_final_path(&self.config.output_dir, &self.stem)
    }

    pub fn song_path(&self) -> PathBuf {
        get_song_path(&self.config.output_dir, &self.stem)
    }

    pub fn rating_context(&self) -> RatingContext {
        RatingContext {
            has_voiceover: self.options.voiceover,
            has_music: self.audio.music.is_some() || self.audio.song.is_some(),
        }
    }

    fn require(&self, stage: Stage) -> Result<()> {
        match stage.prerequisite() {
            Some(required) if self.stage < required => Err(ReelError::MissingPrerequisite {
                stage: stage.name(),
                required: required.name(),
            }),
            _ => Ok(()),
        }
    }

    fn advance(&mut self, stage: Stage) {
        self.stage = stage;
    }

    fn openai(&self) -> Result<OpenAiClient> {
        OpenAiClient::new(self.http.clone())
    }

    fn caption_timing(&self) -> CaptionTiming {
        match self.options.mode {
            Mode::Song => CaptionTiming::FitVideo,
            _ => CaptionTiming::Nominal,
        }
    }

    /// Segments as they are captioned on a render `video_duration` seconds long.
    pub fn caption_segments(&self, video_duration: f64) -> Result<Vec<Segment>> {
        caption_segments(&self.script, self.caption_timing(), video_duration)
    }

    /// Generate the song for song mode. Returns its measured duration.
    pub async fn compose_song(&mut self) -> Result<f64> {
        if self.options.mode != Mode::Song {
            return Err(ReelError::InvalidInput {
                reason: "songs are only composed in song mode".to_string(),
            });
        }

        let plan = build_composition_plan(self.script.segments())?;
        let song_path = self.song_path();
        let duration = SongClient::new(self.http.clone())?
            .compose(&plan, &song_path)
            .await?;

        self.audio.song = Some(song_path);
        self.song_duration = Some(duration);
        Ok(duration)
    }

    /// Length the shared clip must cover in single-clip and song modes.
    fn shared_target(&self) -> Result<f64> {
        match self.options.mode {
            Mode::Song => self.song_duration.ok_or(ReelError::MissingPrerequisite {
                stage: Stage::Fetched.name(),
                required: "song",
            }),
            _ => Ok(f64::from(self.script.nominal_duration())),
        }
    }

    pub async fn fetch(&mut self) -> Result<Vec<PathBuf>> {
        self.require(Stage::Fetched)?;
        let scout = Scout::new(self.http.clone())?;
        let clips_dir = self.clips_dir();

        let clips = match self.options.mode {
            Mode::Standard => scout.fetch_per_segment(self.script.segments(), &clips_dir).await?,
            Mode::SingleClip | Mode::Song => {
                let min_duration = self.shared_target()?.ceil() as u32;
                vec![
                    scout
                        .fetch_single(self.script.segments(), &clips_dir, min_duration)
                        .await?,
                ]
            }
        };

        info!("Fetched {} clips into {}", clips.len(), clips_dir.display());
        self.advance(Stage::Fetched);
        Ok(clips)
    }

    pub async fn assemble(&mut self) -> Result<Timeline> {
        self.require(Stage::Assembled)?;
        let clips_dir = self.clips_dir();
        let draft_path = self.draft_path();

        let timeline = match self.options.mode {
            Mode::Standard => {
                assemble_per_segment(self.script.segments(), &clips_dir, &self.config, &draft_path)
                    .await?
            }
            Mode::SingleClip | Mode::Song => {
                assemble_shared(&clips_dir, self.shared_target()?, &self.config, &draft_path)
                    .await?
            }
        };

        self.advance(Stage::Assembled);
        Ok(timeline)
    }

    /// Synthesize the voiceover once; later polish passes reuse it.
    async fn prepare_voice(&mut self) -> Result<()> {
        if self.options.voiceover && self.audio.voice.is_none() {
            let client = self.openai()?;
            let voice = synthesize_voice(&client, self.script.segments(), &self.config.audio).await?;
            self.audio.voice = Some(voice);
        }
        Ok(())
    }

    async fn polish_once(&self) -> Result<PathBuf> {
        let timing = self.caption_timing();
        let draft_path = self.draft_path();
        let output_path = self.final_path();
        polish(
            PolishRequest {
                script: &self.script,
                draft_path: &draft_path,
                output_path: &output_path,
                timing,
                audio: &self.audio,
            },
            &self.config,
        )
        .await
    }

    async fn rate_once(&self, artifact: &Path) -> Result<RatingReport> {
        rate_video(
            &self.openai()?,
            artifact,
            &self.script,
            self.caption_timing(),
            self.rating_context(),
        )
        .await
    }

    pub async fn polish(&mut self) -> Result<PathBuf> {
        self.require(Stage::Polished)?;
        self.prepare_voice().await?;
        let output = self.polish_once().await?;
        self.advance(Stage::Polished);
        Ok(output)
    }

    pub async fn rate(&mut self) -> Result<RatingReport> {
        self.require(Stage::Rated)?;
        let report = self.rate_once(&self.final_path()).await?;
        self.advance(Stage::Rated);
        Ok(report)
    }

    /// Polish and rate until the report passes or the budget runs out.
    ///
    /// Every pass re-renders from the same inputs, so the polished video is the
    /// same each time; only the rating can change between passes.
    pub async fn iterate(&mut self, policy: IterationPolicy) -> Result<IterationOutcome> {
        self.require(Stage::Polished)?;
        self.prepare_voice().await?;

        let outcome = {
            let mut refiner = Repolish { pipeline: &*self };
            let mut evaluator = Rerate { pipeline: &*self };
            iterate(&mut refiner, &mut evaluator, policy).await?
        };

        self.advance(Stage::Rated);
        Ok(outcome)
    }

    pub async fn safety_check(&mut self) -> Result<SafetyReport> {
        self.require(Stage::SafetyChecked)?;
        let report = safety_check(
            &self.openai()?,
            &self.final_path(),
            &self.script,
            self.caption_timing(),
        )
        .await?;
        self.advance(Stage::SafetyChecked);
        Ok(report)
    }
}

struct Repolish<'a> {
    pipeline: &'a Pipeline,
}

impl Refine for Repolish<'_> {
    async fn refine(&mut self, _iteration: u32) -> Result<PathBuf> {
        self.pipeline.polish_once().await
    }
}

struct Rerate<'a> {
    pipeline: &'a Pipeline,
}

impl Evaluate for Rerate<'_> {
    async fn evaluate(&mut self, artifact: &Path) -> Result<RatingReport> {
        self.pipeline.rate_once(artifact).await
    }
}
