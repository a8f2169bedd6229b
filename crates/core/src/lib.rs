//! reelforge-core
//!
//! Core functionality for turning a segment script into a short vertical
//! video: parsing scripts, reconciling stock footage and generated audio onto
//! one timeline, burning in captions, and gating the result on automated
//! quality and safety reviews.

pub mod artifacts;
pub mod audio;
pub mod config;
pub mod director;
pub mod error;
pub mod format;
pub mod frames;
pub mod iterate;
pub mod media;
pub mod music;
pub mod openai;
pub mod overlay;
pub mod pipeline;
pub mod polish;
pub mod provider;
pub mod rate;
pub mod reconcile;
pub mod safety;
pub mod scout;
pub mod script;
pub mod song;
pub mod voice;
pub mod writer;

pub use artifacts::{get_draft_path, get_final_path, get_rating_path, get_safety_path};
pub use audio::{AudioLayer, PcmTrack, mix_layers};
pub use config::{AudioFallback, AudioSettings, CaptionStyle, FrameSize, ReelConfig};
pub use error::{ReelError, Result};
pub use format::{format_rating_readable, format_safety_readable, format_timestamp};
pub use iterate::{Evaluate, IterationOutcome, IterationPolicy, Refine, iterate};
pub use music::pick_local_music;
pub use overlay::{CaptionBlock, CaptionLine, layout_captions};
pub use pipeline::{Mode, Pipeline, PipelineOptions, Stage};
pub use provider::{Service, ServiceConfig, http_client};
pub use rate::{RatingContext, RatingReport};
pub use reconcile::{MediaAsset, Slice, Timeline, plan_per_segment, plan_shared};
pub use safety::{SafetyReport, Verdict};
pub use script::{Script, Segment, slugify};
pub use writer::{ScriptRequest, ScriptStyle, script_path_for, write_script};
