use tempfile::TempDir;
use tracing::{debug, info};

use crate::{
    audio::PcmTrack,
    config::AudioSettings,
    error::Result,
    media::{decode_to_wav, probe_duration},
    openai::OpenAiClient,
    reconcile::plan_tempo,
    script::Segment,
};

/// Speak every segment and lay the pieces end to end, each fitted to its
/// caption's duration.
///
/// A recording that misses its slot by more than the tempo tolerance is
/// time-stretched; what remains is padded with silence or trimmed so the next
/// segment starts exactly when its caption does.
pub async fn synthesize_voice(
    client: &OpenAiClient,
    segments: &[Segment],
    settings: &AudioSettings,
) -> Result<PcmTrack> {
    let scratch = TempDir::new()?;
    let mut pieces = Vec::with_capacity(segments.len());

    for (i, segment) in segments.iter().enumerate() {
        let slot = f64::from(segment.duration_seconds());
        let mp3 = scratch.path().join(format!("seg_{:02}.mp3", i));
        let wav = scratch.path().join(format!("seg_{:02}.wav", i));

        let speech = client.speech(segment.spoken_text()).await?;
        tokio::fs::write(&mp3, &speech).await?;

        let natural = probe_duration(&mp3).await?;
        let tempo = plan_tempo(natural, slot, settings);
        debug!(
            "Segment {}: {:.2}s spoken for a {:.0}s slot, tempo {:?}",
            i, natural, slot, tempo
        );

        decode_to_wav(&mp3, &wav, settings, tempo).await?;
        pieces.push(PcmTrack::read_wav(&wav)?.padded(slot));
    }

    let voice = PcmTrack::concat(&pieces)?;
    info!("Voiceover ready ({:.1}s)", voice.duration());
    Ok(voice)
}
