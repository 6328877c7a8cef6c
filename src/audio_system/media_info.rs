/// Track duration from container metadata
///
/// rodio's mp3 decoder never reports a total duration, so the length is read
/// with symphonia instead.
use std::time::Duration;

use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::TimeBase;

/// Duration of the first audio track in `source`.
///
/// Uses the frame count from the container header when present. Otherwise,
/// with `count_packets` set, walks every packet and sums their lengths, which
/// reads the whole source.
pub fn media_duration(
    source: Box<dyn MediaSource>,
    extension: Option<&str>,
    count_packets: bool,
) -> Option<Duration> {
    let mss = MediaSourceStream::new(source, Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| tracing::debug!("Could not read media header: {}", e))
        .ok()?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)?;
    let track_id = track.id;
    let params = track.codec_params.clone();
    let time_base = params
        .time_base
        .or_else(|| params.sample_rate.map(|rate| TimeBase::new(1, rate)))?;

    let frames = match params.n_frames {
        Some(frames) => frames,
        None if count_packets => {
            let mut total = 0u64;
            // Any error here, end of stream included, ends the walk.
            while let Ok(packet) = format.next_packet() {
                if packet.track_id() == track_id {
                    total += packet.dur;
                }
            }
            total
        }
        None => return None,
    };
    if frames == 0 {
        return None;
    }

    let time = time_base.calc_time(frames);
    Some(Duration::from_secs(time.seconds) + Duration::from_secs_f64(time.frac))
}
