//! Audio output through rodio.
//!
//! Each voice owns one `rodio::Sink`. A fresh sink is created every time a
//! clip starts so a stopped sink is never reused. Low-pass filtering is
//! applied by a `BltFilter` whose cutoff is re-read periodically from an
//! atomic shared with the voice.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use soundstage_common::{AudioClip, SoundError, SoundResult, VoiceId};
use tracing::{debug, info, warn};

use crate::backend::{AudioBackend, VoiceChannel};

/// How often the filter picks up cutoff changes.
const FILTER_REFRESH: Duration = Duration::from_millis(20);

/// Cutoff used when filtering is disabled.
const BYPASS_CUTOFF: u32 = 20_000;

/// Load and decode a clip file into memory.
pub fn load_clip(name: impl Into<String>, path: impl AsRef<Path>) -> SoundResult<AudioClip> {
    let path = path.as_ref();
    let load_err = |message: String| SoundError::ClipLoad {
        path: path.to_path_buf(),
        message,
    };

    let file = File::open(path).map_err(|e| load_err(e.to_string()))?;
    let decoder = Decoder::new(BufReader::new(file)).map_err(|e| load_err(e.to_string()))?;

    let sample_rate = decoder.sample_rate();
    let channels = decoder.channels();
    let samples: Vec<f32> = decoder.convert_samples::<f32>().collect();

    debug!("Decoded clip {:?} ({} samples)", path, samples.len());
    Ok(AudioClip::from_samples(name, samples, sample_rate, channels))
}

/// A voice backed by a rodio sink.
pub struct RodioVoice {
    id: VoiceId,
    handle: OutputStreamHandle,
    sink: Option<Sink>,
    volume: f32,
    pitch: f32,
    low_pass: Option<f32>,
    cutoff: Arc<AtomicU32>,
}

impl std::fmt::Debug for RodioVoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RodioVoice")
            .field("id", &self.id)
            .field("volume", &self.volume)
            .field("pitch", &self.pitch)
            .field("low_pass", &self.low_pass)
            .finish_non_exhaustive()
    }
}

impl RodioVoice {
    fn cutoff_hz(cutoff: Option<f32>) -> u32 {
        cutoff.map_or(BYPASS_CUTOFF, |hz| hz.clamp(10.0, BYPASS_CUTOFF as f32) as u32)
    }

    fn append_filtered<S>(&self, sink: &Sink, source: S)
    where
        S: Source<Item = f32> + Send + 'static,
    {
        let cutoff = Arc::clone(&self.cutoff);
        let filtered = source
            .low_pass(cutoff.load(Ordering::Relaxed))
            .periodic_access(FILTER_REFRESH, move |filter| {
                filter.to_low_pass(cutoff.load(Ordering::Relaxed));
            });
        sink.append(filtered);
    }
}

impl VoiceChannel for RodioVoice {
    fn id(&self) -> VoiceId {
        self.id
    }

    fn start(&mut self, clip: &AudioClip, looping: bool) {
        let sink = match Sink::try_new(&self.handle) {
            Ok(sink) => sink,
            Err(e) => {
                warn!("Voice {:?} could not create a sink: {e}", self.id);
                self.sink = None;
                return;
            },
        };
        sink.set_volume(self.volume);
        sink.set_speed(self.pitch);

        let source: Box<dyn Source<Item = f32> + Send> = if clip.has_samples() {
            let buffer = rodio::buffer::SamplesBuffer::new(
                clip.channels,
                clip.sample_rate,
                (*clip.samples).clone(),
            );
            if looping {
                Box::new(buffer.repeat_infinite())
            } else {
                Box::new(buffer)
            }
        } else {
            let silence = rodio::source::Zero::<f32>::new(clip.channels, clip.sample_rate);
            if looping {
                Box::new(silence)
            } else {
                Box::new(silence.take_duration(clip.duration))
            }
        };

        self.append_filtered(&sink, source);
        sink.play();
        self.sink = Some(sink);
    }

    fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }

    fn pause(&mut self) {
        if let Some(sink) = &self.sink {
            sink.pause();
        }
    }

    fn resume(&mut self) {
        if let Some(sink) = &self.sink {
            sink.play();
        }
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        if let Some(sink) = &self.sink {
            sink.set_volume(self.volume);
        }
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_pitch(&mut self, pitch: f32) {
        self.pitch = pitch.clamp(0.1, 4.0);
        if let Some(sink) = &self.sink {
            sink.set_speed(self.pitch);
        }
    }

    fn pitch(&self) -> f32 {
        self.pitch
    }

    fn set_low_pass(&mut self, cutoff: Option<f32>) {
        self.low_pass = cutoff;
        self.cutoff
            .store(Self::cutoff_hz(cutoff), Ordering::Relaxed);
    }

    fn low_pass(&self) -> Option<f32> {
        self.low_pass
    }

    fn is_finished(&self) -> bool {
        self.sink.as_ref().map_or(true, Sink::empty)
    }

    fn is_paused(&self) -> bool {
        self.sink.as_ref().is_some_and(Sink::is_paused)
    }
}

/// Backend that plays through the default output device.
pub struct RodioBackend {
    /// The output stream (must be kept alive).
    _stream: OutputStream,
    handle: OutputStreamHandle,
    next_voice: u32,
}

impl std::fmt::Debug for RodioBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RodioBackend")
            .field("next_voice", &self.next_voice)
            .finish_non_exhaustive()
    }
}

impl RodioBackend {
    /// Open the default output device.
    pub fn new() -> SoundResult<Self> {
        let (stream, handle) =
            OutputStream::try_default().map_err(|e| SoundError::DeviceInit(e.to_string()))?;

        info!("Audio device initialized");

        Ok(Self {
            _stream: stream,
            handle,
            next_voice: 0,
        })
    }
}

impl AudioBackend for RodioBackend {
    type Voice = RodioVoice;

    fn name(&self) -> &'static str {
        "rodio"
    }

    fn create_voice(&mut self) -> SoundResult<RodioVoice> {
        // Probe the device once so creation failures surface here rather than at start().
        Sink::try_new(&self.handle).map_err(|e| SoundError::VoiceCreation(e.to_string()))?;

        self.next_voice += 1;
        Ok(RodioVoice {
            id: VoiceId::from_raw(self.next_voice),
            handle: self.handle.clone(),
            sink: None,
            volume: 1.0,
            pitch: 1.0,
            low_pass: None,
            cutoff: Arc::new(AtomicU32::new(BYPASS_CUTOFF)),
        })
    }
}
