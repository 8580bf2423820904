//! Playback of synthesized translation audio.
//!
//! The server sends each synthesized translation as a base64 encoded WAV
//! file. Jobs are played one at a time on a dedicated thread so a long clip
//! never blocks the session loop.

use crate::error::PlaybackError;
use crate::state::AppEvent;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::io::Cursor;
use std::sync::mpsc::{self, Sender as EventSender};
use std::time::Duration;

/// Plays one decoded clip and returns when it has finished.
pub trait AudioPlayer: Send {
    fn play(&self, audio: &[u8], language: &str) -> Result<(), PlaybackError>;
}

pub fn decode_payload(payload: &str) -> Result<Vec<u8>, PlaybackError> {
    let bytes = BASE64.decode(payload.trim())?;
    if bytes.is_empty() {
        return Err(PlaybackError::Empty);
    }
    Ok(bytes)
}

/// Format details from a WAV header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavInfo {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    /// Samples per channel declared by the `data` chunk.
    pub frames: u32,
}

impl WavInfo {
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(self.frames as u64 * 1000 / self.sample_rate as u64)
    }
}

/// Read the header of a WAV clip. `None` if it is not a WAV file.
pub fn wav_info(bytes: &[u8]) -> Option<WavInfo> {
    let reader = hound::WavReader::new(Cursor::new(bytes)).ok()?;
    let spec = reader.spec();
    Some(WavInfo {
        channels: spec.channels,
        sample_rate: spec.sample_rate,
        bits_per_sample: spec.bits_per_sample,
        frames: reader.duration(),
    })
}

/// Player used when no audio output is compiled in: validates the clip and
/// logs it instead of playing.
pub struct SilentPlayer;

impl AudioPlayer for SilentPlayer {
    fn play(&self, audio: &[u8], language: &str) -> Result<(), PlaybackError> {
        match wav_info(audio) {
            Some(info) => log::info!(
                "[playback] {}: {}ms of {}Hz audio (output disabled)",
                language,
                info.duration().as_millis(),
                info.sample_rate
            ),
            None => log::info!(
                "[playback] {}: {} bytes of audio (output disabled)",
                language,
                audio.len()
            ),
        }
        Ok(())
    }
}

#[cfg(feature = "audio-out")]
pub struct SpeakerPlayer;

#[cfg(feature = "audio-out")]
impl AudioPlayer for SpeakerPlayer {
    fn play(&self, audio: &[u8], language: &str) -> Result<(), PlaybackError> {
        let (_stream, handle) = rodio::OutputStream::try_default()
            .map_err(|e| PlaybackError::Output(format!("no output device: {}", e)))?;
        let sink = rodio::Sink::try_new(&handle)
            .map_err(|e| PlaybackError::Output(format!("failed to open sink: {}", e)))?;
        let source = rodio::Decoder::new(Cursor::new(audio.to_vec()))
            .map_err(|e| PlaybackError::Output(format!("undecodable audio: {}", e)))?;
        log::info!("[playback] playing {} ({} bytes)", language, audio.len());
        sink.append(source);
        sink.sleep_until_end();
        Ok(())
    }
}

/// The best player this build supports.
pub fn default_player() -> Box<dyn AudioPlayer> {
    #[cfg(feature = "audio-out")]
    {
        Box::new(SpeakerPlayer)
    }
    #[cfg(not(feature = "audio-out"))]
    {
        Box::new(SilentPlayer)
    }
}

struct PlaybackJob {
    language: String,
    payload: String,
}

/// FIFO of clips played on a background thread. Dropping the queue lets the
/// worker finish the current clip and exit.
pub struct PlaybackQueue {
    tx: mpsc::Sender<PlaybackJob>,
    _worker: std::thread::JoinHandle<()>,
}

impl PlaybackQueue {
    pub fn spawn(player: Box<dyn AudioPlayer>, events: Option<EventSender<AppEvent>>) -> Self {
        let (tx, rx) = mpsc::channel::<PlaybackJob>();
        let worker = std::thread::spawn(move || {
            while let Ok(job) = rx.recv() {
                let result = decode_payload(&job.payload)
                    .and_then(|audio| player.play(&audio, &job.language));
                let error = match result {
                    Ok(()) => None,
                    Err(e) => {
                        log::error!("[playback] {}: {}", job.language, e);
                        Some(e.to_string())
                    }
                };
                if let Some(tx) = &events {
                    let _ = tx.send(AppEvent::PlaybackFinished {
                        language: job.language,
                        error,
                    });
                }
            }
        });
        Self {
            tx,
            _worker: worker,
        }
    }

    pub fn enqueue(&self, language: &str, payload: &str) {
        let job = PlaybackJob {
            language: language.to_string(),
            payload: payload.to_string(),
        };
        if self.tx.send(job).is_err() {
            log::error!("[playback] worker stopped; dropping {}", language);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// A PCM16 mono WAV with `samples` zero samples.
    pub fn wav_bytes(sample_rate: u32, samples: u32) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let spec = hound::WavSpec {
                channels: 1,
                sample_rate,
                bits_per_sample: 16,
                sample_format: hound::SampleFormat::Int,
            };
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for _ in 0..samples {
                writer.write_sample(0i16).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[derive(Clone, Default)]
    pub struct RecordingPlayer {
        pub played: Arc<Mutex<Vec<(String, usize)>>>,
    }

    impl AudioPlayer for RecordingPlayer {
        fn play(&self, audio: &[u8], language: &str) -> Result<(), PlaybackError> {
            self.played
                .lock()
                .unwrap()
                .push((language.to_string(), audio.len()));
            Ok(())
        }
    }

    #[test]
    fn reads_wav_header() {
        let info = wav_info(&wav_bytes(16000, 8000)).unwrap();
        assert_eq!(info.channels, 1);
        assert_eq!(info.sample_rate, 16000);
        assert_eq!(info.bits_per_sample, 16);
        assert_eq!(info.frames, 8000);
        assert_eq!(info.duration(), Duration::from_millis(500));
    }

    #[test]
    fn non_wav_is_rejected() {
        assert!(wav_info(b"ID3\x04 not a wave file").is_none());
        assert!(wav_info(&[]).is_none());
    }

    #[test]
    fn decode_rejects_bad_payloads() {
        assert!(matches!(
            decode_payload("***"),
            Err(PlaybackError::Decode(_))
        ));
        assert!(matches!(decode_payload(""), Err(PlaybackError::Empty)));
        assert_eq!(decode_payload("UklGRg==").unwrap(), b"RIFF".to_vec());
    }

    #[test]
    fn queue_plays_in_order_and_reports() {
        let player = RecordingPlayer::default();
        let (tx, rx) = mpsc::channel();
        let queue = PlaybackQueue::spawn(Box::new(player.clone()), Some(tx));

        let clip = BASE64.encode(wav_bytes(16000, 10));
        queue.enqueue("es-ES", &clip);
        queue.enqueue("fr-FR", "not base64!");
        queue.enqueue("de-DE", &clip);

        let mut finished = Vec::new();
        for _ in 0..3 {
            match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
                AppEvent::PlaybackFinished { language, error } => {
                    finished.push((language, error.is_some()))
                }
                other => panic!("unexpected {:?}", other),
            }
        }
        assert_eq!(
            finished,
            vec![
                ("es-ES".to_string(), false),
                ("fr-FR".to_string(), true),
                ("de-DE".to_string(), false)
            ]
        );
        let played = player.played.lock().unwrap();
        assert_eq!(
            played.iter().map(|(l, _)| l.as_str()).collect::<Vec<_>>(),
            vec!["es-ES", "de-DE"]
        );
    }
}
