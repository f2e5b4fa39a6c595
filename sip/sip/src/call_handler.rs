use crate::dtmf::DtmfCollector;
use crate::error::CallError;
use crate::media::FRAME_SIZE;
use bytes::Bytes;
use tokio::sync::{mpsc, watch};

/// Surface through which caller code feeds audio into the call and reads
/// DTMF input.
///
/// Audio is an opaque stream of already-encoded 8 kHz G.711 samples. It is
/// chopped into 20 ms frames here; the media engine paces them onto the
/// wire once the call is answered.
#[derive(Clone)]
pub struct CallHandler {
    frames_tx: mpsc::Sender<Bytes>,
    played_rx: watch::Receiver<u32>,
    dtmf: DtmfCollector,
}

impl CallHandler {
    pub(crate) fn new(
        frames_tx: mpsc::Sender<Bytes>,
        played_rx: watch::Receiver<u32>,
        dtmf: DtmfCollector,
    ) -> Self {
        Self {
            frames_tx,
            played_rx,
            dtmf,
        }
    }

    pub fn dtmf(&self) -> &DtmfCollector {
        &self.dtmf
    }

    /// Queue audio for playback.
    ///
    /// A trailing partial frame is padded by repeating its last sample.
    /// Blocks while the input queue is full, which paces the producer to
    /// roughly real time.
    pub async fn play(&self, audio: impl Into<Bytes>) -> Result<(), CallError> {
        let audio: Bytes = audio.into();

        for chunk in audio.chunks(FRAME_SIZE) {
            let frame = if chunk.len() == FRAME_SIZE {
                audio.slice_ref(chunk)
            } else {
                let mut padded = chunk.to_vec();
                padded.resize(FRAME_SIZE, chunk.last().copied().unwrap_or(0xFF));
                Bytes::from(padded)
            };

            self.frames_tx
                .send(frame)
                .await
                .map_err(|_| CallError::AudioStream)?;
        }

        Ok(())
    }

    /// Queue the end-of-audio sentinel. Once the media engine reaches it,
    /// [`CallHandler::wait_played`] wakes up.
    pub async fn done(&self) -> Result<(), CallError> {
        self.frames_tx
            .send(Bytes::new())
            .await
            .map_err(|_| CallError::AudioStream)
    }

    /// Wait until all audio queued before the last [`CallHandler::done`]
    /// call has been sent.
    pub async fn wait_played(&self) -> Result<(), CallError> {
        let mut rx = self.played_rx.clone();
        let seen = *rx.borrow();

        rx.wait_for(|generation| *generation > seen)
            .await
            .map(|_| ())
            .map_err(|_| CallError::AudioStream)
    }

    /// Convenience: queue audio, mark it finished and wait for playback
    pub async fn play_and_wait(&self, audio: impl Into<Bytes>) -> Result<(), CallError> {
        self.play(audio).await?;
        self.done().await?;
        self.wait_played().await
    }
}
