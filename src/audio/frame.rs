use std::time::Duration;

/// Mono audio frame (16-bit PCM)
///
/// `pts` is the presentation timestamp of the first sample, counted in
/// samples at `sample_rate`. Within one utterance timestamps are
/// monotonically non-decreasing.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, mono)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Presentation timestamp of the first sample, in samples
    pub pts: u64,
}

impl AudioFrame {
    /// Create a silent frame of the given duration.
    pub fn silence(duration: Duration, pts: u64, sample_rate: u32) -> Self {
        let sample_count = (duration.as_secs_f64() * sample_rate as f64) as usize;
        Self {
            samples: vec![0i16; sample_count],
            sample_rate,
            pts,
        }
    }

    /// Wall-clock playback duration of this frame.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }

    /// Samples as little-endian PCM bytes.
    pub fn pcm_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }
}

/// Slice a frame into fixed-duration sub-frames.
///
/// Sub-frame timestamps continue sample-accurately from the parent frame's
/// `pts`. The final sub-frame may be shorter than `chunk_ms`; empty frames
/// produce no sub-frames.
pub fn slice_frame(frame: &AudioFrame, chunk_ms: u64) -> Vec<AudioFrame> {
    let chunk_samples = (frame.sample_rate as u64 * chunk_ms / 1000).max(1) as usize;

    frame
        .samples
        .chunks(chunk_samples)
        .enumerate()
        .map(|(i, chunk)| AudioFrame {
            samples: chunk.to_vec(),
            sample_rate: frame.sample_rate,
            pts: frame.pts + (i * chunk_samples) as u64,
        })
        .collect()
}

/// Accumulates frames into fixed-size PCM byte chunks
///
/// Streaming backends consume audio as evenly sized byte chunks rather than
/// whatever frame sizes the producer happened to emit. Bytes buffer until a
/// full chunk is available; any tail shorter than one chunk stays buffered.
pub struct ChunkAssembler {
    chunk_bytes: usize,
    buffer: Vec<u8>,
}

impl ChunkAssembler {
    /// `chunk_ms` worth of 16-bit mono PCM at `sample_rate` per chunk.
    pub fn new(sample_rate: u32, chunk_ms: u64) -> Self {
        Self {
            chunk_bytes: (2 * sample_rate as u64 * chunk_ms / 1000).max(2) as usize,
            buffer: Vec::new(),
        }
    }

    /// Append a frame and return every complete chunk now available.
    pub fn push(&mut self, frame: &AudioFrame) -> Vec<Vec<u8>> {
        self.buffer.extend(frame.pcm_bytes());

        let mut chunks = Vec::new();
        while self.buffer.len() >= self.chunk_bytes {
            let rest = self.buffer.split_off(self.chunk_bytes);
            chunks.push(std::mem::replace(&mut self.buffer, rest));
        }
        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(samples: Vec<i16>, pts: u64) -> AudioFrame {
        AudioFrame {
            samples,
            sample_rate: 48000,
            pts,
        }
    }

    #[test]
    fn test_slice_exact_multiple() {
        // 40ms at 48kHz = 1920 samples = two 20ms sub-frames
        let f = frame(vec![1i16; 1920], 100);
        let subs = slice_frame(&f, 20);

        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].samples.len(), 960);
        assert_eq!(subs[0].pts, 100);
        assert_eq!(subs[1].samples.len(), 960);
        assert_eq!(subs[1].pts, 1060);
    }

    #[test]
    fn test_slice_partial_tail() {
        let f = frame(vec![1i16; 1000], 0);
        let subs = slice_frame(&f, 20);

        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].samples.len(), 960);
        assert_eq!(subs[1].samples.len(), 40);
        assert_eq!(subs[1].pts, 960);
    }

    #[test]
    fn test_slice_empty_frame() {
        let f = frame(vec![], 0);
        assert!(slice_frame(&f, 20).is_empty());
    }

    #[test]
    fn test_silence_duration() {
        let s = AudioFrame::silence(Duration::from_millis(400), 500, 48000);
        assert_eq!(s.samples.len(), 19200);
        assert_eq!(s.pts, 500);
        assert!(s.samples.iter().all(|&x| x == 0));
        assert_eq!(s.duration(), Duration::from_millis(400));
    }

    #[test]
    fn test_frame_duration() {
        let f = frame(vec![0i16; 960], 0);
        assert_eq!(f.duration(), Duration::from_millis(20));
    }

    #[test]
    fn test_pcm_bytes_little_endian() {
        let f = frame(vec![0x0102, -1], 0);
        assert_eq!(f.pcm_bytes(), vec![0x02, 0x01, 0xFF, 0xFF]);
    }

    #[test]
    fn test_chunk_assembler_buffers_until_full() {
        // 100ms at 48kHz mono = 9600 bytes per chunk
        let mut assembler = ChunkAssembler::new(48000, 100);

        let chunks = assembler.push(&frame(vec![1i16; 2400], 0));
        assert!(chunks.is_empty());

        let chunks = assembler.push(&frame(vec![1i16; 2400], 2400));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 9600);
    }

    #[test]
    fn test_chunk_assembler_multiple_chunks() {
        let mut assembler = ChunkAssembler::new(48000, 100);

        let chunks = assembler.push(&frame(vec![1i16; 10000], 0));
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.len() == 9600));
        // 10000 samples = 20000 bytes; 800 bytes remain buffered
        let chunks = assembler.push(&frame(vec![1i16; 4400], 10000));
        assert_eq!(chunks.len(), 1);
    }
}
