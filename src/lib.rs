//! Incremental parser and HLS segmenter for fragmented MP4 streams.
//!
//! Feed arbitrarily-chunked bytes from a live `ftyp · moov · (moof · mdat)+`
//! stream (as produced by an encoder run with `-movflags
//! frag_keyframe+empty_moov`) to [`Parser::write`] and get back the init
//! segment once and a new media segment each time one completes. An
//! optional HLS mode keeps a bounded playlist and per-segment ring alive
//! alongside the raw segment stream; an optional replay buffer keeps the
//! last few segments concatenated for late subscribers.

pub mod assembler;
pub mod error;
pub mod events;
pub mod init;
pub mod playlist;
pub mod publisher;
pub mod ring;
pub mod scanner;

use std::time::SystemTime;

use bytes::Bytes;

use assembler::{Assembler, AssemblerOutput};
use error::ParseError;
use events::{Event, Subscribers};
use publisher::Publisher;

/// Construction-time options. All fields are optional; the zero-value
/// config parses the stream and exposes segments but skips HLS and replay
/// buffering entirely.
#[derive(Debug, Clone, Default)]
pub struct ParserConfig {
    /// Base name used for both the playlist's `init-<base>.mp4` URI and
    /// each segment's `<base><sequence>.m4s` URI. `None` disables HLS
    /// playlist/ring tracking altogether.
    pub hls_base: Option<String>,
    /// Number of segments the HLS ring retains. Clamped to `[2, 10]`;
    /// defaults to 4 when `hls_base` is set and this is left unset.
    pub hls_list_size: Option<u8>,
    /// Number of segments the replay buffer ring retains. Clamped to
    /// `[2, 10]`. Leaving this unset disables the replay buffer.
    pub buffer_list_size: Option<u8>,
}

/// The incremental parser and segmenter. One instance corresponds to one
/// logical stream; construct a fresh one (or call [`Parser::flush`]) to
/// start over after the encoder restarts.
pub struct Parser {
    assembler: Assembler,
    publisher: Publisher,
    subscribers: Subscribers,

    mime: Option<String>,
    initialization: Option<Bytes>,
}

impl Parser {
    pub fn new(config: ParserConfig) -> Self {
        Self {
            assembler: Assembler::new(),
            publisher: Publisher::new(config.hls_base, config.hls_list_size, config.buffer_list_size),
            subscribers: Subscribers::default(),
            mime: None,
            initialization: None,
        }
    }

    /// Feed the next chunk of the stream. Chunk boundaries need not align
    /// to box boundaries; the parser buffers whatever is incomplete.
    ///
    /// On success, fires `initialized` at most once and `segment` once per
    /// completed segment, in order. On failure, fires `error` once and
    /// poisons the parser: every subsequent call returns
    /// [`ParseError::Poisoned`] until [`Parser::flush`] is called.
    pub fn write(&mut self, chunk: &[u8]) -> Result<(), ParseError> {
        let outputs = match self.assembler.write(chunk) {
            Ok(outputs) => outputs,
            Err(err) => {
                tracing::error!(error = %err, "fmp4 stream parse failed");
                self.subscribers.fire_error(&err);
                return Err(err);
            }
        };

        for output in outputs {
            match output {
                AssemblerOutput::Initialized(init) => {
                    let mime = init::mime_for_init(&init).map_err(|err| {
                        self.subscribers.fire_error(&err);
                        err
                    })?;
                    tracing::info!(%mime, "fmp4 stream initialized");
                    self.mime = Some(mime);
                    self.initialization = Some(init);
                    self.publisher.mark_initialized();
                    self.subscribers.fire_initialized();
                }
                AssemblerOutput::Segment(segment) => {
                    if self.subscribers.has_segment_listeners() {
                        self.subscribers.fire_segment(&segment);
                    }
                    self.publisher.publish(segment);
                }
            }
        }

        Ok(())
    }

    /// Reset to the construction-time state: partial box buffers, the init
    /// blob, both rings, the playlist, and the sequence counter are all
    /// discarded. Registered event listeners are kept across a flush.
    pub fn flush(&mut self) {
        self.assembler.flush();
        self.publisher.flush();
        self.mime = None;
        self.initialization = None;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialization.is_some()
    }

    pub fn has_published(&self) -> bool {
        self.publisher.latest_segment().is_some()
    }

    pub fn mime(&self) -> Option<&str> {
        self.mime.as_deref()
    }

    pub fn initialization(&self) -> Option<&Bytes> {
        self.initialization.as_ref()
    }

    pub fn segment(&self) -> Option<&Bytes> {
        self.publisher.latest_segment()
    }

    pub fn timestamp(&self) -> Option<SystemTime> {
        self.publisher.latest_timestamp()
    }

    pub fn duration(&self) -> f64 {
        self.publisher.latest_duration()
    }

    pub fn sequence(&self) -> u64 {
        self.publisher.latest_sequence()
    }

    pub fn m3u8(&self) -> Option<&str> {
        self.publisher.m3u8()
    }

    pub fn get_hls_segment(&self, sequence: u64) -> Option<Bytes> {
        self.publisher.hls_segment(sequence)
    }

    pub fn buffer_list(&self) -> Vec<Bytes> {
        self.publisher.buffer_list()
    }

    /// Concatenate the replay buffer's segments, each still `moof‖mdat`
    /// framed, in ring order.
    pub fn buffer_list_concat(&self) -> Option<Bytes> {
        self.publisher.buffer_concat()
    }

    /// Concatenate the init blob followed by the replay buffer, producing
    /// bytes a fresh player could start decoding from directly.
    pub fn buffer_concat(&self) -> Option<Bytes> {
        let init = self.initialization.clone()?;
        let segments = self.publisher.buffer_concat();

        let mut out = Vec::with_capacity(init.len() + segments.as_ref().map_or(0, |b| b.len()));
        out.extend_from_slice(&init);
        if let Some(segments) = segments {
            out.extend_from_slice(&segments);
        }
        Some(Bytes::from(out))
    }

    pub fn on_initialized<F: FnMut(&()) + Send + 'static>(&mut self, f: F) {
        self.subscribers.on_initialized(f);
    }

    pub fn on_segment<F: FnMut(&Bytes) + Send + 'static>(&mut self, f: F) {
        self.subscribers.on_segment(f);
    }

    pub fn on_error<F: FnMut(&ParseError) + Send + 'static>(&mut self, f: F) {
        self.subscribers.on_error(f);
    }

    /// Single entry point mirroring the three-event model, for callers that
    /// want one dispatch site instead of three typed registration calls.
    pub fn subscribe<F: FnMut(&Event) + Send + 'static>(&mut self, f: F) {
        use std::sync::{Arc, Mutex};
        let f = Arc::new(Mutex::new(f));

        let f1 = f.clone();
        self.subscribers.on_initialized(move |_| (f1.lock().unwrap())(&Event::Initialized));

        let f2 = f.clone();
        self.subscribers
            .on_segment(move |bytes| (f2.lock().unwrap())(&Event::Segment(bytes.clone())));

        self.subscribers
            .on_error(move |err| (f.lock().unwrap())(&Event::Error(err.clone())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_box(ty: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let len = (8 + body.len()) as u32;
        let mut out = len.to_be_bytes().to_vec();
        out.extend_from_slice(ty);
        out.extend_from_slice(body);
        out
    }

    fn moov_with_avcc() -> Vec<u8> {
        let mut body = b"....stsd....avc1....".to_vec();
        body.extend_from_slice(b"avcC");
        body.extend_from_slice(&[0x01, 0x64, 0x00, 0x28, 0xFF]);
        make_box(b"moov", &body)
    }

    #[test]
    fn full_session_exposes_mime_and_segments() {
        let mut parser = Parser::new(ParserConfig::default());

        parser.write(&make_box(b"ftyp", b"isomiso2avc1mp41")).unwrap();
        assert!(!parser.is_initialized());

        parser.write(&moov_with_avcc()).unwrap();
        assert!(parser.is_initialized());
        assert_eq!(parser.mime(), Some(r#"video/mp4; codecs="avc1.640028""#));

        parser.write(&make_box(b"moof", b"frame0")).unwrap();
        parser.write(&make_box(b"mdat", &[0x01; 8])).unwrap();

        assert!(parser.has_published());
        assert_eq!(parser.sequence(), 0);
    }

    #[test]
    fn hls_mode_builds_a_playlist() {
        let mut parser = Parser::new(ParserConfig {
            hls_base: Some("cam".into()),
            hls_list_size: Some(2),
            buffer_list_size: None,
        });

        parser.write(&make_box(b"ftyp", b"isom")).unwrap();
        parser.write(&moov_with_avcc()).unwrap();
        assert!(parser.m3u8().unwrap().contains("TARGETDURATION:0"));

        for i in 0..3 {
            parser.write(&make_box(b"moof", format!("f{i}").as_bytes())).unwrap();
            parser.write(&make_box(b"mdat", &[0x02; 4])).unwrap();
        }

        let playlist = parser.m3u8().unwrap();
        assert!(playlist.contains("MEDIA-SEQUENCE:1"));
        assert!(parser.get_hls_segment(0).is_none());
        assert!(parser.get_hls_segment(2).is_some());
    }

    #[test]
    fn buffer_concat_prefixes_init_blob() {
        let mut parser = Parser::new(ParserConfig {
            hls_base: None,
            hls_list_size: None,
            buffer_list_size: Some(2),
        });

        parser.write(&make_box(b"ftyp", b"isom")).unwrap();
        parser.write(&moov_with_avcc()).unwrap();
        parser.write(&make_box(b"moof", b"f0")).unwrap();
        parser.write(&make_box(b"mdat", &[0x03; 4])).unwrap();

        let concatenated = parser.buffer_concat().unwrap();
        assert!(concatenated.starts_with(&parser.initialization().unwrap()[..]));
    }

    #[test]
    fn listeners_fire_on_initialized_and_segment() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let mut parser = Parser::new(ParserConfig::default());
        let init_count = Arc::new(AtomicUsize::new(0));
        let segment_count = Arc::new(AtomicUsize::new(0));

        let init_count_clone = init_count.clone();
        parser.on_initialized(move |_| {
            init_count_clone.fetch_add(1, Ordering::SeqCst);
        });
        let segment_count_clone = segment_count.clone();
        parser.on_segment(move |_| {
            segment_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        parser.write(&make_box(b"ftyp", b"isom")).unwrap();
        parser.write(&moov_with_avcc()).unwrap();
        parser.write(&make_box(b"moof", b"f0")).unwrap();
        parser.write(&make_box(b"mdat", &[0x04; 4])).unwrap();

        assert_eq!(init_count.load(Ordering::SeqCst), 1);
        assert_eq!(segment_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn error_fires_error_listener_and_poisons() {
        let mut parser = Parser::new(ParserConfig::default());
        let mut errors = Vec::new();
        parser.on_error(|err| {
            // capturing into a local Vec across calls would require Arc<Mutex<_>>;
            // this listener only asserts it gets invoked with the right kind.
            assert_eq!(*err, ParseError::MissingFtyp);
        });
        let _ = &mut errors;

        let err = parser.write(&[0xFF; 16]).unwrap_err();
        assert_eq!(err, ParseError::MissingFtyp);

        let err = parser.write(b"anything").unwrap_err();
        assert_eq!(err, ParseError::Poisoned(Box::new(ParseError::MissingFtyp)));
    }

    #[test]
    fn flush_allows_a_fresh_session() {
        let mut parser = Parser::new(ParserConfig::default());
        parser.write(&make_box(b"ftyp", b"isom")).unwrap();
        parser.write(&moov_with_avcc()).unwrap();
        parser.write(&make_box(b"moof", b"f0")).unwrap();
        parser.write(&make_box(b"mdat", &[0x05; 4])).unwrap();

        parser.flush();
        assert!(!parser.is_initialized());
        assert!(!parser.has_published());

        parser.write(&make_box(b"ftyp", b"isom")).unwrap();
        parser.write(&moov_with_avcc()).unwrap();
        assert!(parser.is_initialized());
    }
}
