//! Segment publication: wall-clock duration measurement, the HLS ring and
//! replay buffer ring, on-demand M3U8 regeneration, and bookkeeping for the
//! façade's read-only accessors.
//!
//! None of this module parses bytes; it only reacts to segments the
//! [`crate::assembler`] hands back, in the order they arrive.

use std::time::{Instant, SystemTime};

use bytes::Bytes;

use crate::playlist::{self, PlaylistEntry};
use crate::ring::Ring;

/// One segment held in the HLS ring: its own bytes plus the metadata the
/// playlist and `getHlsSegment`-style lookups need.
#[derive(Debug, Clone)]
pub struct HlsEntry {
    pub sequence: u64,
    pub bytes: Bytes,
    pub duration: f64,
}

/// Clamp an optionally user-supplied ring size into `[2, 10]`, per the
/// specification's Configuration section.
fn clamp_ring_size(requested: u8) -> usize {
    requested.clamp(2, 10) as usize
}

pub struct Publisher {
    hls_base: Option<String>,
    hls_ring: Option<Ring<HlsEntry>>,
    buffer: Option<Ring<Bytes>>,

    next_sequence: u64,
    last_publish: Option<Instant>,

    latest_segment: Option<Bytes>,
    latest_duration: f64,
    latest_sequence: u64,
    latest_timestamp: Option<SystemTime>,

    playlist: Option<String>,
}

impl Publisher {
    pub fn new(hls_base: Option<String>, hls_list_size: Option<u8>, buffer_list_size: Option<u8>) -> Self {
        let hls_ring = hls_base.as_ref().map(|_| {
            let size = hls_list_size.map(clamp_ring_size).unwrap_or(4);
            Ring::new(size)
        });
        let buffer = buffer_list_size.map(|size| Ring::new(clamp_ring_size(size)));
        let playlist = hls_base.as_ref().map(|base| playlist::render_initial(base));

        Self {
            hls_base,
            hls_ring,
            buffer,
            next_sequence: 0,
            last_publish: None,
            latest_segment: None,
            latest_duration: 0.0,
            latest_sequence: 0,
            latest_timestamp: None,
            playlist,
        }
    }

    pub fn flush(&mut self) {
        if let Some(ring) = &mut self.hls_ring {
            *ring = Ring::new(ring.cap());
        }
        if let Some(buffer) = &mut self.buffer {
            *buffer = Ring::new(buffer.cap());
        }
        self.next_sequence = 0;
        self.last_publish = None;
        self.latest_segment = None;
        self.latest_duration = 0.0;
        self.latest_sequence = 0;
        self.latest_timestamp = None;
        self.playlist = self.hls_base.as_ref().map(|base| playlist::render_initial(base));
    }

    /// Start the wall clock the first segment's duration is measured
    /// against, at the moment the init blob finished parsing. Callers
    /// invoke this exactly once per session, right after the init blob is
    /// parsed and before any segment is published.
    pub fn mark_initialized(&mut self) {
        self.last_publish = Some(Instant::now());
    }

    /// Record one completed segment. Measures duration against the previous
    /// call, or against [`Publisher::mark_initialized`] for the first
    /// segment of a session (wall clock, not media timestamps — see the
    /// specification's timing note), assigns it the next sequence number,
    /// pushes it into whichever rings are configured, and regenerates the
    /// playlist text.
    ///
    /// Returns the sequence number assigned to this segment.
    pub fn publish(&mut self, bytes: Bytes) -> u64 {
        let now = Instant::now();
        let duration = match self.last_publish.replace(now) {
            Some(prev) => now.duration_since(prev).as_secs_f64(),
            // mark_initialized was never called (e.g. a segment published
            // without a preceding init blob in a synthetic test); nothing to
            // diff against.
            None => 0.0,
        };

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        self.latest_segment = Some(bytes.clone());
        self.latest_duration = duration;
        self.latest_sequence = sequence;
        self.latest_timestamp = Some(SystemTime::now());

        if let Some(buffer) = &mut self.buffer {
            buffer.push(bytes.clone());
        }

        if let Some(ring) = &mut self.hls_ring {
            ring.push(HlsEntry { sequence, bytes, duration });
            let entries: Vec<PlaylistEntry> = ring
                .iter()
                .map(|e| PlaylistEntry { sequence: e.sequence, duration: e.duration })
                .collect();
            let base = self.hls_base.as_deref().expect("hls_ring implies hls_base");
            self.playlist = Some(playlist::render(base, &entries));
        }

        sequence
    }

    pub fn latest_segment(&self) -> Option<&Bytes> {
        self.latest_segment.as_ref()
    }

    pub fn latest_duration(&self) -> f64 {
        self.latest_duration
    }

    pub fn latest_sequence(&self) -> u64 {
        self.latest_sequence
    }

    pub fn latest_timestamp(&self) -> Option<SystemTime> {
        self.latest_timestamp
    }

    pub fn m3u8(&self) -> Option<&str> {
        self.playlist.as_deref()
    }

    pub fn hls_segment(&self, sequence: u64) -> Option<Bytes> {
        self.hls_ring
            .as_ref()
            .and_then(|ring| ring.find(|e| e.sequence == sequence))
            .map(|e| e.bytes.clone())
    }

    pub fn buffer_list(&self) -> Vec<Bytes> {
        self.buffer
            .as_ref()
            .map(|b| b.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn buffer_concat(&self) -> Option<Bytes> {
        let buffer = self.buffer.as_ref()?;
        if buffer.is_empty() {
            return None;
        }
        let mut out = Vec::new();
        for chunk in buffer.iter() {
            out.extend_from_slice(chunk);
        }
        Some(Bytes::from(out))
    }
}
