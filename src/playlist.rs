//! HLS fMP4 (M3U8) playlist text generation.
//!
//! Rendering is pure: given the HLS base name and the entries currently held
//! in the HLS ring, produce the exact LF-terminated text described in the
//! specification's External Interfaces section. No state is kept here; the
//! publisher regenerates the whole text on every published segment.

/// One line item in the playlist: the sequence number and measured duration
/// of a segment currently held in the HLS ring.
#[derive(Debug, Clone, Copy)]
pub struct PlaylistEntry {
    pub sequence: u64,
    pub duration: f64,
}

/// Render the playlist before any segment has been published — the init-only form.
pub fn render_initial(hls_base: &str) -> String {
    format!(
        "#EXTM3U\n\
         #EXT-X-VERSION:7\n\
         #EXT-X-ALLOW-CACHE:NO\n\
         #EXT-X-TARGETDURATION:0\n\
         #EXT-X-MEDIA-SEQUENCE:0\n\
         #EXT-X-MAP:URI=\"init-{hls_base}.mp4\"\n"
    )
}

/// Render the playlist after at least one segment has been published.
///
/// `entries` must be in ascending sequence order, exactly the contents of
/// the HLS ring (invariant 5 of the specification's Data Model section).
pub fn render(hls_base: &str, entries: &[PlaylistEntry]) -> String {
    let target_duration = entries.last().map(|e| e.duration.round() as i64).unwrap_or(0);
    let media_sequence = entries.first().map(|e| e.sequence).unwrap_or(0);

    let mut out = format!(
        "#EXTM3U\n\
         #EXT-X-VERSION:7\n\
         #EXT-X-ALLOW-CACHE:NO\n\
         #EXT-X-TARGETDURATION:{target_duration}\n\
         #EXT-X-MEDIA-SEQUENCE:{media_sequence}\n\
         #EXT-X-MAP:URI=\"init-{hls_base}.mp4\"\n"
    );

    for entry in entries {
        out.push_str(&format!(
            "#EXTINF:{:.6},\n{hls_base}{}.m4s\n",
            entry.duration, entry.sequence
        ));
    }

    out
}
