//! Extracts codec metadata from an init blob (`ftyp` concatenated with `moov`).
//!
//! The AVC configuration bytes are located by a plain textual search for the
//! ASCII tag `avcC` rather than by descending into `moov`'s box tree. This
//! matches the canonical encoder's layout (see the specification's Design
//! Notes) and is preserved intentionally — a recursive box walker is a
//! permitted internal refinement only if its output is provably identical,
//! and the textual search is simpler and already exactly matches ffmpeg's
//! fragmented output, so there is nothing to gain by decoding the tree.

use crate::error::ParseError;
use crate::scanner::find_subslice;

const AVCC_TAG: &[u8; 4] = b"avcC";
const MP4A_TAG: &[u8; 4] = b"mp4a";

/// Skip past the `avcC` tag itself (4 bytes) plus the one-byte
/// `configurationVersion` field that always precedes
/// `AVCProfileIndication · profile_compatibility · AVCLevelIndication`.
const AVCC_PREFIX_SKIP: usize = 5;

/// Build the `video/mp4; codecs="..."` MIME string for an init blob.
///
/// Fails with [`ParseError::MissingCodec`] if no `avcC` marker is present.
pub fn mime_for_init(init: &[u8]) -> Result<String, ParseError> {
    let avcc_idx = find_subslice(init, AVCC_TAG).ok_or(ParseError::MissingCodec)?;
    let avc_bytes_start = avcc_idx + AVCC_PREFIX_SKIP;

    let avc_config = init
        .get(avc_bytes_start..avc_bytes_start + 3)
        .ok_or(ParseError::MissingCodec)?;

    let avc_hex = hex::encode_upper(avc_config);

    let audio_suffix = if find_subslice(init, MP4A_TAG).is_some() {
        ", mp4a.40.2"
    } else {
        ""
    };

    Ok(format!(r#"video/mp4; codecs="avc1.{avc_hex}{audio_suffix}""#))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_with(avcc_body: &[u8], include_mp4a: bool) -> Vec<u8> {
        let mut blob = b"....ftyp....moov....stsd....avc1....".to_vec();
        blob.extend_from_slice(b"avcC");
        blob.extend_from_slice(avcc_body);
        if include_mp4a {
            blob.extend_from_slice(b"....mp4a....esds....");
        }
        blob
    }

    #[test]
    fn extracts_video_only_mime() {
        // configurationVersion, then profile/compat/level = 0x4D 0x40 0x1F
        let init = init_with(&[0x01, 0x4D, 0x40, 0x1F, 0xFF], false);
        assert_eq!(mime_for_init(&init).unwrap(), r#"video/mp4; codecs="avc1.4D401F""#);
    }

    #[test]
    fn appends_aac_when_mp4a_present() {
        let init = init_with(&[0x01, 0x4D, 0x40, 0x1F, 0xFF], true);
        assert_eq!(
            mime_for_init(&init).unwrap(),
            r#"video/mp4; codecs="avc1.4D401F, mp4a.40.2""#
        );
    }

    #[test]
    fn missing_avcc_is_an_error() {
        let init = b"....ftyp....moov....no codec here....".to_vec();
        assert_eq!(mime_for_init(&init), Err(ParseError::MissingCodec));
    }

    #[test]
    fn truncated_avc_config_is_an_error() {
        let mut blob = b"....".to_vec();
        blob.extend_from_slice(b"avcC");
        blob.extend_from_slice(&[0x01, 0x4D]); // only 2 bytes follow, need 3
        assert_eq!(mime_for_init(&blob), Err(ParseError::MissingCodec));
    }
}
