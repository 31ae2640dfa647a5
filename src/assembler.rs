//! The segment assembler: drives the box scanner through
//! `ftyp -> moov -> (moof -> mdat)+`, reassembling boxes that straddle
//! chunk boundaries and recovering from a single moof-miss mid-stream via
//! the hunt heuristic.
//!
//! This module knows nothing about MIME strings, rings, playlists, or wall
//! clocks — it only ever hands the caller two things: the once-per-session
//! init blob, and a stream of complete `moof‖mdat` segments. Everything
//! downstream of that lives in [`crate::publisher`].

use bytes::{Bytes, BytesMut};

use crate::error::ParseError;
use crate::scanner::{scan_box, ScanOutcome};

const FTYP: &[u8; 4] = b"ftyp";
const MOOV: &[u8; 4] = b"moov";
const MOOF: &[u8; 4] = b"moof";
const MDAT: &[u8; 4] = b"mdat";

/// Bytes a completed box produces for its caller, while the assembler keeps
/// driving itself forward with whatever remains in `pending`.
#[derive(Debug)]
pub enum AssemblerOutput {
    /// The init blob (`ftyp` ‖ `moov`), emitted exactly once per session.
    Initialized(Bytes),
    /// One complete media segment (`moof` ‖ `mdat`).
    Segment(Bytes),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Ftyp,
    Moov,
    Moof,
    Mdat,
    /// Mid-stream recovery after a moof mismatch; see `drive`'s Hunt arm.
    Hunt,
}

pub struct Assembler {
    state: State,
    /// Everything received but not yet consumed into a completed box.
    pending: BytesMut,
    ftyp: Option<Bytes>,
    moof: Option<Bytes>,
    /// Segments published so far this session; gates whether a moof
    /// mismatch is fatal (`MissingMoof`, cold start) or recoverable (hunt).
    published: u64,
    poisoned: Option<ParseError>,
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Assembler {
    pub fn new() -> Self {
        Self {
            state: State::Ftyp,
            pending: BytesMut::new(),
            ftyp: None,
            moof: None,
            published: 0,
            poisoned: None,
        }
    }

    pub fn flush(&mut self) {
        self.state = State::Ftyp;
        self.pending = BytesMut::new();
        self.ftyp = None;
        self.moof = None;
        self.published = 0;
        self.poisoned = None;
    }

    /// Feed one chunk of arbitrary size. Returns every `Initialized`/`Segment`
    /// output produced while consuming it, in emission order.
    pub fn write(&mut self, chunk: &[u8]) -> Result<Vec<AssemblerOutput>, ParseError> {
        if let Some(err) = &self.poisoned {
            return Err(ParseError::Poisoned(Box::new(err.clone())));
        }
        if chunk.is_empty() {
            return Ok(Vec::new());
        }

        self.pending.extend_from_slice(chunk);

        let mut out = Vec::new();
        let result = self.drive(&mut out);
        if let Err(err) = &result {
            self.poisoned = Some(err.clone());
        }
        result.map(|()| out)
    }

    fn drive(&mut self, out: &mut Vec<AssemblerOutput>) -> Result<(), ParseError> {
        loop {
            match self.state {
                State::Ftyp => match scan_box(&self.pending, FTYP) {
                    ScanOutcome::Complete { len } => {
                        self.ftyp = Some(self.pending.split_to(len).freeze());
                        self.state = State::Moov;
                    }
                    ScanOutcome::NeedHeader => return Ok(()),
                    ScanOutcome::NeedBody { .. } => return Err(ParseError::OversizedHeader),
                    ScanOutcome::Mismatch => return Err(ParseError::MissingFtyp),
                },

                State::Moov => match scan_box(&self.pending, MOOV) {
                    ScanOutcome::Complete { len } => {
                        let moov = self.pending.split_to(len).freeze();
                        let ftyp = self.ftyp.clone().expect("ftyp set before entering Moov");

                        let mut init = BytesMut::with_capacity(ftyp.len() + moov.len());
                        init.extend_from_slice(&ftyp);
                        init.extend_from_slice(&moov);

                        out.push(AssemblerOutput::Initialized(init.freeze()));
                        self.state = State::Moof;
                    }
                    // moov tolerates chunk-crossing bodies (spec §4.2); wait for more.
                    ScanOutcome::NeedHeader | ScanOutcome::NeedBody { .. } => return Ok(()),
                    ScanOutcome::Mismatch => return Err(ParseError::MissingMoov),
                },

                State::Moof => match scan_box(&self.pending, MOOF) {
                    ScanOutcome::Complete { len } => {
                        self.moof = Some(self.pending.split_to(len).freeze());
                        self.state = State::Mdat;
                    }
                    ScanOutcome::NeedHeader => return Ok(()),
                    ScanOutcome::NeedBody { .. } => return Err(ParseError::OversizedHeader),
                    ScanOutcome::Mismatch => {
                        if self.published > 0 {
                            tracing::warn!("moof mismatch mid-stream, entering hunt");
                            self.state = State::Hunt;
                        } else {
                            return Err(ParseError::MissingMoof);
                        }
                    }
                },

                State::Mdat => match scan_box(&self.pending, MDAT) {
                    ScanOutcome::Complete { len } => {
                        let mdat = self.pending.split_to(len).freeze();
                        let moof = self.moof.take().expect("moof set before entering Mdat");

                        let mut segment = BytesMut::with_capacity(moof.len() + mdat.len());
                        segment.extend_from_slice(&moof);
                        segment.extend_from_slice(&mdat);

                        self.published += 1;
                        out.push(AssemblerOutput::Segment(segment.freeze()));
                        self.state = State::Moof;
                    }
                    // mdat tolerates chunk-crossing bodies (spec §4.2); wait for more.
                    ScanOutcome::NeedHeader | ScanOutcome::NeedBody { .. } => return Ok(()),
                    ScanOutcome::Mismatch => return Err(ParseError::MissingMdat),
                },

                State::Hunt => {
                    match crate::scanner::find_subslice(&self.pending, MOOF) {
                        Some(idx) if idx >= 4 => {
                            let _ = self.pending.split_to(idx - 4);
                            self.state = State::Moof;
                        }
                        Some(_) => {
                            // 'moof' found too close to the start of what we've
                            // kept to safely back up over its length prefix; wait.
                            return Ok(());
                        }
                        None => {
                            // Discard confirmed garbage, but keep enough of the
                            // tail that a real box straddling the next chunk
                            // boundary can still be recognized: up to 3 bytes of
                            // a partial 'moof' tag, plus the 4 bytes that would
                            // be its length prefix, so a later match never lands
                            // with idx < 4 just because we threw its prefix away.
                            let keep = self.pending.len().min(7);
                            let drop = self.pending.len() - keep;
                            let _ = self.pending.split_to(drop);
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}
