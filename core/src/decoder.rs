//! Interprets one callback payload as exactly one [`StreamItem`].
//!
//! The tag is checked once, here. Downstream code only ever matches on the
//! typed variant.

use portstream_common::error::{DecodeError, check_status};
use portstream_common::wire::decode_report;
use portstream_common::StreamItem;

use crate::engine::RawStreamItem;

/// Decodes a raw callback payload.
///
/// * `complete` set: [`StreamItem::Finished`], and it must carry no payload.
/// * status `0`: a report buffer that must decode cleanly.
/// * any other status: [`StreamItem::Error`], unknown codes becoming
///   [`ScanError::UnknownError`].
///
/// An `Err` is a broken engine, not a failed scan.
pub fn decode(raw: &RawStreamItem) -> Result<StreamItem, DecodeError> {
    if raw.complete {
        if raw.payload.is_some() {
            return Err(DecodeError::UnexpectedPayload);
        }
        return Ok(StreamItem::Finished);
    }

    match check_status(raw.status_code) {
        Ok(()) => {
            let buffer = raw.payload.as_deref().ok_or(DecodeError::MissingPayload)?;
            decode_report(buffer).map(StreamItem::Report)
        }
        Err(e) => Ok(StreamItem::Error(e)),
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
