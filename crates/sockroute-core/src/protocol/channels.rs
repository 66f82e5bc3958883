//! Channel-name argument normalization.

use crate::error::{ErrorCode, IpcError, Result};

/// Validate a list of channel names and drop duplicates, keeping first occurrence order.
///
/// The list must be non-empty and every name non-empty.
pub fn normalize_channels<I, S>(channels: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut out: Vec<String> = Vec::new();
    for ch in channels {
        let ch = ch.into();
        if ch.is_empty() {
            return Err(IpcError::usage(
                ErrorCode::InvalidChannels,
                "channel names must be non-empty strings",
            ));
        }
        if !out.contains(&ch) {
            out.push(ch);
        }
    }
    if out.is_empty() {
        return Err(IpcError::usage(
            ErrorCode::InvalidChannels,
            "at least one channel is required",
        ));
    }
    Ok(out)
}
