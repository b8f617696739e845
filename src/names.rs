//! Player display-name rules
//!
//! A name typed by the player must survive [`accept_name`]. A name handed
//! in by the host (already stored elsewhere) only goes through
//! [`external_name`], which tidies it without rejecting it.

use rustrict::CensorStr;
use serde::Serialize;
use thiserror::Error;

use crate::constants::name::{MAX_LENGTH, MIN_LENGTH};

/// Reasons a player-entered name is rejected
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The name is empty or contains only whitespace
    #[error("name cannot be empty")]
    Empty,
    /// The name is shorter than the minimum length
    #[error("name is too short")]
    TooShort,
    /// The name exceeds the maximum allowed length
    #[error("name is too long")]
    TooLong,
    /// The name contains inappropriate content
    #[error("name is inappropriate")]
    Sinful,
}

/// Validates a player-entered name
///
/// Whitespace is trimmed and collapsed before the checks; lengths are
/// counted in characters.
///
/// # Errors
///
/// * `Error::Empty` - Name is empty after trimming whitespace
/// * `Error::TooShort` - Name has fewer than 2 characters
/// * `Error::TooLong` - Name has more than 18 characters
/// * `Error::Sinful` - Name contains inappropriate content
pub fn accept_name(name: &str) -> Result<String, Error> {
    let name = rustrict::trim_whitespace(name);
    let length = name.chars().count();
    if length == 0 {
        return Err(Error::Empty);
    }
    if length < MIN_LENGTH {
        return Err(Error::TooShort);
    }
    if length > MAX_LENGTH {
        return Err(Error::TooLong);
    }
    if name.is_inappropriate() {
        return Err(Error::Sinful);
    }
    Ok(name.to_owned())
}

/// Tidies a name supplied by the host
///
/// The name is trimmed and cut to the maximum length; `None` when nothing
/// is left.
pub fn external_name(name: &str) -> Option<String> {
    let name: String = name.trim().chars().take(MAX_LENGTH).collect();
    let name = name.trim_end();
    (!name.is_empty()).then(|| name.to_owned())
}
