//! Actionable hints for known Graph error codes
//!
//! Subcodes are more specific than codes, so they are looked up first.

use crate::error::RemoteApiError;

const SUBCODE_HINTS: &[(i64, &str)] = &[
    (
        2207052,
        "The platform could not download the image. Make sure the URL is public and not behind authentication or a redirect",
    ),
    (
        2207003,
        "The platform timed out fetching the image. Check that the image host is reachable and responds quickly",
    ),
    (2207005, "Only JPEG images are accepted. Convert the image to JPEG"),
    (2207004, "The image exceeds the 8 MB size limit. Resize or recompress it"),
    (
        2207009,
        "The aspect ratio is not supported. Use a ratio between 4:5 and 1.91:1",
    ),
    (2207010, "The caption is too long. Shorten the caption or use fewer hashtags"),
    (
        2207042,
        "The daily publishing limit was reached. Try again in 24 hours",
    ),
    (
        2207020,
        "The media container expired before publishing. Create the post again",
    ),
    (
        2207027,
        "The media is not ready yet. Wait a little longer before publishing",
    ),
];

const CODE_HINTS: &[(i64, &str)] = &[
    (
        190,
        "The access token is invalid or expired. Generate a new long-lived token",
    ),
    (
        10,
        "The token lacks a required permission. Grant the content-publish scope and reconnect",
    ),
    (
        200,
        "The token lacks a required permission. Grant the content-publish scope and reconnect",
    ),
    (4, "Rate limited by the platform. Wait a few minutes and try again"),
    (17, "Rate limited by the platform. Wait a few minutes and try again"),
    (32, "Rate limited by the platform. Wait a few minutes and try again"),
    (613, "Rate limited by the platform. Wait a few minutes and try again"),
];

/// Hint for a code/subcode pair, subcode first
pub fn lookup(code: Option<i64>, subcode: Option<i64>) -> Option<&'static str> {
    let find = |table: &[(i64, &'static str)], key: Option<i64>| {
        key.and_then(|k| table.iter().find(|(c, _)| *c == k).map(|(_, h)| *h))
    };

    find(SUBCODE_HINTS, subcode).or_else(|| find(CODE_HINTS, code))
}

/// Attach a hint, unless one is already there. Unknown codes fall back to
/// the platform's own `error_user_msg`.
pub fn enrich(mut error: RemoteApiError) -> RemoteApiError {
    if error.hint.is_none() {
        error.hint = lookup(error.code, error.subcode)
            .map(str::to_string)
            .or_else(|| error.user_message.clone());
    }
    error
}

/// Publish calls fail with a terse "media id is not available" while the
/// platform is still digesting the container; say what that means.
pub fn rewrite_publish_error(mut error: RemoteApiError) -> RemoteApiError {
    if error.hint.is_none() {
        error.hint = lookup(error.code, error.subcode).map(str::to_string);
    }
    if error.message.to_lowercase().contains("media id is not available") {
        error.message = format!(
            "The media is still processing or was rejected ({})",
            error.message
        );
        if error.hint.is_none() {
            error.hint = Some(
                "Wait and publish again, and check the image is a JPEG within the size and aspect limits"
                    .to_string(),
            );
        }
    }
    enrich(error)
}
