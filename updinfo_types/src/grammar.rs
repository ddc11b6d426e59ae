use tracing::trace;
use url::Url;

use crate::{
    ParseError, SEPARATOR, SegmentError, TransportMechanism, UpdateInformation, ValidationError,
    ZSYNC_SUFFIX,
};

// Relative references (bare filename patterns) are resolved against this.
const RELATIVE_BASE: &str = "file:///";

/// Checks `raw` against the update information grammar without building a record.
///
/// A `zsync` entry must point at an absolute url; the other mechanisms accept a
/// bare filename pattern as their last field.
pub fn validate(raw: &str) -> Result<(), ValidationError> {
    check(raw).map(|_| ())
}

fn check(raw: &str) -> Result<TransportMechanism, ValidationError> {
    let parts: Vec<&str> = raw.split(SEPARATOR).collect();
    if parts.len() < 2 {
        return Err(ValidationError::TooFewFields { found: parts.len() });
    }

    let tm = TransportMechanism::from_token(parts[0])
        .ok_or_else(|| ValidationError::UnknownMechanism(parts[0].to_string()))?;

    // "some.zsync?foo=bar" is allowed, so look at the url path only
    let last = parts[parts.len() - 1];
    let (url, has_scheme) = parse_uri_reference(last).map_err(|source| {
        ValidationError::UnparsableTrailingSegment {
            segment: last.to_string(),
            source,
        }
    })?;

    if tm == TransportMechanism::Zsync && !has_scheme {
        return Err(ValidationError::MissingScheme(last.to_string()));
    }
    // "host:port/x.zsync" parses as scheme "host" with an opaque path
    let path = if url.cannot_be_a_base() { "" } else { url.path() };
    if !path.ends_with(ZSYNC_SUFFIX) {
        return Err(ValidationError::WrongSuffix(raw.to_string()));
    }

    Ok(tm)
}

/// Parses `segment` as an absolute url or a relative reference and reports
/// whether it carried a scheme.
///
/// The url parser strips tabs and newlines and trims spaces, which would let
/// the stored field differ from what was checked, so such input is refused.
fn parse_uri_reference(segment: &str) -> Result<(Url, bool), SegmentError> {
    if let Some(c) = segment.chars().find(|c| c.is_control()) {
        return Err(SegmentError::ControlCharacter(c));
    }
    if segment.trim() != segment {
        return Err(SegmentError::SurroundingWhitespace);
    }

    match Url::parse(segment) {
        Ok(url) => Ok((url, true)),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = Url::parse(RELATIVE_BASE)?;
            Ok((base.join(segment)?, false))
        }
        Err(e) => Err(e.into()),
    }
}

/// Validates `raw` and splits it into the fields of its transport mechanism.
///
/// Fields past the ones a mechanism uses are ignored.
pub fn parse(raw: &str) -> Result<UpdateInformation, ParseError> {
    let tm = check(raw)?;

    let parts: Vec<&str> = raw.split(SEPARATOR).collect();
    if parts.len() < tm.required_fields() {
        return Err(ParseError::InsufficientFields {
            mechanism: tm,
            expected: tm.required_fields(),
            found: parts.len(),
        });
    }
    trace!(transport = %tm, fields = parts.len(), "parsing update information");

    let info = match tm {
        TransportMechanism::Zsync => UpdateInformation::ZsyncDirect {
            file_url: parts[1].to_string(),
        },
        TransportMechanism::GhReleasesZsync => UpdateInformation::GithubReleasesZsync {
            owner: parts[1].to_string(),
            repo: parts[2].to_string(),
            release_name: parts[3].to_string(),
            zsync_filename_pattern: parts[4].to_string(),
        },
        TransportMechanism::BintrayZsync => UpdateInformation::BintrayZsync {
            owner: parts[1].to_string(),
            repo: parts[2].to_string(),
            package_name: parts[3].to_string(),
            zsync_filename_pattern: parts[4].to_string(),
        },
    };
    Ok(info)
}
