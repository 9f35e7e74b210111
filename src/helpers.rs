use std::convert::TryFrom;

use http::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::Error;
use crate::headers::HeaderFields;

/// A usable boundary is non-empty and free of CR/LF, which the wire format
/// reserves for line framing.
pub(crate) fn validate_boundary(boundary: &str) -> crate::Result<()> {
    if boundary.is_empty() || boundary.bytes().any(|b| b == b'\r' || b == b'\n') {
        return Err(Error::InvalidBoundary);
    }
    Ok(())
}

pub(crate) fn to_header_map(fields: &HeaderFields) -> crate::Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(fields.len());

    for (name, value) in fields.iter() {
        let name = HeaderName::try_from(name).map_err(|err| Error::DecodeHeaderName {
            name: name.to_owned(),
            cause: err.into(),
        })?;

        let value = HeaderValue::try_from(value).map_err(|err| Error::DecodeHeaderValue {
            value: value.as_bytes().to_owned(),
            cause: err.into(),
        })?;

        map.append(name, value);
    }

    Ok(map)
}

pub(crate) fn from_header_map(map: &HeaderMap) -> crate::Result<HeaderFields> {
    let mut fields = HeaderFields::new();

    for (name, value) in map {
        let value = value.to_str().map_err(|err| Error::DecodeHeaderValue {
            value: value.as_bytes().to_owned(),
            cause: err.into(),
        })?;

        fields.append(name.as_str(), value);
    }

    Ok(fields)
}
