//! Echo Nest response status codes
//!
//! Every API response carries a `status/code` integer. The numeric values are
//! fixed by the service and must round-trip exactly.

use std::fmt;

/// Status code reported in the `status/code` element of a response envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// -1: an unknown error has occurred
    UnknownError,
    /// 0: success
    Success,
    /// 1: the API key is invalid
    InvalidKey,
    /// 2: the API key does not allow this method
    NotAllowed,
    /// 3: too many requests made
    LimitExceeded,
    /// 4: a parameter is missing
    MissingParameter,
    /// 5: an invalid parameter has been used (also "unknown md5")
    InvalidParameter,
    /// Any code the service documents no meaning for
    Unrecognized(i32),
}

impl StatusCode {
    /// Numeric code as sent by the service
    pub fn code(self) -> i32 {
        match self {
            StatusCode::UnknownError => -1,
            StatusCode::Success => 0,
            StatusCode::InvalidKey => 1,
            StatusCode::NotAllowed => 2,
            StatusCode::LimitExceeded => 3,
            StatusCode::MissingParameter => 4,
            StatusCode::InvalidParameter => 5,
            StatusCode::Unrecognized(code) => code,
        }
    }

    pub fn is_success(self) -> bool {
        self == StatusCode::Success
    }

    /// Human readable description, matching the service documentation
    pub fn description(self) -> &'static str {
        match self {
            StatusCode::UnknownError => "An unknown error has occurred",
            StatusCode::Success => "Success",
            StatusCode::InvalidKey => "The API key is invalid",
            StatusCode::NotAllowed => "The API key does not allow this method",
            StatusCode::LimitExceeded => "Too many requests made",
            StatusCode::MissingParameter => "A parameter is missing",
            StatusCode::InvalidParameter => "An invalid parameter has been used",
            StatusCode::Unrecognized(_) => "Unrecognized status code",
        }
    }
}

impl From<i32> for StatusCode {
    fn from(code: i32) -> Self {
        match code {
            -1 => StatusCode::UnknownError,
            0 => StatusCode::Success,
            1 => StatusCode::InvalidKey,
            2 => StatusCode::NotAllowed,
            3 => StatusCode::LimitExceeded,
            4 => StatusCode::MissingParameter,
            5 => StatusCode::InvalidParameter,
            other => StatusCode::Unrecognized(other),
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code(), self.description())
    }
}
