//! SAML Status types.
//!
//! Status information a caller embeds in a SAML error response, for example
//! when attribute release rejects an unknown attribute consuming service.

use serde::{Deserialize, Serialize};

use super::{status_codes, sub_status_codes};

/// SAML protocol status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    /// The status code.
    pub status_code: StatusCode,

    /// Optional status message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,

    /// Optional detailed status information.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_detail: Option<String>,
}

impl Status {
    /// Creates a status with the given code and no message.
    #[must_use]
    pub const fn new(status_code: StatusCode) -> Self {
        Self {
            status_code,
            status_message: None,
            status_detail: None,
        }
    }

    /// Creates a success status.
    #[must_use]
    pub fn success() -> Self {
        Self::new(StatusCode::new(status_codes::SUCCESS))
    }

    /// Creates a status for a request naming a resource this authority
    /// does not recognize.
    #[must_use]
    pub fn resource_not_recognized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::resource_not_recognized()).with_message(message)
    }

    /// Returns true if this status indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status_code.value == status_codes::SUCCESS
    }

    /// Sets the status message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.status_message = Some(message.into());
        self
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::success()
    }
}

/// SAML status code with an optional second-level code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCode {
    /// The status code URI value.
    pub value: String,

    /// Nested second-level code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_status: Option<Box<StatusCode>>,
}

impl StatusCode {
    /// Creates a status code with the given value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            sub_status: None,
        }
    }

    /// Creates a requester status code with a `ResourceNotRecognized`
    /// second-level code.
    #[must_use]
    pub fn resource_not_recognized() -> Self {
        Self::new(status_codes::REQUESTER)
            .with_sub_status(Self::new(sub_status_codes::RESOURCE_NOT_RECOGNIZED))
    }

    /// Adds a second-level code.
    #[must_use]
    pub fn with_sub_status(mut self, sub: StatusCode) -> Self {
        self.sub_status = Some(Box::new(sub));
        self
    }

    /// Returns the second-level code value if present.
    #[must_use]
    pub fn sub_status_value(&self) -> Option<&str> {
        self.sub_status.as_ref().map(|s| s.value.as_str())
    }
}
