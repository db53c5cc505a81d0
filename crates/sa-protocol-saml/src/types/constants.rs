//! SAML 2.0 constants and URIs.
//!
//! Namespace URIs, binding URIs, attribute name formats and status codes
//! used by metadata export and attribute release.

/// SAML 2.0 assertion namespace URI.
pub const SAML_NS: &str = "urn:oasis:names:tc:SAML:2.0:assertion";

/// SAML 2.0 protocol namespace URI.
pub const SAMLP_NS: &str = "urn:oasis:names:tc:SAML:2.0:protocol";

/// SAML 2.0 metadata namespace URI.
pub const METADATA_NS: &str = "urn:oasis:names:tc:SAML:2.0:metadata";

/// XML Digital Signature namespace URI.
pub const XMLDSIG_NS: &str = "http://www.w3.org/2000/09/xmldsig#";

/// Value of `protocolSupportEnumeration` on SAML 2.0 role descriptors.
pub const PROTOCOL_SUPPORT: &str = SAMLP_NS;

// ============================================================================
// Binding URIs
// ============================================================================

/// SAML binding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamlBinding {
    /// HTTP POST binding.
    HttpPost,
    /// HTTP Redirect binding.
    HttpRedirect,
    /// SOAP binding.
    Soap,
}

impl SamlBinding {
    /// Returns the URI for this binding.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::HttpPost => "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST",
            Self::HttpRedirect => "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect",
            Self::Soap => "urn:oasis:names:tc:SAML:2.0:bindings:SOAP",
        }
    }

    /// Parses a binding from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST" => Some(Self::HttpPost),
            "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect" => Some(Self::HttpRedirect),
            "urn:oasis:names:tc:SAML:2.0:bindings:SOAP" => Some(Self::Soap),
            _ => None,
        }
    }
}

// ============================================================================
// Attribute Name Formats
// ============================================================================

/// Attribute `NameFormat` URIs.
pub mod attrname_formats {
    /// URI reference name format.
    pub const URI: &str = "urn:oasis:names:tc:SAML:2.0:attrname-format:uri";

    /// Basic name format.
    pub const BASIC: &str = "urn:oasis:names:tc:SAML:2.0:attrname-format:basic";

    /// Unspecified name format, the default for requested attributes that
    /// declare none.
    pub const UNSPECIFIED: &str = "urn:oasis:names:tc:SAML:2.0:attrname-format:unspecified";

    /// Expands a short name (`uri`, `basic`, `unspecified`) to its URI and
    /// passes anything else through.
    #[must_use]
    pub fn normalize(format: &str) -> &str {
        match format {
            "uri" => URI,
            "basic" => BASIC,
            "unspecified" => UNSPECIFIED,
            other => other,
        }
    }
}

// ============================================================================
// Status Codes
// ============================================================================

/// SAML status codes.
pub mod status_codes {
    /// Request succeeded.
    pub const SUCCESS: &str = "urn:oasis:names:tc:SAML:2.0:status:Success";

    /// Request could not be performed due to an error on the requester's part.
    pub const REQUESTER: &str = "urn:oasis:names:tc:SAML:2.0:status:Requester";

    /// Request could not be performed due to an error on the responder's part.
    pub const RESPONDER: &str = "urn:oasis:names:tc:SAML:2.0:status:Responder";
}

/// Second-level SAML status codes.
pub mod sub_status_codes {
    /// Request denied.
    pub const REQUEST_DENIED: &str = "urn:oasis:names:tc:SAML:2.0:status:RequestDenied";

    /// Resource referenced by the request is not recognized.
    pub const RESOURCE_NOT_RECOGNIZED: &str =
        "urn:oasis:names:tc:SAML:2.0:status:ResourceNotRecognized";
}
