//! Endpoint discovery helpers: URL validation, the `GetEndpoints` request the
//! channel issues when it only knows a server URL, and the rule for picking an
//! endpoint from the result.

use log::error;
use url::Url;

use opcua_session_types::{
    EndpointDescription, GetEndpointsRequest, MessageSecurityMode, RequestHeader,
    BINARY_TRANSPORT_PROFILE_URI,
};

/// Scheme for OPC UA TCP.
pub const OPC_TCP_SCHEME: &str = "opc.tcp";

/// Default OPC UA port number. Used by a discovery server; other servers
/// normally run on a different port, but it is implied by `opc.tcp://` URLs
/// without an explicit port.
pub const DEFAULT_OPC_UA_SERVER_PORT: u16 = 4840;

/// Creates a `Url` from the input string, supplying a default port if necessary.
fn opc_url_from_str(s: &str) -> Result<Url, url::ParseError> {
    Url::parse(s)
        .map(|mut url| {
            if url.port().is_none() {
                let _ = url.set_port(Some(DEFAULT_OPC_UA_SERVER_PORT));
            }
            url
        })
        .map_err(|err| {
            error!("Cannot parse url \"{}\", error = {:?}", s, err);
            err
        })
}

/// Check if this is a valid OPC UA URL.
pub fn is_valid_opc_ua_url(url: &str) -> bool {
    is_opc_ua_binary_url(url)
}

/// Check if this is an OPC UA TCP URL.
pub fn is_opc_ua_binary_url(url: &str) -> bool {
    if let Ok(url) = opc_url_from_str(url) {
        url.scheme() == OPC_TCP_SCHEME
    } else {
        false
    }
}

/// Takes an endpoint url and strips off the path and args to leave just the
/// protocol, host & port.
pub fn server_url_from_endpoint_url(endpoint_url: &str) -> Result<String, url::ParseError> {
    opc_url_from_str(endpoint_url).map(|mut url| {
        url.set_query(None);
        if let Some(port) = url.port() {
            // If the port is the default, strip it so the url string omits it.
            if port == DEFAULT_OPC_UA_SERVER_PORT {
                let _ = url.set_port(None);
            }
        }
        url.into()
    })
}

/// The `GetEndpoints` request issued against a discovery URL, restricted to
/// the binary transport profile. The channel fills in the request header
/// before sending.
pub fn make_get_endpoints_request(endpoint_url: impl Into<String>) -> GetEndpointsRequest {
    GetEndpointsRequest {
        request_header: RequestHeader::default(),
        endpoint_url: endpoint_url.into(),
        locale_ids: Vec::new(),
        profile_uris: vec![BINARY_TRANSPORT_PROFILE_URI.to_string()],
    }
}

/// Determine if the client can use this endpoint at all.
pub fn is_supported_endpoint(endpoint: &EndpointDescription) -> bool {
    if endpoint.security_mode == MessageSecurityMode::Invalid {
        return false;
    }
    if !endpoint.transport_profile_uri.is_empty()
        && endpoint.transport_profile_uri != BINARY_TRANSPORT_PROFILE_URI
    {
        return false;
    }
    is_opc_ua_binary_url(&endpoint.endpoint_url)
}

/// Pick the endpoint to connect to from a server's endpoint list: the
/// supported endpoint with the greatest `security_level`. Ties are broken by
/// position, later entries win.
pub fn select_endpoint(endpoints: &[EndpointDescription]) -> Option<&EndpointDescription> {
    endpoints
        .iter()
        .filter(|e| is_supported_endpoint(e))
        .max_by(|a, b| a.security_level.cmp(&b.security_level))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(url: &str, security_level: u8) -> EndpointDescription {
        EndpointDescription {
            endpoint_url: url.to_string(),
            security_mode: MessageSecurityMode::None,
            security_level,
            ..Default::default()
        }
    }

    #[test]
    fn url_scheme() {
        assert!(is_opc_ua_binary_url("opc.tcp://foo/xyz"));
        assert!(is_opc_ua_binary_url(
            "opc.tcp://[FEDC:BA98:7654:3210:FEDC:BA98:7654:3210]:80/xyz"
        ));
        assert!(!is_opc_ua_binary_url("http://foo/xyz"));
    }

    #[test]
    fn server_url_from_endpoint_url_test() {
        assert_eq!(
            "opc.tcp://localhost",
            server_url_from_endpoint_url("opc.tcp://localhost:4840").unwrap()
        );
        assert_eq!(
            "opc.tcp://localhost:4841",
            server_url_from_endpoint_url("opc.tcp://localhost:4841").unwrap()
        );
        assert_eq!(
            "opc.tcp://localhost/xyz/abc",
            server_url_from_endpoint_url("opc.tcp://localhost/xyz/abc?1").unwrap()
        );
    }

    #[test]
    fn selects_highest_security_level() {
        let endpoints = vec![
            endpoint("opc.tcp://localhost:4840", 0),
            endpoint("opc.tcp://localhost:4840", 5),
            endpoint("opc.tcp://localhost:4840", 5),
            endpoint("opc.tcp://localhost:4840", 3),
        ];
        let selected = select_endpoint(&endpoints).unwrap();
        assert_eq!(selected.security_level, 5);
        // Ties break by position, the later of the two fives wins.
        assert!(std::ptr::eq(selected, &endpoints[2]));
    }

    #[test]
    fn skips_unsupported_endpoints() {
        let mut bad_mode = endpoint("opc.tcp://localhost:4840", 10);
        bad_mode.security_mode = MessageSecurityMode::Invalid;
        let mut bad_profile = endpoint("opc.tcp://localhost:4840", 9);
        bad_profile.transport_profile_uri = "http://opcfoundation.org/UA-Profile/Transport/https-uabinary".to_string();
        let endpoints = vec![
            bad_mode,
            bad_profile,
            endpoint("https://localhost:4840", 8),
            endpoint("opc.tcp://localhost:4840", 1),
        ];
        let selected = select_endpoint(&endpoints).unwrap();
        assert_eq!(selected.security_level, 1);
    }

    #[test]
    fn empty_list_selects_nothing() {
        assert!(select_endpoint(&[]).is_none());
    }

    #[test]
    fn get_endpoints_request_profile() {
        let request = make_get_endpoints_request("opc.tcp://localhost:4840");
        assert_eq!(request.endpoint_url, "opc.tcp://localhost:4840");
        assert_eq!(request.profile_uris, vec![BINARY_TRANSPORT_PROFILE_URI.to_string()]);
    }
}
