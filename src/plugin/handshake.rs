//! The go-plugin handshake Terraform expects on the plugin's stdout.

use std::net::SocketAddr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use rustls::pki_types::CertificateDer;

use super::{PluginEnv, ServerError};

/// Environment variable carrying the magic cookie.
pub const MAGIC_COOKIE_KEY: &str = "TF_PLUGIN_MAGIC_COOKIE";
/// Value Terraform sets for [`MAGIC_COOKIE_KEY`].
pub const MAGIC_COOKIE_VALUE: &str =
    "d602bf8f470bc67ca7faa0386276bbdd4330efaf76d1a219cb4d6991ca9872b2";
/// Version of the go-plugin handshake itself.
pub const CORE_PROTOCOL_VERSION: u32 = 1;
/// Terraform plugin protocol version served.
pub const PROTOCOL_VERSION: u32 = 6;

/// Checks the magic cookie and the protocol versions offered by the client.
pub(crate) fn negotiate(env: &PluginEnv) -> Result<(), ServerError> {
    if env.magic_cookie.as_deref() != Some(MAGIC_COOKIE_VALUE) {
        return Err(ServerError::NotLaunchedByClient);
    }
    if env.protocol_versions.is_empty() || env.protocol_versions.contains(&PROTOCOL_VERSION) {
        return Ok(());
    }
    let offered = env
        .protocol_versions
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",");
    Err(ServerError::IncompatibleVersion(offered))
}

/// Formats the line announcing the listener to the client.
///
/// Without TLS the certificate field stays empty, leaving a trailing `|`.
pub(crate) fn handshake_line(
    addr: SocketAddr,
    certificate: Option<&CertificateDer<'_>>,
) -> String {
    let encoded = certificate
        .map(|cert| STANDARD_NO_PAD.encode(cert.as_ref()))
        .unwrap_or_default();
    format!("{CORE_PROTOCOL_VERSION}|{PROTOCOL_VERSION}|tcp|{addr}|grpc|{encoded}")
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, SocketAddrV4};

    use rstest::rstest;

    use super::*;

    fn env(cookie: Option<&str>, versions: &[u32]) -> PluginEnv {
        PluginEnv {
            magic_cookie: cookie.map(str::to_owned),
            protocol_versions: versions.to_vec(),
            ..PluginEnv::default()
        }
    }

    #[rstest]
    #[case::missing(None)]
    #[case::wrong(Some("not-the-cookie"))]
    fn cookie_must_match(#[case] cookie: Option<&str>) {
        let err = negotiate(&env(cookie, &[6])).expect_err("cookie check");

        assert_eq!(err, ServerError::NotLaunchedByClient);
    }

    #[rstest]
    #[case::unspecified(&[])]
    #[case::exact(&[6])]
    #[case::among_others(&[5, 6])]
    fn version_six_is_accepted(#[case] versions: &[u32]) {
        assert_eq!(negotiate(&env(Some(MAGIC_COOKIE_VALUE), versions)), Ok(()));
    }

    #[test]
    fn older_clients_are_refused() {
        let err =
            negotiate(&env(Some(MAGIC_COOKIE_VALUE), &[4, 5])).expect_err("version 6 missing");

        assert_eq!(err, ServerError::IncompatibleVersion(String::from("4,5")));
        assert_eq!(
            err.to_string(),
            "Incompatible API version with plugin. Plugin version: 6, Client versions: 4,5"
        );
    }

    #[test]
    fn plain_handshake_leaves_certificate_empty() {
        let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 41234));

        assert_eq!(handshake_line(addr, None), "1|6|tcp|127.0.0.1:41234|grpc|");
    }

    #[test]
    fn certificate_is_unpadded_base64() {
        let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 1));
        let cert = CertificateDer::from(vec![0xde, 0xad]);

        assert_eq!(
            handshake_line(addr, Some(&cert)),
            "1|6|tcp|127.0.0.1:1|grpc|3q0"
        );
    }
}
