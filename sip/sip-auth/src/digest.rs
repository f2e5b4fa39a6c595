use bytesstr::BytesStr;
use sip_types::header::typed::{DigestAuthorization, DigestChallenge, QopResponse};
use sip_types::Method;

#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    #[error("encountered unsupported algorithm {0}")]
    UnsupportedAlgorithm(BytesStr),
    #[error("challenge requires an unsupported qop")]
    UnsupportedQop,
}

/// Credentials used to answer digest challenges
#[derive(Debug, Clone)]
pub struct DigestCredentials {
    user: String,
    password: String,
}

impl DigestCredentials {
    pub fn new<U, P>(user: U, password: P) -> Self
    where
        U: Into<String>,
        P: Into<String>,
    {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }
}

/// Used to solve digest challenges carried in 401 / 407 SIP responses
pub struct DigestAuthenticator {
    pub credentials: DigestCredentials,
}

impl DigestAuthenticator {
    pub fn new(credentials: DigestCredentials) -> Self {
        Self { credentials }
    }

    /// Answer `challenge` for a request of `method` to `uri`.
    ///
    /// When the challenge advertises `qop=auth` the response includes a fresh
    /// cnonce and a nonce count of 1. Nonce reuse across requests is not
    /// implemented, every challenge is answered from scratch.
    pub fn authorize(
        &self,
        method: &Method,
        uri: &str,
        challenge: &DigestChallenge,
    ) -> Result<DigestAuthorization, DigestError> {
        if let Some(algorithm) = &challenge.algorithm {
            if !algorithm.eq_ignore_ascii_case("MD5") {
                return Err(DigestError::UnsupportedAlgorithm(algorithm.clone()));
            }
        }

        let qop = if let Some(qop) = &challenge.qop {
            if !challenge.supports_qop_auth() {
                log::warn!("challenge offers qop \"{qop}\" which is not supported");
                return Err(DigestError::UnsupportedQop);
            }

            Some((generate_cnonce(), 1))
        } else {
            None
        };

        let response = compute_response(
            &self.credentials,
            method,
            uri,
            &challenge.realm,
            &challenge.nonce,
            qop.as_ref().map(|(cnonce, nc)| (cnonce.as_str(), *nc)),
        );

        Ok(DigestAuthorization {
            username: self.credentials.user.as_str().into(),
            realm: challenge.realm.clone(),
            nonce: challenge.nonce.clone(),
            uri: uri.into(),
            response: response.into(),
            algorithm: BytesStr::from_static("MD5"),
            opaque: challenge.opaque.clone(),
            qop_response: qop.map(|(cnonce, nc)| QopResponse {
                cnonce: cnonce.into(),
                nc,
            }),
        })
    }
}

fn generate_cnonce() -> String {
    let uuid = uuid::Uuid::new_v4();

    uuid.simple().to_string()[..16].to_owned()
}

fn md5_hex(input: &str) -> String {
    format!("{:x}", md5::compute(input.as_bytes()))
}

fn compute_response(
    credentials: &DigestCredentials,
    method: &Method,
    uri: &str,
    realm: &str,
    nonce: &str,
    qop: Option<(&str, u32)>,
) -> String {
    let ha1 = md5_hex(&format!(
        "{}:{}:{}",
        credentials.user, realm, credentials.password
    ));
    let ha2 = md5_hex(&format!("{method}:{uri}"));

    match qop {
        Some((cnonce, nc)) => md5_hex(&format!("{ha1}:{nonce}:{nc:08x}:{cnonce}:auth:{ha2}")),
        None => md5_hex(&format!("{ha1}:{nonce}:{ha2}")),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use bytes::Bytes;
    use sip_types::header::HeaderParse;

    fn credentials() -> DigestCredentials {
        DigestCredentials::new("alice", "secret")
    }

    #[test]
    fn rfc2617_response() {
        let response = compute_response(
            &credentials(),
            &Method::INVITE,
            "sip:bob@example.com",
            "asterisk",
            "abc",
            None,
        );

        assert_eq!(response, "f2f7eb2baeb958a011057d75f1b25db9");
    }

    #[test]
    fn rfc2617_response_with_qop() {
        let response = compute_response(
            &credentials(),
            &Method::INVITE,
            "sip:bob@example.com",
            "asterisk",
            "abc",
            Some(("0a4f113b775e9074", 1)),
        );

        assert_eq!(response, "d9c392d57d971cb739d643fb149e27f6");
    }

    #[test]
    fn authorize_echoes_challenge_fields() {
        let value = "Digest realm=\"asterisk\", nonce=\"abc\", opaque=\"tok\", algorithm=MD5";
        let src = Bytes::copy_from_slice(value.as_bytes());
        let value = std::str::from_utf8(&src).unwrap();
        let (_, challenge) = DigestChallenge::parse(&src, value).unwrap();

        let authorization = DigestAuthenticator::new(credentials())
            .authorize(&Method::INVITE, "sip:bob@example.com", &challenge)
            .unwrap();

        assert_eq!(authorization.username, "alice");
        assert_eq!(authorization.realm, "asterisk");
        assert_eq!(authorization.nonce, "abc");
        assert_eq!(authorization.uri, "sip:bob@example.com");
        assert_eq!(authorization.response, "f2f7eb2baeb958a011057d75f1b25db9");
        assert_eq!(authorization.opaque.unwrap(), "tok");
        assert!(authorization.qop_response.is_none());
    }

    #[test]
    fn authorize_with_qop_auth() {
        let value = "Digest realm=\"asterisk\", nonce=\"abc\", qop=\"auth\"";
        let src = Bytes::copy_from_slice(value.as_bytes());
        let value = std::str::from_utf8(&src).unwrap();
        let (_, challenge) = DigestChallenge::parse(&src, value).unwrap();

        let authorization = DigestAuthenticator::new(credentials())
            .authorize(&Method::INVITE, "sip:bob@example.com", &challenge)
            .unwrap();

        let qop_response = authorization.qop_response.unwrap();
        assert_eq!(qop_response.nc, 1);
        assert_eq!(qop_response.cnonce.len(), 16);
    }

    #[test]
    fn reject_unknown_algorithm() {
        let value = "Digest realm=\"asterisk\", nonce=\"abc\", algorithm=SHA-512";
        let src = Bytes::copy_from_slice(value.as_bytes());
        let value = std::str::from_utf8(&src).unwrap();
        let (_, challenge) = DigestChallenge::parse(&src, value).unwrap();

        assert!(matches!(
            DigestAuthenticator::new(credentials()).authorize(
                &Method::INVITE,
                "sip:bob@example.com",
                &challenge
            ),
            Err(DigestError::UnsupportedAlgorithm(..))
        ));
    }

    #[test]
    fn reject_unsupported_qop() {
        let value = "Digest realm=\"asterisk\", nonce=\"abc\", qop=\"auth-int\"";
        let src = Bytes::copy_from_slice(value.as_bytes());
        let value = std::str::from_utf8(&src).unwrap();
        let (_, challenge) = DigestChallenge::parse(&src, value).unwrap();

        assert!(matches!(
            DigestAuthenticator::new(credentials()).authorize(
                &Method::INVITE,
                "sip:bob@example.com",
                &challenge
            ),
            Err(DigestError::UnsupportedQop)
        ));
    }
}
