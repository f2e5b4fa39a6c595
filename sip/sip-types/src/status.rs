use std::fmt;

/// Classifies a [`StatusCode`] by its hundreds digit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeKind {
    Provisional,
    Success,
    Redirect,
    RequestFailure,
    ServerFailure,
    GlobalFailure,
}

/// A SIP response status code
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StatusCode(u16);

macro_rules! status_codes {
    ($($code:literal, $reason:literal, $ident:ident;)+) => {
        impl StatusCode {
            $(pub const $ident: Self = Self($code);)+

            /// The canonical reason phrase for well known codes
            pub fn reason_phrase(&self) -> Option<&'static str> {
                match self.0 {
                    $($code => Some($reason),)+
                    _ => None,
                }
            }
        }
    };
}

status_codes! {
    100, "Trying",                        TRYING;
    180, "Ringing",                       RINGING;
    183, "Session Progress",              SESSION_PROGRESS;
    200, "OK",                            OK;
    400, "Bad Request",                   BAD_REQUEST;
    401, "Unauthorized",                  UNAUTHORIZED;
    404, "Not Found",                     NOT_FOUND;
    407, "Proxy Authentication Required", PROXY_AUTHENTICATION_REQUIRED;
    408, "Request Timeout",               REQUEST_TIMEOUT;
    480, "Temporarily Unavailable",       TEMPORARILY_UNAVAILABLE;
    486, "Busy Here",                     BUSY_HERE;
    487, "Request Terminated",            REQUEST_TERMINATED;
    500, "Server Internal Error",         SERVER_INTERNAL_ERROR;
    600, "Busy Everywhere",               BUSY_EVERYWHERE;
    603, "Decline",                       DECLINE;
}

impl StatusCode {
    pub fn into_u16(self) -> u16 {
        self.0
    }

    pub fn kind(self) -> CodeKind {
        match self.0 {
            100..=199 => CodeKind::Provisional,
            200..=299 => CodeKind::Success,
            300..=399 => CodeKind::Redirect,
            400..=499 => CodeKind::RequestFailure,
            500..=599 => CodeKind::ServerFailure,
            _ => CodeKind::GlobalFailure,
        }
    }

    pub fn is_provisional(self) -> bool {
        self.kind() == CodeKind::Provisional
    }

    pub fn is_final(self) -> bool {
        !self.is_provisional()
    }
}

impl From<u16> for StatusCode {
    fn from(code: u16) -> Self {
        Self(code)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
