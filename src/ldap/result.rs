use crate::controls::Control;
use std::fmt;
use std::sync::Arc;

macro_rules! result_codes {
    ($($name:ident = $code:literal),* $(,)?) => {
        /// LDAP result codes (RFC 4511 plus the client-side codes used for
        /// locally synthesized results).
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ResultCode {
            $($name,)*
            Other(i32),
        }

        impl ResultCode {
            pub fn from_code(code: i32) -> Self {
                match code {
                    $($code => ResultCode::$name,)*
                    other => ResultCode::Other(other),
                }
            }

            pub fn code(&self) -> i32 {
                match self {
                    $(ResultCode::$name => $code,)*
                    ResultCode::Other(code) => *code,
                }
            }
        }
    };
}

result_codes! {
    Success = 0,
    OperationsError = 1,
    ProtocolError = 2,
    TimeLimitExceeded = 3,
    SizeLimitExceeded = 4,
    CompareFalse = 5,
    CompareTrue = 6,
    AuthMethodNotSupported = 7,
    StrongerAuthRequired = 8,
    Referral = 10,
    AdminLimitExceeded = 11,
    UnavailableCriticalExtension = 12,
    ConfidentialityRequired = 13,
    SaslBindInProgress = 14,
    NoSuchAttribute = 16,
    UndefinedAttributeType = 17,
    InappropriateMatching = 18,
    ConstraintViolation = 19,
    AttributeOrValueExists = 20,
    InvalidAttributeSyntax = 21,
    NoSuchObject = 32,
    AliasProblem = 33,
    InvalidDNSyntax = 34,
    AliasDereferencingProblem = 36,
    InappropriateAuthentication = 48,
    InvalidCredentials = 49,
    InsufficientAccessRights = 50,
    Busy = 51,
    Unavailable = 52,
    UnwillingToPerform = 53,
    LoopDetect = 54,
    NamingViolation = 64,
    ObjectClassViolation = 65,
    NotAllowedOnNonLeaf = 66,
    NotAllowedOnRDN = 67,
    EntryAlreadyExists = 68,
    ObjectClassModsProhibited = 69,
    AffectsMultipleDSAs = 71,
    OtherError = 80,
    ClientSideServerDown = 81,
    ClientSideLocalError = 82,
    ClientSideEncodingError = 83,
    ClientSideDecodingError = 84,
    ClientSideTimeout = 85,
    ClientSideUserCancelled = 88,
    Canceled = 118,
}

impl ResultCode {
    /// Whether a result with this code is delivered as an error outcome.
    pub fn is_exceptional(&self) -> bool {
        !matches!(
            self,
            ResultCode::Success
                | ResultCode::CompareFalse
                | ResultCode::CompareTrue
                | ResultCode::SaslBindInProgress
        )
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({})", self, self.code())
    }
}

/// Fields shared by every LDAP result. Concrete results embed one.
#[derive(Debug, Clone)]
pub struct LdapResult {
    pub result_code: ResultCode,
    pub matched_dn: String,
    pub diagnostic_message: String,
    pub referrals: Vec<String>,
    pub controls: Vec<Arc<dyn Control>>,
    /// Description of the local failure behind a synthesized result.
    pub cause: Option<String>,
}

impl LdapResult {
    pub fn new(result_code: ResultCode) -> Self {
        Self {
            result_code,
            matched_dn: String::new(),
            diagnostic_message: String::new(),
            referrals: Vec::new(),
            controls: Vec::new(),
            cause: None,
        }
    }

    pub fn success() -> Self {
        Self::new(ResultCode::Success)
    }

    pub fn error(code: ResultCode, message: String) -> Self {
        Self {
            diagnostic_message: message,
            ..Self::new(code)
        }
    }

    pub fn with_matched_dn(mut self, dn: impl Into<String>) -> Self {
        self.matched_dn = dn.into();
        self
    }

    pub fn with_diagnostic_message(mut self, message: impl Into<String>) -> Self {
        self.diagnostic_message = message.into();
        self
    }

    pub fn with_referral(mut self, uri: impl Into<String>) -> Self {
        self.referrals.push(uri.into());
        self
    }

    pub fn with_control(mut self, control: impl Control + 'static) -> Self {
        self.controls.push(Arc::new(control));
        self
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }
}

fn same_controls(a: &[Arc<dyn Control>], b: &[Arc<dyn Control>]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|(x, y)| {
            x.oid() == y.oid() && x.is_critical() == y.is_critical() && x.value() == y.value()
        })
}

impl PartialEq for LdapResult {
    fn eq(&self, other: &Self) -> bool {
        self.result_code == other.result_code
            && self.matched_dn == other.matched_dn
            && self.diagnostic_message == other.diagnostic_message
            && self.referrals == other.referrals
            && self.cause == other.cause
            && same_controls(&self.controls, &other.controls)
    }
}

/// Uniform access to the result core of any response type.
pub trait Response {
    fn result(&self) -> &LdapResult;

    fn result_mut(&mut self) -> &mut LdapResult;

    fn result_code(&self) -> ResultCode {
        self.result().result_code
    }

    fn is_success(&self) -> bool {
        !self.result_code().is_exceptional()
    }

    fn control(&self, oid: &str) -> Option<&Arc<dyn Control>> {
        self.result().controls.iter().find(|c| c.oid() == oid)
    }
}

impl Response for LdapResult {
    fn result(&self) -> &LdapResult {
        self
    }

    fn result_mut(&mut self) -> &mut LdapResult {
        self
    }
}
