use super::message::{InboundResponse, LDAP_BIND_REQUEST, LDAP_BIND_RESPONSE};
use super::result::{LdapResult, Response, ResultCode};
use crate::ber::{context_constructed_tag, context_tag, BerWriter};
use crate::client::LdapRequest;
use crate::controls::Control;
use crate::DecodeError;
use bytes::Bytes;
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::{debug, error};

const LDAP_VERSION: i64 = 3;

#[derive(Clone, PartialEq, Eq)]
pub enum BindAuthentication {
    Simple(Bytes),
    Sasl {
        mechanism: String,
        credentials: Option<Bytes>,
    },
}

impl fmt::Debug for BindAuthentication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindAuthentication::Simple(_) => f.write_str("Simple(<redacted>)"),
            BindAuthentication::Sasl { mechanism, .. } => {
                write!(f, "Sasl {{ mechanism: {:?} }}", mechanism)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct BindRequest {
    name: String,
    authentication: BindAuthentication,
    controls: Vec<Arc<dyn Control>>,
}

impl BindRequest {
    pub fn simple(name: impl Into<String>, password: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            authentication: BindAuthentication::Simple(password.into()),
            controls: Vec::new(),
        }
    }

    pub fn anonymous() -> Self {
        Self::simple("", Bytes::new())
    }

    pub fn sasl(name: impl Into<String>, mechanism: impl Into<String>, credentials: Option<Bytes>) -> Self {
        Self {
            name: name.into(),
            authentication: BindAuthentication::Sasl {
                mechanism: mechanism.into(),
                credentials,
            },
            controls: Vec::new(),
        }
    }

    pub fn with_control(mut self, control: impl Control) -> Self {
        self.controls.push(Arc::new(control));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn authentication(&self) -> &BindAuthentication {
        &self.authentication
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BindResult {
    pub result: LdapResult,
    pub server_sasl_credentials: Option<Bytes>,
}

impl BindResult {
    pub fn new(result: LdapResult) -> Self {
        Self {
            result,
            server_sasl_credentials: None,
        }
    }
}

impl Response for BindResult {
    fn result(&self) -> &LdapResult {
        &self.result
    }

    fn result_mut(&mut self) -> &mut LdapResult {
        &mut self.result
    }
}

/// Authorization identity of a connection, replaced on each successful bind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationState {
    pub is_authenticated: bool,
    pub bound_dn: Option<String>,
    pub anonymous: bool,
    pub sasl_mechanism: Option<String>,
}

impl AuthorizationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, dn: String, sasl_mechanism: Option<String>) {
        self.is_authenticated = true;
        self.anonymous = dn.is_empty() && sasl_mechanism.is_none();
        self.bound_dn = if dn.is_empty() { None } else { Some(dn) };
        self.sasl_mechanism = sasl_mechanism;
    }

    pub fn unbind(&mut self) {
        *self = Self::default();
    }

    pub fn is_bound(&self) -> bool {
        self.is_authenticated
    }
}

impl LdapRequest for BindRequest {
    type Result = BindResult;

    fn operation_name(&self) -> &'static str {
        "bind"
    }

    fn controls(&self) -> &[Arc<dyn Control>] {
        &self.controls
    }

    fn encode_op(&self, writer: &mut BerWriter) {
        writer.write_start_sequence_with_tag(LDAP_BIND_REQUEST);
        writer.write_integer(LDAP_VERSION);
        writer.write_octet_string(&self.name);
        match &self.authentication {
            BindAuthentication::Simple(password) => {
                writer.write_octet_string_with_tag(context_tag(0), password);
            }
            BindAuthentication::Sasl {
                mechanism,
                credentials,
            } => {
                writer.write_start_sequence_with_tag(context_constructed_tag(3));
                writer.write_octet_string(mechanism);
                if let Some(credentials) = credentials {
                    writer.write_octet_string(credentials);
                }
                writer.write_end_sequence();
            }
        }
        writer.write_end_sequence();
    }

    fn decode_result(
        &self,
        response: &InboundResponse,
        controls: Vec<Arc<dyn Control>>,
    ) -> Result<BindResult, DecodeError> {
        response.expect_op(LDAP_BIND_RESPONSE)?;
        Ok(BindResult {
            result: response.to_result(controls),
            server_sasl_credentials: response.server_sasl_credentials.clone(),
        })
    }

    fn error_result(&self, result: LdapResult) -> BindResult {
        BindResult::new(result)
    }

    fn on_success(&self, result: &BindResult, authorization: &RwLock<AuthorizationState>) {
        if result.result_code() == ResultCode::SaslBindInProgress {
            return;
        }
        let mechanism = match &self.authentication {
            BindAuthentication::Simple(_) => None,
            BindAuthentication::Sasl { mechanism, .. } => Some(mechanism.clone()),
        };
        match authorization.write() {
            Ok(mut state) => {
                state.bind(self.name.clone(), mechanism);
                debug!("Installed authorization state for \"{}\"", self.name);
            }
            Err(e) => {
                error!("Failed to acquire authorization lock after bind: {}", e);
            }
        }
    }
}
