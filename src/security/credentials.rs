//! Shared-secret credential verification.
//!
//! # Lookup Order
//! The first non-empty value wins:
//! 1. HTTP Basic-Auth password
//! 2. `API-Key` header
//! 3. `X-API-Key` header
//! 4. the configured credential header, when it is not one of the above
//!
//! A Basic pair naming a configured user must carry that user's password. Any
//! other Basic password is checked against the API keys.
//!
//! All comparisons go through [`subtle::ConstantTimeEq`] and are folded without
//! short-circuiting, so timing does not reveal which key (or which byte) differed.

use std::collections::BTreeMap;

use axum::http::{header, HeaderMap, HeaderName};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use subtle::{Choice, ConstantTimeEq};

use crate::config::AuthenticationConfig;

/// `API-Key` header.
pub static API_KEY: HeaderName = HeaderName::from_static("api-key");

/// `X-API-Key` header.
pub static X_API_KEY: HeaderName = HeaderName::from_static("x-api-key");

/// A credential found on the request.
#[derive(PartialEq, Eq)]
pub enum Credential<'a> {
    /// Basic-Auth pair, as raw bytes.
    Basic { username: Vec<u8>, password: Vec<u8> },
    /// Key taken from one of the key headers.
    Key(&'a [u8]),
}

impl std::fmt::Debug for Credential<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", &String::from_utf8_lossy(username))
                .finish_non_exhaustive(),
            Credential::Key(_) => f.write_str("Key(..)"),
        }
    }
}

/// Authenticates requests against the configured secrets.
#[derive(Clone)]
pub struct CredentialVerifier {
    api_keys: Vec<Vec<u8>>,
    users: Vec<(Vec<u8>, Vec<u8>)>,
    credential_header: HeaderName,
}

impl CredentialVerifier {
    pub fn new(
        api_keys: &[String],
        users: &BTreeMap<String, String>,
        credential_header: HeaderName,
    ) -> Self {
        Self {
            api_keys: api_keys.iter().map(|k| k.as_bytes().to_vec()).collect(),
            users: users
                .iter()
                .map(|(u, p)| (u.as_bytes().to_vec(), p.as_bytes().to_vec()))
                .collect(),
            credential_header,
        }
    }

    pub fn from_config(config: &AuthenticationConfig, credential_header: HeaderName) -> Self {
        Self::new(&config.api_keys, &config.users, credential_header)
    }

    /// The custom header credentials are read from.
    pub fn credential_header(&self) -> &HeaderName {
        &self.credential_header
    }

    /// Returns true when the request carries a valid credential.
    pub fn verify(&self, headers: &HeaderMap) -> bool {
        match self.find_credential(headers) {
            Some(Credential::Basic { username, password }) => {
                let known = self.user_known(&username);
                let matched = (known & self.user_matches(&username, &password))
                    | (!known & self.key_matches(&password));
                matched.into()
            }
            Some(Credential::Key(key)) => self.key_matches(key).into(),
            None => false,
        }
    }

    /// Probe every credential source in order and return the first non-empty one.
    pub fn find_credential<'a>(&self, headers: &'a HeaderMap) -> Option<Credential<'a>> {
        if let Some((username, password)) = basic_credentials(headers) {
            if !password.is_empty() {
                return Some(Credential::Basic { username, password });
            }
        }

        let extra = (self.credential_header != API_KEY && self.credential_header != X_API_KEY)
            .then_some(&self.credential_header);

        [&API_KEY, &X_API_KEY]
            .into_iter()
            .chain(extra)
            .find_map(|name| header_value(headers, name))
            .map(Credential::Key)
    }

    fn key_matches(&self, candidate: &[u8]) -> Choice {
        self.api_keys
            .iter()
            .fold(Choice::from(0), |acc, key| acc | candidate.ct_eq(key))
    }

    fn user_known(&self, username: &[u8]) -> Choice {
        self.users
            .iter()
            .fold(Choice::from(0), |acc, (user, _)| acc | username.ct_eq(user))
    }

    fn user_matches(&self, username: &[u8], password: &[u8]) -> Choice {
        self.users.iter().fold(Choice::from(0), |acc, (user, pass)| {
            acc | (username.ct_eq(user) & password.ct_eq(pass))
        })
    }
}

impl std::fmt::Debug for CredentialVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVerifier")
            .field("api_keys", &self.api_keys.len())
            .field("users", &self.users.len())
            .field("credential_header", &self.credential_header)
            .finish()
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a [u8]> {
    headers
        .get(name)
        .map(|value| value.as_bytes())
        .filter(|value| !value.is_empty())
}

/// Decode `Authorization: Basic <base64(user:pass)>`.
pub fn basic_credentials(headers: &HeaderMap) -> Option<(Vec<u8>, Vec<u8>)> {
    const PREFIX: &[u8] = b"basic ";

    let value = headers.get(header::AUTHORIZATION)?.as_bytes();
    if value.len() < PREFIX.len() || !value[..PREFIX.len()].eq_ignore_ascii_case(PREFIX) {
        return None;
    }

    let encoded = std::str::from_utf8(&value[PREFIX.len()..]).ok()?.trim();
    let decoded = STANDARD.decode(encoded).ok()?;
    let colon = decoded.iter().position(|&b| b == b':')?;
    let (username, password) = decoded.split_at(colon);
    Some((username.to_vec(), password[1..].to_vec()))
}
