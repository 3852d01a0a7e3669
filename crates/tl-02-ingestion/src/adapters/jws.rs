//! # Compact JWS Security-Event Token Validator
//!
//! Verifies `header.payload.signature` tokens signed with HMAC-SHA2 and
//! extracts the security-event claims.
//!
//! ## Checks (in order)
//!
//! 1. Shape: three dot-separated base64url segments (five = encrypted, refused)
//! 2. Header: `zip`, `crit`, `alg`, `typ`, `kid`
//! 3. Signature over `header.payload`, constant-time comparison
//! 4. Claims: `iss`, `jti`, `iat`, `aud`, `events`, then `exp`/`nbf`, `txn`, `toe`

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use serde_json::{Map, Value};
use sha2::{Sha256, Sha384, Sha512};
use std::sync::Arc;
use tracing::debug;

use crate::domain::entities::AuditRecord;
use crate::domain::errors::{ValidationErrorKind, ValidationFailure};
use crate::domain::policy::{KeyMaterial, SignatureAlgorithm, ValidationPolicy};
use crate::ports::outbound::{SystemTimeSource, TimeSource, TokenValidator};

/// Accepted `typ` values for security-event tokens.
const SET_TYPES: [&str; 2] = ["secevent+jwt", "application/secevent+jwt"];

pub struct CompactJwsValidator {
    time: Arc<dyn TimeSource>,
}

impl Default for CompactJwsValidator {
    fn default() -> Self {
        Self::new(Arc::new(SystemTimeSource))
    }
}

impl CompactJwsValidator {
    pub fn new(time: Arc<dyn TimeSource>) -> Self {
        Self { time }
    }

    fn check_header(
        &self,
        header: &Map<String, Value>,
        policy: &ValidationPolicy,
    ) -> Result<Option<String>, ValidationFailure> {
        if header.contains_key("zip") {
            return Err(ValidationFailure::new(
                ValidationErrorKind::DecompressionFailed,
            ));
        }

        if let Some(crit) = header.get("crit") {
            let names = crit
                .as_array()
                .filter(|names| !names.is_empty())
                .ok_or_else(|| ValidationFailure::invalid_header("crit"))?;
            let names = names
                .iter()
                .map(Value::as_str)
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| ValidationFailure::invalid_header("crit"))?;
            if let Some(missing) = names.iter().find(|name| !header.contains_key(**name)) {
                return Err(ValidationFailure::with_subject(
                    ValidationErrorKind::CriticalHeaderMissing,
                    *missing,
                ));
            }
            // No extension headers are understood.
            return Err(ValidationFailure::with_subject(
                ValidationErrorKind::CriticalHeaderUnsupported,
                names[0],
            ));
        }

        let alg = header
            .get("alg")
            .ok_or_else(|| ValidationFailure::missing_header("alg"))?
            .as_str()
            .and_then(SignatureAlgorithm::from_header)
            .ok_or_else(|| ValidationFailure::invalid_header("alg"))?;
        if alg != policy.key.algorithm {
            return Err(ValidationFailure::invalid_header("alg"));
        }

        if let Some(typ) = header.get("typ") {
            let accepted = typ
                .as_str()
                .map(|t| SET_TYPES.iter().any(|s| s.eq_ignore_ascii_case(t)))
                .unwrap_or(false);
            if !accepted {
                return Err(ValidationFailure::invalid_header("typ"));
            }
        }

        let kid = match header.get("kid") {
            Some(Value::String(kid)) => Some(kid.clone()),
            Some(_) => return Err(ValidationFailure::invalid_header("kid")),
            None => None,
        };
        if let (Some(expected), Some(actual)) = (&policy.key.key_id, &kid) {
            if expected != actual {
                return Err(ValidationFailure::new(
                    ValidationErrorKind::SignatureKeyNotFound,
                ));
            }
        }

        Ok(kid)
    }

    fn check_lifetime(
        &self,
        claims: &Map<String, Value>,
        policy: &ValidationPolicy,
    ) -> Result<(), ValidationFailure> {
        let now = self.time.now();
        let skew = policy.clock_skew_secs as i64;

        if let Some(exp) = optional_int(claims, "exp")? {
            if now - skew >= exp {
                return Err(ValidationFailure::new(ValidationErrorKind::Expired));
            }
        }
        if let Some(nbf) = optional_int(claims, "nbf")? {
            if now + skew < nbf {
                return Err(ValidationFailure::new(ValidationErrorKind::NotYetValid));
            }
        }
        Ok(())
    }
}

impl TokenValidator for CompactJwsValidator {
    fn validate(
        &self,
        raw: &[u8],
        policy: &ValidationPolicy,
    ) -> Result<AuditRecord, ValidationFailure> {
        let token = std::str::from_utf8(raw).map_err(|_| ValidationFailure::malformed())?;
        let segments: Vec<&str> = token.trim().split('.').collect();

        if segments.len() == 5 {
            // Encrypted token: we hold no decryption keys.
            let header = decode_json_object(segments[0])?;
            return Err(if header.contains_key("enc") {
                ValidationFailure::new(ValidationErrorKind::DecryptionFailed)
            } else {
                ValidationFailure::new(ValidationErrorKind::MissingEncryptionAlgorithm)
            });
        }
        if segments.len() != 3 {
            return Err(ValidationFailure::malformed());
        }

        let header = decode_json_object(segments[0])?;
        let key_id = self.check_header(&header, policy)?;

        let signature = URL_SAFE_NO_PAD
            .decode(segments[2])
            .map_err(|_| ValidationFailure::malformed())?;
        let signing_input_len = segments[0].len() + 1 + segments[1].len();
        let signing_input = &token.trim().as_bytes()[..signing_input_len];
        if !verify_signature(&policy.key, signing_input, &signature) {
            debug!(kid = ?key_id, "Token signature did not verify");
            return Err(ValidationFailure::new(ValidationErrorKind::InvalidSignature));
        }

        let claims = decode_json_object(segments[1])?;

        let issuer = required_str(&claims, "iss")?;
        let id = required_str(&claims, "jti")?;
        let issued_at = optional_int(&claims, "iat")?
            .ok_or_else(|| ValidationFailure::missing_claim("iat"))?;
        if issued_at > self.time.now() + policy.clock_skew_secs as i64 {
            return Err(ValidationFailure::invalid_claim("iat"));
        }

        let audience = audience_claim(&claims)?;
        if !audience.iter().any(|aud| aud == &policy.audience) {
            return Err(ValidationFailure::invalid_claim("aud"));
        }

        let events = match claims.get("events") {
            None => return Err(ValidationFailure::missing_claim("events")),
            Some(Value::Object(events)) if !events.is_empty() => events.clone(),
            Some(_) => return Err(ValidationFailure::invalid_claim("events")),
        };

        self.check_lifetime(&claims, policy)?;

        let transaction_id = match claims.get("txn") {
            None => None,
            Some(Value::String(txn)) => Some(txn.clone()),
            Some(_) => return Err(ValidationFailure::invalid_claim("txn")),
        };
        let time_of_event = optional_int(&claims, "toe")?;

        Ok(AuditRecord {
            raw: raw.to_vec(),
            client_id: String::new(),
            issuer,
            id,
            issued_at,
            audience,
            transaction_id,
            time_of_event,
            events,
            key_id,
        })
    }
}

/// Produce a compact JWS over `header` and `claims` (for producers and tests).
pub fn encode_compact_jws(header: &Value, claims: &Value, key: &KeyMaterial) -> String {
    let header = URL_SAFE_NO_PAD.encode(header.to_string());
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    let signing_input = format!("{}.{}", header, payload);
    let signature = compute_mac(key, signing_input.as_bytes());
    format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature))
}

fn decode_json_object(segment: &str) -> Result<Map<String, Value>, ValidationFailure> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| ValidationFailure::malformed())?;
    match serde_json::from_slice(&bytes) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(ValidationFailure::malformed()),
    }
}

fn required_str(claims: &Map<String, Value>, name: &str) -> Result<String, ValidationFailure> {
    match claims.get(name) {
        None => Err(ValidationFailure::missing_claim(name)),
        Some(Value::String(value)) if !value.is_empty() => Ok(value.clone()),
        Some(_) => Err(ValidationFailure::invalid_claim(name)),
    }
}

fn optional_int(claims: &Map<String, Value>, name: &str) -> Result<Option<i64>, ValidationFailure> {
    match claims.get(name) {
        None => Ok(None),
        Some(value) => value
            .as_i64()
            .map(Some)
            .ok_or_else(|| ValidationFailure::invalid_claim(name)),
    }
}

fn audience_claim(claims: &Map<String, Value>) -> Result<Vec<String>, ValidationFailure> {
    match claims.get("aud") {
        None => Err(ValidationFailure::missing_claim("aud")),
        Some(Value::String(aud)) => Ok(vec![aud.clone()]),
        Some(Value::Array(values)) => values
            .iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .filter(|auds| !auds.is_empty())
            .ok_or_else(|| ValidationFailure::invalid_claim("aud")),
        Some(_) => Err(ValidationFailure::invalid_claim("aud")),
    }
}

fn verify_signature(key: &KeyMaterial, input: &[u8], signature: &[u8]) -> bool {
    match key.algorithm {
        SignatureAlgorithm::HS256 => mac_matches::<Hmac<Sha256>>(&key.secret, input, signature),
        SignatureAlgorithm::HS384 => mac_matches::<Hmac<Sha384>>(&key.secret, input, signature),
        SignatureAlgorithm::HS512 => mac_matches::<Hmac<Sha512>>(&key.secret, input, signature),
    }
}

fn mac_matches<M: Mac + KeyInit>(secret: &[u8], input: &[u8], signature: &[u8]) -> bool {
    match <M as KeyInit>::new_from_slice(secret) {
        Ok(mut mac) => {
            Mac::update(&mut mac, input);
            mac.verify_slice(signature).is_ok()
        }
        Err(_) => false,
    }
}

fn compute_mac(key: &KeyMaterial, input: &[u8]) -> Vec<u8> {
    match key.algorithm {
        SignatureAlgorithm::HS256 => mac_bytes::<Hmac<Sha256>>(&key.secret, input),
        SignatureAlgorithm::HS384 => mac_bytes::<Hmac<Sha384>>(&key.secret, input),
        SignatureAlgorithm::HS512 => mac_bytes::<Hmac<Sha512>>(&key.secret, input),
    }
}

fn mac_bytes<M: Mac + KeyInit>(secret: &[u8], input: &[u8]) -> Vec<u8> {
    match <M as KeyInit>::new_from_slice(secret) {
        Ok(mut mac) => {
            Mac::update(&mut mac, input);
            mac.finalize().into_bytes().to_vec()
        }
        Err(_) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::outbound::FixedTimeSource;
    use serde_json::json;

    const NOW: i64 = 1_700_000_000;
    const AUDIENCE: &str = "https://hub.example.com";

    // ========== Test Helpers ==========

    fn key() -> KeyMaterial {
        KeyMaterial {
            key_id: Some("k1".into()),
            algorithm: SignatureAlgorithm::HS256,
            secret: b"0123456789abcdef0123456789abcdef".to_vec(),
        }
    }

    fn policy() -> ValidationPolicy {
        ValidationPolicy {
            audience: AUDIENCE.into(),
            key: key(),
            clock_skew_secs: 60,
        }
    }

    fn validator() -> CompactJwsValidator {
        CompactJwsValidator::new(Arc::new(FixedTimeSource(NOW)))
    }

    fn header() -> Value {
        json!({"alg": "HS256", "typ": "secevent+jwt", "kid": "k1"})
    }

    fn claims() -> Value {
        json!({
            "iss": "https://issuer.example.com",
            "jti": "756E69717565206964656E746966696572",
            "iat": NOW - 10,
            "aud": [AUDIENCE, "https://other"],
            "txn": "tx-42",
            "toe": NOW - 20,
            "events": {
                "https://schemas.example.com/event/login": {"subject": "alice"}
            }
        })
    }

    fn validate(header: Value, claims: Value) -> Result<AuditRecord, ValidationFailure> {
        let token = encode_compact_jws(&header, &claims, &key());
        validator().validate(token.as_bytes(), &policy())
    }

    fn with_claim(name: &str, value: Value) -> Value {
        let mut c = claims();
        c[name] = value;
        c
    }

    fn without_claim(name: &str) -> Value {
        let mut c = claims();
        c.as_object_mut().unwrap().remove(name);
        c
    }

    // ========== Test Group 1: Accepted Tokens ==========

    #[test]
    fn test_valid_token_produces_record() {
        let record = validate(header(), claims()).unwrap();

        assert_eq!(record.issuer, "https://issuer.example.com");
        assert_eq!(record.id, "756E69717565206964656E746966696572");
        assert_eq!(record.issued_at, NOW - 10);
        assert_eq!(record.audience.len(), 2);
        assert_eq!(record.transaction_id.as_deref(), Some("tx-42"));
        assert_eq!(record.time_of_event, Some(NOW - 20));
        assert_eq!(record.key_id.as_deref(), Some("k1"));
        assert!(record.events.contains_key("https://schemas.example.com/event/login"));
    }

    #[test]
    fn test_single_string_audience_accepted() {
        let record = validate(header(), with_claim("aud", json!(AUDIENCE))).unwrap();
        assert_eq!(record.audience, vec![AUDIENCE.to_string()]);
    }

    #[test]
    fn test_all_hmac_algorithms_round_trip() {
        for (alg, algorithm) in [
            ("HS256", SignatureAlgorithm::HS256),
            ("HS384", SignatureAlgorithm::HS384),
            ("HS512", SignatureAlgorithm::HS512),
        ] {
            let mut policy = policy();
            policy.key.algorithm = algorithm;
            let token =
                encode_compact_jws(&json!({"alg": alg}), &claims(), &policy.key);
            assert!(validator().validate(token.as_bytes(), &policy).is_ok(), "{}", alg);
        }
    }

    // ========== Test Group 2: Key Errors ==========

    #[test]
    fn test_wrong_secret_is_invalid_signature() {
        let mut other = key();
        other.secret = b"another-secret-another-secret-xx".to_vec();
        let token = encode_compact_jws(&header(), &claims(), &other);

        let err = validator().validate(token.as_bytes(), &policy()).unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::InvalidSignature);
        assert!(err.is_key_error());
    }

    #[test]
    fn test_unknown_kid_is_key_not_found() {
        let err = validate(json!({"alg": "HS256", "kid": "k2"}), claims()).unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::SignatureKeyNotFound);
    }

    // ========== Test Group 3: Content Errors ==========

    #[test]
    fn test_garbage_is_malformed() {
        for raw in [&b"not-a-token"[..], b"a.b.c", &[0xff, 0xfe, 0x2e]] {
            let err = validator().validate(raw, &policy()).unwrap_err();
            assert_eq!(err.kind, ValidationErrorKind::MalformedToken);
        }
    }

    #[test]
    fn test_encrypted_tokens_are_refused() {
        let with_enc = URL_SAFE_NO_PAD.encode(json!({"alg": "dir", "enc": "A128GCM"}).to_string());
        let without_enc = URL_SAFE_NO_PAD.encode(json!({"alg": "dir"}).to_string());

        let err = validator()
            .validate(format!("{}.a.b.c.d", with_enc).as_bytes(), &policy())
            .unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::DecryptionFailed);

        let err = validator()
            .validate(format!("{}.a.b.c.d", without_enc).as_bytes(), &policy())
            .unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::MissingEncryptionAlgorithm);
    }

    #[test]
    fn test_header_errors() {
        let err = validate(json!({"typ": "secevent+jwt"}), claims()).unwrap_err();
        assert_eq!(err, ValidationFailure::missing_header("alg"));

        let err = validate(json!({"alg": "HS512"}), claims()).unwrap_err();
        assert_eq!(err, ValidationFailure::invalid_header("alg"));

        let err = validate(json!({"alg": "HS256", "typ": "JWT"}), claims()).unwrap_err();
        assert_eq!(err, ValidationFailure::invalid_header("typ"));

        let err = validate(json!({"alg": "HS256", "zip": "DEF"}), claims()).unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::DecompressionFailed);
    }

    #[test]
    fn test_critical_headers() {
        let err = validate(json!({"alg": "HS256", "crit": ["exp"]}), claims()).unwrap_err();
        assert_eq!(
            err,
            ValidationFailure::with_subject(ValidationErrorKind::CriticalHeaderMissing, "exp")
        );

        let err = validate(json!({"alg": "HS256", "crit": ["b64"], "b64": false}), claims())
            .unwrap_err();
        assert_eq!(
            err,
            ValidationFailure::with_subject(ValidationErrorKind::CriticalHeaderUnsupported, "b64")
        );
    }

    #[test]
    fn test_missing_claims_are_named() {
        for claim in ["iss", "jti", "iat", "aud", "events"] {
            let err = validate(header(), without_claim(claim)).unwrap_err();
            assert_eq!(err, ValidationFailure::missing_claim(claim));
        }
    }

    #[test]
    fn test_invalid_claims_are_named() {
        let cases = [
            ("aud", json!("https://someone-else")),
            ("events", json!([])),
            ("events", json!({})),
            ("iat", json!("yesterday")),
            ("iat", json!(NOW + 3600)),
            ("txn", json!(7)),
            ("jti", json!(""))
        ];
        for (claim, value) in cases {
            let err = validate(header(), with_claim(claim, value)).unwrap_err();
            assert_eq!(err, ValidationFailure::invalid_claim(claim));
        }
    }

    #[test]
    fn test_expired_and_not_yet_valid() {
        let err = validate(header(), with_claim("exp", json!(NOW - 61))).unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::Expired);

        let err = validate(header(), with_claim("nbf", json!(NOW + 61))).unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::NotYetValid);

        // Within skew
        assert!(validate(header(), with_claim("exp", json!(NOW - 30))).is_ok());
        assert!(validate(header(), with_claim("nbf", json!(NOW + 30))).is_ok());
    }
}
