//! Call envelope model and the string codec.
//!
//! Two wire forms exist:
//! * the modern form, a JSON object with single-letter keys
//!   (`s`/`f`/`c`/`a`/`t`/`l`/`r`);
//! * the legacy form, a positional JSON array
//!   `[service, from, call_id, args]` with no token or referrer, emitted
//!   when a receiver is flagged as speaking the older protocol.
//!
//! [`decode`] accepts both; [`encode`] picks the form from the envelope's
//! `legacy` flag.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{WireError, WireResult};

/// The unit of wire transfer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Name of the target handler, or a reserved pseudo-service.
    #[serde(rename = "s")]
    pub service: String,

    /// Sender's logical peer id, possibly origin-qualified for siblings.
    #[serde(rename = "f")]
    pub from: String,

    /// Correlation id for the reply; 0 means no reply is expected.
    #[serde(rename = "c", default, skip_serializing_if = "is_zero")]
    pub call_id: u64,

    /// Ordered call arguments.
    #[serde(rename = "a")]
    pub args: Vec<Value>,

    /// Opaque per-peer shared secret. Compared as a string, never coerced.
    #[serde(rename = "t", default, skip_serializing_if = "String::is_empty")]
    pub auth_token: String,

    /// Forces the older positional wire form when set.
    #[serde(rename = "l", default, skip_serializing_if = "is_false")]
    pub legacy: bool,

    /// Best-effort referrer string attached per the configured policy.
    #[serde(rename = "r", default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
}

impl Envelope {
    /// Creates an envelope with no reply expected and no token.
    pub fn new(service: impl Into<String>, from: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            service: service.into(),
            from: from.into(),
            call_id: 0,
            args,
            auth_token: String::new(),
            legacy: false,
            referrer: None,
        }
    }
}

/// Transport-verified sender data.
///
/// Populated exclusively by the receiving side from what the channel itself
/// could verify. Never parsed out of sender-supplied bytes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Provenance {
    /// Origin the channel verified for the sending context, when it can.
    pub origin: Option<String>,
}

impl Provenance {
    /// Provenance from a channel that cannot verify origins.
    pub fn unverified() -> Self {
        Self { origin: None }
    }

    /// Provenance carrying a channel-verified origin.
    pub fn verified(origin: impl Into<String>) -> Self {
        Self {
            origin: Some(origin.into()),
        }
    }
}

fn is_zero(v: &u64) -> bool {
    *v == 0
}

fn is_false(v: &bool) -> bool {
    !*v
}

/// Serializes an envelope to its wire string.
pub fn encode(envelope: &Envelope) -> WireResult<String> {
    let out = if envelope.legacy {
        // Positional form predating token auth; callers on the legacy path
        // cannot carry a token or referrer.
        serde_json::to_string(&(
            &envelope.service,
            &envelope.from,
            envelope.call_id,
            &envelope.args,
        ))
    } else {
        serde_json::to_string(envelope)
    };
    out.map_err(|err| WireError::Malformed(err.to_string()))
}

/// Parses a wire string into an envelope, accepting both wire forms.
pub fn decode(raw: &str) -> WireResult<Envelope> {
    let value: Value =
        serde_json::from_str(raw).map_err(|err| WireError::Malformed(err.to_string()))?;

    match value {
        Value::Object(ref map) => {
            // Surface the missing key by name before handing off to serde;
            // the processor logs these and the key matters for triage.
            for (key, field) in [("s", "service"), ("f", "from"), ("a", "args")] {
                if !map.contains_key(key) {
                    return Err(WireError::MissingField(field));
                }
            }
            if !map["a"].is_array() {
                return Err(WireError::MissingField("args"));
            }
            serde_json::from_value(value).map_err(|err| WireError::Malformed(err.to_string()))
        }
        Value::Array(_) => {
            let (service, from, call_id, args): (String, String, u64, Vec<Value>) =
                serde_json::from_value(value)
                    .map_err(|err| WireError::Malformed(err.to_string()))?;
            Ok(Envelope {
                service,
                from,
                call_id,
                args,
                auth_token: String::new(),
                legacy: true,
                referrer: None,
            })
        }
        _ => Err(WireError::Malformed("expected object or array".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Envelope {
        Envelope {
            service: "resize".into(),
            from: "client7".into(),
            call_id: 3,
            args: vec![json!(320), json!(240)],
            auth_token: "tok-abc".into(),
            legacy: false,
            referrer: Some("https://container.example.com".into()),
        }
    }

    #[test]
    fn modern_form_round_trips() {
        let env = sample();
        let raw = encode(&env).unwrap();
        assert_eq!(decode(&raw).unwrap(), env);
    }

    #[test]
    fn defaults_stay_off_the_wire() {
        let env = Envelope::new("ping", "client1", vec![]);
        let raw = encode(&env).unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        let map = value.as_object().unwrap();
        assert!(map.contains_key("s"));
        assert!(map.contains_key("f"));
        assert!(map.contains_key("a"));
        assert!(!map.contains_key("c"));
        assert!(!map.contains_key("t"));
        assert!(!map.contains_key("l"));
        assert!(!map.contains_key("r"));
    }

    #[test]
    fn legacy_form_is_positional() {
        let mut env = sample();
        env.legacy = true;
        let raw = encode(&env).unwrap();
        assert!(raw.starts_with('['));

        let decoded = decode(&raw).unwrap();
        assert_eq!(decoded.service, env.service);
        assert_eq!(decoded.from, env.from);
        assert_eq!(decoded.call_id, env.call_id);
        assert_eq!(decoded.args, env.args);
        // Token and referrer never survive the legacy form.
        assert!(decoded.auth_token.is_empty());
        assert!(decoded.referrer.is_none());
        assert!(decoded.legacy);
    }

    #[test]
    fn missing_required_keys_are_rejected() {
        assert!(matches!(
            decode(r#"{"f":"g1","a":[]}"#),
            Err(WireError::MissingField("service"))
        ));
        assert!(matches!(
            decode(r#"{"s":"x","a":[]}"#),
            Err(WireError::MissingField("from"))
        ));
        assert!(matches!(
            decode(r#"{"s":"x","f":"g1"}"#),
            Err(WireError::MissingField("args"))
        ));
        assert!(matches!(
            decode(r#"{"s":"x","f":"g1","a":"not-a-list"}"#),
            Err(WireError::MissingField("args"))
        ));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(decode("not json"), Err(WireError::Malformed(_))));
        assert!(matches!(decode("42"), Err(WireError::Malformed(_))));
    }
}
