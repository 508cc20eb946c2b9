//! Last-resort polling adapter.
//!
//! Each payload is percent-encoded into the fragment of a URL addressed at
//! the target's relay resource (falling back to its origin) and queued on
//! the target's poll queue. The receiving side's [`Channel::tick`] drains
//! its own queue, decodes, and forwards to the inbound queue. Nothing about
//! the mechanism can verify who wrote the URL.

use log::warn;
use rpc_wire::Provenance;

use crate::channel::{
    Channel, ChannelWiring, InboundMessage, LocalContext, SendOutcome, SetupOutcome, TransportKind,
};
use crate::error::ChannelResult;
use crate::fabric::ContextFabric;

/// Poll payloads drained per tick. The queue survives across ticks, so a
/// small budget only delays delivery, never loses it.
const POLL_BUDGET: usize = 32;

pub struct PollingChannel {
    fabric: ContextFabric,
    local: LocalContext,
    wiring: Option<ChannelWiring>,
}

impl PollingChannel {
    pub fn new(fabric: ContextFabric, local: LocalContext) -> Self {
        Self {
            fabric,
            local,
            wiring: None,
        }
    }
}

impl Channel for PollingChannel {
    fn kind(&self) -> TransportKind {
        TransportKind::Polling
    }

    fn init(&mut self, wiring: ChannelWiring) -> ChannelResult<()> {
        self.wiring = Some(wiring);
        Ok(())
    }

    fn setup(&mut self, receiver_id: &str, _token: &str) -> SetupOutcome {
        if self.fabric.contains(receiver_id) {
            SetupOutcome::Ready
        } else {
            SetupOutcome::TargetMissing
        }
    }

    fn call(&mut self, target: &str, _from: &str, raw: &str) -> SendOutcome {
        let base = match self
            .fabric
            .relay_of(target)
            .or_else(|| self.fabric.origin_of(target))
        {
            Some(base) => base,
            None => {
                warn!("polling send to {target} failed: unknown context");
                return SendOutcome::Failed;
            }
        };
        let url = format!("{base}#{}", encode_fragment(raw));
        match self.fabric.push_poll(target, url) {
            Ok(()) => SendOutcome::Sent,
            Err(err) => {
                warn!("polling send to {target} failed: {err}");
                SendOutcome::Failed
            }
        }
    }

    fn tick(&mut self) {
        let Some(wiring) = self.wiring.clone() else {
            return;
        };
        for url in self.fabric.drain_poll(&self.local.id, POLL_BUDGET) {
            match decode_poll_url(&url) {
                Some(raw) => {
                    let _ = wiring.inbound.send(InboundMessage {
                        raw,
                        provenance: Provenance::unverified(),
                    });
                }
                None => warn!("discarding undecodable poll url: {url}"),
            }
        }
    }
}

/// Percent-encodes a payload for transport inside a URL fragment.
pub fn encode_fragment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => {
                out.push('%');
                out.push_str(&format!("{byte:02X}"));
            }
        }
    }
    out
}

/// Reverses [`encode_fragment`]. Returns `None` on truncated escapes or
/// invalid UTF-8.
pub fn decode_fragment(fragment: &str) -> Option<String> {
    let bytes = fragment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes.get(i + 1..i + 3)?;
            let hex = std::str::from_utf8(hex).ok()?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

fn decode_poll_url(url: &str) -> Option<String> {
    let (_, fragment) = url.split_once('#')?;
    decode_fragment(fragment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_codec_round_trips() {
        let raw = r#"{"s":"echo","f":"g1","a":["hi there / 100%"]}"#;
        let encoded = encode_fragment(raw);
        assert!(!encoded.contains('#'));
        assert!(!encoded.contains('"'));
        assert_eq!(decode_fragment(&encoded).as_deref(), Some(raw));
    }

    #[test]
    fn truncated_escape_is_rejected() {
        assert_eq!(decode_fragment("abc%2"), None);
        assert_eq!(decode_fragment("%GG"), None);
    }
}
