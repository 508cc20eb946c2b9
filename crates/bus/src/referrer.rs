//! Referrer-passing policy.
//!
//! Configured as a `"direction:contents"` string, e.g. `"p2c:query"`. The
//! direction gates which way a referrer may flow; the contents decide how
//! much of the local address is disclosed.

use std::str::FromStr;

use rpc_channel::LocalContext;

use crate::error::BusError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReferrerDirection {
    /// Never attach a referrer.
    #[default]
    None,
    /// Container to client only.
    ParentToChild,
    /// Client to container only.
    ChildToParent,
    /// Both ways, including sibling calls.
    Bidirectional,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReferrerContents {
    /// Origin only.
    #[default]
    Origin,
    /// Full address up to, but excluding, the fragment.
    Query,
    /// Full address including the fragment.
    Hash,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReferrerPolicy {
    pub direction: ReferrerDirection,
    pub contents: ReferrerContents,
}

impl FromStr for ReferrerPolicy {
    type Err = BusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (direction, contents) = s
            .split_once(':')
            .ok_or_else(|| BusError::InvalidReferrerPolicy(s.to_string()))?;
        let direction = match direction {
            "none" => ReferrerDirection::None,
            "p2c" => ReferrerDirection::ParentToChild,
            "c2p" => ReferrerDirection::ChildToParent,
            "bidir" => ReferrerDirection::Bidirectional,
            _ => return Err(BusError::InvalidReferrerPolicy(s.to_string())),
        };
        let contents = match contents {
            "origin" => ReferrerContents::Origin,
            "query" => ReferrerContents::Query,
            "hash" => ReferrerContents::Hash,
            _ => return Err(BusError::InvalidReferrerPolicy(s.to_string())),
        };
        Ok(Self { direction, contents })
    }
}

impl ReferrerPolicy {
    /// Computes the referrer for one outbound call, or `None` when the
    /// direction forbids it.
    pub(crate) fn referrer_for(
        &self,
        local: &LocalContext,
        sender_is_container: bool,
        target_is_parent: bool,
    ) -> Option<String> {
        let allowed = match self.direction {
            ReferrerDirection::None => false,
            ReferrerDirection::ParentToChild => sender_is_container,
            ReferrerDirection::ChildToParent => !sender_is_container && target_is_parent,
            ReferrerDirection::Bidirectional => true,
        };
        if !allowed {
            return None;
        }
        let value = match self.contents {
            ReferrerContents::Origin => local.origin.clone(),
            ReferrerContents::Query => local
                .url
                .split_once('#')
                .map(|(base, _)| base.to_string())
                .unwrap_or_else(|| local.url.clone()),
            ReferrerContents::Hash => local.url.clone(),
        };
        Some(value)
    }
}
