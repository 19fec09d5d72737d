//! Transaction correlation ids.
//!
//! A correlation id groups the mutations of one logical unit of work. Clients
//! send it as a request parameter; only the canonical hyphenated form
//! (`8-4-4-4-12` hex digits) is accepted. Anything else, including braced or
//! URN forms that `Uuid::parse_str` would take, means "no correlation".

use std::sync::{PoisonError, RwLock};

use uuid::Uuid;

use crate::context::CorrelationProvider;

/// Length of `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx`.
const CANONICAL_LEN: usize = 36;
const HYPHEN_POSITIONS: [usize; 4] = [8, 13, 18, 23];

/// Parse a raw `transaction` request parameter.
///
/// Returns `None` for a missing parameter or anything that is not a
/// canonical hyphenated UUID.
#[must_use]
pub fn parse_transaction_param(raw: Option<&str>) -> Option<Uuid> {
    let raw = raw?;
    if raw.len() != CANONICAL_LEN {
        return None;
    }
    let well_formed = raw.char_indices().all(|(i, c)| {
        if HYPHEN_POSITIONS.contains(&i) {
            c == '-'
        } else {
            c.is_ascii_hexdigit()
        }
    });
    if !well_formed {
        return None;
    }
    Uuid::parse_str(raw).ok()
}

/// Settable correlation provider.
///
/// A request handler stores the parsed id at the start of a unit of work and
/// clears it at the end; the engine reads it through `CorrelationProvider`.
#[derive(Debug, Default)]
pub struct CorrelationSlot {
    current: RwLock<Option<Uuid>>,
}

impl CorrelationSlot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the active correlation id.
    pub fn set(&self, transaction_id: Option<Uuid>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = transaction_id;
    }

    /// Set the id from a raw request parameter. Returns the parsed value.
    pub fn set_from_param(&self, raw: Option<&str>) -> Option<Uuid> {
        let parsed = parse_transaction_param(raw);
        self.set(parsed);
        parsed
    }

    pub fn clear(&self) {
        self.set(None);
    }
}

impl CorrelationProvider for CorrelationSlot {
    fn current_transaction_id(&self) -> Option<Uuid> {
        *self.current.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "3a37e67d-a8b2-4c35-9e6f-a4e4b686ffb5";

    #[test]
    fn parses_canonical_form() {
        let parsed = parse_transaction_param(Some(ID)).unwrap();
        assert_eq!(parsed.to_string(), ID);
    }

    #[test]
    fn accepts_uppercase_hex() {
        let upper = ID.to_uppercase();
        assert!(parse_transaction_param(Some(&upper)).is_some());
    }

    #[test]
    fn rejects_non_canonical_forms() {
        assert_eq!(parse_transaction_param(None), None);
        assert_eq!(parse_transaction_param(Some("")), None);
        assert_eq!(parse_transaction_param(Some("not-a-uuid")), None);
        assert_eq!(
            parse_transaction_param(Some("3a37e67da8b24c359e6fa4e4b686ffb5")),
            None
        );
        assert_eq!(
            parse_transaction_param(Some("{3a37e67d-a8b2-4c35-9e6f-a4e4b686ffb5}")),
            None
        );
        assert_eq!(
            parse_transaction_param(Some("3a37e67d-a8b2-4c35-9e6f-a4e4b686ffbz")),
            None
        );
    }

    #[test]
    fn slot_roundtrip() {
        let slot = CorrelationSlot::new();
        assert_eq!(slot.current_transaction_id(), None);

        let parsed = slot.set_from_param(Some(ID));
        assert_eq!(slot.current_transaction_id(), parsed);
        assert!(parsed.is_some());

        slot.set_from_param(Some("garbage"));
        assert_eq!(slot.current_transaction_id(), None);

        slot.set(parsed);
        slot.clear();
        assert_eq!(slot.current_transaction_id(), None);
    }
}
