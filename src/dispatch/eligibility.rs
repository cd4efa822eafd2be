//! Signing path selection.

use serde::Serialize;

use crate::state::SessionState;
use crate::transaction::Action;

/// Where a transaction gets signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SigningPath {
    /// Signed with the session's cached limited-access key.
    Local,
    /// Delegated to the wallet surface.
    Relay,
}

impl SigningPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            SigningPath::Local => "local",
            SigningPath::Relay => "relay",
        }
    }
}

/// Pick the signing path for a batch.
///
/// Local signing requires all of:
/// 1. a cached private key,
/// 2. `receiver_id` equal to the contract the key is scoped to,
/// 3. only actions a limited-access key may authorize,
/// 4. no attached deposit.
pub fn select_path(session: &SessionState, receiver_id: &str, actions: &[Action]) -> SigningPath {
    let has_key = session.private_key.is_some();
    let scoped_here = session.access_key_contract_id.as_deref() == Some(receiver_id);
    let permitted = actions.iter().all(Action::is_limited_key_safe);
    let no_deposit = actions.iter().all(|a| a.deposit() == 0);

    if has_key && scoped_here && permitted && no_deposit {
        SigningPath::Local
    } else {
        SigningPath::Relay
    }
}
