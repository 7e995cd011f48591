use crate::error::{Error, Result};
use crate::store::Store;

/// The authenticated identity behind a request, with its GM flag resolved once.
///
/// Every entity operation on [`Store`] takes a `Caller`; row-level predicates
/// are evaluated against it inside each query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    user_id: String,
    is_gm: bool,
}

impl Caller {
    /// Looks up the GM flag for an identity the auth provider already vouched for.
    /// Identities without a user row are rejected.
    pub fn resolve(store: &dyn Store, user_id: &str) -> Result<Self> {
        let is_gm = store.lookup_is_gm(user_id)?.ok_or(Error::Unauthorized)?;
        Ok(Self {
            user_id: user_id.to_string(),
            is_gm,
        })
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    #[must_use]
    pub fn is_gm(&self) -> bool {
        self.is_gm
    }

    pub(crate) fn require_gm(&self) -> Result<()> {
        if self.is_gm {
            Ok(())
        } else {
            Err(Error::Forbidden)
        }
    }
}
