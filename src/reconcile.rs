//! Find-or-create mapping from an external identity to a local user record.

use crate::{
    database::{is_unique_violation, UserRepository},
    error::AppError,
    models::{ProviderIdentity, User},
};

#[derive(Debug, Clone)]
pub struct IdentityReconciler {
    users: UserRepository,
}

impl IdentityReconciler {
    pub fn new(users: UserRepository) -> Self {
        Self { users }
    }

    /// Returns the record for `identity`, creating it on first sight.
    ///
    /// An existing record is returned as stored; later logins never sync its
    /// fields. When a concurrent first login for the same identity wins the
    /// insert, its record is read back and returned instead.
    pub async fn reconcile(&self, identity: &ProviderIdentity) -> Result<User, AppError> {
        if let Some(existing) = self
            .users
            .find_by_provider_id(identity.provider, &identity.external_id)
            .await?
        {
            tracing::debug!(
                "Found user {} for {} id {}",
                existing.id,
                identity.provider,
                identity.external_id
            );
            return Ok(existing);
        }

        self.create_or_adopt(identity).await
    }

    /// Inserts a record for `identity`, adopting the existing one if another
    /// login inserted it after our lookup.
    async fn create_or_adopt(&self, identity: &ProviderIdentity) -> Result<User, AppError> {
        match self.users.create_user(identity.to_new_user()).await {
            Ok(user) => {
                tracing::info!(
                    "Created user {} for {} id {}",
                    user.id,
                    identity.provider,
                    identity.external_id
                );
                Ok(user)
            }
            Err(e) if is_unique_violation(&e) => {
                tracing::warn!(
                    "Concurrent first login for {} id {}, using existing record",
                    identity.provider,
                    identity.external_id
                );
                self.users
                    .find_by_provider_id(identity.provider, &identity.external_id)
                    .await?
                    .ok_or(e)
            }
            Err(e) => Err(e),
        }
    }
}
