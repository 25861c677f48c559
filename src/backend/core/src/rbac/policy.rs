//! Per-request authorization gate.
//!
//! A request moves through `Unauthenticated -> TokenChecked -> IdentityResolved`
//! in [`AuthorizationGate::authenticate`], then to `Authorized` or `Denied` in
//! [`AuthorizationGate::authorize`].

use std::sync::Arc;
use tracing::{debug, warn};

use super::evaluator::AccessEvaluator;
use super::models::{AccessDecision, AccessRequirement};
use crate::auth::{AuthError, TokenService};
use crate::error::{HousingError, Result};
use crate::middleware::auth::{bearer_token, Caller};
use crate::observability::metrics;
use crate::store::StoreError;

/// Token check, identity resolution and permission enforcement.
#[derive(Debug, Clone)]
pub struct AuthorizationGate {
    tokens: Arc<TokenService>,
    evaluator: AccessEvaluator,
}

impl AuthorizationGate {
    pub fn new(tokens: Arc<TokenService>, evaluator: AccessEvaluator) -> Self {
        Self { tokens, evaluator }
    }

    pub fn evaluator(&self) -> &AccessEvaluator {
        &self.evaluator
    }

    /// Resolve the caller from an `Authorization` header value.
    ///
    /// The token subject is trusted as the caller without a store lookup.
    pub fn authenticate(&self, authorization: Option<&str>) -> std::result::Result<Caller, AuthError> {
        let result = authorization
            .and_then(bearer_token)
            .ok_or(AuthError::MissingCredentials)
            .and_then(|token| self.tokens.decode_claims(token));

        match result {
            Ok(claims) => {
                debug!(username = %claims.sub, "Caller authenticated");
                Ok(Caller::from_claims(claims))
            }
            Err(e) => {
                debug!(reason = e.reason(), "Authentication failed");
                metrics::record_auth_failure(e.reason());
                Err(e)
            }
        }
    }

    /// Decide whether `caller` meets `requirement`.
    ///
    /// Ownership is compared before any store query.
    pub async fn authorize(
        &self,
        caller: &Caller,
        requirement: &AccessRequirement,
    ) -> std::result::Result<AccessDecision, StoreError> {
        let username = caller.username.as_str();

        let granted = if requirement.owner() == Some(username) {
            true
        } else {
            match requirement {
                AccessRequirement::Authenticated => true,
                AccessRequirement::SelfOrAdminRead { .. } | AccessRequirement::AdminRead => {
                    self.evaluator.is_admin(username).await?
                }
                AccessRequirement::SelfOrAdminWrite { .. } | AccessRequirement::AdminWrite => {
                    self.evaluator.is_admin_write(username).await?
                }
                AccessRequirement::HouseGuardianWrite => {
                    self.evaluator.at_least_house_guardian_write(username).await?
                }
            }
        };

        let decision = if granted {
            AccessDecision::Allow
        } else {
            AccessDecision::Deny(requirement.deny_reason())
        };

        metrics::record_access_decision(decision.label());
        if let AccessDecision::Deny(reason) = decision {
            warn!(
                username = %username,
                requirement = %requirement,
                reason = %reason,
                "Permission denied"
            );
        }

        Ok(decision)
    }

    /// Like [`authorize`](Self::authorize), but a denial becomes an error.
    pub async fn enforce(&self, caller: &Caller, requirement: &AccessRequirement) -> Result<()> {
        match self.authorize(caller, requirement).await? {
            AccessDecision::Allow => Ok(()),
            AccessDecision::Deny(reason) => Err(HousingError::permission_denied(
                &caller.username,
                reason.to_string(),
            )),
        }
    }

    /// Authenticate and enforce in one step.
    pub async fn admit(
        &self,
        authorization: Option<&str>,
        requirement: &AccessRequirement,
    ) -> Result<Caller> {
        let caller = self.authenticate(authorization)?;
        self.enforce(&caller, requirement).await?;
        Ok(caller)
    }
}
