use super::{AuthError, AuthUser};
use crate::errors::ServiceError;
use serde::Deserialize;
use utoipa::IntoParams;

/// Site selection sent by the client, either `site_id=7` or `site_ids=7,9`.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct SiteParams {
    pub site_id: Option<i32>,
    /// Comma separated list of site ids
    pub site_ids: Option<String>,
}

impl SiteParams {
    pub fn requested(&self) -> Result<Vec<i32>, ServiceError> {
        let mut ids: Vec<i32> = self.site_id.into_iter().collect();
        if let Some(list) = &self.site_ids {
            for part in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                let id = part.parse::<i32>().map_err(|_| {
                    ServiceError::ValidationError(format!("Invalid site id '{part}'"))
                })?;
                ids.push(id);
            }
        }
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }
}

/// The sites a request is allowed to read or write.
///
/// Always non-empty and always a subset of the caller's assigned sites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteScope {
    site_ids: Vec<i32>,
}

impl SiteScope {
    /// Intersects the requested sites with the user's assignments.
    ///
    /// No request means every assigned site.
    pub fn resolve(user: &AuthUser, requested: &[i32]) -> Result<Self, AuthError> {
        let site_ids: Vec<i32> = if requested.is_empty() {
            user.site_ids.clone()
        } else {
            requested
                .iter()
                .copied()
                .filter(|id| user.site_ids.contains(id))
                .collect()
        };

        if site_ids.is_empty() {
            tracing::warn!(user_id = user.user_id, ?requested, "site access denied");
            return Err(AuthError::SiteAccessDenied);
        }

        Ok(Self { site_ids })
    }

    pub fn from_params(user: &AuthUser, params: &SiteParams) -> Result<Self, ServiceError> {
        let requested = params.requested()?;
        Ok(Self::resolve(user, &requested)?)
    }

    pub fn site_ids(&self) -> &[i32] {
        &self.site_ids
    }

    /// The single site a write targets. Ambiguous scopes are rejected.
    pub fn single(&self) -> Result<i32, ServiceError> {
        match self.site_ids.as_slice() {
            [only] => Ok(*only),
            _ => Err(ServiceError::ValidationError(
                "A single site_id is required for this operation".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn user_with_sites(sites: &[i32]) -> AuthUser {
        AuthUser {
            user_id: 1,
            display_name: "Test".into(),
            role: "user".into(),
            site_ids: sites.to_vec(),
            token_id: "jti".into(),
            expires_at: 0,
        }
    }

    #[test]
    fn no_request_uses_all_assigned_sites() {
        let scope = SiteScope::resolve(&user_with_sites(&[3, 7]), &[]).unwrap();
        assert_eq!(scope.site_ids(), &[3, 7]);
    }

    #[test]
    fn request_is_intersected_with_assignments() {
        let scope = SiteScope::resolve(&user_with_sites(&[3, 7]), &[7, 9]).unwrap();
        assert_eq!(scope.site_ids(), &[7]);
        assert_eq!(scope.single().unwrap(), 7);
    }

    #[test]
    fn foreign_site_is_forbidden() {
        let result = SiteScope::resolve(&user_with_sites(&[3]), &[9]);
        assert_matches!(result, Err(AuthError::SiteAccessDenied));
    }

    #[test]
    fn user_without_sites_is_forbidden() {
        assert_matches!(
            SiteScope::resolve(&user_with_sites(&[]), &[]),
            Err(AuthError::SiteAccessDenied)
        );
    }

    #[test]
    fn single_requires_exactly_one_site() {
        let scope = SiteScope::resolve(&user_with_sites(&[3, 7]), &[]).unwrap();
        assert_matches!(scope.single(), Err(ServiceError::ValidationError(_)));
    }

    #[test]
    fn parses_site_id_lists() {
        let params = SiteParams {
            site_id: Some(4),
            site_ids: Some("7, 4,9".into()),
        };
        assert_eq!(params.requested().unwrap(), vec![4, 7, 9]);

        let bad = SiteParams {
            site_id: None,
            site_ids: Some("7,x".into()),
        };
        assert_matches!(bad.requested(), Err(ServiceError::ValidationError(_)));
    }
}
