use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    config::ApiConfig,
    domain::MemberId,
    rank::can_modify,
    Result,
};

use super::{
    envelope::{ApiResult, ErrorKind},
    transport::{HttpRequest, HttpResponse, Method, ReqwestTransport, Transport, TransportError},
    types::*,
};

/// Client for the TF System membership API.
///
/// Holds only immutable configuration; every operation returns an
/// [`ApiResult`] and never fails outward.
#[derive(Clone)]
pub struct MembershipClient {
    base_url: String,
    headers: Vec<(String, String)>,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for MembershipClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Headers carry the credential.
        f.debug_struct("MembershipClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl MembershipClient {
    /// Build a client from explicit values with environment fallback.
    pub fn new(api_url: Option<String>, api_key: Option<String>) -> Result<Self> {
        Self::from_config(&ApiConfig::resolve(api_url, api_key)?)
    }

    pub fn from_config(cfg: &ApiConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(cfg.request_timeout)?;
        Ok(Self::with_transport(cfg, Arc::new(transport)))
    }

    pub fn with_transport(cfg: &ApiConfig, transport: Arc<dyn Transport>) -> Self {
        let headers = vec![
            (
                "Authorization".to_string(),
                format!("Bearer {}", cfg.api_key),
            ),
            ("Content-Type".to_string(), "application/json".to_string()),
        ];
        Self {
            base_url: cfg.api_url.trim_end_matches('/').to_string(),
            headers,
            transport,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ============== Request Primitive ==============

    async fn request(
        &self,
        method: Method,
        endpoint: &str,
        query: Vec<(String, String)>,
        body: Option<Value>,
    ) -> ApiResult {
        let req = HttpRequest {
            method,
            url: format!("{}{endpoint}", self.base_url),
            headers: self.headers.clone(),
            query,
            body,
        };
        debug!(method = method.as_str(), endpoint, "tf api request");

        let outcome = self.transport.execute(req).await;
        let result = classify(outcome);
        if let Some(kind) = result.error_kind() {
            match kind {
                ErrorKind::RateLimit | ErrorKind::ConnectionError | ErrorKind::UnknownError => {
                    warn!(endpoint, error = %kind, message = ?result.message, "tf api call failed");
                }
                _ => debug!(endpoint, error = %kind, "tf api returned an error"),
            }
        }
        result
    }

    async fn request_json<B: Serialize>(
        &self,
        method: Method,
        endpoint: &str,
        body: &B,
    ) -> ApiResult {
        match serde_json::to_value(body) {
            Ok(v) => self.request(method, endpoint, Vec::new(), Some(v)).await,
            Err(e) => ApiResult::failure(ErrorKind::UnknownError, format!("Unexpected error: {e}")),
        }
    }

    // ============== System Status ==============

    pub async fn get_status(&self) -> ApiResult {
        self.request(Method::Get, "/status", Vec::new(), None).await
    }

    pub async fn verify_auth(&self) -> ApiResult {
        self.request(Method::Post, "/auth/verify", Vec::new(), None)
            .await
    }

    // ============== Member Management ==============

    /// List active members.
    pub async fn get_members(&self, query: &MemberQuery) -> ApiResult {
        self.request(Method::Get, "/members", query.to_pairs(), None)
            .await
    }

    /// Member details including activities and rank history.
    pub async fn get_member(&self, member_id: MemberId) -> ApiResult {
        self.request(Method::Get, &format!("/members/{member_id}"), Vec::new(), None)
            .await
    }

    pub async fn search_member(&self, name: &str, field: SearchField) -> ApiResult {
        let query = vec![
            ("q".to_string(), name.to_string()),
            ("field".to_string(), field.as_str().to_string()),
        ];
        self.request(Method::Get, "/members/search", query, None)
            .await
    }

    pub async fn change_member_rank(
        &self,
        member_id: MemberId,
        new_rank: &str,
        reason: Option<&str>,
        actor_id: Option<&str>,
    ) -> ApiResult {
        let body = RankChangeBody {
            rank: new_rank,
            reason: reason
                .filter(|r| !r.trim().is_empty())
                .unwrap_or(DEFAULT_RANK_CHANGE_REASON),
            promoted_by: RANK_CHANGE_ATTRIBUTION,
            discord_user_id: actor_id.filter(|a| !a.is_empty()),
        };
        self.request_json(Method::Patch, &format!("/members/{member_id}/rank"), &body)
            .await
    }

    pub async fn add_member(&self, member: &NewMember) -> ApiResult {
        self.request_json(Method::Post, "/members", member).await
    }

    /// Soft delete: the service marks the member inactive.
    pub async fn remove_member(&self, member_id: MemberId, actor_id: Option<&str>) -> ApiResult {
        let body = RemoveMemberBody {
            discord_user_id: actor_id.filter(|a| !a.is_empty()),
        };
        self.request_json(Method::Delete, &format!("/members/{member_id}"), &body)
            .await
    }

    // ============== Ranks ==============

    pub async fn get_ranks(&self) -> ApiResult {
        self.request(Method::Get, "/ranks", Vec::new(), None).await
    }

    // ============== Activity ==============

    pub async fn log_activity(&self, activity: &NewActivity) -> ApiResult {
        self.request(Method::Post, "/activity", Vec::new(), Some(activity.to_body()))
            .await
    }

    pub async fn get_member_activities(&self, member_id: MemberId, limit: u32) -> ApiResult {
        let query = vec![("limit".to_string(), limit.to_string())];
        self.request(
            Method::Get,
            &format!("/members/{member_id}/activities"),
            query,
            None,
        )
        .await
    }

    // ============== Convenience ==============

    /// First member matching `name` on either username field.
    ///
    /// "No match" (including a failed search) is `None`, not an error.
    pub async fn find_member_by_name(&self, name: &str) -> Option<Member> {
        match self.first_match(name).await? {
            Ok(member) => Some(member),
            Err(e) => {
                warn!(name, error = %e, "search match is not a member record");
                None
            }
        }
    }

    async fn first_match(&self, name: &str) -> Option<std::result::Result<Member, String>> {
        let result = self.search_member(name, SearchField::Both).await;
        if !result.success {
            return None;
        }

        let first = result
            .get("matches")
            .and_then(Value::as_array)
            .and_then(|m| m.first())?;

        Some(serde_json::from_value::<Member>(first.clone()).map_err(|e| e.to_string()))
    }

    /// Resolve a member by name, check permissions, then change the rank.
    ///
    /// The mutation is only issued when the member exists and, if `actor_rank`
    /// is given, the actor outranks the member.
    pub async fn change_rank_by_name(
        &self,
        member_name: &str,
        new_rank: &str,
        reason: Option<&str>,
        actor_id: Option<&str>,
        actor_rank: Option<&str>,
    ) -> ApiResult {
        let member = match self.first_match(member_name).await {
            Some(Ok(member)) => member,
            Some(Err(e)) => {
                warn!(name = member_name, error = %e, "search match is not a member record");
                return unexpected(format!(
                    "search match for \"{member_name}\" is not a usable member record: {e}"
                ));
            }
            None => {
                return ApiResult::failure(
                    ErrorKind::MemberNotFound,
                    format!("Could not find member with name \"{member_name}\""),
                );
            }
        };

        // Ranks only: member records carry no id for the member's own account.
        if let Some(actor_rank) = actor_rank.filter(|r| !r.is_empty()) {
            let (allowed, why) = can_modify(actor_rank, &member.current_rank, None, None);
            if !allowed {
                info!(
                    member = member.id,
                    actor_rank,
                    target_rank = %member.current_rank,
                    "rank change denied"
                );
                return ApiResult::failure(ErrorKind::PermissionDenied, why);
            }
        }

        self.change_member_rank(member.member_id(), new_rank, reason, actor_id)
            .await
    }
}

/// Fold a transport outcome into exactly one envelope shape.
fn classify(outcome: std::result::Result<HttpResponse, TransportError>) -> ApiResult {
    let resp = match outcome {
        Ok(resp) => resp,
        Err(TransportError::Connect(cause)) => {
            return ApiResult::failure(
                ErrorKind::ConnectionError,
                format!("Failed to connect to TF System: {cause}"),
            );
        }
        Err(TransportError::Other(cause)) => {
            return unexpected(cause);
        }
    };

    let parsed = serde_json::from_str::<Value>(&resp.body);

    if resp.status == 429 {
        let body = match parsed {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        };
        return ApiResult::rate_limited(body);
    }

    match parsed {
        Ok(v) => ApiResult::from_body(v).unwrap_or_else(unexpected),
        Err(e) => unexpected(format!("invalid JSON response (HTTP {}): {e}", resp.status)),
    }
}

fn unexpected(cause: String) -> ApiResult {
    ApiResult::failure(ErrorKind::UnknownError, format!("Unexpected error: {cause}"))
}
