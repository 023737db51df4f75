use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::config::Config;
use crate::gateways::{
    CreateNotificationRequest, GatewayError, SpaceMetricName, UpstreamGateway,
};
use crate::location::constants::AREA_SEARCH_ITEMS_PER_PAGE;
use crate::middleware::RequestContext;
use crate::models::{ActivationRecord, Area, AreaKind, GeoPoint, UserLocationRecord};

#[derive(Debug, Deserialize)]
struct SearchAreasResponse {
    #[serde(default)]
    results: Vec<Area>,
}

#[derive(Debug, Deserialize)]
struct FindReactionsResponse {
    #[serde(default)]
    reactions: Vec<ActivationRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserLocationsResponse {
    #[serde(default)]
    user_locations: Vec<UserLocationRecord>,
}

/// 经由reqwest的网关实现
/// 共享一个带超时的client；超时即按上游不可用处理，本层不做重试
pub struct HttpUpstreamGateway {
    client: reqwest::Client,
    config: Config,
}

impl HttpUpstreamGateway {
    pub fn new(client: reqwest::Client, config: Config) -> Self {
        Self { client, config }
    }

    fn with_context_headers(
        &self,
        request: reqwest::RequestBuilder,
        ctx: &RequestContext,
    ) -> reqwest::RequestBuilder {
        request
            .header("authorization", &ctx.authorization)
            .header("x-localecode", &ctx.locale)
            .header("x-userid", &ctx.user_id)
    }

    async fn expect_success(response: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
        if !response.status().is_success() {
            return Err(GatewayError::Status(response.status()));
        }
        Ok(response)
    }
}

#[async_trait]
impl UpstreamGateway for HttpUpstreamGateway {
    async fn search_areas(
        &self,
        ctx: &RequestContext,
        kind: AreaKind,
        location: &GeoPoint,
        distance_override_meters: f64,
    ) -> Result<Vec<Area>, GatewayError> {
        let url = format!(
            "{}/{}/search",
            self.config.maps_service_route,
            kind.plural()
        );
        let request = self
            .client
            .post(&url)
            .query(&[
                ("query", "connections".to_string()),
                ("itemsPerPage", AREA_SEARCH_ITEMS_PER_PAGE.to_string()),
                ("pageNumber", "1".to_string()),
                ("order", "desc".to_string()),
                ("filterBy", "fromUserIds".to_string()),
                ("latitude", location.latitude.to_string()),
                ("longitude", location.longitude.to_string()),
            ])
            .json(&json!({ "distanceOverride": distance_override_meters }));

        let response = self.with_context_headers(request, ctx).send().await?;
        let body: SearchAreasResponse = Self::expect_success(response).await?.json().await?;
        Ok(body.results)
    }

    async fn find_reactions(
        &self,
        ctx: &RequestContext,
        kind: AreaKind,
        area_ids: &[String],
    ) -> Result<Vec<ActivationRecord>, GatewayError> {
        let url = format!(
            "{}/{}-reactions/find/dynamic",
            self.config.reactions_service_route,
            kind.singular()
        );
        let mut body = json!({ "limit": area_ids.len() });
        body[kind.reaction_ids_field()] = json!(area_ids);

        let request = self.client.post(&url).json(&body);
        let response = self.with_context_headers(request, ctx).send().await?;
        let body: FindReactionsResponse = Self::expect_success(response).await?.json().await?;
        Ok(body.reactions)
    }

    async fn create_activation_reactions(
        &self,
        ctx: &RequestContext,
        kind: AreaKind,
        area_ids: &[String],
    ) -> Result<(), GatewayError> {
        let url = format!(
            "{}/{}-reactions/create-update/multiple",
            self.config.reactions_service_route,
            kind.singular()
        );
        let mut body = json!({ "userHasActivated": true });
        body[kind.reaction_ids_field()] = json!(area_ids);

        let request = self.client.post(&url).json(&body);
        let response = self.with_context_headers(request, ctx).send().await?;
        Self::expect_success(response).await?;
        Ok(())
    }

    async fn update_achievements(
        &self,
        ctx: &RequestContext,
        achievement_class: &str,
        achievement_tier: &str,
        progress_count: usize,
    ) -> Result<(), GatewayError> {
        let url = format!("{}/users/achievements", self.config.users_service_route);
        let request = self.client.post(&url).json(&json!({
            "achievementClass": achievement_class,
            "achievementTier": achievement_tier,
            "progressCount": progress_count,
        }));
        let response = self.with_context_headers(request, ctx).send().await?;
        Self::expect_success(response).await?;
        Ok(())
    }

    async fn create_notification(
        &self,
        ctx: &RequestContext,
        notification: CreateNotificationRequest,
    ) -> Result<Value, GatewayError> {
        let url = format!("{}/users/notifications", self.config.users_service_route);
        let request = self.client.post(&url).json(&notification);
        let response = self.with_context_headers(request, ctx).send().await?;
        let body = Self::expect_success(response).await?.json().await?;
        Ok(body)
    }

    async fn send_space_metric(
        &self,
        ctx: &RequestContext,
        name: SpaceMetricName,
        space_ids: &[String],
        location: &GeoPoint,
    ) -> Result<(), GatewayError> {
        let url = format!("{}/space-metrics", self.config.maps_service_route);
        let request = self.client.post(&url).json(&json!({
            "name": name.wire_name(),
            "spaceIds": space_ids,
            "value": "1",
            "valueType": "number",
            "latitude": location.latitude,
            "longitude": location.longitude,
        }));
        let response = self.with_context_headers(request, ctx).send().await?;
        Self::expect_success(response).await?;
        Ok(())
    }

    async fn update_last_known_location(
        &self,
        ctx: &RequestContext,
        location: &GeoPoint,
    ) -> Result<(), GatewayError> {
        let url = format!(
            "{}/users/{}/location",
            self.config.users_service_route, ctx.user_id
        );
        let request = self.client.put(&url).json(&json!({
            "latitude": location.latitude,
            "longitude": location.longitude,
        }));
        let response = self.with_context_headers(request, ctx).send().await?;
        Self::expect_success(response).await?;
        Ok(())
    }

    async fn get_user_locations(
        &self,
        ctx: &RequestContext,
    ) -> Result<Vec<UserLocationRecord>, GatewayError> {
        let url = format!(
            "{}/users/{}/locations",
            self.config.users_service_route, ctx.user_id
        );
        let request = self.client.get(&url);
        let response = self.with_context_headers(request, ctx).send().await?;
        let body: UserLocationsResponse = Self::expect_success(response).await?.json().await?;
        Ok(body.user_locations)
    }

    async fn mark_check_in_push_sent(
        &self,
        ctx: &RequestContext,
        location_id: &str,
        sent_at_ms: i64,
    ) -> Result<(), GatewayError> {
        let url = format!(
            "{}/users/{}/locations/{}",
            self.config.users_service_route, ctx.user_id, location_id
        );
        let request = self.client.put(&url).json(&json!({
            "lastPushNotificationSentMs": sent_at_ms,
        }));
        let response = self.with_context_headers(request, ctx).send().await?;
        Self::expect_success(response).await?;
        Ok(())
    }
}
