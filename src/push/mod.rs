// 推送组装与发送
// 按通知类型组装提供商载荷；发送失败只记录日志

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};

use crate::config::Config;
use crate::gateways::GatewayError;

/// 推送通知类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum PushNotificationType {
    NewAreasActivated,
    ProximityRequiredMoment,
    ProximityRequiredSpace,
    NudgeSpaceEngagement,
}

impl PushNotificationType {
    pub fn wire_name(&self) -> &'static str {
        match self {
            PushNotificationType::NewAreasActivated => "new-areas-activated",
            PushNotificationType::ProximityRequiredMoment => "proximity-required-moment",
            PushNotificationType::ProximityRequiredSpace => "proximity-required-space",
            PushNotificationType::NudgeSpaceEngagement => "nudge-space-engagement",
        }
    }

    /// 同类推送折叠，设备端只保留最新一条
    fn collapse_key(&self) -> &'static str {
        match self {
            PushNotificationType::NewAreasActivated => "areas-activated",
            PushNotificationType::ProximityRequiredMoment
            | PushNotificationType::ProximityRequiredSpace => "proximity-required",
            PushNotificationType::NudgeSpaceEngagement => "space-engagement",
        }
    }

    fn message_locale_key(&self) -> &'static str {
        match self {
            PushNotificationType::NewAreasActivated => "push.newAreasActivated",
            PushNotificationType::ProximityRequiredMoment => "push.proximityRequiredMoment",
            PushNotificationType::ProximityRequiredSpace => "push.proximityRequiredSpace",
            PushNotificationType::NudgeSpaceEngagement => "push.nudgeSpaceEngagement",
        }
    }
}

/// 组装推送所需的用户上下文
#[derive(Debug, Clone)]
pub struct PushMessageConfig {
    pub device_token: String,
    pub user_id: String,
    pub locale: String,
    pub total_areas_activated: Option<usize>,
}

/// 组装完成、可直接投递的消息
#[derive(Debug, Clone)]
pub struct PushMessage {
    pub device_token: String,
    pub collapse_key: &'static str,
    pub data: Value,
}

/// 按类型组装载荷；没有设备令牌时不产生消息
pub fn compose_message(
    notification_type: PushNotificationType,
    payload: Value,
    config: &PushMessageConfig,
) -> Option<PushMessage> {
    if config.device_token.is_empty() {
        tracing::debug!(
            user_id = %config.user_id,
            push_type = notification_type.wire_name(),
            "无设备令牌，跳过推送"
        );
        return None;
    }

    let mut data = json!({
        "type": notification_type.wire_name(),
        "userId": config.user_id,
        "locale": config.locale,
        "messageLocaleKey": notification_type.message_locale_key(),
        "timestampMs": Utc::now().timestamp_millis(),
        "payload": payload,
    });
    if let Some(total) = config.total_areas_activated {
        data["totalAreasActivated"] = json!(total);
    }

    Some(PushMessage {
        device_token: config.device_token.clone(),
        collapse_key: notification_type.collapse_key(),
        data,
    })
}

/// 推送投递接口，测试用内存假实现替换
#[async_trait]
pub trait PushSender: Send + Sync {
    async fn send(&self, message: PushMessage) -> Result<(), GatewayError>;
}

/// 经由FCM风格HTTP网关的投递实现
pub struct FcmPushSender {
    client: reqwest::Client,
    config: Config,
}

impl FcmPushSender {
    pub fn new(client: reqwest::Client, config: Config) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl PushSender for FcmPushSender {
    async fn send(&self, message: PushMessage) -> Result<(), GatewayError> {
        let body = json!({
            "to": message.device_token,
            "collapseKey": message.collapse_key,
            "data": message.data,
        });

        let response = self
            .client
            .post(&self.config.push_gateway_url)
            .header("authorization", format!("key={}", self.config.push_gateway_key))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GatewayError::Status(response.status()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(token: &str) -> PushMessageConfig {
        PushMessageConfig {
            device_token: token.into(),
            user_id: "user-1".into(),
            locale: "en-us".into(),
            total_areas_activated: Some(3),
        }
    }

    #[test]
    fn compose_skips_when_device_token_missing() {
        let message = compose_message(
            PushNotificationType::NewAreasActivated,
            json!({}),
            &config(""),
        );
        assert!(message.is_none());
    }

    #[test]
    fn compose_embeds_type_and_payload() {
        let message = compose_message(
            PushNotificationType::NudgeSpaceEngagement,
            json!({"spaceId": "s1"}),
            &config("token-1"),
        )
        .expect("should compose");

        assert_eq!(message.device_token, "token-1");
        assert_eq!(message.collapse_key, "space-engagement");
        assert_eq!(message.data["type"], "nudge-space-engagement");
        assert_eq!(message.data["payload"]["spaceId"], "s1");
        assert_eq!(message.data["totalAreasActivated"], 3);
    }
}
