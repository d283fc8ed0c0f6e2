use std::sync::Arc;

use bribebank_shared::api::PushPayload;
use tracing::{info, trace, warn};
use web_push::{
    ContentEncoding, HyperWebPushClient, SubscriptionInfo, VapidSignatureBuilder, WebPushClient,
    WebPushError, WebPushMessageBuilder,
};

use crate::storage::{Store, models::PushSubscription};

use super::config::AppConfig;

/// Best-effort Web Push delivery. Every failure is logged and swallowed.
#[derive(Clone)]
pub struct PushService {
    inner: Arc<PushServiceInner>,
}

struct PushServiceInner {
    client: HyperWebPushClient,
    vapid_private: String,
    contact: Option<String>,
    default_url: String,
}

impl PushService {
    pub fn from_config(cfg: &AppConfig) -> Option<Self> {
        let push_cfg = cfg.push.as_ref()?;
        if !push_cfg.enabled {
            return None;
        }
        let vapid_private = push_cfg
            .vapid_private
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string();
        if cfg.vapid_public_key().is_none() || vapid_private.is_empty() {
            warn!("push: missing VAPID key(s); disabling push service");
            return None;
        }

        Some(Self {
            inner: Arc::new(PushServiceInner {
                client: HyperWebPushClient::new(),
                vapid_private,
                contact: push_cfg.contact_email.clone(),
                default_url: push_cfg.default_url.clone(),
            }),
        })
    }

    /// Sends `payload` to every device registered by `user_ids`, each
    /// subscription in its own task.
    pub fn send_to_users(&self, store: Store, user_ids: Vec<String>, mut payload: PushPayload) {
        if payload.url.is_none() {
            payload.url = Some(self.inner.default_url.clone());
        }
        let inner = self.inner.clone();
        tokio::spawn(async move {
            let subs = match store.list_push_subscriptions_for_users(&user_ids).await {
                Ok(s) => s,
                Err(e) => {
                    warn!(error = %e, "push: failed to list subscriptions");
                    return;
                }
            };
            if subs.is_empty() {
                trace!(kind = %payload.kind, "push: no subscriptions for recipients");
                return;
            }
            let body = match serde_json::to_vec(&payload) {
                Ok(b) => Arc::new(b),
                Err(e) => {
                    warn!(error = %e, "push: failed to encode payload");
                    return;
                }
            };
            for sub in subs {
                let inner = inner.clone();
                let store = store.clone();
                let body = body.clone();
                tokio::spawn(async move {
                    if let Err(err) = inner.send_single(store, sub, body).await {
                        warn!(error = %err, "push: send attempt failed");
                    }
                });
            }
        });
    }
}

impl PushServiceInner {
    async fn send_single(
        &self,
        store: Store,
        subscription: PushSubscription,
        payload: Arc<Vec<u8>>,
    ) -> Result<(), String> {
        let endpoint = subscription.endpoint.clone();

        let subscription_info = SubscriptionInfo::new(
            subscription.endpoint.clone(),
            subscription.p256dh.clone(),
            subscription.auth.clone(),
        );

        let mut builder = WebPushMessageBuilder::new(&subscription_info);
        builder.set_payload(ContentEncoding::Aes128Gcm, payload.as_ref());

        let mut vapid = VapidSignatureBuilder::from_base64(&self.vapid_private, &subscription_info)
            .map_err(|e| e.to_string())?;
        if let Some(contact) = &self.contact {
            vapid.add_claim("sub", contact.clone());
        }
        let signature = vapid.build().map_err(|e| e.to_string())?;
        builder.set_vapid_signature(signature);

        match self
            .client
            .send(builder.build().map_err(|e| e.to_string())?)
            .await
        {
            Ok(()) => {
                info!(user_id = %subscription.user_id, "push: delivered");
                if let Err(e) = store
                    .mark_push_delivery_result(subscription.id, true, None)
                    .await
                {
                    warn!(endpoint = %endpoint, error = %e, "push: failed to mark success");
                }
                Ok(())
            }
            Err(err) => {
                let err_str = err.to_string();
                warn!(endpoint = %endpoint, error = %err_str, "push: send failed");

                if matches!(
                    err,
                    WebPushError::EndpointNotFound(_) | WebPushError::EndpointNotValid(_)
                ) {
                    match store.prune_push_subscription(subscription.id).await {
                        Ok(()) => info!(endpoint = %endpoint, "push: pruned stale subscription"),
                        Err(e) => warn!(
                            endpoint = %endpoint,
                            error = %e,
                            "push: failed to remove stale subscription"
                        ),
                    }
                } else if let Err(e) = store
                    .mark_push_delivery_result(subscription.id, false, Some(&err_str))
                    .await
                {
                    warn!(endpoint = %endpoint, error = %e, "push: failed to mark error");
                }

                Err(err_str)
            }
        }
    }
}
