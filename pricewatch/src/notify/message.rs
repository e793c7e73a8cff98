use serde::{Deserialize, Serialize};

use crate::reconcile::types::PriceObservation;

pub const ALERT_TITLE: &str = "Price dropped below your target!";

/// Provider-agnostic push payload for one device.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushMessage {
    pub token: String,
    pub notification: NotificationBody,
    /// Deep-link data read by the client app.
    pub data: DeepLink,
    pub android: AndroidConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationBody {
    pub title: String,
    pub body: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeepLink {
    pub shop: String,
    pub product_code: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AndroidConfig {
    pub channel_id: String,
    pub image_url: String,
}

impl PushMessage {
    /// Alert for `product` addressed to the device behind `token`.
    pub fn price_alert(product: &PriceObservation, token: &str, channel_id: &str) -> Self {
        Self {
            token: token.to_string(),
            notification: NotificationBody {
                title: ALERT_TITLE.to_string(),
                body: format!(
                    "{} is now {}.",
                    product.product_name,
                    group_thousands(product.product_price)
                ),
            },
            data: DeepLink {
                shop: product.shop.clone(),
                product_code: product.product_code.clone(),
            },
            android: AndroidConfig {
                channel_id: channel_id.to_string(),
                image_url: product.image_url.clone(),
            },
        }
    }
}

/// `1234567` -> `"1,234,567"`.
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn groups_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(12_900), "12,900");
        assert_eq!(group_thousands(1_234_567), "1,234,567");
    }

    #[test]
    fn alert_carries_deep_link_and_image() {
        let obs = PriceObservation {
            product_id: Uuid::new_v4(),
            product_price: 12_900,
            is_sold_out: false,
            product_name: "Ceramic Mug".into(),
            image_url: "https://img/mug.png".into(),
            shop: "SMARTSTORE".into(),
            product_code: "A-17".into(),
        };

        let msg = PushMessage::price_alert(&obs, "tok", "price-alerts");

        assert_eq!(msg.token, "tok");
        assert_eq!(msg.notification.title, ALERT_TITLE);
        assert_eq!(msg.notification.body, "Ceramic Mug is now 12,900.");
        assert_eq!(msg.data.shop, "SMARTSTORE");
        assert_eq!(msg.data.product_code, "A-17");
        assert_eq!(msg.android.image_url, "https://img/mug.png");

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["data"]["productCode"], "A-17");
        assert_eq!(json["android"]["channelId"], "price-alerts");
    }
}
