//! Notification ports and message formatting.
//!
//! The watchers build a [`Notification`] and hand it to a
//! [`NotificationSink`]; owners of auction filters are looked up through a
//! [`UserRegistry`]. Both are implemented for Telegram in [`crate::telegram`].

use crate::db::Subscriber;
use async_trait::async_trait;
use librebot_core::{format_price, Currency, DailyChallenge, FilterCriteria, Listing};
use teloxide::utils::html::escape;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Notification target {0} is not reachable")]
    Unavailable(i64),
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// A user that can be mentioned in a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub user_id: i64,
    pub display_name: String,
}

impl Recipient {
    pub fn new(user_id: i64, display_name: impl Into<String>) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
        }
    }

    /// HTML mention that pings the user.
    pub fn mention_html(&self) -> String {
        format!(
            "<a href=\"tg://user?id={}\">{}</a>",
            self.user_id,
            escape(&self.display_name)
        )
    }
}

impl From<&Subscriber> for Recipient {
    fn from(subscriber: &Subscriber) -> Self {
        Recipient::new(subscriber.user_id, subscriber.display_name.clone())
    }
}

/// A matched listing together with the filter that matched it.
#[derive(Debug, Clone, PartialEq)]
pub struct AuctionAlert {
    pub filter_id: i64,
    pub listing: Listing,
    pub currency: Currency,
    pub vat_percentage: u8,
    /// Listing price including the filter's VAT
    pub price_inclusive: f64,
    pub criteria: FilterCriteria,
}

/// Structured part of a notification.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationPayload {
    AuctionMatch(AuctionAlert),
    DailyChallenge(DailyChallenge),
}

/// A message for the notification sink: a short content line with mentions
/// plus a structured payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub content: String,
    pub payload: NotificationPayload,
}

impl Notification {
    pub fn auction_match(recipient: &Recipient, alert: AuctionAlert) -> Self {
        Self {
            content: format!(
                "{}, a server matching your criteria is available!",
                recipient.mention_html()
            ),
            payload: NotificationPayload::AuctionMatch(alert),
        }
    }

    pub fn daily_challenge(subscribers: &[Recipient], challenge: DailyChallenge) -> Self {
        let content = if subscribers.is_empty() {
            "A new LeetCode daily challenge is up!".to_string()
        } else {
            let mentions: Vec<String> = subscribers.iter().map(Recipient::mention_html).collect();
            format!("{}, a new daily challenge is up!", mentions.join(" "))
        };
        Self {
            content,
            payload: NotificationPayload::DailyChallenge(challenge),
        }
    }

    /// Full message body in Telegram HTML.
    pub fn to_html(&self) -> String {
        let body = match &self.payload {
            NotificationPayload::AuctionMatch(alert) => format_auction_alert(alert),
            NotificationPayload::DailyChallenge(challenge) => format_daily_challenge(challenge),
        };
        format!("{}\n\n{}", self.content, body)
    }
}

fn format_auction_alert(alert: &AuctionAlert) -> String {
    let listing = &alert.listing;

    let mut msg = format!(
        "🎉 <b>Hetzner Server Found!</b>\n\
         A server matching your criteria has been found!\n\
         <b>{}</b>\n\n\
         <b>Price:</b> {} (incl. {}% VAT)\n\
         <b>Location:</b> {}\n\
         <b>CPU:</b> {}\n\
         <b>RAM:</b> {} GB ({})\n\
         <b>Storage:</b> {}\n\
         <b>Description:</b>\n{}",
        escape(&listing.name),
        format_price(alert.price_inclusive, alert.currency),
        alert.vat_percentage,
        escape(&listing.location_display()),
        if listing.cpu.is_empty() {
            "N/A".to_string()
        } else {
            escape(&listing.cpu)
        },
        listing.ram_size_gb,
        if listing.is_ecc { "ECC" } else { "Non-ECC" },
        escape(&listing.storage_display()),
        escape(&listing.description_display()),
    );

    let criteria = alert.criteria.describe(alert.currency);
    if !criteria.is_empty() {
        msg.push_str("\n\n<b>Your criteria:</b>");
        for line in criteria {
            msg.push_str(&format!("\n• {}", escape(&line)));
        }
    }

    msg.push_str(&format!(
        "\n\n<a href=\"{}\">View Server</a>",
        escape(&listing.url())
    ));
    msg
}

fn format_daily_challenge(challenge: &DailyChallenge) -> String {
    let question = &challenge.question;
    let url = escape(&challenge.problem_url());

    let mut msg = format!(
        "🆕 <b><a href=\"{}\">{}</a></b>\n\
         A new daily coding challenge is available on LeetCode! Good luck! 🍀\n\n\
         <b>Difficulty:</b> {}\n\
         <b>Success Rate:</b> {}",
        url,
        escape(&question.title),
        if question.difficulty.is_empty() {
            "N/A".to_string()
        } else {
            escape(&question.difficulty)
        },
        challenge.success_rate_display(),
    );

    if let Some(topics) = challenge.topics_display() {
        msg.push_str(&format!("\n<b>Topics:</b> {}", escape(&topics)));
    }

    msg.push_str(&format!("\n\n<a href=\"{}\">Solve Problem</a>", url));
    msg
}

/// Delivery channel for notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Check that `target` can receive messages before a run starts sending.
    async fn ready(&self, target: i64) -> Result<(), SinkError>;

    async fn send(&self, target: i64, notification: &Notification) -> Result<(), SinkError>;
}

/// Resolves filter owners to users that can be mentioned.
#[async_trait]
pub trait UserRegistry: Send + Sync {
    /// `None` if the user is unknown or unreachable.
    async fn resolve(&self, owner_id: i64) -> Option<Recipient>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use librebot_core::{ChallengeQuestion, TopicTag};
    use pretty_assertions::assert_eq;

    fn listing() -> Listing {
        Listing {
            id: 1234,
            key: None,
            name: "SB <42>".to_string(),
            price_exclusive: 40.0,
            locations: vec!["FSN1-DC14".to_string()],
            cpu: "AMD Ryzen 5 3600".to_string(),
            ram_size_gb: 32,
            is_ecc: false,
            drive_size_gb: 1024,
            drive_count: 2,
            drive_summary: vec!["2x 512 GB NVMe SSD".to_string()],
            drive_type_tags: vec!["nvme".to_string()],
            description: vec!["ECC".to_string()],
        }
    }

    #[test]
    fn test_mention_escapes_name() {
        let recipient = Recipient::new(7, "a<b>");
        assert_eq!(
            recipient.mention_html(),
            "<a href=\"tg://user?id=7\">a&lt;b&gt;</a>"
        );
    }

    #[test]
    fn test_auction_match_message() {
        let alert = AuctionAlert {
            filter_id: 1,
            listing: listing(),
            currency: Currency::EUR,
            vat_percentage: 19,
            price_inclusive: 47.6,
            criteria: FilterCriteria {
                max_price: Some(50),
                vat_percentage: 19,
                min_ram_gb: Some(32),
                ..Default::default()
            },
        };
        let notification = Notification::auction_match(&Recipient::new(7, "alice"), alert);
        let html = notification.to_html();

        assert!(html.starts_with(
            "<a href=\"tg://user?id=7\">alice</a>, a server matching your criteria is available!"
        ));
        assert!(html.contains("<b>SB &lt;42&gt;</b>"));
        assert!(html.contains("<b>Price:</b> 47.60 EUR (incl. 19% VAT)"));
        assert!(html.contains("<b>RAM:</b> 32 GB (Non-ECC)"));
        assert!(html.contains("Max Price: 50 EUR (incl. 19% VAT)"));
        assert!(html.contains("Min RAM: 32GB"));
        assert!(html.contains("https://www.hetzner.com/sb#search=1234"));
    }

    #[test]
    fn test_daily_challenge_message() {
        let challenge = DailyChallenge {
            date: "2024-05-01".to_string(),
            link: "/problems/two-sum/".to_string(),
            question: ChallengeQuestion {
                title: "Two Sum".to_string(),
                title_slug: "two-sum".to_string(),
                difficulty: "Easy".to_string(),
                ac_rate: 52.14,
                topic_tags: vec![TopicTag {
                    name: "Array".to_string(),
                    slug: "array".to_string(),
                }],
            },
        };

        let nobody = Notification::daily_challenge(&[], challenge.clone());
        assert_eq!(nobody.content, "A new LeetCode daily challenge is up!");

        let subscribers = vec![Recipient::new(1, "a"), Recipient::new(2, "b")];
        let notification = Notification::daily_challenge(&subscribers, challenge);
        assert_eq!(
            notification.content,
            "<a href=\"tg://user?id=1\">a</a> <a href=\"tg://user?id=2\">b</a>, a new daily challenge is up!"
        );

        let html = notification.to_html();
        assert!(html.contains("<a href=\"https://leetcode.com/problems/two-sum/\">Two Sum</a>"));
        assert!(html.contains("<b>Success Rate:</b> 52.1%"));
        assert!(html.contains("<b>Topics:</b> Array"));
    }
}
