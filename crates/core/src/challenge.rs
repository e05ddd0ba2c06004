//! Daily coding challenge data.

use serde::{Deserialize, Serialize};

const LEETCODE_BASE_URL: &str = "https://leetcode.com";

/// Topic tag attached to a problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicTag {
    pub name: String,
    #[serde(default)]
    pub slug: String,
}

/// Problem metadata of the daily challenge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeQuestion {
    pub title: String,
    pub title_slug: String,
    #[serde(default)]
    pub difficulty: String,
    /// Acceptance rate in percent
    #[serde(default)]
    pub ac_rate: f64,
    #[serde(default)]
    pub topic_tags: Vec<TopicTag>,
}

/// The `activeDailyCodingChallengeQuestion` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyChallenge {
    /// Challenge date, `YYYY-MM-DD`
    #[serde(default)]
    pub date: String,
    /// Site-relative problem path
    #[serde(default)]
    pub link: String,
    pub question: ChallengeQuestion,
}

impl DailyChallenge {
    /// Slug identifying the problem; used for change detection.
    pub fn slug(&self) -> &str {
        &self.question.title_slug
    }

    pub fn problem_url(&self) -> String {
        format!("{}{}", LEETCODE_BASE_URL, self.link)
    }

    pub fn success_rate_display(&self) -> String {
        format!("{:.1}%", self.question.ac_rate)
    }

    /// Topic names joined for display; `None` if the problem has no tags.
    pub fn topics_display(&self) -> Option<String> {
        if self.question.topic_tags.is_empty() {
            return None;
        }
        Some(
            self.question
                .topic_tags
                .iter()
                .map(|tag| tag.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        )
    }
}
