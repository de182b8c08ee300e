//! News retrieval, parsing and sentiment fusion
//!
//! Nothing on this path is fatal: a missing provider, a failed request, an
//! unparseable reply or a failing classifier all degrade to fewer articles
//! or neutral scores, logged at `warn`.

use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::api::news::NewsSource;
use crate::sentiment::{SentimentScorer, normalize_score};
use crate::types::{MarketSentiment, NewsArticle};

const BULLETS: [char; 3] = ['*', '-', '•'];

/// Parse free-text news into articles.
///
/// Each line starting with a bullet, or otherwise containing a `:`, is split
/// at the first `:` into title and summary. Bullet lines without a `:` are
/// skipped. Titles lose two characters at each end, which strips markdown
/// bold markers such as `**Title**`.
pub fn parse_news_content(content: &str) -> Vec<NewsArticle> {
    content
        .trim()
        .lines()
        .filter_map(|line| {
            let body = match line.strip_prefix(BULLETS) {
                Some(rest) => rest,
                None if line.contains(':') => line,
                None => return None,
            };
            let (title, summary) = body.split_once(':')?;
            Some(NewsArticle {
                title: trim_title(title.trim()),
                description: summary.trim().to_string(),
            })
        })
        .collect()
}

/// Drop the first two and last two characters
fn trim_title(title: &str) -> String {
    let chars: Vec<char> = title.chars().collect();
    if chars.len() <= 4 {
        return String::new();
    }
    chars[2..chars.len() - 2].iter().collect()
}

/// Mean score above 0.5 is positive; no scores at all is neutral.
pub fn aggregate_sentiment(scores: &[f64]) -> MarketSentiment {
    if scores.is_empty() {
        return MarketSentiment::Neutral;
    }
    let mean = scores.iter().sum::<f64>() / scores.len() as f64;
    if mean > 0.5 {
        MarketSentiment::Positive
    } else {
        MarketSentiment::Negative
    }
}

/// Articles together with their scores and the aggregate label
#[derive(Debug, Clone, PartialEq)]
pub struct NewsSentiment {
    pub articles: Vec<NewsArticle>,
    pub scores: Vec<f64>,
    pub sentiment: MarketSentiment,
}

/// Fetches news for a company and turns it into a market sentiment label
#[derive(Clone)]
pub struct NewsSentimentFuser {
    source: Option<Arc<dyn NewsSource>>,
    scorer: Arc<dyn SentimentScorer>,
}

impl NewsSentimentFuser {
    /// `source` is `None` when no news provider is configured
    pub fn new(source: Option<Arc<dyn NewsSource>>, scorer: Arc<dyn SentimentScorer>) -> Self {
        Self { source, scorer }
    }

    /// Up to `limit` parsed articles; empty on any failure
    #[instrument(skip(self))]
    pub async fn articles(&self, company: &str, limit: usize) -> Vec<NewsArticle> {
        let Some(source) = &self.source else {
            warn!("news provider not configured, returning no articles");
            return Vec::new();
        };

        let text = match source.fetch_news_text(company).await {
            Ok(Some(text)) => text,
            Ok(None) => {
                warn!("news provider returned no content");
                return Vec::new();
            }
            Err(e) => {
                warn!(error = %e, "news fetch failed");
                return Vec::new();
            }
        };

        let mut articles = parse_news_content(&text);
        if articles.is_empty() {
            warn!("no articles could be parsed from the news reply");
        }
        articles.truncate(limit);
        debug!(count = articles.len(), "parsed news articles");
        articles
    }

    /// Score each article's description, neutral on failure
    pub async fn score(&self, articles: &[NewsArticle]) -> Vec<f64> {
        let pending = articles
            .iter()
            .map(|article| self.scorer.score(&article.description));
        futures::future::join_all(pending)
            .await
            .into_iter()
            .map(|result| {
                if let Err(e) = &result {
                    warn!(scorer = self.scorer.name(), error = %e, "sentiment scoring failed");
                }
                normalize_score(result)
            })
            .collect()
    }

    /// Fetch, parse, score and aggregate
    pub async fn market_sentiment(&self, company: &str, limit: usize) -> NewsSentiment {
        let articles = self.articles(company, limit).await;
        let scores = self.score(&articles).await;
        let sentiment = aggregate_sentiment(&scores);
        debug!(%sentiment, articles = articles.len(), "news sentiment");
        NewsSentiment {
            articles,
            scores,
            sentiment,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::news::MockNewsSource;
    use crate::error::StockError;
    use crate::sentiment::{FixedScorer, MockSentimentScorer, NEUTRAL_SCORE};

    fn fuser_with(text: Option<&'static str>, scorer: Arc<dyn SentimentScorer>) -> NewsSentimentFuser {
        let mut source = MockNewsSource::new();
        source
            .expect_fetch_news_text()
            .returning(move |_| Ok(text.map(str::to_string)));
        NewsSentimentFuser::new(Some(Arc::new(source)), scorer)
    }

    #[test]
    fn test_parse_bullet_line() {
        let articles = parse_news_content("* Title: Summary text");
        assert_eq!(
            articles,
            vec![NewsArticle {
                title: "t".to_string(),
                description: "Summary text".to_string(),
            }]
        );
    }

    #[test]
    fn test_parse_strips_bold_markers() {
        let content = "- **Quarterly results**: Profit rose 12%.\n• **Merger talks**: Board met: no decision";
        let articles = parse_news_content(content);
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].title, "Quarterly results");
        assert_eq!(articles[0].description, "Profit rose 12%.");
        assert_eq!(articles[1].title, "Merger talks");
        assert_eq!(articles[1].description, "Board met: no decision");
    }

    #[test]
    fn test_parse_skips_bullets_without_colon_and_plain_lines() {
        let content = "Here is the news\n* no separator here\n  ##Plain##: line with colon\n";
        let articles = parse_news_content(content);
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "Plain");
    }

    #[test]
    fn test_short_titles_become_empty() {
        let articles = parse_news_content("* abcd: x\n* ab: y");
        assert!(articles.iter().all(|a| a.title.is_empty()));
        assert_eq!(articles.len(), 2);
    }

    #[test]
    fn test_aggregate_thresholds() {
        assert_eq!(aggregate_sentiment(&[]), MarketSentiment::Neutral);
        assert_eq!(aggregate_sentiment(&[0.5, 0.5]), MarketSentiment::Negative);
        assert_eq!(aggregate_sentiment(&[0.6, 0.5]), MarketSentiment::Positive);
        assert_eq!(aggregate_sentiment(&[0.1, 0.8]), MarketSentiment::Negative);
    }

    #[tokio::test]
    async fn test_articles_truncated_to_limit() {
        let fuser = fuser_with(
            Some("* **One**: a\n* **Two**: b\n* **Three**: c"),
            Arc::new(FixedScorer::new(0.9)),
        );
        let articles = fuser.articles("INFY", 2).await;
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[1].title, "Two");
    }

    #[tokio::test]
    async fn test_positive_and_negative_sentiment() {
        let text = Some("* **Up**: good\n* **Down**: bad");

        let positive = fuser_with(text, Arc::new(FixedScorer::sequence(vec![0.9, 0.4])));
        let result = positive.market_sentiment("INFY", 9).await;
        assert_eq!(result.sentiment, MarketSentiment::Positive);
        assert_eq!(result.scores, vec![0.9, 0.4]);

        let negative = fuser_with(text, Arc::new(FixedScorer::new(0.2)));
        let result = negative.market_sentiment("INFY", 9).await;
        assert_eq!(result.sentiment, MarketSentiment::Negative);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_neutral() {
        let mut source = MockNewsSource::new();
        source
            .expect_fetch_news_text()
            .returning(|_| Err(StockError::NewsUnavailable("timeout".to_string())));
        let fuser = NewsSentimentFuser::new(Some(Arc::new(source)), Arc::new(FixedScorer::new(0.9)));

        let result = fuser.market_sentiment("INFY", 9).await;
        assert!(result.articles.is_empty());
        assert_eq!(result.sentiment, MarketSentiment::Neutral);
    }

    #[tokio::test]
    async fn test_missing_provider_and_empty_reply_are_neutral() {
        let fuser = NewsSentimentFuser::new(None, Arc::new(FixedScorer::new(0.9)));
        assert_eq!(
            fuser.market_sentiment("INFY", 9).await.sentiment,
            MarketSentiment::Neutral
        );

        let fuser = fuser_with(None, Arc::new(FixedScorer::new(0.9)));
        assert!(fuser.articles("INFY", 9).await.is_empty());
    }

    #[tokio::test]
    async fn test_scorer_failure_falls_back_to_neutral() {
        let mut scorer = MockSentimentScorer::new();
        scorer
            .expect_score()
            .returning(|_| Err(StockError::NewsUnavailable("model loading".to_string())));
        scorer.expect_name().return_const("mock");

        let fuser = fuser_with(Some("* **Up**: good"), Arc::new(scorer));
        let result = fuser.market_sentiment("INFY", 9).await;
        assert_eq!(result.scores, vec![NEUTRAL_SCORE]);
        assert_eq!(result.sentiment, MarketSentiment::Negative);
    }
}
