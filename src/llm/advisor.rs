//! Prompts and answer parsing for the two model calls in a cycle.

use super::client::{CompletionOracle, LlmError};
use crate::config::OpenAiConfig;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

pub const ANALYSER_PROMPT: &str = "You will be provided with a ticker symbol representing a company and a brief summary of recent news related to that company. \
Your task is to analyze this information and predict the company's growth potential over the next few years. Specifically, \
you are to determine if the company fits the definition of an 'evergreen' company, meaning it has strong growth prospects \
for the future, even if it is currently experiencing losses. \
- **Respond with 'Yes'** if, based on the information provided, you believe the company is evergreen and \
likely to grow in the coming years. \
- **Respond with 'No'** if, based on the information provided, you assess the company as not likely \
to achieve growth in the near future, considering its current situation. \
Remember, your analysis should take into account the specific details of the news provided and any known factors about the company's sector, operational model, or financial health that can influence its future growth potential. Strictly answer with a yes or no";

pub const LIMIT_ORDER_PROMPT: &str = "Given historical price data, the current price of a stock, and the most recent news about the company whose stock you hold, \
your task is to analyze this information to determine an optimal sell limit order price. Please provide your decision as a numeric \
value representing the price at which you wish to set your sell limit order. You must reply in numbers only. Be as realistically optimistic as you can!";

/// Buy decision for a single ticker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Buy,
    Pass,
}

/// `Buy` only for a bare "yes"; trailing punctuation is ignored.
pub fn parse_verdict(answer: &str) -> Verdict {
    let answer = answer
        .trim()
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .to_lowercase();

    if answer == "yes" {
        Verdict::Buy
    } else {
        Verdict::Pass
    }
}

/// First decimal number in `answer`. Dollar signs and thousands separators
/// are accepted.
pub fn parse_price(answer: &str) -> Option<Decimal> {
    let cleaned: String = answer.chars().filter(|c| *c != '$' && *c != ',').collect();

    let start = cleaned.find(|c: char| c.is_ascii_digit())?;
    let number: String = cleaned[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let number = number.trim_end_matches('.');

    Decimal::from_str(number).ok()
}

fn format_closes(closes: &[Decimal]) -> String {
    let items: Vec<String> = closes.iter().map(|c| c.to_string()).collect();
    format!("[{}]", items.join(", "))
}

/// Wraps a completion oracle with the growth and limit-price prompts.
pub struct StockAdvisor {
    oracle: Arc<dyn CompletionOracle>,
    decision_temperature: f32,
    limit_temperature: f32,
}

impl StockAdvisor {
    pub fn new(oracle: Arc<dyn CompletionOracle>, config: &OpenAiConfig) -> Self {
        Self {
            oracle,
            decision_temperature: config.decision_temperature,
            limit_temperature: config.limit_temperature,
        }
    }

    /// Ask whether `ticker` is an evergreen company given the article text.
    pub async fn decide_growth(&self, ticker: &str, article: &str) -> Result<Verdict, LlmError> {
        let user = format!("Ticker Symbol: {} News: {}", ticker, article);
        let answer = self
            .oracle
            .complete(ANALYSER_PROMPT, &user, self.decision_temperature)
            .await?;

        debug!(%ticker, %answer, "Growth decision");
        Ok(parse_verdict(&answer))
    }

    /// Ask for a sell-limit price given recent closes, the current price and news.
    pub async fn predict_limit(
        &self,
        closes: &[Decimal],
        current_price: Decimal,
        article: &str,
    ) -> Result<Decimal, LlmError> {
        let user = format!(
            "Historical data: {} Current price:{} News: {}",
            format_closes(closes),
            current_price,
            article
        );
        let answer = self
            .oracle
            .complete(LIMIT_ORDER_PROMPT, &user, self.limit_temperature)
            .await?;

        parse_price(&answer).ok_or_else(|| {
            LlmError::InvalidResponse(format!("No price in limit prediction: {:?}", answer))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::MockCompletionOracle;
    use mockall::predicate::eq;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_verdict() {
        assert_eq!(parse_verdict("yes"), Verdict::Buy);
        assert_eq!(parse_verdict("Yes."), Verdict::Buy);
        assert_eq!(parse_verdict("  yes!\n"), Verdict::Buy);
        assert_eq!(parse_verdict("no"), Verdict::Pass);
        assert_eq!(parse_verdict("yes, but risky"), Verdict::Pass);
        assert_eq!(parse_verdict(""), Verdict::Pass);
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("187.5"), Some(dec!(187.5)));
        assert_eq!(parse_price("$1,204.30"), Some(dec!(1204.30)));
        assert_eq!(parse_price("sell limit: 42."), Some(dec!(42)));
        assert_eq!(parse_price("around 12.75 or 13"), Some(dec!(12.75)));
        assert_eq!(parse_price("no idea"), None);
    }

    #[tokio::test]
    async fn test_decide_growth_prompt_and_temperature() {
        let mut oracle = MockCompletionOracle::new();
        oracle
            .expect_complete()
            .with(
                eq(ANALYSER_PROMPT),
                eq("Ticker Symbol: NVDA News: record revenue"),
                eq(1.0f32),
            )
            .times(1)
            .returning(|_, _, _| Ok("yes".to_string()));

        let advisor = StockAdvisor::new(Arc::new(oracle), &OpenAiConfig::default());
        let verdict = advisor.decide_growth("NVDA", "record revenue").await.unwrap();

        assert_eq!(verdict, Verdict::Buy);
    }

    #[tokio::test]
    async fn test_predict_limit_formats_history() {
        let mut oracle = MockCompletionOracle::new();
        oracle
            .expect_complete()
            .with(
                eq(LIMIT_ORDER_PROMPT),
                eq("Historical data: [101, 103, 102] Current price:102.37 News: guidance raised"),
                eq(0.7f32),
            )
            .times(1)
            .returning(|_, _, _| Ok("$118.40".to_string()));

        let advisor = StockAdvisor::new(Arc::new(oracle), &OpenAiConfig::default());
        let limit = advisor
            .predict_limit(
                &[dec!(101), dec!(103), dec!(102)],
                dec!(102.37),
                "guidance raised",
            )
            .await
            .unwrap();

        assert_eq!(limit, dec!(118.40));
    }

    #[tokio::test]
    async fn test_unparsable_limit_is_an_error() {
        let mut oracle = MockCompletionOracle::new();
        oracle
            .expect_complete()
            .returning(|_, _, _| Ok("i cannot say".to_string()));

        let advisor = StockAdvisor::new(Arc::new(oracle), &OpenAiConfig::default());
        let result = advisor.predict_limit(&[dec!(10)], dec!(10), "").await;

        assert!(matches!(result, Err(LlmError::InvalidResponse(_))));
    }
}
