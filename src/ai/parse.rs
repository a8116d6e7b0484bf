use log::warn;
use serde::de::DeserializeOwned;

const FENCE: &str = "```";
const JSON_FENCE: &str = "```json";

/// Drop a leading ```` ```json ```` / ```` ``` ```` marker and a trailing ```` ``` ````.
pub fn strip_code_fences(content: &str) -> &str {
    let mut s = content.trim();
    if let Some(rest) = s
        .get(..JSON_FENCE.len())
        .filter(|head| head.eq_ignore_ascii_case(JSON_FENCE))
        .map(|_| &s[JSON_FENCE.len()..])
    {
        s = rest;
    } else if let Some(rest) = s.strip_prefix(FENCE) {
        s = rest;
    }
    if let Some(rest) = s.strip_suffix(FENCE) {
        s = rest;
    }
    s.trim()
}

/// Parse a model reply as `T`, or fall back to `T::default()` when the reply is
/// not JSON of the expected shape.
pub fn parse_or_default<T>(content: &str) -> T
where
    T: DeserializeOwned + Default,
{
    match serde_json::from_str(strip_code_fences(content)) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("model reply is not usable json, falling back to empty result, {}", e);
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::feature::{ExecutiveReport, ForecastEntry, Insights};

    #[test]
    fn strips_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("  ```JSON{\"a\":1}```  "), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```"), "");
    }

    #[test]
    fn fenced_insights_parse() {
        let reply = "```json\n{\"fast_sellers\":[\"Pizza\"],\"slow_movers\":[\"Salad\"]}\n```";
        let insights: Insights = parse_or_default(reply);
        assert_eq!(insights.fast_sellers, vec!["Pizza".to_string()]);
        assert_eq!(insights.slow_movers, vec!["Salad".to_string()]);
        assert!(insights.combo_suggestions.is_empty());
    }

    #[test]
    fn malformed_reply_yields_defaults() {
        let insights: Insights = parse_or_default("Sure! Here are some insights: ...");
        assert_eq!(insights, Insights::default());
        let report: ExecutiveReport = parse_or_default("{\"summary\": ");
        assert_eq!(report, ExecutiveReport::default());
        let forecast: Vec<ForecastEntry> = parse_or_default("");
        assert!(forecast.is_empty());
    }

    #[test]
    fn wrong_shape_yields_defaults() {
        let forecast: Vec<ForecastEntry> = parse_or_default("{\"item_name\":\"Buns\"}");
        assert!(forecast.is_empty());
    }

    #[test]
    fn forecast_array_parses() {
        let reply = r#"```json
[{"item_name":"Buns","predicted_next_7_days":120,"recommended_reorder":40.5,"reasoning":"weekend"}]
```"#;
        let forecast: Vec<ForecastEntry> = parse_or_default(reply);
        assert_eq!(forecast.len(), 1);
        assert_eq!(forecast[0].item_name, "Buns");
        assert_eq!(forecast[0].recommended_reorder, 40.5);
    }
}
