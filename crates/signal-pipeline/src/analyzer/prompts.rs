//! 기본 프롬프트와 템플릿 치환.

use super::StepKind;
use crate::context::PipelineContext;

pub(crate) const WYCKOFF_SYSTEM: &str = "You are an expert in Wyckoff Method analysis. Analyze market structure to identify accumulation, distribution, markup, and markdown phases. Provide clear, actionable insights about market context and likely scenarios.";

pub(crate) const WYCKOFF_TEMPLATE: &str = "Analyze {instrument} on {timeframe} timeframe using Wyckoff Method.

Recent price action (last 20 candles):
{market_data_summary}

Determine:
1. Current Wyckoff phase (Accumulation/Distribution/Markup/Markdown)
2. Market context and cycle position
3. Likely scenario (continuation or reversal)
4. Key levels to watch

Provide analysis in structured format suitable for trading decisions.";

pub(crate) const SMC_SYSTEM: &str = "You are an expert in Smart Money Concepts (SMC). Analyze market structure to identify BOS (Break of Structure), CHoCH (Change of Character), Order Blocks, Fair Value Gaps (FVG), and Liquidity Pools. Identify key levels and liquidity events.";

pub(crate) const SMC_TEMPLATE: &str = "Analyze {instrument} on {timeframe} using Smart Money Concepts.

Price structure (last 50 candles):
{market_data_summary}

Identify:
1. BOS (Break of Structure) and CHoCH points
2. Order Blocks (OB) - supply/demand zones
3. Fair Value Gaps (FVG) - imbalance zones
4. Liquidity Pools - areas where stops are likely
5. Key levels for potential price returns

Provide structured analysis with specific price levels.";

pub(crate) const VSA_SYSTEM: &str = "You are an expert in Volume Spread Analysis (VSA). Analyze volume, spread, and price action to identify large participant activity. Look for signals like no demand, no supply, stopping volume, climactic action, and effort vs result.";

pub(crate) const VSA_TEMPLATE: &str = "Analyze {instrument} on {timeframe} using Volume Spread Analysis.

OHLCV data (last 30 candles):
{market_data_summary}

Identify:
1. Large participant activity (volume analysis)
2. No demand / no supply signals
3. Stopping volume (absorption)
4. Climactic action (exhaustion)
5. Effort vs result (volume vs price movement)
6. Areas where effort without result suggests reversal

Provide VSA signals and their implications.";

pub(crate) const DELTA_SYSTEM: &str = "You are an expert in Delta analysis. Analyze buying vs selling pressure to identify dominance, anomalous delta, absorption, divergence, and where large players are holding positions or absorbing aggression.";

pub(crate) const DELTA_TEMPLATE: &str = "Analyze {instrument} on {timeframe} using Delta analysis principles.

Note: Full delta requires order flow data. Analyze buying/selling pressure from volume and price action.

Price and volume data (last 30 candles):
{market_data_summary}

Identify:
1. Buying vs selling dominance
2. Anomalous delta patterns
3. Absorption zones (volume without price movement)
4. Divergences (price vs volume/strength)
5. Where large players are holding or absorbing

Provide delta-based insights.";

pub(crate) const ICT_SYSTEM: &str = "You are an expert in ICT (Inner Circle Trader) methodology. Analyze liquidity manipulation, PD Arrays (Premium/Discount), Fair Value Gaps, and optimal entry points after liquidity sweeps.";

pub(crate) const ICT_TEMPLATE: &str = "Analyze {instrument} on {timeframe} using ICT methodology.

Price action (last 50 candles):
{market_data_summary}

Previous analysis context:
- Wyckoff phase: {wyckoff_output}
- SMC structure: {smc_output}

Identify:
1. Liquidity manipulation (sweeps above highs/below lows)
2. PD Arrays (Premium/Discount zones)
3. Fair Value Gaps (FVG) for return zones
4. Optimal entry points after liquidity collection
5. False breakouts and return scenarios

Provide ICT-based entry strategy.";

pub(crate) const PRICE_ACTION_SYSTEM: &str = "You are an expert in price action trading. Read trend structure, support and resistance, and candlestick patterns directly from the chart without indicators.";

pub(crate) const PRICE_ACTION_TEMPLATE: &str = "Analyze {instrument} on {timeframe} using pure price action.

Candles (last 30):
{market_data_summary}

Identify:
1. Trend direction and swing structure (HH/HL or LH/LL)
2. Key support and resistance levels
3. Significant candlestick patterns near those levels
4. Breakout or rejection scenarios

Provide concise, level-based conclusions.";

pub(crate) const MERGE_SYSTEM: &str = "You are a professional trading analyst. Combine multiple analysis methods into a cohesive, actionable Telegram post. Follow the exact format and style specified in the user prompt. Write in Russian as specified.";

pub(crate) const MERGE_TEMPLATE: &str = "Объедини результаты анализа {instrument} на таймфрейме {timeframe} в единый пост для Telegram.

Результаты анализа по методам:

1️⃣ WYCKOFF:
{wyckoff_output}

2️⃣ SMC (Smart Money Concepts):
{smc_output}

3️⃣ VSA (Volume Spread Analysis):
{vsa_output}

4️⃣ DELTA:
{delta_output}

5️⃣ ICT:
{ict_output}

---

Теперь создай финальный пост в формате Telegram, следуя ТОЧНО шаблону из оригинального промпта (структурно, списками, без таблиц, с заголовком, внутридневным планом и тремя сценариями).";

/// 이전 단계 출력이 없을 때 치환되는 문구.
pub fn missing_output_marker(step_name: &str) -> String {
    format!("[{} analysis unavailable: step did not complete]", step_name)
}

/// 이번 실행 계획에 없는 단계의 치환 문구.
pub fn not_planned_marker(step_name: &str) -> String {
    format!("[{} analysis not part of this run]", step_name)
}

/// 렌더링된 사용자 프롬프트와 참조한 이전 단계.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPrompt {
    pub text: String,
    /// 템플릿이 참조한 계획 내 이전 단계 (이름, 컨텍스트 존재 여부)
    pub referenced: Vec<(&'static str, bool)>,
}

impl RenderedPrompt {
    /// 참조했지만 컨텍스트에 없는 단계.
    pub fn missing(&self) -> Vec<&'static str> {
        self.referenced
            .iter()
            .filter(|(_, present)| !present)
            .map(|(name, _)| *name)
            .collect()
    }
}

/// 템플릿 치환자를 채웁니다.
///
/// 알 수 없는 치환자는 그대로 둡니다. 계획에 없는 단계의 치환자는
/// [`not_planned_marker`]로 채우고 참조 목록에 넣지 않습니다.
pub fn render(template: &str, ctx: &PipelineContext, market_summary: &str) -> RenderedPrompt {
    let mut text = template
        .replace("{instrument}", ctx.instrument())
        .replace("{timeframe}", ctx.timeframe().code())
        .replace("{market_data_summary}", market_summary);

    let mut referenced = Vec::new();
    for kind in StepKind::ALL {
        if kind == StepKind::Merge {
            continue;
        }
        let placeholder = format!("{{{}_output}}", kind.name());
        if !text.contains(&placeholder) {
            continue;
        }
        if !ctx.is_planned(kind) {
            text = text.replace(&placeholder, &not_planned_marker(kind.name()));
            continue;
        }
        let replacement = match ctx.previous_output(kind.name()) {
            Some(output) => {
                referenced.push((kind.name(), true));
                output.to_string()
            }
            None => {
                referenced.push((kind.name(), false));
                missing_output_marker(kind.name())
            }
        };
        text = text.replace(&placeholder, &replacement);
    }

    RenderedPrompt { text, referenced }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::StepResult;
    use chrono::Utc;
    use signal_core::{NormalizedMarketData, Timeframe};
    use std::sync::Arc;

    fn ctx() -> PipelineContext {
        let data =
            NormalizedMarketData::new("ETH/USDT", Timeframe::H4, "test", vec![], Utc::now()).unwrap();
        PipelineContext::new("ETH/USDT", Timeframe::H4, Arc::new(data))
    }

    #[test]
    fn test_basic_placeholders() {
        let rendered = render("{instrument} {timeframe}\n{market_data_summary}", &ctx(), "SUMMARY");
        assert_eq!(rendered.text, "ETH/USDT H4\nSUMMARY");
        assert!(rendered.referenced.is_empty());
    }

    #[test]
    fn test_missing_previous_output_is_marked() {
        let mut ctx = ctx();
        ctx.insert(
            "wyckoff",
            StepResult {
                input: serde_json::Value::Null,
                output: "Phase C spring".into(),
                model: "m".into(),
                tokens_used: 1,
                cost_estimate: 0.0,
            },
        );

        let rendered = render(ICT_TEMPLATE, &ctx, "S");
        assert!(rendered.text.contains("Wyckoff phase: Phase C spring"));
        assert!(rendered.text.contains(&missing_output_marker("smc")));
        assert_eq!(rendered.missing(), vec!["smc"]);
    }

    #[test]
    fn test_unplanned_step_is_not_missing() {
        let ctx = ctx().with_plan(&[StepKind::Wyckoff, StepKind::Ict]);

        let rendered = render(ICT_TEMPLATE, &ctx, "S");
        assert!(rendered.text.contains(&not_planned_marker("smc")));
        assert!(!rendered.text.contains(&missing_output_marker("smc")));
        assert_eq!(rendered.missing(), vec!["wyckoff"]);
    }

    #[test]
    fn test_unknown_placeholder_left_intact() {
        let rendered = render("{foo} {instrument}", &ctx(), "");
        assert_eq!(rendered.text, "{foo} ETH/USDT");
    }
}
