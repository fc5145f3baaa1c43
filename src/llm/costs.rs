//! Per-token pricing for known models (USD).

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Look up `(input, output)` cost per token for a model.
///
/// Unknown models are priced at zero so cost logging never fails.
pub fn model_cost(model: &str) -> (Decimal, Decimal) {
    let per_million = match model {
        m if m.starts_with("gpt-4o-mini") => (dec!(0.15), dec!(0.60)),
        m if m.starts_with("gpt-4o") => (dec!(2.50), dec!(10.00)),
        m if m.starts_with("gpt-4.1-mini") => (dec!(0.40), dec!(1.60)),
        m if m.starts_with("claude-3-5-haiku") || m.starts_with("claude-haiku") => {
            (dec!(0.80), dec!(4.00))
        }
        m if m.contains("sonnet") => (dec!(3.00), dec!(15.00)),
        _ => (Decimal::ZERO, Decimal::ZERO),
    };
    let million = dec!(1_000_000);
    (per_million.0 / million, per_million.1 / million)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mini_is_cheaper_than_full_model() {
        let (mini_in, _) = model_cost("gpt-4o-mini");
        let (full_in, _) = model_cost("gpt-4o");
        assert!(mini_in < full_in);
        assert!(mini_in > Decimal::ZERO);
    }

    #[test]
    fn unknown_model_is_free() {
        assert_eq!(model_cost("mystery"), (Decimal::ZERO, Decimal::ZERO));
    }
}
