// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Plain-text and Markdown rendering of evaluation results

use std::fmt;

use super::evaluator::{EvaluationResult, MatchOutcome};
use super::metrics::DetectionMetrics;

/// Plain-text report, same output as `Display`
pub fn render_text(result: &EvaluationResult) -> String {
    result.to_string()
}

/// Markdown report with summary, per-language table and failed cases
pub fn render_markdown(result: &EvaluationResult) -> String {
    MarkdownReport(result).to_string()
}

fn percent(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

fn metrics_line(f: &mut fmt::Formatter<'_>, label: &str, m: &DetectionMetrics) -> fmt::Result {
    writeln!(
        f,
        "  {:<32} tp={:<4} fp={:<4} fn={:<4} precision={:<8} recall={:<8} f1={}",
        label,
        m.true_positives,
        m.false_positives,
        m.false_negatives,
        percent(m.precision()),
        percent(m.recall()),
        percent(m.f1()),
    )
}

impl fmt::Display for EvaluationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "PII masking evaluation ({})", self.strategy)?;
        writeln!(f, "  samples:          {}", self.total_samples)?;
        writeln!(f, "  scored:           {}", self.scored_samples)?;
        writeln!(f, "  exact matches:    {}", self.exact_matches)?;
        writeln!(f, "  partial matches:  {}", self.partial_matches)?;
        writeln!(f, "  misses:           {}", self.misses)?;
        writeln!(f, "  exact accuracy:   {}", percent(self.exact_accuracy()))?;
        writeln!(f, "  partial accuracy: {}", percent(self.partial_accuracy()))?;

        writeln!(f)?;
        writeln!(f, "Detection")?;
        metrics_line(f, "entities", &self.entity)?;
        metrics_line(f, "samples", &self.sample)?;
        for (entity_type, metrics) in &self.per_entity_type {
            metrics_line(f, entity_type, metrics)?;
        }

        if !self.per_language.is_empty() {
            writeln!(f)?;
            writeln!(f, "By language")?;
            for (language, summary) in &self.per_language {
                writeln!(
                    f,
                    "  {:<8} samples={:<5} exact={:<5} partial={:<5} exact_acc={:<8} partial_acc={}",
                    language,
                    summary.samples,
                    summary.exact_matches,
                    summary.partial_matches,
                    percent(summary.exact_accuracy()),
                    percent(summary.partial_accuracy()),
                )?;
            }
        }

        if !self.anomalies.is_empty() {
            writeln!(f)?;
            writeln!(f, "Anomalies ({})", self.anomalies.len())?;
            for anomaly in &self.anomalies {
                writeln!(f, "  #{}: {}", anomaly.index, anomaly.reason)?;
            }
        }

        Ok(())
    }
}

struct MarkdownReport<'a>(&'a EvaluationResult);

impl fmt::Display for MarkdownReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let result = self.0;

        writeln!(f, "# PII Masking Evaluation Report")?;
        writeln!(f)?;
        writeln!(f, "**Strategy:** `{}`", result.strategy)?;
        writeln!(f)?;
        writeln!(f, "## Summary")?;
        writeln!(f)?;
        writeln!(f, "| Metric | Value |")?;
        writeln!(f, "|--------|-------|")?;
        writeln!(f, "| Total samples | {} |", result.total_samples)?;
        writeln!(f, "| Scored samples | {} |", result.scored_samples)?;
        writeln!(f, "| Exact matches | {} |", result.exact_matches)?;
        writeln!(f, "| Partial matches | {} |", result.partial_matches)?;
        writeln!(f, "| Exact accuracy | {} |", percent(result.exact_accuracy()))?;
        writeln!(f, "| Partial accuracy | {} |", percent(result.partial_accuracy()))?;
        writeln!(f, "| Entity precision | {} |", percent(result.entity.precision()))?;
        writeln!(f, "| Entity recall | {} |", percent(result.entity.recall()))?;
        writeln!(f, "| Entity F1 | {} |", percent(result.entity.f1()))?;
        writeln!(f, "| Anomalies | {} |", result.anomalies.len())?;
        writeln!(f)?;

        if !result.per_entity_type.is_empty() {
            writeln!(f, "## By Entity Type")?;
            writeln!(f)?;
            writeln!(f, "| Entity type | TP | FP | FN | Precision | Recall | F1 |")?;
            writeln!(f, "|-------------|----|----|----|-----------|--------|----|")?;
            for (entity_type, m) in &result.per_entity_type {
                writeln!(
                    f,
                    "| {} | {} | {} | {} | {} | {} | {} |",
                    entity_type,
                    m.true_positives,
                    m.false_positives,
                    m.false_negatives,
                    percent(m.precision()),
                    percent(m.recall()),
                    percent(m.f1()),
                )?;
            }
            writeln!(f)?;
        }

        if !result.per_language.is_empty() {
            writeln!(f, "## By Language")?;
            writeln!(f)?;
            writeln!(f, "| Language | Samples | Exact | Partial | Exact accuracy | Partial accuracy |")?;
            writeln!(f, "|----------|---------|-------|---------|----------------|------------------|")?;
            for (language, s) in &result.per_language {
                writeln!(
                    f,
                    "| {} | {} | {} | {} | {} | {} |",
                    language,
                    s.samples,
                    s.exact_matches,
                    s.partial_matches,
                    percent(s.exact_accuracy()),
                    percent(s.partial_accuracy()),
                )?;
            }
            writeln!(f)?;
        }

        let failed: Vec<_> = result
            .outcomes
            .iter()
            .filter(|o| o.outcome != MatchOutcome::Exact)
            .collect();
        if !failed.is_empty() {
            writeln!(f, "## Failed Cases")?;
            writeln!(f)?;
            for outcome in failed {
                writeln!(f, "### Sample {} ({:?})", outcome.index, outcome.outcome)?;
                writeln!(f)?;
                writeln!(f, "- **Expected:** `{}`", outcome.expected_masked)?;
                writeln!(f, "- **Got:** `{}`", outcome.predicted_masked)?;
                writeln!(
                    f,
                    "- **Coverage:** {}/{} characters",
                    outcome.coverage.found, outcome.coverage.expected
                )?;
                writeln!(f)?;
            }
        }

        if !result.anomalies.is_empty() {
            writeln!(f, "## Anomalies")?;
            writeln!(f)?;
            for anomaly in &result.anomalies {
                writeln!(f, "- Sample {}: {}", anomaly.index, anomaly.reason)?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shield::config::MaskingStrategy;
    use crate::shield::entity::{Entity, EntitySet};
    use crate::shield::eval::dataset::{Corpus, LabeledEntity, LabeledSample};
    use crate::shield::eval::evaluator::Evaluator;

    fn result() -> EvaluationResult {
        let corpus = Corpus::new(vec![
            LabeledSample::new(
                "Contact john@example.com",
                vec![LabeledEntity::new(8, 24, "EMAIL_ADDRESS")],
                "en",
            ),
            LabeledSample::new("Hi John", vec![LabeledEntity::new(3, 7, "PERSON")], "en"),
            LabeledSample::new("Bad", vec![LabeledEntity::new(0, 9, "PERSON")], "ko"),
        ]);
        let email = EntitySet::from_entities(
            vec![Entity::new(8, 24, "EMAIL_ADDRESS", 0.9, "local")],
            "Contact john@example.com",
        )
        .unwrap();
        let predictions = vec![email, EntitySet::empty(), EntitySet::empty()];

        Evaluator::default()
            .with_strategy(MaskingStrategy::Replace)
            .evaluate(&corpus, &predictions)
            .unwrap()
    }

    #[test]
    fn test_text_report() {
        let text = render_text(&result());

        assert!(text.starts_with("PII masking evaluation (replace)"));
        assert!(text.contains("exact accuracy:   50.00%"));
        assert!(text.contains("EMAIL_ADDRESS"));
        assert!(text.contains("Anomalies (1)"));
        assert!(text.contains("#2:"));
    }

    #[test]
    fn test_markdown_report() {
        let markdown = render_markdown(&result());

        assert!(markdown.contains("## Summary"));
        assert!(markdown.contains("| Exact matches | 1 |"));
        assert!(markdown.contains("| en | 2 | 1 | 0 | 50.00% | 50.00% |"));
        assert!(markdown.contains("## Failed Cases"));
        assert!(markdown.contains("- **Expected:** `Hi <PERSON>`"));
        assert!(markdown.contains("- **Got:** `Hi John`"));
        assert!(markdown.contains("## Anomalies"));
    }
}
