//! Prompt context assembly.
//!
//! Retrieved content is included verbatim, in rank order:
//!
//! ```text
//! Relevant knowledge from the Dzogchen database:
//! [1] first result
//!
//! [2] second result
//! ```

use crate::config::PromptConfig;
use crate::retrieval::SearchResult;

/// Renders search results into a block for prompt injection.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    preamble: String,
    closing_instruction: String,
}

impl ContextAssembler {
    pub fn new(config: &PromptConfig) -> Self {
        Self {
            preamble: config.preamble.clone(),
            closing_instruction: config.closing_instruction.clone(),
        }
    }

    /// Build the context block. Empty results produce an empty string.
    pub fn build_context(&self, results: &[SearchResult]) -> String {
        if results.is_empty() {
            return String::new();
        }

        let parts: Vec<String> = results
            .iter()
            .enumerate()
            .map(|(idx, result)| format!("[{}] {}", idx + 1, result.document.content))
            .collect();

        format!("{}\n{}", self.preamble, parts.join("\n\n"))
    }

    /// Append the context block and closing instruction to `base_prompt`.
    ///
    /// With no results the base prompt is returned unchanged.
    pub fn augment_prompt(&self, base_prompt: &str, results: &[SearchResult]) -> String {
        let context = self.build_context(results);
        if context.is_empty() {
            return base_prompt.to_string();
        }

        format!("{base_prompt}\n\n{context}\n\n{}", self.closing_instruction)
    }
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new(&PromptConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::KnowledgeDocument;
    use pretty_assertions::assert_eq;

    fn result(content: &str, score: f32) -> SearchResult {
        SearchResult {
            document: KnowledgeDocument::user_text(content),
            score,
        }
    }

    fn assembler() -> ContextAssembler {
        ContextAssembler::new(&PromptConfig {
            preamble: "Context:".to_string(),
            closing_instruction: "Cite your sources.".to_string(),
        })
    }

    #[test]
    fn test_empty_results_build_empty_context() {
        assert_eq!(assembler().build_context(&[]), "");
    }

    #[test]
    fn test_results_are_numbered_in_rank_order() {
        let context = assembler().build_context(&[result("Rigpa", 0.9), result("Kadag", 0.4)]);
        assert_eq!(context, "Context:\n[1] Rigpa\n\n[2] Kadag");
    }

    #[test]
    fn test_augment_prompt_appends_context_and_instruction() {
        let prompt = assembler().augment_prompt("You are a guide.", &[result("Lhundrub", 1.0)]);
        assert_eq!(
            prompt,
            "You are a guide.\n\nContext:\n[1] Lhundrub\n\nCite your sources."
        );
    }

    #[test]
    fn test_augment_prompt_without_results_is_base_prompt() {
        assert_eq!(assembler().augment_prompt("Base.", &[]), "Base.");
    }

    #[test]
    fn test_default_preamble() {
        let context = ContextAssembler::default().build_context(&[result("x", 1.0)]);
        assert!(context.starts_with("Relevant knowledge from the Dzogchen database:\n[1] x"));
    }
}
