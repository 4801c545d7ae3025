/// A builder for rendering prompts with context.
pub struct PromptRenderer<'a> {
    template: &'a str,
    replacements: Vec<(&'a str, String)>,
}

impl<'a> PromptRenderer<'a> {
    pub fn new(template: &'a str) -> Self {
        Self {
            template,
            replacements: Vec::new(),
        }
    }

    pub fn set(mut self, key: &'a str, value: impl Into<String>) -> Self {
        self.replacements.push((key, value.into()));
        self
    }

    pub fn render(self) -> String {
        let mut result = self.template.to_string();
        for (key, value) in self.replacements {
            result = result.replace(key, &value);
        }

        if let Some(start) = result.find("{{") {
            if let Some(end) = result[start..].find("}}") {
                let placeholder = &result[start..start + end + 2];
                tracing::error!("Unreplaced placeholder found in prompt: {}", placeholder);
            }
        }

        result
    }
}

pub const REPLY_TEMPLATE: &str = include_str!("../../prompts/reply.md");
pub const SPLIT_TEMPLATE: &str = include_str!("../../prompts/split.md");

/// System instruction for answering a mention
pub fn reply_system_prompt(max_chars: usize) -> String {
    PromptRenderer::new(REPLY_TEMPLATE)
        .set("{{MAX_CHARS}}", max_chars.to_string())
        .render()
}

/// System instruction for splitting an over-long answer into thread segments
pub fn split_system_prompt(max_parts: usize, part_chars: usize) -> String {
    PromptRenderer::new(SPLIT_TEMPLATE)
        .set("{{MAX_PARTS}}", max_parts.to_string())
        .set("{{PART_CHARS}}", part_chars.to_string())
        .render()
}
