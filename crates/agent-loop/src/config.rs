/// Configuration for one orchestration run.
#[derive(Debug, Clone)]
pub struct AgentLoopConfig {
    /// Hard cap on model turns. The reference loop had none; without a cap
    /// a model that keeps requesting tools would never terminate.
    pub max_turns: usize,
    /// Overrides the default system directive.
    pub system_prompt: Option<String>,
    /// If true, a terminal message that fails structured parsing is
    /// returned as-is instead of surfacing a malformed-answer error.
    pub fallback_to_raw_answer: bool,
}

impl Default for AgentLoopConfig {
    fn default() -> Self {
        Self {
            max_turns: 10,
            system_prompt: None,
            fallback_to_raw_answer: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_caps_turns_at_ten() {
        let config = AgentLoopConfig::default();
        assert_eq!(config.max_turns, 10);
        assert!(config.system_prompt.is_none());
        assert!(!config.fallback_to_raw_answer);
    }
}
