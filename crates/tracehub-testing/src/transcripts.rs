use serde_json::{Value, json};

/// Builds transcript JSONL bodies line by line for parser and pipeline tests.
#[derive(Debug, Default)]
pub struct TranscriptBuilder {
    lines: Vec<String>,
    session_id: Option<String>,
}

impl TranscriptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_id(mut self, id: &str) -> Self {
        self.session_id = Some(id.to_string());
        self
    }

    pub fn user_text(mut self, timestamp: &str, text: &str) -> Self {
        let mut line = json!({
            "type": "user",
            "timestamp": timestamp,
            "message": {"role": "user", "content": text},
        });
        self.stamp(&mut line);
        self.lines.push(line.to_string());
        self
    }

    pub fn assistant_text(mut self, timestamp: &str, message_id: &str, text: &str, tokens_in: i64, tokens_out: i64) -> Self {
        let mut line = json!({
            "type": "assistant",
            "timestamp": timestamp,
            "message": {
                "id": message_id,
                "role": "assistant",
                "model": "claude-sonnet-4",
                "content": [{"type": "text", "text": text}],
                "usage": {"input_tokens": tokens_in, "output_tokens": tokens_out},
            },
        });
        self.stamp(&mut line);
        self.lines.push(line.to_string());
        self
    }

    pub fn assistant_tool_use(mut self, timestamp: &str, message_id: &str, tool: &str, input: Value) -> Self {
        let mut line = json!({
            "type": "assistant",
            "timestamp": timestamp,
            "message": {
                "id": message_id,
                "role": "assistant",
                "model": "claude-sonnet-4",
                "content": [{"type": "tool_use", "id": format!("toolu_{}", self.lines.len()), "name": tool, "input": input}],
                "usage": {"input_tokens": 50, "output_tokens": 20},
            },
        });
        self.stamp(&mut line);
        self.lines.push(line.to_string());
        self
    }

    pub fn raw_line(mut self, line: &str) -> Self {
        self.lines.push(line.to_string());
        self
    }

    pub fn build(self) -> String {
        let mut body = self.lines.join("\n");
        body.push('\n');
        body
    }

    fn stamp(&self, line: &mut Value) {
        if let (Some(id), Some(obj)) = (&self.session_id, line.as_object_mut()) {
            obj.insert("sessionId".to_string(), json!(id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_emits_jsonl() {
        let body = TranscriptBuilder::new()
            .session_id("cc-A")
            .user_text("2026-03-01T10:00:00Z", "hello")
            .assistant_text("2026-03-01T10:00:01Z", "m1", "hi", 10, 5)
            .build();

        let lines: Vec<&str> = body.trim_end().split('\n').collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let value: Value = serde_json::from_str(line).unwrap();
            assert_eq!(value["sessionId"], "cc-A");
        }
    }
}
