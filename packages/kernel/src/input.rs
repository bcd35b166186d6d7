//! The input-prompt root.

use std::sync::Arc;

use syncproxy_core::{Result, Value};
use syncproxy_object_proxy::{HostValue, ObjectProxy};

/// Answers a prompt with a line of input.
pub type InputFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Input that answers every prompt with an empty line.
pub fn default_input() -> InputFn {
    Arc::new(|_| String::new())
}

/// Wrap an input callback as a host function taking the prompt.
pub fn input_root(input: InputFn) -> HostValue {
    HostValue::function("input", move |args| {
        let prompt = args
            .first()
            .and_then(HostValue::as_data)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(Value::String(input(&prompt)).into())
    })
}

/// Worker-side handle on the input root.
#[derive(Clone, Debug)]
pub struct Input {
    proxy: ObjectProxy,
}

impl Input {
    pub fn new(proxy: ObjectProxy) -> Self {
        Self { proxy }
    }

    /// Prompt and block until the host supplies a line.
    pub fn read_line(&self, prompt: &str) -> Result<String> {
        let answer = self
            .proxy
            .apply(vec![Value::from(prompt).into()])
            .then_sync()?
            .into_data()?;
        Ok(answer.as_str().unwrap_or_default().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_root_passes_the_prompt() {
        let root = input_root(Arc::new(|prompt: &str| format!("answer to {}", prompt)));
        let HostValue::Object(function) = root else {
            panic!("expected a function");
        };
        let answer = function.apply(vec![Value::from("name?").into()]).unwrap();
        assert_eq!(answer.as_data(), Some(&Value::from("answer to name?")));
    }

    #[test]
    fn default_input_is_empty() {
        assert_eq!(default_input()("anything"), "");
    }
}
