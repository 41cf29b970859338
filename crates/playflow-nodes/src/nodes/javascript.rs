//! User JavaScript, run in an embedded boa engine.

use boa_engine::{Context, Source};
use serde_json::Value;
use tracing::debug;

use playflow_core::{
    NodeConfig, NodeId, NodeParams, NodeTemplate, NodeType, RunNodeResult, VariableValueType,
};

use crate::definition::{single, NodeDefinition, NodeRunContext, NodeRunStream, TemplateBuilder};

pub struct JavaScriptFunctionNode;

impl NodeDefinition for JavaScriptFunctionNode {
    fn node_type(&self) -> NodeType {
        NodeType::JavaScriptFunctionNode
    }

    fn label(&self) -> &str {
        "JavaScript"
    }

    fn can_user_add_incoming_variables(&self) -> bool {
        true
    }

    fn create_default(&self, node_id: &NodeId) -> NodeTemplate {
        TemplateBuilder::new(node_id)
            .node_input(0, "user_name")
            .node_output(0, "output", VariableValueType::Structured)
            .condition(0, "")
            .condition_target(0)
            .build(NodeConfig::new(
                node_id.clone(),
                NodeParams::JavaScriptFunctionNode {
                    java_script_code: "return `Hello, ${user_name}!`".to_string(),
                },
            ))
    }

    fn run(&self, context: NodeRunContext) -> NodeRunStream {
        single(async move {
            let NodeParams::JavaScriptFunctionNode { java_script_code } =
                context.node_config.params.clone()
            else {
                return RunNodeResult::error("Node config is not a JavaScript function");
            };

            let names: Vec<String> = context.input_variables.iter().map(|v| v.name.clone()).collect();
            let args = context.input_values.clone();

            debug!(node_id = %context.node_id(), params = ?names, "Running JavaScript");

            match tokio::task::spawn_blocking(move || run_function(&java_script_code, &names, &args))
                .await
            {
                Ok(Ok(value)) => RunNodeResult::values(vec![value]),
                Ok(Err(message)) => RunNodeResult::error(message),
                Err(e) => RunNodeResult::error(format!("Task join error: {}", e)),
            }
        })
    }
}

/// Run `code` as the body of an async function taking `names` as
/// parameters. The body may `await`; pending jobs are drained before the
/// settled result is read.
pub fn run_function(code: &str, names: &[String], args: &[Value]) -> Result<Value, String> {
    let args_json = serde_json::to_string(args).map_err(|e| e.to_string())?;
    let params = names.join(", ");
    let spread = (0..names.len())
        .map(|i| format!("__args[{}]", i))
        .collect::<Vec<_>>()
        .join(", ");

    let full_code = format!(
        r#"
var __settled;
(async function() {{
    var __args = {args_json};
    try {{
        var __result = await (async function({params}) {{
{code}
        }})({spread});
        return JSON.stringify({{ "value": __result === undefined ? null : __result }});
    }} catch (e) {{
        var __message = (e !== null && typeof e === 'object' && 'message' in e) ? e.message : String(e);
        return JSON.stringify({{ "error": String(__message) }});
    }}
}})().then(function(s) {{ __settled = s; }});
"#,
        args_json = args_json,
        params = params,
        code = code,
        spread = spread,
    );

    let mut context = Context::default();
    context
        .eval(Source::from_bytes(&full_code))
        .map_err(|e| e.to_string())?;
    context.run_jobs();

    let settled = context
        .eval(Source::from_bytes("__settled"))
        .map_err(|e| e.to_string())?;
    let result_str = settled
        .as_string()
        .map(|s| s.to_std_string_escaped())
        .ok_or_else(|| "JavaScript function did not settle".to_string())?;

    let wrapper: Value = serde_json::from_str(&result_str)
        .map_err(|e| format!("Failed to parse result: {}", e))?;

    if let Some(message) = wrapper.get("error").and_then(|m| m.as_str()) {
        return Err(message.to_string());
    }

    Ok(wrapper.get("value").cloned().unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_default_code() {
        let value = run_function(
            "return `Hello, ${user_name}!`",
            &names(&["user_name"]),
            &[json!("Ada")],
        )
        .unwrap();
        assert_eq!(value, json!("Hello, Ada!"));
    }

    #[test]
    fn test_counter_from_null() {
        let code = "i = i ?? 0\ni++\nreturn i";
        assert_eq!(run_function(code, &names(&["i"]), &[Value::Null]).unwrap(), json!(1));
        assert_eq!(run_function(code, &names(&["i"]), &[json!(2)]).unwrap(), json!(3));
    }

    #[test]
    fn test_structured_result() {
        let value = run_function(
            "return { sum: a + b, list: [a, b] }",
            &names(&["a", "b"]),
            &[json!(1), json!(2)],
        )
        .unwrap();
        assert_eq!(value, json!({"sum": 3, "list": [1, 2]}));
    }

    #[test]
    fn test_no_return_is_null() {
        assert_eq!(run_function("var x = 1", &[], &[]).unwrap(), Value::Null);
    }

    #[test]
    fn test_thrown_error() {
        let err = run_function("throw new Error('boom')", &[], &[]).unwrap_err();
        assert_eq!(err, "boom");
    }

    #[test]
    fn test_await_in_function() {
        let code = "const v = await Promise.resolve(x + 1);\nreturn v";
        assert_eq!(run_function(code, &names(&["x"]), &[json!(1)]).unwrap(), json!(2));
    }

    #[test]
    fn test_awaited_chain() {
        let code = "const double = async (n) => n * 2;\nconst a = await double(x);\nconst b = await double(a);\nreturn { a, b }";
        let value = run_function(code, &names(&["x"]), &[json!(3)]).unwrap();
        assert_eq!(value, json!({"a": 6, "b": 12}));
    }

    #[test]
    fn test_rejected_await() {
        let err = run_function("await Promise.reject(new Error('nope'))", &[], &[]).unwrap_err();
        assert_eq!(err, "nope");
    }

    #[test]
    fn test_never_settles() {
        let err = run_function("await new Promise(() => {})", &[], &[]).unwrap_err();
        assert_eq!(err, "JavaScript function did not settle");
    }

    #[test]
    fn test_syntax_error() {
        assert!(run_function("return (", &[], &[]).is_err());
    }
}
