use std::path::Path;

use anyhow::Context;
use otelgw_core::ContextFile;
use tracing::info;

/// Run `otelgw synth`.
pub fn synth(context: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let json = render(context)?;

    match output {
        Some(path) => {
            std::fs::write(path, format!("{json}\n"))
                .with_context(|| format!("failed to write template to {}", path.display()))?;
            info!(path = %path.display(), "wrote template");
        }
        None => println!("{json}"),
    }

    Ok(())
}

/// Load the context and render the template as pretty JSON.
fn render(context: &Path) -> anyhow::Result<String> {
    let ctx = ContextFile::from_file(context)?;
    let synthesis = otelgw_stack::synthesize(&ctx)
        .with_context(|| format!("synthesis failed for {}", context.display()))?;
    Ok(synthesis.template.to_json_pretty()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const CONTEXT: &str = r#"
[cluster-data]
vpc_id = "vpc-1"

[cluster-data.subnets]
us-east-1a = "subnet-1"
us-east-1b = "subnet-2"
"#;

    #[test]
    fn test_synth_writes_template_file() {
        let dir = tempfile::tempdir().unwrap();
        let context = dir.path().join("otelgw.toml");
        let output = dir.path().join("template.json");
        fs::write(&context, CONTEXT).unwrap();

        synth(&context, Some(&output)).unwrap();

        let template: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(template["AWSTemplateFormatVersion"], "2010-09-09");
        assert!(template["Resources"]["TaskDefinition"].is_object());
    }

    #[test]
    fn test_synth_missing_context_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = render(&dir.path().join("missing.toml")).unwrap_err();
        assert!(err.to_string().contains("failed to read context file"));
    }

    #[test]
    fn test_synth_empty_subnets_emits_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let context = dir.path().join("otelgw.toml");
        let output = dir.path().join("template.json");
        fs::write(
            &context,
            "[cluster-data]\nvpc_id = \"vpc-1\"\n[cluster-data.subnets]\n",
        )
        .unwrap();

        let err = synth(&context, Some(&output)).unwrap_err();
        assert!(format!("{err:#}").contains("no availability zones"));
        assert!(!output.exists());
    }
}
