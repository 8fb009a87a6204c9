//! `app.ts`: the CDK application entrypoint
//!
//! Every stage gets a `provide<Identifier>Stack` callback on the props
//! interface. The personal stage is only instantiated when `USER` is set and
//! the feature stage only when `BRANCH` is set.

use crate::codegen::{
    print_module, Constructor, Expr, Item, Member, Module, Param, Stmt, TemplatePart, Type,
};
use crate::core::stage::{ResolvedStage, StageKind};
use crate::pipelines::cdk::CdkPipeline;
use crate::project::GENERATED_MARKER;

const APP_CLASS: &str = "PipelineApp";
const PROPS_INTERFACE: &str = "PipelineAppProps";
const STAGE_PROPS_INTERFACE: &str = "PipelineAppStageProps";

pub(super) fn render(pipeline: &CdkPipeline) -> String {
    print_module(&module(pipeline))
}

fn all_stages(pipeline: &CdkPipeline) -> Vec<&ResolvedStage> {
    pipeline
        .stages
        .iter()
        .chain(&pipeline.independent)
        .chain(pipeline.personal.as_ref())
        .chain(pipeline.feature.as_ref())
        .collect()
}

fn provider_name(stage: &ResolvedStage) -> String {
    format!("provide{}Stack", stage.identifier)
}

fn module(pipeline: &CdkPipeline) -> Module {
    let stages = all_stages(pipeline);

    let provider_type = Type::Function {
        params: vec![
            Param::new("scope", Type::named("Construct")),
            Param::new("id", Type::named("string")),
            Param::new("props", Type::named(STAGE_PROPS_INTERFACE)),
        ],
        returns: Box::new(Type::named("Stack")),
    };

    let members = stages
        .iter()
        .map(|stage| Member {
            name: provider_name(stage),
            optional: false,
            ty: provider_type.clone(),
        })
        .collect();

    let mut body = vec![Stmt::Expr(Expr::call(Expr::ident("super"), vec![Expr::ident("props")]))];
    for stage in &stages {
        let call = Stmt::Expr(instantiate(pipeline, stage));
        match stage.kind {
            StageKind::Personal => body.push(Stmt::If {
                condition: Expr::path("process.env.USER"),
                then: vec![call],
            }),
            StageKind::Feature => body.push(Stmt::If {
                condition: Expr::path("process.env.BRANCH"),
                then: vec![call],
            }),
            StageKind::Pipeline | StageKind::Independent => body.push(call),
        }
    }

    Module {
        header: vec![GENERATED_MARKER.to_string()],
        items: vec![
            Item::Import {
                names: vec!["App".to_string(), "AppProps".to_string(), "Stack".to_string(), "StackProps".to_string()],
                from: "aws-cdk-lib".to_string(),
            },
            Item::Import {
                names: vec!["Construct".to_string()],
                from: "constructs".to_string(),
            },
            Item::Interface {
                name: STAGE_PROPS_INTERFACE.to_string(),
                extends: Some("StackProps".to_string()),
                members: vec![Member {
                    name: "stageName".to_string(),
                    optional: false,
                    ty: Type::named("string"),
                }],
            },
            Item::Interface {
                name: PROPS_INTERFACE.to_string(),
                extends: Some("AppProps".to_string()),
                members,
            },
            Item::Class {
                name: APP_CLASS.to_string(),
                extends: Some("App".to_string()),
                constructor: Constructor {
                    params: vec![Param::new("props", Type::named(PROPS_INTERFACE))],
                    body,
                },
            },
        ],
    }
}

/// `props.provideDevStack(this, 'app-dev', { env, stackName, stageName })`
fn instantiate(pipeline: &CdkPipeline, stage: &ResolvedStage) -> Expr {
    let stack_name = pipeline.stack_name(&stage.name);
    let stack_name_expr = match stage.kind {
        StageKind::Personal => Expr::Template(vec![
            TemplatePart::Text(format!("{}-", stack_name)),
            TemplatePart::Expr(Expr::path("process.env.USER")),
        ]),
        StageKind::Feature => Expr::Template(vec![
            TemplatePart::Text(format!("{}-", stack_name)),
            TemplatePart::Expr(Expr::call(
                Expr::path("process.env.BRANCH.replace"),
                vec![
                    Expr::Regex {
                        pattern: "[^a-zA-Z0-9-]".to_string(),
                        flags: "g".to_string(),
                    },
                    Expr::str("-"),
                ],
            )),
        ]),
        StageKind::Pipeline | StageKind::Independent => Expr::str(&stack_name),
    };

    Expr::call(
        Expr::path(&format!("props.{}", provider_name(stage))),
        vec![
            Expr::ident("this"),
            Expr::str(&stack_name),
            Expr::Object(vec![
                (
                    "env".to_string(),
                    Expr::Object(vec![
                        ("account".to_string(), Expr::str(&stage.env.account)),
                        ("region".to_string(), Expr::str(&stage.env.region)),
                    ]),
                ),
                ("stackName".to_string(), stack_name_expr),
                ("stageName".to_string(), Expr::str(&stage.name)),
            ]),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ProjectConfig;
    use crate::pipelines::ProjectSettings;

    fn render_yaml(yaml: &str) -> String {
        let config: ProjectConfig = serde_yaml::from_str(yaml).unwrap();
        let settings = ProjectSettings::from_config(&config);
        render(&CdkPipeline::new(config.cdk.unwrap(), settings).unwrap())
    }

    #[test]
    fn test_providers_per_stage() {
        let source = render_yaml(
            r#"
name: shop
cdk:
  stages:
    - name: dev
      env: { account: "111111111111", region: eu-central-1 }
    - name: prod eu
      env: { account: "222222222222", region: eu-west-1 }
  independentStages:
    - name: sandbox
      env: { account: "333333333333", region: eu-west-1 }
"#,
        );
        assert!(source.starts_with("// ~~ Generated by pipegen"));
        assert!(source.contains("readonly provideDevStack: (scope: Construct, id: string, props: PipelineAppStageProps) => Stack;"));
        assert!(source.contains("readonly provideProdEuStack:"));
        assert!(source.contains("readonly provideSandboxStack:"));
        assert!(source.contains("    props.provideProdEuStack(this, 'shop-prod-eu', {"));
        assert!(source.contains("        account: '222222222222',"));
        assert!(!source.contains("process.env"));
    }

    #[test]
    fn test_ephemeral_stages_are_guarded() {
        let source = render_yaml(
            r#"
name: shop
cdk:
  stackPrefix: web
  personalStage:
    env: { account: "1", region: us-east-1 }
  featureStages:
    env: { account: "1", region: us-east-1 }
"#,
        );
        assert!(source.contains("    if (process.env.USER) {\n      props.providePersonalStack(this, 'web-personal', {"));
        assert!(source.contains("stackName: `web-personal-${process.env.USER}`,"));
        assert!(source.contains("    if (process.env.BRANCH) {"));
        assert!(source.contains("stackName: `web-feature-${process.env.BRANCH.replace(/[^a-zA-Z0-9-]/g, '-')}`,"));
    }
}
