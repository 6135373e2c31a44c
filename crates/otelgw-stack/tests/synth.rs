//! End-to-end synthesis tests.
//!
//! Each test builds a context the way an operator would write it, runs the
//! whole pipeline, and inspects the emitted template as JSON.

use indexmap::IndexMap;
use otelgw_core::{ClusterData, ConfigError, ContextFile, DnsZoneRef, StackSettings};
use otelgw_stack::render::ids;
use otelgw_stack::{SynthError, synthesize};
use serde_json::{Value, json};

fn context(pairs: &[(&str, &str)]) -> ContextFile {
    let subnets: IndexMap<String, String> = pairs
        .iter()
        .map(|(z, s)| (z.to_string(), s.to_string()))
        .collect();
    ContextFile {
        cluster_data: ClusterData::new("vpc-1", subnets),
        stack: StackSettings::default(),
    }
}

fn two_zones() -> ContextFile {
    context(&[("us-east-1a", "subnet-1"), ("us-east-1b", "subnet-2")])
}

fn rendered(ctx: &ContextFile) -> Value {
    let synthesis = synthesize(ctx).unwrap();
    serde_json::to_value(&synthesis.template).unwrap()
}

fn props<'a>(template: &'a Value, logical_id: &str) -> &'a Value {
    &template["Resources"][logical_id]["Properties"]
}

fn container<'a>(template: &'a Value, name: &str) -> &'a Value {
    props(template, ids::TASK_DEFINITION)["ContainerDefinitions"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["Name"] == name)
        .unwrap_or_else(|| panic!("no container named {name}"))
}

#[test]
fn two_zone_scenario_resolves_aligned_lists() {
    let synthesis = synthesize(&two_zones()).unwrap();
    let network = &synthesis.topology.network;
    assert_eq!(network.subnet_ids, ["subnet-1", "subnet-2"]);
    assert_eq!(network.zones, ["us-east-1a", "us-east-1b"]);

    let template = serde_json::to_value(&synthesis.template).unwrap();
    assert_eq!(
        props(&template, ids::LOAD_BALANCER)["Subnets"],
        json!(["subnet-1", "subnet-2"])
    );
    assert_eq!(
        props(&template, ids::SERVICE)["NetworkConfiguration"]["AwsvpcConfiguration"]["Subnets"],
        json!(["subnet-1", "subnet-2"])
    );
}

#[test]
fn single_zone_scenario_builds() {
    let synthesis = synthesize(&context(&[("us-east-1a", "subnet-1")])).unwrap();
    assert_eq!(synthesis.topology.network.subnet_ids, ["subnet-1"]);
    assert_eq!(synthesis.topology.network.zones, ["us-east-1a"]);
}

#[test]
fn empty_zone_mapping_fails_before_anything_is_declared() {
    let err = synthesize(&context(&[])).unwrap_err();
    assert!(matches!(err, SynthError::Configuration(ConfigError::NoZones)));
}

#[test]
fn task_definition_shape() {
    let template = rendered(&two_zones());
    let task = props(&template, ids::TASK_DEFINITION);
    assert_eq!(task["Cpu"], "256");
    assert_eq!(task["Memory"], "512");
    assert_eq!(task["NetworkMode"], "awsvpc");
    assert_eq!(task["RequiresCompatibilities"], json!(["FARGATE"]));
    assert_eq!(
        task["ExecutionRoleArn"],
        json!({"Fn::GetAtt": [ids::EXECUTION_ROLE, "Arn"]})
    );
    assert_eq!(task["ContainerDefinitions"].as_array().unwrap().len(), 2);
}

#[test]
fn proxy_depends_on_collector_start_and_not_the_reverse() {
    let template = rendered(&two_zones());
    let proxy = container(&template, "proxy");
    let collector = container(&template, "collector");

    assert_eq!(
        proxy["DependsOn"],
        json!([{"ContainerName": "collector", "Condition": "START"}])
    );
    assert!(collector.get("DependsOn").is_none());
    assert_eq!(proxy["Essential"], true);
    assert_eq!(collector["Essential"], false);
}

#[test]
fn container_ports() {
    let template = rendered(&two_zones());
    let ports = |name: &str| -> Vec<u64> {
        container(&template, name)["PortMappings"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["ContainerPort"].as_u64().unwrap())
            .collect()
    };
    assert_eq!(ports("proxy"), [80]);
    assert_eq!(ports("collector"), [4318, 4317, 13133]);
}

#[test]
fn containers_log_to_their_own_groups() {
    let template = rendered(&two_zones());
    let proxy_group = props(&template, &ids::log_group("proxy"));
    assert_eq!(proxy_group["LogGroupName"], "/aws/fargate/nginx-otel-gateway");
    assert_eq!(proxy_group["RetentionInDays"], 7);
    let collector_group = props(&template, &ids::log_group("collector"));
    assert_eq!(collector_group["LogGroupName"], "/aws/fargate/otel-gateway");

    let options = &container(&template, "collector")["LogConfiguration"]["Options"];
    assert_eq!(options["awslogs-group"], json!({"Ref": "CollectorLogGroup"}));
    assert_eq!(options["awslogs-stream-prefix"], "otel-gateway");
}

#[test]
fn images_come_from_the_configured_repositories() {
    let template = rendered(&two_zones());
    let image = container(&template, "collector")["Image"]["Fn::Sub"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(image.ends_with("/your-repository-name-with-collector-images:latest"));
    assert!(image.starts_with("${AWS::AccountId}.dkr.ecr.${AWS::Region}"));
}

#[test]
fn execution_policy_grants_pull_and_log_actions_on_any_resource() {
    let template = rendered(&two_zones());
    let statement = &props(&template, ids::EXECUTION_ROLE_POLICY)["PolicyDocument"]["Statement"][0];
    assert_eq!(statement["Effect"], "Allow");
    assert_eq!(statement["Resource"], json!(["*"]));
    assert_eq!(
        statement["Action"],
        json!([
            "ecr:GetAuthorizationToken",
            "ecr:BatchCheckLayerAvailability",
            "ecr:GetDownloadUrlForLayer",
            "ecr:BatchGetImage",
            "logs:CreateLogStream",
            "logs:PutLogEvents"
        ])
    );

    let role = props(&template, ids::EXECUTION_ROLE);
    assert_eq!(role["RoleName"], "otelgateway-execution-role");
    assert_eq!(
        role["AssumeRolePolicyDocument"]["Statement"][0]["Principal"]["Service"],
        "ecs-tasks.amazonaws.com"
    );
}

#[test]
fn health_check_on_target_group() {
    let template = rendered(&two_zones());
    let tg = props(&template, ids::TARGET_GROUP);
    assert_eq!(tg["HealthCheckPath"], "/health");
    assert_eq!(tg["HealthCheckPort"], "80");
    assert_eq!(tg["Matcher"]["HttpCode"], "200-299");
    assert_eq!(tg["UnhealthyThresholdCount"], 10);
    assert_eq!(tg["TargetType"], "ip");
    assert_eq!(tg["VpcId"], "vpc-1");
}

#[test]
fn https_listener_with_http_redirect() {
    let template = rendered(&two_zones());
    let listener = props(&template, ids::LISTENER);
    assert_eq!(listener["Protocol"], "HTTPS");
    assert_eq!(listener["Port"], 443);
    assert_eq!(
        listener["Certificates"][0]["CertificateArn"],
        json!({"Ref": ids::CERTIFICATE_PARAMETER})
    );
    assert_eq!(template["Parameters"][ids::CERTIFICATE_PARAMETER]["Type"], "String");

    let redirect = props(&template, ids::REDIRECT_LISTENER);
    assert_eq!(redirect["Port"], 80);
    assert_eq!(redirect["DefaultActions"][0]["Type"], "redirect");
    assert_eq!(redirect["DefaultActions"][0]["RedirectConfig"]["Protocol"], "HTTPS");
}

#[test]
fn tasks_get_public_ips() {
    let template = rendered(&two_zones());
    let service = props(&template, ids::SERVICE);
    assert_eq!(
        service["NetworkConfiguration"]["AwsvpcConfiguration"]["AssignPublicIp"],
        "ENABLED"
    );
    assert_eq!(service["ServiceName"], "otel-gateway-service");
    assert_eq!(service["LoadBalancers"][0]["ContainerName"], "proxy");
    assert_eq!(service["LoadBalancers"][0]["ContainerPort"], 80);
    assert_eq!(
        template["Resources"][ids::SERVICE]["DependsOn"],
        json!([ids::LISTENER, ids::REDIRECT_LISTENER])
    );
}

#[test]
fn scaling_policy_is_fixed_regardless_of_context() {
    for ctx in [two_zones(), context(&[("eu-west-1a", "subnet-9")])] {
        let template = rendered(&ctx);
        let target = props(&template, ids::SCALABLE_TARGET);
        assert_eq!(target["MinCapacity"], 1);
        assert_eq!(target["MaxCapacity"], 2);
        assert_eq!(target["ScalableDimension"], "ecs:service:DesiredCount");

        let cpu = props(&template, ids::CPU_SCALING);
        let cpu_cfg = &cpu["TargetTrackingScalingPolicyConfiguration"];
        assert_eq!(cpu_cfg["TargetValue"], 60.0);
        assert_eq!(
            cpu_cfg["PredefinedMetricSpecification"]["PredefinedMetricType"],
            "ECSServiceAverageCPUUtilization"
        );

        let memory = props(&template, ids::MEMORY_SCALING);
        let memory_cfg = &memory["TargetTrackingScalingPolicyConfiguration"];
        assert_eq!(memory_cfg["TargetValue"], 60.0);
        assert_eq!(
            memory_cfg["PredefinedMetricSpecification"]["PredefinedMetricType"],
            "ECSServiceAverageMemoryUtilization"
        );
    }
}

#[test]
fn access_logs_ship_to_fixed_bucket() {
    let template = rendered(&two_zones());
    assert_eq!(
        props(&template, ids::LOAD_BALANCER)["LoadBalancerAttributes"],
        json!([
            {"Key": "access_logs.s3.enabled", "Value": "true"},
            {"Key": "access_logs.s3.bucket", "Value": "beacon-otel-gateway-alb-logs"}
        ])
    );
}

#[test]
fn hosted_zone_adds_certificate_and_alias_record() {
    let mut ctx = two_zones();
    ctx.cluster_data.domain_name = Some("otel.example.com".to_string());
    ctx.cluster_data.hosted_zone = Some(DnsZoneRef {
        id: "Z1LM4JT47QQL17".to_string(),
        name: "example.com".to_string(),
    });
    let template = rendered(&ctx);

    let cert = props(&template, ids::CERTIFICATE);
    assert_eq!(cert["DomainName"], "otel.example.com");
    assert_eq!(cert["ValidationMethod"], "DNS");
    assert!(template.get("Parameters").is_none());

    let record = props(&template, ids::DNS_RECORD);
    assert_eq!(record["Type"], "A");
    assert_eq!(record["HostedZoneId"], "Z1LM4JT47QQL17");
    assert_eq!(
        template["Outputs"][ids::OUTPUT_SERVICE_URL]["Value"],
        "https://otel.example.com"
    );
}

#[test]
fn existing_certificate_is_used_verbatim() {
    let mut ctx = two_zones();
    let arn = "arn:aws:acm:us-east-1:123456789012:certificate/abc";
    ctx.cluster_data.certificate_arn = Some(arn.to_string());
    let template = rendered(&ctx);
    assert_eq!(
        props(&template, ids::LISTENER)["Certificates"][0]["CertificateArn"],
        arn
    );
    assert!(template["Resources"].get(ids::CERTIFICATE).is_none());
}

#[test]
fn without_domain_there_is_no_dns_record() {
    let template = rendered(&two_zones());
    assert!(template["Resources"].get(ids::DNS_RECORD).is_none());
    assert_eq!(
        template["Outputs"][ids::OUTPUT_SERVICE_URL]["Value"],
        json!({"Fn::Sub": "https://${LoadBalancer.DNSName}"})
    );
}

#[test]
fn synthesis_is_deterministic() {
    let a = synthesize(&two_zones()).unwrap().template.to_json_pretty().unwrap();
    let b = synthesize(&two_zones()).unwrap().template.to_json_pretty().unwrap();
    assert_eq!(a, b);
}

#[test]
fn resource_inventory() {
    let synthesis = synthesize(&two_zones()).unwrap();
    let template = &synthesis.template;
    let count = |ty: &str| template.resources_of_type(ty).count();
    assert_eq!(count("AWS::ECS::Cluster"), 1);
    assert_eq!(count("AWS::Logs::LogGroup"), 2);
    assert_eq!(count("AWS::ECS::TaskDefinition"), 1);
    assert_eq!(count("AWS::ElasticLoadBalancingV2::Listener"), 2);
    assert_eq!(count("AWS::EC2::SecurityGroup"), 2);
    assert_eq!(count("AWS::ApplicationAutoScaling::ScalingPolicy"), 2);
    assert_eq!(count("AWS::Route53::RecordSet"), 0);
}

#[test]
fn malformed_bucket_override_aborts() {
    let mut ctx = two_zones();
    ctx.stack.access_log_bucket_arn = "not-an-arn".to_string();
    assert!(matches!(
        synthesize(&ctx),
        Err(SynthError::Configuration(ConfigError::InvalidArn(_)))
    ));
}

#[test]
fn demo_context_synthesizes() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos/otelgw.toml");
    let ctx = ContextFile::from_file(&path).unwrap();
    let synthesis = synthesize(&ctx).unwrap();
    assert_eq!(synthesis.topology.network.zones, ["us-east-1a", "us-east-1b"]);
}
