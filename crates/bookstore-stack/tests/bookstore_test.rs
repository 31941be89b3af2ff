use bookstore_stack::lifecycle::{BookstoreStack, StackSettings};
use bookstore_stack::model::{
    HttpMethod, API_RESOURCE_TYPE, DEPLOYMENT_TYPE, FUNCTION_TYPE, LOG_GROUP_TYPE, METHOD_TYPE, PERMISSION_TYPE,
    REST_API_TYPE, ROLE_TYPE, STAGE_TYPE, TABLE_TYPE,
};
use iaac_framework::{join, StackEnv, Template, Token};
use serde_json::{json, Value};
use std::rc::Rc;

fn synthesized(settings: StackSettings) -> Template {
    BookstoreStack::assemble(settings)
        .expect("Failed to compose")
        .synth()
        .expect("Failed to synthesize")
}

fn properties<'a>(template: &'a Template, id: &str) -> &'a Value {
    &template
        .resource(id)
        .unwrap_or_else(|| panic!("Resource {id} not found"))
        .properties
}

/// Full scenario: one of each top-level resource, plus the API's routing.
#[test]
fn test_bookstore_scenario() {
    let template = synthesized(StackSettings::default());

    assert_eq!(template.ids_of_type(TABLE_TYPE), vec!["Storage"]);
    assert_eq!(template.ids_of_type(ROLE_TYPE), vec!["Role"]);
    assert_eq!(template.ids_of_type(FUNCTION_TYPE), vec!["Lambda"]);
    assert_eq!(template.ids_of_type(REST_API_TYPE), vec!["Gateway"]);
    assert_eq!(template.ids_of_type(LOG_GROUP_TYPE), vec!["LambdaLogRetention"]);
    assert_eq!(
        template.ids_of_type(API_RESOURCE_TYPE),
        vec!["GatewayBooks", "GatewayBooksAnyProxy"]
    );
    assert_eq!(
        template.ids_of_type(PERMISSION_TYPE),
        vec!["GatewayBooksANYPermission", "GatewayBooksAnyProxyANYPermission"]
    );
    assert_eq!(template.ids_of_type(DEPLOYMENT_TYPE), vec!["GatewayDeployment"]);
    assert_eq!(template.ids_of_type(STAGE_TYPE), vec!["GatewayDeploymentStageapi"]);

    // Two proxied methods plus a preflight on the root and both routes
    let methods = template.ids_of_type(METHOD_TYPE);
    assert_eq!(methods.len(), 5);
    assert!(methods.contains(&"GatewayBooksANY"));
    assert!(methods.contains(&"GatewayBooksAnyProxyANY"));
    assert!(methods.contains(&"GatewayRootOPTIONS"));

    assert_eq!(template.len(), 16);
    assert!(template.output("GatewayEndpoint").is_some());
}

#[test]
fn test_routes_share_one_integration() {
    let bookstore = BookstoreStack::assemble(StackSettings::default()).expect("Failed to compose");

    let rest = join(&bookstore.stack, &bookstore.gateway).unwrap();
    let integration = join(&bookstore.stack, &bookstore.integration).unwrap();
    let lambda = join(&bookstore.stack, &bookstore.lambda).unwrap();

    let collection = rest.node("/books").expect("collection route");
    let element = rest.node("/books/{any+}").expect("element route");
    let on_collection = collection.method_integration(HttpMethod::Any).unwrap();
    let on_element = element.method_integration(HttpMethod::Any).unwrap();

    assert!(Rc::ptr_eq(&on_collection, &on_element));
    assert!(Rc::ptr_eq(&on_collection, &integration));
    assert!(Rc::ptr_eq(integration.function(), &lambda));
    assert_eq!(collection.methods(), vec![HttpMethod::Any]);
}

#[test]
fn test_each_resource_constructed_once() {
    let bookstore = BookstoreStack::assemble(StackSettings::default()).expect("Failed to compose");

    // Later joins hit the memo table
    join(&bookstore.stack, &bookstore.lambda).unwrap();
    join(&bookstore.stack, &bookstore.routes).unwrap();
    join(&bookstore.stack, &bookstore.storage).unwrap();

    assert_eq!(
        bookstore.stack.scope().resource_ids(),
        vec!["Storage", "Role", "Gateway", "Lambda"]
    );
    assert_eq!(bookstore.synth().unwrap().ids_of_type(FUNCTION_TYPE), vec!["Lambda"]);
}

#[test]
fn test_builders_join_independently() {
    let bookstore = BookstoreStack::new(StackSettings::default());

    let integration = join(&bookstore.stack, &bookstore.integration).unwrap();
    let lambda = join(&bookstore.stack, &bookstore.lambda).unwrap();

    assert!(Rc::ptr_eq(integration.function(), &lambda));
    assert_eq!(bookstore.stack.scope().resource_ids(), vec!["Storage", "Role", "Lambda"]);

    // The routes were never joined, so the API is absent
    let template = bookstore.synth().unwrap();
    assert!(template.ids_of_type(REST_API_TYPE).is_empty());
}

#[test]
fn test_storage_template() {
    let template = synthesized(StackSettings::default());
    let storage = template.resource("Storage").unwrap();

    assert_eq!(storage.deletion_policy.as_deref(), Some("Delete"));
    assert_eq!(
        storage.properties["KeySchema"],
        json!([
            { "AttributeName": "prefix", "KeyType": "HASH" },
            { "AttributeName": "suffix", "KeyType": "RANGE" },
        ])
    );
    assert_eq!(storage.properties["AttributeDefinitions"][1]["AttributeType"], json!("S"));
    assert_eq!(
        storage.properties["ProvisionedThroughput"],
        json!({ "ReadCapacityUnits": 1, "WriteCapacityUnits": 1 })
    );
    assert_eq!(storage.properties["TableName"], json!({ "Fn::Sub": "${AWS::StackName}-db" }));
}

#[test]
fn test_role_template() {
    let template = synthesized(StackSettings::default());
    let role = properties(&template, "Role");

    assert_eq!(
        role["AssumeRolePolicyDocument"]["Statement"][0]["Principal"]["Service"],
        json!("lambda.amazonaws.com")
    );
    assert_eq!(
        role["ManagedPolicyArns"][0],
        json!({ "Fn::Join": ["", [
            "arn:",
            { "Ref": "AWS::Partition" },
            ":iam::aws:policy/service-role/AWSLambdaBasicExecutionRole",
        ]] })
    );

    let policy = &role["Policies"][0];
    assert_eq!(policy["PolicyName"], json!("default"));
    assert_eq!(
        policy["PolicyDocument"]["Statement"][0],
        json!({
            "Effect": "Allow",
            "Action": ["dynamodb:*"],
            "Resource": [{ "Fn::GetAtt": ["Storage", "Arn"] }],
        })
    );
}

#[test]
fn test_function_template() {
    let template = synthesized(StackSettings {
        asset: "dist/crud".into(),
        ..StackSettings::default()
    });
    let function = template.resource("Lambda").unwrap();

    assert_eq!(function.depends_on, vec!["Role"]);
    assert_eq!(function.properties["Handler"], json!("main"));
    assert_eq!(function.properties["Runtime"], json!("go1.x"));
    assert_eq!(function.properties["Role"], json!({ "Fn::GetAtt": ["Role", "Arn"] }));
    assert_eq!(
        function.properties["FunctionName"],
        json!({ "Fn::Sub": "${AWS::StackName}-crud" })
    );
    assert_eq!(
        function.properties["Environment"]["Variables"]["CONFIG_DDB"],
        json!({ "Fn::Join": ["", ["ddb:///", { "Ref": "Storage" }]] })
    );
    assert_eq!(
        function.metadata.as_ref().unwrap()["aws:asset:path"],
        json!("dist/crud")
    );

    let logs = properties(&template, "LambdaLogRetention");
    assert_eq!(logs["RetentionInDays"], json!(5));
}

#[test]
fn test_gateway_template() {
    let template = synthesized(StackSettings::default());

    let api = properties(&template, "Gateway");
    assert_eq!(api["EndpointConfiguration"]["Types"], json!(["REGIONAL"]));
    assert_eq!(api["FailOnWarnings"], json!(true));

    let method = properties(&template, "GatewayBooksANY");
    assert_eq!(method["HttpMethod"], json!("ANY"));
    assert_eq!(method["ResourceId"], json!({ "Ref": "GatewayBooks" }));
    assert_eq!(method["Integration"]["Type"], json!("AWS_PROXY"));

    let element = properties(&template, "GatewayBooksAnyProxy");
    assert_eq!(element["PathPart"], json!("{any+}"));
    assert_eq!(element["ParentId"], json!({ "Ref": "GatewayBooks" }));
    let collection = properties(&template, "GatewayBooks");
    assert_eq!(collection["ParentId"], json!({ "Fn::GetAtt": ["Gateway", "RootResourceId"] }));

    let preflight = properties(&template, "GatewayBooksOPTIONS");
    let headers = &preflight["Integration"]["IntegrationResponses"][0]["ResponseParameters"];
    assert_eq!(headers["method.response.header.Access-Control-Allow-Origin"], json!("'*'"));
    assert_eq!(headers["method.response.header.Access-Control-Max-Age"], json!("'600'"));
    assert_eq!(preflight["Integration"]["Type"], json!("MOCK"));

    let stage = properties(&template, "GatewayDeploymentStageapi");
    assert_eq!(stage["StageName"], json!("api"));
    assert_eq!(stage["DeploymentId"], json!({ "Ref": "GatewayDeployment" }));

    let deployment = template.resource("GatewayDeployment").unwrap();
    assert_eq!(deployment.depends_on.len(), 5);
}

#[test]
fn test_environment_selects_target() {
    let env = StackEnv {
        account: Some("123456789012".to_string()),
        region: Some("eu-west-1".to_string()),
    };
    let template = synthesized(StackSettings {
        env,
        ..StackSettings::default()
    });

    let uri = &properties(&template, "GatewayBooksANY")["Integration"]["Uri"]["Fn::Join"][1];
    assert_eq!(uri[3], json!("eu-west-1"));

    let source = &properties(&template, "GatewayBooksAnyProxyANYPermission")["SourceArn"]["Fn::Join"][1];
    assert_eq!(source[3], json!("eu-west-1"));
    assert_eq!(source[5], json!("123456789012"));
    assert_eq!(source[8], json!("/api/*/books/*"));
}

#[test]
fn test_environment_absent_defers_to_deploy_time() {
    let template = synthesized(StackSettings::default());

    let uri = &properties(&template, "GatewayBooksANY")["Integration"]["Uri"]["Fn::Join"][1];
    assert_eq!(uri[3], Token::region().to_json());

    let source = &properties(&template, "GatewayBooksANYPermission")["SourceArn"]["Fn::Join"][1];
    assert_eq!(source[5], json!({ "Ref": "AWS::AccountId" }));
    assert_eq!(source[8], json!("/api/*/books"));

    let endpoint = template.output("GatewayEndpoint").unwrap();
    assert_eq!(
        endpoint.value.to_json()["Fn::Join"][1][3],
        json!({ "Ref": "AWS::Region" })
    );
}

#[test]
fn test_synthesis_is_idempotent() {
    let bookstore = BookstoreStack::assemble(StackSettings::default()).expect("Failed to compose");

    let first = bookstore.synth().unwrap().to_json_pretty().unwrap();
    let second = bookstore.synth().unwrap().to_json_pretty().unwrap();
    let fresh = synthesized(StackSettings::default()).to_json_pretty().unwrap();

    assert_eq!(first, second);
    assert_eq!(first, fresh);
}

#[test]
fn test_synth_to_writes_template() {
    let bookstore = BookstoreStack::assemble(StackSettings::default()).expect("Failed to compose");
    let dir = tempfile::tempdir().unwrap();

    let path = bookstore.synth_to(dir.path().join("cdk.out")).unwrap();

    assert_eq!(path, dir.path().join("cdk.out").join("bookstore.template.json"));
    let written: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written["AWSTemplateFormatVersion"], json!("2010-09-09"));
    assert_eq!(written["Resources"]["Storage"]["Type"], json!(TABLE_TYPE));
    assert!(written["Outputs"]["GatewayEndpoint"]["Value"].is_object());
}

#[test]
fn test_custom_stack_name() {
    let bookstore = BookstoreStack::assemble(StackSettings {
        stack_name: "books-staging".to_string(),
        ..StackSettings::default()
    })
    .expect("Failed to compose");
    let dir = tempfile::tempdir().unwrap();

    let path = bookstore.synth_to(dir.path()).unwrap();

    assert!(path.ends_with("books-staging.template.json"));
    assert_eq!(bookstore.stack.scope().path(), "books-staging");
}
