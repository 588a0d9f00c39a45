//! Route extraction from a SAM deployment descriptor.
//!
//! Only `Resources.*.Properties.Events.*.Properties.{Path,Method}` is read;
//! everything else in the document is ignored.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::{GatewayError, Result};
use crate::routing::Route;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct Template {
    resources: HashMap<String, Resource>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct Resource {
    properties: ResourceProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct ResourceProperties {
    events: HashMap<String, Event>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct Event {
    properties: EventProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct EventProperties {
    path: Option<String>,
    method: Option<String>,
}

/// Parse descriptor text into routes. Order is unspecified.
pub fn routes_from_str(text: &str) -> Result<Vec<Route>> {
    let template: Option<Template> = serde_yaml::from_str(text)?;
    let template = template.unwrap_or_default();

    let mut routes = Vec::new();
    for (resource_name, resource) in template.resources {
        for (event_name, event) in resource.properties.events {
            match (event.properties.method, event.properties.path) {
                (Some(method), Some(path)) => routes.push(Route::new(method, path)),
                _ => debug!(
                    resource = %resource_name,
                    event = %event_name,
                    "skipping event without Path and Method"
                ),
            }
        }
    }
    Ok(routes)
}

/// Read and parse the descriptor at `path`.
pub fn parse_template(path: impl AsRef<Path>) -> Result<Vec<Route>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| GatewayError::DescriptorUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    routes_from_str(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_FUNCTIONS: &str = r#"
AWSTemplateFormatVersion: '2010-09-09'
Transform: AWS::Serverless-2016-10-31
Resources:
  FirstFunction:
    Type: AWS::Serverless::Function
    Properties:
      Handler: first
      Events:
        Api:
          Type: Api
          Properties:
            Path: /first
            Method: post
  SecondFunction:
    Type: AWS::Serverless::Function
    Properties:
      Events:
        Api:
          Type: Api
          Properties:
            Path: /second
            Method: Put
"#;

    const TWO_FUNCTIONS_REVERSED: &str = r#"
Resources:
  SecondFunction:
    Properties:
      Events:
        Api:
          Properties:
            Path: /second
            Method: Put
  FirstFunction:
    Properties:
      Events:
        Api:
          Properties:
            Path: /first
            Method: post
"#;

    fn sorted(mut routes: Vec<Route>) -> Vec<(String, String)> {
        routes.sort_by(|a, b| a.path.cmp(&b.path));
        routes.into_iter().map(|r| (r.method, r.path)).collect()
    }

    #[test]
    fn test_two_functions_yield_two_routes() {
        let routes = routes_from_str(TWO_FUNCTIONS).unwrap();
        assert_eq!(
            sorted(routes),
            vec![
                ("POST".to_string(), "/first".to_string()),
                ("PUT".to_string(), "/second".to_string()),
            ]
        );

        let reversed = routes_from_str(TWO_FUNCTIONS_REVERSED).unwrap();
        assert_eq!(sorted(reversed), sorted(routes_from_str(TWO_FUNCTIONS).unwrap()));
    }

    #[test]
    fn test_path_kept_verbatim() {
        let text = r#"
Resources:
  Users:
    Properties:
      Events:
        Get:
          Properties:
            Path: /users/{id}
            Method: get
"#;
        let routes = routes_from_str(text).unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].path, "/users/{id}");
        assert_eq!(routes[0].method, "GET");
    }

    #[test]
    fn test_events_without_path_are_skipped() {
        let text = r#"
Resources:
  Worker:
    Properties:
      Events:
        Nightly:
          Type: Schedule
          Properties:
            Schedule: rate(1 day)
  Table:
    Type: AWS::DynamoDB::Table
"#;
        assert!(routes_from_str(text).unwrap().is_empty());
    }

    #[test]
    fn test_empty_document_has_no_routes() {
        assert!(routes_from_str("").unwrap().is_empty());
        assert!(routes_from_str("Resources: {}").unwrap().is_empty());
    }

    #[test]
    fn test_wrong_shape_is_malformed() {
        let text = r#"
Resources:
  Broken:
    Properties:
      Events:
        Api:
          Properties:
            Path: [/a, /b]
            Method: get
"#;
        let err = routes_from_str(text).unwrap_err();
        assert!(matches!(err, GatewayError::DescriptorMalformed(_)));
    }

    #[test]
    fn test_invalid_yaml_is_malformed() {
        let err = routes_from_str("Resources: [unclosed").unwrap_err();
        assert!(matches!(err, GatewayError::DescriptorMalformed(_)));
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        let err = parse_template("/nonexistent/template.yaml").unwrap_err();
        assert!(matches!(err, GatewayError::DescriptorUnreadable { .. }));
    }
}
